//! Relay service client.
//!
//! The relay is an upstream chat-bot file API: it accepts raw image bytes
//! for a destination chat and hands back opaque object references, and it
//! serves the bytes back when given a reference. Nothing else about it is
//! assumed here.

use async_trait::async_trait;
use relaypix_common::{AppError, AppResult};
use serde::Deserialize;

/// Opaque references returned by the relay for one stored blob.
#[derive(Debug, Clone)]
pub struct RelayObject {
    /// Reference to the highest-resolution object.
    pub file_id: String,
    /// Reference to a thumbnail-sized object, when the relay provides one.
    pub thumb_file_id: Option<String>,
}

/// Storage seam over the relay service.
///
/// The dedup job and the catalog service only need "blob in, reference out"
/// and "reference in, bytes out"; tests substitute an in-memory store.
#[async_trait]
pub trait RelayStore: Send + Sync {
    /// Upload a blob, returning its object references.
    async fn send_photo(
        &self,
        data: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> AppResult<RelayObject>;

    /// Fetch the raw bytes behind a reference.
    async fn fetch(&self, file_id: &str) -> AppResult<Vec<u8>>;
}

/// Extract the "retry after N" hint from a free-text relay error message.
///
/// Kept as a compatibility fallback; the structured `retry_after` parameter
/// is preferred whenever the relay sends it.
#[must_use]
pub fn parse_retry_after(message: &str) -> Option<u64> {
    let idx = message.find("retry after ")?;
    let rest = &message[idx + "retry after ".len()..];
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

// ==================== Telegram bot API implementation ====================

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    parameters: Option<ApiParameters>,
}

#[derive(Debug, Deserialize)]
struct ApiParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SendPhotoResult {
    photo: Option<Vec<PhotoSize>>,
}

#[derive(Debug, Deserialize)]
struct PhotoSize {
    file_id: String,
}

#[derive(Debug, Deserialize)]
struct GetFileResult {
    file_path: String,
}

/// Relay client speaking the Telegram bot file API.
#[derive(Clone)]
pub struct TelegramRelay {
    http_client: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramRelay {
    /// Create a new relay client.
    #[must_use]
    pub fn new(api_base: String, bot_token: String, chat_id: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_base,
            bot_token,
            chat_id,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base.trim_end_matches('/'),
            self.bot_token
        )
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{file_path}",
            self.api_base.trim_end_matches('/'),
            self.bot_token
        )
    }

    /// Map a relay error envelope onto the application error taxonomy.
    fn envelope_error<T>(envelope: &ApiEnvelope<T>) -> AppError {
        let description = envelope
            .description
            .clone()
            .unwrap_or_else(|| "relay rejected the request".to_string());

        // Structured hint first, text parsing only as fallback.
        let retry_after = envelope
            .parameters
            .as_ref()
            .and_then(|p| p.retry_after)
            .or_else(|| parse_retry_after(&description));

        match retry_after {
            Some(retry_after) => AppError::RateLimited { retry_after },
            None => AppError::Relay(description),
        }
    }
}

#[async_trait]
impl RelayStore for TelegramRelay {
    async fn send_photo(
        &self,
        data: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> AppResult<RelayObject> {
        let part = reqwest::multipart::Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str(content_type)
            .map_err(|e| AppError::Relay(format!("invalid content type: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .text("chat_id", self.chat_id.clone())
            .part("photo", part);

        let response = self
            .http_client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Relay(format!("request failed: {e}")))?;

        let envelope: ApiEnvelope<SendPhotoResult> = response
            .json()
            .await
            .map_err(|e| AppError::Relay(format!("malformed response: {e}")))?;

        if !envelope.ok {
            return Err(Self::envelope_error(&envelope));
        }

        let sizes = envelope
            .result
            .and_then(|r| r.photo)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::Relay("response carried no photo references".to_string()))?;

        // Sizes are ordered smallest to largest; keep the largest as the
        // canonical object and the smallest as the thumbnail.
        let file_id = sizes[sizes.len() - 1].file_id.clone();
        let thumb_file_id = if sizes.len() > 1 {
            Some(sizes[0].file_id.clone())
        } else {
            None
        };

        Ok(RelayObject {
            file_id,
            thumb_file_id,
        })
    }

    async fn fetch(&self, file_id: &str) -> AppResult<Vec<u8>> {
        let response = self
            .http_client
            .get(self.method_url("getFile"))
            .query(&[("file_id", file_id)])
            .send()
            .await
            .map_err(|e| AppError::Relay(format!("request failed: {e}")))?;

        let envelope: ApiEnvelope<GetFileResult> = response
            .json()
            .await
            .map_err(|e| AppError::Relay(format!("malformed response: {e}")))?;

        if !envelope.ok {
            return Err(Self::envelope_error(&envelope));
        }

        let file_path = envelope
            .result
            .ok_or_else(|| AppError::Relay("response carried no file path".to_string()))?
            .file_path;

        let bytes = self
            .http_client
            .get(self.file_url(&file_path))
            .send()
            .await
            .map_err(|e| AppError::Relay(format!("download failed: {e}")))?
            .error_for_status()
            .map_err(|e| AppError::Relay(format!("download failed: {e}")))?
            .bytes()
            .await
            .map_err(|e| AppError::Relay(format!("download failed: {e}")))?;

        Ok(bytes.to_vec())
    }
}
