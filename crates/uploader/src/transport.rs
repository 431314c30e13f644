//! Upload transport.
//!
//! Sends one file plus its metadata as a multipart request and interprets
//! the response, driving a bounded retry loop for rate-limit conditions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relaypix_common::{AppError, AppResult};
use relaypix_core::parse_retry_after;
use serde::Deserialize;

/// Default bound on total attempts per task.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Everything one upload request carries.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    /// Image bytes (possibly compressed).
    pub data: Vec<u8>,
    /// Declared file name.
    pub filename: String,
    /// MIME type.
    pub content_type: String,
    /// Tag list, comma-joined on the wire.
    pub tags: Vec<String>,
    /// Target folder path.
    pub folder: String,
    /// Expiry policy wire value.
    pub expire: String,
    /// Content digest computed by the pipeline.
    pub digest: String,
}

/// Server acknowledgement for a stored upload.
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    /// Short code assigned by the server.
    pub short_code: Option<String>,
}

/// Seam between the queue and the network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Upload one payload. Implementations own their retry policy; a
    /// returned error is terminal for the task.
    async fn send(&self, payload: &UploadPayload) -> AppResult<UploadReceipt>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    status: String,
    data: Option<WireData>,
    message: Option<String>,
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireData {
    short_code: Option<String>,
}

/// Interpret one upload response body.
///
/// The structured `retryAfter` field wins; scraping "retry after N" out of
/// the message only remains for older server builds.
fn interpret_response(body: &str) -> AppResult<UploadReceipt> {
    let wire: WireResponse = serde_json::from_str(body)
        .map_err(|e| AppError::Relay(format!("malformed response: {e}")))?;

    if wire.status == "success" {
        return Ok(UploadReceipt {
            short_code: wire.data.and_then(|d| d.short_code),
        });
    }

    let message = wire
        .message
        .unwrap_or_else(|| "upload rejected".to_string());
    match wire.retry_after.or_else(|| parse_retry_after(&message)) {
        Some(retry_after) => Err(AppError::RateLimited { retry_after }),
        None => Err(AppError::Relay(message)),
    }
}

/// HTTP transport posting to the upload submission endpoint.
pub struct HttpTransport {
    http_client: reqwest::Client,
    base_url: String,
    max_attempts: u32,
    refresh_hook: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl HttpTransport {
    /// Create a transport for the given server base URL.
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            refresh_hook: None,
        }
    }

    /// Override the attempt bound.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Hook invoked after every successful upload (statistics refresh).
    #[must_use]
    pub fn with_refresh_hook(mut self, hook: Arc<dyn Fn() + Send + Sync>) -> Self {
        self.refresh_hook = Some(hook);
        self
    }

    async fn send_once(&self, payload: &UploadPayload) -> AppResult<UploadReceipt> {
        let part = reqwest::multipart::Part::bytes(payload.data.clone())
            .file_name(payload.filename.clone())
            .mime_str(&payload.content_type)
            .map_err(|e| AppError::BadRequest(format!("invalid content type: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .part("photo", part)
            .text("expire", payload.expire.clone())
            .text("tags", payload.tags.join(","))
            .text("filename", payload.filename.clone())
            .text("folder", payload.folder.clone())
            .text("digest", payload.digest.clone());

        let response = self
            .http_client
            .post(format!(
                "{}/api/upload",
                self.base_url.trim_end_matches('/')
            ))
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Relay(format!("request failed: {e}")))?;

        let body = response
            .text()
            .await
            .map_err(|e| AppError::Relay(format!("unreadable response: {e}")))?;

        interpret_response(&body)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, payload: &UploadPayload) -> AppResult<UploadReceipt> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send_once(payload).await {
                Ok(receipt) => {
                    if let Some(ref hook) = self.refresh_hook {
                        hook();
                    }
                    return Ok(receipt);
                }
                Err(AppError::RateLimited { retry_after }) if attempt < self.max_attempts => {
                    tracing::debug!(
                        attempt,
                        retry_after,
                        filename = %payload.filename,
                        "Rate limited, waiting before retry"
                    );
                    tokio::time::sleep(Duration::from_secs(retry_after)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_interpret_success_with_short_code() {
        let receipt =
            interpret_response(r#"{"status":"success","data":{"shortCode":"ab12cd34"}}"#).unwrap();
        assert_eq!(receipt.short_code.as_deref(), Some("ab12cd34"));
    }

    #[test]
    fn test_interpret_structured_rate_limit() {
        let err = interpret_response(
            r#"{"status":"error","message":"retry after 40","retryAfter":40}"#,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::RateLimited { retry_after: 40 }));
    }

    #[test]
    fn test_interpret_text_rate_limit_fallback() {
        let err = interpret_response(
            r#"{"status":"error","message":"Too Many Requests: retry after 9"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::RateLimited { retry_after: 9 }));
    }

    #[test]
    fn test_interpret_plain_error_is_terminal() {
        let err =
            interpret_response(r#"{"status":"error","message":"image payload is empty"}"#)
                .unwrap_err();
        assert!(matches!(err, AppError::Relay(_)));
    }

    #[test]
    fn test_interpret_garbage_is_an_error() {
        assert!(interpret_response("<html>502</html>").is_err());
    }
}
