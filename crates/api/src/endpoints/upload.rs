//! Upload submission endpoint.

use axum::{
    extract::{Multipart, State},
    http::HeaderMap,
};
use relaypix_common::{AppError, AppResult};
use relaypix_core::{ExpirePolicy, UploadImageInput};

use crate::endpoints::images::{ImageResponse, client_ip};
use crate::{response::ApiResponse, state::AppState};

/// Accept a multipart upload: `photo`, `expire`, `tags`, `filename`,
/// `folder`, and the optional client-computed `digest`.
pub async fn upload_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<ApiResponse<ImageResponse>> {
    let mut data: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut tags: Vec<String> = Vec::new();
    let mut folder = "/".to_string();
    let mut expire = "forever".to_string();
    let mut digest: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "photo" => {
                if filename.is_none() {
                    filename = field.file_name().map(std::string::ToString::to_string);
                }
                content_type = field.content_type().map(std::string::ToString::to_string);
                data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?
                        .to_vec(),
                );
            }
            "filename" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                if !text.is_empty() {
                    filename = Some(text);
                }
            }
            "tags" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                tags = text
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(std::string::ToString::to_string)
                    .collect();
            }
            "folder" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                if !text.is_empty() {
                    folder = text;
                }
            }
            "expire" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                if !text.is_empty() {
                    expire = text;
                }
            }
            "digest" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                if !text.is_empty() {
                    digest = Some(text);
                }
            }
            _ => {}
        }
    }

    let data = data.ok_or_else(|| AppError::BadRequest("no photo provided".to_string()))?;

    let input = UploadImageInput {
        data,
        filename: filename.unwrap_or_else(|| "unnamed".to_string()),
        content_type: content_type.unwrap_or_else(|| "application/octet-stream".to_string()),
        tags,
        folder,
        expire: ExpirePolicy::parse(&expire)?,
        digest,
        ip: client_ip(&headers),
    };

    let model = state.catalog_service.upload_image(input).await?;
    Ok(ApiResponse::ok(model.into()))
}
