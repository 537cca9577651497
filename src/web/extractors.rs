use crate::image::ImageLoader;
use crate::predict::RawImage;
use crate::utils::error::{PredictError, UploadRejected};
use crate::web::AppState;
use axum::{
    extract::{multipart::MultipartError, FromRequest, Multipart, Request},
    http::StatusCode,
};

/// 上传表单中图像字段的名称
pub const IMAGE_FIELD: &str = "image";

/// 经过校验的上传图像
pub struct ImageUpload(pub RawImage);

impl FromRequest<AppState> for ImageUpload {
    type Rejection = PredictError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| UploadRejected::Malformed(e.body_text()))?;

        let limit = state.config.server_config.max_upload_size;
        let image = read_image_field(multipart, limit).await?;

        Ok(ImageUpload(image))
    }
}

/// 从 multipart 中取出 `image` 字段
///
/// 类型检查在读取文件内容之前进行；超过上限（无论是字段本身还是整个请求体）
/// 一律归为 `TooLarge`，以便映射为 413。
pub async fn read_image_field(
    mut multipart: Multipart,
    limit: usize,
) -> Result<RawImage, UploadRejected> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_rejection(&e, limit))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            tracing::debug!("Ignoring unknown field: {}", field.name().unwrap_or("unknown"));
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !ImageLoader::is_image_content_type(&content_type) {
            return Err(UploadRejected::WrongType(content_type));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_rejection(&e, limit))?;

        if data.len() > limit {
            return Err(UploadRejected::TooLarge { limit });
        }

        if data.is_empty() {
            return Err(UploadRejected::Missing);
        }

        tracing::debug!("Received file: {} bytes ({})", data.len(), content_type);
        return Ok(RawImage {
            bytes: data,
            content_type,
        });
    }

    Err(UploadRejected::Missing)
}

fn multipart_rejection(error: &MultipartError, limit: usize) -> UploadRejected {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadRejected::TooLarge { limit }
    } else {
        UploadRejected::Malformed(error.body_text())
    }
}
