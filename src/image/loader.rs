use crate::utils::error::{PredictError, UploadRejected, MAX_UPLOAD_BYTES};
use crate::Result;
use image::{DynamicImage, ImageFormat, ImageReader, Limits};
use std::io::Cursor;

/// 解码允许的最大宽高。压缩率很高的图片可以在 1MB 内声明巨大的像素网格
pub const MAX_IMAGE_DIMENSION: u32 = 8192;

/// 解码阶段的内存分配上限
const MAX_DECODE_ALLOC: u64 = 256 * 1024 * 1024;

pub struct ImageLoader;

impl ImageLoader {
    pub fn is_image_content_type(content_type: &str) -> bool {
        content_type.trim().to_ascii_lowercase().starts_with("image/")
    }

    /// 校验声明的 MIME 类型，必须以 image/ 开头。在解码之前调用。
    pub fn validate_content_type(content_type: &str) -> Result<()> {
        if Self::is_image_content_type(content_type) {
            Ok(())
        } else {
            Err(UploadRejected::WrongType(content_type.to_string()).into())
        }
    }

    /// 检查文件大小
    pub fn validate_size(len: usize) -> Result<()> {
        if len > MAX_UPLOAD_BYTES {
            return Err(UploadRejected::TooLarge { limit: MAX_UPLOAD_BYTES }.into());
        }
        Ok(())
    }

    /// 从字节流解码图像
    pub fn from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(PredictError::InvalidImage("Empty image data".to_string()));
        }

        match Self::detect_format(bytes) {
            Some(format) => tracing::debug!("Decoding {:?} image, {} bytes", format, bytes.len()),
            None => tracing::debug!("Unknown image format, {} bytes", bytes.len()),
        }

        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PredictError::InvalidImage(e.to_string()))?;
        reader.limits(Self::decode_limits());

        reader
            .decode()
            .map_err(|e| PredictError::InvalidImage(e.to_string()))
    }

    fn decode_limits() -> Limits {
        let mut limits = Limits::default();
        limits.max_image_width = Some(MAX_IMAGE_DIMENSION);
        limits.max_image_height = Some(MAX_IMAGE_DIMENSION);
        limits.max_alloc = Some(MAX_DECODE_ALLOC);
        limits
    }

    /// 检测图像格式
    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }
}
