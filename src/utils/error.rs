use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// 上传上限（字节）
pub const MAX_UPLOAD_BYTES: usize = 1_000_000;

/// 通用的预测失败提示，不向客户端暴露内部细节
pub const PREDICTION_FAILED_MESSAGE: &str = "Terjadi kesalahan dalam melakukan prediksi";

pub const HISTORY_FAILED_MESSAGE: &str = "Error fetching prediction histories";

/// 上传校验失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadRejected {
    #[error("Payload content length greater than maximum allowed: {limit}")]
    TooLarge { limit: usize },

    #[error("File must be an image (got {0})")]
    WrongType(String),

    #[error("No image file provided")]
    Missing,

    #[error("Malformed upload: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum PredictError {
    #[error(transparent)]
    Upload(#[from] UploadRejected),

    #[error("Model is not loaded")]
    ModelNotReady,

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl PredictError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PredictError::Upload(UploadRejected::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            PredictError::Upload(_) => StatusCode::BAD_REQUEST,
            PredictError::ModelNotReady
            | PredictError::InvalidImage(_)
            | PredictError::Inference(_) => StatusCode::BAD_REQUEST,
            PredictError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            PredictError::Persistence(_)
            | PredictError::ModelLoad(_)
            | PredictError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            // 未分类错误统一按 400 处理
            PredictError::Io(_) | PredictError::Internal(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            PredictError::Upload(UploadRejected::TooLarge { .. }) => "UPLOAD_TOO_LARGE",
            PredictError::Upload(UploadRejected::WrongType(_)) => "UPLOAD_WRONG_TYPE",
            PredictError::Upload(UploadRejected::Missing) => "UPLOAD_MISSING",
            PredictError::Upload(UploadRejected::Malformed(_)) => "UPLOAD_MALFORMED",
            PredictError::ModelNotReady => "MODEL_NOT_READY",
            PredictError::InvalidImage(_) => "INVALID_IMAGE",
            PredictError::Inference(_) => "INFERENCE_ERROR",
            PredictError::Timeout(_) => "REQUEST_TIMEOUT",
            PredictError::Persistence(_) => "PERSISTENCE_ERROR",
            PredictError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            PredictError::Config(_) => "CONFIG_ERROR",
            PredictError::Io(_) => "IO_ERROR",
            PredictError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 返回给客户端的消息。只有上传校验类错误带具体原因，其余一律使用固定文案。
    pub fn client_message(&self) -> String {
        match self {
            PredictError::Upload(UploadRejected::TooLarge { limit }) => {
                format!("Payload content length greater than maximum allowed: {}", limit)
            }
            PredictError::Upload(UploadRejected::WrongType(_)) => "File must be an image".to_string(),
            PredictError::Upload(UploadRejected::Missing) => "Image file is required".to_string(),
            PredictError::Persistence(_) => HISTORY_FAILED_MESSAGE.to_string(),
            _ => PREDICTION_FAILED_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "status": "fail",
            "message": self.client_message(),
        });

        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "Request failed: {} ({})", self, status);
        } else {
            tracing::warn!(code = self.error_code(), "Request rejected: {} ({})", self, status);
        }

        (status, axum::Json(body)).into_response()
    }
}
