use crate::predict::{HistoryEntry, Verdict};
use crate::web::{extractors::ImageUpload, AppState};
use crate::Result;
use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;
use serde_json::json;
use std::time::Instant;

pub const PREDICT_SUCCESS_MESSAGE: &str = "Model is predicted successfully";

/// 成功响应格式，失败响应由 `PredictError` 生成
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            message: None,
            data,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success",
            message: Some(message.into()),
            data,
        }
    }
}

/// 存活探针
pub async fn index_handler() -> &'static str {
    "Cancer prediction service is running"
}

/// 图像上传预测
pub async fn predict_handler(
    State(state): State<AppState>,
    ImageUpload(image): ImageUpload,
) -> Result<(StatusCode, Json<ApiResponse<Verdict>>)> {
    let start_time = Instant::now();

    tracing::info!(
        "Processing prediction request: bytes={}, content_type={}",
        image.bytes.len(),
        image.content_type
    );

    let verdict = state.engine.classify(image).await?;

    // 存储失败不改变已经得到的结果
    let persisted = state.persister.persist_best_effort(&verdict).await;

    tracing::info!(
        "Prediction completed: id={}, result={}, persisted={}, time={:.3}s",
        verdict.id,
        verdict.result.as_str(),
        persisted,
        start_time.elapsed().as_secs_f32()
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(PREDICT_SUCCESS_MESSAGE, verdict)),
    ))
}

/// 预测历史
pub async fn histories_handler(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<HistoryEntry>>>> {
    let entries = state.persister.list_all().await?;
    tracing::debug!("Fetched {} prediction histories", entries.len());

    Ok(Json(ApiResponse::success(entries)))
}

/// 健康检查端点
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let model_ready = state.engine.provider().is_ready();

    Json(json!({
        "status": if model_ready { "healthy" } else { "degraded" },
        "model_ready": model_ready,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
