pub mod extractors;
pub mod handlers;
pub mod middleware;

use crate::models::{ModelProvider, ModelSource};
use crate::predict::InferenceEngine;
use crate::storage::{self, PredictionStore, ResultPersister};
use crate::utils::error::PredictError;
use crate::{Config, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

/// 各请求共享的状态
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: InferenceEngine,
    pub persister: ResultPersister,
}

impl AppState {
    pub fn new(
        config: Config,
        provider: Arc<ModelProvider>,
        store: Arc<dyn PredictionStore>,
    ) -> Self {
        let engine = InferenceEngine::new(provider, config.server_config.inference_timeout);
        let persister = ResultPersister::new(
            store,
            config.store_config.collection.clone(),
            config.store_config.write_timeout,
        );

        Self {
            config: Arc::new(config),
            engine,
            persister,
        }
    }
}

pub async fn serve(config: Config) -> Result<()> {
    // 凭据或存储配置有误时直接启动失败
    let store = storage::connect(&config.store_config).await?;

    // 模型在后台加载，不阻塞端口监听
    let provider = Arc::new(ModelProvider::new());
    match config.model_source.as_deref() {
        Some(locator) => match ModelSource::parse(locator) {
            Ok(source) => {
                provider.spawn_load(source, config.onnx_config.clone());
            }
            Err(e) => tracing::error!("Invalid model source: {}; inference stays unavailable", e),
        },
        None => tracing::warn!("No model source configured; inference stays unavailable"),
    }

    let addr: SocketAddr = config.bind_addr.parse().map_err(|e| {
        PredictError::Config(format!("Invalid bind address {}: {}", config.bind_addr, e))
    })?;

    let app = create_app(AppState::new(config, provider, store));

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST /predict           - Multipart image upload (field 'image')");
    tracing::info!("  GET  /predict/histories - Stored predictions");
    tracing::info!("  GET  /                  - Liveness");
    tracing::info!("  GET  /health            - Health check");

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        PredictError::Internal(format!("Failed to bind to address {}: {}", addr, e))
    })?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| PredictError::Internal(format!("Server failed: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

pub fn create_app(state: AppState) -> Router {
    let server_config = &state.config.server_config;
    let body_limit = server_config.body_limit();
    let request_timeout = Duration::from_secs(server_config.request_timeout);

    Router::new()
        .route("/predict", post(handlers::predict_handler))
        .route("/predict/histories", get(handlers::histories_handler))
        .route("/", get(handlers::index_handler))
        .route("/health", get(handlers::health_handler))
        // 超限请求由 Multipart 读取时报错，再映射为 413 JSON
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn_with_state(
            request_timeout,
            middleware::request_timeout,
        ))
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        // 无法监听信号时保持运行
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
