use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response, StatusCode},
    Router,
};
use cancer_predict::{
    config::Config,
    image::InputTensor,
    models::{Model, ModelProvider},
    predict::PredictionRecord,
    storage::{MemoryStore, PredictionStore},
    web::{create_app, AppState},
    Result,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const BOUNDARY: &str = "----cancer-predict-test-boundary";

const TOO_LARGE_MESSAGE: &str = "Payload content length greater than maximum allowed: 1000000";

struct FixedModel {
    probability: f32,
    calls: AtomicUsize,
}

impl FixedModel {
    fn new(probability: f32) -> Arc<Self> {
        Arc::new(Self {
            probability,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Model for FixedModel {
    fn predict(&self, _input: &InputTensor) -> Result<f32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.probability)
    }
}

struct BrokenStore;

#[async_trait]
impl PredictionStore for BrokenStore {
    async fn set(&self, _: &str, _: &str, _: &PredictionRecord) -> anyhow::Result<()> {
        anyhow::bail!("firestore unavailable")
    }

    async fn get_all(&self, _: &str) -> anyhow::Result<Vec<(String, PredictionRecord)>> {
        anyhow::bail!("firestore unavailable")
    }

    fn backend(&self) -> &'static str {
        "broken"
    }
}

struct StalledStore;

#[async_trait]
impl PredictionStore for StalledStore {
    async fn set(&self, _: &str, _: &str, _: &PredictionRecord) -> anyhow::Result<()> {
        std::future::pending().await
    }

    async fn get_all(&self, _: &str) -> anyhow::Result<Vec<(String, PredictionRecord)>> {
        std::future::pending().await
    }

    fn backend(&self) -> &'static str {
        "stalled"
    }
}

fn app(model: Option<Arc<dyn Model>>, store: Arc<dyn PredictionStore>) -> Router {
    let config = Config::new("127.0.0.1:0".to_string(), None, Some(1), false).unwrap();
    let provider = match model {
        Some(model) => ModelProvider::with_model(model),
        None => ModelProvider::new(),
    };
    create_app(AppState::new(config, Arc::new(provider), store))
}

fn png_bytes() -> Vec<u8> {
    let image = RgbImage::from_fn(120, 80, |x, y| Rgb([x as u8, y as u8, 128]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn multipart_body(field: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 256);
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"upload\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn predict_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn valid_image_returns_201_with_verdict() {
    let model = FixedModel::new(0.87);
    let store = Arc::new(MemoryStore::new());
    let app = app(Some(model.clone()), store.clone());

    let response = app
        .oneshot(predict_request(multipart_body("image", "image/png", &png_bytes())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;

    assert_eq!(json["status"], "success");
    assert_eq!(json["message"], "Model is predicted successfully");
    assert_eq!(json["data"]["result"], "Cancer");
    assert_eq!(json["data"]["suggestion"], "Segera periksa ke dokter!");
    assert!(json["data"]["createdAt"].as_str().unwrap().ends_with('Z'));

    let id = json["data"]["id"].as_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
    assert_eq!(model.calls(), 1);

    let saved = store.get("predictions", id).unwrap();
    assert_eq!(saved.result, "Cancer");
    assert_eq!(saved.created_at, json["data"]["createdAt"].as_str().unwrap());
}

#[tokio::test]
async fn low_probability_is_non_cancer() {
    let app = app(Some(FixedModel::new(0.5)), Arc::new(MemoryStore::new()));

    let response = app
        .oneshot(predict_request(multipart_body("image", "image/jpeg", &png_bytes())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    assert_eq!(json["data"]["result"], "Non-cancer");
    assert_eq!(json["data"]["suggestion"], "Tetap jaga kesehatan!");
}

#[tokio::test]
async fn non_image_mime_is_rejected_regardless_of_content() {
    let model = FixedModel::new(0.9);
    let app = app(Some(model.clone()), Arc::new(MemoryStore::new()));

    for content_type in ["text/plain", "application/octet-stream", "application/pdf"] {
        let response = app
            .clone()
            .oneshot(predict_request(multipart_body("image", content_type, &png_bytes())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", content_type);
        assert_eq!(json_body(response).await["status"], "fail");
    }

    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn upload_just_over_ceiling_is_413() {
    let app = app(Some(FixedModel::new(0.9)), Arc::new(MemoryStore::new()));
    let data = vec![0xAB; 1_000_001];

    let response = app
        .oneshot(predict_request(multipart_body("image", "image/png", &data)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = json_body(response).await;
    assert_eq!(json["status"], "fail");
    assert_eq!(json["message"], TOO_LARGE_MESSAGE);
}

#[tokio::test]
async fn upload_beyond_body_limit_is_413() {
    let app = app(Some(FixedModel::new(0.9)), Arc::new(MemoryStore::new()));
    let data = vec![0xAB; 2_500_000];

    let response = app
        .oneshot(predict_request(multipart_body("image", "image/png", &data)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_body(response).await["message"], TOO_LARGE_MESSAGE);
}

#[tokio::test]
async fn upload_at_ceiling_is_not_a_size_error() {
    let app = app(Some(FixedModel::new(0.9)), Arc::new(MemoryStore::new()));
    let data = vec![0xAB; 1_000_000];

    let response = app
        .oneshot(predict_request(multipart_body("image", "image/png", &data)))
        .await
        .unwrap();

    // 大小合法，但内容无法解码
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["message"],
        "Terjadi kesalahan dalam melakukan prediksi"
    );
}

#[tokio::test]
async fn missing_image_field_is_400() {
    let app = app(Some(FixedModel::new(0.9)), Arc::new(MemoryStore::new()));

    let response = app
        .oneshot(predict_request(multipart_body("file", "image/png", &png_bytes())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["status"], "fail");
}

#[tokio::test]
async fn non_multipart_request_is_400() {
    let app = app(Some(FixedModel::new(0.9)), Arc::new(MemoryStore::new()));

    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["status"], "fail");
}

#[tokio::test]
async fn model_not_ready_is_400_without_side_effects() {
    let store = Arc::new(MemoryStore::new());
    let app = app(None, store.clone());

    let response = app
        .oneshot(predict_request(multipart_body("image", "image/png", &png_bytes())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["status"], "fail");
    assert_eq!(json["message"], "Terjadi kesalahan dalam melakukan prediksi");
    assert!(store.is_empty("predictions"));
}

#[tokio::test]
async fn corrupt_image_is_400_with_generic_message() {
    let model = FixedModel::new(0.9);
    let app = app(Some(model.clone()), Arc::new(MemoryStore::new()));

    let response = app
        .oneshot(predict_request(multipart_body("image", "image/png", b"\x89PNG\r\n\x1a\nnope")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let message = json_body(response).await["message"].as_str().unwrap().to_string();
    assert_eq!(message, "Terjadi kesalahan dalam melakukan prediksi");
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn store_outage_does_not_change_response() {
    let app = app(Some(FixedModel::new(0.2)), Arc::new(BrokenStore));

    let response = app
        .oneshot(predict_request(multipart_body("image", "image/png", &png_bytes())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    assert_eq!(json["status"], "success");
    assert_eq!(json["data"]["result"], "Non-cancer");
}

#[tokio::test]
async fn histories_list_persisted_predictions() {
    let app = app(Some(FixedModel::new(0.7)), Arc::new(MemoryStore::new()));

    let mut ids = Vec::new();
    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(predict_request(multipart_body("image", "image/png", &png_bytes())))
            .await
            .unwrap();
        ids.push(json_body(response).await["data"]["id"].as_str().unwrap().to_string());
    }

    let response = app.oneshot(get_request("/predict/histories")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "success");

    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    for entry in data {
        let id = entry["id"].as_str().unwrap();
        assert!(ids.iter().any(|known| known == id));
        assert_eq!(entry["history"]["id"], id);
        assert_eq!(entry["history"]["result"], "Cancer");
    }
}

#[tokio::test]
async fn histories_store_error_is_500() {
    let app = app(Some(FixedModel::new(0.7)), Arc::new(BrokenStore));

    let response = app.oneshot(get_request("/predict/histories")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["status"], "fail");
    assert!(!json["message"].as_str().unwrap().contains("firestore unavailable"));
}

#[tokio::test]
async fn liveness_responds_even_without_model() {
    let app = app(None, Arc::new(MemoryStore::new()));

    let response = app.oneshot(get_request("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(!body.is_empty());
}

#[tokio::test]
async fn health_reports_model_readiness() {
    let not_ready = app(None, Arc::new(MemoryStore::new()));
    let json = json_body(not_ready.oneshot(get_request("/health")).await.unwrap()).await;
    assert_eq!(json["model_ready"], false);
    assert_eq!(json["status"], "degraded");

    let ready = app(Some(FixedModel::new(0.1)), Arc::new(MemoryStore::new()));
    let json = json_body(ready.oneshot(get_request("/health")).await.unwrap()).await;
    assert_eq!(json["model_ready"], true);
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn request_timeout_answers_with_fail_envelope() {
    let mut config = Config::new("127.0.0.1:0".to_string(), None, Some(1), false).unwrap();
    config.server_config.request_timeout = 1;
    config.store_config.write_timeout = Duration::from_secs(10);
    let provider = ModelProvider::with_model(FixedModel::new(0.9));
    let app = create_app(AppState::new(config, Arc::new(provider), Arc::new(StalledStore)));

    let response = app
        .oneshot(predict_request(multipart_body("image", "image/png", &png_bytes())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    let json = json_body(response).await;
    assert_eq!(json["status"], "fail");
    assert_eq!(json["message"], "Terjadi kesalahan dalam melakukan prediksi");
}
