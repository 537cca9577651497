//! 模型来源解析：本地路径、file://、http(s):// 以及 gs://bucket/object。

use crate::utils::error::PredictError;
use crate::utils::gcp;
use crate::Result;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

const GCS_API_BASE: &str = "https://storage.googleapis.com/storage/v1";

/// 单个模型文件的下载上限
const MAX_DOWNLOAD_SIZE: u64 = 512 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    Path(PathBuf),
    Url(String),
    /// Cloud Storage 对象，用元数据服务器的服务账号令牌下载
    Gcs { bucket: String, object: String },
}

/// 可直接交给推理后端加载的模型
#[derive(Debug, Clone)]
pub enum ModelArtifact {
    File(PathBuf),
    Bytes { origin: String, data: Vec<u8> },
}

impl ModelArtifact {
    pub fn origin(&self) -> String {
        match self {
            ModelArtifact::File(path) => path.display().to_string(),
            ModelArtifact::Bytes { origin, .. } => origin.clone(),
        }
    }
}

impl ModelSource {
    pub fn parse(locator: &str) -> Result<Self> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(PredictError::ModelLoad("Model source is empty".to_string()));
        }

        if let Some(path) = locator.strip_prefix("file://") {
            return Ok(ModelSource::Path(PathBuf::from(path)));
        }

        if locator.starts_with("http://") || locator.starts_with("https://") {
            return Ok(ModelSource::Url(locator.to_string()));
        }

        if let Some(rest) = locator.strip_prefix("gs://") {
            return match rest.split_once('/') {
                Some((bucket, object)) if !bucket.is_empty() && !object.is_empty() => {
                    Ok(ModelSource::Gcs {
                        bucket: bucket.to_string(),
                        object: object.to_string(),
                    })
                }
                _ => Err(PredictError::ModelLoad(format!(
                    "Invalid gs:// locator, expected gs://bucket/object: {}",
                    locator
                ))),
            };
        }

        if locator.contains("://") {
            return Err(PredictError::ModelLoad(format!(
                "Unsupported model source scheme: {}",
                locator
            )));
        }

        Ok(ModelSource::Path(PathBuf::from(locator)))
    }

    pub async fn resolve(&self) -> Result<ModelArtifact> {
        match self {
            ModelSource::Path(path) => {
                let metadata = tokio::fs::metadata(path).await.map_err(|e| {
                    PredictError::ModelLoad(format!("Model not found: {} ({})", path.display(), e))
                })?;
                if !metadata.is_file() {
                    return Err(PredictError::ModelLoad(format!(
                        "Model path is not a file: {}",
                        path.display()
                    )));
                }
                Ok(ModelArtifact::File(path.clone()))
            }
            ModelSource::Url(url) => {
                let client = http_client()?;
                let data = download(&client, url, None).await?;
                Ok(ModelArtifact::Bytes {
                    origin: url.clone(),
                    data,
                })
            }
            ModelSource::Gcs { bucket, object } => {
                let client = http_client()?;
                let url = gcs_media_url(GCS_API_BASE, bucket, object)?;

                // 不在 GCP 上运行时退回匿名下载，只能读取公开对象
                let token = match gcp::fetch_metadata_token(&client).await {
                    Ok(token) => Some(token.access_token),
                    Err(e) => {
                        tracing::warn!("No service account token ({:#}); downloading anonymously", e);
                        None
                    }
                };

                let data = download(&client, &url, token.as_deref()).await?;
                Ok(ModelArtifact::Bytes {
                    origin: self.to_string(),
                    data,
                })
            }
        }
    }
}

/// JSON API 的对象下载地址，对象名整体作为一个路径段编码
fn gcs_media_url(base: &str, bucket: &str, object: &str) -> Result<String> {
    let mut url = reqwest::Url::parse(base)
        .map_err(|e| PredictError::ModelLoad(format!("Invalid storage endpoint {}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| PredictError::ModelLoad(format!("Invalid storage endpoint {}", base)))?
        .pop_if_empty()
        .extend(["b", bucket, "o", object]);
    url.query_pairs_mut().append_pair("alt", "media");
    Ok(url.to_string())
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .map_err(|e| PredictError::ModelLoad(format!("Failed to build HTTP client: {}", e)))
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Path(path) => write!(f, "{}", path.display()),
            ModelSource::Url(url) => write!(f, "{}", url),
            ModelSource::Gcs { bucket, object } => write!(f, "gs://{}/{}", bucket, object),
        }
    }
}

async fn download(client: &reqwest::Client, url: &str, bearer: Option<&str>) -> Result<Vec<u8>> {
    tracing::info!("Downloading model from {}", url);

    let mut request = client.get(url);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .map_err(|e| PredictError::ModelLoad(format!("Model download failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(PredictError::ModelLoad(format!(
            "Model download failed: HTTP {}",
            response.status()
        )));
    }

    if let Some(len) = response.content_length() {
        if len > MAX_DOWNLOAD_SIZE {
            return Err(PredictError::ModelLoad(format!(
                "Model too large: {} bytes, max allowed: {} bytes",
                len, MAX_DOWNLOAD_SIZE
            )));
        }
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PredictError::ModelLoad(format!("Failed to read model body: {}", e)))?;

    tracing::info!("Downloaded model: {} bytes", bytes.len());
    Ok(bytes.to_vec())
}
