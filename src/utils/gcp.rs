//! GCE / Cloud Run 元数据服务器上的默认服务账号令牌。

use anyhow::Context;
use serde::Deserialize;

pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

#[derive(Debug, Deserialize)]
pub struct MetadataToken {
    pub access_token: String,
    /// 剩余有效期（秒）
    pub expires_in: u64,
}

pub async fn fetch_metadata_token(client: &reqwest::Client) -> anyhow::Result<MetadataToken> {
    let response = client
        .get(METADATA_TOKEN_URL)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .context("Metadata server unreachable")?
        .error_for_status()
        .context("Metadata server rejected token request")?;

    response.json().await.context("Malformed metadata token")
}
