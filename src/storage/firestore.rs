//! Firestore REST 存储。
//!
//! 写入用 `PATCH documents/{collection}/{id}`（不存在则创建，存在则整体覆盖），
//! 读取用 `GET documents/{collection}` 并跟随 `nextPageToken` 翻页。

use crate::predict::PredictionRecord;
use crate::storage::PredictionStore;
use crate::utils::gcp;
use anyhow::{bail, Context};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";

const PAGE_SIZE: u32 = 300;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// 令牌过期前提前刷新的余量
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

enum TokenSource {
    Static(String),
    Metadata { cached: Mutex<Option<CachedToken>> },
}

#[derive(Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    fields: HashMap<String, FieldValue>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    string_value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

pub struct FirestoreStore {
    client: reqwest::Client,
    documents_url: String,
    tokens: TokenSource,
}

impl FirestoreStore {
    /// 创建客户端并立即取一次令牌，凭据不可用时启动失败
    pub async fn connect(
        project: String,
        database: String,
        token: Option<String>,
    ) -> anyhow::Result<Self> {
        let store = Self::with_base_url(FIRESTORE_BASE_URL, &project, &database, token)?;
        store
            .access_token()
            .await
            .context("Failed to obtain Firestore access token")?;

        tracing::info!("Connected to Firestore project '{}' database '{}'", project, database);
        Ok(store)
    }

    pub fn with_base_url(
        base_url: &str,
        project: &str,
        database: &str,
        token: Option<String>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        let tokens = match token {
            Some(token) => TokenSource::Static(token),
            None => TokenSource::Metadata {
                cached: Mutex::new(None),
            },
        };

        Ok(Self {
            client,
            documents_url: format!(
                "{}/projects/{}/databases/{}/documents",
                base_url.trim_end_matches('/'),
                project,
                database
            ),
            tokens,
        })
    }

    async fn access_token(&self) -> anyhow::Result<String> {
        let cached = match &self.tokens {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Metadata { cached } => cached,
        };

        let current = cached.lock().clone();
        if let Some(token) = current {
            if token.expires_at > Instant::now() {
                return Ok(token.value);
            }
        }

        let token = gcp::fetch_metadata_token(&self.client).await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);

        *cached.lock() = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }
}

#[async_trait]
impl PredictionStore for FirestoreStore {
    async fn set(&self, collection: &str, id: &str, record: &PredictionRecord) -> anyhow::Result<()> {
        let token = self.access_token().await?;
        let url = format!("{}/{}/{}", self.documents_url, collection, id);

        let response = self
            .client
            .patch(&url)
            .bearer_auth(token)
            .json(&encode_record(record))
            .send()
            .await
            .with_context(|| format!("Firestore write to {}/{} failed", collection, id))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Firestore write returned HTTP {}: {}", status, body);
        }

        Ok(())
    }

    async fn get_all(&self, collection: &str) -> anyhow::Result<Vec<(String, PredictionRecord)>> {
        let token = self.access_token().await?;
        let url = format!("{}/{}", self.documents_url, collection);

        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .bearer_auth(&token)
                .query(&[("pageSize", PAGE_SIZE.to_string())]);
            if let Some(ref page) = page_token {
                request = request.query(&[("pageToken", page)]);
            }

            let response = request
                .send()
                .await
                .with_context(|| format!("Firestore list of {} failed", collection))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                bail!("Firestore list returned HTTP {}: {}", status, body);
            }

            let page: ListDocumentsResponse =
                response.json().await.context("Malformed Firestore list response")?;

            for document in page.documents {
                records.push(decode_document(document)?);
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(records)
    }

    fn backend(&self) -> &'static str {
        "firestore"
    }
}

fn string_field(value: &str) -> FieldValue {
    FieldValue {
        string_value: Some(value.to_string()),
    }
}

fn encode_record(record: &PredictionRecord) -> Document {
    let fields = HashMap::from([
        ("id".to_string(), string_field(&record.id)),
        ("result".to_string(), string_field(&record.result)),
        ("suggestion".to_string(), string_field(&record.suggestion)),
        ("createdAt".to_string(), string_field(&record.created_at)),
    ]);

    Document { name: None, fields }
}

fn decode_document(mut document: Document) -> anyhow::Result<(String, PredictionRecord)> {
    let id = document
        .name
        .as_deref()
        .and_then(|name| name.rsplit('/').next())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .context("Firestore document without a name")?;

    let mut take = |key: &str| {
        document
            .fields
            .remove(key)
            .and_then(|v| v.string_value)
            .unwrap_or_default()
    };

    let record = PredictionRecord {
        id: take("id"),
        result: take("result"),
        suggestion: take("suggestion"),
        created_at: take("createdAt"),
    };

    Ok((id, record))
}
