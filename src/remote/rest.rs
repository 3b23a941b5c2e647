/// REST backend
///
/// Records live under `{base}/rest/v1/{table}` and are queried with
/// `select=`, `{column}=eq.{value}`, `order=` and `limit=` parameters.
/// Objects live under `{base}/storage/v1/object/{bucket}/{key}` and are
/// served publicly from `{base}/storage/v1/object/public/{bucket}/{key}`.

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde_json::Value;
use tracing::debug;

use super::query::{filter_literal, Query};
use super::{ObjectStore, RecordStore, StoreError};

#[derive(Clone)]
pub struct RestClient {
    http_client: Client,
    base_url: Url,
    api_key: String,
}

impl RestClient {
    pub fn new(base_url: &str, api_key: String) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| StoreError::Invalid(format!("invalid backend url {base_url}: {e}")))?;
        Ok(Self {
            http_client: Client::new(),
            base_url,
            api_key,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    /// URL (with query string) for a select
    pub fn select_url(&self, query: &Query) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.endpoint(&format!("rest/v1/{}", query.table)))
            .map_err(|e| StoreError::Invalid(e.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", &query.select_param());
            for (column, value) in &query.filters {
                pairs.append_pair(column, &format!("eq.{}", filter_literal(value)));
            }
            if let Some(order) = query.order_param() {
                pairs.append_pair("order", &order);
            }
            if let Some(limit) = query.limit {
                pairs.append_pair("limit", &limit.to_string());
            }
        }
        Ok(url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

/// Turn a non-success response into a `StoreError::Status` carrying the remote's message
async fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                body
            }
        });

    Err(StoreError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl RecordStore for RestClient {
    async fn select(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
        let url = self.select_url(query)?;
        debug!("GET {}", url);

        let response = self.authorized(self.http_client.get(url)).send().await?;
        let rows: Vec<Value> = check_status(response).await?.json().await?;
        Ok(rows)
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, StoreError> {
        let url = self.endpoint(&format!("rest/v1/{table}"));
        debug!("POST {} ({} rows)", url, rows.len());

        let response = self
            .authorized(self.http_client.post(url))
            .header("Prefer", "return=representation")
            .json(&rows)
            .send()
            .await?;
        let inserted: Vec<Value> = check_status(response).await?.json().await?;
        Ok(inserted)
    }
}

#[async_trait]
impl ObjectStore for RestClient {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let url = self.endpoint(&format!("storage/v1/object/{bucket}/{key}"));
        debug!("POST {} ({} bytes, {})", url, bytes.len(), content_type);

        let response = self
            .authorized(self.http_client.post(url))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        self.endpoint(&format!("storage/v1/object/public/{bucket}/{key}"))
    }
}
