/// Remote collaborators
///
/// The submission pipeline and the listing only ever see two capability
/// sets: a record store (select / insert) and an object store
/// (upload / public URL). Two backends implement them:
/// - `rest.rs` - hosted REST API over reqwest
/// - `local.rs` - SQLite catalog plus an object directory, for offline work

pub mod catalog;
pub mod local;
pub mod query;
pub mod rest;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{BackendKind, Settings};
pub use query::{Embed, Query};

/// Collections the client reads from or writes to
pub mod tables {
    pub const PROJECTS: &str = "projects";
    pub const PROJECT_FILTERS: &str = "project_filters";
    pub const PROJECT_IMAGES: &str = "project_images";
    pub const COURSES: &str = "courses";
    pub const FILTERS: &str = "filters";
    pub const PASSPHRASE: &str = "passphrase";
}

/// Object buckets the client uploads into
pub mod buckets {
    pub const POSTER: &str = "poster";
    pub const PROJECT_IMAGES: &str = "project-images";
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    /// The remote answered with a non-success status; `message` is its own explanation
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Invalid(String),
}

/// Row-oriented store supporting projection, embedding, equality filters and ordering
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn select(&self, query: &Query) -> Result<Vec<Value>, StoreError>;

    /// Insert one or more rows, returning them as stored (including their identity)
    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, StoreError>;
}

/// Blob store addressed by bucket and key
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError>;

    /// Publicly fetchable URL for an uploaded key
    fn public_url(&self, bucket: &str, key: &str) -> String;
}

/// Select rows and decode them into `T`
pub async fn select_as<T: DeserializeOwned>(
    store: &dyn RecordStore,
    query: &Query,
) -> Result<Vec<T>, StoreError> {
    let rows = store.select(query).await?;
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(StoreError::from))
        .collect()
}

/// Download the bytes behind a public object URL (`http(s)://` or `file://`)
pub async fn fetch_public(url: &str) -> Result<Vec<u8>, StoreError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| StoreError::Invalid(format!("{url}: {e}")))?;
    if parsed.scheme() == "file" {
        let path = parsed
            .to_file_path()
            .map_err(|_| StoreError::Invalid(format!("not a local path: {url}")))?;
        return Ok(tokio::fs::read(path).await?);
    }

    let response = reqwest::get(parsed).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(StoreError::Status {
            status: status.as_u16(),
            message: format!("{} fetching {}", status, url),
        });
    }
    Ok(response.bytes().await?.to_vec())
}

/// Handles to both stores, cheap to clone into background tasks
#[derive(Clone)]
pub struct Backend {
    pub records: Arc<dyn RecordStore>,
    pub objects: Arc<dyn ObjectStore>,
}

impl Backend {
    pub fn new(records: Arc<dyn RecordStore>, objects: Arc<dyn ObjectStore>) -> Self {
        Self { records, objects }
    }

    /// Build the backend selected in settings
    pub fn from_settings(settings: &Settings) -> Result<Self, StoreError> {
        match settings.backend.kind {
            BackendKind::Rest => {
                let url = settings
                    .backend
                    .url
                    .as_deref()
                    .ok_or_else(|| StoreError::Invalid("backend.url is not set".into()))?;
                let api_key = settings.backend.api_key.clone().unwrap_or_default();
                let client = Arc::new(rest::RestClient::new(url, api_key)?);
                Ok(Self::new(client.clone(), client))
            }
            BackendKind::Local => {
                let root = &settings.backend.local_root;
                let records = Arc::new(local::LocalRecords::open(&root.join("catalog.db"))?);
                let objects = Arc::new(local::LocalObjects::new(root.join("objects")));
                Ok(Self::new(records, objects))
            }
        }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}
