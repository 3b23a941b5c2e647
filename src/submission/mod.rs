/// Project submission
///
/// Runs the remote calls of a submission in a fixed order, each one
/// starting only after the previous succeeded:
/// 1. Authorize - the passphrase must match an active shared secret
/// 2. Upload poster (if any)
/// 3. Insert the project row (never visible until approved)
/// 4. Link selected filters (if any)
/// 5. Upload images, then insert all image records in one batch
///
/// There is no rollback. A failure leaves earlier stages in place: an
/// uploaded poster without a project, a project without its filters, or
/// uploaded images without records. Nothing is retried automatically.

pub mod keys;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Limits;
use crate::remote::{buckets, catalog, tables, Backend, StoreError};
use crate::state::data::{InsertedId, NewProject, NewProjectFilter, NewProjectImage};
use crate::state::form::UploadFormData;
use crate::state::images::StagedFile;
use crate::state::validate::parse_year;

/// Error category shown alongside the message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authorization,
    Upload,
    Insert,
    Link,
}

impl ErrorKind {
    /// Follow-up line shown under a failed submission
    pub fn hint(&self) -> &'static str {
        match self {
            ErrorKind::Authorization => "Ask your instructor for the current passphrase.",
            ErrorKind::Upload | ErrorKind::Insert | ErrorKind::Link => {
                "Nothing was retried. Press Submit to try again."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("Invalid passphrase")]
    InvalidPassphrase,

    #[error("Failed to verify passphrase: {0}")]
    PassphraseLookupFailed(String),

    #[error("Failed to upload poster: {0}")]
    PosterUploadFailed(String),

    #[error("Failed to submit project: {0}")]
    ProjectInsertFailed(String),

    #[error("Failed to link filters: {0}")]
    FilterLinkFailed(String),

    #[error("Failed to upload image: {0}")]
    ImageUploadFailed(String),

    #[error("Failed to save image records: {0}")]
    ImageRecordsFailed(String),
}

impl SubmitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SubmitError::InvalidPassphrase | SubmitError::PassphraseLookupFailed(_) => {
                ErrorKind::Authorization
            }
            SubmitError::PosterUploadFailed(_) | SubmitError::ImageUploadFailed(_) => ErrorKind::Upload,
            SubmitError::ProjectInsertFailed(_) | SubmitError::ImageRecordsFailed(_) => ErrorKind::Insert,
            SubmitError::FilterLinkFailed(_) => ErrorKind::Link,
        }
    }
}

/// Owned copy of everything a submission needs, taken when it starts
///
/// The pipeline never looks at live form state, so edits or a closed
/// wizard cannot affect a submission already in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionSnapshot {
    pub title: String,
    pub description: String,
    pub year: i32,
    pub video_url: Option<String>,
    pub student_creators: Option<String>,
    pub course_id: String,
    pub selected_filters: Vec<String>,
    pub poster: Option<StagedFile>,
    pub images: Vec<StagedFile>,
    pub primary_index: usize,
    pub student_name: String,
    pub student_email: String,
    pub student_number: String,
    pub passphrase: String,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl SubmissionSnapshot {
    /// Trimmed copy of the form; `None` if the year does not parse
    pub fn capture(form: &UploadFormData, limits: &Limits) -> Option<Self> {
        Some(Self {
            title: form.title.trim().to_string(),
            description: form.description.trim().to_string(),
            year: parse_year(&form.year, limits)?,
            video_url: non_empty(&form.video_url),
            student_creators: non_empty(&form.student_creators),
            course_id: form.course_id.clone(),
            selected_filters: form.selected_filters.iter().cloned().collect(),
            poster: form.poster.clone(),
            images: form.images.files(),
            primary_index: form.images.primary_index(),
            student_name: form.student_name.trim().to_string(),
            student_email: form.student_email.trim().to_string(),
            student_number: form.student_number.trim().to_string(),
            passphrase: form.passphrase.trim().to_string(),
        })
    }

    fn project_row(&self, poster_url: Option<String>) -> NewProject {
        NewProject {
            title: self.title.clone(),
            description: self.description.clone(),
            year: self.year,
            video_url: self.video_url.clone(),
            poster_url,
            student_creators: self.student_creators.clone(),
            course_id: self.course_id.clone(),
            student_name: self.student_name.clone(),
            student_email: self.student_email.clone(),
            student_number: self.student_number.clone(),
            visible: false,
        }
    }
}

/// What a completed submission created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub project_id: String,
    pub poster_url: Option<String>,
    pub images: Vec<NewProjectImage>,
}

fn to_rows<T: serde::Serialize>(rows: &[T]) -> Result<Vec<Value>, StoreError> {
    rows.iter()
        .map(|row| serde_json::to_value(row).map_err(StoreError::from))
        .collect()
}

async fn upload_file(
    backend: &Backend,
    bucket: &str,
    key: &str,
    file: &StagedFile,
) -> Result<String, StoreError> {
    let bytes = file.read().await?;
    backend.objects.upload(bucket, key, bytes, &file.mime).await?;
    Ok(backend.objects.public_url(bucket, key))
}

/// Run every stage in order, stopping at the first failure
pub async fn submit(
    backend: Backend,
    snapshot: SubmissionSnapshot,
) -> Result<SubmissionReceipt, SubmitError> {
    let records = backend.records.as_ref();

    // 1. Authorize
    let authorized = catalog::passphrase_is_active(records, &snapshot.passphrase)
        .await
        .map_err(|e| SubmitError::PassphraseLookupFailed(e.to_string()))?;
    if !authorized {
        warn!("🔒 Submission refused: passphrase did not match an active secret");
        return Err(SubmitError::InvalidPassphrase);
    }

    // 2. Poster
    let poster_url = match &snapshot.poster {
        Some(poster) => {
            let key = keys::poster_key(poster);
            let url = upload_file(&backend, buckets::POSTER, &key, poster)
                .await
                .map_err(|e| SubmitError::PosterUploadFailed(e.to_string()))?;
            info!("📤 Uploaded poster {}", key);
            Some(url)
        }
        None => None,
    };

    // 3. Project row
    let project_rows = to_rows(&[snapshot.project_row(poster_url.clone())])
        .map_err(|e| SubmitError::ProjectInsertFailed(e.to_string()))?;
    let inserted = records
        .insert(tables::PROJECTS, project_rows)
        .await
        .map_err(|e| {
            if poster_url.is_some() {
                warn!("Project insert failed; the uploaded poster is left without a project");
            }
            SubmitError::ProjectInsertFailed(e.to_string())
        })?;
    let project_id = inserted
        .into_iter()
        .next()
        .ok_or_else(|| SubmitError::ProjectInsertFailed("no row returned".into()))
        .and_then(|row| {
            serde_json::from_value::<InsertedId>(row)
                .map_err(|e| SubmitError::ProjectInsertFailed(e.to_string()))
        })?
        .id;
    info!("📝 Created project {}", project_id);

    // 4. Filters
    if !snapshot.selected_filters.is_empty() {
        let links: Vec<NewProjectFilter> = snapshot
            .selected_filters
            .iter()
            .map(|filter_id| NewProjectFilter {
                project_id: project_id.clone(),
                filter_id: filter_id.clone(),
            })
            .collect();
        let rows = to_rows(&links).map_err(|e| SubmitError::FilterLinkFailed(e.to_string()))?;
        records
            .insert(tables::PROJECT_FILTERS, rows)
            .await
            .map_err(|e| SubmitError::FilterLinkFailed(e.to_string()))?;
        info!("🏷️  Linked {} filters", links.len());
    }

    // 5. Images
    let orders = keys::display_orders(snapshot.images.len(), snapshot.primary_index);
    let mut images = Vec::with_capacity(snapshot.images.len());
    for (file, display_order) in snapshot.images.iter().zip(orders) {
        let key = keys::project_image_key(&project_id, file);
        let image_url = upload_file(&backend, buckets::PROJECT_IMAGES, &key, file)
            .await
            .map_err(|e| {
                warn!("Image upload stopped after {} of {}", images.len(), snapshot.images.len());
                SubmitError::ImageUploadFailed(e.to_string())
            })?;
        images.push(NewProjectImage {
            project_id: project_id.clone(),
            image_url,
            display_order,
        });
    }

    if !images.is_empty() {
        let rows = to_rows(&images).map_err(|e| SubmitError::ImageRecordsFailed(e.to_string()))?;
        records
            .insert(tables::PROJECT_IMAGES, rows)
            .await
            .map_err(|e| SubmitError::ImageRecordsFailed(e.to_string()))?;
        info!("🖼️  Uploaded {} images", images.len());
    }

    info!("✅ Submission complete for project {}", project_id);
    Ok(SubmissionReceipt {
        project_id,
        poster_url,
        images,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::remote::local::{LocalObjects, LocalRecords};
    use crate::remote::{ObjectStore, Query, RecordStore};
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    /// Record store that can be told to fail inserts into one table
    pub(crate) struct FlakyRecords {
        pub inner: LocalRecords,
        pub fail_insert_into: Option<&'static str>,
        pub fail_select: bool,
        pub inserted_tables: Mutex<Vec<String>>,
    }

    impl FlakyRecords {
        pub fn new(inner: LocalRecords) -> Self {
            Self {
                inner,
                fail_insert_into: None,
                fail_select: false,
                inserted_tables: Mutex::new(Vec::new()),
            }
        }

        pub fn inserted(&self) -> Vec<String> {
            self.inserted_tables.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RecordStore for FlakyRecords {
        async fn select(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
            if self.fail_select {
                return Err(StoreError::Invalid("connection refused".into()));
            }
            self.inner.select(query).await
        }

        async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, StoreError> {
            if self.fail_insert_into == Some(table) {
                return Err(StoreError::Status {
                    status: 400,
                    message: format!("insert into {table} rejected"),
                });
            }
            self.inserted_tables.lock().unwrap().push(table.to_string());
            self.inner.insert(table, rows).await
        }
    }

    /// Object store that fails uploads after a number of successes
    pub(crate) struct FlakyObjects {
        pub inner: LocalObjects,
        pub fail_after: Option<usize>,
        pub uploads: Mutex<Vec<String>>,
    }

    impl FlakyObjects {
        pub fn new(inner: LocalObjects) -> Self {
            Self {
                inner,
                fail_after: None,
                uploads: Mutex::new(Vec::new()),
            }
        }

        pub fn uploaded(&self) -> Vec<String> {
            self.uploads.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ObjectStore for FlakyObjects {
        async fn upload(
            &self,
            bucket: &str,
            key: &str,
            bytes: Vec<u8>,
            content_type: &str,
        ) -> Result<(), StoreError> {
            let done = self.uploads.lock().unwrap().len();
            if self.fail_after.is_some_and(|limit| done >= limit) {
                return Err(StoreError::Status {
                    status: 413,
                    message: "Payload too large".into(),
                });
            }
            self.inner.upload(bucket, key, bytes, content_type).await?;
            self.uploads.lock().unwrap().push(format!("{bucket}/{key}"));
            Ok(())
        }

        fn public_url(&self, bucket: &str, key: &str) -> String {
            self.inner.public_url(bucket, key)
        }
    }

    pub(crate) struct Harness {
        pub dir: tempfile::TempDir,
        pub records: Arc<FlakyRecords>,
        pub objects: Arc<FlakyObjects>,
    }

    impl Harness {
        pub async fn new() -> Self {
            Self::configured(|_| {}, |_| {}).await
        }

        pub async fn configured(
            records_setup: impl FnOnce(&mut FlakyRecords),
            objects_setup: impl FnOnce(&mut FlakyObjects),
        ) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let local = LocalRecords::open_in_memory().unwrap();
            local
                .insert(
                    tables::PASSPHRASE,
                    vec![json!({ "value": "open sesame", "active": true })],
                )
                .await
                .unwrap();
            local
                .insert(tables::COURSES, vec![json!({ "id": "c1", "name": "Robotics" })])
                .await
                .unwrap();

            let mut records = FlakyRecords::new(local);
            records_setup(&mut records);
            let mut objects = FlakyObjects::new(LocalObjects::new(dir.path().join("objects")));
            objects_setup(&mut objects);

            Self {
                dir,
                records: Arc::new(records),
                objects: Arc::new(objects),
            }
        }

        pub fn backend(&self) -> Backend {
            Backend::new(self.records.clone(), self.objects.clone())
        }

        /// Write a small file into the harness directory
        pub fn file(&self, name: &str) -> StagedFile {
            write_file(self.dir.path(), name)
        }

        pub async fn rows(&self, table: &str) -> Vec<Value> {
            self.records.inner.select(&Query::from(table)).await.unwrap()
        }
    }

    pub(crate) fn write_file(dir: &Path, name: &str) -> StagedFile {
        let path: PathBuf = dir.join(name);
        std::fs::write(&path, name.as_bytes()).unwrap();
        StagedFile::from_path(&path).unwrap()
    }

    fn snapshot(images: Vec<StagedFile>, primary_index: usize) -> SubmissionSnapshot {
        SubmissionSnapshot {
            title: "Robot arm".into(),
            description: "Six axis arm".into(),
            year: 2024,
            video_url: None,
            student_creators: Some("Ada, Grace".into()),
            course_id: "c1".into(),
            selected_filters: Vec::new(),
            poster: None,
            images,
            primary_index,
            student_name: "Ada".into(),
            student_email: "ada@example.com".into(),
            student_number: "AU123456".into(),
            passphrase: "open sesame".into(),
        }
    }

    #[tokio::test]
    async fn test_full_submission() {
        let harness = Harness::new().await;
        let mut snap = snapshot(
            vec![harness.file("a.png"), harness.file("b.png"), harness.file("c.png")],
            1,
        );
        snap.poster = Some(harness.file("poster.pdf"));
        snap.selected_filters = vec!["f1".into(), "f2".into()];

        let receipt = submit(harness.backend(), snap).await.unwrap();

        assert!(receipt.poster_url.is_some());
        let orders: Vec<usize> = receipt.images.iter().map(|i| i.display_order).collect();
        assert_eq!(orders, vec![1, 0, 2]);

        let projects = harness.rows(tables::PROJECTS).await;
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0]["visible"], json!(false));
        assert_eq!(projects[0]["year"], json!(2024));
        assert_eq!(projects[0]["video_url"], Value::Null);
        assert_eq!(projects[0]["poster_url"], json!(receipt.poster_url));

        assert_eq!(harness.rows(tables::PROJECT_FILTERS).await.len(), 2);
        let images = harness.rows(tables::PROJECT_IMAGES).await;
        assert_eq!(images.len(), 3);
        assert!(images.iter().all(|i| i["project_id"] == json!(receipt.project_id)));

        let uploads = harness.objects.uploaded();
        assert_eq!(uploads.len(), 4);
        assert!(uploads[0].starts_with("poster/"));
        assert!(uploads[1].starts_with(&format!("project-images/{}/", receipt.project_id)));
    }

    #[tokio::test]
    async fn test_single_image_without_filters() {
        let harness = Harness::new().await;
        let receipt = submit(harness.backend(), snapshot(vec![harness.file("a.png")], 0))
            .await
            .unwrap();

        assert_eq!(receipt.images.len(), 1);
        assert_eq!(receipt.images[0].display_order, 0);
        assert_eq!(harness.records.inserted(), vec!["projects", "project_images"]);
    }

    #[tokio::test]
    async fn test_invalid_passphrase_writes_nothing() {
        let harness = Harness::new().await;
        let mut snap = snapshot(vec![harness.file("a.png")], 0);
        snap.passphrase = "wrong".into();
        snap.poster = Some(harness.file("poster.pdf"));

        let err = submit(harness.backend(), snap).await.unwrap_err();
        assert_eq!(err, SubmitError::InvalidPassphrase);
        assert_eq!(err.to_string(), "Invalid passphrase");
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert!(harness.records.inserted().is_empty());
        assert!(harness.objects.uploaded().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_failure_is_distinct_from_mismatch() {
        let harness = Harness::configured(|r| r.fail_select = true, |_| {}).await;
        let err = submit(harness.backend(), snapshot(vec![harness.file("a.png")], 0))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to verify passphrase: connection refused");
        assert!(harness.records.inserted().is_empty());
    }

    #[tokio::test]
    async fn test_poster_failure_stops_before_project() {
        let harness = Harness::configured(|_| {}, |o| o.fail_after = Some(0)).await;
        let mut snap = snapshot(vec![harness.file("a.png")], 0);
        snap.poster = Some(harness.file("poster.pdf"));

        let err = submit(harness.backend(), snap).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to upload poster: Payload too large");
        assert_eq!(err.kind(), ErrorKind::Upload);
        assert!(harness.records.inserted().is_empty());
    }

    #[tokio::test]
    async fn test_project_failure_leaves_poster_orphaned() {
        let harness = Harness::configured(|r| r.fail_insert_into = Some(tables::PROJECTS), |_| {}).await;
        let mut snap = snapshot(vec![harness.file("a.png")], 0);
        snap.poster = Some(harness.file("poster.pdf"));

        let err = submit(harness.backend(), snap).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to submit project: insert into projects rejected");
        assert_eq!(harness.objects.uploaded().len(), 1);
        assert!(harness.rows(tables::PROJECTS).await.is_empty());
    }

    #[tokio::test]
    async fn test_filter_failure_keeps_project() {
        let harness =
            Harness::configured(|r| r.fail_insert_into = Some(tables::PROJECT_FILTERS), |_| {}).await;
        let mut snap = snapshot(vec![harness.file("a.png")], 0);
        snap.selected_filters = vec!["f1".into()];

        let err = submit(harness.backend(), snap).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Link);
        assert!(err.to_string().starts_with("Failed to link filters: "));
        assert_eq!(harness.rows(tables::PROJECTS).await.len(), 1);
        assert!(harness.objects.uploaded().is_empty());
    }

    #[tokio::test]
    async fn test_image_failure_aborts_remaining_uploads() {
        let harness = Harness::configured(|_| {}, |o| o.fail_after = Some(1)).await;
        let snap = snapshot(
            vec![harness.file("a.png"), harness.file("b.png"), harness.file("c.png")],
            0,
        );

        let err = submit(harness.backend(), snap).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to upload image: Payload too large");
        assert_eq!(harness.objects.uploaded().len(), 1);
        assert!(harness.rows(tables::PROJECT_IMAGES).await.is_empty());
        assert_eq!(harness.rows(tables::PROJECTS).await.len(), 1);
    }

    #[tokio::test]
    async fn test_image_records_failure() {
        let harness =
            Harness::configured(|r| r.fail_insert_into = Some(tables::PROJECT_IMAGES), |_| {}).await;
        let err = submit(harness.backend(), snapshot(vec![harness.file("a.png")], 0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Insert);
        assert!(err.to_string().starts_with("Failed to save image records: "));
        assert_eq!(harness.objects.uploaded().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_fails_its_stage() {
        let harness = Harness::new().await;
        let ghost = StagedFile::new(harness.dir.path().join("gone.png"), 10);

        let err = submit(harness.backend(), snapshot(vec![ghost], 0)).await.unwrap_err();
        assert!(matches!(err, SubmitError::ImageUploadFailed(_)));
    }

    #[test]
    fn test_hint_follows_error_kind() {
        assert_eq!(
            SubmitError::InvalidPassphrase.kind().hint(),
            "Ask your instructor for the current passphrase."
        );
        assert_eq!(
            SubmitError::PassphraseLookupFailed("offline".into()).kind().hint(),
            SubmitError::InvalidPassphrase.kind().hint()
        );
        let retry = "Nothing was retried. Press Submit to try again.";
        assert_eq!(SubmitError::PosterUploadFailed("x".into()).kind().hint(), retry);
        assert_eq!(SubmitError::ImageRecordsFailed("x".into()).kind().hint(), retry);
        assert_eq!(SubmitError::FilterLinkFailed("x".into()).kind().hint(), retry);
    }
}
