/// Typed queries used by the listing and the wizard

use serde_json::Value;

use super::{select_as, tables, Embed, Query, RecordStore, StoreError};
use crate::state::data::{Course, Filter, Project};

/// All courses, alphabetical
pub async fn fetch_courses(store: &dyn RecordStore) -> Result<Vec<Course>, StoreError> {
    let query = Query::from(tables::COURSES)
        .select(&["id", "name"])
        .order("name", true);
    select_as(store, &query).await
}

/// All filters, grouped by type through ordering
pub async fn fetch_filters(store: &dyn RecordStore) -> Result<Vec<Filter>, StoreError> {
    let query = Query::from(tables::FILTERS)
        .select(&["id", "type", "value"])
        .order("type", true);
    select_as(store, &query).await
}

/// Published projects with course, images and filters expanded
pub async fn fetch_approved_projects(store: &dyn RecordStore) -> Result<Vec<Project>, StoreError> {
    let query = Query::from(tables::PROJECTS)
        .embed(Embed::new(tables::COURSES, &["name"]))
        .embed(Embed::new(tables::PROJECT_IMAGES, &["image_url", "display_order"]))
        .embed(
            Embed::new(tables::PROJECT_FILTERS, &[])
                .embed(Embed::new(tables::FILTERS, &["type", "value"])),
        )
        .eq("visible", true)
        .order("display_order", true)
        .order("created_at", false);
    select_as(store, &query).await
}

/// Whether `passphrase` matches an active shared secret
pub async fn passphrase_is_active(store: &dyn RecordStore, passphrase: &str) -> Result<bool, StoreError> {
    let query = Query::from(tables::PASSPHRASE)
        .select(&["id"])
        .eq("value", Value::String(passphrase.to_string()))
        .eq("active", true)
        .limit(1);
    let rows = store.select(&query).await?;
    Ok(!rows.is_empty())
}
