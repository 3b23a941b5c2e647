/// Shared data structures for the application state
///
/// These structs represent the rows that flow between the remote
/// record store and the UI layer. Reference data (courses, filters)
/// is read-only; the `New*` rows are what a submission inserts.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Accept identifiers stored either as text or as integers
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid id: {other}"))),
    }
}

fn optional_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!("invalid id: {other}"))),
    }
}

/// A course a project belongs to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Course {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
}

/// A tag a project can be linked to (e.g. type "Software", value "Rust")
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Filter {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// Uploaded image attached to a project
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectImage {
    pub image_url: String,
    #[serde(default)]
    pub display_order: Option<i64>,
}

/// Embedded course reference on a listed project
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CourseName {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FilterTag {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// One association row with its filter expanded
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectFilterLink {
    #[serde(default)]
    pub filters: Option<FilterTag>,
}

/// An approved project as shown in the public listing
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Project {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub year: i32,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub poster_url: Option<String>,
    #[serde(default)]
    pub student_creators: Option<String>,
    #[serde(default, deserialize_with = "optional_id_string")]
    pub course_id: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub display_order: Option<i64>,
    #[serde(default)]
    pub courses: Option<CourseName>,
    #[serde(default)]
    pub project_images: Vec<ProjectImage>,
    #[serde(default)]
    pub project_filters: Vec<ProjectFilterLink>,
}

impl Project {
    /// The cover image: the one with the lowest display order
    pub fn cover_image(&self) -> Option<&ProjectImage> {
        self.project_images
            .iter()
            .min_by_key(|img| img.display_order.unwrap_or(i64::MAX))
    }

    pub fn course_name(&self) -> Option<&str> {
        self.courses.as_ref().map(|c| c.name.as_str())
    }

    /// Values of every linked filter, in link order
    pub fn tags(&self) -> Vec<&str> {
        self.project_filters
            .iter()
            .filter_map(|link| link.filters.as_ref())
            .map(|f| f.value.as_str())
            .collect()
    }
}

/// Row inserted into `projects` by a submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProject {
    pub title: String,
    pub description: String,
    pub year: i32,
    pub video_url: Option<String>,
    pub poster_url: Option<String>,
    pub student_creators: Option<String>,
    pub course_id: String,
    pub student_name: String,
    pub student_email: String,
    pub student_number: String,
    /// Always false; projects are published by a separate approval step
    pub visible: bool,
}

/// Row inserted into `project_filters`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProjectFilter {
    pub project_id: String,
    pub filter_id: String,
}

/// Row inserted into `project_images`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProjectImage {
    pub project_id: String,
    pub image_url: String,
    pub display_order: usize,
}

/// Identity returned for an inserted row
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InsertedId {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ids_accept_numbers_and_strings() {
        let course: Course = serde_json::from_value(json!({ "id": 7, "name": "Interaction Design" })).unwrap();
        assert_eq!(course.id, "7");

        let filter: Filter =
            serde_json::from_value(json!({ "id": "f-1", "type": "Software", "value": "Unity" })).unwrap();
        assert_eq!(filter.id, "f-1");
        assert_eq!(filter.kind, "Software");
    }

    #[test]
    fn test_project_with_embedded_relations() {
        let project: Project = serde_json::from_value(json!({
            "id": "p1",
            "title": "Robot arm",
            "description": "A robot arm",
            "year": 2024,
            "course_id": 3,
            "courses": { "name": "Robotics" },
            "project_images": [
                { "image_url": "https://cdn/b.png", "display_order": 1 },
                { "image_url": "https://cdn/a.png", "display_order": 0 }
            ],
            "project_filters": [
                { "filters": { "type": "Hardware", "value": "Arduino" } },
                { "filters": null }
            ]
        }))
        .unwrap();

        assert_eq!(project.course_id.as_deref(), Some("3"));
        assert_eq!(project.course_name(), Some("Robotics"));
        assert_eq!(project.cover_image().unwrap().image_url, "https://cdn/a.png");
        assert_eq!(project.tags(), vec!["Arduino"]);
        assert!(!project.visible);
    }
}
