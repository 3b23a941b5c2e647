/// Approved project listing with a multi-select course filter

use std::collections::BTreeSet;

use super::data::{Course, Project};

#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub projects: Vec<Project>,
    pub courses: Vec<Course>,
    selected: BTreeSet<String>,
    pub loading: bool,
    pub error: Option<String>,
}

impl Listing {
    pub fn new(projects: Vec<Project>, courses: Vec<Course>) -> Self {
        Self {
            projects,
            courses,
            ..Self::default()
        }
    }

    pub fn is_selected(&self, course_id: &str) -> bool {
        self.selected.contains(course_id)
    }

    pub fn selected(&self) -> &BTreeSet<String> {
        &self.selected
    }

    pub fn toggle_course(&mut self, course_id: &str) {
        if !self.selected.remove(course_id) {
            self.selected.insert(course_id.to_string());
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    /// All projects when nothing is selected, otherwise those in a selected course
    pub fn visible_projects(&self) -> Vec<&Project> {
        self.projects
            .iter()
            .filter(|p| {
                self.selected.is_empty()
                    || p.course_id
                        .as_deref()
                        .is_some_and(|id| self.selected.contains(id))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn project(id: &str, course_id: Option<&str>) -> Project {
        serde_json::from_value(json!({
            "id": id,
            "title": format!("Project {id}"),
            "year": 2024,
            "course_id": course_id,
        }))
        .unwrap()
    }

    fn listing() -> Listing {
        Listing::new(
            vec![
                project("1", Some("c1")),
                project("2", Some("c2")),
                project("3", Some("c1")),
                project("4", None),
            ],
            vec![],
        )
    }

    fn ids(projects: Vec<&Project>) -> Vec<&str> {
        projects.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_no_selection_shows_everything() {
        let listing = listing();
        assert_eq!(ids(listing.visible_projects()), vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn test_selection_filters_by_course() {
        let mut listing = listing();
        listing.toggle_course("c1");
        assert_eq!(ids(listing.visible_projects()), vec!["1", "3"]);

        listing.toggle_course("c2");
        assert_eq!(ids(listing.visible_projects()), vec!["1", "2", "3"]);

        listing.toggle_course("c1");
        assert_eq!(ids(listing.visible_projects()), vec!["2"]);
        assert!(!listing.is_selected("c1"));
    }

    #[test]
    fn test_unknown_course_selection_hides_everything() {
        let mut listing = listing();
        listing.toggle_course("c9");
        assert!(listing.visible_projects().is_empty());

        listing.clear_selection();
        assert_eq!(listing.visible_projects().len(), 4);
    }
}
