/// Course search box state for the wizard
///
/// The search text is UI state only; the selected course lives in the
/// form as `course_id`. Selecting a course copies its name into the
/// search text, and clearing the selection clears both.

use super::data::Course;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerKey {
    Down,
    Up,
    Enter,
    Escape,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoursePicker {
    pub search: String,
    pub open: bool,
    /// Index into the filtered list, if any row is highlighted
    pub highlighted: Option<usize>,
}

impl CoursePicker {
    /// Courses whose name contains the search text, ignoring case
    pub fn matches<'a>(&self, courses: &'a [Course]) -> Vec<&'a Course> {
        let needle = self.search.to_lowercase();
        courses
            .iter()
            .filter(|c| c.name.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn set_search(&mut self, text: String) {
        self.search = text;
        self.open = true;
        self.highlighted = None;
    }

    /// Remember a chosen course and close the dropdown
    pub fn choose(&mut self, course: &Course) {
        self.search = course.name.clone();
        self.open = false;
        self.highlighted = None;
    }

    /// Forget the chosen course's text
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Keyboard navigation; returns the course chosen with Enter, if any
    pub fn key<'a>(&mut self, key: PickerKey, courses: &'a [Course]) -> Option<&'a Course> {
        let matches = self.matches(courses);
        if !self.open || matches.is_empty() {
            return None;
        }

        match key {
            PickerKey::Down => {
                let next = self.highlighted.map_or(0, |i| i + 1);
                self.highlighted = Some(next.min(matches.len() - 1));
                None
            }
            PickerKey::Up => {
                self.highlighted = Some(self.highlighted.map_or(0, |i| i.saturating_sub(1)));
                None
            }
            PickerKey::Enter => {
                let course = matches.get(self.highlighted?).copied()?;
                self.choose(course);
                Some(course)
            }
            PickerKey::Escape => {
                self.open = false;
                self.highlighted = None;
                None
            }
        }
    }
}
