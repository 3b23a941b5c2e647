/// Step validation
///
/// Pure checks over the form values. Each check returns the sentence shown
/// to the user and the set of fields to highlight. The sentence lists the
/// missing items in field order:
/// - 1 item: "Please enter X"
/// - 2 items: "Please enter X and Y"
/// - 3+ items: "Please enter X, Y, and Z"

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use super::form::{Field, UploadFormData};
use crate::config::Limits;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});

/// Nine digits, or "AU"/"au" followed by six digits
static STUDENT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d{9}|[Aa][Uu]\d{6})$").expect("valid student number regex"));

/// Result of checking one step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepCheck {
    pub message: Option<String>,
    pub invalid: BTreeSet<Field>,
}

impl StepCheck {
    pub fn passed(&self) -> bool {
        self.message.is_none()
    }

    fn from_parts(parts: Vec<(Field, &str)>) -> Self {
        if parts.is_empty() {
            return Self::default();
        }
        let labels: Vec<&str> = parts.iter().map(|(_, label)| *label).collect();
        Self {
            message: Some(format_error_list(&labels)),
            invalid: parts.into_iter().map(|(field, _)| field).collect(),
        }
    }
}

/// Join missing items into one "Please enter ..." sentence
pub fn format_error_list(parts: &[&str]) -> String {
    match parts {
        [] => String::new(),
        [one] => format!("Please enter {one}"),
        [first, second] => format!("Please enter {first} and {second}"),
        [init @ .., last] => format!("Please enter {}, and {}", init.join(", "), last),
    }
}

/// Parse the year text, accepting only the configured inclusive range
///
/// Strict integer parse: "2024.5" and "2024abc" are rejected, not truncated.
pub fn parse_year(year: &str, limits: &Limits) -> Option<i32> {
    year.trim()
        .parse::<i32>()
        .ok()
        .filter(|y| (limits.year_min..=limits.year_max).contains(y))
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email.trim())
}

pub fn is_valid_student_number(number: &str) -> bool {
    STUDENT_NUMBER.is_match(number.trim())
}

/// Step 1: project details
pub fn validate_details(form: &UploadFormData, limits: &Limits) -> StepCheck {
    let mut parts = Vec::new();
    if form.title.trim().is_empty() {
        parts.push((Field::Title, "title"));
    }
    if form.description.trim().is_empty() {
        parts.push((Field::Description, "description"));
    }
    if parse_year(&form.year, limits).is_none() {
        parts.push((Field::Year, "a valid year"));
    }
    if form.course_id.is_empty() {
        parts.push((Field::CourseId, "a course"));
    }
    if form.images.is_empty() {
        parts.push((Field::ImageFiles, "at least one image"));
    }
    StepCheck::from_parts(parts)
}

/// Step 2: contributor info
pub fn validate_contributor(form: &UploadFormData) -> StepCheck {
    let mut parts = Vec::new();
    if form.student_name.trim().is_empty() {
        parts.push((Field::StudentName, "name"));
    }
    if !is_valid_email(&form.student_email) {
        parts.push((Field::StudentEmail, "a valid email"));
    }
    if !is_valid_student_number(&form.student_number) {
        parts.push((Field::StudentNumber, "a valid student number"));
    }
    StepCheck::from_parts(parts)
}

/// Step 3: the submit gate (consent and passphrase)
pub fn validate_submit_gate(form: &UploadFormData) -> StepCheck {
    let mut check = StepCheck::default();
    if form.passphrase.trim().is_empty() {
        check.invalid.insert(Field::Passphrase);
        check.message = Some("Passphrase is required".to_string());
    }
    // Consent is reported first when both are missing
    if !form.consent {
        check.invalid.insert(Field::Consent);
        check.message = Some("You must accept the consent to proceed".to_string());
    }
    check
}
