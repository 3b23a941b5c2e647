/// Submission wizard controller
///
/// Owns the form, the reference data and the step pointer. Nothing here
/// talks to the network: operations that need remote work return an
/// `Effect`, and the results come back through the `*_loaded` /
/// `submission_finished` handlers tagged with the session they were
/// issued under. Results from an older session, or arriving while the
/// wizard is closed, are dropped.

use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::course_picker::{CoursePicker, PickerKey};
use super::data::{Course, Filter};
use super::form::{check_poster, Field, FieldUpdate, UploadFormData};
use super::images::{PreviewRegistry, StagedFile};
use super::validate::{validate_contributor, validate_details, validate_submit_gate, StepCheck};
use crate::config::Limits;
use crate::submission::{SubmissionReceipt, SubmissionSnapshot, SubmitError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Details,
    Contributor,
    Confirm,
    Submitting,
    Success,
}

impl Step {
    /// 1-based position for the form steps
    pub fn number(&self) -> Option<u8> {
        match self {
            Step::Details => Some(1),
            Step::Contributor => Some(2),
            Step::Confirm => Some(3),
            Step::Submitting | Step::Success => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Step::Details => "Project details",
            Step::Contributor => "Student info",
            Step::Confirm | Step::Submitting => "Submit",
            Step::Success => "Submitted",
        }
    }
}

/// Blocking error shown at the top of the current step
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WizardError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Submit(#[from] SubmitError),
}

/// Remote work requested by the controller
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Fetch courses and filters together
    FetchReferenceData { session: u64 },
    Submit {
        session: u64,
        snapshot: SubmissionSnapshot,
    },
}

#[derive(Debug)]
pub struct Wizard {
    open: bool,
    session: u64,
    step: Step,
    limits: Limits,
    registry: PreviewRegistry,
    form: UploadFormData,
    picker: CoursePicker,
    courses: Vec<Course>,
    filters: Vec<Filter>,
    error: Option<WizardError>,
    invalid: BTreeSet<Field>,
    /// Non-blocking note from image or poster staging
    advisory: Option<String>,
    receipt: Option<SubmissionReceipt>,
}

impl Wizard {
    pub fn new(limits: Limits, registry: PreviewRegistry) -> Self {
        Self {
            open: false,
            session: 0,
            step: Step::Details,
            form: UploadFormData::new(registry.clone(), &limits),
            limits,
            registry,
            picker: CoursePicker::default(),
            courses: Vec::new(),
            filters: Vec::new(),
            error: None,
            invalid: BTreeSet::new(),
            advisory: None,
            receipt: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn form(&self) -> &UploadFormData {
        &self.form
    }

    pub fn picker(&self) -> &CoursePicker {
        &self.picker
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn error(&self) -> Option<&WizardError> {
        self.error.as_ref()
    }

    pub fn advisory(&self) -> Option<&str> {
        self.advisory.as_deref()
    }

    pub fn receipt(&self) -> Option<&SubmissionReceipt> {
        self.receipt.as_ref()
    }

    pub fn is_invalid(&self, field: Field) -> bool {
        self.invalid.contains(&field)
    }

    /// Courses matching the current search text
    pub fn course_matches(&self) -> Vec<&Course> {
        self.picker.matches(&self.courses)
    }

    /// Filters grouped by their type, both in sorted order
    pub fn filters_by_type(&self) -> BTreeMap<&str, Vec<&Filter>> {
        let mut groups: BTreeMap<&str, Vec<&Filter>> = BTreeMap::new();
        for filter in &self.filters {
            groups.entry(filter.kind.as_str()).or_default().push(filter);
        }
        for group in groups.values_mut() {
            group.sort_by(|a, b| a.value.cmp(&b.value));
        }
        groups
    }

    // ---- lifecycle ----

    /// Start a fresh session at step 1
    pub fn open(&mut self) -> Effect {
        if self.open {
            self.teardown();
        }
        self.session += 1;
        self.open = true;
        info!("🧙 Wizard opened (session {})", self.session);
        Effect::FetchReferenceData {
            session: self.session,
        }
    }

    /// Close from any state, discarding everything the session staged
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        if self.step == Step::Submitting {
            warn!("Wizard closed while a submission is in flight; its result will be ignored");
        }
        self.teardown();
        info!("🧙 Wizard closed (session {})", self.session);
    }

    fn teardown(&mut self) {
        self.form.reset(self.registry.clone(), &self.limits);
        self.picker.clear();
        self.courses.clear();
        self.filters.clear();
        self.step = Step::Details;
        self.error = None;
        self.invalid.clear();
        self.advisory = None;
        self.receipt = None;
        self.open = false;
    }

    fn accepts(&self, session: u64) -> bool {
        self.open && session == self.session
    }

    // ---- reference data ----

    /// Apply fetched courses; returns false if the result was stale
    pub fn courses_loaded(&mut self, session: u64, result: Result<Vec<Course>, String>) -> bool {
        if !self.accepts(session) {
            debug!("dropping courses from session {}", session);
            return false;
        }
        match result {
            Ok(courses) => {
                debug!("loaded {} courses", courses.len());
                self.courses = courses;
            }
            Err(e) => {
                warn!("Failed to load courses: {}", e);
                self.advisory = Some(format!("Failed to load courses: {e}"));
            }
        }
        true
    }

    /// Apply fetched filters; returns false if the result was stale
    pub fn filters_loaded(&mut self, session: u64, result: Result<Vec<Filter>, String>) -> bool {
        if !self.accepts(session) {
            debug!("dropping filters from session {}", session);
            return false;
        }
        match result {
            Ok(filters) => {
                debug!("loaded {} filters", filters.len());
                self.filters = filters;
            }
            Err(e) => {
                warn!("Failed to load filters: {}", e);
                self.advisory = Some(format!("Failed to load filters: {e}"));
            }
        }
        true
    }

    // ---- form edits ----

    pub fn update(&mut self, update: FieldUpdate) {
        if !self.is_editable() {
            return;
        }
        match update {
            FieldUpdate::Poster(Some(file)) => self.set_poster(file),
            other => {
                self.invalid.remove(&other.field());
                self.form.update(other);
            }
        }
    }

    fn is_editable(&self) -> bool {
        self.open && matches!(self.step, Step::Details | Step::Contributor | Step::Confirm)
    }

    /// Stage a poster if it is an image or PDF within the size limit
    pub fn set_poster(&mut self, file: StagedFile) {
        if !self.is_editable() {
            return;
        }
        match check_poster(&file, self.limits.max_poster_bytes) {
            Ok(()) => {
                self.form.update(FieldUpdate::Poster(Some(file)));
                self.advisory = None;
            }
            Err(rejection) => {
                debug!("poster {} refused: {:?}", file.name, rejection);
                if let Some(message) = rejection.message() {
                    self.advisory = Some(message);
                }
            }
        }
    }

    pub fn add_images(&mut self, files: Vec<StagedFile>) {
        if !self.is_editable() {
            return;
        }
        match self.form.images.add(files) {
            Ok(outcome) => {
                if outcome.added > 0 {
                    self.invalid.remove(&Field::ImageFiles);
                }
                self.advisory = outcome.advisory();
            }
            Err(e) => self.advisory = Some(e.to_string()),
        }
    }

    pub fn remove_image(&mut self, index: usize) {
        if self.is_editable() && self.form.images.remove(index) {
            self.advisory = None;
        }
    }

    pub fn set_primary(&mut self, index: usize) {
        if self.is_editable() {
            self.form.images.set_primary(index);
        }
    }

    pub fn move_image(&mut self, from: usize, to: usize) {
        if self.is_editable() {
            self.form.images.move_entry(from, to);
        }
    }

    pub fn toggle_filter(&mut self, filter_id: &str) {
        if self.is_editable() {
            self.form.toggle_filter(filter_id);
        }
    }

    /// Typing a new search drops the previously chosen course
    pub fn search_courses(&mut self, text: String) {
        if !self.is_editable() {
            return;
        }
        self.form.course_id.clear();
        self.picker.set_search(text);
    }

    pub fn choose_course(&mut self, course_id: &str) {
        if !self.is_editable() {
            return;
        }
        let Some(course) = self.courses.iter().find(|c| c.id == course_id) else {
            return;
        };
        self.picker.choose(course);
        self.form.course_id = course.id.clone();
        self.invalid.remove(&Field::CourseId);
    }

    pub fn course_key(&mut self, key: PickerKey) {
        if !self.is_editable() {
            return;
        }
        if let Some(course) = self.picker.key(key, &self.courses) {
            self.form.course_id = course.id.clone();
            self.invalid.remove(&Field::CourseId);
        }
    }

    /// Clear the chosen course together with its search text
    pub fn clear_course(&mut self) {
        if !self.is_editable() {
            return;
        }
        self.form.course_id.clear();
        self.picker.clear();
    }

    // ---- transitions ----

    fn apply_check(&mut self, check: StepCheck) -> bool {
        self.invalid = check.invalid;
        match check.message {
            Some(message) => {
                debug!("step {:?} blocked: {}", self.step, message);
                self.error = Some(WizardError::Validation(message));
                false
            }
            None => {
                self.error = None;
                true
            }
        }
    }

    /// Advance past step 1 or 2 if its checks pass
    pub fn next(&mut self) -> bool {
        if !self.open {
            return false;
        }
        let (check, target) = match self.step {
            Step::Details => (validate_details(&self.form, &self.limits), Step::Contributor),
            Step::Contributor => (validate_contributor(&self.form), Step::Confirm),
            _ => return false,
        };
        if !self.apply_check(check) {
            return false;
        }
        self.step = target;
        true
    }

    /// Go back one step, keeping every value
    pub fn back(&mut self) -> bool {
        let target = match self.step {
            Step::Contributor => Step::Details,
            Step::Confirm => Step::Contributor,
            _ => return false,
        };
        self.step = target;
        self.error = None;
        true
    }

    /// Start a submission if the gate passes
    pub fn submit(&mut self) -> Option<Effect> {
        if !self.open || self.step != Step::Confirm {
            return None;
        }
        if !self.apply_check(validate_submit_gate(&self.form)) {
            return None;
        }
        let Some(snapshot) = SubmissionSnapshot::capture(&self.form, &self.limits) else {
            self.invalid.insert(Field::Year);
            self.error = Some(WizardError::Validation("Please enter a valid year".into()));
            return None;
        };

        info!(
            "📨 Submitting \"{}\" with {} images (session {})",
            snapshot.title,
            snapshot.images.len(),
            self.session
        );
        self.step = Step::Submitting;
        Some(Effect::Submit {
            session: self.session,
            snapshot,
        })
    }

    /// Apply a pipeline result; returns false if the result was stale
    pub fn submission_finished(
        &mut self,
        session: u64,
        result: Result<SubmissionReceipt, SubmitError>,
    ) -> bool {
        if !self.accepts(session) || self.step != Step::Submitting {
            debug!("dropping submission result from session {}", session);
            return false;
        }
        match result {
            Ok(receipt) => {
                self.step = Step::Success;
                self.error = None;
                self.receipt = Some(receipt);
            }
            Err(e) => {
                warn!("Submission failed: {}", e);
                self.step = Step::Confirm;
                self.error = Some(WizardError::Submit(e));
            }
        }
        true
    }
}
