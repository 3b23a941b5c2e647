/// Wizard form state
///
/// A plain record of every value the submission wizard collects. Fields
/// change one at a time through `UploadFormData::update`; the whole record
/// is rebuilt from defaults on teardown, which also releases every staged
/// image preview.

use std::collections::BTreeSet;
use std::fmt;

use super::images::{ImageManager, PreviewRegistry, StagedFile};
use crate::config::Limits;

/// Names of the form fields, as used for invalid-field highlighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Title,
    Description,
    Year,
    VideoUrl,
    Poster,
    StudentCreators,
    CourseId,
    SelectedFilters,
    ImageFiles,
    StudentName,
    StudentEmail,
    StudentNumber,
    Passphrase,
    Consent,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Description => "description",
            Field::Year => "year",
            Field::VideoUrl => "video_url",
            Field::Poster => "poster_file",
            Field::StudentCreators => "student_creators",
            Field::CourseId => "course_id",
            Field::SelectedFilters => "selected_filters",
            Field::ImageFiles => "image_files",
            Field::StudentName => "student_name",
            Field::StudentEmail => "student_email",
            Field::StudentNumber => "student_number",
            Field::Passphrase => "passphrase",
            Field::Consent => "consent",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replacement value for one scalar field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Title(String),
    Description(String),
    Year(String),
    VideoUrl(String),
    StudentCreators(String),
    CourseId(String),
    Poster(Option<StagedFile>),
    StudentName(String),
    StudentEmail(String),
    StudentNumber(String),
    Passphrase(String),
    Consent(bool),
}

impl FieldUpdate {
    pub fn field(&self) -> Field {
        match self {
            FieldUpdate::Title(_) => Field::Title,
            FieldUpdate::Description(_) => Field::Description,
            FieldUpdate::Year(_) => Field::Year,
            FieldUpdate::VideoUrl(_) => Field::VideoUrl,
            FieldUpdate::StudentCreators(_) => Field::StudentCreators,
            FieldUpdate::CourseId(_) => Field::CourseId,
            FieldUpdate::Poster(_) => Field::Poster,
            FieldUpdate::StudentName(_) => Field::StudentName,
            FieldUpdate::StudentEmail(_) => Field::StudentEmail,
            FieldUpdate::StudentNumber(_) => Field::StudentNumber,
            FieldUpdate::Passphrase(_) => Field::Passphrase,
            FieldUpdate::Consent(_) => Field::Consent,
        }
    }
}

/// Why a poster candidate was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PosterRejection {
    /// Neither an image nor a PDF; ignored without a message
    UnsupportedType,
    TooLarge { max_mb: u64 },
}

impl PosterRejection {
    pub fn message(&self) -> Option<String> {
        match self {
            PosterRejection::UnsupportedType => None,
            PosterRejection::TooLarge { max_mb } => Some(format!("File must be under {max_mb} MB")),
        }
    }
}

/// Check a poster candidate: an image or a PDF within the size limit
pub fn check_poster(file: &StagedFile, max_bytes: u64) -> Result<(), PosterRejection> {
    if !(file.is_image() || file.is_pdf()) {
        return Err(PosterRejection::UnsupportedType);
    }
    if file.size > max_bytes {
        return Err(PosterRejection::TooLarge {
            max_mb: max_bytes / (1024 * 1024),
        });
    }
    Ok(())
}

/// Everything the wizard collects
#[derive(Debug)]
pub struct UploadFormData {
    pub title: String,
    pub description: String,
    /// Year as typed; parsed during validation and submission
    pub year: String,
    pub video_url: String,
    pub poster: Option<StagedFile>,
    pub student_creators: String,
    pub course_id: String,
    pub selected_filters: BTreeSet<String>,
    /// Staged images and the cover index
    pub images: ImageManager,
    pub student_name: String,
    pub student_email: String,
    pub student_number: String,
    pub passphrase: String,
    pub consent: bool,
}

impl UploadFormData {
    /// Empty form whose images allocate previews from `registry`
    pub fn new(registry: PreviewRegistry, limits: &Limits) -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            year: String::new(),
            video_url: String::new(),
            poster: None,
            student_creators: String::new(),
            course_id: String::new(),
            selected_filters: BTreeSet::new(),
            images: ImageManager::with_limits(registry, limits.max_images, limits.max_image_bytes),
            student_name: String::new(),
            student_email: String::new(),
            student_number: String::new(),
            passphrase: String::new(),
            consent: false,
        }
    }

    /// Replace one field
    pub fn update(&mut self, update: FieldUpdate) {
        match update {
            FieldUpdate::Title(v) => self.title = v,
            FieldUpdate::Description(v) => self.description = v,
            FieldUpdate::Year(v) => self.year = v,
            FieldUpdate::VideoUrl(v) => self.video_url = v,
            FieldUpdate::StudentCreators(v) => self.student_creators = v,
            FieldUpdate::CourseId(v) => self.course_id = v,
            FieldUpdate::Poster(v) => self.poster = v,
            FieldUpdate::StudentName(v) => self.student_name = v,
            FieldUpdate::StudentEmail(v) => self.student_email = v,
            FieldUpdate::StudentNumber(v) => self.student_number = v,
            FieldUpdate::Passphrase(v) => self.passphrase = v,
            FieldUpdate::Consent(v) => self.consent = v,
        }
    }

    /// Add or remove a filter from the selection
    pub fn toggle_filter(&mut self, filter_id: &str) {
        if !self.selected_filters.remove(filter_id) {
            self.selected_filters.insert(filter_id.to_string());
        }
    }

    /// Release staged images and return every field to its default
    pub fn reset(&mut self, registry: PreviewRegistry, limits: &Limits) {
        self.images.release_all();
        *self = Self::new(registry, limits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn form(registry: &PreviewRegistry) -> UploadFormData {
        UploadFormData::new(registry.clone(), &Limits::default())
    }

    #[test]
    fn test_update_replaces_single_field() {
        let registry = PreviewRegistry::new();
        let mut data = form(&registry);

        data.update(FieldUpdate::Title("Robot arm".into()));
        data.update(FieldUpdate::Consent(true));

        assert_eq!(data.title, "Robot arm");
        assert!(data.consent);
        assert!(data.description.is_empty());
        assert_eq!(FieldUpdate::Year("2024".into()).field(), Field::Year);
        assert_eq!(Field::CourseId.to_string(), "course_id");
    }

    #[test]
    fn test_toggle_filter_has_set_semantics() {
        let registry = PreviewRegistry::new();
        let mut data = form(&registry);

        data.toggle_filter("f1");
        data.toggle_filter("f2");
        data.toggle_filter("f1");

        assert_eq!(data.selected_filters.iter().collect::<Vec<_>>(), vec!["f2"]);
    }

    #[test]
    fn test_reset_releases_previews() {
        let registry = PreviewRegistry::new();
        let mut data = form(&registry);
        data.update(FieldUpdate::Title("Robot arm".into()));
        data.images
            .add(vec![StagedFile::new(PathBuf::from("/tmp/a.png"), 10)])
            .unwrap();

        data.reset(registry.clone(), &Limits::default());

        assert!(data.title.is_empty());
        assert!(data.images.is_empty());
        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.released_count(), 1);
    }

    #[test]
    fn test_poster_rules() {
        let max = 10 * 1024 * 1024;
        let pdf = StagedFile::new(PathBuf::from("/tmp/poster.pdf"), 1024);
        let big = StagedFile::new(PathBuf::from("/tmp/poster.png"), max + 1);
        let zip = StagedFile::new(PathBuf::from("/tmp/poster.zip"), 1024);

        assert_eq!(check_poster(&pdf, max), Ok(()));
        assert_eq!(
            check_poster(&big, max).unwrap_err().message().as_deref(),
            Some("File must be under 10 MB")
        );
        assert_eq!(check_poster(&zip, max), Err(PosterRejection::UnsupportedType));
        assert_eq!(PosterRejection::UnsupportedType.message(), None);
    }
}
