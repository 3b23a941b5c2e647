use std::collections::HashMap;
use std::path::PathBuf;

use iced::keyboard::{self, key::Named, Key};
use iced::widget::image;
use iced::{Element, Subscription, Task, Theme};
use rfd::FileDialog;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod remote;
mod state;
mod submission;
mod ui;

use crate::config::Settings;
use crate::remote::{catalog, Backend};
use crate::state::course_picker::PickerKey;
use crate::state::data::{Course, Filter, Project};
use crate::state::form::FieldUpdate;
use crate::state::images::{PreviewRegistry, StagedFile};
use crate::state::listing::Listing;
use crate::state::wizard::{Effect, Wizard};
use crate::submission::{SubmissionReceipt, SubmitError};

/// Main application state
struct PortfolioApp {
    backend: Backend,
    listing: Listing,
    /// Decoded cover images keyed by their public URL
    covers: HashMap<String, image::Handle>,
    wizard: Wizard,
    /// Status line under the listing
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    // Listing
    Refresh,
    ProjectsLoaded(Result<Vec<Project>, String>),
    ListingCoursesLoaded(Result<Vec<Course>, String>),
    CoverLoaded(String, Result<Vec<u8>, String>),
    ToggleCourseFilter(String),
    ClearCourseFilter,

    // Wizard lifecycle
    OpenWizard,
    CloseWizard,
    CoursesLoaded(u64, Result<Vec<Course>, String>),
    FiltersLoaded(u64, Result<Vec<Filter>, String>),

    // Wizard edits
    FieldChanged(FieldUpdate),
    CourseSearch(String),
    CourseChosen(String),
    CourseKey(PickerKey),
    ClearCourse,
    ToggleFilter(String),
    PickImages,
    PickPoster,
    RemoveImage(usize),
    SetPrimary(usize),
    MoveImage(usize, usize),

    // Wizard transitions
    Next,
    Back,
    Submit,
    SubmissionFinished(u64, Result<SubmissionReceipt, SubmitError>),
}

impl PortfolioApp {
    fn new(settings: Settings, backend: Backend) -> (Self, Task<Message>) {
        let wizard = Wizard::new(settings.limits, PreviewRegistry::new());
        let mut app = PortfolioApp {
            backend,
            listing: Listing::default(),
            covers: HashMap::new(),
            wizard,
            status: String::from("Ready."),
        };
        info!("🎨 Portfolio client initialized ({:?} backend)", settings.backend.kind);

        let task = app.load_listing();
        (app, task)
    }

    /// Fetch approved projects and the course list for the filter chips
    fn load_listing(&mut self) -> Task<Message> {
        self.listing.loading = true;
        self.listing.error = None;

        let records = self.backend.records.clone();
        let course_records = self.backend.records.clone();
        Task::batch([
            Task::perform(
                async move {
                    catalog::fetch_approved_projects(records.as_ref())
                        .await
                        .map_err(|e| e.to_string())
                },
                Message::ProjectsLoaded,
            ),
            Task::perform(
                async move {
                    catalog::fetch_courses(course_records.as_ref())
                        .await
                        .map_err(|e| e.to_string())
                },
                Message::ListingCoursesLoaded,
            ),
        ])
    }

    /// Turn a wizard effect into background work
    fn run_effect(&self, effect: Effect) -> Task<Message> {
        match effect {
            Effect::FetchReferenceData { session } => {
                let course_records = self.backend.records.clone();
                let filter_records = self.backend.records.clone();
                Task::batch([
                    Task::perform(
                        async move {
                            catalog::fetch_courses(course_records.as_ref())
                                .await
                                .map_err(|e| e.to_string())
                        },
                        move |result| Message::CoursesLoaded(session, result),
                    ),
                    Task::perform(
                        async move {
                            catalog::fetch_filters(filter_records.as_ref())
                                .await
                                .map_err(|e| e.to_string())
                        },
                        move |result| Message::FiltersLoaded(session, result),
                    ),
                ])
            }
            Effect::Submit { session, snapshot } => Task::perform(
                submission::submit(self.backend.clone(), snapshot),
                move |result| Message::SubmissionFinished(session, result),
            ),
        }
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Refresh => return self.load_listing(),
            Message::ProjectsLoaded(result) => {
                self.listing.loading = false;
                match result {
                    Ok(projects) => {
                        self.status = format!("{} approved projects.", projects.len());
                        self.listing.projects = projects;
                        return self.load_covers();
                    }
                    Err(e) => {
                        error!("Failed to load projects: {}", e);
                        self.listing.error = Some(format!("Failed to load projects: {e}"));
                    }
                }
            }
            Message::ListingCoursesLoaded(result) => match result {
                Ok(courses) => self.listing.courses = courses,
                Err(e) => warn!("Failed to load courses for the listing: {}", e),
            },
            Message::CoverLoaded(url, result) => match result {
                Ok(bytes) => {
                    self.covers.insert(url, image::Handle::from_bytes(bytes));
                }
                Err(e) => warn!("Failed to load cover {}: {}", url, e),
            },
            Message::ToggleCourseFilter(course_id) => self.listing.toggle_course(&course_id),
            Message::ClearCourseFilter => self.listing.clear_selection(),

            Message::OpenWizard => {
                let effect = self.wizard.open();
                return self.run_effect(effect);
            }
            Message::CloseWizard => {
                let submitted = self.wizard.receipt().is_some();
                self.wizard.close();
                if submitted {
                    self.status = String::from("✅ Project submitted for review.");
                }
            }
            Message::CoursesLoaded(session, result) => {
                self.wizard.courses_loaded(session, result);
            }
            Message::FiltersLoaded(session, result) => {
                self.wizard.filters_loaded(session, result);
            }

            Message::FieldChanged(update) => self.wizard.update(update),
            Message::CourseSearch(text) => self.wizard.search_courses(text),
            Message::CourseChosen(course_id) => self.wizard.choose_course(&course_id),
            Message::CourseKey(key) => self.wizard.course_key(key),
            Message::ClearCourse => self.wizard.clear_course(),
            Message::ToggleFilter(filter_id) => self.wizard.toggle_filter(&filter_id),
            Message::PickImages => {
                let picked = FileDialog::new()
                    .set_title("Select project images")
                    .add_filter("Images", &["png", "jpg", "jpeg", "gif", "webp", "bmp"])
                    .pick_files();
                if let Some(paths) = picked {
                    self.wizard.add_images(stage_files(paths));
                }
            }
            Message::PickPoster => {
                let picked = FileDialog::new()
                    .set_title("Select a poster")
                    .add_filter("Poster", &["pdf", "png", "jpg", "jpeg", "webp"])
                    .pick_file();
                if let Some(file) = picked.map(|p| stage_files(vec![p])).and_then(|mut v| v.pop()) {
                    self.wizard.set_poster(file);
                }
            }
            Message::RemoveImage(index) => self.wizard.remove_image(index),
            Message::SetPrimary(index) => self.wizard.set_primary(index),
            Message::MoveImage(from, to) => self.wizard.move_image(from, to),

            Message::Next => {
                self.wizard.next();
            }
            Message::Back => {
                self.wizard.back();
            }
            Message::Submit => {
                if let Some(effect) = self.wizard.submit() {
                    return self.run_effect(effect);
                }
            }
            Message::SubmissionFinished(session, result) => {
                let succeeded = result.is_ok();
                if self.wizard.submission_finished(session, result) && succeeded {
                    info!("📬 Submission accepted; it stays hidden until approved");
                }
            }
        }

        Task::none()
    }

    /// Fetch every cover image not decoded yet
    fn load_covers(&self) -> Task<Message> {
        let urls: Vec<String> = self
            .listing
            .projects
            .iter()
            .filter_map(|p| p.cover_image())
            .map(|img| img.image_url.clone())
            .filter(|url| !self.covers.contains_key(url))
            .collect();

        Task::batch(urls.into_iter().map(|url| {
            Task::perform(
                {
                    let url = url.clone();
                    async move { remote::fetch_public(&url).await.map_err(|e| e.to_string()) }
                },
                move |result| Message::CoverLoaded(url.clone(), result),
            )
        }))
    }

    /// Build the user interface
    fn view(&self) -> Element<'_, Message> {
        if self.wizard.is_open() {
            ui::wizard::view(&self.wizard)
        } else {
            ui::listing::view(&self.listing, &self.covers, &self.status)
        }
    }

    /// Arrow keys drive the course dropdown while it is open
    fn subscription(&self) -> Subscription<Message> {
        if !self.wizard.picker().open {
            return Subscription::none();
        }
        keyboard::on_key_press(|key, _modifiers| match key {
            Key::Named(Named::ArrowDown) => Some(Message::CourseKey(PickerKey::Down)),
            Key::Named(Named::ArrowUp) => Some(Message::CourseKey(PickerKey::Up)),
            Key::Named(Named::Escape) => Some(Message::CourseKey(PickerKey::Escape)),
            _ => None,
        })
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Stage picked paths, skipping any that cannot be read
fn stage_files(paths: Vec<PathBuf>) -> Vec<StagedFile> {
    paths
        .into_iter()
        .filter_map(|path| match StagedFile::from_path(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!("⚠️  Skipping {}: {}", path.display(), e);
                None
            }
        })
        .collect()
}

fn main() -> iced::Result {
    let loaded = Settings::load();
    let settings = loaded.as_ref().cloned().unwrap_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log.filter)),
        )
        .init();

    if let Err(e) = &loaded {
        error!("Failed to load settings, using defaults: {}", e);
    }

    let backend = match Backend::from_settings(&settings) {
        Ok(backend) => backend,
        Err(e) => {
            // Nothing works without a backend
            error!("Failed to open the {:?} backend: {}", settings.backend.kind, e);
            std::process::exit(1);
        }
    };

    iced::application("Portfolio", PortfolioApp::update, PortfolioApp::view)
        .subscription(PortfolioApp::subscription)
        .theme(PortfolioApp::theme)
        .centered()
        .run_with(move || PortfolioApp::new(settings, backend))
}
