/// Application settings
///
/// Settings are layered, later sources overriding earlier ones:
/// 1. Built-in defaults
/// 2. `settings.toml` in the user's config directory (optional)
/// 3. `.env` in the working directory (optional)
/// 4. Environment variables prefixed `PORTFOLIO`, nested with `__`
///    (e.g. `PORTFOLIO_BACKEND__URL`)

use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Default number of images a submission can carry
pub const DEFAULT_MAX_IMAGES: usize = 10;
/// Default per-image size limit (5 MB)
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;
/// Default poster size limit (10 MB)
pub const DEFAULT_MAX_POSTER_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

/// Which record/object store implementation to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Hosted REST API (record endpoints under `/rest/v1`, storage under `/storage/v1`)
    Rest,
    /// SQLite catalog and a local object directory, for offline development
    Local,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub kind: BackendKind,
    /// Base URL of the hosted project (REST backend only)
    pub url: Option<String>,
    /// Public API key sent with every request (REST backend only)
    pub api_key: Option<String>,
    /// Root directory for the local backend's database and objects
    pub local_root: PathBuf,
}

impl Default for BackendSettings {
    fn default() -> Self {
        let mut local_root = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        local_root.push("portfolio-submit");

        Self {
            kind: BackendKind::Local,
            url: None,
            api_key: None,
            local_root,
        }
    }
}

/// Limits enforced client-side before anything reaches the network
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_images: usize,
    pub max_image_bytes: u64,
    pub max_poster_bytes: u64,
    /// Inclusive lower bound for the project year
    pub year_min: i32,
    /// Inclusive upper bound for the project year
    pub year_max: i32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_images: DEFAULT_MAX_IMAGES,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            max_poster_bytes: DEFAULT_MAX_POSTER_BYTES,
            year_min: 1900,
            year_max: 2200,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is not set
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "portfolio_submit=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend: BackendSettings,
    pub limits: Limits,
    pub log: LogSettings,
}

impl Settings {
    /// Load settings from all layered sources
    pub fn load() -> Result<Self, ConfigError> {
        // .env only feeds the environment layer; a missing file is fine
        dotenv::dotenv().ok();

        let builder = config::Config::builder()
            .add_source(config::File::from(Self::settings_path()).required(false))
            .add_source(
                config::Environment::with_prefix("PORTFOLIO")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Path of the optional settings file
    /// - Linux: ~/.config/portfolio-submit/settings.toml
    /// - macOS: ~/Library/Application Support/portfolio-submit/settings.toml
    /// - Windows: %APPDATA%\portfolio-submit\settings.toml
    pub fn settings_path() -> PathBuf {
        let mut path = dirs::config_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        path.push("portfolio-submit");
        path.push("settings.toml");
        path
    }

    /// Reject combinations the rest of the app cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;
        if limits.max_images == 0 {
            return Err(ConfigError::Invalid("limits.max_images must be at least 1".into()));
        }
        if limits.year_min > limits.year_max {
            return Err(ConfigError::Invalid(format!(
                "limits.year_min ({}) is greater than limits.year_max ({})",
                limits.year_min, limits.year_max
            )));
        }
        if self.backend.kind == BackendKind::Rest
            && self.backend.url.as_deref().map_or(true, |u| u.trim().is_empty())
        {
            return Err(ConfigError::Invalid("backend.url is required for the rest backend".into()));
        }
        Ok(())
    }
}
