//! # Media Sync Configuration
//!
//! Tunables for the sync core, built with a fail-fast builder or loaded from
//! the environment.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::MediaSyncConfig;
//! use bridge_traits::PrivacyView;
//!
//! let config = MediaSyncConfig::builder()
//!     .container_name("Website uploads")
//!     .privacy(PrivacyView::Unlisted)
//!     .delete_on_remove(true)
//!     .build()?;
//! ```
//!
//! ## Environment
//!
//! | Variable | Field |
//! |----------|-------|
//! | `VIMEO_MEDIA_SYNC_ACCESS_TOKEN` | `access_token` |
//! | `VIMEO_MEDIA_SYNC_API_BASE` | `api_base_url` |
//! | `VIMEO_MEDIA_SYNC_PRIVACY` | `privacy` |
//! | `VIMEO_MEDIA_SYNC_DELETE_ON_REMOVE` | `delete_on_remove` |
//! | `VIMEO_MEDIA_SYNC_PROJECT_NAME` | `container_name` |
//! | `VIMEO_MEDIA_SYNC_UPLOAD_APPROACH` | `upload_approach` |
//! | `VIMEO_MEDIA_SYNC_DATABASE` | `database_path` |

use crate::error::{Error, Result};
use bridge_traits::PrivacyView;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api.vimeo.com";
pub const DEFAULT_CONTAINER_NAME: &str = "Media Sync";
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;
pub const DEFAULT_MAX_CHUNKS_PER_RUN: u32 = 3;
pub const DEFAULT_POLL_BATCH_LIMIT: usize = 20;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_CHUNK_SIZE: u64 = 128 * 1024 * 1024;

const ENV_ACCESS_TOKEN: &str = "VIMEO_MEDIA_SYNC_ACCESS_TOKEN";
const ENV_API_BASE: &str = "VIMEO_MEDIA_SYNC_API_BASE";
const ENV_PRIVACY: &str = "VIMEO_MEDIA_SYNC_PRIVACY";
const ENV_DELETE_ON_REMOVE: &str = "VIMEO_MEDIA_SYNC_DELETE_ON_REMOVE";
const ENV_PROJECT_NAME: &str = "VIMEO_MEDIA_SYNC_PROJECT_NAME";
const ENV_UPLOAD_APPROACH: &str = "VIMEO_MEDIA_SYNC_UPLOAD_APPROACH";
const ENV_DATABASE: &str = "VIMEO_MEDIA_SYNC_DATABASE";

/// How new assets reach the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadApproach {
    /// Resumable chunked upload from the local file
    #[default]
    Tus,
    /// The service fetches the asset's public URL itself
    Pull,
}

impl UploadApproach {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadApproach::Tus => "tus",
            UploadApproach::Pull => "pull",
        }
    }
}

impl FromStr for UploadApproach {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "tus" => Ok(UploadApproach::Tus),
            "pull" => Ok(UploadApproach::Pull),
            other => Err(Error::Config(format!("Unknown upload approach: {}", other))),
        }
    }
}

/// Validated media sync configuration.
///
/// Use [`MediaSyncConfig::builder`] or [`MediaSyncConfig::from_env`].
#[derive(Clone, PartialEq, Eq)]
pub struct MediaSyncConfig {
    /// Base URL of the remote API
    pub api_base_url: String,
    /// Timeout applied to every remote call
    pub request_timeout: Duration,
    /// Token supplied through configuration rather than a credential source
    pub access_token: Option<String>,
    /// Visibility requested for new uploads
    pub privacy: PrivacyView,
    /// Delete the remote object when the local asset is deleted
    pub delete_on_remove: bool,
    /// Display name of the remote container new uploads are filed under
    pub container_name: String,
    /// Upper bound of one upload chunk, in bytes
    pub chunk_size: u64,
    /// Chunks transferred per upload burst
    pub max_chunks_per_run: u32,
    /// Assets handled by one batch poll tick
    pub poll_batch_limit: usize,
    pub upload_approach: UploadApproach,
    /// SQLite database used by the desktop store
    pub database_path: PathBuf,
}

impl std::fmt::Debug for MediaSyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSyncConfig")
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout", &self.request_timeout)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("privacy", &self.privacy)
            .field("delete_on_remove", &self.delete_on_remove)
            .field("container_name", &self.container_name)
            .field("chunk_size", &self.chunk_size)
            .field("max_chunks_per_run", &self.max_chunks_per_run)
            .field("poll_batch_limit", &self.poll_batch_limit)
            .field("upload_approach", &self.upload_approach)
            .field("database_path", &self.database_path)
            .finish()
    }
}

impl Default for MediaSyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            access_token: None,
            privacy: PrivacyView::Default,
            delete_on_remove: false,
            container_name: DEFAULT_CONTAINER_NAME.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_chunks_per_run: DEFAULT_MAX_CHUNKS_PER_RUN,
            poll_batch_limit: DEFAULT_POLL_BATCH_LIMIT,
            upload_approach: UploadApproach::Tus,
            database_path: PathBuf::from("media-sync.db"),
        }
    }
}

impl MediaSyncConfig {
    pub fn builder() -> MediaSyncConfigBuilder {
        MediaSyncConfigBuilder::default()
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Unset or blank variables keep their defaults; malformed values fail.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let invalid = |variable: &str, message: String| Error::InvalidEnv {
            variable: variable.to_string(),
            message,
        };

        let mut builder = Self::builder();

        if let Some(token) = read(ENV_ACCESS_TOKEN) {
            builder = builder.access_token(token);
        }
        if let Some(base) = read(ENV_API_BASE) {
            builder = builder.api_base_url(base);
        }
        if let Some(privacy) = read(ENV_PRIVACY) {
            let privacy = privacy
                .parse::<PrivacyView>()
                .map_err(|e| invalid(ENV_PRIVACY, e.to_string()))?;
            builder = builder.privacy(privacy);
        }
        if let Some(flag) = read(ENV_DELETE_ON_REMOVE) {
            let enabled = parse_flag(&flag)
                .ok_or_else(|| invalid(ENV_DELETE_ON_REMOVE, format!("not a boolean: {}", flag)))?;
            builder = builder.delete_on_remove(enabled);
        }
        if let Some(name) = read(ENV_PROJECT_NAME) {
            builder = builder.container_name(name);
        }
        if let Some(approach) = read(ENV_UPLOAD_APPROACH) {
            let approach = approach
                .parse::<UploadApproach>()
                .map_err(|e| invalid(ENV_UPLOAD_APPROACH, e.to_string()))?;
            builder = builder.upload_approach(approach);
        }
        if let Some(path) = read(ENV_DATABASE) {
            builder = builder.database_path(path);
        }

        builder.build()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        let base = self.api_base_url.trim();
        if !(base.starts_with("https://") || base.starts_with("http://")) {
            return Err(Error::Config(format!(
                "API base URL must be an http(s) URL, got '{}'",
                self.api_base_url
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        if self.container_name.trim().is_empty() {
            return Err(Error::Config("Container name cannot be empty".to_string()));
        }

        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(Error::Config(format!(
                "Chunk size must be between 1 byte and {} bytes",
                MAX_CHUNK_SIZE
            )));
        }

        if self.max_chunks_per_run == 0 {
            return Err(Error::Config(
                "At least one chunk per upload run is required".to_string(),
            ));
        }

        if self.poll_batch_limit == 0 {
            return Err(Error::Config(
                "Poll batch limit must be greater than zero".to_string(),
            ));
        }

        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Builder for [`MediaSyncConfig`]
#[derive(Default)]
pub struct MediaSyncConfigBuilder {
    api_base_url: Option<String>,
    request_timeout: Option<Duration>,
    access_token: Option<String>,
    privacy: Option<PrivacyView>,
    delete_on_remove: Option<bool>,
    container_name: Option<String>,
    chunk_size: Option<u64>,
    max_chunks_per_run: Option<u32>,
    poll_batch_limit: Option<usize>,
    upload_approach: Option<UploadApproach>,
    database_path: Option<PathBuf>,
}

impl MediaSyncConfigBuilder {
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn privacy(mut self, privacy: PrivacyView) -> Self {
        self.privacy = Some(privacy);
        self
    }

    pub fn delete_on_remove(mut self, enabled: bool) -> Self {
        self.delete_on_remove = Some(enabled);
        self
    }

    pub fn container_name(mut self, name: impl Into<String>) -> Self {
        self.container_name = Some(name.into());
        self
    }

    pub fn chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size = Some(bytes);
        self
    }

    pub fn max_chunks_per_run(mut self, chunks: u32) -> Self {
        self.max_chunks_per_run = Some(chunks);
        self
    }

    pub fn poll_batch_limit(mut self, limit: usize) -> Self {
        self.poll_batch_limit = Some(limit);
        self
    }

    pub fn upload_approach(mut self, approach: UploadApproach) -> Self {
        self.upload_approach = Some(approach);
        self
    }

    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Builds the configuration, applying defaults and validating the result.
    pub fn build(self) -> Result<MediaSyncConfig> {
        let defaults = MediaSyncConfig::default();

        let config = MediaSyncConfig {
            api_base_url: self
                .api_base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base_url),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            access_token: self
                .access_token
                .filter(|token| !token.trim().is_empty()),
            privacy: self.privacy.unwrap_or(defaults.privacy),
            delete_on_remove: self.delete_on_remove.unwrap_or(defaults.delete_on_remove),
            container_name: self
                .container_name
                .map(|name| name.trim().to_string())
                .unwrap_or(defaults.container_name),
            chunk_size: self.chunk_size.unwrap_or(defaults.chunk_size),
            max_chunks_per_run: self
                .max_chunks_per_run
                .unwrap_or(defaults.max_chunks_per_run),
            poll_batch_limit: self.poll_batch_limit.unwrap_or(defaults.poll_batch_limit),
            upload_approach: self.upload_approach.unwrap_or(defaults.upload_approach),
            database_path: self.database_path.unwrap_or(defaults.database_path),
        };

        config.validate()?;
        Ok(config)
    }
}
