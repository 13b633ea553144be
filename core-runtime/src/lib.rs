//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the media sync core:
//! - Logging and tracing infrastructure
//! - Configuration management
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the other crates depend on. It
//! establishes the logging conventions (structured `tracing` events, redacted
//! tokens, basename-only paths) and the validated configuration every
//! component reads its tunables from.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{MediaSyncConfig, MediaSyncConfigBuilder, UploadApproach};
pub use error::{Error, Result};
