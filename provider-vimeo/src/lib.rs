//! # Vimeo Provider
//!
//! Implements the `VideoHost` trait against the Vimeo REST API v3.4.
//!
//! ## Overview
//!
//! This crate provides:
//! - Project lookup/creation with paginated name search
//! - Video creation for pull ingestion and for tus resumable uploads
//! - tus 1.0.0 offset probes (`HEAD`) and chunk submission (`PATCH`)
//! - Player embed URLs, HLS lookup and status labels for front ends

pub mod client;
pub mod error;
pub mod playback;
pub mod types;

pub use client::VimeoClient;
pub use error::{Result, VimeoError};
pub use playback::{embed_html, embed_url, hls_link, status_label, EmbedOptions};
