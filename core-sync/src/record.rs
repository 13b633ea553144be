//! # Sync Records
//!
//! Typed view of the per-asset sync metadata.
//!
//! ## State Machine
//!
//! ```text
//! Unset → Queued ──→ Uploading ──→ Processing → Ready
//!   ↓       ↑          ↺ (burst)
//!   └→ MissingToken
//!
//! Error is reachable from every state and re-enters Queued on retry.
//! ```

use crate::{Result, SyncError};
use bridge_traits::video_host::DeliveredFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Sync status of one asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Never touched by the sync
    #[default]
    Unset,
    /// An upload was requested without an access token
    MissingToken,
    /// Waiting for the remote service to start ingesting
    Queued,
    /// Bytes are still being transferred
    Uploading,
    /// Upload finished, remote transcoding in progress
    Processing,
    Ready,
    Error,
}

impl SyncStatus {
    /// Statuses the batch poller keeps driving
    pub const ACTIVE: [SyncStatus; 3] = [
        SyncStatus::Queued,
        SyncStatus::Uploading,
        SyncStatus::Processing,
    ];

    /// Stored representation; `Unset` is the empty string
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Unset => "",
            SyncStatus::MissingToken => "missing_token",
            SyncStatus::Queued => "queued",
            SyncStatus::Uploading => "uploading",
            SyncStatus::Processing => "processing",
            SyncStatus::Ready => "ready",
            SyncStatus::Error => "error",
        }
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    /// Map a remote object status onto the local vocabulary.
    ///
    /// Remote words are translated, local words pass through unchanged and
    /// anything unrecognized (or absent) counts as still queued.
    pub fn from_remote(remote: Option<&str>) -> Self {
        match remote.map(str::trim).unwrap_or_default() {
            "available" => SyncStatus::Ready,
            "uploading" => SyncStatus::Uploading,
            "transcoding" => SyncStatus::Processing,
            "queued" => SyncStatus::Queued,
            "processing" => SyncStatus::Processing,
            "ready" => SyncStatus::Ready,
            "error" => SyncStatus::Error,
            _ => SyncStatus::Queued,
        }
    }
}

impl FromStr for SyncStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "unset" => Ok(SyncStatus::Unset),
            "missing_token" => Ok(SyncStatus::MissingToken),
            "queued" => Ok(SyncStatus::Queued),
            "uploading" => Ok(SyncStatus::Uploading),
            "processing" => Ok(SyncStatus::Processing),
            "ready" => Ok(SyncStatus::Ready),
            "error" => Ok(SyncStatus::Error),
            _ => Err(SyncError::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Unset => f.write_str("unset"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// How the remote object was created; its presence marks objects this sync owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadSource {
    Tus,
    Pull,
}

impl UploadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadSource::Tus => "tus",
            UploadSource::Pull => "pull",
        }
    }

    /// Parse the stored marker; unknown non-empty values still count as ours.
    pub fn from_stored(value: &str) -> Option<Self> {
        match value.trim() {
            "" => None,
            "pull" => Some(UploadSource::Pull),
            _ => Some(UploadSource::Tus),
        }
    }
}

/// Per-asset sync metadata
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyncRecord {
    /// Remote object URI such as `/videos/123`; empty until one exists
    pub remote_uri: String,
    /// Digits extracted from `remote_uri`
    pub remote_id: String,
    pub status: SyncStatus,
    /// Last failure message; empty when none
    pub last_error: String,
    /// tus session URL, present only while bytes remain to be sent
    pub upload_link: String,
    pub upload_offset: u64,
    pub upload_size: u64,
    /// Set when the asset transitioned into `Ready`
    pub synced_at: Option<DateTime<Utc>>,
    pub upload_source: Option<UploadSource>,
    /// Remote page link
    pub link: String,
    /// Duration in seconds
    pub duration: Option<u64>,
    /// Remote privacy view as reported by the service
    pub privacy: String,
    pub files: Vec<DeliveredFile>,
}

impl SyncRecord {
    pub fn has_remote(&self) -> bool {
        !self.remote_uri.is_empty()
    }

    /// A session that can be resumed instead of renegotiated.
    pub fn has_live_session(&self) -> bool {
        !self.upload_link.is_empty() && self.upload_offset < self.upload_size
    }

    /// Any stored session link, complete or not.
    pub fn has_session_link(&self) -> bool {
        !self.upload_link.is_empty()
    }
}

/// Extract the numeric id from a URI of the form `/videos/<digits>`.
pub fn remote_id_from_uri(uri: &str) -> Option<String> {
    let (_, rest) = uri.split_once("/videos/")?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    (!digits.is_empty()).then_some(digits)
}
