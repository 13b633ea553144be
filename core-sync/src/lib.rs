//! # Media Sync Core
//!
//! Keeps a host's video assets mirrored on a remote video-hosting service.
//!
//! ## Overview
//!
//! This crate owns the per-asset lifecycle:
//! - Opening resumable (tus) upload sessions or pull ingestions
//! - Transferring bytes in bounded, resumable bursts
//! - Polling remote transcoding status with an adaptive backoff
//! - Persisting every step so a crash resumes where it stopped
//!
//! ## Components
//!
//! - **Sync Record** (`record`): Status vocabulary and the typed per-asset record
//! - **Repository** (`repository`): Reads and writes records through the host's `MetadataStore`
//! - **Upload Engine** (`upload`): Chunked tus transfer with offset journaling
//! - **Poll Scheduler** (`poll`): Backoff curve and one-shot status checks
//! - **Sync Orchestrator** (`orchestrator`): Entry points driving the state machine

pub mod error;
pub mod orchestrator;
pub mod poll;
pub mod record;
pub mod repository;
pub mod upload;

pub use error::{Result, SyncError};
pub use orchestrator::{DeleteSummary, SyncOrchestrator};
pub use poll::{next_delay, PollScheduler, CHECK_STATUS_TASK};
pub use record::{remote_id_from_uri, SyncRecord, SyncStatus, UploadSource};
pub use repository::{ContainerCache, RemoteSnapshot, SessionStart, SyncRecordRepository};
pub use upload::{FailureKind, OffsetJournal, UploadEngine, UploadFailure, UploadOutcome};
