//! # Host Bridge Traits
//!
//! Capability traits the media sync core requires from its host.
//!
//! ## Overview
//!
//! This crate defines the contract between the sync core and platform-specific
//! implementations. Each trait represents a capability that the core needs but
//! that the host provides: the content store that owns the video assets, the
//! job scheduler, the HTTP stack and the place the access token lives.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with timeouts
//! - [`VideoHost`](video_host::VideoHost) - Remote video-hosting operations (objects,
//!   containers, resumable upload sessions)
//!
//! ### Storage
//! - [`MetadataStore`](storage::MetadataStore) - Per-asset key/value metadata plus
//!   global options
//! - [`AssetCatalog`](storage::AssetCatalog) - Read access to the host's video assets
//! - [`CredentialSource`](storage::CredentialSource) - Access token lookup
//!
//! ### Scheduling
//! - [`BackgroundExecutor`](background::BackgroundExecutor) - One-shot delayed
//!   callbacks with at most one pending entry per task id
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ In Progress |
//! | Server   | TBD                 | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert platform-specific errors to `BridgeError` and
//! include enough context (asset id, field, URL) to act on the message.
//!
//! The one exception is [`VideoHost`](video_host::VideoHost): remote failures are
//! data, not errors, and come back as tagged [`ApiResponse`](video_host::ApiResponse)
//! values so callers can persist them.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent usage
//! across async tasks.

pub mod background;
pub mod error;
pub mod http;
pub mod storage;
pub mod time;
pub mod video_host;

pub use error::BridgeError;

// Re-export commonly used types
pub use background::{BackgroundExecutor, TaskId, TaskStatus};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use storage::{
    Asset, AssetCatalog, AssetId, CredentialSource, MetadataStore, StaticCredentialSource,
};
pub use time::{Clock, SystemClock};
pub use video_host::{
    ApiResponse, DeliveredFile, OffsetProbe, PrivacyView, RemoteContainer, RemoteVideo,
    UploadReceipt, UploadSessionRequest, VideoHost,
};
