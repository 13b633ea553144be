//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop and server hosts
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `MetadataStore` + `AssetCatalog` using a SQLite database
//! - `BackgroundExecutor` using Tokio timers
//! - `CredentialSource` reading the access token from the environment
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteMetadataStore, TokioBackgroundExecutor};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let store = SqliteMetadataStore::new("media-sync.db".into()).await?;
//!     let executor = TokioBackgroundExecutor::new();
//!
//!     // Hand these to core_service::MediaSyncDependencies
//!     Ok(())
//! }
//! ```

mod background;
mod credentials;
mod http;
mod metadata_store;

pub use background::TokioBackgroundExecutor;
pub use credentials::{EnvCredentialSource, ACCESS_TOKEN_ENV};
pub use http::ReqwestHttpClient;
pub use metadata_store::SqliteMetadataStore;
