//! Storage Abstractions
//!
//! Provides platform-agnostic traits for the host's asset catalog, the per-asset
//! metadata store the sync core annotates assets with, and the credential source.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

/// Opaque identifier of a host asset
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A local media record owned by the host.
///
/// The sync core never creates or deletes assets; it only reads them and
/// annotates them through [`MetadataStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub file_path: PathBuf,
    pub byte_size: u64,
    pub mime_type: String,
    pub title: String,
    pub description: String,
    /// Publicly reachable URL of the file, when the host serves one
    pub public_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Asset {
    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }
}

/// Read access to the host's assets
#[async_trait]
pub trait AssetCatalog: Send + Sync {
    /// Look up an asset; `Ok(None)` when the host no longer knows it.
    async fn get_asset(&self, asset_id: &AssetId) -> Result<Option<Asset>>;
}

/// Per-asset key/value metadata plus a small global option space.
///
/// Every write is an atomic single-field upsert; there are no multi-field
/// transactions. Callers must tolerate a crash between two writes.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::MetadataStore;
///
/// async fn mark_queued(store: &dyn MetadataStore, asset: &AssetId) -> Result<()> {
///     store.set(asset, "status", "queued").await
/// }
/// ```
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Read one field; `Ok(None)` when it was never written or was deleted
    async fn get(&self, asset_id: &AssetId, field: &str) -> Result<Option<String>>;

    /// Write one field
    async fn set(&self, asset_id: &AssetId, field: &str, value: &str) -> Result<()>;

    /// Remove one field
    async fn delete(&self, asset_id: &AssetId, field: &str) -> Result<()>;

    /// Assets whose `field` holds one of `values`, oldest first
    async fn list_by_value(
        &self,
        field: &str,
        values: &[&str],
        limit: usize,
    ) -> Result<Vec<AssetId>>;

    /// Known video assets where `field` is absent or empty, oldest first
    async fn list_missing(&self, field: &str, limit: usize) -> Result<Vec<AssetId>>;

    /// Assets where `field` holds a non-empty value
    async fn list_with(&self, field: &str, limit: usize) -> Result<Vec<AssetId>>;

    /// Remove `field` from every asset
    async fn delete_everywhere(&self, field: &str) -> Result<u64>;

    /// Read a global option
    async fn get_option(&self, key: &str) -> Result<Option<String>>;

    /// Write a global option
    async fn set_option(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a global option
    async fn delete_option(&self, key: &str) -> Result<()>;
}

/// Source of the remote service access token
///
/// An empty token is treated exactly like an absent one.
pub trait CredentialSource: Send + Sync {
    fn access_token(&self) -> Option<String>;

    fn has_token(&self) -> bool {
        self.access_token().is_some()
    }
}

/// Credential source with a fixed token, mostly for tests and embedded hosts
#[derive(Clone, Default)]
pub struct StaticCredentialSource {
    token: Option<String>,
}

impl StaticCredentialSource {
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            token: (!token.trim().is_empty()).then_some(token),
        }
    }

    pub fn empty() -> Self {
        Self { token: None }
    }
}

impl std::fmt::Debug for StaticCredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentialSource")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl CredentialSource for StaticCredentialSource {
    fn access_token(&self) -> Option<String> {
        self.token.clone()
    }
}
