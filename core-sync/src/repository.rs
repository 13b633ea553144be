//! # Sync Record Repository
//!
//! Typed boundary over the host's per-asset key/value store.
//!
//! ## Overview
//!
//! Every [`SyncRecord`] field lives under its own key so single-field writes
//! stay atomic. Values are (de)serialized here and nowhere else; unreadable
//! values degrade to their defaults instead of failing the caller.

use crate::record::{SyncRecord, SyncStatus, UploadSource};
use crate::upload::OffsetJournal;
use crate::Result;
use async_trait::async_trait;
use bridge_traits::storage::{AssetId, MetadataStore};
use bridge_traits::video_host::DeliveredFile;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

// ============================================================================
// Field Keys
// ============================================================================

pub const FIELD_REMOTE_URI: &str = "remote_uri";
pub const FIELD_REMOTE_ID: &str = "remote_id";
pub const FIELD_STATUS: &str = "status";
pub const FIELD_LAST_ERROR: &str = "last_error";
pub const FIELD_UPLOAD_LINK: &str = "upload_link";
pub const FIELD_UPLOAD_OFFSET: &str = "upload_offset";
pub const FIELD_UPLOAD_SIZE: &str = "upload_size";
pub const FIELD_SYNCED_AT: &str = "synced_at";
pub const FIELD_UPLOAD_SOURCE: &str = "upload_source";
pub const FIELD_LINK: &str = "link";
pub const FIELD_DURATION: &str = "duration";
pub const FIELD_PRIVACY: &str = "privacy";
pub const FIELD_FILES: &str = "files";

/// Fields describing the remote object and its upload
const REMOTE_FIELDS: [&str; 11] = [
    FIELD_REMOTE_URI,
    FIELD_REMOTE_ID,
    FIELD_UPLOAD_LINK,
    FIELD_UPLOAD_OFFSET,
    FIELD_UPLOAD_SIZE,
    FIELD_SYNCED_AT,
    FIELD_UPLOAD_SOURCE,
    FIELD_LINK,
    FIELD_DURATION,
    FIELD_PRIVACY,
    FIELD_FILES,
];

/// Every field a record owns
pub const ALL_FIELDS: [&str; 13] = [
    FIELD_REMOTE_URI,
    FIELD_REMOTE_ID,
    FIELD_STATUS,
    FIELD_LAST_ERROR,
    FIELD_UPLOAD_LINK,
    FIELD_UPLOAD_OFFSET,
    FIELD_UPLOAD_SIZE,
    FIELD_SYNCED_AT,
    FIELD_UPLOAD_SOURCE,
    FIELD_LINK,
    FIELD_DURATION,
    FIELD_PRIVACY,
    FIELD_FILES,
];

/// Fields written with empty defaults when an asset is first seen
const INITIAL_FIELDS: [&str; 4] = [
    FIELD_REMOTE_URI,
    FIELD_REMOTE_ID,
    FIELD_STATUS,
    FIELD_LAST_ERROR,
];

pub const OPTION_CONTAINER_URI: &str = "container_uri";
pub const OPTION_CONTAINER_NAME: &str = "container_name";

/// Cached reference to the remote container new uploads are filed under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerCache {
    pub uri: String,
    /// Display name the URI was resolved for
    pub name: String,
}

/// Remote session details persisted when an upload session opens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStart {
    pub remote_uri: String,
    pub remote_id: String,
    pub upload_link: String,
    pub upload_size: u64,
    pub source: UploadSource,
}

/// Remote metadata persisted on every status fetch
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteSnapshot {
    pub link: Option<String>,
    pub duration: Option<u64>,
    pub privacy: Option<String>,
    pub files: Vec<DeliveredFile>,
}

// ============================================================================
// Repository
// ============================================================================

pub struct SyncRecordRepository {
    store: Arc<dyn MetadataStore>,
}

impl SyncRecordRepository {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    async fn read(&self, asset_id: &AssetId, field: &str) -> Result<String> {
        Ok(self.store.get(asset_id, field).await?.unwrap_or_default())
    }

    async fn write(&self, asset_id: &AssetId, field: &str, value: &str) -> Result<()> {
        self.store.set(asset_id, field, value).await?;
        Ok(())
    }

    async fn read_u64(&self, asset_id: &AssetId, field: &str) -> Result<u64> {
        let raw = self.read(asset_id, field).await?;
        if raw.is_empty() {
            return Ok(0);
        }
        Ok(raw.trim().parse().unwrap_or_else(|_| {
            warn!(asset_id = %asset_id, field, value = %raw, "Unreadable number in sync record");
            0
        }))
    }

    /// Load the full record; absent fields take their defaults.
    pub async fn load(&self, asset_id: &AssetId) -> Result<SyncRecord> {
        let status_raw = self.read(asset_id, FIELD_STATUS).await?;
        let status = status_raw.parse::<SyncStatus>().unwrap_or_else(|_| {
            warn!(asset_id = %asset_id, value = %status_raw, "Unknown stored status");
            SyncStatus::Unset
        });

        let synced_at = self
            .read(asset_id, FIELD_SYNCED_AT)
            .await?
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        let duration = self
            .read(asset_id, FIELD_DURATION)
            .await?
            .trim()
            .parse::<u64>()
            .ok();

        let files_raw = self.read(asset_id, FIELD_FILES).await?;
        let files = if files_raw.is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&files_raw).unwrap_or_default()
        };

        Ok(SyncRecord {
            remote_uri: self.read(asset_id, FIELD_REMOTE_URI).await?,
            remote_id: self.read(asset_id, FIELD_REMOTE_ID).await?,
            status,
            last_error: self.read(asset_id, FIELD_LAST_ERROR).await?,
            upload_link: self.read(asset_id, FIELD_UPLOAD_LINK).await?,
            upload_offset: self.read_u64(asset_id, FIELD_UPLOAD_OFFSET).await?,
            upload_size: self.read_u64(asset_id, FIELD_UPLOAD_SIZE).await?,
            synced_at,
            upload_source: UploadSource::from_stored(
                &self.read(asset_id, FIELD_UPLOAD_SOURCE).await?,
            ),
            link: self.read(asset_id, FIELD_LINK).await?,
            duration,
            privacy: self.read(asset_id, FIELD_PRIVACY).await?,
            files,
        })
    }

    /// Write empty defaults for fields that were never written. Idempotent.
    pub async fn initialize(&self, asset_id: &AssetId) -> Result<()> {
        for field in INITIAL_FIELDS {
            if self.store.get(asset_id, field).await?.is_none() {
                self.write(asset_id, field, "").await?;
            }
        }
        Ok(())
    }

    pub async fn set_status(&self, asset_id: &AssetId, status: SyncStatus) -> Result<()> {
        debug!(asset_id = %asset_id, status = %status, "Sync status");
        self.write(asset_id, FIELD_STATUS, status.as_str()).await
    }

    /// Record a failure. A non-empty message always forces `Error`.
    pub async fn record_error(&self, asset_id: &AssetId, message: &str) -> Result<()> {
        warn!(asset_id = %asset_id, error = %message, "Sync failed");
        self.write(asset_id, FIELD_LAST_ERROR, message).await?;
        self.set_status(asset_id, SyncStatus::Error).await
    }

    pub async fn clear_error(&self, asset_id: &AssetId) -> Result<()> {
        self.write(asset_id, FIELD_LAST_ERROR, "").await
    }

    pub async fn set_remote_object(
        &self,
        asset_id: &AssetId,
        remote_uri: &str,
        remote_id: &str,
        source: UploadSource,
    ) -> Result<()> {
        self.write(asset_id, FIELD_REMOTE_URI, remote_uri).await?;
        self.write(asset_id, FIELD_REMOTE_ID, remote_id).await?;
        self.write(asset_id, FIELD_UPLOAD_SOURCE, source.as_str()).await
    }

    /// Persist a freshly opened upload session at offset zero.
    pub async fn start_session(&self, asset_id: &AssetId, session: &SessionStart) -> Result<()> {
        self.set_remote_object(
            asset_id,
            &session.remote_uri,
            &session.remote_id,
            session.source,
        )
        .await?;
        self.write(asset_id, FIELD_UPLOAD_LINK, &session.upload_link)
            .await?;
        self.write(
            asset_id,
            FIELD_UPLOAD_SIZE,
            &session.upload_size.to_string(),
        )
        .await?;
        self.write(asset_id, FIELD_UPLOAD_OFFSET, "0").await?;
        self.clear_error(asset_id).await?;
        self.set_status(asset_id, SyncStatus::Uploading).await
    }

    pub async fn set_offset(&self, asset_id: &AssetId, offset: u64) -> Result<()> {
        self.write(asset_id, FIELD_UPLOAD_OFFSET, &offset.to_string())
            .await
    }

    /// All bytes are on the server: drop the session and wait for transcoding.
    pub async fn complete_upload(&self, asset_id: &AssetId, total_size: u64) -> Result<()> {
        self.set_offset(asset_id, total_size).await?;
        self.write(asset_id, FIELD_UPLOAD_LINK, "").await?;
        self.clear_error(asset_id).await?;
        self.set_status(asset_id, SyncStatus::Processing).await
    }

    /// Forget an upload session the server no longer knows.
    pub async fn drop_session(&self, asset_id: &AssetId) -> Result<()> {
        self.write(asset_id, FIELD_UPLOAD_LINK, "").await?;
        self.set_offset(asset_id, 0).await
    }

    pub async fn save_remote_snapshot(
        &self,
        asset_id: &AssetId,
        snapshot: &RemoteSnapshot,
    ) -> Result<()> {
        if let Some(link) = &snapshot.link {
            self.write(asset_id, FIELD_LINK, link).await?;
        }
        if let Some(duration) = snapshot.duration {
            self.write(asset_id, FIELD_DURATION, &duration.to_string())
                .await?;
        }
        if let Some(privacy) = &snapshot.privacy {
            self.write(asset_id, FIELD_PRIVACY, privacy).await?;
        }
        let files = serde_json::to_string(&snapshot.files).unwrap_or_else(|_| "[]".to_string());
        self.write(asset_id, FIELD_FILES, &files).await
    }

    pub async fn mark_synced(&self, asset_id: &AssetId, at: DateTime<Utc>) -> Result<()> {
        self.write(asset_id, FIELD_SYNCED_AT, &at.timestamp().to_string())
            .await
    }

    /// Forget the remote object and any upload session, keeping status.
    pub async fn clear_remote(&self, asset_id: &AssetId) -> Result<()> {
        for field in REMOTE_FIELDS {
            self.store.delete(asset_id, field).await?;
        }
        self.clear_error(asset_id).await
    }

    /// Reset the record to its defaults.
    pub async fn clear_all(&self, asset_id: &AssetId) -> Result<()> {
        for field in ALL_FIELDS {
            self.store.delete(asset_id, field).await?;
        }
        Ok(())
    }

    /// Reset every record in the store; returns the number of removed values.
    pub async fn clear_everywhere(&self) -> Result<u64> {
        let mut removed = 0;
        for field in ALL_FIELDS {
            removed += self.store.delete_everywhere(field).await?;
        }
        Ok(removed)
    }

    /// Assets in any of `statuses`, oldest first.
    pub async fn list_by_status(
        &self,
        statuses: &[SyncStatus],
        limit: usize,
    ) -> Result<Vec<AssetId>> {
        let values: Vec<&str> = statuses.iter().map(SyncStatus::as_str).collect();
        Ok(self
            .store
            .list_by_value(FIELD_STATUS, &values, limit)
            .await?)
    }

    /// Video assets without a remote object.
    pub async fn list_missing_remote(&self, limit: usize) -> Result<Vec<AssetId>> {
        Ok(self.store.list_missing(FIELD_REMOTE_URI, limit).await?)
    }

    /// Assets whose remote object was created by this sync.
    pub async fn list_owned_remote(&self, limit: usize) -> Result<Vec<AssetId>> {
        Ok(self.store.list_with(FIELD_UPLOAD_SOURCE, limit).await?)
    }

    pub async fn container_cache(&self) -> Result<Option<ContainerCache>> {
        let uri = self
            .store
            .get_option(OPTION_CONTAINER_URI)
            .await?
            .unwrap_or_default();
        if uri.is_empty() {
            return Ok(None);
        }
        let name = self
            .store
            .get_option(OPTION_CONTAINER_NAME)
            .await?
            .unwrap_or_default();
        Ok(Some(ContainerCache { uri, name }))
    }

    pub async fn set_container_cache(&self, cache: &ContainerCache) -> Result<()> {
        self.store
            .set_option(OPTION_CONTAINER_URI, &cache.uri)
            .await?;
        self.store
            .set_option(OPTION_CONTAINER_NAME, &cache.name)
            .await?;
        Ok(())
    }

    pub async fn invalidate_container_cache(&self) -> Result<()> {
        self.store.delete_option(OPTION_CONTAINER_URI).await?;
        self.store.delete_option(OPTION_CONTAINER_NAME).await?;
        Ok(())
    }
}

#[async_trait]
impl OffsetJournal for SyncRecordRepository {
    async fn persist_offset(&self, asset_id: &AssetId, offset: u64) -> Result<()> {
        self.set_offset(asset_id, offset).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::SqliteMetadataStore;

    async fn repository() -> SyncRecordRepository {
        let store = SqliteMetadataStore::in_memory().await.unwrap();
        SyncRecordRepository::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_load_defaults() {
        let repo = repository().await;
        let record = repo.load(&AssetId::new("1")).await.unwrap();
        assert_eq!(record, SyncRecord::default());
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let repo = repository().await;
        let id = AssetId::new("1");

        repo.initialize(&id).await.unwrap();
        repo.set_status(&id, SyncStatus::Queued).await.unwrap();
        repo.initialize(&id).await.unwrap();

        assert_eq!(repo.load(&id).await.unwrap().status, SyncStatus::Queued);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let repo = repository().await;
        let id = AssetId::new("5");

        repo.start_session(
            &id,
            &SessionStart {
                remote_uri: "/videos/555".to_string(),
                remote_id: "555".to_string(),
                upload_link: "https://files.example/tus/555".to_string(),
                upload_size: 100,
                source: UploadSource::Tus,
            },
        )
        .await
        .unwrap();
        repo.persist_offset(&id, 40).await.unwrap();

        let record = repo.load(&id).await.unwrap();
        assert_eq!(record.status, SyncStatus::Uploading);
        assert_eq!(record.upload_offset, 40);
        assert_eq!(record.upload_size, 100);
        assert_eq!(record.upload_source, Some(UploadSource::Tus));
        assert!(record.has_live_session());

        repo.complete_upload(&id, 100).await.unwrap();
        let record = repo.load(&id).await.unwrap();
        assert_eq!(record.status, SyncStatus::Processing);
        assert_eq!(record.upload_offset, 100);
        assert!(record.upload_link.is_empty());
    }

    #[tokio::test]
    async fn test_record_error_forces_status() {
        let repo = repository().await;
        let id = AssetId::new("2");

        repo.set_status(&id, SyncStatus::Uploading).await.unwrap();
        repo.record_error(&id, "HTTP 500: boom").await.unwrap();

        let record = repo.load(&id).await.unwrap();
        assert_eq!(record.status, SyncStatus::Error);
        assert_eq!(record.last_error, "HTTP 500: boom");
    }

    #[tokio::test]
    async fn test_snapshot_and_synced_at() {
        let repo = repository().await;
        let id = AssetId::new("3");
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        repo.save_remote_snapshot(
            &id,
            &RemoteSnapshot {
                link: Some("https://vimeo.com/555".to_string()),
                duration: Some(93),
                privacy: Some("unlisted".to_string()),
                files: vec![DeliveredFile {
                    quality: Some("hls".to_string()),
                    link: Some("https://cdn.example/master.m3u8".to_string()),
                    ..Default::default()
                }],
            },
        )
        .await
        .unwrap();
        repo.mark_synced(&id, at).await.unwrap();

        let record = repo.load(&id).await.unwrap();
        assert_eq!(record.link, "https://vimeo.com/555");
        assert_eq!(record.duration, Some(93));
        assert_eq!(record.privacy, "unlisted");
        assert_eq!(record.files.len(), 1);
        assert_eq!(record.synced_at, Some(at));
    }

    #[tokio::test]
    async fn test_clear_remote_keeps_status() {
        let repo = repository().await;
        let id = AssetId::new("4");

        repo.set_remote_object(&id, "/videos/9", "9", UploadSource::Pull)
            .await
            .unwrap();
        repo.record_error(&id, "broken").await.unwrap();
        repo.clear_remote(&id).await.unwrap();

        let record = repo.load(&id).await.unwrap();
        assert!(!record.has_remote());
        assert!(record.upload_source.is_none());
        assert!(record.last_error.is_empty());
        assert_eq!(record.status, SyncStatus::Error);

        repo.clear_all(&id).await.unwrap();
        assert_eq!(repo.load(&id).await.unwrap(), SyncRecord::default());
    }

    #[tokio::test]
    async fn test_container_cache() {
        let repo = repository().await;
        assert!(repo.container_cache().await.unwrap().is_none());

        let cache = ContainerCache {
            uri: "/users/1/projects/9".to_string(),
            name: "Media Sync".to_string(),
        };
        repo.set_container_cache(&cache).await.unwrap();
        assert_eq!(repo.container_cache().await.unwrap(), Some(cache));

        repo.invalidate_container_cache().await.unwrap();
        assert!(repo.container_cache().await.unwrap().is_none());
    }
}
