//! # Sync Orchestrator
//!
//! Per-asset state machine driving uploads and status polling.
//!
//! ## Overview
//!
//! The orchestrator is the only writer of sync records. Each entry point
//! reads the asset's record, consults the remote service, hands byte transfer
//! to the [`UploadEngine`] and asks the [`PollScheduler`] for a follow-up
//! check when work remains.
//!
//! Remote and upload failures never escape an entry point: they are
//! persisted as `status = error` plus `last_error`, and the next scheduled
//! check retries. Only failures of the record store itself surface as `Err`.
//!
//! ## Workflow
//!
//! ### New upload
//! 1. Resume a live session if one exists
//! 2. Require an access token (`missing_token` otherwise)
//! 3. Skip assets that already have a remote object
//! 4. Resolve the container (cached URI, else find-or-create by name)
//! 5. Open a tus session sized to the file; relax privacy once on rejection
//! 6. File the object in the container, run the first burst, schedule a check
//!
//! ### Status check
//! 1. Continue an unfinished upload; reschedule while bytes remain
//! 2. Fetch remote metadata and map its status
//! 3. Persist metadata, stamp `synced_at` the first time it is `ready`
//! 4. Schedule the next check per the backoff curve
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::SyncOrchestrator;
//!
//! orchestrator.on_new_asset(&asset_id).await?;
//! // later, from the background executor
//! orchestrator.on_poll_tick(Some(&asset_id)).await?;
//! ```

use crate::poll::{next_delay, PollScheduler};
use crate::record::{remote_id_from_uri, SyncRecord, SyncStatus, UploadSource};
use crate::repository::{ContainerCache, RemoteSnapshot, SessionStart, SyncRecordRepository};
use crate::upload::{FailureKind, UploadEngine, UploadOutcome};
use crate::{Result, SyncError};
use bridge_traits::background::BackgroundExecutor;
use bridge_traits::storage::{Asset, AssetCatalog, AssetId, CredentialSource, MetadataStore};
use bridge_traits::time::Clock;
use bridge_traits::video_host::{ApiResponse, PrivacyView, RemoteVideo, UploadSessionRequest, VideoHost};
use core_runtime::config::{MediaSyncConfig, UploadApproach};
use core_runtime::logging::strip_path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Upper bound for bulk maintenance operations
const BULK_LIMIT: usize = 10_000;

/// Outcome of one upload burst, as far as scheduling is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BurstResult {
    /// All bytes acknowledged; the record is now `processing`
    Completed,
    /// Budget exhausted with bytes remaining
    Pending,
    /// Failed, but the session is intact and a later burst may succeed
    Retry,
    /// Failed in a way another burst will not fix
    Halted,
}

/// Counts reported by bulk remote deletion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    pub deleted: usize,
    pub failed: usize,
}

pub struct SyncOrchestrator {
    config: MediaSyncConfig,
    catalog: Arc<dyn AssetCatalog>,
    records: Arc<SyncRecordRepository>,
    host: Arc<dyn VideoHost>,
    credentials: Arc<dyn CredentialSource>,
    engine: UploadEngine,
    scheduler: PollScheduler,
}

impl SyncOrchestrator {
    /// Create an orchestrator over the host's capabilities.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated sync configuration
    /// * `catalog` - Read access to the host's assets
    /// * `store` - Per-asset metadata and global options
    /// * `host` - Remote video service
    /// * `credentials` - Access token lookup
    /// * `executor` - One-shot scheduler for status checks
    /// * `clock` - Time source for ages and schedules
    pub fn new(
        config: MediaSyncConfig,
        catalog: Arc<dyn AssetCatalog>,
        store: Arc<dyn MetadataStore>,
        host: Arc<dyn VideoHost>,
        credentials: Arc<dyn CredentialSource>,
        executor: Arc<dyn BackgroundExecutor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let engine = UploadEngine::new(host.clone(), &config);
        Self {
            config,
            catalog,
            records: Arc::new(SyncRecordRepository::new(store)),
            host,
            credentials,
            engine,
            scheduler: PollScheduler::new(executor, clock),
        }
    }

    pub fn config(&self) -> &MediaSyncConfig {
        &self.config
    }

    /// Current sync record for an asset.
    pub async fn record(&self, asset_id: &AssetId) -> Result<SyncRecord> {
        self.records.load(asset_id).await
    }

    async fn video_asset(&self, asset_id: &AssetId) -> Result<Option<Asset>> {
        match self.catalog.get_asset(asset_id).await? {
            Some(asset) if asset.is_video() => Ok(Some(asset)),
            Some(_) => {
                debug!(asset_id = %asset_id, "Not a video, ignoring");
                Ok(None)
            }
            None => {
                warn!(asset_id = %asset_id, "Asset not found");
                Ok(None)
            }
        }
    }

    // ========================================================================
    // New assets
    // ========================================================================

    /// A video was added to the host's content store.
    #[instrument(skip(self), fields(asset_id = %asset_id))]
    pub async fn on_new_asset(&self, asset_id: &AssetId) -> Result<()> {
        if self.video_asset(asset_id).await?.is_none() {
            return Ok(());
        }

        self.records.initialize(asset_id).await?;
        if self.records.load(asset_id).await?.has_remote() {
            debug!("Already synced");
            return Ok(());
        }

        self.on_new_asset_upload(asset_id, false).await
    }

    /// Start (or resume) the upload of one asset.
    ///
    /// `force` restarts from scratch when there is no live session; it never
    /// replaces a remote object that is not in error.
    #[instrument(skip(self), fields(asset_id = %asset_id))]
    pub async fn on_new_asset_upload(&self, asset_id: &AssetId, force: bool) -> Result<()> {
        let Some(asset) = self.video_asset(asset_id).await? else {
            return Ok(());
        };
        let record = self.records.load(asset_id).await?;

        if record.has_live_session() {
            info!(
                offset = record.upload_offset,
                size = record.upload_size,
                "Resuming existing upload session"
            );
            let burst = self.run_burst(&asset, &record).await?;
            return self.schedule_after_burst(&asset, burst).await;
        }

        if !self.credentials.has_token() {
            info!(error = %SyncError::MissingToken, "Upload not started");
            self.records.clear_error(asset_id).await?;
            self.records
                .set_status(asset_id, SyncStatus::MissingToken)
                .await?;
            return Ok(());
        }

        if record.has_remote() && record.status != SyncStatus::Error {
            debug!(uri = %record.remote_uri, "Already synced, skipping upload");
            return Ok(());
        }

        let container_uri = self.resolve_container().await?;

        if record.status == SyncStatus::Error || force {
            debug!(force, "Clearing previous remote identifiers");
            self.records.clear_remote(asset_id).await?;
        }
        self.records.set_status(asset_id, SyncStatus::Queued).await?;

        if self.config.upload_approach == UploadApproach::Pull {
            match asset.public_url.as_deref().filter(|url| !url.is_empty()) {
                Some(url) => {
                    return self
                        .start_pull(&asset, url, container_uri.as_deref())
                        .await
                }
                None => debug!("No public URL, uploading the file instead"),
            }
        }

        self.start_tus(&asset, container_uri.as_deref()).await
    }

    async fn start_tus(&self, asset: &Asset, container_uri: Option<&str>) -> Result<()> {
        let asset_id = &asset.id;
        let path = asset.file_path.to_string_lossy();
        let file_name = strip_path(&path);

        let size = match tokio::fs::metadata(&asset.file_path).await {
            Ok(metadata) if metadata.is_file() => metadata.len(),
            Ok(_) => {
                let error = SyncError::LocalIo(format!("{} is not a regular file", file_name));
                return self.records.record_error(asset_id, &error.to_string()).await;
            }
            Err(e) => {
                let error = SyncError::LocalIo(format!("cannot access {}: {}", file_name, e));
                return self.records.record_error(asset_id, &error.to_string()).await;
            }
        };

        let request = UploadSessionRequest {
            size,
            title: display_title(asset, file_name),
            description: asset.description.clone(),
            privacy: self.config.privacy,
        };

        let mut response = self.host.create_resumable_session(&request).await;
        if !response.success
            && !request.privacy.is_default()
            && response.is_validation_error_for("privacy")
        {
            warn!(privacy = %request.privacy, "Privacy setting rejected, retrying without it");
            response = self
                .host
                .create_resumable_session(&UploadSessionRequest {
                    privacy: PrivacyView::Default,
                    ..request.clone()
                })
                .await;
        }

        if !response.success {
            return self.record_remote_failure(asset_id, &response).await;
        }

        let (Some(remote_uri), Some(upload_link)) = (
            response.str_at("/uri"),
            response.str_at("/upload/upload_link"),
        ) else {
            let error = SyncError::Protocol("upload session response lacks uri or upload link".into());
            return self.records.record_error(asset_id, &error.to_string()).await;
        };

        info!(uri = %remote_uri, size, file = %file_name, "Opened upload session");
        self.records
            .start_session(
                asset_id,
                &SessionStart {
                    remote_uri: remote_uri.to_string(),
                    remote_id: remote_id_from_uri(remote_uri).unwrap_or_default(),
                    upload_link: upload_link.to_string(),
                    upload_size: size,
                    source: UploadSource::Tus,
                },
            )
            .await?;

        self.file_in_container(container_uri, remote_uri).await;

        let record = self.records.load(asset_id).await?;
        let burst = self.run_burst(asset, &record).await?;
        self.schedule_after_burst(asset, burst).await
    }

    async fn start_pull(&self, asset: &Asset, url: &str, container_uri: Option<&str>) -> Result<()> {
        let asset_id = &asset.id;
        let path = asset.file_path.to_string_lossy();
        let title = display_title(asset, strip_path(&path));

        let response = self
            .host
            .create_remote_object_from_url(url, &title, &asset.description)
            .await;
        if !response.success {
            return self.record_remote_failure(asset_id, &response).await;
        }
        let Some(remote_uri) = response.str_at("/uri") else {
            let error = SyncError::Protocol("pull response lacks uri".into());
            return self.records.record_error(asset_id, &error.to_string()).await;
        };

        info!(uri = %remote_uri, "Requested pull ingestion");
        self.records
            .set_remote_object(
                asset_id,
                remote_uri,
                &remote_id_from_uri(remote_uri).unwrap_or_default(),
                UploadSource::Pull,
            )
            .await?;
        self.records.clear_error(asset_id).await?;
        self.records.set_status(asset_id, SyncStatus::Queued).await?;

        self.file_in_container(container_uri, remote_uri).await;

        let record = self.records.load(asset_id).await?;
        self.schedule_next(asset, &record, SyncStatus::Queued, None)
            .await;
        Ok(())
    }

    /// Cached container first; a renamed or vanished container falls back to
    /// find-or-create and refreshes the cache.
    async fn resolve_container(&self) -> Result<Option<String>> {
        let name = self.config.container_name.as_str();

        if let Some(cache) = self.records.container_cache().await? {
            if cache.name == name {
                if let Some(container) = self.host.get_container(&cache.uri).await {
                    return Ok(Some(container.uri));
                }
                debug!(uri = %cache.uri, "Cached container is stale");
            } else {
                debug!(cached = %cache.name, configured = %name, "Container name changed");
            }
            self.records.invalidate_container_cache().await?;
        }

        match self.host.find_or_create_container(name).await {
            Some(container) => {
                self.records
                    .set_container_cache(&ContainerCache {
                        uri: container.uri.clone(),
                        name: name.to_string(),
                    })
                    .await?;
                Ok(Some(container.uri))
            }
            None => {
                warn!(name = %name, "Could not resolve container, uploading without one");
                Ok(None)
            }
        }
    }

    /// Persist a failed remote call as the asset's last error.
    async fn record_remote_failure(&self, asset_id: &AssetId, response: &ApiResponse) -> Result<()> {
        let message = response.error_message();
        let error = SyncError::from_response(response.status_code, message.as_str());
        debug!(retryable = error.is_retryable(), error = %error, "Remote call failed");
        self.records.record_error(asset_id, &message).await
    }

    async fn file_in_container(&self, container_uri: Option<&str>, object_uri: &str) {
        let Some(container_uri) = container_uri else {
            return;
        };
        let response = self.host.add_to_container(container_uri, object_uri).await;
        if !response.success {
            warn!(error = %response.error_message(), "Failed to add video to container");
        }
    }

    // ========================================================================
    // Upload bursts
    // ========================================================================

    async fn run_burst(&self, asset: &Asset, record: &SyncRecord) -> Result<BurstResult> {
        let outcome = self
            .engine
            .resume_upload(
                asset,
                &record.upload_link,
                record.upload_offset,
                record.upload_size,
                self.records.as_ref(),
            )
            .await;
        self.apply_outcome(asset, record, outcome).await
    }

    async fn apply_outcome(
        &self,
        asset: &Asset,
        record: &SyncRecord,
        outcome: UploadOutcome,
    ) -> Result<BurstResult> {
        let asset_id = &asset.id;

        if outcome.success {
            if outcome.completed {
                info!("Upload complete, waiting for transcoding");
                self.records
                    .complete_upload(asset_id, record.upload_size)
                    .await?;
                return Ok(BurstResult::Completed);
            }
            self.records.clear_error(asset_id).await?;
            self.records
                .set_status(asset_id, SyncStatus::Uploading)
                .await?;
            return Ok(BurstResult::Pending);
        }

        let Some(failure) = outcome.error else {
            return Ok(BurstResult::Retry);
        };
        if failure.kind == FailureKind::Store {
            return Err(failure.into());
        }

        if failure.kind == FailureKind::SessionExpired {
            info!("Upload session expired, the next upload opens a new one");
            self.records.drop_session(asset_id).await?;
        }

        let retryable = failure.is_retryable();
        let error = SyncError::from(failure);
        self.records
            .record_error(asset_id, &error.to_string())
            .await?;

        Ok(if retryable {
            BurstResult::Retry
        } else {
            BurstResult::Halted
        })
    }

    async fn schedule_after_burst(&self, asset: &Asset, burst: BurstResult) -> Result<()> {
        let mapped = match burst {
            BurstResult::Halted => return Ok(()),
            BurstResult::Completed => SyncStatus::Processing,
            BurstResult::Pending => SyncStatus::Uploading,
            // Nothing moved, so the failed session ages like any other error
            BurstResult::Retry => SyncStatus::Error,
        };
        let record = self.records.load(&asset.id).await?;
        self.schedule_next(asset, &record, mapped, None).await;
        Ok(())
    }

    async fn schedule_next(
        &self,
        asset: &Asset,
        record: &SyncRecord,
        mapped: SyncStatus,
        transcode: Option<&str>,
    ) {
        let delay = next_delay(asset, record, mapped, transcode, self.scheduler.now());
        if let Err(e) = self.scheduler.schedule(&asset.id, delay).await {
            warn!(asset_id = %asset.id, error = %e, "Failed to schedule status check");
        }
    }

    // ========================================================================
    // Status polling
    // ========================================================================

    /// Scheduled check for one asset, or for a bounded batch of active ones.
    #[instrument(skip(self))]
    pub async fn on_poll_tick(&self, asset_id: Option<&AssetId>) -> Result<()> {
        if !self.credentials.has_token() {
            debug!("No access token configured, skipping status check");
            return Ok(());
        }

        let asset_ids = match asset_id {
            Some(asset_id) => vec![asset_id.clone()],
            None => self.poll_batch().await?,
        };

        debug!(count = asset_ids.len(), "Checking sync status");
        for asset_id in &asset_ids {
            self.check_asset(asset_id).await?;
        }
        Ok(())
    }

    /// Manual refresh of one asset's status.
    pub async fn refresh_status(&self, asset_id: &AssetId) -> Result<()> {
        self.on_poll_tick(Some(asset_id)).await
    }

    async fn poll_batch(&self) -> Result<Vec<AssetId>> {
        let limit = self.config.poll_batch_limit;
        let mut asset_ids = self
            .records
            .list_by_status(&SyncStatus::ACTIVE, limit)
            .await?;

        if asset_ids.len() < limit {
            for asset_id in self
                .records
                .list_by_status(&[SyncStatus::Error], limit)
                .await?
            {
                if asset_ids.len() >= limit {
                    break;
                }
                if self.retry_due(&asset_id).await? {
                    asset_ids.push(asset_id);
                }
            }
        }
        Ok(asset_ids)
    }

    /// A failed session is retried by the batch only inside the polling horizon.
    async fn retry_due(&self, asset_id: &AssetId) -> Result<bool> {
        let record = self.records.load(asset_id).await?;
        if !record.has_live_session() {
            return Ok(false);
        }
        let Some(asset) = self.catalog.get_asset(asset_id).await? else {
            return Ok(false);
        };
        let delay = next_delay(&asset, &record, SyncStatus::Error, None, self.scheduler.now());
        Ok(delay > 0)
    }

    async fn check_asset(&self, asset_id: &AssetId) -> Result<()> {
        let Some(asset) = self.video_asset(asset_id).await? else {
            return Ok(());
        };
        let mut record = self.records.load(asset_id).await?;

        // A stored link means the session was never closed, even at full offset
        if record.has_session_link() {
            match self.run_burst(&asset, &record).await? {
                BurstResult::Completed => {}
                burst => return self.schedule_after_burst(&asset, burst).await,
            }
            record = self.records.load(asset_id).await?;
        }

        if !record.has_remote() {
            debug!(asset_id = %asset_id, "No remote object to check");
            return Ok(());
        }

        let response = self.host.get_object(&record.remote_uri).await;
        if !response.success {
            self.record_remote_failure(asset_id, &response).await?;
            let record = self.records.load(asset_id).await?;
            self.schedule_next(&asset, &record, SyncStatus::Error, None)
                .await;
            return Ok(());
        }

        let video: RemoteVideo = response.parse().unwrap_or_default();
        let mapped = SyncStatus::from_remote(video.status.as_deref());
        let transcode = video.transcode_status();

        self.records
            .save_remote_snapshot(
                asset_id,
                &RemoteSnapshot {
                    link: video.link.clone(),
                    duration: video.duration,
                    privacy: video.privacy_view().map(str::to_string),
                    files: video.files.clone(),
                },
            )
            .await?;

        if mapped == SyncStatus::Error {
            self.records
                .record_error(asset_id, "remote service reported a processing error")
                .await?;
        } else {
            self.records.clear_error(asset_id).await?;
            self.records.set_status(asset_id, mapped).await?;
            if mapped == SyncStatus::Ready && record.synced_at.is_none() {
                let now = self.scheduler.now();
                info!(asset_id = %asset_id, "Video is ready");
                self.records.mark_synced(asset_id, now).await?;
                record.synced_at = Some(now);
            }
        }

        self.schedule_next(&asset, &record, mapped, transcode).await;
        Ok(())
    }

    // ========================================================================
    // Deletion and maintenance
    // ========================================================================

    /// The local asset was deleted.
    ///
    /// The remote object is removed only when enabled by configuration and
    /// only for objects this sync created.
    #[instrument(skip(self), fields(asset_id = %asset_id))]
    pub async fn on_asset_deleted(&self, asset_id: &AssetId) -> Result<()> {
        if let Err(e) = self.scheduler.cancel(asset_id).await {
            warn!(error = %e, "Failed to cancel pending status check");
        }

        if !self.config.delete_on_remove {
            debug!("Remote deletion disabled");
            return Ok(());
        }

        let record = self.records.load(asset_id).await?;
        if record.upload_source.is_none() || !record.has_remote() {
            debug!("No owned remote object, nothing to delete");
            return Ok(());
        }

        self.delete_remote(asset_id, &record).await?;
        Ok(())
    }

    /// Delete the remote object; the record is cleared only on confirmed
    /// success.
    async fn delete_remote(&self, asset_id: &AssetId, record: &SyncRecord) -> Result<bool> {
        let response = self.host.delete_object(&record.remote_uri).await;
        if response.success {
            info!(asset_id = %asset_id, uri = %record.remote_uri, "Deleted remote video");
            self.records.clear_all(asset_id).await?;
            Ok(true)
        } else {
            self.record_remote_failure(asset_id, &response).await?;
            Ok(false)
        }
    }

    /// Start uploads for video assets that have no remote object yet.
    pub async fn sync_missing(&self, limit: usize) -> Result<usize> {
        let asset_ids = self.records.list_missing_remote(limit).await?;
        info!(count = asset_ids.len(), "Syncing videos without a remote copy");

        for asset_id in &asset_ids {
            self.on_new_asset_upload(asset_id, false).await?;
        }
        Ok(asset_ids.len())
    }

    /// Reset every sync record and the container cache.
    pub async fn clear_all_metadata(&self) -> Result<u64> {
        if let Err(e) = self.scheduler.cancel_all().await {
            warn!(error = %e, "Failed to cancel pending status checks");
        }
        let removed = self.records.clear_everywhere().await?;
        self.records.invalidate_container_cache().await?;
        info!(removed, "Cleared all sync metadata");
        Ok(removed)
    }

    /// Delete every remote object this sync created.
    pub async fn delete_all_remote(&self) -> Result<DeleteSummary> {
        let mut summary = DeleteSummary::default();

        for asset_id in self.records.list_owned_remote(BULK_LIMIT).await? {
            let record = self.records.load(&asset_id).await?;
            if !record.has_remote() {
                continue;
            }
            if self.delete_remote(&asset_id, &record).await? {
                summary.deleted += 1;
                if let Err(e) = self.scheduler.cancel(&asset_id).await {
                    warn!(asset_id = %asset_id, error = %e, "Failed to cancel status check");
                }
            } else {
                summary.failed += 1;
            }
        }

        info!(
            deleted = summary.deleted,
            failed = summary.failed,
            "Bulk remote deletion finished"
        );
        Ok(summary)
    }
}

fn display_title(asset: &Asset, file_name: &str) -> String {
    if asset.title.trim().is_empty() {
        file_name.to_string()
    } else {
        asset.title.clone()
    }
}
