//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, asset catalog,
//! metadata store, credentials, scheduler) into the media sync core and maps
//! host events onto orchestrator entry points. Desktop and server hosts
//! typically enable the `desktop-shims` feature (which depends on
//! `bridge-desktop`) and call [`bootstrap_desktop`].

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{
    background::BackgroundExecutor,
    http::HttpClient,
    storage::{AssetCatalog, AssetId, CredentialSource, MetadataStore},
    time::Clock,
    video_host::VideoHost,
};
use core_runtime::config::MediaSyncConfig;
use core_sync::{DeleteSummary, SyncOrchestrator, SyncStatus};
use provider_vimeo::{embed_html, embed_url, hls_link, status_label, EmbedOptions, VimeoClient};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[cfg(feature = "desktop-shims")]
use bridge_desktop::{
    EnvCredentialSource, ReqwestHttpClient, SqliteMetadataStore, TokioBackgroundExecutor,
};

const EMBED_WIDTH: u32 = 640;
const EMBED_HEIGHT: u32 = 360;

/// Aggregated handle to all bridge dependencies the core requires.
pub struct MediaSyncDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub catalog: Arc<dyn AssetCatalog>,
    pub metadata_store: Arc<dyn MetadataStore>,
    pub credentials: Arc<dyn CredentialSource>,
    pub executor: Arc<dyn BackgroundExecutor>,
    pub clock: Arc<dyn Clock>,
}

impl MediaSyncDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        catalog: Arc<dyn AssetCatalog>,
        metadata_store: Arc<dyn MetadataStore>,
        credentials: Arc<dyn CredentialSource>,
        executor: Arc<dyn BackgroundExecutor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http_client,
            catalog,
            metadata_store,
            credentials,
            executor,
            clock,
        }
    }
}

/// External triggers, each mapped to one orchestrator entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    AssetCreated { asset_id: AssetId },
    AssetDeleted { asset_id: AssetId },
    /// Scheduled tick; without an asset id the batch poller runs
    StatusCheckDue { asset_id: Option<AssetId> },
    RefreshStatus { asset_id: AssetId },
    SyncAsset { asset_id: AssetId, force: bool },
    SyncMissing { limit: usize },
    ClearAllMetadata,
    DeleteAllRemote,
}

/// What a dispatched event did, for hosts that report back to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchReport {
    Done,
    Synced(usize),
    Cleared(u64),
    Deleted(DeleteSummary),
}

/// Playback data for one asset, ready for a front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackInfo {
    pub status: SyncStatus,
    pub status_label: String,
    pub remote_id: String,
    pub link: String,
    pub embed_url: Option<String>,
    pub embed_html: Option<String>,
    pub hls_url: Option<String>,
    pub duration: Option<u64>,
    pub last_error: String,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct MediaSyncService {
    orchestrator: Arc<SyncOrchestrator>,
}

impl MediaSyncService {
    /// Create a service talking to the video API over the host's HTTP stack.
    pub fn new(config: MediaSyncConfig, deps: MediaSyncDependencies) -> Self {
        let host = Arc::new(VimeoClient::from_config(
            Arc::clone(&deps.http_client),
            Arc::clone(&deps.credentials),
            &config,
        ));
        Self::with_host(config, deps, host)
    }

    /// Create a service over an explicit video host.
    pub fn with_host(
        config: MediaSyncConfig,
        deps: MediaSyncDependencies,
        host: Arc<dyn VideoHost>,
    ) -> Self {
        let orchestrator = SyncOrchestrator::new(
            config,
            deps.catalog,
            deps.metadata_store,
            host,
            deps.credentials,
            deps.executor,
            deps.clock,
        );
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }

    pub fn orchestrator(&self) -> Arc<SyncOrchestrator> {
        Arc::clone(&self.orchestrator)
    }

    /// Route a host event to the matching entry point.
    pub async fn dispatch(&self, event: HostEvent) -> Result<DispatchReport> {
        debug!(?event, "Dispatching host event");
        let orchestrator = &self.orchestrator;

        let report = match event {
            HostEvent::AssetCreated { asset_id } => {
                orchestrator.on_new_asset(&asset_id).await?;
                DispatchReport::Done
            }
            HostEvent::AssetDeleted { asset_id } => {
                orchestrator.on_asset_deleted(&asset_id).await?;
                DispatchReport::Done
            }
            HostEvent::StatusCheckDue { asset_id } => {
                orchestrator.on_poll_tick(asset_id.as_ref()).await?;
                DispatchReport::Done
            }
            HostEvent::RefreshStatus { asset_id } => {
                orchestrator.refresh_status(&asset_id).await?;
                DispatchReport::Done
            }
            HostEvent::SyncAsset { asset_id, force } => {
                orchestrator.on_new_asset_upload(&asset_id, force).await?;
                DispatchReport::Done
            }
            HostEvent::SyncMissing { limit } => {
                DispatchReport::Synced(orchestrator.sync_missing(limit).await?)
            }
            HostEvent::ClearAllMetadata => {
                DispatchReport::Cleared(orchestrator.clear_all_metadata().await?)
            }
            HostEvent::DeleteAllRemote => {
                DispatchReport::Deleted(orchestrator.delete_all_remote().await?)
            }
        };
        Ok(report)
    }

    /// Embed and streaming data for an asset's remote copy.
    pub async fn playback_info(
        &self,
        asset_id: &AssetId,
        options: &EmbedOptions,
    ) -> Result<PlaybackInfo> {
        let record = self.orchestrator.record(asset_id).await?;

        Ok(PlaybackInfo {
            status: record.status,
            status_label: status_label(record.status.as_str()),
            embed_url: embed_url(&record.remote_id, options),
            embed_html: embed_html(&record.remote_id, options, EMBED_WIDTH, EMBED_HEIGHT),
            hls_url: hls_link(&record.files).map(str::to_string),
            remote_id: record.remote_id,
            link: record.link,
            duration: record.duration,
            last_error: record.last_error,
        })
    }
}

/// Convenience bootstrapper for desktop and server hosts.
///
/// Opens the SQLite store at `config.database_path`, uses the configured
/// access token (or the environment) and routes scheduled status checks
/// back into the returned service.
///
/// ```no_run
/// # async fn example() -> core_service::Result<()> {
/// use core_runtime::config::MediaSyncConfig;
/// use core_service::{bootstrap_desktop, HostEvent};
///
/// let service = bootstrap_desktop(MediaSyncConfig::from_env()?).await?;
/// service
///     .dispatch(HostEvent::SyncMissing { limit: 50 })
///     .await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(config: MediaSyncConfig) -> Result<MediaSyncService> {
    use bridge_traits::{storage::StaticCredentialSource, time::SystemClock, BridgeError};
    use core_sync::CHECK_STATUS_TASK;

    let http_client = ReqwestHttpClient::with_timeout(config.request_timeout)
        .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;
    let store = Arc::new(
        SqliteMetadataStore::new(config.database_path.clone())
            .await
            .map_err(|err| CoreError::InitializationFailed(err.to_string()))?,
    );
    let credentials: Arc<dyn CredentialSource> = match &config.access_token {
        Some(token) => Arc::new(StaticCredentialSource::new(token.clone())),
        None => Arc::new(EnvCredentialSource::new()),
    };
    let executor = Arc::new(TokioBackgroundExecutor::new());

    let deps = MediaSyncDependencies::new(
        Arc::new(http_client),
        store.clone(),
        store,
        credentials,
        executor.clone(),
        Arc::new(SystemClock),
    );
    let service = MediaSyncService::new(config, deps);

    // Pending ticks become no-ops once the service is dropped
    let orchestrator = Arc::downgrade(&service.orchestrator);
    executor
        .register_task_handler(CHECK_STATUS_TASK, move |asset_id| {
            let orchestrator = orchestrator.clone();
            async move {
                let Some(orchestrator) = orchestrator.upgrade() else {
                    return Ok(());
                };
                orchestrator
                    .on_poll_tick(asset_id.as_ref())
                    .await
                    .map_err(|err| BridgeError::OperationFailed(err.to_string()))
            }
        })
        .await?;

    tracing::info!("Media sync service ready");
    Ok(service)
}
