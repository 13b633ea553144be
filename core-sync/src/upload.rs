//! # Upload Engine
//!
//! Resumable chunked transfer of one local file into an open tus session.
//!
//! ## Overview
//!
//! One call to [`UploadEngine::resume_upload`] is one bounded burst:
//!
//! 1. Verify the local file is a readable regular file
//! 2. Probe the server offset and adopt it when it is ahead
//! 3. Send at most `max_chunks_per_run` chunks of at most `chunk_size` bytes
//! 4. Persist the offset through the [`OffsetJournal`] after every chunk
//!
//! The engine never writes sync records itself. The caller decides what a
//! failure means for the asset.

use crate::{Result, SyncError};
use async_trait::async_trait;
use bridge_traits::storage::{Asset, AssetId};
use bridge_traits::video_host::VideoHost;
use bytes::Bytes;
use core_runtime::config::MediaSyncConfig;
use core_runtime::logging::strip_path;
use std::io::SeekFrom;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, instrument, warn};

/// Durable sink for upload progress
#[async_trait]
pub trait OffsetJournal: Send + Sync {
    async fn persist_offset(&self, asset_id: &AssetId, offset: u64) -> Result<()>;
}

/// Why a burst stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The local file is missing, unreadable or shorter than announced
    LocalIo,
    /// The server could not be reached or refused the request
    Transport,
    /// The server no longer knows the upload session
    SessionExpired,
    /// The server reported an offset that breaks the tus contract
    Protocol,
    /// Progress could not be persisted
    Store,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl UploadFailure {
    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether a later burst against the same session may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, FailureKind::Transport | FailureKind::Protocol)
    }
}

impl From<UploadFailure> for SyncError {
    fn from(failure: UploadFailure) -> Self {
        match failure.kind {
            FailureKind::LocalIo => SyncError::LocalIo(failure.message),
            FailureKind::Transport => SyncError::Transport(failure.message),
            FailureKind::SessionExpired => SyncError::SessionExpired(failure.message),
            FailureKind::Protocol => SyncError::Protocol(failure.message),
            FailureKind::Store => {
                SyncError::Store(bridge_traits::BridgeError::Store(failure.message))
            }
        }
    }
}

/// Result of one upload burst
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub success: bool,
    /// `offset >= total_size`
    pub completed: bool,
    /// Last offset known to be on the server
    pub offset: u64,
    pub error: Option<UploadFailure>,
}

impl UploadOutcome {
    fn progressed(offset: u64, total_size: u64) -> Self {
        Self {
            success: true,
            completed: offset >= total_size,
            offset,
            error: None,
        }
    }

    fn failed(offset: u64, failure: UploadFailure) -> Self {
        Self {
            success: false,
            completed: false,
            offset,
            error: Some(failure),
        }
    }
}

pub struct UploadEngine {
    host: Arc<dyn VideoHost>,
    chunk_size: u64,
    max_chunks_per_run: u32,
}

impl UploadEngine {
    pub fn new(host: Arc<dyn VideoHost>, config: &MediaSyncConfig) -> Self {
        Self::with_limits(host, config.chunk_size, config.max_chunks_per_run)
    }

    pub fn with_limits(host: Arc<dyn VideoHost>, chunk_size: u64, max_chunks_per_run: u32) -> Self {
        Self {
            host,
            chunk_size: chunk_size.max(1),
            max_chunks_per_run: max_chunks_per_run.max(1),
        }
    }

    /// Run one burst for `asset` starting from the locally known `offset`.
    #[instrument(skip(self, asset, session_url, journal), fields(asset_id = %asset.id))]
    pub async fn resume_upload(
        &self,
        asset: &Asset,
        session_url: &str,
        offset: u64,
        total_size: u64,
        journal: &dyn OffsetJournal,
    ) -> UploadOutcome {
        let mut offset = offset.min(total_size);
        match self
            .run_burst(asset, session_url, &mut offset, total_size, journal)
            .await
        {
            Ok(()) => {
                info!(offset, total_size, "Upload burst finished");
                UploadOutcome::progressed(offset, total_size)
            }
            Err(failure) => {
                warn!(offset, kind = ?failure.kind, error = %failure.message, "Upload burst failed");
                UploadOutcome::failed(offset, failure)
            }
        }
    }

    async fn run_burst(
        &self,
        asset: &Asset,
        session_url: &str,
        offset: &mut u64,
        total_size: u64,
        journal: &dyn OffsetJournal,
    ) -> std::result::Result<(), UploadFailure> {
        let path = asset.file_path.to_string_lossy();
        let file_name = strip_path(&path);

        let metadata = tokio::fs::metadata(&asset.file_path).await.map_err(|e| {
            UploadFailure::new(
                FailureKind::LocalIo,
                format!("cannot access {}: {}", file_name, e),
            )
        })?;
        if !metadata.is_file() {
            return Err(UploadFailure::new(
                FailureKind::LocalIo,
                format!("{} is not a regular file", file_name),
            ));
        }

        let probe = self.host.get_upload_offset(session_url).await;
        if probe.session_gone() {
            return Err(UploadFailure::new(FailureKind::SessionExpired, probe.error));
        }
        if !probe.success {
            return Err(UploadFailure::new(FailureKind::Transport, probe.error));
        }
        if probe.offset > *offset {
            let adopted = probe.offset.min(total_size);
            debug!(local = *offset, remote = adopted, "Adopting server offset");
            *offset = adopted;
            persist(journal, &asset.id, adopted).await?;
        }

        if *offset >= total_size {
            return Ok(());
        }

        let mut file = tokio::fs::File::open(&asset.file_path).await.map_err(|e| {
            UploadFailure::new(
                FailureKind::LocalIo,
                format!("cannot open {}: {}", file_name, e),
            )
        })?;
        file.seek(SeekFrom::Start(*offset)).await.map_err(|e| {
            UploadFailure::new(
                FailureKind::LocalIo,
                format!("cannot seek {} to {}: {}", file_name, offset, e),
            )
        })?;

        for chunk_index in 0..self.max_chunks_per_run {
            if *offset >= total_size {
                break;
            }

            let len = self.chunk_size.min(total_size - *offset) as usize;
            let mut buffer = vec![0u8; len];
            file.read_exact(&mut buffer).await.map_err(|e| {
                UploadFailure::new(
                    FailureKind::LocalIo,
                    format!("cannot read {} bytes of {} at {}: {}", len, file_name, offset, e),
                )
            })?;

            let receipt = self
                .host
                .patch_upload_chunk(session_url, Bytes::from(buffer), *offset)
                .await;
            if !receipt.success {
                return Err(UploadFailure::new(FailureKind::Transport, receipt.error));
            }
            if receipt.offset <= *offset || receipt.offset > total_size {
                return Err(UploadFailure::new(
                    FailureKind::Protocol,
                    format!(
                        "server offset {} invalid after chunk at {} (size {})",
                        receipt.offset, offset, total_size
                    ),
                ));
            }

            *offset = receipt.offset;
            persist(journal, &asset.id, *offset).await?;
            debug!(chunk = chunk_index + 1, offset = *offset, total_size, "Chunk accepted");

            // A short acknowledgement means the server kept fewer bytes than sent
            if *offset < total_size {
                file.seek(SeekFrom::Start(*offset)).await.map_err(|e| {
                    UploadFailure::new(
                        FailureKind::LocalIo,
                        format!("cannot seek {} to {}: {}", file_name, offset, e),
                    )
                })?;
            }
        }

        Ok(())
    }
}

async fn persist(
    journal: &dyn OffsetJournal,
    asset_id: &AssetId,
    offset: u64,
) -> std::result::Result<(), UploadFailure> {
    journal
        .persist_offset(asset_id, offset)
        .await
        .map_err(|e| UploadFailure::new(FailureKind::Store, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::video_host::{
        ApiResponse, OffsetProbe, RemoteContainer, UploadReceipt, UploadSessionRequest,
    };
    use chrono::Utc;
    use mockall::mock;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Mutex;

    mock! {
        Host {}

        #[async_trait]
        impl VideoHost for Host {
            async fn find_or_create_container(&self, name: &str) -> Option<RemoteContainer>;
            async fn get_container(&self, uri: &str) -> Option<RemoteContainer>;
            async fn create_remote_object_from_url(&self, url: &str, title: &str, description: &str) -> ApiResponse;
            async fn create_resumable_session(&self, request: &UploadSessionRequest) -> ApiResponse;
            async fn add_to_container(&self, container_uri: &str, object_uri: &str) -> ApiResponse;
            async fn get_object(&self, uri: &str) -> ApiResponse;
            async fn delete_object(&self, uri: &str) -> ApiResponse;
            async fn get_upload_offset(&self, session_url: &str) -> OffsetProbe;
            async fn patch_upload_chunk(&self, session_url: &str, chunk: Bytes, offset: u64) -> UploadReceipt;
        }
    }

    #[derive(Default)]
    struct RecordingJournal {
        offsets: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl OffsetJournal for RecordingJournal {
        async fn persist_offset(&self, _asset_id: &AssetId, offset: u64) -> Result<()> {
            self.offsets.lock().unwrap().push(offset);
            Ok(())
        }
    }

    const SESSION: &str = "https://files.example/tus/1";

    fn video_file(len: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();
        file
    }

    fn asset(path: PathBuf, size: u64) -> Asset {
        Asset {
            id: AssetId::new("7"),
            file_path: path,
            byte_size: size,
            mime_type: "video/mp4".to_string(),
            title: "Clip".to_string(),
            description: String::new(),
            public_url: None,
            created_at: Utc::now(),
        }
    }

    fn probe(offset: u64) -> OffsetProbe {
        OffsetProbe {
            success: true,
            offset,
            status_code: 0,
            error: String::new(),
        }
    }

    /// A server that accepts every byte it is sent.
    fn accept_all(host: &mut MockHost) {
        host.expect_patch_upload_chunk()
            .returning(|_, chunk, offset| UploadReceipt {
                success: true,
                offset: offset + chunk.len() as u64,
                error: String::new(),
            });
    }

    #[tokio::test]
    async fn test_burst_stops_at_chunk_budget() {
        let file = video_file(20);
        let mut host = MockHost::new();
        host.expect_get_upload_offset().returning(|_| probe(0));
        accept_all(&mut host);

        let engine = UploadEngine::with_limits(Arc::new(host), 4, 3);
        let journal = RecordingJournal::default();
        let outcome = engine
            .resume_upload(&asset(file.path().to_path_buf(), 20), SESSION, 0, 20, &journal)
            .await;

        assert!(outcome.success);
        assert!(!outcome.completed);
        assert_eq!(outcome.offset, 12);
        assert_eq!(*journal.offsets.lock().unwrap(), vec![4, 8, 12]);
    }

    #[tokio::test]
    async fn test_burst_completes_with_short_final_chunk() {
        let file = video_file(10);
        let mut host = MockHost::new();
        host.expect_get_upload_offset().returning(|_| probe(0));
        host.expect_patch_upload_chunk()
            .times(3)
            .returning(|_, chunk, offset| {
                if offset == 8 {
                    assert_eq!(chunk.len(), 2);
                    assert_eq!(&chunk[..], &[8u8, 9u8]);
                }
                UploadReceipt {
                    success: true,
                    offset: offset + chunk.len() as u64,
                    error: String::new(),
                }
            });

        let engine = UploadEngine::with_limits(Arc::new(host), 4, 3);
        let journal = RecordingJournal::default();
        let outcome = engine
            .resume_upload(&asset(file.path().to_path_buf(), 10), SESSION, 0, 10, &journal)
            .await;

        assert!(outcome.success);
        assert!(outcome.completed);
        assert_eq!(outcome.offset, 10);
    }

    #[tokio::test]
    async fn test_adopts_server_offset_when_ahead() {
        let file = video_file(20);
        let mut host = MockHost::new();
        host.expect_get_upload_offset().returning(|_| probe(8));
        host.expect_patch_upload_chunk()
            .withf(|_, _, offset| *offset >= 8)
            .returning(|_, chunk, offset| {
                if offset == 8 {
                    assert_eq!(chunk[0], 8u8);
                }
                UploadReceipt {
                    success: true,
                    offset: offset + chunk.len() as u64,
                    error: String::new(),
                }
            });

        let engine = UploadEngine::with_limits(Arc::new(host), 4, 1);
        let journal = RecordingJournal::default();
        let outcome = engine
            .resume_upload(&asset(file.path().to_path_buf(), 20), SESSION, 4, 20, &journal)
            .await;

        assert_eq!(outcome.offset, 12);
        assert_eq!(*journal.offsets.lock().unwrap(), vec![8, 12]);
    }

    #[tokio::test]
    async fn test_server_offset_is_capped_at_total() {
        let file = video_file(10);
        let mut host = MockHost::new();
        host.expect_get_upload_offset().returning(|_| probe(99));
        host.expect_patch_upload_chunk().times(0);

        let engine = UploadEngine::with_limits(Arc::new(host), 4, 3);
        let journal = RecordingJournal::default();
        let outcome = engine
            .resume_upload(&asset(file.path().to_path_buf(), 10), SESSION, 0, 10, &journal)
            .await;

        assert!(outcome.completed);
        assert_eq!(outcome.offset, 10);
        assert_eq!(*journal.offsets.lock().unwrap(), vec![10]);
    }

    #[tokio::test]
    async fn test_missing_file_is_local_io() {
        let mut host = MockHost::new();
        host.expect_get_upload_offset().times(0);

        let engine = UploadEngine::with_limits(Arc::new(host), 4, 3);
        let journal = RecordingJournal::default();
        let outcome = engine
            .resume_upload(
                &asset(PathBuf::from("/nonexistent/clip.mp4"), 10),
                SESSION,
                0,
                10,
                &journal,
            )
            .await;

        assert!(!outcome.success);
        let failure = outcome.error.unwrap();
        assert_eq!(failure.kind, FailureKind::LocalIo);
        assert!(!failure.is_retryable());
        assert!(failure.message.contains("clip.mp4"));
        assert!(!failure.message.contains("/nonexistent"));
    }

    #[tokio::test]
    async fn test_truncated_file_is_local_io() {
        let file = video_file(6);
        let mut host = MockHost::new();
        host.expect_get_upload_offset().returning(|_| probe(0));
        accept_all(&mut host);

        let engine = UploadEngine::with_limits(Arc::new(host), 4, 3);
        let journal = RecordingJournal::default();
        let outcome = engine
            .resume_upload(&asset(file.path().to_path_buf(), 10), SESSION, 0, 10, &journal)
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.offset, 4);
        assert_eq!(outcome.error.unwrap().kind, FailureKind::LocalIo);
    }

    #[tokio::test]
    async fn test_stalled_offset_is_protocol_violation() {
        let file = video_file(10);
        let mut host = MockHost::new();
        host.expect_get_upload_offset().returning(|_| probe(0));
        host.expect_patch_upload_chunk()
            .returning(|_, _, offset| UploadReceipt {
                success: true,
                offset,
                error: String::new(),
            });

        let engine = UploadEngine::with_limits(Arc::new(host), 4, 3);
        let journal = RecordingJournal::default();
        let outcome = engine
            .resume_upload(&asset(file.path().to_path_buf(), 10), SESSION, 0, 10, &journal)
            .await;

        let failure = outcome.error.unwrap();
        assert_eq!(failure.kind, FailureKind::Protocol);
        assert!(failure.is_retryable());
        assert_eq!(outcome.offset, 0);
        assert!(journal.offsets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_chunk_keeps_last_offset() {
        let file = video_file(10);
        let mut host = MockHost::new();
        host.expect_get_upload_offset().returning(|_| probe(4));
        host.expect_patch_upload_chunk()
            .returning(|_, _, offset| UploadReceipt {
                success: false,
                offset,
                error: "HTTP 409: offset mismatch".to_string(),
            });

        let engine = UploadEngine::with_limits(Arc::new(host), 4, 3);
        let journal = RecordingJournal::default();
        let outcome = engine
            .resume_upload(&asset(file.path().to_path_buf(), 10), SESSION, 4, 10, &journal)
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.offset, 4);
        let failure = outcome.error.unwrap();
        assert_eq!(failure.kind, FailureKind::Transport);
        assert_eq!(failure.message, "HTTP 409: offset mismatch");
    }

    #[tokio::test]
    async fn test_probe_failure_aborts_burst() {
        let file = video_file(10);
        let mut host = MockHost::new();
        host.expect_get_upload_offset().returning(|_| OffsetProbe {
            success: false,
            offset: 0,
            status_code: 0,
            error: "Transport error: connection reset".to_string(),
        });
        host.expect_patch_upload_chunk().times(0);

        let engine = UploadEngine::with_limits(Arc::new(host), 4, 3);
        let journal = RecordingJournal::default();
        let outcome = engine
            .resume_upload(&asset(file.path().to_path_buf(), 10), SESSION, 0, 10, &journal)
            .await;

        assert!(!outcome.success);
        let failure = outcome.error.unwrap();
        assert_eq!(failure.kind, FailureKind::Transport);
        assert!(failure.is_retryable());
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_retryable() {
        let file = video_file(10);
        let mut host = MockHost::new();
        host.expect_get_upload_offset().returning(|_| OffsetProbe {
            success: false,
            offset: 0,
            status_code: 404,
            error: "HTTP 404: not found".to_string(),
        });
        host.expect_patch_upload_chunk().times(0);

        let engine = UploadEngine::with_limits(Arc::new(host), 4, 3);
        let journal = RecordingJournal::default();
        let outcome = engine
            .resume_upload(&asset(file.path().to_path_buf(), 10), SESSION, 4, 10, &journal)
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.offset, 4);
        let failure = outcome.error.unwrap();
        assert_eq!(failure.kind, FailureKind::SessionExpired);
        assert!(!failure.is_retryable());
        assert!(journal.offsets.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failure_into_sync_error() {
        let error: SyncError = UploadFailure::new(FailureKind::LocalIo, "gone").into();
        assert!(matches!(error, SyncError::LocalIo(_)));

        let error: SyncError = UploadFailure::new(FailureKind::Store, "locked").into();
        assert!(matches!(error, SyncError::Store(_)));
    }
}
