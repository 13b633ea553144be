//! # Poll Scheduling
//!
//! Adaptive delay between status checks, and the handoff to the host's
//! background executor.
//!
//! ## Backoff Curve
//!
//! | Condition | Next check |
//! |-----------|------------|
//! | Remote transcode in progress | 2 min |
//! | Ready and synced more than 6 h ago | stop |
//! | Asset 24 h or older and not uploading | stop |
//! | Status queued/uploading/processing | 2 min |
//! | Asset younger than 30 min | 5 min |
//! | younger than 1 h | 10 min |
//! | younger than 12 h | 1 h |
//! | younger than 24 h | 2 h |
//! | older | stop |

use crate::record::{SyncRecord, SyncStatus};
use crate::Result;
use bridge_traits::background::{BackgroundExecutor, TaskId};
use bridge_traits::storage::{Asset, AssetId};
use bridge_traits::time::Clock;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Task kind for status checks; one pending task per asset
pub const CHECK_STATUS_TASK: &str = "media_sync_check_status";

const ACTIVE_DELAY_SECS: u64 = 120;
const READY_SETTLE_HOURS: i64 = 6;
const ABANDON_AFTER_HOURS: i64 = 24;

/// Seconds until the next status check; `0` means stop polling.
///
/// `remote_transcode` is the raw transcode status from the remote object.
pub fn next_delay(
    asset: &Asset,
    record: &SyncRecord,
    mapped: SyncStatus,
    remote_transcode: Option<&str>,
    now: DateTime<Utc>,
) -> u64 {
    if remote_transcode == Some("in_progress") {
        return ACTIVE_DELAY_SECS;
    }

    if mapped == SyncStatus::Ready {
        if let Some(synced_at) = record.synced_at {
            if now - synced_at > Duration::hours(READY_SETTLE_HOURS) {
                return 0;
            }
        }
    }

    let age = now - asset.created_at;

    // Bytes still owed to the server keep the upload alive past the horizon
    if age >= Duration::hours(ABANDON_AFTER_HOURS) && mapped != SyncStatus::Uploading {
        return 0;
    }

    if mapped.is_active() {
        return ACTIVE_DELAY_SECS;
    }

    if age < Duration::minutes(30) {
        300
    } else if age < Duration::hours(1) {
        600
    } else if age < Duration::hours(12) {
        3_600
    } else if age < Duration::hours(24) {
        7_200
    } else {
        0
    }
}

/// Arranges status checks through the host's background executor
pub struct PollScheduler {
    executor: Arc<dyn BackgroundExecutor>,
    clock: Arc<dyn Clock>,
}

impl PollScheduler {
    pub fn new(executor: Arc<dyn BackgroundExecutor>, clock: Arc<dyn Clock>) -> Self {
        Self { executor, clock }
    }

    pub fn task_id(asset_id: &AssetId) -> TaskId {
        TaskId::for_asset(CHECK_STATUS_TASK, asset_id)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Schedule a check `delay_secs` from now. Returns `false` when the delay
    /// is zero or a check is already pending.
    pub async fn schedule(&self, asset_id: &AssetId, delay_secs: u64) -> Result<bool> {
        if delay_secs == 0 {
            debug!(asset_id = %asset_id, "Polling finished");
            return Ok(false);
        }

        let not_before = self.clock.now() + Duration::seconds(delay_secs as i64);
        let scheduled = self
            .executor
            .schedule_once(&Self::task_id(asset_id), not_before)
            .await?;

        if scheduled {
            info!(asset_id = %asset_id, delay_secs, "Scheduled status check");
        } else {
            debug!(asset_id = %asset_id, "Status check already pending");
        }
        Ok(scheduled)
    }

    /// Cancel the pending check for an asset, if any.
    pub async fn cancel(&self, asset_id: &AssetId) -> Result<()> {
        let task_id = Self::task_id(asset_id);
        if self.executor.is_pending(&task_id).await {
            self.executor.cancel_task(&task_id).await?;
        }
        Ok(())
    }

    /// Cancel every pending status check.
    pub async fn cancel_all(&self) -> Result<usize> {
        let prefix = format!("{}:", CHECK_STATUS_TASK);
        let mut cancelled = 0;
        for task_id in self.executor.list_tasks().await? {
            if task_id.0.starts_with(&prefix) && self.executor.is_pending(&task_id).await {
                self.executor.cancel_task(&task_id).await?;
                cancelled += 1;
            }
        }
        Ok(cancelled)
    }

    pub async fn next_check(&self, asset_id: &AssetId) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .executor
            .next_execution_time(&Self::task_id(asset_id))
            .await?)
    }
}
