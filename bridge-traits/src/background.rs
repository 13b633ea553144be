//! Background Execution and Task Scheduling
//!
//! One-shot delayed callbacks keyed by task id. The sync core uses one task id
//! per asset, so "at most one pending entry per task id" is what keeps two
//! status checks for the same asset from being queued at once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{error::Result, storage::AssetId};

/// Scheduled task identifier
///
/// Formatted as `<kind>:<asset id>` so a host scheduler can route the callback
/// by kind and hand the asset id to the registered handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the task id for a per-asset task of the given kind.
    pub fn for_asset(kind: &str, asset_id: &AssetId) -> Self {
        Self(format!("{}:{}", kind, asset_id))
    }

    /// The task kind (everything before the first `:`).
    pub fn kind(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(kind, _)| kind)
    }

    /// The asset id the task was created for, if any.
    pub fn asset_id(&self) -> Option<AssetId> {
        self.0
            .split_once(':')
            .map(|(_, asset)| asset)
            .filter(|asset| !asset.is_empty())
            .map(AssetId::new)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Task execution status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Task is scheduled but not yet running
    Scheduled,
    /// Task is currently executing
    Running,
    /// Task completed successfully
    Completed,
    /// Task failed
    Failed,
    /// Task was cancelled
    Cancelled,
}

impl TaskStatus {
    /// Only a scheduled-but-not-started task counts as pending; a running
    /// handler may schedule its own successor.
    pub fn is_pending(&self) -> bool {
        matches!(self, TaskStatus::Scheduled)
    }
}

/// Background task executor trait
///
/// Abstracts the host's job-scheduling substrate:
/// - **Desktop**: Tokio timers (`bridge-desktop`)
/// - **Server**: a persistent job queue or cron table
///
/// # Example
///
/// ```ignore
/// use bridge_traits::background::{BackgroundExecutor, TaskId};
/// use chrono::{Duration, Utc};
///
/// async fn check_later(executor: &dyn BackgroundExecutor, asset: &AssetId) -> Result<()> {
///     let task = TaskId::for_asset("media_sync_check_status", asset);
///     executor.schedule_once(&task, Utc::now() + Duration::minutes(2)).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait BackgroundExecutor: Send + Sync {
    /// Schedule a one-time callback no earlier than `not_before`.
    ///
    /// Returns `Ok(false)` without scheduling anything when an entry for the
    /// same task id is already pending.
    async fn schedule_once(&self, task_id: &TaskId, not_before: DateTime<Utc>) -> Result<bool>;

    /// Cancel a scheduled task
    async fn cancel_task(&self, task_id: &TaskId) -> Result<()>;

    /// Get status of a task
    async fn get_task_status(&self, task_id: &TaskId) -> Result<TaskStatus>;

    /// List all known tasks
    async fn list_tasks(&self) -> Result<Vec<TaskId>>;

    /// When the task is due, if it is still pending
    async fn next_execution_time(&self, task_id: &TaskId) -> Result<Option<DateTime<Utc>>>;

    /// Whether a not-yet-started entry exists for the task id
    async fn is_pending(&self, task_id: &TaskId) -> bool {
        self.get_task_status(task_id)
            .await
            .map(|status| status.is_pending())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id() {
        let id1 = TaskId::new("media_sync_check_status:42");
        let id2 = TaskId::for_asset("media_sync_check_status", &AssetId::new("42"));

        assert_eq!(id1, id2);
        assert_eq!(id2.kind(), "media_sync_check_status");
        assert_eq!(id2.asset_id(), Some(AssetId::new("42")));
    }

    #[test]
    fn test_task_id_without_asset() {
        let id = TaskId::new("media_sync_check_status");
        assert_eq!(id.kind(), "media_sync_check_status");
        assert_eq!(id.asset_id(), None);
    }

    #[test]
    fn test_pending_status() {
        assert!(TaskStatus::Scheduled.is_pending());
        assert!(!TaskStatus::Running.is_pending());
        assert!(!TaskStatus::Completed.is_pending());
    }
}
