//! Background Task Execution Implementation

use async_trait::async_trait;
use bridge_traits::{
    background::{BackgroundExecutor, TaskId, TaskStatus},
    error::{BridgeError, Result},
    storage::AssetId,
    time::{Clock, SystemClock},
};
use chrono::{DateTime, Utc};
use futures_util::{future::BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

type TaskHandler = Arc<dyn Fn(Option<AssetId>) -> BoxFuture<'static, Result<()>> + Send + Sync>;
type TaskTable = Arc<RwLock<HashMap<TaskId, TaskInfo>>>;

/// Tokio-based one-shot scheduler for desktop hosts.
///
/// Handlers are registered per task kind (the part of the [`TaskId`] before
/// the first `:`) and receive the asset id encoded in the task id.
pub struct TokioBackgroundExecutor {
    tasks: TaskTable,
    handlers: Arc<RwLock<HashMap<String, TaskHandler>>>,
    clock: Arc<dyn Clock>,
}

struct TaskInfo {
    status: TaskStatus,
    generation: u64,
    handle: Option<JoinHandle<()>>,
    cancel: Option<oneshot::Sender<()>>,
    next_run: Option<DateTime<Utc>>,
}

impl TokioBackgroundExecutor {
    /// Create a new executor driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an executor with a custom clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    fn delay_until(clock: &dyn Clock, not_before: DateTime<Utc>) -> Duration {
        (not_before - clock.now()).to_std().unwrap_or(Duration::ZERO)
    }

    /// Register the handler invoked when a task of `kind` fires.
    pub async fn register_task_handler<F, Fut>(&self, kind: &str, handler: F) -> Result<()>
    where
        F: Fn(Option<AssetId>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let mut handlers = self.handlers.write().await;
        handlers.insert(
            kind.to_string(),
            Arc::new(move |asset_id| handler(asset_id).boxed()),
        );
        Ok(())
    }

    async fn handler_for(&self, kind: &str) -> Option<TaskHandler> {
        let handlers = self.handlers.read().await;
        handlers.get(kind).cloned()
    }

    async fn update_if_current<F>(tasks: &TaskTable, id: &TaskId, generation: u64, update: F)
    where
        F: FnOnce(&mut TaskInfo),
    {
        let mut tasks = tasks.write().await;
        if let Some(info) = tasks.get_mut(id) {
            // A newer schedule for the same id owns the entry now
            if info.generation == generation {
                update(info);
            }
        }
    }

    async fn run_one_time_task(
        tasks: TaskTable,
        id: TaskId,
        generation: u64,
        handler: TaskHandler,
        delay: Duration,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        let delay_sleep = sleep(delay);
        tokio::pin!(delay_sleep);
        tokio::select! {
            _ = &mut cancel_rx => {
                Self::update_if_current(&tasks, &id, generation, |info| {
                    info.status = TaskStatus::Cancelled;
                    info.next_run = None;
                })
                .await;
                return;
            }
            _ = delay_sleep.as_mut() => {}
        }

        Self::update_if_current(&tasks, &id, generation, |info| {
            info.status = TaskStatus::Running;
            info.next_run = None;
            info.cancel = None;
        })
        .await;

        let result = handler(id.asset_id()).await;

        Self::update_if_current(&tasks, &id, generation, |info| {
            info.handle = None;
            info.status = match result {
                Ok(()) => TaskStatus::Completed,
                Err(err) => {
                    warn!(task_id = %id, error = %err, "One-time task failed");
                    TaskStatus::Failed
                }
            };
        })
        .await;
    }
}

impl Default for TokioBackgroundExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackgroundExecutor for TokioBackgroundExecutor {
    async fn schedule_once(&self, task_id: &TaskId, not_before: DateTime<Utc>) -> Result<bool> {
        let handler = self.handler_for(task_id.kind()).await.ok_or_else(|| {
            BridgeError::NotAvailable(format!(
                "No handler registered for task kind: {}",
                task_id.kind()
            ))
        })?;

        let delay = Self::delay_until(self.clock.as_ref(), not_before);
        let (cancel_tx, cancel_rx) = oneshot::channel();

        // Check-and-insert under one write lock so two callers cannot both
        // see "not pending".
        let generation = {
            let mut tasks = self.tasks.write().await;
            let generation = match tasks.get(task_id) {
                Some(info) if info.status.is_pending() => {
                    debug!(task_id = %task_id, "Task already pending; not rescheduling");
                    return Ok(false);
                }
                Some(info) => info.generation + 1,
                None => 0,
            };

            tasks.insert(
                task_id.clone(),
                TaskInfo {
                    status: TaskStatus::Scheduled,
                    generation,
                    handle: None,
                    cancel: Some(cancel_tx),
                    next_run: Some(not_before),
                },
            );
            generation
        };

        debug!(
            task_id = %task_id,
            delay_secs = delay.as_secs(),
            "Scheduling one-time task"
        );

        let handle = tokio::spawn(Self::run_one_time_task(
            Arc::clone(&self.tasks),
            task_id.clone(),
            generation,
            handler,
            delay,
            cancel_rx,
        ));

        Self::update_if_current(&self.tasks, task_id, generation, |info| {
            if info.status.is_pending() {
                info.handle = Some(handle);
            }
        })
        .await;

        Ok(true)
    }

    async fn cancel_task(&self, task_id: &TaskId) -> Result<()> {
        debug!(task_id = %task_id, "Cancelling task");

        if let Some(mut info) = self.tasks.write().await.remove(task_id) {
            if let Some(cancel) = info.cancel.take() {
                let _ = cancel.send(());
            }
            if info.status.is_pending() {
                if let Some(handle) = info.handle.take() {
                    handle.abort();
                }
            }
            return Ok(());
        }

        Err(BridgeError::OperationFailed(format!(
            "Task not found: {}",
            task_id
        )))
    }

    async fn get_task_status(&self, task_id: &TaskId) -> Result<TaskStatus> {
        let tasks = self.tasks.read().await;
        tasks
            .get(task_id)
            .map(|info| info.status.clone())
            .ok_or_else(|| BridgeError::OperationFailed(format!("Task not found: {}", task_id)))
    }

    async fn list_tasks(&self) -> Result<Vec<TaskId>> {
        let tasks = self.tasks.read().await;
        Ok(tasks.keys().cloned().collect())
    }

    async fn next_execution_time(&self, task_id: &TaskId) -> Result<Option<DateTime<Utc>>> {
        let tasks = self.tasks.read().await;
        tasks
            .get(task_id)
            .map(|info| info.next_run)
            .ok_or_else(|| BridgeError::OperationFailed(format!("Task not found: {}", task_id)))
    }
}
