//! Per-task callback slots shared by transports and task handles

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::task::AbortHandle;

use super::types::{DataCompletion, FileCompletion, ProgressCallback, TaskId, TransportOutcome};
use crate::Error;

/// Terminal callback of a task, by payload kind
pub enum Completion {
    /// Data and upload tasks
    Data(DataCompletion),
    /// Download tasks
    File(FileCompletion),
}

/// Callback pair of one live task
pub struct TaskHandlers {
    progress: Option<ProgressCallback>,
    completion: Completion,
}

impl TaskHandlers {
    /// Deliver the terminal outcome of a data or upload task
    pub fn complete_data(self, outcome: TransportOutcome<Bytes>) {
        match self.completion {
            Completion::Data(completion) => completion(outcome),
            Completion::File(completion) => {
                tracing::warn!("data outcome delivered to a download task");
                completion(TransportOutcome {
                    payload: None,
                    response: outcome.response,
                    error: Some(Error::Internal("data outcome for download task".to_string())),
                })
            }
        }
    }

    /// Deliver the terminal outcome of a download task
    pub fn complete_file(self, outcome: TransportOutcome<PathBuf>) {
        match self.completion {
            Completion::File(completion) => completion(outcome),
            Completion::Data(completion) => {
                tracing::warn!("file outcome delivered to a data task");
                completion(TransportOutcome {
                    payload: None,
                    response: outcome.response,
                    error: Some(Error::Internal("file outcome for data task".to_string())),
                })
            }
        }
    }

    /// Deliver a failure without a response
    pub fn fail(self, error: Error) {
        match self.completion {
            Completion::Data(completion) => completion(TransportOutcome::failed(error)),
            Completion::File(completion) => completion(TransportOutcome::failed(error)),
        }
    }
}

/// Mapping from in-flight task to its callback pair.
///
/// An entry lives from [`register`](Self::register) until the first
/// [`take`](Self::take); whoever takes it owns the only terminal delivery.
/// Progress callbacks run with the map locked, so they must not call back
/// into the registry.
#[derive(Default)]
pub struct TaskRegistry {
    next_id: AtomicU64,
    tasks: Mutex<HashMap<TaskId, TaskHandlers>>,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a task id and store its callbacks
    pub fn register(&self, progress: Option<ProgressCallback>, completion: Completion) -> TaskId {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.tasks.lock().insert(
            id,
            TaskHandlers {
                progress,
                completion,
            },
        );
        tracing::trace!(task = %id, "registered task");
        id
    }

    /// Report progress for a live task; ignored once the task has finished
    pub fn report_progress(&self, id: TaskId, fraction: f32) {
        let tasks = self.tasks.lock();
        if let Some(progress) = tasks.get(&id).and_then(|h| h.progress.as_ref()) {
            let fraction = if fraction.is_finite() {
                fraction.clamp(0.0, 1.0)
            } else {
                0.0
            };
            progress(fraction);
        }
    }

    /// Remove a task's callbacks; `None` if already taken
    pub fn take(&self, id: TaskId) -> Option<TaskHandlers> {
        let handlers = self.tasks.lock().remove(&id);
        if handlers.is_some() {
            tracing::trace!(task = %id, "released task");
        }
        handlers
    }

    /// Whether the task has not delivered its terminal callback yet
    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.lock().contains_key(&id)
    }

    /// Number of live tasks
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Whether no task is live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cancellation handle for a dispatched task.
///
/// Dropping the handle does not cancel the task.
#[derive(Clone)]
pub struct TaskHandle {
    id: TaskId,
    registry: Arc<TaskRegistry>,
    abort: Option<AbortHandle>,
}

impl TaskHandle {
    /// Create a handle for a task registered in `registry`
    pub fn new(id: TaskId, registry: Arc<TaskRegistry>, abort: Option<AbortHandle>) -> Self {
        Self {
            id,
            registry,
            abort,
        }
    }

    /// Task identifier
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Cancel the task.
    ///
    /// If the task has not finished, its completion receives
    /// [`Error::Cancelled`]. Calling this after completion does nothing.
    pub fn cancel(&self) {
        if let Some(handlers) = self.registry.take(self.id) {
            tracing::debug!(task = %self.id, "cancelling task");
            if let Some(abort) = &self.abort {
                abort.abort();
            }
            handlers.fail(Error::Cancelled);
        }
    }

    /// Whether the terminal callback has been handed off
    pub fn is_finished(&self) -> bool {
        !self.registry.contains(self.id)
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("finished", &self.is_finished())
            .finish()
    }
}
