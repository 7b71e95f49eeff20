//! The single thread every completion runs on

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::ThreadId;

use tokio::sync::mpsc;

use crate::Result;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Serial executor for callbacks.
///
/// Jobs run one at a time, in the order they were posted, on one dedicated
/// thread. The thread exits once every clone of the queue is dropped and the
/// backlog is drained. A panicking job is logged and does not take the
/// thread down.
#[derive(Clone)]
pub struct DeliveryQueue {
    sender: mpsc::UnboundedSender<Job>,
    thread_id: ThreadId,
}

impl DeliveryQueue {
    /// Spawn the delivery thread
    pub fn new() -> Result<Self> {
        Self::with_name("courier-delivery")
    }

    /// Spawn the delivery thread with a custom thread name
    pub fn with_name(name: impl Into<String>) -> Result<Self> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let thread = std::thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                while let Some(job) = receiver.blocking_recv() {
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        tracing::error!("completion callback panicked");
                    }
                }
                tracing::trace!("delivery queue closed");
            })?;

        Ok(Self {
            sender,
            thread_id: thread.thread().id(),
        })
    }

    /// Queue `job` behind everything posted so far
    pub fn post<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.sender.send(Box::new(job)).is_err() {
            tracing::warn!("delivery thread is gone, dropping callback");
        }
    }

    /// Identifier of the delivery thread
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Whether the caller is running on the delivery thread
    pub fn is_current(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }
}

impl std::fmt::Debug for DeliveryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("thread_id", &self.thread_id)
            .finish()
    }
}
