//! Reusable request-plus-handle wrapper

use parking_lot::Mutex;

use crate::backend::registry::TaskHandle;
use crate::{Dispatcher, OperationResult, RequestDescriptor};

/// A request that can be executed and cancelled.
///
/// Holds on to the handle of the most recent execution so `cancel` needs no
/// extra bookkeeping by the caller. Executing again replaces the stored
/// handle without cancelling the earlier task.
#[derive(Debug)]
pub struct NetworkOperation {
    request: RequestDescriptor,
    task: Mutex<Option<TaskHandle>>,
}

impl NetworkOperation {
    /// Wrap `request`
    pub fn new(request: RequestDescriptor) -> Self {
        Self {
            request,
            task: Mutex::new(None),
        }
    }

    /// The wrapped request
    pub fn request(&self) -> &RequestDescriptor {
        &self.request
    }

    /// Dispatch the request; `completion` runs on the dispatcher's delivery thread
    pub fn execute<F>(&self, dispatcher: &Dispatcher, completion: F)
    where
        F: FnOnce(OperationResult) + Send + 'static,
    {
        let handle = dispatcher.dispatch(self.request.clone(), completion);
        *self.task.lock() = handle;
    }

    /// Cancel the most recent execution, if it is still running
    pub fn cancel(&self) {
        if let Some(handle) = self.task.lock().as_ref() {
            handle.cancel();
        }
    }

    /// Whether the most recent execution has delivered, or none was started
    pub fn is_finished(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_none_or(TaskHandle::is_finished)
    }
}
