//! Request dispatch over a [`Transport`]

mod classify;
mod normalize;

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::oneshot;

use crate::backend::Transport;
use crate::backend::registry::TaskHandle;
use crate::backend::types::ProgressCallback;
use crate::delivery::DeliveryQueue;
use crate::{Environment, Error, OperationKind, OperationResult, RequestDescriptor, Result};

/// Executes [`RequestDescriptor`]s against an [`Environment`] through a
/// [`Transport`], delivering exactly one [`OperationResult`] per request.
///
/// Every completion and progress callback runs on the dispatcher's
/// [`DeliveryQueue`] thread, whatever thread the transport finished on.
///
/// ```no_run
/// use courier::{Dispatcher, Environment, RequestDescriptor};
///
/// # fn main() -> courier::Result<()> {
/// let dispatcher = Dispatcher::reqwest(Environment::new("https://api.test"))?;
/// let request = RequestDescriptor::builder("/users").parameter("id", "42").build();
///
/// let handle = dispatcher.dispatch(request, |result| {
///     println!("got {:?}", result.status());
/// });
/// # let _ = handle;
/// # Ok(())
/// # }
/// ```
pub struct Dispatcher {
    environment: ArcSwap<Environment>,
    transport: Arc<dyn Transport>,
    delivery: DeliveryQueue,
}

impl Dispatcher {
    /// Create a dispatcher with its own delivery thread
    pub fn new(environment: Environment, transport: Arc<dyn Transport>) -> Result<Self> {
        Ok(Self::with_delivery(
            environment,
            transport,
            DeliveryQueue::new()?,
        ))
    }

    /// Create a dispatcher that delivers on an existing queue
    pub fn with_delivery(
        environment: Environment,
        transport: Arc<dyn Transport>,
        delivery: DeliveryQueue,
    ) -> Self {
        Self {
            environment: ArcSwap::from_pointee(environment),
            transport,
            delivery,
        }
    }

    /// Create a dispatcher over a default [`ReqwestBackend`](crate::ReqwestBackend)
    #[cfg(feature = "backend-reqwest")]
    pub fn reqwest(environment: Environment) -> Result<Self> {
        let backend = crate::ReqwestBackend::new()?;
        Self::new(environment, Arc::new(backend))
    }

    /// Create a dispatcher builder
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Current environment
    pub fn environment(&self) -> Arc<Environment> {
        self.environment.load_full()
    }

    /// Replace the environment for requests dispatched from now on
    pub fn set_environment(&self, environment: Environment) {
        tracing::debug!(base_url = environment.base_url(), "environment replaced");
        self.environment.store(Arc::new(environment));
    }

    /// The queue completions are delivered on
    pub fn delivery(&self) -> &DeliveryQueue {
        &self.delivery
    }

    /// Dispatch `request` and call `completion` exactly once with its result.
    ///
    /// Returns `None` if the request never reached the transport: the wire
    /// request could not be built, or an upload has no source file. The
    /// completion still receives `Error(BadRequest, None)` in that case.
    pub fn dispatch<F>(&self, request: RequestDescriptor, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(OperationResult) + Send + 'static,
    {
        let environment = self.environment.load();
        let wire = match request.to_wire_request(&environment) {
            Ok(wire) => wire,
            Err(e) => {
                tracing::warn!(path = request.path(), error = %e, "could not build request");
                self.reject(Error::BadRequest(Some(e.to_string())), completion);
                return None;
            }
        };

        tracing::debug!(
            method = %wire.method,
            url = %wire.url,
            kind = ?request.kind(),
            "dispatching request"
        );

        let delivery = self.delivery.clone();
        let progress = request.progress().cloned().map(|p| self.forward_progress(p));

        let handle = match request.kind() {
            OperationKind::Data => self.transport.data_task(
                wire,
                Box::new(move |outcome| {
                    let result = classify::json_result(outcome);
                    deliver(&delivery, result, completion);
                }),
            ),
            OperationKind::ValidationOnly => self.transport.data_task(
                wire,
                Box::new(move |outcome| {
                    let result = classify::validation_result(outcome);
                    deliver(&delivery, result, completion);
                }),
            ),
            OperationKind::Download => self.transport.download_task(
                wire,
                progress,
                Box::new(move |outcome| {
                    let result = classify::file_result(outcome);
                    deliver(&delivery, result, completion);
                }),
            ),
            OperationKind::Upload => {
                let Some(source) = request.upload_source() else {
                    tracing::warn!(path = request.path(), "upload without a source file");
                    self.reject(
                        Error::BadRequest(Some("upload requires a source file".to_string())),
                        completion,
                    );
                    return None;
                };
                self.transport.upload_task(
                    wire,
                    source.to_path_buf(),
                    progress,
                    Box::new(move |outcome| {
                        let result = classify::json_result(outcome);
                        deliver(&delivery, result, completion);
                    }),
                )
            }
        };

        tracing::trace!(task = %handle.id(), "task started");
        Some(handle)
    }

    /// Dispatch `request` and wait for its result.
    ///
    /// Dropping the returned future cancels the task.
    pub async fn execute(&self, request: RequestDescriptor) -> OperationResult {
        let (tx, rx) = oneshot::channel();
        let guard = CancelOnDrop(self.dispatch(request, move |result| {
            let _ = tx.send(result);
        }));

        let result = rx.await.unwrap_or_else(|_| {
            OperationResult::error(Error::Internal("completion was dropped".to_string()), None)
        });
        drop(guard);
        result
    }

    fn reject<F>(&self, error: Error, completion: F)
    where
        F: FnOnce(OperationResult) + Send + 'static,
    {
        deliver(&self.delivery, OperationResult::error(error, None), completion);
    }

    fn forward_progress(&self, progress: ProgressCallback) -> ProgressCallback {
        let delivery = self.delivery.clone();
        Arc::new(move |fraction| {
            let progress = progress.clone();
            delivery.post(move || progress(fraction));
        })
    }
}

/// Builder for [`Dispatcher`]
#[derive(Default)]
pub struct DispatcherBuilder {
    environment: Environment,
    transport: Option<Arc<dyn Transport>>,
    #[cfg(feature = "backend-reqwest")]
    backend_config: crate::BackendConfig,
    delivery: Option<DeliveryQueue>,
}

impl DispatcherBuilder {
    /// Create a new dispatcher builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the environment requests resolve against
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Use a custom transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Configure the default reqwest transport; ignored with a custom transport
    #[cfg(feature = "backend-reqwest")]
    pub fn backend_config(mut self, config: crate::BackendConfig) -> Self {
        self.backend_config = config;
        self
    }

    /// Deliver completions on an existing queue
    pub fn delivery(mut self, delivery: DeliveryQueue) -> Self {
        self.delivery = Some(delivery);
        self
    }

    /// Build the dispatcher
    pub fn build(self) -> Result<Dispatcher> {
        let transport = match self.transport {
            Some(transport) => transport,
            #[cfg(feature = "backend-reqwest")]
            None => Arc::new(crate::ReqwestBackend::with_config(self.backend_config)?),
            #[cfg(not(feature = "backend-reqwest"))]
            None => {
                return Err(Error::Internal(
                    "no transport configured and the reqwest backend is disabled".to_string(),
                ));
            }
        };
        let delivery = match self.delivery {
            Some(delivery) => delivery,
            None => DeliveryQueue::new()?,
        };
        Ok(Dispatcher::with_delivery(self.environment, transport, delivery))
    }
}

fn deliver<F>(delivery: &DeliveryQueue, result: OperationResult, completion: F)
where
    F: FnOnce(OperationResult) + Send + 'static,
{
    tracing::debug!(
        status = ?result.status(),
        error = ?result.as_error(),
        "request finished"
    );
    delivery.post(move || completion(result));
}

struct CancelOnDrop(Option<TaskHandle>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = &self.0 {
            handle.cancel();
        }
    }
}
