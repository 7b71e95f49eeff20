//! Reqwest backend for cross-platform HTTP support

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use http::header::CONTENT_LENGTH;
use tempfile::TempPath;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::runtime::{Handle, Runtime};
use tokio::sync::Semaphore;

use super::registry::{Completion, TaskHandle, TaskRegistry};
use super::types::{
    DataCompletion, FileCompletion, ProgressCallback, TaskId, TransportOutcome, WireRequest,
};
use super::{BackendConfig, Transport};
use crate::{Error, ResponseMetadata, Result};

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Reqwest backend for cross-platform HTTP
///
/// Operations run on the tokio runtime that was current when the backend
/// was built, or on a runtime the backend owns if there was none. At most
/// [`BackendConfig::max_concurrent_operations`] of them talk to the network
/// at once.
#[derive(Clone)]
pub struct ReqwestBackend {
    client: reqwest::Client,
    runtime: RuntimeHandle,
    permits: Arc<Semaphore>,
    registry: Arc<TaskRegistry>,
    download_directory: Option<PathBuf>,
}

#[derive(Clone)]
struct RuntimeHandle {
    handle: Handle,
    owned: Option<Arc<OwnedRuntime>>,
}

struct OwnedRuntime(Option<Runtime>);

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        // shutdown_background never blocks, so the last clone may drop anywhere
        if let Some(runtime) = self.0.take() {
            runtime.shutdown_background();
        }
    }
}

impl ReqwestBackend {
    /// Create a new Reqwest backend
    pub fn new() -> Result<Self> {
        Self::with_config(BackendConfig::default())
    }

    /// Create a new Reqwest backend with configuration
    pub fn with_config(config: BackendConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();

        if let Some(timeout) = config.resource_timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(user_agent) = config.user_agent {
            builder = builder.user_agent(user_agent);
        }

        if let Some(default_headers) = config.default_headers {
            builder = builder.default_headers(default_headers);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create reqwest client: {}", e)))?;

        let max_concurrent = config.max_concurrent_operations.max(1);
        let runtime = match Handle::try_current() {
            Ok(handle) => RuntimeHandle {
                handle,
                owned: None,
            },
            Err(_) => {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(max_concurrent)
                    .thread_name("courier-transport")
                    .enable_all()
                    .build()?;
                RuntimeHandle {
                    handle: runtime.handle().clone(),
                    owned: Some(Arc::new(OwnedRuntime(Some(runtime)))),
                }
            }
        };

        tracing::debug!(max_concurrent, "created reqwest backend");

        Ok(Self {
            client,
            runtime,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            registry: Arc::new(TaskRegistry::new()),
            download_directory: config.download_directory,
        })
    }

    /// Get the underlying reqwest client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Number of tasks that have not delivered their completion yet
    pub fn pending_tasks(&self) -> usize {
        self.registry.len()
    }

    fn spawn<F>(&self, id: TaskId, work: F) -> TaskHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = self.permits.clone();
        let join = self.runtime.handle.spawn(async move {
            // The semaphore is never closed.
            let _permit = permits.acquire_owned().await.ok();
            work.await;
        });
        TaskHandle::new(id, self.registry.clone(), Some(join.abort_handle()))
    }

    async fn send(
        &self,
        request: WireRequest,
        body: Option<reqwest::Body>,
    ) -> Result<reqwest::Response> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);

        if let Some(body) = body {
            builder = builder.body(body);
        } else if let Some(body) = request.body {
            builder = builder.body(body.to_bytes()?);
        }

        builder.send().await.map_err(map_reqwest_error)
    }

    async fn fetch(&self, request: WireRequest) -> TransportOutcome<Bytes> {
        let response = match self.send(request, None).await {
            Ok(response) => response,
            Err(e) => return TransportOutcome::failed(e),
        };
        let metadata = metadata_of(&response);

        match response.bytes().await {
            Ok(bytes) => TransportOutcome::completed(Some(bytes), metadata),
            Err(e) => TransportOutcome::interrupted(metadata, map_reqwest_error(e)),
        }
    }

    async fn download(&self, id: TaskId, request: WireRequest) -> TransportOutcome<PathBuf> {
        let response = match self.send(request, None).await {
            Ok(response) => response,
            Err(e) => return TransportOutcome::failed(e),
        };
        let metadata = metadata_of(&response);
        let total_bytes = response.content_length().filter(|total| *total > 0);

        // Deleted on drop, including when the task is aborted mid-stream.
        let location = match download_location(self.download_directory.as_deref()) {
            Ok(location) => location,
            Err(e) => return TransportOutcome::interrupted(metadata, e),
        };

        let bytes_written = match self.write_body(id, response, &location, total_bytes).await {
            Ok(bytes_written) => bytes_written,
            Err(e) => return TransportOutcome::interrupted(metadata, e),
        };

        match location.keep() {
            Ok(location) => {
                tracing::debug!(
                    task = %id,
                    bytes_written,
                    path = %location.display(),
                    "download finished"
                );
                TransportOutcome::completed(Some(location), metadata)
            }
            Err(e) => TransportOutcome::interrupted(metadata, Error::Io(e.error)),
        }
    }

    async fn write_body(
        &self,
        id: TaskId,
        response: reqwest::Response,
        location: &Path,
        total_bytes: Option<u64>,
    ) -> Result<u64> {
        let mut file = tokio::fs::File::create(location).await?;
        let mut stream = response.bytes_stream();
        let mut bytes_written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            file.write_all(&chunk).await?;
            bytes_written += chunk.len() as u64;

            if let Some(total) = total_bytes {
                self.registry
                    .report_progress(id, bytes_written as f32 / total as f32);
            }
        }

        file.flush().await?;
        Ok(bytes_written)
    }

    async fn upload(
        &self,
        id: TaskId,
        mut request: WireRequest,
        source: PathBuf,
    ) -> TransportOutcome<Bytes> {
        let file = match tokio::fs::File::open(&source).await {
            Ok(file) => file,
            Err(e) => return TransportOutcome::failed(Error::Io(e)),
        };
        let total_bytes = match file.metadata().await {
            Ok(meta) => meta.len(),
            Err(e) => return TransportOutcome::failed(Error::Io(e)),
        };

        let registry = self.registry.clone();
        let chunks = futures_util::stream::try_unfold((file, 0u64), move |(mut file, sent)| {
            let registry = registry.clone();
            async move {
                let mut buffer = vec![0u8; UPLOAD_CHUNK_SIZE];
                let read = file.read(&mut buffer).await?;
                if read == 0 {
                    return Ok::<_, std::io::Error>(None);
                }
                buffer.truncate(read);
                let sent = sent + read as u64;
                if total_bytes > 0 {
                    registry.report_progress(id, sent as f32 / total_bytes as f32);
                }
                Ok(Some((Bytes::from(buffer), (file, sent))))
            }
        });

        request
            .headers
            .insert(CONTENT_LENGTH, http::HeaderValue::from(total_bytes));

        let response = match self
            .send(request, Some(reqwest::Body::wrap_stream(chunks)))
            .await
        {
            Ok(response) => response,
            Err(e) => return TransportOutcome::failed(e),
        };
        let metadata = metadata_of(&response);

        match response.bytes().await {
            Ok(bytes) => TransportOutcome::completed(Some(bytes), metadata),
            Err(e) => TransportOutcome::interrupted(metadata, map_reqwest_error(e)),
        }
    }
}

impl Transport for ReqwestBackend {
    fn data_task(&self, request: WireRequest, completion: DataCompletion) -> TaskHandle {
        let id = self.registry.register(None, Completion::Data(completion));
        let this = self.clone();
        self.spawn(id, async move {
            let outcome = this.fetch(request).await;
            if let Some(handlers) = this.registry.take(id) {
                handlers.complete_data(outcome);
            }
        })
    }

    fn download_task(
        &self,
        request: WireRequest,
        progress: Option<ProgressCallback>,
        completion: FileCompletion,
    ) -> TaskHandle {
        let id = self.registry.register(progress, Completion::File(completion));
        let this = self.clone();
        self.spawn(id, async move {
            let outcome = this.download(id, request).await;
            match this.registry.take(id) {
                Some(handlers) => handlers.complete_file(outcome),
                None => {
                    // Cancelled after the file was kept. No await here, an
                    // abort must not cut the cleanup short.
                    if let Some(location) = outcome.payload {
                        let _ = std::fs::remove_file(location);
                    }
                }
            }
        })
    }

    fn upload_task(
        &self,
        request: WireRequest,
        source: PathBuf,
        progress: Option<ProgressCallback>,
        completion: DataCompletion,
    ) -> TaskHandle {
        let id = self.registry.register(progress, Completion::Data(completion));
        let this = self.clone();
        self.spawn(id, async move {
            let outcome = this.upload(id, request, source).await;
            if let Some(handlers) = this.registry.take(id) {
                handlers.complete_data(outcome);
            }
        })
    }
}

fn metadata_of(response: &reqwest::Response) -> ResponseMetadata {
    ResponseMetadata::new(
        response.status(),
        response.headers().clone(),
        response.url().clone(),
    )
}

fn map_reqwest_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout
    } else {
        Error::Network {
            message: format!("Request failed: {}", e),
        }
    }
}

fn download_location(directory: Option<&Path>) -> Result<TempPath> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("courier-").suffix(".download");
    let file = match directory {
        Some(directory) => builder.tempfile_in(directory)?,
        None => builder.tempfile()?,
    };
    Ok(file.into_temp_path())
}
