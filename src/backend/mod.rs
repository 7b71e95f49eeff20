//! Transport abstraction and its implementations

pub mod registry;
pub mod types;

#[cfg(feature = "backend-reqwest")]
pub mod reqwest;

use std::path::PathBuf;
use std::time::Duration;

use registry::TaskHandle;
use types::{DataCompletion, FileCompletion, ProgressCallback, WireRequest};

/// Default number of transport operations allowed to run at once
pub const DEFAULT_MAX_CONCURRENT_OPERATIONS: usize = 3;

/// Default time allowed for a whole transfer
pub const DEFAULT_RESOURCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for backend creation
#[derive(Clone, Debug)]
pub struct BackendConfig {
    /// How many transport operations may run at once; further ones queue
    pub max_concurrent_operations: usize,
    /// Time allowed for a whole transfer, from connect to last byte
    pub resource_timeout: Option<Duration>,
    /// User agent string
    pub user_agent: Option<String>,
    /// Headers added by the transport to every request
    pub default_headers: Option<http::HeaderMap>,
    /// Where downloads are written; the system temporary directory if unset
    pub download_directory: Option<PathBuf>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            max_concurrent_operations: DEFAULT_MAX_CONCURRENT_OPERATIONS,
            resource_timeout: Some(DEFAULT_RESOURCE_TIMEOUT),
            user_agent: None,
            default_headers: None,
            download_directory: None,
        }
    }
}

/// The HTTP stack underneath a [`crate::Dispatcher`].
///
/// Each operation returns immediately with a handle and later invokes its
/// completion exactly once, on any thread. Progress callbacks, if given, may
/// fire zero or more times before the completion and never after it.
/// Implementations keep their callbacks in a
/// [`TaskRegistry`](registry::TaskRegistry) so that
/// [`TaskHandle::cancel`] and the worker race on a single removal.
pub trait Transport: Send + Sync {
    /// Fetch the response body into memory
    fn data_task(&self, request: WireRequest, completion: DataCompletion) -> TaskHandle;

    /// Stream the response body into a file
    fn download_task(
        &self,
        request: WireRequest,
        progress: Option<ProgressCallback>,
        completion: FileCompletion,
    ) -> TaskHandle;

    /// Send `source` as the request body and fetch the response body
    fn upload_task(
        &self,
        request: WireRequest,
        source: PathBuf,
        progress: Option<ProgressCallback>,
        completion: DataCompletion,
    ) -> TaskHandle;
}
