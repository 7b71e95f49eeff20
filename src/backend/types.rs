//! Shared types between the dispatcher and transport implementations

use crate::body::Body;
use crate::{Error, ResponseMetadata};
use bytes::Bytes;
use http::{HeaderMap, Method};
use std::{path::PathBuf, sync::Arc};
use url::Url;

/// Transport-level HTTP request built from a [`crate::RequestDescriptor`]
#[derive(Debug, Clone)]
pub struct WireRequest {
    /// HTTP method for the request
    pub method: Method,
    /// URL for the request
    pub url: Url,
    /// Headers for the request, defaults already merged
    pub headers: HeaderMap,
    /// Optional body content
    pub body: Option<Body>,
}

/// Callback type for progress reporting; receives a fraction in `[0, 1]`
pub type ProgressCallback = Arc<dyn Fn(f32) + Send + Sync + 'static>;

/// Terminal callback of a data or upload task
pub type DataCompletion = Box<dyn FnOnce(TransportOutcome<Bytes>) + Send + 'static>;

/// Terminal callback of a download task
pub type FileCompletion = Box<dyn FnOnce(TransportOutcome<PathBuf>) + Send + 'static>;

/// Raw outcome of a transport task, before any status policy is applied.
///
/// Any combination of the three fields can occur: a response with an error
/// (body stream broke), an error without a response (connection refused), or
/// a response without a payload.
#[derive(Debug)]
pub struct TransportOutcome<T> {
    /// Body bytes or file location
    pub payload: Option<T>,
    /// Response metadata, if the server answered
    pub response: Option<ResponseMetadata>,
    /// Transport error, if any
    pub error: Option<Error>,
}

impl<T> TransportOutcome<T> {
    /// A completed response
    pub fn completed(payload: Option<T>, response: ResponseMetadata) -> Self {
        Self {
            payload,
            response: Some(response),
            error: None,
        }
    }

    /// A failure before any response was received
    pub fn failed(error: Error) -> Self {
        Self {
            payload: None,
            response: None,
            error: Some(error),
        }
    }

    /// A failure after the response head was received
    pub fn interrupted(response: ResponseMetadata, error: Error) -> Self {
        Self {
            payload: None,
            response: Some(response),
            error: Some(error),
        }
    }
}

/// Opaque identifier of an in-flight transport task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    /// Numeric value, unique within the registry that issued it
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}
