//! Normalized outcome of a dispatched request

use http::{HeaderMap, StatusCode};
use std::path::{Path, PathBuf};
use url::Url;

use crate::Error;

/// Status line, headers and effective URL of an HTTP response
#[derive(Debug, Clone)]
pub struct ResponseMetadata {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// URL the response came from, after redirects
    pub url: Url,
}

impl ResponseMetadata {
    /// Create metadata for a response
    pub fn new(status: StatusCode, headers: HeaderMap, url: Url) -> Self {
        Self {
            status,
            headers,
            url,
        }
    }

    /// Get a header value as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Content length announced by the server
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")
            .and_then(|s| s.parse::<u64>().ok())
    }
}

/// The one outcome delivered for every dispatched request.
#[derive(Debug)]
pub enum OperationResult {
    /// Parsed and normalized JSON body
    Json {
        /// The JSON document; `Null` for validation-only requests
        value: serde_json::Value,
        /// Response metadata
        response: ResponseMetadata,
    },
    /// Downloaded file
    File {
        /// Where the transport left the file
        location: Option<PathBuf>,
        /// Response metadata
        response: ResponseMetadata,
    },
    /// Any failure, with the response if one was received
    Error {
        /// What went wrong
        error: Error,
        /// Response metadata, if the server answered
        response: Option<ResponseMetadata>,
    },
}

impl OperationResult {
    pub(crate) fn error(error: Error, response: Option<ResponseMetadata>) -> Self {
        OperationResult::Error { error, response }
    }

    /// Whether this is a `Json` or `File` result
    pub fn is_success(&self) -> bool {
        !matches!(self, OperationResult::Error { .. })
    }

    /// Response metadata, if a response was received
    pub fn response(&self) -> Option<&ResponseMetadata> {
        match self {
            OperationResult::Json { response, .. } | OperationResult::File { response, .. } => {
                Some(response)
            }
            OperationResult::Error { response, .. } => response.as_ref(),
        }
    }

    /// HTTP status code, if a response was received
    pub fn status(&self) -> Option<StatusCode> {
        self.response().map(|r| r.status)
    }

    /// The error, for `Error` results
    pub fn as_error(&self) -> Option<&Error> {
        match self {
            OperationResult::Error { error, .. } => Some(error),
            _ => None,
        }
    }

    /// The JSON document, for `Json` results
    pub fn json(&self) -> Option<&serde_json::Value> {
        match self {
            OperationResult::Json { value, .. } => Some(value),
            _ => None,
        }
    }

    /// The file location, for `File` results
    pub fn file(&self) -> Option<&Path> {
        match self {
            OperationResult::File { location, .. } => location.as_deref(),
            _ => None,
        }
    }

    /// Decode a `Json` result into `T` with the default [`crate::JsonDecoder`]
    pub fn decode<T: serde::de::DeserializeOwned>(self) -> crate::Result<(T, ResponseMetadata)> {
        use crate::decode::ResultDecoder;
        crate::JsonDecoder.decode(self)
    }
}
