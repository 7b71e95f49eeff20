//! Error types and status-code classification

use http::StatusCode;
use thiserror::Error;

/// Result type for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure a dispatched request can end in.
///
/// The first group mirrors what the dispatcher reports after looking at a
/// transport outcome; the decode-time kinds (`Info`, `Redirection`,
/// `ClientError`) only come out of [`crate::JsonDecoder`]; the transport
/// kinds are what a [`crate::Transport`] hands back when no HTTP response
/// was received.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Header name or value that cannot be sent
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Parameter that cannot be encoded in the requested body format
    #[error("Invalid parameter `{key}`: {reason}")]
    InvalidParameter {
        /// Parameter name
        key: String,
        /// Why the value was rejected
        reason: String,
    },

    /// The request could not be built, or the server answered 4xx
    #[error("Bad request{}", detail_suffix(.0))]
    BadRequest(Option<String>),

    /// 2xx response without a payload
    #[error("No data in response")]
    NoData,

    /// No HTTP response was received
    #[error("Invalid response")]
    InvalidResponse,

    /// The server answered 5xx, or a result was not decodable JSON
    #[error("Server error{}", detail_suffix(.0))]
    ServerError(Option<String>),

    /// Body or model could not be parsed
    #[error("Parse error{}", detail_suffix(.0))]
    ParseError(Option<String>),

    /// Status code outside every known range
    #[error("Unknown error")]
    Unknown,

    /// Decoder saw a 1xx status
    #[error("Informational response")]
    Info,

    /// Decoder saw a 3xx status
    #[error("Redirection response")]
    Redirection,

    /// Decoder saw a 4xx or 5xx status
    #[error("Client error")]
    ClientError,

    /// Network error reported by the transport
    #[error("Network error: {message}")]
    Network {
        /// Error message
        message: String,
    },

    /// Timeout error
    #[error("Request timed out")]
    Timeout,

    /// Request was cancelled
    #[error("Request was cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(": {}", detail),
        None => String::new(),
    }
}

impl Error {
    /// Check whether this error came from a cancelled task
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Check whether this error came from a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::ParseError(Some(e.to_string()))
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::InvalidUrl(e.to_string())
    }
}

/// Dispatch-time status policy.
///
/// `Ok(())` for 2xx. 4xx and 5xx carry the transport's own error text when
/// there was one.
pub(crate) fn classify_status(status: StatusCode, detail: Option<String>) -> Result<()> {
    match status.as_u16() {
        200..=299 => Ok(()),
        400..=499 => Err(Error::BadRequest(detail)),
        500..=599 => Err(Error::ServerError(detail)),
        _ => Err(Error::Unknown),
    }
}

/// Decode-time status policy, a second gate behind [`classify_status`].
pub(crate) fn recheck_status(status: StatusCode) -> Result<()> {
    match status.as_u16() {
        100..=199 => Err(Error::Info),
        300..=399 => Err(Error::Redirection),
        400..=599 => Err(Error::ClientError),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> StatusCode {
        StatusCode::from_u16(code).unwrap()
    }

    #[test]
    fn test_classify_success_range() {
        for code in [200, 201, 204, 299] {
            assert!(classify_status(status(code), None).is_ok(), "{}", code);
        }
    }

    #[test]
    fn test_classify_client_and_server_errors() {
        assert!(matches!(
            classify_status(status(404), Some("not found".into())),
            Err(Error::BadRequest(Some(ref d))) if d == "not found"
        ));
        assert!(matches!(
            classify_status(status(499), None),
            Err(Error::BadRequest(None))
        ));
        assert!(matches!(
            classify_status(status(500), None),
            Err(Error::ServerError(None))
        ));
        assert!(matches!(
            classify_status(status(503), None),
            Err(Error::ServerError(None))
        ));
    }

    #[test]
    fn test_classify_other_ranges_are_unknown() {
        for code in [100, 101, 301, 304, 600, 999] {
            assert!(
                matches!(classify_status(status(code), None), Err(Error::Unknown)),
                "{}",
                code
            );
        }
    }

    #[test]
    fn test_recheck_status() {
        assert!(matches!(recheck_status(status(100)), Err(Error::Info)));
        assert!(matches!(recheck_status(status(302)), Err(Error::Redirection)));
        assert!(matches!(recheck_status(status(404)), Err(Error::ClientError)));
        assert!(matches!(recheck_status(status(502)), Err(Error::ClientError)));
        assert!(recheck_status(status(200)).is_ok());
        assert!(recheck_status(status(600)).is_ok());
    }

    #[test]
    fn test_display_with_detail() {
        assert_eq!(
            Error::BadRequest(Some("missing id".into())).to_string(),
            "Bad request: missing id"
        );
        assert_eq!(Error::ServerError(None).to_string(), "Server error");
    }

    #[test]
    fn test_transport_kinds() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(Error::Timeout.is_timeout());
        assert!(!Error::InvalidResponse.is_cancelled());
        let io = Error::from(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(matches!(io, Error::Io(_)));
    }
}
