//! Turning raw transport outcomes into [`OperationResult`]s

use bytes::Bytes;
use serde_json::Value;
use std::path::PathBuf;

use super::normalize::normalize_empty_arrays;
use crate::backend::types::TransportOutcome;
use crate::error::classify_status;
use crate::{Error, OperationResult, ResponseMetadata};

type Verified<T> = std::result::Result<(T, ResponseMetadata), (Error, Option<ResponseMetadata>)>;

/// Apply the status policy to an outcome.
///
/// Without a response only cancellation, timeouts and local I/O failures
/// keep their identity; anything else is `InvalidResponse`. A 2xx response
/// without payload is `NoData` unless the transport reported why.
fn verify<T>(outcome: TransportOutcome<T>) -> Verified<T> {
    let TransportOutcome {
        payload,
        response,
        error,
    } = outcome;

    let Some(response) = response else {
        let error = match error {
            Some(e @ (Error::Cancelled | Error::Timeout | Error::Io(_))) => e,
            Some(other) => {
                tracing::debug!(error = %other, "no response received");
                Error::InvalidResponse
            }
            None => Error::InvalidResponse,
        };
        return Err((error, None));
    };

    let detail = error.as_ref().map(|e| e.to_string());
    if let Err(e) = classify_status(response.status, detail) {
        return Err((e, Some(response)));
    }

    match (payload, error) {
        (Some(payload), _) => Ok((payload, response)),
        (None, Some(error)) => Err((error, Some(response))),
        (None, None) => Err((Error::NoData, Some(response))),
    }
}

/// Data and upload path: verify, parse, normalize
pub(crate) fn json_result(outcome: TransportOutcome<Bytes>) -> OperationResult {
    let outcome = TransportOutcome {
        payload: outcome.payload.filter(|bytes| !bytes.is_empty()),
        response: outcome.response,
        error: outcome.error,
    };

    match verify(outcome) {
        Ok((bytes, response)) => match parse_json(&bytes) {
            Ok(value) => OperationResult::Json {
                value: normalize_empty_arrays(value),
                response,
            },
            Err(error) => OperationResult::error(error, Some(response)),
        },
        Err((error, response)) => OperationResult::error(error, response),
    }
}

/// Validation-only path: the status code is the whole answer
pub(crate) fn validation_result(outcome: TransportOutcome<Bytes>) -> OperationResult {
    let outcome = TransportOutcome {
        payload: Some(()),
        response: outcome.response,
        error: outcome.error,
    };

    match verify(outcome) {
        Ok(((), response)) => OperationResult::Json {
            value: Value::Null,
            response,
        },
        Err((error, response)) => OperationResult::error(error, response),
    }
}

/// Download path; a file that failed classification is removed
pub(crate) fn file_result(outcome: TransportOutcome<PathBuf>) -> OperationResult {
    let location = outcome.payload.clone();

    match verify(outcome) {
        Ok((location, response)) => OperationResult::File {
            location: Some(location),
            response,
        },
        Err((error, response)) => {
            if let Some(location) = location {
                if let Err(e) = std::fs::remove_file(&location) {
                    tracing::debug!(
                        path = %location.display(),
                        error = %e,
                        "could not remove rejected download"
                    );
                }
            }
            OperationResult::error(error, response)
        }
    }
}

fn parse_json(bytes: &[u8]) -> crate::Result<Value> {
    let value: Value = serde_json::from_slice(bytes)?;
    match value {
        Value::Object(_) | Value::Array(_) => Ok(value),
        other => Err(Error::ParseError(Some(format!(
            "expected a JSON object or array, got {}",
            other
        )))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, StatusCode};
    use serde_json::json;
    use url::Url;

    fn metadata(code: u16) -> ResponseMetadata {
        ResponseMetadata::new(
            StatusCode::from_u16(code).unwrap(),
            HeaderMap::new(),
            Url::parse("https://api.test/users").unwrap(),
        )
    }

    fn body(code: u16, bytes: &'static [u8]) -> TransportOutcome<Bytes> {
        TransportOutcome::completed(Some(Bytes::from_static(bytes)), metadata(code))
    }

    #[test]
    fn test_success_keeps_status() {
        for code in [200, 201, 202, 299] {
            match json_result(body(code, br#"{"id": 1}"#)) {
                OperationResult::Json { value, response } => {
                    assert_eq!(value, json!({"id": 1}));
                    assert_eq!(response.status.as_u16(), code);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_client_and_server_errors() {
        for code in [400, 401, 404, 499] {
            let result = json_result(body(code, br#"{"error": "x"}"#));
            assert!(matches!(result.as_error(), Some(Error::BadRequest(_))));
            assert_eq!(result.status().map(|s| s.as_u16()), Some(code));
        }
        for code in [500, 502, 599] {
            let result = json_result(body(code, b""));
            assert!(matches!(
                result,
                OperationResult::Error { error: Error::ServerError(_), response: Some(_) }
            ));
        }
    }

    #[test]
    fn test_other_status_is_unknown() {
        let result = json_result(body(304, b""));
        assert!(matches!(
            result,
            OperationResult::Error { error: Error::Unknown, .. }
        ));
    }

    #[test]
    fn test_empty_body_is_no_data() {
        let result = json_result(body(204, b""));
        assert!(matches!(result.as_error(), Some(Error::NoData)));
        assert_eq!(result.status(), Some(StatusCode::NO_CONTENT));

        let result = json_result(TransportOutcome::completed(None, metadata(200)));
        assert!(matches!(result, OperationResult::Error { error: Error::NoData, .. }));
    }

    #[test]
    fn test_body_is_normalized() {
        let result = json_result(body(200, br#"{"items": [], "name": "x"}"#));
        assert_eq!(result.json(), Some(&json!({"items": null, "name": "x"})));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let result = json_result(body(200, b"{not json"));
        assert!(matches!(
            result,
            OperationResult::Error { error: Error::ParseError(Some(_)), response: Some(_) }
        ));
    }

    #[test]
    fn test_scalar_json_is_parse_error() {
        let result = json_result(body(200, b"42"));
        assert!(matches!(
            result,
            OperationResult::Error { error: Error::ParseError(_), .. }
        ));
    }

    #[test]
    fn test_missing_response() {
        let result = json_result(TransportOutcome::failed(Error::Network {
            message: "refused".into(),
        }));
        assert!(matches!(
            result,
            OperationResult::Error { error: Error::InvalidResponse, response: None }
        ));

        let result = json_result(TransportOutcome::failed(Error::Cancelled));
        assert!(matches!(
            result,
            OperationResult::Error { error: Error::Cancelled, response: None }
        ));

        let result = json_result(TransportOutcome::failed(Error::Timeout));
        assert!(matches!(result, OperationResult::Error { error: Error::Timeout, .. }));
    }

    #[test]
    fn test_interrupted_body_keeps_transport_error() {
        let result = json_result(TransportOutcome::interrupted(
            metadata(200),
            Error::Network {
                message: "reset".into(),
            },
        ));
        assert!(matches!(
            result,
            OperationResult::Error { error: Error::Network { .. }, response: Some(_) }
        ));
    }

    #[test]
    fn test_bad_request_carries_transport_detail() {
        let result = json_result(TransportOutcome::interrupted(
            metadata(400),
            Error::Network {
                message: "reset".into(),
            },
        ));
        match result {
            OperationResult::Error {
                error: Error::BadRequest(Some(detail)),
                ..
            } => assert!(detail.contains("reset")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_validation_only() {
        let result = validation_result(body(204, b""));
        assert!(matches!(result, OperationResult::Json { value: Value::Null, .. }));

        let result = validation_result(body(200, b"<html>not json</html>"));
        assert!(result.is_success());

        let result = validation_result(body(404, b""));
        assert!(matches!(result, OperationResult::Error { error: Error::BadRequest(_), .. }));
    }

    #[test]
    fn test_file_result() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let (_, path) = file.keep().unwrap();

        let ok = file_result(TransportOutcome::completed(Some(path.clone()), metadata(200)));
        assert_eq!(ok.file(), Some(path.as_path()));
        assert!(path.exists());

        let rejected = file_result(TransportOutcome::completed(Some(path.clone()), metadata(500)));
        assert!(matches!(rejected, OperationResult::Error { error: Error::ServerError(_), .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_download_without_file_is_no_data() {
        let result = file_result(TransportOutcome::completed(None, metadata(200)));
        assert!(matches!(result, OperationResult::Error { error: Error::NoData, .. }));
    }
}
