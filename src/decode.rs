//! Typed decoding of [`OperationResult`]s

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::recheck_status;
use crate::{Error, OperationResult, ResponseMetadata, Result};

/// Turns an [`OperationResult`] into a typed model
pub trait ResultDecoder {
    /// Decode `result` into `T`, keeping the response metadata alongside
    fn decode<T: DeserializeOwned>(
        &self,
        result: OperationResult,
    ) -> Result<(T, ResponseMetadata)>;
}

/// Decoder for `Json` results using `serde_json`.
///
/// `File` and `Error` results, and a `null` document, are reported as
/// [`Error::ServerError`]. The status code is checked once more before the
/// document is deserialized.
///
/// ```
/// use courier::{JsonDecoder, OperationResult, ResponseMetadata, ResultDecoder};
/// use http::{HeaderMap, StatusCode};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     tags: Option<Vec<String>>,
/// }
///
/// let result = OperationResult::Json {
///     value: serde_json::json!({"id": 3, "tags": null}),
///     response: ResponseMetadata::new(
///         StatusCode::OK,
///         HeaderMap::new(),
///         "https://api.test/users/3".parse().unwrap(),
///     ),
/// };
///
/// let (user, _): (User, _) = JsonDecoder.decode(result).unwrap();
/// assert_eq!(user.id, 3);
/// assert!(user.tags.is_none());
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDecoder;

impl ResultDecoder for JsonDecoder {
    fn decode<T: DeserializeOwned>(
        &self,
        result: OperationResult,
    ) -> Result<(T, ResponseMetadata)> {
        let (value, response) = match result {
            OperationResult::Json { value, response } => (value, response),
            OperationResult::Error { error, .. } => {
                return Err(Error::ServerError(Some(error.to_string())));
            }
            OperationResult::File { .. } => return Err(Error::ServerError(None)),
        };

        if value.is_null() {
            return Err(Error::ServerError(None));
        }
        recheck_status(response.status)?;

        let model = T::deserialize(value).map_err(|e| {
            tracing::debug!(url = %response.url, error = %e, "could not decode response");
            Error::ParseError(Some(e.to_string()))
        })?;
        Ok((model, response))
    }
}

impl JsonDecoder {
    /// Decode a bare JSON document, without response metadata
    pub fn decode_value<T: DeserializeOwned>(&self, value: Value) -> Result<T> {
        Ok(serde_json::from_value(value)?)
    }
}
