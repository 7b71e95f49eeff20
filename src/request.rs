//! Request descriptors and their translation into wire requests

use http::{HeaderName, HeaderValue, header::CONTENT_TYPE};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

use crate::backend::types::{ProgressCallback, WireRequest};
use crate::{Auth, Body, Environment, Error, Result};

/// Parameters of a request; values may be nested
pub type Parameters = serde_json::Map<String, Value>;

/// HTTP methods a descriptor can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET method
    Get,
    /// POST method
    Post,
    /// PUT method
    Put,
    /// PATCH method
    Patch,
    /// DELETE method
    Delete,
}

impl Method {
    /// The method name as sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    fn carries_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => http::Method::GET,
            Method::Post => http::Method::POST,
            Method::Put => http::Method::PUT,
            Method::Patch => http::Method::PATCH,
            Method::Delete => http::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which transport operation a descriptor runs as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OperationKind {
    /// Fetch the body into memory and parse it as JSON
    #[default]
    Data,
    /// Stream the body into a file
    Download,
    /// Send a local file as the body and parse the reply as JSON
    Upload,
    /// Only the status code matters; the body is discarded
    ValidationOnly,
}

/// How parameters are encoded in a request body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BodyFormat {
    /// `application/json`
    #[default]
    Json,
    /// `application/x-www-form-urlencoded`; every value must be a string
    UrlEncoded,
}

/// Immutable description of one outbound HTTP call.
///
/// Built with [`RequestDescriptor::builder`]. Only the progress callback can
/// be changed once built.
///
/// ```
/// use courier::{Environment, Method, RequestDescriptor};
/// use serde_json::json;
///
/// let request = RequestDescriptor::builder("/users")
///     .method(Method::Get)
///     .parameter("id", json!("42"))
///     .build();
///
/// let wire = request.to_wire_request(&Environment::new("https://api.test")).unwrap();
/// assert_eq!(wire.url.as_str(), "https://api.test/users?id=42");
/// ```
#[derive(Clone)]
pub struct RequestDescriptor {
    path: String,
    method: Method,
    headers: Vec<(String, String)>,
    parameters: Option<Parameters>,
    kind: OperationKind,
    body_format: BodyFormat,
    upload_source: Option<PathBuf>,
    auth: Option<Auth>,
    progress: Option<ProgressCallback>,
}

impl RequestDescriptor {
    /// Start describing a request for `path`
    pub fn builder(path: impl Into<String>) -> RequestDescriptorBuilder {
        RequestDescriptorBuilder::new(path.into())
    }

    /// Path relative to the environment's base URL
    pub fn path(&self) -> &str {
        &self.path
    }

    /// HTTP method
    pub fn method(&self) -> Method {
        self.method
    }

    /// Operation kind
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Body format
    pub fn body_format(&self) -> BodyFormat {
        self.body_format
    }

    /// Parameters, if any
    pub fn parameters(&self) -> Option<&Parameters> {
        self.parameters.as_ref()
    }

    /// File sent by upload operations
    pub fn upload_source(&self) -> Option<&std::path::Path> {
        self.upload_source.as_deref()
    }

    /// Progress callback, if any
    pub fn progress(&self) -> Option<&ProgressCallback> {
        self.progress.as_ref()
    }

    /// Set the progress callback before dispatching
    pub fn set_progress<F>(&mut self, callback: F)
    where
        F: Fn(f32) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
    }

    /// Build the transport-level request against `environment`.
    ///
    /// Environment headers go first, descriptor headers override them, and
    /// the descriptor's `auth` overrides both.
    pub fn to_wire_request(&self, environment: &Environment) -> Result<WireRequest> {
        let mut url = self.resolve_url(environment.base_url())?;

        if self.method == Method::Get {
            if let Some(parameters) = self.parameters.as_ref().filter(|p| !p.is_empty()) {
                let mut pairs = url.query_pairs_mut();
                for (key, value) in parameters {
                    pairs.append_pair(key, &query_text(value));
                }
            }
        }

        let body = match &self.parameters {
            Some(parameters) if self.method.carries_body() => {
                if self.kind == OperationKind::Upload {
                    reject_upload_parameters(parameters)?;
                    None
                } else {
                    Some(encode_body(parameters, self.body_format)?)
                }
            }
            _ => None,
        };

        let mut headers = environment.default_headers().clone();
        for (name, value) in &self.headers {
            let (name, value) = parse_header(name, value)?;
            headers.insert(name, value);
        }
        if let Some(auth) = &self.auth {
            let (name, value) = parse_header("authorization", &auth.to_header_value())?;
            headers.insert(name, value);
        }
        if let Some(body) = &body {
            if !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(body.content_type()));
            }
        }

        Ok(WireRequest {
            method: self.method.into(),
            url,
            headers,
            body,
        })
    }

    fn resolve_url(&self, base_url: &str) -> Result<Url> {
        if base_url.is_empty() {
            return Url::parse(&self.path)
                .map_err(|e| Error::InvalidUrl(format!("{}: {}", self.path, e)));
        }

        let mut url =
            Url::parse(base_url).map_err(|e| Error::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if url.cannot_be_a_base() {
            return Err(Error::InvalidUrl(format!(
                "{} cannot be used as a base URL",
                base_url
            )));
        }

        let base_path = url.path().trim_end_matches('/').to_string();
        let path = if self.path.is_empty() || self.path.starts_with('/') {
            format!("{}{}", base_path, self.path)
        } else {
            format!("{}/{}", base_path, self.path)
        };
        url.set_path(&path);
        Ok(url)
    }
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("path", &self.path)
            .field("method", &self.method)
            .field("kind", &self.kind)
            .field("body_format", &self.body_format)
            .field("headers", &self.headers.len())
            .field("parameters", &self.parameters)
            .field("upload_source", &self.upload_source)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Builder for [`RequestDescriptor`]
pub struct RequestDescriptorBuilder {
    inner: RequestDescriptor,
}

impl RequestDescriptorBuilder {
    fn new(path: String) -> Self {
        Self {
            inner: RequestDescriptor {
                path,
                method: Method::Get,
                headers: Vec::new(),
                parameters: None,
                kind: OperationKind::Data,
                body_format: BodyFormat::Json,
                upload_source: None,
                auth: None,
                progress: None,
            },
        }
    }

    /// Set the HTTP method (default GET)
    pub fn method(mut self, method: Method) -> Self {
        self.inner.method = method;
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.headers.push((name.into(), value.into()));
        self
    }

    /// Replace all parameters
    pub fn parameters(mut self, parameters: Parameters) -> Self {
        self.inner.parameters = Some(parameters);
        self
    }

    /// Add one parameter
    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inner
            .parameters
            .get_or_insert_with(Parameters::new)
            .insert(key.into(), value.into());
        self
    }

    /// Set the operation kind (default [`OperationKind::Data`])
    pub fn kind(mut self, kind: OperationKind) -> Self {
        self.inner.kind = kind;
        self
    }

    /// Set the body format (default [`BodyFormat::Json`])
    pub fn body_format(mut self, format: BodyFormat) -> Self {
        self.inner.body_format = format;
        self
    }

    /// File streamed as the body of an upload
    pub fn upload_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.inner.upload_source = Some(path.into());
        self
    }

    /// Authenticate this request
    pub fn auth(mut self, auth: Auth) -> Self {
        self.inner.auth = Some(auth);
        self
    }

    /// Receive transfer progress as a fraction in `[0, 1]`
    pub fn progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(f32) + Send + Sync + 'static,
    {
        self.inner.progress = Some(Arc::new(callback));
        self
    }

    /// Finish the descriptor
    pub fn build(self) -> RequestDescriptor {
        self.inner
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| Error::InvalidHeader(format!("{}: {}", name, e)))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|e| Error::InvalidHeader(format!("{}: {}", name, e)))?;
    Ok((header_name, header_value))
}

/// Strings go in verbatim, everything else as its JSON text.
fn query_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The upload source is the whole body; parameters have nowhere to go.
fn reject_upload_parameters(parameters: &Parameters) -> Result<()> {
    match parameters.keys().next() {
        Some(key) => Err(Error::InvalidParameter {
            key: key.clone(),
            reason: "upload bodies are read from the source file".to_string(),
        }),
        None => Ok(()),
    }
}

fn encode_body(parameters: &Parameters, format: BodyFormat) -> Result<Body> {
    match format {
        BodyFormat::Json => Ok(Body::json(Value::Object(parameters.clone()))),
        BodyFormat::UrlEncoded => {
            let fields = parameters
                .iter()
                .map(|(key, value)| match value {
                    Value::String(s) => Ok((key.clone(), s.clone())),
                    other => Err(Error::InvalidParameter {
                        key: key.clone(),
                        reason: format!("url-encoded values must be strings, got {}", other),
                    }),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Body::form(fields))
        }
    }
}
