//! Shared base URL and default headers

use http::{HeaderMap, HeaderName, HeaderValue};

use crate::{Auth, Error, Result};

/// Base URL and default headers shared by a family of requests.
///
/// An empty base URL means every request path is itself an absolute URL.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    base_url: String,
    headers: HeaderMap,
}

impl Environment {
    /// Create an environment rooted at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Add a default header sent with every request
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidHeader(format!("{}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidHeader(format!("{}: {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Replace all default headers
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Send `Authorization` with every request
    pub fn auth(self, auth: Auth) -> Result<Self> {
        self.header("authorization", &auth.to_header_value())
    }

    /// The base URL, possibly empty
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Default headers
    pub fn default_headers(&self) -> &HeaderMap {
        &self.headers
    }
}
