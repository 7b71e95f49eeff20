//! Authorization header support

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;

/// Credentials attached to an [`crate::Environment`] or a single
/// [`crate::RequestDescriptor`].
///
/// Each variant renders the value of an `Authorization` header.
///
/// ```
/// use courier::Auth;
///
/// assert_eq!(Auth::basic("user", "pass").to_header_value(), "Basic dXNlcjpwYXNz");
/// assert_eq!(Auth::bearer("token123").to_header_value(), "Bearer token123");
/// assert_eq!(Auth::custom("ApiKey", "secret").to_header_value(), "ApiKey secret");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    /// `Authorization: Basic <base64(username:password)>`
    Basic {
        /// Username
        username: String,
        /// Password
        password: String,
    },
    /// `Authorization: Bearer <token>`
    Bearer {
        /// Bearer token
        token: String,
    },
    /// `Authorization: <scheme> <credentials>`
    Custom {
        /// Authentication scheme (e.g., "ApiKey", "Digest")
        scheme: String,
        /// Credentials for the scheme
        credentials: String,
    },
}

impl Auth {
    /// Create HTTP Basic authentication
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Create Bearer token authentication
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// Create authentication with a custom scheme
    pub fn custom(scheme: impl Into<String>, credentials: impl Into<String>) -> Self {
        Self::Custom {
            scheme: scheme.into(),
            credentials: credentials.into(),
        }
    }

    /// Render the `Authorization` header value
    pub fn to_header_value(&self) -> String {
        match self {
            Auth::Basic { username, password } => {
                let encoded = STANDARD.encode(format!("{}:{}", username, password));
                format!("Basic {}", encoded)
            }
            Auth::Bearer { token } => format!("Bearer {}", token),
            Auth::Custom {
                scheme,
                credentials,
            } => format!("{} {}", scheme, credentials),
        }
    }
}

// Never print secrets.
impl fmt::Display for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Basic { username, .. } => {
                write!(f, "Basic authentication for user: {}", username)
            }
            Auth::Bearer { .. } => write!(f, "Bearer token authentication"),
            Auth::Custom { scheme, .. } => write!(f, "Custom {} authentication", scheme),
        }
    }
}
