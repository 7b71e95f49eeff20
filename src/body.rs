//! Encoded request bodies

use bytes::Bytes;
use std::borrow::Cow;

/// Body of a [`crate::WireRequest`], already encoded from the descriptor's
/// parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Form-encoded data
    Form {
        /// Form fields
        fields: Vec<(Cow<'static, str>, Cow<'static, str>)>,
    },

    /// JSON data
    Json {
        /// JSON value
        value: serde_json::Value,
    },
}

impl Body {
    /// Create a form body
    pub fn form(fields: Vec<(impl Into<Cow<'static, str>>, impl Into<Cow<'static, str>>)>) -> Self {
        Self::Form {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Create a JSON body
    pub fn json(value: serde_json::Value) -> Self {
        Self::Json { value }
    }

    /// Content type sent with this body
    pub fn content_type(&self) -> &'static str {
        match self {
            Body::Form { .. } => "application/x-www-form-urlencoded",
            Body::Json { .. } => "application/json",
        }
    }

    /// Serialize to the bytes that go on the wire
    pub fn to_bytes(&self) -> crate::Result<Bytes> {
        match self {
            Body::Form { fields } => Ok(Bytes::from(encode_form_fields(fields))),
            Body::Json { value } => Ok(Bytes::from(serde_json::to_vec(value)?)),
        }
    }
}

fn encode_form_fields(fields: &[(Cow<'static, str>, Cow<'static, str>)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Self::Json { value }
    }
}
