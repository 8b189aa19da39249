//! Vendor error envelope (an RFC 9457 flavoured problem document)

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Content type the vendor uses for error documents.
pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

/// Machine-readable error code. The API emits strings such as
/// `conversation:error:not-found`, some legacy endpoints emit bare numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProblemCode {
    Text(String),
    Number(i64),
}

impl fmt::Display for ProblemCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Error document returned by the remote API for a failed call.
///
/// Only `detail` is mandatory for a body to be recognized as a vendor envelope;
/// everything else is optional because the API is not consistent about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct VendorProblem {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ProblemCode>,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    /// Per-parameter complaints some endpoints attach to 400 responses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalid_parameters: Vec<Value>,
}

impl VendorProblem {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            type_url: None,
            title: None,
            code: None,
            detail: detail.into(),
            instance: None,
            invalid_parameters: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(ProblemCode::Text(code.into()));
        self
    }

    pub fn with_type(mut self, type_url: impl Into<String>) -> Self {
        self.type_url = Some(type_url.into());
        self
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Decode a JSON body as a vendor envelope.
    ///
    /// Returns `None` unless the body is an object carrying a string `detail`.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        if !object.get("detail").is_some_and(Value::is_string) {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }
}
