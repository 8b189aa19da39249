//! Translation of failed-call bodies into uniform error messages

use http::StatusCode;
use serde_json::Value;

use crate::problem::VendorProblem;

/// Vendor name used in translated messages unless configured otherwise.
pub const DEFAULT_VENDOR_NAME: &str = "Vonage";

/// Body of a failed response, already parsed by content type.
#[derive(Debug, Clone, Copy)]
pub enum ErrorBody<'a> {
    Json(&'a Value),
    Text(&'a str),
    Bytes(&'a [u8]),
    Empty,
}

/// Outcome of translating a failed response.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedError {
    pub message: String,
    /// Decoded vendor envelope when the body carried one.
    pub problem: Option<VendorProblem>,
}

/// Maps failed-call bodies to messages.
///
/// A vendor envelope becomes `"<Vendor> Error: <title> | <code> | <detail>"`;
/// anything else is reported verbatim.
#[derive(Debug, Clone)]
pub struct ErrorTranslator {
    vendor_name: String,
}

impl Default for ErrorTranslator {
    fn default() -> Self {
        Self::new(DEFAULT_VENDOR_NAME)
    }
}

impl ErrorTranslator {
    #[must_use]
    pub fn new(vendor_name: impl Into<String>) -> Self {
        Self {
            vendor_name: vendor_name.into(),
        }
    }

    #[must_use]
    pub fn vendor_name(&self) -> &str {
        &self.vendor_name
    }

    #[must_use]
    pub fn translate(&self, status: StatusCode, body: ErrorBody<'_>) -> TranslatedError {
        match body {
            ErrorBody::Json(value) => match VendorProblem::from_value(value) {
                Some(problem) => TranslatedError {
                    message: self.envelope_message(&problem),
                    problem: Some(problem),
                },
                None => verbatim(match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                }),
            },
            ErrorBody::Text(text) if !text.is_empty() => verbatim(text.to_owned()),
            ErrorBody::Bytes(bytes) if !bytes.is_empty() => {
                verbatim(String::from_utf8_lossy(bytes).into_owned())
            }
            ErrorBody::Text(_) | ErrorBody::Bytes(_) | ErrorBody::Empty => {
                verbatim(format!("HTTP {status}"))
            }
        }
    }

    fn envelope_message(&self, problem: &VendorProblem) -> String {
        let title = problem.title.as_deref().unwrap_or("unknown");
        let code = problem
            .code
            .as_ref()
            .map_or_else(|| "unknown".to_owned(), ToString::to_string);
        format!(
            "{} Error: {title} | {code} | {}",
            self.vendor_name, problem.detail
        )
    }
}

fn verbatim(message: String) -> TranslatedError {
    TranslatedError {
        message,
        problem: None,
    }
}
