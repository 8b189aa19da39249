//! The innermost reusable unit: one validated, authenticated call.

use std::sync::Arc;

use convokit_errors::ErrorTranslator;
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::auth::{BearerToken, TokenProvider};
use crate::error::{ClientError, ValidationStage};
use crate::operation::Operation;
use crate::pagination::PaginationLimits;
use crate::sink::{LogLevel, LogSink, TracingSink};
use crate::transport::{Transport, TransportRequest, method_carries_body};

const SUCCESS: [StatusCode; 3] = [StatusCode::OK, StatusCode::CREATED, StatusCode::NO_CONTENT];

/// Runs [`Operation`]s: validate input, resolve URL and token, call the
/// transport, classify the status, translate failures, validate output.
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct Executor {
    base_url: Arc<str>,
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenProvider>,
    sink: Arc<dyn LogSink>,
    translator: ErrorTranslator,
    limits: PaginationLimits,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("base_url", &self.base_url)
            .field("vendor", &self.translator.vendor_name())
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl Executor {
    /// Executor logging through [`TracingSink`] with default limits.
    pub fn new(
        base_url: impl Into<String>,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            base_url: Arc::from(base_url.into()),
            transport,
            tokens,
            sink: Arc::new(TracingSink),
            translator: ErrorTranslator::default(),
            limits: PaginationLimits::default(),
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn with_translator(mut self, translator: ErrorTranslator) -> Self {
        self.translator = translator;
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: PaginationLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn limits(&self) -> &PaginationLimits {
        &self.limits
    }

    pub(crate) fn sink(&self) -> &dyn LogSink {
        &*self.sink
    }

    /// Absolute URLs pass through; anything else is appended to the base URL.
    #[must_use]
    pub fn resolve_url(&self, url: &str) -> String {
        if is_absolute(url) {
            url.to_owned()
        } else {
            format!("{}{url}", self.base_url)
        }
    }

    /// Ask the provider for a token, attributing failures to `operation`.
    ///
    /// # Errors
    /// [`ClientError::Token`].
    pub async fn token(&self, operation: &str) -> Result<BearerToken, ClientError> {
        self.tokens.token().await.map_err(|source| ClientError::Token {
            operation: operation.to_owned(),
            source,
        })
    }

    /// The operation's own token, else a fresh one from the provider.
    pub(crate) async fn token_for(
        &self,
        operation: &Operation,
    ) -> Result<BearerToken, ClientError> {
        match operation.token() {
            Some(token) => Ok(token.clone()),
            None => self.token(operation.name()).await,
        }
    }

    /// Execute one call and return the validated output.
    ///
    /// `Value::Null` input is treated as an empty object. Without an explicit
    /// method the call is a POST.
    ///
    /// # Errors
    /// - [`ClientError::Validation`] for bad input (nothing is sent) or bad output
    /// - [`ClientError::Precondition`] when the operation has no URL
    /// - [`ClientError::Token`], [`ClientError::Transport`]
    /// - [`ClientError::Remote`] for statuses other than 200, 201 and 204
    pub async fn execute(&self, operation: &Operation, input: Value) -> Result<Value, ClientError> {
        let diag = Diagnostics::new(&*self.sink, operation);
        match self.run(operation, input, &diag).await {
            Ok(output) => Ok(output),
            Err(err) => {
                diag.failed(&err);
                Err(err)
            }
        }
    }

    /// [`execute`](Self::execute) and decode into `T`.
    ///
    /// # Errors
    /// As `execute`, plus an output [`ClientError::Validation`] when the
    /// validated value does not decode into `T`.
    pub async fn execute_as<T: DeserializeOwned>(
        &self,
        operation: &Operation,
        input: Value,
    ) -> Result<T, ClientError> {
        let output = self.execute(operation, input).await?;
        decode(operation.name(), output)
    }

    async fn run(
        &self,
        operation: &Operation,
        input: Value,
        diag: &Diagnostics<'_>,
    ) -> Result<Value, ClientError> {
        let name = operation.name();

        diag.info("validating input", None);
        let input = if input.is_null() {
            Value::Object(Map::new())
        } else {
            input
        };
        let input = operation
            .input()
            .validate(&input)
            .map_err(|v| ClientError::validation(name, ValidationStage::Input, v))?;
        diag.info("[ok] input validated", None);

        let url = operation
            .url()
            .map(|url| self.resolve_url(url))
            .ok_or_else(|| ClientError::precondition(name, "url is required"))?;
        let token = self.token_for(operation).await?;
        let method = operation.method().cloned().unwrap_or(Method::POST);

        diag.info("invoking", Some(&json!({ "method": method.as_str(), "url": url })));
        let body = method_carries_body(&method).then_some(input);
        let response = self
            .transport
            .call(TransportRequest {
                method,
                url,
                token,
                body,
            })
            .await
            .map_err(|source| ClientError::Transport {
                operation: name.to_owned(),
                source,
            })?;

        if !SUCCESS.contains(&response.status) {
            let translated = self.translator.translate(response.status, response.error_body());
            return Err(ClientError::Remote {
                operation: name.to_owned(),
                status: response.status,
                message: translated.message,
                problem: translated.problem,
            });
        }
        diag.info("[ok] invoked", Some(&json!({ "status": response.status.as_u16() })));

        diag.info("validating output", None);
        let output = operation
            .output()
            .validate(&response.payload.into_value())
            .map_err(|v| ClientError::validation(name, ValidationStage::Output, v))?;
        diag.info("[ok] output validated", None);
        Ok(output)
    }
}

pub(crate) fn decode<T: DeserializeOwned>(operation: &str, value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value).map_err(|e| {
        ClientError::validation(
            operation,
            ValidationStage::Output,
            convokit_schema::Violations::from_deserialize(&e),
        )
    })
}

fn is_absolute(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

/// Per-call diagnostics, prefixed with the operation name. Silent when the
/// operation is quiet.
struct Diagnostics<'a> {
    sink: &'a dyn LogSink,
    name: &'a str,
    quiet: bool,
}

impl<'a> Diagnostics<'a> {
    fn new(sink: &'a dyn LogSink, operation: &'a Operation) -> Self {
        Self {
            sink,
            name: operation.name(),
            quiet: operation.is_quiet(),
        }
    }

    fn info(&self, stage: &str, details: Option<&Value>) {
        if !self.quiet {
            self.sink.log(LogLevel::Info, &format!("{}: {stage}", self.name), details);
        }
    }

    fn failed(&self, err: &ClientError) {
        if !self.quiet {
            self.sink.log(
                LogLevel::Error,
                &format!("{}: [x] error", self.name),
                Some(&json!({ "error": err.to_string() })),
            );
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use crate::transport::TransportResponse;
    use async_trait::async_trait;
    use convokit_http::HttpError;

    struct Unreachable;

    #[async_trait]
    impl Transport for Unreachable {
        async fn call(&self, _request: TransportRequest) -> Result<TransportResponse, HttpError> {
            Err(HttpError::ServiceClosed)
        }
    }

    fn executor() -> Executor {
        Executor::new(
            "https://api.nexmo.com",
            Arc::new(Unreachable),
            Arc::new(StaticToken::new("t")),
        )
    }

    #[test]
    fn url_resolution() {
        let ex = executor();
        assert_eq!(ex.resolve_url("/v0.3/users"), "https://api.nexmo.com/v0.3/users");
        assert_eq!(
            ex.resolve_url("https://api-eu.nexmo.com/v0.3/users?cursor=abc"),
            "https://api-eu.nexmo.com/v0.3/users?cursor=abc"
        );
        assert_eq!(ex.resolve_url("http://127.0.0.1:8080/x"), "http://127.0.0.1:8080/x");
    }

    #[tokio::test]
    async fn transport_failures_carry_the_operation_name() {
        let op = Operation::new("/v0.3/users").with_name("users.find").with_method(Method::GET);
        let err = executor().execute(&op, Value::Null).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Transport { ref operation, .. } if operation == "users.find"
        ));
    }

    #[tokio::test]
    async fn missing_url_is_a_precondition() {
        let op = Operation::default().with_name("users.find");
        let err = executor().execute(&op, Value::Null).await.unwrap_err();
        assert!(matches!(err, ClientError::Precondition { .. }));
        assert_eq!(err.to_string(), "users.find: url is required");
    }

    #[test]
    fn decode_failure_is_output_validation() {
        let err = decode::<u32>("users.find", json!("nope")).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation {
                stage: ValidationStage::Output,
                ..
            }
        ));
    }
}
