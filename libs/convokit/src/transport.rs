//! The seam between the pipeline and the network.

use async_trait::async_trait;
use convokit_errors::ErrorBody;
use convokit_http::{HttpClient, HttpError, ResponsePayload};
use http::{Method, StatusCode};
use serde_json::Value;

use crate::auth::BearerToken;

#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    pub token: BearerToken,
    /// JSON body; only sent for POST, PUT and PATCH.
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub payload: ResponsePayload,
}

impl TransportResponse {
    #[must_use]
    pub fn new(status: StatusCode, payload: ResponsePayload) -> Self {
        Self { status, payload }
    }

    /// Shorthand for a JSON response.
    #[must_use]
    pub fn json(status: StatusCode, body: Value) -> Self {
        Self::new(status, ResponsePayload::Json(body))
    }

    pub(crate) fn error_body(&self) -> ErrorBody<'_> {
        match &self.payload {
            ResponsePayload::Json(v) => ErrorBody::Json(v),
            ResponsePayload::Text(s) => ErrorBody::Text(s),
            ResponsePayload::Binary(b) => ErrorBody::Bytes(b),
            ResponsePayload::Empty => ErrorBody::Empty,
        }
    }
}

/// One authenticated HTTP exchange. Implemented for [`HttpClient`]; tests
/// substitute scripted transports.
#[async_trait]
pub trait Transport: Send + Sync {
    /// # Errors
    /// Only for failed exchanges; every HTTP status is a successful exchange.
    async fn call(&self, request: TransportRequest) -> Result<TransportResponse, HttpError>;
}

pub(crate) fn method_carries_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

#[async_trait]
impl Transport for HttpClient {
    async fn call(&self, request: TransportRequest) -> Result<TransportResponse, HttpError> {
        let TransportRequest {
            method,
            url,
            token,
            body,
        } = request;
        let with_body = method_carries_body(&method);
        let mut builder = self.request(method, &url).bearer_auth(token.expose());
        if with_body && let Some(body) = &body {
            builder = builder.json(body)?;
        }
        let response = builder.send().await?;
        let status = response.status();
        let payload = response.payload().await?;
        Ok(TransportResponse { status, payload })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use convokit_http::{HttpClientBuilder, HttpClientConfig};
    use httpmock::prelude::*;
    use serde_json::json;

    fn client() -> HttpClient {
        HttpClientBuilder::with_config(HttpClientConfig::for_testing()).build().unwrap()
    }

    #[tokio::test]
    async fn get_never_sends_a_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::GET)
                .path("/v0.3/users/USR-1")
                .header("authorization", "Bearer tkn")
                .body("");
            then.status(200).json_body(json!({"id": "USR-1"}));
        });

        let response = client()
            .call(TransportRequest {
                method: Method::GET,
                url: server.url("/v0.3/users/USR-1"),
                token: BearerToken::new("tkn"),
                body: Some(json!({"ignored": true})),
            })
            .await
            .unwrap();

        assert_eq!(response, TransportResponse::json(StatusCode::OK, json!({"id": "USR-1"})));
        mock.assert();
    }

    #[tokio::test]
    async fn put_sends_json_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::PUT)
                .path("/v0.3/users/USR-1")
                .json_body(json!({"display_name": "Al"}));
            then.status(200)
                .header("content-type", "text/plain")
                .body("ok");
        });

        let response = client()
            .call(TransportRequest {
                method: Method::PUT,
                url: server.url("/v0.3/users/USR-1"),
                token: BearerToken::new("tkn"),
                body: Some(json!({"display_name": "Al"})),
            })
            .await
            .unwrap();

        assert_eq!(response.payload, ResponsePayload::Text("ok".to_owned()));
        mock.assert();
    }

    #[test]
    fn body_methods() {
        assert!(method_carries_body(&Method::POST));
        assert!(method_carries_body(&Method::PATCH));
        assert!(!method_carries_body(&Method::GET));
        assert!(!method_carries_body(&Method::DELETE));
    }
}
