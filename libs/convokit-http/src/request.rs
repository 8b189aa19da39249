use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderName, HeaderValue, Method, Request};
use http_body_util::Full;
use serde::Serialize;
use tower::{Service, ServiceExt};

use crate::client::{BufferedService, map_buffer_error};
use crate::config::TransportSecurity;
use crate::error::HttpError;
use crate::response::HttpResponse;

/// One pending request. Errors from the builder methods that cannot fail
/// eagerly are deferred to [`send`](Self::send).
#[must_use = "a request does nothing until `send` is awaited"]
pub struct RequestBuilder {
    service: BufferedService,
    method: Method,
    url: String,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Option<Bytes>,
    max_body_size: usize,
    transport_security: TransportSecurity,
    deferred: Option<HttpError>,
}

impl RequestBuilder {
    pub(crate) fn new(
        service: BufferedService,
        method: Method,
        url: String,
        max_body_size: usize,
        transport_security: TransportSecurity,
    ) -> Self {
        Self {
            service,
            method,
            url,
            headers: Vec::new(),
            body: None,
            max_body_size,
            transport_security,
            deferred: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.deferred.is_some() {
            return self;
        }
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(n), Ok(v)) => self.headers.push((n, v)),
            (Err(e), _) => self.deferred = Some(e.into()),
            (_, Err(e)) => self.deferred = Some(e.into()),
        }
        self
    }

    /// `Authorization: Bearer <token>`, marked sensitive so it stays out of
    /// debug output.
    pub fn bearer_auth(mut self, token: &str) -> Self {
        match HeaderValue::try_from(format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                self.headers.push((AUTHORIZATION, value));
            }
            Err(e) => self.deferred = Some(e.into()),
        }
        self
    }

    /// Serialize `body` as the JSON request body.
    ///
    /// # Errors
    /// [`HttpError::Json`] when `body` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, HttpError> {
        self.body = Some(Bytes::from(serde_json::to_vec(body)?));
        if !self.headers.iter().any(|(n, _)| n == CONTENT_TYPE) {
            self.headers
                .push((CONTENT_TYPE, HeaderValue::from_static("application/json")));
        }
        Ok(self)
    }

    fn checked_uri(&self) -> Result<http::Uri, HttpError> {
        let uri: http::Uri = self
            .url
            .parse()
            .map_err(|e: http::uri::InvalidUri| HttpError::InvalidUri {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;
        if uri.authority().is_none() {
            return Err(HttpError::InvalidUri {
                url: self.url.clone(),
                reason: "missing host".to_owned(),
            });
        }
        match (uri.scheme_str(), self.transport_security) {
            (Some("https"), _) | (Some("http"), TransportSecurity::AllowInsecureHttp) => Ok(uri),
            (Some("http"), TransportSecurity::TlsOnly) => Err(HttpError::InvalidScheme {
                scheme: "http".to_owned(),
                reason: "HTTPS required".to_owned(),
            }),
            (Some(other), _) => Err(HttpError::InvalidScheme {
                scheme: other.to_owned(),
                reason: "only http and https are supported".to_owned(),
            }),
            (None, _) => Err(HttpError::InvalidUri {
                url: self.url.clone(),
                reason: "missing scheme".to_owned(),
            }),
        }
    }

    /// Send the request and wait for the response head.
    ///
    /// # Errors
    /// Invalid URL or headers, transport and TLS failures, timeouts. HTTP
    /// error statuses are returned as `Ok`.
    pub async fn send(mut self) -> Result<HttpResponse, HttpError> {
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }
        let uri = self.checked_uri()?;

        let mut builder = Request::builder().method(self.method).uri(uri);
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        let request = builder.body(Full::new(self.body.unwrap_or_default()))?;

        let service = self.service.ready().await.map_err(map_buffer_error)?;
        let inner = service.call(request).await.map_err(map_buffer_error)?;

        Ok(HttpResponse {
            inner,
            max_body_size: self.max_body_size,
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use crate::{HttpClient, HttpClientBuilder, HttpError};

    fn tls_only() -> HttpClient {
        HttpClientBuilder::new().build().unwrap()
    }

    #[tokio::test]
    async fn plain_http_rejected_by_default() {
        let err = tls_only().get("http://example.com/").send().await.unwrap_err();
        assert!(matches!(err, HttpError::InvalidScheme { ref scheme, .. } if scheme == "http"));
    }

    #[tokio::test]
    async fn relative_urls_are_rejected() {
        let err = tls_only().get("/v0.3/users").send().await.unwrap_err();
        assert!(matches!(err, HttpError::InvalidUri { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn unsupported_scheme() {
        let err = tls_only().get("ftp://example.com/file").send().await.unwrap_err();
        assert!(matches!(err, HttpError::InvalidScheme { ref scheme, .. } if scheme == "ftp"));
    }

    #[tokio::test]
    async fn invalid_header_is_deferred_to_send() {
        let err = tls_only()
            .get("https://example.com/")
            .header("x-bad", "line\nbreak")
            .send()
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::InvalidHeaderValue(_)));
    }
}
