use bytes::Bytes;
use http::{HeaderMap, Response, StatusCode};
use http_body_util::BodyExt;
use http_body_util::combinators::BoxBody;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::HttpError;

/// Type-erased (and already decompressed) response body.
pub type ResponseBody = BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// Response body parsed according to its `Content-Type`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    /// `application/json` and any `+json` type.
    Json(Value),
    /// `text/*`.
    Text(String),
    /// Everything else.
    Binary(Bytes),
    /// Zero-length body, whatever the declared type.
    Empty,
}

impl ResponsePayload {
    /// Parse `body` according to `content_type`.
    ///
    /// # Errors
    /// [`HttpError::Json`] when a JSON-typed body is not valid JSON.
    pub fn from_body(content_type: Option<&str>, body: Bytes) -> Result<Self, HttpError> {
        if body.is_empty() {
            return Ok(Self::Empty);
        }
        let payload = match content_type.map(classify) {
            Some(Class::Json) => Self::Json(serde_json::from_slice(&body)?),
            Some(Class::Text) => Self::Text(String::from_utf8_lossy(&body).into_owned()),
            Some(Class::Other) | None => Self::Binary(body),
        };
        Ok(payload)
    }

    /// JSON view: text becomes a JSON string, binary a lossy UTF-8 string,
    /// and an empty body `null`.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Json(v) => v,
            Self::Text(s) => Value::String(s),
            Self::Binary(b) => Value::String(String::from_utf8_lossy(&b).into_owned()),
            Self::Empty => Value::Null,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

enum Class {
    Json,
    Text,
    Other,
}

fn classify(content_type: &str) -> Class {
    match content_type.parse::<mime::Mime>() {
        Ok(m) if m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON) => Class::Json,
        Ok(m) if m.type_() == mime::TEXT => Class::Text,
        Ok(_) => Class::Other,
        // Unparseable header: fall back to a substring sniff.
        Err(_) if content_type.contains("json") => Class::Json,
        Err(_) if content_type.contains("text") => Class::Text,
        Err(_) => Class::Other,
    }
}

/// HTTP response with a size-limited body reader.
pub struct HttpResponse {
    pub(crate) inner: Response<ResponseBody>,
    pub(crate) max_body_size: usize,
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.inner.status())
            .field("headers", self.inner.headers())
            .field("max_body_size", &self.max_body_size)
            .finish_non_exhaustive()
    }
}

impl HttpResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.inner
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Read the whole body.
    ///
    /// # Errors
    /// [`HttpError::BodyTooLarge`] past the configured limit,
    /// [`HttpError::Transport`] when the stream breaks.
    pub async fn bytes(self) -> Result<Bytes, HttpError> {
        read_limited(self.inner.into_body(), self.max_body_size).await
    }

    /// Read the body as UTF-8 text (lossy).
    ///
    /// # Errors
    /// Same as [`bytes`](Self::bytes).
    pub async fn text(self) -> Result<String, HttpError> {
        let body = self.bytes().await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Read and decode a JSON body, ignoring the declared content type.
    ///
    /// # Errors
    /// Same as [`bytes`](Self::bytes), plus [`HttpError::Json`].
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, HttpError> {
        let body = self.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Read the body and parse it according to `Content-Type`.
    ///
    /// # Errors
    /// Same as [`bytes`](Self::bytes), plus [`HttpError::Json`] for malformed
    /// JSON-typed bodies.
    pub async fn payload(self) -> Result<ResponsePayload, HttpError> {
        let content_type = self.content_type().map(ToOwned::to_owned);
        let body = self.bytes().await?;
        ResponsePayload::from_body(content_type.as_deref(), body)
    }
}

async fn read_limited(body: ResponseBody, limit: usize) -> Result<Bytes, HttpError> {
    let mut body = std::pin::pin!(body);
    let mut collected = Vec::new();
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(HttpError::Transport)?;
        if let Some(chunk) = frame.data_ref() {
            let total = collected.len() + chunk.len();
            if total > limit {
                return Err(HttpError::BodyTooLarge { limit, actual: total });
            }
            collected.extend_from_slice(chunk);
        }
    }
    Ok(Bytes::from(collected))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http_body_util::Full;
    use serde_json::json;

    fn response(content_type: Option<&str>, body: &'static [u8], limit: usize) -> HttpResponse {
        let mut builder = Response::builder().status(200);
        if let Some(ct) = content_type {
            builder = builder.header(http::header::CONTENT_TYPE, ct);
        }
        let body: ResponseBody = Full::new(Bytes::from_static(body))
            .map_err(|never| match never {})
            .boxed();
        HttpResponse {
            inner: builder.body(body).unwrap(),
            max_body_size: limit,
        }
    }

    #[tokio::test]
    async fn json_content_types() {
        for ct in [
            "application/json",
            "application/json; charset=utf-8",
            "application/problem+json",
        ] {
            let payload = response(Some(ct), br#"{"a":1}"#, 1024).payload().await.unwrap();
            assert_eq!(payload, ResponsePayload::Json(json!({"a": 1})), "content type {ct}");
        }
    }

    #[tokio::test]
    async fn text_and_binary() {
        let payload = response(Some("text/plain"), b"hello", 1024).payload().await.unwrap();
        assert_eq!(payload, ResponsePayload::Text("hello".to_owned()));

        let payload = response(Some("application/octet-stream"), b"\x00\x01", 1024)
            .payload()
            .await
            .unwrap();
        assert_eq!(payload, ResponsePayload::Binary(Bytes::from_static(b"\x00\x01")));

        let payload = response(None, b"raw", 1024).payload().await.unwrap();
        assert_eq!(payload, ResponsePayload::Binary(Bytes::from_static(b"raw")));
    }

    #[tokio::test]
    async fn empty_body_is_empty_even_for_json() {
        let payload = response(Some("application/json"), b"", 1024).payload().await.unwrap();
        assert!(payload.is_empty());
        assert_eq!(payload.into_value(), Value::Null);
    }

    #[tokio::test]
    async fn malformed_json_is_an_error() {
        let err = response(Some("application/json"), b"{nope", 1024)
            .payload()
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::Json(_)));
    }

    #[tokio::test]
    async fn body_limit_is_enforced() {
        let err = response(Some("text/plain"), b"0123456789", 4).bytes().await.unwrap_err();
        assert!(matches!(err, HttpError::BodyTooLarge { limit: 4, .. }));
    }

    #[test]
    fn unparseable_content_type_is_sniffed() {
        let payload =
            ResponsePayload::from_body(Some("json??"), Bytes::from_static(b"[1]")).unwrap();
        assert_eq!(payload, ResponsePayload::Json(json!([1])));
    }
}
