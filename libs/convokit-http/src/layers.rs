use std::task::{Context, Poll};

use http::{HeaderMap, HeaderName, HeaderValue, Request};
use tower::{Layer, Service};

use crate::error::HttpError;

/// Tower layer that fills in headers the caller did not set.
///
/// Used for `User-Agent` and `Accept`; an explicit header on the request
/// always wins.
#[derive(Clone, Debug, Default)]
pub struct DefaultHeadersLayer {
    headers: HeaderMap,
}

impl DefaultHeadersLayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a default header.
    ///
    /// # Errors
    /// Returns `HttpError::InvalidHeaderValue` if `value` is not a valid header value.
    pub fn with(mut self, name: HeaderName, value: &str) -> Result<Self, HttpError> {
        self.headers.insert(name, HeaderValue::from_str(value)?);
        Ok(self)
    }
}

impl<S> Layer<S> for DefaultHeadersLayer {
    type Service = DefaultHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DefaultHeadersService {
            inner,
            headers: self.headers.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DefaultHeadersService<S> {
    inner: S,
    headers: HeaderMap,
}

impl<S, B> Service<Request<B>> for DefaultHeadersService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        for (name, value) in &self.headers {
            if !req.headers().contains_key(name) {
                req.headers_mut().insert(name.clone(), value.clone());
            }
        }
        self.inner.call(req)
    }
}
