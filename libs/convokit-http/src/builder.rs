use std::time::Duration;

use bytes::Bytes;
use http::Response;
use http::header::{ACCEPT, USER_AGENT};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tower::buffer::Buffer;
use tower::timeout::TimeoutLayer;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::decompression::DecompressionLayer;

use crate::client::{BufferedService, HttpClient, ServiceFuture};
use crate::config::{HttpClientConfig, TlsRootConfig, TransportSecurity};
use crate::error::HttpError;
use crate::layers::DefaultHeadersLayer;
use crate::response::ResponseBody;
use crate::tls;

/// Builder for [`HttpClient`].
#[derive(Debug, Default)]
pub struct HttpClientBuilder {
    config: HttpClientConfig,
}

impl HttpClientBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: HttpClientConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.config.max_body_size = bytes;
        self
    }

    #[must_use]
    pub fn tls_roots(mut self, roots: TlsRootConfig) -> Self {
        self.config.tls_roots = roots;
        self
    }

    /// Accept `http://` URLs. Meant for mock servers only.
    #[must_use]
    pub fn allow_insecure_http(mut self) -> Self {
        self.config.transport = TransportSecurity::AllowInsecureHttp;
        self
    }

    #[must_use]
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    /// Assemble the stack: `Buffer -> Timeout -> DefaultHeaders -> Decompression -> hyper`.
    ///
    /// Must be called inside a Tokio runtime (the buffer spawns its worker).
    ///
    /// # Errors
    /// [`HttpError::Tls`] if the root store cannot be built,
    /// [`HttpError::InvalidHeaderValue`] for an unusable user agent.
    pub fn build(self) -> Result<HttpClient, HttpError> {
        let HttpClientConfig {
            request_timeout,
            max_body_size,
            user_agent,
            transport,
            tls_roots,
            buffer_capacity,
            pool_idle_timeout,
            pool_max_idle_per_host,
        } = self.config;

        if transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!("plain HTTP allowed; use only against local mock servers");
        }

        let connector = tls::https_connector(tls_roots, transport)?;
        let mut pool = Client::builder(TokioExecutor::new());
        // pool_idle_timeout has no effect without a timer
        pool.pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(pool_max_idle_per_host);
        if let Some(idle) = pool_idle_timeout {
            pool.pool_idle_timeout(idle);
        }
        let hyper_client = pool.build::<_, Full<Bytes>>(connector);

        let defaults = DefaultHeadersLayer::new()
            .with(USER_AGENT, &user_agent)?
            .with(ACCEPT, "application/json")?;

        let service = ServiceBuilder::new()
            .layer(TimeoutLayer::new(request_timeout))
            .layer(defaults)
            .layer(DecompressionLayer::new())
            .service(hyper_client)
            .map_response(box_body)
            .map_err(move |e: tower::BoxError| classify_error(e, request_timeout))
            .map_future(|fut| -> ServiceFuture { Box::pin(fut) });

        let service: BufferedService = Buffer::new(service, buffer_capacity.max(1));

        Ok(HttpClient {
            service,
            max_body_size,
            transport_security: transport,
        })
    }
}

fn classify_error(err: tower::BoxError, timeout: Duration) -> HttpError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return HttpError::Timeout(timeout);
    }
    match err.downcast::<HttpError>() {
        Ok(inner) => *inner,
        Err(other) => HttpError::Transport(other),
    }
}

fn box_body<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    response.map(|body| body.map_err(Into::into).boxed())
}
