use std::sync::Arc;

use convokit_errors::ErrorTranslator;
use convokit_http::HttpClientBuilder;

use crate::auth::TokenProvider;
use crate::config::{ClientConfig, ConfigError};
use crate::error::ClientError;
use crate::executor::Executor;
use crate::pagination::PaginationLimits;
use crate::pipeline::Model;
use crate::resources::{DELETE_ALL_CONFIRMATION, ResourceSpec};
use crate::sink::{LogSink, TracingSink};
use crate::transport::Transport;

/// Confirmation required by [`Client::delete_all_resources`].
pub const WIPE_CONFIRMATION: &str = "sure-i-mean-it";

/// Entry point: an executor plus per-resource models.
///
/// ```no_run
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// use convokit::{Client, ClientConfig, ListOptions, ResourceSpec};
///
/// let client = Client::from_config(&ClientConfig::load(Some("convokit.yaml".as_ref()))?)?;
/// let users = client.model(ResourceSpec::users());
/// let _everyone = users.list(ListOptions::new().limitless()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    executor: Executor,
}

impl Client {
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Build an HTTPS client from `config`. Requires an `auth` section.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    /// Invalid configuration, unusable credentials, or HTTP client setup failures.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let auth = config.auth.as_ref().ok_or_else(|| ConfigError::Invalid {
            field: "auth",
            reason: "an auth section is required".to_owned(),
        })?;
        Self::builder()
            .config(config)
            .token_provider(Arc::new(auth.token_provider()?))
            .build()
    }

    #[must_use]
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Pipeline bound to `resource`.
    #[must_use]
    pub fn model(&self, resource: ResourceSpec) -> Model {
        Model::new(self.executor.clone(), resource)
    }

    /// Delete every user, conversation and leg, in that order.
    ///
    /// # Errors
    /// [`ClientError::Precondition`] unless `confirmation` equals
    /// [`WIPE_CONFIRMATION`]; otherwise the first failing guarded delete,
    /// which stops the wipe.
    pub async fn delete_all_resources(&self, confirmation: &str) -> Result<(), ClientError> {
        if confirmation != WIPE_CONFIRMATION {
            return Err(ClientError::precondition(
                "client.deleteAll",
                format!(
                    "refusing to wipe all resources without the confirmation {WIPE_CONFIRMATION:?}"
                ),
            ));
        }
        for resource in [
            ResourceSpec::users(),
            ResourceSpec::conversations(),
            ResourceSpec::legs(),
        ] {
            self.model(resource)
                .delete_many_guarded(&[], DELETE_ALL_CONFIRMATION)
                .await?;
        }
        Ok(())
    }
}

/// Assembles a [`Client`]. Transport, token provider and sink can all be
/// replaced; without a transport, an HTTPS client is built from the config.
#[derive(Default)]
#[must_use]
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    tokens: Option<Arc<dyn TokenProvider>>,
    sink: Option<Arc<dyn LogSink>>,
}

impl ClientBuilder {
    pub fn config(mut self, config: &ClientConfig) -> Self {
        self.config = config.clone();
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn limits(mut self, limits: PaginationLimits) -> Self {
        self.config.pagination = limits;
        self
    }

    pub fn allow_insecure_http(mut self) -> Self {
        self.config.http.allow_insecure_http = true;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Defaults to [`TracingSink`].
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// # Errors
    /// [`ConfigError::Invalid`] without a token provider or with an invalid
    /// configuration, [`ConfigError::Http`] when the HTTP client cannot be built.
    pub fn build(self) -> Result<Client, ConfigError> {
        let Self {
            config,
            transport,
            tokens,
            sink,
        } = self;
        config.validate()?;
        let tokens = tokens.ok_or_else(|| ConfigError::Invalid {
            field: "auth",
            reason: "a token provider is required".to_owned(),
        })?;
        let transport = match transport {
            Some(transport) => transport,
            None => {
                let mut http = HttpClientBuilder::new()
                    .timeout(config.http.timeout)
                    .user_agent(config.http.user_agent.clone())
                    .max_body_size(config.http.max_body_size);
                if config.http.allow_insecure_http {
                    http = http.allow_insecure_http();
                }
                Arc::new(http.build()?)
            }
        };

        let executor = Executor::new(config.base_url.clone(), transport, tokens)
            .with_sink(sink.unwrap_or_else(|| Arc::new(TracingSink)))
            .with_translator(ErrorTranslator::new(config.vendor_name.clone()))
            .with_limits(config.pagination);
        tracing::debug!(base_url = %config.base_url, "convokit client ready");
        Ok(Client { executor })
    }
}
