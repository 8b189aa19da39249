use std::path::{Path, PathBuf};
use std::time::Duration;

use convokit_http::DEFAULT_USER_AGENT;
use convokit_utils::SecretString;
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::Deserialize;
use thiserror::Error;

use crate::auth::{ApplicationJwt, TokenError};
use crate::pagination::PaginationLimits;

/// Environment variables with this prefix override file settings;
/// `__` separates nesting levels (`CONVOKIT__HTTP__TIMEOUT=5s`).
pub const ENV_PREFIX: &str = "CONVOKIT__";

pub const DEFAULT_BASE_URL: &str = "https://api.nexmo.com";

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] convokit_http::HttpError),

    #[error("failed to set up authentication: {0}")]
    Auth(#[from] TokenError),
}

/// Client configuration.
///
/// ```yaml
/// base_url: https://api.nexmo.com
/// http:
///   timeout: 10s
/// pagination:
///   item_ceiling: 5000
/// auth:
///   application_id: aaaaaaaa-bbbb-cccc-dddd-0123456789ab
///   private_key_path: /etc/convokit/private.key
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub base_url: String,
    /// Vendor name used in translated error messages.
    pub vendor_name: String,
    pub http: HttpConfig,
    pub pagination: PaginationLimits,
    pub auth: Option<AuthConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            vendor_name: convokit_errors::DEFAULT_VENDOR_NAME.to_owned(),
            http: HttpConfig::default(),
            pagination: PaginationLimits::default(),
            auth: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    #[serde(with = "convokit_utils::humantime_serde")]
    pub timeout: Duration,
    pub user_agent: String,
    pub max_body_size: usize,
    /// Accept `http://` base URLs. For local mock servers only.
    pub allow_insecure_http: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            max_body_size: 10 * 1024 * 1024,
            allow_insecure_http: false,
        }
    }
}

/// Application credentials used to mint bearer tokens.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub application_id: String,
    /// PEM-encoded private key. Exactly one of this and `private_key_path`.
    #[serde(default)]
    pub private_key: Option<SecretString>,
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    #[serde(default = "default_token_ttl", with = "convokit_utils::humantime_serde")]
    pub token_ttl: Duration,
}

fn default_token_ttl() -> Duration {
    ApplicationJwt::DEFAULT_TTL
}

impl AuthConfig {
    /// # Errors
    /// [`ConfigError::Invalid`] unless exactly one key source is set, and
    /// [`ConfigError::Auth`] when the key cannot be read or parsed.
    pub fn token_provider(&self) -> Result<ApplicationJwt, ConfigError> {
        let provider = match (&self.private_key, &self.private_key_path) {
            (Some(pem), None) => {
                ApplicationJwt::from_pem(&self.application_id, pem, self.token_ttl)?
            }
            (None, Some(path)) => {
                ApplicationJwt::from_pem_file(&self.application_id, path, self.token_ttl)?
            }
            (Some(_), Some(_)) => {
                return Err(ConfigError::Invalid {
                    field: "auth",
                    reason: "set either private_key or private_key_path, not both".to_owned(),
                });
            }
            (None, None) => {
                return Err(ConfigError::Invalid {
                    field: "auth",
                    reason: "private_key or private_key_path is required".to_owned(),
                });
            }
        };
        Ok(provider)
    }
}

impl ClientConfig {
    /// Defaults, then the YAML file at `path` (when given), then
    /// `CONVOKIT__*` environment variables.
    ///
    /// # Errors
    /// [`ConfigError::Load`] for unreadable or malformed sources and
    /// [`ConfigError::Invalid`] for values that fail [`validate`](Self::validate).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        tracing::debug!(base_url = %config.base_url, "configuration loaded");
        Ok(config)
    }

    /// # Errors
    /// [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scheme_ok = self.base_url.starts_with("https://")
            || (self.http.allow_insecure_http && self.base_url.starts_with("http://"));
        if !scheme_ok {
            return Err(ConfigError::Invalid {
                field: "base_url",
                reason: format!("{} is not an allowed absolute URL", self.base_url),
            });
        }
        if self.base_url.ends_with('/') {
            return Err(ConfigError::Invalid {
                field: "base_url",
                reason: "must not end with '/'".to_owned(),
            });
        }
        if self.pagination.max_page_size == 0 {
            return Err(ConfigError::Invalid {
                field: "pagination.max_page_size",
                reason: "must be positive".to_owned(),
            });
        }
        if self.http.timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "http.timeout",
                reason: "must be positive".to_owned(),
            });
        }
        Ok(())
    }
}
