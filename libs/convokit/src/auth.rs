//! Bearer tokens and the providers that supply them.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use convokit_utils::SecretString;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use thiserror::Error;

/// Opaque bearer credential. Redacted in `Debug` and `Display`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BearerToken(SecretString);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::new(token))
    }

    /// Raw token, for building the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose()
    }
}

impl std::fmt::Display for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TokenError {
    #[error("token provider unavailable: {0}")]
    Unavailable(String),

    #[error("invalid private key: {0}")]
    InvalidKey(#[source] jsonwebtoken::errors::Error),

    #[error("failed to read private key from {path}: {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Source of bearer tokens. Called at most once per bulk operation.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// # Errors
    /// Any failure to produce a token; surfaced to callers as
    /// [`ClientError::Token`](crate::ClientError::Token).
    async fn token(&self) -> Result<BearerToken, TokenError>;
}

/// Always hands out the same token.
#[derive(Debug, Clone)]
pub struct StaticToken(BearerToken);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(BearerToken::new(token))
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<BearerToken, TokenError> {
        Ok(self.0.clone())
    }
}

/// Adapter for an async closure. Build with [`token_fn`].
pub struct FnToken<F>(F);

/// Wrap an async closure as a [`TokenProvider`].
///
/// ```
/// use convokit::{BearerToken, token_fn};
///
/// let provider = token_fn(|| async { Ok(BearerToken::new("from-vault")) });
/// ```
pub fn token_fn<F, Fut>(f: F) -> FnToken<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<BearerToken, TokenError>> + Send,
{
    FnToken(f)
}

#[async_trait]
impl<F, Fut> TokenProvider for FnToken<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<BearerToken, TokenError>> + Send + 'static,
{
    async fn token(&self) -> Result<BearerToken, TokenError> {
        (self.0)().await
    }
}

#[derive(Debug, Serialize)]
struct ApplicationClaims<'a> {
    application_id: &'a str,
    iat: u64,
    exp: u64,
    jti: String,
}

/// Mints RS256 application JWTs signed with the application's private key.
///
/// Each call to [`token`](TokenProvider::token) signs a fresh token; no
/// network round trip is involved.
pub struct ApplicationJwt {
    application_id: String,
    key: EncodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for ApplicationJwt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationJwt")
            .field("application_id", &self.application_id)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl ApplicationJwt {
    /// Default token lifetime.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

    /// # Errors
    /// [`TokenError::InvalidKey`] when `pem` is not an RSA private key.
    pub fn from_pem(
        application_id: impl Into<String>,
        pem: &SecretString,
        ttl: Duration,
    ) -> Result<Self, TokenError> {
        let key =
            EncodingKey::from_rsa_pem(pem.expose().as_bytes()).map_err(TokenError::InvalidKey)?;
        Ok(Self {
            application_id: application_id.into(),
            key,
            ttl,
        })
    }

    /// # Errors
    /// [`TokenError::KeyFile`] when the file cannot be read,
    /// [`TokenError::InvalidKey`] when it is not an RSA private key.
    pub fn from_pem_file(
        application_id: impl Into<String>,
        path: &Path,
        ttl: Duration,
    ) -> Result<Self, TokenError> {
        let pem = std::fs::read_to_string(path).map_err(|source| TokenError::KeyFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_pem(application_id, &SecretString::new(pem), ttl)
    }

    #[must_use]
    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    /// # Errors
    /// [`TokenError::Signing`] if signing fails.
    pub fn mint(&self) -> Result<BearerToken, TokenError> {
        let iat = jsonwebtoken::get_current_timestamp();
        let claims = ApplicationClaims {
            application_id: &self.application_id,
            iat,
            exp: iat.saturating_add(self.ttl.as_secs()),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        let header = Header::new(Algorithm::RS256);
        jsonwebtoken::encode(&header, &claims, &self.key)
            .map(BearerToken::new)
            .map_err(TokenError::Signing)
    }
}

#[async_trait]
impl TokenProvider for ApplicationJwt {
    async fn token(&self) -> Result<BearerToken, TokenError> {
        self.mint()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation};
    use serde::Deserialize;

    const PRIVATE_KEY: &str = include_str!("../tests/fixtures/test_private_key.pem");
    const PUBLIC_KEY: &str = include_str!("../tests/fixtures/test_public_key.pem");

    #[derive(Debug, Deserialize)]
    struct DecodedClaims {
        application_id: String,
        iat: u64,
        exp: u64,
        jti: String,
    }

    #[test]
    fn bearer_token_is_redacted() {
        let token = BearerToken::new("eyJhbGciOiJSUzI1NiJ9.secret");
        assert_eq!(format!("{token:?}"), "BearerToken([REDACTED])");
        assert_eq!(token.to_string(), "[REDACTED]");
        assert_eq!(token.expose(), "eyJhbGciOiJSUzI1NiJ9.secret");
    }

    #[tokio::test]
    async fn static_and_closure_providers() {
        assert_eq!(StaticToken::new("abc").token().await.unwrap().expose(), "abc");

        let provider = token_fn(|| async { Ok(BearerToken::new("dyn")) });
        assert_eq!(provider.token().await.unwrap().expose(), "dyn");

        let failing =
            token_fn(|| async { Err(TokenError::Unavailable("vault sealed".to_owned())) });
        let err = failing.token().await.unwrap_err();
        assert_eq!(err.to_string(), "token provider unavailable: vault sealed");
    }

    #[tokio::test]
    async fn application_jwt_is_verifiable() {
        let provider = ApplicationJwt::from_pem(
            "aaaaaaaa-bbbb-cccc-dddd-0123456789ab",
            &SecretString::new(PRIVATE_KEY),
            Duration::from_secs(60),
        )
        .unwrap();

        let token = provider.token().await.unwrap();
        let decoded = jsonwebtoken::decode::<DecodedClaims>(
            token.expose(),
            &DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap(),
            &Validation::new(Algorithm::RS256),
        )
        .unwrap();

        assert_eq!(decoded.claims.application_id, "aaaaaaaa-bbbb-cccc-dddd-0123456789ab");
        assert_eq!(decoded.claims.exp - decoded.claims.iat, 60);
        assert!(!decoded.claims.jti.is_empty());
    }

    #[test]
    fn every_token_gets_a_fresh_jti() {
        let provider = ApplicationJwt::from_pem(
            "app",
            &SecretString::new(PRIVATE_KEY),
            ApplicationJwt::DEFAULT_TTL,
        )
        .unwrap();
        assert_ne!(provider.mint().unwrap(), provider.mint().unwrap());
    }

    #[test]
    fn garbage_key_is_rejected() {
        let err = ApplicationJwt::from_pem(
            "app",
            &SecretString::new("not a key"),
            Duration::from_secs(60),
        )
        .unwrap_err();
        assert!(matches!(err, TokenError::InvalidKey(_)));
    }

    #[test]
    fn missing_key_file() {
        let err = ApplicationJwt::from_pem_file(
            "app",
            Path::new("/definitely/not/here.pem"),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, TokenError::KeyFile { .. }));
        assert!(err.to_string().contains("/definitely/not/here.pem"));
    }
}
