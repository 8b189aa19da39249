#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! HTTP transport for convokit.
//!
//! A hyper client with rustls TLS, wrapped in a small tower stack:
//!
//! ```text
//! Buffer -> Timeout -> DefaultHeaders -> Decompression -> hyper
//! ```
//!
//! - HTTPS only unless insecure HTTP is explicitly allowed (mock servers in tests)
//! - per-request timeout
//! - `User-Agent` and `Accept` injected when the caller did not set them
//! - transparent gzip/brotli/deflate decompression, with the body size limit
//!   applied to decompressed bytes
//! - response bodies parsed by content type into a [`ResponsePayload`]
//!
//! `send()` succeeds for every HTTP status; deciding what counts as a failure
//! is left to the caller.
//!
//! ```ignore
//! use convokit_http::HttpClient;
//!
//! let client = HttpClient::builder().user_agent("my-app/1.0").build()?;
//! let response = client
//!     .get("https://api.nexmo.com/v0.3/users")
//!     .bearer_auth(token.expose())
//!     .send()
//!     .await?;
//! let status = response.status();
//! let payload = response.payload().await?;
//! ```

mod builder;
mod client;
mod config;
mod error;
mod layers;
mod request;
mod response;
mod tls;

pub use builder::HttpClientBuilder;
pub use client::HttpClient;
pub use config::{DEFAULT_USER_AGENT, HttpClientConfig, TlsRootConfig, TransportSecurity};
pub use error::HttpError;
pub use layers::{DefaultHeadersLayer, DefaultHeadersService};
pub use request::RequestBuilder;
pub use response::{HttpResponse, ResponseBody, ResponsePayload};
