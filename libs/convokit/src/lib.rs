#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Typed client layer for the Vonage Conversations API.
//!
//! Every call goes through the same pipeline:
//!
//! ```text
//! Model verb -> Executor -> validate input -> Transport -> translate errors -> validate output
//! ```
//!
//! Lists are retrieved by [`Executor::find_many`] with one of four
//! strategies (native, cursor, loop, limitless); resources are plain
//! [`ResourceSpec`] values, not types.
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//!
//! use convokit::{BearerToken, Client, ListOptions, ResourceSpec, token_fn};
//!
//! let client = Client::builder()
//!     .token_provider(Arc::new(token_fn(|| async { Ok(BearerToken::new("eyJ...")) })))
//!     .build()?;
//! let users = client.model(ResourceSpec::users());
//! let _page = users.list(ListOptions::new().filter("page_size", 20)).await?;
//! # Ok(())
//! # }
//! ```

mod auth;
mod bulk;
mod client;
mod config;
mod envelope;
mod error;
mod executor;
mod operation;
mod pagination;
mod pipeline;
mod resources;
mod sink;
mod transport;

pub use auth::{
    ApplicationJwt, BearerToken, FnToken, StaticToken, TokenError, TokenProvider, token_fn,
};
pub use bulk::DeleteMany;
pub use client::{Client, ClientBuilder, WIPE_CONFIRMATION};
pub use config::{AuthConfig, ClientConfig, ConfigError, DEFAULT_BASE_URL, ENV_PREFIX, HttpConfig};
pub use envelope::{Link, Links, ListEnvelope, embedded_items, list_envelope_schema, synthesize};
pub use error::{ClientError, ValidationStage};
pub use executor::Executor;
pub use operation::Operation;
pub use pagination::{FindMany, ListStrategy, PaginationLimits};
pub use pipeline::Model;
pub use resources::{
    DELETE_ALL_CONFIRMATION, GUARDED_DELETE_LIMIT, ListOptions, ResourceSpec, list_filters,
};
pub use sink::{LogEntry, LogLevel, LogSink, MemorySink, NoopSink, TracingSink};
pub use transport::{Transport, TransportRequest, TransportResponse};

pub use convokit_http::ResponsePayload;
pub use convokit_schema::{Schema, Violation, ViolationCode, Violations};
