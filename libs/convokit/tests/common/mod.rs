#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

//! Shared fixtures for the convokit integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use convokit::{
    BearerToken, Client, Executor, MemorySink, PaginationLimits, ResponsePayload, TokenError,
    TokenProvider, Transport, TransportRequest, TransportResponse,
};
use convokit_http::HttpError;
use http::{Method, StatusCode};
use serde_json::{Value, json};

pub const BASE_URL: &str = "https://api.test";

/// What the scripted transport answers for one request.
pub enum Reply {
    Respond {
        response: TransportResponse,
        delay: Duration,
    },
    Timeout,
}

impl Reply {
    pub fn json(status: u16, body: Value) -> Self {
        Self::Respond {
            response: TransportResponse::json(StatusCode::from_u16(status).unwrap(), body),
            delay: Duration::ZERO,
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self::Respond {
            response: TransportResponse::new(
                StatusCode::from_u16(status).unwrap(),
                ResponsePayload::Text(body.to_owned()),
            ),
            delay: Duration::ZERO,
        }
    }

    pub fn empty(status: u16) -> Self {
        Self::Respond {
            response: TransportResponse::new(
                StatusCode::from_u16(status).unwrap(),
                ResponsePayload::Empty,
            ),
            delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn after(self, delay: Duration) -> Self {
        match self {
            Self::Respond { response, .. } => Self::Respond { response, delay },
            Self::Timeout => Self::Timeout,
        }
    }
}

type Handler = dyn Fn(&TransportRequest) -> Reply + Send + Sync;

/// In-memory transport driven by a handler closure. Records every request
/// and the order in which responses were produced.
pub struct ScriptedTransport {
    handler: Box<Handler>,
    requests: Mutex<Vec<TransportRequest>>,
    completions: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(handler: impl Fn(&TransportRequest) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            completions: Mutex::new(Vec::new()),
        })
    }

    /// Fixed replies keyed by `METHOD url`; anything else is a vendor 404.
    pub fn routes(routes: Vec<(Method, String, Reply)>) -> Arc<Self> {
        let table: Mutex<HashMap<(Method, String), Reply>> =
            Mutex::new(routes.into_iter().map(|(m, u, r)| ((m, u), r)).collect());
        Self::new(move |req| {
            table
                .lock()
                .unwrap()
                .remove(&(req.method.clone(), req.url.clone()))
                .unwrap_or_else(|| not_found(&req.url))
        })
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn completion_order(&self) -> Vec<String> {
        self.completions.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(&self, request: TransportRequest) -> Result<TransportResponse, HttpError> {
        let reply = (self.handler)(&request);
        self.requests.lock().unwrap().push(request.clone());
        match reply {
            Reply::Respond { response, delay } => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                self.completions.lock().unwrap().push(request.url);
                Ok(response)
            }
            Reply::Timeout => Err(HttpError::Timeout(Duration::from_secs(30))),
        }
    }
}

pub fn not_found(url: &str) -> Reply {
    Reply::json(
        404,
        json!({
            "type": "https://developer.nexmo.com/api-errors#not-found",
            "title": "Not Found",
            "code": "http:error:not-found",
            "detail": format!("no route for {url}"),
        }),
    )
}

/// Counts how often a token was requested.
#[derive(Default)]
pub struct CountingTokens {
    calls: AtomicUsize,
}

impl CountingTokens {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for CountingTokens {
    async fn token(&self) -> Result<BearerToken, TokenError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(BearerToken::new(format!("token-{n}")))
    }
}

pub struct Harness {
    pub transport: Arc<ScriptedTransport>,
    pub tokens: Arc<CountingTokens>,
    pub sink: Arc<MemorySink>,
    pub client: Client,
}

impl Harness {
    pub fn new(transport: Arc<ScriptedTransport>) -> Self {
        Self::with_limits(transport, PaginationLimits::default())
    }

    pub fn with_limits(transport: Arc<ScriptedTransport>, limits: PaginationLimits) -> Self {
        let tokens = Arc::new(CountingTokens::default());
        let sink = Arc::new(MemorySink::new());
        let client = Client::builder()
            .base_url(BASE_URL)
            .limits(limits)
            .transport(transport.clone())
            .token_provider(tokens.clone())
            .sink(sink.clone())
            .build()
            .expect("scripted client");
        Self {
            transport,
            tokens,
            sink,
            client,
        }
    }

    pub fn executor(&self) -> &Executor {
        self.client.executor()
    }
}

/// One page of `users` items `USR-{start}..USR-{start + count}`.
pub fn users_page(start: usize, count: usize, next: Option<&str>) -> Value {
    let items: Vec<Value> = (start..start + count)
        .map(|i| json!({ "id": format!("USR-{i}"), "name": format!("user{i}") }))
        .collect();
    let mut links = json!({
        "first": { "href": format!("{BASE_URL}/v0.3/users?page_size={count}") },
        "self": { "href": format!("{BASE_URL}/v0.3/users?page_size={count}") },
    });
    if let Some(next) = next {
        links["next"] = json!({ "href": next });
    }
    json!({
        "page_size": count,
        "_embedded": { "users": items },
        "_links": links,
    })
}
