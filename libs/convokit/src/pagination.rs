//! List retrieval: one entry point, four traversal strategies.
//!
//! - [`ListStrategy::Native`]: input fields become query parameters, one GET.
//! - [`ListStrategy::Cursor`]: one GET against a URL that already carries the
//!   cursor, typically a previous page's `_links.next.href`.
//! - [`ListStrategy::Loop`]: one concurrent GET per id, assembled into an envelope.
//! - [`ListStrategy::Limitless`]: follow `next` links until exhausted or capped.
//!
//! Whatever the strategy, the caller gets one list envelope validated against
//! the operation's output schema.

use convokit_schema::Schema;
use futures::future::join_all;
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use crate::auth::BearerToken;
use crate::envelope::{Link, Links, embedded_items, synthesize};
use crate::error::{ClientError, ValidationStage};
use crate::executor::Executor;
use crate::operation::Operation;
use crate::sink::LogLevel;

/// Caps applied by the limitless crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PaginationLimits {
    /// Page size forced on every limitless request. The API rejects more than 100.
    pub max_page_size: usize,
    /// Smallest page size the API accepts; also the floor of `item_ceiling`.
    pub min_page_size: usize,
    /// Accumulated item count at which a limitless crawl stops and hands back
    /// a resumable `next` link.
    pub item_ceiling: usize,
}

impl Default for PaginationLimits {
    fn default() -> Self {
        Self {
            max_page_size: 100,
            min_page_size: 10,
            item_ceiling: 10_000,
        }
    }
}

impl PaginationLimits {
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.max_page_size.max(self.min_page_size).max(1)
    }

    #[must_use]
    pub fn ceiling(&self) -> usize {
        self.item_ceiling.max(self.min_page_size)
    }

    /// Follow-up pages allowed before the loop guard stops a crawl whose
    /// `next` link never disappears.
    #[must_use]
    pub fn max_follow_ups(&self) -> usize {
        self.ceiling().checked_div(self.page_size()).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListStrategy {
    #[default]
    Native,
    Cursor,
    Loop,
    Limitless,
}

/// Arguments of one list retrieval.
///
/// ```
/// use convokit::{FindMany, ListStrategy, Operation};
///
/// let request = FindMany::new(Operation::new("/v0.3/users").with_name("users.findMany"), "users")
///     .strategy(ListStrategy::Limitless);
/// assert_eq!(request.collection_key(), "users");
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct FindMany {
    operation: Operation,
    input: Value,
    collection_key: String,
    strategy: ListStrategy,
    base_list_url: Option<String>,
    ids: Vec<String>,
    item_schema: Option<Schema>,
}

impl FindMany {
    /// `collection_key` names the array under `_embedded` in every page.
    pub fn new(operation: Operation, collection_key: impl Into<String>) -> Self {
        Self {
            operation,
            input: Value::Null,
            collection_key: collection_key.into(),
            strategy: ListStrategy::Native,
            base_list_url: None,
            ids: Vec::new(),
            item_schema: None,
        }
    }

    /// Filter fields; only used by native listing.
    pub fn input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    pub fn strategy(mut self, strategy: ListStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Collection path; single items live at `<base_list_url>/<id>`.
    pub fn base_list_url(mut self, url: impl Into<String>) -> Self {
        self.base_list_url = Some(url.into());
        self
    }

    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Schema of a single item, used by loop listing.
    pub fn item_schema(mut self, schema: Schema) -> Self {
        self.item_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn collection_key(&self) -> &str {
        &self.collection_key
    }

    #[must_use]
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub(crate) fn map_operation(mut self, f: impl FnOnce(Operation) -> Operation) -> Self {
        self.operation = f(self.operation);
        self
    }
}

impl Executor {
    /// Retrieve a list envelope with the requested strategy.
    ///
    /// Preconditions are checked before any token is fetched; the token is
    /// fetched at most once and shared by every request of the retrieval.
    /// A failed retrieval emits exactly one `[x] error` diagnostic unless the
    /// operation is quiet.
    ///
    /// # Errors
    /// - [`ClientError::Precondition`] for arguments the strategy requires
    /// - [`ClientError::Validation`] for bad filters, pages missing the
    ///   collection key, or a result rejected by the output schema
    /// - any error of the underlying calls; loop listing reports the first
    ///   failure in id order once every request has settled
    pub async fn find_many(&self, request: FindMany) -> Result<Value, ClientError> {
        match request.strategy {
            ListStrategy::Native => self.find_native(request).await,
            ListStrategy::Cursor => self.find_by_cursor(request).await,
            ListStrategy::Loop => self.find_by_ids(request).await,
            ListStrategy::Limitless => self.find_limitless(request).await,
        }
    }

    async fn find_native(&self, request: FindMany) -> Result<Value, ClientError> {
        let FindMany {
            operation,
            input,
            collection_key,
            base_list_url,
            ..
        } = request;
        let (url, token) = async {
            let name = operation.name();
            if operation.input().is_any() {
                return Err(ClientError::precondition(
                    name,
                    "input schema is required for native listing",
                ));
            }
            let url = list_url(&operation, base_list_url.as_deref()).ok_or_else(|| {
                ClientError::precondition(name, "url is required for native listing")
            })?;
            let input = if input.is_null() { json!({}) } else { input };
            let filters = operation
                .input()
                .validate(&input)
                .map_err(|v| ClientError::validation(name, ValidationStage::Input, v))?;
            let url = append_query(&url, &native_query(&filters));
            Ok::<_, ClientError>((url, self.token_for(&operation).await?))
        }
        .await
        .inspect_err(|err| self.batch_failed(&operation, err))?;

        let page = self
            .execute(&page_operation(&operation, url, &token), Value::Null)
            .await?;
        self.collection(&operation, &page, &collection_key)?;
        Ok(page)
    }

    async fn find_by_cursor(&self, request: FindMany) -> Result<Value, ClientError> {
        let FindMany {
            operation,
            collection_key,
            ..
        } = request;
        let (url, token) = async {
            let url = operation
                .url()
                .filter(|url| !url.is_empty())
                .map(ToOwned::to_owned)
                .ok_or_else(|| {
                    let reason = "url is required for cursor listing";
                    ClientError::precondition(operation.name(), reason)
                })?;
            Ok::<_, ClientError>((url, self.token_for(&operation).await?))
        }
        .await
        .inspect_err(|err| self.batch_failed(&operation, err))?;

        let page = self
            .execute(&page_operation(&operation, url, &token), Value::Null)
            .await?;
        self.collection(&operation, &page, &collection_key)?;
        Ok(page)
    }

    async fn find_by_ids(&self, request: FindMany) -> Result<Value, ClientError> {
        let FindMany {
            operation,
            collection_key,
            base_list_url,
            ids,
            item_schema,
            ..
        } = request;
        let name = operation.name().to_owned();
        let (base_list_url, item_schema, token) = async {
            if ids.is_empty() {
                return Err(ClientError::precondition(&name, "ids are required for loop listing"));
            }
            let base_list_url = base_list_url.ok_or_else(|| {
                ClientError::precondition(&name, "base list url is required for loop listing")
            })?;
            let item_schema = item_schema.ok_or_else(|| {
                ClientError::precondition(&name, "item schema is required for loop listing")
            })?;
            let token = self.token_for(&operation).await?;
            Ok::<_, ClientError>((base_list_url, item_schema, token))
        }
        .await
        .inspect_err(|err| self.batch_failed(&operation, err))?;

        let calls: Vec<Operation> = ids
            .iter()
            .map(|id| {
                Operation::new(format!("{base_list_url}/{id}"))
                    .with_name(name.as_str())
                    .with_method(Method::GET)
                    .with_output(item_schema.clone())
                    .with_token(token.clone())
                    .quiet()
            })
            .collect();

        let count = calls.len();
        self.sink()
            .log(LogLevel::Info, &format!("{name}: fetching {count} items..."), None);
        let settled = join_all(calls.iter().map(|call| self.execute(call, Value::Null))).await;
        let items = settled
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|err| self.batch_failed(&operation, err))?;
        self.sink().log(
            LogLevel::Info,
            &format!("{name}: fetched {count} items"),
            Some(&json!({ "count": count })),
        );

        let href = format!("{}?page_size={count}", self.resolve_url(&base_list_url));
        let envelope = synthesize(&collection_key, items, self_links(&href));
        self.validate_synthesized(&operation, &envelope)
    }

    async fn find_limitless(&self, request: FindMany) -> Result<Value, ClientError> {
        let FindMany {
            operation,
            collection_key,
            base_list_url,
            ..
        } = request;
        let name = operation.name().to_owned();
        let (mut start, token) = async {
            let url = list_url(&operation, base_list_url.as_deref()).ok_or_else(|| {
                ClientError::precondition(&name, "url is required for limitless listing")
            })?;
            let start = Url::parse(&self.resolve_url(&url)).map_err(|e| {
                ClientError::precondition(&name, format!("invalid list url {url}: {e}"))
            })?;
            Ok::<_, ClientError>((start, self.token_for(&operation).await?))
        }
        .await
        .inspect_err(|err| self.batch_failed(&operation, err))?;

        let limits = *self.limits();
        let ceiling = limits.ceiling();
        set_page_size(&mut start, limits.page_size());

        let first = self
            .execute(&page_operation(&operation, start.to_string(), &token), Value::Null)
            .await?;
        let mut items = self.collection(&operation, &first, &collection_key)?.clone();
        let mut next = next_href(&first);
        let mut resume = None;
        let mut follow_ups = 0_usize;

        while let Some(href) = next.take() {
            let page = self
                .execute(&page_operation(&operation, href, &token), Value::Null)
                .await?;
            items.extend(self.collection(&operation, &page, &collection_key)?.iter().cloned());
            follow_ups += 1;
            next = next_href(&page);

            if items.len() >= ceiling {
                self.sink().log(
                    LogLevel::Error,
                    &format!("{name}: too many {collection_key}, more than {ceiling}"),
                    next.as_ref().map(|href| json!({ "resume": href })).as_ref(),
                );
                resume = next.take();
                break;
            }
            if follow_ups > limits.max_follow_ups() {
                self.sink().log(
                    LogLevel::Info,
                    &format!(
                        "{name}: loop guard stopped the crawl after {follow_ups} follow-up pages"
                    ),
                    None,
                );
                break;
            }
        }

        start.set_query(None);
        let href = format!("{start}?page_size={}", items.len());
        let mut links = self_links(&href);
        if items.len() >= ceiling {
            links.next = resume.map(Link::new);
        }
        let envelope = synthesize(&collection_key, items, links);
        self.validate_synthesized(&operation, &envelope)
    }

    /// Validate a locally assembled result against the operation's output schema.
    pub(crate) fn validate_synthesized(
        &self,
        operation: &Operation,
        value: &Value,
    ) -> Result<Value, ClientError> {
        operation
            .output()
            .validate(value)
            .map_err(|v| ClientError::validation(operation.name(), ValidationStage::Output, v))
            .inspect_err(|err| self.batch_failed(operation, err))
    }

    /// One error event for a retrieval or batch that failed outside a logged call.
    pub(crate) fn batch_failed(&self, operation: &Operation, err: &ClientError) {
        if !operation.is_quiet() {
            self.sink().log(
                LogLevel::Error,
                &format!("{}: [x] error", operation.name()),
                Some(&json!({ "error": err.to_string() })),
            );
        }
    }

    /// Items of a fetched page; a page without the collection key fails the retrieval.
    fn collection<'v>(
        &self,
        operation: &Operation,
        page: &'v Value,
        key: &str,
    ) -> Result<&'v Vec<Value>, ClientError> {
        embedded_items(page, key)
            .map_err(|v| ClientError::validation(operation.name(), ValidationStage::Output, v))
            .inspect_err(|err| self.batch_failed(operation, err))
    }
}

fn list_url(operation: &Operation, base_list_url: Option<&str>) -> Option<String> {
    operation
        .url()
        .filter(|url| !url.is_empty())
        .or(base_list_url)
        .map(ToOwned::to_owned)
}

/// GET of one page: wildcard input, the caller's output schema, shared token.
fn page_operation(template: &Operation, url: String, token: &BearerToken) -> Operation {
    template
        .clone()
        .with_url(url)
        .with_input(Schema::any())
        .with_method(Method::GET)
        .with_token(token.clone())
}

fn next_href(page: &Value) -> Option<String> {
    page.pointer("/_links/next/href")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

fn self_links(href: &str) -> Links {
    Links {
        first: Some(Link::new(href)),
        self_: Some(Link::new(href)),
        ..Links::default()
    }
}

fn set_page_size(url: &mut Url, page_size: usize) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "page_size")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("page_size", &page_size.to_string());
}

/// Query string from the truthy fields of `filters`.
///
/// `null`, `false`, `0`, `""` and `[]` are skipped; arrays are comma-joined
/// and nested objects sent as JSON.
fn native_query(filters: &Value) -> String {
    let Value::Object(fields) = filters else {
        return String::new();
    };
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields {
        if let Some(text) = query_value(value) {
            query.append_pair(key, &text);
        }
    }
    query.finish()
}

fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Number(n) if n.as_f64().is_some_and(|f| f.abs() < f64::EPSILON) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Array(a) if a.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(a) => Some(
            a.iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.to_string()),
    }
}

fn append_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        url.to_owned()
    } else if url.contains('?') {
        format!("{url}&{query}")
    } else {
        format!("{url}?{query}")
    }
}
