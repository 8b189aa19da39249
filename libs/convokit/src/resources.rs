//! Resource facades as plain values, and the helpers built on them.

use convokit_schema::{Schema, Violation, ViolationCode, Violations};
use futures::future::join_all;
use http::Method;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::auth::BearerToken;
use crate::bulk::DeleteMany;
use crate::envelope::{ListEnvelope, embedded_items, list_envelope_schema};
use crate::error::{ClientError, ValidationStage};
use crate::executor::decode;
use crate::operation::Operation;
use crate::pagination::{FindMany, ListStrategy};
use crate::pipeline::Model;
use crate::sink::LogLevel;

/// Confirmation required to delete every item of a resource.
pub const DELETE_ALL_CONFIRMATION: &str = "sure";

/// Largest collection a confirmed delete-everything will touch.
pub const GUARDED_DELETE_LIMIT: usize = 700;

/// Where a resource lives and what its items look like.
#[derive(Debug, Clone)]
pub struct ResourceSpec {
    name: String,
    collection_key: String,
    base_path: String,
    id_field: String,
    item_schema: Schema,
    filter_schema: Schema,
    update_method: Method,
}

impl ResourceSpec {
    /// Items must carry a string `id`; everything else is kept as sent.
    pub fn new(
        name: impl Into<String>,
        collection_key: impl Into<String>,
        base_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            collection_key: collection_key.into(),
            base_path: base_path.into(),
            id_field: DEFAULT_ID_FIELD.to_owned(),
            item_schema: identified_item(DEFAULT_ID_FIELD),
            filter_schema: list_filters(),
            update_method: Method::PUT,
        }
    }

    /// Name the field that identifies an item. Resets the item schema to
    /// one requiring that field.
    #[must_use]
    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self.item_schema = identified_item(&self.id_field);
        self
    }

    #[must_use]
    pub fn with_item_schema(mut self, schema: Schema) -> Self {
        self.item_schema = schema;
        self
    }

    #[must_use]
    pub fn with_filter_schema(mut self, schema: Schema) -> Self {
        self.filter_schema = schema;
        self
    }

    #[must_use]
    pub fn with_update_method(mut self, method: Method) -> Self {
        self.update_method = method;
        self
    }

    #[must_use]
    pub fn conversations() -> Self {
        Self::new("conversations", "conversations", "/v0.3/conversations")
    }

    #[must_use]
    pub fn users() -> Self {
        Self::new("users", "users", "/v0.3/users")
    }

    /// Legs are identified by `uuid`.
    #[must_use]
    pub fn legs() -> Self {
        Self::new("legs", "legs", "/v0.3/legs").with_id_field("uuid")
    }

    /// Members update with partial semantics.
    #[must_use]
    pub fn members(conversation_id: &str) -> Self {
        Self::new(
            "members",
            "members",
            format!("/v0.3/conversations/{conversation_id}/members"),
        )
        .with_update_method(Method::PATCH)
    }

    #[must_use]
    pub fn events(conversation_id: &str) -> Self {
        Self::new(
            "events",
            "events",
            format!("/v0.3/conversations/{conversation_id}/events"),
        )
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn collection_key(&self) -> &str {
        &self.collection_key
    }

    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    #[must_use]
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    #[must_use]
    pub fn item_schema(&self) -> &Schema {
        &self.item_schema
    }

    #[must_use]
    pub fn filter_schema(&self) -> &Schema {
        &self.filter_schema
    }

    #[must_use]
    pub fn update_method(&self) -> &Method {
        &self.update_method
    }

    #[must_use]
    pub fn item_url(&self, id: &str) -> String {
        format!("{}/{id}", self.base_path)
    }

    #[must_use]
    pub fn list_schema(&self) -> Schema {
        list_envelope_schema(&self.collection_key, self.item_schema.clone())
    }
}

const DEFAULT_ID_FIELD: &str = "id";

fn identified_item(id_field: &str) -> Schema {
    Schema::object([(id_field, Schema::string().min_len(1))]).passthrough()
}

/// Filters accepted by every list endpoint of the API.
#[must_use]
pub fn list_filters() -> Schema {
    Schema::object([
        ("cursor", Schema::string().optional()),
        ("order", Schema::one_of(["asc", "desc", "ASC", "DESC"]).optional()),
        ("page_size", Schema::integer().coerce().optional()),
    ])
}

/// How to list a resource. The first applicable mode wins: limitless, then
/// ids, then a paginated URL, then native filtering.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct ListOptions {
    filters: Map<String, Value>,
    ids: Vec<String>,
    paginated: Option<String>,
    limitless: bool,
    token: Option<BearerToken>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    /// Fetch exactly these items, one request each.
    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Continue from a `_links.next.href` of an earlier response.
    pub fn paginated(mut self, href: impl Into<String>) -> Self {
        self.paginated = Some(href.into());
        self
    }

    /// Follow every page, up to the configured item ceiling.
    pub fn limitless(mut self) -> Self {
        self.limitless = true;
        self
    }

    pub fn token(mut self, token: BearerToken) -> Self {
        self.token = Some(token);
        self
    }
}

impl Model {
    /// List with the mode selected by `options`. Arguments the chosen mode
    /// ignores are reported as a warning.
    ///
    /// # Errors
    /// See [`Executor::find_many`](crate::Executor::find_many).
    pub async fn list(&self, options: ListOptions) -> Result<Value, ClientError> {
        let ListOptions {
            filters,
            ids,
            paginated,
            limitless,
            token,
        } = options;
        let resource = self.resource().clone();
        let warn_name = self.diagnostic_name("findMany");

        if !ids.is_empty() && (!filters.is_empty() || paginated.is_some()) {
            self.executor().sink().log(
                LogLevel::Warn,
                &format!("{warn_name}: ids set, other arguments ignored"),
                Some(&json!({ "ignored": { "filters": filters, "paginated": paginated } })),
            );
        }
        if limitless && !filters.is_empty() {
            self.executor().sink().log(
                LogLevel::Warn,
                &format!("{warn_name}: limitless set, filters ignored"),
                Some(&json!({ "ignored": { "filters": filters } })),
            );
        }

        let mut template = Operation::default()
            .with_input(resource.filter_schema().clone())
            .with_output(resource.list_schema());
        if let Some(token) = token {
            template = template.with_token(token);
        }
        let key = resource.collection_key();

        let request = if limitless {
            let start = paginated.unwrap_or_else(|| resource.base_path().to_owned());
            FindMany::new(template.with_url(start), key).strategy(ListStrategy::Limitless)
        } else if !ids.is_empty() {
            FindMany::new(template, key)
                .strategy(ListStrategy::Loop)
                .base_list_url(resource.base_path())
                .ids(ids)
                .item_schema(resource.item_schema().clone())
        } else if let Some(href) = paginated {
            FindMany::new(template.with_url(href).with_input(Schema::any()), key)
                .strategy(ListStrategy::Cursor)
        } else {
            FindMany::new(template.with_url(resource.base_path()), key)
                .input(Value::Object(filters))
        };
        self.find_many(request).await
    }

    /// [`list`](Self::list) decoded into typed items.
    ///
    /// # Errors
    /// As `list`, plus an output [`ClientError::Validation`] when items do
    /// not decode into `T`.
    pub async fn list_as<T: DeserializeOwned>(
        &self,
        options: ListOptions,
    ) -> Result<ListEnvelope<T>, ClientError> {
        let value = self.list(options).await?;
        ListEnvelope::from_value(&value, self.resource().collection_key()).map_err(|v| {
            ClientError::validation(&self.diagnostic_name("findMany"), ValidationStage::Output, v)
        })
    }

    /// Fetch one item by id.
    ///
    /// # Errors
    /// See [`Executor::execute`](crate::Executor::execute).
    pub async fn get<T: DeserializeOwned>(&self, id: &str) -> Result<T, ClientError> {
        let resource = self.resource();
        let operation =
            Operation::new(resource.item_url(id)).with_output(resource.item_schema().clone());
        let value = self.find(operation).await?;
        decode(&self.diagnostic_name("find"), value)
    }

    /// Create every input concurrently with one shared token. Results are in
    /// input order; the first failure fails the whole batch.
    ///
    /// # Errors
    /// [`ClientError::Token`] or the first failing create.
    pub async fn create_many(
        &self,
        inputs: Vec<Value>,
        token: Option<BearerToken>,
    ) -> Result<Vec<Value>, ClientError> {
        let token = self.shared_token("createMany", token).await?;
        let resource = self.resource();
        let calls = inputs.into_iter().map(|input| {
            let operation = Operation::new(resource.base_path())
                .with_output(resource.item_schema().clone())
                .with_token(token.clone());
            self.create(operation, input)
        });
        join_all(calls).await.into_iter().collect()
    }

    /// Update every `(id, input)` pair concurrently with one shared token.
    ///
    /// # Errors
    /// [`ClientError::Token`] or the first failing update.
    pub async fn update_many(
        &self,
        updates: Vec<(String, Value)>,
        token: Option<BearerToken>,
    ) -> Result<Vec<Value>, ClientError> {
        let token = self.shared_token("updateMany", token).await?;
        let resource = self.resource();
        let calls = updates.into_iter().map(|(id, input)| {
            let operation = Operation::new(resource.item_url(&id))
                .with_output(resource.item_schema().clone())
                .with_token(token.clone());
            self.update(operation, input)
        });
        join_all(calls).await.into_iter().collect()
    }

    /// Delete the given ids, or, when `ids` is empty, every item of the
    /// resource. Deleting everything requires `confirmation` to equal
    /// [`DELETE_ALL_CONFIRMATION`] and refuses collections larger than
    /// [`GUARDED_DELETE_LIMIT`].
    ///
    /// # Errors
    /// [`ClientError::Precondition`] for a missing confirmation or an
    /// oversized collection, otherwise as [`Model::delete_many`].
    pub async fn delete_many_guarded(
        &self,
        ids: &[String],
        confirmation: &str,
    ) -> Result<Value, ClientError> {
        let name = self.diagnostic_name("deleteMany");
        let resource = self.resource().clone();

        if !ids.is_empty() {
            let token = self.shared_token("deleteMany", None).await?;
            return self.delete_ids(ids.to_vec(), &resource, token).await;
        }

        if confirmation != DELETE_ALL_CONFIRMATION {
            let (noun, expected) = (resource.name(), DELETE_ALL_CONFIRMATION);
            return Err(ClientError::precondition(
                &name,
                format!("refusing to delete every {noun} without the confirmation {expected:?}"),
            ));
        }
        let token = self.shared_token("deleteMany", None).await?;
        self.executor().sink().log(
            LogLevel::Warn,
            &format!("{name}: deleting every {}", resource.name()),
            None,
        );

        let everything = self.list(ListOptions::new().limitless().token(token.clone())).await?;
        let items = embedded_items(&everything, resource.collection_key())
            .map_err(|v| ClientError::validation(&name, ValidationStage::Output, v))?;
        let ids = item_ids(items, &resource)
            .map_err(|v| ClientError::validation(&name, ValidationStage::Output, v))?;
        if ids.len() > GUARDED_DELETE_LIMIT {
            let (count, noun, limit) = (ids.len(), resource.name(), GUARDED_DELETE_LIMIT);
            return Err(ClientError::precondition(
                &name,
                format!("refusing to delete {count} {noun}; pass explicit ids for at most {limit}"),
            ));
        }
        self.delete_ids(ids, &resource, token).await
    }

    async fn delete_ids(
        &self,
        ids: Vec<String>,
        resource: &ResourceSpec,
        token: BearerToken,
    ) -> Result<Value, ClientError> {
        let request = DeleteMany::new(Operation::default().with_token(token), ids)
            .base_list_url(resource.base_path());
        self.delete_many(request).await
    }

    async fn shared_token(
        &self,
        verb: &str,
        token: Option<BearerToken>,
    ) -> Result<BearerToken, ClientError> {
        match token {
            Some(token) => Ok(token),
            None => self.executor().token(&self.diagnostic_name(verb)).await,
        }
    }
}

/// Identifier of every item; an item without one is a violation.
fn item_ids(items: &[Value], resource: &ResourceSpec) -> Result<Vec<String>, Violations> {
    let field = resource.id_field();
    let mut ids = Vec::with_capacity(items.len());
    let mut missing = Vec::new();
    for (index, item) in items.iter().enumerate() {
        match item.get(field).and_then(Value::as_str).filter(|id| !id.is_empty()) {
            Some(id) => ids.push(id.to_owned()),
            None => missing.push(Violation::new(
                format!("_embedded.{}[{index}].{field}", resource.collection_key()),
                "required",
                ViolationCode::Required,
            )),
        }
    }
    if missing.is_empty() {
        Ok(ids)
    } else {
        Err(Violations::new(missing))
    }
}
