//! Fan-out deletion.

use convokit_schema::Schema;
use futures::future::join_all;
use http::Method;
use serde_json::Value;

use crate::error::ClientError;
use crate::executor::Executor;
use crate::operation::Operation;

/// Arguments of one bulk delete.
///
/// The operation supplies the diagnostic name, the schema of the whole
/// result array and optionally a token; its URL and input schema are unused.
#[derive(Debug, Clone)]
#[must_use]
pub struct DeleteMany {
    operation: Operation,
    base_list_url: Option<String>,
    ids: Vec<String>,
    item_schema: Schema,
}

impl DeleteMany {
    pub fn new<I, S>(operation: Operation, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            operation,
            base_list_url: None,
            ids: ids.into_iter().map(Into::into).collect(),
            item_schema: Schema::any(),
        }
    }

    /// Items are deleted at `<base_list_url>/<id>`.
    pub fn base_list_url(mut self, url: impl Into<String>) -> Self {
        self.base_list_url = Some(url.into());
        self
    }

    /// Schema of each individual delete response. Defaults to the wildcard.
    pub fn item_schema(mut self, schema: Schema) -> Self {
        self.item_schema = schema;
        self
    }

    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub(crate) fn map_operation(mut self, f: impl FnOnce(Operation) -> Operation) -> Self {
        self.operation = f(self.operation);
        self
    }
}

impl Executor {
    /// Delete every id concurrently and return the per-id results, in id
    /// order, validated against the operation's output schema.
    ///
    /// All requests settle before the outcome is decided. The first failure
    /// in id order fails the batch; deletions that already succeeded are
    /// neither rolled back nor reported.
    ///
    /// # Errors
    /// [`ClientError::Precondition`] without a base list URL, otherwise the
    /// first failing delete or an output [`ClientError::Validation`].
    pub async fn delete_many(&self, request: DeleteMany) -> Result<Value, ClientError> {
        let DeleteMany {
            operation,
            base_list_url,
            ids,
            item_schema,
        } = request;
        let name = operation.name().to_owned();
        let base_list_url = base_list_url
            .ok_or_else(|| ClientError::precondition(&name, "base list url is required"))?;
        let token = self.token_for(&operation).await?;

        let calls: Vec<Operation> = ids
            .iter()
            .map(|id| {
                Operation::new(format!("{base_list_url}/{id}"))
                    .with_name(name.as_str())
                    .with_method(Method::DELETE)
                    .with_output(item_schema.clone())
                    .with_token(token.clone())
                    .quiet()
            })
            .collect();

        let settled = join_all(calls.iter().map(|call| self.execute(call, Value::Null))).await;
        let results = settled
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|err| self.batch_failed(&operation, err))?;
        self.validate_synthesized(&operation, &Value::Array(results))
    }
}
