use http::Method;
use serde_json::Value;

use crate::bulk::DeleteMany;
use crate::error::ClientError;
use crate::executor::Executor;
use crate::operation::Operation;
use crate::pagination::FindMany;
use crate::resources::ResourceSpec;

/// Resource pipeline: the executor bound to one resource.
///
/// Verbs fix the HTTP method and tag diagnostics as `<resource>.<verb>`;
/// schemas, URL, input and token are forwarded untouched.
#[derive(Debug, Clone)]
pub struct Model {
    executor: Executor,
    resource: ResourceSpec,
}

impl Model {
    #[must_use]
    pub fn new(executor: Executor, resource: ResourceSpec) -> Self {
        Self { executor, resource }
    }

    #[must_use]
    pub fn resource(&self) -> &ResourceSpec {
        &self.resource
    }

    #[must_use]
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub(crate) fn diagnostic_name(&self, verb: &str) -> String {
        format!("{}.{verb}", self.resource.name())
    }

    fn tagged(&self, operation: Operation, verb: &str) -> Operation {
        operation.with_name(self.diagnostic_name(verb))
    }

    /// Direct executor access; the operation's name becomes the verb.
    /// POST unless the operation says otherwise.
    ///
    /// # Errors
    /// See [`Executor::execute`].
    pub async fn run(&self, operation: Operation, input: Value) -> Result<Value, ClientError> {
        let verb = operation.name().to_owned();
        self.executor.execute(&self.tagged(operation, &verb), input).await
    }

    /// POST unless the operation overrides the method.
    ///
    /// # Errors
    /// See [`Executor::execute`].
    pub async fn create(&self, operation: Operation, input: Value) -> Result<Value, ClientError> {
        let operation = self.tagged(operation, "create").or_method(Method::POST);
        self.executor.execute(&operation, input).await
    }

    /// The resource's update method (PUT, or PATCH for partial-update
    /// resources) unless the operation overrides it.
    ///
    /// # Errors
    /// See [`Executor::execute`].
    pub async fn update(&self, operation: Operation, input: Value) -> Result<Value, ClientError> {
        let method = self.resource.update_method().clone();
        let operation = self.tagged(operation, "update").or_method(method);
        self.executor.execute(&operation, input).await
    }

    /// Always GET.
    ///
    /// # Errors
    /// See [`Executor::execute`].
    pub async fn find(&self, operation: Operation) -> Result<Value, ClientError> {
        let operation = self.tagged(operation, "find").with_method(Method::GET);
        self.executor.execute(&operation, Value::Null).await
    }

    /// Always DELETE.
    ///
    /// # Errors
    /// See [`Executor::execute`].
    pub async fn delete(&self, operation: Operation) -> Result<Value, ClientError> {
        let operation = self.tagged(operation, "delete").with_method(Method::DELETE);
        self.executor.execute(&operation, Value::Null).await
    }

    /// # Errors
    /// See [`Executor::find_many`].
    pub async fn find_many(&self, request: FindMany) -> Result<Value, ClientError> {
        let name = self.diagnostic_name("findMany");
        self.executor
            .find_many(request.map_operation(|op| op.with_name(name)))
            .await
    }

    /// # Errors
    /// See [`Executor::delete_many`].
    pub async fn delete_many(&self, request: DeleteMany) -> Result<Value, ClientError> {
        let name = self.diagnostic_name("deleteMany");
        self.executor
            .delete_many(request.map_operation(|op| op.with_name(name)))
            .await
    }
}
