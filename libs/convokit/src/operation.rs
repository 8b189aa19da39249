use convokit_schema::Schema;
use http::Method;

use crate::auth::BearerToken;

/// Parameters of one logical call: schemas, target, method, credentials.
///
/// Built fresh per call and consumed by the executor.
///
/// ```
/// use convokit::Operation;
/// use convokit_schema::Schema;
///
/// let op = Operation::new("/v0.3/users")
///     .with_name("users.create")
///     .with_input(Schema::object([("name", Schema::string())]))
///     .with_output(Schema::object([("id", Schema::string())]).passthrough());
/// assert_eq!(op.name(), "users.create");
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct Operation {
    name: String,
    url: Option<String>,
    method: Option<Method>,
    input: Schema,
    output: Schema,
    token: Option<BearerToken>,
    quiet: bool,
}

impl Default for Operation {
    fn default() -> Self {
        Self {
            name: "unknown".to_owned(),
            url: None,
            method: None,
            input: Schema::any(),
            output: Schema::any(),
            token: None,
            quiet: false,
        }
    }
}

impl Operation {
    /// Operation targeting `url`: absolute, or a path below the base URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self::default().with_url(url)
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_input(mut self, schema: Schema) -> Self {
        self.input = schema;
        self
    }

    pub fn with_output(mut self, schema: Schema) -> Self {
        self.output = schema;
        self
    }

    /// Use this token instead of asking the provider.
    pub fn with_token(mut self, token: BearerToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Suppress per-call diagnostics.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    #[must_use]
    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    #[must_use]
    pub fn input(&self) -> &Schema {
        &self.input
    }

    #[must_use]
    pub fn output(&self) -> &Schema {
        &self.output
    }

    #[must_use]
    pub fn token(&self) -> Option<&BearerToken> {
        self.token.as_ref()
    }

    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Copy with the method set only when none was chosen.
    pub(crate) fn or_method(mut self, method: Method) -> Self {
        if self.method.is_none() {
            self.method = Some(method);
        }
        self
    }
}
