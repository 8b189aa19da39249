//! Schema definition and composition

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

/// What an object schema does with keys it does not declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownKeys {
    /// Drop them from the normalized output.
    #[default]
    Strip,
    /// Copy them to the output untouched.
    Passthrough,
    /// Report each one as a violation.
    Reject,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaError {
    #[error("{operation} requires an object schema, got {kind}")]
    NotAnObject {
        operation: &'static str,
        kind: &'static str,
    },
}

pub(crate) type Check = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

#[derive(Clone)]
pub(crate) enum Kind {
    Any,
    Bool,
    Integer { coerce: bool },
    Number { coerce: bool },
    String { coerce: bool, min_len: Option<usize> },
    Timestamp,
    Literal(Value),
    OneOf(Vec<String>),
    Array { item: Schema, min_len: Option<usize> },
    Object(ObjectShape),
    Record(Schema),
    Union(Vec<Schema>),
}

impl Kind {
    pub(crate) const fn name(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Bool => "boolean",
            Self::Integer { .. } => "integer",
            Self::Number { .. } => "number",
            Self::String { .. } => "string",
            Self::Timestamp => "timestamp",
            Self::Literal(_) => "literal",
            Self::OneOf(_) => "enum",
            Self::Array { .. } => "array",
            Self::Object(_) => "object",
            Self::Record(_) => "record",
            Self::Union(_) => "union",
        }
    }
}

#[derive(Clone, Default)]
pub(crate) struct ObjectShape {
    pub(crate) fields: Vec<(String, Schema)>,
    pub(crate) unknown: UnknownKeys,
}

impl ObjectShape {
    fn upsert(&mut self, name: String, schema: Schema) {
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = schema,
            None => self.fields.push((name, schema)),
        }
    }
}

#[derive(Clone)]
pub(crate) struct Node {
    pub(crate) kind: Kind,
    pub(crate) optional: bool,
    pub(crate) nullable: bool,
    pub(crate) default: Option<Value>,
    pub(crate) checks: Vec<Check>,
}

/// Immutable description of an expected JSON shape.
///
/// Cloning is a reference-count bump; modifiers such as [`optional`](Self::optional)
/// return a new schema and leave the original untouched.
#[derive(Clone)]
pub struct Schema(pub(crate) Arc<Node>);

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = &*self.0;
        let mut s = f.debug_struct("Schema");
        s.field("kind", &node.kind.name())
            .field("optional", &node.optional)
            .field("nullable", &node.nullable)
            .field("default", &node.default)
            .field("checks", &node.checks.len());
        if let Kind::Object(shape) = &node.kind {
            let names: Vec<&str> = shape.fields.iter().map(|(n, _)| n.as_str()).collect();
            s.field("fields", &names);
        }
        s.finish()
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::any()
    }
}

impl Schema {
    fn of(kind: Kind) -> Self {
        Self(Arc::new(Node {
            kind,
            optional: false,
            nullable: false,
            default: None,
            checks: Vec::new(),
        }))
    }

    fn edit(self, f: impl FnOnce(&mut Node)) -> Self {
        let mut node = Arc::unwrap_or_clone(self.0);
        f(&mut node);
        Self(Arc::new(node))
    }

    /// Wildcard: accepts every value (and absence) unchanged.
    #[must_use]
    pub fn any() -> Self {
        Self::of(Kind::Any)
    }

    #[must_use]
    pub fn bool() -> Self {
        Self::of(Kind::Bool)
    }

    #[must_use]
    pub fn integer() -> Self {
        Self::of(Kind::Integer { coerce: false })
    }

    #[must_use]
    pub fn number() -> Self {
        Self::of(Kind::Number { coerce: false })
    }

    #[must_use]
    pub fn string() -> Self {
        Self::of(Kind::String {
            coerce: false,
            min_len: None,
        })
    }

    /// Point in time given as an RFC 3339 string or as epoch milliseconds.
    /// Normalized to an RFC 3339 UTC string.
    #[must_use]
    pub fn timestamp() -> Self {
        Self::of(Kind::Timestamp)
    }

    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::of(Kind::Literal(value.into()))
    }

    /// String restricted to a fixed set of options.
    #[must_use]
    pub fn one_of<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::of(Kind::OneOf(options.into_iter().map(Into::into).collect()))
    }

    #[must_use]
    pub fn array(item: Schema) -> Self {
        Self::of(Kind::Array {
            item,
            min_len: None,
        })
    }

    /// Object with the given fields, validated in declaration order.
    #[must_use]
    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Schema)>,
        K: Into<String>,
    {
        let mut shape = ObjectShape::default();
        for (name, schema) in fields {
            shape.upsert(name.into(), schema);
        }
        Self::of(Kind::Object(shape))
    }

    /// Object with arbitrary keys whose values all match `values`.
    #[must_use]
    pub fn record(values: Schema) -> Self {
        Self::of(Kind::Record(values))
    }

    /// First variant that validates wins.
    #[must_use]
    pub fn union<I>(variants: I) -> Self
    where
        I: IntoIterator<Item = Schema>,
    {
        Self::of(Kind::Union(variants.into_iter().collect()))
    }

    /// Absence is accepted and leaves the field out of the output.
    #[must_use]
    pub fn optional(self) -> Self {
        self.edit(|n| n.optional = true)
    }

    /// Explicit `null` is accepted and preserved.
    #[must_use]
    pub fn nullable(self) -> Self {
        self.edit(|n| n.nullable = true)
    }

    /// Value substituted when the field is absent.
    #[must_use]
    pub fn default(self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.edit(|n| n.default = Some(value))
    }

    /// Enable lossless coercion: numeric strings for integers and numbers,
    /// numbers and booleans for strings. No effect on other kinds.
    #[must_use]
    pub fn coerce(self) -> Self {
        self.edit(|n| match &mut n.kind {
            Kind::Integer { coerce } | Kind::Number { coerce } | Kind::String { coerce, .. } => {
                *coerce = true;
            }
            _ => {}
        })
    }

    /// Minimum length for strings (in characters) and arrays.
    #[must_use]
    pub fn min_len(self, len: usize) -> Self {
        self.edit(|n| match &mut n.kind {
            Kind::String { min_len, .. } | Kind::Array { min_len, .. } => *min_len = Some(len),
            _ => {}
        })
    }

    /// Extra check run on the normalized value; `Err` carries the message.
    #[must_use]
    pub fn refine<F>(self, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.edit(|n| n.checks.push(Arc::new(check)))
    }

    #[must_use]
    pub fn unknown_keys(self, policy: UnknownKeys) -> Self {
        self.edit(|n| {
            if let Kind::Object(shape) = &mut n.kind {
                shape.unknown = policy;
            }
        })
    }

    #[must_use]
    pub fn passthrough(self) -> Self {
        self.unknown_keys(UnknownKeys::Passthrough)
    }

    #[must_use]
    pub fn strict(self) -> Self {
        self.unknown_keys(UnknownKeys::Reject)
    }

    #[must_use]
    pub fn is_any(&self) -> bool {
        matches!(self.0.kind, Kind::Any)
    }

    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self.0.kind, Kind::Object(_))
    }

    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.0.optional
    }

    /// Schema of a declared object field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Schema> {
        match &self.0.kind {
            Kind::Object(shape) => shape.fields.iter().find(|(n, _)| n == name).map(|(_, s)| s),
            _ => None,
        }
    }

    /// Declared object field names, in validation order.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        match &self.0.kind {
            Kind::Object(shape) => shape.fields.iter().map(|(n, _)| n.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    fn shape(&self, operation: &'static str) -> Result<&ObjectShape, SchemaError> {
        match &self.0.kind {
            Kind::Object(shape) => Ok(shape),
            other => Err(SchemaError::NotAnObject {
                operation,
                kind: other.name(),
            }),
        }
    }

    fn with_shape(&self, shape: ObjectShape) -> Self {
        let node = Node {
            kind: Kind::Object(shape),
            ..(*self.0).clone()
        };
        Self(Arc::new(node))
    }

    /// Union of both field sets; fields of `other` replace same-named ones and
    /// its unknown-key policy wins.
    ///
    /// # Errors
    /// [`SchemaError::NotAnObject`] when either side is not an object schema.
    pub fn merge(&self, other: &Schema) -> Result<Self, SchemaError> {
        let mut shape = self.shape("merge")?.clone();
        let theirs = other.shape("merge")?;
        for (name, schema) in &theirs.fields {
            shape.upsert(name.clone(), schema.clone());
        }
        shape.unknown = theirs.unknown;
        Ok(self.with_shape(shape))
    }

    /// Every field becomes optional. Defaults are kept.
    ///
    /// # Errors
    /// [`SchemaError::NotAnObject`] when this is not an object schema.
    pub fn partial(&self) -> Result<Self, SchemaError> {
        let mut shape = self.shape("partial")?.clone();
        for (_, schema) in &mut shape.fields {
            *schema = schema.clone().optional();
        }
        Ok(self.with_shape(shape))
    }

    /// Drop the named fields.
    ///
    /// # Errors
    /// [`SchemaError::NotAnObject`] when this is not an object schema.
    pub fn omit(&self, names: &[&str]) -> Result<Self, SchemaError> {
        let mut shape = self.shape("omit")?.clone();
        shape.fields.retain(|(n, _)| !names.contains(&n.as_str()));
        Ok(self.with_shape(shape))
    }

    /// Add or replace a single field.
    ///
    /// # Errors
    /// [`SchemaError::NotAnObject`] when this is not an object schema.
    pub fn extend(&self, name: impl Into<String>, schema: Schema) -> Result<Self, SchemaError> {
        let mut shape = self.shape("extend")?.clone();
        shape.upsert(name.into(), schema);
        Ok(self.with_shape(shape))
    }
}
