//! The canonical paginated-collection shape.
//!
//! ```json
//! { "page_size": 2,
//!   "_embedded": { "users": [ ... ] },
//!   "_links": { "first": {"href": "..."}, "self": {"href": "..."}, "next": {"href": "..."} } }
//! ```
//!
//! Envelopes returned by the API and envelopes assembled locally by the loop
//! and limitless strategies have exactly this shape.

use convokit_schema::{Schema, ViolationCode, Violations};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
}

impl Link {
    pub fn new(href: impl Into<String>) -> Self {
        Self { href: href.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Links {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<Link>,
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<Link>,
}

/// Typed view of a list envelope. The collection key is not part of the type;
/// it is supplied when decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct ListEnvelope<T> {
    pub page_size: u64,
    pub collection_key: String,
    pub items: Vec<T>,
    pub links: Links,
}

impl<T> ListEnvelope<T> {
    #[must_use]
    pub fn next_href(&self) -> Option<&str> {
        self.links.next.as_ref().map(|l| l.href.as_str())
    }
}

impl<T: serde::de::DeserializeOwned> ListEnvelope<T> {
    /// Decode an envelope whose items live under `_embedded.<collection_key>`.
    ///
    /// # Errors
    /// A violation at `_embedded.<collection_key>` when the key is missing,
    /// and deserialize violations for anything that does not fit.
    pub fn from_value(value: &Value, collection_key: &str) -> Result<Self, Violations> {
        let raw = embedded_items(value, collection_key)?;
        let items = raw
            .iter()
            .map(|item| serde_json::from_value(item.clone()))
            .collect::<Result<Vec<T>, _>>()
            .map_err(|e| Violations::from_deserialize(&e))?;
        let links = value
            .get("_links")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| Violations::from_deserialize(&e))?
            .unwrap_or_default();
        let page_size = value
            .get("page_size")
            .and_then(Value::as_u64)
            .unwrap_or(items.len() as u64);
        Ok(Self {
            page_size,
            collection_key: collection_key.to_owned(),
            items,
            links,
        })
    }
}

impl<T: Serialize> ListEnvelope<T> {
    /// Wire form of the envelope.
    ///
    /// # Errors
    /// Only if an item fails to serialize.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        let items = self
            .items
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(synthesize(&self.collection_key, items, self.links.clone()))
    }
}

/// Borrow the item array under `_embedded.<collection_key>`.
///
/// # Errors
/// A `required` violation when the key is absent, `invalid_type` when it is
/// not an array.
pub fn embedded_items<'v>(
    value: &'v Value,
    collection_key: &str,
) -> Result<&'v Vec<Value>, Violations> {
    let field = format!("_embedded.{collection_key}");
    match value.get("_embedded").and_then(|e| e.get(collection_key)) {
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(Violations::single(field, "expected array", ViolationCode::InvalidType)),
        None => Err(Violations::single(field, "required", ViolationCode::Required)),
    }
}

/// Assemble an envelope value; `page_size` is the item count.
#[must_use]
pub fn synthesize(collection_key: &str, items: Vec<Value>, links: Links) -> Value {
    let page_size = items.len();
    let mut embedded = Map::new();
    embedded.insert(collection_key.to_owned(), Value::Array(items));
    json!({
        "page_size": page_size,
        "_embedded": embedded,
        "_links": links,
    })
}

/// Schema of an envelope with `item` entries under `collection_key`.
/// Unknown top-level keys are kept.
#[must_use]
pub fn list_envelope_schema(collection_key: &str, item: Schema) -> Schema {
    let link = Schema::object([("href", Schema::string())]).passthrough();
    Schema::object([
        ("page_size", Schema::integer().coerce()),
        (
            "_embedded",
            Schema::object([(collection_key, Schema::array(item))]).passthrough(),
        ),
        (
            "_links",
            Schema::object([
                ("first", link.clone().optional()),
                ("self", link.clone().optional()),
                ("next", link.clone().optional()),
                ("prev", link.optional()),
            ])
            .passthrough()
            .optional(),
        ),
    ])
    .passthrough()
}
