#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Runtime schemas for JSON payloads.
//!
//! A [`Schema`] is an immutable, cheaply clonable description of an expected
//! shape. Validating a value either yields a *normalized* copy (defaults filled
//! in, documented coercions applied, unknown object keys handled per policy) or
//! a [`Violations`] list naming every offending field.
//!
//! ```
//! use convokit_schema::Schema;
//! use serde_json::json;
//!
//! let user = Schema::object([
//!     ("name", Schema::string().min_len(1)),
//!     ("display_name", Schema::string().optional()),
//!     ("channels", Schema::array(Schema::string()).default(json!([]))),
//! ]);
//!
//! let normalized = user.validate(&json!({"name": "alice"})).unwrap();
//! assert_eq!(normalized, json!({"name": "alice", "channels": []}));
//!
//! let err = user.validate(&json!({"display_name": 7})).unwrap_err();
//! assert_eq!(err.len(), 2);
//! ```

mod schema;
mod validate;
mod violation;

pub use schema::{Schema, SchemaError, UnknownKeys};
pub use violation::{Violation, ViolationCode, Violations};
