use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Machine-readable classification of a [`Violation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ViolationCode {
    Required,
    InvalidType,
    InvalidValue,
    TooShort,
    UnknownField,
    NoMatchingVariant,
    Custom,
    Deserialize,
}

impl ViolationCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::InvalidType => "invalid_type",
            Self::InvalidValue => "invalid_value",
            Self::TooShort => "too_short",
            Self::UnknownField => "unknown_field",
            Self::NoMatchingVariant => "no_matching_variant",
            Self::Custom => "custom",
            Self::Deserialize => "deserialize",
        }
    }
}

/// One failed check at one location in the validated value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Dotted field path, e.g. `_embedded.users[3].id`; `(root)` for the value itself.
    pub field: String,
    pub message: String,
    pub code: ViolationCode,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: ViolationCode) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Non-empty list of violations produced by a failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(transparent)]
pub struct Violations(Vec<Violation>);

impl Violations {
    /// Wrap a list of violations. An empty list becomes a single root-level
    /// `custom` violation.
    #[must_use]
    pub fn new(violations: Vec<Violation>) -> Self {
        if violations.is_empty() {
            return Self::single("(root)", "validation failed", ViolationCode::Custom);
        }
        Self(violations)
    }

    #[must_use]
    pub fn single(
        field: impl Into<String>,
        message: impl Into<String>,
        code: ViolationCode,
    ) -> Self {
        Self(vec![Violation::new(field, message, code)])
    }

    /// Violation for a value that passed the schema but could not be decoded
    /// into the caller's Rust type.
    #[must_use]
    pub fn from_deserialize(err: &serde_json::Error) -> Self {
        Self::single("(root)", err.to_string(), ViolationCode::Deserialize)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.0.iter()
    }

    /// Violations reported for exactly `field`.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a Violation> + 'a {
        self.0.iter().filter(move |v| v.field == field)
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Violation> {
        self.0
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid value: ")?;
        for (i, violation) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Violations {
    type Item = &'a Violation;
    type IntoIter = std::slice::Iter<'a, Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn display_lists_every_field() {
        let v = Violations::new(vec![
            Violation::new("name", "required", ViolationCode::Required),
            Violation::new("age", "expected integer, received string", ViolationCode::InvalidType),
        ]);
        assert_eq!(
            v.to_string(),
            "invalid value: name: required; age: expected integer, received string"
        );
    }

    #[test]
    fn empty_list_still_explains_itself() {
        let v = Violations::new(Vec::new());
        assert_eq!(v.len(), 1);
        assert_eq!(v.iter().next().unwrap().code, ViolationCode::Custom);
    }

    #[test]
    fn serializes_as_plain_list() {
        let v = Violations::single(
            "page_size",
            "expected number, received null",
            ViolationCode::InvalidType,
        );
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json[0]["field"], "page_size");
        assert_eq!(json[0]["code"], "invalid_type");
    }
}
