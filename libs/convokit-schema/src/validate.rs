use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};

use crate::schema::{Kind, ObjectShape, Schema, UnknownKeys};
use crate::violation::{Violation, ViolationCode, Violations};

enum Segment {
    Key(String),
    Index(usize),
}

#[derive(Default)]
struct Cx {
    path: Vec<Segment>,
    violations: Vec<Violation>,
}

impl Cx {
    fn path(&self) -> String {
        if self.path.is_empty() {
            return "(root)".to_owned();
        }
        let mut out = String::new();
        for segment in &self.path {
            match segment {
                Segment::Key(k) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(k);
                }
                Segment::Index(i) => {
                    out.push('[');
                    out.push_str(&i.to_string());
                    out.push(']');
                }
            }
        }
        out
    }

    fn fail(&mut self, message: impl Into<String>, code: ViolationCode) {
        let field = self.path();
        self.violations.push(Violation::new(field, message, code));
    }

    fn type_error(&mut self, expected: &str, got: &Value) {
        self.fail(
            format!("expected {expected}, received {}", type_of(got)),
            ViolationCode::InvalidType,
        );
    }
}

fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Schema {
    /// Validate `value` and return its normalized form.
    ///
    /// # Errors
    /// Every violation found, with the path of the offending field.
    pub fn validate(&self, value: &Value) -> Result<Value, Violations> {
        let mut cx = Cx::default();
        let out = self.check(Some(value), &mut cx);
        if cx.violations.is_empty() {
            Ok(out.unwrap_or(Value::Null))
        } else {
            Err(Violations::new(cx.violations))
        }
    }

    /// Validate and decode into `T`.
    ///
    /// # Errors
    /// Schema violations, or a single `deserialize` violation when the
    /// normalized value does not fit `T`.
    pub fn parse<T: DeserializeOwned>(&self, value: &Value) -> Result<T, Violations> {
        let normalized = self.validate(value)?;
        serde_json::from_value(normalized).map_err(|e| Violations::from_deserialize(&e))
    }

    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        self.validate(value).is_ok()
    }

    /// `None` in and out means "absent".
    fn check(&self, value: Option<&Value>, cx: &mut Cx) -> Option<Value> {
        let node = &*self.0;
        let value = match value {
            None => {
                if let Some(default) = &node.default {
                    return Some(default.clone());
                }
                if !node.optional && !matches!(node.kind, Kind::Any) {
                    cx.fail("required", ViolationCode::Required);
                }
                return None;
            }
            Some(Value::Null) if node.nullable => return Some(Value::Null),
            Some(v) => v,
        };

        let before = cx.violations.len();
        let out = check_kind(&node.kind, value, cx)?;
        if cx.violations.len() > before {
            return None;
        }
        for check in &node.checks {
            if let Err(message) = check(&out) {
                cx.fail(message, ViolationCode::Custom);
            }
        }
        Some(out)
    }
}

fn check_kind(kind: &Kind, value: &Value, cx: &mut Cx) -> Option<Value> {
    match kind {
        Kind::Any => Some(value.clone()),
        Kind::Bool => {
            if value.is_boolean() {
                Some(value.clone())
            } else {
                cx.type_error("boolean", value);
                None
            }
        }
        Kind::Integer { coerce } => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
            Value::String(s) if *coerce => {
                if let Ok(i) = s.trim().parse::<i64>() {
                    Some(Value::from(i))
                } else {
                    cx.fail(
                        format!("expected integer, received \"{s}\""),
                        ViolationCode::InvalidValue,
                    );
                    None
                }
            }
            other => {
                cx.type_error("integer", other);
                None
            }
        },
        Kind::Number { coerce } => match value {
            Value::Number(_) => Some(value.clone()),
            Value::String(s) if *coerce => {
                let parsed = s.trim().parse::<i64>().map(Value::from).ok().or_else(|| {
                    s.trim()
                        .parse::<f64>()
                        .ok()
                        .and_then(Number::from_f64)
                        .map(Value::Number)
                });
                if parsed.is_none() {
                    cx.fail(
                        format!("expected number, received \"{s}\""),
                        ViolationCode::InvalidValue,
                    );
                }
                parsed
            }
            other => {
                cx.type_error("number", other);
                None
            }
        },
        Kind::String { coerce, min_len } => {
            let s = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) if *coerce => n.to_string(),
                Value::Bool(b) if *coerce => b.to_string(),
                other => {
                    cx.type_error("string", other);
                    return None;
                }
            };
            if let Some(min) = min_len
                && s.chars().count() < *min
            {
                cx.fail(
                    format!("must contain at least {min} character(s)"),
                    ViolationCode::TooShort,
                );
                return None;
            }
            Some(Value::String(s))
        }
        Kind::Timestamp => check_timestamp(value, cx),
        Kind::Literal(expected) => {
            if value == expected {
                Some(value.clone())
            } else {
                cx.fail(
                    format!("expected {expected}, received {value}"),
                    ViolationCode::InvalidValue,
                );
                None
            }
        }
        Kind::OneOf(options) => match value {
            Value::String(s) if options.iter().any(|o| o == s) => Some(value.clone()),
            Value::String(s) => {
                cx.fail(
                    format!("expected one of [{}], received \"{s}\"", options.join(", ")),
                    ViolationCode::InvalidValue,
                );
                None
            }
            other => {
                cx.type_error("string", other);
                None
            }
        },
        Kind::Array { item, min_len } => {
            let Value::Array(items) = value else {
                cx.type_error("array", value);
                return None;
            };
            if let Some(min) = min_len
                && items.len() < *min
            {
                cx.fail(format!("must contain at least {min} item(s)"), ViolationCode::TooShort);
            }
            let mut out = Vec::with_capacity(items.len());
            for (i, element) in items.iter().enumerate() {
                cx.path.push(Segment::Index(i));
                out.push(item.check(Some(element), cx).unwrap_or(Value::Null));
                cx.path.pop();
            }
            Some(Value::Array(out))
        }
        Kind::Object(shape) => {
            let Value::Object(map) = value else {
                cx.type_error("object", value);
                return None;
            };
            Some(Value::Object(check_object(shape, map, cx)))
        }
        Kind::Record(values) => {
            let Value::Object(map) = value else {
                cx.type_error("object", value);
                return None;
            };
            let mut out = Map::with_capacity(map.len());
            for (key, v) in map {
                cx.path.push(Segment::Key(key.clone()));
                if let Some(checked) = values.check(Some(v), cx) {
                    out.insert(key.clone(), checked);
                }
                cx.path.pop();
            }
            Some(Value::Object(out))
        }
        Kind::Union(variants) => check_union(variants, value, cx),
    }
}

fn check_object(shape: &ObjectShape, map: &Map<String, Value>, cx: &mut Cx) -> Map<String, Value> {
    let mut out = Map::with_capacity(shape.fields.len());
    for (name, schema) in &shape.fields {
        cx.path.push(Segment::Key(name.clone()));
        if let Some(checked) = schema.check(map.get(name), cx) {
            out.insert(name.clone(), checked);
        }
        cx.path.pop();
    }

    for (key, v) in map {
        if shape.fields.iter().any(|(n, _)| n == key) {
            continue;
        }
        match shape.unknown {
            UnknownKeys::Strip => {}
            UnknownKeys::Passthrough => {
                out.insert(key.clone(), v.clone());
            }
            UnknownKeys::Reject => {
                cx.path.push(Segment::Key(key.clone()));
                cx.fail("unknown field", ViolationCode::UnknownField);
                cx.path.pop();
            }
        }
    }
    out
}

fn check_union(variants: &[Schema], value: &Value, cx: &mut Cx) -> Option<Value> {
    let mut reasons = Vec::new();
    for variant in variants {
        let mut sub = Cx::default();
        let out = variant.check(Some(value), &mut sub);
        if sub.violations.is_empty() {
            return out;
        }
        if let Some(first) = sub.violations.first() {
            reasons.push(first.to_string());
        }
    }
    cx.fail(
        format!("no variant matched ({})", reasons.join(" | ")),
        ViolationCode::NoMatchingVariant,
    );
    None
}

fn check_timestamp(value: &Value, cx: &mut Cx) -> Option<Value> {
    let parsed: Option<DateTime<Utc>> = match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        other => {
            cx.type_error("timestamp", other);
            return None;
        }
    };
    if let Some(dt) = parsed {
        Some(Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
    } else {
        cx.fail(format!("expected timestamp, received {value}"), ViolationCode::InvalidValue);
        None
    }
}
