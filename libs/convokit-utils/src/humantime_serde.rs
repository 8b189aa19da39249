//! Human-readable `Duration` fields for serde, e.g. `"30s"` or `"1m 30s"`.
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Serialize, Deserialize)]
//! struct Settings {
//!     #[serde(with = "convokit_utils::humantime_serde")]
//!     timeout: Duration,
//! }
//! ```

use std::fmt;
use std::time::Duration;

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};

/// Serialize a `Duration` as a humantime string.
///
/// # Errors
/// Propagates serializer failures.
pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&humantime::format_duration(*value))
}

/// Deserialize a `Duration` from a humantime string.
///
/// # Errors
/// Fails when the input is not a string or not a valid humantime duration.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_str(DurationVisitor)
}

struct DurationVisitor;

impl Visitor<'_> for DurationVisitor {
    type Value = Duration;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a duration such as \"30s\" or \"1m 30s\"")
    }

    fn visit_str<E>(self, v: &str) -> Result<Duration, E>
    where
        E: de::Error,
    {
        humantime::parse_duration(v).map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

/// `Option<Duration>` variant; `null` and missing fields map to `None`.
pub mod option {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// # Errors
    /// Propagates serializer failures.
    #[allow(clippy::ref_option)]
    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.collect_str(&humantime::format_duration(*d)),
            None => serializer.serialize_none(),
        }
    }

    /// # Errors
    /// Fails when a present value is not a valid humantime duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Serialize, Deserialize)]
    struct Timeouts {
        #[serde(with = "super")]
        request: Duration,
        #[serde(with = "super::option", default)]
        idle: Option<Duration>,
    }

    #[test]
    fn parses_and_formats() {
        let t: Timeouts = serde_json::from_str(r#"{"request": "1m 30s", "idle": "5s"}"#).unwrap();
        assert_eq!(t.request, Duration::from_secs(90));
        assert_eq!(t.idle, Some(Duration::from_secs(5)));
        assert_eq!(
            serde_json::to_string(&t).unwrap(),
            r#"{"request":"1m 30s","idle":"5s"}"#
        );
    }

    #[test]
    fn missing_or_null_option_is_none() {
        let t: Timeouts = serde_json::from_str(r#"{"request": "10s"}"#).unwrap();
        assert_eq!(t.idle, None);
        let t: Timeouts = serde_json::from_str(r#"{"request": "10s", "idle": null}"#).unwrap();
        assert_eq!(t.idle, None);
    }

    #[test]
    fn rejects_garbage() {
        let err = serde_json::from_str::<Timeouts>(r#"{"request": "soon"}"#)
            .err()
            .unwrap();
        assert!(err.to_string().contains("duration"));
    }
}
