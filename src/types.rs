//! Common GraphQL types

use async_graphql::{Scalar, ScalarType, Value};
use serde::{Deserialize, Deserializer, Serialize};

/// Page size argument (`first` / `last`)
///
/// Accepts any input value so that a limit of the wrong type reaches pagination
/// validation and is reported with its actual type instead of a schema error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageLimit {
    Int(i64),
    /// Whole number that does not fit an `i64`, kept as sent for error messages.
    OutOfRange {
        negative: bool,
        value: serde_json::Number,
    },
    Invalid { kind: String },
}

impl PageLimit {
    fn invalid(kind: &str) -> Self {
        PageLimit::Invalid {
            kind: kind.to_string(),
        }
    }

    /// Interpret a JSON value as a limit argument.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(n) => Self::from_number(n),
            serde_json::Value::String(_) => Self::invalid("string"),
            serde_json::Value::Bool(_) => Self::invalid("boolean"),
            serde_json::Value::Null => Self::invalid("null"),
            serde_json::Value::Array(_) => Self::invalid("list"),
            serde_json::Value::Object(_) => Self::invalid("object"),
        }
    }

    fn from_number(n: &serde_json::Number) -> Self {
        if let Some(i) = n.as_i64() {
            return PageLimit::Int(i);
        }
        if n.as_u64().is_some() {
            return Self::out_of_range(false, n);
        }
        match n.as_f64() {
            Some(f) if f.is_finite() && f.fract() == 0.0 => {
                // i64::MAX as f64 rounds up to 2^63, which is itself out of range
                if f >= i64::MIN as f64 && f < i64::MAX as f64 {
                    PageLimit::Int(f as i64)
                } else {
                    Self::out_of_range(f < 0.0, n)
                }
            }
            _ => Self::invalid("float"),
        }
    }

    fn out_of_range(negative: bool, n: &serde_json::Number) -> Self {
        PageLimit::OutOfRange {
            negative,
            value: n.clone(),
        }
    }
}

impl From<i64> for PageLimit {
    fn from(value: i64) -> Self {
        PageLimit::Int(value)
    }
}

impl From<i32> for PageLimit {
    fn from(value: i32) -> Self {
        PageLimit::Int(i64::from(value))
    }
}

impl<'de> Deserialize<'de> for PageLimit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(PageLimit::from_json(&value))
    }
}

#[Scalar(name = "PageLimit")]
impl ScalarType for PageLimit {
    fn parse(value: Value) -> async_graphql::InputValueResult<Self> {
        let limit = match value {
            Value::Number(n) => PageLimit::from_number(&n),
            Value::String(_) => PageLimit::invalid("string"),
            Value::Boolean(_) => PageLimit::invalid("boolean"),
            Value::Null => PageLimit::invalid("null"),
            Value::Enum(_) => PageLimit::invalid("enum"),
            Value::List(_) => PageLimit::invalid("list"),
            Value::Object(_) => PageLimit::invalid("object"),
            Value::Binary(_) => PageLimit::invalid("binary"),
        };
        Ok(limit)
    }

    fn to_value(&self) -> Value {
        match self {
            PageLimit::Int(n) => Value::from(*n),
            PageLimit::OutOfRange { value, .. } => Value::Number(value.clone()),
            PageLimit::Invalid { .. } => Value::Null,
        }
    }
}

/// Language used for user-facing messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Fr,
}

impl Locale {
    /// Pick a locale from an `Accept-Language` header value.
    ///
    /// Only the first language tag is considered; anything that is not French
    /// falls back to English.
    pub fn from_accept_language(header: &str) -> Self {
        let primary = header
            .split(',')
            .next()
            .and_then(|tag| tag.split(';').next())
            .map(|tag| tag.trim().to_ascii_lowercase())
            .unwrap_or_default();

        if primary == "fr" || primary.starts_with("fr-") {
            Locale::Fr
        } else {
            Locale::En
        }
    }
}
