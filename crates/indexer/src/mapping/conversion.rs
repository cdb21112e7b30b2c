//! Conversion between host types and document field types.
//!
//! [`detect`] picks the canonical document type for a host type when a field
//! does not override it. [`convert`] coerces a value read back from the index
//! into the shape the host type deserializes from. Conversion never fails
//! loudly: values that cannot be coerced yield `None` and a warning.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Number, Value};
use tracing::warn;

use crate::model::HostType;

/// Digit count of a 64-bit epoch-millisecond timestamp in the current era.
pub const EPOCH_MILLIS_DIGITS: usize = 13;

/// Canonical document field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalType {
    String,
    Integer,
    Short,
    Long,
    Float,
    Double,
    Byte,
    Boolean,
    Date,
}

impl CanonicalType {
    /// Schema name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalType::String => "string",
            CanonicalType::Integer => "integer",
            CanonicalType::Short => "short",
            CanonicalType::Long => "long",
            CanonicalType::Float => "float",
            CanonicalType::Double => "double",
            CanonicalType::Byte => "byte",
            CanonicalType::Boolean => "boolean",
            CanonicalType::Date => "date",
        }
    }
}

impl std::fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a host type to its canonical document type.
///
/// Unrecognized types (including structured and multi-valued ones) map to
/// [`CanonicalType::String`].
pub fn detect(host_type: &HostType) -> CanonicalType {
    match host_type {
        HostType::I32 => CanonicalType::Integer,
        HostType::I16 => CanonicalType::Short,
        HostType::I64 => CanonicalType::Long,
        HostType::F32 => CanonicalType::Float,
        HostType::F64 => CanonicalType::Double,
        HostType::I8 => CanonicalType::Byte,
        HostType::Bool => CanonicalType::Boolean,
        HostType::Date => CanonicalType::Date,
        HostType::String
        | HostType::Char
        | HostType::Other(_)
        | HostType::Object(_)
        | HostType::List(_) => CanonicalType::String,
    }
}

/// Coerces a raw index value into the value tree for `target`.
///
/// Returns `None` when the value cannot represent the target type; the
/// caller leaves the field unset.
pub fn convert(raw: &Value, target: &HostType) -> Option<Value> {
    if raw.is_null() {
        return None;
    }

    let converted = match target {
        HostType::String => match raw {
            Value::String(s) => Some(Value::String(s.clone())),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        HostType::Char => text_of(raw)
            .and_then(|s| s.chars().next())
            .map(|c| Value::String(c.to_string())),
        HostType::I8 => integer_in_range(raw, i8::MIN as i64, i8::MAX as i64),
        HostType::I16 => integer_in_range(raw, i16::MIN as i64, i16::MAX as i64),
        HostType::I32 => integer_in_range(raw, i32::MIN as i64, i32::MAX as i64),
        HostType::I64 => integer_in_range(raw, i64::MIN, i64::MAX),
        HostType::F32 | HostType::F64 => float_of(raw),
        HostType::Bool => match raw {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Some(Value::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Some(Value::Bool(false)),
            _ => None,
        },
        HostType::Date => return convert_date(raw),
        HostType::Other(_) => Some(raw.clone()),
        HostType::Object(_) | HostType::List(_) => None,
    };

    if converted.is_none() {
        warn!(
            value = %raw,
            host_type = %target.name(),
            "Cannot convert stored value, leaving field unset"
        );
    }
    converted
}

/// Parses a stored date into an RFC 3339 string.
///
/// A 13-digit numeric string (or a JSON number) is read as epoch
/// milliseconds; anything else goes through the structured parsers.
pub fn convert_date(raw: &Value) -> Option<Value> {
    let parsed = match raw {
        Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        Value::String(s) => parse_date_string(s),
        _ => None,
    };

    match parsed {
        Some(date) => Some(Value::String(
            date.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        )),
        None => {
            warn!(value = %raw, "Unparsable date value, leaving field unset");
            None
        }
    }
}

fn parse_date_string(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.len() == EPOCH_MILLIS_DIGITS && s.bytes().all(|b| b.is_ascii_digit()) {
        return s
            .parse::<i64>()
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis);
    }

    if let Ok(date) = DateTime::parse_from_rfc3339(s) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn text_of(raw: &Value) -> Option<&str> {
    match raw {
        Value::String(s) => Some(s.as_str()),
        _ => None,
    }
}

fn integer_in_range(raw: &Value, min: i64, max: i64) -> Option<Value> {
    let value = match raw {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }?;

    (min..=max)
        .contains(&value)
        .then(|| Value::Number(Number::from(value)))
}

fn float_of(raw: &Value) -> Option<Value> {
    let value = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    Number::from_f64(value).map(Value::Number)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_detect_scalars() {
        assert_eq!(detect(&HostType::String), CanonicalType::String);
        assert_eq!(detect(&HostType::I32), CanonicalType::Integer);
        assert_eq!(detect(&HostType::I16), CanonicalType::Short);
        assert_eq!(detect(&HostType::I64), CanonicalType::Long);
        assert_eq!(detect(&HostType::F32), CanonicalType::Float);
        assert_eq!(detect(&HostType::F64), CanonicalType::Double);
        assert_eq!(detect(&HostType::I8), CanonicalType::Byte);
        assert_eq!(detect(&HostType::Bool), CanonicalType::Boolean);
        assert_eq!(detect(&HostType::Date), CanonicalType::Date);
    }

    #[test]
    fn test_detect_unknown_defaults_to_string() {
        assert_eq!(detect(&HostType::Other("Uuid")), CanonicalType::String);
        assert_eq!(detect(&HostType::Char), CanonicalType::String);
        assert_eq!(detect(&HostType::list(HostType::I64)), CanonicalType::String);
    }

    #[test]
    fn test_convert_numbers() {
        assert_eq!(convert(&json!(42), &HostType::I32), Some(json!(42)));
        assert_eq!(convert(&json!("42"), &HostType::I64), Some(json!(42)));
        assert_eq!(convert(&json!(42.0), &HostType::I16), Some(json!(42)));
        assert_eq!(convert(&json!(300), &HostType::I8), None);
        assert_eq!(convert(&json!(1.5), &HostType::I32), None);
        assert_eq!(convert(&json!("2.5"), &HostType::F64), Some(json!(2.5)));
        assert_eq!(convert(&json!(3), &HostType::F32), Some(json!(3.0)));
    }

    #[test]
    fn test_convert_strings_and_bools() {
        assert_eq!(convert(&json!("abc"), &HostType::String), Some(json!("abc")));
        assert_eq!(convert(&json!(12), &HostType::String), Some(json!("12")));
        assert_eq!(convert(&json!("xyz"), &HostType::Char), Some(json!("x")));
        assert_eq!(convert(&json!(true), &HostType::Bool), Some(json!(true)));
        assert_eq!(convert(&json!("FALSE"), &HostType::Bool), Some(json!(false)));
        assert_eq!(convert(&json!("maybe"), &HostType::Bool), None);
        assert_eq!(convert(&Value::Null, &HostType::String), None);
    }

    #[test]
    fn test_convert_date_epoch_millis_string() {
        let converted = convert(&json!("1700000000000"), &HostType::Date).unwrap();
        assert_eq!(converted, json!("2023-11-14T22:13:20Z"));
    }

    #[test]
    fn test_convert_date_epoch_millis_number() {
        let converted = convert(&json!(1700000000000_i64), &HostType::Date).unwrap();
        assert_eq!(converted, json!("2023-11-14T22:13:20Z"));
    }

    #[test]
    fn test_convert_date_structured() {
        assert_eq!(
            convert(&json!("2024-03-01T10:15:30.250+02:00"), &HostType::Date),
            Some(json!("2024-03-01T08:15:30.250Z"))
        );
        assert_eq!(
            convert(&json!("2024-03-01T10:15:30"), &HostType::Date),
            Some(json!("2024-03-01T10:15:30Z"))
        );
        assert_eq!(
            convert(&json!("2024-03-01"), &HostType::Date),
            Some(json!("2024-03-01T00:00:00Z"))
        );
    }

    #[test]
    fn test_convert_date_non_thirteen_digit_string_is_structured() {
        // 12 digits: not the epoch-millis fast path, and not a valid date either
        assert_eq!(convert(&json!("170000000000"), &HostType::Date), None);
    }

    #[test]
    fn test_convert_date_unparsable_yields_none() {
        assert_eq!(convert(&json!("last tuesday"), &HostType::Date), None);
        assert_eq!(convert(&json!(true), &HostType::Date), None);
    }

    #[test]
    fn test_convert_date_round_trips_chrono() {
        let now = Utc::now();
        let raw = serde_json::to_value(now).unwrap();
        let converted = convert(&raw, &HostType::Date).unwrap();
        let back: DateTime<Utc> = serde_json::from_value(converted).unwrap();
        assert_eq!(back, now);
    }
}
