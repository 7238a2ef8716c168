use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;

use super::table::{DataType, Value};

/// Normalize one raw upload value before inference: JSON null, the empty
/// string and the literals "null"/"undefined" collapse to Null, the
/// literals "true"/"false" (any case) become booleans, everything else
/// passes through.
pub fn normalize(raw: &JsonValue) -> Value {
    match raw {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                n.as_f64().map(Value::Real).unwrap_or(Value::Null)
            }
        }
        JsonValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty()
                || trimmed.eq_ignore_ascii_case("null")
                || trimmed.eq_ignore_ascii_case("undefined")
            {
                Value::Null
            } else if trimmed.eq_ignore_ascii_case("true") {
                Value::Bool(true)
            } else if trimmed.eq_ignore_ascii_case("false") {
                Value::Bool(false)
            } else {
                Value::Str(s.clone())
            }
        }
        // Nested structures are opaque to the engine; keep their text.
        other => Value::Str(other.to_string()),
    }
}

/// Infer one column type from its normalized values. First rule unanimous
/// across every non-null value wins; a column with no non-null values is
/// STRING.
pub fn infer_column_type(values: &[Value]) -> DataType {
    let sample: Vec<&Value> = values.iter().filter(|v| !v.is_null()).collect();
    if sample.is_empty() {
        return DataType::String;
    }

    if sample.iter().all(|v| is_boolean_like(v)) {
        DataType::Boolean
    } else if sample.iter().all(|v| is_integer_like(v)) {
        DataType::Integer
    } else if sample.iter().all(|v| is_number_like(v)) {
        DataType::Real
    } else if sample.iter().all(|v| is_date_like(v)) {
        DataType::Date
    } else {
        DataType::String
    }
}

fn is_boolean_like(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        _ => matches!(value.as_number(), Some(n) if n == 0.0 || n == 1.0),
    }
}

fn is_integer_like(value: &Value) -> bool {
    matches!(value.as_number(), Some(n) if n.fract() == 0.0)
}

fn is_number_like(value: &Value) -> bool {
    value.as_number().is_some()
}

fn is_date_like(value: &Value) -> bool {
    match value {
        Value::Str(s) | Value::Date(s) => parse_date_time(s).is_some(),
        _ => false,
    }
}

/// Convert a normalized value to its column's inferred type. Inference
/// already proved every non-null value convertible; a value that still
/// fails becomes Null, never an error.
pub fn coerce(value: Value, data_type: DataType) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match data_type {
        DataType::Boolean => match value {
            Value::Bool(_) => value,
            other => match other.as_number() {
                Some(n) => Value::Bool(n == 1.0),
                None => Value::Null,
            },
        },
        DataType::Integer => match value {
            Value::Int(_) => value,
            other => match other.as_number() {
                Some(n) => Value::Int(n as i64),
                None => Value::Null,
            },
        },
        DataType::Real => match value.as_number() {
            Some(n) => Value::Real(n),
            None => Value::Null,
        },
        DataType::Date => match value {
            Value::Str(s) | Value::Date(s) => Value::Date(s),
            _ => Value::Null,
        },
        DataType::String => match value {
            Value::Str(_) => value,
            other => Value::Str(other.to_string()),
        },
    }
}

/// Parse a calendar date/time from text. Accepts RFC 3339 plus the
/// date formats the upload collaborators actually emit.
pub fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}
