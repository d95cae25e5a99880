//! Coercions for fields the backend does not type consistently.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Whole number from a JSON number or numeric string. Fractional values
/// are rejected.
pub(crate) fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Any finite number or numeric string, truncated toward zero
fn as_truncated(value: &Value) -> Option<i64> {
    let f = match value {
        Value::Number(n) => return n.as_i64().or_else(|| n.as_f64().and_then(truncate)),
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    truncate(f)
}

fn truncate(f: f64) -> Option<i64> {
    // `as` saturates; keep only values that fit
    (f.is_finite() && f.abs() < i64::MAX as f64).then(|| f.trunc() as i64)
}

/// `Option<i64>` that tolerates null, floats and numeric strings.
/// Anything else becomes `None` instead of failing the whole record.
pub(crate) fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(as_truncated))
}

/// `bool` that tolerates null (false), 0/1 and "true"/"false" strings
pub(crate) fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    })
}
