//! Tolerant decoding helpers for upstream JSON that mixes strings and numbers.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accepts a string, number or boolean; anything else becomes empty.
pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(text(&Value::deserialize(deserializer)?).unwrap_or_default())
}

/// Like [`string`] but keeps absence (and empty strings) as `None`.
pub fn opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(text(&Value::deserialize(deserializer)?).filter(|value| !value.is_empty()))
}

pub fn opt_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(finite(&value).map(|number| number.round() as i64))
}

pub fn opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(finite(&Value::deserialize(deserializer)?))
}

pub fn u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Ok(to_u32(&Value::deserialize(deserializer)?))
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Numeric reading of a JSON scalar; strings are trimmed and parsed.
pub fn finite(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) if text.trim().is_empty() => 0.0,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        Value::Bool(flag) => f64::from(u8::from(*flag)),
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// [`finite`] with every failure read as zero.
pub fn number(value: &Value) -> f64 {
    finite(value).unwrap_or(0.0)
}

pub fn to_u32(value: &Value) -> u32 {
    let number = number(value);
    if number <= 0.0 {
        0
    } else {
        number.round().min(f64::from(u32::MAX)) as u32
    }
}
