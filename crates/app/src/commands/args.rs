//! Tool argument extraction
//!
//! Arguments arrive as a loose JSON object. Nanosecond timestamps are
//! accepted as integers, integral floats (`1.7e18`) or decimal strings.

use std::fmt::Display;
use std::str::FromStr;

use serde_json::{Map, Value};

pub type Arguments = Map<String, Value>;

/// Required nanosecond argument
pub fn required_nanos(args: &Arguments, key: &str) -> Result<i64, String> {
    optional_nanos(args, key)?.ok_or_else(|| format!("{key} is required"))
}

/// Optional nanosecond argument; `null` counts as absent
pub fn optional_nanos(args: &Arguments, key: &str) -> Result<Option<i64>, String> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => parse_nanos(value)
            .map(Some)
            .ok_or_else(|| format!("{key} must be an integer number of nanoseconds")),
    }
}

/// Optional string argument; empty strings count as absent
pub fn optional_str<'a>(args: &'a Arguments, key: &str) -> Result<Option<&'a str>, String> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim())),
        Some(_) => Err(format!("{key} must be a string")),
    }
}

pub fn required_str<'a>(args: &'a Arguments, key: &str) -> Result<&'a str, String> {
    optional_str(args, key)?.ok_or_else(|| format!("{key} is required"))
}

/// Optional string argument parsed into `T`
pub fn optional_parsed<T>(args: &Arguments, key: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: Display,
{
    optional_str(args, key)?
        .map(|raw| raw.parse::<T>().map_err(|e| format!("{key}: {e}")))
        .transpose()
}

/// Split a comma-separated list, dropping blanks
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

#[allow(clippy::cast_possible_truncation)]
fn parse_nanos(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            let float = n.as_f64()?;
            // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
            (float.is_finite()
                && float.fract() == 0.0
                && float >= i64::MIN as f64
                && float < i64::MAX as f64)
                .then_some(float as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
