//! Timeseries response decoding
//!
//! Both query paths return `{results: [{query: {name}, datapoints: [...]}]}`
//! but disagree on how a datapoint's timestamp is written. The cluster
//! management API sends `timestampNanos` as a decimal string; the timeseries
//! endpoint sends `timestamp_nanos` as a JSON integer. [`decode`] accepts
//! either spelling and either representation on both wires and always
//! yields `i64` nanoseconds.
//!
//! Unknown fields are ignored. A `null` array is treated as empty; a
//! missing one is an error naming the field path.

use cockroach_mcp_domain::{Datapoint, TimeseriesQueryResult, TimeseriesSeries};
use serde_json::{Map, Value};
use thiserror::Error;

/// Which endpoint produced the body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wire {
    /// Cluster management API (`timestampNanos`, decimal string)
    ClusterApi,
    /// Timeseries endpoint (`timestamp_nanos`, integer)
    Tsdb,
}

impl Wire {
    /// Timestamp keys in lookup order
    const fn timestamp_keys(self) -> [&'static str; 2] {
        match self {
            Self::ClusterApi => ["timestampNanos", "timestamp_nanos"],
            Self::Tsdb => ["timestamp_nanos", "timestampNanos"],
        }
    }
}

/// Response body did not match the expected shape
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Syntax(String),

    #[error("missing field `{path}`")]
    MissingField { path: String },

    #[error("invalid field `{path}`: expected {expected}")]
    InvalidField { path: String, expected: &'static str },
}

impl DecodeError {
    /// Field path the error refers to, if any
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Syntax(_) => None,
            Self::MissingField { path } | Self::InvalidField { path, .. } => Some(path),
        }
    }
}

/// Decode a timeseries response body
pub fn decode(raw: &[u8], wire: Wire) -> Result<TimeseriesQueryResult, DecodeError> {
    let root: Value = serde_json::from_slice(raw).map_err(|e| DecodeError::Syntax(e.to_string()))?;
    decode_value(&root, wire)
}

/// Decode an already parsed response body
fn decode_value(root: &Value, wire: Wire) -> Result<TimeseriesQueryResult, DecodeError> {
    let root = as_object(root, "$")?;
    let results = array_field(root, "results", "results")?;

    let series = results
        .iter()
        .enumerate()
        .map(|(i, result)| decode_series(result, &format!("results[{i}]"), wire))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TimeseriesQueryResult { series })
}

fn decode_series(value: &Value, path: &str, wire: Wire) -> Result<TimeseriesSeries, DecodeError> {
    let result = as_object(value, path)?;

    let query_path = format!("{path}.query");
    let query = as_object(required(result, "query", &query_path)?, &query_path)?;
    let name_path = format!("{query_path}.name");
    let query_name = required(query, "name", &name_path)?
        .as_str()
        .ok_or_else(|| invalid(&name_path, "a string"))?
        .to_string();

    let datapoints_path = format!("{path}.datapoints");
    let datapoints = array_field(result, "datapoints", &datapoints_path)?
        .iter()
        .enumerate()
        .map(|(j, point)| decode_datapoint(point, &format!("{datapoints_path}[{j}]"), wire))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TimeseriesSeries { query_name, datapoints })
}

fn decode_datapoint(value: &Value, path: &str, wire: Wire) -> Result<Datapoint, DecodeError> {
    let point = as_object(value, path)?;

    let [primary, alternate] = wire.timestamp_keys();
    let (key, raw_ts) = match (point.get(primary), point.get(alternate)) {
        (Some(ts), _) if !ts.is_null() => (primary, ts),
        (_, Some(ts)) if !ts.is_null() => (alternate, ts),
        _ => return Err(DecodeError::MissingField { path: format!("{path}.{primary}") }),
    };
    let timestamp_nanos = parse_nanos(raw_ts).ok_or_else(|| {
        invalid(&format!("{path}.{key}"), "integer nanoseconds as a number or decimal string")
    })?;

    let value_path = format!("{path}.value");
    let value = required(point, "value", &value_path)?
        .as_f64()
        .ok_or_else(|| invalid(&value_path, "a number"))?;

    Ok(Datapoint { timestamp_nanos, value })
}

/// Accepts `1500` and `"1500"`; rejects fractions and out-of-range values
fn parse_nanos(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, DecodeError> {
    value.as_object().ok_or_else(|| invalid(path, "an object"))
}

fn required<'a>(
    object: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a Value, DecodeError> {
    match object.get(key) {
        Some(Value::Null) | None => Err(DecodeError::MissingField { path: path.to_string() }),
        Some(value) => Ok(value),
    }
}

fn array_field<'a>(
    object: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a [Value], DecodeError> {
    match object.get(key) {
        None => Err(DecodeError::MissingField { path: path.to_string() }),
        Some(Value::Null) => Ok(&[][..]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(invalid(path, "an array")),
    }
}

fn invalid(path: &str, expected: &'static str) -> DecodeError {
    DecodeError::InvalidField { path: path.to_string(), expected }
}
