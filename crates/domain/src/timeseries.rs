//! Timeseries query model
//!
//! These types describe a timeseries query independently of the endpoint it
//! is sent to. The HTTP clients translate them into their wire shapes and
//! every response is normalized back into [`TimeseriesQueryResult`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::DEFAULT_SAMPLE_NANOS;

/// Aggregation applied when downsampling or when combining sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregator {
    Sum,
    Avg,
    Min,
    Max,
    First,
    Last,
    Variance,
}

impl Aggregator {
    /// Lowercase name used by the timeseries endpoint
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::First => "first",
            Self::Last => "last",
            Self::Variance => "variance",
        }
    }

    /// Enum name used by the cluster management API
    pub const fn proto_name(self) -> &'static str {
        match self {
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::First => "FIRST",
            Self::Last => "LAST",
            Self::Variance => "VARIANCE",
        }
    }
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregator {
    type Err = QuerySpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(Self::Sum),
            "avg" => Ok(Self::Avg),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            "variance" => Ok(Self::Variance),
            other => Err(QuerySpecError::UnknownAggregator(other.to_string())),
        }
    }
}

/// Whether values are raw samples or a rate of change between samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DerivativeMode {
    #[default]
    None,
    Derivative,
    NonNegativeDerivative,
}

impl DerivativeMode {
    /// Name used by the timeseries endpoint
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Derivative => "derivative",
            Self::NonNegativeDerivative => "non-negative-derivative",
        }
    }

    /// Enum name used by the cluster management API
    pub const fn proto_name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Derivative => "DERIVATIVE",
            Self::NonNegativeDerivative => "NON_NEGATIVE_DERIVATIVE",
        }
    }
}

impl fmt::Display for DerivativeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DerivativeMode {
    type Err = QuerySpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "none" => Ok(Self::None),
            "derivative" => Ok(Self::Derivative),
            "non-negative-derivative" => Ok(Self::NonNegativeDerivative),
            other => Err(QuerySpecError::UnknownDerivative(other.to_string())),
        }
    }
}

/// Validation failures for timeseries queries
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuerySpecError {
    #[error("start ({start}) must be before end ({end})")]
    InvalidRange { start: i64, end: i64 },

    #[error("sample period must be positive, got {0}")]
    InvalidSample(i64),

    #[error("at least one query is required")]
    NoQueries,

    #[error("query name must not be empty")]
    EmptyName,

    #[error("query '{0}' has no sources")]
    NoSources(String),

    #[error("unknown aggregator '{0}'")]
    UnknownAggregator(String),

    #[error("unknown derivative mode '{0}'")]
    UnknownDerivative(String),
}

/// One named metric query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricQuery {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downsampler: Option<Aggregator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_aggregator: Option<Aggregator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivative: Option<DerivativeMode>,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl MetricQuery {
    /// Query a metric across all sources with server defaults
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            downsampler: None,
            source_aggregator: None,
            derivative: None,
            sources: Vec::new(),
        }
    }

    /// Sum per bucket and across sources, no derivative
    pub fn summed(name: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            name: name.into(),
            downsampler: Some(Aggregator::Sum),
            source_aggregator: Some(Aggregator::Sum),
            derivative: Some(DerivativeMode::None),
            sources,
        }
    }

    pub fn downsampler(mut self, aggregator: Aggregator) -> Self {
        self.downsampler = Some(aggregator);
        self
    }

    pub fn source_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.source_aggregator = Some(aggregator);
        self
    }

    pub fn derivative(mut self, mode: DerivativeMode) -> Self {
        self.derivative = Some(mode);
        self
    }

    pub fn sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }
}

/// A validated timeseries query
///
/// Fields are private; the only way to obtain a spec is
/// [`TimeseriesQuerySpec::new`], which enforces `start < end`, a positive
/// sample period and at least one named query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeseriesQuerySpec {
    start_nanos: i64,
    end_nanos: i64,
    sample_nanos: i64,
    queries: Vec<MetricQuery>,
}

impl TimeseriesQuerySpec {
    pub fn new(
        start_nanos: i64,
        end_nanos: i64,
        sample_nanos: i64,
        queries: Vec<MetricQuery>,
    ) -> Result<Self, QuerySpecError> {
        if start_nanos >= end_nanos {
            return Err(QuerySpecError::InvalidRange { start: start_nanos, end: end_nanos });
        }
        if sample_nanos <= 0 {
            return Err(QuerySpecError::InvalidSample(sample_nanos));
        }
        if queries.is_empty() {
            return Err(QuerySpecError::NoQueries);
        }
        if queries.iter().any(|q| q.name.trim().is_empty()) {
            return Err(QuerySpecError::EmptyName);
        }

        Ok(Self { start_nanos, end_nanos, sample_nanos, queries })
    }

    /// Single query over `[start, end)` with the default 10s sample period
    pub fn single(
        start_nanos: i64,
        end_nanos: i64,
        query: MetricQuery,
    ) -> Result<Self, QuerySpecError> {
        Self::new(start_nanos, end_nanos, DEFAULT_SAMPLE_NANOS, vec![query])
    }

    /// Every query must name at least one source
    pub fn check_sources(&self) -> Result<(), QuerySpecError> {
        match self.queries.iter().find(|q| q.sources.is_empty()) {
            Some(query) => Err(QuerySpecError::NoSources(query.name.clone())),
            None => Ok(()),
        }
    }

    pub fn start_nanos(&self) -> i64 {
        self.start_nanos
    }

    pub fn end_nanos(&self) -> i64 {
        self.end_nanos
    }

    pub fn sample_nanos(&self) -> i64 {
        self.sample_nanos
    }

    pub fn queries(&self) -> &[MetricQuery] {
        &self.queries
    }
}

/// A single sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    pub timestamp_nanos: i64,
    pub value: f64,
}

impl Datapoint {
    pub const fn new(timestamp_nanos: i64, value: f64) -> Self {
        Self { timestamp_nanos, value }
    }
}

/// Datapoints returned for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesSeries {
    pub query_name: String,
    pub datapoints: Vec<Datapoint>,
}

/// Normalized result of a timeseries query, in response order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesQueryResult {
    pub series: Vec<TimeseriesSeries>,
}

impl TimeseriesQueryResult {
    /// Series for a query name, if the response contained it
    pub fn series_for(&self, query_name: &str) -> Option<&TimeseriesSeries> {
        self.series.iter().find(|s| s.query_name == query_name)
    }

    /// Total number of datapoints across all series
    pub fn datapoint_count(&self) -> usize {
        self.series.iter().map(|s| s.datapoints.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.datapoint_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_rejects_inverted_range() {
        let err = TimeseriesQuerySpec::new(2000, 1000, 10, vec![MetricQuery::new("cpu")])
            .expect_err("range is inverted");
        assert_eq!(err, QuerySpecError::InvalidRange { start: 2000, end: 1000 });

        assert!(TimeseriesQuerySpec::new(1000, 1000, 10, vec![MetricQuery::new("cpu")]).is_err());
    }

    #[test]
    fn test_spec_rejects_non_positive_sample() {
        let err = TimeseriesQuerySpec::new(0, 10, 0, vec![MetricQuery::new("cpu")])
            .expect_err("sample is zero");
        assert_eq!(err, QuerySpecError::InvalidSample(0));
    }

    #[test]
    fn test_spec_requires_named_queries() {
        assert_eq!(TimeseriesQuerySpec::new(0, 10, 1, vec![]), Err(QuerySpecError::NoQueries));
        assert_eq!(
            TimeseriesQuerySpec::new(0, 10, 1, vec![MetricQuery::new("  ")]),
            Err(QuerySpecError::EmptyName)
        );
    }

    #[test]
    fn test_single_uses_default_sample() {
        let spec = TimeseriesQuerySpec::single(1000, 2000, MetricQuery::new("cpu"))
            .expect("valid spec");
        assert_eq!(spec.sample_nanos(), DEFAULT_SAMPLE_NANOS);
        assert_eq!(spec.queries().len(), 1);
    }

    #[test]
    fn test_check_sources() {
        let spec = TimeseriesQuerySpec::single(0, 10, MetricQuery::new("cpu")).expect("valid");
        assert_eq!(spec.check_sources(), Err(QuerySpecError::NoSources("cpu".to_string())));

        let spec = TimeseriesQuerySpec::single(0, 10, MetricQuery::summed("cpu", vec!["1".into()]))
            .expect("valid");
        assert!(spec.check_sources().is_ok());
    }

    #[test]
    fn test_enum_names() {
        assert_eq!("AVG".parse::<Aggregator>(), Ok(Aggregator::Avg));
        assert_eq!(Aggregator::Variance.proto_name(), "VARIANCE");
        assert_eq!(
            "non_negative_derivative".parse::<DerivativeMode>(),
            Ok(DerivativeMode::NonNegativeDerivative)
        );
        assert_eq!(DerivativeMode::NonNegativeDerivative.to_string(), "non-negative-derivative");
        assert!("median".parse::<Aggregator>().is_err());
    }

    #[test]
    fn test_serde_names_match_endpoint() {
        let query = MetricQuery::summed("cr.node.sql.conns", vec!["1".into()]);
        let json = serde_json::to_value(&query).expect("serializable");
        assert_eq!(json["downsampler"], "sum");
        assert_eq!(json["derivative"], "none");
    }

    #[test]
    fn test_result_helpers() {
        let result = TimeseriesQueryResult {
            series: vec![TimeseriesSeries {
                query_name: "cpu".into(),
                datapoints: vec![Datapoint::new(1500, 42.0), Datapoint::new(1600, 43.0)],
            }],
        };
        assert_eq!(result.datapoint_count(), 2);
        assert!(result.series_for("cpu").is_some());
        assert!(result.series_for("mem").is_none());
        assert!(!result.is_empty());
    }
}
