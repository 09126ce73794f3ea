//! Wire types for the timeseries query endpoint
//!
//! Every field is always present; unset aggregators fall back to `sum` and
//! an unset derivative to `none`.

use cockroach_mcp_domain::{Aggregator, DerivativeMode, MetricQuery, TimeseriesQuerySpec};
use serde::Serialize;

/// `POST /ts/query` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TsdbQueryRequest {
    pub start_nanos: i64,
    pub end_nanos: i64,
    pub sample_nanos: i64,
    pub queries: Vec<TsdbQuery>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TsdbQuery {
    pub name: String,
    pub downsampler: &'static str,
    pub source_aggregator: &'static str,
    pub derivative: &'static str,
    pub sources: Vec<String>,
}

impl From<&TimeseriesQuerySpec> for TsdbQueryRequest {
    fn from(spec: &TimeseriesQuerySpec) -> Self {
        Self {
            start_nanos: spec.start_nanos(),
            end_nanos: spec.end_nanos(),
            sample_nanos: spec.sample_nanos(),
            queries: spec.queries().iter().map(TsdbQuery::from).collect(),
        }
    }
}

impl From<&MetricQuery> for TsdbQuery {
    fn from(query: &MetricQuery) -> Self {
        Self {
            name: query.name.clone(),
            downsampler: query.downsampler.unwrap_or(Aggregator::Sum).as_str(),
            source_aggregator: query.source_aggregator.unwrap_or(Aggregator::Sum).as_str(),
            derivative: query.derivative.unwrap_or_default().as_str(),
            sources: query.sources.clone(),
        }
    }
}
