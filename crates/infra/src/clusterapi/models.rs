//! Wire types for the management API timeseries endpoint
//!
//! Enum-valued fields use the server's enum names (`SUM`,
//! `NON_NEGATIVE_DERIVATIVE`) and are omitted when unset.

use cockroach_mcp_domain::{MetricQuery, TimeseriesQuerySpec};
use serde::Serialize;

/// `POST {base}/ts/query` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TsQueryRequest {
    pub start_nanos: i64,
    pub end_nanos: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_nanos: Option<i64>,
    pub queries: Vec<TsQuery>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TsQuery {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downsampler: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_aggregator: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derivative: Option<&'static str>,
    pub sources: Vec<String>,
}

impl TsQueryRequest {
    /// Single named query with server-side defaults
    pub fn named(start_nanos: i64, end_nanos: i64, query_name: &str) -> Self {
        Self {
            start_nanos,
            end_nanos,
            sample_nanos: None,
            queries: vec![TsQuery::from(&MetricQuery::new(query_name))],
        }
    }
}

impl From<&TimeseriesQuerySpec> for TsQueryRequest {
    fn from(spec: &TimeseriesQuerySpec) -> Self {
        Self {
            start_nanos: spec.start_nanos(),
            end_nanos: spec.end_nanos(),
            sample_nanos: Some(spec.sample_nanos()),
            queries: spec.queries().iter().map(TsQuery::from).collect(),
        }
    }
}

impl From<&MetricQuery> for TsQuery {
    fn from(query: &MetricQuery) -> Self {
        Self {
            name: query.name.clone(),
            downsampler: query.downsampler.map(|a| a.proto_name()),
            source_aggregator: query.source_aggregator.map(|a| a.proto_name()),
            derivative: query.derivative.map(|d| d.proto_name()),
            sources: query.sources.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use cockroach_mcp_domain::{Aggregator, DerivativeMode};
    use serde_json::json;

    use super::*;

    #[test]
    fn test_named_request_omits_unset_fields() {
        let body = serde_json::to_value(TsQueryRequest::named(1000, 2000, "cpu")).expect("json");
        assert_eq!(
            body,
            json!({"start_nanos": 1000, "end_nanos": 2000, "queries": [{"name": "cpu", "sources": []}]})
        );
    }

    #[test]
    fn test_spec_request_uses_enum_names() {
        let query = MetricQuery::new("cr.node.sql.conns")
            .downsampler(Aggregator::Avg)
            .source_aggregator(Aggregator::Sum)
            .derivative(DerivativeMode::NonNegativeDerivative)
            .sources(["1"]);
        let spec = TimeseriesQuerySpec::new(0, 10, 5, vec![query]).expect("valid spec");

        let body = serde_json::to_value(TsQueryRequest::from(&spec)).expect("json");
        assert_eq!(body["sample_nanos"], 5);
        assert_eq!(body["queries"][0]["downsampler"], "AVG");
        assert_eq!(body["queries"][0]["sourceAggregator"], "SUM");
        assert_eq!(body["queries"][0]["derivative"], "NON_NEGATIVE_DERIVATIVE");
    }
}
