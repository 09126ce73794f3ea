//! Timeseries tools
//!
//! - `cluster_ts_query`: one named metric through the management API,
//!   rendered as markdown
//! - `tsdb_query`: one query per source through the breaker-gated
//!   timeseries client, rendered as JSON

use cockroach_mcp_domain::constants::DEFAULT_SAMPLE_NANOS;
use cockroach_mcp_domain::{Aggregator, DerivativeMode, MetricQuery, TimeseriesQuerySpec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::args::{
    optional_nanos, optional_parsed, optional_str, required_nanos, required_str, split_list,
    Arguments,
};
use super::ToolOutput;
use crate::context::AppContext;
use crate::utils::format::timeseries_markdown;
use crate::utils::logging::error_label;

pub const CLUSTER_TS_QUERY: &str = "cluster_ts_query";
pub const TSDB_QUERY: &str = "tsdb_query";

/// Tenant used when the caller does not name one
pub const DEFAULT_TENANT: &str = "system";

/// `{tenant?, start_nanos, end_nanos, query_name}`
pub async fn cluster_ts_query(
    ctx: &AppContext,
    args: &Arguments,
    cancel: &CancellationToken,
) -> ToolOutput {
    let (tenant, start, end, name) = match cluster_ts_args(args) {
        Ok(parsed) => parsed,
        Err(message) => return ToolOutput::error(message),
    };
    debug!(tenant, start, end, query = name, "cluster_ts_query");

    match ctx.cluster_api.query_timeseries(tenant, start, end, name, cancel).await {
        Ok(result) if result.series.is_empty() => {
            ToolOutput::text(format!("No results for query: {name}"))
        }
        Ok(result) => ToolOutput::text(timeseries_markdown(&result)),
        Err(err) => {
            warn!(error = %err, label = error_label(&err), "Timeseries query failed");
            ToolOutput::error(format!("Failed to query timeseries: {err}"))
        }
    }
}

/// `{start_nanos, end_nanos, sample_nanos?, sources, downsampler?,
/// source_aggregator?, derivative?}` with comma-separated sources; each
/// source becomes its own query, summed with no derivative by default
pub async fn tsdb_query(
    ctx: &AppContext,
    args: &Arguments,
    cancel: &CancellationToken,
) -> ToolOutput {
    let spec = match tsdb_spec(args) {
        Ok(spec) => spec,
        Err(message) => return ToolOutput::error(message),
    };
    debug!(queries = spec.queries().len(), "tsdb_query");

    let result = match ctx.tsdb.query(&spec, cancel).await {
        Ok(result) => result,
        Err(err) => {
            warn!(error = %err, label = error_label(&err), "TSDB query failed");
            return ToolOutput::error(format!("Failed to query tsdb: {err}"));
        }
    };

    match serde_json::to_string(&result) {
        Ok(json) => ToolOutput::text(json),
        Err(err) => ToolOutput::error(format!("Failed to query tsdb: {err}")),
    }
}

fn cluster_ts_args(args: &Arguments) -> Result<(&str, i64, i64, &str), String> {
    let tenant = optional_str(args, "tenant")?.unwrap_or(DEFAULT_TENANT);
    let start = required_nanos(args, "start_nanos")?;
    let end = required_nanos(args, "end_nanos")?;
    let name = required_str(args, "query_name")?;
    if start >= end {
        return Err("start time must be before end time".to_string());
    }
    Ok((tenant, start, end, name))
}

fn tsdb_spec(args: &Arguments) -> Result<TimeseriesQuerySpec, String> {
    let start = required_nanos(args, "start_nanos")?;
    let end = required_nanos(args, "end_nanos")?;
    let sample = optional_nanos(args, "sample_nanos")?.unwrap_or(DEFAULT_SAMPLE_NANOS);

    let sources = optional_str(args, "sources")?.map(split_list).unwrap_or_default();
    if sources.is_empty() {
        return Err("timeseries sources are required".to_string());
    }

    let downsampler = optional_parsed::<Aggregator>(args, "downsampler")?.unwrap_or(Aggregator::Sum);
    let source_aggregator =
        optional_parsed::<Aggregator>(args, "source_aggregator")?.unwrap_or(Aggregator::Sum);
    let derivative = optional_parsed::<DerivativeMode>(args, "derivative")?.unwrap_or_default();

    let queries = sources
        .into_iter()
        .map(|source| {
            MetricQuery::new(source.clone())
                .downsampler(downsampler)
                .source_aggregator(source_aggregator)
                .derivative(derivative)
                .sources([source])
        })
        .collect();

    TimeseriesQuerySpec::new(start, end, sample, queries).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn args(value: Value) -> Arguments {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn cluster_ts_args_default_tenant_and_order() {
        let input = args(json!({
            "start_nanos": 1000,
            "end_nanos": 2000,
            "query_name": "cr.node.sql.conns"
        }));
        let parsed = cluster_ts_args(&input).expect("args");
        assert_eq!(parsed, ("system", 1000, 2000, "cr.node.sql.conns"));

        assert_eq!(
            cluster_ts_args(&args(json!({"start_nanos": 2, "end_nanos": 2, "query_name": "q"})))
                .err(),
            Some("start time must be before end time".to_string())
        );
        assert_eq!(
            cluster_ts_args(&args(json!({"start_nanos": 1, "end_nanos": 2}))).err(),
            Some("query_name is required".to_string())
        );
    }

    #[test]
    fn tsdb_spec_builds_one_query_per_source() {
        let spec = tsdb_spec(&args(json!({
            "start_nanos": 1_000,
            "end_nanos": "2000",
            "sources": "1, 2"
        })))
        .expect("spec");

        assert_eq!(spec.sample_nanos(), DEFAULT_SAMPLE_NANOS);
        let names: Vec<_> = spec.queries().iter().map(|q| q.name.as_str()).collect();
        assert_eq!(names, vec!["1", "2"]);

        let first = &spec.queries()[0];
        assert_eq!(first.sources, vec!["1".to_string()]);
        assert_eq!(first.downsampler, Some(Aggregator::Sum));
        assert_eq!(first.source_aggregator, Some(Aggregator::Sum));
        assert_eq!(first.derivative.unwrap_or_default(), DerivativeMode::None);
    }

    #[test]
    fn tsdb_spec_accepts_aggregation_overrides() {
        let spec = tsdb_spec(&args(json!({
            "start_nanos": 1_000,
            "end_nanos": 2_000,
            "sources": "3",
            "downsampler": "MAX",
            "source_aggregator": "avg",
            "derivative": "non_negative_derivative"
        })))
        .expect("spec");

        let query = &spec.queries()[0];
        assert_eq!(query.downsampler, Some(Aggregator::Max));
        assert_eq!(query.source_aggregator, Some(Aggregator::Avg));
        assert_eq!(query.derivative, Some(DerivativeMode::NonNegativeDerivative));

        assert_eq!(
            tsdb_spec(&args(json!({
                "start_nanos": 1,
                "end_nanos": 2,
                "sources": "1",
                "downsampler": "median"
            })))
            .err(),
            Some("downsampler: unknown aggregator 'median'".to_string())
        );
    }

    #[test]
    fn tsdb_spec_reports_missing_and_invalid_input() {
        assert_eq!(
            tsdb_spec(&args(json!({"end_nanos": 2, "sources": "1"}))).err(),
            Some("start_nanos is required".to_string())
        );
        assert_eq!(
            tsdb_spec(&args(json!({"start_nanos": 1, "end_nanos": 2, "sources": " , "}))).err(),
            Some("timeseries sources are required".to_string())
        );
        assert!(tsdb_spec(&args(json!({"start_nanos": 5, "end_nanos": 2, "sources": "1"}))).is_err());
        assert!(tsdb_spec(&args(json!({
            "start_nanos": 1,
            "end_nanos": 2,
            "sample_nanos": 0,
            "sources": "1"
        })))
        .is_err());
    }
}
