//! Markdown rendering for tool results

use std::fmt::Display;

use chrono::DateTime;
use cockroach_mcp_domain::{TimeseriesQueryResult, TimeseriesSeries};

/// Render rows as a markdown table.
///
/// Cell newlines are escaped so a value never breaks the table.
pub fn markdown_table<H, C>(header: &[H], rows: &[Vec<C>]) -> String
where
    H: AsRef<str>,
    C: Display,
{
    let mut out = String::new();

    let names: Vec<&str> = header.iter().map(AsRef::as_ref).collect();
    out.push_str(&format!("| {} |\n", names.join(" | ")));
    out.push_str(&format!("| {} |\n", vec!["---"; header.len()].join(" | ")));

    for row in rows {
        let cells: Vec<String> =
            row.iter().map(|cell| cell.to_string().replace('\n', "\\n")).collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }

    out
}

/// `YYYY-MM-DD HH:MM:SS` in UTC
pub fn format_timestamp(nanos: i64) -> String {
    DateTime::from_timestamp_nanos(nanos).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// One table per series, headed by the query name
pub fn timeseries_markdown(result: &TimeseriesQueryResult) -> String {
    result.series.iter().map(series_markdown).collect::<Vec<_>>().join("\n")
}

fn series_markdown(series: &TimeseriesSeries) -> String {
    let rows: Vec<Vec<String>> = series
        .datapoints
        .iter()
        .map(|point| vec![format_timestamp(point.timestamp_nanos), point.value.to_string()])
        .collect();

    format!(
        "Result for query: {}\n{}",
        series.query_name,
        markdown_table(&["timestamp", "value"], &rows)
    )
}

#[cfg(test)]
mod tests {
    use cockroach_mcp_domain::Datapoint;

    use super::*;

    #[test]
    fn renders_table_with_escaped_newlines() {
        let table = markdown_table(&["a", "b"], &[vec!["1", "x\ny"]]);
        assert_eq!(table, "| a | b |\n| --- | --- |\n| 1 | x\\ny |\n");
    }

    #[test]
    fn formats_timestamps_in_utc() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00");
        assert_eq!(format_timestamp(1_700_000_000_123_456_789), "2023-11-14 22:13:20");
    }

    #[test]
    fn renders_one_table_per_series() {
        let result = TimeseriesQueryResult {
            series: vec![
                TimeseriesSeries {
                    query_name: "cpu".into(),
                    datapoints: vec![Datapoint::new(1_700_000_000_000_000_000, 42.0)],
                },
                TimeseriesSeries { query_name: "mem".into(), datapoints: vec![] },
            ],
        };

        assert_eq!(
            timeseries_markdown(&result),
            "Result for query: cpu\n| timestamp | value |\n| --- | --- |\n| 2023-11-14 22:13:20 | 42 |\n\
             \nResult for query: mem\n| timestamp | value |\n| --- | --- |\n"
        );
    }
}
