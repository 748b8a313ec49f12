//! JSON report assembled from the read-only views of `LogStats`

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::http;
use crate::stats::views::{ranked, TopEntry};
use crate::stats::{CategoryCount, HitsBytes, HitsBytesVisits, LogStats, PeriodSummary};

/// Half-open day range `[start, end)` used by the recent views
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Window {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodRow {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
    pub hits: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRow {
    pub code: u16,
    pub label: String,
    pub hits: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub lines: u64,
    pub skipped: u64,
    pub distinct_addresses: usize,
    pub window: Option<Window>,
    /// Keyed by `YYYY-MM`
    pub months: BTreeMap<String, PeriodSummary>,
    /// Keyed by `YYYY-MM-DD`, trailing window only
    pub days: BTreeMap<String, PeriodSummary>,
    pub methods: Vec<MethodRow>,
    pub status_codes: Vec<StatusRow>,
    pub countries: Vec<CategoryCount>,
    pub top_addresses: Vec<TopEntry<HitsBytesVisits>>,
    pub top_user_agents: Vec<TopEntry<HitsBytesVisits>>,
    pub top_urls: Vec<TopEntry<HitsBytes>>,
    pub top_referrers: Vec<TopEntry<HitsBytes>>,
}

impl Report {
    /// Snapshot every view; top-N tables keep `top` rows
    pub fn build(stats: &LogStats, top: usize) -> Self {
        let methods = ranked(&stats.method_totals())
            .into_iter()
            .map(|row| MethodRow {
                description: http::method_description(&row.category),
                method: row.category,
                hits: row.count,
            })
            .collect();

        let mut status_codes: Vec<StatusRow> = stats
            .status_totals()
            .into_iter()
            .map(|(code, hits)| StatusRow {
                code,
                label: http::status_label(code),
                hits,
            })
            .collect();
        status_codes.sort_by(|a, b| b.hits.cmp(&a.hits).then(a.code.cmp(&b.code)));

        Self {
            generated_at: Utc::now(),
            lines: 0,
            skipped: 0,
            distinct_addresses: stats.distinct_addresses(),
            window: stats
                .recent_window()
                .map(|(start, end)| Window { start, end }),
            months: stats.by_month(),
            days: stats.recent_by_day(),
            methods,
            status_codes,
            countries: ranked(&stats.country_totals()),
            top_addresses: stats.top_addresses(top),
            top_user_agents: stats.top_user_agents(top),
            top_urls: stats.top_urls(top),
            top_referrers: stats.top_referrers(top),
        }
    }

    pub fn with_ingest(mut self, lines: u64, skipped: u64) -> Self {
        self.lines = lines;
        self.skipped = skipped;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::tests::{at, rec};

    fn sample() -> LogStats {
        let mut stats = LogStats::new();
        stats.record(&rec("198.51.100.1", at(3, 9, 0, 0), "/index.html"));
        stats.record(&rec("198.51.100.1", at(3, 9, 1, 0), "/style.css"));
        let mut missing = rec("198.51.100.2", at(4, 10, 0, 0), "/gone.html");
        missing.status = 404;
        stats.record(&missing);
        let mut post = rec("198.51.100.2", at(4, 10, 0, 5), "/form.php");
        post.method = "POST".to_string();
        stats.record(&post);
        stats
    }

    #[test]
    fn builds_every_section() {
        let report = Report::build(&sample(), 10).with_ingest(5, 1);

        assert_eq!(report.lines, 5);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.distinct_addresses, 2);
        assert_eq!(
            report.window,
            Some(Window {
                start: "2023-12-05".to_string(),
                end: "2024-01-05".to_string(),
            })
        );
        assert_eq!(report.months["2024-01"].hits, 4);
        assert_eq!(report.months["2024-01"].label, "Jan");
        assert_eq!(report.days.len(), 2);
        assert_eq!(report.days["2024-01-04"].label, "Jan 4");
        assert_eq!(report.top_addresses.len(), 2);
        assert!(report.countries.is_empty());
    }

    #[test]
    fn methods_and_codes_are_labelled() {
        let report = Report::build(&sample(), 10);

        assert_eq!(report.methods[0].method, "GET");
        assert_eq!(report.methods[0].hits, 3);
        assert_eq!(report.methods[0].description, Some("Retrieve a resource"));
        assert_eq!(report.methods[1].method, "POST");

        assert_eq!(report.status_codes[0].label, "200 OK");
        assert_eq!(report.status_codes[0].hits, 3);
        assert_eq!(report.status_codes[1].label, "404 Not Found");
    }

    #[test]
    fn top_limits_rows() {
        let report = Report::build(&sample(), 1);
        assert_eq!(report.top_addresses.len(), 1);
        assert_eq!(report.top_urls.len(), 1);
    }

    #[test]
    fn serializes_to_json() {
        let report = Report::build(&sample(), 10);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["months"]["2024-01"]["visits"], 2);
        assert_eq!(json["top_urls"][0]["hits"], 1);
        assert!(json["top_addresses"][0]["visits"].is_u64());
        assert_eq!(json["status_codes"][1]["code"], 404);
    }

    #[test]
    fn empty_stats() {
        let report = Report::build(&LogStats::new(), 10);
        assert!(report.window.is_none());
        assert!(report.months.is_empty());
        assert!(report.days.is_empty());
        assert!(report.methods.is_empty());
    }
}
