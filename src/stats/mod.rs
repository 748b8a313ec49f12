//! Statistics accumulator
//!
//! Folds `LogRecord`s one at a time into per-day maps: hits, files, pages,
//! bytes, visits (with a session timeout), sites, methods, response codes and
//! per-entity traffic. Records must arrive in time order for visit detection
//! to be meaningful; the fold itself never fails.

mod traffic;
pub mod views;

use chrono::{DateTime, FixedOffset, TimeDelta};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

use crate::country_cache::{CountryCache, CountryLookup};
use crate::parser::LogRecord;

pub use traffic::{HitsBytes, HitsBytesVisits, Traffic};
pub use views::{CategoryCount, PeriodSummary};

/// Default gap after which the next hit from an address opens a new visit
pub const DEFAULT_SESSION_TIMEOUT_SECS: i64 = 600;

/// Extensions of request paths that count as a "page"
pub const PAGE_EXTENSIONS: &[&str] = &[
    "htm", "html", "php", "php3", "php4", "asp", "aspx", "jsp", "js", "py", "shtml", "xhtml",
    "cgi", "pl", "rb", "erb", "ejs", "phtml", "dhtml", "cfm", "do", "action", "axd", "ashx",
    "asmx", "svc", "faces", "jspx", "xsp", "md", "markdown", "liquid", "mustache", "hbs", "wsdl",
    "wadl", "swagger",
];

/// Per-day map, ordered by day key (string order is chronological order)
pub type DayMap<V> = BTreeMap<String, V>;

#[derive(Debug, Clone, PartialEq)]
pub struct LogStats {
    session_timeout: TimeDelta,
    hits: DayMap<u64>,
    files: DayMap<u64>,
    pages: DayMap<u64>,
    bytes: DayMap<u64>,
    visits: DayMap<HashMap<String, u64>>,
    country_visits: DayMap<HashMap<String, u64>>,
    first_seen: HashMap<String, DateTime<FixedOffset>>,
    last_seen: HashMap<String, DateTime<FixedOffset>>,
    sites: DayMap<HashMap<String, u64>>,
    methods: DayMap<HashMap<String, u64>>,
    status_codes: DayMap<HashMap<u16, u64>>,
    addresses: DayMap<HashMap<String, HitsBytesVisits>>,
    user_agents: DayMap<HashMap<String, HitsBytesVisits>>,
    /// Keyed by (URL path, method)
    urls: DayMap<HashMap<(String, String), HitsBytes>>,
    referrers: DayMap<HashMap<String, HitsBytes>>,
}

impl LogStats {
    pub fn new() -> Self {
        Self::with_session_timeout(TimeDelta::seconds(DEFAULT_SESSION_TIMEOUT_SECS))
    }

    pub fn with_session_timeout(session_timeout: TimeDelta) -> Self {
        Self {
            session_timeout,
            hits: DayMap::new(),
            files: DayMap::new(),
            pages: DayMap::new(),
            bytes: DayMap::new(),
            visits: DayMap::new(),
            country_visits: DayMap::new(),
            first_seen: HashMap::new(),
            last_seen: HashMap::new(),
            sites: DayMap::new(),
            methods: DayMap::new(),
            status_codes: DayMap::new(),
            addresses: DayMap::new(),
            user_agents: DayMap::new(),
            urls: DayMap::new(),
            referrers: DayMap::new(),
        }
    }

    /// Fold one record into every metric of its day
    pub fn record(&mut self, record: &LogRecord) {
        let day = record.day_key();
        let address = record.address.as_str();

        *self.hits.entry(day.clone()).or_default() += 1;

        if record.status == 200 {
            *self.files.entry(day.clone()).or_default() += 1;
        }

        if is_page(&record.url_path) {
            *self.pages.entry(day.clone()).or_default() += 1;
        }

        *self.bytes.entry(day.clone()).or_default() += record.size;

        let is_new_visit = self.is_new_visit(address, record.timestamp);
        if is_new_visit {
            *self
                .visits
                .entry(day.clone())
                .or_default()
                .entry(address.to_string())
                .or_default() += 1;
        }

        self.first_seen
            .entry(address.to_string())
            .or_insert(record.timestamp);
        self.last_seen.insert(address.to_string(), record.timestamp);

        *self
            .sites
            .entry(day.clone())
            .or_default()
            .entry(address.to_string())
            .or_default() += 1;

        *self
            .methods
            .entry(day.clone())
            .or_default()
            .entry(record.method.clone())
            .or_default() += 1;

        *self
            .status_codes
            .entry(day.clone())
            .or_default()
            .entry(record.status)
            .or_default() += 1;

        self.addresses
            .entry(day.clone())
            .or_default()
            .entry(address.to_string())
            .or_default()
            .add_traffic(record.size, is_new_visit);

        self.user_agents
            .entry(day.clone())
            .or_default()
            .entry(record.user_agent.clone())
            .or_default()
            .add_traffic(record.size, is_new_visit);

        self.urls
            .entry(day.clone())
            .or_default()
            .entry((record.url_path.clone(), record.method.clone()))
            .or_default()
            .add_traffic(record.size);

        self.referrers
            .entry(day)
            .or_default()
            .entry(record.referrer.clone())
            .or_default()
            .add_traffic(record.size);
    }

    /// A hit opens a new visit when the address was never seen or its
    /// previous hit is strictly more than the session timeout ago
    fn is_new_visit(&self, address: &str, timestamp: DateTime<FixedOffset>) -> bool {
        match self.last_seen.get(address) {
            Some(last) => timestamp.signed_duration_since(*last) > self.session_timeout,
            None => true,
        }
    }

    /// Distinct addresses that opened at least one visit, across all days
    pub fn visitors(&self) -> Vec<String> {
        let unique: BTreeSet<&String> = self.visits.values().flat_map(|ips| ips.keys()).collect();
        unique.into_iter().cloned().collect()
    }

    /// Number of distinct addresses seen during the run
    pub fn distinct_addresses(&self) -> usize {
        self.first_seen.len()
    }

    /// Resolve every visitor to a country and fill the per-day country visits
    pub async fn lookup_countries(&mut self, lookup: CountryLookup) {
        let visitors = self.visitors();
        let cache = lookup.parallel_lookup(visitors).await;
        self.apply_countries(&cache);
    }

    /// Add each address's daily visits to its country's bucket.
    /// Addresses the cache could not resolve are left out of the country breakdown.
    /// The country breakdown is rebuilt from scratch on every call.
    pub fn apply_countries(&mut self, cache: &CountryCache) {
        let mut skipped = 0usize;
        self.country_visits.clear();

        for (day, visitors) in &self.visits {
            let countries = self.country_visits.entry(day.clone()).or_default();
            for (visitor, visits) in visitors {
                match cache.lookup(visitor) {
                    Some(country) => *countries.entry(country.to_string()).or_default() += visits,
                    None => skipped += 1,
                }
            }
        }

        if skipped > 0 {
            debug!("{} daily visitor entries had no country", skipped);
        }
        info!("Country visits merged for {} days", self.country_visits.len());
    }
}

impl Default for LogStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the request path ends in a page-like extension.
/// Query string and fragment are ignored.
pub fn is_page(url_path: &str) -> bool {
    let path = url_path
        .split(['?', '#'])
        .next()
        .unwrap_or(url_path);
    let file_name = path.rsplit('/').next().unwrap_or(path);

    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => PAGE_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext)),
        _ => false,
    }
}
