//! Read-only rollups over the accumulated per-day maps
//!
//! Only days present in `hits` take part in any rollup; missing days are
//! never zero-filled.

use chrono::{Months, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use super::{DayMap, HitsBytes, HitsBytesVisits, LogStats, Traffic};
use crate::parser::DAY_FORMAT;

/// Method tokens that stand for "no method" and are left out of method totals
const PLACEHOLDER_METHODS: &[&str] = &["-", "unknown"];

/// Hits, files, pages, bytes, visits and sites for one month or one day
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodSummary {
    /// Display label, e.g. "Jan" for a month or "Jan 2" for a day
    pub label: String,
    pub hits: u64,
    pub files: u64,
    pub pages: u64,
    pub bytes: u64,
    pub visits: u64,
    pub sites: u64,
}

impl PeriodSummary {
    fn add(&mut self, other: &PeriodSummary) {
        self.hits += other.hits;
        self.files += other.files;
        self.pages += other.pages;
        self.bytes += other.bytes;
        self.visits += other.visits;
        self.sites += other.sites;
    }
}

/// A category and its count, sorted for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

/// One row of a top-N view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopEntry<T> {
    pub name: String,
    #[serde(flatten)]
    pub traffic: T,
}

impl LogStats {
    fn day_summary(&self, day: &str, hits: u64, label: String) -> PeriodSummary {
        PeriodSummary {
            label,
            hits,
            files: self.files.get(day).copied().unwrap_or(0),
            pages: self.pages.get(day).copied().unwrap_or(0),
            bytes: self.bytes.get(day).copied().unwrap_or(0),
            visits: self
                .visits
                .get(day)
                .map(|ips| ips.values().sum())
                .unwrap_or(0),
            sites: self.sites.get(day).map(|ips| ips.len() as u64).unwrap_or(0),
        }
    }

    /// Totals per calendar month, keyed by `YYYY-MM` and labelled "Jan", "Feb", ...
    pub fn by_month(&self) -> BTreeMap<String, PeriodSummary> {
        let mut months: BTreeMap<String, PeriodSummary> = BTreeMap::new();

        for (day, hits) in &self.hits {
            let month = day.get(0..7).unwrap_or(day).to_string();
            let summary = self.day_summary(day, *hits, String::new());
            months
                .entry(month)
                .or_insert_with_key(|month| PeriodSummary {
                    label: month_label(month),
                    ..Default::default()
                })
                .add(&summary);
        }

        months
    }

    /// Half-open range `[latest - 1 month + 1 day, latest + 1 day)` of day keys
    pub fn recent_window(&self) -> Option<(String, String)> {
        let latest = self.hits.keys().next_back()?;
        let latest = NaiveDate::parse_from_str(latest, DAY_FORMAT).ok()?;
        let start = latest.checked_sub_months(Months::new(1))?.succ_opt()?;
        let end = latest.succ_opt()?;
        Some((
            start.format(DAY_FORMAT).to_string(),
            end.format(DAY_FORMAT).to_string(),
        ))
    }

    fn recent_days(&self) -> Vec<&str> {
        match self.recent_window() {
            Some((start, end)) => self
                .hits
                .range(start..end)
                .map(|(day, _)| day.as_str())
                .collect(),
            None => Vec::new(),
        }
    }

    /// One summary per day in the trailing window, labelled "Jan 2"
    pub fn recent_by_day(&self) -> BTreeMap<String, PeriodSummary> {
        self.recent_days()
            .into_iter()
            .map(|day| {
                let hits = self.hits.get(day).copied().unwrap_or(0);
                (day.to_string(), self.day_summary(day, hits, day_label(day)))
            })
            .collect()
    }

    /// Hits per HTTP method over the trailing window
    pub fn method_totals(&self) -> BTreeMap<String, u64> {
        let mut totals = self.sum_recent(&self.methods);
        totals.retain(|method, _| !PLACEHOLDER_METHODS.contains(&method.as_str()));
        totals
    }

    /// Hits per response code over the trailing window
    pub fn status_totals(&self) -> BTreeMap<u16, u64> {
        self.sum_recent(&self.status_codes)
    }

    /// Visits per country over the trailing window
    pub fn country_totals(&self) -> BTreeMap<String, u64> {
        self.sum_recent(&self.country_visits)
    }

    fn sum_recent<K>(&self, map: &DayMap<HashMap<K, u64>>) -> BTreeMap<K, u64>
    where
        K: Clone + Ord + Hash,
    {
        let mut totals = BTreeMap::new();
        for day in self.recent_days() {
            for (key, count) in map.get(day).into_iter().flatten() {
                *totals.entry(key.clone()).or_default() += count;
            }
        }
        totals
    }

    pub fn top_addresses(&self, n: usize) -> Vec<TopEntry<HitsBytesVisits>> {
        self.top_recent(&self.addresses, n, String::clone)
    }

    pub fn top_user_agents(&self, n: usize) -> Vec<TopEntry<HitsBytesVisits>> {
        self.top_recent(&self.user_agents, n, String::clone)
    }

    /// Busiest request targets, named "METHOD path"
    pub fn top_urls(&self, n: usize) -> Vec<TopEntry<HitsBytes>> {
        self.top_recent(&self.urls, n, |(path, method)| format!("{method} {path}"))
    }

    pub fn top_referrers(&self, n: usize) -> Vec<TopEntry<HitsBytes>> {
        self.top_recent(&self.referrers, n, String::clone)
    }

    /// Merge an entity map over the trailing window and keep the `n` entries
    /// with the most hits, ties broken by name
    fn top_recent<K, T, F>(&self, map: &DayMap<HashMap<K, T>>, n: usize, name: F) -> Vec<TopEntry<T>>
    where
        K: Eq + Hash,
        T: Traffic,
        F: Fn(&K) -> String,
    {
        let mut merged: HashMap<&K, T> = HashMap::new();
        for day in self.recent_days() {
            for (key, traffic) in map.get(day).into_iter().flatten() {
                merged.entry(key).or_default().merge(traffic);
            }
        }

        let mut entries: Vec<TopEntry<T>> = merged
            .into_iter()
            .map(|(key, traffic)| TopEntry {
                name: name(key),
                traffic,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.traffic
                .hits()
                .cmp(&a.traffic.hits())
                .then_with(|| a.name.cmp(&b.name))
        });
        entries.truncate(n);
        entries
    }
}

/// Sort category totals by count (descending), then by category
pub fn ranked<K: ToString>(totals: &BTreeMap<K, u64>) -> Vec<CategoryCount> {
    let mut rows: Vec<CategoryCount> = totals
        .iter()
        .map(|(category, count)| CategoryCount {
            category: category.to_string(),
            count: *count,
        })
        .collect();
    // Stable sort keeps the BTreeMap key order among equal counts
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    rows
}

fn month_label(month: &str) -> String {
    NaiveDate::parse_from_str(&format!("{month}-01"), DAY_FORMAT)
        .map(|date| date.format("%b").to_string())
        .unwrap_or_else(|_| month.to_string())
}

fn day_label(day: &str) -> String {
    NaiveDate::parse_from_str(day, DAY_FORMAT)
        .map(|date| date.format("%b %-d").to_string())
        .unwrap_or_else(|_| day.to_string())
}
