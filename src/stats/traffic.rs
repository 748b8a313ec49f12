//! Hit/byte counters used as values of the per-entity maps

use serde::Serialize;

/// Hits and bytes for a URL path or a referrer
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HitsBytes {
    pub hits: u64,
    pub bytes: u64,
}

impl HitsBytes {
    pub fn add_traffic(&mut self, bytes: u64) {
        self.hits += 1;
        self.bytes += bytes;
    }

    pub fn add(&mut self, other: &HitsBytes) {
        self.hits += other.hits;
        self.bytes += other.bytes;
    }
}

/// Hits, bytes and visits for an address or a user agent
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HitsBytesVisits {
    pub hits: u64,
    pub bytes: u64,
    pub visits: u64,
}

impl HitsBytesVisits {
    pub fn add_traffic(&mut self, bytes: u64, is_new_visit: bool) {
        self.hits += 1;
        self.bytes += bytes;
        if is_new_visit {
            self.visits += 1;
        }
    }

    pub fn add(&mut self, other: &HitsBytesVisits) {
        self.hits += other.hits;
        self.bytes += other.bytes;
        self.visits += other.visits;
    }
}

/// Counters that can be ranked by hits in the top-N views
pub trait Traffic: Copy + Default {
    fn hits(&self) -> u64;
    fn merge(&mut self, other: &Self);
}

impl Traffic for HitsBytes {
    fn hits(&self) -> u64 {
        self.hits
    }

    fn merge(&mut self, other: &Self) {
        self.add(other);
    }
}

impl Traffic for HitsBytesVisits {
    fn hits(&self) -> u64 {
        self.hits
    }

    fn merge(&mut self, other: &Self) {
        self.add(other);
    }
}
