//! Concurrent visitor-to-country resolution
//!
//! A fixed pool of worker tasks pulls visitor addresses from a shared work
//! queue, resolves each one (DNS first for host names) and looks it up in the
//! GeoIP database. Results go through a bounded channel, sized to the number of
//! visitors so workers never wait, to a single collector task that owns the
//! result map. The batch is done once the collector has drained every result.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::net::lookup_host;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::GeoIpError;
use crate::geoip::CountryDatabase;

/// Display value for visitors whose country could not be determined
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// Outcome of resolving one visitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Country(String),
    Unresolved,
}

/// Visitor to country table, read-only once the batch has finished
#[derive(Debug, Default, Clone)]
pub struct CountryCache {
    countries: HashMap<String, Resolution>,
}

impl CountryCache {
    /// Country of a visitor, `None` when it was never looked up or the lookup failed
    pub fn lookup(&self, visitor: &str) -> Option<&str> {
        match self.countries.get(visitor) {
            Some(Resolution::Country(country)) => Some(country.as_str()),
            Some(Resolution::Unresolved) | None => None,
        }
    }

    /// Country of a visitor, or `UNKNOWN_COUNTRY`
    pub fn country_or_fallback(&self, visitor: &str) -> &str {
        self.lookup(visitor).unwrap_or(UNKNOWN_COUNTRY)
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    pub fn unresolved(&self) -> usize {
        self.countries
            .values()
            .filter(|r| matches!(r, Resolution::Unresolved))
            .count()
    }

    #[cfg(test)]
    pub(crate) fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, Option<&'a str>)>) -> Self {
        let countries = pairs
            .into_iter()
            .map(|(visitor, country)| {
                let resolution = match country {
                    Some(c) => Resolution::Country(c.to_string()),
                    None => Resolution::Unresolved,
                };
                (visitor.to_string(), resolution)
            })
            .collect();
        Self { countries }
    }
}

/// One batch of parallel lookups against a country database
pub struct CountryLookup {
    db: Arc<dyn CountryDatabase>,
    workers: usize,
}

impl CountryLookup {
    pub fn new(db: Arc<dyn CountryDatabase>, workers: usize) -> Self {
        Self {
            db,
            workers: workers.max(1),
        }
    }

    /// Resolve every visitor and return the finished cache.
    /// The database handle is released when this returns.
    pub async fn parallel_lookup(self, visitors: Vec<String>) -> CountryCache {
        let total = visitors.len();
        info!("Looking up {} visitors with {} workers", total, self.workers);

        let (work_tx, work_rx) = mpsc::unbounded_channel::<String>();
        let work_rx = Arc::new(Mutex::new(work_rx));
        let (result_tx, result_rx) = mpsc::channel::<(String, Resolution)>(total.max(1));

        let collector = tokio::spawn(collect_results(result_rx, total));

        let mut workers = JoinSet::new();
        for _ in 0..self.workers {
            workers.spawn(lookup_worker(
                self.db.clone(),
                work_rx.clone(),
                result_tx.clone(),
            ));
        }
        // Workers hold the only senders now; the collector stops after the last one exits
        drop(result_tx);

        for visitor in visitors {
            if work_tx.send(visitor).is_err() {
                warn!("Lookup workers exited before all visitors were queued");
                break;
            }
        }
        drop(work_tx);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!("Lookup worker failed: {}", e);
            }
        }
        drop(self.db);
        debug!("GeoIP database released");

        let countries = match collector.await {
            Ok(countries) => countries,
            Err(e) => {
                warn!("Lookup collector failed: {}", e);
                HashMap::new()
            }
        };

        let cache = CountryCache { countries };
        info!(
            "Country lookup finished: {} visitors, {} unresolved",
            cache.len(),
            cache.unresolved()
        );
        cache
    }
}

async fn lookup_worker(
    db: Arc<dyn CountryDatabase>,
    work_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    result_tx: mpsc::Sender<(String, Resolution)>,
) {
    loop {
        let next = work_rx.lock().await.recv().await;
        let Some(visitor) = next else {
            break;
        };

        let resolution = match lookup_country(db.as_ref(), &visitor).await {
            Ok(country) => Resolution::Country(country),
            Err(e) => {
                warn!("Country lookup failed for {}: {}", visitor, e);
                Resolution::Unresolved
            }
        };

        if result_tx.send((visitor, resolution)).await.is_err() {
            break;
        }
    }
}

/// Single writer of the result map
async fn collect_results(
    mut result_rx: mpsc::Receiver<(String, Resolution)>,
    expected: usize,
) -> HashMap<String, Resolution> {
    let mut countries = HashMap::with_capacity(expected);
    while let Some((visitor, resolution)) = result_rx.recv().await {
        countries.insert(visitor, resolution);
    }
    countries
}

async fn lookup_country(db: &dyn CountryDatabase, visitor: &str) -> Result<String, GeoIpError> {
    let ip = resolve_ip(visitor).await?;
    db.country(ip)
}

/// Literal addresses are used as-is, host names take their first DNS answer
async fn resolve_ip(visitor: &str) -> Result<IpAddr, GeoIpError> {
    if let Ok(ip) = visitor.parse::<IpAddr>() {
        return Ok(ip);
    }

    let mut addrs = lookup_host((visitor, 0))
        .await
        .map_err(|e| GeoIpError::Resolve {
            host: visitor.to_string(),
            reason: e.to_string(),
        })?;

    addrs
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| GeoIpError::NoAddress {
            host: visitor.to_string(),
        })
}
