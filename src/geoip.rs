//! GeoIP country lookup using a MaxMind GeoLite2 database

use maxminddb::{PathElement, Reader};
use std::net::IpAddr;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::GeoIpError;

/// Source of country names for IP addresses.
/// Implementations must be safe to query from several workers at once.
pub trait CountryDatabase: Send + Sync {
    fn country(&self, ip: IpAddr) -> Result<String, GeoIpError>;
}

/// GeoIP reader wrapper
pub struct GeoIp {
    reader: Reader<Vec<u8>>,
    locale: String,
}

impl GeoIp {
    /// Open the database. Country names are read in `locale` (e.g. "en").
    pub fn open(database_path: &str, locale: &str) -> Result<Self, GeoIpError> {
        let path = Path::new(database_path);

        if !path.exists() {
            warn!("GeoIP database not found at: {}", database_path);
            warn!(
                "Download GeoLite2-Country.mmdb from MaxMind and place it at: {}",
                database_path
            );
            return Err(GeoIpError::Open {
                path: database_path.to_string(),
                reason: "file does not exist".to_string(),
            });
        }

        match Reader::open_readfile(path) {
            Ok(reader) => {
                info!("GeoIP database loaded: {}", database_path);
                Ok(Self {
                    reader,
                    locale: locale.to_string(),
                })
            }
            Err(e) => Err(GeoIpError::Open {
                path: database_path.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn country_name(&self, ip: IpAddr, record: &str) -> Result<Option<String>, GeoIpError> {
        let lookup = self.reader.lookup(ip).map_err(|e| GeoIpError::Lookup {
            ip,
            reason: e.to_string(),
        })?;

        lookup
            .decode_path::<String>(&[
                PathElement::Key(record),
                PathElement::Key("names"),
                PathElement::Key(&self.locale),
            ])
            .map_err(|e| GeoIpError::Lookup {
                ip,
                reason: e.to_string(),
            })
    }
}

impl CountryDatabase for GeoIp {
    fn country(&self, ip: IpAddr) -> Result<String, GeoIpError> {
        // Private ranges are never in the database
        if is_private_ip(&ip) {
            return Err(GeoIpError::Private { ip });
        }

        // Anycast and some hosting ranges only carry the registered country
        pick_country(ip, self.country_name(ip, "country"), || {
            self.country_name(ip, "registered_country")
        })
    }
}

/// Use the country record when it has a name, otherwise the registered country
fn pick_country(
    ip: IpAddr,
    country: Result<Option<String>, GeoIpError>,
    registered: impl FnOnce() -> Result<Option<String>, GeoIpError>,
) -> Result<String, GeoIpError> {
    match country {
        Ok(Some(name)) => return Ok(name),
        Ok(None) => {}
        Err(e) => debug!("Unreadable country record, trying registered country: {}", e),
    }
    registered()?.ok_or(GeoIpError::NotFound { ip })
}

/// Check if an IP address is private/local
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private()
                || ipv4.is_loopback()
                || ipv4.is_link_local()
                || ipv4.is_broadcast()
                || ipv4.is_documentation()
                || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => ipv6.is_loopback() || ipv6.is_unspecified(),
    }
}
