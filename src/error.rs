//! Error types for line extraction and country enrichment

use std::net::IpAddr;
use thiserror::Error;

/// Reasons a raw log line cannot become a `LogRecord`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line does not match the access log format")]
    Malformed,

    #[error("invalid timestamp \"{value}\"")]
    Timestamp { value: String },

    #[error("invalid response size \"{value}\"")]
    Size { value: String },

    #[error("invalid response code \"{value}\"")]
    Status { value: String },
}

/// Failures while resolving a visitor to a country
#[derive(Debug, Error)]
pub enum GeoIpError {
    #[error("cannot open GeoIP database {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("cannot resolve host {host}: {reason}")]
    Resolve { host: String, reason: String },

    #[error("host {host} resolved to no addresses")]
    NoAddress { host: String },

    #[error("{ip} is a private or local address")]
    Private { ip: IpAddr },

    #[error("GeoIP lookup failed for {ip}: {reason}")]
    Lookup { ip: IpAddr, reason: String },

    #[error("no country recorded for {ip}")]
    NotFound { ip: IpAddr },
}
