//! Access log line extraction
//!
//! Turns one line of the combined log format into a `LogRecord`:
//! `address - - [timestamp] "method path protocol" status size "referrer" "user-agent"`

use chrono::{DateTime, FixedOffset};
use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::error::ParseError;

/// Timestamp layout inside the square brackets, e.g. `10/Oct/2024:13:55:36 -0700`
pub const TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Layout of the day key that buckets every per-day metric
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// One parsed access log line
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub address: String,
    pub timestamp: DateTime<FixedOffset>,
    pub method: String,
    /// Percent-decoded request path (raw value if decoding failed)
    pub url_path: String,
    pub status: u16,
    /// Response size in bytes, `-` in the log counts as zero
    pub size: u64,
    /// Percent-decoded referrer (raw value if decoding failed)
    pub referrer: String,
    pub user_agent: String,
}

impl LogRecord {
    /// Calendar day of the record in its own offset, `YYYY-MM-DD`
    pub fn day_key(&self) -> String {
        self.timestamp.format(DAY_FORMAT).to_string()
    }
}

pub struct LogParser {
    line_regex: Regex,
}

impl LogParser {
    pub fn new() -> Self {
        // Ident and auth user are usually "-" but are accepted as any token.
        // Status and size are captured loosely so a bad value reports its own error.
        let line_regex = Regex::new(
            r#"^(?P<address>\S+)\s+\S+\s+\S+\s+\[(?P<time>[^\]]+)\]\s+"(?P<method>[^"\s]+)\s+(?P<path>[^"\s]+)(?:\s+(?P<protocol>[^"]*))?"\s+(?P<status>\S+)\s+(?P<size>\S+)\s+"(?P<referrer>[^"]*)"\s+"(?P<agent>[^"]*)""#,
        )
        .expect("access log regex is valid");

        Self { line_regex }
    }

    pub fn parse_line(&self, line: &str) -> Result<LogRecord, ParseError> {
        let captures = self
            .line_regex
            .captures(line.trim_end_matches(['\r', '\n']))
            .ok_or(ParseError::Malformed)?;

        // All named groups except protocol are mandatory in the pattern
        let field = |name: &str| captures.name(name).map(|m| m.as_str()).unwrap_or_default();

        Ok(LogRecord {
            address: field("address").to_string(),
            timestamp: parse_timestamp(field("time"))?,
            method: field("method").to_string(),
            url_path: decode_lenient(field("path")),
            status: parse_status(field("status"))?,
            size: parse_size(field("size"))?,
            referrer: decode_lenient(field("referrer")),
            user_agent: field("agent").to_string(),
        })
    }
}

impl Default for LogParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    DateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|_| ParseError::Timestamp {
        value: value.to_string(),
    })
}

fn parse_status(value: &str) -> Result<u16, ParseError> {
    value.parse::<u16>().map_err(|_| ParseError::Status {
        value: value.to_string(),
    })
}

fn parse_size(value: &str) -> Result<u64, ParseError> {
    if value == "-" {
        return Ok(0);
    }
    value.parse::<u64>().map_err(|_| ParseError::Size {
        value: value.to_string(),
    })
}

/// Percent-decode a path or referrer, keeping the raw text when the
/// escape sequences are broken or decode to invalid UTF-8
fn decode_lenient(raw: &str) -> String {
    if !has_valid_escapes(raw) {
        return raw.to_string();
    }
    match percent_decode_str(raw).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    }
}

fn has_valid_escapes(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3);
            match hex {
                Some(pair) if pair.iter().all(u8::is_ascii_hexdigit) => i += 3,
                _ => return false,
            }
        } else {
            i += 1;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    const LINE: &str = r#"203.0.113.7 - - [10/Oct/2024:13:55:36 -0700] "GET /docs/getting%20started.html HTTP/1.1" 200 2326 "https://example.com/search?q=rust%21" "Mozilla/5.0 (X11; Linux x86_64)""#;

    #[test]
    fn parses_combined_line() {
        let parser = LogParser::new();
        let record = parser.parse_line(LINE).unwrap();

        assert_eq!(record.address, "203.0.113.7");
        assert_eq!(record.method, "GET");
        assert_eq!(record.url_path, "/docs/getting started.html");
        assert_eq!(record.status, 200);
        assert_eq!(record.size, 2326);
        assert_eq!(record.referrer, "https://example.com/search?q=rust!");
        assert_eq!(record.user_agent, "Mozilla/5.0 (X11; Linux x86_64)");

        let offset = FixedOffset::west_opt(7 * 3600).unwrap();
        let expected = offset.with_ymd_and_hms(2024, 10, 10, 13, 55, 36).unwrap();
        assert_eq!(record.timestamp, expected);
        assert_eq!(record.timestamp.hour(), 13);
    }

    #[test]
    fn day_key_uses_log_offset() {
        let parser = LogParser::new();
        let line = r#"host.example.org - - [31/Dec/2023:23:30:00 -0500] "GET / HTTP/1.1" 200 10 "-" "curl/8.0""#;
        let record = parser.parse_line(line).unwrap();
        // 04:30 UTC on Jan 1, but the server's own calendar day is kept
        assert_eq!(record.day_key(), "2023-12-31");
    }

    #[test]
    fn dash_size_is_zero() {
        let parser = LogParser::new();
        let line = r#"10.0.0.1 - - [01/Jan/2024:00:00:00 +0000] "HEAD /index.html HTTP/1.1" 304 - "-" "curl/8.0""#;
        let record = parser.parse_line(line).unwrap();
        assert_eq!(record.size, 0);
        assert_eq!(record.status, 304);
    }

    #[test]
    fn missing_protocol_is_accepted() {
        let parser = LogParser::new();
        let line = r#"10.0.0.1 - - [01/Jan/2024:00:00:00 +0000] "GET /" 200 5 "-" "-""#;
        let record = parser.parse_line(line).unwrap();
        assert_eq!(record.url_path, "/");
        assert_eq!(record.user_agent, "-");
    }

    #[test]
    fn authenticated_user_field_is_accepted() {
        let parser = LogParser::new();
        let line = r#"10.0.0.1 - alice [01/Jan/2024:00:00:00 +0000] "POST /login.php HTTP/2.0" 302 0 "-" "curl/8.0""#;
        let record = parser.parse_line(line).unwrap();
        assert_eq!(record.method, "POST");
        assert_eq!(record.status, 302);
    }

    #[test]
    fn trailing_fields_are_ignored() {
        let parser = LogParser::new();
        let line = format!("{LINE} \"extra\" 0.012\r\n");
        assert!(parser.parse_line(&line).is_ok());
    }

    #[test]
    fn bad_timestamp_fails_line() {
        let parser = LogParser::new();
        let line = r#"10.0.0.1 - - [32/Foo/2024:00:00:00 +0000] "GET / HTTP/1.1" 200 5 "-" "-""#;
        assert_eq!(
            parser.parse_line(line),
            Err(ParseError::Timestamp {
                value: "32/Foo/2024:00:00:00 +0000".to_string()
            })
        );
    }

    #[test]
    fn timestamp_without_offset_fails_line() {
        let parser = LogParser::new();
        let line = r#"10.0.0.1 - - [01/Jan/2024:00:00:00] "GET / HTTP/1.1" 200 5 "-" "-""#;
        assert!(matches!(
            parser.parse_line(line),
            Err(ParseError::Timestamp { .. })
        ));
    }

    #[test]
    fn bad_size_fails_line() {
        let parser = LogParser::new();
        let line = r#"10.0.0.1 - - [01/Jan/2024:00:00:00 +0000] "GET / HTTP/1.1" 200 12kb "-" "-""#;
        assert_eq!(
            parser.parse_line(line),
            Err(ParseError::Size {
                value: "12kb".to_string()
            })
        );
    }

    #[test]
    fn negative_size_fails_line() {
        let parser = LogParser::new();
        let line = r#"10.0.0.1 - - [01/Jan/2024:00:00:00 +0000] "GET / HTTP/1.1" 200 -5 "-" "-""#;
        assert!(matches!(parser.parse_line(line), Err(ParseError::Size { .. })));
    }

    #[test]
    fn bad_status_fails_line() {
        let parser = LogParser::new();
        let line = r#"10.0.0.1 - - [01/Jan/2024:00:00:00 +0000] "GET / HTTP/1.1" OK 5 "-" "-""#;
        assert!(matches!(
            parser.parse_line(line),
            Err(ParseError::Status { .. })
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        let parser = LogParser::new();
        assert_eq!(parser.parse_line("not a log line"), Err(ParseError::Malformed));
        assert_eq!(parser.parse_line(""), Err(ParseError::Malformed));
    }

    #[test]
    fn broken_escape_keeps_raw_path() {
        let parser = LogParser::new();
        let line = r#"10.0.0.1 - - [01/Jan/2024:00:00:00 +0000] "GET /100%zz.html HTTP/1.1" 200 5 "%E0%A4%A" "-""#;
        let record = parser.parse_line(line).unwrap();
        assert_eq!(record.url_path, "/100%zz.html");
        assert_eq!(record.referrer, "%E0%A4%A");
    }

    #[test]
    fn invalid_utf8_escape_keeps_raw_path() {
        assert_eq!(decode_lenient("/a%FFb"), "/a%FFb");
        assert_eq!(decode_lenient("/caf%C3%A9"), "/café");
    }
}
