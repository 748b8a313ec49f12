//! Batch driver: read an access log and fold every line into `LogStats`

use anyhow::{Context, Result};
use chrono::TimeDelta;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

use crate::parser::LogParser;
use crate::stats::LogStats;

const BUFFER_SIZE: usize = 512 * 1024;

/// Accumulated statistics plus how many lines were read and skipped
#[derive(Debug)]
pub struct IngestResult {
    pub stats: LogStats,
    pub lines: u64,
    pub skipped: u64,
}

/// Read the whole file. Malformed lines are logged and skipped; failing to
/// open or read the file is fatal.
pub fn process_log(path: &Path, session_timeout: TimeDelta) -> Result<IngestResult> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;
    info!("Reading access log: {}", path.display());

    let reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let result = process_reader(reader, session_timeout)
        .with_context(|| format!("Failed to read log file: {}", path.display()))?;

    info!(
        "Processed {} lines ({} skipped)",
        result.lines, result.skipped
    );
    Ok(result)
}

/// Fold lines from any reader. Lines are split on `\n`; invalid UTF-8 is
/// replaced rather than rejected.
pub fn process_reader<R: BufRead>(mut reader: R, session_timeout: TimeDelta) -> Result<IngestResult> {
    let parser = LogParser::new();
    let mut stats = LogStats::with_session_timeout(session_timeout);
    let mut lines = 0u64;
    let mut skipped = 0u64;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .context("Failed to read line from log file")?;
        if read == 0 {
            break;
        }
        lines += 1;

        let line = String::from_utf8_lossy(&buf);
        if line.trim().is_empty() {
            skipped += 1;
            continue;
        }

        match parser.parse_line(&line) {
            Ok(record) => stats.record(&record),
            Err(e) => {
                warn!("Skipping line {}: {}", lines, e);
                skipped += 1;
            }
        }
    }

    Ok(IngestResult {
        stats,
        lines,
        skipped,
    })
}
