//! Loot log line parsing.
//!
//! The game client appends one line per chat event. Only the loot lines are
//! of interest:
//!
//! ```text
//! [24/11/25] [00:29:29]: You receive 3 Iron Ore.
//! ```
//!
//! Everything else in the file (chat, partial writes, other system messages)
//! is skipped without being reported.

use crate::error::{MonitorError, MonitorResult};
use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::OnceLock;

/// Item name the game uses for its currency.
pub const CURRENCY_ITEM: &str = "Yang";

/// `strftime` format of the combined date and time fields.
const LOG_TIMESTAMP_FORMAT: &str = "%d/%m/%y %H:%M:%S";

static LOOT_LINE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn loot_line_pattern() -> &'static Regex {
    LOOT_LINE_PATTERN.get_or_init(|| {
        Regex::new(
            r"\[([0-9]{2}/[0-9]{2}/[0-9]{2})\] \[([0-9]{2}:[0-9]{2}:[0-9]{2})\]: You receive ([0-9]+) (.+?)\.",
        )
        .expect("loot line pattern is valid")
    })
}

/// One parsed loot record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootEvent {
    /// Local date and time from the log line (no timezone)
    pub timestamp: NaiveDateTime,
    /// Amount received
    pub quantity: u64,
    /// Name of what was received
    pub item: String,
}

impl LootEvent {
    pub fn new(timestamp: NaiveDateTime, quantity: u64, item: impl Into<String>) -> Self {
        Self {
            timestamp,
            quantity,
            item: item.into(),
        }
    }

    /// Whether this event credits the currency rather than an item.
    pub fn is_currency(&self) -> bool {
        self.item == CURRENCY_ITEM
    }
}

/// Combine the log's `DD/MM/YY` and `HH:MM:SS` fields into a timestamp.
///
/// Returns `None` for impossible dates such as `31/02/25`.
pub fn parse_log_timestamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&format!("{} {}", date, time), LOG_TIMESTAMP_FORMAT).ok()
}

/// Parse a single log line into a [`LootEvent`].
///
/// Non-matching lines are the common case and yield `None`; this function
/// never fails.
pub fn parse_log_line(line: &str) -> Option<LootEvent> {
    let captures = loot_line_pattern().captures(line)?;

    let timestamp = parse_log_timestamp(&captures[1], &captures[2])?;
    // Digit runs too long for u64 are treated like any other garbage line.
    let quantity = captures[3].parse::<u64>().ok()?;

    Some(LootEvent::new(timestamp, quantity, &captures[4]))
}

/// Decode raw log bytes, dropping any sequence that is not valid UTF-8.
///
/// Invalid bytes are removed rather than replaced with U+FFFD, so an item
/// name with a stray byte still aggregates under its readable name.
pub fn decode_log_bytes(bytes: &[u8]) -> String {
    let mut decoded = String::with_capacity(bytes.len());
    let mut rest = bytes;

    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                decoded.push_str(valid);
                return decoded;
            }
            Err(error) => {
                let (valid, invalid) = rest.split_at(error.valid_up_to());
                decoded.push_str(std::str::from_utf8(valid).unwrap_or_default());
                // error_len() is None only for a truncated sequence at the very end
                let skip = error.error_len().unwrap_or(invalid.len());
                rest = &invalid[skip..];
            }
        }
    }
}

/// Read every loot event from a log file, in file order.
///
/// Bytes that are not valid UTF-8 are dropped rather than rejected, so a
/// single corrupted line does not hide the rest of the file.
///
/// # Arguments
/// * `path` - Path to the loot log
///
/// # Returns
/// The parsed events, or `MonitorError::OpenFailed` when the file cannot be opened
pub fn read_events_from_file(path: impl AsRef<Path>) -> MonitorResult<Vec<LootEvent>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| MonitorError::open_failed(path, e))?;
    let mut reader = BufReader::new(file);

    let mut events = Vec::new();
    let mut buffer = Vec::new();
    let mut line_count = 0usize;

    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            break;
        }
        line_count += 1;

        if let Some(event) = parse_log_line(&decode_log_bytes(&buffer)) {
            events.push(event);
        }
    }

    tracing::debug!(
        file_path = %path.display(),
        line_count,
        event_count = events.len(),
        "📁 Loot log read"
    );

    Ok(events)
}
