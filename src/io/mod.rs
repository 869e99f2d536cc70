//! I/O utilities for reading the game's loot log.
//!
//! This module turns raw log lines into structured loot events, both one line
//! at a time (for the live tailer) and for a whole file at once.

pub mod loot_log;

// Re-export commonly used types and functions
pub use loot_log::{
    decode_log_bytes, parse_log_line, read_events_from_file, LootEvent, CURRENCY_ITEM,
};
