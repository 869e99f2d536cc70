pub mod analytics;
pub mod config_manager;
pub mod display;
pub mod error;
pub mod io;
pub mod monitor;
pub mod utils;

// Re-export the main error types for convenience
pub use error::{MonitorError, MonitorResult};

// Re-export I/O utilities for convenience
pub use io::{parse_log_line, read_events_from_file, LootEvent, CURRENCY_ITEM};

// Re-export analytics modules
pub use analytics::{compute_snapshot, EventWindow, ItemStats, StatsSnapshot};

// Re-export configuration and monitor types
pub use config_manager::{AppConfig, ConfigManager, LogConfig, MonitorSettings};
pub use monitor::{MonitorEvent, MonitorSession, StartOutcome, StopOutcome};
