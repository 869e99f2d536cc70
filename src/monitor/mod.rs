//! ライブ監視（ログ追跡タスクとセッション管理）

pub mod session;
pub mod tailer;

pub use session::{MonitorSession, SessionState, StartOutcome, StopOutcome, DEFAULT_STOP_TIMEOUT};
pub use tailer::{
    MonitorEvent, Tailer, TailerConfig, TailerState, TailerSummary, DEFAULT_IDLE_DELAY,
};
