pub mod event_window;
pub mod snapshot;

pub use event_window::*;
pub use snapshot::*;
