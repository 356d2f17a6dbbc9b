//! Logging and operator notification.

pub mod error;
pub mod logging;
pub mod notify;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use notify::Notifier;
