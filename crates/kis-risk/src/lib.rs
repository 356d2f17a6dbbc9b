//! Per-position risk management.
//!
//! Converts first fills into stop-loss records, evolves them into
//! trailing stops, and closes positions via market sells. The persisted
//! record store is the source of truth; the monitor loop and the fill
//! handler both mutate it through one mutex-guarded accessor.

pub mod atr;
pub mod config;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod record;
pub mod sizing;
pub mod time_stop;

pub use atr::compute_atr;
pub use config::{AtrPolicy, RiskConfig, TimeStopConfig};
pub use engine::{RiskEngine, RiskStateView};
pub use error::{RiskError, RiskResult};
pub use monitor::RiskMonitor;
pub use record::{CloseReason, StopLossRecord, TickAction};
pub use sizing::{position_size, SizingResult};
pub use time_stop::is_flat_volatility;
