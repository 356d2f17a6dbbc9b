//! Durable state for the trading core.
//!
//! `JsonStore` is the mutex-guarded read-modify-write document store
//! backing the watch registry and the stop-loss records; the trade log is
//! an append-only JSON Lines file.

pub mod error;
pub mod json_store;
pub mod trade_log;

pub use error::{StoreError, StoreResult};
pub use json_store::JsonStore;
pub use trade_log::{TradeLogEntry, TradeLogWriter};
