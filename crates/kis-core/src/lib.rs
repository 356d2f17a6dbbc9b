//! Core domain types for the KIS trading client.
//!
//! This crate provides fundamental types used throughout the trading system:
//! - `Price`: precision-safe won amount
//! - `StockCode`: 6-digit KRX listing code
//! - `OrderRequest`, `OrderSide`, `OrderType`: order intake types
//! - `ExecutionEvent`: a decoded fill/acceptance notice
//! - `MarketHours`: KST trading-hours window

pub mod decimal;
pub mod error;
pub mod execution;
pub mod hours;
pub mod order;
pub mod tick;

pub use decimal::Price;
pub use error::{CoreError, Result};
pub use execution::{CorrectionKind, ExecutionEvent, ExecutionPhase};
pub use hours::MarketHours;
pub use order::{OrderRequest, OrderSide, OrderType, StockCode, TradingMode};
pub use tick::{align_to_tick, tick_unit, TickRounding};
