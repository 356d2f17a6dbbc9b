//! REST client for the KIS trading API.
//!
//! Covers the endpoints the trading core consumes: cash orders
//! (buy/sell), cancel/revise, current price, daily candles,
//! balance/holdings. Mutating calls carry the hashkey header; every call
//! goes out with a token the session manager has verified fresh.

pub mod client;
pub mod error;
pub mod types;

pub use client::BrokerClient;
pub use error::{BrokerError, BrokerResult};
pub use types::{CurrentPrice, DailyCandle, Holding, OrderAccepted};
