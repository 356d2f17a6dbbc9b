//! Decoded execution-notice events.
//!
//! One `ExecutionEvent` is produced per decrypted notice frame that passes
//! the account and reject-flag checks. Field semantics follow the
//! brokerage's notice schema; raw flag codes are resolved to enums at
//! parse time and never re-inspected as strings downstream.

use crate::decimal::Price;
use crate::order::{OrderSide, StockCode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether the notice reports order acceptance or an actual fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPhase {
    /// Order accepted by the exchange, nothing filled yet.
    Accepted,
    /// Shares changed hands.
    Filled,
}

/// Correction status of the order the notice refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionKind {
    /// Original order, no revision.
    None,
    /// Quantity/price revision of a prior order.
    Revised,
    /// Cancellation of a prior order.
    Cancelled,
}

impl fmt::Display for CorrectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Revised => write!(f, "revised"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A fill or acceptance event for the authenticated account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub order_id: String,
    /// Order id of the original order when this notice covers a
    /// revision or cancellation; empty otherwise.
    pub original_order_id: String,
    pub stock_code: StockCode,
    pub symbol_name: String,
    pub side: OrderSide,
    pub correction: CorrectionKind,
    pub phase: ExecutionPhase,
    /// Shares filled by this event; zero for acceptances.
    pub filled_qty: u32,
    /// Price of this fill; zero for acceptances.
    pub fill_price: Price,
    /// Total quantity of the order per the notice.
    pub order_qty: u32,
    /// Exchange event time, HHMMSS.
    pub event_time: String,
}

impl ExecutionEvent {
    /// True when the event actually moved shares.
    pub fn is_fill(&self) -> bool {
        self.phase == ExecutionPhase::Filled && self.filled_qty > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn event(phase: ExecutionPhase, filled_qty: u32) -> ExecutionEvent {
        ExecutionEvent {
            order_id: "0000117057".to_string(),
            original_order_id: String::new(),
            stock_code: StockCode::new("005930").unwrap(),
            symbol_name: "삼성전자".to_string(),
            side: OrderSide::Buy,
            correction: CorrectionKind::None,
            phase,
            filled_qty,
            fill_price: Price::new(dec!(71000)),
            order_qty: 10,
            event_time: "091532".to_string(),
        }
    }

    #[test]
    fn test_acceptance_is_not_a_fill() {
        assert!(!event(ExecutionPhase::Accepted, 0).is_fill());
    }

    #[test]
    fn test_filled_event_is_a_fill() {
        assert!(event(ExecutionPhase::Filled, 5).is_fill());
    }

    #[test]
    fn test_zero_qty_fill_is_not_a_fill() {
        assert!(!event(ExecutionPhase::Filled, 0).is_fill());
    }
}
