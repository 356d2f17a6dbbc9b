//! Stop-loss record and its transition rules.
//!
//! One active record per symbol. States: normal stop → trailing →
//! closed. While the trail is inactive the stop sits at
//! `entry − k_stop·atr_at_entry`; once price reaches
//! `entry + atr_at_entry` the record trails with
//! `trail_high − k_trail·atr_current`, and `trail_high` only ever rises.
//! Closing is decided here but executed by the monitor; a record is only
//! marked inactive after the closing sell goes through.

use chrono::{DateTime, Utc};
use kis_core::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CloseReason {
    StopLoss,
    TrailingStop,
    TimeStop,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StopLoss => write!(f, "stop-loss"),
            Self::TrailingStop => write!(f, "trailing-stop"),
            Self::TimeStop => write!(f, "time-stop"),
        }
    }
}

/// Outcome of one monitor tick against a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// Nothing to do.
    Hold,
    /// Switched from normal stop to trailing.
    EnteredTrail,
    /// Trailing high ratcheted up.
    RaisedHigh,
    /// Close at market with the given reason. The record itself is not
    /// mutated; the caller marks it closed after the sell succeeds.
    Close(CloseReason),
}

/// Persisted per-symbol stop state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopLossRecord {
    pub stock_code: String,
    pub entry_price: Price,
    pub atr_at_entry: Price,
    pub stop_loss_price: Price,
    pub quantity: u32,
    pub active: bool,
    pub trail_active: bool,
    pub trail_high: Price,
    /// ATR currently used for the trailing distance.
    pub atr_current: Price,
    pub last_atr_update_time: DateTime<Utc>,
    pub entry_time: DateTime<Utc>,
}

impl StopLossRecord {
    /// Create a record on first fill.
    pub fn open(
        stock_code: String,
        entry_price: Price,
        atr: Price,
        quantity: u32,
        entry_time: DateTime<Utc>,
        k_stop: Decimal,
    ) -> Self {
        Self {
            stock_code,
            entry_price,
            atr_at_entry: atr,
            stop_loss_price: entry_price - atr * k_stop,
            quantity,
            active: true,
            trail_active: false,
            trail_high: Price::ZERO,
            atr_current: atr,
            last_atr_update_time: entry_time,
            entry_time,
        }
    }

    /// The stop that applies right now.
    pub fn effective_stop(&self, k_trail: Decimal) -> Price {
        if self.trail_active {
            self.trail_high - self.atr_current * k_trail
        } else {
            self.stop_loss_price
        }
    }

    /// Evaluate one price observation. Trail entry and high-water
    /// updates mutate the record; a close decision does not.
    pub fn evaluate_tick(&mut self, current_price: Price, k_trail: Decimal) -> TickAction {
        if !self.active {
            return TickAction::Hold;
        }

        if !self.trail_active {
            // Trail entry takes priority over the stop check: at
            // entry + atr both cannot hold at once
            if current_price >= self.entry_price + self.atr_at_entry {
                self.trail_active = true;
                self.trail_high = current_price;
                return TickAction::EnteredTrail;
            }

            if current_price <= self.stop_loss_price {
                return TickAction::Close(CloseReason::StopLoss);
            }

            return TickAction::Hold;
        }

        if current_price > self.trail_high {
            self.trail_high = current_price;
            return TickAction::RaisedHigh;
        }

        if current_price <= self.effective_stop(k_trail) {
            return TickAction::Close(CloseReason::TrailingStop);
        }

        TickAction::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const K_STOP: Decimal = Decimal::TWO;
    const K_TRAIL: Decimal = Decimal::TWO;

    fn record() -> StopLossRecord {
        StopLossRecord::open(
            "005930".to_string(),
            Price::new(dec!(10000)),
            Price::new(dec!(200)),
            10,
            Utc::now(),
            K_STOP,
        )
    }

    #[test]
    fn test_initial_stop_price() {
        let r = record();
        assert_eq!(r.stop_loss_price, Price::new(dec!(9600)));
        assert!(!r.trail_active);
        assert!(r.active);
    }

    #[test]
    fn test_stop_loss_close_at_threshold() {
        let mut r = record();
        let action = r.evaluate_tick(Price::new(dec!(9600)), K_TRAIL);
        assert_eq!(action, TickAction::Close(CloseReason::StopLoss));
        // The record stays live until the sell goes through
        assert!(r.active);
    }

    #[test]
    fn test_hold_between_stop_and_trail_threshold() {
        let mut r = record();
        assert_eq!(r.evaluate_tick(Price::new(dec!(9601)), K_TRAIL), TickAction::Hold);
        assert_eq!(r.evaluate_tick(Price::new(dec!(10199)), K_TRAIL), TickAction::Hold);
        assert!(!r.trail_active);
    }

    #[test]
    fn test_trail_entry_at_entry_plus_atr() {
        let mut r = record();
        let action = r.evaluate_tick(Price::new(dec!(10300)), K_TRAIL);
        assert_eq!(action, TickAction::EnteredTrail);
        assert!(r.trail_active);
        assert_eq!(r.trail_high, Price::new(dec!(10300)));
    }

    #[test]
    fn test_trail_entry_exactly_at_threshold() {
        let mut r = record();
        let action = r.evaluate_tick(Price::new(dec!(10200)), K_TRAIL);
        assert_eq!(action, TickAction::EnteredTrail);
        assert_eq!(r.trail_high, Price::new(dec!(10200)));
    }

    #[test]
    fn test_trail_never_reverts() {
        let mut r = record();
        r.evaluate_tick(Price::new(dec!(10300)), K_TRAIL);
        assert!(r.trail_active);

        // A dip below the entry threshold keeps trailing
        r.evaluate_tick(Price::new(dec!(10100)), K_TRAIL);
        assert!(r.trail_active);
    }

    #[test]
    fn test_trail_high_monotonic() {
        let mut r = record();
        r.evaluate_tick(Price::new(dec!(10300)), K_TRAIL);

        assert_eq!(
            r.evaluate_tick(Price::new(dec!(10500)), K_TRAIL),
            TickAction::RaisedHigh
        );
        assert_eq!(r.trail_high, Price::new(dec!(10500)));

        // Lower print never lowers the high
        r.evaluate_tick(Price::new(dec!(10400)), K_TRAIL);
        assert_eq!(r.trail_high, Price::new(dec!(10500)));
    }

    #[test]
    fn test_trailing_stop_close() {
        let mut r = record();
        r.evaluate_tick(Price::new(dec!(10300)), K_TRAIL);
        r.evaluate_tick(Price::new(dec!(11000)), K_TRAIL);
        assert_eq!(r.trail_high, Price::new(dec!(11000)));

        // Effective stop: 11000 - 2*200 = 10600
        assert_eq!(r.effective_stop(K_TRAIL), Price::new(dec!(10600)));
        let action = r.evaluate_tick(Price::new(dec!(10600)), K_TRAIL);
        assert_eq!(action, TickAction::Close(CloseReason::TrailingStop));
    }

    #[test]
    fn test_trailing_stop_uses_current_atr() {
        let mut r = record();
        r.evaluate_tick(Price::new(dec!(10300)), K_TRAIL);
        r.evaluate_tick(Price::new(dec!(11000)), K_TRAIL);

        // Refreshed ATR widens the stop
        r.atr_current = Price::new(dec!(300));
        assert_eq!(r.effective_stop(K_TRAIL), Price::new(dec!(10400)));
        assert_eq!(
            r.evaluate_tick(Price::new(dec!(10500)), K_TRAIL),
            TickAction::Hold
        );
        assert_eq!(
            r.evaluate_tick(Price::new(dec!(10400)), K_TRAIL),
            TickAction::Close(CloseReason::TrailingStop)
        );
    }

    #[test]
    fn test_inactive_record_holds() {
        let mut r = record();
        r.active = false;
        assert_eq!(
            r.evaluate_tick(Price::new(dec!(1)), K_TRAIL),
            TickAction::Hold
        );
    }

    #[test]
    fn test_close_reason_labels() {
        assert_eq!(CloseReason::StopLoss.to_string(), "stop-loss");
        assert_eq!(CloseReason::TrailingStop.to_string(), "trailing-stop");
        assert_eq!(CloseReason::TimeStop.to_string(), "time-stop");
    }
}
