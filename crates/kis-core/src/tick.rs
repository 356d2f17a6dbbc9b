//! KRX price-tick ladder.
//!
//! Limit and stop prices must land on an exchange tick. The unit depends
//! on the price band: 1 won below 2,000 up to 1,000 won at 500,000 and
//! above.

use crate::decimal::Price;
use rust_decimal::Decimal;

/// Rounding direction when aligning a price to its tick unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickRounding {
    /// Round down (used for stop prices so the stop is never above target).
    Floor,
    /// Round to nearest tick.
    Nearest,
    /// Round up.
    Ceil,
}

/// Tick unit for a given price level.
pub fn tick_unit(price: i64) -> i64 {
    match price {
        p if p < 2_000 => 1,
        p if p < 5_000 => 5,
        p if p < 20_000 => 10,
        p if p < 50_000 => 50,
        p if p < 200_000 => 100,
        p if p < 500_000 => 500,
        _ => 1_000,
    }
}

/// Align a price onto the KRX tick ladder.
pub fn align_to_tick(price: Price, rounding: TickRounding) -> Price {
    let won = price.to_won();
    let unit = tick_unit(won);
    let rem = won.rem_euclid(unit);

    let aligned = match rounding {
        TickRounding::Floor => won - rem,
        TickRounding::Ceil => {
            if rem == 0 {
                won
            } else {
                won - rem + unit
            }
        }
        TickRounding::Nearest => {
            if rem * 2 >= unit {
                won - rem + unit
            } else {
                won - rem
            }
        }
    };

    Price::new(Decimal::from(aligned))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tick_unit_bands() {
        assert_eq!(tick_unit(1_999), 1);
        assert_eq!(tick_unit(2_000), 5);
        assert_eq!(tick_unit(4_999), 5);
        assert_eq!(tick_unit(5_000), 10);
        assert_eq!(tick_unit(19_999), 10);
        assert_eq!(tick_unit(20_000), 50);
        assert_eq!(tick_unit(49_999), 50);
        assert_eq!(tick_unit(50_000), 100);
        assert_eq!(tick_unit(199_999), 100);
        assert_eq!(tick_unit(200_000), 500);
        assert_eq!(tick_unit(499_999), 500);
        assert_eq!(tick_unit(500_000), 1_000);
    }

    #[test]
    fn test_align_floor() {
        let p = align_to_tick(Price::new(dec!(10_237)), TickRounding::Floor);
        assert_eq!(p.to_won(), 10_230);
    }

    #[test]
    fn test_align_ceil() {
        let p = align_to_tick(Price::new(dec!(10_231)), TickRounding::Ceil);
        assert_eq!(p.to_won(), 10_240);

        // Already on a tick stays put
        let p = align_to_tick(Price::new(dec!(10_230)), TickRounding::Ceil);
        assert_eq!(p.to_won(), 10_230);
    }

    #[test]
    fn test_align_nearest() {
        assert_eq!(
            align_to_tick(Price::new(dec!(10_235)), TickRounding::Nearest).to_won(),
            10_240
        );
        assert_eq!(
            align_to_tick(Price::new(dec!(10_234)), TickRounding::Nearest).to_won(),
            10_230
        );
    }

    #[test]
    fn test_align_fractional_stop() {
        // A stop computed from a fractional ATR lands on a whole tick
        let stop = align_to_tick(Price::new(dec!(9_649.5)), TickRounding::Floor);
        assert_eq!(stop.to_won(), 9_640);
    }
}
