//! ATR-based position sizing.
//!
//! Quantity is the risk budget (a percentage of total assets) divided by
//! the ATR, so a one-ATR adverse move costs exactly the budget. The
//! invested amount is capped at 80% of assets, and the derived stop is
//! floored onto the exchange tick ladder.

use kis_core::{align_to_tick, Price, TickRounding};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Ceiling on invested amount as a share of total assets.
const MAX_INVESTED_RATIO: Decimal = Decimal::from_parts(80, 0, 0, false, 0);

/// Sizing outcome for display and order construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SizingResult {
    pub quantity: u32,
    /// Suggested initial stop, one ATR under the current price, on-tick.
    pub stop_price: Price,
    pub invested_amount: Decimal,
    /// Invested share of total assets, percent.
    pub invested_ratio: Decimal,
    /// True when the 80% ceiling reduced the quantity.
    pub capped: bool,
}

/// Size a position from total assets, a loss budget in percent, the ATR,
/// and the current price. Returns `None` when the inputs cannot produce
/// a positive quantity.
pub fn position_size(
    total_asset: i64,
    loss_percent: Decimal,
    atr: Price,
    current_price: Price,
) -> Option<SizingResult> {
    if total_asset <= 0 || !atr.is_positive() || !current_price.is_positive() {
        return None;
    }

    let asset = Decimal::from(total_asset);
    let risk_amount = asset * loss_percent.abs() / Decimal::ONE_HUNDRED;
    let mut quantity = (risk_amount / atr.inner()).floor();
    if quantity <= Decimal::ZERO {
        return None;
    }

    let mut invested = quantity * current_price.inner();
    let mut capped = false;

    let ceiling = asset * MAX_INVESTED_RATIO / Decimal::ONE_HUNDRED;
    if invested > ceiling {
        quantity = (ceiling / current_price.inner()).floor();
        if quantity <= Decimal::ZERO {
            return None;
        }
        invested = quantity * current_price.inner();
        capped = true;
    }

    let stop_price = align_to_tick(current_price - atr, TickRounding::Floor);

    Some(SizingResult {
        quantity: quantity.to_u32()?,
        stop_price,
        invested_amount: invested,
        invested_ratio: invested / asset * Decimal::ONE_HUNDRED,
        capped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quantity_from_risk_budget() {
        // 10M won, 1% budget = 100k; ATR 200 -> 500 shares, but that
        // would cost 500 * 10000 = 5M (50%), under the cap
        let result = position_size(
            10_000_000,
            dec!(1),
            Price::new(dec!(200)),
            Price::new(dec!(10000)),
        )
        .unwrap();

        assert_eq!(result.quantity, 500);
        assert!(!result.capped);
        assert_eq!(result.invested_amount, dec!(5_000_000));
        assert_eq!(result.invested_ratio, dec!(50));
    }

    #[test]
    fn test_cap_at_80_percent() {
        // 2% of 10M = 200k; ATR 20 -> 10000 shares at 10000 won each
        // would be 100M; capped to 800 shares (8M, 80%)
        let result = position_size(
            10_000_000,
            dec!(2),
            Price::new(dec!(20)),
            Price::new(dec!(10000)),
        )
        .unwrap();

        assert!(result.capped);
        assert_eq!(result.quantity, 800);
        assert_eq!(result.invested_ratio, dec!(80));
    }

    #[test]
    fn test_stop_price_on_tick() {
        let result = position_size(
            10_000_000,
            dec!(1),
            Price::new(dec!(333)),
            Price::new(dec!(10000)),
        )
        .unwrap();

        // 10000 - 333 = 9667, tick unit 10 -> floored to 9660
        assert_eq!(result.stop_price.to_won(), 9660);
    }

    #[test]
    fn test_budget_too_small_for_one_share() {
        // 0.01% of 1M = 100 won risk; ATR 200 -> zero shares
        assert!(position_size(
            1_000_000,
            dec!(0.01),
            Price::new(dec!(200)),
            Price::new(dec!(10000))
        )
        .is_none());
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(position_size(0, dec!(1), Price::new(dec!(200)), Price::new(dec!(10000))).is_none());
        assert!(position_size(1_000_000, dec!(1), Price::ZERO, Price::new(dec!(10000))).is_none());
        assert!(position_size(1_000_000, dec!(1), Price::new(dec!(200)), Price::ZERO).is_none());
    }

    #[test]
    fn test_negative_budget_treated_as_magnitude() {
        let result = position_size(
            10_000_000,
            dec!(-1),
            Price::new(dec!(200)),
            Price::new(dec!(10000)),
        )
        .unwrap();
        assert_eq!(result.quantity, 500);
    }
}
