//! Flat-volatility time-stop.
//!
//! A position still in the normal-stop state gets closed when the market
//! has gone quiet: the true range of each of the last `days` trading days
//! stayed below `fraction · atr_at_entry`.

use crate::atr::true_range;
use kis_broker::DailyCandle;
use kis_core::Price;
use rust_decimal::Decimal;

/// Check the compression condition over `days` consecutive days.
/// Candles are newest first; needs `days + 1` of them.
pub fn is_flat_volatility(
    candles: &[DailyCandle],
    days: usize,
    atr_at_entry: Price,
    fraction: Decimal,
) -> bool {
    if days == 0 || candles.len() < days + 1 {
        return false;
    }

    let threshold = atr_at_entry.inner() * fraction;
    (0..days).all(|i| true_range(&candles[i], candles[i + 1].close) < threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(high: i64, low: i64, close: i64) -> DailyCandle {
        DailyCandle {
            date: "20260805".to_string(),
            open: Price::from(low),
            high: Price::from(high),
            low: Price::from(low),
            close: Price::from(close),
            volume: 1000,
        }
    }

    #[test]
    fn test_compressed_days_trigger() {
        // Entry ATR 200, fraction 0.5 -> threshold 100; ranges of 50
        let candles = vec![
            candle(10050, 10000, 10020),
            candle(10050, 10000, 10020),
            candle(10050, 10000, 10020),
            candle(10050, 10000, 10020),
        ];
        assert!(is_flat_volatility(
            &candles,
            3,
            Price::new(dec!(200)),
            dec!(0.5)
        ));
    }

    #[test]
    fn test_one_wide_day_resets() {
        let candles = vec![
            candle(10050, 10000, 10020),
            candle(10300, 10000, 10100), // 300-point day in the window
            candle(10050, 10000, 10020),
            candle(10050, 10000, 10020),
        ];
        assert!(!is_flat_volatility(
            &candles,
            3,
            Price::new(dec!(200)),
            dec!(0.5)
        ));
    }

    #[test]
    fn test_range_at_threshold_does_not_count() {
        // Range exactly equal to the threshold is not compressed
        let candles = vec![
            candle(10100, 10000, 10050),
            candle(10100, 10000, 10050),
            candle(10100, 10000, 10050),
        ];
        assert!(!is_flat_volatility(
            &candles,
            2,
            Price::new(dec!(200)),
            dec!(0.5)
        ));
    }

    #[test]
    fn test_too_few_candles() {
        let candles = vec![candle(10050, 10000, 10020); 3];
        assert!(!is_flat_volatility(
            &candles,
            3,
            Price::new(dec!(200)),
            dec!(0.5)
        ));
    }
}
