//! Average True Range over daily candles.
//!
//! TR = max(high − low, |high − prev close|, |low − prev close|);
//! ATR is the mean of the most recent `period` true ranges. Candles come
//! from the broker newest-first.

use kis_broker::DailyCandle;
use kis_core::Price;
use rust_decimal::Decimal;

/// True range of one candle given the previous close.
pub fn true_range(candle: &DailyCandle, prev_close: Price) -> Decimal {
    let hl = candle.high.inner() - candle.low.inner();
    let hc = (candle.high.inner() - prev_close.inner()).abs();
    let lc = (candle.low.inner() - prev_close.inner()).abs();
    hl.max(hc).max(lc)
}

/// Rolling-mean ATR over `period` days. Needs `period + 1` candles,
/// newest first; returns `None` with fewer.
pub fn compute_atr(candles: &[DailyCandle], period: usize) -> Option<Price> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }

    let mut sum = Decimal::ZERO;
    for i in 0..period {
        let prev_close = candles[i + 1].close;
        sum += true_range(&candles[i], prev_close);
    }

    Some(Price::new(sum / Decimal::from(period as u64)))
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
    fn test_true_range_picks_widest_measure() {
        // Plain high-low range
        assert_eq!(true_range(&candle(10200, 10000, 10100), Price::from(10100)), dec!(200));
        // Gap up: high minus previous close dominates
        assert_eq!(true_range(&candle(10500, 10400, 10450), Price::from(10000)), dec!(500));
        // Gap down: previous close minus low dominates
        assert_eq!(true_range(&candle(9700, 9600, 9650), Price::from(10000)), dec!(400));
    }

    #[test]
    fn test_atr_is_mean_of_true_ranges() {
        // Newest first; constant 100-point ranges, no gaps
        let candles = vec![
            candle(10300, 10200, 10250),
            candle(10300, 10200, 10250),
            candle(10300, 10200, 10250),
            candle(10300, 10200, 10250),
        ];
        let atr = compute_atr(&candles, 3).unwrap();
        assert_eq!(atr, Price::new(dec!(100)));
    }

    #[test]
    fn test_atr_requires_period_plus_one() {
        let candles = vec![candle(10300, 10200, 10250); 3];
        assert!(compute_atr(&candles, 3).is_none());
        assert!(compute_atr(&candles, 2).is_some());
    }

    #[test]
    fn test_atr_zero_period_rejected() {
        let candles = vec![candle(10300, 10200, 10250); 2];
        assert!(compute_atr(&candles, 0).is_none());
    }
}
