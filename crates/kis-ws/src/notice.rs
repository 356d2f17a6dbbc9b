//! Execution-notice plaintext parser.
//!
//! The decrypted payload is caret-delimited with at least 23 fields.
//! Offsets used: account 1, order id 2, original order id 3, side 4
//! ("01" sell / "02" buy), correction 5 ("0" original, "1" revised,
//! "2" cancelled), stock code 8, filled qty 9, fill price 10, event time
//! 11, reject flag 12 ("0" ok), accept-or-fill 13 ("1"/"01" accepted,
//! "2"/"02" filled), order qty 16, symbol name 18.
//!
//! Returns `None` for notices that are not ours (account prefix
//! mismatch), rejected, or too short to parse; none of these are errors.

use kis_core::{CorrectionKind, ExecutionEvent, ExecutionPhase, OrderSide, Price, StockCode};
use tracing::{debug, warn};

/// Minimum caret-delimited fields in a notice plaintext.
const NOTICE_MIN_FIELDS: usize = 23;

fn parse_qty(field: &str) -> u32 {
    if field.is_empty() {
        0
    } else {
        field.parse().unwrap_or(0)
    }
}

fn parse_price(field: &str) -> Price {
    field.parse().unwrap_or(Price::ZERO)
}

/// Parse one decrypted notice. `expected_account_prefix` is the first 8
/// digits of the running account number.
pub fn parse_execution_notice(
    plaintext: &str,
    expected_account_prefix: &str,
) -> Option<ExecutionEvent> {
    let fields: Vec<&str> = plaintext.split('^').collect();
    if fields.len() < NOTICE_MIN_FIELDS {
        warn!(
            fields = fields.len(),
            expected = NOTICE_MIN_FIELDS,
            "Dropping short execution notice"
        );
        return None;
    }

    if !fields[1].starts_with(expected_account_prefix) {
        debug!("Ignoring notice for another account");
        return None;
    }

    if fields[12] != "0" {
        debug!(order_id = fields[2], "Ignoring rejected order notice");
        return None;
    }

    let phase = match fields[13] {
        "1" | "01" => ExecutionPhase::Accepted,
        "2" | "02" => ExecutionPhase::Filled,
        other => {
            warn!(flag = other, "Dropping notice with unknown accept-or-fill flag");
            return None;
        }
    };

    let side = match fields[4] {
        "01" => OrderSide::Sell,
        "02" => OrderSide::Buy,
        other => {
            warn!(flag = other, "Dropping notice with unknown side");
            return None;
        }
    };

    let correction = match fields[5] {
        "1" => CorrectionKind::Revised,
        "2" => CorrectionKind::Cancelled,
        _ => CorrectionKind::None,
    };

    let stock_code = match StockCode::new(fields[8]) {
        Ok(code) => code,
        Err(_) => {
            warn!(code = fields[8], "Dropping notice with malformed stock code");
            return None;
        }
    };

    // Acceptances report the order price in field 10; only count
    // quantity and price as a fill once shares actually moved.
    let (filled_qty, fill_price) = match phase {
        ExecutionPhase::Accepted => (0, Price::ZERO),
        ExecutionPhase::Filled => (parse_qty(fields[9]), parse_price(fields[10])),
    };

    Some(ExecutionEvent {
        order_id: fields[2].to_string(),
        original_order_id: fields[3].to_string(),
        stock_code,
        symbol_name: fields[18].to_string(),
        side,
        correction,
        phase,
        filled_qty,
        fill_price,
        order_qty: parse_qty(fields[16]),
        event_time: fields[11].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const ACCOUNT_PREFIX: &str = "50123456";

    fn notice(overrides: &[(usize, &str)]) -> String {
        let mut fields: Vec<String> = vec![String::new(); 24];
        fields[0] = "HTSID".to_string();
        fields[1] = "5012345601".to_string();
        fields[2] = "0000117057".to_string();
        fields[3] = String::new();
        fields[4] = "02".to_string(); // buy
        fields[5] = "0".to_string();
        fields[8] = "005930".to_string();
        fields[9] = "5".to_string();
        fields[10] = "71000".to_string();
        fields[11] = "091532".to_string();
        fields[12] = "0".to_string();
        fields[13] = "2".to_string(); // filled
        fields[16] = "10".to_string();
        fields[18] = "삼성전자".to_string();
        for &(idx, value) in overrides {
            fields[idx] = value.to_string();
        }
        fields.join("^")
    }

    #[test]
    fn test_parse_fill() {
        let event = parse_execution_notice(&notice(&[]), ACCOUNT_PREFIX).unwrap();
        assert_eq!(event.order_id, "0000117057");
        assert_eq!(event.stock_code.as_str(), "005930");
        assert_eq!(event.side, OrderSide::Buy);
        assert_eq!(event.phase, ExecutionPhase::Filled);
        assert_eq!(event.filled_qty, 5);
        assert_eq!(event.fill_price, Price::new(dec!(71000)));
        assert_eq!(event.order_qty, 10);
        assert!(event.is_fill());
    }

    #[test]
    fn test_acceptance_carries_no_fill() {
        let event =
            parse_execution_notice(&notice(&[(13, "1")]), ACCOUNT_PREFIX).unwrap();
        assert_eq!(event.phase, ExecutionPhase::Accepted);
        assert_eq!(event.filled_qty, 0);
        assert_eq!(event.fill_price, Price::ZERO);
        assert!(!event.is_fill());
    }

    #[test]
    fn test_other_account_ignored() {
        assert!(parse_execution_notice(&notice(&[(1, "9999999901")]), ACCOUNT_PREFIX).is_none());
    }

    #[test]
    fn test_rejected_order_ignored() {
        assert!(parse_execution_notice(&notice(&[(12, "1")]), ACCOUNT_PREFIX).is_none());
    }

    #[test]
    fn test_sell_side() {
        let event = parse_execution_notice(&notice(&[(4, "01")]), ACCOUNT_PREFIX).unwrap();
        assert_eq!(event.side, OrderSide::Sell);
    }

    #[test]
    fn test_correction_kinds() {
        let event = parse_execution_notice(&notice(&[(5, "1")]), ACCOUNT_PREFIX).unwrap();
        assert_eq!(event.correction, CorrectionKind::Revised);

        let event = parse_execution_notice(&notice(&[(5, "2")]), ACCOUNT_PREFIX).unwrap();
        assert_eq!(event.correction, CorrectionKind::Cancelled);
    }

    #[test]
    fn test_short_notice_dropped() {
        assert!(parse_execution_notice("a^b^c", ACCOUNT_PREFIX).is_none());
    }

    #[test]
    fn test_empty_qty_fields_read_as_zero() {
        let event =
            parse_execution_notice(&notice(&[(9, ""), (16, "")]), ACCOUNT_PREFIX).unwrap();
        assert_eq!(event.filled_qty, 0);
        assert_eq!(event.order_qty, 0);
    }
}
