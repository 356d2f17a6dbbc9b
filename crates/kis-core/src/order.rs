//! Order intake types.
//!
//! `OrderRequest` is what the facade hands to the execution coordinator.
//! Side and type enums carry their brokerage wire codes so normalization
//! happens exactly once.

use crate::decimal::Price;
use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Live or paper (simulated) brokerage account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    #[default]
    Paper,
    Live,
}

impl TradingMode {
    pub fn is_paper(&self) -> bool {
        matches!(self, Self::Paper)
    }
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Paper => write!(f, "paper"),
            Self::Live => write!(f, "live"),
        }
    }
}

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Order type with its ORD_DVSN wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Limit order ("00").
    Limit,
    /// Market order ("01").
    Market,
}

impl OrderType {
    /// Brokerage order-division code.
    pub fn broker_code(&self) -> &'static str {
        match self {
            Self::Limit => "00",
            Self::Market => "01",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limit => write!(f, "limit"),
            Self::Market => write!(f, "market"),
        }
    }
}

/// 6-digit KRX listing code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockCode(String);

impl StockCode {
    /// Parse a stock code, requiring exactly six ASCII digits.
    pub fn new(code: impl Into<String>) -> Result<Self> {
        let code = code.into();
        if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidStockCode(code));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StockCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for StockCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A buy request produced by the facade and consumed once by the
/// execution coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub stock_code: StockCode,
    pub quantity: u32,
    /// Limit price; ignored for market orders.
    pub price: Price,
    pub order_type: OrderType,
    /// ATR at request time, carried through to the stop-loss record.
    pub atr: Price,
    pub requested_at: DateTime<Utc>,
}

impl OrderRequest {
    /// Validate before any network call.
    pub fn validate(&self) -> Result<()> {
        if self.quantity == 0 {
            return Err(CoreError::InvalidOrder(format!(
                "quantity must be positive for {}",
                self.stock_code
            )));
        }
        if self.order_type == OrderType::Limit && !self.price.is_positive() {
            return Err(CoreError::InvalidOrder(format!(
                "limit order for {} needs a positive price",
                self.stock_code
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(qty: u32, order_type: OrderType, price: Price) -> OrderRequest {
        OrderRequest {
            stock_code: StockCode::new("005930").unwrap(),
            quantity: qty,
            price,
            order_type,
            atr: Price::new(dec!(200)),
            requested_at: Utc::now(),
        }
    }

    #[test]
    fn test_stock_code_rejects_bad_input() {
        assert!(StockCode::new("005930").is_ok());
        assert!(StockCode::new("5930").is_err());
        assert!(StockCode::new("00593A").is_err());
        assert!(StockCode::new("0059300").is_err());
    }

    #[test]
    fn test_order_side_opposite() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite(), OrderSide::Buy);
    }

    #[test]
    fn test_order_type_broker_codes() {
        assert_eq!(OrderType::Limit.broker_code(), "00");
        assert_eq!(OrderType::Market.broker_code(), "01");
    }

    #[test]
    fn test_validate_rejects_zero_quantity() {
        let r = request(0, OrderType::Market, Price::ZERO);
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_priceless_limit() {
        let r = request(10, OrderType::Limit, Price::ZERO);
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_market_without_price() {
        let r = request(10, OrderType::Market, Price::ZERO);
        assert!(r.validate().is_ok());
    }
}
