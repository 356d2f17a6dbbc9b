//! Typed REST responses.
//!
//! The brokerage wraps everything in `{rt_cd, msg_cd, msg1, output...}`;
//! per-endpoint output structs deserialize the fields we actually read.
//! Numeric fields arrive as strings on the wire.

use kis_core::Price;
use serde::Deserialize;

/// Shared response envelope with a single `output` object.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub rt_cd: String,
    #[serde(default)]
    pub msg_cd: String,
    #[serde(default)]
    pub msg1: String,
    #[serde(default)]
    pub output: Option<T>,
}

/// Envelope for the daily-candle endpoint; bars arrive in `output2`.
#[derive(Debug, Deserialize)]
pub struct CandleEnvelope {
    pub rt_cd: String,
    #[serde(default)]
    pub msg_cd: String,
    #[serde(default)]
    pub msg1: String,
    #[serde(default)]
    pub output2: Vec<CandleOutput>,
}

/// Envelope for the balance endpoint; holdings in `output1`, account
/// summary in `output2`.
#[derive(Debug, Deserialize)]
pub struct BalanceEnvelope {
    pub rt_cd: String,
    #[serde(default)]
    pub msg_cd: String,
    #[serde(default)]
    pub msg1: String,
    #[serde(default)]
    pub output1: Vec<HoldingOutput>,
    #[serde(default)]
    pub output2: Vec<BalanceOutput>,
}

/// Raw cash-order output.
#[derive(Debug, Deserialize)]
pub struct OrderOutput {
    #[serde(rename = "ODNO", default)]
    pub odno: Option<String>,
    #[serde(rename = "KRX_FWDG_ORD_ORGNO", default)]
    pub branch: Option<String>,
    #[serde(rename = "ORD_TMD", default)]
    pub order_time: Option<String>,
}

/// An accepted order.
#[derive(Debug, Clone)]
pub struct OrderAccepted {
    pub order_id: String,
    /// Exchange branch code, needed for cancel/revise.
    pub branch: String,
    /// Acceptance time, HHMMSS.
    pub order_time: String,
}

/// Raw current-price output.
#[derive(Debug, Deserialize)]
pub struct PriceOutput {
    pub stck_prpr: String,
    #[serde(default)]
    pub stck_oprc: String,
    #[serde(default)]
    pub stck_hgpr: String,
    #[serde(default)]
    pub stck_lwpr: String,
    #[serde(default)]
    pub acml_vol: String,
    #[serde(default)]
    pub prdy_ctrt: String,
}

/// Current quote snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentPrice {
    pub price: Price,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub cum_volume: u64,
    /// Change versus previous close, percent.
    pub change_pct: String,
}

/// Raw daily-candle row.
#[derive(Debug, Deserialize)]
pub struct CandleOutput {
    #[serde(default)]
    pub stck_bsop_date: String,
    #[serde(default)]
    pub stck_oprc: String,
    #[serde(default)]
    pub stck_hgpr: String,
    #[serde(default)]
    pub stck_lwpr: String,
    #[serde(default)]
    pub stck_clpr: String,
    #[serde(default)]
    pub acml_vol: String,
}

/// One daily OHLCV bar, newest first as the API returns them.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyCandle {
    /// YYYYMMDD.
    pub date: String,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: u64,
}

/// Raw holdings row.
#[derive(Debug, Deserialize)]
pub struct HoldingOutput {
    #[serde(default)]
    pub pdno: String,
    #[serde(default)]
    pub prdt_name: String,
    #[serde(default)]
    pub hldg_qty: String,
    #[serde(default)]
    pub pchs_avg_pric: String,
    #[serde(default)]
    pub prpr: String,
}

/// Raw balance summary row.
#[derive(Debug, Deserialize)]
pub struct BalanceOutput {
    #[serde(default)]
    pub tot_evlu_amt: String,
}

/// One held position.
#[derive(Debug, Clone)]
pub struct Holding {
    pub stock_code: String,
    pub name: String,
    pub qty: u32,
    pub avg_price: Price,
    pub current_price: Price,
}
