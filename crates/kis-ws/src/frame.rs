//! Incoming frame codec.
//!
//! Wire format: realtime frames are pipe-delimited
//! `type_char|tr_id|count|payload` where type_char '0' means plaintext
//! market data and '1' an encrypted execution notice; anything else is a
//! JSON control frame. Payload fields are caret-delimited at fixed
//! offsets.
//!
//! Payload parsers return `None` (with a warning) for frames shorter than
//! the documented schema; a short frame is never an error for the caller.

use crate::error::{WsError, WsResult};
use kis_core::{Price, StockCode};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Transaction id for the order-book quote channel.
pub const TR_ID_QUOTE: &str = "H0STASP0";
/// Transaction id for the tick/trade channel.
pub const TR_ID_TICK: &str = "H0STCNT0";
/// Transaction id for the live execution-notice channel.
pub const TR_ID_NOTICE_LIVE: &str = "H0STCNI0";
/// Transaction id for the paper execution-notice channel.
pub const TR_ID_NOTICE_PAPER: &str = "H0STCNI9";
/// Control tr_id that must be echoed back verbatim.
pub const TR_ID_PINGPONG: &str = "PINGPONG";

/// Minimum caret-delimited fields for a tick record.
const TICK_MIN_FIELDS: usize = 14;
/// Minimum caret-delimited fields for a quote record.
const QUOTE_MIN_FIELDS: usize = 43;

/// A parsed incoming frame.
#[derive(Debug, Clone)]
pub enum Frame {
    /// Plaintext realtime frame ('0').
    Realtime(RealtimeFrame),
    /// Encrypted execution notice ('1'); payload is base64 ciphertext.
    EncryptedNotice(RealtimeFrame),
    /// JSON control frame (subscription acks, PINGPONG).
    Control(ControlFrame),
}

/// Header-split realtime frame before payload decoding.
#[derive(Debug, Clone)]
pub struct RealtimeFrame {
    pub tr_id: String,
    pub count: u32,
    pub payload: String,
}

/// AES key material delivered in the notice subscription ack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherKey {
    pub key: String,
    pub iv: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlHeader {
    pub tr_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlBody {
    pub rt_cd: String,
    #[serde(default)]
    pub msg1: String,
    #[serde(default)]
    pub output: Option<CipherKey>,
}

/// JSON control frame. PINGPONG frames carry no body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlFrame {
    pub header: ControlHeader,
    #[serde(default)]
    pub body: Option<ControlBody>,
}

impl ControlFrame {
    pub fn is_pingpong(&self) -> bool {
        self.header.tr_id == TR_ID_PINGPONG
    }

    pub fn is_success(&self) -> bool {
        self.body.as_ref().is_some_and(|b| b.rt_cd == "0")
    }

    /// Key material, present only on a successful notice subscription ack.
    pub fn cipher_key(&self) -> Option<&CipherKey> {
        self.body.as_ref().and_then(|b| b.output.as_ref())
    }
}

impl Frame {
    /// Discriminate and split a raw incoming message.
    pub fn parse(raw: &str) -> WsResult<Frame> {
        let first = raw.chars().next();
        if matches!(first, Some('0') | Some('1')) && raw.contains('|') {
            let mut parts = raw.splitn(4, '|');
            let flag = parts.next().unwrap_or_default();
            let tr_id = parts
                .next()
                .ok_or_else(|| WsError::ParseError("realtime frame missing tr_id".to_string()))?;
            let count = parts
                .next()
                .and_then(|c| c.parse::<u32>().ok())
                .ok_or_else(|| WsError::ParseError("realtime frame missing count".to_string()))?;
            let payload = parts
                .next()
                .ok_or_else(|| WsError::ParseError("realtime frame missing payload".to_string()))?;

            let frame = RealtimeFrame {
                tr_id: tr_id.to_string(),
                count,
                payload: payload.to_string(),
            };
            return Ok(if flag == "1" {
                Frame::EncryptedNotice(frame)
            } else {
                Frame::Realtime(frame)
            });
        }

        let control: ControlFrame = serde_json::from_str(raw)
            .map_err(|e| WsError::ParseError(format!("control frame: {e}")))?;
        Ok(Frame::Control(control))
    }
}

/// One trade print from the tick channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeTick {
    pub stock_code: StockCode,
    /// Exchange event time, HHMMSS.
    pub event_time: String,
    pub price: Price,
    pub best_ask: Price,
    pub best_bid: Price,
    pub cum_volume: u64,
}

/// One order-book level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuoteLevel {
    pub price: Price,
    pub qty: u64,
}

/// Ten levels of depth each way from the quote channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeQuote {
    pub stock_code: StockCode,
    pub asks: Vec<QuoteLevel>,
    pub bids: Vec<QuoteLevel>,
}

fn parse_price(field: &str) -> Option<Price> {
    field.parse().ok()
}

/// Parse the first record of a tick payload.
pub fn parse_tick(payload: &str) -> Option<RealtimeTick> {
    let fields: Vec<&str> = payload.split('^').collect();
    if fields.len() < TICK_MIN_FIELDS {
        warn!(
            fields = fields.len(),
            expected = TICK_MIN_FIELDS,
            "Dropping short tick frame"
        );
        return None;
    }

    let stock_code = match StockCode::new(fields[0]) {
        Ok(code) => code,
        Err(_) => {
            warn!(code = fields[0], "Dropping tick with malformed stock code");
            return None;
        }
    };

    Some(RealtimeTick {
        stock_code,
        event_time: fields[1].to_string(),
        price: parse_price(fields[2])?,
        best_ask: parse_price(fields[10])?,
        best_bid: parse_price(fields[11])?,
        cum_volume: fields[13].parse().ok()?,
    })
}

/// Parse a quote payload: ask prices at 3..=12, bid prices at 13..=22,
/// ask quantities at 23..=32, bid quantities at 33..=42.
pub fn parse_quote(payload: &str) -> Option<RealtimeQuote> {
    let fields: Vec<&str> = payload.split('^').collect();
    if fields.len() < QUOTE_MIN_FIELDS {
        warn!(
            fields = fields.len(),
            expected = QUOTE_MIN_FIELDS,
            "Dropping short quote frame"
        );
        return None;
    }

    let stock_code = match StockCode::new(fields[0]) {
        Ok(code) => code,
        Err(_) => {
            warn!(code = fields[0], "Dropping quote with malformed stock code");
            return None;
        }
    };

    let mut asks = Vec::with_capacity(10);
    let mut bids = Vec::with_capacity(10);
    for i in 1..=10usize {
        asks.push(QuoteLevel {
            price: parse_price(fields[2 + i])?,
            qty: fields[22 + i].parse().ok()?,
        });
        bids.push(QuoteLevel {
            price: parse_price(fields[12 + i])?,
            qty: fields[32 + i].parse().ok()?,
        });
    }

    Some(RealtimeQuote {
        stock_code,
        asks,
        bids,
    })
}
