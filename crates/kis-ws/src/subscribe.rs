//! Subscribe/unsubscribe frame construction.
//!
//! Eight commands total: quote, tick, and execution-notice channels, each
//! register/unregister, with the notice channel split by live/paper mode.
//! Quote and tick key on the 6-digit stock code; the notice channel keys
//! on the HTS user id.

use crate::frame::{TR_ID_NOTICE_LIVE, TR_ID_NOTICE_PAPER, TR_ID_QUOTE, TR_ID_TICK};
use kis_core::{StockCode, TradingMode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Realtime channel selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Order-book depth for one symbol.
    Quote,
    /// Trade prints for one symbol.
    Trade,
    /// Account-level execution notices.
    ExecutionNotice(TradingMode),
}

impl Channel {
    pub fn tr_id(&self) -> &'static str {
        match self {
            Self::Quote => TR_ID_QUOTE,
            Self::Trade => TR_ID_TICK,
            Self::ExecutionNotice(TradingMode::Live) => TR_ID_NOTICE_LIVE,
            Self::ExecutionNotice(TradingMode::Paper) => TR_ID_NOTICE_PAPER,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quote => write!(f, "quote"),
            Self::Trade => write!(f, "trade"),
            Self::ExecutionNotice(mode) => write!(f, "execution_notice({mode})"),
        }
    }
}

/// Register or unregister, the tr_type header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeAction {
    Register,
    Unregister,
}

impl SubscribeAction {
    pub fn tr_type(&self) -> &'static str {
        match self {
            Self::Register => "1",
            Self::Unregister => "2",
        }
    }
}

/// A currently-registered channel, tracked per connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    /// None for the account-level notice channel.
    pub stock_code: Option<StockCode>,
    pub channel: Channel,
}

#[derive(Serialize)]
struct SubscribeHeader<'a> {
    approval_key: &'a str,
    custtype: &'a str,
    tr_type: &'a str,
    #[serde(rename = "content-type")]
    content_type: &'a str,
}

#[derive(Serialize)]
struct SubscribeInput<'a> {
    tr_id: &'a str,
    tr_key: &'a str,
}

#[derive(Serialize)]
struct SubscribeBody<'a> {
    input: SubscribeInput<'a>,
}

#[derive(Serialize)]
struct SubscribeRequest<'a> {
    header: SubscribeHeader<'a>,
    body: SubscribeBody<'a>,
}

/// Build the JSON request for one of the eight channel commands.
/// `tr_key` is the stock code for quote/trade channels and the HTS user
/// id for the notice channel.
pub fn build_subscribe_frame(
    channel: Channel,
    action: SubscribeAction,
    approval_key: &str,
    custtype: &str,
    tr_key: &str,
) -> String {
    let request = SubscribeRequest {
        header: SubscribeHeader {
            approval_key,
            custtype,
            tr_type: action.tr_type(),
            content_type: "utf-8",
        },
        body: SubscribeBody {
            input: SubscribeInput {
                tr_id: channel.tr_id(),
                tr_key,
            },
        },
    };
    serde_json::to_string(&request).expect("subscribe request serializes")
}
