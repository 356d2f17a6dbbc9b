//! Event seam between the WS client and its consumer.
//!
//! The coordinator implements `WsEvents` and is injected at client
//! construction. Implementations must not block: they are called from the
//! receive loop and should hand work off to a channel.

use crate::frame::{RealtimeQuote, RealtimeTick};
use kis_core::ExecutionEvent;

/// Market-data payloads forwarded to the listener.
#[derive(Debug, Clone)]
pub enum MarketData {
    Tick(RealtimeTick),
    Quote(RealtimeQuote),
}

/// Callbacks dispatched by the receive loop.
pub trait WsEvents: Send + Sync {
    /// A tick or quote for a registered symbol.
    fn on_market_data(&self, data: MarketData);

    /// A decrypted, parsed execution notice for our account.
    fn on_execution_event(&self, event: ExecutionEvent);
}
