//! WS event sink.
//!
//! Implements the client's listener interface by forwarding events into
//! channels; the receive loop never blocks on the coordinator.

use kis_core::ExecutionEvent;
use kis_ws::{MarketData, WsEvents};
use tokio::sync::mpsc;
use tracing::warn;

pub struct ExecutionSink {
    exec_tx: mpsc::Sender<ExecutionEvent>,
    /// Optional market-data fan-out for the facade's display.
    market_tx: Option<mpsc::Sender<MarketData>>,
}

impl ExecutionSink {
    pub fn new(
        exec_tx: mpsc::Sender<ExecutionEvent>,
        market_tx: Option<mpsc::Sender<MarketData>>,
    ) -> Self {
        Self { exec_tx, market_tx }
    }
}

impl WsEvents for ExecutionSink {
    fn on_market_data(&self, data: MarketData) {
        if let Some(tx) = &self.market_tx {
            // Market data is advisory; drop on a full channel
            let _ = tx.try_send(data);
        }
    }

    fn on_execution_event(&self, event: ExecutionEvent) {
        if let Err(e) = self.exec_tx.try_send(event) {
            warn!(?e, "Execution event channel full, dropping notice");
        }
    }
}
