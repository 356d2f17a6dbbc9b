//! Order execution coordinator.
//!
//! One consume loop, one execution-event loop. The consume loop pulls a
//! single request at a time, so at most one order placement is ever in
//! flight; that sequencing is the backpressure for the whole intake
//! path. Fills arrive from the WS client's single-consumer handoff and
//! are folded into the watch registry; the first fill per symbol arms
//! the risk engine.

use crate::intake::IntakeItem;
use crate::registry::{WatchRegistry, WatchedOrder};
use chrono::Utc;
use kis_broker::BrokerClient;
use kis_core::{CorrectionKind, ExecutionEvent, ExecutionPhase, OrderRequest, OrderSide};
use kis_risk::RiskEngine;
use kis_telemetry::Notifier;
use kis_ws::WsHandle;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a placement attempt produced, reported back to the caller and
/// the operator channel.
#[derive(Debug, Clone)]
pub struct PlacementOutcome {
    pub order_id: Option<String>,
    pub success: bool,
    pub error: Option<String>,
}

impl PlacementOutcome {
    fn ok(order_id: String) -> Self {
        Self {
            order_id: Some(order_id),
            success: true,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            order_id: None,
            success: false,
            error: Some(error.into()),
        }
    }
}

pub struct Coordinator {
    broker: Arc<BrokerClient>,
    registry: WatchRegistry,
    risk: Arc<RiskEngine>,
    ws: WsHandle,
    notifier: Notifier,
    shutdown: CancellationToken,
}

impl Coordinator {
    pub fn new(
        broker: Arc<BrokerClient>,
        registry: WatchRegistry,
        risk: Arc<RiskEngine>,
        ws: WsHandle,
        notifier: Notifier,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            broker,
            registry,
            risk,
            ws,
            notifier,
            shutdown,
        }
    }

    /// Consume the intake queue until shutdown, one request at a time.
    pub async fn run_consume_loop(&self, mut intake_rx: mpsc::Receiver<IntakeItem>) {
        info!("Order consume loop started");
        loop {
            let item = tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("Consume loop stopping");
                    return;
                }
                item = intake_rx.recv() => item,
            };

            let Some(IntakeItem { request, reply }) = item else {
                info!("Intake queue closed, consume loop exiting");
                return;
            };

            let outcome = self.place_order(request).await;
            if let Some(reply) = reply {
                // Caller may have gone away; that is fine
                let _ = reply.send(outcome);
            }
        }
    }

    /// Drain execution events from the WS client until shutdown.
    pub async fn run_execution_loop(&self, mut exec_rx: mpsc::Receiver<ExecutionEvent>) {
        info!("Execution event loop started");
        loop {
            let event = tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("Execution loop stopping");
                    return;
                }
                event = exec_rx.recv() => event,
            };

            let Some(event) = event else {
                info!("Execution channel closed, loop exiting");
                return;
            };
            self.handle_execution(event).await;
        }
    }

    /// Validate, normalize, and place one buy order. Exactly one watched
    /// order is created on success; none on failure.
    pub async fn place_order(&self, request: OrderRequest) -> PlacementOutcome {
        if let Err(e) = request.validate() {
            warn!(?e, code = %request.stock_code, "Rejecting invalid order request");
            return PlacementOutcome::failed(e.to_string());
        }

        // Idempotent: a no-op while the notice channel is registered
        if let Err(e) = self.ws.ensure_notice_registered().await {
            warn!(?e, "Could not request notice registration, placing anyway");
        }

        info!(
            code = %request.stock_code,
            quantity = request.quantity,
            order_type = %request.order_type,
            price = %request.price,
            "Placing order from intake queue"
        );

        let accepted = match self
            .broker
            .place_order(
                OrderSide::Buy,
                &request.stock_code,
                request.quantity,
                request.price,
                request.order_type,
            )
            .await
        {
            Ok(accepted) => accepted,
            Err(e) => {
                error!(code = %request.stock_code, ?e, "Order placement failed");
                self.notifier
                    .send(format!("order failed: {} -> {e}", request.stock_code));
                return PlacementOutcome::failed(e.to_string());
            }
        };

        let order = WatchedOrder {
            order_id: accepted.order_id.clone(),
            stock_code: request.stock_code.as_str().to_string(),
            quantity: request.quantity,
            atr: request.atr,
            price: request.price,
            filled_qty: 0,
            created_at: Utc::now(),
        };
        if let Err(e) = self.registry.insert(order).await {
            error!(?e, order_id = %accepted.order_id, "Order accepted but watch registry write failed");
            self.notifier.send(format!(
                "order {} accepted but is NOT being watched: {e}",
                accepted.order_id
            ));
            return PlacementOutcome::failed(format!("watch registry write failed: {e}"));
        }

        info!(
            code = %request.stock_code,
            order_id = %accepted.order_id,
            "Order accepted and watched"
        );
        PlacementOutcome::ok(accepted.order_id)
    }

    /// Fold one execution event into the watch registry.
    pub async fn handle_execution(&self, event: ExecutionEvent) {
        // A confirmed cancellation drops the watch for the original order
        if event.correction == CorrectionKind::Cancelled {
            let target = if event.original_order_id.is_empty() {
                &event.order_id
            } else {
                &event.original_order_id
            };
            match self.registry.remove(target, event.stock_code.as_str()).await {
                Ok(Some(order)) => {
                    info!(
                        order_id = %target,
                        code = %event.stock_code,
                        filled = order.filled_qty,
                        "Watched order cancelled externally"
                    );
                    self.notifier
                        .send(format!("{} order {} cancelled", event.stock_code, target));
                }
                Ok(None) => {
                    debug!(order_id = %target, "Cancellation notice for unwatched order");
                }
                Err(e) => {
                    error!(?e, order_id = %target, "Watch registry removal failed");
                }
            }
            return;
        }

        if event.phase == ExecutionPhase::Accepted {
            debug!(order_id = %event.order_id, "Order acceptance notice");
            return;
        }
        if !event.is_fill() {
            debug!(order_id = %event.order_id, "Ignoring zero-quantity execution notice");
            return;
        }

        let progress = match self
            .registry
            .apply_fill(&event.order_id, event.stock_code.as_str(), event.filled_qty)
            .await
        {
            Ok(Some(progress)) => progress,
            Ok(None) => {
                debug!(
                    order_id = %event.order_id,
                    code = %event.stock_code,
                    "Out-of-band execution notice, ignoring"
                );
                return;
            }
            Err(e) => {
                error!(?e, order_id = %event.order_id, "Watch registry update failed");
                self.notifier
                    .send(format!("fill for {} could not be recorded: {e}", event.order_id));
                return;
            }
        };

        info!(
            code = %event.stock_code,
            filled = event.filled_qty,
            total = progress.total_filled,
            of = progress.order.quantity,
            "Fill received"
        );
        self.notifier.send(format!(
            "{} filled {} ({}/{})",
            event.stock_code, event.filled_qty, progress.total_filled, progress.order.quantity
        ));

        let risk_result = if progress.first_fill {
            self.risk
                .setup(
                    &event.stock_code,
                    event.fill_price,
                    progress.order.atr,
                    event.filled_qty,
                    Utc::now(),
                )
                .await
        } else {
            self.risk
                .add_quantity(&event.stock_code, event.filled_qty)
                .await
        };
        if let Err(e) = risk_result {
            error!(?e, code = %event.stock_code, "Risk engine update failed");
            self.notifier.send(format!(
                "position {} filled but stop-loss state update failed: {e}",
                event.stock_code
            ));
        }

        if progress.completed {
            info!(
                code = %event.stock_code,
                quantity = progress.order.quantity,
                "Order completely filled"
            );
            self.notifier.send(format!(
                "{} buy complete ({} shares)",
                event.stock_code, progress.order.quantity
            ));

            if self.registry.is_empty().await {
                if let Err(e) = self.ws.unregister_notice().await {
                    warn!(?e, "Could not request notice unregistration");
                }
            }
        }
    }

    /// Orders currently awaiting fills.
    pub async fn watched_orders(&self) -> Vec<WatchedOrder> {
        self.registry.snapshot().await
    }

    pub fn registry(&self) -> &WatchRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ExecutionSink;
    use kis_core::{CorrectionKind, OrderType, Price, StockCode, TradingMode};
    use kis_risk::RiskConfig;
    use kis_session::{ModeCredentials, SessionConfig, SessionManager, SessionStore};
    use kis_ws::{WsClient, WsConfig};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn code() -> StockCode {
        StockCode::new("005930").unwrap()
    }

    fn fill_event(order_id: &str, qty: u32, price: i64) -> ExecutionEvent {
        ExecutionEvent {
            order_id: order_id.to_string(),
            original_order_id: String::new(),
            stock_code: code(),
            symbol_name: "SamsungElec".to_string(),
            side: kis_core::OrderSide::Buy,
            correction: CorrectionKind::None,
            phase: ExecutionPhase::Filled,
            filled_qty: qty,
            fill_price: Price::from(price),
            order_qty: 10,
            event_time: "091532".to_string(),
        }
    }

    fn session_store(dir: &TempDir) -> SessionStore {
        let creds = ModeCredentials {
            base_url: "http://127.0.0.1:9".to_string(),
            ws_url: "ws://127.0.0.1:9".to_string(),
            app_key: "k".to_string(),
            app_secret: "s".to_string(),
            account_number: "5012345601".to_string(),
            access_token: Some("Bearer t".to_string()),
            token_issued_at: Some(Utc::now().timestamp()),
        };
        let config = SessionConfig {
            mode: TradingMode::Paper,
            custtype: "P".to_string(),
            hts_id: "hts".to_string(),
            ws_approval_key: None,
            live: creds.clone(),
            paper: creds,
        };
        let store = SessionStore::new(dir.path().join("settings.json"), None);
        store.save(&config).unwrap();
        store
    }

    struct Fixture {
        coordinator: Coordinator,
        risk: Arc<RiskEngine>,
        _ws_client: Arc<WsClient>,
    }

    fn fixture(dir: &TempDir) -> Fixture {
        let session = Arc::new(SessionManager::load(session_store(dir)).unwrap());
        let broker = Arc::new(BrokerClient::new(session).unwrap());
        let registry = WatchRegistry::open(dir.path().join("watch_orders.json")).unwrap();
        let risk = Arc::new(
            RiskEngine::open(dir.path().join("stoploss.json"), RiskConfig::default()).unwrap(),
        );

        let (exec_tx, _exec_rx) = mpsc::channel(64);
        let ws_client = Arc::new(WsClient::new(
            WsConfig::default(),
            Arc::new(ExecutionSink::new(exec_tx, None)),
            CancellationToken::new(),
        ));

        let coordinator = Coordinator::new(
            broker,
            registry,
            risk.clone(),
            ws_client.handle(),
            Notifier::disabled(),
            CancellationToken::new(),
        );
        Fixture {
            coordinator,
            risk,
            _ws_client: ws_client,
        }
    }

    #[tokio::test]
    async fn test_invalid_request_creates_no_watched_order() {
        let dir = TempDir::new().unwrap();
        let f = fixture(&dir);

        let request = OrderRequest {
            stock_code: code(),
            quantity: 0,
            price: Price::new(dec!(71000)),
            order_type: OrderType::Limit,
            atr: Price::new(dec!(200)),
            requested_at: Utc::now(),
        };

        let outcome = f.coordinator.place_order(request).await;
        assert!(!outcome.success);
        assert!(outcome.order_id.is_none());
        assert!(outcome.error.is_some());
        assert!(f.coordinator.watched_orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_first_fill_arms_risk_engine() {
        let dir = TempDir::new().unwrap();
        let f = fixture(&dir);

        f.coordinator
            .registry()
            .insert(WatchedOrder {
                order_id: "A1".to_string(),
                stock_code: "005930".to_string(),
                quantity: 10,
                atr: Price::new(dec!(200)),
                price: Price::new(dec!(71000)),
                filled_qty: 0,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        f.coordinator.handle_execution(fill_event("A1", 4, 71000)).await;

        let records = f.risk.active_records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].quantity, 4);
        assert_eq!(records[0].entry_price, Price::new(dec!(71000)));
        // 71000 - 2*200
        assert_eq!(records[0].stop_loss_price, Price::new(dec!(70600)));
    }

    #[tokio::test]
    async fn test_later_fills_add_quantity_and_complete() {
        let dir = TempDir::new().unwrap();
        let f = fixture(&dir);

        f.coordinator
            .registry()
            .insert(WatchedOrder {
                order_id: "A1".to_string(),
                stock_code: "005930".to_string(),
                quantity: 10,
                atr: Price::new(dec!(200)),
                price: Price::new(dec!(71000)),
                filled_qty: 0,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        f.coordinator.handle_execution(fill_event("A1", 4, 71000)).await;
        f.coordinator.handle_execution(fill_event("A1", 6, 71100)).await;

        // Registry emptied by the completing fill
        assert!(f.coordinator.watched_orders().await.is_empty());

        // Risk record covers everything that filled
        let records = f.risk.active_records().await;
        assert_eq!(records[0].quantity, 10);
        // Entry stays at the first fill's price
        assert_eq!(records[0].entry_price, Price::new(dec!(71000)));
    }

    #[tokio::test]
    async fn test_duplicate_completion_notice_ignored() {
        let dir = TempDir::new().unwrap();
        let f = fixture(&dir);

        f.coordinator
            .registry()
            .insert(WatchedOrder {
                order_id: "A1".to_string(),
                stock_code: "005930".to_string(),
                quantity: 10,
                atr: Price::new(dec!(200)),
                price: Price::new(dec!(71000)),
                filled_qty: 0,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        f.coordinator.handle_execution(fill_event("A1", 10, 71000)).await;
        f.coordinator.handle_execution(fill_event("A1", 10, 71000)).await;

        assert!(f.coordinator.watched_orders().await.is_empty());
        let records = f.risk.active_records().await;
        // Quantity unchanged by the duplicate
        assert_eq!(records[0].quantity, 10);
    }

    #[tokio::test]
    async fn test_cancellation_notice_drops_watch() {
        let dir = TempDir::new().unwrap();
        let f = fixture(&dir);

        f.coordinator
            .registry()
            .insert(WatchedOrder {
                order_id: "A1".to_string(),
                stock_code: "005930".to_string(),
                quantity: 10,
                atr: Price::new(dec!(200)),
                price: Price::new(dec!(71000)),
                filled_qty: 0,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        // Cancellation confirmation references the original order id
        let mut event = fill_event("C9", 0, 0);
        event.original_order_id = "A1".to_string();
        event.correction = CorrectionKind::Cancelled;
        f.coordinator.handle_execution(event).await;

        assert!(f.coordinator.watched_orders().await.is_empty());
        assert!(f.risk.active_records().await.is_empty());
    }

    #[tokio::test]
    async fn test_out_of_band_notice_ignored() {
        let dir = TempDir::new().unwrap();
        let f = fixture(&dir);

        f.coordinator.handle_execution(fill_event("ZZ", 5, 71000)).await;
        assert!(f.risk.active_records().await.is_empty());
    }

    #[tokio::test]
    async fn test_acceptance_notice_does_not_touch_registry() {
        let dir = TempDir::new().unwrap();
        let f = fixture(&dir);

        f.coordinator
            .registry()
            .insert(WatchedOrder {
                order_id: "A1".to_string(),
                stock_code: "005930".to_string(),
                quantity: 10,
                atr: Price::new(dec!(200)),
                price: Price::new(dec!(71000)),
                filled_qty: 0,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let mut event = fill_event("A1", 0, 0);
        event.phase = ExecutionPhase::Accepted;
        f.coordinator.handle_execution(event).await;

        let orders = f.coordinator.watched_orders().await;
        assert_eq!(orders[0].filled_qty, 0);
        assert!(f.risk.active_records().await.is_empty());
    }
}
