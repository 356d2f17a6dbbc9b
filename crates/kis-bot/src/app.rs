//! Main application orchestration.
//!
//! Wires the session, broker client, WS client, coordinator, and risk
//! monitor together, spawns the four long-lived loops, and translates
//! Ctrl-C into the shared cancellation token. Credential acquisition
//! happens before anything is spawned; a refused token or approval key
//! aborts startup.

use crate::config::AppConfig;
use crate::error::AppResult;
use kis_broker::BrokerClient;
use kis_core::TradingMode;
use kis_executor::{intake_channel, Coordinator, ExecutionSink, OrderIntake, WatchRegistry};
use kis_risk::{RiskEngine, RiskMonitor};
use kis_session::{SessionManager, SessionStore};
use kis_telemetry::Notifier;
use kis_ws::{WsClient, WsConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Main application.
pub struct Application {
    config: AppConfig,
}

impl Application {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> AppResult<()> {
        let shutdown = CancellationToken::new();
        let data_dir = PathBuf::from(&self.config.data_dir);

        // Session and credentials; both calls are fatal on refusal
        let passphrase = std::env::var(&self.config.seal_passphrase_env).ok();
        let session_store = SessionStore::new(&self.config.session_file, passphrase);
        let session = Arc::new(SessionManager::load(session_store)?);

        info!(mode = %session.mode(), "Session loaded");
        session.get_valid_token().await?;
        let approval_key = session.get_ws_approval_key().await?;

        let broker = Arc::new(BrokerClient::new(session.clone())?);
        let notifier = Notifier::new(std::env::var(&self.config.webhook_env).ok());

        // Durable state
        let registry = WatchRegistry::open(data_dir.join("watch_orders.json"))?;
        let risk = Arc::new(RiskEngine::open(
            data_dir.join("stoploss.json"),
            self.config.risk.clone(),
        )?);

        let resumed = registry.snapshot().await.len();
        if resumed > 0 {
            info!(orders = resumed, "Resuming watch of accepted orders");
        }

        // Handoffs
        let (exec_tx, exec_rx) = mpsc::channel(self.config.execution_capacity);
        let (intake, intake_rx) = intake_channel(self.config.intake_capacity);
        // The facade pushes through this handle; keep ours alive so the
        // queue does not close underneath the consume loop
        let _intake: OrderIntake = intake;

        // WebSocket client with the coordinator's sink injected
        let ws_config = WsConfig {
            url: session.ws_url().to_string(),
            approval_key,
            custtype: session.custtype().to_string(),
            hts_id: session.hts_id().to_string(),
            account_prefix: session.account_prefix().to_string(),
            mode: session.mode(),
            reconnect_delay_ms: self.config.websocket.reconnect_delay_ms,
        };
        let sink = Arc::new(ExecutionSink::new(exec_tx, None));
        let ws_client = Arc::new(WsClient::new(ws_config, sink, shutdown.clone()));

        let coordinator = Arc::new(Coordinator::new(
            broker.clone(),
            registry,
            risk.clone(),
            ws_client.handle(),
            notifier.clone(),
            shutdown.clone(),
        ));

        let monitor = Arc::new(RiskMonitor::new(
            risk.clone(),
            broker,
            data_dir.join("trades"),
            notifier.clone(),
            shutdown.clone(),
        ));

        if session.mode() == TradingMode::Live {
            notifier.send("kis-bot starting in LIVE mode");
        }

        // Four long-lived loops
        let ws_task = {
            let ws_client = ws_client.clone();
            tokio::spawn(async move {
                if let Err(e) = ws_client.run().await {
                    error!(?e, "WebSocket client exited with error");
                }
            })
        };
        let consume_task = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.run_consume_loop(intake_rx).await })
        };
        let execution_task = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.run_execution_loop(exec_rx).await })
        };
        let monitor_task = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.run().await })
        };

        info!("All loops running; Ctrl-C to stop");
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received");
        shutdown.cancel();

        let _ = ws_task.await;
        let _ = consume_task.await;
        let _ = execution_task.await;
        let _ = monitor_task.await;

        info!("Shutdown complete");
        Ok(())
    }
}
