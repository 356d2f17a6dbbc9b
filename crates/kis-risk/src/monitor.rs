//! Periodic risk monitor.
//!
//! One tick per interval during trading hours. Per active record, in
//! priority order: flat-volatility time-stop (normal state only), trail
//! entry, normal stop check, trail-high update with periodic ATR
//! refresh, trailing stop check. A close issues a full-quantity market
//! sell and only after it succeeds marks the record inactive and logs
//! the trade; a failed price fetch or sell leaves the record untouched
//! so the next tick retries it.

use crate::atr::compute_atr;
use crate::config::AtrPolicy;
use crate::engine::RiskEngine;
use crate::error::{RiskError, RiskResult};
use crate::record::{CloseReason, StopLossRecord, TickAction};
use crate::time_stop::is_flat_volatility;
use chrono::Utc;
use kis_broker::{BrokerClient, DailyCandle};
use kis_core::{OrderSide, OrderType, Price, StockCode};
use kis_persistence::{TradeLogEntry, TradeLogWriter};
use kis_telemetry::Notifier;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Window of daily candles requested from the broker, wide enough for
/// the ATR period plus weekends and holidays.
const CANDLE_LOOKBACK_DAYS: i64 = 60;

pub struct RiskMonitor {
    engine: Arc<RiskEngine>,
    broker: Arc<BrokerClient>,
    trade_log: Mutex<TradeLogWriter>,
    notifier: Notifier,
    shutdown: CancellationToken,
    /// Daily candles per symbol, keyed by the fetch date.
    candle_cache: Mutex<HashMap<String, (String, Vec<DailyCandle>)>>,
    /// Consecutive failures per symbol.
    failures: Mutex<HashMap<String, u32>>,
}

impl RiskMonitor {
    pub fn new(
        engine: Arc<RiskEngine>,
        broker: Arc<BrokerClient>,
        trade_log_dir: impl AsRef<Path>,
        notifier: Notifier,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            engine,
            broker,
            trade_log: Mutex::new(TradeLogWriter::new(trade_log_dir.as_ref())),
            notifier,
            shutdown,
            candle_cache: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Tick until shutdown. The current tick always runs to completion;
    /// the cancel signal is only honored between ticks.
    pub async fn run(&self) {
        let interval = Duration::from_millis(self.engine.config().monitor_interval_ms);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(interval_ms = interval.as_millis(), "Risk monitor started");

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("Risk monitor stopping");
                    return;
                }
                _ = ticker.tick() => {}
            }

            if !self.engine.config().market_hours.is_open_now() {
                continue;
            }

            self.tick().await;
        }
    }

    /// Evaluate every active record once.
    pub async fn tick(&self) {
        let threshold = self.engine.config().failure_alert_threshold;

        for record in self.engine.active_records().await {
            let code = record.stock_code.clone();
            match self.process_record(&record).await {
                Ok(()) => {
                    self.failures.lock().await.remove(&code);
                }
                Err(e) => {
                    let mut failures = self.failures.lock().await;
                    let count = failures.entry(code.clone()).or_insert(0);
                    *count += 1;
                    warn!(code = %code, attempt = *count, ?e, "Monitor pass failed, will retry next tick");
                    if *count == threshold {
                        self.notifier.send(format!(
                            "risk monitor failing for {code}: {e} ({count} consecutive ticks)"
                        ));
                    }
                }
            }
        }
    }

    async fn process_record(&self, record: &StopLossRecord) -> RiskResult<()> {
        let stock_code = StockCode::new(record.stock_code.as_str())
            .map_err(|_| RiskError::MalformedRecord(record.stock_code.clone()))?;

        let current = self.broker.current_price(&stock_code).await?;

        // 1. Flat-volatility time-stop, only while the trail is off
        let config = self.engine.config();
        if !record.trail_active && config.time_stop.enabled {
            let candles = self.candles(&stock_code).await?;
            if is_flat_volatility(
                &candles,
                config.time_stop.days,
                record.atr_at_entry,
                config.time_stop.fraction,
            ) {
                info!(code = %stock_code, "Volatility compressed, time-stop close");
                return self
                    .close_position(&stock_code, current.price, CloseReason::TimeStop)
                    .await;
            }
        }

        // Refresh the trailing ATR on its interval
        if record.trail_active {
            if let AtrPolicy::Refresh { interval_secs } = config.atr_policy {
                let age = (Utc::now() - record.last_atr_update_time).num_seconds();
                if age >= interval_secs as i64 {
                    self.refresh_atr(&stock_code).await?;
                }
            }
        }

        // 2-5. Trail entry, stop check, high-water update, trail check
        let k_trail = config.k_trail;
        let action = self
            .engine
            .update_record(stock_code.as_str(), |r| {
                r.evaluate_tick(current.price, k_trail)
            })
            .await?
            .unwrap_or(TickAction::Hold);

        match action {
            TickAction::Hold => {}
            TickAction::EnteredTrail => {
                info!(code = %stock_code, price = %current.price, "Trailing stop engaged");
                self.notifier
                    .send(format!("{stock_code} trailing stop engaged at {}", current.price));
            }
            TickAction::RaisedHigh => {
                debug!(code = %stock_code, high = %current.price, "Trail high raised");
            }
            TickAction::Close(reason) => {
                return self.close_position(&stock_code, current.price, reason).await;
            }
        }

        Ok(())
    }

    async fn refresh_atr(&self, stock_code: &StockCode) -> RiskResult<()> {
        let candles = self.candles(stock_code).await?;
        let period = self.engine.config().atr_period;
        let Some(atr) = compute_atr(&candles, period) else {
            return Err(RiskError::InsufficientData(stock_code.to_string()));
        };

        self.engine
            .update_record(stock_code.as_str(), |record| {
                record.atr_current = atr;
                record.last_atr_update_time = Utc::now();
            })
            .await?;
        debug!(code = %stock_code, atr = %atr, "Trailing ATR refreshed");
        Ok(())
    }

    /// Sell the full quantity at market, log the trade, then mark the
    /// record closed. Ordering matters: a failed sell must leave the
    /// record active for the next tick.
    async fn close_position(
        &self,
        stock_code: &StockCode,
        current_price: Price,
        reason: CloseReason,
    ) -> RiskResult<()> {
        let Some(record) = self
            .engine
            .update_record(stock_code.as_str(), |r| r.clone())
            .await?
        else {
            return Ok(());
        };
        if !record.active {
            return Ok(());
        }

        info!(
            code = %stock_code,
            quantity = record.quantity,
            price = %current_price,
            %reason,
            "Closing position"
        );

        self.broker
            .place_order(
                OrderSide::Sell,
                stock_code,
                record.quantity,
                Price::ZERO,
                OrderType::Market,
            )
            .await?;

        self.engine.mark_closed(stock_code.as_str()).await?;

        let qty = rust_decimal::Decimal::from(record.quantity);
        let entry = TradeLogEntry {
            code: stock_code.as_str().to_string(),
            buy_price: record.entry_price,
            sell_price: current_price,
            qty: record.quantity,
            buy_time: record.entry_time,
            sell_time: Utc::now(),
            pnl_amount: (current_price - record.entry_price).inner() * qty,
            pnl_percent: current_price.pct_from(record.entry_price).unwrap_or_default(),
            reason: reason.to_string(),
        };
        if let Err(e) = self.trade_log.lock().await.append(&entry) {
            warn!(?e, code = %stock_code, "Position closed but trade log write failed");
        }

        self.notifier.send(format!(
            "{} closed {} x{} at {} ({})",
            reason, stock_code, record.quantity, current_price, entry.pnl_percent
        ));

        Ok(())
    }

    /// Daily candles for a symbol, cached per day.
    async fn candles(&self, stock_code: &StockCode) -> RiskResult<Vec<DailyCandle>> {
        let today = Utc::now().format("%Y%m%d").to_string();

        {
            let cache = self.candle_cache.lock().await;
            if let Some((date, candles)) = cache.get(stock_code.as_str()) {
                if *date == today {
                    return Ok(candles.clone());
                }
            }
        }

        let from = (Utc::now() - chrono::Duration::days(CANDLE_LOOKBACK_DAYS))
            .format("%Y%m%d")
            .to_string();
        let candles = self.broker.daily_candles(stock_code, &from, &today).await?;

        self.candle_cache
            .lock()
            .await
            .insert(stock_code.as_str().to_string(), (today, candles.clone()));
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiskConfig;
    use kis_session::{ModeCredentials, SessionConfig, SessionManager, SessionStore};
    use tempfile::TempDir;

    fn session_file(dir: &TempDir) -> SessionStore {
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
            mode: kis_core::TradingMode::Paper,
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

    #[tokio::test]
    async fn test_run_exits_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let session = Arc::new(SessionManager::load(session_file(&dir)).unwrap());
        let broker = Arc::new(BrokerClient::new(session).unwrap());
        let engine = Arc::new(
            RiskEngine::open(dir.path().join("stoploss.json"), RiskConfig::default()).unwrap(),
        );

        let shutdown = CancellationToken::new();
        let monitor = Arc::new(RiskMonitor::new(
            engine,
            broker,
            dir.path().join("trades"),
            Notifier::disabled(),
            shutdown.clone(),
        ));

        let task = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.run().await })
        };

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("monitor should exit promptly on shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn test_tick_with_no_records_is_noop() {
        let dir = TempDir::new().unwrap();
        let session = Arc::new(SessionManager::load(session_file(&dir)).unwrap());
        let broker = Arc::new(BrokerClient::new(session).unwrap());
        let engine = Arc::new(
            RiskEngine::open(dir.path().join("stoploss.json"), RiskConfig::default()).unwrap(),
        );

        let shutdown = CancellationToken::new();
        let monitor = RiskMonitor::new(
            engine,
            broker,
            dir.path().join("trades"),
            Notifier::disabled(),
            shutdown,
        );

        // No records: no broker calls, completes immediately
        monitor.tick().await;
    }
}
