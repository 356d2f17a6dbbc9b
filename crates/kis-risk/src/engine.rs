//! Risk engine: owns the persisted stop-loss record store.
//!
//! `setup` runs from the coordinator's fill handler; the monitor loop
//! mutates the same records. All writes go through the store's mutex.

use crate::config::RiskConfig;
use crate::error::RiskResult;
use crate::record::StopLossRecord;
use chrono::{DateTime, Utc};
use kis_core::{Price, StockCode};
use kis_persistence::JsonStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Facade-visible snapshot of one symbol's stop state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskStateView {
    pub entry_price: Price,
    pub stop_price: Price,
    pub trail_active: bool,
    pub trail_high: Price,
}

type RecordMap = HashMap<String, StopLossRecord>;

pub struct RiskEngine {
    pub(crate) store: JsonStore<RecordMap>,
    config: RiskConfig,
}

impl RiskEngine {
    pub fn open(path: impl Into<PathBuf>, config: RiskConfig) -> RiskResult<Self> {
        Ok(Self {
            store: JsonStore::open(path)?,
            config,
        })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Register a position on its first fill. A second buy into an
    /// already-active symbol adds quantity to the existing record rather
    /// than resetting its stop.
    pub async fn setup(
        &self,
        stock_code: &StockCode,
        fill_price: Price,
        atr: Price,
        quantity: u32,
        entry_time: DateTime<Utc>,
    ) -> RiskResult<()> {
        let k_stop = self.config.k_stop;
        let code = stock_code.as_str().to_string();

        self.store
            .update(move |records| match records.get_mut(&code) {
                Some(existing) if existing.active => {
                    warn!(
                        code = %code,
                        added = quantity,
                        "Active record already exists, adding quantity"
                    );
                    existing.quantity += quantity;
                }
                _ => {
                    let record = StopLossRecord::open(
                        code.clone(),
                        fill_price,
                        atr,
                        quantity,
                        entry_time,
                        k_stop,
                    );
                    info!(
                        code = %code,
                        entry = %fill_price,
                        stop = %record.stop_loss_price,
                        quantity,
                        "Stop-loss record created"
                    );
                    records.insert(code, record);
                }
            })
            .await?;
        Ok(())
    }

    /// Add later fills' quantity to an active record.
    pub async fn add_quantity(&self, stock_code: &StockCode, quantity: u32) -> RiskResult<()> {
        let code = stock_code.as_str().to_string();
        self.store
            .update(move |records| {
                if let Some(record) = records.get_mut(&code) {
                    if record.active {
                        record.quantity += quantity;
                    }
                }
            })
            .await?;
        Ok(())
    }

    /// All records still being monitored.
    pub async fn active_records(&self) -> Vec<StopLossRecord> {
        self.store
            .read()
            .await
            .into_values()
            .filter(|r| r.active)
            .collect()
    }

    /// Mutate one record under the store lock. Returns `None` when the
    /// symbol has no record.
    pub(crate) async fn update_record<R: Send + 'static>(
        &self,
        stock_code: &str,
        mutate: impl FnOnce(&mut StopLossRecord) -> R,
    ) -> RiskResult<Option<R>> {
        let code = stock_code.to_string();
        let result = self
            .store
            .update(move |records| records.get_mut(&code).map(mutate))
            .await?;
        Ok(result)
    }

    /// Mark a record closed after its closing sell went through.
    pub(crate) async fn mark_closed(&self, stock_code: &str) -> RiskResult<Option<StopLossRecord>> {
        let code = stock_code.to_string();
        let closed = self
            .store
            .update(move |records| {
                records.get_mut(&code).map(|record| {
                    record.active = false;
                    record.trail_active = false;
                    record.clone()
                })
            })
            .await?;
        Ok(closed)
    }

    /// Snapshot for the facade: symbol → current stop state.
    pub async fn export_risk_state(&self) -> HashMap<String, RiskStateView> {
        let k_trail = self.config.k_trail;
        self.store
            .read()
            .await
            .into_iter()
            .filter(|(_, r)| r.active)
            .map(|(code, r)| {
                let view = RiskStateView {
                    entry_price: r.entry_price,
                    stop_price: r.effective_stop(k_trail),
                    trail_active: r.trail_active,
                    trail_high: r.trail_high,
                };
                (code, view)
            })
            .collect()
    }
}
