//! Persisted registry of accepted orders awaiting fills.
//!
//! Keyed by order id + stock code. Fills only ever raise `filled_qty`;
//! a completed order is removed inside the same store transaction that
//! recorded its last fill, so a duplicated notice finds nothing to
//! resurrect.

use chrono::{DateTime, Utc};
use kis_core::Price;
use kis_persistence::{JsonStore, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// An accepted order being watched for fills.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchedOrder {
    pub order_id: String,
    pub stock_code: String,
    pub quantity: u32,
    /// ATR carried from the request, handed to the risk engine on fill.
    pub atr: Price,
    pub price: Price,
    pub filled_qty: u32,
    pub created_at: DateTime<Utc>,
}

/// What one fill did to a watched order.
#[derive(Debug, Clone)]
pub struct FillProgress {
    /// This fill took the order from zero to some filled quantity.
    pub first_fill: bool,
    /// Total filled reached the requested quantity; the order is gone
    /// from the registry.
    pub completed: bool,
    pub total_filled: u32,
    /// The order as of this fill.
    pub order: WatchedOrder,
}

pub struct WatchRegistry {
    store: JsonStore<HashMap<String, WatchedOrder>>,
}

fn key(order_id: &str, stock_code: &str) -> String {
    format!("{order_id}:{stock_code}")
}

impl WatchRegistry {
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        Ok(Self {
            store: JsonStore::open(path)?,
        })
    }

    pub async fn insert(&self, order: WatchedOrder) -> StoreResult<()> {
        let k = key(&order.order_id, &order.stock_code);
        self.store
            .update(move |orders| {
                orders.insert(k, order);
            })
            .await
    }

    /// Apply one fill. Returns `None` for an order this registry does
    /// not know (an out-of-band notice).
    pub async fn apply_fill(
        &self,
        order_id: &str,
        stock_code: &str,
        qty: u32,
    ) -> StoreResult<Option<FillProgress>> {
        let k = key(order_id, stock_code);
        self.store
            .update(move |orders| {
                let entry = orders.get_mut(&k)?;

                let first_fill = entry.filled_qty == 0 && qty > 0;
                entry.filled_qty += qty;
                let total_filled = entry.filled_qty;
                let completed = total_filled >= entry.quantity;
                let order = entry.clone();

                if completed {
                    orders.remove(&k);
                }

                Some(FillProgress {
                    first_fill,
                    completed,
                    total_filled,
                    order,
                })
            })
            .await
    }

    /// Remove an order (external cancellation).
    pub async fn remove(&self, order_id: &str, stock_code: &str) -> StoreResult<Option<WatchedOrder>> {
        let k = key(order_id, stock_code);
        let removed = self.store.update(move |orders| orders.remove(&k)).await?;
        if removed.is_some() {
            debug!(order_id, stock_code, "Watched order removed");
        }
        Ok(removed)
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    pub async fn snapshot(&self) -> Vec<WatchedOrder> {
        self.store.read().await.into_values().collect()
    }
}
