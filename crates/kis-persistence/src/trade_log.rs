//! Append-only trade log.
//!
//! One JSON line per closed position, in daily files. Append mode keeps
//! earlier sessions' entries; a torn write can only damage its own line.

use crate::error::StoreResult;
use chrono::{DateTime, Utc};
use kis_core::Price;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{info, warn};

/// Immutable record of one closed position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeLogEntry {
    pub code: String,
    pub buy_price: Price,
    pub sell_price: Price,
    pub qty: u32,
    pub buy_time: DateTime<Utc>,
    pub sell_time: DateTime<Utc>,
    pub pnl_amount: rust_decimal::Decimal,
    pub pnl_percent: rust_decimal::Decimal,
    /// "stop-loss", "trailing-stop", or "time-stop".
    pub reason: String,
}

struct ActiveWriter {
    writer: BufWriter<File>,
    date: String,
    records_written: usize,
}

/// JSON Lines writer for trade log entries.
pub struct TradeLogWriter {
    base_dir: PathBuf,
    active_writer: Option<ActiveWriter>,
}

impl TradeLogWriter {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        if let Err(e) = std::fs::create_dir_all(&base_dir) {
            warn!(?e, "Failed to create trade log directory: {}", base_dir.display());
        }
        Self {
            base_dir,
            active_writer: None,
        }
    }

    /// Append one entry and flush it to disk immediately. Closed
    /// positions are rare enough that buffering buys nothing.
    pub fn append(&mut self, entry: &TradeLogEntry) -> StoreResult<()> {
        let today = Utc::now().format("%Y-%m-%d").to_string();

        let needs_rotation = self
            .active_writer
            .as_ref()
            .map(|w| w.date != today)
            .unwrap_or(false);
        if needs_rotation {
            self.close_active_writer();
        }

        if self.active_writer.is_none() {
            self.open_writer(&today)?;
        }

        let active = self
            .active_writer
            .as_mut()
            .expect("active writer just opened");
        let json = serde_json::to_string(entry)?;
        writeln!(active.writer, "{}", json)?;
        active.writer.flush()?;
        active.records_written += 1;

        info!(
            code = %entry.code,
            reason = %entry.reason,
            pnl = %entry.pnl_amount,
            "Trade logged"
        );
        Ok(())
    }

    fn open_writer(&mut self, date: &str) -> StoreResult<()> {
        let filename = self.base_dir.join(format!("trades_{date}.jsonl"));
        info!(filename = %filename.display(), "Opening trade log (append mode)");

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&filename)?;

        self.active_writer = Some(ActiveWriter {
            writer: BufWriter::new(file),
            date: date.to_string(),
            records_written: 0,
        });
        Ok(())
    }

    fn close_active_writer(&mut self) {
        if let Some(mut active) = self.active_writer.take() {
            if let Err(e) = active.writer.flush() {
                warn!(?e, "Failed to flush trade log on close");
            }
            info!(
                date = %active.date,
                records = active.records_written,
                "Closed trade log file"
            );
        }
    }
}

impl Drop for TradeLogWriter {
    fn drop(&mut self) {
        self.close_active_writer();
    }
}
