//! Risk engine configuration.

use kis_core::MarketHours;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How the trailing distance's ATR evolves after entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum AtrPolicy {
    /// Keep the trailing distance at the ATR observed at entry.
    FixedAtEntry,
    /// Recompute from daily candles on an interval.
    Refresh {
        #[serde(default = "default_atr_refresh_secs")]
        interval_secs: u64,
    },
}

fn default_atr_refresh_secs() -> u64 {
    3600
}

impl Default for AtrPolicy {
    fn default() -> Self {
        Self::Refresh {
            interval_secs: default_atr_refresh_secs(),
        }
    }
}

/// Flat-volatility time-stop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeStopConfig {
    #[serde(default = "default_time_stop_enabled")]
    pub enabled: bool,
    /// Consecutive trading days the true range must stay compressed.
    #[serde(default = "default_time_stop_days")]
    pub days: usize,
    /// Fraction of the entry ATR that counts as compressed.
    #[serde(default = "default_time_stop_fraction")]
    pub fraction: Decimal,
}

fn default_time_stop_enabled() -> bool {
    true
}

fn default_time_stop_days() -> usize {
    3
}

fn default_time_stop_fraction() -> Decimal {
    Decimal::new(5, 1) // 0.5
}

impl Default for TimeStopConfig {
    fn default() -> Self {
        Self {
            enabled: default_time_stop_enabled(),
            days: default_time_stop_days(),
            fraction: default_time_stop_fraction(),
        }
    }
}

/// Risk engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Stop distance multiplier while in the normal-stop state.
    #[serde(default = "default_k_stop")]
    pub k_stop: Decimal,
    /// Trailing distance multiplier.
    #[serde(default = "default_k_trail")]
    pub k_trail: Decimal,
    /// Monitor tick interval (ms).
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,
    /// ATR rolling window (trading days).
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,
    /// Consecutive per-symbol monitor failures before an operator alert.
    #[serde(default = "default_failure_alert_threshold")]
    pub failure_alert_threshold: u32,
    #[serde(default)]
    pub atr_policy: AtrPolicy,
    #[serde(default)]
    pub time_stop: TimeStopConfig,
    #[serde(default)]
    pub market_hours: MarketHours,
}

fn default_k_stop() -> Decimal {
    Decimal::TWO
}

fn default_k_trail() -> Decimal {
    Decimal::TWO
}

fn default_monitor_interval_ms() -> u64 {
    1000
}

fn default_atr_period() -> usize {
    20
}

fn default_failure_alert_threshold() -> u32 {
    3
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            k_stop: default_k_stop(),
            k_trail: default_k_trail(),
            monitor_interval_ms: default_monitor_interval_ms(),
            atr_period: default_atr_period(),
            failure_alert_threshold: default_failure_alert_threshold(),
            atr_policy: AtrPolicy::default(),
            time_stop: TimeStopConfig::default(),
            market_hours: MarketHours::default(),
        }
    }
}
