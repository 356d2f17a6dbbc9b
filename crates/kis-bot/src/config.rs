//! Application configuration.

use crate::error::{AppError, AppResult};
use kis_risk::RiskConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// WebSocket configuration subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsSettings {
    /// Fixed delay before each reconnect attempt (ms).
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

impl Default for WsSettings {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the durable session document (tokens, app keys).
    #[serde(default = "default_session_file")]
    pub session_file: String,
    /// Environment variable holding the seal passphrase; when unset,
    /// session secrets are stored in the clear.
    #[serde(default = "default_seal_passphrase_env")]
    pub seal_passphrase_env: String,
    /// Environment variable holding the operator webhook URL.
    #[serde(default = "default_webhook_env")]
    pub webhook_env: String,
    /// Directory for the watch registry, stop-loss store, and trade log.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Intake queue depth before producers block.
    #[serde(default = "default_intake_capacity")]
    pub intake_capacity: usize,
    /// Execution-event channel depth between WS client and coordinator.
    #[serde(default = "default_execution_capacity")]
    pub execution_capacity: usize,
    #[serde(default)]
    pub websocket: WsSettings,
    #[serde(default)]
    pub risk: RiskConfig,
}

fn default_session_file() -> String {
    "config/settings.json".to_string()
}

fn default_seal_passphrase_env() -> String {
    "KIS_SEAL_PASSPHRASE".to_string()
}

fn default_webhook_env() -> String {
    "KIS_WEBHOOK_URL".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_intake_capacity() -> usize {
    16
}

fn default_execution_capacity() -> usize {
    256
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session_file: default_session_file(),
            seal_passphrase_env: default_seal_passphrase_env(),
            webhook_env: default_webhook_env(),
            data_dir: default_data_dir(),
            intake_capacity: default_intake_capacity(),
            execution_capacity: default_execution_capacity(),
            websocket: WsSettings::default(),
            risk: RiskConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &str) -> AppResult<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.websocket.reconnect_delay_ms, 3000);
        assert_eq!(config.intake_capacity, 16);
        assert_eq!(config.risk.monitor_interval_ms, 1000);
    }

    #[test]
    fn test_config_round_trip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.session_file, config.session_file);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str("data_dir = \"/var/kis\"").unwrap();
        assert_eq!(parsed.data_dir, "/var/kis");
        assert_eq!(parsed.websocket.reconnect_delay_ms, 3000);
    }
}
