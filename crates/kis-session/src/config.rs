//! Durable session configuration.
//!
//! One JSON document holds both live and paper credentials; the active
//! mode selects which block is used. Tokens and issue timestamps are
//! written back through this file so every reader of the config observes
//! a refresh. App secrets and tokens are sealed at rest when a passphrase
//! is configured.

use crate::error::{SessionError, SessionResult};
use crate::seal;
use kis_core::TradingMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Credentials and endpoints for one trading mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeCredentials {
    /// REST base URL.
    pub base_url: String,
    /// WebSocket URL.
    pub ws_url: String,
    pub app_key: String,
    pub app_secret: String,
    /// 10-digit account number (8-digit CANO + 2-digit product code).
    pub account_number: String,
    /// Bearer token, including the "Bearer " prefix.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Unix seconds at which `access_token` was issued.
    #[serde(default)]
    pub token_issued_at: Option<i64>,
}

/// The whole session document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub mode: TradingMode,
    /// Customer type header value; "P" for personal accounts.
    #[serde(default = "default_custtype")]
    pub custtype: String,
    /// HTS user id, the tr_key for account-level notice subscriptions.
    pub hts_id: String,
    /// One-time WebSocket approval key, cached once issued.
    #[serde(default)]
    pub ws_approval_key: Option<String>,
    pub live: ModeCredentials,
    pub paper: ModeCredentials,
}

fn default_custtype() -> String {
    "P".to_string()
}

impl SessionConfig {
    /// Credentials for the active mode.
    pub fn credentials(&self) -> &ModeCredentials {
        match self.mode {
            TradingMode::Live => &self.live,
            TradingMode::Paper => &self.paper,
        }
    }

    /// Mutable credentials for the active mode.
    pub fn credentials_mut(&mut self) -> &mut ModeCredentials {
        match self.mode {
            TradingMode::Live => &mut self.live,
            TradingMode::Paper => &mut self.paper,
        }
    }
}

/// Loads and saves the session document, sealing secrets in transit.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
    passphrase: Option<String>,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>, passphrase: Option<String>) -> Self {
        Self {
            path: path.into(),
            passphrase,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the config, unsealing secret fields.
    pub fn load(&self) -> SessionResult<SessionConfig> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            SessionError::Config(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let mut config: SessionConfig = serde_json::from_str(&raw)?;

        if let Some(ref passphrase) = self.passphrase {
            for creds in [&mut config.live, &mut config.paper] {
                creds.app_secret = seal::unseal(passphrase, &creds.app_secret)?;
                if let Some(token) = creds.access_token.take() {
                    creds.access_token = Some(seal::unseal(passphrase, &token)?);
                }
            }
        }

        debug!(path = %self.path.display(), mode = %config.mode, "Session config loaded");
        Ok(config)
    }

    /// Save the config, sealing secret fields. Writes via a temp file and
    /// rename so a crash never leaves a half-written document.
    pub fn save(&self, config: &SessionConfig) -> SessionResult<()> {
        let mut on_disk = config.clone();

        if let Some(ref passphrase) = self.passphrase {
            for creds in [&mut on_disk.live, &mut on_disk.paper] {
                if !seal::is_sealed(&creds.app_secret) {
                    creds.app_secret = seal::seal(passphrase, &creds.app_secret);
                }
                if let Some(token) = creds.access_token.take() {
                    creds.access_token = Some(seal::seal(passphrase, &token));
                }
            }
        }

        let json = serde_json::to_string_pretty(&on_disk)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), "Session config saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_config() -> SessionConfig {
        let creds = ModeCredentials {
            base_url: "https://openapivts.koreainvestment.com:29443".to_string(),
            ws_url: "ws://ops.koreainvestment.com:31000".to_string(),
            app_key: "app-key".to_string(),
            app_secret: "app-secret".to_string(),
            account_number: "5012345601".to_string(),
            access_token: Some("Bearer abc".to_string()),
            token_issued_at: Some(1_700_000_000),
        };
        SessionConfig {
            mode: TradingMode::Paper,
            custtype: "P".to_string(),
            hts_id: "myhts".to_string(),
            ws_approval_key: None,
            live: creds.clone(),
            paper: creds,
        }
    }

    #[test]
    fn test_round_trip_without_passphrase() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("settings.json"), None);

        store.save(&sample_config()).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded.paper.app_secret, "app-secret");
        assert_eq!(loaded.paper.access_token.as_deref(), Some("Bearer abc"));
    }

    #[test]
    fn test_secrets_sealed_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let store = SessionStore::new(&path, Some("hunter2".to_string()));

        store.save(&sample_config()).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("app-secret"));
        assert!(!raw.contains("Bearer abc"));
        assert!(raw.contains("sealed:"));

        let loaded = store.load().unwrap();
        assert_eq!(loaded.paper.app_secret, "app-secret");
        assert_eq!(loaded.paper.access_token.as_deref(), Some("Bearer abc"));
    }

    #[test]
    fn test_credentials_selects_mode() {
        let mut config = sample_config();
        config.live.account_number = "1111111101".to_string();
        config.paper.account_number = "2222222201".to_string();

        config.mode = TradingMode::Live;
        assert_eq!(config.credentials().account_number, "1111111101");

        config.mode = TradingMode::Paper;
        assert_eq!(config.credentials().account_number, "2222222201");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let store = SessionStore::new("/nonexistent/settings.json", None);
        assert!(matches!(store.load(), Err(SessionError::Config(_))));
    }
}
