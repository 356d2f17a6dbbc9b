//! Session manager: token lifetime and the WS approval key.
//!
//! Both `get_valid_token` and `get_ws_approval_key` make at most one REST
//! attempt. A refusal is returned to the caller; nothing continues with a
//! missing credential.

use crate::config::{SessionConfig, SessionStore};
use crate::error::{SessionError, SessionResult};
use chrono::Utc;
use kis_core::TradingMode;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Tokens older than 23 hours are refreshed before use.
const TOKEN_MAX_AGE_SECS: i64 = 23 * 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApprovalResponse {
    approval_key: Option<String>,
}

/// Check whether a token issued at `issued_at` is still usable at `now`.
pub fn is_token_fresh(issued_at: Option<i64>, now: i64) -> bool {
    match issued_at {
        Some(ts) => now - ts < TOKEN_MAX_AGE_SECS,
        None => false,
    }
}

/// Holds the mutable session state behind one async mutex; static
/// identity fields (mode, account, endpoints) are snapshotted at load so
/// other components read them without locking.
pub struct SessionManager {
    store: SessionStore,
    state: Mutex<SessionConfig>,
    http: reqwest::Client,

    mode: TradingMode,
    custtype: String,
    hts_id: String,
    account_number: String,
    base_url: String,
    ws_url: String,
    app_key: String,
    app_secret: String,
}

impl SessionManager {
    /// Load the session document and snapshot identity fields.
    pub fn load(store: SessionStore) -> SessionResult<Self> {
        let config = store.load()?;
        let creds = config.credentials();

        Ok(Self {
            mode: config.mode,
            custtype: config.custtype.clone(),
            hts_id: config.hts_id.clone(),
            account_number: creds.account_number.clone(),
            base_url: creds.base_url.trim_end_matches('/').to_string(),
            ws_url: creds.ws_url.clone(),
            app_key: creds.app_key.clone(),
            app_secret: creds.app_secret.clone(),
            http: reqwest::Client::new(),
            state: Mutex::new(config),
            store,
        })
    }

    pub fn mode(&self) -> TradingMode {
        self.mode
    }

    pub fn custtype(&self) -> &str {
        &self.custtype
    }

    pub fn hts_id(&self) -> &str {
        &self.hts_id
    }

    pub fn account_number(&self) -> &str {
        &self.account_number
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    pub fn app_key(&self) -> &str {
        &self.app_key
    }

    pub fn app_secret(&self) -> &str {
        &self.app_secret
    }

    /// First 8 digits of the account number, the prefix execution
    /// notices are matched against.
    pub fn account_prefix(&self) -> &str {
        let n = self.account_number.len().min(8);
        &self.account_number[..n]
    }

    /// Return a token younger than the refresh threshold, refreshing and
    /// persisting first if the stored one is stale or absent.
    pub async fn get_valid_token(&self) -> SessionResult<String> {
        let mut state = self.state.lock().await;
        let now = Utc::now().timestamp();

        {
            let creds = state.credentials();
            if is_token_fresh(creds.token_issued_at, now) {
                if let Some(ref token) = creds.access_token {
                    return Ok(token.clone());
                }
            }
        }

        info!(mode = %self.mode, "Access token stale or missing, refreshing");
        let token = self.refresh_access_token(&mut state, now).await?;
        Ok(token)
    }

    /// Return the WS approval key, requesting one if absent and
    /// persisting it for later sessions.
    pub async fn get_ws_approval_key(&self) -> SessionResult<String> {
        let mut state = self.state.lock().await;

        if let Some(ref key) = state.ws_approval_key {
            return Ok(key.clone());
        }

        info!(mode = %self.mode, "No cached WS approval key, requesting one");

        let url = format!("{}/oauth2/Approval", self.base_url);
        let body = json!({
            "grant_type": "client_credentials",
            "appkey": self.app_key.clone(),
            "secretkey": self.app_secret.clone(),
        });

        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        let payload: ApprovalResponse = response.json().await.map_err(|e| {
            SessionError::ApprovalRefused(format!("unparseable response: {e}"))
        })?;

        if !status.is_success() {
            return Err(SessionError::ApprovalRefused(format!("HTTP {status}")));
        }
        let key = payload.approval_key.ok_or_else(|| {
            SessionError::ApprovalRefused("response carried no approval_key".to_string())
        })?;

        state.ws_approval_key = Some(key.clone());
        if let Err(e) = self.store.save(&state) {
            warn!(?e, "Failed to persist approval key");
        }

        Ok(key)
    }

    async fn refresh_access_token(
        &self,
        state: &mut SessionConfig,
        now: i64,
    ) -> SessionResult<String> {
        let url = format!("{}/oauth2/tokenP", self.base_url);
        let body = json!({
            "grant_type": "client_credentials",
            "appkey": self.app_key.clone(),
            "appsecret": self.app_secret.clone(),
        });

        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SessionError::TokenRefused(format!("HTTP {status}: {text}")));
        }

        let payload: TokenResponse = response
            .json()
            .await
            .map_err(|e| SessionError::TokenRefused(format!("unparseable response: {e}")))?;
        let raw = payload
            .access_token
            .ok_or_else(|| SessionError::TokenRefused("response carried no access_token".to_string()))?;

        let token = format!("Bearer {raw}");

        let creds = state.credentials_mut();
        creds.access_token = Some(token.clone());
        creds.token_issued_at = Some(now);

        self.store.save(state)?;
        info!(mode = %self.mode, "Access token refreshed and persisted");

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_token_within_threshold() {
        let now = 1_700_000_000;
        assert!(is_token_fresh(Some(now - TOKEN_MAX_AGE_SECS + 1), now));
    }

    #[test]
    fn test_stale_token_past_threshold() {
        let now = 1_700_000_000;
        assert!(!is_token_fresh(Some(now - TOKEN_MAX_AGE_SECS), now));
        assert!(!is_token_fresh(Some(now - TOKEN_MAX_AGE_SECS - 1), now));
    }

    #[test]
    fn test_missing_issue_time_is_stale() {
        assert!(!is_token_fresh(None, 1_700_000_000));
    }
}
