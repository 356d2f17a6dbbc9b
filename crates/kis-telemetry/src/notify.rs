//! Operator notification channel.
//!
//! Posts plain-text messages to a Slack-compatible incoming webhook.
//! Delivery is fire-and-forget: a failed post is logged and never
//! propagated, so a dead webhook cannot take down a trading loop.

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Webhook notifier. Cheap to clone; without a configured URL every
/// send is a silent no-op.
#[derive(Clone)]
pub struct Notifier {
    inner: Option<Arc<Inner>>,
}

struct Inner {
    http: reqwest::Client,
    webhook_url: String,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        let inner = webhook_url.filter(|url| !url.is_empty()).map(|url| {
            Arc::new(Inner {
                http: reqwest::Client::builder()
                    .timeout(Duration::from_secs(5))
                    .build()
                    .unwrap_or_default(),
                webhook_url: url,
            })
        });
        Self { inner }
    }

    /// A notifier that drops everything; for tests and dry runs.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Send a message without waiting for delivery.
    pub fn send(&self, text: impl Into<String>) {
        let Some(inner) = self.inner.clone() else {
            return;
        };
        let text = text.into();

        tokio::spawn(async move {
            let body = serde_json::json!({ "text": text });
            match inner.http.post(&inner.webhook_url).json(&body).send().await {
                Ok(response) if !response.status().is_success() => {
                    warn!(status = %response.status(), "Notification webhook refused message");
                }
                Err(e) => {
                    warn!(?e, "Notification webhook unreachable");
                }
                _ => {}
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_notifier_is_noop() {
        // No runtime needed when there is no webhook configured
        let notifier = Notifier::disabled();
        notifier.send("nothing happens");
    }

    #[test]
    fn test_empty_url_disables() {
        let notifier = Notifier::new(Some(String::new()));
        assert!(notifier.inner.is_none());
    }
}
