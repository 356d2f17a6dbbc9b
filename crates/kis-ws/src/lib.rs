//! WebSocket protocol client for the KIS realtime API.
//!
//! Provides:
//! - Frame codec: realtime tick/quote payloads, JSON control frames,
//!   AES-256-CBC execution-notice decryption
//! - Subscribe/unsubscribe frame construction for the 8 channel commands
//! - A connection manager with fixed-delay reconnection, PINGPONG echo,
//!   and on-demand per-symbol channel registration

pub mod cipher;
pub mod connection;
pub mod error;
pub mod frame;
pub mod listener;
pub mod notice;
pub mod subscribe;

pub use connection::{ConnectionState, WsClient, WsConfig, WsHandle};
pub use error::{WsError, WsResult};
pub use frame::{CipherKey, ControlFrame, Frame, RealtimeFrame, RealtimeQuote, RealtimeTick};
pub use listener::{MarketData, WsEvents};
pub use notice::parse_execution_notice;
pub use subscribe::{build_subscribe_frame, Channel, SubscribeAction, Subscription};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
