//! Session and credential management for the KIS trading client.
//!
//! Owns the durable session config (tokens, app keys, the WS approval
//! key), refreshes the REST access token past its age threshold, and
//! requests the one-time WebSocket approval key. Secret fields are sealed
//! at rest; see `seal`.

pub mod config;
pub mod error;
pub mod manager;
pub mod seal;

pub use config::{ModeCredentials, SessionConfig, SessionStore};
pub use error::{SessionError, SessionResult};
pub use manager::SessionManager;
