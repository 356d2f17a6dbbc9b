//! WebSocket connection manager.
//!
//! Owns one persistent connection to the realtime endpoint. On connect it
//! registers the execution-notice channel for the active mode, caches the
//! AES key/iv from the matching ack, echoes PINGPONG keep-alives, and
//! dispatches decoded frames to the injected `WsEvents` listener. Any I/O
//! failure tears the connection down and, while the client has not been
//! shut down, a reconnect follows after a fixed delay. Per-symbol
//! channels are not replayed across reconnects; the coordinator
//! re-requests them when it needs them.

use crate::cipher::decrypt_notice;
use crate::error::{WsError, WsResult};
use crate::frame::{CipherKey, Frame, TR_ID_QUOTE, TR_ID_TICK};
use crate::listener::{MarketData, WsEvents};
use crate::notice::parse_execution_notice;
use crate::subscribe::{build_subscribe_frame, Channel, SubscribeAction, Subscription};
use futures_util::{SinkExt, StreamExt};
use kis_core::{StockCode, TradingMode};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type WsSink = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// WebSocket URL.
    pub url: String,
    /// Approval key issued by the session manager.
    pub approval_key: String,
    /// Customer type header value.
    pub custtype: String,
    /// HTS user id, tr_key of the notice channel.
    pub hts_id: String,
    /// First 8 digits of the running account number.
    pub account_prefix: String,
    pub mode: TradingMode,
    /// Fixed delay before each reconnect attempt.
    pub reconnect_delay_ms: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            approval_key: String::new(),
            custtype: "P".to_string(),
            hts_id: String::new(),
            account_prefix: String::new(),
            mode: TradingMode::Paper,
            reconnect_delay_ms: 3000,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Connected, notice-subscribe frame sent.
    Subscribed,
    /// Receive loop running.
    Listening,
    ShuttingDown,
}

/// On-demand channel registration commands from the coordinator.
#[derive(Debug)]
enum WsCommand {
    Register {
        channel: Channel,
        stock_code: Option<StockCode>,
    },
    Unregister {
        channel: Channel,
        stock_code: Option<StockCode>,
    },
}

/// Clonable handle for registering channels from outside the client task.
#[derive(Clone)]
pub struct WsHandle {
    cmd_tx: mpsc::Sender<WsCommand>,
    subscriptions: Arc<RwLock<HashSet<Subscription>>>,
    mode: TradingMode,
}

impl WsHandle {
    pub async fn register_quote(&self, stock_code: StockCode) -> WsResult<()> {
        self.send(WsCommand::Register {
            channel: Channel::Quote,
            stock_code: Some(stock_code),
        })
        .await
    }

    pub async fn unregister_quote(&self, stock_code: StockCode) -> WsResult<()> {
        self.send(WsCommand::Unregister {
            channel: Channel::Quote,
            stock_code: Some(stock_code),
        })
        .await
    }

    pub async fn register_trade(&self, stock_code: StockCode) -> WsResult<()> {
        self.send(WsCommand::Register {
            channel: Channel::Trade,
            stock_code: Some(stock_code),
        })
        .await
    }

    pub async fn unregister_trade(&self, stock_code: StockCode) -> WsResult<()> {
        self.send(WsCommand::Unregister {
            channel: Channel::Trade,
            stock_code: Some(stock_code),
        })
        .await
    }

    /// Register the notice channel if it is not already tracked as
    /// registered. Safe to call on every order placement.
    pub async fn ensure_notice_registered(&self) -> WsResult<()> {
        if self.notice_registered() {
            return Ok(());
        }
        self.send(WsCommand::Register {
            channel: Channel::ExecutionNotice(self.mode),
            stock_code: None,
        })
        .await
    }

    pub async fn unregister_notice(&self) -> WsResult<()> {
        self.send(WsCommand::Unregister {
            channel: Channel::ExecutionNotice(self.mode),
            stock_code: None,
        })
        .await
    }

    /// Whether the notice channel is currently tracked as registered.
    pub fn notice_registered(&self) -> bool {
        self.subscriptions.read().contains(&Subscription {
            stock_code: None,
            channel: Channel::ExecutionNotice(self.mode),
        })
    }

    pub fn is_registered(&self, subscription: &Subscription) -> bool {
        self.subscriptions.read().contains(subscription)
    }

    async fn send(&self, cmd: WsCommand) -> WsResult<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|e| WsError::SendFailed(e.to_string()))
    }
}

/// WebSocket protocol client.
pub struct WsClient {
    config: WsConfig,
    state: Arc<RwLock<ConnectionState>>,
    subscriptions: Arc<RwLock<HashSet<Subscription>>>,
    events: Arc<dyn WsEvents>,
    cmd_tx: mpsc::Sender<WsCommand>,
    cmd_rx: TokioMutex<mpsc::Receiver<WsCommand>>,
    /// Key material for this connection; cleared on every disconnect.
    cipher: RwLock<Option<CipherKey>>,
    shutdown: CancellationToken,
}

impl WsClient {
    pub fn new(config: WsConfig, events: Arc<dyn WsEvents>, shutdown: CancellationToken) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        Self {
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            subscriptions: Arc::new(RwLock::new(HashSet::new())),
            events,
            cmd_tx,
            cmd_rx: TokioMutex::new(cmd_rx),
            cipher: RwLock::new(None),
            shutdown,
        }
    }

    /// Handle for on-demand channel registration.
    pub fn handle(&self) -> WsHandle {
        WsHandle {
            cmd_tx: self.cmd_tx.clone(),
            subscriptions: self.subscriptions.clone(),
            mode: self.config.mode,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Connect and keep reconnecting with a fixed delay until shutdown.
    pub async fn run(&self) -> WsResult<()> {
        loop {
            if self.shutdown.is_cancelled() {
                *self.state.write() = ConnectionState::Disconnected;
                info!("Shutdown requested, exiting connect loop");
                return Ok(());
            }

            *self.state.write() = ConnectionState::Connecting;

            match self.run_connection().await {
                Ok(()) => info!("WebSocket connection closed"),
                Err(e) => error!(?e, "WebSocket connection error"),
            }

            // Per-connection state does not survive a disconnect
            *self.cipher.write() = None;
            self.subscriptions.write().clear();

            if self.shutdown.is_cancelled() {
                *self.state.write() = ConnectionState::Disconnected;
                info!("Shutdown requested after disconnect, not reconnecting");
                return Ok(());
            }

            *self.state.write() = ConnectionState::Disconnected;
            let delay = Duration::from_millis(self.config.reconnect_delay_ms);
            warn!(delay_ms = delay.as_millis(), "Reconnecting after delay");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown.cancelled() => {
                    *self.state.write() = ConnectionState::Disconnected;
                    info!("Shutdown requested during backoff, exiting");
                    return Ok(());
                }
            }
        }
    }

    async fn run_connection(&self) -> WsResult<()> {
        info!(url = %self.config.url, "Connecting to WebSocket");

        let (ws_stream, _response) = connect_async(self.config.url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();

        // Register the execution-notice channel for the active mode
        let notice_channel = Channel::ExecutionNotice(self.config.mode);
        let frame = build_subscribe_frame(
            notice_channel,
            SubscribeAction::Register,
            &self.config.approval_key,
            &self.config.custtype,
            &self.config.hts_id,
        );
        write.send(Message::Text(frame)).await?;
        self.subscriptions.write().insert(Subscription {
            stock_code: None,
            channel: notice_channel,
        });
        *self.state.write() = ConnectionState::Subscribed;
        info!(mode = %self.config.mode, "Notice channel registration sent");

        *self.state.write() = ConnectionState::Listening;

        let mut cmd_rx = self.cmd_rx.lock().await;

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    *self.state.write() = ConnectionState::ShuttingDown;
                    info!("Shutdown signal received in receive loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Failed to send Close frame during shutdown");
                    }
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text(&text, &mut write).await?;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            debug!("Received ping, sending pong");
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "WebSocket closed by server");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            error!(?e, "WebSocket read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("WebSocket stream ended");
                            return Ok(());
                        }
                        _ => {}
                    }
                }

                cmd = cmd_rx.recv() => {
                    if let Some(cmd) = cmd {
                        self.handle_command(cmd, &mut write).await?;
                    }
                }
            }
        }
    }

    async fn handle_command(&self, cmd: WsCommand, write: &mut WsSink) -> WsResult<()> {
        let (channel, stock_code, action) = match cmd {
            WsCommand::Register {
                channel,
                stock_code,
            } => (channel, stock_code, SubscribeAction::Register),
            WsCommand::Unregister {
                channel,
                stock_code,
            } => (channel, stock_code, SubscribeAction::Unregister),
        };

        let tr_key = match &stock_code {
            Some(code) => code.as_str().to_string(),
            None => self.config.hts_id.clone(),
        };
        let frame = build_subscribe_frame(
            channel,
            action,
            &self.config.approval_key,
            &self.config.custtype,
            &tr_key,
        );
        write.send(Message::Text(frame)).await?;

        let subscription = Subscription {
            stock_code,
            channel,
        };
        match action {
            SubscribeAction::Register => {
                debug!(%channel, tr_key = %tr_key, "Channel registered");
                self.subscriptions.write().insert(subscription);
            }
            SubscribeAction::Unregister => {
                debug!(%channel, tr_key = %tr_key, "Channel unregistered");
                self.subscriptions.write().remove(&subscription);
            }
        }
        Ok(())
    }

    async fn handle_text(&self, text: &str, write: &mut WsSink) -> WsResult<()> {
        let frame = match Frame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(?e, "Dropping unparseable frame");
                return Ok(());
            }
        };

        match frame {
            Frame::Control(control) => {
                if control.is_pingpong() {
                    // Keep-alive contract: echo the frame back verbatim
                    debug!("PINGPONG received, echoing");
                    write.send(Message::Text(text.to_string())).await?;
                    return Ok(());
                }

                if let Some(body) = &control.body {
                    if control.is_success() {
                        info!(tr_id = %control.header.tr_id, msg = %body.msg1, "Control ack");
                        if let Some(key) = control.cipher_key() {
                            info!("Cached AES key material for this connection");
                            *self.cipher.write() = Some(key.clone());
                        }
                    } else {
                        warn!(
                            tr_id = %control.header.tr_id,
                            rt_cd = %body.rt_cd,
                            msg = %body.msg1,
                            "Control error"
                        );
                    }
                }
            }

            Frame::Realtime(realtime) => match realtime.tr_id.as_str() {
                TR_ID_TICK => {
                    if let Some(tick) = crate::frame::parse_tick(&realtime.payload) {
                        self.events.on_market_data(MarketData::Tick(tick));
                    }
                }
                TR_ID_QUOTE => {
                    if let Some(quote) = crate::frame::parse_quote(&realtime.payload) {
                        self.events.on_market_data(MarketData::Quote(quote));
                    }
                }
                other => debug!(tr_id = other, "Ignoring unrecognized realtime frame"),
            },

            Frame::EncryptedNotice(notice) => {
                let key = self.cipher.read().clone();
                let Some(key) = key else {
                    warn!("Encrypted notice before key exchange, dropping");
                    return Ok(());
                };
                let plaintext = match decrypt_notice(&key, &notice.payload) {
                    Ok(plaintext) => plaintext,
                    Err(e) => {
                        warn!(?e, "Dropping undecryptable notice");
                        return Ok(());
                    }
                };
                if let Some(event) =
                    parse_execution_notice(&plaintext, &self.config.account_prefix)
                {
                    self.events.on_execution_event(event);
                }
            }
        }

        Ok(())
    }
}
