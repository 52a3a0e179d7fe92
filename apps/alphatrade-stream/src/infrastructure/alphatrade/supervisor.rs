//! Connection Supervisor
//!
//! Owns the single live connection to the quote server and drives the
//! `Disconnected → Connecting → Connected → Disconnected` cycle until
//! cancelled.
//!
//! # Connection Lifecycle
//!
//! 1. Fetch the access token and render the socket URL
//! 2. Connect, then replay every tracked subscription on the new socket
//! 3. Install the write half, mark the state `Connected`, fire `on_open`
//! 4. Run the read loop (binary frames to the dispatcher, heartbeat pings,
//!    pong replies where the transport does not send them) until the link
//!    fails or shutdown is requested
//! 5. Drop the write half, mark `Disconnected`, fire `on_disconnect`, back
//!    off and go to 1
//!
//! Outbound writes from any task go through [`ConnectionSupervisor::send`],
//! which waits for `Connected` and writes under one lock so frames never
//! interleave.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{AccessTokenProvider, TokenError};
use crate::domain::subscription::{SubscriptionCommand, SubscriptionRegistry};
use crate::infrastructure::config::{ClientConfig, render_socket_url};
use crate::infrastructure::metrics;

use super::codec::{CodecError, JsonCodec};
use super::dispatcher::Dispatcher;
use super::heartbeat::{HeartbeatConfig, HeartbeatEvent, HeartbeatManager, LinkActivity};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use super::transport::{
    Connection, Connector, FrameSink, FrameSource, InboundFrame, OutboundFrame, TransportError,
};

/// Upper bound on a graceful close of the write half.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

// =============================================================================
// State
// =============================================================================

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection.
    #[default]
    Disconnected,
    /// Connection attempt in progress.
    Connecting,
    /// Connected and subscriptions replayed.
    Connected,
}

impl ConnectionState {
    /// Get the state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }

    const fn gauge_value(self) -> f64 {
        match self {
            Self::Disconnected => 0.0,
            Self::Connecting => 1.0,
            Self::Connected => 2.0,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Reasons a connection ended or could not be established.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// Access token unavailable.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Command encoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// No pong within the heartbeat deadline.
    #[error("heartbeat timeout after {0:?}")]
    HeartbeatTimeout(Duration),

    /// A write from [`ConnectionSupervisor::send`] failed.
    #[error("connection lost on write")]
    LinkLost,

    /// The reconnect attempt budget is spent.
    #[error("maximum reconnection attempts ({0}) exceeded")]
    MaxReconnectAttemptsExceeded(u32),
}

impl SupervisorError {
    /// Short label used in metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Token(_) => "token",
            Self::Transport(e) => e.kind(),
            Self::Codec(_) => "codec",
            Self::HeartbeatTimeout(_) => "heartbeat_timeout",
            Self::LinkLost => "link_lost",
            Self::MaxReconnectAttemptsExceeded(_) => "max_attempts",
        }
    }
}

/// Errors returned to callers of [`ConnectionSupervisor::send`].
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// Shutdown was requested before the frame could be written.
    #[error("stream client shut down")]
    Cancelled,

    /// Command encoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

// =============================================================================
// Configuration and Callbacks
// =============================================================================

/// Supervisor configuration.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Socket URL template containing `{access_token}`.
    pub url_template: String,
    /// Reconnection configuration.
    pub reconnect: ReconnectConfig,
    /// Heartbeat configuration.
    pub heartbeat: HeartbeatConfig,
}

impl SupervisorConfig {
    /// Create configuration from `ClientConfig`.
    #[must_use]
    pub fn from_client_config(config: &ClientConfig) -> Self {
        Self {
            url_template: config.socket_url.clone(),
            reconnect: ReconnectConfig::from_stream_settings(&config.stream),
            heartbeat: HeartbeatConfig::from_stream_settings(&config.stream),
        }
    }
}

/// Callback without arguments.
pub type LifecycleHandler = Arc<dyn Fn() + Send + Sync>;

/// Callback receiving connection failures.
pub type ErrorHandler = Arc<dyn Fn(&SupervisorError) + Send + Sync>;

/// Connection lifecycle callbacks.
#[derive(Clone, Default)]
pub struct ConnectionHandlers {
    /// Fired after subscriptions are replayed on a new connection.
    pub on_open: Option<LifecycleHandler>,
    /// Fired when an open connection is lost or closed.
    pub on_disconnect: Option<LifecycleHandler>,
    /// Fired for every failed connection or connection attempt.
    pub on_error: Option<ErrorHandler>,
}

impl std::fmt::Debug for ConnectionHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandlers")
            .field("on_open", &self.on_open.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

// =============================================================================
// Supervisor
// =============================================================================

/// Supervises the quote server connection.
pub struct ConnectionSupervisor {
    config: SupervisorConfig,
    connector: Arc<dyn Connector>,
    token_provider: Arc<dyn AccessTokenProvider>,
    registry: Arc<SubscriptionRegistry>,
    dispatcher: Arc<Dispatcher>,
    handlers: ConnectionHandlers,
    codec: JsonCodec,
    state_tx: watch::Sender<ConnectionState>,
    sink: tokio::sync::Mutex<Option<Box<dyn FrameSink>>>,
    link_lost: parking_lot::Mutex<CancellationToken>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("handlers", &self.handlers)
            .finish_non_exhaustive()
    }
}

impl ConnectionSupervisor {
    /// Create a new supervisor.
    #[must_use]
    pub fn new(
        config: SupervisorConfig,
        connector: Arc<dyn Connector>,
        token_provider: Arc<dyn AccessTokenProvider>,
        registry: Arc<SubscriptionRegistry>,
        dispatcher: Arc<Dispatcher>,
        handlers: ConnectionHandlers,
        cancel: CancellationToken,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            connector,
            token_provider,
            registry,
            dispatcher,
            handlers,
            codec: JsonCodec::new(),
            state_tx,
            sink: tokio::sync::Mutex::new(None),
            link_lost: parking_lot::Mutex::new(CancellationToken::new()),
            cancel,
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Shutdown token.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run the connection loop until cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::MaxReconnectAttemptsExceeded`] when the
    /// attempt budget is spent. The cancellation token is cancelled first so
    /// pending senders are released.
    pub async fn run(self: Arc<Self>) -> Result<(), SupervisorError> {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("Stream supervisor cancelled");
                return Ok(());
            }

            let mut opened = false;
            let result = self.connect_and_run(&mut policy, &mut opened).await;
            self.teardown().await;

            if opened && let Some(on_disconnect) = &self.handlers.on_disconnect {
                on_disconnect();
            }

            let error = match result {
                Ok(()) => {
                    tracing::info!("Stream connection closed for shutdown");
                    return Ok(());
                }
                Err(error) => error,
            };

            tracing::warn!(error = %error, was_connected = opened, "Stream connection lost");
            metrics::record_transport_error(error.kind());
            if let Some(on_error) = &self.handlers.on_error {
                on_error(&error);
            }

            let Some(delay) = policy.next_delay() else {
                let attempts = policy.attempt_count();
                tracing::error!(attempts, "Giving up on stream connection");
                self.cancel.cancel();
                return Err(SupervisorError::MaxReconnectAttemptsExceeded(attempts));
            };

            let attempt = policy.attempt_count();
            tracing::info!(
                attempt,
                delay_ms = delay.as_millis(),
                "Reconnecting to quote stream"
            );
            metrics::record_reconnect();

            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("Stream supervisor cancelled during reconnect delay");
                    return Ok(());
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One connection from token fetch to link loss.
    ///
    /// Returns `Ok(())` only when shutdown was requested.
    async fn connect_and_run(
        &self,
        policy: &mut ReconnectPolicy,
        opened: &mut bool,
    ) -> Result<(), SupervisorError> {
        self.set_state(ConnectionState::Connecting);

        let token = self.token_provider.access_token()?;
        let url = render_socket_url(&self.config.url_template, &token);
        tracing::info!(url = %self.config.url_template, "Connecting to quote stream");

        let Connection {
            mut sink,
            mut source,
        } = tokio::select! {
            () = self.cancel.cancelled() => return Ok(()),
            connection = self.connector.connect(&url) => connection?,
        };

        // Replay before the sink is shared so queued sends land after it.
        let replay = self.registry.replay_commands();
        for command in &replay {
            self.write_command(&mut *sink, command).await?;
        }

        let link_lost = CancellationToken::new();
        *self.link_lost.lock() = link_lost.clone();
        {
            let mut guard = self.sink.lock().await;
            *guard = Some(sink);
            self.set_state(ConnectionState::Connected);
        }
        policy.reset();
        *opened = true;

        tracing::info!(replayed = replay.len(), "Connected to quote stream");
        if let Some(on_open) = &self.handlers.on_open {
            on_open();
        }

        self.read_loop(&mut *source, &link_lost).await
    }

    async fn read_loop(
        &self,
        source: &mut dyn FrameSource,
        link_lost: &CancellationToken,
    ) -> Result<(), SupervisorError> {
        let activity = Arc::new(LinkActivity::new());
        let (heartbeat_tx, mut heartbeat_rx) = mpsc::channel::<HeartbeatEvent>(8);
        let heartbeat_cancel = self.cancel.child_token();
        let _heartbeat_guard = heartbeat_cancel.clone().drop_guard();
        tokio::spawn(
            HeartbeatManager::new(
                self.config.heartbeat.clone(),
                Arc::clone(&activity),
                heartbeat_tx,
                heartbeat_cancel,
            )
            .run(),
        );

        let heartbeat_payload = self.codec.encode_heartbeat()?.into_bytes();
        let reply_to_pings = !source.answers_pings();

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return Ok(()),
                () = link_lost.cancelled() => return Err(SupervisorError::LinkLost),
                Some(event) = heartbeat_rx.recv() => match event {
                    HeartbeatEvent::Ping => {
                        activity.ping_written();
                        self.write(OutboundFrame::Ping(heartbeat_payload.clone())).await?;
                    }
                    HeartbeatEvent::Expired(elapsed) => {
                        return Err(SupervisorError::HeartbeatTimeout(elapsed));
                    }
                },
                frame = source.next_frame() => match frame {
                    Some(Ok(InboundFrame::Binary(data))) => {
                        activity.touch();
                        tracing::trace!(len = data.len(), "Binary frame");
                        // Failures are logged and reported by the dispatcher.
                        let _ = self.dispatcher.on_frame(&data);
                    }
                    Some(Ok(InboundFrame::Text(text))) => {
                        activity.touch();
                        tracing::debug!(text = %text, "Control message from server");
                    }
                    Some(Ok(InboundFrame::Ping(data))) => {
                        activity.touch();
                        if reply_to_pings {
                            self.write(OutboundFrame::Pong(data)).await?;
                        }
                    }
                    Some(Ok(InboundFrame::Pong(_))) => activity.touch(),
                    Some(Ok(InboundFrame::Close)) => {
                        tracing::info!("Server sent close frame");
                        return Err(TransportError::Closed.into());
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        tracing::info!("Stream ended");
                        return Err(TransportError::Closed.into());
                    }
                },
            }
        }
    }

    /// Send a subscription command.
    ///
    /// Waits until the connection is open, then writes under the sink lock.
    /// A failed write drops the connection and the command is written again
    /// once the supervisor has reconnected.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Cancelled`] if shutdown is requested first.
    pub async fn send(&self, command: &SubscriptionCommand) -> Result<(), SendError> {
        let json = self.codec.encode_command(command)?;
        tracing::debug!(command = %json, "Sending control command");
        self.send_frame(OutboundFrame::Text(json)).await?;
        metrics::record_command_sent(command.action().as_str());
        Ok(())
    }

    /// Send a raw frame with the same guarantees as [`send`](Self::send).
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Cancelled`] if shutdown is requested first.
    pub async fn send_frame(&self, frame: OutboundFrame) -> Result<(), SendError> {
        let mut state_rx = self.state_tx.subscribe();

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return Err(SendError::Cancelled),
                connected = async {
                    state_rx
                        .wait_for(|state| *state == ConnectionState::Connected)
                        .await
                        .is_ok()
                } => {
                    if !connected {
                        return Err(SendError::Cancelled);
                    }
                }
            }

            let mut guard = self.sink.lock().await;
            let Some(sink) = guard.as_mut() else {
                drop(guard);
                tokio::task::yield_now().await;
                continue;
            };

            match sink.send_frame(frame.clone()).await {
                Ok(()) => return Ok(()),
                Err(error) => {
                    tracing::warn!(
                        error = %error,
                        frame = frame.label(),
                        "Write failed, awaiting reconnect"
                    );
                    self.set_state(ConnectionState::Disconnected);
                    guard.take();
                    self.link_lost.lock().cancel();
                }
            }
        }
    }

    /// Write on the installed sink from the read loop.
    async fn write(&self, frame: OutboundFrame) -> Result<(), SupervisorError> {
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(SupervisorError::LinkLost)?;
        sink.send_frame(frame).await?;
        Ok(())
    }

    async fn write_command(
        &self,
        sink: &mut dyn FrameSink,
        command: &SubscriptionCommand,
    ) -> Result<(), SupervisorError> {
        let json = self.codec.encode_command(command)?;
        tracing::debug!(command = %json, "Replaying subscription");
        sink.send_frame(OutboundFrame::Text(json)).await?;
        metrics::record_command_sent(command.action().as_str());
        Ok(())
    }

    /// Drop the write half and mark the connection down.
    async fn teardown(&self) {
        self.link_lost.lock().cancel();

        let sink = {
            let mut guard = self.sink.lock().await;
            self.set_state(ConnectionState::Disconnected);
            guard.take()
        };

        if let Some(mut sink) = sink
            && let Ok(Err(error)) = tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await
        {
            tracing::debug!(error = %error, "Close on dropped connection failed");
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Connection state changed");
            metrics::set_connection_state(state.gauge_value());
        }
    }
}
