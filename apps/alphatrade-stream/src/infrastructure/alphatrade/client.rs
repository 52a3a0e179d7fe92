//! Stream Client
//!
//! Public façade wiring the registry, dispatcher and connection supervisor
//! together.
//!
//! # Example
//!
//! ```rust,no_run
//! use alphatrade_stream::domain::instrument::{Exchange, FeedMode, Instrument};
//! use alphatrade_stream::infrastructure::alphatrade::StreamClient;
//! use alphatrade_stream::infrastructure::config::ClientConfig;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = StreamClient::builder(ClientConfig::new("access-token"))
//!         .on_tick(|tick| println!("{tick:?}"))
//!         .build();
//!
//!     let handle = client.spawn();
//!     let reliance = Instrument::new(Exchange::Nse, 2885, "RELIANCE-EQ");
//!     client.subscribe(&[reliance], FeedMode::MarketData).await?;
//!
//!     client.shutdown();
//!     handle.await??;
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{AccessTokenProvider, InstrumentLookup, StaticAccessToken};
use crate::domain::instrument::{Exchange, FeedMode, Instrument};
use crate::domain::streaming::{
    CallbackSlot, ExchangeMessageUpdate, MarketStatusUpdate, TickRecord,
};
use crate::domain::subscription::{
    StatusFeed, SubscriptionCommand, SubscriptionError, SubscriptionRegistry,
};
use crate::infrastructure::config::ClientConfig;
use crate::infrastructure::metrics;

use super::codec::DecodeError;
use super::dispatcher::{DecodeErrorHandler, Dispatcher, TickHandler};
use super::normalizer::{PriceMultipliers, UnitNormalizer};
use super::supervisor::{
    ConnectionHandlers, ConnectionState, ConnectionSupervisor, SendError, SupervisorConfig,
    SupervisorError,
};
use super::transport::{Connector, WebSocketConnector};

// =============================================================================
// Errors
// =============================================================================

/// Errors returned by [`StreamClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Subscription request rejected.
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    /// Command could not be sent.
    #[error(transparent)]
    Send(#[from] SendError),

    /// Connection loop ended with an error.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`StreamClient`].
pub struct StreamClientBuilder {
    config: ClientConfig,
    connector: Option<Arc<dyn Connector>>,
    token_provider: Option<Arc<dyn AccessTokenProvider>>,
    lookup: Option<Arc<dyn InstrumentLookup>>,
    multipliers: PriceMultipliers,
    slots: HashMap<CallbackSlot, TickHandler>,
    decode_error: Option<DecodeErrorHandler>,
    connection: ConnectionHandlers,
    cancel: Option<CancellationToken>,
}

impl std::fmt::Debug for StreamClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClientBuilder")
            .field("config", &self.config)
            .field("slots", &self.slots.keys().collect::<Vec<_>>())
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

impl StreamClientBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            connector: None,
            token_provider: None,
            lookup: None,
            multipliers: PriceMultipliers::default(),
            slots: HashMap::new(),
            decode_error: None,
            connection: ConnectionHandlers::default(),
            cancel: None,
        }
    }

    /// Use a custom connector instead of the WebSocket client.
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Use a custom access token source instead of the configured token.
    #[must_use]
    pub fn access_token_provider(mut self, provider: Arc<dyn AccessTokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    /// Set the instrument lookup used for enrichment.
    #[must_use]
    pub fn instrument_lookup(mut self, lookup: Arc<dyn InstrumentLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Set the price multiplier table.
    #[must_use]
    pub fn price_multipliers(mut self, multipliers: PriceMultipliers) -> Self {
        self.multipliers = multipliers;
        self
    }

    /// Callback for market data, compact, snap quote and full snap quote
    /// records.
    #[must_use]
    pub fn on_tick(self, f: impl Fn(&TickRecord) + Send + Sync + 'static) -> Self {
        self.slot(CallbackSlot::Tick, f)
    }

    /// Callback for daily price range records.
    #[must_use]
    pub fn on_dpr(self, f: impl Fn(&TickRecord) + Send + Sync + 'static) -> Self {
        self.slot(CallbackSlot::Dpr, f)
    }

    /// Callback for open interest records.
    #[must_use]
    pub fn on_open_interest(self, f: impl Fn(&TickRecord) + Send + Sync + 'static) -> Self {
        self.slot(CallbackSlot::OpenInterest, f)
    }

    /// Callback for market status records.
    #[must_use]
    pub fn on_market_status(self, f: impl Fn(&TickRecord) + Send + Sync + 'static) -> Self {
        self.slot(CallbackSlot::MarketStatus, f)
    }

    /// Callback for exchange message records.
    #[must_use]
    pub fn on_exchange_message(self, f: impl Fn(&TickRecord) + Send + Sync + 'static) -> Self {
        self.slot(CallbackSlot::ExchangeMessage, f)
    }

    /// Callback for frames that could not be decoded.
    #[must_use]
    pub fn on_decode_error(mut self, f: impl Fn(&DecodeError) + Send + Sync + 'static) -> Self {
        self.decode_error = Some(Arc::new(f));
        self
    }

    /// Callback fired after each (re)connect, once subscriptions are replayed.
    #[must_use]
    pub fn on_open(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.connection.on_open = Some(Arc::new(f));
        self
    }

    /// Callback fired when an open connection goes down.
    #[must_use]
    pub fn on_disconnect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.connection.on_disconnect = Some(Arc::new(f));
        self
    }

    /// Callback fired for every connection failure.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&SupervisorError) + Send + Sync + 'static) -> Self {
        self.connection.on_error = Some(Arc::new(f));
        self
    }

    /// Use an external shutdown token.
    #[must_use]
    pub fn cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn slot(mut self, slot: CallbackSlot, f: impl Fn(&TickRecord) + Send + Sync + 'static) -> Self {
        self.slots.insert(slot, Arc::new(f));
        self
    }

    /// Build the client. Nothing connects until [`StreamClient::run`] or
    /// [`StreamClient::spawn`].
    #[must_use]
    pub fn build(self) -> StreamClient {
        let lookup = self
            .lookup
            .unwrap_or_else(|| Arc::new(|_: Exchange, _: u32| -> Option<Instrument> { None }));
        let normalizer = UnitNormalizer::new(lookup).with_multipliers(self.multipliers);
        let dispatcher = Arc::new(Dispatcher::with_log_capacity(
            normalizer,
            self.config.stream.message_log_capacity,
        ));
        for (slot, handler) in self.slots {
            dispatcher.register(slot, handler);
        }
        if let Some(handler) = self.decode_error {
            dispatcher.on_decode_error(handler);
        }

        let token_provider = self.token_provider.unwrap_or_else(|| {
            Arc::new(StaticAccessToken::new(
                self.config.access_token.expose().to_string(),
            ))
        });
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WebSocketConnector));
        let cancel = self.cancel.unwrap_or_default();
        let registry = Arc::new(SubscriptionRegistry::new());

        let supervisor = Arc::new(ConnectionSupervisor::new(
            SupervisorConfig::from_client_config(&self.config),
            connector,
            token_provider,
            Arc::clone(&registry),
            Arc::clone(&dispatcher),
            self.connection,
            cancel.clone(),
        ));

        StreamClient {
            registry,
            dispatcher,
            supervisor,
            command_order: Arc::new(tokio::sync::Mutex::new(())),
            cancel,
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// Market data stream client.
#[derive(Debug, Clone)]
pub struct StreamClient {
    registry: Arc<SubscriptionRegistry>,
    dispatcher: Arc<Dispatcher>,
    supervisor: Arc<ConnectionSupervisor>,
    command_order: Arc<tokio::sync::Mutex<()>>,
    cancel: CancellationToken,
}

impl StreamClient {
    /// Start building a client.
    #[must_use]
    pub fn builder(config: ClientConfig) -> StreamClientBuilder {
        StreamClientBuilder::new(config)
    }

    /// Subscribe instruments under a feed mode.
    ///
    /// The registry is updated immediately. The command is written once the
    /// connection is open; until then this call waits. Commands reach the
    /// wire in the order their registry updates were applied.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty instrument list or if the client shuts
    /// down before the command is written.
    pub async fn subscribe(
        &self,
        instruments: &[Instrument],
        mode: FeedMode,
    ) -> Result<(), ClientError> {
        self.apply(|registry| registry.subscribe(instruments, mode)).await
    }

    /// Unsubscribe instruments from a feed mode.
    ///
    /// # Errors
    ///
    /// See [`subscribe`](Self::subscribe).
    pub async fn unsubscribe(
        &self,
        instruments: &[Instrument],
        mode: FeedMode,
    ) -> Result<(), ClientError> {
        self.apply(|registry| registry.unsubscribe(instruments, mode)).await
    }

    /// Subscribe to market status broadcasts.
    ///
    /// # Errors
    ///
    /// Returns an error if the client shuts down before the command is
    /// written.
    pub async fn subscribe_market_status_messages(&self) -> Result<(), ClientError> {
        self.subscribe_status(StatusFeed::MarketStatus).await
    }

    /// Subscribe to exchange message broadcasts.
    ///
    /// # Errors
    ///
    /// Returns an error if the client shuts down before the command is
    /// written.
    pub async fn subscribe_exchange_messages(&self) -> Result<(), ClientError> {
        self.subscribe_status(StatusFeed::ExchangeMessages).await
    }

    /// Subscribe to a status feed.
    ///
    /// # Errors
    ///
    /// Returns an error if the client shuts down before the command is
    /// written.
    pub async fn subscribe_status(&self, feed: StatusFeed) -> Result<(), ClientError> {
        self.apply(|registry| Ok(registry.subscribe_status(feed))).await
    }

    /// Retained market status records, oldest first.
    #[must_use]
    pub fn market_status_messages(&self) -> Vec<MarketStatusUpdate> {
        self.dispatcher.market_status_messages()
    }

    /// Retained exchange messages, oldest first.
    #[must_use]
    pub fn exchange_messages(&self) -> Vec<ExchangeMessageUpdate> {
        self.dispatcher.exchange_messages()
    }

    /// Current instrument subscriptions.
    #[must_use]
    pub fn subscriptions(&self) -> HashMap<Instrument, FeedMode> {
        self.registry.entries()
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    /// Receiver notified on every connection state change.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.supervisor.state_changes()
    }

    /// Shutdown token shared with the connection loop.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run the connection loop on the current task until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the reconnect attempt budget is spent.
    pub async fn run(&self) -> Result<(), ClientError> {
        Arc::clone(&self.supervisor).run().await?;
        Ok(())
    }

    /// Run the connection loop on a background task.
    #[must_use = "the handle reports how the connection loop ended"]
    pub fn spawn(&self) -> JoinHandle<Result<(), ClientError>> {
        let supervisor = Arc::clone(&self.supervisor);
        tokio::spawn(async move {
            supervisor.run().await?;
            Ok(())
        })
    }

    /// Request shutdown. Pending sends fail with [`SendError::Cancelled`].
    pub fn shutdown(&self) {
        tracing::info!("Stream client shutdown requested");
        self.cancel.cancel();
    }

    /// Update the registry and write the resulting command under the
    /// client's command lock.
    async fn apply<F>(&self, update: F) -> Result<(), ClientError>
    where
        F: FnOnce(&SubscriptionRegistry) -> Result<SubscriptionCommand, SubscriptionError>,
    {
        let _order = self.command_order.lock().await;
        let command = update(&self.registry)?;
        self.publish_subscription_gauges();
        self.supervisor.send(&command).await?;
        Ok(())
    }

    fn publish_subscription_gauges(&self) {
        let groups = self.registry.snapshot();
        for mode in FeedMode::all() {
            let count = groups.get(mode).map_or(0, Vec::len);
            metrics::set_subscriptions(mode.wire_name(), count);
        }
    }
}
