//! Subscription Registry
//!
//! Tracks the live set of `(instrument, feed mode)` subscriptions and the
//! status feeds the application asked for. The registry is the source of
//! truth for replaying subscriptions after a reconnect.
//!
//! # Design
//!
//! - One entry per instrument; subscribing again with another mode replaces
//!   the previous mode.
//! - Each `subscribe`/`unsubscribe` call yields exactly one
//!   [`SubscriptionCommand`] covering only the instruments passed in.
//! - The registry never performs I/O. Callers hand the returned command to
//!   the connection supervisor.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::RwLock;

use super::instrument::{FeedMode, Instrument};

/// Exchange codes used by status feed subscriptions.
pub const STATUS_FEED_EXCHANGES: [u8; 5] = [1, 2, 3, 4, 6];

// =============================================================================
// Commands
// =============================================================================

/// Subscribe or unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionAction {
    /// Start receiving data.
    Subscribe,
    /// Stop receiving data.
    Unsubscribe,
}

impl SubscriptionAction {
    /// Wire action string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
        }
    }
}

/// Exchange-wide status broadcasts that are subscribed without instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusFeed {
    /// Market session status.
    MarketStatus,
    /// Free-text exchange messages.
    ExchangeMessages,
}

impl StatusFeed {
    /// Wire mode string.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::MarketStatus => "market_status",
            Self::ExchangeMessages => "exchange_messages",
        }
    }
}

impl std::str::FromStr for StatusFeed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "market_status" => Ok(Self::MarketStatus),
            "exchange_messages" => Ok(Self::ExchangeMessages),
            other => Err(format!("unknown status feed: {other}")),
        }
    }
}

/// A control command destined for the quote server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionCommand {
    /// Instrument subscription change for one feed mode.
    Instruments {
        /// Subscribe or unsubscribe.
        action: SubscriptionAction,
        /// Feed mode.
        mode: FeedMode,
        /// `(exchange_code, token)` pairs, in call order.
        targets: Vec<(u8, u32)>,
    },
    /// Status feed subscription.
    Status {
        /// Feed to subscribe.
        feed: StatusFeed,
        /// Exchange codes the feed covers.
        exchanges: Vec<u8>,
    },
}

impl SubscriptionCommand {
    fn instruments(action: SubscriptionAction, mode: FeedMode, instruments: &[Instrument]) -> Self {
        Self::Instruments {
            action,
            mode,
            targets: instruments.iter().map(Instrument::target).collect(),
        }
    }

    fn status(feed: StatusFeed) -> Self {
        Self::Status {
            feed,
            exchanges: STATUS_FEED_EXCHANGES.to_vec(),
        }
    }

    /// Action of the command.
    #[must_use]
    pub const fn action(&self) -> SubscriptionAction {
        match self {
            Self::Instruments { action, .. } => *action,
            Self::Status { .. } => SubscriptionAction::Subscribe,
        }
    }
}

/// Errors raised when a subscription request is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    /// No instruments were passed.
    #[error("no instruments given for {0} {1}")]
    Empty(&'static str, FeedMode),
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Debug, Default)]
struct RegistryState {
    entries: HashMap<Instrument, FeedMode>,
    status_feeds: BTreeSet<StatusFeed>,
}

/// Thread-safe registry of active subscriptions.
///
/// # Example
///
/// ```rust
/// use alphatrade_stream::domain::instrument::{Exchange, FeedMode, Instrument};
/// use alphatrade_stream::domain::subscription::SubscriptionRegistry;
///
/// let registry = SubscriptionRegistry::new();
/// let reliance = Instrument::new(Exchange::Nse, 2885, "RELIANCE-EQ");
///
/// registry.subscribe(&[reliance.clone()], FeedMode::MarketData).unwrap();
/// registry.subscribe(&[reliance.clone()], FeedMode::SnapQuote).unwrap();
///
/// // Re-subscribing replaces the mode.
/// assert_eq!(registry.mode_of(&reliance), Some(FeedMode::SnapQuote));
/// assert_eq!(registry.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    state: RwLock<RegistryState>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert instruments under `mode` and build the subscribe command.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::Empty`] when `instruments` is empty.
    pub fn subscribe(
        &self,
        instruments: &[Instrument],
        mode: FeedMode,
    ) -> Result<SubscriptionCommand, SubscriptionError> {
        if instruments.is_empty() {
            return Err(SubscriptionError::Empty("subscribe", mode));
        }

        let mut state = self.state.write();
        for instrument in instruments {
            state.entries.insert(instrument.clone(), mode);
        }

        Ok(SubscriptionCommand::instruments(
            SubscriptionAction::Subscribe,
            mode,
            instruments,
        ))
    }

    /// Remove instruments and build the unsubscribe command.
    ///
    /// Instruments that are not tracked are skipped; the command still lists
    /// every instrument passed in.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::Empty`] when `instruments` is empty.
    pub fn unsubscribe(
        &self,
        instruments: &[Instrument],
        mode: FeedMode,
    ) -> Result<SubscriptionCommand, SubscriptionError> {
        if instruments.is_empty() {
            return Err(SubscriptionError::Empty("unsubscribe", mode));
        }

        let mut state = self.state.write();
        for instrument in instruments {
            state.entries.remove(instrument);
        }

        Ok(SubscriptionCommand::instruments(
            SubscriptionAction::Unsubscribe,
            mode,
            instruments,
        ))
    }

    /// Track a status feed and build its subscribe command.
    pub fn subscribe_status(&self, feed: StatusFeed) -> SubscriptionCommand {
        self.state.write().status_feeds.insert(feed);
        SubscriptionCommand::status(feed)
    }

    /// Group all tracked instruments by feed mode.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<FeedMode, Vec<Instrument>> {
        let state = self.state.read();
        let mut groups: BTreeMap<FeedMode, Vec<Instrument>> = BTreeMap::new();
        for (instrument, mode) in &state.entries {
            groups.entry(*mode).or_default().push(instrument.clone());
        }
        groups
    }

    /// One subscribe command per non-empty feed mode group.
    #[must_use]
    pub fn resubscribe_all(&self) -> Vec<SubscriptionCommand> {
        self.snapshot()
            .into_iter()
            .filter(|(_, instruments)| !instruments.is_empty())
            .map(|(mode, instruments)| {
                SubscriptionCommand::instruments(SubscriptionAction::Subscribe, mode, &instruments)
            })
            .collect()
    }

    /// Subscribe commands for every tracked status feed.
    #[must_use]
    pub fn status_feed_commands(&self) -> Vec<SubscriptionCommand> {
        self.state
            .read()
            .status_feeds
            .iter()
            .copied()
            .map(SubscriptionCommand::status)
            .collect()
    }

    /// Everything to replay after a reconnect, instruments first.
    #[must_use]
    pub fn replay_commands(&self) -> Vec<SubscriptionCommand> {
        let mut commands = self.resubscribe_all();
        commands.extend(self.status_feed_commands());
        commands
    }

    /// Full instrument → mode map.
    #[must_use]
    pub fn entries(&self) -> HashMap<Instrument, FeedMode> {
        self.state.read().entries.clone()
    }

    /// Mode an instrument is subscribed under.
    #[must_use]
    pub fn mode_of(&self, instrument: &Instrument) -> Option<FeedMode> {
        self.state.read().entries.get(instrument).copied()
    }

    /// Number of tracked instruments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Check if no instruments are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
