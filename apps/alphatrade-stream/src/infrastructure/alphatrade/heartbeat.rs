//! Heartbeat Scheduling
//!
//! The quote server drops sessions that stay silent, so the client sends a
//! `{"a":"h","v":[],"m":""}` ping at a fixed cadence. Any inbound traffic
//! counts as proof of life. With a reply deadline configured, a ping left
//! unanswered for longer than the deadline expires the connection.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::config::StreamSettings;

/// Default interval between heartbeat pings.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Heartbeat cadence and optional reply deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Time between pings. Zero disables heartbeats.
    pub interval: Duration,
    /// Silence tolerated after an unanswered ping. `None` never expires.
    pub reply_deadline: Option<Duration>,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_INTERVAL, None)
    }
}

impl HeartbeatConfig {
    /// Create a heartbeat configuration.
    #[must_use]
    pub const fn new(interval: Duration, reply_deadline: Option<Duration>) -> Self {
        Self {
            interval,
            reply_deadline,
        }
    }

    /// Take the heartbeat fields from `StreamSettings`.
    #[must_use]
    pub const fn from_stream_settings(settings: &StreamSettings) -> Self {
        Self::new(settings.heartbeat_interval, settings.heartbeat_timeout)
    }
}

/// Requests from the scheduler to the connection's read loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatEvent {
    /// Write a heartbeat ping now.
    Ping,
    /// The link has been silent past the deadline.
    Expired(Duration),
}

#[derive(Debug)]
struct Activity {
    last_inbound: Instant,
    ping_outstanding: bool,
}

/// Inbound activity of one connection, shared by the read loop and the
/// scheduler.
#[derive(Debug)]
pub struct LinkActivity {
    inner: Mutex<Activity>,
}

impl Default for LinkActivity {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkActivity {
    /// Start tracking a fresh connection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Activity {
                last_inbound: Instant::now(),
                ping_outstanding: false,
            }),
        }
    }

    /// Note inbound traffic; clears any outstanding ping.
    pub fn touch(&self) {
        let mut activity = self.inner.lock();
        activity.last_inbound = Instant::now();
        activity.ping_outstanding = false;
    }

    /// Note that a ping went out.
    pub fn ping_written(&self) {
        self.inner.lock().ping_outstanding = true;
    }

    /// Check if a ping is still unanswered.
    #[must_use]
    pub fn is_awaiting_reply(&self) -> bool {
        self.inner.lock().ping_outstanding
    }

    /// Time since the last inbound frame.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.inner.lock().last_inbound.elapsed()
    }

    /// Silence past `deadline` with a ping outstanding, if any.
    fn expired(&self, deadline: Duration) -> Option<Duration> {
        let activity = self.inner.lock();
        let idle = activity.last_inbound.elapsed();
        (activity.ping_outstanding && idle > deadline).then_some(idle)
    }
}

/// Ticks at the heartbeat cadence for one connection.
///
/// The scheduler never touches the socket; the read loop receives its
/// [`HeartbeatEvent`]s and does the write.
#[derive(Debug)]
pub struct HeartbeatManager {
    config: HeartbeatConfig,
    activity: Arc<LinkActivity>,
    events: mpsc::Sender<HeartbeatEvent>,
    cancel: CancellationToken,
}

impl HeartbeatManager {
    /// Create a scheduler for one connection.
    #[must_use]
    pub const fn new(
        config: HeartbeatConfig,
        activity: Arc<LinkActivity>,
        events: mpsc::Sender<HeartbeatEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            activity,
            events,
            cancel,
        }
    }

    /// Tick until cancelled, the receiver is dropped, or the link expires.
    ///
    /// The first ping is due one interval after start.
    pub async fn run(self) {
        let every = self.config.interval;
        if every.is_zero() {
            tracing::debug!("Heartbeat disabled");
            return;
        }

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let event = self.next_event();
                    let expired = matches!(event, HeartbeatEvent::Expired(_));
                    if self.events.send(event).await.is_err() || expired {
                        break;
                    }
                }
            }
        }

        tracing::trace!("Heartbeat scheduler stopped");
    }

    fn next_event(&self) -> HeartbeatEvent {
        let Some(idle) = self
            .config
            .reply_deadline
            .and_then(|deadline| self.activity.expired(deadline))
        else {
            return HeartbeatEvent::Ping;
        };

        tracing::warn!(
            idle_ms = idle.as_millis(),
            "Heartbeat unanswered past deadline"
        );
        HeartbeatEvent::Expired(idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn(
        config: HeartbeatConfig,
        activity: Arc<LinkActivity>,
    ) -> (
        mpsc::Receiver<HeartbeatEvent>,
        CancellationToken,
        tokio::task::JoinHandle<()>,
    ) {
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let manager = HeartbeatManager::new(config, activity, tx, cancel.clone());
        let handle = tokio::spawn(manager.run());
        (rx, cancel, handle)
    }

    fn stale(activity: &LinkActivity, by: Duration) {
        let mut inner = activity.inner.lock();
        inner.last_inbound = Instant::now().checked_sub(by).unwrap();
        inner.ping_outstanding = true;
    }

    #[test]
    fn config_from_settings() {
        let settings = StreamSettings {
            heartbeat_timeout: Some(Duration::from_secs(12)),
            ..StreamSettings::default()
        };
        let config = HeartbeatConfig::from_stream_settings(&settings);
        assert_eq!(config.interval, DEFAULT_HEARTBEAT_INTERVAL);
        assert_eq!(config.reply_deadline, Some(Duration::from_secs(12)));
        assert_eq!(HeartbeatConfig::default().reply_deadline, None);
    }

    #[test]
    fn touch_clears_outstanding_ping() {
        let activity = LinkActivity::new();
        activity.ping_written();
        assert!(activity.is_awaiting_reply());

        activity.touch();
        assert!(!activity.is_awaiting_reply());
        assert!(activity.idle_for() < Duration::from_secs(1));
    }

    #[test]
    fn expiry_needs_outstanding_ping() {
        let activity = LinkActivity::new();
        stale(&activity, Duration::from_secs(30));
        assert!(activity.expired(Duration::from_secs(10)).is_some());

        activity.inner.lock().ping_outstanding = false;
        assert!(activity.expired(Duration::from_secs(10)).is_none());
    }

    #[tokio::test]
    async fn pings_at_interval() {
        let (mut rx, cancel, handle) = spawn(
            HeartbeatConfig::new(Duration::from_millis(20), None),
            Arc::new(LinkActivity::new()),
        );

        for _ in 0..2 {
            let event = tokio::time::timeout(Duration::from_millis(500), rx.recv())
                .await
                .unwrap();
            assert_eq!(event, Some(HeartbeatEvent::Ping));
        }

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn silent_link_keeps_pinging_without_deadline() {
        let activity = Arc::new(LinkActivity::new());
        stale(&activity, Duration::from_secs(60));
        let (mut rx, cancel, handle) =
            spawn(HeartbeatConfig::new(Duration::from_millis(10), None), activity);

        for _ in 0..3 {
            assert_eq!(rx.recv().await, Some(HeartbeatEvent::Ping));
        }

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn silent_link_expires_with_deadline() {
        let activity = Arc::new(LinkActivity::new());
        stale(&activity, Duration::from_millis(200));
        let (mut rx, _cancel, handle) = spawn(
            HeartbeatConfig::new(Duration::from_millis(20), Some(Duration::from_millis(100))),
            activity,
        );

        let event = tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            event,
            HeartbeatEvent::Expired(idle) if idle >= Duration::from_millis(200)
        ));

        // Expiry ends the scheduler.
        tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn stops_on_cancel() {
        let (_rx, cancel, handle) = spawn(
            HeartbeatConfig::new(Duration::from_secs(10), None),
            Arc::new(LinkActivity::new()),
        );
        cancel.cancel();

        assert!(
            tokio::time::timeout(Duration::from_millis(100), handle)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn zero_interval_disables_heartbeat() {
        let (tx, mut rx) = mpsc::channel(4);
        HeartbeatManager::new(
            HeartbeatConfig::new(Duration::ZERO, None),
            Arc::new(LinkActivity::new()),
            tx,
            CancellationToken::new(),
        )
        .run()
        .await;

        assert_eq!(rx.recv().await, None);
    }
}
