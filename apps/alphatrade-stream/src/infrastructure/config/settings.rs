//! Stream Client Configuration Settings
//!
//! Configuration types for the stream client, loaded from environment
//! variables.

use std::str::FromStr;
use std::time::Duration;

use crate::application::services::DEFAULT_MESSAGE_LOG_CAPACITY;
use crate::domain::instrument::{Exchange, FeedMode};
use crate::domain::subscription::StatusFeed;

/// Default quote server socket URL template.
pub const DEFAULT_SOCKET_URL: &str =
    "wss://alpha.sasonline.in/hydrasocket/v2/websocket?access_token={access_token}";

/// Placeholder replaced by the access token in the URL template.
pub const ACCESS_TOKEN_PLACEHOLDER: &str = "{access_token}";

/// Session access token.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a token.
    #[must_use]
    pub const fn new(token: String) -> Self {
        Self(token)
    }

    /// Get the token.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Streaming connection settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Heartbeat ping interval.
    pub heartbeat_interval: Duration,
    /// Pong deadline before the connection is considered dead.
    pub heartbeat_timeout: Option<Duration>,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
    /// Entries retained per status message log.
    pub message_log_capacity: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            heartbeat_timeout: None,
            reconnect_delay_initial: Duration::from_millis(100),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 0,
            message_log_capacity: DEFAULT_MESSAGE_LOG_CAPACITY,
        }
    }
}

/// One configured instrument subscription, `EXCHANGE:TOKEN:MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionSpec {
    /// Exchange.
    pub exchange: Exchange,
    /// Instrument token.
    pub token: u32,
    /// Feed mode.
    pub mode: FeedMode,
}

impl FromStr for SubscriptionSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| ConfigError::InvalidSubscription {
            spec: s.to_string(),
            reason,
        };

        let mut parts = s.trim().split(':');
        let (Some(exchange), Some(token), mode, None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid("expected EXCHANGE:TOKEN[:MODE]".to_string()));
        };

        let exchange = exchange.parse().map_err(|e| invalid(format!("{e}")))?;
        let token = token
            .trim()
            .parse()
            .map_err(|_| invalid(format!("invalid token {token:?}")))?;
        let mode = mode
            .map(FeedMode::from_str)
            .transpose()
            .map_err(|e| invalid(format!("{e}")))?
            .unwrap_or(FeedMode::MarketData);

        Ok(Self {
            exchange,
            token,
            mode,
        })
    }
}

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Session access token.
    pub access_token: AccessToken,
    /// Socket URL template containing `{access_token}`.
    pub socket_url: String,
    /// Streaming connection settings.
    pub stream: StreamSettings,
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
    /// Instrument subscriptions to open at startup.
    pub subscriptions: Vec<SubscriptionSpec>,
    /// Status feeds to open at startup.
    pub status_feeds: Vec<StatusFeed>,
}

impl ClientConfig {
    /// Create configuration for a token with default settings.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: AccessToken::new(access_token.into()),
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            stream: StreamSettings::default(),
            metrics_port: 0,
            subscriptions: Vec::new(),
            status_feeds: Vec::new(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the access token is missing or empty, or if a
    /// subscription or status feed entry is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key/value source.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_source<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvSource(get);

        let access_token = env
            .get("ALPHATRADE_ACCESS_TOKEN")
            .ok_or_else(|| ConfigError::MissingEnvVar("ALPHATRADE_ACCESS_TOKEN".to_string()))?;

        if access_token.trim().is_empty() {
            return Err(ConfigError::EmptyValue(
                "ALPHATRADE_ACCESS_TOKEN".to_string(),
            ));
        }

        let socket_url = env
            .get("ALPHATRADE_SOCKET_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SOCKET_URL.to_string());

        let defaults = StreamSettings::default();
        let stream = StreamSettings {
            heartbeat_interval: env.duration_secs(
                "STREAM_HEARTBEAT_INTERVAL_SECS",
                defaults.heartbeat_interval,
            ),
            heartbeat_timeout: env
                .parse::<u64>("STREAM_HEARTBEAT_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            reconnect_delay_initial: env.duration_millis(
                "STREAM_RECONNECT_DELAY_INITIAL_MS",
                defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: env.duration_secs(
                "STREAM_RECONNECT_DELAY_MAX_SECS",
                defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: env
                .parse("STREAM_RECONNECT_DELAY_MULTIPLIER")
                .unwrap_or(defaults.reconnect_delay_multiplier),
            max_reconnect_attempts: env
                .parse("STREAM_MAX_RECONNECT_ATTEMPTS")
                .unwrap_or(defaults.max_reconnect_attempts),
            message_log_capacity: env
                .parse("STREAM_MESSAGE_LOG_CAPACITY")
                .unwrap_or(defaults.message_log_capacity),
        };

        let subscriptions = env
            .list("STREAM_SUBSCRIPTIONS")
            .map(|entry| entry.parse())
            .collect::<Result<Vec<SubscriptionSpec>, _>>()?;

        let status_feeds = env
            .list("STREAM_STATUS_FEEDS")
            .map(|entry| {
                entry
                    .parse()
                    .map_err(|_| ConfigError::InvalidStatusFeed(entry.clone()))
            })
            .collect::<Result<Vec<StatusFeed>, _>>()?;

        Ok(Self {
            access_token: AccessToken::new(access_token),
            socket_url,
            stream,
            metrics_port: env.parse("STREAM_METRICS_PORT").unwrap_or(0),
            subscriptions,
            status_feeds,
        })
    }

    /// Socket URL with the placeholder replaced by `token`.
    #[must_use]
    pub fn socket_url_for(&self, token: &str) -> String {
        render_socket_url(&self.socket_url, token)
    }
}

/// Replace the token placeholder in a URL template.
#[must_use]
pub fn render_socket_url(template: &str, token: &str) -> String {
    template.replace(ACCESS_TOKEN_PLACEHOLDER, token)
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Malformed subscription entry.
    #[error("invalid subscription {spec:?}: {reason}")]
    InvalidSubscription {
        /// Offending entry.
        spec: String,
        /// What was wrong with it.
        reason: String,
    },
    /// Unknown status feed name.
    #[error("invalid status feed {0:?}")]
    InvalidStatusFeed(String),
}

/// Typed accessors over a key/value lookup. Malformed values read as unset.
struct EnvSource<F>(F);

impl<F: Fn(&str) -> Option<String>> EnvSource<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn parse<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    fn duration_secs(&self, key: &str, default: Duration) -> Duration {
        self.parse::<u64>(key).map_or(default, Duration::from_secs)
    }

    fn duration_millis(&self, key: &str, default: Duration) -> Duration {
        self.parse::<u64>(key).map_or(default, Duration::from_millis)
    }

    fn list(&self, key: &str) -> impl Iterator<Item = String> {
        self.get(key)
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>()
            .into_iter()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use test_case::test_case;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ClientConfig::from_source(|key| vars.get(key).cloned())
    }

    #[test]
    fn missing_token() {
        let err = config_from(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "ALPHATRADE_ACCESS_TOKEN"));
    }

    #[test]
    fn empty_token() {
        let err = config_from(&[("ALPHATRADE_ACCESS_TOKEN", "  ")]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyValue(_)));
    }

    #[test]
    fn defaults() {
        let config = config_from(&[("ALPHATRADE_ACCESS_TOKEN", "tok")]).unwrap();

        assert_eq!(config.access_token.expose(), "tok");
        assert_eq!(config.socket_url, DEFAULT_SOCKET_URL);
        assert_eq!(config.metrics_port, 0);
        assert!(config.subscriptions.is_empty());
        assert!(config.status_feeds.is_empty());

        let stream = &config.stream;
        assert_eq!(stream.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(stream.heartbeat_timeout, None);
        assert_eq!(stream.reconnect_delay_initial, Duration::from_millis(100));
        assert_eq!(stream.reconnect_delay_max, Duration::from_secs(30));
        assert!((stream.reconnect_delay_multiplier - 2.0).abs() < f64::EPSILON);
        assert_eq!(stream.max_reconnect_attempts, 0);
        assert_eq!(stream.message_log_capacity, 1_000);
    }

    #[test]
    fn overrides() {
        let config = config_from(&[
            ("ALPHATRADE_ACCESS_TOKEN", "tok"),
            ("ALPHATRADE_SOCKET_URL", "ws://localhost:9000/?t={access_token}"),
            ("STREAM_HEARTBEAT_INTERVAL_SECS", "10"),
            ("STREAM_HEARTBEAT_TIMEOUT_SECS", "30"),
            ("STREAM_RECONNECT_DELAY_INITIAL_MS", "250"),
            ("STREAM_MAX_RECONNECT_ATTEMPTS", "5"),
            ("STREAM_MESSAGE_LOG_CAPACITY", "50"),
            ("STREAM_METRICS_PORT", "9464"),
        ])
        .unwrap();

        assert_eq!(config.socket_url_for("abc"), "ws://localhost:9000/?t=abc");
        assert_eq!(config.stream.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(
            config.stream.heartbeat_timeout,
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            config.stream.reconnect_delay_initial,
            Duration::from_millis(250)
        );
        assert_eq!(config.stream.max_reconnect_attempts, 5);
        assert_eq!(config.stream.message_log_capacity, 50);
        assert_eq!(config.metrics_port, 9464);
    }

    #[test]
    fn malformed_numbers_fall_back() {
        let config = config_from(&[
            ("ALPHATRADE_ACCESS_TOKEN", "tok"),
            ("STREAM_HEARTBEAT_INTERVAL_SECS", "soon"),
            ("STREAM_RECONNECT_DELAY_MULTIPLIER", "fast"),
        ])
        .unwrap();

        assert_eq!(config.stream.heartbeat_interval, Duration::from_secs(5));
        assert!((config.stream.reconnect_delay_multiplier - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn subscriptions_and_status_feeds() {
        let config = config_from(&[
            ("ALPHATRADE_ACCESS_TOKEN", "tok"),
            (
                "STREAM_SUBSCRIPTIONS",
                "NSE:2885:marketdata, nfo:35001:snapquote,MCX:224570",
            ),
            ("STREAM_STATUS_FEEDS", "market_status,exchange_messages"),
        ])
        .unwrap();

        assert_eq!(
            config.subscriptions,
            vec![
                SubscriptionSpec {
                    exchange: Exchange::Nse,
                    token: 2885,
                    mode: FeedMode::MarketData,
                },
                SubscriptionSpec {
                    exchange: Exchange::Nfo,
                    token: 35001,
                    mode: FeedMode::SnapQuote,
                },
                SubscriptionSpec {
                    exchange: Exchange::Mcx,
                    token: 224_570,
                    mode: FeedMode::MarketData,
                },
            ]
        );
        assert_eq!(
            config.status_feeds,
            vec![StatusFeed::MarketStatus, StatusFeed::ExchangeMessages]
        );
    }

    #[test_case("NSE" ; "missing token")]
    #[test_case("LSE:1:marketdata" ; "unknown exchange")]
    #[test_case("NSE:abc:marketdata" ; "non numeric token")]
    #[test_case("NSE:1:depth" ; "unknown mode")]
    #[test_case("NSE:1:compact:extra" ; "too many parts")]
    fn invalid_subscription_spec(spec: &str) {
        assert!(matches!(
            spec.parse::<SubscriptionSpec>(),
            Err(ConfigError::InvalidSubscription { .. })
        ));
    }

    #[test]
    fn invalid_status_feed() {
        let err = config_from(&[
            ("ALPHATRADE_ACCESS_TOKEN", "tok"),
            ("STREAM_STATUS_FEEDS", "news"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidStatusFeed(feed) if feed == "news"));
    }

    #[test]
    fn access_token_redacted_debug() {
        let config = ClientConfig::new("secret-token");
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }
}
