//! AlphaTrade Stream Binary
//!
//! Connects to the quote stream, subscribes the configured instruments and
//! status feeds, and logs every record it receives.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin alphatrade-stream
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `ALPHATRADE_ACCESS_TOKEN`: Session access token
//!
//! ## Optional
//! - `ALPHATRADE_SOCKET_URL`: Socket URL template with `{access_token}`
//! - `STREAM_SUBSCRIPTIONS`: Comma list of `EXCHANGE:TOKEN[:MODE]`
//! - `STREAM_STATUS_FEEDS`: Comma list of `market_status`, `exchange_messages`
//! - `STREAM_HEARTBEAT_INTERVAL_SECS`: Heartbeat interval (default: 5)
//! - `STREAM_HEARTBEAT_TIMEOUT_SECS`: Pong deadline (default: none)
//! - `STREAM_RECONNECT_DELAY_INITIAL_MS`: First reconnect delay (default: 100)
//! - `STREAM_RECONNECT_DELAY_MAX_SECS`: Reconnect delay cap (default: 30)
//! - `STREAM_MAX_RECONNECT_ATTEMPTS`: Attempt cap, 0 = unlimited (default: 0)
//! - `STREAM_METRICS_PORT`: Prometheus metrics port, 0 = off (default: 0)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `RUST_LOG`: Log filter (default: `alphatrade_stream=info`)

use std::collections::BTreeMap;
use std::time::Duration;

use alphatrade_stream::infrastructure::telemetry;
use alphatrade_stream::{
    ClientConfig, FeedMode, Instrument, StreamClient, TickRecord, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Time allowed for the connection loop to wind down.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Already installed is fine.
    let _ = rustls::crypto::ring::default_provider().install_default();

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting AlphaTrade stream client");

    let config = ClientConfig::from_env()?;
    log_config(&config);

    match init_metrics(config.metrics_port) {
        Ok(true) => tracing::info!(port = config.metrics_port, "Metrics exporter listening"),
        Ok(false) => tracing::debug!("Metrics exporter disabled"),
        Err(error) => tracing::warn!(error = %error, "Metrics exporter failed to start"),
    }

    let shutdown_token = CancellationToken::new();

    let client = StreamClient::builder(config.clone())
        .cancellation_token(shutdown_token.clone())
        .on_tick(log_tick)
        .on_dpr(|record| tracing::info!(record = ?record, "Daily price range"))
        .on_open_interest(|record| tracing::info!(record = ?record, "Open interest"))
        .on_market_status(|record| {
            if let TickRecord::MarketStatus(update) = record {
                tracing::info!(
                    exchange = %update.exchange,
                    market_type = %update.market_type,
                    status = %update.status,
                    "Market status"
                );
            }
        })
        .on_exchange_message(|record| {
            if let TickRecord::ExchangeMessage(update) = record {
                tracing::info!(
                    exchange = %update.exchange,
                    message = %update.message,
                    "Exchange message"
                );
            }
        })
        .on_decode_error(|error| tracing::debug!(reason = error.reason(), "Frame skipped"))
        .on_open(|| tracing::info!("Quote stream open"))
        .on_disconnect(|| tracing::warn!("Quote stream disconnected"))
        .on_error(|error| tracing::warn!(error = %error, "Quote stream error"))
        .build();

    let supervisor = client.spawn();

    let subscriber = client.clone();
    tokio::spawn(async move {
        if let Err(error) = subscribe_configured(&subscriber, &config).await {
            tracing::error!(error = %error, "Initial subscription failed");
        }
    });

    tracing::info!("Stream client ready");

    tokio::select! {
        () = await_shutdown() => {
            shutdown_token.cancel();
        }
        () = shutdown_token.cancelled() => {}
    }

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, supervisor).await {
        Ok(Ok(Ok(()))) => tracing::info!("Stream client stopped"),
        Ok(Ok(Err(error))) => {
            tracing::error!(error = %error, "Stream client stopped with error");
            return Err(error.into());
        }
        Ok(Err(error)) => tracing::error!(error = %error, "Stream client task failed"),
        Err(_) => tracing::warn!("Stream client did not stop in time"),
    }

    Ok(())
}

/// Subscribe configured instruments, one command per feed mode, then status
/// feeds.
async fn subscribe_configured(
    client: &StreamClient,
    config: &ClientConfig,
) -> Result<(), alphatrade_stream::ClientError> {
    let mut by_mode: BTreeMap<FeedMode, Vec<Instrument>> = BTreeMap::new();
    for spec in &config.subscriptions {
        by_mode
            .entry(spec.mode)
            .or_default()
            .push(Instrument::new(spec.exchange, spec.token, spec.token.to_string()));
    }

    for (mode, instruments) in &by_mode {
        client.subscribe(instruments, *mode).await?;
        tracing::info!(mode = %mode, count = instruments.len(), "Subscribed");
    }

    for feed in &config.status_feeds {
        client.subscribe_status(*feed).await?;
        tracing::info!(feed = feed.wire_name(), "Subscribed to status feed");
    }

    Ok(())
}

fn log_tick(record: &TickRecord) {
    tracing::info!(
        kind = %record.kind(),
        exchange = %record.exchange(),
        token = ?record.token(),
        symbol = record.instrument().map(|i| i.symbol.as_str()),
        ltp = ?record.last_price(),
        "Tick"
    );
}

/// Log the parsed configuration.
fn log_config(config: &ClientConfig) {
    tracing::info!(
        socket_url = %config.socket_url,
        subscriptions = config.subscriptions.len(),
        status_feeds = config.status_feeds.len(),
        heartbeat_secs = config.stream.heartbeat_interval.as_secs(),
        max_reconnect_attempts = config.stream.max_reconnect_attempts,
        metrics_port = config.metrics_port,
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
