//! Quote Stream Watch Binary
//!
//! Connects to the NAPS market-data gateway, subscribes to the configured
//! watchlist, and logs quotes and connection lifecycle. This is the same
//! client the web tier embeds, driven standalone.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p naps-quote-stream
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `NAPS_STREAM_URL`: Gateway WebSocket endpoint
//!
//! ## Optional
//! - `NAPS_STREAM_TOKEN`: Bearer token for the auth frame
//! - `NAPS_WATCH_SYMBOLS`: Comma-separated watchlist (e.g., "AAPL,MSFT")
//! - `NAPS_STREAM_PING_INTERVAL_SECS`: Keepalive interval (default: 30)
//! - `NAPS_STREAM_RECONNECT_BASE_MS`: Backoff base delay (default: 1000)
//! - `NAPS_STREAM_RECONNECT_MAX_SECS`: Backoff delay cap (default: 30)
//! - `NAPS_STREAM_RECONNECT_JITTER`: Backoff jitter fraction (default: 0)
//! - `NAPS_STREAM_MAX_RECONNECT_ATTEMPTS`: Retry budget (default: 5)
//! - `RUST_LOG`: Log level (default: info)

use naps_quote_stream::{EventKind, QuoteStream, Settings, describe_metrics, init_telemetry};
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();

    init_telemetry();
    describe_metrics();

    tracing::info!("Starting quote stream watch");

    let settings = Settings::from_env()?;
    log_config(&settings);

    let client = QuoteStream::connect(settings.stream_config());

    client.on(EventKind::Open, |_| {
        tracing::info!("Gateway connection open");
    });
    client.on(EventKind::Close, |event| {
        tracing::warn!(?event, "Gateway connection closed");
    });
    client.on(EventKind::Error, |event| {
        tracing::error!(?event, "Gateway error");
    });
    client.on(EventKind::Exhausted, |event| {
        tracing::error!(?event, "Gateway reconnect budget exhausted; restart to retry");
    });

    let mut subscriptions = Vec::with_capacity(settings.watch_symbols.len());
    for symbol in &settings.watch_symbols {
        let tag = symbol.clone();
        subscriptions.push(client.subscribe(symbol.clone(), move |quote| {
            tracing::info!(
                symbol = %tag,
                price = ?quote.price,
                change = ?quote.change,
                volume = ?quote.volume,
                "quote"
            );
        }));
    }

    tracing::info!(symbols = settings.watch_symbols.len(), "Watch ready");

    await_shutdown().await;

    for subscription in subscriptions {
        subscription.unsubscribe();
    }
    client.disconnect();

    tracing::info!("Quote stream watch stopped");
    Ok(())
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

/// Log the parsed configuration.
fn log_config(settings: &Settings) {
    tracing::info!(
        url = %settings.url,
        authenticated = settings.token.is_some(),
        watch_symbols = settings.watch_symbols.len(),
        ping_interval_secs = settings.ping_interval.as_secs(),
        max_reconnect_attempts = settings.reconnect.max_attempts,
        "Configuration loaded"
    );
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
