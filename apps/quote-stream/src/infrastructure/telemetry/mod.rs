//! Tracing Integration
//!
//! Configures the tracing subscriber for the watch binary. Embedding hosts
//! that already install a subscriber should skip this and let the client's
//! `tracing` calls flow into their own setup.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Log filter (default: `naps_quote_stream=info`)

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the tracing subscriber.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
#[allow(clippy::expect_used)]
pub fn init() {
    let env_filter = EnvFilter::from_default_env()
        .add_directive(
            "naps_quote_stream=info"
                .parse()
                .expect("static directive 'naps_quote_stream=info' is valid"),
        )
        .add_directive(
            "tungstenite=warn"
                .parse()
                .expect("static directive 'tungstenite=warn' is valid"),
        );

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
