#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access
    )
)]

//! Quote Stream - Live Market Data Subscription Client
//!
//! Maintains one WebSocket connection to the NAPS market-data gateway,
//! multiplexes many symbol subscriptions over it, reconnects with bounded
//! linear backoff on failure, and fans incoming quote messages out to
//! per-symbol callback sets. UI hosts construct a [`QuoteStream`], register
//! callbacks from their view layer, and observe connection health through
//! lifecycle events.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Subscription state and streaming types
//!   - `subscription`: Per-symbol callback registry with first/last tracking
//!   - `streaming`: Symbols, connection states, lifecycle events
//!
//! - **Application**: The public client facade
//!   - `services`: [`QuoteStream`] orchestrating registry and connection
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `gateway`: WebSocket connection task, wire codec, reconnect policy
//!   - `config`: Environment-driven settings
//!   - `telemetry`: Tracing subscriber setup
//!   - `metrics`: Metric descriptions and recording helpers
//!
//! # Data Flow
//!
//! ```text
//!                 ┌─────────────┐     ┌──────────────┐──► callback 1 (AAPL)
//! Gateway WS ────►│  Connection │────►│ Subscription │──► callback 2 (AAPL)
//!                 │    Task     │     │   Registry   │──► callback 3 (MSFT)
//!                 └─────────────┘     └──────────────┘
//!                        ▲
//!                        │ subscribe / unsubscribe control frames
//!                 ┌─────────────┐
//!                 │ QuoteStream │◄── UI effect hooks
//!                 └─────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Subscription state and streaming types.
pub mod domain;

/// Application layer - The public client facade.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::streaming::{
    ConnectionState, EventKind, EventListeners, ListenerId, StreamEvent, Symbol, SymbolError,
};
pub use domain::subscription::{QuoteCallback, SubscriptionId, SubscriptionRegistry};

// Application facade
pub use application::services::{QuoteStream, Subscription};

// Infrastructure config
pub use infrastructure::config::{ConfigError, ReconnectSettings, Settings};

// Gateway types (for integration tests and embedding hosts)
pub use infrastructure::gateway::client::{AuthToken, StreamClientError, StreamConfig};
pub use infrastructure::gateway::messages::{
    AuthResultMessage, ControlFrame, InboundMessage, QuoteMessage, ServerErrorMessage,
};
pub use infrastructure::gateway::reconnect::{ReconnectConfig, ReconnectPolicy};

// Metrics
pub use infrastructure::metrics::describe_metrics;

// Telemetry
pub use infrastructure::telemetry::init as init_telemetry;
