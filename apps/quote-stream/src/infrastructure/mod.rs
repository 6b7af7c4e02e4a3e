//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete adapters around the domain layer: the WebSocket gateway client,
//! environment configuration, and observability plumbing.

/// Market-data gateway WebSocket adapter.
pub mod gateway;

/// Environment-driven configuration.
pub mod config;

/// Metric descriptions and recording helpers.
pub mod metrics;

/// Tracing subscriber setup.
pub mod telemetry;
