//! Application Layer - The public client facade.
//!
//! Hosts construct a [`services::QuoteStream`] and pass it down to their
//! view layer; the facade orchestrates the domain registry and the gateway
//! connection task.

/// The quote stream facade and subscription handles.
pub mod services;
