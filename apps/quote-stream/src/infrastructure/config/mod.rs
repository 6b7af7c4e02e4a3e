//! Configuration Module
//!
//! Environment-driven settings for the quote stream client.

mod settings;

pub use settings::{ConfigError, ReconnectSettings, Settings};
