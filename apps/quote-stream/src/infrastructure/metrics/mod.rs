//! Metrics Instrumentation
//!
//! Records client metrics through the `metrics` facade. This crate only
//! records; embedding hosts install whatever recorder/exporter suits their
//! deployment. Without a recorder the calls are no-ops.
//!
//! # Metrics
//!
//! - `naps_quote_stream_quotes_delivered_total`: callback invocations
//! - `naps_quote_stream_frames_dropped_total`: malformed/undeliverable frames
//! - `naps_quote_stream_callback_panics_total`: isolated callback panics
//! - `naps_quote_stream_reconnects_total`: reconnection attempts

use metrics::{counter, describe_counter};

/// Register metric descriptions with the installed recorder.
///
/// Optional; call once at startup if the host's exporter surfaces help
/// text.
pub fn describe_metrics() {
    describe_counter!(
        "naps_quote_stream_quotes_delivered_total",
        "Total quote callback invocations"
    );
    describe_counter!(
        "naps_quote_stream_frames_dropped_total",
        "Total inbound frames dropped as malformed or undeliverable"
    );
    describe_counter!(
        "naps_quote_stream_callback_panics_total",
        "Total quote callbacks that panicked during fan-out"
    );
    describe_counter!(
        "naps_quote_stream_reconnects_total",
        "Total gateway reconnection attempts"
    );
}

/// Record quote deliveries to callbacks.
pub fn record_quotes_delivered(count: usize) {
    counter!("naps_quote_stream_quotes_delivered_total")
        .increment(u64::try_from(count).unwrap_or(u64::MAX));
}

/// Record one dropped inbound frame.
pub fn record_frame_dropped() {
    counter!("naps_quote_stream_frames_dropped_total").increment(1);
}

/// Record isolated callback panics.
pub fn record_callback_panics(count: usize) {
    counter!("naps_quote_stream_callback_panics_total")
        .increment(u64::try_from(count).unwrap_or(u64::MAX));
}

/// Record one reconnection attempt.
pub fn record_reconnect_attempt() {
    counter!("naps_quote_stream_reconnects_total").increment(1);
}
