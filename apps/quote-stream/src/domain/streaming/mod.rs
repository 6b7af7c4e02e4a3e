//! Streaming Types
//!
//! Symbols, quotes, connection states, and lifecycle events shared by the
//! client facade and the connection task. These are the canonical internal
//! representations; wire framing lives in the gateway adapter.
//!
//! # Design
//!
//! Lifecycle events form a small tagged set (`open`, `close`, `error`,
//! `exhausted`) with independent listener lists per kind, so a UI can drive
//! a connection-health indicator without touching per-symbol data paths.
//! Listener dispatch isolates panics per listener: one failing observer
//! never prevents the others from running.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Symbol
// =============================================================================

/// A validated market ticker symbol (e.g., "AAPL").
///
/// Symbols are uppercase-normalized on construction so that `aapl`, `Aapl`,
/// and `AAPL` all address the same subscription entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(String);

/// Errors from symbol validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolError {
    /// The symbol was empty or whitespace-only.
    #[error("symbol cannot be empty")]
    Empty,

    /// The symbol contained interior whitespace.
    #[error("symbol cannot contain whitespace: {0:?}")]
    ContainsWhitespace(String),
}

impl Symbol {
    /// Create a symbol from raw input, trimming and uppercasing it.
    ///
    /// # Errors
    ///
    /// Returns [`SymbolError`] for empty or whitespace-containing input.
    pub fn new(raw: &str) -> Result<Self, SymbolError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SymbolError::Empty);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(SymbolError::ContainsWhitespace(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    /// The normalized symbol string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Symbol {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Quote
// =============================================================================

/// A market data update for one symbol.
///
/// Only the fields the UI layers commonly consume are typed. Every other
/// field the gateway sends is preserved verbatim in `extra` and reaches
/// callbacks untouched; the full schema is owned by the gateway, and this
/// client validates nothing beyond "parses as JSON and carries `symbol`".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteMessage {
    /// Ticker symbol exactly as sent by the gateway (not normalized).
    pub symbol: String,

    /// Last price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,

    /// Price change since the previous close.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<Decimal>,

    /// Traded volume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,

    /// Gateway-side timestamp (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Remaining fields, passed through verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// =============================================================================
// Connection State
// =============================================================================

/// Observable state of the gateway connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// A connection attempt is in progress.
    #[default]
    Connecting,
    /// The socket is open and subscriptions are live.
    Open,
    /// The connection dropped; a reconnect is scheduled.
    Reconnecting,
    /// The client was explicitly disconnected.
    Closed,
    /// The reconnect budget is spent; no further attempts will be made.
    Exhausted,
}

impl ConnectionState {
    /// State name for logging and UI display.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
            Self::Exhausted => "exhausted",
        }
    }

    /// Check whether this state is terminal (no further connection activity).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Exhausted)
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Open,
            2 => Self::Reconnecting,
            3 => Self::Closed,
            4 => Self::Exhausted,
            _ => Self::Connecting,
        }
    }

    const fn as_u8(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::Open => 1,
            Self::Reconnecting => 2,
            Self::Closed => 3,
            Self::Exhausted => 4,
        }
    }
}

/// Lock-free cell holding the current [`ConnectionState`].
///
/// Written by the connection task, read by the facade and UI layers.
#[derive(Debug, Default)]
pub struct SharedState(AtomicU8);

impl SharedState {
    /// Create a cell in the given state.
    #[must_use]
    pub const fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    /// Read the current state.
    #[must_use]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Replace the current state.
    pub fn set(&self, state: ConnectionState) {
        self.0.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Check whether the socket is currently open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.get() == ConnectionState::Open
    }
}

// =============================================================================
// Lifecycle Events
// =============================================================================

/// Lifecycle event kinds a listener can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The socket opened and subscriptions were replayed.
    Open,
    /// The socket closed (any reason).
    Close,
    /// A transport or server error occurred.
    Error,
    /// The reconnect budget is spent; terminal.
    Exhausted,
}

/// A lifecycle event delivered to registered listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The socket opened and subscriptions were replayed.
    Open,
    /// The socket closed with the given close code, if the server sent one.
    Close {
        /// WebSocket close code (1000 = normal closure).
        code: Option<u16>,
    },
    /// A transport or server error occurred.
    Error {
        /// Human-readable error description.
        message: String,
    },
    /// The reconnect budget is spent. Emitted exactly once per client.
    Exhausted {
        /// Number of attempts that were made.
        attempts: u32,
    },
}

impl StreamEvent {
    /// The kind this event is delivered under.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Open => EventKind::Open,
            Self::Close { .. } => EventKind::Close,
            Self::Error { .. } => EventKind::Error,
            Self::Exhausted { .. } => EventKind::Exhausted,
        }
    }
}

/// Callback invoked with lifecycle events.
pub type EventCallback = Arc<dyn Fn(&StreamEvent) + Send + Sync>;

/// Handle identifying a registered lifecycle listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Listener registry with independent sets per event kind.
///
/// Listeners are invoked synchronously in registration order. A panicking
/// listener is logged and skipped; its siblings still run.
#[derive(Default)]
pub struct EventListeners {
    listeners: RwLock<HashMap<EventKind, Vec<(ListenerId, EventCallback)>>>,
    next_id: AtomicU64,
}

impl EventListeners {
    /// Create an empty listener registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for an event kind.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&StreamEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let Some(entries) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            listeners.remove(&kind);
        }
        removed
    }

    /// Deliver an event to every listener registered for its kind.
    ///
    /// Returns the number of listeners invoked. The listener list is
    /// snapshotted before iteration, so listeners may register or remove
    /// listeners from within a callback.
    pub fn emit(&self, event: &StreamEvent) -> usize {
        let snapshot: Vec<EventCallback> = self
            .listeners
            .read()
            .get(&event.kind())
            .map(|entries| entries.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();

        for callback in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                tracing::error!(kind = ?event.kind(), "lifecycle listener panicked");
            }
        }

        snapshot.len()
    }

    /// Number of listeners registered for a kind.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.listeners
            .read()
            .get(&kind)
            .map_or(0, std::vec::Vec::len)
    }

    /// Remove every listener.
    pub fn clear(&self) {
        self.listeners.write().clear();
    }
}

impl std::fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.read();
        f.debug_struct("EventListeners")
            .field("kinds", &listeners.len())
            .field(
                "total",
                &listeners.values().map(std::vec::Vec::len).sum::<usize>(),
            )
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn symbol_uppercases_and_trims() {
        let symbol = Symbol::new("  aapl ").unwrap();
        assert_eq!(symbol.as_str(), "AAPL");
    }

    #[test]
    fn symbol_preserves_punctuation() {
        let symbol = Symbol::new("brk.b").unwrap();
        assert_eq!(symbol.as_str(), "BRK.B");
    }

    #[test]
    fn symbol_rejects_empty() {
        assert_eq!(Symbol::new(""), Err(SymbolError::Empty));
        assert_eq!(Symbol::new("   "), Err(SymbolError::Empty));
    }

    #[test]
    fn symbol_rejects_interior_whitespace() {
        assert!(matches!(
            Symbol::new("AA PL"),
            Err(SymbolError::ContainsWhitespace(_))
        ));
    }

    #[test]
    fn symbol_from_str() {
        let symbol: Symbol = "msft".parse().unwrap();
        assert_eq!(symbol.as_str(), "MSFT");
    }

    #[test]
    fn equal_after_normalization() {
        assert_eq!(Symbol::new("aapl").unwrap(), Symbol::new("AAPL").unwrap());
    }

    #[test]
    fn state_cell_roundtrip() {
        let cell = SharedState::new(ConnectionState::Connecting);
        assert_eq!(cell.get(), ConnectionState::Connecting);
        assert!(!cell.is_open());

        cell.set(ConnectionState::Open);
        assert_eq!(cell.get(), ConnectionState::Open);
        assert!(cell.is_open());

        cell.set(ConnectionState::Exhausted);
        assert!(cell.get().is_terminal());
    }

    #[test]
    fn event_kind_mapping() {
        assert_eq!(StreamEvent::Open.kind(), EventKind::Open);
        assert_eq!(
            StreamEvent::Close { code: Some(1000) }.kind(),
            EventKind::Close
        );
        assert_eq!(
            StreamEvent::Error {
                message: "boom".to_string()
            }
            .kind(),
            EventKind::Error
        );
        assert_eq!(
            StreamEvent::Exhausted { attempts: 5 }.kind(),
            EventKind::Exhausted
        );
    }

    #[test]
    fn listeners_receive_matching_kind_only() {
        let listeners = EventListeners::new();
        let opens = Arc::new(AtomicUsize::new(0));
        let closes = Arc::new(AtomicUsize::new(0));

        let opens_clone = Arc::clone(&opens);
        listeners.on(EventKind::Open, move |_| {
            opens_clone.fetch_add(1, Ordering::SeqCst);
        });
        let closes_clone = Arc::clone(&closes);
        listeners.on(EventKind::Close, move |_| {
            closes_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(listeners.emit(&StreamEvent::Open), 1);
        assert_eq!(listeners.emit(&StreamEvent::Open), 1);
        assert_eq!(listeners.emit(&StreamEvent::Close { code: None }), 1);

        assert_eq!(opens.load(Ordering::SeqCst), 2);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn multiple_listeners_per_kind() {
        let listeners = EventListeners::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            listeners.on(EventKind::Open, move |_| {
                order.lock().unwrap().push(tag);
            });
        }

        assert_eq!(listeners.emit(&StreamEvent::Open), 3);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn off_removes_only_named_listener() {
        let listeners = EventListeners::new();
        let count = Arc::new(AtomicUsize::new(0));

        let count_a = Arc::clone(&count);
        let id_a = listeners.on(EventKind::Error, move |_| {
            count_a.fetch_add(1, Ordering::SeqCst);
        });
        let count_b = Arc::clone(&count);
        listeners.on(EventKind::Error, move |_| {
            count_b.fetch_add(10, Ordering::SeqCst);
        });

        assert!(listeners.off(EventKind::Error, id_a));
        assert!(!listeners.off(EventKind::Error, id_a));

        listeners.emit(&StreamEvent::Error {
            message: "x".to_string(),
        });
        assert_eq!(count.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn panicking_listener_does_not_block_siblings() {
        let listeners = EventListeners::new();
        let reached = Arc::new(AtomicUsize::new(0));

        listeners.on(EventKind::Open, |_| {
            panic!("listener failure");
        });
        let reached_clone = Arc::clone(&reached);
        listeners.on(EventKind::Open, move |_| {
            reached_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(listeners.emit(&StreamEvent::Open), 2);
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_removes_everything() {
        let listeners = EventListeners::new();
        listeners.on(EventKind::Open, |_| {});
        listeners.on(EventKind::Close, |_| {});

        listeners.clear();

        assert_eq!(listeners.count(EventKind::Open), 0);
        assert_eq!(listeners.emit(&StreamEvent::Open), 0);
    }
}
