//! Quote Stream Facade
//!
//! [`QuoteStream`] is the client API the rest of the application sees:
//! subscribe callbacks to symbols, listen to connection lifecycle events,
//! and tear the connection down. The WebSocket itself lives in a spawned
//! connection task; the facade only mutates shared registries and hands
//! control-frame deltas to the task.
//!
//! The client is an explicitly constructed, owned object. Hosts create one
//! with [`QuoteStream::connect`], share clones of it (cloning is cheap and
//! refers to the same connection), and call [`QuoteStream::disconnect`]
//! when done. There is no global instance.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::streaming::{
    ConnectionState, EventKind, EventListeners, ListenerId, QuoteMessage, SharedState, Symbol,
};
use crate::domain::subscription::{RemoveOutcome, SubscriptionId, SubscriptionRegistry};
use crate::infrastructure::gateway::client::{ConnectionTask, StreamConfig};
use crate::infrastructure::gateway::messages::ControlFrame;

// =============================================================================
// Quote Stream
// =============================================================================

/// Live quote subscription client.
///
/// Maintains one WebSocket connection to the market-data gateway and fans
/// incoming quotes out to per-symbol callbacks. Subscribing while the
/// connection is down is not an error: the symbol is replayed on the next
/// successful open.
///
/// # Example
///
/// ```rust,no_run
/// use naps_quote_stream::{EventKind, QuoteStream, StreamConfig, Symbol};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = QuoteStream::connect(StreamConfig::new("wss://gateway.naps.finance/market"));
///
/// let subscription = client.subscribe(Symbol::new("AAPL")?, |quote| {
///     println!("AAPL: {:?}", quote.price);
/// });
///
/// client.on(EventKind::Close, |_| {
///     println!("connection lost");
/// });
///
/// // ... later, from the component teardown path:
/// subscription.unsubscribe();
/// client.disconnect();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct QuoteStream {
    registry: Arc<SubscriptionRegistry>,
    listeners: Arc<EventListeners>,
    state: Arc<SharedState>,
    frame_tx: mpsc::UnboundedSender<ControlFrame>,
    cancel: CancellationToken,
}

impl QuoteStream {
    /// Construct the client and start connecting.
    ///
    /// The connection task is spawned immediately. Register lifecycle
    /// listeners promptly after construction and consult [`Self::state`]
    /// for the current status; on a multi-threaded runtime the first `open`
    /// can fire before a late listener attaches.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn connect(config: StreamConfig) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());
        let listeners = Arc::new(EventListeners::new());
        let state = Arc::new(SharedState::new(ConnectionState::Connecting));
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let task = ConnectionTask::new(
            config,
            Arc::clone(&registry),
            Arc::clone(&listeners),
            Arc::clone(&state),
            frame_rx,
            cancel.clone(),
        );

        tokio::spawn(async move {
            if let Err(error) = task.run().await {
                tracing::error!(error = %error, "Quote stream stopped");
            }
        });

        Self {
            registry,
            listeners,
            state,
            frame_tx,
            cancel,
        }
    }

    /// Register a callback for a symbol's quotes.
    ///
    /// If this is the first callback for the symbol and the socket is open,
    /// a subscribe frame is sent immediately; otherwise the symbol is
    /// replayed on the next open. The callback runs synchronously on the
    /// connection task, so it should hand work off rather than block.
    pub fn subscribe<F>(&self, symbol: Symbol, callback: F) -> Subscription
    where
        F: Fn(&QuoteMessage) + Send + Sync + 'static,
    {
        let (id, first) = self.registry.add(symbol.clone(), Arc::new(callback));

        if first && self.state.is_open() {
            let _ = self.frame_tx.send(ControlFrame::subscribe(&symbol));
        }

        Subscription {
            symbol,
            id,
            registry: Arc::clone(&self.registry),
            state: Arc::clone(&self.state),
            frame_tx: self.frame_tx.clone(),
        }
    }

    /// Register a lifecycle listener. Returns an id for [`Self::off`].
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&crate::domain::streaming::StreamEvent) + Send + Sync + 'static,
    {
        self.listeners.on(kind, listener)
    }

    /// Remove a lifecycle listener. Returns `false` if it was not
    /// registered.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.listeners.off(kind, id)
    }

    /// Current connection state, for UI health indicators.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Symbols that currently have at least one callback.
    #[must_use]
    pub fn subscribed_symbols(&self) -> Vec<Symbol> {
        self.registry.symbols()
    }

    /// Tear the client down.
    ///
    /// Closes the socket with a normal-closure frame, cancels any pending
    /// reconnect, and clears every subscription and lifecycle listener.
    /// Idempotent; the client is inert afterwards.
    pub fn disconnect(&self) {
        self.cancel.cancel();
        self.registry.clear();
        self.listeners.clear();
        self.state.set(ConnectionState::Closed);
    }
}

impl std::fmt::Debug for QuoteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteStream")
            .field("state", &self.state.get())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Subscription Handle
// =============================================================================

/// Handle for one registered callback.
///
/// Calling [`Subscription::unsubscribe`] removes the callback; when it was
/// the last one for its symbol, the gateway is told to stop pushing quotes.
/// Dropping the handle without unsubscribing leaves the subscription active
/// for the life of the client, mirroring a discarded unsubscribe closure.
#[must_use = "dropping the handle without calling `unsubscribe` leaves the subscription active"]
pub struct Subscription {
    symbol: Symbol,
    id: SubscriptionId,
    registry: Arc<SubscriptionRegistry>,
    state: Arc<SharedState>,
    frame_tx: mpsc::UnboundedSender<ControlFrame>,
}

impl Subscription {
    /// The symbol this subscription is registered under.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Remove the callback from the registry.
    ///
    /// Sends an unsubscribe frame only when this was the last callback for
    /// the symbol and the socket is open.
    pub fn unsubscribe(self) {
        let outcome = self.registry.remove(&self.symbol, self.id);
        if outcome == RemoveOutcome::LastForSymbol && self.state.is_open() {
            let _ = self.frame_tx.send(ControlFrame::unsubscribe(&self.symbol));
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("symbol", &self.symbol)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
