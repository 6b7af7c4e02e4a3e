//! Subscription Registry
//!
//! Tracks which callbacks are registered for which symbols and detects the
//! first/last transitions that drive upstream subscribe/unsubscribe control
//! frames.
//!
//! # Design
//!
//! The registry maps each symbol to an ordered list of callbacks. Adding the
//! first callback for a symbol means the gateway must be told to start
//! pushing quotes for it; removing the last means it must be told to stop.
//! Multiple callbacks may share a symbol, and one callback may be registered
//! (via separate calls) under several symbols.
//!
//! Dispatch snapshots the callback list before iterating, so fan-out never
//! holds the registry lock while user code runs and callbacks are free to
//! subscribe or unsubscribe reentrantly. Callbacks run synchronously, in
//! registration order, with per-callback panic isolation.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::streaming::{QuoteMessage, Symbol};

// =============================================================================
// Types
// =============================================================================

/// Callback invoked with each quote for a subscribed symbol.
pub type QuoteCallback = Arc<dyn Fn(&QuoteMessage) + Send + Sync>;

/// Handle identifying one registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Result of removing a callback from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The callback was removed and it was the last one for its symbol;
    /// the symbol entry is gone and the gateway should be told to stop.
    LastForSymbol,
    /// The callback was removed but other callbacks remain for the symbol.
    Remaining,
    /// No such callback was registered.
    NotFound,
}

/// Result of one fan-out cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Number of callbacks invoked.
    pub delivered: usize,
    /// Number of callbacks that panicked (isolated and logged).
    pub panicked: usize,
}

// =============================================================================
// Subscription Registry
// =============================================================================

/// Thread-safe symbol → callback registry.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use naps_quote_stream::{SubscriptionRegistry, Symbol};
///
/// let registry = SubscriptionRegistry::new();
/// let aapl = Symbol::new("AAPL").unwrap();
///
/// // First callback for a symbol needs an upstream subscribe.
/// let (first_id, first) = registry.add(aapl.clone(), Arc::new(|_quote| {}));
/// assert!(first);
///
/// // Second callback does not.
/// let (_second_id, first) = registry.add(aapl.clone(), Arc::new(|_quote| {}));
/// assert!(!first);
///
/// // Removing a non-last callback needs no upstream change.
/// use naps_quote_stream::domain::subscription::RemoveOutcome;
/// assert_eq!(registry.remove(&aapl, first_id), RemoveOutcome::Remaining);
/// ```
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: RwLock<HashMap<Symbol, Vec<(SubscriptionId, QuoteCallback)>>>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback under a symbol.
    ///
    /// Returns the callback's id and whether it is the first callback for
    /// that symbol (meaning an upstream subscribe frame is due).
    pub fn add(&self, symbol: Symbol, callback: QuoteCallback) -> (SubscriptionId, bool) {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = self.entries.write();
        let callbacks = entries.entry(symbol).or_default();
        let first = callbacks.is_empty();
        callbacks.push((id, callback));
        (id, first)
    }

    /// Remove a callback from a symbol.
    ///
    /// When the last callback for the symbol is removed, the symbol entry
    /// itself is dropped and [`RemoveOutcome::LastForSymbol`] is returned so
    /// the caller can send the upstream unsubscribe frame.
    pub fn remove(&self, symbol: &Symbol, id: SubscriptionId) -> RemoveOutcome {
        let mut entries = self.entries.write();
        let Some(callbacks) = entries.get_mut(symbol) else {
            return RemoveOutcome::NotFound;
        };
        let before = callbacks.len();
        callbacks.retain(|(entry_id, _)| *entry_id != id);
        if callbacks.len() == before {
            return RemoveOutcome::NotFound;
        }
        if callbacks.is_empty() {
            entries.remove(symbol);
            RemoveOutcome::LastForSymbol
        } else {
            RemoveOutcome::Remaining
        }
    }

    /// All symbols with at least one callback, sorted for deterministic
    /// replay on reconnect.
    #[must_use]
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.entries.read().keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Check whether a symbol has any callbacks.
    #[must_use]
    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.entries.read().contains_key(symbol)
    }

    /// Number of callbacks registered for a symbol.
    #[must_use]
    pub fn callback_count(&self, symbol: &Symbol) -> usize {
        self.entries
            .read()
            .get(symbol)
            .map_or(0, std::vec::Vec::len)
    }

    /// Number of subscribed symbols.
    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.entries.read().len()
    }

    /// Check whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Remove every subscription.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Deliver a quote to every callback registered for its symbol.
    ///
    /// Callbacks run synchronously in registration order. A panicking
    /// callback is logged and counted; its siblings (for this symbol and any
    /// other) still run. The callback list is snapshotted first, so dispatch
    /// never interleaves with a list being mutated.
    pub fn dispatch(&self, symbol: &Symbol, quote: &QuoteMessage) -> DispatchOutcome {
        let snapshot: Vec<QuoteCallback> = self
            .entries
            .read()
            .get(symbol)
            .map(|callbacks| callbacks.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();

        let mut outcome = DispatchOutcome::default();
        for callback in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(quote))).is_err() {
                outcome.panicked += 1;
                tracing::error!(symbol = %symbol, "quote callback panicked");
            }
            outcome.delivered += 1;
        }
        outcome
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.read();
        f.debug_struct("SubscriptionRegistry")
            .field("symbols", &entries.len())
            .field(
                "callbacks",
                &entries.values().map(std::vec::Vec::len).sum::<usize>(),
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

    fn symbol(raw: &str) -> Symbol {
        Symbol::new(raw).unwrap()
    }

    fn quote(raw_symbol: &str) -> QuoteMessage {
        QuoteMessage {
            symbol: raw_symbol.to_string(),
            price: None,
            change: None,
            volume: None,
            timestamp: None,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn first_callback_for_symbol_is_flagged() {
        let registry = SubscriptionRegistry::new();

        let (_, first) = registry.add(symbol("AAPL"), Arc::new(|_| {}));
        assert!(first);

        let (_, first) = registry.add(symbol("AAPL"), Arc::new(|_| {}));
        assert!(!first);

        let (_, first) = registry.add(symbol("MSFT"), Arc::new(|_| {}));
        assert!(first);
    }

    #[test]
    fn remove_last_callback_drops_symbol_entry() {
        let registry = SubscriptionRegistry::new();
        let aapl = symbol("AAPL");

        let (id_a, _) = registry.add(aapl.clone(), Arc::new(|_| {}));
        let (id_b, _) = registry.add(aapl.clone(), Arc::new(|_| {}));

        assert_eq!(registry.remove(&aapl, id_a), RemoveOutcome::Remaining);
        assert!(registry.contains(&aapl));

        assert_eq!(registry.remove(&aapl, id_b), RemoveOutcome::LastForSymbol);
        assert!(!registry.contains(&aapl));
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_unknown_id_is_not_found() {
        let registry = SubscriptionRegistry::new();
        let aapl = symbol("AAPL");

        assert_eq!(
            registry.remove(&aapl, SubscriptionId(42)),
            RemoveOutcome::NotFound
        );

        let (id, _) = registry.add(aapl.clone(), Arc::new(|_| {}));
        assert_eq!(registry.remove(&aapl, id), RemoveOutcome::LastForSymbol);
        assert_eq!(registry.remove(&aapl, id), RemoveOutcome::NotFound);
    }

    #[test]
    fn same_callback_under_multiple_symbols() {
        let registry = SubscriptionRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));

        let count_clone = Arc::clone(&count);
        let callback: QuoteCallback = Arc::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        registry.add(symbol("AAPL"), Arc::clone(&callback));
        registry.add(symbol("MSFT"), callback);

        registry.dispatch(&symbol("AAPL"), &quote("AAPL"));
        registry.dispatch(&symbol("MSFT"), &quote("MSFT"));

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dispatch_runs_in_registration_order() {
        let registry = SubscriptionRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            registry.add(
                symbol("AAPL"),
                Arc::new(move |_| {
                    order.lock().unwrap().push(tag);
                }),
            );
        }

        let outcome = registry.dispatch(&symbol("AAPL"), &quote("AAPL"));

        assert_eq!(outcome.delivered, 3);
        assert_eq!(outcome.panicked, 0);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn dispatch_to_unsubscribed_symbol_is_empty() {
        let registry = SubscriptionRegistry::new();
        registry.add(symbol("AAPL"), Arc::new(|_| {}));

        let outcome = registry.dispatch(&symbol("MSFT"), &quote("MSFT"));

        assert_eq!(outcome, DispatchOutcome::default());
    }

    #[test]
    fn panicking_callback_does_not_starve_siblings() {
        let registry = SubscriptionRegistry::new();
        let reached = Arc::new(AtomicUsize::new(0));

        registry.add(
            symbol("AAPL"),
            Arc::new(|_| {
                panic!("callback failure");
            }),
        );
        let reached_clone = Arc::clone(&reached);
        registry.add(
            symbol("AAPL"),
            Arc::new(move |_| {
                reached_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let outcome = registry.dispatch(&symbol("AAPL"), &quote("AAPL"));

        assert_eq!(outcome.delivered, 2);
        assert_eq!(outcome.panicked, 1);
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_may_unsubscribe_itself_during_dispatch() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let aapl = symbol("AAPL");

        let registry_clone = Arc::clone(&registry);
        let aapl_clone = aapl.clone();
        let id_cell = Arc::new(Mutex::new(None::<SubscriptionId>));
        let id_cell_clone = Arc::clone(&id_cell);

        let (id, _) = registry.add(
            aapl.clone(),
            Arc::new(move |_| {
                if let Some(id) = *id_cell_clone.lock().unwrap() {
                    registry_clone.remove(&aapl_clone, id);
                }
            }),
        );
        *id_cell.lock().unwrap() = Some(id);

        let outcome = registry.dispatch(&aapl, &quote("AAPL"));
        assert_eq!(outcome.delivered, 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn symbols_are_sorted() {
        let registry = SubscriptionRegistry::new();
        registry.add(symbol("MSFT"), Arc::new(|_| {}));
        registry.add(symbol("AAPL"), Arc::new(|_| {}));
        registry.add(symbol("GOOG"), Arc::new(|_| {}));

        assert_eq!(
            registry.symbols(),
            vec![symbol("AAPL"), symbol("GOOG"), symbol("MSFT")]
        );
    }

    #[test]
    fn clear_removes_all_entries() {
        let registry = SubscriptionRegistry::new();
        registry.add(symbol("AAPL"), Arc::new(|_| {}));
        registry.add(symbol("MSFT"), Arc::new(|_| {}));

        registry.clear();

        assert!(registry.is_empty());
        assert_eq!(registry.symbol_count(), 0);
    }

    #[test]
    fn thread_safety_concurrent_adds() {
        use std::thread;

        let registry = Arc::new(SubscriptionRegistry::new());
        let mut handles = vec![];

        for i in 0..10 {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                registry.add(symbol(&format!("SYM{i}")), Arc::new(|_| {}));
                registry.add(symbol("SHARED"), Arc::new(|_| {}));
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.symbol_count(), 11);
        assert_eq!(registry.callback_count(&symbol("SHARED")), 10);
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            /// The set of symbols with a non-empty callback list always
            /// equals the set the registry reports, for any interleaving of
            /// adds and removes.
            #[test]
            fn registry_tracks_nonempty_callback_sets(
                ops in proptest::collection::vec((0usize..4, any::<bool>()), 0..64)
            ) {
                let names = ["AAPL", "MSFT", "GOOG", "TSLA"];
                let registry = SubscriptionRegistry::new();
                let mut live: Vec<Vec<SubscriptionId>> = vec![vec![]; names.len()];

                for (index, add) in ops {
                    let sym = symbol(names[index]);
                    if add {
                        let (id, first) = registry.add(sym, Arc::new(|_| {}));
                        prop_assert_eq!(first, live[index].is_empty());
                        live[index].push(id);
                    } else if let Some(id) = live[index].pop() {
                        let outcome = registry.remove(&sym, id);
                        if live[index].is_empty() {
                            prop_assert_eq!(outcome, RemoveOutcome::LastForSymbol);
                        } else {
                            prop_assert_eq!(outcome, RemoveOutcome::Remaining);
                        }
                    } else {
                        prop_assert_eq!(
                            registry.remove(&sym, SubscriptionId(u64::MAX)),
                            RemoveOutcome::NotFound
                        );
                    }
                }

                let mut expected: Vec<Symbol> = names
                    .iter()
                    .zip(&live)
                    .filter(|(_, ids)| !ids.is_empty())
                    .map(|(name, _)| symbol(name))
                    .collect();
                expected.sort();
                prop_assert_eq!(registry.symbols(), expected);
            }
        }
    }
}
