//! Passive token-usage collector. Attaches to the callback bus and
//! tallies every token event the adapters emit.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

use baton_core::{CallbackBus, TokenEvent, TokenUsage};

#[derive(Debug, Default)]
struct Inner {
    events: Vec<TokenEvent>,
    totals: TokenUsage,
    per_provider: BTreeMap<String, TokenUsage>,
}

#[derive(Clone, Debug, Default)]
pub struct TokenLedger {
    inner: Arc<Mutex<Inner>>,
}

impl TokenLedger {
    /// Create a ledger subscribed to `bus`.
    pub fn attach(bus: &CallbackBus) -> Self {
        let ledger = Self::default();
        let sink = ledger.clone();
        bus.on_tokens_used(move |event| sink.record(event));
        ledger
    }

    pub fn record(&self, event: &TokenEvent) {
        let mut inner = self.inner.lock();
        inner.totals.add(&event.usage);
        inner
            .per_provider
            .entry(event.provider.clone())
            .or_default()
            .add(&event.usage);
        inner.events.push(event.clone());
    }

    pub fn totals(&self) -> TokenUsage {
        self.inner.lock().totals
    }

    pub fn per_provider(&self) -> BTreeMap<String, TokenUsage> {
        self.inner.lock().per_provider.clone()
    }

    pub fn events(&self) -> Vec<TokenEvent> {
        self.inner.lock().events.clone()
    }

    pub fn event_count(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn reset(&self) {
        *self.inner.lock() = Inner::default();
    }
}
