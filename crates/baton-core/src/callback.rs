//! Orchestration events and the listener bus that delivers them.
//!
//! Listeners run synchronously in registration order. A listener that
//! panics is logged and skipped; it never breaks another listener or the
//! code that emitted the event.

use parking_lot::RwLock;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::warn;

use crate::response::TokenEvent;

/// Events emitted by the orchestration engine.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    TokensUsed(TokenEvent),
    ProviderSwitch {
        from: String,
        to: String,
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<String>,
    },
    CircuitOpen {
        provider: String,
    },
    CircuitClose {
        provider: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    TokensUsed,
    ProviderSwitch,
    CircuitOpen,
    CircuitClose,
}

impl OrchestratorEvent {
    fn kind(&self) -> EventKind {
        match self {
            Self::TokensUsed(_) => EventKind::TokensUsed,
            Self::ProviderSwitch { .. } => EventKind::ProviderSwitch,
            Self::CircuitOpen { .. } => EventKind::CircuitOpen,
            Self::CircuitClose { .. } => EventKind::CircuitClose,
        }
    }
}

type Listener = Arc<dyn Fn(&OrchestratorEvent) + Send + Sync>;

/// Registration-ordered listener bus for orchestration events.
#[derive(Clone, Default)]
pub struct CallbackBus {
    listeners: Arc<RwLock<Vec<(EventKind, Listener)>>>,
}

impl CallbackBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_tokens_used(&self, f: impl Fn(&TokenEvent) + Send + Sync + 'static) {
        self.push(
            EventKind::TokensUsed,
            Arc::new(move |event| {
                if let OrchestratorEvent::TokensUsed(tokens) = event {
                    f(tokens);
                }
            }),
        );
    }

    pub fn on_provider_switch(
        &self,
        f: impl Fn(&str, &str, &str, Option<&str>) + Send + Sync + 'static,
    ) {
        self.push(
            EventKind::ProviderSwitch,
            Arc::new(move |event| {
                if let OrchestratorEvent::ProviderSwitch {
                    from,
                    to,
                    reason,
                    context,
                } = event
                {
                    f(from, to, reason, context.as_deref());
                }
            }),
        );
    }

    pub fn on_circuit_open(&self, f: impl Fn(&str) + Send + Sync + 'static) {
        self.push(
            EventKind::CircuitOpen,
            Arc::new(move |event| {
                if let OrchestratorEvent::CircuitOpen { provider } = event {
                    f(provider);
                }
            }),
        );
    }

    pub fn on_circuit_close(&self, f: impl Fn(&str) + Send + Sync + 'static) {
        self.push(
            EventKind::CircuitClose,
            Arc::new(move |event| {
                if let OrchestratorEvent::CircuitClose { provider } = event {
                    f(provider);
                }
            }),
        );
    }

    fn push(&self, kind: EventKind, listener: Listener) {
        self.listeners.write().push((kind, listener));
    }

    /// Deliver an event to every matching listener, in registration order.
    /// A panicking listener is logged and skipped.
    pub fn emit(&self, event: &OrchestratorEvent) {
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .filter(|(kind, _)| *kind == event.kind())
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in listeners {
            if std::panic::catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!(?event, "event listener panicked, continuing");
            }
        }
    }
}
