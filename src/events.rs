//! Ledger events for external observers (dashboards, audit feeds).
//!
//! Every ledger operation collects its events while it runs and publishes
//! them only once all of its writes, reconciliation included, have settled.
//! Listeners receive the event as a JSON string.

use std::sync::Mutex;

use event_emitter_rs::EventEmitter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LedgerResult;
use crate::lock::LockError;
use crate::order::OrderStatus;
use crate::payment::PaymentStatus;

/// Something observable that happened in the ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum LedgerEvent {
    OrderCreated {
        order_id: String,
        order_number: String,
        user_id: String,
        total: Decimal,
    },
    OrderStatusChanged {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },
    OrderItemsUpdated {
        order_id: String,
        total: Decimal,
    },
    OrderDeleted {
        order_id: String,
    },
    PaymentCreated {
        payment_id: String,
        order_id: String,
        amount: Decimal,
        status: PaymentStatus,
    },
    PaymentStatusChanged {
        payment_id: String,
        order_id: String,
        from: PaymentStatus,
        to: PaymentStatus,
    },
    PaymentDeleted {
        payment_id: String,
        order_id: String,
    },
    OrderPaid {
        order_id: String,
        payment_id: String,
        status: OrderStatus,
    },
    OrderUnpaid {
        order_id: String,
        status: OrderStatus,
    },
    ReconciliationFailed {
        payment_id: String,
        order_id: String,
        reason: String,
    },
}

impl LedgerEvent {
    pub const NAMES: [&'static str; 10] = [
        "OrderCreated",
        "OrderStatusChanged",
        "OrderItemsUpdated",
        "OrderDeleted",
        "PaymentCreated",
        "PaymentStatusChanged",
        "PaymentDeleted",
        "OrderPaid",
        "OrderUnpaid",
        "ReconciliationFailed",
    ];

    /// The name listeners subscribe to.
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::OrderCreated { .. } => "OrderCreated",
            LedgerEvent::OrderStatusChanged { .. } => "OrderStatusChanged",
            LedgerEvent::OrderItemsUpdated { .. } => "OrderItemsUpdated",
            LedgerEvent::OrderDeleted { .. } => "OrderDeleted",
            LedgerEvent::PaymentCreated { .. } => "PaymentCreated",
            LedgerEvent::PaymentStatusChanged { .. } => "PaymentStatusChanged",
            LedgerEvent::PaymentDeleted { .. } => "PaymentDeleted",
            LedgerEvent::OrderPaid { .. } => "OrderPaid",
            LedgerEvent::OrderUnpaid { .. } => "OrderUnpaid",
            LedgerEvent::ReconciliationFailed { .. } => "ReconciliationFailed",
        }
    }

    /// Parse a payload received by a listener.
    pub fn from_payload(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

/// Listener registry backed by the `event_emitter_rs` emitter.
///
/// Listeners run on the emitter's own threads, so they must not assume they
/// are called before the publishing operation returns.
pub struct LedgerEvents {
    emitter: Mutex<EventEmitter>,
}

impl Default for LedgerEvents {
    fn default() -> Self {
        LedgerEvents {
            emitter: Mutex::new(EventEmitter::new()),
        }
    }
}

impl LedgerEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one event name. Returns the listener id.
    pub fn on<F>(&self, event: &str, listener: F) -> LedgerResult<String>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        let mut emitter = self
            .emitter
            .lock()
            .map_err(|_| LockError::Poisoned("event emitter poisoned".into()))?;
        Ok(emitter.on(event, listener))
    }

    /// Publish a batch of events.
    pub(crate) fn publish(&self, events: Vec<LedgerEvent>) {
        if events.is_empty() {
            return;
        }
        let mut emitter = match self.emitter.lock() {
            Ok(emitter) => emitter,
            Err(_) => {
                tracing::warn!(dropped = events.len(), "event emitter poisoned, dropping events");
                return;
            }
        };
        for event in events {
            match serde_json::to_string(&event) {
                Ok(payload) => {
                    tracing::trace!(event = event.name(), "publishing ledger event");
                    emitter.emit(event.name(), payload);
                }
                Err(err) => {
                    tracing::warn!(event = event.name(), error = %err, "could not encode ledger event");
                }
            }
        }
    }
}
