//! Error types for ledger operations.

use std::fmt;

use thiserror::Error;

use crate::lock::LockError;
use crate::store::StoreError;

/// Which kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Order,
    Payment,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Order => write!(f, "order"),
            RecordKind::Payment => write!(f, "payment"),
        }
    }
}

/// Error type for every ledger operation.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed input. Raised before any write.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The requested status is not reachable in one step from the current one.
    #[error("invalid {record} transition for {id}: {from} -> {to}")]
    InvalidTransition {
        record: RecordKind,
        id: String,
        from: &'static str,
        to: &'static str,
    },

    /// An order status advance needs the order to be paid first.
    #[error("order {order_id} must be paid before moving to {requested}")]
    PaymentRequired {
        order_id: String,
        requested: &'static str,
    },

    /// Mutation or deletion of a record that no longer allows it.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Reconciliation could not find the payment's order. The payment write
    /// itself has already been committed.
    #[error("payment {payment_id} references missing order {order_id}")]
    DanglingReference { payment_id: String, order_id: String },

    #[error("{collection} record not found: {id}")]
    NotFound {
        collection: &'static str,
        id: String,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    pub(crate) fn not_found(collection: &'static str, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            collection,
            id: id.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation(message.into())
    }
}

pub type LedgerResult<T, E = LedgerError> = std::result::Result<T, E>;
