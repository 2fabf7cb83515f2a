//! Payments - the payment status machine, reference codes, and the payment store.

mod store;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult, RecordKind};
use crate::store::Model;

pub use store::{PaymentStore, RevenueSummary};

/// Payment status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 6] = [
        PaymentStatus::Pending,
        PaymentStatus::Processing,
        PaymentStatus::Completed,
        PaymentStatus::Failed,
        PaymentStatus::Cancelled,
        PaymentStatus::Refunded,
    ];

    /// Statuses reachable in one step. `Failed -> Processing` is deliberately
    /// absent; a failed payment is retried through `Pending`.
    pub fn allowed_transitions(self) -> &'static [PaymentStatus] {
        use PaymentStatus::*;
        match self {
            Pending => &[Processing, Completed, Failed, Cancelled],
            Processing => &[Completed, Failed],
            Completed => &[Refunded],
            Failed => &[Pending, Cancelled],
            Cancelled => &[Pending],
            Refunded => &[],
        }
    }

    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Statuses after which the parent order's paid flag must be re-checked.
    pub fn voids_settlement(self) -> bool {
        matches!(
            self,
            PaymentStatus::Failed | PaymentStatus::Cancelled | PaymentStatus::Refunded
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Cancelled => "CANCELLED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for [`PaymentStore::create`].
#[derive(Clone, Debug)]
pub struct NewPayment {
    pub order_id: String,
    pub amount: Decimal,
    pub method: String,
    pub notes: Option<String>,
    /// Record an already-settled payment: starts as `COMPLETED`.
    pub settled: bool,
}

impl NewPayment {
    pub fn new(order_id: impl Into<String>, amount: Decimal, method: impl Into<String>) -> Self {
        NewPayment {
            order_id: order_id.into(),
            amount,
            method: method.into(),
            notes: None,
            settled: false,
        }
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn settled(mut self) -> Self {
        self.settled = true;
        self
    }

    pub(crate) fn validate(&self) -> LedgerResult<()> {
        if self.amount <= Decimal::ZERO {
            return Err(LedgerError::validation("payment amount must be positive"));
        }
        if self.method.trim().is_empty() {
            return Err(LedgerError::validation("payment method is required"));
        }
        if self.order_id.trim().is_empty() {
            return Err(LedgerError::validation("payment must reference an order"));
        }
        Ok(())
    }
}

/// A payment recorded against one order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    pub amount: Decimal,
    pub reference_code: String,
    pub payment_method: String,
    pub status: PaymentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Model for Payment {
    const COLLECTION: &'static str = "payments";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Payment {
    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }

    /// Completed or refunded: money has moved and the record is kept.
    pub fn is_settled(&self) -> bool {
        self.completed_at.is_some()
            || matches!(self.status, PaymentStatus::Completed | PaymentStatus::Refunded)
    }

    /// Check and apply a status change. Returns the previous status.
    ///
    /// `completed_at` is stamped the first time the payment completes and
    /// never rewritten.
    pub fn transition_to(&mut self, next: PaymentStatus) -> LedgerResult<PaymentStatus> {
        if !self.status.can_transition_to(next) {
            return Err(LedgerError::InvalidTransition {
                record: RecordKind::Payment,
                id: self.id.clone(),
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }

        let previous = self.status;
        let now = Utc::now();
        self.status = next;
        self.updated_at = now;
        if next == PaymentStatus::Completed && self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
        Ok(previous)
    }
}
