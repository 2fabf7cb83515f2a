//! Reconciliation - keeps an order's paid flag in step with its payments.
//!
//! Runs after a payment status change has been committed. The payment record
//! is the source of truth: when the order side cannot be brought in line,
//! the payment write stays and the failure is reported.

use tracing::instrument;

use crate::error::{LedgerError, LedgerResult};
use crate::order::{Order, OrderStore};
use crate::payment::{Payment, PaymentStatus, PaymentStore};
use crate::store::DocumentStore;

/// What reconciliation did to the parent order.
#[derive(Clone, Debug, PartialEq)]
pub enum Reconciliation {
    /// The order was marked paid by this payment.
    MarkedPaid(Order),
    /// No completed payment remains; the order was marked unpaid.
    MarkedUnpaid(Order),
    /// The order already matched its payments.
    Unchanged,
}

pub struct Reconciler<S> {
    orders: OrderStore<S>,
    payments: PaymentStore<S>,
}

impl<S> Clone for Reconciler<S> {
    fn clone(&self) -> Self {
        Reconciler {
            orders: self.orders.clone(),
            payments: self.payments.clone(),
        }
    }
}

impl<S: DocumentStore> Reconciler<S> {
    pub fn new(orders: OrderStore<S>, payments: PaymentStore<S>) -> Self {
        Reconciler { orders, payments }
    }

    /// Bring the payment's order in line with the payment's current status.
    ///
    /// Safe to call repeatedly for the same payment: every step reads the
    /// order's current `is_paid` before writing.
    #[instrument(skip(self, payment), fields(payment_id = %payment.id, order_id = %payment.order_id, status = %payment.status))]
    pub async fn reconcile(&self, payment: &Payment) -> LedgerResult<Reconciliation> {
        match payment.status {
            PaymentStatus::Completed => self.settle(payment).await,
            status if status.voids_settlement() => self.unsettle(payment).await,
            _ => Ok(Reconciliation::Unchanged),
        }
    }

    async fn settle(&self, payment: &Payment) -> LedgerResult<Reconciliation> {
        let order = self.parent_order(payment).await?;
        if order.is_paid {
            return Ok(Reconciliation::Unchanged);
        }

        match self
            .orders
            .record_payment(&order.id, &payment.id, &payment.reference_code)
            .await
        {
            Ok(Some(order)) => Ok(Reconciliation::MarkedPaid(order)),
            Ok(None) => Ok(Reconciliation::Unchanged),
            Err(LedgerError::NotFound { .. }) => Err(dangling(payment)),
            Err(err) => Err(err),
        }
    }

    async fn unsettle(&self, payment: &Payment) -> LedgerResult<Reconciliation> {
        let order = self.parent_order(payment).await?;
        if !order.is_paid {
            return Ok(Reconciliation::Unchanged);
        }

        let still_covered = self
            .payments
            .list_by_order(&order.id)
            .await?
            .iter()
            .any(Payment::is_completed);
        if still_covered {
            tracing::debug!(order_id = %order.id, "another completed payment still covers the order");
            return Ok(Reconciliation::Unchanged);
        }

        match self.orders.clear_payment(&order.id).await {
            Ok(Some(order)) => Ok(Reconciliation::MarkedUnpaid(order)),
            Ok(None) => Ok(Reconciliation::Unchanged),
            Err(LedgerError::NotFound { .. }) => Err(dangling(payment)),
            Err(err) => Err(err),
        }
    }

    async fn parent_order(&self, payment: &Payment) -> LedgerResult<Order> {
        self.orders
            .get(&payment.order_id)
            .await?
            .ok_or_else(|| dangling(payment))
    }
}

fn dangling(payment: &Payment) -> LedgerError {
    LedgerError::DanglingReference {
        payment_id: payment.id.clone(),
        order_id: payment.order_id.clone(),
    }
}
