use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use super::{NewPayment, Payment, PaymentStatus};
use crate::codes;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::order::Order;
use crate::store::{DocumentStore, DocumentsExt, Model};

/// Revenue figures derived from the current payment records.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSummary {
    /// Sum over `COMPLETED` payments.
    pub total: Decimal,
    pub completed_count: usize,
    /// Sum over `REFUNDED` payments.
    pub refunded_total: Decimal,
    /// Completed revenue per payment method.
    pub by_method: BTreeMap<String, Decimal>,
}

/// Owns payment documents and applies the payment status machine to them.
pub struct PaymentStore<S> {
    store: Arc<S>,
    reference_code_attempts: u32,
}

impl<S> Clone for PaymentStore<S> {
    fn clone(&self) -> Self {
        PaymentStore {
            store: Arc::clone(&self.store),
            reference_code_attempts: self.reference_code_attempts,
        }
    }
}

impl<S: DocumentStore> PaymentStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        PaymentStore {
            store,
            reference_code_attempts: LedgerConfig::default().reference_code_attempts,
        }
    }

    /// How many fresh reference codes to try before giving up on a collision.
    pub fn with_reference_code_attempts(mut self, attempts: u32) -> Self {
        self.reference_code_attempts = attempts.max(1);
        self
    }

    /// Validate and persist a new payment.
    ///
    /// The order must exist and must not be paid yet. A `settled` payment is
    /// stored as `COMPLETED`; the caller reconciles it.
    #[instrument(skip(self, input), fields(order_id = %input.order_id, amount = %input.amount))]
    pub async fn create(&self, input: NewPayment) -> LedgerResult<Payment> {
        input.validate()?;

        let order = self
            .store
            .documents::<Order>()
            .get(&input.order_id)
            .await?
            .ok_or_else(|| {
                LedgerError::validation(format!("order {} does not exist", input.order_id))
            })?;
        if order.is_paid {
            return Err(LedgerError::validation(format!(
                "order {} is already paid",
                order.id
            )));
        }

        let reference_code = self.unique_reference_code().await?;
        let now = Utc::now();
        let (status, completed_at) = if input.settled {
            (PaymentStatus::Completed, Some(now))
        } else {
            (PaymentStatus::Pending, None)
        };

        let payment = Payment {
            id: codes::generate_payment_id(),
            order_id: order.id,
            user_id: order.user_id,
            amount: input.amount,
            reference_code,
            payment_method: input.method,
            status,
            notes: input.notes,
            created_at: now,
            updated_at: now,
            completed_at,
        };
        self.save(&payment).await?;
        tracing::info!(
            payment_id = %payment.id,
            reference_code = %payment.reference_code,
            status = %payment.status,
            "payment created"
        );
        Ok(payment)
    }

    pub async fn get(&self, id: &str) -> LedgerResult<Option<Payment>> {
        Ok(self.store.documents::<Payment>().get(id).await?)
    }

    pub async fn require(&self, id: &str) -> LedgerResult<Payment> {
        self.get(id)
            .await?
            .ok_or_else(|| LedgerError::not_found(Payment::COLLECTION, id))
    }

    pub async fn list_by_order(&self, order_id: &str) -> LedgerResult<Vec<Payment>> {
        self.find(|p| p.order_id == order_id).await
    }

    pub async fn list_by_user(&self, user_id: &str) -> LedgerResult<Vec<Payment>> {
        self.find(|p| p.user_id == user_id).await
    }

    pub async fn list_all(&self) -> LedgerResult<Vec<Payment>> {
        self.find(|_| true).await
    }

    /// Apply a status change. Returns the updated payment and the status it left.
    ///
    /// Completing a payment fails with `Conflict` when another payment of the
    /// same order is already `COMPLETED`. Reconciliation is the caller's job.
    #[instrument(skip(self), fields(to = %status))]
    pub async fn set_status(
        &self,
        id: &str,
        status: PaymentStatus,
    ) -> LedgerResult<(Payment, PaymentStatus)> {
        let mut payment = self.require(id).await?;
        // Validate against a copy so a rejected change leaves nothing behind.
        let previous = payment.clone().transition_to(status)?;

        if status == PaymentStatus::Completed {
            let already = self
                .find(|p| p.order_id == payment.order_id && p.id != payment.id && p.is_completed())
                .await?;
            if let Some(other) = already.first() {
                return Err(LedgerError::Conflict(format!(
                    "order {} already has completed payment {}",
                    payment.order_id, other.id
                )));
            }
        }

        payment.transition_to(status)?;
        self.save(&payment).await?;
        tracing::info!(payment_id = %id, from = %previous, to = %status, "payment status changed");
        Ok((payment, previous))
    }

    /// Delete a payment whose money has not moved.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> LedgerResult<Payment> {
        let payment = self.require(id).await?;
        if payment.is_settled() {
            return Err(LedgerError::Conflict(format!(
                "payment {} is {} and cannot be deleted",
                id, payment.status
            )));
        }
        self.store.documents::<Payment>().delete(id).await?;
        tracing::info!(payment_id = %id, "payment deleted");
        Ok(payment)
    }

    /// Sum of `amount` over `COMPLETED` payments, read fresh on every call.
    pub async fn total_revenue(&self) -> LedgerResult<Decimal> {
        Ok(self
            .find(Payment::is_completed)
            .await?
            .iter()
            .map(|p| p.amount)
            .sum())
    }

    pub async fn revenue_summary(&self) -> LedgerResult<RevenueSummary> {
        let mut summary = RevenueSummary::default();
        for payment in self.list_all().await? {
            match payment.status {
                PaymentStatus::Completed => {
                    summary.total += payment.amount;
                    summary.completed_count += 1;
                    *summary
                        .by_method
                        .entry(payment.payment_method.clone())
                        .or_default() += payment.amount;
                }
                PaymentStatus::Refunded => summary.refunded_total += payment.amount,
                _ => {}
            }
        }
        Ok(summary)
    }

    async fn unique_reference_code(&self) -> LedgerResult<String> {
        for _ in 0..self.reference_code_attempts {
            let code = codes::generate_reference_code();
            let taken = self.find(|p| p.reference_code == code).await?;
            if taken.is_empty() {
                return Ok(code);
            }
            tracing::debug!(reference_code = %code, "reference code collision, retrying");
        }
        Err(LedgerError::Conflict(format!(
            "no unique reference code after {} attempts",
            self.reference_code_attempts
        )))
    }

    async fn find<F>(&self, predicate: F) -> LedgerResult<Vec<Payment>>
    where
        F: Fn(&Payment) -> bool,
    {
        let mut payments = self.store.documents::<Payment>().find(predicate).await?;
        payments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(payments)
    }

    async fn save(&self, payment: &Payment) -> LedgerResult<()> {
        Ok(self.store.documents::<Payment>().save(payment).await?)
    }
}
