//! Ledger - the public entry point tying orders, payments, reconciliation,
//! record locks and observers together.
//!
//! Every mutating operation:
//! 1. takes the record locks it needs (payment lock before order lock)
//! 2. performs its writes, reconciliation included
//! 3. releases the locks
//! 4. publishes the events it queued along the way
//!
//! A rejected operation publishes nothing.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::instrument;

use crate::cache::{Cacheable, CachedStore};
use crate::codes;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::events::{LedgerEvent, LedgerEvents};
use crate::lock::{LockError, RecordGuard, RecordLocks};
use crate::order::{self, NewOrder, Order, OrderFilter, OrderItem, OrderStatus, OrderStore};
use crate::payment::{NewPayment, Payment, PaymentStatus, PaymentStore, RevenueSummary};
use crate::reconcile::{Reconciler, Reconciliation};
use crate::store::{DocumentStore, Model};

/// A payment whose order could not be brought in line with it.
#[derive(Clone, Debug, PartialEq)]
pub struct ReconciliationIssue {
    pub payment_id: String,
    pub order_id: String,
    pub payment_status: PaymentStatus,
    pub reason: String,
    pub detected_at: DateTime<Utc>,
}

pub struct Ledger<S> {
    store: Arc<S>,
    orders: OrderStore<S>,
    payments: PaymentStore<S>,
    reconciler: Reconciler<S>,
    locks: RecordLocks,
    events: LedgerEvents,
    issues: Mutex<Vec<ReconciliationIssue>>,
}

impl<S: DocumentStore> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, &LedgerConfig::default())
    }

    pub fn with_config(store: S, config: &LedgerConfig) -> Self {
        let store = Arc::new(store);
        let orders = OrderStore::new(Arc::clone(&store));
        let payments = PaymentStore::new(Arc::clone(&store))
            .with_reference_code_attempts(config.reference_code_attempts);
        Ledger {
            reconciler: Reconciler::new(orders.clone(), payments.clone()),
            store,
            orders,
            payments,
            locks: RecordLocks::new(),
            events: LedgerEvents::new(),
            issues: Mutex::new(Vec::new()),
        }
    }

    /// Wrap `store` in a read-through cache sized by the config.
    pub fn cached(store: S, config: &LedgerConfig) -> Ledger<CachedStore<S>> {
        Ledger::with_config(store.cached(config.effective_cache_ttl()), config)
    }

    /// The underlying document store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Register an observer for one event name. See [`LedgerEvent::NAMES`].
    pub fn on<F>(&self, event: &str, listener: F) -> LedgerResult<String>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.events.on(event, listener)
    }

    // ------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------

    pub async fn create_order(&self, input: NewOrder) -> LedgerResult<Order> {
        let order = self.orders.create(input).await?;
        self.events.publish(vec![LedgerEvent::OrderCreated {
            order_id: order.id.clone(),
            order_number: order.order_number.clone(),
            user_id: order.user_id.clone(),
            total: order.total,
        }]);
        Ok(order)
    }

    pub async fn get_order(&self, id: &str) -> LedgerResult<Order> {
        self.orders.require(id).await
    }

    pub async fn list_orders(&self, filter: &OrderFilter) -> LedgerResult<Vec<Order>> {
        self.orders.list(filter).await
    }

    #[instrument(skip(self), fields(to = %status))]
    pub async fn set_order_status(&self, id: &str, status: OrderStatus) -> LedgerResult<Order> {
        let guard = self.lock_order(id).await?;
        let (order, previous) = self.orders.set_status(id, status).await?;
        drop(guard);

        self.events.publish(vec![LedgerEvent::OrderStatusChanged {
            order_id: order.id.clone(),
            from: previous,
            to: order.status,
        }]);
        Ok(order)
    }

    pub async fn update_order_items(&self, id: &str, items: Vec<OrderItem>) -> LedgerResult<Order> {
        let guard = self.lock_order(id).await?;
        let order = self.orders.update_items(id, items).await?;
        drop(guard);

        self.events.publish(vec![LedgerEvent::OrderItemsUpdated {
            order_id: order.id.clone(),
            total: order.total,
        }]);
        Ok(order)
    }

    /// Administrative delete. Payments of the order are left in place.
    pub async fn delete_order(&self, id: &str) -> LedgerResult<()> {
        let guard = self.lock_order(id).await?;
        self.orders.delete(id).await?;
        drop(guard);

        self.events.publish(vec![LedgerEvent::OrderDeleted {
            order_id: id.to_string(),
        }]);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Payments
    // ------------------------------------------------------------------

    /// Record a payment against an unpaid order. A settled payment marks the
    /// order paid before this returns.
    #[instrument(skip(self, input), fields(order_id = %input.order_id))]
    pub async fn create_payment(&self, input: NewPayment) -> LedgerResult<Payment> {
        let guard = self.lock_order(&input.order_id).await?;
        let payment = self.payments.create(input).await?;

        let mut pending = vec![LedgerEvent::PaymentCreated {
            payment_id: payment.id.clone(),
            order_id: payment.order_id.clone(),
            amount: payment.amount,
            status: payment.status,
        }];
        let outcome = self.reconciler.reconcile(&payment).await;
        drop(guard);

        let result = self.settle_reconciliation(&payment, outcome, &mut pending);
        self.events.publish(pending);
        result.map(|_| payment)
    }

    pub async fn get_payment(&self, id: &str) -> LedgerResult<Payment> {
        self.payments.require(id).await
    }

    pub async fn list_payments_by_order(&self, order_id: &str) -> LedgerResult<Vec<Payment>> {
        self.payments.list_by_order(order_id).await
    }

    pub async fn list_payments_by_user(&self, user_id: &str) -> LedgerResult<Vec<Payment>> {
        self.payments.list_by_user(user_id).await
    }

    pub async fn list_all_payments(&self) -> LedgerResult<Vec<Payment>> {
        self.payments.list_all().await
    }

    /// Move a payment through its status machine and reconcile its order.
    ///
    /// When the order has disappeared, the payment change stays committed,
    /// an issue is recorded and `DanglingReference` is returned.
    #[instrument(skip(self), fields(to = %status))]
    pub async fn set_payment_status(&self, id: &str, status: PaymentStatus) -> LedgerResult<Payment> {
        let payment_guard = self.lock_payment(id).await?;
        let order_id = self.payments.require(id).await?.order_id;
        let order_guard = self.lock_order(&order_id).await?;

        let (payment, previous) = self.payments.set_status(id, status).await?;
        let mut pending = vec![LedgerEvent::PaymentStatusChanged {
            payment_id: payment.id.clone(),
            order_id: payment.order_id.clone(),
            from: previous,
            to: payment.status,
        }];
        let outcome = self.reconciler.reconcile(&payment).await;
        drop(order_guard);
        drop(payment_guard);

        let result = self.settle_reconciliation(&payment, outcome, &mut pending);
        // The payment write is committed either way, so observers hear about it.
        self.events.publish(pending);
        result.map(|_| payment)
    }

    /// Delete a payment that never moved money.
    #[instrument(skip(self))]
    pub async fn delete_payment(&self, id: &str) -> LedgerResult<()> {
        let payment_guard = self.lock_payment(id).await?;
        let order_id = self.payments.require(id).await?.order_id;
        let order_guard = self.lock_order(&order_id).await?;

        let payment = self.payments.delete(id).await?;
        drop(order_guard);
        drop(payment_guard);

        self.events.publish(vec![LedgerEvent::PaymentDeleted {
            payment_id: payment.id,
            order_id: payment.order_id,
        }]);
        Ok(())
    }

    pub async fn total_revenue(&self) -> LedgerResult<Decimal> {
        self.payments.total_revenue().await
    }

    pub async fn revenue_summary(&self) -> LedgerResult<RevenueSummary> {
        self.payments.revenue_summary().await
    }

    /// Reconciliation failures recorded so far, oldest first.
    pub fn reconciliation_issues(&self) -> LedgerResult<Vec<ReconciliationIssue>> {
        let issues = self
            .issues
            .lock()
            .map_err(|_| LockError::Poisoned("reconciliation issues poisoned".into()))?;
        Ok(issues.clone())
    }

    // ------------------------------------------------------------------
    // Pure helpers
    // ------------------------------------------------------------------

    pub fn calculate_order_total(&self, items: &[OrderItem]) -> Decimal {
        order::calculate_order_total(items)
    }

    pub fn generate_order_number(&self) -> String {
        codes::generate_order_number()
    }

    pub fn generate_reference_code(&self) -> String {
        codes::generate_reference_code()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn lock_order(&self, id: &str) -> LedgerResult<RecordGuard> {
        Ok(self.locks.acquire(Order::COLLECTION, id).await?)
    }

    async fn lock_payment(&self, id: &str) -> LedgerResult<RecordGuard> {
        Ok(self.locks.acquire(Payment::COLLECTION, id).await?)
    }

    /// Turn a reconciliation outcome into queued events, recording an issue
    /// when the order side could not be updated.
    fn settle_reconciliation(
        &self,
        payment: &Payment,
        outcome: LedgerResult<Reconciliation>,
        pending: &mut Vec<LedgerEvent>,
    ) -> LedgerResult<()> {
        match outcome {
            Ok(Reconciliation::MarkedPaid(order)) => {
                pending.push(LedgerEvent::OrderPaid {
                    payment_id: payment.id.clone(),
                    order_id: order.id,
                    status: order.status,
                });
                Ok(())
            }
            Ok(Reconciliation::MarkedUnpaid(order)) => {
                pending.push(LedgerEvent::OrderUnpaid {
                    order_id: order.id,
                    status: order.status,
                });
                Ok(())
            }
            Ok(Reconciliation::Unchanged) => Ok(()),
            Err(err) => {
                tracing::error!(
                    payment_id = %payment.id,
                    order_id = %payment.order_id,
                    status = %payment.status,
                    error = %err,
                    "reconciliation failed, payment write kept"
                );
                pending.push(LedgerEvent::ReconciliationFailed {
                    payment_id: payment.id.clone(),
                    order_id: payment.order_id.clone(),
                    reason: err.to_string(),
                });
                self.record_issue(payment, &err);
                Err(err)
            }
        }
    }

    fn record_issue(&self, payment: &Payment, err: &LedgerError) {
        let issue = ReconciliationIssue {
            payment_id: payment.id.clone(),
            order_id: payment.order_id.clone(),
            payment_status: payment.status,
            reason: err.to_string(),
            detected_at: Utc::now(),
        };
        match self.issues.lock() {
            Ok(mut issues) => issues.push(issue),
            Err(_) => tracing::error!(
                payment_id = %issue.payment_id,
                order_id = %issue.order_id,
                "reconciliation issue list poisoned, issue not recorded"
            ),
        }
    }
}
