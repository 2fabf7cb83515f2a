use std::sync::Arc;

use tracing::instrument;

use super::{NewOrder, Order, OrderFilter, OrderItem, OrderStatus};
use crate::error::{LedgerError, LedgerResult};
use crate::store::{DocumentStore, DocumentsExt, Model};

/// Owns order documents and applies the order status machine to them.
///
/// The store does no locking of its own; the ledger holds the record lock
/// around every read-modify-write.
pub struct OrderStore<S> {
    store: Arc<S>,
}

impl<S> Clone for OrderStore<S> {
    fn clone(&self) -> Self {
        OrderStore {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DocumentStore> OrderStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        OrderStore { store }
    }

    #[instrument(skip(self, input), fields(user_id = %input.user_id))]
    pub async fn create(&self, input: NewOrder) -> LedgerResult<Order> {
        let order = Order::create(input)?;
        self.save(&order).await?;
        tracing::info!(order_id = %order.id, total = %order.total, "order created");
        Ok(order)
    }

    pub async fn get(&self, id: &str) -> LedgerResult<Option<Order>> {
        Ok(self.store.documents::<Order>().get(id).await?)
    }

    /// Like [`OrderStore::get`], but a missing order is an error.
    pub async fn require(&self, id: &str) -> LedgerResult<Order> {
        self.get(id)
            .await?
            .ok_or_else(|| LedgerError::not_found(Order::COLLECTION, id))
    }

    /// Orders matching the filter, oldest first.
    pub async fn list(&self, filter: &OrderFilter) -> LedgerResult<Vec<Order>> {
        let mut orders = self
            .store
            .documents::<Order>()
            .find(|order| filter.matches(order))
            .await?;
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(orders)
    }

    /// Administrative status change. Returns the updated order and the
    /// status it left.
    #[instrument(skip(self), fields(to = %status))]
    pub async fn set_status(
        &self,
        id: &str,
        status: OrderStatus,
    ) -> LedgerResult<(Order, OrderStatus)> {
        let mut order = self.require(id).await?;
        let previous = order.transition_to(status)?;
        self.save(&order).await?;
        tracing::info!(order_id = %id, from = %previous, to = %status, "order status changed");
        Ok((order, previous))
    }

    /// Mark the order paid by `payment_id`. Only reconciliation calls this.
    ///
    /// Returns `None` when the order was already paid and nothing was written.
    #[instrument(skip(self))]
    pub async fn record_payment(
        &self,
        order_id: &str,
        payment_id: &str,
        reference_code: &str,
    ) -> LedgerResult<Option<Order>> {
        let mut order = self.require(order_id).await?;
        if !order.apply_payment(payment_id, reference_code) {
            tracing::debug!(order_id = %order_id, "order already paid, nothing to record");
            return Ok(None);
        }
        self.save(&order).await?;
        tracing::info!(order_id = %order_id, status = %order.status, "payment recorded on order");
        Ok(Some(order))
    }

    /// Mark the order unpaid. Only reconciliation calls this.
    ///
    /// Returns `None` when the order was not paid and nothing was written.
    #[instrument(skip(self))]
    pub async fn clear_payment(&self, order_id: &str) -> LedgerResult<Option<Order>> {
        let mut order = self.require(order_id).await?;
        if !order.revoke_payment() {
            return Ok(None);
        }
        self.save(&order).await?;
        tracing::info!(order_id = %order_id, status = %order.status, "payment cleared from order");
        Ok(Some(order))
    }

    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn update_items(&self, id: &str, items: Vec<OrderItem>) -> LedgerResult<Order> {
        let mut order = self.require(id).await?;
        order.replace_items(items)?;
        self.save(&order).await?;
        tracing::info!(order_id = %id, total = %order.total, "order items updated");
        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> LedgerResult<()> {
        if !self.store.documents::<Order>().delete(id).await? {
            return Err(LedgerError::not_found(Order::COLLECTION, id));
        }
        tracing::info!(order_id = %id, "order deleted");
        Ok(())
    }

    async fn save(&self, order: &Order) -> LedgerResult<()> {
        Ok(self.store.documents::<Order>().save(order).await?)
    }
}
