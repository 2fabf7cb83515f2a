use std::sync::Arc;

use poolpal_ledger::{LedgerError, NewPayment, OrderStatus, PaymentStatus};

use crate::support::{cue_and_chalk, dollars, ledger};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_completions_leave_one_completed() {
    let ledger = Arc::new(ledger());
    let order = ledger.create_order(cue_and_chalk("user-1")).await.unwrap();
    let mut payment_ids = Vec::new();
    for method in ["card", "cash"] {
        let payment = ledger
            .create_payment(NewPayment::new(&order.id, dollars(25), method))
            .await
            .unwrap();
        payment_ids.push(payment.id);
    }

    let handles: Vec<_> = payment_ids
        .iter()
        .cloned()
        .map(|id| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.set_payment_status(&id, PaymentStatus::Completed).await })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(LedgerError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(succeeded, 1);

    let completed = ledger
        .list_payments_by_order(&order.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|p| p.status == PaymentStatus::Completed)
        .count();
    assert_eq!(completed, 1);

    let order = ledger.get_order(&order.id).await.unwrap();
    assert!(order.is_paid);
    assert_eq!(ledger.total_revenue().await.unwrap(), dollars(25));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_order_transitions_apply_once() {
    let ledger = Arc::new(ledger());
    let order = ledger.create_order(cue_and_chalk("user-1")).await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            let id = order.id.clone();
            tokio::spawn(async move { ledger.set_order_status(&id, OrderStatus::Cancelled).await })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(LedgerError::InvalidTransition { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(succeeded, 1);
}
