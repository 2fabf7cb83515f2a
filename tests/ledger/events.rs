use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use poolpal_ledger::{LedgerEvent, NewPayment, OrderStatus, PaymentStatus};

use crate::support::{cue_and_chalk, drain, ledger, listen, order_with_payment};

#[tokio::test]
async fn completion_publishes_status_change_and_order_paid() {
    let ledger = ledger();
    let (order, payment) = order_with_payment(&ledger).await;
    let rx = listen(&ledger, &["PaymentStatusChanged", "OrderPaid"]);

    ledger
        .set_payment_status(&payment.id, PaymentStatus::Completed)
        .await
        .unwrap();

    let events = drain(&rx);
    assert_eq!(events.len(), 2, "got {events:?}");
    assert!(events.contains(&LedgerEvent::PaymentStatusChanged {
        payment_id: payment.id.clone(),
        order_id: order.id.clone(),
        from: PaymentStatus::Pending,
        to: PaymentStatus::Completed,
    }));
    assert!(events.contains(&LedgerEvent::OrderPaid {
        order_id: order.id.clone(),
        payment_id: payment.id.clone(),
        status: OrderStatus::Processing,
    }));
}

#[tokio::test]
async fn observers_see_settled_state() {
    let ledger = ledger();
    let (order, payment) = order_with_payment(&ledger).await;

    let (tx, rx) = mpsc::channel();
    ledger
        .on("PaymentStatusChanged", move |payload: String| {
            let _ = tx.send(payload);
        })
        .unwrap();

    ledger
        .set_payment_status(&payment.id, PaymentStatus::Completed)
        .await
        .unwrap();

    rx.recv_timeout(Duration::from_secs(1))
        .expect("PaymentStatusChanged never arrived");
    // Reconciliation finished before the event went out.
    assert!(ledger.get_order(&order.id).await.unwrap().is_paid);
}

#[tokio::test]
async fn rejected_operations_publish_nothing() {
    let ledger = ledger();
    let (order, payment) = order_with_payment(&ledger).await;
    let rx = listen(&ledger, &LedgerEvent::NAMES);

    assert!(ledger
        .set_payment_status(&payment.id, PaymentStatus::Refunded)
        .await
        .is_err());
    assert!(ledger
        .set_order_status(&order.id, OrderStatus::Processing)
        .await
        .is_err());
    assert!(ledger
        .create_payment(NewPayment::new(&order.id, rust_decimal::Decimal::ZERO, "card"))
        .await
        .is_err());

    assert!(drain(&rx).is_empty());
}

#[tokio::test]
async fn dangling_reference_publishes_failure() {
    let ledger = ledger();
    let (order, payment) = order_with_payment(&ledger).await;
    ledger.delete_order(&order.id).await.unwrap();
    let rx = listen(&ledger, &["PaymentStatusChanged", "ReconciliationFailed", "OrderPaid"]);

    assert!(ledger
        .set_payment_status(&payment.id, PaymentStatus::Completed)
        .await
        .is_err());

    let events = drain(&rx);
    assert_eq!(events.len(), 2, "got {events:?}");
    assert!(events
        .iter()
        .any(|e| matches!(e, LedgerEvent::ReconciliationFailed { payment_id, .. } if *payment_id == payment.id)));
    assert!(events.iter().all(|e| e.name() != "OrderPaid"));
}

#[tokio::test]
async fn order_lifecycle_events() {
    let ledger = ledger();
    let seen = Arc::new(Mutex::new(Vec::new()));
    for name in ["OrderCreated", "OrderItemsUpdated", "OrderDeleted"] {
        let seen = Arc::clone(&seen);
        ledger
            .on(name, move |payload: String| {
                seen.lock().unwrap().push(LedgerEvent::from_payload(&payload).unwrap());
            })
            .unwrap();
    }

    let order = ledger.create_order(cue_and_chalk("user-1")).await.unwrap();
    ledger
        .update_order_items(&order.id, order.items.clone())
        .await
        .unwrap();
    ledger.delete_order(&order.id).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    let seen = seen.lock().unwrap();
    let mut names: Vec<_> = seen.iter().map(LedgerEvent::name).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["OrderCreated", "OrderDeleted", "OrderItemsUpdated"]);
}
