use poolpal_ledger::{LedgerError, NewPayment, OrderStatus, PaymentStatus};

use crate::support::{cue_and_chalk, dollars, ledger, order_with_payment};

#[tokio::test]
async fn failed_second_payment_keeps_order_paid() {
    let ledger = ledger();
    let order = ledger.create_order(cue_and_chalk("user-1")).await.unwrap();
    let p1 = ledger
        .create_payment(NewPayment::new(&order.id, dollars(25), "card"))
        .await
        .unwrap();
    let p2 = ledger
        .create_payment(NewPayment::new(&order.id, dollars(25), "cash"))
        .await
        .unwrap();

    ledger
        .set_payment_status(&p1.id, PaymentStatus::Completed)
        .await
        .unwrap();
    ledger
        .set_payment_status(&p2.id, PaymentStatus::Failed)
        .await
        .unwrap();

    let order = ledger.get_order(&order.id).await.unwrap();
    assert!(order.is_paid);
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(order.payment_id.as_deref(), Some(p1.id.as_str()));
}

#[tokio::test]
async fn refund_marks_order_unpaid_and_reverts_payment_driven_status() {
    let ledger = ledger();
    let (order, payment) = order_with_payment(&ledger).await;
    ledger
        .set_payment_status(&payment.id, PaymentStatus::Completed)
        .await
        .unwrap();
    ledger
        .set_payment_status(&payment.id, PaymentStatus::Refunded)
        .await
        .unwrap();

    let order = ledger.get_order(&order.id).await.unwrap();
    assert!(!order.is_paid);
    assert!(order.payment_id.is_none());
    assert!(order.payment_reference_code.is_none());
    assert_eq!(order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn refund_after_shipping_keeps_order_status() {
    let ledger = ledger();
    let (order, payment) = order_with_payment(&ledger).await;
    ledger
        .set_payment_status(&payment.id, PaymentStatus::Completed)
        .await
        .unwrap();
    ledger
        .set_order_status(&order.id, OrderStatus::Shipped)
        .await
        .unwrap();
    ledger
        .set_payment_status(&payment.id, PaymentStatus::Refunded)
        .await
        .unwrap();

    let order = ledger.get_order(&order.id).await.unwrap();
    assert!(!order.is_paid);
    assert_eq!(order.status, OrderStatus::Shipped);
}

#[tokio::test]
async fn paid_flag_tracks_completed_payments() {
    let ledger = ledger();
    let order = ledger.create_order(cue_and_chalk("user-1")).await.unwrap();
    let p1 = ledger
        .create_payment(NewPayment::new(&order.id, dollars(25), "card"))
        .await
        .unwrap();
    let p2 = ledger
        .create_payment(NewPayment::new(&order.id, dollars(25), "cash"))
        .await
        .unwrap();

    let steps = [
        (&p1.id, PaymentStatus::Processing),
        (&p2.id, PaymentStatus::Cancelled),
        (&p1.id, PaymentStatus::Completed),
        (&p2.id, PaymentStatus::Pending),
        (&p2.id, PaymentStatus::Failed),
        (&p1.id, PaymentStatus::Refunded),
        (&p2.id, PaymentStatus::Pending),
        (&p2.id, PaymentStatus::Completed),
    ];
    for (id, status) in steps {
        ledger.set_payment_status(id, status).await.unwrap();

        let payments = ledger.list_payments_by_order(&order.id).await.unwrap();
        let covered = payments.iter().any(|p| p.status == PaymentStatus::Completed);
        let order = ledger.get_order(&order.id).await.unwrap();
        assert_eq!(order.is_paid, covered, "after {id} -> {status}");
    }
}

#[tokio::test]
async fn second_completion_for_same_order_conflicts() {
    let ledger = ledger();
    let order = ledger.create_order(cue_and_chalk("user-1")).await.unwrap();
    let p1 = ledger
        .create_payment(NewPayment::new(&order.id, dollars(25), "card"))
        .await
        .unwrap();
    let p2 = ledger
        .create_payment(NewPayment::new(&order.id, dollars(25), "cash"))
        .await
        .unwrap();
    ledger
        .set_payment_status(&p1.id, PaymentStatus::Completed)
        .await
        .unwrap();

    let err = ledger
        .set_payment_status(&p2.id, PaymentStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Conflict(_)));
    assert_eq!(ledger.total_revenue().await.unwrap(), dollars(25));
}

#[tokio::test]
async fn completing_payment_of_deleted_order_is_dangling() {
    let ledger = ledger();
    let (order, payment) = order_with_payment(&ledger).await;
    ledger.delete_order(&order.id).await.unwrap();

    let err = ledger
        .set_payment_status(&payment.id, PaymentStatus::Completed)
        .await
        .unwrap_err();
    match err {
        LedgerError::DanglingReference { payment_id, order_id } => {
            assert_eq!(payment_id, payment.id);
            assert_eq!(order_id, order.id);
        }
        other => panic!("expected DanglingReference, got {other:?}"),
    }

    // The payment write is not rolled back.
    let stored = ledger.get_payment(&payment.id).await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Completed);
    assert!(stored.completed_at.is_some());

    let issues = ledger.reconciliation_issues().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].order_id, order.id);
    assert!(issues[0].reason.contains(&payment.id));
}

#[tokio::test]
async fn pending_payment_changes_do_not_touch_order() {
    let ledger = ledger();
    let (order, payment) = order_with_payment(&ledger).await;
    ledger
        .set_payment_status(&payment.id, PaymentStatus::Processing)
        .await
        .unwrap();
    ledger
        .set_payment_status(&payment.id, PaymentStatus::Failed)
        .await
        .unwrap();

    assert_eq!(ledger.get_order(&order.id).await.unwrap(), order);
    assert!(ledger.reconciliation_issues().unwrap().is_empty());
}
