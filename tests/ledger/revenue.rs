use poolpal_ledger::{NewPayment, PaymentStatus};

use crate::support::{cue_and_chalk, dollars, ledger};

#[tokio::test]
async fn total_revenue_follows_completed_payments() {
    let ledger = ledger();
    let mut payments = Vec::new();
    for (amount, method) in [(25, "card"), (40, "cash"), (15, "card")] {
        let order = ledger.create_order(cue_and_chalk("user-1")).await.unwrap();
        let payment = ledger
            .create_payment(NewPayment::new(&order.id, dollars(amount), method))
            .await
            .unwrap();
        payments.push(payment);
    }
    assert_eq!(ledger.total_revenue().await.unwrap(), dollars(0));

    for payment in &payments {
        ledger
            .set_payment_status(&payment.id, PaymentStatus::Completed)
            .await
            .unwrap();
    }
    assert_eq!(ledger.total_revenue().await.unwrap(), dollars(80));

    ledger
        .set_payment_status(&payments[1].id, PaymentStatus::Refunded)
        .await
        .unwrap();
    assert_eq!(ledger.total_revenue().await.unwrap(), dollars(40));
}

#[tokio::test]
async fn revenue_summary_splits_by_method_and_refunds() {
    let ledger = ledger();
    let mut refund_me = None;
    for (amount, method) in [(25, "card"), (40, "cash"), (15, "card")] {
        let order = ledger.create_order(cue_and_chalk("user-1")).await.unwrap();
        let payment = ledger
            .create_payment(NewPayment::new(&order.id, dollars(amount), method).settled())
            .await
            .unwrap();
        if method == "cash" {
            refund_me = Some(payment.id);
        }
    }
    let order = ledger.create_order(cue_and_chalk("user-2")).await.unwrap();
    ledger
        .create_payment(NewPayment::new(&order.id, dollars(99), "card"))
        .await
        .unwrap();

    ledger
        .set_payment_status(&refund_me.unwrap(), PaymentStatus::Refunded)
        .await
        .unwrap();

    let summary = ledger.revenue_summary().await.unwrap();
    assert_eq!(summary.total, dollars(40));
    assert_eq!(summary.completed_count, 2);
    assert_eq!(summary.refunded_total, dollars(40));
    assert_eq!(summary.by_method.get("card"), Some(&dollars(40)));
    assert!(summary.by_method.get("cash").is_none());
    assert_eq!(summary.total, ledger.total_revenue().await.unwrap());
}
