//! End-to-end scenario: a monthly recurring invoice is generated on its
//! schedule, the template's next date advances leap-safely, and a full
//! payment settles the overdue original.

mod common;

use common::{date, money, TestContext};
use practice_service::models::{Frequency, InvoiceStatus};
use practice_service::repository::InvoiceStore;

#[tokio::test]
async fn monthly_recurring_invoice_full_cycle() {
    let ctx = TestContext::new(date(2026, 1, 1)).await;
    let client = ctx.add_client("Acme Traders").await;

    // 10 000 INR, Net 30, generating on the due date of the first cycle.
    let original = ctx
        .create_recurring_invoice(
            &client,
            "INV-1001",
            "10000",
            date(2026, 1, 31),
            Frequency::Monthly,
            date(2026, 1, 31),
        )
        .await;
    assert_eq!(original.total_amount, money("10000.00"));

    // Daily sweeps before the generation date do nothing.
    for day in 2..=30 {
        ctx.clock.set_date(date(2026, 1, day));
        let summary = ctx
            .scheduler
            .generate_recurring_invoices()
            .await
            .expect("sweep");
        assert_eq!(summary.dispatched, 0);
    }

    // On 2026-01-31 the successor is generated.
    ctx.clock.set_date(date(2026, 1, 31));
    let summary = ctx
        .scheduler
        .generate_recurring_invoices()
        .await
        .expect("sweep");
    assert_eq!(summary.dispatched, 1);

    let successor = ctx
        .store
        .invoices
        .find_successor(original.invoice_id, date(2026, 1, 31))
        .await
        .expect("store read")
        .expect("successor exists");
    assert_eq!(successor.invoice_date, date(2026, 1, 31));
    assert_eq!(successor.due_date, date(2026, 3, 2));
    assert_eq!(successor.total_amount, money("10000.00"));
    assert_eq!(successor.status, InvoiceStatus::Unpaid.as_str());

    // Month-end advance clamps to the last day of February.
    let template = ctx.reload_invoice(&original).await;
    assert_eq!(template.next_generation_date, Some(date(2026, 2, 28)));

    // A week later the original is overdue.
    ctx.clock.set_date(date(2026, 2, 7));
    let refreshed = ctx
        .ledger
        .refresh_status(original.invoice_id)
        .await
        .expect("refresh");
    assert_eq!(refreshed.status, InvoiceStatus::Overdue.as_str());

    // A completed payment for the full amount settles it.
    ctx.pay(&original, "10000").await;
    assert_eq!(
        ctx.reload_invoice(&original).await.status,
        InvoiceStatus::Paid.as_str()
    );

    // The successor is untouched by the original's payment.
    assert_eq!(
        ctx.reload_invoice(&successor).await.status,
        InvoiceStatus::Unpaid.as_str()
    );

    // Re-running the sweep the same week does not bill twice.
    let summary = ctx
        .scheduler
        .generate_recurring_invoices()
        .await
        .expect("sweep");
    assert_eq!(summary.dispatched, 0);
}
