//! Recurring invoice generation tests: successor contents, the
//! one-successor-per-period guard, end-of-series handling, and batch
//! failure isolation.

mod common;

use common::{date, money, TestContext};
use practice_service::models::{Frequency, Invoice, InvoiceStatus, ListInvoicesFilter};
use practice_service::repository::InvoiceStore;
use practice_service::services::Clock;
use uuid::Uuid;

async fn invoice_count(ctx: &TestContext) -> usize {
    ctx.store
        .invoices
        .list(&ListInvoicesFilter::default())
        .await
        .expect("list invoices")
        .len()
}

#[tokio::test]
async fn successor_copies_commercials_and_resets_per_invoice_fields() {
    let ctx = TestContext::new(date(2026, 3, 1)).await;
    let client = ctx.add_client("Acme Traders").await;
    let template = ctx
        .create_recurring_invoice(
            &client,
            "INV-0200",
            "2500",
            date(2026, 3, 31),
            Frequency::Monthly,
            date(2026, 3, 1),
        )
        .await;

    let summary = ctx
        .scheduler
        .generate_recurring_invoices()
        .await
        .expect("sweep");
    assert_eq!(summary.dispatched, 1);

    let successor = ctx
        .store
        .invoices
        .find_successor(template.invoice_id, date(2026, 3, 1))
        .await
        .expect("store read")
        .expect("successor exists");

    assert_eq!(successor.client_id, template.client_id);
    assert_eq!(successor.firm_id, template.firm_id);
    assert_eq!(successor.currency, template.currency);
    assert_eq!(successor.total_amount, money("2500.00"));
    assert_eq!(successor.invoice_date, date(2026, 3, 1));
    // Net 30 terms.
    assert_eq!(successor.due_date, date(2026, 3, 31));
    assert_eq!(successor.status, InvoiceStatus::Unpaid.as_str());
    assert!(!successor.is_recurring);
    assert!(successor.frequency.is_none());
    assert!(successor.gateway_reference.is_none());
    assert!(successor.portal_link.is_some());
    assert_ne!(successor.portal_link, template.portal_link);
    assert_eq!(successor.generated_from, Some(template.invoice_id));
    assert_eq!(successor.generation_period, Some(date(2026, 3, 1)));

    let items = ctx
        .store
        .invoices
        .line_items(successor.invoice_id)
        .await
        .expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].rate, money("2500"));

    // Template schedule advanced by exactly one period.
    let template = ctx.reload_invoice(&template).await;
    assert_eq!(template.next_generation_date, Some(date(2026, 4, 1)));
}

#[tokio::test]
async fn nothing_generated_before_generation_date() {
    let ctx = TestContext::new(date(2026, 3, 1)).await;
    let client = ctx.add_client("Acme Traders").await;
    ctx.create_recurring_invoice(
        &client,
        "INV-0201",
        "2500",
        date(2026, 3, 31),
        Frequency::Monthly,
        date(2026, 4, 1),
    )
    .await;

    let summary = ctx
        .scheduler
        .generate_recurring_invoices()
        .await
        .expect("sweep");
    assert_eq!(summary.scanned, 0);
    assert_eq!(invoice_count(&ctx).await, 1);
}

#[tokio::test]
async fn series_stops_after_end_date() {
    let ctx = TestContext::new(date(2026, 3, 1)).await;
    let client = ctx.add_client("Acme Traders").await;
    let mut input = ctx.invoice_input(&client, "INV-0202", "2500");
    input.is_recurring = true;
    input.frequency = Some(Frequency::Monthly);
    input.next_generation_date = Some(date(2026, 3, 1));
    input.end_date = Some(date(2026, 2, 28));
    let template = ctx.ledger.create_invoice(input).await.expect("invoice created");

    let summary = ctx
        .scheduler
        .generate_recurring_invoices()
        .await
        .expect("sweep");
    assert_eq!(summary.dispatched, 0);
    assert_eq!(invoice_count(&ctx).await, 1);

    // An expired series keeps its schedule untouched.
    let template = ctx.reload_invoice(&template).await;
    assert_eq!(template.next_generation_date, Some(date(2026, 3, 1)));
}

#[tokio::test]
async fn crash_before_durable_advance_does_not_duplicate_successor() {
    let ctx = TestContext::new(date(2026, 3, 1)).await;
    let client = ctx.add_client("Acme Traders").await;
    let template = ctx
        .create_recurring_invoice(
            &client,
            "INV-0203",
            "2500",
            date(2026, 3, 31),
            Frequency::Monthly,
            date(2026, 3, 1),
        )
        .await;

    ctx.scheduler
        .generate_recurring_invoices()
        .await
        .expect("first sweep");
    assert_eq!(invoice_count(&ctx).await, 2);

    // Simulate the crash: the successor was persisted but the schedule
    // advance never became durable.
    let mut stale = ctx.reload_invoice(&template).await;
    stale.next_generation_date = Some(date(2026, 3, 1));
    ctx.store.invoices.update(&stale).await.expect("rewind schedule");

    let summary = ctx
        .scheduler
        .generate_recurring_invoices()
        .await
        .expect("second sweep");
    assert_eq!(summary.dispatched, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(invoice_count(&ctx).await, 2);

    // The retry repaired the schedule instead of double-billing.
    let template = ctx.reload_invoice(&template).await;
    assert_eq!(template.next_generation_date, Some(date(2026, 4, 1)));
}

#[tokio::test]
async fn one_broken_template_does_not_abort_the_batch() {
    let ctx = TestContext::new(date(2026, 3, 1)).await;
    let client = ctx.add_client("Acme Traders").await;

    // A template with a frequency the engine does not understand,
    // written straight to the store as legacy data would be.
    let now = ctx.clock.now();
    let broken = Invoice {
        invoice_id: Uuid::new_v4(),
        firm_id: ctx.firm_id,
        client_id: client.client_id,
        invoice_number: "INV-0204".to_string(),
        currency: "INR".to_string(),
        invoice_date: date(2026, 2, 1),
        due_date: date(2026, 3, 1),
        tax_rate: money("0"),
        subtotal: money("100"),
        tax_amount: money("0"),
        total_amount: money("100"),
        status: InvoiceStatus::Unpaid.as_str().to_string(),
        payment_terms: "net_30".to_string(),
        is_recurring: true,
        frequency: Some("weekly".to_string()),
        next_generation_date: Some(date(2026, 3, 1)),
        end_date: None,
        generated_from: None,
        generation_period: None,
        auto_send_on_creation: false,
        portal_link: None,
        gateway_reference: None,
        created_utc: now,
        updated_utc: now,
    };
    ctx.store
        .invoices
        .insert(&broken, &[])
        .await
        .expect("broken template stored");

    ctx.create_recurring_invoice(
        &client,
        "INV-0205",
        "2500",
        date(2026, 3, 31),
        Frequency::Monthly,
        date(2026, 3, 1),
    )
    .await;

    let summary = ctx
        .scheduler
        .generate_recurring_invoices()
        .await
        .expect("sweep");

    assert_eq!(summary.scanned, 2);
    assert_eq!(summary.dispatched, 1);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn quarterly_schedule_advances_from_period_not_today() {
    let ctx = TestContext::new(date(2026, 3, 10)).await;
    let client = ctx.add_client("Acme Traders").await;
    // Generation date arrived nine days ago; the sweep is late.
    let template = ctx
        .create_recurring_invoice(
            &client,
            "INV-0206",
            "2500",
            date(2026, 3, 31),
            Frequency::Quarterly,
            date(2026, 3, 1),
        )
        .await;

    ctx.scheduler
        .generate_recurring_invoices()
        .await
        .expect("sweep");

    // Advanced from 2026-03-01, not from 2026-03-10.
    let template = ctx.reload_invoice(&template).await;
    assert_eq!(template.next_generation_date, Some(date(2026, 6, 1)));
}
