//! Reminder sweep tests: day-count bucket exactness for invoices,
//! at-most-once appointment buckets, tax deadline broadcasts, and the
//! document expiry window.

mod common;

use common::{date, time, TestContext};
use practice_service::models::TemplateType;
use practice_service::repository::AppointmentStore;

#[tokio::test]
async fn invoice_reminder_fires_exactly_once_per_bucket() {
    let ctx = TestContext::new(date(2026, 2, 12)).await;
    let client = ctx.add_client("Acme Traders").await;
    // Due in exactly 3 days.
    ctx.create_invoice_due(&client, "INV-0300", "1000", date(2026, 2, 15))
        .await;

    let summary = ctx.scheduler.send_invoice_reminders().await.expect("sweep");
    assert_eq!(summary.dispatched, 1);
    assert_eq!(ctx.notifier.count(TemplateType::PaymentReminder), 1);

    // Next day the invoice is 2 days out: no bucket matches.
    ctx.clock.set_date(date(2026, 2, 13));
    let summary = ctx.scheduler.send_invoice_reminders().await.expect("sweep");
    assert_eq!(summary.dispatched, 0);
    assert_eq!(ctx.notifier.count(TemplateType::PaymentReminder), 1);

    // On the due date the second bucket fires.
    ctx.clock.set_date(date(2026, 2, 15));
    ctx.scheduler.send_invoice_reminders().await.expect("sweep");
    assert_eq!(ctx.notifier.count(TemplateType::PaymentReminder), 2);
}

#[tokio::test]
async fn overdue_notice_fires_on_exact_day_counts() {
    let ctx = TestContext::new(date(2026, 2, 22)).await;
    let client = ctx.add_client("Acme Traders").await;
    // Due 7 days ago.
    ctx.create_invoice_due(&client, "INV-0301", "1000", date(2026, 2, 15))
        .await;

    let summary = ctx.scheduler.send_invoice_reminders().await.expect("sweep");
    assert_eq!(summary.dispatched, 1);
    assert_eq!(ctx.notifier.count(TemplateType::PaymentOverdue), 1);

    let record = &ctx.notifier.sent()[0];
    assert_eq!(record.data["days_overdue"], 7);

    // 8 days overdue is not a bucket.
    ctx.clock.set_date(date(2026, 2, 23));
    ctx.scheduler.send_invoice_reminders().await.expect("sweep");
    assert_eq!(ctx.notifier.count(TemplateType::PaymentOverdue), 1);

    // 14 days overdue is.
    ctx.clock.set_date(date(2026, 3, 1));
    ctx.scheduler.send_invoice_reminders().await.expect("sweep");
    assert_eq!(ctx.notifier.count(TemplateType::PaymentOverdue), 2);
}

#[tokio::test]
async fn paid_invoices_are_not_reminded() {
    let ctx = TestContext::new(date(2026, 2, 12)).await;
    let client = ctx.add_client("Acme Traders").await;
    let invoice = ctx
        .create_invoice_due(&client, "INV-0302", "1000", date(2026, 2, 15))
        .await;
    ctx.pay(&invoice, "1000").await;

    let summary = ctx.scheduler.send_invoice_reminders().await.expect("sweep");
    assert_eq!(summary.scanned, 0);
    assert_eq!(ctx.notifier.count(TemplateType::PaymentReminder), 0);
}

#[tokio::test]
async fn appointment_24h_bucket_fires_once_across_hourly_runs() {
    let ctx = TestContext::new(date(2026, 3, 9)).await;
    let client = ctx.add_client("Acme Traders").await;
    ctx.add_appointment(&client, date(2026, 3, 10), time(10, 0)).await;

    for _ in 0..3 {
        ctx.scheduler
            .send_appointment_reminders()
            .await
            .expect("sweep");
    }

    assert_eq!(ctx.notifier.count(TemplateType::AppointmentReminder), 1);
    let record = &ctx.notifier.sent()[0];
    assert_eq!(record.data["hours_before"], 24);
}

#[tokio::test]
async fn appointment_1h_bucket_fires_within_the_next_hour_only() {
    let ctx = TestContext::new(date(2026, 3, 10)).await;
    let client = ctx.add_client("Acme Traders").await;
    let soon = ctx.add_appointment(&client, date(2026, 3, 10), time(10, 0)).await;
    ctx.add_appointment(&client, date(2026, 3, 10), time(13, 0)).await;

    ctx.clock
        .set(date(2026, 3, 10).and_hms_opt(9, 30, 0).expect("time").and_utc());

    ctx.scheduler
        .send_appointment_reminders()
        .await
        .expect("sweep");
    ctx.scheduler
        .send_appointment_reminders()
        .await
        .expect("sweep");

    // Only the 10:00 appointment is inside the 60-minute window, and its
    // bucket fired once despite two runs.
    assert_eq!(ctx.notifier.count(TemplateType::AppointmentReminder), 1);
    let record = &ctx.notifier.sent()[0];
    assert_eq!(record.data["hours_before"], 1);

    let reloaded = ctx
        .store
        .appointments
        .find(soon.appointment_id)
        .await
        .expect("store read")
        .expect("appointment exists");
    assert!(reloaded.reminder_1h_sent_utc.is_some());
}

#[tokio::test]
async fn cancelled_appointments_are_not_reminded() {
    let ctx = TestContext::new(date(2026, 3, 9)).await;
    let client = ctx.add_client("Acme Traders").await;
    let mut appointment = ctx
        .add_appointment(&client, date(2026, 3, 10), time(10, 0))
        .await;
    appointment.status = "cancelled".to_string();
    ctx.store
        .appointments
        .update(&appointment)
        .await
        .expect("update");

    ctx.scheduler
        .send_appointment_reminders()
        .await
        .expect("sweep");
    assert_eq!(ctx.notifier.count(TemplateType::AppointmentReminder), 0);
}

#[tokio::test]
async fn tax_deadline_broadcasts_to_active_clients_only() {
    // 2026-07-24 is exactly 7 days before the individual ITR deadline.
    let ctx = TestContext::new(date(2026, 7, 24)).await;
    let active_a = ctx.add_client("Acme Traders").await;
    let active_b = ctx.add_client("Bharat Textiles").await;
    ctx.add_inactive_client("Dormant Ventures").await;

    let summary = ctx.scheduler.check_tax_deadlines().await.expect("sweep");
    assert_eq!(summary.dispatched, 2);
    assert_eq!(ctx.notifier.count(TemplateType::TaxDeadline), 2);

    let recipients: Vec<_> = ctx.notifier.sent().iter().map(|r| r.client_id).collect();
    assert!(recipients.contains(&active_a.client_id));
    assert!(recipients.contains(&active_b.client_id));

    let record = &ctx.notifier.sent()[0];
    assert_eq!(record.data["days_until"], 7);
    assert_eq!(
        record.data["deadline_name"],
        "ITR Filing Deadline for Individuals"
    );
}

#[tokio::test]
async fn tax_deadline_is_quiet_outside_its_buckets() {
    // 5 days before the deadline: neither the 7-day nor 1-day bucket.
    let ctx = TestContext::new(date(2026, 7, 26)).await;
    ctx.add_client("Acme Traders").await;

    let summary = ctx.scheduler.check_tax_deadlines().await.expect("sweep");
    assert_eq!(summary.dispatched, 0);
}

#[tokio::test]
async fn document_expiry_window_is_thirty_days_inclusive() {
    let ctx = TestContext::new(date(2026, 4, 1)).await;
    let client = ctx.add_client("Acme Traders").await;

    ctx.add_document(&client, "GST Registration", Some(date(2026, 4, 11))).await;
    ctx.add_document(&client, "Trade License", Some(date(2026, 5, 1))).await;
    // Outside the window or not expiring at all.
    ctx.add_document(&client, "Lease Deed", Some(date(2026, 5, 2))).await;
    ctx.add_document(&client, "PAN Card", None).await;
    ctx.add_document(&client, "Old Tender", Some(date(2026, 3, 31))).await;

    let summary = ctx.scheduler.check_document_expiry().await.expect("sweep");
    assert_eq!(summary.scanned, 2);
    assert_eq!(summary.dispatched, 2);
    assert_eq!(ctx.notifier.count(TemplateType::DocumentExpiry), 2);

    let names: Vec<_> = ctx
        .notifier
        .sent()
        .iter()
        .map(|r| r.data["document_name"].as_str().map(String::from).unwrap_or_default())
        .collect();
    assert!(names.contains(&"GST Registration".to_string()));
    assert!(names.contains(&"Trade License".to_string()));
}

#[tokio::test]
async fn document_expiring_today_is_still_reminded() {
    let ctx = TestContext::new(date(2026, 4, 1)).await;
    let client = ctx.add_client("Acme Traders").await;
    ctx.add_document(&client, "Expiring Today", Some(date(2026, 4, 1))).await;

    let summary = ctx.scheduler.check_document_expiry().await.expect("sweep");
    assert_eq!(summary.dispatched, 1);

    let record = &ctx.notifier.sent()[0];
    assert_eq!(record.data["days_until_expiry"], 0);
}
