//! HTTP API tests against an application spawned on an in-memory store.

mod common;

use common::{date, TestContext};
use practice_service::config::{
    DatabaseConfig, PracticeConfig, RazorpayConfig, SchedulerConfig, StripeConfig, WhatsAppConfig,
};
use practice_service::repository::{AppointmentStore, DocumentStore};
use practice_service::startup::Application;
use secrecy::Secret;
use serde_json::Value;
use service_core::config::Config as CoreConfig;

fn test_config() -> PracticeConfig {
    PracticeConfig {
        common: CoreConfig { port: 0 },
        service_name: "practice-service-test".to_string(),
        log_level: "warn".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 1,
        },
        scheduler: SchedulerConfig {
            enabled: false,
            tick_interval_secs: 60,
            daily_hour: 3,
            generation_hour: 9,
        },
        whatsapp: WhatsAppConfig {
            enabled: false,
            api_base: "http://localhost:9999".to_string(),
            api_token: Secret::new(String::new()),
        },
        razorpay: RazorpayConfig {
            api_base: "http://localhost:9999".to_string(),
            key_id: String::new(),
            key_secret: Secret::new(String::new()),
            webhook_secret: Secret::new("test-webhook-secret".to_string()),
        },
        stripe: StripeConfig {
            api_base: "http://localhost:9999".to_string(),
            secret_key: Secret::new(String::new()),
            webhook_secret: Secret::new("test-webhook-secret".to_string()),
        },
    }
}

/// Spawn the app over the fixture's store and return its base URL.
async fn spawn_app(ctx: &TestContext) -> String {
    let app = Application::build_with_store(test_config(), ctx.store.clone())
        .await
        .expect("application builds");
    let port = app.port();

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let base = format!("http://127.0.0.1:{}", port);
    let client = reqwest::Client::new();
    for _ in 0..50 {
        if client.get(format!("{}/health", base)).send().await.is_ok() {
            break;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    }
    base
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let ctx = TestContext::new(date(2026, 2, 1)).await;
    let base = spawn_app(&ctx).await;

    let response = reqwest::get(format!("{}/health", base))
        .await
        .expect("request");
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "practice-service");
}

#[tokio::test]
async fn manual_payment_endpoint_settles_invoice() {
    let ctx = TestContext::new(date(2026, 2, 1)).await;
    let client = ctx.add_client("Acme Traders").await;
    // Far-future due date: the app runs on the system clock.
    let invoice = ctx
        .create_invoice_due(&client, "INV-0400", "7500", date(2099, 1, 1))
        .await;

    let base = spawn_app(&ctx).await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!(
            "{}/invoices/{}/payments/manual",
            base, invoice.invoice_id
        ))
        .json(&serde_json::json!({
            "amount": "7500",
            "payment_method": "Bank Transfer",
            "notes": "NEFT reference 884421"
        }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["success"], true);
    assert_eq!(body["invoice_status"], "paid");

    let status: Value = http
        .get(format!(
            "{}/invoices/{}/payment-status",
            base, invoice.invoice_id
        ))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json body");
    assert_eq!(status["status"], "paid");
    assert_eq!(status["balance"], "0");
    assert_eq!(status["payments"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn empty_payment_method_is_a_validation_error() {
    let ctx = TestContext::new(date(2026, 2, 1)).await;
    let client = ctx.add_client("Acme Traders").await;
    let invoice = ctx
        .create_invoice_due(&client, "INV-0401", "7500", date(2099, 1, 1))
        .await;

    let base = spawn_app(&ctx).await;
    let response = reqwest::Client::new()
        .post(format!(
            "{}/invoices/{}/payments/manual",
            base, invoice.invoice_id
        ))
        .json(&serde_json::json!({
            "amount": "100",
            "payment_method": ""
        }))
        .send()
        .await
        .expect("request");

    assert_eq!(response.status(), 422);
    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["error"], "Validation error");
}

#[tokio::test]
async fn unsupported_gateway_name_is_rejected() {
    let ctx = TestContext::new(date(2026, 2, 1)).await;
    let client = ctx.add_client("Acme Traders").await;
    let invoice = ctx
        .create_invoice_due(&client, "INV-0402", "7500", date(2099, 1, 1))
        .await;

    let base = spawn_app(&ctx).await;
    let response = reqwest::Client::new()
        .post(format!("{}/invoices/{}/payment-link", base, invoice.invoice_id))
        .json(&serde_json::json!({ "gateway": "paypal" }))
        .send()
        .await
        .expect("request");

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["error"], "Unsupported payment gateway: paypal");
}

#[tokio::test]
async fn webhook_with_bad_signature_is_rejected() {
    let ctx = TestContext::new(date(2026, 2, 1)).await;
    let base = spawn_app(&ctx).await;

    let response = reqwest::Client::new()
        .post(format!("{}/webhooks/razorpay", base))
        .header("x-razorpay-signature", "deadbeef")
        .body(r#"{"event":"payment.captured","payload":{}}"#)
        .send()
        .await
        .expect("request");

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["error"], "Invalid webhook signature");
}

#[tokio::test]
async fn portal_lists_client_invoices_and_accessible_documents() {
    let ctx = TestContext::new(date(2026, 2, 1)).await;
    let client = ctx.add_client("Acme Traders").await;
    ctx.create_invoice_due(&client, "INV-0403", "1200", date(2099, 1, 1))
        .await;
    ctx.add_document(&client, "GST Registration", None).await;

    // CA-only documents stay off the portal.
    let mut hidden = ctx.add_document(&client, "Working Papers", None).await;
    hidden.visibility = "ca_only".to_string();
    ctx.store.documents.insert(&hidden).await.expect("document update");

    let base = spawn_app(&ctx).await;
    let http = reqwest::Client::new();

    let invoices: Value = http
        .get(format!("{}/portal/clients/{}/invoices", base, client.client_id))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json body");
    assert_eq!(invoices.as_array().map(Vec::len), Some(1));
    assert_eq!(invoices[0]["invoice_number"], "INV-0403");
    assert_eq!(invoices[0]["total_amount"], "1200");

    let documents: Value = http
        .get(format!("{}/portal/clients/{}/documents", base, client.client_id))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json body");
    assert_eq!(documents.as_array().map(Vec::len), Some(1));
    assert_eq!(documents[0]["document_name"], "GST Registration");
    assert_eq!(documents[0]["file_size"], "128.0 KB");
}

#[tokio::test]
async fn appointment_cancellation_endpoint_updates_status() {
    let ctx = TestContext::new(date(2026, 2, 1)).await;
    let client = ctx.add_client("Acme Traders").await;
    let appointment = ctx
        .add_appointment(&client, date(2099, 1, 1), common::time(10, 0))
        .await;

    let base = spawn_app(&ctx).await;
    let response = reqwest::Client::new()
        .post(format!(
            "{}/appointments/{}/cancel",
            base, appointment.appointment_id
        ))
        .json(&serde_json::json!({ "reason": "Client travelling" }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 200);

    let reloaded = ctx
        .store
        .appointments
        .find(appointment.appointment_id)
        .await
        .expect("store read")
        .expect("appointment exists");
    assert_eq!(reloaded.status, "cancelled");
    assert!(reloaded
        .notes
        .as_deref()
        .unwrap_or_default()
        .contains("Client travelling"));
}
