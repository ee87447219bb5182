//! Application startup and lifecycle management.

use crate::config::PracticeConfig;
use crate::handlers::{appointments, health, payments, portal, webhooks};
use crate::repository::Store;
use crate::scheduler::{ReminderScheduler, SweepRunner};
use crate::services::{
    init_metrics, Clock, Database, GatewayRegistry, InvoiceLedger, NotificationDispatcher,
    PaymentReconciler, RecurrenceEngine, SystemClock, WhatsAppDispatcher,
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: PracticeConfig,
    pub store: Store,
    pub ledger: InvoiceLedger,
    pub reconciler: PaymentReconciler,
    pub gateways: GatewayRegistry,
    pub notifier: Arc<dyn NotificationDispatcher>,
    pub clock: Arc<dyn Clock>,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
    runner: Arc<SweepRunner>,
}

impl Application {
    /// Build the application against PostgreSQL, running migrations.
    pub async fn build(config: PracticeConfig) -> Result<Self, AppError> {
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            e
        })?;

        Self::build_with_store(config, Store::postgres(Arc::new(db))).await
    }

    /// Build the application against an already-constructed store. Used
    /// by tests and single-process deployments without PostgreSQL.
    pub async fn build_with_store(
        config: PracticeConfig,
        store: Store,
    ) -> Result<Self, AppError> {
        init_metrics();

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let notifier: Arc<dyn NotificationDispatcher> = Arc::new(WhatsAppDispatcher::new(
            store.clone(),
            clock.clone(),
            config.whatsapp.clone(),
        ));
        let gateways = GatewayRegistry::new(config.razorpay.clone(), config.stripe.clone());

        let ledger = InvoiceLedger::new(store.clone(), notifier.clone(), clock.clone());
        let reconciler = PaymentReconciler::new(
            store.clone(),
            notifier.clone(),
            gateways.clone(),
            clock.clone(),
        );
        let recurrence = RecurrenceEngine::new(store.clone(), ledger.clone(), clock.clone());
        let scheduler = ReminderScheduler::new(
            store.clone(),
            notifier.clone(),
            recurrence,
            clock.clone(),
        );
        let runner = Arc::new(SweepRunner::new(
            scheduler,
            clock.clone(),
            config.scheduler.clone(),
        ));

        let state = AppState {
            config: config.clone(),
            store,
            ledger,
            reconciler,
            gateways,
            notifier,
            clock,
        };

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Practice service listener bound");

        Ok(Self {
            port,
            listener,
            state,
            runner,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let runner = self.runner.clone();
        let shutdown_token = runner.shutdown_token();
        tokio::spawn(async move {
            runner.run().await;
        });

        let router = Router::new()
            .route("/health", get(health::health_check))
            .route("/ready", get(health::readiness_check))
            .route("/metrics", get(health::metrics_handler))
            // Payment API
            .route(
                "/invoices/:id/payment-link",
                post(payments::create_payment_link),
            )
            .route(
                "/invoices/:id/payment-status",
                get(payments::get_invoice_payment_status),
            )
            .route(
                "/invoices/:id/payments/manual",
                post(payments::process_manual_payment),
            )
            .route("/payments/:id/refund", post(payments::refund_payment))
            // Gateway webhooks
            .route("/webhooks/:gateway", post(webhooks::gateway_webhook))
            // Client portal
            .route(
                "/portal/clients/:id/invoices",
                get(portal::list_client_invoices),
            )
            .route(
                "/portal/clients/:id/documents",
                get(portal::list_client_documents),
            )
            // Appointments
            .route(
                "/appointments/:id/cancel",
                post(appointments::cancel_appointment),
            )
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn(metrics_middleware))
            .layer(middleware::from_fn(request_id_middleware))
            .with_state(self.state);

        tracing::info!(
            service = "practice-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        let result = axum::serve(self.listener, router).await;
        shutdown_token.cancel();
        result
    }
}
