//! Metrics module for practice-service.
//! Provides Prometheus metrics for sweeps, billing, and reconciliation.

use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Database query duration histogram
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "practice_db_query_duration_seconds",
            "Database query duration"
        ),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Sweep executions counter
pub static SWEEP_RUNS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Reminder dispatches counter
pub static REMINDERS_DISPATCHED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Recurring successor invoices generated
pub static INVOICES_GENERATED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Payments reconciled counter
pub static PAYMENTS_RECONCILED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Error counter for alerting
pub static ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Call once at startup.
pub fn init_metrics() {
    SWEEP_RUNS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "practice_sweep_runs_total",
                "Total sweep executions by sweep and outcome"
            ),
            &["sweep", "status"]
        )
        .expect("Failed to register SWEEP_RUNS_TOTAL")
    });

    REMINDERS_DISPATCHED_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "practice_reminders_dispatched_total",
                "Total reminder dispatches by template type"
            ),
            &["template_type"]
        )
        .expect("Failed to register REMINDERS_DISPATCHED_TOTAL")
    });

    INVOICES_GENERATED_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "practice_invoices_generated_total",
                "Successor invoices generated from recurring templates"
            ),
            &["firm_id"]
        )
        .expect("Failed to register INVOICES_GENERATED_TOTAL")
    });

    PAYMENTS_RECONCILED_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "practice_payments_reconciled_total",
                "Payments reconciled by gateway"
            ),
            &["gateway"]
        )
        .expect("Failed to register PAYMENTS_RECONCILED_TOTAL")
    });

    ERRORS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("practice_errors_total", "Total errors by type for alerting"),
            &["error_type", "operation"]
        )
        .expect("Failed to register ERRORS_TOTAL")
    });

    // Force initialization of lazy statics
    let _ = &*DB_QUERY_DURATION;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Failed to convert metrics to string")
}

/// Record a sweep execution.
pub fn record_sweep_run(sweep: &str, status: &str) {
    if let Some(counter) = SWEEP_RUNS_TOTAL.get() {
        counter.with_label_values(&[sweep, status]).inc();
    }
}

/// Record a reminder dispatch.
pub fn record_reminder_dispatched(template_type: &str) {
    if let Some(counter) = REMINDERS_DISPATCHED_TOTAL.get() {
        counter.with_label_values(&[template_type]).inc();
    }
}

/// Record a generated successor invoice.
pub fn record_invoice_generated(firm_id: &str) {
    if let Some(counter) = INVOICES_GENERATED_TOTAL.get() {
        counter.with_label_values(&[firm_id]).inc();
    }
}

/// Record a reconciled payment.
pub fn record_payment_reconciled(gateway: &str) {
    if let Some(counter) = PAYMENTS_RECONCILED_TOTAL.get() {
        counter.with_label_values(&[gateway]).inc();
    }
}

/// Record an error for alerting.
pub fn record_error(error_type: &str, operation: &str) {
    if let Some(counter) = ERRORS_TOTAL.get() {
        counter.with_label_values(&[error_type, operation]).inc();
    }
}
