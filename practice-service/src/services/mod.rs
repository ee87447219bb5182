//! Service layer for practice-service.

mod clock;
mod database;
pub mod gateway;
mod ledger;
pub mod metrics;
mod notifier;
mod reconciliation;
mod recurrence;

pub use clock::{Clock, FixedClock, SystemClock};
pub use database::Database;
pub use gateway::{GatewayRegistry, PaymentGateway, PaymentLink, RefundRecord, WebhookOutcome};
pub use ledger::{derive_status, recompute_totals, InvoiceLedger};
pub use metrics::{get_metrics, init_metrics};
pub use notifier::{
    DeliveryReceipt, DispatchRecord, FailingDispatcher, NotificationDispatcher,
    RecordingDispatcher, WhatsAppDispatcher,
};
pub use reconciliation::PaymentReconciler;
pub use recurrence::{advance_schedule, RecurrenceEngine};
