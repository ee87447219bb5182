//! Data models for practice-service.

mod appointment;
mod client;
mod document;
mod invoice;
mod notification;
mod payment;
mod settings;
mod tax_calendar;

pub use appointment::{Appointment, AppointmentStatus};
pub use client::{Client, ClientStatus};
pub use document::{format_file_size, Document, DocumentVisibility, ListDocumentsFilter};
pub use invoice::{
    CreateInvoice, CreateLineItem, Frequency, Invoice, InvoiceStatus, LineItem,
    ListInvoicesFilter, PaymentTerms,
};
pub use notification::{DeliveryStatus, NotificationChannel, NotificationLog, TemplateType};
pub use payment::{CreatePayment, Gateway, Payment, PaymentStatus};
pub use settings::FirmSettings;
pub use tax_calendar::{tax_deadlines, TaxDeadline};
