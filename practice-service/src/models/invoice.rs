//! Invoice model.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "partially_paid" => InvoiceStatus::PartiallyPaid,
            "paid" => InvoiceStatus::Paid,
            "overdue" => InvoiceStatus::Overdue,
            "cancelled" => InvoiceStatus::Cancelled,
            _ => InvoiceStatus::Unpaid,
        }
    }

    /// Statuses with an outstanding balance.
    pub fn open_statuses() -> [InvoiceStatus; 3] {
        [
            InvoiceStatus::Unpaid,
            InvoiceStatus::PartiallyPaid,
            InvoiceStatus::Overdue,
        ]
    }
}

/// Recurrence frequency for recurring invoices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Monthly,
    Quarterly,
    HalfYearly,
    Annual,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::HalfYearly => "half_yearly",
            Frequency::Annual => "annual",
        }
    }

    /// Unknown frequency names are rejected rather than defaulted: a typo
    /// here would silently change a client's billing cadence.
    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(Frequency::Monthly),
            "quarterly" => Some(Frequency::Quarterly),
            "half_yearly" => Some(Frequency::HalfYearly),
            "annual" => Some(Frequency::Annual),
            _ => None,
        }
    }

    /// Length of one recurrence period in calendar months.
    pub fn months(&self) -> u32 {
        match self {
            Frequency::Monthly => 1,
            Frequency::Quarterly => 3,
            Frequency::HalfYearly => 6,
            Frequency::Annual => 12,
        }
    }
}

/// Payment terms determining the due date of generated invoices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentTerms {
    Immediate,
    Net15,
    Net30,
    Net45,
    Net60,
}

impl PaymentTerms {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentTerms::Immediate => "immediate",
            PaymentTerms::Net15 => "net_15",
            PaymentTerms::Net30 => "net_30",
            PaymentTerms::Net45 => "net_45",
            PaymentTerms::Net60 => "net_60",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "net_15" => PaymentTerms::Net15,
            "net_30" => PaymentTerms::Net30,
            "net_45" => PaymentTerms::Net45,
            "net_60" => PaymentTerms::Net60,
            _ => PaymentTerms::Immediate,
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            PaymentTerms::Immediate => 0,
            PaymentTerms::Net15 => 15,
            PaymentTerms::Net30 => 30,
            PaymentTerms::Net45 => 45,
            PaymentTerms::Net60 => 60,
        }
    }
}

/// Invoice record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub firm_id: Uuid,
    pub client_id: Uuid,
    pub invoice_number: String,
    pub currency: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub tax_rate: Decimal,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub status: String,
    pub payment_terms: String,
    pub is_recurring: bool,
    pub frequency: Option<String>,
    pub next_generation_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub generated_from: Option<Uuid>,
    pub generation_period: Option<NaiveDate>,
    pub auto_send_on_creation: bool,
    pub portal_link: Option<String>,
    pub gateway_reference: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Line item on an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LineItem {
    pub line_item_id: Uuid,
    pub invoice_id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
    pub sort_order: i32,
}

/// Input for creating an invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub firm_id: Uuid,
    pub client_id: Uuid,
    pub invoice_number: String,
    pub currency: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub tax_rate: Decimal,
    pub payment_terms: PaymentTerms,
    pub is_recurring: bool,
    pub frequency: Option<Frequency>,
    /// Explicit first generation date; computed from the issue date on
    /// submission when left unset.
    pub next_generation_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub auto_send_on_creation: bool,
    pub items: Vec<CreateLineItem>,
}

/// Input for a single line item.
#[derive(Debug, Clone)]
pub struct CreateLineItem {
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub statuses: Option<Vec<InvoiceStatus>>,
    pub client_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}
