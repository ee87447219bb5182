//! Per-firm settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Firm-level configuration for notifications and payment collection.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FirmSettings {
    pub firm_id: Uuid,
    pub firm_name: String,
    pub enable_whatsapp_notifications: bool,
    pub whatsapp_instance: Option<String>,
    pub default_gateway: String,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}
