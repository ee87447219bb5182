//! Client document model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Document visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentVisibility {
    ClientAccessible,
    CaOnly,
}

impl DocumentVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentVisibility::ClientAccessible => "client_accessible",
            DocumentVisibility::CaOnly => "ca_only",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "client_accessible" => DocumentVisibility::ClientAccessible,
            _ => DocumentVisibility::CaOnly,
        }
    }
}

/// Stored document record. File contents live in the external document
/// store; this record only carries metadata.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub document_id: Uuid,
    pub firm_id: Uuid,
    pub client_id: Uuid,
    pub document_name: String,
    pub document_type: String,
    pub file_size_bytes: i64,
    pub upload_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub visibility: String,
    pub version_number: i32,
    pub previous_version: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Filter parameters for listing documents.
#[derive(Debug, Clone, Default)]
pub struct ListDocumentsFilter {
    pub client_id: Option<Uuid>,
    pub client_accessible_only: bool,
}

/// Format a byte count for display.
pub fn format_file_size(size_bytes: i64) -> String {
    if size_bytes <= 0 {
        return "0 B".to_string();
    }

    let mut size = size_bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} TB", size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_size_formatting() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512.0 B");
        assert_eq!(format_file_size(2048), "2.0 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.0 MB");
    }
}
