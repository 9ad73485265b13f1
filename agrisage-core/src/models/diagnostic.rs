use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored crop diagnosis. `image_url` is the public URL of the single blob
/// owned by this row for its entire lifetime. `diagnosis` and `advice` are
/// free text and may carry `**…**` emphasis markers. `confidence` is stored
/// verbatim, including out-of-range values.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DiagnosticRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_url: String,
    pub diagnosis: String,
    pub advice: String,
    pub confidence: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a diagnostic row. The blob behind `image_url` must
/// already exist when this is inserted.
#[derive(Debug, Clone)]
pub struct NewDiagnostic {
    pub user_id: Uuid,
    pub image_url: String,
    pub diagnosis: String,
    pub advice: String,
    pub confidence: Option<i32>,
}
