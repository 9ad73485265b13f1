use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored advisory. `advice` holds the advice tree JSON-encoded as text;
/// decode it before handing it to the renderer. Rows are never updated after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AdvisoryRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub diagnosis: String,
    pub advice: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for an advisory row. The advice tree is serialized to
/// text by the caller (the pipeline) before insertion.
#[derive(Debug, Clone)]
pub struct NewAdvisory {
    pub user_id: Uuid,
    pub diagnosis: String,
    pub advice: String,
}
