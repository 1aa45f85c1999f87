use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One immutable entry of the audit ledger. Written in the same transaction
/// as the state change it records, never updated or deleted on its own.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Activity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub community_id: Uuid,
    pub activity_type: String,
    pub description: String,
    /// JSON-encoded structured context, when the writer has any.
    pub metadata: Option<String>,
    pub timestamp: DateTime<Utc>,
}
