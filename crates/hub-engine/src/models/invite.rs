use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Role;

/// A token-based, single-use, time-limited offer of membership sent to an
/// email address.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invite {
    pub id: Uuid,
    pub community_id: Uuid,
    pub email: String,
    pub token: String,
    pub invited_by: Uuid,
    pub role: Role,
    pub is_used: bool,
    pub is_expired: bool,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl Invite {
    /// Expiry by wall clock wins even when the `is_expired` flag was never
    /// set by a cancellation.
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        self.is_expired || self.expires_at <= now
    }
}

/// Result of a pure token lookup, for registration pages and producers that
/// want to inspect an invite without consuming it.
#[derive(Debug, Clone, Serialize)]
pub struct InviteValidation {
    pub valid: bool,
    pub email: String,
    pub community_name: String,
    pub role: Role,
}
