use crate::error::Result;
use crate::models::Activity;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

/// Activity type tags written by the engine.
pub mod kind {
    pub const COMMUNITY_CREATED: &str = "COMMUNITY_CREATED";
    pub const MEMBER_ADDED: &str = "MEMBER_ADDED";
    pub const MEMBER_JOINED: &str = "MEMBER_JOINED";
    pub const MEMBER_REMOVED: &str = "MEMBER_REMOVED";
    pub const ROLE_CHANGED: &str = "ROLE_CHANGED";
    pub const PERMISSIONS_UPDATED: &str = "PERMISSIONS_UPDATED";
    pub const INVITE_SENT: &str = "INVITE_SENT";
    pub const INVITE_ACCEPTED: &str = "INVITE_ACCEPTED";
    pub const INVITE_CANCELLED: &str = "INVITE_CANCELLED";
    pub const JOIN_REQUEST_SUBMITTED: &str = "JOIN_REQUEST_SUBMITTED";
    pub const JOIN_REQUEST_APPROVED: &str = "JOIN_REQUEST_APPROVED";
    pub const JOIN_REQUEST_REJECTED: &str = "JOIN_REQUEST_REJECTED";
}

/// Appends one ledger entry on the caller's transaction connection. Running
/// on the same transaction makes the append atomic with the mutation it
/// records: if this write fails, the whole operation rolls back.
pub(crate) async fn record(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    community_id: Uuid,
    activity_type: &str,
    description: &str,
    metadata: Option<String>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO activities (id, user_id, community_id, activity_type, description, metadata, timestamp)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(community_id)
    .bind(activity_type)
    .bind(description)
    .bind(metadata)
    .bind(Utc::now())
    .execute(conn)
    .await?;

    Ok(())
}

/// Read side of the ledger.
#[derive(Clone)]
pub struct ActivityService {
    db: SqlitePool,
}

impl ActivityService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Entries for a community, newest first, optionally narrowed to one user.
    pub async fn query(
        &self,
        community_id: Uuid,
        user_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Activity>> {
        let activities = match user_id {
            Some(user_id) => {
                sqlx::query_as::<_, Activity>(
                    r#"
                    SELECT id, user_id, community_id, activity_type, description, metadata, timestamp
                    FROM activities
                    WHERE community_id = ? AND user_id = ?
                    ORDER BY timestamp DESC
                    LIMIT ?
                    "#,
                )
                .bind(community_id)
                .bind(user_id)
                .bind(limit)
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, Activity>(
                    r#"
                    SELECT id, user_id, community_id, activity_type, description, metadata, timestamp
                    FROM activities
                    WHERE community_id = ?
                    ORDER BY timestamp DESC
                    LIMIT ?
                    "#,
                )
                .bind(community_id)
                .bind(limit)
                .fetch_all(&self.db)
                .await?
            }
        };

        Ok(activities)
    }
}
