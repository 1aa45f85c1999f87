use crate::error::{Error, Result};
use crate::models::{JoinRequest, RequestStatus, Role, User};
use crate::services::activity::{self, kind};
use crate::services::membership;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

const REQUEST_COLUMNS: &str = "id, user_id, community_id, status, message, \
     reviewed_by, reviewed_at, review_note, created_at, updated_at";

/// Request/approve/reject workflow for private communities.
/// PENDING -> APPROVED and PENDING -> REJECTED are the only transitions,
/// both terminal.
#[derive(Clone)]
pub struct JoinRequestService {
    db: SqlitePool,
}

impl JoinRequestService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn get(&self, request_id: Uuid) -> Result<JoinRequest> {
        let request = sqlx::query_as::<_, JoinRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM join_requests WHERE id = ?"
        ))
        .bind(request_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| Error::not_found("join request", request_id))?;

        Ok(request)
    }

    /// Submits a request to join a private community. Resubmission while a
    /// PENDING request exists is idempotent: the existing request is
    /// returned unchanged. A partial unique index backs this up under
    /// concurrent submission.
    pub async fn submit(
        &self,
        user_id: Uuid,
        community_id: Uuid,
        message: Option<String>,
    ) -> Result<JoinRequest> {
        if let Some(existing) = self.find_pending(user_id, community_id).await? {
            tracing::debug!(
                request_id = %existing.id,
                "join request already pending, returning existing request"
            );
            return Ok(existing);
        }

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let inserted = sqlx::query_as::<_, JoinRequest>(&format!(
            r#"
            INSERT INTO join_requests (id, user_id, community_id, status, message, created_at, updated_at)
            VALUES (?, ?, ?, 'PENDING', ?, ?, ?)
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(community_id)
        .bind(&message)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await;

        let request = match inserted {
            Ok(request) => request,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                // Lost a submit race; the winner's request is the one we want.
                drop(tx);
                return self
                    .find_pending(user_id, community_id)
                    .await?
                    .ok_or_else(|| Error::not_found("join request", user_id));
            }
            Err(e) => return Err(e.into()),
        };

        activity::record(
            &mut tx,
            user_id,
            community_id,
            kind::JOIN_REQUEST_SUBMITTED,
            "Requested to join community",
            None,
        )
        .await?;

        tx.commit().await?;
        Ok(request)
    }

    /// Approves a PENDING request: creates a MEMBER membership for the
    /// requester and marks the request APPROVED, atomically. If the
    /// requester already became a member through another path in the
    /// interim, the approval still lands and the duplicate membership is
    /// skipped with a warning.
    pub async fn approve(&self, request_id: Uuid, approver_id: Uuid) -> Result<JoinRequest> {
        let mut tx = self.db.begin().await?;

        let request = sqlx::query_as::<_, JoinRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM join_requests WHERE id = ?"
        ))
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::not_found("join request", request_id))?;

        if request.status != RequestStatus::Pending {
            return Err(Error::AlreadyReviewed {
                request_id,
                status: request.status.as_str().to_string(),
            });
        }

        let approver = fetch_user(&mut tx, approver_id).await?;

        match membership::insert_membership(
            &mut tx,
            request.user_id,
            request.community_id,
            Role::Member,
        )
        .await
        {
            Ok(_) => {}
            Err(Error::DuplicateMembership { .. }) => {
                tracing::warn!(
                    request_id = %request_id,
                    user_id = %request.user_id,
                    "requester joined through another path before approval; skipping membership creation"
                );
            }
            Err(e) => return Err(e),
        }

        let updated = sqlx::query_as::<_, JoinRequest>(&format!(
            r#"
            UPDATE join_requests
            SET status = 'APPROVED', reviewed_by = ?, reviewed_at = ?, updated_at = ?
            WHERE id = ?
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(approver_id)
        .bind(Utc::now())
        .bind(Utc::now())
        .bind(request_id)
        .fetch_one(&mut *tx)
        .await?;

        activity::record(
            &mut tx,
            request.user_id,
            request.community_id,
            kind::JOIN_REQUEST_APPROVED,
            &format!("Join request approved by {}", approver.display_name),
            None,
        )
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Rejects a PENDING request with an optional review note. No membership
    /// side effect.
    pub async fn reject(
        &self,
        request_id: Uuid,
        reviewer_id: Uuid,
        note: Option<String>,
    ) -> Result<JoinRequest> {
        let mut tx = self.db.begin().await?;

        let request = sqlx::query_as::<_, JoinRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM join_requests WHERE id = ?"
        ))
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::not_found("join request", request_id))?;

        if request.status != RequestStatus::Pending {
            return Err(Error::AlreadyReviewed {
                request_id,
                status: request.status.as_str().to_string(),
            });
        }

        let reviewer = fetch_user(&mut tx, reviewer_id).await?;

        let updated = sqlx::query_as::<_, JoinRequest>(&format!(
            r#"
            UPDATE join_requests
            SET status = 'REJECTED', reviewed_by = ?, reviewed_at = ?, review_note = ?, updated_at = ?
            WHERE id = ?
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(reviewer_id)
        .bind(Utc::now())
        .bind(&note)
        .bind(Utc::now())
        .bind(request_id)
        .fetch_one(&mut *tx)
        .await?;

        activity::record(
            &mut tx,
            request.user_id,
            request.community_id,
            kind::JOIN_REQUEST_REJECTED,
            &format!("Join request rejected by {}", reviewer.display_name),
            None,
        )
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    pub async fn pending_count(&self, community_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM join_requests WHERE community_id = ? AND status = 'PENDING'",
        )
        .bind(community_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count)
    }

    pub async fn list(
        &self,
        community_id: Uuid,
        status: Option<RequestStatus>,
    ) -> Result<Vec<JoinRequest>> {
        let requests = match status {
            Some(status) => {
                sqlx::query_as::<_, JoinRequest>(&format!(
                    "SELECT {REQUEST_COLUMNS} FROM join_requests \
                     WHERE community_id = ? AND status = ? ORDER BY created_at"
                ))
                .bind(community_id)
                .bind(status)
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, JoinRequest>(&format!(
                    "SELECT {REQUEST_COLUMNS} FROM join_requests \
                     WHERE community_id = ? ORDER BY created_at"
                ))
                .bind(community_id)
                .fetch_all(&self.db)
                .await?
            }
        };

        Ok(requests)
    }

    async fn find_pending(
        &self,
        user_id: Uuid,
        community_id: Uuid,
    ) -> Result<Option<JoinRequest>> {
        let request = sqlx::query_as::<_, JoinRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM join_requests \
             WHERE user_id = ? AND community_id = ? AND status = 'PENDING'"
        ))
        .bind(user_id)
        .bind(community_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(request)
    }
}

async fn fetch_user(
    conn: &mut sqlx::SqliteConnection,
    user_id: Uuid,
) -> Result<User> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, email, display_name, created_at FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| Error::not_found("user", user_id))?;

    Ok(user)
}
