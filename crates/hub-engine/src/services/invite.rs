use crate::error::{self, Error, Result};
use crate::models::{Invite, InviteValidation, Membership, Role};
use crate::notify::Notifier;
use crate::services::activity::{self, kind};
use crate::services::membership::{self, MembershipService};
use crate::services::user::UserService;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

const INVITE_COLUMNS: &str = "id, community_id, email, token, invited_by, role, \
     is_used, is_expired, created_at, used_at, expires_at";

/// Token-based, single-use, time-limited invitations that convert into
/// memberships. State machine: CREATED -> (ACCEPTED | EXPIRED | CANCELLED),
/// all terminal.
#[derive(Clone)]
pub struct InviteService {
    db: SqlitePool,
    users: UserService,
    memberships: MembershipService,
    notifier: Arc<dyn Notifier>,
    ttl_days: i64,
}

impl InviteService {
    pub fn new(db: SqlitePool, notifier: Arc<dyn Notifier>, ttl_days: i64) -> Self {
        let users = UserService::new(db.clone());
        let memberships = MembershipService::new(db.clone());
        Self {
            db,
            users,
            memberships,
            notifier,
            ttl_days,
        }
    }

    /// Issues an invitation for an email address. The durable write commits
    /// first; the notification is dispatched afterwards on its own task and
    /// never fails the invite.
    pub async fn create_invite(
        &self,
        community_id: Uuid,
        email: &str,
        invited_by: Uuid,
        role: Role,
    ) -> Result<Invite> {
        let community_name = sqlx::query_scalar::<_, String>(
            "SELECT name FROM communities WHERE id = ?",
        )
        .bind(community_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| Error::not_found("community", community_id))?;

        if let Some(existing) = self.users.find_by_email(email).await? {
            if self.memberships.is_member(existing.id, community_id).await? {
                return Err(Error::AlreadyMember {
                    user_id: existing.id,
                    community_id,
                });
            }
        }

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        // The partial unique index on live invites is the final arbiter;
        // a concurrent duplicate comes back as a constraint violation.
        let invite = sqlx::query_as::<_, Invite>(&format!(
            r#"
            INSERT INTO invites (id, community_id, email, token, invited_by, role,
                                 is_used, is_expired, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, FALSE, FALSE, ?, ?)
            RETURNING {INVITE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(community_id)
        .bind(email)
        .bind(Uuid::new_v4().to_string())
        .bind(invited_by)
        .bind(role)
        .bind(now)
        .bind(now + Duration::days(self.ttl_days))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            error::on_unique_violation(
                e,
                Error::DuplicateInvite {
                    email: email.to_string(),
                    community_id,
                },
            )
        })?;

        activity::record(
            &mut tx,
            invited_by,
            community_id,
            kind::INVITE_SENT,
            &format!("Invited {} as {}", invite.email, role.as_str()),
            None,
        )
        .await?;

        tx.commit().await?;

        self.dispatch_notification(&invite, &community_name);
        Ok(invite)
    }

    /// Consumes an invitation. Membership creation and the used-flag flip
    /// happen in one transaction, so a crash cannot leave a consumed invite
    /// without its membership.
    pub async fn accept_invite(&self, token: &str, user_id: Uuid) -> Result<Membership> {
        let user = self.users.get(user_id).await?;

        let mut tx = self.db.begin().await?;

        let invite = sqlx::query_as::<_, Invite>(&format!(
            "SELECT {INVITE_COLUMNS} FROM invites WHERE token = ?"
        ))
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(Error::InvalidToken)?;

        if invite.is_used {
            return Err(Error::InviteAlreadyUsed {
                invite_id: invite.id,
            });
        }
        if invite.expired(Utc::now()) {
            return Err(Error::InviteExpired {
                invite_id: invite.id,
            });
        }
        if !invite.email.eq_ignore_ascii_case(&user.email) {
            return Err(Error::EmailMismatch {
                invite_id: invite.id,
            });
        }

        let membership = membership::insert_membership(
            &mut tx,
            user_id,
            invite.community_id,
            invite.role,
        )
        .await
        .map_err(|e| match e {
            Error::DuplicateMembership {
                user_id,
                community_id,
            } => Error::AlreadyMember {
                user_id,
                community_id,
            },
            other => other,
        })?;

        sqlx::query("UPDATE invites SET is_used = TRUE, used_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(invite.id)
            .execute(&mut *tx)
            .await?;

        activity::record(
            &mut tx,
            user_id,
            invite.community_id,
            kind::INVITE_ACCEPTED,
            &format!("Accepted invitation as {}", invite.role.as_str()),
            None,
        )
        .await?;

        tx.commit().await?;
        Ok(membership)
    }

    /// Pure read for registration pages: never mutates, reports whether the
    /// token would currently be accepted.
    pub async fn validate_invite(&self, token: &str) -> Result<InviteValidation> {
        let invite = sqlx::query_as::<_, Invite>(&format!(
            "SELECT {INVITE_COLUMNS} FROM invites WHERE token = ?"
        ))
        .bind(token)
        .fetch_optional(&self.db)
        .await?
        .ok_or(Error::InvalidToken)?;

        let community_name =
            sqlx::query_scalar::<_, String>("SELECT name FROM communities WHERE id = ?")
                .bind(invite.community_id)
                .fetch_one(&self.db)
                .await?;
        Ok(InviteValidation {
            valid: !invite.is_used && !invite.is_expired && invite.expires_at > Utc::now(),
            email: invite.email,
            community_name,
            role: invite.role,
        })
    }

    /// Withdraws an invitation early. `permanent` deletes the row outright;
    /// otherwise the invite is soft-cancelled by setting its expired flag,
    /// which keeps it auditable.
    pub async fn cancel_invite(
        &self,
        invite_id: Uuid,
        cancelled_by: Uuid,
        permanent: bool,
    ) -> Result<()> {
        let mut tx = self.db.begin().await?;

        let invite = sqlx::query_as::<_, Invite>(&format!(
            "SELECT {INVITE_COLUMNS} FROM invites WHERE id = ?"
        ))
        .bind(invite_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::not_found("invite", invite_id))?;

        activity::record(
            &mut tx,
            cancelled_by,
            invite.community_id,
            kind::INVITE_CANCELLED,
            &format!(
                "Invitation for {} {}",
                invite.email,
                if permanent { "deleted" } else { "invalidated" }
            ),
            None,
        )
        .await?;

        if permanent {
            sqlx::query("DELETE FROM invites WHERE id = ?")
                .bind(invite_id)
                .execute(&mut *tx)
                .await?;
        } else {
            sqlx::query("UPDATE invites SET is_expired = TRUE WHERE id = ?")
                .bind(invite_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn list_for_community(&self, community_id: Uuid) -> Result<Vec<Invite>> {
        let invites = sqlx::query_as::<_, Invite>(&format!(
            "SELECT {INVITE_COLUMNS} FROM invites WHERE community_id = ? ORDER BY created_at"
        ))
        .bind(community_id)
        .fetch_all(&self.db)
        .await?;

        Ok(invites)
    }

    /// Live invitations addressed to an email, for UI consumers and the
    /// bulk-import producer.
    pub async fn list_pending_for_email(&self, email: &str) -> Result<Vec<Invite>> {
        let invites = sqlx::query_as::<_, Invite>(&format!(
            "SELECT {INVITE_COLUMNS} FROM invites \
             WHERE email = ? COLLATE NOCASE AND is_used = FALSE AND is_expired = FALSE \
             ORDER BY created_at"
        ))
        .bind(email)
        .fetch_all(&self.db)
        .await?;

        Ok(invites)
    }

    fn dispatch_notification(&self, invite: &Invite, community_name: &str) {
        let notifier = Arc::clone(&self.notifier);
        let to = invite.email.clone();
        let subject = format!("Invitation to join {community_name}");
        let body = format!(
            "You have been invited to join {community_name}.\n\n\
             Use this token to accept the invitation: {}\n\n\
             This invitation will expire in {} days.",
            invite.token, self.ttl_days
        );

        tokio::spawn(async move {
            if let Err(e) = notifier.send(&to, &subject, &body).await {
                tracing::warn!(to = %to, error = %e, "failed to send invite notification");
            }
        });
    }
}
