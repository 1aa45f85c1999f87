use crate::error::{Error, Result};
use crate::models::{Community, CreateCommunity, JoinRequest, Membership, Role, UpdateCommunity};
use crate::services::activity::{self, kind};
use crate::services::join_request::JoinRequestService;
use crate::services::membership::{self, MembershipService};
use chrono::Utc;
use rand::Rng;
use sqlx::SqlitePool;
use uuid::Uuid;

const COMMUNITY_COLUMNS: &str =
    "id, name, description, is_private, join_code, is_active, created_at, updated_at";

/// Child tables emptied, in order, before a community row is deleted.
/// Kept as an explicit list so the dependency order stays auditable:
/// children always go before their parents.
pub const CASCADE_STEPS: &[&str] = &[
    "DELETE FROM activities WHERE community_id = ?",
    "DELETE FROM dm_messages WHERE community_id = ?",
    "DELETE FROM invites WHERE community_id = ?",
    "DELETE FROM join_requests WHERE community_id = ?",
    "DELETE FROM announcements WHERE community_id = ?",
    "DELETE FROM group_chats WHERE community_id = ?",
    "DELETE FROM channels WHERE community_id = ?",
    "DELETE FROM moderator_permissions WHERE membership_id IN \
     (SELECT id FROM memberships WHERE community_id = ?)",
    "DELETE FROM memberships WHERE community_id = ?",
];

/// Which path a join-by-code attempt took.
#[derive(Debug, Clone)]
pub enum JoinOutcome {
    /// Public community: the caller became a MEMBER immediately.
    Joined(Membership),
    /// Private community: a join request is pending review.
    Requested(JoinRequest),
}

#[derive(Clone)]
pub struct CommunityService {
    db: SqlitePool,
    memberships: MembershipService,
    join_requests: JoinRequestService,
}

impl CommunityService {
    pub fn new(db: SqlitePool) -> Self {
        let memberships = MembershipService::new(db.clone());
        let join_requests = JoinRequestService::new(db.clone());
        Self {
            db,
            memberships,
            join_requests,
        }
    }

    /// Creates a community and atomically grants the creator an
    /// ADMINISTRATOR membership.
    pub async fn create(&self, input: CreateCommunity, creator_id: Uuid) -> Result<Community> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let community = sqlx::query_as::<_, Community>(&format!(
            r#"
            INSERT INTO communities (id, name, description, is_private, join_code, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, TRUE, ?, ?)
            RETURNING {COMMUNITY_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.is_private)
        .bind(generate_join_code())
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        membership::insert_membership(&mut tx, creator_id, community.id, Role::Administrator)
            .await?;
        activity::record(
            &mut tx,
            creator_id,
            community.id,
            kind::COMMUNITY_CREATED,
            &format!("Created community {}", community.name),
            None,
        )
        .await?;

        tx.commit().await?;
        Ok(community)
    }

    pub async fn get(&self, id: Uuid) -> Result<Community> {
        let community = sqlx::query_as::<_, Community>(&format!(
            "SELECT {COMMUNITY_COLUMNS} FROM communities WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| Error::not_found("community", id))?;

        Ok(community)
    }

    pub async fn get_by_join_code(&self, join_code: &str) -> Result<Community> {
        let community = sqlx::query_as::<_, Community>(&format!(
            "SELECT {COMMUNITY_COLUMNS} FROM communities WHERE join_code = ?"
        ))
        .bind(join_code)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| Error::not_found("community", join_code))?;

        Ok(community)
    }

    /// Communities the user belongs to.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Community>> {
        let communities = sqlx::query_as::<_, Community>(
            r#"
            SELECT c.id, c.name, c.description, c.is_private, c.join_code, c.is_active, c.created_at, c.updated_at
            FROM communities c
            INNER JOIN memberships m ON c.id = m.community_id
            WHERE m.user_id = ?
            ORDER BY c.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(communities)
    }

    pub async fn update(&self, id: Uuid, input: UpdateCommunity) -> Result<Community> {
        let updated = sqlx::query_as::<_, Community>(&format!(
            r#"
            UPDATE communities
            SET name = COALESCE(?, name),
                description = COALESCE(?, description),
                is_private = COALESCE(?, is_private),
                updated_at = ?
            WHERE id = ?
            RETURNING {COMMUNITY_COLUMNS}
            "#
        ))
        .bind(input.name)
        .bind(input.description)
        .bind(input.is_private)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| Error::not_found("community", id))?;

        Ok(updated)
    }

    /// Deletes a community and every dependent record in one transaction,
    /// walking `CASCADE_STEPS` children-first.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tx = self.db.begin().await?;

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM communities WHERE id = ?)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if !exists {
            return Err(Error::not_found("community", id));
        }

        for step in CASCADE_STEPS {
            sqlx::query(step).bind(id).execute(&mut *tx).await?;
        }
        sqlx::query("DELETE FROM communities WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(community_id = %id, "community deleted with cascade");
        Ok(())
    }

    /// Join-by-code flow: public communities grant an immediate MEMBER
    /// membership; private communities open a pending join request.
    pub async fn join(
        &self,
        join_code: &str,
        user_id: Uuid,
        message: Option<String>,
    ) -> Result<JoinOutcome> {
        let community = self.get_by_join_code(join_code).await?;

        if self.memberships.is_member(user_id, community.id).await? {
            return Err(Error::AlreadyMember {
                user_id,
                community_id: community.id,
            });
        }

        if !community.is_private {
            let mut tx = self.db.begin().await?;
            let membership =
                membership::insert_membership(&mut tx, user_id, community.id, Role::Member).await?;
            activity::record(
                &mut tx,
                user_id,
                community.id,
                kind::MEMBER_JOINED,
                "Joined via join code",
                None,
            )
            .await?;
            tx.commit().await?;
            Ok(JoinOutcome::Joined(membership))
        } else {
            let request = self
                .join_requests
                .submit(user_id, community.id, message)
                .await?;
            Ok(JoinOutcome::Requested(request))
        }
    }
}

fn generate_join_code() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(8)
        .map(char::from)
        .collect()
}
