use crate::error::{self, Error, Result};
use crate::models::{MemberDetails, Membership, Role};
use crate::services::activity::{self, kind};
use chrono::Utc;
use serde_json::json;
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use uuid::Uuid;

const MEMBERSHIP_COLUMNS: &str = "id, user_id, community_id, role, is_active, joined_at, updated_at";

/// Inserts a membership row on the caller's connection. The unique index on
/// (user_id, community_id) is the final arbiter: a concurrent duplicate
/// surfaces as `DuplicateMembership`, never as a second row.
pub(crate) async fn insert_membership(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    community_id: Uuid,
    role: Role,
) -> Result<Membership> {
    let now = Utc::now();
    let membership = sqlx::query_as::<_, Membership>(
        r#"
        INSERT INTO memberships (id, user_id, community_id, role, is_active, joined_at, updated_at)
        VALUES (?, ?, ?, ?, TRUE, ?, ?)
        RETURNING id, user_id, community_id, role, is_active, joined_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(community_id)
    .bind(role)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        error::on_unique_violation(
            e,
            Error::DuplicateMembership {
                user_id,
                community_id,
            },
        )
    })?;

    Ok(membership)
}

pub(crate) async fn count_active_administrators<'e, E>(
    executor: E,
    community_id: Uuid,
) -> Result<i64>
where
    E: SqliteExecutor<'e>,
{
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM memberships
        WHERE community_id = ? AND role = 'ADMINISTRATOR' AND is_active = TRUE
        "#,
    )
    .bind(community_id)
    .fetch_one(executor)
    .await?;

    Ok(count)
}

/// Single source of truth for "does user X have role R in community C".
/// Every other component, and every external caller, goes through these
/// predicates instead of re-implementing role comparison.
#[derive(Clone)]
pub struct MembershipService {
    db: SqlitePool,
}

impl MembershipService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn get(&self, membership_id: Uuid) -> Result<Membership> {
        let membership = sqlx::query_as::<_, Membership>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE id = ?"
        ))
        .bind(membership_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| Error::not_found("membership", membership_id))?;

        Ok(membership)
    }

    pub async fn get_by_user_and_community(
        &self,
        user_id: Uuid,
        community_id: Uuid,
    ) -> Result<Option<Membership>> {
        let membership = sqlx::query_as::<_, Membership>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE user_id = ? AND community_id = ?"
        ))
        .bind(user_id)
        .bind(community_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(membership)
    }

    pub async fn is_member(&self, user_id: Uuid, community_id: Uuid) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM memberships WHERE user_id = ? AND community_id = ?)",
        )
        .bind(user_id)
        .bind(community_id)
        .fetch_one(&self.db)
        .await?;

        Ok(exists)
    }

    pub async fn is_administrator(&self, user_id: Uuid, community_id: Uuid) -> Result<bool> {
        Ok(self
            .get_by_user_and_community(user_id, community_id)
            .await?
            .is_some_and(|m| m.role == Role::Administrator))
    }

    pub async fn is_moderator(&self, user_id: Uuid, community_id: Uuid) -> Result<bool> {
        Ok(self
            .get_by_user_and_community(user_id, community_id)
            .await?
            .is_some_and(|m| m.role == Role::Moderator))
    }

    pub async fn is_admin_or_moderator(&self, user_id: Uuid, community_id: Uuid) -> Result<bool> {
        Ok(self
            .get_by_user_and_community(user_id, community_id)
            .await?
            .is_some_and(|m| matches!(m.role, Role::Administrator | Role::Moderator)))
    }

    /// Direct membership creation (admin "add member" and the public
    /// join-by-code path go through here).
    pub async fn create_membership(
        &self,
        user_id: Uuid,
        community_id: Uuid,
        role: Role,
    ) -> Result<Membership> {
        let mut tx = self.db.begin().await?;

        let membership = insert_membership(&mut tx, user_id, community_id, role).await?;
        activity::record(
            &mut tx,
            user_id,
            community_id,
            kind::MEMBER_ADDED,
            &format!("Added as {}", role.as_str()),
            None,
        )
        .await?;

        tx.commit().await?;
        Ok(membership)
    }

    /// Any role transition is allowed here. The last-administrator rule is
    /// enforced on removal; callers demoting an administrator consult
    /// `count_active_administrators` first.
    pub async fn change_role(&self, membership_id: Uuid, new_role: Role) -> Result<Membership> {
        let mut tx = self.db.begin().await?;

        let current = sqlx::query_as::<_, Membership>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE id = ?"
        ))
        .bind(membership_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::not_found("membership", membership_id))?;

        let updated = sqlx::query_as::<_, Membership>(&format!(
            "UPDATE memberships SET role = ?, updated_at = ? WHERE id = ? RETURNING {MEMBERSHIP_COLUMNS}"
        ))
        .bind(new_role)
        .bind(Utc::now())
        .bind(membership_id)
        .fetch_one(&mut *tx)
        .await?;

        activity::record(
            &mut tx,
            current.user_id,
            current.community_id,
            kind::ROLE_CHANGED,
            &format!(
                "Role changed from {} to {}",
                current.role.as_str(),
                new_role.as_str()
            ),
            Some(json!({ "from": current.role, "to": new_role }).to_string()),
        )
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Removes a membership (leave or kick). Fails with `LastAdministrator`
    /// when the community would be left without an active administrator;
    /// the check runs inside the same transaction as the delete.
    pub async fn remove_membership(&self, membership_id: Uuid) -> Result<()> {
        let mut tx = self.db.begin().await?;

        let membership = sqlx::query_as::<_, Membership>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE id = ?"
        ))
        .bind(membership_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::not_found("membership", membership_id))?;

        if membership.role == Role::Administrator && membership.is_active {
            let admins = count_active_administrators(&mut *tx, membership.community_id).await?;
            if admins <= 1 {
                return Err(Error::LastAdministrator {
                    membership_id,
                    community_id: membership.community_id,
                });
            }
        }

        activity::record(
            &mut tx,
            membership.user_id,
            membership.community_id,
            kind::MEMBER_REMOVED,
            "Removed from community",
            None,
        )
        .await?;

        sqlx::query("DELETE FROM moderator_permissions WHERE membership_id = ?")
            .bind(membership_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM memberships WHERE id = ?")
            .bind(membership_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn member_count(&self, community_id: Uuid, active_only: bool) -> Result<i64> {
        let sql = if active_only {
            "SELECT COUNT(*) FROM memberships WHERE community_id = ? AND is_active = TRUE"
        } else {
            "SELECT COUNT(*) FROM memberships WHERE community_id = ?"
        };

        let count = sqlx::query_scalar::<_, i64>(sql)
            .bind(community_id)
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }

    pub async fn count_active_administrators(&self, community_id: Uuid) -> Result<i64> {
        count_active_administrators(&self.db, community_id).await
    }

    pub async fn list_members(&self, community_id: Uuid) -> Result<Vec<MemberDetails>> {
        let members = sqlx::query_as::<_, MemberDetails>(
            r#"
            SELECT m.id, m.user_id, u.email, u.display_name, m.role, m.is_active, m.joined_at
            FROM memberships m
            INNER JOIN users u ON u.id = m.user_id
            WHERE m.community_id = ?
            ORDER BY u.display_name
            "#,
        )
        .bind(community_id)
        .fetch_all(&self.db)
        .await?;

        Ok(members)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Membership>> {
        let memberships = sqlx::query_as::<_, Membership>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE user_id = ? ORDER BY joined_at"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(memberships)
    }
}
