use crate::error::{Error, Result};
use crate::models::{Capability, MemberDetails, ModeratorPermission, PermissionFlags, Role};
use crate::services::activity::{self, kind};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

const PERMISSION_COLUMNS: &str = "id, membership_id, can_approve_join_requests, can_add_members, \
     can_remove_members, can_manage_channels, can_delete_messages, can_create_announcements, \
     can_manage_group_chats, can_view_audit_logs, updated_at";

/// Fine-grained capability flags delegated to MODERATOR-role memberships.
#[derive(Clone)]
pub struct ModeratorService {
    db: SqlitePool,
}

impl ModeratorService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Sets all eight flags wholesale. The permission record is created
    /// lazily on first update; the upsert keys on membership_id so two
    /// concurrent first updates cannot both create a row.
    pub async fn update_permissions(
        &self,
        membership_id: Uuid,
        flags: PermissionFlags,
    ) -> Result<ModeratorPermission> {
        let mut tx = self.db.begin().await?;

        let membership = sqlx::query_as::<_, (Uuid, Uuid, Role)>(
            "SELECT user_id, community_id, role FROM memberships WHERE id = ?",
        )
        .bind(membership_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::not_found("membership", membership_id))?;

        let (user_id, community_id, role) = membership;
        if role != Role::Moderator {
            return Err(Error::NotAModerator { membership_id });
        }

        let permission = sqlx::query_as::<_, ModeratorPermission>(&format!(
            r#"
            INSERT INTO moderator_permissions (
                id, membership_id, can_approve_join_requests, can_add_members,
                can_remove_members, can_manage_channels, can_delete_messages,
                can_create_announcements, can_manage_group_chats, can_view_audit_logs,
                updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (membership_id) DO UPDATE SET
                can_approve_join_requests = excluded.can_approve_join_requests,
                can_add_members = excluded.can_add_members,
                can_remove_members = excluded.can_remove_members,
                can_manage_channels = excluded.can_manage_channels,
                can_delete_messages = excluded.can_delete_messages,
                can_create_announcements = excluded.can_create_announcements,
                can_manage_group_chats = excluded.can_manage_group_chats,
                can_view_audit_logs = excluded.can_view_audit_logs,
                updated_at = excluded.updated_at
            RETURNING {PERMISSION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(membership_id)
        .bind(flags.can_approve_join_requests)
        .bind(flags.can_add_members)
        .bind(flags.can_remove_members)
        .bind(flags.can_manage_channels)
        .bind(flags.can_delete_messages)
        .bind(flags.can_create_announcements)
        .bind(flags.can_manage_group_chats)
        .bind(flags.can_view_audit_logs)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        activity::record(
            &mut tx,
            user_id,
            community_id,
            kind::PERMISSIONS_UPDATED,
            "Moderator permissions updated",
            Some(serde_json::to_string(&flags).map_err(anyhow::Error::from)?),
        )
        .await?;

        tx.commit().await?;
        Ok(permission)
    }

    /// Current flag set for a membership; all false when no record exists.
    pub async fn get_permissions(&self, membership_id: Uuid) -> Result<PermissionFlags> {
        let record = self.find_record(membership_id).await?;
        Ok(record.as_ref().map(PermissionFlags::from).unwrap_or_default())
    }

    /// The single capability read used by authorization checks elsewhere.
    pub async fn has_capability(
        &self,
        membership_id: Uuid,
        capability: Capability,
    ) -> Result<bool> {
        let record = self.find_record(membership_id).await?;
        Ok(record.map(|r| r.allows(capability)).unwrap_or(false))
    }

    pub async fn list_moderators(&self, community_id: Uuid) -> Result<Vec<MemberDetails>> {
        let moderators = sqlx::query_as::<_, MemberDetails>(
            r#"
            SELECT m.id, m.user_id, u.email, u.display_name, m.role, m.is_active, m.joined_at
            FROM memberships m
            INNER JOIN users u ON u.id = m.user_id
            WHERE m.community_id = ? AND m.role = 'MODERATOR'
            ORDER BY u.display_name
            "#,
        )
        .bind(community_id)
        .fetch_all(&self.db)
        .await?;

        Ok(moderators)
    }

    async fn find_record(&self, membership_id: Uuid) -> Result<Option<ModeratorPermission>> {
        let record = sqlx::query_as::<_, ModeratorPermission>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM moderator_permissions WHERE membership_id = ?"
        ))
        .bind(membership_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(record)
    }
}
