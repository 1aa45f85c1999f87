use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Capability flags attached to a MODERATOR-role membership. Created lazily
/// on the first permission update; a moderator without a record has every
/// capability false.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ModeratorPermission {
    pub id: Uuid,
    pub membership_id: Uuid,
    pub can_approve_join_requests: bool,
    pub can_add_members: bool,
    pub can_remove_members: bool,
    pub can_manage_channels: bool,
    pub can_delete_messages: bool,
    pub can_create_announcements: bool,
    pub can_manage_group_chats: bool,
    pub can_view_audit_logs: bool,
    pub updated_at: DateTime<Utc>,
}

/// The full flag set supplied on every update. Flags are written wholesale:
/// anything left `false` here is stored as `false`, not "unchanged".
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionFlags {
    pub can_approve_join_requests: bool,
    pub can_add_members: bool,
    pub can_remove_members: bool,
    pub can_manage_channels: bool,
    pub can_delete_messages: bool,
    pub can_create_announcements: bool,
    pub can_manage_group_chats: bool,
    pub can_view_audit_logs: bool,
}

/// A single capability, used for authorization reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ApproveJoinRequests,
    AddMembers,
    RemoveMembers,
    ManageChannels,
    DeleteMessages,
    CreateAnnouncements,
    ManageGroupChats,
    ViewAuditLogs,
}

impl From<&ModeratorPermission> for PermissionFlags {
    fn from(p: &ModeratorPermission) -> Self {
        PermissionFlags {
            can_approve_join_requests: p.can_approve_join_requests,
            can_add_members: p.can_add_members,
            can_remove_members: p.can_remove_members,
            can_manage_channels: p.can_manage_channels,
            can_delete_messages: p.can_delete_messages,
            can_create_announcements: p.can_create_announcements,
            can_manage_group_chats: p.can_manage_group_chats,
            can_view_audit_logs: p.can_view_audit_logs,
        }
    }
}

impl ModeratorPermission {
    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::ApproveJoinRequests => self.can_approve_join_requests,
            Capability::AddMembers => self.can_add_members,
            Capability::RemoveMembers => self.can_remove_members,
            Capability::ManageChannels => self.can_manage_channels,
            Capability::DeleteMessages => self.can_delete_messages,
            Capability::CreateAnnouncements => self.can_create_announcements,
            Capability::ManageGroupChats => self.can_manage_group_chats,
            Capability::ViewAuditLogs => self.can_view_audit_logs,
        }
    }
}
