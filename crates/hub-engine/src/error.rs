use thiserror::Error;
use uuid::Uuid;

/// Expected, recoverable outcomes of the access-control operations, plus the
/// infrastructure failures that callers must be able to tell apart from them.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("user {user_id} is already a member of community {community_id}")]
    DuplicateMembership { user_id: Uuid, community_id: Uuid },

    #[error("membership {membership_id} is the last active administrator of community {community_id}")]
    LastAdministrator {
        membership_id: Uuid,
        community_id: Uuid,
    },

    #[error("join request {request_id} has already been reviewed ({status})")]
    AlreadyReviewed { request_id: Uuid, status: String },

    #[error("invalid invitation token")]
    InvalidToken,

    #[error("invitation {invite_id} has already been used")]
    InviteAlreadyUsed { invite_id: Uuid },

    #[error("invitation {invite_id} has expired")]
    InviteExpired { invite_id: Uuid },

    #[error("invitation {invite_id} was issued to a different email address")]
    EmailMismatch { invite_id: Uuid },

    #[error("user {user_id} is already a member of community {community_id}")]
    AlreadyMember { user_id: Uuid, community_id: Uuid },

    #[error("an invitation for {email} in community {community_id} is already outstanding")]
    DuplicateInvite { email: String, community_id: Uuid },

    #[error("membership {membership_id} does not have the MODERATOR role")]
    NotAModerator { membership_id: Uuid },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// True for the domain outcomes of §4 operations, false for
    /// infrastructure failures ("the system is unavailable").
    pub fn is_domain(&self) -> bool {
        !matches!(self, Error::Database(_) | Error::Internal(_))
    }
}

/// Maps a store-level unique violation onto the domain error that the unique
/// index stands in for. Check-then-act races end up here, so the constraint
/// is the final arbiter, not the pre-check.
pub(crate) fn on_unique_violation(err: sqlx::Error, domain: Error) -> Error {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => domain,
        other => Error::Database(other),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
