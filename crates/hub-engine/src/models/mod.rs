mod activity;
mod community;
mod invite;
mod join_request;
mod membership;
mod moderator;
mod user;

pub use activity::Activity;
pub use community::{Community, CreateCommunity, UpdateCommunity};
pub use invite::{Invite, InviteValidation};
pub use join_request::{JoinRequest, RequestStatus};
pub use membership::{MemberDetails, Membership, Role};
pub use moderator::{Capability, ModeratorPermission, PermissionFlags};
pub use user::User;
