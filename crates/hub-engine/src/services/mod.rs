pub mod activity;
pub mod community;
pub mod invite;
pub mod join_request;
pub mod membership;
pub mod moderator;
pub mod user;

pub use activity::ActivityService;
pub use community::{CommunityService, JoinOutcome};
pub use invite::InviteService;
pub use join_request::JoinRequestService;
pub use membership::MembershipService;
pub use moderator::ModeratorService;
pub use user::UserService;
