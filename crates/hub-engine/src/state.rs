use crate::notify::{LogNotifier, Notifier};
use crate::services::{
    ActivityService, CommunityService, InviteService, JoinRequestService, MembershipService,
    ModeratorService, UserService,
};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    /// Invitations expire this many days after creation.
    pub invite_ttl_days: i64,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:hub.db".to_string());

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        let invite_ttl_days = std::env::var("INVITE_TTL_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(7);

        Ok(Config {
            database_url,
            max_connections,
            invite_ttl_days,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: "sqlite:hub.db".to_string(),
            max_connections: 5,
            invite_ttl_days: 7,
        }
    }
}

/// Shared handle to the engine: the pool plus one instance of each service.
/// Cheap to clone; every caller (HTTP handlers, bulk importers, message
/// authorization checks) works through this.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: SqlitePool,
    pub users: UserService,
    pub communities: CommunityService,
    pub memberships: MembershipService,
    pub invites: InviteService,
    pub join_requests: JoinRequestService,
    pub moderators: ModeratorService,
    pub activities: ActivityService,
}

impl AppState {
    pub fn new(config: Config, db: SqlitePool) -> Self {
        Self::with_notifier(config, db, Arc::new(LogNotifier))
    }

    pub fn with_notifier(config: Config, db: SqlitePool, notifier: Arc<dyn Notifier>) -> Self {
        let users = UserService::new(db.clone());
        let communities = CommunityService::new(db.clone());
        let memberships = MembershipService::new(db.clone());
        let invites = InviteService::new(db.clone(), notifier, config.invite_ttl_days);
        let join_requests = JoinRequestService::new(db.clone());
        let moderators = ModeratorService::new(db.clone());
        let activities = ActivityService::new(db.clone());

        Self {
            config,
            db,
            users,
            communities,
            memberships,
            invites,
            join_requests,
            moderators,
            activities,
        }
    }
}
