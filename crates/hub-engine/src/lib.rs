//! CommunityHub membership and access-control engine
//!
//! Manages who belongs to a community, with what role, how outsiders gain
//! entry (invitations, join requests, join codes) and how entry is revoked
//! or escalated. Exposed as a library; HTTP handlers, bulk importers and
//! chat authorization checks call into [`state::AppState`].

pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod services;
pub mod state;

use anyhow::Result;

/// Create a fully wired engine: connect the pool, run migrations, build the
/// service set.
pub async fn create_engine(config: state::Config) -> Result<state::AppState> {
    let db_pool = db::init_pool(&config.database_url, config.max_connections).await?;
    db::run_migrations(&db_pool).await?;
    Ok(state::AppState::new(config, db_pool))
}
