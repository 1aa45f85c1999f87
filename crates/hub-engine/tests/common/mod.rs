//! Shared setup for the integration tests: every test gets its own
//! in-memory SQLite engine with migrations applied.
#![allow(dead_code)]

use hub_engine::models::{Community, CreateCommunity, User};
use hub_engine::state::{AppState, Config};
use hub_engine::{db, notify::Notifier};
use std::sync::Arc;

pub async fn test_state() -> AppState {
    test_state_with_notifier(Arc::new(hub_engine::notify::LogNotifier)).await
}

pub async fn test_state_with_notifier(notifier: Arc<dyn Notifier>) -> AppState {
    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        max_connections: 1,
        invite_ttl_days: 7,
    };

    let pool = db::init_pool(&config.database_url, config.max_connections)
        .await
        .expect("failed to open in-memory database");
    db::run_migrations(&pool)
        .await
        .expect("failed to run migrations");

    AppState::with_notifier(config, pool, notifier)
}

pub async fn create_user(state: &AppState, email: &str, name: &str) -> User {
    state
        .users
        .create(email, name)
        .await
        .expect("failed to create user")
}

pub async fn create_community(
    state: &AppState,
    creator: &User,
    name: &str,
    is_private: bool,
) -> Community {
    state
        .communities
        .create(
            CreateCommunity {
                name: name.to_string(),
                description: None,
                is_private,
            },
            creator.id,
        )
        .await
        .expect("failed to create community")
}
