use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Maintenance entry point: prepares the database (creates it if missing and
/// applies pending migrations) so an embedding server can start serving.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hub_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = hub_engine::state::Config::load()?;

    let db_pool = hub_engine::db::init_pool(&config.database_url, config.max_connections).await?;
    hub_engine::db::run_migrations(&db_pool).await?;

    tracing::info!(database_url = %config.database_url, "engine database ready");
    Ok(())
}
