use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use vee_core::config::PostgresConfig;

/// Open a connection pool for the configured database.
pub async fn connect(config: &PostgresConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.connection_string())
        .await?;
    info!("PostgreSQL connected: {}/{}", config.host, config.database);
    Ok(pool)
}

/// Apply pending schema migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    info!("Database migrations applied successfully");
    Ok(())
}

/// Connect and migrate. Returns `None` when PostgreSQL is not configured.
pub async fn init_pg_pool(config: &PostgresConfig) -> anyhow::Result<Option<PgPool>> {
    if !config.is_configured() {
        warn!("PostgreSQL not configured, rules are kept in memory only");
        return Ok(None);
    }
    let pool = connect(config).await?;
    migrate(&pool).await?;
    Ok(Some(pool))
}
