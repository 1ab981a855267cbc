mod api;
mod db;
mod pg_store;
mod router;
mod state;

use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use vee_rules::catalog::Catalog;
use vee_rules::{MemoryStore, Store};

use crate::pg_store::PgRuleStore;
use crate::state::AppState;

fn load_config() -> vee_core::Config {
    vee_core::config::load_dotenv();
    vee_core::Config::from_env()
}

async fn serve(config: &vee_core::Config, catalog: Option<&Path>) -> anyhow::Result<()> {
    config.log_summary();
    config.engine.validate()?;

    let (store, backend): (Arc<dyn Store>, &'static str) =
        match db::init_pg_pool(&config.postgres).await? {
            Some(pool) => (Arc::new(PgRuleStore::new(pool)) as Arc<dyn Store>, "postgres"),
            None => {
                let store = match catalog {
                    Some(path) => Catalog::load(path)?.into_store(),
                    None => MemoryStore::new(),
                };
                (Arc::new(store) as Arc<dyn Store>, "memory")
            }
        };

    let state = Arc::new(AppState::new(config.clone(), store, backend));
    let app = router::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{} (store: {})", addr, backend);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn migrate(config: &vee_core::Config) -> anyhow::Result<()> {
    if !config.postgres.is_configured() {
        anyhow::bail!("migrate requires PostgreSQL configuration (DATABASE_URL or PG_HOST, PG_USERNAME, ...)");
    }
    let pool = db::connect(&config.postgres).await?;
    db::migrate(&pool).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let config = load_config();
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        None | Some("serve") => {
            let catalog = args.get(2).map(Path::new);
            serve(&config, catalog).await?;
        }
        Some("migrate") => migrate(&config).await?,
        _ => {
            println!("vee-server v0.1.0");
            println!("Usage: vee-server <command>");
            println!("  serve [catalog.yml]   Start HTTP server (catalog seeds the in-memory store when PostgreSQL is not configured)");
            println!("  migrate               Apply database migrations and exit");
        }
    }

    Ok(())
}
