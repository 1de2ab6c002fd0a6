//! Campus Market gateway
//!
//! ```text
//! campus_market [--env dev|prod] [--port N]
//! ```
//!
//! With `postgres_url` configured (or `DATABASE_URL` set) the stores run on
//! PostgreSQL, otherwise everything lives in memory.

use std::sync::Arc;

use anyhow::Context;

use campus_market::config::AppConfig;
use campus_market::db::Database;
use campus_market::gateway::{self, state::AppState};
use campus_market::logging::init_logging;
use campus_market::notify::Notifier;
use campus_market::settlement::SettlementCoordinator;
use campus_market::store::MarketStores;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut app_config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        app_config.gateway.port = port;
    }
    let _log_guard = init_logging(&app_config);

    tracing::info!(
        env = %env,
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        "Starting Campus Market"
    );

    let (stores, pg_db) = match app_config.postgres_url.as_deref() {
        Some(url) => {
            let db = Database::connect(url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            db.ensure_schema()
                .await
                .context("Failed to apply schema")?;
            let stores = MarketStores::postgres(db.pool().clone());
            (stores, Some(Arc::new(db)))
        }
        None => {
            tracing::warn!("No postgres_url configured, using in-memory stores");
            (MarketStores::in_memory(), None)
        }
    };

    let notifier = Notifier::from_config(&app_config.notification)
        .context("Failed to build notification channels")?;

    let coordinator = Arc::new(SettlementCoordinator::new(stores, Arc::new(notifier)));
    let state = Arc::new(AppState::new(coordinator, pg_db));

    gateway::run_server(&app_config.gateway, state).await?;
    Ok(())
}
