use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use homesite::auth::session;
use homesite::config::{Cli, Config};
use homesite::db;
use homesite::mail::MailManager;
use homesite::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let db_path = config.db_path().context("no database path configured")?;
    let pool = db::create_pool(db_path)?;
    db::run_migrations(&pool)?;

    if let Some(password) = db::ensure_admin(&pool, config.auth.bcrypt_cost)? {
        tracing::warn!(
            login = db::BOOTSTRAP_ADMIN_LOGIN,
            %password,
            "no user manager found, created administrator account; change this password"
        );
    }

    let purged = session::purge_expired(&pool)?;
    if purged > 0 {
        tracing::info!("Purged {} expired sessions", purged);
    }

    let mail = MailManager::new(&config);
    if !mail.delivers() {
        tracing::warn!(
            "mail.spool_dir is not set: notifications are only logged, so generated \
             passwords never reach their users"
        );
    }

    // Build app state
    let state = AppState {
        db: pool,
        mail,
        config: config.clone(),
    };

    let app = homesite::app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid listen address")?;
    tracing::info!("Homesite listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
