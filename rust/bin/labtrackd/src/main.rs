//! `labtrackd`: the LabTrack server binary.
//!
//! Usage:
//!   labtrackd -c <context-name-or-path> [--listen <addr>]
//!
//! The context name resolves to `/etc/labtrack/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

mod auth_middleware;
mod bootstrap;
mod config;
mod login;
mod routes;

use std::sync::Arc;

use clap::Parser;
use labtrack_core::Module;
use tracing::info;

use auth_middleware::JwtState;
use config::ServerConfig;
use routes::AppState;

/// LabTrack server.
#[derive(Parser, Debug)]
#[command(name = "labtrackd", about = "LabTrack lab asset server")]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: String,

    /// Listen address (overrides `[server] listen`).
    #[arg(long = "listen")]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config_path = ServerConfig::resolve_path(&cli.config);
    info!("Loading configuration from {}", config_path.display());
    let server_config = ServerConfig::load(&config_path)?;
    bootstrap::verify_config(&server_config)?;

    let data_dir = std::path::PathBuf::from(&server_config.storage.data_dir);
    std::fs::create_dir_all(&data_dir)?;

    let core_config = labtrack_core::ServiceConfig {
        data_dir: Some(data_dir),
        listen: cli
            .listen
            .clone()
            .unwrap_or_else(|| server_config.server.listen.clone()),
        change_buffer: server_config.storage.change_buffer.max(1),
        ..Default::default()
    };

    let sql: Arc<dyn labtrack_sql::SQLStore> = Arc::new(
        labtrack_sql::SqliteStore::open(&core_config.resolve_sqlite_path())
            .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?,
    );
    let feed = Arc::new(labtrack_store::ChangeFeed::new(core_config.change_buffer));

    let lab_module = lab::LabModule::new(Arc::clone(&sql), feed)?;
    info!("Lab module initialized");

    let app_state = AppState {
        jwt_state: Arc::new(JwtState::new(&server_config.jwt.secret)),
        server_config: Arc::new(server_config),
        lab: Arc::clone(lab_module.service()),
    };

    let module_routes = vec![(lab_module.name(), lab_module.routes())];
    let app = routes::build_router(app_state, module_routes);

    let listener = tokio::net::TcpListener::bind(&core_config.listen).await?;
    info!("LabTrack server listening on {}", core_config.listen);
    axum::serve(listener, app).await?;

    Ok(())
}
