use anyhow::Result;
use clap::Parser;
use droidwatch_server::{api, channel, config, db, service, session, telemetry};
use std::sync::Arc;
use tracing::{info, warn};

/// Droidwatch — Android package identity & device telemetry server.
#[derive(Parser, Debug)]
#[command(name = "droidwatch-server", version, about)]
struct Cli {
    /// Address and port to listen on.
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Path to the SQLite database file.
    #[arg(short, long, default_value = "droidwatch.db")]
    db: String,

    /// Path to a TOML configuration file (optional).
    #[arg(short, long)]
    config: Option<String>,

    /// Device serial, overrides `device.serial` from the config file.
    #[arg(short, long)]
    serial: Option<String>,

    /// Path to the adb binary, overrides `device.adb_path`.
    #[arg(long)]
    adb: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (logs).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "droidwatch_server=debug,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Droidwatch server"
    );

    // Load optional config file; CLI flags win.
    let mut app_config = if let Some(ref path) = cli.config {
        config::AppConfig::from_file(path)?
    } else {
        config::AppConfig::default()
    };
    if let Some(serial) = cli.serial {
        app_config.device.serial = Some(serial);
    }
    if let Some(adb) = cli.adb {
        app_config.device.adb_path = adb;
    }
    app_config.validate()?;

    // A missing database is not fatal: telemetry runs in degraded mode.
    let pool = match db::init(&cli.db).await {
        Ok(pool) => {
            info!(path = %cli.db, "Database initialized");
            Some(pool)
        }
        Err(e) => {
            warn!(path = %cli.db, "Database unavailable, continuing without persistence: {e}");
            None
        }
    };

    let device = Arc::new(channel::AdbChannel::new(&app_config.device));
    info!(
        adb = %app_config.device.adb_path,
        serial = app_config.device.serial.as_deref().unwrap_or("<default>"),
        "Device channel configured"
    );

    let store = Arc::new(telemetry::TelemetryStore::new(pool));
    info!(durable = store.is_durable(), "Telemetry store ready");

    let service = service::DeviceService::new(
        device,
        store,
        Arc::new(session::SessionManager::new()),
        &app_config,
    );
    let app = api::router(api::AppState::new(service));

    // Start listening.
    let listener = tokio::net::TcpListener::bind(&cli.listen).await?;
    info!(addr = %cli.listen, "Listening");

    axum::serve(listener, app).await?;

    Ok(())
}
