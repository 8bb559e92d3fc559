use std::path::PathBuf;

use clap::Parser;
use lumen_hub::{
    api::api_router,
    config::{Config, RegistryConfig},
    mqtt::{self, MqttService},
    registry::{DeviceRegistry, memory::InMemoryDeviceRegistry, sqlite::SqliteDeviceRegistry},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "lumen-hub")]
#[command(about = "Lumen device hub")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "lumen-hub.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        info!(path = ?cli.config, "Loading configuration");
        Config::load(&cli.config)?
    } else {
        info!("No configuration file found, using defaults");
        Config::default()
    };

    info!(
        http_addr = %config.server.http_addr,
        broker = %config.mqtt.host,
        "Starting lumen-hub"
    );

    match config.registry.clone() {
        RegistryConfig::Memory => {
            info!("Using in-memory device registry");
            run_server(InMemoryDeviceRegistry::new(), &config).await?;
        }
        RegistryConfig::Sqlite { path } => {
            info!(path = ?path, "Using SQLite device registry");
            let registry = SqliteDeviceRegistry::new(&path).await?;
            run_server(registry, &config).await?;
        }
    }

    Ok(())
}

async fn run_server<R>(registry: R, config: &Config) -> color_eyre::Result<()>
where
    R: DeviceRegistry,
{
    let cancel = CancellationToken::new();

    let (service, eventloop, state_tx) = MqttService::connect(&config.mqtt);
    let ingest = tokio::spawn(mqtt::ingest::run(
        service.clone(),
        eventloop,
        state_tx,
        registry.clone(),
        cancel.clone(),
    ));

    let app = api_router(registry, service);

    let listener = TcpListener::bind(config.server.http_addr).await?;
    info!(http_addr = %config.server.http_addr, "HTTP server listening");

    let cancel_clone = cancel.clone();
    tokio::select! {
        result = axum::serve(listener, app).with_graceful_shutdown(async move {
            cancel_clone.cancelled().await;
        }) => {
            if let Err(e) = result {
                tracing::error!(error = ?e, "HTTP server error");
            }
            info!("HTTP server shut down");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    cancel.cancel();
    let _ = ingest.await;

    Ok(())
}
