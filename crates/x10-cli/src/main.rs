//! x10-bridge: HTTP gateway to an X10 power-line interface.
//!
//! Opens the configured serial bridge (or an in-process emulated one),
//! then serves the two-route JSON API over it.

mod config;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use x10_driver::{
    Backend, DeviceRegistry, ProtocolEngine, RadioController, Transport, X10Controller,
};
use x10_emulator::BridgeEmulator;

use config::{Args, BackendKind, ConfigFile, Settings};

/// Registry name for the in-process emulated bridge.
const EMULATED_PORT: &str = "emulated-0";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if args.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Explicit config path wins; otherwise pick up x10-bridge.toml if present
    let config_path = args.config.clone().or_else(|| {
        let default = PathBuf::from("x10-bridge.toml");
        default.exists().then_some(default)
    });
    let file = match &config_path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            let file: ConfigFile = toml::from_str(&contents)
                .with_context(|| format!("parsing config file {}", path.display()))?;
            info!("Loaded config from {}", path.display());
            file
        }
        None => ConfigFile::default(),
    };
    let settings = Settings::resolve(&args, &file)?;

    info!(
        "Starting x10 bridge with the {} backend on {}, monitoring house {}",
        settings.backend, settings.listen, settings.monitored_house
    );

    let registry = DeviceRegistry::new(settings.monitored_house);
    let backend = build_backend(&registry, &settings).await?;
    backend.initialize().await?;

    x10_web::serve(settings.listen, backend).await?;
    Ok(())
}

async fn build_backend(registry: &DeviceRegistry, settings: &Settings) -> anyhow::Result<Backend> {
    match settings.backend {
        BackendKind::Serial => {
            let device = registry
                .acquire(&settings.port)
                .await
                .with_context(|| format!("opening serial bridge on {}", settings.port))?;
            Ok(Backend::Serial(device))
        }
        BackendKind::Emulated => {
            let (transport, mut handle) = Transport::mock();
            let stream = handle.take_stream().context("mock stream already taken")?;
            tokio::spawn(async move {
                match BridgeEmulator::new(stream).run().await {
                    Ok(events) => debug!("Emulated bridge wound down after {} events", events.len()),
                    Err(err) => warn!("Emulated bridge failed: {}", err),
                }
            });
            let engine = ProtocolEngine::new(transport, settings.monitored_house);
            let device = registry.adopt(EMULATED_PORT, engine).await?;
            info!("Emulated bridge running in-process");
            Ok(Backend::Serial(device))
        }
        BackendKind::Radio => Ok(Backend::Radio(RadioController::new())),
    }
}
