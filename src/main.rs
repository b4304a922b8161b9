//! Serial-to-OSC bridge for Monome grid controllers (serialosc protocol)
//!
//! Usage:
//!   oc-bridge <tty-path>            Run the bridge against the given serial device
//!   oc-bridge <tty-path> -d         Run with debug logging
//!   oc-bridge <tty-path> --config <path>   Override installation defaults

use anyhow::{bail, Result};
use clap::Parser;
use monome_bridge::{bridge, cli, config, error, logging, serial};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    logging::init_tracing(cli.debug);

    if !cli.tty_path.exists() {
        bail!(error::BridgeError::TtyNotFound { path: cli.tty_path.clone() });
    }

    let config = match &cli.config {
        Some(path) => config::Config::load_from(path)?,
        None => config::Config::load_default()?,
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cli, config))
}

async fn run(cli: cli::Cli, config: config::Config) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    spawn_shutdown_handler(shutdown.clone());

    let tty_path = cli.tty_path.to_string_lossy().to_string();
    let serial::SerialChannels { rx: serial_rx, tx: serial_tx, disconnected } =
        serial::open(&tty_path, config.baud_rate, shutdown.clone())?;

    tracing::info!(tty = %tty_path, discovery_port = config.discovery_port, "bridge starting");

    let bridge = bridge::Bridge::new(config, serial_tx);
    bridge.run(serial_rx, disconnected, tty_path.clone(), shutdown).await?;

    tracing::info!("bridge shutting down");
    Ok(())
}

fn spawn_shutdown_handler(shutdown: Arc<AtomicBool>) {
    #[cfg(unix)]
    {
        tokio::spawn(async move {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).unwrap();
            let mut sigint =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).unwrap();

            tokio::select! {
                _ = sigterm.recv() => {},
                _ = sigint.recv() => {},
            }
            shutdown.store(true, Ordering::SeqCst);
        });
    }

    #[cfg(windows)]
    {
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            shutdown.store(true, Ordering::SeqCst);
        });
    }
}
