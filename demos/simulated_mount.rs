//! Runs the coordinator against the in-process simulator and serves the
//! control socket, e.g.
//!
//! ```text
//! cargo run --example simulated_mount -- --config heliostat.json
//! echo '{"type": "initialize"}' | nc 127.0.0.1 9030
//! ```

use std::{net::SocketAddr, path::PathBuf, str::FromStr, sync::Arc};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use heliostat::{
    config::DaemonConfig,
    coordinator::Coordinator,
    sim::{axis::SimAxisConfig, SimEphemeris, SimMountConfig, SimulatedMount},
    socket_server::SocketServer,
};
use tracing::{info, Level};

#[derive(Debug, Parser)]
#[command(about = "Heliostat coordinator running on simulated hardware")]
struct Cli {
    /// Path to a JSON daemon configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Override the control socket listen address
    #[arg(long = "listen")]
    listen: Option<SocketAddr>,
    /// Simulate a focus axis without an endstop
    #[arg(long = "no-focus-endstop")]
    no_focus_endstop: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => DaemonConfig::from_file(path)?,
        None => DaemonConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }

    let level = Level::from_str(&config.log_level)
        .with_context(|| format!("Invalid log_level '{}'", config.log_level))?;
    tracing_subscriber::fmt().with_max_level(level).init();

    let epoch = Utc::now();
    let focus = if cli.no_focus_endstop {
        SimAxisConfig::without_endstop()
    } else {
        SimAxisConfig::default()
    };
    let mount = Arc::new(SimulatedMount::new(SimMountConfig {
        name: "simulated-heliostat".to_string(),
        epoch,
        focus,
        ..SimMountConfig::default()
    }));
    let ephemeris = Arc::new(
        SimEphemeris::new(epoch)
            .with_body("sun", -45.0, 12.0, SimEphemeris::SIDEREAL_RATE)
            .with_body("moon", -80.0, -5.0, SimEphemeris::SIDEREAL_RATE - 0.55),
    );
    info!(
        "Site latitude {:.4}, longitude {:.4}",
        config.site.latitude, config.site.longitude
    );

    let coordinator = Arc::new(Coordinator::new(config.coordinator, mount, ephemeris));
    let fan = coordinator.spawn_thermal();

    let mut server = SocketServer::new(config.server, coordinator.clone());
    server.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Interrupted, shutting down");

    server.shutdown();
    if let Some(fan) = fan {
        fan.abort();
    }
    if coordinator.is_connected() {
        coordinator.shutdown().await;
    }
    Ok(())
}
