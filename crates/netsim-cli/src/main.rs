//! `netsim -config=<path> [-time=<seconds>]`
//!
//! Opens a TUN device, loads the topology/routing config from `-config`,
//! and runs the simulation engine until `-time` seconds have elapsed (or
//! forever, if `-time` is omitted).

mod config;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use config::SimulationConfigInput;
use netsim_core::engine::Engine;
use netsim_tunnel::{Ipv4RewriteAdapter, TunDevice};

#[derive(Parser, Debug)]
#[command(name = "netsim", about = "Drone-relay network simulator")]
struct Cli {
    /// Path to the JSON simulation config.
    #[arg(long = "config")]
    config: PathBuf,

    /// Simulation duration in seconds. Runs until interrupted if omitted.
    #[arg(long = "time")]
    time: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_timer(netsim_core::logsink::MicrosecondTime)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let base_dir = cli
        .config
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));

    let input = SimulationConfigInput::load(&cli.config)
        .with_context(|| format!("loading config {:?}", cli.config))?;
    let resolved = input
        .resolve(&base_dir)
        .context("resolving simulation config")?;

    let tun = TunDevice::open(
        &resolved.tun.name,
        resolved.tun.address,
        resolved.tun.destination,
        resolved.tun.netmask,
        resolved.tun.mtu,
    )
    .context("opening tun device")?;

    let adapter = Ipv4RewriteAdapter;
    let engine = Engine::new(
        resolved.engine,
        resolved.links,
        resolved.policy,
        Arc::new(tun),
        Arc::new(adapter),
    );

    let running = Arc::new(AtomicBool::new(true));
    let handles = engine.spawn(running.clone());

    tracing::info!(
        config = ?cli.config,
        time = ?cli.time,
        routing_table = %resolved.routing_table_num,
        "simulation started"
    );

    match cli.time {
        Some(seconds) => {
            std::thread::sleep(Duration::from_secs(seconds));
            running.store(false, Ordering::Relaxed);
            tracing::info!("simulation time elapsed, shutting down");
        }
        None => {
            for handle in handles {
                let _ = handle.join();
            }
        }
    }

    Ok(())
}
