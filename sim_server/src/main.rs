//! Headless simulation server
//!
//! Builds a walled arena, fills it with tethered creatures and a stream of
//! projectiles, and runs the physics core at its fixed tick rate without
//! sleeping. Statistics are logged once per simulated second.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use hitbox_engine::prelude::*;

mod scenario;

use scenario::{Arena, ArenaSettings};

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "sim_server", about = "Runs the hitbox physics core headless")]
struct Args {
    /// Physics config file (.toml or .ron); defaults are used when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of ticks to simulate
    #[arg(short, long, default_value_t = 600)]
    ticks: u64,

    /// Creatures spawned at startup
    #[arg(long, default_value_t = 24)]
    creatures: usize,

    /// Projectiles fired per simulated second
    #[arg(long, default_value_t = 8)]
    projectiles: usize,

    /// Seed for spawn positions and creature wandering
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_config(path: Option<&PathBuf>) -> Result<PhysicsConfig> {
    let Some(path) = path else {
        log::info!("Using default physics config");
        return Ok(PhysicsConfig::default());
    };
    let path_str = path
        .to_str()
        .with_context(|| format!("Config path {} is not valid UTF-8", path.display()))?;
    let config = PhysicsConfig::load_from_file(path_str)
        .with_context(|| format!("Failed to load physics config from {}", path.display()))?;
    log::info!("Loaded physics config from {}", path.display());
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    hitbox_engine::foundation::logging::init(&args.log_level);

    let config = load_config(args.config.as_ref())?;
    let settings = ArenaSettings {
        creatures: args.creatures,
        projectiles_per_second: args.projectiles,
        seed: args.seed,
    };
    let mut arena = Arena::new(config, settings).context("Failed to build the arena")?;

    log::info!(
        "Starting simulation: {} ticks, {} creatures, seed {}",
        args.ticks,
        args.creatures,
        args.seed
    );
    for _ in 0..args.ticks {
        arena.step().context("Physics tick failed")?;
    }
    arena.log_summary();
    Ok(())
}
