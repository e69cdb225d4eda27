//! BhumiMap - occupancy grid generator daemon
//!
//! Loads a scene, builds the occupancy grid at the configured slice height and
//! keeps it published.
//!
//! # Usage
//!
//! ```bash
//! # Build once, write map files, exit
//! cargo run --release -- --scene configs/warehouse_scene.toml --output maps/warehouse --once
//!
//! # Run as a service with a config file
//! cargo run --release -- --config configs/bhumi.toml
//!
//! # Trigger a rebuild of a running service
//! kill -USR1 <pid>
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bhumi_map::{
    BhumiConfig, GridBuilder, MapPublisher, MapService, MapSink, PeriodicMode, Result,
    RosMapWriter, SceneWorld,
};
use clap::Parser;
use crossbeam_channel::Sender;
use signal_hook::consts::{SIGINT, SIGTERM, SIGUSR1};
use signal_hook::iterator::Signals;

const DEFAULT_CONFIG: &str = "bhumi.toml";

/// Occupancy grid generator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (default: ./bhumi.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Scene file, overrides [world] scene
    #[arg(short, long)]
    scene: Option<PathBuf>,

    /// Output base path for .pgm/.yaml, overrides [publish] output_path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Build once, export and exit
    #[arg(long)]
    once: bool,
}

/// Operator requests delivered by the signal thread.
#[derive(Debug, Clone, Copy)]
enum Operator {
    Rebuild,
    Shutdown,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => BhumiConfig::load(path)?,
        None => BhumiConfig::load_or_default(Path::new(DEFAULT_CONFIG))?,
    };
    if let Some(scene) = args.scene {
        config.world.scene = Some(scene);
    }
    if let Some(output) = args.output {
        config.publish.output_path = Some(output);
    }
    config.validate()?;

    let world = match &config.world.scene {
        Some(path) => SceneWorld::load(path)?,
        None => {
            log::warn!("No scene configured, every cell will be free");
            SceneWorld::new()
        }
    };

    let metadata = config.grid_metadata()?;
    let (min, max) = metadata.bounds();
    log::info!(
        "Grid {}x{} @ {:.3}m covering ({:.2}, {:.2})..({:.2}, {:.2}), slice z={:.2}",
        metadata.size_x(),
        metadata.size_y(),
        metadata.resolution(),
        min.x,
        min.y,
        max.x,
        max.y,
        metadata.slice_height()
    );

    let builder = GridBuilder::new(metadata, config.build_config());
    let publisher = Arc::new(MapPublisher::new(config.map.frame_id.clone()));

    let mut sinks: Vec<Box<dyn MapSink>> = Vec::new();
    if let Some(path) = &config.publish.output_path {
        log::info!("Exporting maps to {}.pgm/.yaml", path.display());
        sinks.push(Box::new(RosMapWriter::new(path.clone())));
    }

    let mut service_config = config.service_config()?;
    if args.once {
        service_config.build_on_start = false;
        service_config.periodic = PeriodicMode::Disabled;
    }

    let service = MapService::spawn(
        builder,
        Arc::new(world),
        publisher,
        sinks,
        service_config,
    )?;
    let trigger = service.trigger();

    if args.once {
        let summary = trigger.rebuild()?;
        log::info!(
            "Map #{}: {} free, {} occupied, {} unknown in {:.1}ms",
            summary.sequence,
            summary.counts.free,
            summary.counts.occupied,
            summary.counts.unknown,
            summary.duration.as_secs_f64() * 1000.0
        );
        service.shutdown()?;
        return Ok(());
    }

    let (operator_tx, operator_rx) = crossbeam_channel::unbounded();
    setup_signal_handler(operator_tx)?;
    log::info!("Running. SIGUSR1 rebuilds, SIGINT/SIGTERM stops");

    for request in operator_rx {
        match request {
            Operator::Rebuild => match trigger.rebuild() {
                Ok(summary) => log::info!(
                    "On-demand rebuild published map #{} ({} occupied)",
                    summary.sequence,
                    summary.counts.occupied
                ),
                Err(e) => log::error!("On-demand rebuild failed: {}", e),
            },
            Operator::Shutdown => break,
        }
    }

    log::info!("Shutting down");
    service.shutdown()?;
    Ok(())
}

/// Forward signals to the main loop on a dedicated thread.
fn setup_signal_handler(operator_tx: Sender<Operator>) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGUSR1])?;

    std::thread::Builder::new()
        .name("signal-handler".to_string())
        .spawn(move || {
            for sig in signals.forever() {
                let request = if sig == SIGUSR1 {
                    Operator::Rebuild
                } else {
                    log::info!("Received signal {:?}, initiating shutdown...", sig);
                    Operator::Shutdown
                };
                let stop = matches!(request, Operator::Shutdown);
                if operator_tx.send(request).is_err() || stop {
                    break;
                }
            }
        })?;

    Ok(())
}
