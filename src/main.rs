use std::{
    env,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Result;
use clap::Parser;
use log::info;
use sensor_uplink::runner::{RngSeed, UplinkRunner};

#[derive(Parser, Debug)]
#[command(version, about = "Streams position and heading samples to a collector", long_about = None)]
struct Args {
    /// Parameter file
    #[arg(short, long, default_value = "config/params.toml")]
    config: PathBuf,

    /// Simulated seconds to run for. Runs until Ctrl-C if omitted.
    #[arg(short, long)]
    duration: Option<f64>,

    /// Log the samples instead of sending them
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Seed of the simulated sensors
    #[arg(short, long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    // Default log level to "info"
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }

    pretty_env_logger::init();

    let args = Args::parse();

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            info!("Stopping...");
            stop.store(true, Ordering::SeqCst);
        })?;
    }

    let duration = args
        .duration
        .map(Duration::try_from_secs_f64)
        .transpose()?;

    let seed = match args.seed {
        Some(seed) => RngSeed::Fixed(seed),
        None => RngSeed::Rand,
    };

    let runner = UplinkRunner::new(&args.config, args.dry_run, seed)?;
    let summary = runner.run_blocking(duration, stop)?;

    info!(
        "Done: {} submitted, {} failed",
        summary.submitted, summary.failed
    );

    Ok(())
}
