//! Headless runner for bundled simulation projects.
//!
//! ```bash
//! # Run the ping-pong project with its built-in configuration
//! mobsinet --project pingpong --rounds 50
//!
//! # Load a configuration file and run asynchronously, paced to 20 events/s
//! mobsinet --project pingpong --config pingpong.toml --asynchronous --refresh-rate 20
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use env_logger::Builder;
use log::{info, LevelFilter};
use mobsinet_core::projects::{self, pingpong};
use mobsinet_core::{ModelRegistry, Runtime, SimConfig, Simulation};

#[derive(Parser, Debug)]
#[command(name = "mobsinet")]
#[command(version, about, long_about = None)]
struct Args {
    /// Project to initialize
    #[arg(short, long, default_value = pingpong::PROJECT)]
    project: String,

    /// TOML or JSON configuration file. Defaults to the project's built-in one.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Rounds (synchronous) or events (asynchronous) to run
    #[arg(short, long)]
    rounds: Option<u64>,

    /// Seed for the simulation's random source
    #[arg(long)]
    seed: Option<u64>,

    /// Use the event-driven scheduler
    #[arg(long)]
    asynchronous: bool,

    /// Steps per wall-clock second; 0 runs unpaced
    #[arg(long)]
    refresh_rate: Option<f64>,

    /// Write the mobility trace to this file
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Run on a background thread and print a snapshot every N milliseconds
    #[arg(long)]
    watch_ms: Option<u64>,

    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// List registered projects and models, then exit
    #[arg(long)]
    list: bool,
}

fn load_config(args: &Args) -> anyhow::Result<SimConfig> {
    let mut config = match &args.config {
        Some(path) => SimConfig::load(path)
            .with_context(|| format!("loading configuration for '{}'", args.project))?,
        None if args.project == pingpong::PROJECT => pingpong::default_config(),
        None => bail!(
            "project '{}' has no built-in configuration; pass --config",
            args.project
        ),
    };
    if let Some(rounds) = args.rounds {
        config.rounds = rounds;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.asynchronous {
        config.asynchronous = true;
    }
    if let Some(rate) = args.refresh_rate {
        config.refresh_rate = rate;
    }
    if args.trace.is_some() {
        config.save_trace = true;
    }
    Ok(config)
}

fn run_inline(
    args: &Args,
    registry: Arc<ModelRegistry>,
    config: SimConfig,
) -> anyhow::Result<()> {
    let rounds = config.rounds;
    let mut sim = Simulation::init(&args.project, registry, config)?;
    if let Some(path) = &args.trace {
        let file = File::create(path)
            .with_context(|| format!("creating trace file {}", path.display()))?;
        sim.set_trace_writer(BufWriter::new(file));
    }
    let summary = sim.run(rounds);
    sim.exit();
    println!("{}", serde_json::to_string_pretty(&summary?)?);
    Ok(())
}

fn run_threaded(
    args: &Args,
    registry: Arc<ModelRegistry>,
    config: SimConfig,
    watch: Duration,
) -> anyhow::Result<()> {
    let (rounds, rate) = (config.rounds, config.refresh_rate);
    let mut runtime = Runtime::new();
    runtime.init(&args.project, registry, config)?;
    if let Some(path) = &args.trace {
        let file = File::create(path)
            .with_context(|| format!("creating trace file {}", path.display()))?;
        runtime.with_simulation(|sim| sim.set_trace_writer(BufWriter::new(file)))?;
    }
    runtime.run(rounds, rate)?;
    while runtime.is_running() {
        std::thread::sleep(watch);
        let snapshot = runtime.snapshot();
        info!(
            "T={} nodes={} edges={} messages={}",
            snapshot.time,
            snapshot.nodes.len(),
            snapshot.edges.len(),
            snapshot.messages_over_all
        );
    }
    let summary = runtime
        .wait()
        .context("scheduler thread exited without a result")??;
    runtime.shutdown();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    Builder::new()
        .filter_level(args.log_level)
        .parse_default_env()
        .init();

    let mut registry = ModelRegistry::with_builtins();
    projects::register_all(&mut registry);

    if args.list {
        println!("projects: {}", registry.projects().collect::<Vec<_>>().join(", "));
        for (kind, names) in registry.catalog() {
            println!("{kind}: {}", names.join(", "));
        }
        return Ok(());
    }

    let config = load_config(&args)?;
    info!(
        "Running '{}' ({}) for {} steps, seed {}",
        args.project, config.simulation_name, config.rounds, config.seed
    );
    let registry = Arc::new(registry);
    match args.watch_ms {
        Some(ms) => run_threaded(&args, registry, config, Duration::from_millis(ms.max(1))),
        None => run_inline(&args, registry, config),
    }
}
