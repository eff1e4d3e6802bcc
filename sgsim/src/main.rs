use anyhow::{Context, Result};
use clap::Parser;
use sgsim::loader;
use sgsim_core::{EventSink, JsonlEventSink, NullEventSink};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scenario file (world, start date, optional config)
    scenario: PathBuf,

    /// Command script: JSON list of {turn, actor, action, arg}
    #[arg(short, long)]
    commands: Option<PathBuf>,

    /// Game config overriding the scenario's
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of ticks to run
    #[arg(short, long, default_value_t = 12)]
    ticks: u32,

    /// Write command events as JSONL to this file ("-" for stdout)
    #[arg(long)]
    events: Option<String>,

    /// Write the final world state as JSON to this file
    #[arg(long)]
    dump_state: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = std::str::FromStr::from_str(&args.log_level).unwrap_or(log::LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();

    log::info!("Starting sgsim...");

    let (scenario, config) = loader::load_scenario(&args.scenario, args.config.as_deref())?;
    let script = match &args.commands {
        Some(path) => loader::load_commands(path)?,
        None => Vec::new(),
    };

    let sink: Box<dyn EventSink> = match args.events.as_deref() {
        Some("-") => Box::new(JsonlEventSink::stdout()),
        Some(path) => Box::new(
            JsonlEventSink::file(path)
                .with_context(|| format!("Failed to create event log {path}"))?,
        ),
        None => Box::new(NullEventSink),
    };

    let summary = sgsim::run_script(
        scenario.world,
        scenario.env,
        config,
        &script,
        args.ticks,
        sink,
    )?;

    let m = &summary.metrics;
    log::info!("Simulation finished at {}", summary.env);
    log::info!(
        "Commands: submitted {} | rejected {} | executed {} | failed {} | dropped {}",
        m.submitted,
        m.rejected,
        m.executed,
        m.failed,
        m.dropped
    );
    log::info!("Average tick: {:.3}ms", m.tick_avg_ms());
    log::info!("World checksum: {:016x}", summary.world.checksum());

    if let Some(path) = &args.dump_state {
        let json = serde_json::to_string_pretty(&summary.world)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Final state written to {}", path.display());
    }

    Ok(())
}
