//! Scenario runner for the strategy game engine.
//!
//! Loads a world and a command script, then drives the [`Scheduler`] one
//! tick per month while the script submits orders on the turns it names.

pub mod loader;

use anyhow::Result;
use loader::ScriptedCommand;
use sgsim_core::{
    EventSink, GameConfig, GameEnv, InMemoryRepository, Scheduler, SchedulerMetrics, TickReport,
    WorldState,
};

/// Outcome of a scripted run.
#[derive(Debug)]
pub struct RunSummary {
    pub env: GameEnv,
    pub world: WorldState,
    pub reports: Vec<TickReport>,
    pub metrics: SchedulerMetrics,
}

/// Run `ticks` scheduler ticks starting at `env`.
///
/// Rejected submissions are logged and reported to the sink; they never
/// abort the run. Persistence errors do.
pub fn run_script(
    world: WorldState,
    env: GameEnv,
    config: GameConfig,
    script: &[ScriptedCommand],
    ticks: u32,
    sink: Box<dyn EventSink>,
) -> Result<RunSummary> {
    let mut repo = InMemoryRepository::new(world);
    let mut scheduler = Scheduler::with_sink(config, sink);
    let mut env = env;
    let mut reports = Vec::with_capacity(ticks as usize);

    for _ in 0..ticks {
        for cmd in script.iter().filter(|c| c.turn == env.turn_index) {
            if let Err(e) = scheduler.submit(&repo, &env, cmd.actor, &cmd.action, &cmd.arg) {
                log::warn!("{}: general {} could not queue {}: {}", env, cmd.actor, cmd.action, e);
            }
        }

        let report = scheduler.tick(&mut repo, &env)?;
        log::info!(
            "Tick: {} | executed {} | failed {} | dropped {} | queued {}",
            env,
            report.executed,
            report.failed,
            report.dropped,
            report.queued
        );
        reports.push(report);
        env = env.next_turn();
    }

    scheduler.flush_events();
    let metrics = scheduler.metrics().clone();
    Ok(RunSummary {
        env,
        world: repo.into_world(),
        reports,
        metrics,
    })
}
