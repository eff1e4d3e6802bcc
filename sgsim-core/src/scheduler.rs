//! Turn scheduler.
//!
//! Holds one FIFO queue per general. Each [`Scheduler::tick`]:
//!
//! 1. restores command points on every ledger (once per turn index),
//! 2. expires cooldowns whose window has passed,
//! 3. orders actors by initiative (higher first, ties by general id),
//! 4. advances every queued command by one term and runs the ones that are
//!    due, in submission order per actor.
//!
//! A due command whose full conditions no longer hold is dropped without
//! running. Nothing that goes wrong with one command affects another.

use crate::battle::{compute_initiative_score, order_by_initiative, InitiativeInputs};
use crate::command::{Command, CommandId, CommandScope};
use crate::config::GameConfig;
use crate::error::EngineError;
use crate::events::{CommandEvent, EventSink, NullEventSink};
use crate::fixed::Fixed;
use crate::metrics::SchedulerMetrics;
use crate::persistence::{ChangeSet, Repository};
use crate::rng::SeedStream;
use crate::state::{GameEnv, GeneralId, WorldState};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::time::Instant;

/// Queue entry as shown to players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCommand {
    pub id: CommandId,
    pub action: String,
    pub arg: serde_json::Value,
    /// `elapsed/total`
    pub term: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub turn: u64,
    pub executed: u32,
    pub failed: u32,
    pub dropped: u32,
    pub expired: u32,
    /// Ledgers that received command points.
    pub recovered: u32,
    /// Commands still waiting after the tick.
    pub queued: usize,
}

#[derive(Debug, Clone)]
struct Cooldown {
    scope: CommandScope,
    holder: u64,
    family: &'static str,
    expires_at: u64,
}

pub struct Scheduler {
    config: GameConfig,
    queues: BTreeMap<GeneralId, VecDeque<Command>>,
    next_id: CommandId,
    cooldowns: Vec<Cooldown>,
    metrics: SchedulerMetrics,
    sink: Box<dyn EventSink>,
}

impl Scheduler {
    pub fn new(config: GameConfig) -> Self {
        Self::with_sink(config, Box::new(NullEventSink))
    }

    pub fn with_sink(config: GameConfig, sink: Box<dyn EventSink>) -> Self {
        Self {
            config,
            queues: BTreeMap::new(),
            next_id: 1,
            cooldowns: Vec::new(),
            metrics: SchedulerMetrics::default(),
            sink,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn metrics(&self) -> &SchedulerMetrics {
        &self.metrics
    }

    /// Total queued commands across all actors.
    pub fn queued_len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    fn emit(&self, event: CommandEvent) {
        if let Err(e) = self.sink.record(&event) {
            log::warn!("event sink failed on {}: {}", event.name(), e);
        }
    }

    pub fn flush_events(&self) {
        if let Err(e) = self.sink.flush() {
            log::warn!("event sink flush failed: {}", e);
        }
    }

    /// Validate and queue a command. Argument errors and unmet min
    /// conditions come back to the caller and nothing is queued.
    pub fn submit(
        &mut self,
        repo: &dyn Repository,
        env: &GameEnv,
        actor: GeneralId,
        action_key: &str,
        raw: &serde_json::Value,
    ) -> Result<CommandId, EngineError> {
        let id = self.next_id;
        match self.prepare(repo, env, actor, id, action_key, raw) {
            Ok(cmd) => {
                self.next_id += 1;
                self.metrics.submitted += 1;
                log::debug!(
                    "turn {}: general {} queued {} #{}",
                    env.turn_index,
                    actor,
                    cmd.key(),
                    id
                );
                self.emit(CommandEvent::Submitted {
                    turn: env.turn_index,
                    command_id: id,
                    actor,
                    action: cmd.key().to_string(),
                    arg: cmd.action().arg_snapshot(),
                });
                self.queues.entry(actor).or_default().push_back(cmd);
                Ok(id)
            }
            Err(e) => {
                self.metrics.rejected += 1;
                log::info!(
                    "turn {}: general {} {} rejected: {}",
                    env.turn_index,
                    actor,
                    action_key,
                    e
                );
                self.emit(CommandEvent::Rejected {
                    turn: env.turn_index,
                    actor,
                    action: action_key.to_string(),
                    kind: e.kind().to_string(),
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn prepare(
        &self,
        repo: &dyn Repository,
        env: &GameEnv,
        actor: GeneralId,
        id: CommandId,
        action_key: &str,
        raw: &serde_json::Value,
    ) -> Result<Command, EngineError> {
        repo.load_general(actor)?;
        let mut cmd = Command::new(id, actor, *env, action_key, raw, &self.config)?;
        cmd.init_constraints(&self.config);

        let world = repo.snapshot()?;
        if !cmd.has_min_conditions_met(&world, &self.config) {
            cmd.mark_min_failed();
            let reason = cmd
                .first_unmet_reason(&world, &self.config)
                .unwrap_or_else(|| "Conditions are not met.".to_string());
            return Err(EngineError::violation(reason));
        }
        cmd.mark_queued();
        Ok(cmd)
    }

    /// Remove a queued command before it runs. Nothing is charged.
    pub fn withdraw(
        &mut self,
        env: &GameEnv,
        actor: GeneralId,
        id: CommandId,
    ) -> Result<Command, EngineError> {
        let queue = self.queues.get_mut(&actor).ok_or(EngineError::NotQueued(id))?;
        let pos = queue
            .iter()
            .position(|c| c.id() == id)
            .ok_or(EngineError::NotQueued(id))?;
        let mut cmd = queue.remove(pos).ok_or(EngineError::NotQueued(id))?;
        if queue.is_empty() {
            self.queues.remove(&actor);
        }

        cmd.mark_withdrawn();
        self.metrics.withdrawn += 1;
        self.emit(CommandEvent::Withdrawn {
            turn: env.turn_index,
            command_id: id,
            actor,
            action: cmd.key().to_string(),
        });
        Ok(cmd)
    }

    /// Queue of one actor in execution order.
    pub fn pending(&self, actor: GeneralId) -> Vec<PendingCommand> {
        self.queues
            .get(&actor)
            .map(|queue| {
                queue
                    .iter()
                    .map(|c| PendingCommand {
                        id: c.id(),
                        action: c.key().to_string(),
                        arg: c.action().arg_snapshot(),
                        term: c.term_string(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    #[tracing::instrument(skip_all, name = "scheduler_tick", fields(turn = env.turn_index))]
    pub fn tick(
        &mut self,
        repo: &mut dyn Repository,
        env: &GameEnv,
    ) -> Result<TickReport, EngineError> {
        let start = Instant::now();
        let mut report = TickReport {
            turn: env.turn_index,
            ..Default::default()
        };

        report.recovered = self.recover_command_points(repo, env);
        self.metrics.recovery_time += start.elapsed();
        report.expired = self.expire_cooldowns(env);

        let exec_start = Instant::now();
        let world = repo.snapshot()?;
        for actor in self.actor_order(&world) {
            let Some(queue) = self.queues.remove(&actor) else {
                continue;
            };
            let mut waiting = VecDeque::with_capacity(queue.len());
            for mut cmd in queue {
                if cmd.advance_term() {
                    self.execute(repo, env, cmd, &mut report);
                } else {
                    waiting.push_back(cmd);
                }
            }
            if !waiting.is_empty() {
                self.queues.insert(actor, waiting);
            }
        }
        self.metrics.execution_time += exec_start.elapsed();

        report.queued = self.queued_len();
        self.metrics.total_ticks += 1;
        self.metrics.total_time += start.elapsed();
        log::debug!(
            "turn {}: {} executed, {} failed, {} dropped, {} queued",
            env.turn_index,
            report.executed,
            report.failed,
            report.dropped,
            report.queued
        );
        Ok(report)
    }

    /// Actors with queued commands, highest initiative first.
    fn actor_order(&self, world: &WorldState) -> Vec<GeneralId> {
        let mut scored: Vec<(GeneralId, Fixed)> = self
            .queues
            .keys()
            .map(|&id| {
                let score = world
                    .generals
                    .get(&id)
                    .map(|g| {
                        compute_initiative_score(&InitiativeInputs::for_general(
                            g,
                            self.config.defence_train,
                        ))
                    })
                    .unwrap_or(Fixed::ZERO);
                (id, score)
            })
            .collect();
        order_by_initiative(&mut scored);
        scored.into_iter().map(|(id, _)| id).collect()
    }

    fn execute(
        &mut self,
        repo: &mut dyn Repository,
        env: &GameEnv,
        mut cmd: Command,
        report: &mut TickReport,
    ) {
        cmd.set_env(*env);
        let (id, actor, action) = (cmd.id(), cmd.actor(), cmd.key());

        let world = match repo.snapshot() {
            Ok(w) => w,
            Err(e) => {
                self.record_failure(env, &cmd, &EngineError::from(e), report);
                return;
            }
        };

        if !cmd.has_full_conditions_met(&world, &self.config) {
            let reason = cmd
                .first_full_failure(&world, &self.config)
                .unwrap_or_else(|| "Conditions are not met.".to_string());
            cmd.mark_full_failed();
            log::warn!(
                "turn {}: dropped {} #{} of general {}: {}",
                env.turn_index,
                action,
                id,
                actor,
                reason
            );
            report.dropped += 1;
            self.metrics.dropped += 1;
            self.emit(CommandEvent::Dropped {
                turn: env.turn_index,
                command_id: id,
                actor,
                action: action.to_string(),
                reason,
            });
            return;
        }

        let holder = match cmd.scope() {
            CommandScope::General => Some(actor),
            CommandScope::Nation => world.generals.get(&actor).map(|g| g.nation as u64),
        };

        let mut rng = SeedStream::for_command(id, actor, env.turn_index, action);
        match cmd.run(repo, &self.config, &mut rng) {
            Ok(true) => {
                report.executed += 1;
                self.metrics.executed += 1;
                if let (Some(holder), true) = (holder, cmd.post_req_turn() > 0) {
                    self.cooldowns.push(Cooldown {
                        scope: cmd.scope(),
                        holder,
                        family: cmd.action().family(),
                        expires_at: env.turn_index + cmd.post_req_turn() as u64,
                    });
                }
                self.emit(CommandEvent::Executed {
                    turn: env.turn_index,
                    command_id: id,
                    actor,
                    action: action.to_string(),
                    logs: cmd.logs().to_vec(),
                });
            }
            Ok(false) => {
                let reason = cmd
                    .logs()
                    .last()
                    .cloned()
                    .unwrap_or_else(|| "The order could not be carried out.".to_string());
                log::info!(
                    "turn {}: {} #{} of general {} failed: {}",
                    env.turn_index,
                    action,
                    id,
                    actor,
                    reason
                );
                report.failed += 1;
                self.metrics.failed += 1;
                self.emit(CommandEvent::Failed {
                    turn: env.turn_index,
                    command_id: id,
                    actor,
                    action: action.to_string(),
                    kind: "action_failed".to_string(),
                    reason,
                });
            }
            Err(e) => self.record_failure(env, &cmd, &e, report),
        }
    }

    fn record_failure(
        &mut self,
        env: &GameEnv,
        cmd: &Command,
        error: &EngineError,
        report: &mut TickReport,
    ) {
        log::error!(
            "turn {}: {} #{} of general {} aborted: {}",
            env.turn_index,
            cmd.key(),
            cmd.id(),
            cmd.actor(),
            error
        );
        report.failed += 1;
        self.metrics.failed += 1;
        self.emit(CommandEvent::Failed {
            turn: env.turn_index,
            command_id: cmd.id(),
            actor: cmd.actor(),
            action: cmd.key().to_string(),
            kind: error.kind().to_string(),
            reason: error.to_string(),
        });
    }

    /// Restore both pools of every ledger not yet restored this turn.
    fn recover_command_points(&mut self, repo: &mut dyn Repository, env: &GameEnv) -> u32 {
        let world = match repo.snapshot() {
            Ok(w) => w,
            Err(e) => {
                log::error!("turn {}: command point recovery skipped: {}", env.turn_index, e);
                return 0;
            }
        };

        let mut changes = ChangeSet::default();
        for general in world.generals.values() {
            let Some(cp) = &general.command_points else {
                continue;
            };
            if cp.last_recovered() == Some(env.turn_index) {
                continue;
            }
            let mut general = general.clone();
            if let Some(cp) = general.command_points.as_mut() {
                cp.recover(
                    self.config.cp_recovery_primary,
                    self.config.cp_recovery_secondary,
                    env.turn_index,
                );
            }
            changes.generals.push(general);
        }

        let count = changes.generals.len() as u32;
        if count == 0 {
            return 0;
        }
        match repo.commit(changes) {
            Ok(()) => count,
            Err(e) => {
                log::error!("turn {}: command point recovery not saved: {}", env.turn_index, e);
                0
            }
        }
    }

    fn expire_cooldowns(&mut self, env: &GameEnv) -> u32 {
        let (expired, active): (Vec<_>, Vec<_>) = std::mem::take(&mut self.cooldowns)
            .into_iter()
            .partition(|c| c.expires_at <= env.turn_index);
        self.cooldowns = active;
        for c in &expired {
            self.emit(CommandEvent::Expired {
                turn: env.turn_index,
                scope: c.scope,
                holder: c.holder,
                family: c.family.to_string(),
            });
        }
        expired.len() as u32
    }
}
