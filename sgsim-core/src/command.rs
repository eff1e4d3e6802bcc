//! The command protocol shared by every action.
//!
//! A [`Command`] wraps one validated [`Action`] together with its constraint
//! lists, its scheduling record and its lifecycle state. Action modules only
//! describe *what* an action checks, costs and does; the ordering of those
//! steps, cost charging, cooldown bookkeeping and the atomic commit all
//! live here.
//!
//! ```text
//! Created -> ArgumentValidated -> ConstraintsInitialized -> Queued
//!        -> Executing -> Succeeded | Failed
//! ```
//! with `MinConditionFailed`, `FullConditionFailed` and `Withdrawn` as
//! terminal side exits.

use crate::actions::Action;
use crate::config::GameConfig;
use crate::constraint::{self, custom, Constraint, ConstraintContext};
use crate::error::{EngineError, PersistenceError};
use crate::persistence::{ChangeSet, Repository};
use crate::rng::SeedStream;
use crate::state::{
    City, CityId, GameEnv, General, GeneralId, LastTurn, Nation, NationId, WorldState,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type CommandId = u64;

/// Who owns the effect and the scheduling record of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandScope {
    General,
    Nation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandState {
    Created,
    ArgumentValidated,
    ConstraintsInitialized,
    MinConditionFailed,
    Queued,
    FullConditionFailed,
    Executing,
    Succeeded,
    Failed,
    Withdrawn,
}

/// Resources paid on execution. Never negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cost {
    pub gold: i64,
    pub rice: i64,
}

impl Cost {
    pub fn new(gold: i64, rice: i64) -> Self {
        Self {
            gold: gold.max(0),
            rice: rice.max(0),
        }
    }

    pub fn is_free(&self) -> bool {
        self.gold == 0 && self.rice == 0
    }
}

#[derive(Debug, Clone)]
pub struct Command {
    id: CommandId,
    actor: GeneralId,
    action: Action,
    env: GameEnv,
    state: CommandState,
    min_conditions: Vec<Constraint>,
    full_conditions: Vec<Constraint>,
    pre_req_turn: u32,
    post_req_turn: u32,
    record: LastTurn,
    logs: Vec<String>,
}

impl Command {
    /// Validate `raw` for `action_key` and build an uninitialised command.
    pub fn new(
        id: CommandId,
        actor: GeneralId,
        env: GameEnv,
        action_key: &str,
        raw: &serde_json::Value,
        config: &GameConfig,
    ) -> Result<Self, EngineError> {
        let action = Action::validate_argument(action_key, raw, config)?;
        Ok(Self::from_action(id, actor, env, action))
    }

    /// Wrap an already validated action.
    pub fn from_action(id: CommandId, actor: GeneralId, env: GameEnv, action: Action) -> Self {
        let record = LastTurn {
            action: action.key().to_string(),
            arg: action.arg_snapshot(),
            term: 0,
            resolved_turn: env.turn_index,
        };
        Self {
            id,
            actor,
            action,
            env,
            state: CommandState::ArgumentValidated,
            min_conditions: Vec::new(),
            full_conditions: Vec::new(),
            pre_req_turn: 0,
            post_req_turn: 0,
            record,
            logs: Vec::new(),
        }
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn actor(&self) -> GeneralId {
        self.actor
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn key(&self) -> &'static str {
        self.action.key()
    }

    pub fn scope(&self) -> CommandScope {
        self.action.scope()
    }

    pub fn env(&self) -> &GameEnv {
        &self.env
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    pub fn record(&self) -> &LastTurn {
        &self.record
    }

    /// Action log lines produced by `run`.
    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub fn pre_req_turn(&self) -> u32 {
        self.pre_req_turn
    }

    pub fn post_req_turn(&self) -> u32 {
        self.post_req_turn
    }

    /// Populate the constraint lists. Later calls are no-ops.
    pub fn init_constraints(&mut self, config: &GameConfig) {
        if self.state != CommandState::ArgumentValidated {
            return;
        }
        self.pre_req_turn = self.action.pre_req_turn(config);
        self.post_req_turn = self.action.post_req_turn(config);

        let mut min = self.action.min_conditions(config);
        let mut full = self.action.full_conditions(config);
        if self.post_req_turn > 0 {
            let cooldown = constraint::available_after_cooldown(
                self.scope(),
                self.action.family(),
                self.post_req_turn,
            );
            min.push(cooldown.clone());
            full.push(cooldown);
        }
        full.extend(affordability(self.action.clone()));

        self.min_conditions = min;
        self.full_conditions = full;
        self.state = CommandState::ConstraintsInitialized;
    }

    fn constraints_ready(&self) -> bool {
        !matches!(self.state, CommandState::Created | CommandState::ArgumentValidated)
    }

    /// Replace the environment the command is evaluated and executed in.
    pub fn set_env(&mut self, env: GameEnv) {
        self.env = env;
    }

    /// Read-only view for constraint evaluation.
    pub fn context<'a>(
        &self,
        world: &'a WorldState,
        env: &'a GameEnv,
        config: &'a GameConfig,
    ) -> ConstraintContext<'a> {
        let general = world.generals.get(&self.actor);
        let dest_city = self.action.dest_city().and_then(|id| world.cities.get(&id));
        ConstraintContext {
            world,
            env,
            config,
            general,
            nation: general.and_then(|g| world.nations.get(&g.nation)),
            city: general.and_then(|g| world.cities.get(&g.city)),
            dest_city,
            dest_coord: self.action.dest_coord(),
        }
    }

    pub fn has_min_conditions_met(&self, world: &WorldState, config: &GameConfig) -> bool {
        if !self.constraints_ready() {
            log::warn!("command {}: min conditions checked before init", self.id);
            return false;
        }
        let ctx = self.context(world, &self.env, config);
        constraint::first_failure(&self.min_conditions, &ctx).is_none()
    }

    pub fn has_full_conditions_met(&self, world: &WorldState, config: &GameConfig) -> bool {
        if !self.constraints_ready() {
            log::warn!("command {}: full conditions checked before init", self.id);
            return false;
        }
        let ctx = self.context(world, &self.env, config);
        constraint::first_failure(&self.full_conditions, &ctx).is_none()
    }

    /// Message of the first failing constraint, min list before full list.
    pub fn first_unmet_reason(&self, world: &WorldState, config: &GameConfig) -> Option<String> {
        if !self.constraints_ready() {
            return Some("Constraints are not initialized.".to_string());
        }
        let ctx = self.context(world, &self.env, config);
        constraint::first_failure(&self.min_conditions, &ctx)
            .or_else(|| constraint::first_failure(&self.full_conditions, &ctx))
            .map(|c| c.message().to_string())
    }

    /// Message of the first failing full condition only.
    pub fn first_full_failure(&self, world: &WorldState, config: &GameConfig) -> Option<String> {
        let ctx = self.context(world, &self.env, config);
        constraint::first_failure(&self.full_conditions, &ctx).map(|c| c.message().to_string())
    }

    pub fn cost(&self, world: &WorldState, config: &GameConfig) -> Cost {
        let ctx = self.context(world, &self.env, config);
        self.action.cost(&ctx)
    }

    /// Mark as queued after a successful min-condition check.
    pub(crate) fn mark_queued(&mut self) {
        self.state = CommandState::Queued;
    }

    pub(crate) fn mark_min_failed(&mut self) {
        self.state = CommandState::MinConditionFailed;
    }

    pub(crate) fn mark_full_failed(&mut self) {
        self.state = CommandState::FullConditionFailed;
    }

    pub(crate) fn mark_withdrawn(&mut self) {
        self.state = CommandState::Withdrawn;
    }

    /// One scheduler tick elapsed. Returns `true` once the command is due.
    pub fn advance_term(&mut self) -> bool {
        self.record.term = self.record.term.saturating_add(1);
        self.record.term > self.pre_req_turn
    }

    /// Progress as `elapsed/total`, total being `pre_req_turn + 1`.
    pub fn term_string(&self) -> String {
        format!("{}/{}", self.record.term, self.pre_req_turn + 1)
    }

    /// Execute against a fresh snapshot and commit every touched entity at
    /// once.
    ///
    /// `Ok(false)` is a graceful in-game failure with nothing persisted.
    /// `Err` means the storage layer failed; nothing was persisted either.
    #[tracing::instrument(level = "debug", skip_all, fields(id = self.id, action = self.key()))]
    pub fn run(
        &mut self,
        repo: &mut dyn Repository,
        config: &GameConfig,
        rng: &mut SeedStream,
    ) -> Result<bool, EngineError> {
        if !matches!(
            self.state,
            CommandState::Queued | CommandState::ConstraintsInitialized
        ) {
            log::warn!("command {} run in state {:?}", self.id, self.state);
            return Ok(false);
        }
        self.state = CommandState::Executing;
        self.logs.clear();

        let world = match repo.snapshot() {
            Ok(w) => w,
            Err(e) => {
                self.state = CommandState::Failed;
                return Err(e.into());
            }
        };
        let cost = self.cost(&world, config);
        let env = self.env;
        let mut exec = Execution::new(world, &env, config, self.actor);

        if let Err(e) = exec.pay(self.scope(), cost) {
            self.state = CommandState::Failed;
            self.logs = exec.take_logs();
            return match e {
                EngineError::Persistence(_) => Err(e),
                _ => {
                    log::debug!("command {}: {}", self.id, e);
                    Ok(false)
                }
            };
        }

        let succeeded = match self.action.run(&mut exec, rng) {
            Ok(ok) => ok,
            Err(e @ EngineError::Persistence(_)) => {
                self.state = CommandState::Failed;
                self.logs = exec.take_logs();
                return Err(e);
            }
            Err(e) => {
                exec.push_log(e.to_string());
                false
            }
        };
        if !succeeded {
            self.state = CommandState::Failed;
            self.logs = exec.take_logs();
            return Ok(false);
        }

        let record = LastTurn {
            action: self.key().to_string(),
            arg: self.action.arg_snapshot(),
            term: 0,
            resolved_turn: env.turn_index,
        };
        exec.store_record(self.scope(), self.action.family(), record.clone())?;

        self.logs = exec.take_logs();
        let changes = exec.into_change_set();
        if let Err(e) = repo.commit(changes) {
            self.state = CommandState::Failed;
            return Err(e.into());
        }
        self.record = record;
        self.state = CommandState::Succeeded;
        Ok(true)
    }
}

/// "Not enough gold/rice." checks against the payer, evaluated with the
/// action's cost at check time.
fn affordability(action: Action) -> Vec<Constraint> {
    let scope = action.scope();
    let for_rice = action.clone();
    vec![
        custom("affordable_gold", gold_message(scope), move |ctx| {
            let cost = action.cost(ctx);
            payer_funds(ctx, scope).is_some_and(|(gold, _)| gold >= cost.gold)
        }),
        custom("affordable_rice", rice_message(scope), move |ctx| {
            let cost = for_rice.cost(ctx);
            payer_funds(ctx, scope).is_some_and(|(_, rice)| rice >= cost.rice)
        }),
    ]
}

fn gold_message(scope: CommandScope) -> &'static str {
    match scope {
        CommandScope::General => "Not enough gold.",
        CommandScope::Nation => "The treasury lacks gold.",
    }
}

fn rice_message(scope: CommandScope) -> &'static str {
    match scope {
        CommandScope::General => "Not enough rice.",
        CommandScope::Nation => "The granary lacks rice.",
    }
}

fn payer_funds(ctx: &ConstraintContext<'_>, scope: CommandScope) -> Option<(i64, i64)> {
    match scope {
        CommandScope::General => ctx.general.map(|g| (g.gold, g.rice)),
        CommandScope::Nation => ctx.nation.map(|n| (n.gold, n.rice)),
    }
}

/// Working copy of the world for a single command run.
///
/// Every mutable accessor records the entity it hands out so the final
/// [`ChangeSet`] contains exactly what was touched.
pub struct Execution<'a> {
    world: WorldState,
    pub env: &'a GameEnv,
    pub config: &'a GameConfig,
    pub actor: GeneralId,
    touched_generals: BTreeSet<GeneralId>,
    touched_cities: BTreeSet<CityId>,
    touched_nations: BTreeSet<NationId>,
    touched_grid: bool,
    logs: Vec<String>,
}

impl<'a> Execution<'a> {
    pub fn new(
        world: WorldState,
        env: &'a GameEnv,
        config: &'a GameConfig,
        actor: GeneralId,
    ) -> Self {
        Self {
            world,
            env,
            config,
            actor,
            touched_generals: BTreeSet::new(),
            touched_cities: BTreeSet::new(),
            touched_nations: BTreeSet::new(),
            touched_grid: false,
            logs: Vec::new(),
        }
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn general(&self, id: GeneralId) -> Result<&General, EngineError> {
        self.world
            .generals
            .get(&id)
            .ok_or(EngineError::Persistence(PersistenceError::GeneralNotFound(id)))
    }

    pub fn general_mut(&mut self, id: GeneralId) -> Result<&mut General, EngineError> {
        let g = self
            .world
            .generals
            .get_mut(&id)
            .ok_or(EngineError::Persistence(PersistenceError::GeneralNotFound(id)))?;
        self.touched_generals.insert(id);
        Ok(g)
    }

    pub fn actor_general(&self) -> Result<&General, EngineError> {
        self.general(self.actor)
    }

    pub fn actor_general_mut(&mut self) -> Result<&mut General, EngineError> {
        self.general_mut(self.actor)
    }

    pub fn city(&self, id: CityId) -> Result<&City, EngineError> {
        self.world
            .cities
            .get(&id)
            .ok_or(EngineError::Persistence(PersistenceError::CityNotFound(id)))
    }

    pub fn city_mut(&mut self, id: CityId) -> Result<&mut City, EngineError> {
        let c = self
            .world
            .cities
            .get_mut(&id)
            .ok_or(EngineError::Persistence(PersistenceError::CityNotFound(id)))?;
        self.touched_cities.insert(id);
        Ok(c)
    }

    pub fn nation(&self, id: NationId) -> Result<&Nation, EngineError> {
        self.world
            .nations
            .get(&id)
            .ok_or(EngineError::Persistence(PersistenceError::NationNotFound(id)))
    }

    pub fn nation_mut(&mut self, id: NationId) -> Result<&mut Nation, EngineError> {
        let n = self
            .world
            .nations
            .get_mut(&id)
            .ok_or(EngineError::Persistence(PersistenceError::NationNotFound(id)))?;
        self.touched_nations.insert(id);
        Ok(n)
    }

    pub fn grid_mut(&mut self) -> &mut crate::admission::Grid {
        self.touched_grid = true;
        &mut self.world.grid
    }

    pub fn push_log(&mut self, line: impl Into<String>) {
        let line = line.into();
        log::debug!("general {}: {}", self.actor, line);
        self.logs.push(line);
    }

    fn take_logs(&mut self) -> Vec<String> {
        std::mem::take(&mut self.logs)
    }

    /// Deduct `cost` from the general or the nation, by scope.
    fn pay(&mut self, scope: CommandScope, cost: Cost) -> Result<(), EngineError> {
        if cost.is_free() {
            return Ok(());
        }
        let (gold, rice) = match scope {
            CommandScope::General => {
                let g = self.actor_general_mut()?;
                (&mut g.gold, &mut g.rice)
            }
            CommandScope::Nation => {
                let nation = self.actor_general()?.nation;
                let n = self.nation_mut(nation)?;
                (&mut n.gold, &mut n.rice)
            }
        };
        if *gold < cost.gold || *rice < cost.rice {
            return Err(EngineError::violation(if *gold < cost.gold {
                gold_message(scope)
            } else {
                rice_message(scope)
            }));
        }
        *gold -= cost.gold;
        *rice -= cost.rice;
        Ok(())
    }

    fn store_record(
        &mut self,
        scope: CommandScope,
        family: &str,
        record: LastTurn,
    ) -> Result<(), EngineError> {
        match scope {
            CommandScope::General => {
                self.actor_general_mut()?.last_turns.insert(family.to_string(), record);
            }
            CommandScope::Nation => {
                let nation = self.actor_general()?.nation;
                self.nation_mut(nation)?.last_turns.insert(family.to_string(), record);
            }
        }
        Ok(())
    }

    pub fn into_change_set(self) -> ChangeSet {
        let Execution {
            world,
            touched_generals,
            touched_cities,
            touched_nations,
            touched_grid,
            ..
        } = self;
        ChangeSet {
            generals: touched_generals
                .into_iter()
                .filter_map(|id| world.generals.get(&id).cloned())
                .collect(),
            cities: touched_cities
                .into_iter()
                .filter_map(|id| world.cities.get(&id).cloned())
                .collect(),
            nations: touched_nations
                .into_iter()
                .filter_map(|id| world.nations.get(&id).cloned())
                .collect(),
            grid: touched_grid.then(|| world.grid.clone()),
        }
    }
}
