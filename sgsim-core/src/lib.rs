//! # Strategy Game Simulation Core
//!
//! Command execution and constraint engine for a turn-based strategy game.
//!
//! Players queue orders for their generals. Each order is a [`Command`] that
//! is validated on submission, waits a number of scheduler ticks, is checked
//! again against the world as it is by then, and finally runs against a
//! private copy of the world that is committed atomically.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  submit   ┌────────────┐  tick   ┌─────────────┐
//! │ submitter  │──────────▶│ Scheduler  │────────▶│  Command    │
//! │ (key, arg) │           │ FIFO/actor │         │  run(rng)   │
//! └────────────┘           └─────┬──────┘         └──────┬──────┘
//!                                │ events                │ ChangeSet
//!                         ┌──────▼──────┐         ┌──────▼──────┐
//!                         │  EventSink  │         │ Repository  │
//!                         │  (JSONL)    │         │ (commit)    │
//!                         └─────────────┘         └─────────────┘
//! ```
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Command`] | One queued order: constraints, cost, timing, `run` |
//! | [`Action`] | The concrete actions and their rules |
//! | [`Constraint`] | Named precondition with a player-facing message |
//! | [`Scheduler`] | Per-actor queues, initiative ordering, tick loop |
//! | [`SeedStream`] | Per-command deterministic random stream |
//! | [`CommandPoint`] | Two-pool command point ledger |
//! | [`Grid`] | Lazily typed galaxy cells with admission rules |
//! | [`Repository`] | Storage boundary, atomic `commit` |
//!
//! Battle math lives in [`battle`] and is fixed-point throughout.

pub mod actions;
pub mod admission;
pub mod battle;
pub mod command;
pub mod command_point;
pub mod config;
pub mod constraint;
pub mod error;
pub mod events;
pub mod fixed;
pub mod metrics;
pub mod persistence;
pub mod rng;
pub mod scheduler;
pub mod state;
pub mod testing;

pub use actions::Action;
pub use admission::{AdmissionDenied, AdmissionRules, CellKind, Coord, Grid, GridCell};
pub use battle::{
    compute_initiative_score, resolve_damage_outcome, DamageInputs, DamageOutcome,
    InitiativeInputs,
};
pub use command::{Command, CommandId, CommandScope, CommandState, Cost};
pub use command_point::{CommandPoint, CpPool};
pub use config::{ConfigError, GameConfig};
pub use constraint::{Constraint, ConstraintContext};
pub use error::{ArgumentError, EngineError, PersistenceError};
pub use events::{CommandEvent, EventSink, JsonlEventSink, MemoryEventSink, NullEventSink};
pub use fixed::Fixed;
pub use metrics::SchedulerMetrics;
pub use persistence::{ChangeSet, InMemoryRepository, Repository};
pub use rng::{derive_seed, SeedStream};
pub use scheduler::{PendingCommand, Scheduler, TickReport};
pub use state::{City, GameEnv, General, LastTurn, Nation, WorldState};
