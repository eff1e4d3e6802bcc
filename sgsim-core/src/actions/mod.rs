//! Concrete actions.
//!
//! Each submodule implements one action's argument rules, constraint lists,
//! cost and effect. [`Action`] is the closed set of them; `Command` drives the
//! shared protocol and dispatches here by `match`.

mod deploy;
mod develop;
mod fortify;
mod movement;
mod recruit;
mod rest;
mod train;
mod warp;

use crate::admission::Coord;
use crate::command::{CommandScope, Cost, Execution};
use crate::config::GameConfig;
use crate::constraint::{Constraint, ConstraintContext};
use crate::error::{ArgumentError, EngineError};
use crate::rng::SeedStream;
use crate::state::CityId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Rest,
    Train,
    Recruit { amount: i64 },
    DevelopFarmland,
    Move { dest_city: CityId },
    Deploy { dest_city: CityId },
    Fortify,
    Warp { target: Coord },
}

impl Action {
    /// Every action key accepted by [`Action::validate_argument`].
    pub const KEYS: &'static [&'static str] = &[
        "rest",
        "train",
        "recruit",
        "develop_farmland",
        "move",
        "deploy",
        "fortify",
        "warp",
    ];

    /// Parse and range-check a raw submitted payload. Pure.
    pub fn validate_argument(
        key: &str,
        raw: &Value,
        config: &GameConfig,
    ) -> Result<Action, ArgumentError> {
        match key {
            "rest" => Ok(Action::Rest),
            "train" => Ok(Action::Train),
            "develop_farmland" => Ok(Action::DevelopFarmland),
            "fortify" => Ok(Action::Fortify),
            "recruit" => recruit::validate_argument(raw, config),
            "move" => Ok(Action::Move {
                dest_city: city_arg(key, raw)?,
            }),
            "deploy" => Ok(Action::Deploy {
                dest_city: city_arg(key, raw)?,
            }),
            "warp" => warp::validate_argument(raw),
            other => Err(ArgumentError::UnknownAction {
                action: other.to_string(),
            }),
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Action::Rest => "rest",
            Action::Train => "train",
            Action::Recruit { .. } => "recruit",
            Action::DevelopFarmland => "develop_farmland",
            Action::Move { .. } => "move",
            Action::Deploy { .. } => "deploy",
            Action::Fortify => "fortify",
            Action::Warp { .. } => "warp",
        }
    }

    /// Cooldown family. One action per family for now.
    pub fn family(&self) -> &'static str {
        self.key()
    }

    pub fn scope(&self) -> CommandScope {
        match self {
            Action::Fortify => CommandScope::Nation,
            _ => CommandScope::General,
        }
    }

    /// Normalised argument, stored in the scheduling record.
    pub fn arg_snapshot(&self) -> Value {
        match self {
            Action::Recruit { amount } => json!({ "amount": amount }),
            Action::Move { dest_city } | Action::Deploy { dest_city } => {
                json!({ "dest_city": dest_city })
            }
            Action::Warp { target } => json!({ "x": target.x, "y": target.y }),
            _ => Value::Null,
        }
    }

    pub fn dest_city(&self) -> Option<CityId> {
        match self {
            Action::Move { dest_city } | Action::Deploy { dest_city } => Some(*dest_city),
            _ => None,
        }
    }

    pub fn dest_coord(&self) -> Option<Coord> {
        match self {
            Action::Warp { target } => Some(*target),
            _ => None,
        }
    }

    pub fn pre_req_turn(&self, config: &GameConfig) -> u32 {
        match self {
            Action::Fortify => config.fortify_pre_turns,
            _ => 0,
        }
    }

    pub fn post_req_turn(&self, config: &GameConfig) -> u32 {
        match self {
            Action::Fortify => config.fortify_post_turns,
            _ => 0,
        }
    }

    pub fn min_conditions(&self, config: &GameConfig) -> Vec<Constraint> {
        match self {
            Action::Rest => rest::min_conditions(),
            Action::Train => train::min_conditions(config),
            Action::Recruit { .. } => recruit::min_conditions(),
            Action::DevelopFarmland => develop::min_conditions(),
            Action::Move { .. } => movement::min_conditions(),
            Action::Deploy { .. } => deploy::min_conditions(),
            Action::Fortify => fortify::min_conditions(),
            Action::Warp { .. } => warp::min_conditions(config),
        }
    }

    pub fn full_conditions(&self, config: &GameConfig) -> Vec<Constraint> {
        match self {
            Action::Rest => rest::min_conditions(),
            Action::Train => train::min_conditions(config),
            Action::Recruit { amount } => recruit::full_conditions(*amount),
            Action::DevelopFarmland => develop::full_conditions(),
            Action::Move { .. } => movement::min_conditions(),
            Action::Deploy { .. } => deploy::full_conditions(config),
            Action::Fortify => fortify::full_conditions(),
            Action::Warp { target } => warp::full_conditions(config, *target),
        }
    }

    /// Gold and rice due on execution, computed from current state.
    pub fn cost(&self, ctx: &ConstraintContext<'_>) -> Cost {
        match self {
            Action::Rest | Action::Train | Action::Warp { .. } => Cost::default(),
            Action::Recruit { amount } => recruit::cost(ctx, *amount),
            Action::DevelopFarmland => Cost::new(ctx.config.develop_cost, 0),
            Action::Move { .. } => Cost::new(ctx.config.move_cost, 0),
            Action::Deploy { .. } => deploy::cost(ctx),
            Action::Fortify => Cost::new(ctx.config.fortify_cost, 0),
        }
    }

    /// Apply the effect to the working copy. `Ok(false)` is a graceful
    /// failure; the caller discards the copy.
    pub(crate) fn run(
        &self,
        exec: &mut Execution<'_>,
        rng: &mut SeedStream,
    ) -> Result<bool, EngineError> {
        match self {
            Action::Rest => rest::run(exec),
            Action::Train => train::run(exec),
            Action::Recruit { amount } => recruit::run(exec, *amount),
            Action::DevelopFarmland => develop::run(exec, rng),
            Action::Move { dest_city } => movement::run(exec, *dest_city),
            Action::Deploy { dest_city } => deploy::run(exec, rng, *dest_city),
            Action::Fortify => fortify::run(exec),
            Action::Warp { target } => warp::run(exec, *target),
        }
    }
}

/// Integer field of an object payload.
pub(crate) fn int_field(action: &str, raw: &Value, field: &str) -> Result<i64, ArgumentError> {
    let value = raw.get(field).ok_or_else(|| ArgumentError::MissingField {
        action: action.to_string(),
        field: field.to_string(),
    })?;
    value.as_i64().ok_or_else(|| ArgumentError::WrongType {
        action: action.to_string(),
        field: field.to_string(),
        expected: "an integer".to_string(),
    })
}

/// Integer field constrained to `min..=max`.
pub(crate) fn ranged_field(
    action: &str,
    raw: &Value,
    field: &str,
    min: i64,
    max: i64,
) -> Result<i64, ArgumentError> {
    let value = int_field(action, raw, field)?;
    if value < min || value > max {
        return Err(ArgumentError::OutOfRange {
            action: action.to_string(),
            field: field.to_string(),
            value,
            min,
            max,
        });
    }
    Ok(value)
}

fn city_arg(action: &str, raw: &Value) -> Result<CityId, ArgumentError> {
    let id = ranged_field(action, raw, "dest_city", 1, CityId::MAX as i64)?;
    Ok(id as CityId)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_simple_actions() {
        let cfg = GameConfig::default();
        for key in ["rest", "train", "develop_farmland", "fortify"] {
            let action = Action::validate_argument(key, &Value::Null, &cfg).unwrap();
            assert_eq!(action.key(), key);
        }
    }

    #[test]
    fn test_every_key_is_known() {
        let cfg = GameConfig::default();
        let payload = json!({"amount": 500, "dest_city": 2, "x": 1, "y": 1});
        for key in Action::KEYS {
            let action = Action::validate_argument(key, &payload, &cfg).unwrap();
            assert_eq!(action.key(), *key);
        }
    }

    #[test]
    fn test_city_argument_errors() {
        let cfg = GameConfig::default();
        assert_eq!(
            Action::validate_argument("move", &json!({}), &cfg),
            Err(ArgumentError::MissingField {
                action: "move".into(),
                field: "dest_city".into()
            })
        );
        assert!(matches!(
            Action::validate_argument("move", &json!({"dest_city": "Xuchang"}), &cfg),
            Err(ArgumentError::WrongType { .. })
        ));
        assert!(matches!(
            Action::validate_argument("deploy", &json!({"dest_city": 0}), &cfg),
            Err(ArgumentError::OutOfRange { value: 0, .. })
        ));
        assert_eq!(
            Action::validate_argument("deploy", &json!({"dest_city": 7}), &cfg),
            Ok(Action::Deploy { dest_city: 7 })
        );
    }

    #[test]
    fn test_unknown_action() {
        assert!(matches!(
            Action::validate_argument("summon", &Value::Null, &GameConfig::default()),
            Err(ArgumentError::UnknownAction { .. })
        ));
    }

    #[test]
    fn test_scope_and_timing() {
        let cfg = GameConfig::default();
        assert_eq!(Action::Fortify.scope(), CommandScope::Nation);
        assert_eq!(Action::Rest.scope(), CommandScope::General);
        assert_eq!(Action::Fortify.pre_req_turn(&cfg), cfg.fortify_pre_turns);
        assert_eq!(Action::Fortify.post_req_turn(&cfg), cfg.fortify_post_turns);
        assert_eq!(Action::Train.post_req_turn(&cfg), 0);
    }

    #[test]
    fn test_arg_snapshot() {
        assert_eq!(Action::Recruit { amount: 300 }.arg_snapshot(), json!({"amount": 300}));
        assert_eq!(Action::Rest.arg_snapshot(), Value::Null);
        assert_eq!(
            Action::Warp { target: Coord::new(3, 4) }.arg_snapshot(),
            json!({"x": 3, "y": 4})
        );
    }
}
