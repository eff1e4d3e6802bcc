//! `train`: drill troops. Training rises with leadership and falls off with
//! army size; morale dips a little.

use crate::command::Execution;
use crate::config::GameConfig;
use crate::constraint::{self, Constraint};
use crate::error::EngineError;

pub fn min_conditions(config: &GameConfig) -> Vec<Constraint> {
    vec![
        constraint::not_being_neutral(),
        constraint::occupied_city(),
        constraint::req_general_crew(),
        constraint::req_general_train_below(config.max_train),
    ]
}

/// Training gained by `crew` troops under a general of `leadership`.
pub fn train_gain(leadership: i64, crew: i64, config: &GameConfig) -> i64 {
    if crew <= 0 {
        return 0;
    }
    leadership.max(0) * 100 * config.train_gain / crew
}

pub fn run(exec: &mut Execution<'_>) -> Result<bool, EngineError> {
    let config = exec.config;
    let general = exec.actor_general_mut()?;
    let room = (config.max_train - general.train).max(0);
    let leadership = general.real_stats().leadership as i64;
    let gain = train_gain(leadership, general.crew, config).clamp(0, room);

    general.train += gain;
    general.atmos = (general.atmos - config.train_atmos_loss).max(0);
    let line = format!("Training rose by {gain} to {}.", general.train);
    exec.push_log(line);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{execute, WorldStateBuilder};
    use serde_json::Value;

    #[test]
    fn test_gain_scales_with_army_size() {
        let cfg = GameConfig::default();
        assert_eq!(train_gain(70, 7000, &cfg), 30);
        assert_eq!(train_gain(70, 14000, &cfg), 15);
        assert_eq!(train_gain(70, 0, &cfg), 0);
    }

    #[test]
    fn test_train_capped_at_max() {
        let cfg = GameConfig::default();
        let world = WorldStateBuilder::new()
            .with_nation(1, "Wei")
            .with_city(1, "Xuchang", 1)
            .with_general(10, 1, 1)
            .edit_general(10, |g| {
                g.crew = 1000;
                g.train = 90;
                g.atmos = 50;
            })
            .build();
        let (_, repo, result) = execute(world, 10, "train", Value::Null);
        assert_eq!(result, Ok(true));
        let g = repo.world().generals.get(&10).unwrap();
        assert_eq!(g.train, cfg.max_train);
        assert_eq!(g.atmos, 50 - cfg.train_atmos_loss);
    }
}
