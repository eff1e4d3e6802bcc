use crate::admission::AdmissionRules;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Static game-balance constants. Read-only to the engine.
///
/// Every field has a default, so a config file only needs the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Upper bound for train and atmos.
    pub max_train: i64,
    pub max_atmos: i64,
    /// Train gained per `train` command, scaled by leadership / 100.
    pub train_gain: i64,
    /// Atmos lost per `train` command.
    pub train_atmos_loss: i64,

    /// Gold per 100 recruits.
    pub recruit_gold_per_100: i64,
    /// Rice per 100 recruits.
    pub recruit_rice_per_100: i64,
    /// Largest single `recruit` order, before the leadership cap.
    pub max_recruit: i64,
    /// Train and atmos of freshly recruited troops.
    pub recruit_train: i64,
    pub recruit_atmos: i64,
    /// A city must keep at least this population after recruiting.
    pub min_city_pop: i64,

    /// Base gold cost of domestic development commands.
    pub develop_cost: i64,
    /// Percent chance a development roll is a critical success / a failure.
    pub develop_critical_pct: u32,
    pub develop_fail_pct: u32,

    /// Gold cost of moving one city.
    pub move_cost: i64,
    pub move_atmos_loss: i64,

    /// Training baseline defenders require of units that engage them.
    pub defence_train: i64,
    /// Hard cap on phases in one `deploy` battle.
    pub max_battle_phases: u32,

    /// Nation gold spent by `fortify`.
    pub fortify_cost: i64,
    pub fortify_pre_turns: u32,
    pub fortify_post_turns: u32,
    /// Defence and wall points `fortify` adds to the capital.
    pub fortify_amount: i64,

    /// Military command points per warp jump.
    pub warp_cp_cost: i64,
    /// Largest grid distance of a single jump.
    pub warp_range: u32,
    /// Command points restored to each pool every tick.
    pub cp_recovery_primary: i64,
    pub cp_recovery_secondary: i64,

    pub admission: AdmissionRules,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_train: 100,
            max_atmos: 100,
            train_gain: 30,
            train_atmos_loss: 3,

            recruit_gold_per_100: 10,
            recruit_rice_per_100: 1,
            max_recruit: 10_000,
            recruit_train: 40,
            recruit_atmos: 40,
            min_city_pop: 30_000,

            develop_cost: 24,
            develop_critical_pct: 10,
            develop_fail_pct: 10,

            move_cost: 20,
            move_atmos_loss: 5,

            defence_train: 40,
            max_battle_phases: 8,

            fortify_cost: 1_000,
            fortify_pre_turns: 2,
            fortify_post_turns: 12,
            fortify_amount: 500,

            warp_cp_cost: 10,
            warp_range: 5,
            cp_recovery_primary: 2,
            cp_recovery_secondary: 2,

            admission: AdmissionRules::default(),
        }
    }
}

impl GameConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        log::info!("Loaded game config from {}", path.display());
        Ok(config)
    }
}
