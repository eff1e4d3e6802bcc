use anyhow::{Context, Result};
use serde::Deserialize;
use sgsim_core::state::GeneralId;
use sgsim_core::{GameConfig, GameEnv, WorldState};
use std::path::Path;

/// A starting world plus the clock it starts at.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub env: GameEnv,
    pub world: WorldState,
    /// Inline balance overrides. `--config` takes precedence.
    #[serde(default)]
    pub config: Option<GameConfig>,
}

/// One scripted order, submitted when the clock reaches `turn`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptedCommand {
    pub turn: u64,
    pub actor: GeneralId,
    pub action: String,
    #[serde(default)]
    pub arg: serde_json::Value,
}

pub fn load_scenario(
    path: &Path,
    config_override: Option<&Path>,
) -> Result<(Scenario, GameConfig)> {
    log::info!("Loading scenario from {}", path.display());
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario {}", path.display()))?;
    let mut scenario: Scenario = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse scenario {}", path.display()))?;

    let config = match config_override {
        Some(p) => GameConfig::load(p)
            .with_context(|| format!("Failed to load config {}", p.display()))?,
        None => scenario.config.clone().unwrap_or_default(),
    };

    // Fleets are authored on generals; occupancy is derived.
    scenario.world.grid.rules = config.admission;
    scenario.world.place_fleets();

    log::info!(
        "Loaded {} generals, {} cities, {} nations starting {}",
        scenario.world.generals.len(),
        scenario.world.cities.len(),
        scenario.world.nations.len(),
        scenario.env
    );
    Ok((scenario, config))
}

/// Scripted commands sorted by turn. Same-turn entries keep file order.
pub fn load_commands(path: &Path) -> Result<Vec<ScriptedCommand>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read command script {}", path.display()))?;
    let mut commands: Vec<ScriptedCommand> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse command script {}", path.display()))?;
    commands.sort_by_key(|c| c.turn);
    log::info!("Loaded {} scripted commands", commands.len());
    Ok(commands)
}
