use crate::admission::{CellKind, Coord, Grid};
use crate::command_point::CommandPoint;
use crate::config::GameConfig;
use crate::constraint::ConstraintContext;
use crate::state::{
    City, CityId, Fleet, GameEnv, General, GeneralId, Nation, NationId, Stats, WorldState,
};

pub struct WorldStateBuilder {
    state: WorldState,
}

impl WorldStateBuilder {
    pub fn new() -> Self {
        Self {
            state: WorldState {
                grid: Grid::new(100, 50, 0, GameConfig::default().admission),
                ..Default::default()
            },
        }
    }

    pub fn with_grid(mut self, grid: Grid) -> Self {
        self.state.grid = grid;
        self
    }

    /// Nation with a generous treasury. Its first city becomes the capital.
    pub fn with_nation(mut self, id: NationId, name: &str) -> Self {
        self.state.nations.insert(
            id,
            Nation {
                id,
                name: name.to_string(),
                gold: 10_000,
                rice: 10_000,
                capital: None,
                last_turns: Default::default(),
            },
        );
        self
    }

    pub fn with_city(mut self, id: CityId, name: &str, nation: NationId) -> Self {
        self.state.cities.insert(
            id,
            City {
                id,
                name: name.to_string(),
                nation,
                pop: 100_000,
                pop_max: 500_000,
                agri: 1_000,
                agri_max: 5_000,
                comm: 1_000,
                comm_max: 5_000,
                def: 1_000,
                def_max: 5_000,
                wall: 1_000,
                wall_max: 5_000,
                supplied: true,
                neighbors: Vec::new(),
            },
        );
        if let Some(n) = self.state.nations.get_mut(&nation) {
            if n.capital.is_none() {
                n.capital = Some(id);
            }
        }
        self
    }

    /// Two-way road between cities.
    pub fn connect(mut self, a: CityId, b: CityId) -> Self {
        for (from, to) in [(a, b), (b, a)] {
            if let Some(c) = self.state.cities.get_mut(&from) {
                if !c.neighbors.contains(&to) {
                    c.neighbors.push(to);
                }
            }
        }
        self
    }

    /// Officer with stats 70/70/70, 1000 gold and rice and no troops.
    pub fn with_general(mut self, id: GeneralId, nation: NationId, city: CityId) -> Self {
        self.state.generals.insert(
            id,
            General {
                id,
                name: format!("General {id}"),
                nation,
                city,
                officer_level: if nation == 0 { 0 } else { 1 },
                gold: 1_000,
                rice: 1_000,
                crew: 0,
                train: 0,
                atmos: 0,
                stats: Stats::new(70, 70, 70),
                stat_bonus: Stats::default(),
                fleet: None,
                command_points: None,
                last_turns: Default::default(),
            },
        );
        self
    }

    pub fn edit_general(mut self, id: GeneralId, f: impl FnOnce(&mut General)) -> Self {
        if let Some(g) = self.state.generals.get_mut(&id) {
            f(g);
        }
        self
    }

    pub fn edit_city(mut self, id: CityId, f: impl FnOnce(&mut City)) -> Self {
        if let Some(c) = self.state.cities.get_mut(&id) {
            f(c);
        }
        self
    }

    pub fn with_fleet(self, id: GeneralId, position: Coord, units: u32) -> Self {
        self.edit_general(id, |g| g.fleet = Some(Fleet { position, units }))
    }

    pub fn with_command_points(self, id: GeneralId, cp: CommandPoint) -> Self {
        self.edit_general(id, |g| g.command_points = Some(cp))
    }

    pub fn with_cell_kind(mut self, coord: Coord, kind: CellKind) -> Self {
        self.state.grid.set_kind(coord, kind);
        self
    }

    pub fn build(mut self) -> WorldState {
        self.state.place_fleets();
        self.state
    }
}

impl Default for WorldStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Constraint context for `general`, optionally aimed at `dest`.
pub fn context<'a>(
    world: &'a WorldState,
    env: &'a GameEnv,
    config: &'a GameConfig,
    general: GeneralId,
    dest: Option<CityId>,
) -> ConstraintContext<'a> {
    let g = world.generals.get(&general);
    ConstraintContext {
        world,
        env,
        config,
        general: g,
        nation: g.and_then(|g| world.nations.get(&g.nation)),
        city: g.and_then(|g| world.cities.get(&g.city)),
        dest_city: dest.and_then(|d| world.cities.get(&d)),
        dest_coord: None,
    }
}

/// Build, queue and run one command directly, skipping condition checks.
#[cfg(test)]
pub(crate) fn execute(
    world: WorldState,
    actor: GeneralId,
    key: &str,
    raw: serde_json::Value,
) -> (
    crate::command::Command,
    crate::persistence::InMemoryRepository,
    Result<bool, crate::error::EngineError>,
) {
    use crate::command::Command;
    use crate::persistence::InMemoryRepository;
    use crate::rng::SeedStream;

    let config = GameConfig::default();
    let env = GameEnv::default();
    let mut repo = InMemoryRepository::new(world);
    let mut cmd = Command::new(1, actor, env, key, &raw, &config).expect("valid argument");
    cmd.init_constraints(&config);
    cmd.mark_queued();
    let mut rng = SeedStream::for_command(cmd.id(), actor, env.turn_index, key);
    let result = cmd.run(&mut repo, &config, &mut rng);
    (cmd, repo, result)
}
