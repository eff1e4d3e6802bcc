use crate::admission::{Coord, Grid};
use crate::command_point::CommandPoint;
use im::OrdMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

pub type GeneralId = u64;
pub type CityId = u32;
pub type NationId = u32;

/// Nation id of generals and cities that belong to nobody.
pub const NEUTRAL: NationId = 0;

/// Officer level of a nation's ruler.
pub const CHIEF_OFFICER_LEVEL: u8 = 12;

/// Environment snapshot handed to every command by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEnv {
    pub year: i32,
    pub month: u8,
    /// Monotonic scheduler tick counter. Opaque to everything but seeding.
    pub turn_index: u64,
    pub start_year: i32,
}

impl GameEnv {
    pub fn new(year: i32, month: u8, turn_index: u64) -> Self {
        Self {
            year,
            month,
            turn_index,
            start_year: year,
        }
    }

    /// Environment for the next tick: one month later.
    pub fn next_turn(&self) -> Self {
        let (year, month) = if self.month >= 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        Self {
            year,
            month,
            turn_index: self.turn_index + 1,
            start_year: self.start_year,
        }
    }
}

impl Default for GameEnv {
    fn default() -> Self {
        Self::new(184, 1, 0)
    }
}

impl std::fmt::Display for GameEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:02} (turn {})", self.year, self.month, self.turn_index)
    }
}

/// Numeric field access by name, used by field-comparison constraints.
pub trait FieldLookup {
    fn field(&self, name: &str) -> Option<i64>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub leadership: i32,
    pub strength: i32,
    pub intel: i32,
}

impl Stats {
    pub fn new(leadership: i32, strength: i32, intel: i32) -> Self {
        Self {
            leadership,
            strength,
            intel,
        }
    }
}

/// Record of the last resolved action of a family, used for progress display
/// and for cooldown checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastTurn {
    pub action: String,
    pub arg: serde_json::Value,
    /// Elapsed scheduler ticks while waiting on `pre_req_turn`.
    pub term: u32,
    /// Turn index the effect resolved on.
    pub resolved_turn: u64,
}

/// Warp-capable fleet of the galaxy variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fleet {
    pub position: Coord,
    /// Ship count, flagship included.
    pub units: u32,
}

impl Fleet {
    pub fn is_solo_flagship(&self) -> bool {
        self.units == 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct General {
    pub id: GeneralId,
    pub name: String,
    pub nation: NationId,
    pub city: CityId,
    pub officer_level: u8,
    pub gold: i64,
    pub rice: i64,
    pub crew: i64,
    pub train: i64,
    pub atmos: i64,
    /// Base stats.
    pub stats: Stats,
    /// Temporary bonuses (items, buffs). Real stats = base + bonus.
    #[serde(default)]
    pub stat_bonus: Stats,
    #[serde(default)]
    pub fleet: Option<Fleet>,
    #[serde(default)]
    pub command_points: Option<CommandPoint>,
    /// Last resolved action per action family.
    #[serde(default)]
    pub last_turns: BTreeMap<String, LastTurn>,
}

impl General {
    pub fn real_stats(&self) -> Stats {
        Stats {
            leadership: self.stats.leadership + self.stat_bonus.leadership,
            strength: self.stats.strength + self.stat_bonus.strength,
            intel: self.stats.intel + self.stat_bonus.intel,
        }
    }

    pub fn full_stats(&self) -> Stats {
        self.stats
    }

    pub fn is_neutral(&self) -> bool {
        self.nation == NEUTRAL
    }

    pub fn is_chief(&self) -> bool {
        self.officer_level >= CHIEF_OFFICER_LEVEL
    }
}

impl FieldLookup for General {
    fn field(&self, name: &str) -> Option<i64> {
        let real = self.real_stats();
        let v = match name {
            "nation" => self.nation as i64,
            "city" => self.city as i64,
            "officer_level" => self.officer_level as i64,
            "gold" => self.gold,
            "rice" => self.rice,
            "crew" => self.crew,
            "train" => self.train,
            "atmos" => self.atmos,
            "leadership" => real.leadership as i64,
            "strength" => real.strength as i64,
            "intel" => real.intel as i64,
            _ => return None,
        };
        Some(v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: CityId,
    pub name: String,
    pub nation: NationId,
    pub pop: i64,
    pub pop_max: i64,
    pub agri: i64,
    pub agri_max: i64,
    pub comm: i64,
    pub comm_max: i64,
    pub def: i64,
    pub def_max: i64,
    pub wall: i64,
    pub wall_max: i64,
    /// Connected to the nation's capital by friendly territory.
    pub supplied: bool,
    pub neighbors: Vec<CityId>,
}

impl FieldLookup for City {
    fn field(&self, name: &str) -> Option<i64> {
        let v = match name {
            "nation" => self.nation as i64,
            "pop" => self.pop,
            "pop_max" => self.pop_max,
            "agri" => self.agri,
            "agri_max" => self.agri_max,
            "comm" => self.comm,
            "comm_max" => self.comm_max,
            "def" => self.def,
            "def_max" => self.def_max,
            "wall" => self.wall,
            "wall_max" => self.wall_max,
            "supplied" => self.supplied as i64,
            _ => return None,
        };
        Some(v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nation {
    pub id: NationId,
    pub name: String,
    pub gold: i64,
    pub rice: i64,
    pub capital: Option<CityId>,
    #[serde(default)]
    pub last_turns: BTreeMap<String, LastTurn>,
}

impl FieldLookup for Nation {
    fn field(&self, name: &str) -> Option<i64> {
        let v = match name {
            "gold" => self.gold,
            "rice" => self.rice,
            "capital" => self.capital.map(|c| c as i64).unwrap_or(-1),
            _ => return None,
        };
        Some(v)
    }
}

/// The canonical world. Entity maps are `im::OrdMap` so that a command can
/// work on an O(1) clone and iteration order never depends on hashing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldState {
    pub generals: OrdMap<GeneralId, General>,
    pub cities: OrdMap<CityId, City>,
    pub nations: OrdMap<NationId, Nation>,
    #[serde(default)]
    pub grid: Grid,
}

impl WorldState {
    /// Generals stationed in a city, ascending by id.
    pub fn generals_in_city(&self, city: CityId) -> Vec<&General> {
        self.generals.values().filter(|g| g.city == city).collect()
    }

    /// Hop distance between two cities over the neighbor graph.
    pub fn city_distance(&self, from: CityId, to: CityId) -> Option<u32> {
        if from == to {
            return self.cities.contains_key(&from).then_some(0);
        }
        let mut seen = std::collections::BTreeSet::new();
        let mut queue = VecDeque::new();
        seen.insert(from);
        queue.push_back((from, 0u32));
        while let Some((id, dist)) = queue.pop_front() {
            let Some(city) = self.cities.get(&id) else {
                continue;
            };
            for &next in &city.neighbors {
                if next == to {
                    return Some(dist + 1);
                }
                if seen.insert(next) {
                    queue.push_back((next, dist + 1));
                }
            }
        }
        None
    }

    /// Rebuild grid occupancy from fleet positions. Used when loading a
    /// scenario, where fleets are authored on generals.
    pub fn place_fleets(&mut self) {
        self.grid.clear_occupancy();
        for g in self.generals.values() {
            if let Some(fleet) = g.fleet {
                self.grid.cell(fleet.position).add_units(g.nation, fleet.units);
            }
        }
    }

    /// Deterministic checksum for replay validation.
    ///
    /// Identical states produce identical checksums on every platform.
    pub fn checksum(&self) -> u64 {
        use rustc_hash::FxHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = FxHasher::default();
        for g in self.generals.values() {
            g.id.hash(&mut hasher);
            g.nation.hash(&mut hasher);
            g.city.hash(&mut hasher);
            g.gold.hash(&mut hasher);
            g.rice.hash(&mut hasher);
            g.crew.hash(&mut hasher);
            g.train.hash(&mut hasher);
            g.atmos.hash(&mut hasher);
            if let Some(fleet) = &g.fleet {
                fleet.position.hash(&mut hasher);
                fleet.units.hash(&mut hasher);
            }
            if let Some(cp) = &g.command_points {
                cp.primary().hash(&mut hasher);
                cp.secondary().hash(&mut hasher);
            }
        }
        for c in self.cities.values() {
            c.id.hash(&mut hasher);
            c.nation.hash(&mut hasher);
            c.pop.hash(&mut hasher);
            c.agri.hash(&mut hasher);
            c.def.hash(&mut hasher);
            c.wall.hash(&mut hasher);
        }
        for n in self.nations.values() {
            n.id.hash(&mut hasher);
            n.gold.hash(&mut hasher);
            n.rice.hash(&mut hasher);
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::WorldStateBuilder;

    #[test]
    fn test_env_rolls_over_year() {
        let env = GameEnv::new(190, 12, 83);
        let next = env.next_turn();
        assert_eq!((next.year, next.month, next.turn_index), (191, 1, 84));
        assert_eq!(next.start_year, 190);
    }

    #[test]
    fn test_real_and_full_stats() {
        let world = WorldStateBuilder::new()
            .with_nation(1, "Wei")
            .with_city(1, "Xuchang", 1)
            .with_general(10, 1, 1)
            .build();
        let mut g = world.generals.get(&10).unwrap().clone();
        g.stat_bonus = Stats::new(5, 0, -3);
        assert_eq!(g.real_stats().leadership, g.stats.leadership + 5);
        assert_eq!(g.real_stats().intel, g.stats.intel - 3);
        assert_eq!(g.full_stats(), g.stats);
        assert_eq!(g.field("leadership"), Some(g.real_stats().leadership as i64));
        assert_eq!(g.field("bogus"), None);
    }

    #[test]
    fn test_city_distance() {
        let world = WorldStateBuilder::new()
            .with_nation(1, "Wei")
            .with_city(1, "A", 1)
            .with_city(2, "B", 1)
            .with_city(3, "C", 1)
            .with_city(4, "Island", 1)
            .connect(1, 2)
            .connect(2, 3)
            .build();
        assert_eq!(world.city_distance(1, 1), Some(0));
        assert_eq!(world.city_distance(1, 2), Some(1));
        assert_eq!(world.city_distance(1, 3), Some(2));
        assert_eq!(world.city_distance(1, 4), None);
    }

    #[test]
    fn test_checksum_deterministic() {
        let build = || {
            WorldStateBuilder::new()
                .with_nation(1, "Wei")
                .with_city(1, "Xuchang", 1)
                .with_general(10, 1, 1)
                .build()
        };
        assert_eq!(build().checksum(), build().checksum());

        let mut changed = build();
        if let Some(g) = changed.generals.get_mut(&10) {
            g.gold += 1;
        }
        assert_ne!(changed.checksum(), build().checksum());
    }
}
