//! Grid admission control for warp movement.
//!
//! The galaxy map is a `width × height` grid. Each cell is typed
//! procedurally from its coordinate the first time it is touched and then
//! tracks how many units each faction keeps there.
//!
//! ## Admission rules (first failure wins)
//! 1. Impassable cells admit nothing.
//! 2. A faction may not exceed the per-faction unit cap in one cell.
//! 3. A newcomer may not enter a cell already holding the maximum number of
//!    distinct factions (default two).
//! 4. A lone flagship may not enter a point of interest held by another
//!    faction unless its own faction already has units there.

use crate::rng::string_hash;
use crate::state::NationId;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance (diagonal jumps cost the same as straight ones).
    pub fn distance(&self, other: &Coord) -> u32 {
        let dx = (self.x - other.x).unsigned_abs();
        let dy = (self.y - other.y).unsigned_abs();
        dx.max(dy)
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    Space,
    /// Star system or other contested landmark.
    PointOfInterest,
    Impassable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionRules {
    pub per_faction_cap: u32,
    pub max_factions: usize,
}

impl Default for AdmissionRules {
    fn default() -> Self {
        Self {
            per_faction_cap: 300,
            max_factions: 2,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AdmissionDenied {
    #[error("cell {coord} is impassable")]
    Impassable { coord: Coord },
    #[error("faction {faction} would hold {} units in one cell (cap {cap})", .current + .incoming)]
    FactionCapacity {
        faction: NationId,
        current: u32,
        incoming: u32,
        cap: u32,
    },
    #[error("cell {coord} is already contested by {present:?}")]
    Contested { coord: Coord, present: Vec<NationId> },
    #[error("a lone flagship cannot enter enemy-held {coord} unsupported")]
    UnsupportedFlagship { coord: Coord },
    #[error("faction {faction} has {present} units at {coord}, cannot move {requested}")]
    NotEnoughUnits {
        coord: Coord,
        faction: NationId,
        present: u32,
        requested: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridCell {
    pub coord: Coord,
    pub kind: CellKind,
    occupancy: BTreeMap<NationId, u32>,
    present: BTreeSet<NationId>,
}

impl GridCell {
    pub fn new(coord: Coord, kind: CellKind) -> Self {
        Self {
            coord,
            kind,
            occupancy: BTreeMap::new(),
            present: BTreeSet::new(),
        }
    }

    pub fn units_of(&self, faction: NationId) -> u32 {
        self.occupancy.get(&faction).copied().unwrap_or(0)
    }

    pub fn factions_present(&self) -> &BTreeSet<NationId> {
        &self.present
    }

    pub fn is_empty(&self) -> bool {
        self.present.is_empty()
    }

    pub fn can_enter(
        &self,
        faction: NationId,
        incoming: u32,
        is_solo_flagship: bool,
        rules: &AdmissionRules,
    ) -> Result<(), AdmissionDenied> {
        if self.kind == CellKind::Impassable {
            return Err(AdmissionDenied::Impassable { coord: self.coord });
        }

        let current = self.units_of(faction);
        if current as u64 + incoming as u64 > rules.per_faction_cap as u64 {
            return Err(AdmissionDenied::FactionCapacity {
                faction,
                current,
                incoming,
                cap: rules.per_faction_cap,
            });
        }

        let already_present = self.present.contains(&faction);
        if !already_present && self.present.len() >= rules.max_factions {
            return Err(AdmissionDenied::Contested {
                coord: self.coord,
                present: self.present.iter().copied().collect(),
            });
        }

        if is_solo_flagship
            && self.kind == CellKind::PointOfInterest
            && current == 0
            && self.present.iter().any(|&f| f != faction)
        {
            return Err(AdmissionDenied::UnsupportedFlagship { coord: self.coord });
        }

        Ok(())
    }

    pub fn add_units(&mut self, faction: NationId, count: u32) {
        if count == 0 {
            return;
        }
        let entry = self.occupancy.entry(faction).or_insert(0);
        *entry = entry.saturating_add(count);
        self.present.insert(faction);
    }

    /// Returns how many units were actually removed.
    pub fn remove_units(&mut self, faction: NationId, count: u32) -> u32 {
        let Some(entry) = self.occupancy.get_mut(&faction) else {
            return 0;
        };
        let removed = count.min(*entry);
        *entry -= removed;
        if *entry == 0 {
            self.occupancy.remove(&faction);
            self.present.remove(&faction);
        }
        removed
    }
}

/// Lazily populated galaxy grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub width: i32,
    pub height: i32,
    /// Mixed into procedural cell typing so two maps can differ.
    pub layout_seed: u32,
    pub rules: AdmissionRules,
    #[serde(with = "cells_as_list")]
    cells: FxHashMap<Coord, GridCell>,
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(100, 50, 0, AdmissionRules::default())
    }
}

impl Grid {
    pub fn new(width: i32, height: i32, layout_seed: u32, rules: AdmissionRules) -> Self {
        Self {
            width,
            height,
            layout_seed,
            rules,
            cells: FxHashMap::default(),
        }
    }

    pub fn in_bounds(&self, coord: Coord) -> bool {
        (0..self.width).contains(&coord.x) && (0..self.height).contains(&coord.y)
    }

    /// Procedural type of a coordinate. Out-of-bounds coordinates are
    /// impassable.
    pub fn procedural_kind(&self, coord: Coord) -> CellKind {
        if !self.in_bounds(coord) {
            return CellKind::Impassable;
        }
        let roll = string_hash(&format!("{}:{},{}", self.layout_seed, coord.x, coord.y)) % 100;
        match roll {
            0..=5 => CellKind::Impassable,
            6..=15 => CellKind::PointOfInterest,
            _ => CellKind::Space,
        }
    }

    /// Current view of a cell without materialising it.
    pub fn peek(&self, coord: Coord) -> GridCell {
        self.cells
            .get(&coord)
            .cloned()
            .unwrap_or_else(|| GridCell::new(coord, self.procedural_kind(coord)))
    }

    /// The cell at `coord`, created on first access.
    pub fn cell(&mut self, coord: Coord) -> &mut GridCell {
        let kind = self.procedural_kind(coord);
        self.cells
            .entry(coord)
            .or_insert_with(|| GridCell::new(coord, kind))
    }

    /// Override a cell's type (scenario maps, tests).
    pub fn set_kind(&mut self, coord: Coord, kind: CellKind) {
        self.cell(coord).kind = kind;
    }

    /// Number of materialised cells.
    pub fn materialised(&self) -> usize {
        self.cells.len()
    }

    /// Empty every cell, keeping cell types.
    pub fn clear_occupancy(&mut self) {
        for cell in self.cells.values_mut() {
            cell.occupancy.clear();
            cell.present.clear();
        }
    }

    pub fn can_enter(
        &self,
        coord: Coord,
        faction: NationId,
        incoming: u32,
        is_solo_flagship: bool,
    ) -> Result<(), AdmissionDenied> {
        self.peek(coord)
            .can_enter(faction, incoming, is_solo_flagship, &self.rules)
    }

    /// Check and add in one step.
    pub fn try_enter(
        &mut self,
        coord: Coord,
        faction: NationId,
        incoming: u32,
        is_solo_flagship: bool,
    ) -> Result<(), AdmissionDenied> {
        let rules = self.rules;
        let cell = self.cell(coord);
        cell.can_enter(faction, incoming, is_solo_flagship, &rules)?;
        cell.add_units(faction, incoming);
        Ok(())
    }

    pub fn leave(&mut self, coord: Coord, faction: NationId, count: u32) -> u32 {
        match self.cells.get_mut(&coord) {
            Some(cell) => cell.remove_units(faction, count),
            None => 0,
        }
    }

    /// Move units between cells. Nothing changes unless the source holds
    /// `count` units and the target admits them.
    pub fn transfer(
        &mut self,
        from: Coord,
        to: Coord,
        faction: NationId,
        count: u32,
        is_solo_flagship: bool,
    ) -> Result<(), AdmissionDenied> {
        let present = self.peek(from).units_of(faction);
        if present < count {
            return Err(AdmissionDenied::NotEnoughUnits {
                coord: from,
                faction,
                present,
                requested: count,
            });
        }
        if from == to {
            return Ok(());
        }
        self.can_enter(to, faction, count, is_solo_flagship)?;
        self.leave(from, faction, count);
        self.cell(to).add_units(faction, count);
        log::debug!("faction {} moved {} units {} -> {}", faction, count, from, to);
        Ok(())
    }
}

/// JSON maps need string keys, so cells serialize as a list sorted by
/// coordinate.
mod cells_as_list {
    use super::{Coord, GridCell};
    use rustc_hash::FxHashMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        cells: &FxHashMap<Coord, GridCell>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut list: Vec<&GridCell> = cells.values().collect();
        list.sort_by_key(|c| c.coord);
        list.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<FxHashMap<Coord, GridCell>, D::Error> {
        let list = Vec::<GridCell>::deserialize(deserializer)?;
        Ok(list.into_iter().map(|c| (c.coord, c)).collect())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Whatever sequence of guarded entries and exits happens, the caps
        /// hold and the present set mirrors the counts.
        #[test]
        fn prop_caps_hold(
            ops in proptest::collection::vec(
                (1u32..5, 1u32..40, any::<bool>(), any::<bool>()),
                1..80,
            ),
        ) {
            let rules = AdmissionRules { per_faction_cap: 60, max_factions: 2 };
            let mut cell = GridCell::new(Coord::new(0, 0), CellKind::PointOfInterest);
            for (faction, count, enter, solo) in ops {
                if enter {
                    if cell.can_enter(faction, count, solo, &rules).is_ok() {
                        cell.add_units(faction, count);
                    }
                } else {
                    cell.remove_units(faction, count);
                }
                prop_assert!(cell.factions_present().len() <= rules.max_factions);
                for f in 1u32..5 {
                    prop_assert!(cell.units_of(f) <= rules.per_faction_cap);
                    prop_assert_eq!(cell.units_of(f) > 0, cell.factions_present().contains(&f));
                }
            }
        }
    }
}
