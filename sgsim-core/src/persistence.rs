//! Storage boundary.
//!
//! The engine never talks to a database directly. It reads a snapshot,
//! works on a private copy and hands back a [`ChangeSet`] holding every
//! entity it touched. `commit` is all-or-nothing.

use crate::admission::Grid;
use crate::error::PersistenceError;
use crate::state::{City, General, GeneralId, Nation, WorldState};

/// Entities mutated by one command, saved together.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub generals: Vec<General>,
    pub cities: Vec<City>,
    pub nations: Vec<Nation>,
    pub grid: Option<Grid>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.generals.is_empty()
            && self.cities.is_empty()
            && self.nations.is_empty()
            && self.grid.is_none()
    }

    pub fn len(&self) -> usize {
        self.generals.len() + self.cities.len() + self.nations.len() + self.grid.is_some() as usize
    }
}

pub trait Repository {
    fn load_general(&self, id: GeneralId) -> Result<General, PersistenceError>;

    /// Consistent view of the whole world.
    fn snapshot(&self) -> Result<WorldState, PersistenceError>;

    /// Save every entity in `changes`, or none of them.
    fn commit(&mut self, changes: ChangeSet) -> Result<(), PersistenceError>;
}

/// In-process store used by tests and the headless runner.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    world: WorldState,
    commits: u64,
    fail_commits: u32,
}

impl InMemoryRepository {
    pub fn new(world: WorldState) -> Self {
        Self {
            world,
            commits: 0,
            fail_commits: 0,
        }
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn into_world(self) -> WorldState {
        self.world
    }

    /// Number of successful commits so far.
    pub fn commits(&self) -> u64 {
        self.commits
    }

    /// Make the next `n` commits fail with `Unavailable`.
    pub fn fail_next_commits(&mut self, n: u32) {
        self.fail_commits = n;
    }
}

impl Repository for InMemoryRepository {
    fn load_general(&self, id: GeneralId) -> Result<General, PersistenceError> {
        self.world
            .generals
            .get(&id)
            .cloned()
            .ok_or(PersistenceError::GeneralNotFound(id))
    }

    fn snapshot(&self) -> Result<WorldState, PersistenceError> {
        Ok(self.world.clone())
    }

    fn commit(&mut self, changes: ChangeSet) -> Result<(), PersistenceError> {
        if self.fail_commits > 0 {
            self.fail_commits -= 1;
            return Err(PersistenceError::Unavailable(
                "injected commit failure".into(),
            ));
        }
        log::trace!("commit: {} entities", changes.len());
        for g in changes.generals {
            self.world.generals.insert(g.id, g);
        }
        for c in changes.cities {
            self.world.cities.insert(c.id, c);
        }
        for n in changes.nations {
            self.world.nations.insert(n.id, n);
        }
        if let Some(grid) = changes.grid {
            self.world.grid = grid;
        }
        self.commits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::WorldStateBuilder;

    fn repo() -> InMemoryRepository {
        InMemoryRepository::new(
            WorldStateBuilder::new()
                .with_nation(1, "Wei")
                .with_city(1, "Xuchang", 1)
                .with_general(10, 1, 1)
                .build(),
        )
    }

    #[test]
    fn test_load_missing_general() {
        assert_eq!(
            repo().load_general(99),
            Err(PersistenceError::GeneralNotFound(99))
        );
    }

    #[test]
    fn test_commit_applies_all() {
        let mut repo = repo();
        let mut g = repo.load_general(10).unwrap();
        g.gold = 1;
        let mut c = repo.world().cities.get(&1).unwrap().clone();
        c.agri = 4321;
        repo.commit(ChangeSet {
            generals: vec![g],
            cities: vec![c],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(repo.world().generals.get(&10).unwrap().gold, 1);
        assert_eq!(repo.world().cities.get(&1).unwrap().agri, 4321);
        assert_eq!(repo.commits(), 1);
    }

    #[test]
    fn test_failed_commit_changes_nothing() {
        let mut repo = repo();
        let before = repo.world().checksum();
        let mut g = repo.load_general(10).unwrap();
        g.gold = 1;
        repo.fail_next_commits(1);
        let result = repo.commit(ChangeSet {
            generals: vec![g.clone()],
            ..Default::default()
        });
        assert!(matches!(result, Err(PersistenceError::Unavailable(_))));
        assert_eq!(repo.world().checksum(), before);
        assert_eq!(repo.commits(), 0);

        // Next one goes through
        repo.commit(ChangeSet {
            generals: vec![g],
            ..Default::default()
        })
        .unwrap();
        assert_ne!(repo.world().checksum(), before);
    }
}
