//! `rest`: do nothing, successfully.

use crate::command::Execution;
use crate::constraint::Constraint;
use crate::error::EngineError;

pub fn min_conditions() -> Vec<Constraint> {
    Vec::new()
}

pub fn run(exec: &mut Execution<'_>) -> Result<bool, EngineError> {
    let name = exec.actor_general()?.name.clone();
    exec.push_log(format!("{name} rested."));
    Ok(true)
}

#[cfg(test)]
mod tests {
    use crate::testing::{execute, WorldStateBuilder};
    use serde_json::Value;

    #[test]
    fn test_rest_always_succeeds() {
        let world = WorldStateBuilder::new()
            .with_city(1, "Xiangyang", 0)
            .with_general(7, 0, 1)
            .build();
        let before = world.generals.get(&7).cloned().unwrap();

        let (cmd, repo, result) = execute(world, 7, "rest", Value::Null);
        assert_eq!(result, Ok(true));
        assert_eq!(cmd.logs().len(), 1);

        let after = repo.world().generals.get(&7).unwrap();
        assert_eq!((after.gold, after.rice, after.crew), (before.gold, before.rice, before.crew));
        assert!(after.last_turns.contains_key("rest"));
    }
}
