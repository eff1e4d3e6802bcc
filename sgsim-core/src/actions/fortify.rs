//! `fortify`: the ruler spends treasury gold to strengthen the capital.
//!
//! Takes `fortify_pre_turns` extra ticks to prepare and may not be repeated
//! for `fortify_post_turns` ticks after it resolves.

use crate::command::Execution;
use crate::constraint::{self, custom, Constraint};
use crate::error::EngineError;

fn has_capital() -> Constraint {
    custom("has_capital", "Your nation has no capital.", |ctx| {
        match (ctx.general, ctx.nation) {
            (Some(g), Some(n)) => n
                .capital
                .and_then(|id| ctx.world.cities.get(&id))
                .is_some_and(|c| c.nation == g.nation),
            _ => false,
        }
    })
}

pub fn min_conditions() -> Vec<Constraint> {
    vec![constraint::not_being_neutral(), constraint::be_chief()]
}

pub fn full_conditions() -> Vec<Constraint> {
    let mut list = min_conditions();
    list.push(has_capital());
    list
}

pub fn run(exec: &mut Execution<'_>) -> Result<bool, EngineError> {
    let amount = exec.config.fortify_amount;
    let nation_id = exec.actor_general()?.nation;
    let Some(capital) = exec.nation(nation_id)?.capital else {
        exec.push_log("There is no capital to fortify.");
        return Ok(false);
    };

    let city = exec.city_mut(capital)?;
    city.def = (city.def + amount).min(city.def_max);
    city.wall = (city.wall + amount).min(city.wall_max);
    let line = format!("{} fortified: defence {}, wall {}.", city.name, city.def, city.wall);
    exec.push_log(line);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::testing::{execute, WorldStateBuilder};
    use serde_json::Value;

    fn world() -> crate::state::WorldState {
        WorldStateBuilder::new()
            .with_nation(1, "Wei")
            .with_city(1, "Xuchang", 1)
            .with_general(10, 1, 1)
            .edit_general(10, |g| g.officer_level = crate::state::CHIEF_OFFICER_LEVEL)
            .with_general(11, 1, 1)
            .build()
    }

    #[test]
    fn test_fortify_spends_treasury() {
        let cfg = GameConfig::default();
        let w = world();
        let treasury = w.nations.get(&1).unwrap().gold;
        let def = w.cities.get(&1).unwrap().def;
        let general_gold = w.generals.get(&10).unwrap().gold;

        let (cmd, repo, result) = execute(w, 10, "fortify", Value::Null);
        assert_eq!(result, Ok(true));
        assert_eq!(repo.world().nations.get(&1).unwrap().gold, treasury - cfg.fortify_cost);
        assert_eq!(repo.world().cities.get(&1).unwrap().def, def + cfg.fortify_amount);
        // The ruler's own purse is untouched
        assert_eq!(repo.world().generals.get(&10).unwrap().gold, general_gold);
        // Record lives on the nation
        assert!(repo.world().nations.get(&1).unwrap().last_turns.contains_key("fortify"));
        assert_eq!(cmd.post_req_turn(), cfg.fortify_post_turns);
    }

    #[test]
    fn test_only_chief_may_fortify() {
        let cfg = GameConfig::default();
        let w = world();
        let env = crate::state::GameEnv::default();
        let ctx = crate::testing::context(&w, &env, &cfg, 11, None);
        assert_eq!(
            constraint::first_failure(&min_conditions(), &ctx).map(|c| c.message()),
            Some("Only the ruler can issue this order.")
        );
        let ctx = crate::testing::context(&w, &env, &cfg, 10, None);
        assert!(constraint::first_failure(&full_conditions(), &ctx).is_none());
    }
}
