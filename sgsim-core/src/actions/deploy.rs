//! `deploy`: attack an adjacent hostile city.
//!
//! Every defender of the city's nation with troops fights, in initiative
//! order, one at a time, for at most `max_battle_phases` phases in total.
//! Poorly trained defenders score zero initiative and go last, but they
//! still stand between the attacker and the walls. If every defender is
//! beaten and phases remain, the attacker assaults the city's defences and
//! takes the city when they reach zero.

use crate::battle::{
    compute_initiative_score, min_supply, order_by_initiative, phase_damage, readiness,
    resolve_damage_outcome, stat_power, DamageInputs, DamageOutcome, InitiativeInputs,
};
use crate::command::{Cost, Execution};
use crate::config::GameConfig;
use crate::constraint::{self, custom, Constraint, ConstraintContext};
use crate::error::EngineError;
use crate::fixed::Fixed;
use crate::rng::SeedStream;
use crate::state::{CityId, General, GeneralId};

/// Garrison strength of a city with no wall.
const CITY_BASE_POWER: i64 = 50;

pub fn min_conditions() -> Vec<Constraint> {
    vec![
        constraint::not_being_neutral(),
        constraint::occupied_city(),
        constraint::req_general_crew(),
        constraint::exists_dest_city(),
        constraint::near_city(1),
        constraint::hostile_dest_city(),
    ]
}

pub fn full_conditions(config: &GameConfig) -> Vec<Constraint> {
    let mut list = min_conditions();
    list.push(constraint::supplied_city());
    list.push(constraint::req_general_train_at_least(config.defence_train));
    list.push(custom(
        "provisions",
        "Not enough rice to feed your troops.",
        |ctx| ctx.general.is_some_and(|g| g.rice >= min_supply(g.crew)),
    ));
    list
}

/// Provisions are consumed during the battle, not up front.
pub fn cost(_ctx: &ConstraintContext<'_>) -> Cost {
    Cost::default()
}

fn initiative_inputs(general: &General, config: &GameConfig) -> InitiativeInputs {
    InitiativeInputs::for_general(general, config.defence_train)
}

fn combat_power(general: &General) -> Fixed {
    stat_power(general.real_stats(), general.full_stats()) * readiness(general.train, general.atmos)
}

/// Bigger armies hit harder, one unit of volume per thousand troops.
fn volume(hp: i64) -> Fixed {
    Fixed::from_ratio(hp, 1000).max(Fixed::ONE)
}

/// One phase between two sides.
fn exchange(rng: &mut SeedStream, own: (Fixed, i64), enemy: (Fixed, i64)) -> DamageOutcome {
    let lo = Fixed::from_raw(9_000);
    let hi = Fixed::from_raw(11_000);
    let own_var = rng.rand_fixed(lo, hi);
    let enemy_var = rng.rand_fixed(lo, hi);
    resolve_damage_outcome(&DamageInputs {
        attacker_hp: own.1,
        defender_hp: enemy.1,
        raw_attacker_damage: phase_damage(own.0, enemy.0, own_var) * volume(own.1),
        raw_defender_damage: phase_damage(enemy.0, own.0, enemy_var) * volume(enemy.1),
    })
}

pub fn run(
    exec: &mut Execution<'_>,
    rng: &mut SeedStream,
    dest_id: CityId,
) -> Result<bool, EngineError> {
    let config = exec.config;
    let attacker = exec.actor_general()?.clone();
    let dest = exec.city(dest_id)?.clone();

    if !compute_initiative_score(&initiative_inputs(&attacker, config)).is_positive() {
        exec.push_log("Your troops are in no state to fight.");
        return Ok(false);
    }
    let att_power = combat_power(&attacker);

    let mut defenders: Vec<(GeneralId, Fixed)> = exec
        .world()
        .generals_in_city(dest_id)
        .into_iter()
        .filter(|g| !g.is_neutral() && g.nation == dest.nation && g.crew > 0)
        .map(|g| (g.id, compute_initiative_score(&initiative_inputs(g, config))))
        .collect();
    order_by_initiative(&mut defenders);

    let mut crew = attacker.crew;
    let mut phases = 0u32;
    let mut all_beaten = true;

    for (def_id, _) in defenders {
        if crew <= 0 || phases >= config.max_battle_phases {
            all_beaten = false;
            break;
        }
        let defender = exec.general(def_id)?;
        let def_power = combat_power(defender);
        let def_name = defender.name.clone();
        let mut def_crew = defender.crew;

        while crew > 0 && def_crew > 0 && phases < config.max_battle_phases {
            let out = exchange(rng, (att_power, crew), (def_power, def_crew));
            crew -= out.defender_damage;
            def_crew -= out.attacker_damage;
            phases += 1;
        }
        if def_crew > 0 {
            all_beaten = false;
        }

        let defender = exec.general_mut(def_id)?;
        let lost = defender.crew - def_crew;
        defender.crew = def_crew;
        exec.push_log(format!("Fought {def_name}: inflicted {lost}, {def_crew} left."));
        if def_crew > 0 {
            break;
        }
    }

    let mut conquered = false;
    if all_beaten && crew > 0 && phases < config.max_battle_phases {
        let city_power = Fixed::from_int(CITY_BASE_POWER) + Fixed::from_ratio(dest.wall, 100);
        let mut def_hp = dest.def;
        while crew > 0 && def_hp > 0 && phases < config.max_battle_phases {
            let out = exchange(rng, (att_power, crew), (city_power, def_hp));
            crew -= out.defender_damage;
            def_hp -= out.attacker_damage;
            phases += 1;
        }

        let city = exec.city_mut(dest_id)?;
        city.def = def_hp;
        if def_hp <= 0 {
            city.def = 0;
            city.nation = attacker.nation;
            conquered = true;
        }
    }

    let general = exec.actor_general_mut()?;
    let lost = general.crew - crew;
    general.crew = crew;
    general.rice = (general.rice - min_supply(attacker.crew)).max(0);
    if conquered {
        general.city = dest_id;
    }
    exec.push_log(format!("Battle at {} over after {phases} phases, lost {lost}.", dest.name));
    if conquered {
        log::info!("general {} took city {}", attacker.id, dest_id);
        exec.push_log(format!("{} has fallen.", dest.name));
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{execute, WorldStateBuilder};
    use serde_json::json;

    fn builder() -> WorldStateBuilder {
        WorldStateBuilder::new()
            .with_nation(1, "Wei")
            .with_nation(2, "Shu")
            .with_city(1, "Xuchang", 1)
            .with_city(2, "Hanzhong", 2)
            .connect(1, 2)
            .with_general(10, 1, 1)
            .edit_general(10, |g| {
                g.crew = 7000;
                g.train = 80;
                g.atmos = 80;
                g.rice = 500;
            })
    }

    #[test]
    fn test_undefended_city_falls() {
        let world = builder().edit_city(2, |c| c.def = 100).build();
        let (cmd, repo, result) = execute(world, 10, "deploy", json!({"dest_city": 2}));
        assert_eq!(result, Ok(true));

        let city = repo.world().cities.get(&2).unwrap();
        assert_eq!(city.nation, 1);
        assert_eq!(city.def, 0);
        let g = repo.world().generals.get(&10).unwrap();
        assert_eq!(g.city, 2);
        assert_eq!(g.rice, 500 - 70);
        assert!(g.crew > 0 && g.crew <= 7000);
        assert!(cmd.logs().iter().any(|l| l.contains("fallen")));
    }

    #[test]
    fn test_defenders_take_losses() {
        let world = builder()
            .with_general(20, 2, 2)
            .edit_general(20, |g| {
                g.crew = 20000;
                g.train = 60;
                g.atmos = 60;
                g.rice = 1000;
            })
            .build();
        let (_, repo, result) = execute(world, 10, "deploy", json!({"dest_city": 2}));
        assert_eq!(result, Ok(true));

        let attacker = repo.world().generals.get(&10).unwrap();
        let defender = repo.world().generals.get(&20).unwrap();
        assert!(attacker.crew >= 0 && attacker.crew < 7000);
        assert!(defender.crew >= 0 && defender.crew < 20000);
        // A large garrison holds for now
        assert_eq!(repo.world().cities.get(&2).unwrap().nation, 2);
        assert_eq!(attacker.city, 1);
    }

    #[test]
    fn test_untrained_garrison_still_defends() {
        let world = builder()
            .edit_city(2, |c| c.def = 100)
            .with_general(20, 2, 2)
            .edit_general(20, |g| {
                g.crew = 20000;
                g.train = 30;
                g.rice = 1000;
            })
            .build();
        let (cmd, repo, result) = execute(world, 10, "deploy", json!({"dest_city": 2}));
        assert_eq!(result, Ok(true));

        let defender = repo.world().generals.get(&20).unwrap();
        assert!(defender.crew < 20000);
        assert!(cmd.logs().iter().any(|l| l.starts_with("Fought General 20")));
        assert_eq!(repo.world().cities.get(&2).unwrap().nation, 2);
        assert_eq!(repo.world().generals.get(&10).unwrap().city, 1);
    }

    #[test]
    fn test_battle_is_reproducible() {
        let build = || {
            builder()
                .with_general(20, 2, 2)
                .edit_general(20, |g| {
                    g.crew = 3000;
                    g.train = 60;
                    g.atmos = 60;
                })
                .build()
        };
        let (_, a, _) = execute(build(), 10, "deploy", json!({"dest_city": 2}));
        let (_, b, _) = execute(build(), 10, "deploy", json!({"dest_city": 2}));
        assert_eq!(a.world().checksum(), b.world().checksum());
    }

    #[test]
    fn test_untrained_troops_do_not_march() {
        let world = builder().edit_general(10, |g| g.train = 10).build();
        let before = world.checksum();
        let (cmd, repo, result) = execute(world, 10, "deploy", json!({"dest_city": 2}));
        assert_eq!(result, Ok(false));
        assert_eq!(repo.world().checksum(), before);
        assert_eq!(cmd.state(), crate::command::CommandState::Failed);
    }

    #[test]
    fn test_full_conditions_need_provisions() {
        let cfg = GameConfig::default();
        let world = builder().edit_general(10, |g| g.rice = 10).build();
        let env = crate::state::GameEnv::default();
        let ctx = crate::testing::context(&world, &env, &cfg, 10, Some(2));
        assert_eq!(
            constraint::first_failure(&full_conditions(&cfg), &ctx).map(|c| c.message()),
            Some("Not enough rice to feed your troops.")
        );
    }
}
