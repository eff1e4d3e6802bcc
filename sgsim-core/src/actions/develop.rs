//! `develop_farmland`: raise a city's agriculture.
//!
//! The base gain comes from intel and a random spread; a weighted roll then
//! decides between failure, success and a critical success.

use crate::command::Execution;
use crate::constraint::{self, custom, Constraint};
use crate::error::EngineError;
use crate::fixed::Fixed;
use crate::rng::SeedStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Fail,
    Success,
    Critical,
}

pub fn min_conditions() -> Vec<Constraint> {
    vec![
        constraint::not_being_neutral(),
        constraint::occupied_city(),
        constraint::supplied_city(),
    ]
}

pub fn full_conditions() -> Vec<Constraint> {
    let mut list = min_conditions();
    list.push(custom(
        "agri_below_max",
        "The farmland is already fully developed.",
        |ctx| ctx.city.is_some_and(|c| c.agri < c.agri_max),
    ));
    list
}

/// Roll the outcome and the final gain for a general of `intel`.
pub fn roll(
    intel: i64,
    critical_pct: u32,
    fail_pct: u32,
    rng: &mut SeedStream,
) -> Result<(Outcome, i64), EngineError> {
    let spread = rng.rand_fixed(Fixed::from_raw(8_000), Fixed::from_raw(12_000));
    let base = Fixed::from_int(intel.max(1)) * spread;

    let success_pct = 100u32.saturating_sub(critical_pct).saturating_sub(fail_pct);
    let table = [
        (Outcome::Fail, fail_pct),
        (Outcome::Success, success_pct),
        (Outcome::Critical, critical_pct),
    ];
    let outcome = *rng
        .choice_using_weight(&table)
        .map_err(|e| EngineError::violation(e.to_string()))?;

    let factor = match outcome {
        Outcome::Fail => rng.rand_fixed(Fixed::from_raw(2_000), Fixed::from_raw(4_000)),
        Outcome::Success => Fixed::ONE,
        Outcome::Critical => rng.rand_fixed(Fixed::from_raw(15_000), Fixed::from_raw(20_000)),
    };
    Ok((outcome, (base * factor).round_to_int().max(1)))
}

pub fn run(exec: &mut Execution<'_>, rng: &mut SeedStream) -> Result<bool, EngineError> {
    let config = exec.config;
    let general = exec.actor_general()?;
    let intel = general.real_stats().intel as i64;
    let city_id = general.city;

    let (outcome, gain) = roll(intel, config.develop_critical_pct, config.develop_fail_pct, rng)?;
    let city = exec.city_mut(city_id)?;
    let before = city.agri;
    city.agri = (city.agri + gain).min(city.agri_max);
    let applied = city.agri - before;

    let line = match outcome {
        Outcome::Fail => format!("Development went poorly: farmland +{applied}."),
        Outcome::Success => format!("Farmland +{applied}."),
        Outcome::Critical => format!("Development went splendidly: farmland +{applied}."),
    };
    exec.push_log(line);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{execute, WorldStateBuilder};
    use serde_json::Value;

    #[test]
    fn test_roll_is_deterministic() {
        let a = roll(70, 10, 10, &mut SeedStream::new(42)).unwrap();
        let b = roll(70, 10, 10, &mut SeedStream::new(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_roll_outcome_bounds() {
        for seed in 0..500 {
            let (outcome, gain) = roll(70, 10, 10, &mut SeedStream::new(seed)).unwrap();
            match outcome {
                Outcome::Fail => assert!((1..=34).contains(&gain), "{gain}"),
                Outcome::Success => assert!((56..=84).contains(&gain), "{gain}"),
                Outcome::Critical => assert!((84..=168).contains(&gain), "{gain}"),
            }
        }
    }

    #[test]
    fn test_certain_outcomes() {
        let (outcome, _) = roll(70, 100, 0, &mut SeedStream::new(1)).unwrap();
        assert_eq!(outcome, Outcome::Critical);
        let (outcome, _) = roll(70, 0, 100, &mut SeedStream::new(1)).unwrap();
        assert_eq!(outcome, Outcome::Fail);
    }

    #[test]
    fn test_develop_respects_max() {
        let world = WorldStateBuilder::new()
            .with_nation(1, "Wei")
            .with_city(1, "Xuchang", 1)
            .edit_city(1, |c| {
                c.agri = 4990;
                c.agri_max = 5000;
            })
            .with_general(10, 1, 1)
            .build();
        let (cmd, repo, result) = execute(world, 10, "develop_farmland", Value::Null);
        assert_eq!(result, Ok(true));
        assert_eq!(repo.world().cities.get(&1).unwrap().agri, 5000);
        assert_eq!(cmd.logs().len(), 1);
    }
}
