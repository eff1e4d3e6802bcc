//! `recruit`: turn city population into troops.
//!
//! A general commands at most `leadership * 100` troops; larger orders are
//! trimmed to what still fits. Recruits arrive with the configured train and
//! atmos and are averaged into the existing army.

use super::ranged_field;
use crate::actions::Action;
use crate::command::{Cost, Execution};
use crate::config::GameConfig;
use crate::constraint::{self, custom, Constraint, ConstraintContext};
use crate::error::{ArgumentError, EngineError};
use crate::state::General;
use serde_json::Value;

const MIN_RECRUIT: i64 = 100;

pub fn validate_argument(raw: &Value, config: &GameConfig) -> Result<Action, ArgumentError> {
    let amount = ranged_field("recruit", raw, "amount", MIN_RECRUIT, config.max_recruit)?;
    Ok(Action::Recruit { amount })
}

pub fn min_conditions() -> Vec<Constraint> {
    vec![
        constraint::not_being_neutral(),
        constraint::occupied_city(),
        constraint::supplied_city(),
    ]
}

pub fn full_conditions(amount: i64) -> Vec<Constraint> {
    let mut list = min_conditions();
    list.push(custom(
        "recruit_room",
        "You cannot lead any more troops.",
        |ctx| ctx.general.is_some_and(|g| room(g) > 0),
    ));
    list.push(custom(
        "recruit_population",
        "The city's population is too small.",
        move |ctx| match (ctx.general, ctx.city) {
            (Some(g), Some(c)) => c.pop - effective_amount(g, amount) >= ctx.config.min_city_pop,
            _ => false,
        },
    ));
    list
}

fn room(general: &General) -> i64 {
    (general.real_stats().leadership as i64 * 100 - general.crew).max(0)
}

/// Troops actually raised for an order of `amount`.
pub fn effective_amount(general: &General, amount: i64) -> i64 {
    amount.min(room(general))
}

fn per_hundred(amount: i64, rate: i64) -> i64 {
    (amount * rate + 99) / 100
}

pub fn cost(ctx: &ConstraintContext<'_>, amount: i64) -> Cost {
    let Some(general) = ctx.general else {
        return Cost::default();
    };
    let raised = effective_amount(general, amount);
    Cost::new(
        per_hundred(raised, ctx.config.recruit_gold_per_100),
        per_hundred(raised, ctx.config.recruit_rice_per_100),
    )
}

fn blend(old: i64, old_crew: i64, new: i64, new_crew: i64) -> i64 {
    let total = old_crew + new_crew;
    if total <= 0 {
        return 0;
    }
    (old * old_crew + new * new_crew) / total
}

pub fn run(exec: &mut Execution<'_>, amount: i64) -> Result<bool, EngineError> {
    let config = exec.config;
    let general = exec.actor_general()?;
    let raised = effective_amount(general, amount);
    let city_id = general.city;
    if raised <= 0 {
        exec.push_log("No room for more troops.");
        return Ok(false);
    }

    let city = exec.city_mut(city_id)?;
    city.pop -= raised;

    let general = exec.actor_general_mut()?;
    general.train = blend(general.train, general.crew, config.recruit_train, raised);
    general.atmos = blend(general.atmos, general.crew, config.recruit_atmos, raised);
    general.crew += raised;
    let line = format!("Recruited {raised} troops, now leading {}.", general.crew);
    exec.push_log(line);
    Ok(true)
}
