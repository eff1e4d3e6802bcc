//! `move`: march to an adjacent city.

use crate::command::Execution;
use crate::constraint::{self, Constraint};
use crate::error::EngineError;
use crate::state::CityId;

pub fn min_conditions() -> Vec<Constraint> {
    vec![
        constraint::exists_dest_city(),
        constraint::not_same_dest_city(),
        constraint::near_city(1),
    ]
}

pub fn run(exec: &mut Execution<'_>, dest: CityId) -> Result<bool, EngineError> {
    let atmos_loss = exec.config.move_atmos_loss;
    let dest_name = exec.city(dest)?.name.clone();
    let general = exec.actor_general_mut()?;
    general.city = dest;
    general.atmos = (general.atmos - atmos_loss).max(0);
    exec.push_log(format!("Moved to {dest_name}."));
    Ok(true)
}
