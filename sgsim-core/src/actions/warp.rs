//! `warp`: jump a fleet to another grid cell.
//!
//! Costs military command points (political points cover a shortfall at
//! double rate) and is subject to cell admission at the destination.

use super::int_field;
use crate::actions::Action;
use crate::admission::Coord;
use crate::command::Execution;
use crate::command_point::CpPool;
use crate::config::GameConfig;
use crate::constraint::{self, custom, Constraint};
use crate::error::{ArgumentError, EngineError};
use serde_json::Value;

pub fn validate_argument(raw: &Value) -> Result<Action, ArgumentError> {
    let coord = |field: &str| -> Result<i32, ArgumentError> {
        let v = int_field("warp", raw, field)?;
        i32::try_from(v).map_err(|_| ArgumentError::OutOfRange {
            action: "warp".into(),
            field: field.into(),
            value: v,
            min: i32::MIN as i64,
            max: i32::MAX as i64,
        })
    };
    Ok(Action::Warp {
        target: Coord::new(coord("x")?, coord("y")?),
    })
}

pub fn min_conditions(config: &GameConfig) -> Vec<Constraint> {
    vec![
        constraint::has_fleet(),
        constraint::within_warp_range(config.warp_range),
        constraint::has_command_points(CpPool::Secondary, config.warp_cp_cost),
    ]
}

pub fn full_conditions(config: &GameConfig, target: Coord) -> Vec<Constraint> {
    let mut list = min_conditions(config);
    list.push(custom(
        "admission",
        "The destination cannot be entered.",
        move |ctx| {
            ctx.general.and_then(|g| g.fleet.map(|f| (g.nation, f))).is_some_and(|(nation, fleet)| {
                ctx.world
                    .grid
                    .can_enter(target, nation, fleet.units, fleet.is_solo_flagship())
                    .is_ok()
            })
        },
    ));
    list
}

pub fn run(exec: &mut Execution<'_>, target: Coord) -> Result<bool, EngineError> {
    let cp_cost = exec.config.warp_cp_cost;
    let general = exec.actor_general()?;
    let nation = general.nation;
    let (Some(fleet), Some(mut ledger)) = (general.fleet, general.command_points.clone()) else {
        exec.push_log("You command no fleet.");
        return Ok(false);
    };

    let Some(charge) = ledger.charge(CpPool::Secondary, cp_cost) else {
        let err = EngineError::ResourceExhausted {
            pool: CpPool::Secondary,
            requested: cp_cost,
        };
        exec.push_log(err.to_string());
        return Ok(false);
    };

    if let Err(denied) = exec
        .grid_mut()
        .transfer(fleet.position, target, nation, fleet.units, fleet.is_solo_flagship())
    {
        let err = EngineError::from(denied);
        exec.push_log(err.to_string());
        return Ok(false);
    }

    let general = exec.actor_general_mut()?;
    general.command_points = Some(ledger);
    if let Some(f) = general.fleet.as_mut() {
        f.position = target;
    }
    exec.push_log(format!(
        "Warped {} -> {} ({} MCP, {} PCP).",
        fleet.position, target, charge.direct, charge.substituted
    ));
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::CellKind;
    use crate::command_point::CommandPoint;
    use crate::testing::{execute, WorldStateBuilder};
    use serde_json::json;

    const HOME: Coord = Coord::new(10, 10);
    const TARGET: Coord = Coord::new(12, 11);

    fn builder(cp: CommandPoint, units: u32) -> WorldStateBuilder {
        WorldStateBuilder::new()
            .with_nation(1, "Wei")
            .with_nation(2, "Shu")
            .with_nation(3, "Wu")
            .with_city(1, "Xuchang", 1)
            .with_general(10, 1, 1)
            .with_cell_kind(HOME, CellKind::Space)
            .with_cell_kind(TARGET, CellKind::Space)
            .with_fleet(10, HOME, units)
            .with_command_points(10, cp)
    }

    #[test]
    fn test_argument() {
        assert_eq!(
            validate_argument(&json!({"x": 3, "y": -1})),
            Ok(Action::Warp {
                target: Coord::new(3, -1)
            })
        );
        assert!(matches!(
            validate_argument(&json!({"x": 3})),
            Err(ArgumentError::MissingField { .. })
        ));
        assert!(matches!(
            validate_argument(&json!({"x": 3, "y": 1u64 << 40})),
            Err(ArgumentError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_warp_moves_fleet_and_charges() {
        let world = builder(CommandPoint::new(20, 3, 20, 20), 40).build();
        let (_, repo, result) = execute(world, 10, "warp", json!({"x": TARGET.x, "y": TARGET.y}));
        assert_eq!(result, Ok(true));

        let g = repo.world().generals.get(&10).unwrap();
        assert_eq!(g.fleet.unwrap().position, TARGET);
        let cp = g.command_points.as_ref().unwrap();
        // 3 MCP direct, 7 short covered by 14 PCP
        assert_eq!((cp.primary(), cp.secondary()), (6, 0));
        assert_eq!(repo.world().grid.peek(TARGET).units_of(1), 40);
        assert_eq!(repo.world().grid.peek(HOME).units_of(1), 0);
    }

    #[test]
    fn test_exhausted_points_change_nothing() {
        let world = builder(CommandPoint::new(0, 3, 20, 20), 40).build();
        let before = world.checksum();
        let (cmd, repo, result) = execute(world, 10, "warp", json!({"x": TARGET.x, "y": TARGET.y}));
        assert_eq!(result, Ok(false));
        assert_eq!(repo.world().checksum(), before);
        assert!(cmd.logs()[0].contains("not enough"));
    }

    #[test]
    fn test_contested_cell_denied() {
        let world = builder(CommandPoint::full(20, 20), 40)
            .with_general(20, 2, 1)
            .with_fleet(20, TARGET, 5)
            .with_general(30, 3, 1)
            .with_fleet(30, TARGET, 5)
            .build();
        let before = world.checksum();
        let (cmd, repo, result) = execute(world, 10, "warp", json!({"x": TARGET.x, "y": TARGET.y}));
        assert_eq!(result, Ok(false));
        assert_eq!(repo.world().checksum(), before);
        assert!(cmd.logs()[0].contains("admission denied"));
    }
}
