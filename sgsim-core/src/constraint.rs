//! Named, reusable preconditions for commands.
//!
//! A [`Constraint`] pairs a pure predicate over a [`ConstraintContext`] with
//! the message shown when it fails. Commands hold them in ordered lists and
//! report the first failure, so list order is part of the user-facing
//! behaviour: cheap checks go first.
//!
//! Builders:
//! - [`require_field`] compares a numeric field of a target entity.
//! - [`custom`] wraps an arbitrary predicate.
//! - The remaining functions are the common game rules built on those two.

use crate::admission::Coord;
use crate::command::CommandScope;
use crate::config::GameConfig;
use crate::state::{City, FieldLookup, GameEnv, General, Nation, WorldState};
use std::borrow::Cow;
use std::sync::Arc;

/// Read-only view of everything a constraint may inspect.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintContext<'a> {
    pub world: &'a WorldState,
    pub env: &'a GameEnv,
    pub config: &'a GameConfig,
    pub general: Option<&'a General>,
    pub nation: Option<&'a Nation>,
    /// The acting general's current city.
    pub city: Option<&'a City>,
    pub dest_city: Option<&'a City>,
    pub dest_coord: Option<Coord>,
}

/// Entity a field comparison reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    General,
    Nation,
    City,
    DestCity,
}

impl Target {
    fn lookup(self, ctx: &ConstraintContext<'_>, field: &str) -> Option<i64> {
        match self {
            Target::General => ctx.general?.field(field),
            Target::Nation => ctx.nation?.field(field),
            Target::City => ctx.city?.field(field),
            Target::DestCity => ctx.dest_city?.field(field),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn apply(self, lhs: i64, rhs: i64) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
        }
    }
}

type Predicate = Arc<dyn Fn(&ConstraintContext<'_>) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct Constraint {
    name: Cow<'static, str>,
    message: String,
    predicate: Predicate,
}

impl Constraint {
    pub fn check(&self, ctx: &ConstraintContext<'_>) -> bool {
        (self.predicate)(ctx)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constraint")
            .field("name", &self.name)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// First constraint in `list` that fails, in declaration order.
pub fn first_failure<'c>(
    list: &'c [Constraint],
    ctx: &ConstraintContext<'_>,
) -> Option<&'c Constraint> {
    list.iter().find(|c| !c.check(ctx))
}

pub fn custom<F>(
    name: impl Into<Cow<'static, str>>,
    message: impl Into<String>,
    predicate: F,
) -> Constraint
where
    F: Fn(&ConstraintContext<'_>) -> bool + Send + Sync + 'static,
{
    Constraint {
        name: name.into(),
        message: message.into(),
        predicate: Arc::new(predicate),
    }
}

/// `target.field OP value`, failing with `message`. A missing entity or an
/// unknown field fails the check.
pub fn require_field(
    target: Target,
    field: &'static str,
    op: CmpOp,
    value: i64,
    message: impl Into<String>,
) -> Constraint {
    custom(
        format!("{target:?}.{field} {op:?} {value}"),
        message,
        move |ctx| {
            target
                .lookup(ctx, field)
                .is_some_and(|actual| op.apply(actual, value))
        },
    )
}

pub fn not_being_neutral() -> Constraint {
    custom("not_being_neutral", "You do not serve any nation.", |ctx| {
        ctx.general.is_some_and(|g| !g.is_neutral())
    })
}

pub fn be_neutral() -> Constraint {
    custom("be_neutral", "You already serve a nation.", |ctx| {
        ctx.general.is_some_and(|g| g.is_neutral())
    })
}

pub fn be_chief() -> Constraint {
    custom("be_chief", "Only the ruler can issue this order.", |ctx| {
        ctx.general.is_some_and(|g| g.is_chief())
    })
}

pub fn occupied_city() -> Constraint {
    custom("occupied_city", "This city does not belong to your nation.", |ctx| {
        match (ctx.general, ctx.city) {
            (Some(g), Some(c)) => !g.is_neutral() && c.nation == g.nation,
            _ => false,
        }
    })
}

pub fn supplied_city() -> Constraint {
    custom("supplied_city", "This city is cut off from supply.", |ctx| {
        ctx.city.is_some_and(|c| c.supplied)
    })
}

pub fn req_general_gold(amount: i64) -> Constraint {
    require_field(Target::General, "gold", CmpOp::Ge, amount, "Not enough gold.")
}

pub fn req_general_rice(amount: i64) -> Constraint {
    require_field(Target::General, "rice", CmpOp::Ge, amount, "Not enough rice.")
}

pub fn req_general_crew() -> Constraint {
    require_field(Target::General, "crew", CmpOp::Gt, 0, "You have no troops.")
}

pub fn req_general_train_below(max: i64) -> Constraint {
    require_field(
        Target::General,
        "train",
        CmpOp::Lt,
        max,
        "Your troops are already fully trained.",
    )
}

pub fn req_general_train_at_least(min: i64) -> Constraint {
    require_field(
        Target::General,
        "train",
        CmpOp::Ge,
        min,
        "Your troops are too poorly trained to engage.",
    )
}

pub fn req_general_atmos_below(max: i64) -> Constraint {
    require_field(
        Target::General,
        "atmos",
        CmpOp::Lt,
        max,
        "Your troops' morale is already at its peak.",
    )
}

pub fn req_nation_gold(amount: i64) -> Constraint {
    require_field(Target::Nation, "gold", CmpOp::Ge, amount, "The treasury lacks gold.")
}

pub fn req_nation_rice(amount: i64) -> Constraint {
    require_field(Target::Nation, "rice", CmpOp::Ge, amount, "The granary lacks rice.")
}

pub fn exists_dest_city() -> Constraint {
    custom("exists_dest_city", "No such city.", |ctx| ctx.dest_city.is_some())
}

pub fn not_same_dest_city() -> Constraint {
    custom("not_same_dest_city", "You are already in that city.", |ctx| {
        match (ctx.city, ctx.dest_city) {
            (Some(a), Some(b)) => a.id != b.id,
            _ => false,
        }
    })
}

pub fn near_city(distance: u32) -> Constraint {
    custom(
        format!("near_city({distance})"),
        "That city is too far away.",
        move |ctx| match (ctx.city, ctx.dest_city) {
            (Some(a), Some(b)) => ctx
                .world
                .city_distance(a.id, b.id)
                .is_some_and(|d| d <= distance),
            _ => false,
        },
    )
}

pub fn hostile_dest_city() -> Constraint {
    custom("hostile_dest_city", "You cannot attack your own city.", |ctx| {
        match (ctx.general, ctx.dest_city) {
            (Some(g), Some(c)) => c.nation != g.nation,
            _ => false,
        }
    })
}

/// Blocks the action family until `post_turns` ticks have passed since its
/// last resolution.
pub fn available_after_cooldown(
    scope: CommandScope,
    family: &'static str,
    post_turns: u32,
) -> Constraint {
    custom(
        format!("cooldown({family})"),
        format!("This order can be given only once every {post_turns} turns."),
        move |ctx| {
            let last = match scope {
                CommandScope::General => ctx.general.and_then(|g| g.last_turns.get(family)),
                CommandScope::Nation => ctx.nation.and_then(|n| n.last_turns.get(family)),
            };
            match last {
                Some(last) => ctx.env.turn_index >= last.resolved_turn + post_turns as u64,
                None => true,
            }
        },
    )
}

pub fn has_fleet() -> Constraint {
    custom("has_fleet", "You command no fleet.", |ctx| {
        ctx.general.is_some_and(|g| g.fleet.is_some_and(|f| f.units > 0))
    })
}

/// Enough points in either pool to pay `amount` from `pool`, substitution
/// included.
pub fn has_command_points(pool: crate::command_point::CpPool, amount: i64) -> Constraint {
    custom("has_command_points", "Not enough command points.", move |ctx| {
        ctx.general
            .and_then(|g| g.command_points.as_ref())
            .is_some_and(|cp| cp.quote(pool, amount).is_some())
    })
}

pub fn within_warp_range(range: u32) -> Constraint {
    custom(
        format!("within_warp_range({range})"),
        "The destination is beyond warp range.",
        move |ctx| {
            let from = ctx.general.and_then(|g| g.fleet).map(|f| f.position);
            match (from, ctx.dest_coord) {
                (Some(from), Some(to)) => {
                    ctx.world.grid.in_bounds(to) && from != to && from.distance(&to) <= range
                }
                _ => false,
            }
        },
    )
}
