//! Battle math: initiative ordering and damage settlement.
//!
//! Everything here is pure and fixed-point; callers supply randomness (the
//! `variance` argument of [`phase_damage`]) from the command's own
//! [`SeedStream`](crate::rng::SeedStream).
//!
//! ## Initiative
//!
//! ```text
//! blend(stat) = (3 * real + full) / 4
//! power       = blend(leadership) + blend(strength) / 2 + blend(intel) / 2
//! score       = crew / 100 * (1 + power / 200) * (1 + (train + atmos) / 200) / 2
//! ```
//!
//! The score is exactly zero when the unit has no troops, not enough rice to
//! feed them for one phase, or trains below the defending side's baseline.

use crate::fixed::Fixed;
use crate::state::{General, Stats};
use serde::{Deserialize, Serialize};

/// One rice per this many crew is needed to act at all.
pub const CREW_PER_RICE: i64 = 100;

/// Raw casualties of an even phase between equally matched units.
pub const BASE_PHASE_DAMAGE: Fixed = Fixed::from_int(100);

/// Power ratio clamp for a single phase (0.5x ..= 2x).
const MIN_POWER_RATIO: Fixed = Fixed::from_raw(5000);
const MAX_POWER_RATIO: Fixed = Fixed::from_raw(20000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeInputs {
    pub crew: i64,
    /// Rice carried, i.e. supply.
    pub rice: i64,
    pub train: i64,
    pub atmos: i64,
    /// Training baseline of the defending side.
    pub defence_train: i64,
    /// Current stats, bonuses included.
    pub real: Stats,
    /// Base stats.
    pub full: Stats,
}

impl InitiativeInputs {
    /// Inputs for a general facing a side that trains to `defence_train`.
    pub fn for_general(general: &General, defence_train: i64) -> Self {
        Self {
            crew: general.crew,
            rice: general.rice,
            train: general.train,
            atmos: general.atmos,
            defence_train,
            real: general.real_stats(),
            full: general.full_stats(),
        }
    }
}

/// Minimum rice for `crew` troops to act.
pub fn min_supply(crew: i64) -> i64 {
    crew / CREW_PER_RICE
}

fn blend(real: i32, full: i32) -> Fixed {
    Fixed::from_ratio(3 * real.max(0) as i64 + full.max(0) as i64, 4)
}

/// Stat blend shared by initiative and phase damage.
pub fn stat_power(real: Stats, full: Stats) -> Fixed {
    let two = Fixed::from_int(2);
    blend(real.leadership, full.leadership)
        + blend(real.strength, full.strength) / two
        + blend(real.intel, full.intel) / two
}

/// Combat readiness multiplier in `[0.5, 1.5]` for train/atmos in `[0, 100]`.
pub fn readiness(train: i64, atmos: i64) -> Fixed {
    (Fixed::ONE + Fixed::from_ratio(train.max(0) + atmos.max(0), 200)) / Fixed::from_int(2)
}

pub fn compute_initiative_score(inputs: &InitiativeInputs) -> Fixed {
    if inputs.crew <= 0 {
        return Fixed::ZERO;
    }
    if inputs.rice < min_supply(inputs.crew) {
        return Fixed::ZERO;
    }
    if inputs.train < inputs.defence_train {
        return Fixed::ZERO;
    }

    let troops = Fixed::from_ratio(inputs.crew, 100);
    let stat_factor = Fixed::ONE + stat_power(inputs.real, inputs.full) / Fixed::from_int(200);
    troops * stat_factor * readiness(inputs.train, inputs.atmos)
}

/// Sort `(key, score)` pairs: higher score first, ties by ascending key.
pub fn order_by_initiative<K: Ord>(entries: &mut [(K, Fixed)]) {
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
}

/// Raw damage one side deals in a phase before settlement.
///
/// `variance` is a multiplier drawn by the caller, typically in `[0.9, 1.1)`.
pub fn phase_damage(own_power: Fixed, enemy_power: Fixed, variance: Fixed) -> Fixed {
    let ratio = if enemy_power.is_positive() {
        (own_power / enemy_power).clamp(MIN_POWER_RATIO, MAX_POWER_RATIO)
    } else {
        MAX_POWER_RATIO
    };
    (BASE_PHASE_DAMAGE * ratio * variance).max(Fixed::ZERO)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageInputs {
    pub attacker_hp: i64,
    pub defender_hp: i64,
    /// Raw damage the attacker deals to the defender.
    pub raw_attacker_damage: Fixed,
    /// Raw damage the defender deals to the attacker.
    pub raw_defender_damage: Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DamageOutcome {
    /// Dealt by the attacker, bounded by `defender_hp`.
    pub attacker_damage: i64,
    /// Dealt by the defender, bounded by `attacker_hp`.
    pub defender_damage: i64,
}

/// `value * hp / den` in one widened step, so the scale factor itself is
/// never truncated.
fn scale_by(value: Fixed, hp: i64, den: Fixed) -> Fixed {
    if den.raw() <= 0 {
        return Fixed::ZERO;
    }
    let raw = value.raw() as i128 * hp as i128 * Fixed::SCALE as i128 / den.raw() as i128;
    Fixed::from_raw(raw as i64)
}

/// Settle one exchange.
///
/// Normally both raw values are rounded. When either would overkill, both
/// are scaled by the same factor, the largest that keeps every pool at or
/// above zero, so the exchange keeps its proportions.
#[tracing::instrument(level = "trace", skip_all, name = "resolve_damage")]
pub fn resolve_damage_outcome(inputs: &DamageInputs) -> DamageOutcome {
    let attacker_hp = inputs.attacker_hp.max(0);
    let defender_hp = inputs.defender_hp.max(0);
    let mut dealt = inputs.raw_attacker_damage.max(Fixed::ZERO);
    let mut taken = inputs.raw_defender_damage.max(Fixed::ZERO);

    let overkill_def = dealt > Fixed::from_int(defender_hp);
    let overkill_att = taken > Fixed::from_int(attacker_hp);
    if overkill_def || overkill_att {
        // Binding side: the larger of dealt/defender_hp and taken/attacker_hp,
        // compared by cross-multiplication.
        let def_binds = overkill_def
            && (!overkill_att
                || dealt.raw() as i128 * attacker_hp as i128
                    >= taken.raw() as i128 * defender_hp as i128);
        let (hp, raw) = if def_binds {
            (defender_hp, dealt)
        } else {
            (attacker_hp, taken)
        };
        log::trace!("overkill: scaling exchange {} / {} by {}/{}", dealt, taken, hp, raw);
        dealt = scale_by(dealt, hp, raw);
        taken = scale_by(taken, hp, raw);
    }

    DamageOutcome {
        attacker_damage: dealt.round_to_int().clamp(0, defender_hp),
        defender_damage: taken.round_to_int().clamp(0, attacker_hp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline() -> InitiativeInputs {
        InitiativeInputs {
            crew: 5000,
            rice: 5000,
            train: 80,
            atmos: 80,
            defence_train: 60,
            real: Stats::new(70, 60, 50),
            full: Stats::new(70, 60, 50),
        }
    }

    #[test]
    fn test_baseline_is_positive() {
        assert!(compute_initiative_score(&baseline()).is_positive());
    }

    #[test]
    fn test_zero_crew() {
        let inputs = InitiativeInputs {
            crew: 0,
            ..baseline()
        };
        assert_eq!(compute_initiative_score(&inputs), Fixed::ZERO);
        let inputs = InitiativeInputs {
            crew: -10,
            ..baseline()
        };
        assert_eq!(compute_initiative_score(&inputs), Fixed::ZERO);
    }

    #[test]
    fn test_supply_below_threshold() {
        let inputs = InitiativeInputs {
            rice: min_supply(5000) - 1,
            ..baseline()
        };
        assert_eq!(compute_initiative_score(&inputs), Fixed::ZERO);

        let at_threshold = InitiativeInputs {
            rice: min_supply(5000),
            ..baseline()
        };
        assert!(compute_initiative_score(&at_threshold).is_positive());
    }

    #[test]
    fn test_undertrained_against_well_trained_defence() {
        let inputs = InitiativeInputs {
            train: 50,
            defence_train: 90,
            ..baseline()
        };
        assert_eq!(compute_initiative_score(&inputs), Fixed::ZERO);
    }

    #[test]
    fn test_single_trooper_still_acts() {
        let inputs = InitiativeInputs {
            crew: 1,
            rice: 0,
            train: 60,
            atmos: 0,
            real: Stats::default(),
            full: Stats::default(),
            ..baseline()
        };
        assert!(compute_initiative_score(&inputs).is_positive());
    }

    #[test]
    fn test_monotone_in_crew_and_stats() {
        let base = compute_initiative_score(&baseline());
        let more_crew = compute_initiative_score(&InitiativeInputs {
            crew: 6000,
            ..baseline()
        });
        let buffed = compute_initiative_score(&InitiativeInputs {
            real: Stats::new(90, 60, 50),
            ..baseline()
        });
        let drilled = compute_initiative_score(&InitiativeInputs {
            train: 100,
            ..baseline()
        });
        assert!(more_crew > base);
        assert!(buffed > base);
        assert!(drilled > base);
    }

    #[test]
    fn test_order_ties_break_by_key() {
        let mut entries = vec![(3u64, Fixed::ONE), (1, Fixed::ONE), (2, Fixed::from_int(2))];
        order_by_initiative(&mut entries);
        let keys: Vec<u64> = entries.iter().map(|e| e.0).collect();
        assert_eq!(keys, vec![2, 1, 3]);
    }

    #[test]
    fn test_damage_rounds_without_overkill() {
        let outcome = resolve_damage_outcome(&DamageInputs {
            attacker_hp: 1000,
            defender_hp: 1000,
            raw_attacker_damage: Fixed::from_raw(1_204_999),
            raw_defender_damage: Fixed::from_raw(875_000),
        });
        assert_eq!(outcome.attacker_damage, 120);
        assert_eq!(outcome.defender_damage, 88);
    }

    #[test]
    fn test_overkill_scales_both_sides() {
        let outcome = resolve_damage_outcome(&DamageInputs {
            attacker_hp: 1000,
            defender_hp: 50,
            raw_attacker_damage: Fixed::from_int(200),
            raw_defender_damage: Fixed::from_int(100),
        });
        // defender pool is the binding one: scale 0.25
        assert_eq!(outcome.attacker_damage, 50);
        assert_eq!(outcome.defender_damage, 25);
    }

    #[test]
    fn test_overkill_on_attacker_side() {
        let outcome = resolve_damage_outcome(&DamageInputs {
            attacker_hp: 30,
            defender_hp: 1000,
            raw_attacker_damage: Fixed::from_int(60),
            raw_defender_damage: Fixed::from_int(120),
        });
        assert_eq!(outcome.defender_damage, 30);
        assert_eq!(outcome.attacker_damage, 15);
    }

    #[test]
    fn test_dead_pools_take_nothing() {
        let outcome = resolve_damage_outcome(&DamageInputs {
            attacker_hp: 0,
            defender_hp: -5,
            raw_attacker_damage: Fixed::from_int(60),
            raw_defender_damage: Fixed::from_int(120),
        });
        assert_eq!(outcome, DamageOutcome::default());
    }

    #[test]
    fn test_phase_damage_clamps_ratio() {
        let crushing = phase_damage(Fixed::from_int(1000), Fixed::from_int(1), Fixed::ONE);
        assert_eq!(crushing, BASE_PHASE_DAMAGE * MAX_POWER_RATIO);
        let hopeless = phase_damage(Fixed::from_int(1), Fixed::from_int(1000), Fixed::ONE);
        assert_eq!(hopeless, BASE_PHASE_DAMAGE * MIN_POWER_RATIO);
        let even = phase_damage(Fixed::from_int(50), Fixed::from_int(50), Fixed::ONE);
        assert_eq!(even, BASE_PHASE_DAMAGE);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Overkill settlement never drives a pool negative and keeps the
        /// ratio between the two sides up to rounding.
        #[test]
        fn prop_overkill_bounded_and_proportional(
            attacker_hp in 1i64..100_000,
            defender_hp in 1i64..100_000,
            raw_a in 1i64..500_000,
            raw_d in 1i64..500_000,
        ) {
            let inputs = DamageInputs {
                attacker_hp,
                defender_hp,
                raw_attacker_damage: Fixed::from_int(raw_a),
                raw_defender_damage: Fixed::from_int(raw_d),
            };
            let out = resolve_damage_outcome(&inputs);
            prop_assert!(out.attacker_damage >= 0 && out.attacker_damage <= defender_hp);
            prop_assert!(out.defender_damage >= 0 && out.defender_damage <= attacker_hp);

            let overkill = raw_a > defender_hp || raw_d > attacker_hp;
            if overkill {
                // One side lands exactly on the pool it emptied (within rounding)
                let hit_def = (out.attacker_damage - defender_hp).abs() <= 1;
                let hit_att = (out.defender_damage - attacker_hp).abs() <= 1;
                prop_assert!(hit_def || hit_att);

                // Cross-multiplied ratio check, tolerance of one unit of rounding
                // on either side plus the fixed-point truncation of the scale.
                let lhs = out.attacker_damage as i128 * raw_d as i128;
                let rhs = out.defender_damage as i128 * raw_a as i128;
                let tolerance = (raw_a.max(raw_d) as i128) * 2;
                prop_assert!(
                    (lhs - rhs).abs() <= tolerance,
                    "ratio drifted: {}:{} vs raw {}:{}",
                    out.attacker_damage,
                    out.defender_damage,
                    raw_a,
                    raw_d
                );
            } else {
                prop_assert_eq!(out.attacker_damage, raw_a);
                prop_assert_eq!(out.defender_damage, raw_d);
            }
        }

        #[test]
        fn prop_initiative_never_negative(
            crew in -100i64..100_000,
            rice in 0i64..10_000,
            train in 0i64..=100,
            atmos in 0i64..=100,
            defence_train in 0i64..=100,
            lead in 0i32..150,
        ) {
            let inputs = InitiativeInputs {
                crew, rice, train, atmos, defence_train,
                real: Stats::new(lead, 50, 50),
                full: Stats::new(lead, 50, 50),
            };
            let score = compute_initiative_score(&inputs);
            prop_assert!(score >= Fixed::ZERO);
            let should_act = crew > 0 && rice >= min_supply(crew) && train >= defence_train;
            prop_assert_eq!(score.is_positive(), should_act);
        }
    }
}
