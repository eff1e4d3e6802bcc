//! Dual-pool command point ledger (galaxy variant).
//!
//! Every general carries two pools: political (PCP, the primary pool) and
//! military (MCP, the secondary pool). An action names the pool it draws on;
//! when that pool runs short, the other pool may cover the shortfall at twice
//! the nominal price.
//!
//! ## Invariants
//! - `0 <= current <= max` for both pools, always.
//! - A failed `consume` leaves both pools untouched.

use serde::{Deserialize, Serialize};

/// Which pool an action draws on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpPool {
    /// Political command points (PCP).
    Primary,
    /// Military command points (MCP).
    Secondary,
}

impl CpPool {
    pub fn other(self) -> CpPool {
        match self {
            CpPool::Primary => CpPool::Secondary,
            CpPool::Secondary => CpPool::Primary,
        }
    }
}

impl std::fmt::Display for CpPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CpPool::Primary => write!(f, "PCP"),
            CpPool::Secondary => write!(f, "MCP"),
        }
    }
}

/// Substitution rate: one missing point costs this many from the other pool.
pub const SUBSTITUTION_RATE: i64 = 2;

/// A value clamped to `[0, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pool {
    current: i64,
    max: i64,
}

impl Pool {
    pub fn new(current: i64, max: i64) -> Self {
        let max = max.max(0);
        Self {
            current: current.clamp(0, max),
            max,
        }
    }

    pub fn current(&self) -> i64 {
        self.current
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    fn add_clamped(&mut self, amount: i64) {
        self.current = self.current.saturating_add(amount).clamp(0, self.max);
    }
}

/// Outcome of a successful consumption, for logs and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpCharge {
    /// Drawn from the named pool.
    pub direct: i64,
    /// Drawn from the other pool (already doubled).
    pub substituted: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPoint {
    primary: Pool,
    secondary: Pool,
    /// Turn index of the last `recover` call.
    last_recovered: Option<u64>,
}

impl CommandPoint {
    pub fn new(primary: i64, secondary: i64, max_primary: i64, max_secondary: i64) -> Self {
        Self {
            primary: Pool::new(primary, max_primary),
            secondary: Pool::new(secondary, max_secondary),
            last_recovered: None,
        }
    }

    /// Both pools full.
    pub fn full(max_primary: i64, max_secondary: i64) -> Self {
        Self::new(max_primary, max_secondary, max_primary, max_secondary)
    }

    pub fn primary(&self) -> i64 {
        self.primary.current
    }

    pub fn secondary(&self) -> i64 {
        self.secondary.current
    }

    pub fn pool(&self, which: CpPool) -> &Pool {
        match which {
            CpPool::Primary => &self.primary,
            CpPool::Secondary => &self.secondary,
        }
    }

    fn pool_mut(&mut self, which: CpPool) -> &mut Pool {
        match which {
            CpPool::Primary => &mut self.primary,
            CpPool::Secondary => &mut self.secondary,
        }
    }

    pub fn last_recovered(&self) -> Option<u64> {
        self.last_recovered
    }

    /// What `consume` would charge, without charging it.
    pub fn quote(&self, which: CpPool, amount: i64) -> Option<CpCharge> {
        if amount < 0 {
            return None;
        }
        let named = self.pool(which).current;
        if named >= amount {
            return Some(CpCharge {
                direct: amount,
                substituted: 0,
            });
        }
        let deficit = amount - named;
        let substituted = deficit.checked_mul(SUBSTITUTION_RATE)?;
        if self.pool(which.other()).current >= substituted {
            Some(CpCharge {
                direct: named,
                substituted,
            })
        } else {
            None
        }
    }

    /// Deduct `amount` from `which`, covering any shortfall from the other
    /// pool at double cost. Returns `false` and changes nothing on failure.
    pub fn consume(&mut self, which: CpPool, amount: i64) -> bool {
        self.charge(which, amount).is_some()
    }

    /// Like [`consume`](Self::consume) but reports the split.
    pub fn charge(&mut self, which: CpPool, amount: i64) -> Option<CpCharge> {
        let charge = self.quote(which, amount)?;
        self.pool_mut(which).current -= charge.direct;
        self.pool_mut(which.other()).current -= charge.substituted;
        log::trace!(
            "CP charge {}: {} direct, {} substituted",
            which,
            charge.direct,
            charge.substituted
        );
        Some(charge)
    }

    /// Add to both pools, each clamped to its own maximum.
    pub fn recover(&mut self, primary: i64, secondary: i64, now: u64) {
        self.primary.add_clamped(primary);
        self.secondary.add_clamped(secondary);
        self.last_recovered = Some(now);
    }
}
