//! Deterministic seeded random numbers.
//!
//! Every command execution gets its own [`SeedStream`], seeded by
//! [`derive_seed`] from the command's identity. Replaying the same command log
//! therefore reproduces the same rolls regardless of which other commands ran
//! in between, on any platform.
//!
//! The generator is a 32-bit Weyl sequence finished with the murmur3 mixer:
//!
//! ```text
//! state += 0x9E3779B9
//! z = state
//! z = (z ^ z >> 16) * 0x85EBCA6B
//! z = (z ^ z >> 13) * 0xC2B2AE35
//! z ^= z >> 16
//! ```
//!
//! `SeedStream` also implements [`rand::RngCore`], so adaptors from the `rand`
//! crate (`SliceRandom::shuffle`, `Rng::gen_range`, ...) stay deterministic
//! when driven by it.

use crate::fixed::Fixed;
use rand::{RngCore, SeedableRng};
use thiserror::Error;

const WEYL_INCREMENT: u32 = 0x9E37_79B9;
const MIX_MUL_1: u32 = 0x85EB_CA6B;
const MIX_MUL_2: u32 = 0xC2B2_AE35;

/// 2^32, the exclusive upper bound of [`SeedStream::next_u32`] as a float.
const U32_RANGE: f64 = 4_294_967_296.0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RngError {
    #[error("invalid range: min {min} > max {max}")]
    InvalidRange { min: i64, max: i64 },
    #[error("cannot choose from an empty list")]
    EmptyChoice,
    #[error("total weight must be positive")]
    ZeroWeight,
}

/// Rolling multiply-add-xor string hash, masked to 32 bits.
pub fn string_hash(input: &str) -> u32 {
    let mut h: u32 = 0;
    for c in input.chars() {
        h = h.wrapping_mul(31).wrapping_add(c as u32);
        h ^= h >> 15;
    }
    h
}

/// Seed for one command execution.
///
/// The four parts are joined with `|` before hashing, so `("1", "23")` and
/// `("12", "3")` do not collide trivially.
pub fn derive_seed(command_id: u64, actor_id: u64, turn_index: u64, command_type: &str) -> u32 {
    let key = format!("{command_id}|{actor_id}|{turn_index}|{command_type}");
    string_hash(&key)
}

/// Stateful generator. Cheap to construct; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedStream {
    state: u32,
}

impl SeedStream {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Stream for a command, see [`derive_seed`].
    pub fn for_command(
        command_id: u64,
        actor_id: u64,
        turn_index: u64,
        command_type: &str,
    ) -> Self {
        Self::new(derive_seed(command_id, actor_id, turn_index, command_type))
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(WEYL_INCREMENT);
        let mut z = self.state;
        z = (z ^ (z >> 16)).wrapping_mul(MIX_MUL_1);
        z = (z ^ (z >> 13)).wrapping_mul(MIX_MUL_2);
        z ^ (z >> 16)
    }

    /// Uniform integer in `[min, max]`.
    pub fn rand_int(&mut self, min: i64, max: i64) -> Result<i64, RngError> {
        if min > max {
            return Err(RngError::InvalidRange { min, max });
        }
        let span = (max as i128 - min as i128 + 1) as u128;
        let offset = (self.next_u32() as u128 % span) as i128;
        Ok((min as i128 + offset) as i64)
    }

    /// Uniform float in `[0, 1)`.
    pub fn random(&mut self) -> f64 {
        self.next_u32() as f64 / U32_RANGE
    }

    /// Uniform float in `[min, max)`.
    pub fn rand_float(&mut self, min: f64, max: f64) -> f64 {
        min + self.random() * (max - min)
    }

    /// Uniform fixed-point value in `[min, max)`, computed in integer space.
    ///
    /// Bounds given in the wrong order are swapped.
    pub fn rand_fixed(&mut self, min: Fixed, max: Fixed) -> Fixed {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        let span = (hi - lo).raw() as i128;
        let offset = span * self.next_u32() as i128 >> 32;
        lo + Fixed::from_raw(offset as i64)
    }

    /// `true` with probability `prob`. Values at or below 0 never hit, values
    /// above 1 always do.
    pub fn next_bool(&mut self, prob: f64) -> bool {
        self.random() < prob
    }

    pub fn choice<'a, T>(&mut self, items: &'a [T]) -> Result<&'a T, RngError> {
        if items.is_empty() {
            return Err(RngError::EmptyChoice);
        }
        let idx = self.rand_int(0, items.len() as i64 - 1)? as usize;
        Ok(&items[idx])
    }

    /// Pick an item with probability proportional to its integer weight.
    pub fn choice_using_weight<'a, T>(&mut self, items: &'a [(T, u32)]) -> Result<&'a T, RngError> {
        if items.is_empty() {
            return Err(RngError::EmptyChoice);
        }
        let total: u64 = items.iter().map(|(_, w)| *w as u64).sum();
        if total == 0 {
            return Err(RngError::ZeroWeight);
        }
        let mut pick = self.rand_int(0, total as i64 - 1)? as u64;
        for (item, weight) in items {
            let weight = *weight as u64;
            if pick < weight {
                return Ok(item);
            }
            pick -= weight;
        }
        // Unreachable: pick < total
        Err(RngError::ZeroWeight)
    }
}

impl RngCore for SeedStream {
    fn next_u32(&mut self) -> u32 {
        SeedStream::next_u32(self)
    }

    fn next_u64(&mut self) -> u64 {
        let hi = SeedStream::next_u32(self) as u64;
        let lo = SeedStream::next_u32(self) as u64;
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = SeedStream::next_u32(self).to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for SeedStream {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u32::from_le_bytes(seed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;

    #[test]
    fn test_known_sequence() {
        // Pinned outputs: changing the mixer breaks every recorded replay.
        let mut a = SeedStream::new(0);
        let first = a.next_u32();
        let mut b = SeedStream::new(0);
        assert_eq!(b.next_u32(), first);

        let mut manual = WEYL_INCREMENT;
        manual = (manual ^ (manual >> 16)).wrapping_mul(MIX_MUL_1);
        manual = (manual ^ (manual >> 13)).wrapping_mul(MIX_MUL_2);
        manual ^= manual >> 16;
        assert_eq!(first, manual);
    }

    #[test]
    fn test_derive_seed_stable_and_distinct() {
        let s1 = derive_seed(7, 1001, 42, "train");
        assert_eq!(s1, derive_seed(7, 1001, 42, "train"));
        assert_ne!(s1, derive_seed(7, 1001, 43, "train"));
        assert_ne!(s1, derive_seed(7, 1001, 42, "recruit"));
        assert_ne!(derive_seed(1, 23, 0, "x"), derive_seed(12, 3, 0, "x"));
    }

    #[test]
    fn test_determinism_10k_draws() {
        let mut a = SeedStream::for_command(99, 5, 1200, "deploy");
        let mut b = SeedStream::for_command(99, 5, 1200, "deploy");
        for _ in 0..10_000 {
            assert_eq!(a.next_u32(), b.next_u32());
            assert_eq!(a.rand_int(-50, 50), b.rand_int(-50, 50));
            assert_eq!(a.rand_float(0.5, 1.5).to_bits(), b.rand_float(0.5, 1.5).to_bits());
        }
    }

    #[test]
    fn test_rand_int_range_10k_pairs() {
        let mut meta = SeedStream::new(12345);
        for _ in 0..10_000 {
            let seed = meta.next_u32();
            let min = meta.rand_int(-1_000_000, 1_000_000).unwrap();
            let width = meta.rand_int(0, 5_000).unwrap();
            let max = min + width;
            let v = SeedStream::new(seed).rand_int(min, max).unwrap();
            assert!(v >= min && v <= max, "{v} not in [{min}, {max}]");
        }
    }

    #[test]
    fn test_rand_int_rejects_inverted_range() {
        let mut s = SeedStream::new(1);
        assert_eq!(
            s.rand_int(5, 4),
            Err(RngError::InvalidRange { min: 5, max: 4 })
        );
    }

    #[test]
    fn test_rand_int_degenerate_range() {
        let mut s = SeedStream::new(77);
        for _ in 0..100 {
            assert_eq!(s.rand_int(3, 3).unwrap(), 3);
        }
    }

    #[test]
    fn test_random_unit_interval() {
        let mut s = SeedStream::new(2024);
        for _ in 0..10_000 {
            let r = s.random();
            assert!((0.0..1.0).contains(&r));
        }
    }

    #[test]
    fn test_next_bool_saturates_outside_unit_interval() {
        let mut s = SeedStream::new(31);
        for _ in 0..1_000 {
            assert!(!s.next_bool(0.0));
            assert!(!s.next_bool(-0.5));
            assert!(s.next_bool(1.0));
            assert!(s.next_bool(3.0));
        }
    }

    #[test]
    fn test_choice_using_weight_skips_zero_weight() {
        let mut s = SeedStream::new(9);
        let items = [("never", 0), ("always", 5)];
        for _ in 0..200 {
            assert_eq!(*s.choice_using_weight(&items).unwrap(), "always");
        }
        let empty: [(&str, u32); 0] = [];
        assert_eq!(s.choice_using_weight(&empty), Err(RngError::EmptyChoice));
    }

    #[test]
    fn test_rand_core_shuffle_is_reproducible() {
        let mut v1: Vec<u32> = (0..32).collect();
        let mut v2 = v1.clone();
        v1.shuffle(&mut SeedStream::from_seed([1, 2, 3, 4]));
        v2.shuffle(&mut SeedStream::from_seed([1, 2, 3, 4]));
        assert_eq!(v1, v2);
    }
}
