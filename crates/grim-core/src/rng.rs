//! Random number generation for combat.
//!
//! Uses a seeded ChaCha RNG so whole encounters replay deterministically
//! (tests pin a seed and assert exact outcomes).

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Combat random number generator.
///
/// Wraps ChaCha8Rng for reproducible rolls. Only the seed is serialized;
/// a restored session re-seeds rather than resuming mid-stream.
#[derive(Debug, Clone)]
pub struct CombatRng {
    rng: ChaCha8Rng,
    seed: u64,
}

impl Serialize for CombatRng {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.seed.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CombatRng {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let seed = u64::deserialize(deserializer)?;
        Ok(CombatRng::new(seed))
    }
}

impl CombatRng {
    /// Create a new RNG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Create a new RNG with a random seed.
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    /// The seed this RNG was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Index roll: uniform in `0..n`. Zero when `n` is 0, so callers can
    /// pass a computed range without guarding.
    pub fn rn2(&mut self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        self.rng.gen_range(0..n)
    }

    /// Die roll: uniform in `1..=n`. Zero when `n` is 0 (an armor roll
    /// against no armor mitigates nothing).
    pub fn rnd(&mut self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        self.rng.gen_range(1..=n)
    }

    /// Sum of `n` rolls of an `m`-sided die.
    pub fn dice(&mut self, n: u32, m: u32) -> u32 {
        (0..n).map(|_| self.rnd(m)).sum()
    }

    /// The to-hit die: 1..=20. A 20 is a critical, a 1 is a fumble.
    pub fn d20(&mut self) -> u32 {
        self.rnd(20)
    }

    /// True once in `n` draws on average.
    pub fn one_in(&mut self, n: u32) -> bool {
        self.rn2(n) == 0
    }

    /// Percentage check, as proc chances and drop chances are tuned.
    pub fn percent(&mut self, percent: u32) -> bool {
        self.rn2(100) < percent
    }

    /// Uniform f64 in [lo, hi). Used for damage variance and loot roll-offs.
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        self.rng.gen_range(lo..hi)
    }

    /// Pick one element at random; `None` for an empty slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            Some(&items[self.rn2(items.len() as u32) as usize])
        }
    }

    /// Draw an index from a weighted lottery. Weights <= 0 are treated as 0.
    /// Returns None when every weight is 0 or the slice is empty.
    pub fn weighted_index(&mut self, weights: &[i64]) -> Option<usize> {
        let total: i64 = weights.iter().map(|w| (*w).max(0)).sum();
        if total <= 0 {
            return None;
        }
        let mut draw = self.rng.gen_range(0..total);
        for (i, w) in weights.iter().enumerate() {
            let w = (*w).max(0);
            if draw < w {
                return Some(i);
            }
            draw -= w;
        }
        None
    }
}

impl Default for CombatRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}
