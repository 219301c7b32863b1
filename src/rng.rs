//! Random number utilities.
//!
//! Every stochastic operation in the engine takes `&mut impl Rng`, so a
//! whole run is reproducible from a single seed. [`create_rng`] builds the
//! generator the engine uses by default; [`random_percent`] is the
//! probability gate behind the creation, crossover, mutation and migration
//! rates.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Creates a small, fast RNG from a seed.
///
/// The same seed produces the same run on the same engine version.
pub fn create_rng(seed: u64) -> SmallRng {
    SmallRng::seed_from_u64(seed)
}

/// Returns `true` with probability `percent / 100`.
///
/// `percent` uses the 0..=100 scale of the configuration fields, with a
/// resolution of one part per million. Values at or below 0 never fire,
/// values at or above 100 always fire.
pub fn random_percent<R: Rng + ?Sized>(rng: &mut R, percent: f64) -> bool {
    (rng.random_range(0..1_000_000) as f64) < percent * 10_000.0
}

// ============================================================================
// Tests
// ============================================================================
