//! Deterministic RNG utilities for reproducible tests.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use waddle_core::WalkParameters;
use waddle_walk::WalkCommand;

/// Create a deterministic `ChaCha8Rng` from a seed.
///
/// All test randomization should go through this to ensure reproducibility.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// A command inside the limits of `params`, with 1 to 6 steps.
pub fn random_command(rng: &mut impl Rng, params: &WalkParameters) -> WalkCommand {
    let dx = rng.gen_range(-params.walk_max_dx_backward..=params.walk_max_dx_forward);
    let dy = rng.gen_range(-params.walk_max_dy..=params.walk_max_dy);
    let dtheta = rng.gen_range(-params.walk_max_dtheta..=params.walk_max_dtheta);
    WalkCommand::new(dx, dy, dtheta, rng.gen_range(1..=6))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
