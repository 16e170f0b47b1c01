//! Deterministic random number generation.
//!
//! Every probability draw in the simulation (placement, neighborhood
//! shuffles, infection rolls, mortality rolls, age sampling) goes through a
//! single seeded generator owned by the simulator, so a run is fully
//! reproducible from its seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// The generator threaded through the whole simulation.
pub type SimRng = ChaCha8Rng;

/// Builds the simulation generator from a config seed.
pub fn seeded(seed: u64) -> SimRng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Helpers for common probability draws.
pub trait RngExt {
    /// True with the given probability.
    fn chance(&mut self, probability: f64) -> bool;
}

impl<R: Rng> RngExt for R {
    fn chance(&mut self, probability: f64) -> bool {
        self.gen::<f64>() < probability
    }
}
