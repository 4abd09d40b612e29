//! Explicit random state threaded through every stochastic call.

use microsim_shared::algo::{derive_seed, splitmix64};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Stream index for the shot noise stage.
pub const SHOT_NOISE_STREAM: u64 = 1;
/// Stream index for the read noise stage.
pub const READ_NOISE_STREAM: u64 = 2;

/// Caller-owned random state.
///
/// The engine never reads global or thread-local randomness. Each frame
/// consumes one state; [`RandomState::advance`] moves to the next one, so
/// the sequence of states for a given starting seed is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RandomState {
    seed: u64,
}

impl RandomState {
    pub fn from_seed(seed: u64) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The state that follows this one.
    pub fn advanced(&self) -> Self {
        Self {
            seed: splitmix64(self.seed),
        }
    }

    pub fn advance(&mut self) {
        *self = self.advanced();
    }

    /// The state after `steps` advances.
    pub fn advanced_by(&self, steps: usize) -> Self {
        (0..steps).fold(*self, |state, _| state.advanced())
    }

    /// Independent seed for a named sub-stream of this state.
    pub fn stream(&self, stream: u64) -> u64 {
        derive_seed(self.seed, stream)
    }

    /// Generator for a sub-stream of this state.
    pub fn rng(&self, stream: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.stream(stream))
    }
}
