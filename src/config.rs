#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Settings shared by the whole simulation.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationConfig {
    /// Seed of the random number generator that seeds every driver.
    pub seed: u64,
    /// The speed limit the route imposes on AI trains, in m/s.
    /// AI drivers allow themselves 20% more than this.
    pub ai_speed_limit: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            ai_speed_limit: f64::INFINITY,
        }
    }
}
