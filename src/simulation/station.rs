//! Metro stations where passengers come from and go to

use rand::Rng;
use rand_distr::{Distribution, Poisson};

use super::types::{PassengerId, Position, StationId};

/// Average number of passengers a fresh station spawns per tick
pub const BASE_SPAWN_RATE: f64 = 0.1;

/// A metro station; holds the passengers waiting there
#[derive(Debug, Clone)]
pub struct Station {
    pub id: StationId,
    pub position: Position,
    /// Average Poisson rate at which new passengers appear, grows over time
    pub spawn_rate: f64,
    /// Waiting passengers in arrival order
    pub passengers: Vec<PassengerId>,
}

impl Station {
    pub fn new(id: StationId, position: Position) -> Self {
        Self {
            id,
            position,
            spawn_rate: BASE_SPAWN_RATE,
            passengers: Vec::new(),
        }
    }

    /// Multiply the spawn rate by a growth factor (never shrinks in practice)
    pub fn grow_spawn_rate(&mut self, factor: f64) {
        self.spawn_rate *= factor;
    }

    /// Draw how many passengers appear this tick from a Poisson distribution
    /// with the station's current rate.
    pub fn draw_spawn_count(&self, rng: &mut impl Rng) -> usize {
        let Ok(poisson) = Poisson::new(self.spawn_rate) else {
            return 0;
        };
        poisson.sample(rng) as usize
    }
}
