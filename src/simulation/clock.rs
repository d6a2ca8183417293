//! Tick orchestration: growth, trains, spawns, routing, clock
//!
//! One tick is one atomic, fully ordered pass; there is no partial-tick
//! observability. External commands are applied as a batch before the
//! tick's train and passenger phases.

use super::city::City;
use super::command::Command;
use super::error::SimError;
use super::types::StationId;

/// Interval, in ticks, at which a new station appears
pub const NEW_STATION_INTERVAL: u64 = 50;
/// Per-tick multiplicative growth of every station's passenger spawn rate
pub const STATION_RATE_GROWTH: f64 = 1.001;
/// Interval, in ticks, at which the city boundary expands
pub const CITY_EXPANSION_INTERVAL: u64 = 25;
/// Factor by which the city edge grows at each expansion
pub const CITY_EXPANSION_RATE: f64 = 1.1;
/// A waiting passenger older than this ends the simulation
pub const MAX_WAITING_TIME: u64 = 25;

/// Drives a city through discrete simulation ticks
pub struct Simulation {
    pub city: City,
    /// Stations created during the most recent tick
    pub new_stations: Vec<StationId>,
}

impl Simulation {
    pub fn new(city: City) -> Self {
        Self {
            city,
            new_stations: Vec::new(),
        }
    }

    /// Whether the simulation should keep running: the iteration cap is
    /// not reached and no passenger has been underway longer than the
    /// waiting threshold.
    pub fn should_continue(&self, max_iterations: u64) -> bool {
        self.city.time < max_iterations
            && self
                .city
                .max_waiting_time()
                .map_or(true, |longest| longest < MAX_WAITING_TIME)
    }

    /// Apply a command batch, then run one tick.
    pub fn step(&mut self, commands: &[Command]) -> Vec<Result<(), SimError>> {
        let results = self.city.apply_commands(commands);
        self.tick();
        results
    }

    /// One full simulation tick, in fixed order: growth, trains,
    /// passenger spawns, passenger routing, clock.
    pub fn tick(&mut self) {
        if self.city.time % CITY_EXPANSION_INTERVAL == 0 {
            self.city.edge_length = (CITY_EXPANSION_RATE * self.city.edge_length as f64) as i32;
        }

        for station in &mut self.city.stations {
            station.grow_spawn_rate(STATION_RATE_GROWTH);
        }

        self.new_stations.clear();
        if self.city.time > 0 && self.city.time % NEW_STATION_INTERVAL == 0 {
            self.new_stations.push(self.city.add_station());
        }

        self.city.advance_trains();
        self.city.spawn_passengers();
        self.city.route_passengers();

        self.city.time += 1;
    }
}
