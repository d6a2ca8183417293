//! Core metro simulation
//!
//! Everything needed to run the simulation headlessly: the city aggregate,
//! line topology, navigation tables, trains, passengers and the tick clock.

mod city;
mod clock;
mod command;
mod error;
mod line;
mod navigation;
mod passenger;
mod station;
mod train;
mod types;

pub use city::{City, DEFAULT_EDGE_LENGTH, DEFAULT_MAX_LINES, DEFAULT_MAX_TRAINS};
pub use clock::{
    Simulation, CITY_EXPANSION_INTERVAL, CITY_EXPANSION_RATE, MAX_WAITING_TIME,
    NEW_STATION_INTERVAL, STATION_RATE_GROWTH,
};
pub use command::Command;
pub use error::SimError;
pub use line::{Line, StationNode, LINE_PALETTE};
pub use navigation::{NavigationMap, RouteOption};
pub use passenger::{Passenger, PassengerLocation};
pub use station::{Station, BASE_SPAWN_RATE};
pub use train::{Train, TrainState, MAX_WAGONS, WAGON_CAPACITY};
pub use types::{Direction, LineId, PassengerId, Position, StationId, TrainId};
