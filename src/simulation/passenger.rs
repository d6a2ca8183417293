//! Passengers traveling through the metro network

use super::types::{PassengerId, StationId, TrainId};

/// Where a passenger currently is
///
/// An active passenger is always in exactly one container: a station's
/// waiting queue or a train's roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassengerLocation {
    AtStation(StationId),
    OnTrain(TrainId),
}

/// A passenger commuting from an origin station to a destination station
///
/// Passengers are destroyed the instant they reach their destination; the
/// city records their travel time.
#[derive(Debug, Clone)]
pub struct Passenger {
    pub id: PassengerId,
    pub start_time: u64,
    pub origin: StationId,
    pub destination: StationId,
    pub location: PassengerLocation,
}

impl Passenger {
    pub fn new(id: PassengerId, start_time: u64, origin: StationId, destination: StationId) -> Self {
        debug_assert_ne!(origin, destination);
        Self {
            id,
            start_time,
            origin,
            destination,
            location: PassengerLocation::AtStation(origin),
        }
    }
}
