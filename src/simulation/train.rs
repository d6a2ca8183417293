//! Metro trains: a two-state machine shuttling passengers along a line

use super::error::SimError;
use super::line::Line;
use super::types::{Direction, LineId, PassengerId, StationId, TrainId};

/// Maximum number of wagons a single train can pull
pub const MAX_WAGONS: usize = 5;
/// Passenger capacity contributed by each wagon
pub const WAGON_CAPACITY: usize = 6;

/// A train alternates between dwelling at a station and being in transit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainState {
    AtStation,
    LeftStation,
}

/// A train commissioned on a line, or decommissioned (`line` = None)
#[derive(Debug, Clone)]
pub struct Train {
    pub id: TrainId,
    pub line: Option<LineId>,
    /// Arena index of the current or last visited node on the line
    pub node: Option<usize>,
    pub direction: Direction,
    pub state: TrainState,
    pub wagons: usize,
    /// Onboard passengers in boarding order
    pub passengers: Vec<PassengerId>,
}

impl Train {
    pub fn new(id: TrainId) -> Self {
        Self {
            id,
            line: None,
            node: None,
            direction: Direction::Forward,
            state: TrainState::AtStation,
            wagons: 1,
            passengers: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.wagons * WAGON_CAPACITY
    }

    pub fn is_assigned(&self) -> bool {
        self.line.is_some()
    }

    /// Put the train on a line at a node with a direction, dwelling.
    pub fn assign(&mut self, line: LineId, node: usize, direction: Direction) {
        self.line = Some(line);
        self.node = Some(node);
        self.direction = direction;
        self.state = TrainState::AtStation;
    }

    /// The station this train is at or last visited, resolved through its line
    pub fn current_station(&self, lines: &[Line]) -> Option<StationId> {
        let line = lines.get(self.line?.0)?;
        line.nodes.get(self.node?).map(|node| node.station)
    }

    /// Move the train one step: a dwell tick when at a station, otherwise
    /// arrival at the next node with the (possibly bounced) direction.
    pub fn advance(&mut self, line: &Line) -> Result<(), SimError> {
        match self.state {
            TrainState::AtStation => {
                self.state = TrainState::LeftStation;
                Ok(())
            }
            TrainState::LeftStation => {
                self.state = TrainState::AtStation;
                if let Some(node) = self.node {
                    let (next, direction) = line.next_station(node, self.direction)?;
                    self.node = Some(next);
                    self.direction = direction;
                }
                Ok(())
            }
        }
    }

    /// Couple one more wagon. Pool availability is the city's concern.
    pub fn add_wagon(&mut self) -> Result<(), SimError> {
        if self.wagons >= MAX_WAGONS {
            return Err(SimError::CapacityExceeded("wagons"));
        }
        self.wagons += 1;
        Ok(())
    }

    /// Drop one wagon. When the remaining capacity no longer covers the
    /// roster, the most recently boarded passengers are evicted and returned
    /// for the caller to deposit at the current station.
    pub fn remove_wagon(&mut self) -> Result<Vec<PassengerId>, SimError> {
        if self.wagons <= 1 {
            return Err(SimError::CapacityExceeded("minimum wagons"));
        }
        self.wagons -= 1;
        let mut evicted = Vec::new();
        while self.passengers.len() > self.capacity() {
            if let Some(passenger) = self.passengers.pop() {
                evicted.push(passenger);
            }
        }
        Ok(evicted)
    }

    /// Whether a passenger at `station` can step aboard right now
    pub fn can_board(&self, station: StationId, lines: &[Line]) -> bool {
        self.state == TrainState::AtStation
            && self.current_station(lines) == Some(station)
            && self.passengers.len() < self.capacity()
    }

    /// Whether onboard passengers can step off right now
    pub fn can_alight(&self) -> bool {
        self.state == TrainState::AtStation
    }
}
