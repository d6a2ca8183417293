//! The city: aggregate root tying stations, lines, trains and passengers
//! together
//!
//! All registries are stable-indexed: an id handed out stays valid for the
//! registry's lifetime. Lines and trains are never deleted, only cleared or
//! decommissioned.

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};

use super::command::Command;
use super::error::SimError;
use super::line::{Line, LINE_PALETTE};
use super::navigation::NavigationMap;
use super::passenger::{Passenger, PassengerLocation};
use super::station::Station;
use super::train::Train;
use super::types::{Direction, LineId, PassengerId, Position, StationId, TrainId};

/// Default limit on the number of trains a city can commission
pub const DEFAULT_MAX_TRAINS: usize = 3;
/// Default limit on the number of lines a city can open
pub const DEFAULT_MAX_LINES: usize = 3;
/// Side length of the starting city square
pub const DEFAULT_EDGE_LENGTH: i32 = 10;

/// The main simulation city
pub struct City {
    /// Simulation time; same as the number of completed ticks
    pub time: u64,
    pub stations: Vec<Station>,
    pub lines: Vec<Line>,
    pub trains: Vec<Train>,
    /// All active passengers, owned here; stations and trains hold ids
    pub passengers: HashMap<PassengerId, Passenger>,
    /// Navigation tables passengers consult; rebuilt on topology change
    pub navigation: NavigationMap,
    pub max_trains: usize,
    pub max_lines: usize,
    /// Shared pool of spare wagons trains can couple
    pub free_wagons: usize,
    /// Side length of the square the city currently occupies
    pub edge_length: i32,
    /// Travel times of passengers that reached their destination
    pub travel_times: Vec<u64>,
    next_passenger_id: usize,
    /// Optional seeded RNG for reproducible simulations
    rng: Option<StdRng>,
}

impl Default for City {
    fn default() -> Self {
        Self::new()
    }
}

impl City {
    fn new_internal(rng: Option<StdRng>) -> Self {
        Self {
            time: 0,
            stations: Vec::new(),
            lines: Vec::new(),
            trains: Vec::new(),
            passengers: HashMap::new(),
            navigation: NavigationMap::new(),
            max_trains: DEFAULT_MAX_TRAINS,
            max_lines: DEFAULT_MAX_LINES,
            free_wagons: 0,
            edge_length: DEFAULT_EDGE_LENGTH,
            travel_times: Vec::new(),
            next_passenger_id: 0,
            rng,
        }
    }

    pub fn new() -> Self {
        Self::new_internal(None)
    }

    /// Create a city with a seeded RNG for reproducible simulations
    pub fn with_seed(seed: u64) -> Self {
        Self::new_internal(Some(StdRng::seed_from_u64(seed)))
    }

    /// A small starting city: five stations, nothing else
    pub fn fixture() -> Self {
        Self::build_fixture(Self::new())
    }

    /// The starting city with a seeded RNG
    pub fn fixture_with_seed(seed: u64) -> Self {
        Self::build_fixture(Self::with_seed(seed))
    }

    fn build_fixture(mut city: City) -> City {
        for _ in 0..5 {
            city.add_station();
        }
        city
    }

    fn random_range(&mut self, range: std::ops::Range<i32>) -> i32 {
        match &mut self.rng {
            Some(rng) => rng.random_range(range),
            None => rand::rng().random_range(range),
        }
    }

    fn random_index(&mut self, len: usize) -> usize {
        match &mut self.rng {
            Some(rng) => rng.random_range(0..len),
            None => rand::rng().random_range(0..len),
        }
    }

    /// A random position inside the square of side `edge_length` centered
    /// at the origin
    fn random_position(&mut self) -> Position {
        let half = (self.edge_length / 2).max(1);
        Position::new(self.random_range(-half..half), self.random_range(-half..half))
    }

    pub fn resolve_station(&self, index: usize) -> Result<StationId, SimError> {
        if index < self.stations.len() {
            Ok(StationId(index))
        } else {
            Err(SimError::not_found("station", index))
        }
    }

    pub fn resolve_train(&self, index: usize) -> Result<TrainId, SimError> {
        if index < self.trains.len() {
            Ok(TrainId(index))
        } else {
            Err(SimError::not_found("train", index))
        }
    }

    /// Line tokens are matched case-insensitively
    pub fn resolve_line(&self, token: &str) -> Result<LineId, SimError> {
        self.lines
            .iter()
            .position(|line| line.color.eq_ignore_ascii_case(token))
            .map(LineId)
            .ok_or_else(|| SimError::not_found("line", token))
    }

    /// Add a station at a random, unoccupied position. Rebuilds the
    /// navigation tables since they are sized by station count.
    pub fn add_station(&mut self) -> StationId {
        let occupied: HashSet<Position> =
            self.stations.iter().map(|station| station.position).collect();
        let mut position = self.random_position();
        while occupied.contains(&position) {
            position = self.random_position();
        }

        let id = StationId(self.stations.len());
        self.stations.push(Station::new(id, position));
        self.rebuild_navigation();
        debug!("station {} opened at ({}, {})", id.0, position.x, position.y);
        id
    }

    /// Open a new line; its color token comes from the fixed palette,
    /// indexed by creation order at the moment of registration.
    pub fn add_line(&mut self) -> Result<LineId, SimError> {
        if self.lines.len() >= self.max_lines {
            return Err(SimError::CapacityExceeded("lines"));
        }
        let Some(&color) = LINE_PALETTE.get(self.lines.len()) else {
            return Err(SimError::CapacityExceeded("line palette"));
        };
        let id = LineId(self.lines.len());
        self.lines.push(Line::new(id, color));
        debug!("line {} opened", color);
        Ok(id)
    }

    /// Remove all stations and trains from a line. Passengers on those
    /// trains are left at the station the train last visited. The line
    /// itself persists and can be repopulated.
    pub fn clear_line(&mut self, line: LineId) -> Result<(), SimError> {
        if line.0 >= self.lines.len() {
            return Err(SimError::not_found("line", line.0));
        }

        let train_indices: Vec<usize> = self
            .trains
            .iter()
            .enumerate()
            .filter(|(_, train)| train.line == Some(line))
            .map(|(index, _)| index)
            .collect();

        for index in train_indices {
            let station = self.trains[index].current_station(&self.lines);
            let stranded = std::mem::take(&mut self.trains[index].passengers);
            self.trains[index].line = None;
            self.trains[index].node = None;
            if let Some(station) = station {
                self.deposit_passengers(stranded, station);
            }
        }

        self.lines[line.0].nodes.clear();
        self.rebuild_navigation();
        Ok(())
    }

    /// Trains currently commissioned on a line (a derived query; lines do
    /// not own trains)
    pub fn line_train_count(&self, line: LineId) -> usize {
        self.trains
            .iter()
            .filter(|train| train.line == Some(line))
            .count()
    }

    /// Insert `station` into `line` at `index` (append when None).
    pub fn add_station_to_line(
        &mut self,
        line: LineId,
        station: StationId,
        index: Option<usize>,
    ) -> Result<(), SimError> {
        if station.0 >= self.stations.len() {
            return Err(SimError::not_found("station", station.0));
        }
        if line.0 >= self.lines.len() {
            return Err(SimError::not_found("line", line.0));
        }
        let inserted = self.lines[line.0].insert_station(station, index)?;

        // Node references held by trains shift with the arena.
        for train in &mut self.trains {
            if train.line != Some(line) {
                continue;
            }
            if let Some(node) = train.node {
                if node >= inserted {
                    train.node = Some(node + 1);
                }
            }
        }

        self.rebuild_navigation();
        Ok(())
    }

    /// Remove `station` from `line`. A train that held the removed node is
    /// relocated to the neighboring node; if the line empties, the train is
    /// decommissioned and its passengers deposited at the removed station.
    pub fn remove_station_from_line(
        &mut self,
        line: LineId,
        station: StationId,
    ) -> Result<(), SimError> {
        if line.0 >= self.lines.len() {
            return Err(SimError::not_found("line", line.0));
        }
        let removed = self.lines[line.0].remove_station(station)?;
        let now_empty = self.lines[line.0].is_empty();

        let mut to_decommission = Vec::new();
        for (index, train) in self.trains.iter_mut().enumerate() {
            if train.line != Some(line) {
                continue;
            }
            match train.node {
                Some(node) if node == removed => {
                    if now_empty {
                        to_decommission.push(index);
                    } else {
                        train.node = Some(removed.saturating_sub(1));
                    }
                }
                Some(node) if node > removed => {
                    train.node = Some(node - 1);
                }
                _ => {}
            }
        }

        for index in to_decommission {
            let stranded = std::mem::take(&mut self.trains[index].passengers);
            self.trains[index].line = None;
            self.trains[index].node = None;
            self.deposit_passengers(stranded, station);
        }

        self.rebuild_navigation();
        Ok(())
    }

    /// Move `station` to `index` within `line`. Validated up front so a
    /// rejected move leaves the topology untouched.
    pub fn move_station_in_line(
        &mut self,
        line: LineId,
        station: StationId,
        index: usize,
    ) -> Result<(), SimError> {
        let topology = self
            .lines
            .get(line.0)
            .ok_or_else(|| SimError::not_found("line", line.0))?;
        if !topology.contains(station) {
            return Err(SimError::NotOnLine);
        }
        let len_after_removal = topology.len() - 1;
        if index > len_after_removal {
            return Err(SimError::InvalidPosition {
                index,
                len: len_after_removal,
            });
        }
        self.remove_station_from_line(line, station)?;
        self.add_station_to_line(line, station, Some(index))
    }

    /// Resolve the node a train should start at on `line`: the given
    /// station's node, or the line's first node by default.
    fn placement_node(&self, line: LineId, station: Option<StationId>) -> Result<usize, SimError> {
        let topology = self
            .lines
            .get(line.0)
            .ok_or_else(|| SimError::not_found("line", line.0))?;
        match station {
            Some(station) => topology.find_node(station).ok_or(SimError::NotOnLine),
            None => {
                if topology.is_empty() {
                    Err(SimError::NotOnLine)
                } else {
                    Ok(0)
                }
            }
        }
    }

    /// Commission a new train, optionally placing it on a line. Placement
    /// is validated before the train is created, so a failure leaves no
    /// orphan behind.
    pub fn add_train(
        &mut self,
        line: Option<LineId>,
        station: Option<StationId>,
        direction: Direction,
    ) -> Result<TrainId, SimError> {
        if self.trains.len() >= self.max_trains {
            return Err(SimError::CapacityExceeded("trains"));
        }
        let placement = match line {
            Some(line) => Some((line, self.placement_node(line, station)?)),
            None => None,
        };

        let id = TrainId(self.trains.len());
        let mut train = Train::new(id);
        if let Some((line, node)) = placement {
            train.assign(line, node, direction);
            debug!(
                "train {} put on line {} heading {}",
                id.0,
                self.lines[line.0].color,
                direction.label()
            );
        }
        self.trains.push(train);
        if let Some(line) = line {
            self.rebuild_after_train_change(None, Some(line));
        }
        Ok(id)
    }

    /// Re-assign a train (with its wagons and passengers) to a line at a
    /// station with a direction.
    pub fn move_train(
        &mut self,
        train: TrainId,
        line: LineId,
        station: Option<StationId>,
        direction: Direction,
    ) -> Result<(), SimError> {
        if train.0 >= self.trains.len() {
            return Err(SimError::not_found("train", train.0));
        }
        let node = self.placement_node(line, station)?;
        let previous = self.trains[train.0].line;
        self.trains[train.0].assign(line, node, direction);
        debug!(
            "train {} moved to line {} heading {}",
            train.0,
            self.lines[line.0].color,
            direction.label()
        );
        self.rebuild_after_train_change(previous, Some(line));
        Ok(())
    }

    /// Detach a train from its line, leaving its passengers at the station
    /// the train is at or last visited. The train persists, decommissioned.
    /// Detaching an already-unassigned train is a no-op.
    pub fn detach_train(&mut self, train: TrainId) -> Result<(), SimError> {
        if train.0 >= self.trains.len() {
            return Err(SimError::not_found("train", train.0));
        }
        let Some(previous) = self.trains[train.0].line else {
            return Ok(());
        };

        let station = self.trains[train.0].current_station(&self.lines);
        let stranded = std::mem::take(&mut self.trains[train.0].passengers);
        self.trains[train.0].line = None;
        self.trains[train.0].node = None;
        if let Some(station) = station {
            self.deposit_passengers(stranded, station);
        }
        debug!("train {} removed from line", train.0);
        self.rebuild_after_train_change(Some(previous), None);
        Ok(())
    }

    /// Couple a wagon from the shared pool onto a train.
    pub fn add_wagon(&mut self, train: TrainId) -> Result<(), SimError> {
        if train.0 >= self.trains.len() {
            return Err(SimError::not_found("train", train.0));
        }
        if self.free_wagons == 0 {
            return Err(SimError::NoWagonsAvailable);
        }
        self.trains[train.0].add_wagon()?;
        self.free_wagons -= 1;
        debug!(
            "train {} extended, capacity now {}",
            train.0,
            self.trains[train.0].capacity()
        );
        Ok(())
    }

    /// Drop a wagon from a train back into the pool. Passengers beyond the
    /// reduced capacity are evicted in reverse boarding order and left at
    /// the train's current station.
    pub fn remove_wagon(&mut self, train: TrainId) -> Result<(), SimError> {
        if train.0 >= self.trains.len() {
            return Err(SimError::not_found("train", train.0));
        }
        let station = self.trains[train.0].current_station(&self.lines);
        let evicted = self.trains[train.0].remove_wagon()?;
        self.free_wagons += 1;
        if !evicted.is_empty() {
            match station {
                Some(station) => self.deposit_passengers(evicted, station),
                None => warn!("train {} evicted passengers with no station to hold them", train.0),
            }
        }
        debug!(
            "train {} shrunk, capacity now {}",
            train.0,
            self.trains[train.0].capacity()
        );
        Ok(())
    }

    /// Advance every train one step (dwell or travel).
    pub fn advance_trains(&mut self) {
        let lines = &self.lines;
        for train in &mut self.trains {
            let Some(line_id) = train.line else { continue };
            let Some(line) = lines.get(line_id.0) else { continue };
            if let Err(error) = train.advance(line) {
                warn!(
                    "train {} failed to advance on line {}: {}",
                    train.id.0, line.color, error
                );
            }
        }
    }

    /// Create a passenger waiting at `origin`, heading for `destination`.
    pub fn spawn_passenger(
        &mut self,
        origin: StationId,
        destination: StationId,
    ) -> Result<PassengerId, SimError> {
        if origin.0 >= self.stations.len() {
            return Err(SimError::not_found("station", origin.0));
        }
        if destination.0 >= self.stations.len() {
            return Err(SimError::not_found("station", destination.0));
        }
        if origin == destination {
            return Err(SimError::MalformedCommand(
                "passenger destination equals origin".into(),
            ));
        }
        let id = PassengerId(self.next_passenger_id);
        self.next_passenger_id += 1;
        self.passengers
            .insert(id, Passenger::new(id, self.time, origin, destination));
        self.stations[origin.0].passengers.push(id);
        debug!(
            "passenger {} spawned at station {} for station {}",
            id.0, origin.0, destination.0
        );
        Ok(id)
    }

    /// Spawn this tick's passengers: an independent Poisson draw per
    /// station, destinations uniform over the other stations. With fewer
    /// than two stations no destination can differ from its origin, so
    /// nothing spawns.
    pub fn spawn_passengers(&mut self) {
        if self.stations.len() < 2 {
            return;
        }
        for index in 0..self.stations.len() {
            let count = self.draw_spawn_count(index);
            for _ in 0..count {
                let destination = self.random_destination(index);
                let _ = self.spawn_passenger(StationId(index), destination);
            }
        }
    }

    fn draw_spawn_count(&mut self, index: usize) -> usize {
        let station = &self.stations[index];
        match &mut self.rng {
            Some(rng) => station.draw_spawn_count(rng),
            None => station.draw_spawn_count(&mut rand::rng()),
        }
    }

    fn random_destination(&mut self, origin: usize) -> StationId {
        loop {
            let candidate = self.random_index(self.stations.len());
            if candidate != origin {
                return StationId(candidate);
            }
        }
    }

    /// All active passengers in routing order: aboard trains first, then
    /// waiting at stations, each group oldest start time first. This order
    /// is the fairness contract for claiming scarce seats.
    pub fn all_passengers(&self) -> Vec<PassengerId> {
        let mut aboard: Vec<(u64, PassengerId)> = Vec::new();
        for train in &self.trains {
            for &id in &train.passengers {
                if let Some(passenger) = self.passengers.get(&id) {
                    aboard.push((passenger.start_time, id));
                }
            }
        }
        aboard.sort_by_key(|&(start, _)| start);

        let mut waiting: Vec<(u64, PassengerId)> = Vec::new();
        for station in &self.stations {
            for &id in &station.passengers {
                if let Some(passenger) = self.passengers.get(&id) {
                    waiting.push((passenger.start_time, id));
                }
            }
        }
        waiting.sort_by_key(|&(start, _)| start);

        aboard
            .into_iter()
            .chain(waiting)
            .map(|(_, id)| id)
            .collect()
    }

    /// Run the routing decision for every active passenger, in the
    /// fairness order of [`Self::all_passengers`].
    pub fn route_passengers(&mut self) {
        for id in self.all_passengers() {
            self.route_passenger(id);
        }
    }

    /// One passenger's decision: leave a train that no longer serves a
    /// shortest route, board the first train that does, and cease to exist
    /// upon reaching the destination.
    fn route_passenger(&mut self, id: PassengerId) {
        let Some(passenger) = self.passengers.get(&id) else {
            return;
        };
        let destination = passenger.destination;

        // Get off a train heading the wrong way.
        if let PassengerLocation::OnTrain(train_id) = passenger.location {
            if let Some(train) = self.trains.get(train_id.0) {
                if let (Some(line), Some(here)) =
                    (train.line, train.current_station(&self.lines))
                {
                    let serves_route = self
                        .navigation
                        .route_options(here, destination)
                        .contains(&(line, train.direction));
                    if !serves_route && train.can_alight() {
                        self.trains[train_id.0].passengers.retain(|&p| p != id);
                        self.stations[here.0].passengers.push(id);
                        if let Some(passenger) = self.passengers.get_mut(&id) {
                            passenger.location = PassengerLocation::AtStation(here);
                        }
                        debug!("passenger {} disembarked at station {}", id.0, here.0);
                    }
                }
            }
        }

        // From a station, board the first train on a shortest route.
        if let Some(PassengerLocation::AtStation(here)) =
            self.passengers.get(&id).map(|p| p.location)
        {
            let mut boarded = None;
            for train in &self.trains {
                if !train.can_board(here, &self.lines) {
                    continue;
                }
                let Some(line) = train.line else { continue };
                if self
                    .navigation
                    .route_options(here, destination)
                    .contains(&(line, train.direction))
                {
                    boarded = Some((train.id, line));
                    break;
                }
            }
            if let Some((train_id, line)) = boarded {
                self.stations[here.0].passengers.retain(|&p| p != id);
                self.trains[train_id.0].passengers.push(id);
                if let Some(passenger) = self.passengers.get_mut(&id) {
                    passenger.location = PassengerLocation::OnTrain(train_id);
                }
                debug!(
                    "passenger {} embarked on the {} line",
                    id.0, self.lines[line.0].color
                );
            }
        }

        // Destination reached: the passenger ceases to exist.
        if let Some(PassengerLocation::AtStation(here)) =
            self.passengers.get(&id).map(|p| p.location)
        {
            if here == destination {
                self.stations[here.0].passengers.retain(|&p| p != id);
                if let Some(passenger) = self.passengers.remove(&id) {
                    let traveled = self.time - passenger.start_time;
                    self.travel_times.push(traveled);
                    debug!("passenger {} arrived after {} ticks", id.0, traveled);
                }
            }
        }
    }

    fn deposit_passengers(&mut self, passengers: Vec<PassengerId>, station: StationId) {
        for id in passengers {
            if let Some(passenger) = self.passengers.get_mut(&id) {
                passenger.location = PassengerLocation::AtStation(station);
            }
            self.stations[station.0].passengers.push(id);
        }
    }

    /// Full rebuild of the navigation tables from the current registries.
    pub fn rebuild_navigation(&mut self) {
        self.navigation
            .rebuild(self.stations.len(), &self.lines, &self.trains);
    }

    /// Rebuild after a train was (un)assigned when it could change which
    /// directions a line serves: either affected line is circular, or its
    /// train count just crossed zero.
    fn rebuild_after_train_change(&mut self, from: Option<LineId>, to: Option<LineId>) {
        let mut needed = false;
        for line in [from, to].into_iter().flatten() {
            if self.lines[line.0].is_circular() || self.line_train_count(line) <= 1 {
                needed = true;
            }
        }
        if needed {
            self.rebuild_navigation();
        }
    }

    /// Apply a batch of external commands, each to completion and in order.
    /// A command that fails validation is rejected with an error signal and
    /// the rest of the batch still applies. The navigation map is rebuilt
    /// unconditionally once afterwards.
    pub fn apply_commands(&mut self, commands: &[Command]) -> Vec<Result<(), SimError>> {
        let results = commands
            .iter()
            .map(|command| {
                let result = self.apply_command(command);
                if let Err(error) = &result {
                    warn!("rejected command {:?}: {}", command, error);
                }
                result
            })
            .collect();
        self.rebuild_navigation();
        results
    }

    fn apply_command(&mut self, command: &Command) -> Result<(), SimError> {
        match command {
            Command::AddTrain {
                line,
                station,
                direction,
            } => {
                if line.is_none() && station.is_some() {
                    return Err(SimError::MalformedCommand(
                        "placing a train at a station requires a line".into(),
                    ));
                }
                let line = line
                    .as_deref()
                    .map(|token| self.resolve_line(token))
                    .transpose()?;
                let station = station.map(|index| self.resolve_station(index)).transpose()?;
                self.add_train(line, station, *direction).map(|_| ())
            }
            Command::RemoveTrain { train } => {
                let train = self.resolve_train(*train)?;
                self.detach_train(train)
            }
            Command::MoveTrain {
                train,
                line,
                station,
                direction,
            } => {
                let train = self.resolve_train(*train)?;
                let line = self.resolve_line(line)?;
                let station = station.map(|index| self.resolve_station(index)).transpose()?;
                self.move_train(train, line, station, *direction)
            }
            Command::ExtendTrain { train } => {
                let train = self.resolve_train(*train)?;
                self.add_wagon(train)
            }
            Command::ShrinkTrain { train } => {
                let train = self.resolve_train(*train)?;
                self.remove_wagon(train)
            }
            Command::AddLine => self.add_line().map(|_| ()),
            Command::ClearLine { line } => {
                let line = self.resolve_line(line)?;
                self.clear_line(line)
            }
            Command::AddStation {
                line,
                station,
                index,
            } => {
                let line = self.resolve_line(line)?;
                let station = self.resolve_station(*station)?;
                self.add_station_to_line(line, station, *index)
            }
            Command::RemoveStation { line, station } => {
                let line = self.resolve_line(line)?;
                let station = self.resolve_station(*station)?;
                self.remove_station_from_line(line, station)
            }
            Command::MoveStation {
                line,
                station,
                index,
            } => {
                let line = self.resolve_line(line)?;
                let station = self.resolve_station(*station)?;
                self.move_station_in_line(line, station, *index)
            }
        }
    }

    /// Longest time any active passenger has been underway, in ticks
    pub fn max_waiting_time(&self) -> Option<u64> {
        self.passengers
            .values()
            .map(|passenger| self.time - passenger.start_time)
            .max()
    }

    /// Mean travel time of the passengers that have arrived
    pub fn mean_travel_time(&self) -> Option<f64> {
        if self.travel_times.is_empty() {
            return None;
        }
        let total: u64 = self.travel_times.iter().sum();
        Some(total as f64 / self.travel_times.len() as f64)
    }

    /// One-line progress report for the runner
    pub fn summary(&self) -> String {
        format!(
            "t={} | stations: {} | lines: {} | trains: {} | traveling: {} | arrived: {} | mean travel: {}",
            self.time,
            self.stations.len(),
            self.lines.len(),
            self.trains.len(),
            self.passengers.len(),
            self.travel_times.len(),
            self.mean_travel_time()
                .map_or_else(|| "-".to_string(), |mean| format!("{mean:.1}")),
        )
    }
}
