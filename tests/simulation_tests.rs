//! Simulation behavior tests
//!
//! These validate train movement, passenger routing, wagon capacity
//! handling, command batches and the termination contract.

use metro_sim::simulation::{
    City, Command, Direction, Line, LineId, PassengerLocation, Simulation, StationId, Train,
    TrainId, TrainState, MAX_WAITING_TIME, WAGON_CAPACITY,
};

/// A city with `stations` stations and one line threading the first
/// `on_line` of them in order
fn city_with_line(stations: usize, on_line: usize) -> (City, LineId) {
    let mut city = City::with_seed(7);
    for _ in 0..stations {
        city.add_station();
    }
    let line = city.add_line().expect("line creation should succeed");
    for index in 0..on_line {
        city.add_station_to_line(line, StationId(index), None)
            .expect("station insertion should succeed");
    }
    (city, line)
}

#[test]
fn test_train_dwells_one_tick_before_departing() {
    let (mut city, line) = city_with_line(3, 3);
    city.add_train(Some(line), None, Direction::Forward)
        .expect("train placement should succeed");

    assert_eq!(city.trains[0].state, TrainState::AtStation);
    city.advance_trains();
    assert_eq!(city.trains[0].state, TrainState::LeftStation);
    assert_eq!(city.trains[0].current_station(&city.lines), Some(StationId(0)));
    city.advance_trains();
    assert_eq!(city.trains[0].state, TrainState::AtStation);
    assert_eq!(city.trains[0].current_station(&city.lines), Some(StationId(1)));
}

#[test]
fn test_train_bounces_at_open_line_ends() {
    // A train ping-pongs over 0-1-2 without skipping a station or
    // arriving at an endpoint twice in the same direction.
    let mut line = Line::new(LineId(0), "blue");
    for index in 0..3 {
        line.insert_station(StationId(index), None)
            .expect("station insertion should succeed");
    }
    let mut train = Train::new(TrainId(0));
    train.assign(LineId(0), 0, Direction::Forward);

    let mut arrivals = Vec::new();
    for _ in 0..12 {
        train.advance(&line).expect("advance should succeed");
        if train.state == TrainState::AtStation {
            arrivals.push((train.node.unwrap(), train.direction));
        }
    }

    assert_eq!(
        arrivals,
        vec![
            (1, Direction::Forward),
            (2, Direction::Backward),
            (1, Direction::Backward),
            (0, Direction::Forward),
            (1, Direction::Forward),
            (2, Direction::Backward),
        ]
    );
}

#[test]
fn test_train_wraps_on_circular_line_without_flipping() {
    let mut line = Line::new(LineId(0), "blue");
    for index in 0..4 {
        line.insert_station(StationId(index), None)
            .expect("station insertion should succeed");
    }
    line.make_circular();
    let mut train = Train::new(TrainId(0));
    train.assign(LineId(0), 0, Direction::Forward);

    let mut arrivals = Vec::new();
    for _ in 0..10 {
        train.advance(&line).expect("advance should succeed");
        if train.state == TrainState::AtStation {
            arrivals.push((train.node.unwrap(), train.direction));
        }
    }

    let nodes: Vec<usize> = arrivals.iter().map(|&(node, _)| node).collect();
    assert_eq!(nodes, vec![1, 2, 3, 0, 1]);
    assert!(arrivals
        .iter()
        .all(|&(_, direction)| direction == Direction::Forward));
}

#[test]
fn test_single_node_line_keeps_train_in_place() {
    let mut line = Line::new(LineId(0), "blue");
    line.insert_station(StationId(0), None)
        .expect("station insertion should succeed");
    let mut train = Train::new(TrainId(0));
    train.assign(LineId(0), 0, Direction::Forward);

    for _ in 0..4 {
        train.advance(&line).expect("advance should succeed");
    }
    assert_eq!(train.node, Some(0));
    assert_eq!(train.direction, Direction::Forward);
}

#[test]
fn test_passenger_rides_to_destination_and_is_recorded_once() {
    let (mut city, line) = city_with_line(2, 2);
    city.add_train(Some(line), None, Direction::Forward)
        .expect("train placement should succeed");
    let passenger = city
        .spawn_passenger(StationId(0), StationId(1))
        .expect("spawn should succeed");

    // Board while the train dwells at the origin.
    city.route_passengers();
    assert_eq!(
        city.passengers[&passenger].location,
        PassengerLocation::OnTrain(TrainId(0))
    );

    // Departure tick: nobody can alight mid-transit.
    city.advance_trains();
    city.route_passengers();
    assert!(city.passengers.contains_key(&passenger));

    // Arrival tick: alight at the destination and cease to exist.
    city.advance_trains();
    city.route_passengers();
    assert!(!city.passengers.contains_key(&passenger));
    assert!(city.trains[0].passengers.is_empty());
    assert!(city.stations.iter().all(|s| s.passengers.is_empty()));
    assert_eq!(city.travel_times.len(), 1);
}

#[test]
fn test_passenger_leaves_wrong_way_train() {
    // Passenger wants station 0 but the train heads away from it.
    let (mut city, line) = city_with_line(3, 3);
    city.add_train(Some(line), Some(StationId(1)), Direction::Forward)
        .expect("train placement should succeed");
    let passenger = city
        .spawn_passenger(StationId(1), StationId(0))
        .expect("spawn should succeed");

    // The dwelling train heads forward; toward station 0 is backward,
    // so the passenger never boards.
    city.route_passengers();
    assert_eq!(
        city.passengers[&passenger].location,
        PassengerLocation::AtStation(StationId(1))
    );
}

#[test]
fn test_spawned_passengers_never_target_their_origin() {
    let mut sim = Simulation::new(City::fixture_with_seed(11));
    for _ in 0..20 {
        sim.step(&[]);
    }
    assert!(sim
        .city
        .passengers
        .values()
        .all(|passenger| passenger.origin != passenger.destination));

    let result = sim.city.spawn_passenger(StationId(0), StationId(0));
    assert!(result.is_err());
}

#[test]
fn test_scarce_seat_goes_to_the_oldest_passenger() {
    let (mut city, line) = city_with_line(3, 3);
    city.add_train(Some(line), None, Direction::Forward)
        .expect("train placement should succeed");

    // Fill all but one seat with passengers spawned at time zero.
    for _ in 0..(WAGON_CAPACITY - 1) {
        city.spawn_passenger(StationId(0), StationId(2))
            .expect("spawn should succeed");
    }

    // A younger passenger enters the queue before an older one.
    city.time = 5;
    let younger = city
        .spawn_passenger(StationId(0), StationId(2))
        .expect("spawn should succeed");
    city.time = 3;
    let older = city
        .spawn_passenger(StationId(0), StationId(2))
        .expect("spawn should succeed");

    city.route_passengers();
    assert_eq!(
        city.passengers[&older].location,
        PassengerLocation::OnTrain(TrainId(0))
    );
    assert_eq!(
        city.passengers[&younger].location,
        PassengerLocation::AtStation(StationId(0))
    );
    assert_eq!(city.trains[0].passengers.len(), WAGON_CAPACITY);
}

#[test]
fn test_extend_and_shrink_keep_roster_within_capacity() {
    let (mut city, line) = city_with_line(3, 3);
    city.add_train(Some(line), None, Direction::Forward)
        .expect("train placement should succeed");
    city.free_wagons = 1;

    for _ in 0..10 {
        city.spawn_passenger(StationId(0), StationId(2))
            .expect("spawn should succeed");
    }

    // One wagon: six of the ten board.
    city.route_passengers();
    assert_eq!(city.trains[0].passengers.len(), WAGON_CAPACITY);

    // A second wagon makes room for the rest.
    let results = city.apply_commands(&[Command::ExtendTrain { train: 0 }]);
    assert!(results[0].is_ok());
    assert_eq!(city.free_wagons, 0);
    city.route_passengers();
    assert_eq!(city.trains[0].passengers.len(), 10);

    // Shrinking back evicts the most recently boarded down to capacity.
    let results = city.apply_commands(&[Command::ShrinkTrain { train: 0 }]);
    assert!(results[0].is_ok());
    assert_eq!(city.free_wagons, 1);
    assert_eq!(city.trains[0].passengers.len(), WAGON_CAPACITY);
    assert_eq!(city.stations[0].passengers.len(), 4);
    assert!(city.trains[0].passengers.len() <= city.trains[0].capacity());
}

#[test]
fn test_shrink_at_minimum_wagons_is_rejected() {
    // Scenario: a full single-wagon train cannot shrink; the rejection is
    // a capacity error and nobody is evicted.
    let (mut city, line) = city_with_line(3, 3);
    city.add_train(Some(line), None, Direction::Forward)
        .expect("train placement should succeed");
    for _ in 0..WAGON_CAPACITY {
        city.spawn_passenger(StationId(0), StationId(2))
            .expect("spawn should succeed");
    }
    city.route_passengers();
    assert_eq!(city.trains[0].passengers.len(), WAGON_CAPACITY);

    let results = city.apply_commands(&[Command::ShrinkTrain { train: 0 }]);
    assert!(matches!(
        results[0],
        Err(metro_sim::simulation::SimError::CapacityExceeded(_))
    ));
    assert_eq!(city.trains[0].passengers.len(), WAGON_CAPACITY);
}

#[test]
fn test_shrink_without_excess_passengers_evicts_nobody() {
    let (mut city, line) = city_with_line(3, 3);
    city.add_train(Some(line), None, Direction::Forward)
        .expect("train placement should succeed");
    city.free_wagons = 1;
    city.apply_commands(&[Command::ExtendTrain { train: 0 }]);

    for _ in 0..WAGON_CAPACITY {
        city.spawn_passenger(StationId(0), StationId(2))
            .expect("spawn should succeed");
    }
    city.route_passengers();

    // Capacity drops from 12 to 6 with exactly 6 aboard: no eviction.
    let results = city.apply_commands(&[Command::ShrinkTrain { train: 0 }]);
    assert!(results[0].is_ok());
    assert_eq!(city.trains[0].passengers.len(), WAGON_CAPACITY);
    assert!(city.stations[0].passengers.is_empty());
}

#[test]
fn test_extend_with_empty_pool_is_rejected() {
    let (mut city, line) = city_with_line(3, 3);
    city.add_train(Some(line), None, Direction::Forward)
        .expect("train placement should succeed");
    city.free_wagons = 0;

    let results = city.apply_commands(&[Command::ExtendTrain { train: 0 }]);
    assert!(matches!(
        results[0],
        Err(metro_sim::simulation::SimError::NoWagonsAvailable)
    ));
}

#[test]
fn test_detached_train_leaves_passengers_at_its_station() {
    let (mut city, line) = city_with_line(3, 3);
    city.add_train(Some(line), None, Direction::Forward)
        .expect("train placement should succeed");
    for _ in 0..3 {
        city.spawn_passenger(StationId(0), StationId(2))
            .expect("spawn should succeed");
    }
    city.route_passengers();
    assert_eq!(city.trains[0].passengers.len(), 3);

    let results = city.apply_commands(&[Command::RemoveTrain { train: 0 }]);
    assert!(results[0].is_ok());
    assert!(city.trains[0].line.is_none());
    assert!(city.trains[0].passengers.is_empty());
    assert_eq!(city.stations[0].passengers.len(), 3);
    assert!(city
        .passengers
        .values()
        .all(|p| p.location == PassengerLocation::AtStation(StationId(0))));

    // Detaching again is a harmless no-op.
    let results = city.apply_commands(&[Command::RemoveTrain { train: 0 }]);
    assert!(results[0].is_ok());
}

#[test]
fn test_bad_identity_rejects_one_command_not_the_batch() {
    // Scenario: an unknown line token fails; the rest of the batch applies.
    let (mut city, _) = city_with_line(3, 3);
    let results = city.apply_commands(&[
        Command::ClearLine {
            line: "magenta".into(),
        },
        Command::AddLine,
    ]);

    assert!(matches!(
        results[0],
        Err(metro_sim::simulation::SimError::NotFound { .. })
    ));
    assert!(results[1].is_ok());
    assert_eq!(city.lines.len(), 2);
    assert_eq!(city.lines[1].color, "brown");
}

#[test]
fn test_line_tokens_resolve_case_insensitively() {
    let (mut city, _) = city_with_line(3, 2);
    let results = city.apply_commands(&[Command::AddStation {
        line: "BLUE".into(),
        station: 2,
        index: None,
    }]);
    assert!(results[0].is_ok());
    assert_eq!(city.lines[0].len(), 3);
}

#[test]
fn test_train_registry_capacity_is_enforced() {
    let (mut city, line) = city_with_line(3, 3);
    for _ in 0..city.max_trains {
        city.add_train(Some(line), None, Direction::Forward)
            .expect("train creation should succeed");
    }
    let result = city.add_train(None, None, Direction::Forward);
    assert!(matches!(
        result,
        Err(metro_sim::simulation::SimError::CapacityExceeded(_))
    ));
}

#[test]
fn test_placing_a_train_off_its_line_is_rejected_without_side_effects() {
    let (mut city, line) = city_with_line(3, 2);
    let result = city.add_train(Some(line), Some(StationId(2)), Direction::Forward);
    assert!(matches!(
        result,
        Err(metro_sim::simulation::SimError::NotOnLine)
    ));
    // Validation failed before the train was created.
    assert!(city.trains.is_empty());
}

#[test]
fn test_duplicate_and_out_of_range_insertions_are_rejected() {
    let (mut city, line) = city_with_line(3, 2);
    assert!(matches!(
        city.add_station_to_line(line, StationId(0), None),
        Err(metro_sim::simulation::SimError::AlreadyOnLine)
    ));
    assert!(matches!(
        city.add_station_to_line(line, StationId(2), Some(9)),
        Err(metro_sim::simulation::SimError::InvalidPosition { .. })
    ));
    assert_eq!(city.lines[line.0].len(), 2);
}

#[test]
fn test_trains_keep_their_station_as_the_topology_shifts() {
    let (mut city, line) = city_with_line(4, 3);
    city.add_train(Some(line), Some(StationId(2)), Direction::Forward)
        .expect("train placement should succeed");

    // Inserting ahead of the train shifts its node reference.
    city.add_station_to_line(line, StationId(3), Some(0))
        .expect("station insertion should succeed");
    assert_eq!(
        city.trains[0].current_station(&city.lines),
        Some(StationId(2))
    );

    // Removing a node behind the train shifts it back.
    city.remove_station_from_line(line, StationId(3))
        .expect("station removal should succeed");
    assert_eq!(
        city.trains[0].current_station(&city.lines),
        Some(StationId(2))
    );

    // Removing the station under the train relocates it to a neighbor.
    city.remove_station_from_line(line, StationId(2))
        .expect("station removal should succeed");
    assert_eq!(
        city.trains[0].current_station(&city.lines),
        Some(StationId(1))
    );
}

#[test]
fn test_clearing_a_line_strands_its_riders() {
    let (mut city, line) = city_with_line(3, 3);
    city.add_train(Some(line), None, Direction::Forward)
        .expect("train placement should succeed");
    for _ in 0..2 {
        city.spawn_passenger(StationId(0), StationId(2))
            .expect("spawn should succeed");
    }
    city.route_passengers();
    assert_eq!(city.trains[0].passengers.len(), 2);

    city.clear_line(line).expect("clear should succeed");
    assert!(city.lines[line.0].is_empty());
    assert!(city.trains[0].line.is_none());
    assert_eq!(city.stations[0].passengers.len(), 2);
}

#[test]
fn test_simulation_stops_once_someone_waits_too_long() {
    // Five stations, no lines: the first spawned passenger is stranded.
    let mut city = City::fixture_with_seed(3);
    city.spawn_passenger(StationId(0), StationId(1))
        .expect("spawn should succeed");

    let mut sim = Simulation::new(city);
    while sim.should_continue(1_000) {
        sim.step(&[]);
    }
    assert_eq!(sim.city.time, MAX_WAITING_TIME);
}

#[test]
fn test_new_stations_appear_on_the_interval() {
    let mut sim = Simulation::new(City::fixture_with_seed(5));
    let before = sim.city.stations.len();
    for _ in 0..metro_sim::simulation::NEW_STATION_INTERVAL + 1 {
        sim.tick();
    }
    assert_eq!(sim.city.stations.len(), before + 1);

    // Station positions never collide exactly.
    let mut positions: Vec<_> = sim
        .city
        .stations
        .iter()
        .map(|station| station.position)
        .collect();
    positions.sort_by_key(|position| (position.x, position.y));
    positions.dedup();
    assert_eq!(positions.len(), sim.city.stations.len());
}
