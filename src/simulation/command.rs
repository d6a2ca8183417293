//! The semantic contract of the external command protocol
//!
//! Commands arrive in batches before a tick. Identities are raw protocol
//! values (integer indexes for trains and stations, a color token for
//! lines) resolved against the city's current registries at application
//! time; an unresolvable identity rejects that single command without
//! aborting the rest of the batch.

use super::types::Direction;

/// One discrete command from the outside world
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a train, optionally placing it on a line at a station
    AddTrain {
        line: Option<String>,
        station: Option<usize>,
        direction: Direction,
    },
    /// Detach a train from its line; the train persists, decommissioned
    RemoveTrain { train: usize },
    /// Re-assign an existing train to a line/station/direction
    MoveTrain {
        train: usize,
        line: String,
        station: Option<usize>,
        direction: Direction,
    },
    /// Couple one wagon from the shared pool
    ExtendTrain { train: usize },
    /// Drop one wagon back into the shared pool
    ShrinkTrain { train: usize },
    /// Create a new, empty line
    AddLine,
    /// Clear all stations and trains from a line; the line persists
    ClearLine { line: String },
    /// Insert a station into a line's topology
    AddStation {
        line: String,
        station: usize,
        index: Option<usize>,
    },
    /// Remove a station from a line's topology
    RemoveStation { line: String, station: usize },
    /// Reposition a station within a line's topology
    MoveStation {
        line: String,
        station: usize,
        index: usize,
    },
}
