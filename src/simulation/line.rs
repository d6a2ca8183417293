//! Metro lines: an ordered, doubly linked, possibly circular station topology
//!
//! Nodes live in an arena ordered by line position; previous/next links are
//! arena indices so traversal never chases owning references. Circularity is
//! represented by the tail's next link pointing back at index 0.

use super::error::SimError;
use super::types::{Direction, LineId, StationId};

/// Identifying tokens handed to new lines in creation order.
/// The first line in any simulation is always the blue line.
pub const LINE_PALETTE: [&str; 13] = [
    "blue",
    "brown",
    "cadetblue",
    "chocolate",
    "cornflowerblue",
    "crimson",
    "darkblue",
    "darkgoldenrod",
    "darkgreen",
    "darkkhaki",
    "darkolivegreen",
    "darkorchid",
    "darksalmon",
];

/// One slot in a line's topology: a station plus links to its neighbors
/// on this specific line.
#[derive(Debug, Clone, Copy)]
pub struct StationNode {
    pub station: StationId,
    pub prev: Option<usize>,
    pub next: Option<usize>,
}

/// A metro line that trains run on
///
/// The line holds station handles, not stations; it never owns the trains
/// assigned to it ("trains of a line" is a derived query on the city).
#[derive(Debug, Clone)]
pub struct Line {
    pub id: LineId,
    /// Color token identifying the line, unique among lines
    pub color: &'static str,
    pub nodes: Vec<StationNode>,
}

impl Line {
    pub fn new(id: LineId, color: &'static str) -> Self {
        Self {
            id,
            color,
            nodes: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// A line is circular iff it has at least two nodes and the tail links
    /// back to the head.
    pub fn is_circular(&self) -> bool {
        self.nodes.len() >= 2 && self.nodes.last().and_then(|node| node.next) == Some(0)
    }

    /// Arena index of the node wrapping `station`, if it is on this line
    pub fn find_node(&self, station: StationId) -> Option<usize> {
        self.nodes.iter().position(|node| node.station == station)
    }

    pub fn contains(&self, station: StationId) -> bool {
        self.find_node(station).is_some()
    }

    /// Stations in line order
    pub fn stations(&self) -> impl Iterator<Item = StationId> + '_ {
        self.nodes.iter().map(|node| node.station)
    }

    /// Insert a station at `position` (`None` appends). Inserting into an
    /// empty line ignores the position. Returns the arena index of the new
    /// node so callers can shift any train node references they hold.
    pub fn insert_station(
        &mut self,
        station: StationId,
        position: Option<usize>,
    ) -> Result<usize, SimError> {
        if self.contains(station) {
            return Err(SimError::AlreadyOnLine);
        }

        let node = StationNode {
            station,
            prev: None,
            next: None,
        };

        if self.nodes.is_empty() {
            self.nodes.push(node);
            return Ok(0);
        }

        let len = self.nodes.len();
        let index = position.unwrap_or(len);
        if index > len {
            return Err(SimError::InvalidPosition { index, len });
        }

        let was_circular = self.is_circular();
        self.nodes.insert(index, node);
        self.relink(was_circular);
        Ok(index)
    }

    /// Unlink and remove a station's node, re-linking its neighbors.
    /// Returns the arena index the node occupied.
    pub fn remove_station(&mut self, station: StationId) -> Result<usize, SimError> {
        let index = self.find_node(station).ok_or(SimError::NotOnLine)?;
        let was_circular = self.is_circular();
        self.nodes.remove(index);
        self.relink(was_circular && self.nodes.len() >= 2);
        Ok(index)
    }

    /// Close the line into a ring. No-op on lines shorter than two stations.
    pub fn make_circular(&mut self) {
        if self.nodes.len() >= 2 {
            self.relink(true);
        }
    }

    /// Break the ring back into an open line.
    pub fn break_circular(&mut self) {
        self.relink(false);
    }

    /// The traversal primitive: from the node at `node` heading `direction`,
    /// return the node a train arrives at next and the resulting direction.
    ///
    /// A single-node line returns the same node unchanged. On an open line
    /// the direction reverses upon arrival at an endpoint (a bounce, never a
    /// wrap); on a circular line traversal wraps and the direction never
    /// flips.
    pub fn next_station(
        &self,
        node: usize,
        direction: Direction,
    ) -> Result<(usize, Direction), SimError> {
        if node >= self.nodes.len() {
            return Err(SimError::NodeNotOnLine);
        }
        if self.nodes.len() == 1 {
            return Ok((node, direction));
        }
        if let Some(step) = self.step(node, direction) {
            return Ok(step);
        }
        // Parked at an endpoint facing outward: step as if already reversed.
        self.step(node, direction.opposite())
            .ok_or(SimError::NodeNotOnLine)
    }

    fn step(&self, node: usize, direction: Direction) -> Option<(usize, Direction)> {
        let target = self.link(node, direction)?;
        let resulting = if self.link(target, direction).is_none() {
            direction.opposite()
        } else {
            direction
        };
        Some((target, resulting))
    }

    fn link(&self, node: usize, direction: Direction) -> Option<usize> {
        match direction {
            Direction::Forward => self.nodes[node].next,
            Direction::Backward => self.nodes[node].prev,
        }
    }

    /// Rebuild every node's neighbor links from arena order, closing the
    /// ring when `circular` is set.
    fn relink(&mut self, circular: bool) {
        let len = self.nodes.len();
        for index in 0..len {
            self.nodes[index].prev = if index > 0 {
                Some(index - 1)
            } else if circular {
                Some(len - 1)
            } else {
                None
            };
            self.nodes[index].next = if index + 1 < len {
                Some(index + 1)
            } else if circular {
                Some(0)
            } else {
                None
            };
        }
    }
}
