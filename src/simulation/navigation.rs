//! All-pairs navigation map passengers use to travel around the city
//!
//! Every line contributes its consecutive station pairs as directed
//! unit-weight edges to a first-hop graph; a Floyd-Warshall pass then
//! produces, for every ordered station pair, the minimum hop count and the
//! set of (line, direction) first hops that lie on some shortest route.
//! The map is always rebuilt from scratch: topology changes are rare
//! relative to ticks, and a full rebuild cannot go stale.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};

use super::line::Line;
use super::train::Train;
use super::types::{Direction, LineId, StationId};

/// A valid first hop: take this line in this direction
pub type RouteOption = (LineId, Direction);

/// Edge payload in the first-hop graph
#[derive(Debug, Clone, Copy)]
struct RouteEdge {
    line: LineId,
    direction: Direction,
}

const UNREACHABLE: u32 = u32::MAX;

/// Shortest-route tables over the current set of stations, lines and trains
#[derive(Debug, Default)]
pub struct NavigationMap {
    graph: DiGraph<StationId, RouteEdge>,
    station_to_node: HashMap<StationId, NodeIndex>,
    /// dist[i][j] = minimum number of station hops from i to j
    dist: Vec<Vec<u32>>,
    /// options[i][j] = first hops achieving dist[i][j]
    options: Vec<Vec<HashSet<RouteOption>>>,
    empty: HashSet<RouteOption>,
}

impl NavigationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stations the tables were last built for
    pub fn station_count(&self) -> usize {
        self.dist.len()
    }

    /// Minimum hop count from `from` to `to`; None when unreachable
    pub fn distance(&self, from: StationId, to: StationId) -> Option<u32> {
        let hops = *self.dist.get(from.0)?.get(to.0)?;
        (hops != UNREACHABLE).then_some(hops)
    }

    /// The (line, direction) first hops that start a shortest route from
    /// `from` to `to`; empty when the pair is unreachable.
    pub fn route_options(&self, from: StationId, to: StationId) -> &HashSet<RouteOption> {
        self.options
            .get(from.0)
            .and_then(|row| row.get(to.0))
            .unwrap_or(&self.empty)
    }

    /// Throw away the previous tables and rebuild them for the current city.
    pub fn rebuild(&mut self, station_count: usize, lines: &[Line], trains: &[Train]) {
        self.build_graph(station_count, lines, trains);
        self.relax();
    }

    /// Build the first-hop graph: one node per station, one directed edge
    /// per traversable consecutive pair on each line.
    fn build_graph(&mut self, station_count: usize, lines: &[Line], trains: &[Train]) {
        self.graph = DiGraph::new();
        self.station_to_node.clear();
        for index in 0..station_count {
            let station = StationId(index);
            let node = self.graph.add_node(station);
            self.station_to_node.insert(station, node);
        }

        for line in lines {
            let (forward, backward) = directions_served(line, trains);
            for (a, b) in consecutive_pairs(line) {
                if a == b {
                    continue;
                }
                let (Some(&from), Some(&to)) =
                    (self.station_to_node.get(&a), self.station_to_node.get(&b))
                else {
                    continue;
                };
                if forward {
                    self.graph.add_edge(
                        from,
                        to,
                        RouteEdge {
                            line: line.id,
                            direction: Direction::Forward,
                        },
                    );
                }
                if backward {
                    self.graph.add_edge(
                        to,
                        from,
                        RouteEdge {
                            line: line.id,
                            direction: Direction::Backward,
                        },
                    );
                }
            }
        }
    }

    /// Floyd-Warshall over every intermediate station, propagating tied
    /// first-hop sets transitively: a tie unions the options, a strictly
    /// shorter path replaces them.
    fn relax(&mut self) {
        let n = self.graph.node_count();
        self.dist = vec![vec![UNREACHABLE; n]; n];
        self.options = vec![vec![HashSet::new(); n]; n];
        for i in 0..n {
            self.dist[i][i] = 0;
        }

        for edge in self.graph.edge_references() {
            let i = self.graph[edge.source()].0;
            let j = self.graph[edge.target()].0;
            let payload = edge.weight();
            self.dist[i][j] = 1;
            self.options[i][j].insert((payload.line, payload.direction));
        }

        for k in 0..n {
            for i in 0..n {
                let via_k = self.dist[i][k];
                if via_k == UNREACHABLE {
                    continue;
                }
                for j in 0..n {
                    let onward = self.dist[k][j];
                    if onward == UNREACHABLE {
                        continue;
                    }
                    let through = via_k + onward;
                    if through < self.dist[i][j] {
                        self.dist[i][j] = through;
                        self.options[i][j] = self.options[i][k].clone();
                    } else if through == self.dist[i][j] && k != j {
                        let shared = self.options[i][k].clone();
                        self.options[i][j].extend(shared);
                    }
                }
            }
        }
    }
}

/// The directions trains can be taken in on this line.
///
/// An open line always serves both directions. A circular line serves the
/// directions its assigned trains are observed running; with no trains
/// aboard (or trains both ways) the ring is traversable both ways.
fn directions_served(line: &Line, trains: &[Train]) -> (bool, bool) {
    if !line.is_circular() {
        return (true, true);
    }
    let mut forward = false;
    let mut backward = false;
    let mut observed = false;
    for train in trains {
        if train.line != Some(line.id) {
            continue;
        }
        observed = true;
        match train.direction {
            Direction::Forward => forward = true,
            Direction::Backward => backward = true,
        }
    }
    if observed {
        (forward, backward)
    } else {
        (true, true)
    }
}

/// Consecutive station pairs in line order, including the closing
/// tail-to-head pair on a circular line.
fn consecutive_pairs(line: &Line) -> Vec<(StationId, StationId)> {
    let stations: Vec<StationId> = line.stations().collect();
    let mut pairs: Vec<(StationId, StationId)> = stations.windows(2).map(|w| (w[0], w[1])).collect();
    if line.is_circular() {
        if let (Some(&last), Some(&first)) = (stations.last(), stations.first()) {
            pairs.push((last, first));
        }
    }
    pairs
}
