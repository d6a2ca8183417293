//! Metro Simulation Library
//!
//! A growing transit-network simulation: stations spawn passengers, lines
//! connect stations, trains shuttle passengers toward their destinations.

pub mod simulation;
