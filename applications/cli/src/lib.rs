//! Waypoint CLI
//!
//! Plays tours from the terminal against a simulated media element, and
//! inspects or resets the progress saved for them.

pub mod config;
pub mod error;
pub mod simulator;

pub use config::CliConfig;
pub use error::{CliError, Result};
pub use simulator::{Simulation, SimulationReport};
