//! Stochastic water infiltration over a link graph.
//!
//! Each step drops one droplet: it enters through a wall link picked by
//! alignment with the water direction, then wanders from link to link,
//! paying water and wearing links, until an [`ExitFlag`] ends it.

mod config;
mod simulation;
mod state;

pub use config::{SimConfig, UNBOUNDED_DEPTH_CAP};
pub use simulation::{InfiltrationSimulation, SimulationBackup};
pub use state::{ExitFlag, SimulationState, StepOutcome, SubstepRecord, TraceEntry};
