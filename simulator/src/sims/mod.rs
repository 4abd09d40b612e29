//! Simulation drivers.

pub mod experiment;
pub mod simulator;

pub use experiment::{Experiment, Processor, StepResponse};
pub use simulator::{simulate, SimulationOptions, SimulationOutput, Simulator};
