pub mod clock;
pub mod config;
pub mod grid;
pub mod mortality;
pub mod person;
pub mod report;
pub mod rng;
pub mod setup;
pub mod simulator;
pub mod web;

pub use config::{Scenario, SimConfig};
pub use simulator::{ReportData, RunState, Simulator};
