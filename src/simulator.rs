//! The scheduler.
//!
//! Owns the grid and the agent collection, advances simulated time in
//! discrete steps, aggregates compartment counts into per-step reports,
//! and monitors the termination condition. External ticks arrive at
//! render rate; simulated steps are gated on the injected clock so a fast
//! redraw loop never advances the epidemic.

use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, WallClock};
use crate::config::{ConfigError, SimConfig};
use crate::grid::Grid;
use crate::person::{AgentSnapshot, CompartmentCounts, People, RemovalEvent};
use crate::rng::{self, SimRng};
use crate::setup::{self, Wall};

/// Aggregate compartment counts for one simulated step. Emitted once per
/// step boundary and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportData {
    pub susceptible: usize,
    pub infected: usize,
    pub recovered: usize,
    pub dead: usize,
    pub peak_infected_concurrent: usize,
    pub day: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunState {
    NotStarted,
    Running,
    Paused,
}

/// Everything one simulated step produced.
pub struct StepSummary {
    pub report: ReportData,
    pub removals: Vec<RemovalEvent>,
}

type ReportHook = Box<dyn FnMut(&ReportData) + Send>;

pub struct Simulator {
    config: SimConfig,
    grid: Grid,
    people: People,
    wall: Option<Wall>,
    rng: SimRng,
    clock: Box<dyn Clock>,
    state: RunState,
    day: u32,
    peak_infected: usize,
    latest_report: ReportData,
    last_step_at: Duration,
    report_hook: Option<ReportHook>,
}

impl Simulator {
    /// Builds and populates a simulator driven by real time.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Box::new(WallClock::new()))
    }

    /// Builds and populates a simulator with an injected clock, so tests
    /// can drive exact step boundaries.
    pub fn with_clock(config: SimConfig, clock: Box<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        let (grid, people, wall, rng) = build_world(&config);
        let mut simulator = Self {
            config,
            grid,
            people,
            wall,
            rng,
            clock,
            state: RunState::NotStarted,
            day: 0,
            peak_infected: 0,
            latest_report: ReportData {
                susceptible: 0,
                infected: 0,
                recovered: 0,
                dead: 0,
                peak_infected_concurrent: 0,
                day: 0,
            },
            last_step_at: Duration::ZERO,
            report_hook: None,
        };
        simulator.latest_report = simulator.compose_report();
        Ok(simulator)
    }

    /// Invoked once per simulated step boundary with the fresh report.
    pub fn set_report_hook(&mut self, hook: impl FnMut(&ReportData) + Send + 'static) {
        self.report_hook = Some(Box::new(hook));
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn people(&self) -> &People {
        &self.people
    }

    pub fn counts(&self) -> CompartmentCounts {
        self.people.counts()
    }

    pub fn latest_report(&self) -> ReportData {
        self.latest_report
    }

    /// Live read-only view for the rendering collaborator; independent of
    /// the simulated-step rate.
    pub fn agents(&self) -> Vec<AgentSnapshot> {
        self.people.snapshots()
    }

    /// Begins (or resumes) advancing and resets the step clock.
    pub fn start(&mut self) {
        self.state = RunState::Running;
        self.last_step_at = self.clock.elapsed();
    }

    /// Stops advancing; all agent state stays intact.
    pub fn pause(&mut self) {
        self.state = RunState::Paused;
    }

    /// Discards and rebuilds the grid, the agents, and the step counters
    /// from the configured scenario, then emits a day-0 report so a
    /// consistent first snapshot exists before the caller resumes.
    pub fn restart(&mut self) {
        let (grid, people, wall, rng) = build_world(&self.config);
        self.grid = grid;
        self.people = people;
        self.wall = wall;
        self.rng = rng;
        self.day = 0;
        self.peak_infected = 0;
        self.state = RunState::Paused;
        let report = self.compose_report();
        self.latest_report = report;
        if let Some(hook) = &mut self.report_hook {
            hook(&report);
        }
    }

    /// Takes effect on the next restart.
    pub fn enable_death(&mut self, allow: bool) {
        self.config.allow_deaths = allow;
    }

    /// Takes effect on the next restart.
    pub fn enable_age(&mut self, allow: bool) {
        self.config.allow_age = allow;
    }

    /// External tick at render rate. Recomputes nothing unless the step
    /// interval has elapsed; ticks faster than the interval are
    /// rendering-only refreshes.
    pub fn tick(&mut self) -> Option<ReportData> {
        if !matches!(self.state, RunState::Running) {
            return None;
        }
        let now = self.clock.elapsed();
        let interval = Duration::from_millis(self.config.step_interval_ms);
        if now.saturating_sub(self.last_step_at) < interval {
            return None;
        }
        self.last_step_at = now;
        Some(self.step().report)
    }

    /// One unconditional simulated step: wall easing, agent behavior,
    /// aggregation, report emission, termination check.
    pub fn step(&mut self) -> StepSummary {
        self.day += 1;
        if let Some(wall) = &mut self.wall {
            wall.maybe_ease(self.day, &mut self.grid);
        }
        let removals = self.people.advance(&mut self.grid, &mut self.rng);
        let report = self.compose_report();
        self.latest_report = report;
        if let Some(hook) = &mut self.report_hook {
            hook(&report);
        }
        if report.infected == 0 && report.recovered > 0 {
            if matches!(self.state, RunState::Running) {
                info!("epidemic has run its course on day {}; pausing", report.day);
            }
            self.state = RunState::Paused;
        }
        StepSummary { report, removals }
    }

    /// Drives up to `max_steps` simulated steps headless, stopping early
    /// when the epidemic has run its course.
    pub fn run(&mut self, max_steps: u32) -> Vec<ReportData> {
        self.start();
        let mut reports = Vec::with_capacity(max_steps as usize);
        for _ in 0..max_steps {
            if !matches!(self.state, RunState::Running) {
                break;
            }
            reports.push(self.step().report);
        }
        reports
    }

    fn compose_report(&mut self) -> ReportData {
        let counts = self.people.counts();
        self.peak_infected = self.peak_infected.max(counts.infected);
        ReportData {
            susceptible: counts.susceptible,
            infected: counts.infected,
            recovered: counts.recovered,
            dead: counts.dead,
            peak_infected_concurrent: self.peak_infected,
            day: self.day,
        }
    }
}

fn build_world(config: &SimConfig) -> (Grid, People, Option<Wall>, SimRng) {
    let (size_x, size_y) = config.grid_size();
    let mut grid = Grid::new(size_x, size_y);
    let mut rng = rng::seeded(config.seed);
    let (people, wall) = setup::populate(config, &mut grid, &mut rng);
    (grid, people, wall, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::Scenario;

    fn small_config() -> SimConfig {
        SimConfig {
            width: 100,
            height: 100,
            entities: 4,
            scenario: Scenario::FreeForAll,
            ..SimConfig::default()
        }
    }

    #[test]
    fn test_day_zero_report_has_the_seed() {
        let simulator = Simulator::new(small_config()).unwrap();
        let report = simulator.latest_report();
        assert_eq!(report.day, 0);
        assert_eq!(report.infected, 1);
        assert_eq!(report.susceptible, 3);
        assert_eq!(report.peak_infected_concurrent, 1);
    }

    #[test]
    fn test_tick_is_gated_by_the_step_interval() {
        let clock = ManualClock::new();
        let mut simulator =
            Simulator::with_clock(small_config(), Box::new(clock.clone())).unwrap();
        assert!(simulator.tick().is_none(), "not started yet");

        simulator.start();
        clock.advance(Duration::from_millis(400));
        assert!(simulator.tick().is_none(), "interval has not elapsed");
        assert_eq!(simulator.day(), 0);

        clock.advance(Duration::from_millis(700));
        let report = simulator.tick().expect("step boundary reached");
        assert_eq!(report.day, 1);

        assert!(simulator.tick().is_none(), "the gate re-arms after a step");
    }

    #[test]
    fn test_pause_keeps_state_intact() {
        let mut simulator = Simulator::new(small_config()).unwrap();
        simulator.start();
        simulator.step();
        simulator.step();
        simulator.pause();

        assert!(matches!(simulator.state(), RunState::Paused));
        assert_eq!(simulator.day(), 2);
        assert_eq!(simulator.counts().total(), 4);
    }

    #[test]
    fn test_restart_rebuilds_from_scratch() {
        let mut simulator = Simulator::new(small_config()).unwrap();
        simulator.start();
        for _ in 0..5 {
            simulator.step();
        }
        simulator.restart();

        assert_eq!(simulator.day(), 0);
        assert!(matches!(simulator.state(), RunState::Paused));
        let report = simulator.latest_report();
        assert_eq!(report.day, 0);
        assert_eq!(report.infected, 1);
        assert_eq!(report.peak_infected_concurrent, 1);
    }

    #[test]
    fn test_flag_changes_apply_on_restart() {
        let mut simulator = Simulator::new(small_config()).unwrap();
        assert!(!simulator.config().allow_deaths);
        simulator.enable_death(true);
        simulator.enable_age(true);
        simulator.restart();
        assert!(simulator.config().allow_deaths);
        assert!(simulator.config().allow_age);
    }
}
