//! The agent state machine.
//!
//! A person is SUSCEPTIBLE until infected, stays INFECTED for a fixed
//! number of simulated steps, then leaves the compartment as RECOVERED or
//! DEAD depending on its mortality. RECOVERED and DEAD are terminal.
//! Movement and infection both work on the Moore-1 neighborhood of the
//! agent's cell.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::grid::{Grid, GridError, Occupant, Point};
use crate::rng::{RngExt, SimRng};

/// Handle into [`People`]; stable for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonId(pub usize);

/// States of the "people" in the SIR model. DEAD and RECOVERED are
/// separate compartments because they report differently, but both are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compartment {
    Susceptible,
    Infected,
    Recovered,
    Dead,
}

/// Emitted at the moment an agent leaves the INFECTED compartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovalEvent {
    pub person: PersonId,
    pub compartment: Compartment,
}

/// Read-only view handed to the rendering collaborator.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AgentSnapshot {
    pub position: Point,
    pub compartment: Compartment,
    pub quarantined: bool,
}

/// Compartment totals over the whole population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompartmentCounts {
    pub susceptible: usize,
    pub infected: usize,
    pub recovered: usize,
    pub dead: usize,
}

impl CompartmentCounts {
    pub fn total(&self) -> usize {
        self.susceptible + self.infected + self.recovered + self.dead
    }
}

/// Simulated steps spent infected before the recovery/mortality roll.
pub const RECOVERY_TIME: u32 = 14;

/// An adjacency infection attempt succeeds when the draw lands at or above
/// this threshold (roughly one attempt in ten).
const TRANSMISSION_THRESHOLD: f64 = 0.9;

#[derive(Debug, Clone)]
pub struct Person {
    position: Point,
    state: Compartment,
    step_infected: u32,
    recovery_time: u32,
    people_infected: u32,
    steps_infected: u32,
    avg_infections: f64,
    current_time_step: u32,
    in_quarantine: bool,
    chance_of_death: f64,
    age: Option<u32>,
}

impl Person {
    pub fn new(position: Point) -> Self {
        Self {
            position,
            state: Compartment::Susceptible,
            step_infected: 0,
            recovery_time: RECOVERY_TIME,
            people_infected: 0,
            steps_infected: 0,
            avg_infections: 0.0,
            current_time_step: 0,
            in_quarantine: false,
            chance_of_death: 0.0,
            age: None,
        }
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn state(&self) -> Compartment {
        self.state
    }

    pub fn is_in_quarantine(&self) -> bool {
        self.in_quarantine
    }

    pub fn set_quarantine(&mut self, quarantine: bool) {
        self.in_quarantine = quarantine;
    }

    pub fn people_infected(&self) -> u32 {
        self.people_infected
    }

    pub fn avg_infections(&self) -> f64 {
        self.avg_infections
    }

    pub fn age(&self) -> Option<u32> {
        self.age
    }

    /// Stores the age for the mortality lookup at setup time.
    pub fn set_age(&mut self, age: u32) {
        self.age = Some(age);
    }

    /// Configures the mortality roll: `mortality` when deaths are allowed,
    /// zero otherwise.
    pub fn allow_death(&mut self, allow: bool, mortality: f64) {
        self.chance_of_death = if allow { mortality } else { 0.0 };
    }

    /// Attempts to infect this person. Unforced attempts succeed with a
    /// fixed probability; forced attempts always succeed. On success the
    /// current step is recorded so recovery timing is deterministic.
    /// Returns whether infection occurred so the source can count it.
    pub fn infect(&mut self, force: bool, rng: &mut SimRng) -> bool {
        if self.state != Compartment::Susceptible {
            return false;
        }
        if !force && rng.gen::<f64>() < TRANSMISSION_THRESHOLD {
            return false;
        }
        self.step_infected = self.current_time_step;
        self.state = Compartment::Infected;
        true
    }

    /// Advances this person's step counter; called once per simulated step
    /// for every agent before any agent acts.
    pub fn add_time_step(&mut self) {
        self.current_time_step += 1;
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            position: self.position,
            compartment: self.state,
            quarantined: self.in_quarantine,
        }
    }
}

/// Owns every agent in the simulation. The grid stores only handles into
/// this collection; placement order doubles as iteration order for both
/// quarantine assignment and per-step behavior.
#[derive(Default)]
pub struct People {
    persons: Vec<Person>,
}

impl People {
    pub fn new() -> Self {
        Self {
            persons: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    /// Creates a person at the given cell, registering it with the grid.
    /// The cell must be free; callers check first.
    pub fn spawn(&mut self, grid: &mut Grid, position: Point) -> Result<PersonId, GridError> {
        let id = PersonId(self.persons.len());
        grid.add_to_location(Occupant::Person(id), position)?;
        self.persons.push(Person::new(position));
        Ok(id)
    }

    pub fn get(&self, id: PersonId) -> &Person {
        &self.persons[id.0]
    }

    pub fn get_mut(&mut self, id: PersonId) -> &mut Person {
        &mut self.persons[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = (PersonId, &Person)> {
        self.persons
            .iter()
            .enumerate()
            .map(|(idx, person)| (PersonId(idx), person))
    }

    /// One linear scan over the live collection.
    pub fn counts(&self) -> CompartmentCounts {
        let mut counts = CompartmentCounts::default();
        for person in &self.persons {
            match person.state {
                Compartment::Susceptible => counts.susceptible += 1,
                Compartment::Infected => counts.infected += 1,
                Compartment::Recovered => counts.recovered += 1,
                Compartment::Dead => counts.dead += 1,
            }
        }
        counts
    }

    pub fn snapshots(&self) -> Vec<AgentSnapshot> {
        self.persons.iter().map(Person::snapshot).collect()
    }

    /// Advances one simulated step: every agent's clock first, then every
    /// agent's behavior in placement order. Returns the removal events of
    /// the step in the order they occurred.
    pub fn advance(&mut self, grid: &mut Grid, rng: &mut SimRng) -> Vec<RemovalEvent> {
        for person in &mut self.persons {
            person.add_time_step();
        }
        let mut removals = Vec::new();
        for idx in 0..self.persons.len() {
            if let Some(event) = self.act(PersonId(idx), grid, rng) {
                removals.push(event);
            }
        }
        removals
    }

    /// Per-step behavior of a single agent: infect neighbors, roll
    /// recovery/mortality at the end of the infectious period, then move
    /// unless dead or quarantined.
    fn act(&mut self, id: PersonId, grid: &mut Grid, rng: &mut SimRng) -> Option<RemovalEvent> {
        let mut removal = None;
        if self.persons[id.0].state == Compartment::Infected {
            self.try_infect_surroundings(id, grid, rng);
            let person = &mut self.persons[id.0];
            if person.current_time_step - person.step_infected == person.recovery_time {
                let next = if rng.chance(person.chance_of_death) {
                    Compartment::Dead
                } else {
                    Compartment::Recovered
                };
                person.state = next;
                removal = Some(RemovalEvent {
                    person: id,
                    compartment: next,
                });
            } else {
                person.steps_infected += 1;
                person.avg_infections =
                    f64::from(person.people_infected) / f64::from(person.steps_infected);
            }
        }

        let person = &self.persons[id.0];
        if person.state == Compartment::Dead || person.in_quarantine {
            return removal;
        }

        let origin = person.position;
        let destination = grid.random_free_location_from(origin, 1, rng);
        if destination != origin {
            grid.relocate(origin, destination)
                .expect("occupancy index out of sync with agent position");
            self.persons[id.0].position = destination;
        }
        removal
    }

    /// Attempts to infect each susceptible person in the Moore-1
    /// neighborhood. Two quarantined agents never transmit to each other;
    /// every success is credited to this agent's infection count.
    fn try_infect_surroundings(&mut self, id: PersonId, grid: &Grid, rng: &mut SimRng) {
        let origin = self.persons[id.0].position;
        let quarantined = self.persons[id.0].in_quarantine;
        let mut infected = 0;
        for location in grid.adjacent_points(origin, 1, rng) {
            let Some(Occupant::Person(other)) = grid.object_at(location) else {
                continue;
            };
            let neighbor = &mut self.persons[other.0];
            if neighbor.state != Compartment::Susceptible {
                continue;
            }
            if quarantined && neighbor.in_quarantine {
                continue;
            }
            if neighbor.infect(false, rng) {
                infected += 1;
            }
        }
        self.persons[id.0].people_infected += infected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::seeded;

    #[test]
    fn test_forced_infection_always_succeeds() {
        let mut rng = seeded(5);
        let mut person = Person::new(Point::new(0, 0));
        assert!(person.infect(true, &mut rng));
        assert_eq!(person.state(), Compartment::Infected);
    }

    #[test]
    fn test_unforced_infection_rate_is_about_ten_percent() {
        let mut rng = seeded(6);
        let mut successes = 0;
        for _ in 0..1000 {
            let mut person = Person::new(Point::new(0, 0));
            if person.infect(false, &mut rng) {
                successes += 1;
            }
        }
        assert!(
            (60..160).contains(&successes),
            "expected ~100 successes out of 1000, got {successes}"
        );
    }

    #[test]
    fn test_terminal_states_cannot_be_reinfected() {
        let mut rng = seeded(7);
        let mut grid = Grid::new(3, 3);
        let mut people = People::new();
        let id = people.spawn(&mut grid, Point::new(1, 1)).unwrap();
        people.get_mut(id).infect(true, &mut rng);
        people.get_mut(id).allow_death(false, 0.5);

        let mut removals = Vec::new();
        for _ in 0..RECOVERY_TIME {
            removals = people.advance(&mut grid, &mut rng);
        }
        assert_eq!(removals.len(), 1);
        assert_eq!(removals[0].compartment, Compartment::Recovered);

        assert!(!people.get_mut(id).infect(true, &mut rng));
        assert_eq!(people.get(id).state(), Compartment::Recovered);
    }

    #[test]
    fn test_counts_cover_every_compartment() {
        let mut grid = Grid::new(4, 1);
        let mut people = People::new();
        let mut rng = seeded(8);
        for x in 0..3 {
            people.spawn(&mut grid, Point::new(x, 0)).unwrap();
        }
        people.get_mut(PersonId(0)).infect(true, &mut rng);

        let counts = people.counts();
        assert_eq!(counts.susceptible, 2);
        assert_eq!(counts.infected, 1);
        assert_eq!(counts.total(), 3);
    }
}
