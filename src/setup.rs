//! Scenario setup: population placement, quarantine assignment, and the
//! forced-quarantine wall.

use log::{debug, warn};
use rand::Rng;

use crate::config::{Scenario, SimConfig};
use crate::grid::{Grid, Occupant, Point};
use crate::mortality::{mortality_for, sample_age};
use crate::person::{People, PersonId};
use crate::rng::SimRng;

/// Failsafe for the random placement loop on a near-full grid.
const PLACEMENT_RETRY_CEILING: u32 = 10_000;

/// A vertical obstacle wall splitting the grid, eased open over time. The
/// easing schedule is driven by the simulated step counter, so a paused
/// simulation never loses wall cells.
pub struct Wall {
    column: i32,
    center_row: i32,
    easings: u32,
}

impl Wall {
    /// Simulated steps between easing events.
    pub const EASE_INTERVAL_STEPS: u32 = 30;
    /// Easing stops after this many events.
    pub const MAX_EASINGS: u32 = 10;

    /// Places obstacles over the full height of the grid's center column.
    /// The grid must be freshly built and empty.
    fn build(grid: &mut Grid) -> Self {
        let column = grid.size_x() / 2;
        for row in 0..grid.size_y() {
            grid.add_to_location(Occupant::Obstacle, Point::new(column, row))
                .expect("wall cells are free on a fresh grid");
        }
        Self {
            column,
            center_row: grid.size_y() / 2,
            easings: 0,
        }
    }

    pub fn column(&self) -> i32 {
        self.column
    }

    /// Applies an easing event when the step count is on the interval and
    /// the schedule is not exhausted: frees the band of wall cells within
    /// `easings` rows of the center, widening one row per event. Only
    /// obstacle cells are freed; agents that wandered into the gap keep
    /// their cells.
    pub fn maybe_ease(&mut self, step: u32, grid: &mut Grid) -> bool {
        if step == 0 || step % Self::EASE_INTERVAL_STEPS != 0 {
            return false;
        }
        if self.easings >= Self::MAX_EASINGS {
            return false;
        }
        let radius = self.easings as i32;
        for row in (self.center_row - radius)..=(self.center_row + radius) {
            let point = Point::new(self.column, row);
            if matches!(grid.object_at(point), Some(Occupant::Obstacle)) {
                grid.free_location(point);
            }
        }
        self.easings += 1;
        debug!(
            "quarantine wall eased at step {step} ({} of {} events)",
            self.easings,
            Self::MAX_EASINGS
        );
        true
    }
}

/// Populates a fresh grid for the configured scenario: wall, random
/// collision-free placement, per-agent mortality, quarantine marking, and
/// the single seeded infection.
pub fn populate(config: &SimConfig, grid: &mut Grid, rng: &mut SimRng) -> (People, Option<Wall>) {
    let wall = if matches!(config.scenario, Scenario::ForcedQuarantine) {
        Some(Wall::build(grid))
    } else {
        None
    };

    let mut people = People::new();
    let mut tries = 0;
    while people.len() < config.entities && tries < PLACEMENT_RETRY_CEILING {
        let candidate = Point::new(
            rng.gen_range(0..grid.size_x()),
            rng.gen_range(0..grid.size_y()),
        );
        if grid.object_at(candidate).is_none() {
            let id = people
                .spawn(grid, candidate)
                .expect("candidate cell was checked free");
            if config.allow_age {
                let age = sample_age(rng);
                people.get_mut(id).set_age(age);
            }
            let mortality = mortality_for(people.get(id).age());
            people.get_mut(id).allow_death(config.allow_deaths, mortality);
        }
        tries += 1;
    }
    if people.len() < config.entities {
        warn!(
            "placed only {} of {} agents within {} tries; continuing short",
            people.len(),
            config.entities,
            PLACEMENT_RETRY_CEILING
        );
    } else {
        debug!("placed {} agents in {} tries", people.len(), tries);
    }

    quarantine_by_scenario(config, &mut people);
    seed_infection(&mut people, wall.as_ref(), rng);

    (people, wall)
}

/// Marks the leading share of the population (in placement order) as
/// quarantined. Forced quarantine relies on the physical wall instead.
fn quarantine_by_scenario(config: &SimConfig, people: &mut People) {
    let quarantined = match config.scenario {
        Scenario::QuarterFree => config.entities - config.entities / 4,
        Scenario::OneInEightFree => config.entities - config.entities / 8,
        Scenario::FreeForAll | Scenario::ForcedQuarantine => 0,
    };
    for idx in 0..quarantined.min(people.len()) {
        people.get_mut(PersonId(idx)).set_quarantine(true);
    }
}

/// Force-infects the first placed person that is free to roam; behind a
/// wall, eligibility is limited to the left side so exactly one enclosure
/// starts infected.
fn seed_infection(people: &mut People, wall: Option<&Wall>, rng: &mut SimRng) {
    let seed = people
        .iter()
        .find(|(_, person)| {
            !person.is_in_quarantine()
                && wall.map_or(true, |wall| person.position().x < wall.column())
        })
        .map(|(id, _)| id);
    match seed {
        Some(id) => {
            people.get_mut(id).infect(true, rng);
        }
        None => warn!("no eligible agent to seed the infection"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::person::Compartment;
    use crate::rng::seeded;

    fn config(scenario: Scenario, entities: usize) -> SimConfig {
        SimConfig {
            entities,
            scenario,
            ..SimConfig::default()
        }
    }

    fn build(config: &SimConfig) -> (Grid, People, Option<Wall>) {
        let (size_x, size_y) = config.grid_size();
        let mut grid = Grid::new(size_x, size_y);
        let mut rng = seeded(config.seed);
        let (people, wall) = populate(config, &mut grid, &mut rng);
        (grid, people, wall)
    }

    #[test]
    fn test_every_agent_gets_its_own_cell() {
        let config = config(Scenario::FreeForAll, 200);
        let (grid, people, _) = build(&config);
        assert_eq!(people.len(), 200);
        let occupied = grid.occupants().count();
        assert_eq!(occupied, 200);
        for (id, person) in people.iter() {
            assert_eq!(
                grid.object_at(person.position()),
                Some(Occupant::Person(id))
            );
        }
    }

    #[test]
    fn test_placement_shortfall_is_soft() {
        // A 10x10 px area is a single cell; only one of five fits.
        let config = SimConfig {
            width: 10,
            height: 10,
            entities: 5,
            ..SimConfig::default()
        };
        let (_, people, _) = build(&config);
        assert_eq!(people.len(), 1);
    }

    #[test]
    fn test_exactly_one_seed_infection() {
        let config = config(Scenario::FreeForAll, 50);
        let (_, people, _) = build(&config);
        let infected = people
            .iter()
            .filter(|(_, p)| p.state() == Compartment::Infected)
            .count();
        assert_eq!(infected, 1);
    }

    #[test]
    fn test_wall_spans_full_height() {
        let config = config(Scenario::ForcedQuarantine, 20);
        let (grid, _, wall) = build(&config);
        let wall = wall.expect("forced quarantine builds a wall");
        assert_eq!(wall.column(), grid.size_x() / 2);
        for row in 0..grid.size_y() {
            assert_eq!(
                grid.object_at(Point::new(wall.column(), row)),
                Some(Occupant::Obstacle)
            );
        }
    }

    #[test]
    fn test_seed_is_left_of_the_wall() {
        let config = config(Scenario::ForcedQuarantine, 60);
        let (_, people, wall) = build(&config);
        let wall = wall.expect("forced quarantine builds a wall");
        let (_, seeded_person) = people
            .iter()
            .find(|(_, p)| p.state() == Compartment::Infected)
            .expect("one agent is seeded");
        assert!(seeded_person.position().x < wall.column());
    }

    #[test]
    fn test_easing_frees_a_widening_band() {
        let config = config(Scenario::ForcedQuarantine, 0);
        let (mut grid, _, wall) = build(&config);
        let mut wall = wall.expect("forced quarantine builds a wall");
        let column = wall.column();
        let center = grid.size_y() / 2;

        assert!(!wall.maybe_ease(1, &mut grid), "off-interval steps do nothing");
        assert!(wall.maybe_ease(Wall::EASE_INTERVAL_STEPS, &mut grid));
        assert_eq!(grid.object_at(Point::new(column, center)), None);
        assert_eq!(
            grid.object_at(Point::new(column, center + 1)),
            Some(Occupant::Obstacle)
        );

        assert!(wall.maybe_ease(2 * Wall::EASE_INTERVAL_STEPS, &mut grid));
        assert_eq!(grid.object_at(Point::new(column, center + 1)), None);
        assert_eq!(grid.object_at(Point::new(column, center - 1)), None);
    }

    #[test]
    fn test_easing_stops_after_the_schedule() {
        let config = config(Scenario::ForcedQuarantine, 0);
        let (mut grid, _, wall) = build(&config);
        let mut wall = wall.expect("forced quarantine builds a wall");
        for event in 1..=Wall::MAX_EASINGS {
            assert!(wall.maybe_ease(event * Wall::EASE_INTERVAL_STEPS, &mut grid));
        }
        assert!(!wall.maybe_ease((Wall::MAX_EASINGS + 1) * Wall::EASE_INTERVAL_STEPS, &mut grid));
    }
}
