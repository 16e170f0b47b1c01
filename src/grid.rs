//! Spatial model - the occupancy grid.
//!
//! The grid is an exclusive index: each cell holds at most one occupant
//! handle. Agents and obstacles are owned by the simulator's collections;
//! the grid only maps cells to handles and answers neighborhood queries.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::person::PersonId;
use crate::rng::SimRng;

/// A point in 2 dimensions (X, Y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Anything that can occupy a cell. Obstacles carry no state; they exist
/// purely to deny movement and placement through their cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupant {
    Person(PersonId),
    Obstacle,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("point ({}, {}) is outside the grid", .0.x, .0.y)]
    OutOfBounds(Point),
    #[error("cell ({}, {}) is already occupied", .0.x, .0.y)]
    CellOccupied(Point),
    #[error("cell ({}, {}) is empty", .0.x, .0.y)]
    CellEmpty(Point),
}

/// A fixed-size 2D occupancy index.
pub struct Grid {
    size_x: i32,
    size_y: i32,
    cells: Vec<Option<Occupant>>,
}

impl Grid {
    pub fn new(size_x: i32, size_y: i32) -> Self {
        assert!(size_x > 0 && size_y > 0, "grid dimensions must be positive");
        Self {
            size_x,
            size_y,
            cells: vec![None; (size_x * size_y) as usize],
        }
    }

    pub fn size_x(&self) -> i32 {
        self.size_x
    }

    pub fn size_y(&self) -> i32 {
        self.size_y
    }

    pub fn in_bounds(&self, point: Point) -> bool {
        point.x >= 0 && point.x < self.size_x && point.y >= 0 && point.y < self.size_y
    }

    fn index(&self, point: Point) -> usize {
        (point.y * self.size_x + point.x) as usize
    }

    /// O(1) lookup. None for empty and for out-of-range points.
    pub fn object_at(&self, point: Point) -> Option<Occupant> {
        if !self.in_bounds(point) {
            return None;
        }
        self.cells[self.index(point)]
    }

    /// Places an occupant in a cell. Callers are required to check for
    /// occupancy first; an error here means a broken invariant upstream.
    pub fn add_to_location(&mut self, occupant: Occupant, point: Point) -> Result<(), GridError> {
        if !self.in_bounds(point) {
            return Err(GridError::OutOfBounds(point));
        }
        let idx = self.index(point);
        if self.cells[idx].is_some() {
            return Err(GridError::CellOccupied(point));
        }
        self.cells[idx] = Some(occupant);
        Ok(())
    }

    /// Clears a cell unconditionally. Out-of-range points are ignored.
    pub fn free_location(&mut self, point: Point) {
        if self.in_bounds(point) {
            let idx = self.index(point);
            self.cells[idx] = None;
        }
    }

    /// Moves the occupant of `from` into `to`. The occupant's recorded
    /// position is updated by the caller; position and cell key only ever
    /// change together through this operation.
    pub fn relocate(&mut self, from: Point, to: Point) -> Result<(), GridError> {
        if from == to {
            return Ok(());
        }
        let occupant = self.object_at(from).ok_or(GridError::CellEmpty(from))?;
        self.add_to_location(occupant, to)?;
        self.free_location(from);
        Ok(())
    }

    /// Enumerates the Moore neighborhood of the given radius (the
    /// (2r+1)^2 block minus the center), clipped to the grid bounds, in
    /// uniformly random order. Callers that want "first empty" semantics
    /// rely on this shuffle rather than re-shuffling themselves.
    pub fn adjacent_points(&self, point: Point, radius: i32, rng: &mut SimRng) -> Vec<Point> {
        let mut selected = Vec::with_capacity(((2 * radius + 1) * (2 * radius + 1) - 1) as usize);
        for dx in -radius..=radius {
            for dy in -radius..=radius {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let candidate = Point::new(point.x + dx, point.y + dy);
                if self.in_bounds(candidate) {
                    selected.push(candidate);
                }
            }
        }
        selected.shuffle(rng);
        selected
    }

    /// First unoccupied cell of the shuffled neighborhood, or the original
    /// point when every neighbor is taken: a crowded agent stays put.
    pub fn random_free_location_from(
        &self,
        point: Point,
        radius: i32,
        rng: &mut SimRng,
    ) -> Point {
        self.adjacent_points(point, radius, rng)
            .into_iter()
            .find(|candidate| self.object_at(*candidate).is_none())
            .unwrap_or(point)
    }

    /// All occupied cells with their handles, for aggregation and
    /// invariant checks.
    pub fn occupants(&self) -> impl Iterator<Item = (Point, Occupant)> + '_ {
        self.cells.iter().enumerate().filter_map(|(idx, cell)| {
            cell.map(|occupant| {
                let x = idx as i32 % self.size_x;
                let y = idx as i32 / self.size_x;
                (Point::new(x, y), occupant)
            })
        })
    }
}
