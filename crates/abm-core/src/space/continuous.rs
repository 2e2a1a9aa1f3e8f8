//! Continuous Space
//!
//! Agents sit at arbitrary points inside a rectangle. A coarse
//! [`MultiGrid`] buckets the points so neighbor queries only scan the
//! index cells that can hold agents within the radius.

use abm_types::{AgentId, Coord, Point};
use std::collections::HashMap;

use super::grid::MultiGrid;
use super::{SpaceError, SpatialView};

const DEFAULT_INDEX_SIZE: usize = 100;

/// Continuous rectangular space, optionally toroidal.
#[derive(Debug, Clone)]
pub struct ContinuousSpace {
    x_min: f64,
    y_min: f64,
    x_max: f64,
    y_max: f64,
    torus: bool,
    cell_width: f64,
    cell_height: f64,
    index: MultiGrid,
    positions: HashMap<AgentId, Point>,
}

impl ContinuousSpace {
    /// A space spanning `[0, x_max] x [0, y_max]` with a 100x100 index.
    pub fn new(x_max: f64, y_max: f64, torus: bool) -> Result<Self, SpaceError> {
        Self::with_options(
            0.0,
            0.0,
            x_max,
            y_max,
            torus,
            DEFAULT_INDEX_SIZE,
            DEFAULT_INDEX_SIZE,
        )
    }

    pub fn with_options(
        x_min: f64,
        y_min: f64,
        x_max: f64,
        y_max: f64,
        torus: bool,
        grid_width: usize,
        grid_height: usize,
    ) -> Result<Self, SpaceError> {
        if !(x_max > x_min) || !(y_max > y_min) {
            return Err(SpaceError::InvalidDimensions(format!(
                "space bounds ({}, {})..({}, {}) are empty",
                x_min, y_min, x_max, y_max
            )));
        }
        let index = MultiGrid::new(grid_width, grid_height, torus)?;
        Ok(Self {
            x_min,
            y_min,
            x_max,
            y_max,
            torus,
            cell_width: (x_max - x_min) / grid_width as f64,
            cell_height: (y_max - y_min) / grid_height as f64,
            index,
            positions: HashMap::new(),
        })
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn torus(&self) -> bool {
        self.torus
    }

    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    pub fn y_min(&self) -> f64 {
        self.y_min
    }

    pub fn x_max(&self) -> f64 {
        self.x_max
    }

    pub fn y_max(&self) -> f64 {
        self.y_max
    }

    pub fn agent_count(&self) -> usize {
        self.positions.len()
    }

    pub fn position_of(&self, id: AgentId) -> Option<Point> {
        self.positions.get(&id).copied()
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Is the point outside the space? Both edges are inclusive.
    pub fn out_of_bounds(&self, p: Point) -> bool {
        p.x < self.x_min || p.x > self.x_max || p.y < self.y_min || p.y > self.y_max
    }

    /// Wraps an out-of-bounds point back into a toroidal space.
    pub fn torus_adj(&self, p: Point) -> Result<Point, SpaceError> {
        if !self.out_of_bounds(p) {
            return Ok(p);
        }
        if !self.torus {
            return Err(SpaceError::PointOutOfBounds(p));
        }
        Ok(Point::new(
            self.x_min + (p.x - self.x_min).rem_euclid(self.width()),
            self.y_min + (p.y - self.y_min).rem_euclid(self.height()),
        ))
    }

    fn index_cell(&self, p: Point) -> Coord {
        let shape = self.index.shape();
        let cx = ((p.x - self.x_min) / self.cell_width).floor().max(0.0) as usize;
        let cy = ((p.y - self.y_min) / self.cell_height).floor().max(0.0) as usize;
        // points on the max edge belong to the last cell
        Coord::new(cx.min(shape.width() - 1), cy.min(shape.height() - 1))
    }

    pub fn place_agent(&mut self, id: AgentId, p: Point) -> Result<Point, SpaceError> {
        if self.positions.contains_key(&id) {
            return Err(SpaceError::AlreadyPlaced(id));
        }
        let p = self.torus_adj(p)?;
        self.index.place_agent(id, self.index_cell(p))?;
        self.positions.insert(id, p);
        Ok(p)
    }

    /// Moves a placed agent, returning the torus-adjusted position.
    pub fn move_agent(&mut self, id: AgentId, p: Point) -> Result<Point, SpaceError> {
        if !self.positions.contains_key(&id) {
            return Err(SpaceError::NotPlaced(id));
        }
        let p = self.torus_adj(p)?;
        self.index.move_agent(id, self.index_cell(p))?;
        self.positions.insert(id, p);
        Ok(p)
    }

    pub fn remove_agent(&mut self, id: AgentId) -> Result<Point, SpaceError> {
        let p = self.positions.remove(&id).ok_or(SpaceError::NotPlaced(id))?;
        self.index.remove_agent(id)?;
        Ok(p)
    }

    fn axis_delta(&self, a: f64, b: f64, size: f64) -> f64 {
        let d = b - a;
        if self.torus {
            let wrapped = d.rem_euclid(size);
            if wrapped > size / 2.0 {
                wrapped - size
            } else {
                wrapped
            }
        } else {
            d
        }
    }

    /// Displacement vector from `a` to `b`, taking the short way around a
    /// torus.
    pub fn get_heading(&self, a: Point, b: Point) -> Point {
        Point::new(
            self.axis_delta(a.x, b.x, self.width()),
            self.axis_delta(a.y, b.y, self.height()),
        )
    }

    pub fn get_distance(&self, a: Point, b: Point) -> f64 {
        self.get_heading(a, b).norm()
    }

    /// Agents within `radius` of `p`. Agents exactly at `p` are only
    /// included with `include_center`.
    pub fn get_neighbors(&self, p: Point, radius: f64, include_center: bool) -> Vec<AgentId> {
        let center = self.index_cell(p);
        let shape = *self.index.shape();
        let xs = index_span(
            center.x,
            (radius / self.cell_width).ceil(),
            shape.width(),
            self.torus,
        );
        let ys = index_span(
            center.y,
            (radius / self.cell_height).ceil(),
            shape.height(),
            self.torus,
        );

        let mut cells = Vec::with_capacity(xs.len() * ys.len());
        for &y in &ys {
            for &x in &xs {
                cells.push(Coord::new(x, y));
            }
        }

        self.index
            .get_cell_list_contents(&cells)
            .into_iter()
            .filter(|id| {
                let Some(other) = self.positions.get(id) else {
                    return false;
                };
                let distance = self.get_distance(p, *other);
                distance <= radius && (include_center || distance > 0.0)
            })
            .collect()
    }
}

/// Index rows or columns within `reach` cells of `center`, each listed once.
/// A reach spanning the whole axis returns every index.
fn index_span(center: usize, reach: f64, len: usize, torus: bool) -> Vec<usize> {
    let reach = if reach.is_nan() { 0.0 } else { reach.max(0.0) };
    if reach * 2.0 + 1.0 >= len as f64 {
        return (0..len).collect();
    }
    let (center, reach, len) = (center as i64, reach as i64, len as i64);
    if torus {
        (center - reach..=center + reach)
            .map(|i| i.rem_euclid(len) as usize)
            .collect()
    } else {
        ((center - reach).max(0)..=(center + reach).min(len - 1))
            .map(|i| i as usize)
            .collect()
    }
}

impl SpatialView for ContinuousSpace {
    fn view_width(&self) -> usize {
        self.width().ceil() as usize
    }

    fn view_height(&self) -> usize {
        self.height().ceil() as usize
    }

    fn agent_positions(&self) -> Vec<(AgentId, Point)> {
        let origin = Point::new(self.x_min, self.y_min);
        self.index
            .placed()
            .into_iter()
            .filter_map(|(id, _)| self.positions.get(&id).map(|p| (id, *p - origin)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(ContinuousSpace::new(0.0, 10.0, false).is_err());
        assert!(ContinuousSpace::with_options(0.0, 0.0, 10.0, 10.0, false, 0, 5).is_err());
    }

    #[test]
    fn test_torus_distance_wraps() {
        let torus = ContinuousSpace::new(10.0, 10.0, true).unwrap();
        assert!((torus.get_distance(p(0.5, 5.0), p(9.5, 5.0)) - 1.0).abs() < 1e-9);

        let flat = ContinuousSpace::new(10.0, 10.0, false).unwrap();
        assert!((flat.get_distance(p(0.5, 5.0), p(9.5, 5.0)) - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_heading_short_way() {
        let space = ContinuousSpace::new(10.0, 10.0, true).unwrap();
        let h = space.get_heading(p(9.0, 1.0), p(1.0, 9.0));
        assert!((h.x - 2.0).abs() < 1e-9);
        assert!((h.y + 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_bounds_and_torus_adj() {
        let flat = ContinuousSpace::new(10.0, 10.0, false).unwrap();
        assert!(!flat.out_of_bounds(p(10.0, 10.0)));
        assert!(flat.out_of_bounds(p(10.1, 0.0)));
        assert_eq!(
            flat.torus_adj(p(-1.0, 0.0)),
            Err(SpaceError::PointOutOfBounds(p(-1.0, 0.0)))
        );

        let torus = ContinuousSpace::new(10.0, 10.0, true).unwrap();
        let wrapped = torus.torus_adj(p(-1.0, 12.5)).unwrap();
        assert!((wrapped.x - 9.0).abs() < 1e-9);
        assert!((wrapped.y - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_place_on_max_edge() {
        let mut space = ContinuousSpace::with_options(0.0, 0.0, 10.0, 10.0, false, 5, 5).unwrap();
        space.place_agent(AgentId(1), p(10.0, 10.0)).unwrap();
        assert_eq!(space.get_neighbors(p(9.9, 9.9), 0.5, true), vec![AgentId(1)]);
    }

    #[test]
    fn test_move_and_remove() {
        let mut space = ContinuousSpace::new(10.0, 10.0, true).unwrap();
        space.place_agent(AgentId(1), p(1.0, 1.0)).unwrap();
        let moved = space.move_agent(AgentId(1), p(11.0, 1.0)).unwrap();
        assert!((moved.x - 1.0).abs() < 1e-9);
        assert_eq!(space.remove_agent(AgentId(1)).unwrap(), moved);
        assert_eq!(
            space.move_agent(AgentId(1), p(1.0, 1.0)),
            Err(SpaceError::NotPlaced(AgentId(1)))
        );
    }

    #[test]
    fn test_include_center() {
        let mut space = ContinuousSpace::new(10.0, 10.0, false).unwrap();
        space.place_agent(AgentId(1), p(5.0, 5.0)).unwrap();
        space.place_agent(AgentId(2), p(5.5, 5.0)).unwrap();
        assert_eq!(space.get_neighbors(p(5.0, 5.0), 1.0, false), vec![AgentId(2)]);
        assert_eq!(space.get_neighbors(p(5.0, 5.0), 1.0, true).len(), 2);
    }

    #[test]
    fn test_neighbors_match_brute_force() {
        let mut rng = SmallRng::seed_from_u64(11);
        for torus in [false, true] {
            let mut space =
                ContinuousSpace::with_options(-5.0, 0.0, 15.0, 8.0, torus, 7, 3).unwrap();
            let mut points = Vec::new();
            for id in 0..200 {
                let point = p(rng.gen_range(-5.0..15.0), rng.gen_range(0.0..8.0));
                space.place_agent(AgentId(id), point).unwrap();
                points.push((AgentId(id), point));
            }
            for _ in 0..20 {
                let center = p(rng.gen_range(-5.0..15.0), rng.gen_range(0.0..8.0));
                let radius = rng.gen_range(0.1..30.0);
                let mut found = space.get_neighbors(center, radius, true);
                found.sort();
                let mut expected: Vec<AgentId> = points
                    .iter()
                    .filter(|(_, q)| space.get_distance(center, *q) <= radius)
                    .map(|(id, _)| *id)
                    .collect();
                expected.sort();
                assert_eq!(found, expected, "torus={} radius={}", torus, radius);
            }
        }
    }

    #[test]
    fn test_radius_beyond_space_returns_everyone() {
        for torus in [false, true] {
            let mut space = ContinuousSpace::new(10.0, 10.0, torus).unwrap();
            for id in 0..20u64 {
                let x = (id % 5) as f64 * 2.0 + 0.5;
                let y = (id / 5) as f64 * 2.0 + 0.5;
                space.place_agent(AgentId(id), p(x, y)).unwrap();
            }
            for radius in [20.0, 1000.0, f64::INFINITY] {
                let found = space.get_neighbors(p(5.0, 5.0), radius, true);
                assert_eq!(found.len(), 20, "torus={} radius={}", torus, radius);
            }
        }
    }

    #[test]
    fn test_index_span() {
        assert_eq!(index_span(0, 1.0, 10, true), vec![9, 0, 1]);
        assert_eq!(index_span(0, 1.0, 10, false), vec![0, 1]);
        assert_eq!(index_span(9, 2.0, 10, false), vec![7, 8, 9]);
        assert_eq!(index_span(3, 5.0, 10, true), (0..10).collect::<Vec<_>>());
        assert_eq!(index_span(3, f64::NAN, 10, true), vec![3]);
    }
}
