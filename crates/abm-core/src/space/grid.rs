//! Grid Spaces
//!
//! Rectangular grids of cells, optionally toroidal (edges wrap around).
//! [`SingleGrid`] enforces one agent per cell; [`MultiGrid`] allows many.
//! Both keep an incrementally maintained list of empty cells.

use abm_types::{AgentId, Coord, Point};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};

use super::{Neighborhood, SpaceError, SpatialView};

/// Dimensions and edge behavior of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    width: usize,
    height: usize,
    torus: bool,
}

impl GridShape {
    pub fn new(width: usize, height: usize, torus: bool) -> Result<Self, SpaceError> {
        if width == 0 || height == 0 {
            return Err(SpaceError::InvalidDimensions(format!(
                "grid must be at least 1x1, got {}x{}",
                width, height
            )));
        }
        Ok(Self {
            width,
            height,
            torus,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn torus(&self) -> bool {
        self.torus
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// Is a (possibly negative) position off the grid?
    pub fn out_of_bounds(&self, x: i64, y: i64) -> bool {
        x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64
    }

    pub fn contains(&self, pos: Coord) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    /// Wraps a single coordinate along an axis of length `len` on a torus;
    /// returns it unchanged otherwise.
    pub fn torus_adj(&self, coord: i64, len: usize) -> i64 {
        if self.torus {
            coord.rem_euclid(len as i64)
        } else {
            coord
        }
    }

    /// Torus-adjusts a position, or `None` if it is off the grid.
    pub fn wrap(&self, x: i64, y: i64) -> Option<Coord> {
        let x = self.torus_adj(x, self.width);
        let y = self.torus_adj(y, self.height);
        if self.out_of_bounds(x, y) {
            None
        } else {
            Some(Coord::new(x as usize, y as usize))
        }
    }

    /// Cells in the neighborhood of `pos`.
    ///
    /// Offsets are scanned row by row. Von Neumann keeps only axis-aligned
    /// offsets; Moore with a radius above 1 drops offsets farther than
    /// `radius` in Euclidean distance. Cells that coincide after wrapping are
    /// reported once.
    pub fn neighborhood(
        &self,
        pos: Coord,
        neighborhood: Neighborhood,
        include_center: bool,
        radius: usize,
    ) -> Vec<Coord> {
        let r = radius as i64;
        let (x, y) = (pos.x as i64, pos.y as i64);
        let mut seen = HashSet::new();
        let mut cells = Vec::new();

        for dy in -r..=r {
            for dx in -r..=r {
                if dx == 0 && dy == 0 && !include_center {
                    continue;
                }
                match neighborhood {
                    Neighborhood::VonNeumann if dx != 0 && dy != 0 => continue,
                    Neighborhood::Moore if r > 1 && dx * dx + dy * dy > r * r => continue,
                    _ => {}
                }
                let Some(cell) = self.wrap(x + dx, y + dy) else {
                    continue;
                };
                if seen.insert(cell) {
                    cells.push(cell);
                }
            }
        }
        cells
    }

    /// All cells, row by row.
    pub fn iter_coords(&self) -> impl Iterator<Item = Coord> {
        let width = self.width;
        (0..self.cell_count()).map(move |i| Coord::new(i % width, i / width))
    }

    fn index(&self, pos: Coord) -> usize {
        pos.y * self.width + pos.x
    }
}

/// Storage for the agents in one cell.
pub trait CellContents: Default + Clone {
    fn ids(&self) -> &[AgentId];
    fn has_room(&self) -> bool;
    fn insert(&mut self, id: AgentId);
    fn remove(&mut self, id: AgentId) -> bool;

    fn is_vacant(&self) -> bool {
        self.ids().is_empty()
    }
}

/// A cell holding at most one agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SingleCell(Option<AgentId>);

impl CellContents for SingleCell {
    fn ids(&self) -> &[AgentId] {
        match &self.0 {
            Some(id) => std::slice::from_ref(id),
            None => &[],
        }
    }

    fn has_room(&self) -> bool {
        self.0.is_none()
    }

    fn insert(&mut self, id: AgentId) {
        self.0 = Some(id);
    }

    fn remove(&mut self, id: AgentId) -> bool {
        if self.0 == Some(id) {
            self.0 = None;
            true
        } else {
            false
        }
    }
}

/// A cell holding any number of agents, in placement order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiCell(Vec<AgentId>);

impl CellContents for MultiCell {
    fn ids(&self) -> &[AgentId] {
        &self.0
    }

    fn has_room(&self) -> bool {
        true
    }

    fn insert(&mut self, id: AgentId) {
        self.0.push(id);
    }

    fn remove(&mut self, id: AgentId) -> bool {
        match self.0.iter().position(|other| *other == id) {
            Some(index) => {
                self.0.remove(index);
                true
            }
            None => false,
        }
    }
}

/// A grid of cells holding agent ids.
#[derive(Debug, Clone)]
pub struct Grid<C> {
    shape: GridShape,
    cells: Vec<C>,
    positions: HashMap<AgentId, Coord>,
    empties: Vec<Coord>,
    empty_slots: HashMap<Coord, usize>,
}

/// Grid with at most one agent per cell.
pub type SingleGrid = Grid<SingleCell>;

/// Grid with any number of agents per cell.
pub type MultiGrid = Grid<MultiCell>;

impl<C: CellContents> Grid<C> {
    pub fn new(width: usize, height: usize, torus: bool) -> Result<Self, SpaceError> {
        let shape = GridShape::new(width, height, torus)?;
        let mut empties = Vec::with_capacity(shape.cell_count());
        for x in 0..width {
            for y in 0..height {
                empties.push(Coord::new(x, y));
            }
        }
        let empty_slots = empties.iter().enumerate().map(|(i, c)| (*c, i)).collect();

        Ok(Self {
            shape,
            cells: vec![C::default(); shape.cell_count()],
            positions: HashMap::new(),
            empties,
            empty_slots,
        })
    }

    pub fn shape(&self) -> &GridShape {
        &self.shape
    }

    pub fn width(&self) -> usize {
        self.shape.width
    }

    pub fn height(&self) -> usize {
        self.shape.height
    }

    pub fn torus(&self) -> bool {
        self.shape.torus
    }

    /// Number of agents on the grid.
    pub fn agent_count(&self) -> usize {
        self.positions.len()
    }

    pub fn position_of(&self, id: AgentId) -> Option<Coord> {
        self.positions.get(&id).copied()
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.positions.contains_key(&id)
    }

    fn check_bounds(&self, pos: Coord) -> Result<(), SpaceError> {
        if self.shape.contains(pos) {
            Ok(())
        } else {
            Err(SpaceError::OutOfBounds(pos))
        }
    }

    /// Agents in a cell; empty for cells off the grid.
    pub fn contents(&self, pos: Coord) -> &[AgentId] {
        if self.shape.contains(pos) {
            self.cells[self.shape.index(pos)].ids()
        } else {
            &[]
        }
    }

    pub fn is_cell_empty(&self, pos: Coord) -> bool {
        self.contents(pos).is_empty()
    }

    /// Places an agent that is not yet on the grid.
    pub fn place_agent(&mut self, id: AgentId, pos: Coord) -> Result<(), SpaceError> {
        self.check_bounds(pos)?;
        if self.positions.contains_key(&id) {
            return Err(SpaceError::AlreadyPlaced(id));
        }
        let index = self.shape.index(pos);
        if !self.cells[index].has_room() {
            return Err(SpaceError::CellNotEmpty(pos));
        }
        self.cells[index].insert(id);
        self.mark_filled(pos);
        self.positions.insert(id, pos);
        Ok(())
    }

    /// Moves a placed agent. The grid is unchanged if the move fails.
    pub fn move_agent(&mut self, id: AgentId, pos: Coord) -> Result<(), SpaceError> {
        let old = self.position_of(id).ok_or(SpaceError::NotPlaced(id))?;
        self.check_bounds(pos)?;
        if old == pos {
            return Ok(());
        }
        let new_index = self.shape.index(pos);
        if !self.cells[new_index].has_room() {
            return Err(SpaceError::CellNotEmpty(pos));
        }
        self.vacate(id, old);
        self.cells[new_index].insert(id);
        self.mark_filled(pos);
        self.positions.insert(id, pos);
        Ok(())
    }

    /// Takes an agent off the grid, returning its last position.
    pub fn remove_agent(&mut self, id: AgentId) -> Result<Coord, SpaceError> {
        let pos = self.positions.remove(&id).ok_or(SpaceError::NotPlaced(id))?;
        self.vacate(id, pos);
        Ok(pos)
    }

    fn vacate(&mut self, id: AgentId, pos: Coord) {
        let index = self.shape.index(pos);
        self.cells[index].remove(id);
        if self.cells[index].is_vacant() {
            self.mark_empty(pos);
        }
    }

    fn mark_filled(&mut self, pos: Coord) {
        if let Some(slot) = self.empty_slots.remove(&pos) {
            self.empties.swap_remove(slot);
            if let Some(moved) = self.empties.get(slot).copied() {
                self.empty_slots.insert(moved, slot);
            }
        }
    }

    fn mark_empty(&mut self, pos: Coord) {
        if !self.empty_slots.contains_key(&pos) {
            self.empty_slots.insert(pos, self.empties.len());
            self.empties.push(pos);
        }
    }

    /// Cells currently holding no agent.
    pub fn empties(&self) -> &[Coord] {
        &self.empties
    }

    pub fn exists_empty_cells(&self) -> bool {
        !self.empties.is_empty()
    }

    /// Picks an empty cell uniformly at random.
    pub fn find_empty<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Coord> {
        self.empties.choose(rng).copied()
    }

    /// Moves a placed agent to a random empty cell.
    pub fn move_to_empty<R: Rng + ?Sized>(
        &mut self,
        id: AgentId,
        rng: &mut R,
    ) -> Result<Coord, SpaceError> {
        if !self.contains(id) {
            return Err(SpaceError::NotPlaced(id));
        }
        let pos = self.find_empty(rng).ok_or(SpaceError::NoEmptyCells)?;
        self.move_agent(id, pos)?;
        Ok(pos)
    }

    /// Places a new agent at `pos`, or at a random empty cell when `None`.
    pub fn position_agent<R: Rng + ?Sized>(
        &mut self,
        id: AgentId,
        pos: Option<Coord>,
        rng: &mut R,
    ) -> Result<Coord, SpaceError> {
        let pos = match pos {
            Some(pos) => pos,
            None => self.find_empty(rng).ok_or(SpaceError::GridFull)?,
        };
        self.place_agent(id, pos)?;
        Ok(pos)
    }

    pub fn get_neighborhood(
        &self,
        pos: Coord,
        neighborhood: Neighborhood,
        include_center: bool,
        radius: usize,
    ) -> Vec<Coord> {
        self.shape
            .neighborhood(pos, neighborhood, include_center, radius)
    }

    /// Agents in the neighborhood of `pos`, in neighborhood order.
    pub fn get_neighbors(
        &self,
        pos: Coord,
        neighborhood: Neighborhood,
        include_center: bool,
        radius: usize,
    ) -> Vec<AgentId> {
        let cells = self.get_neighborhood(pos, neighborhood, include_center, radius);
        self.get_cell_list_contents(&cells)
    }

    /// Agents in the given cells, skipping empty ones.
    pub fn get_cell_list_contents(&self, cells: &[Coord]) -> Vec<AgentId> {
        cells
            .iter()
            .flat_map(|pos| self.contents(*pos).iter().copied())
            .collect()
    }

    /// Every cell with its contents, row by row.
    pub fn coord_iter(&self) -> impl Iterator<Item = (Coord, &[AgentId])> + '_ {
        self.shape
            .iter_coords()
            .zip(self.cells.iter())
            .map(|(pos, cell)| (pos, cell.ids()))
    }

    /// Placed agents with their cells, row by row.
    pub fn placed(&self) -> Vec<(AgentId, Coord)> {
        self.coord_iter()
            .flat_map(|(pos, ids)| ids.iter().map(move |id| (*id, pos)))
            .collect()
    }
}

impl<C: CellContents> SpatialView for Grid<C> {
    fn view_width(&self) -> usize {
        self.width()
    }

    fn view_height(&self) -> usize {
        self.height()
    }

    fn agent_positions(&self) -> Vec<(AgentId, Point)> {
        self.placed()
            .into_iter()
            .map(|(id, pos)| (id, Point::new(pos.x as f64, pos.y as f64)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn c(x: usize, y: usize) -> Coord {
        Coord::new(x, y)
    }

    #[test]
    fn test_zero_sized_grid_rejected() {
        assert!(matches!(
            SingleGrid::new(0, 5, false),
            Err(SpaceError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_neighborhood_sizes_interior() {
        let shape = GridShape::new(10, 10, false).unwrap();
        assert_eq!(shape.neighborhood(c(5, 5), Neighborhood::Moore, false, 1).len(), 8);
        assert_eq!(shape.neighborhood(c(5, 5), Neighborhood::Moore, true, 1).len(), 9);
        assert_eq!(shape.neighborhood(c(5, 5), Neighborhood::VonNeumann, false, 1).len(), 4);
        assert_eq!(shape.neighborhood(c(5, 5), Neighborhood::VonNeumann, true, 1).len(), 5);
    }

    #[test]
    fn test_neighborhood_order() {
        let shape = GridShape::new(10, 10, false).unwrap();
        let cells = shape.neighborhood(c(5, 5), Neighborhood::VonNeumann, false, 1);
        assert_eq!(cells, vec![c(5, 4), c(4, 5), c(6, 5), c(5, 6)]);
    }

    #[test]
    fn test_neighborhood_corner_without_torus() {
        let shape = GridShape::new(10, 10, false).unwrap();
        let mut cells = shape.neighborhood(c(0, 0), Neighborhood::Moore, false, 1);
        cells.sort();
        assert_eq!(cells, vec![c(0, 1), c(1, 0), c(1, 1)]);
    }

    #[test]
    fn test_neighborhood_corner_with_torus() {
        let shape = GridShape::new(10, 10, true).unwrap();
        let cells = shape.neighborhood(c(0, 0), Neighborhood::Moore, false, 1);
        assert_eq!(cells.len(), 8);
        assert!(cells.contains(&c(9, 9)));
        assert!(cells.contains(&c(9, 0)));
        assert!(cells.contains(&c(0, 9)));
    }

    #[test]
    fn test_neighborhood_dedup_on_tiny_torus() {
        let shape = GridShape::new(1, 1, true).unwrap();
        assert_eq!(shape.neighborhood(c(0, 0), Neighborhood::Moore, true, 1), vec![c(0, 0)]);

        let shape = GridShape::new(2, 2, true).unwrap();
        let cells = shape.neighborhood(c(0, 0), Neighborhood::Moore, true, 1);
        assert_eq!(cells.len(), 4);
    }

    #[test]
    fn test_moore_radius_two_is_circular() {
        let shape = GridShape::new(11, 11, false).unwrap();
        let cells = shape.neighborhood(c(5, 5), Neighborhood::Moore, false, 2);
        // 5x5 block minus center minus the four corners at distance sqrt(8)
        assert_eq!(cells.len(), 20);
        assert!(!cells.contains(&c(3, 3)));
        assert!(cells.contains(&c(4, 3)));
    }

    #[test]
    fn test_von_neumann_radius_two_is_cross() {
        let shape = GridShape::new(11, 11, false).unwrap();
        let cells = shape.neighborhood(c(5, 5), Neighborhood::VonNeumann, false, 2);
        assert_eq!(cells.len(), 8);
        assert!(!cells.contains(&c(4, 4)));
        assert!(cells.contains(&c(5, 3)));
    }

    #[test]
    fn test_wrap() {
        let torus = GridShape::new(5, 4, true).unwrap();
        assert_eq!(torus.wrap(-1, 4), Some(c(4, 0)));
        let flat = GridShape::new(5, 4, false).unwrap();
        assert_eq!(flat.wrap(-1, 0), None);
        assert_eq!(flat.wrap(4, 3), Some(c(4, 3)));
    }

    #[test]
    fn test_single_grid_enforces_one_agent() {
        let mut grid = SingleGrid::new(3, 3, false).unwrap();
        grid.place_agent(AgentId(1), c(1, 1)).unwrap();
        assert_eq!(
            grid.place_agent(AgentId(2), c(1, 1)),
            Err(SpaceError::CellNotEmpty(c(1, 1)))
        );
        assert_eq!(
            grid.place_agent(AgentId(1), c(0, 0)),
            Err(SpaceError::AlreadyPlaced(AgentId(1)))
        );
        assert_eq!(
            grid.place_agent(AgentId(3), c(3, 0)),
            Err(SpaceError::OutOfBounds(c(3, 0)))
        );
        assert_eq!(grid.agent_count(), 1);
    }

    #[test]
    fn test_empties_track_changes() {
        let mut grid = SingleGrid::new(2, 2, false).unwrap();
        assert_eq!(grid.empties().len(), 4);

        grid.place_agent(AgentId(1), c(0, 0)).unwrap();
        grid.place_agent(AgentId(2), c(1, 1)).unwrap();
        assert_eq!(grid.empties().len(), 2);
        assert!(!grid.empties().contains(&c(0, 0)));

        grid.move_agent(AgentId(1), c(1, 0)).unwrap();
        assert!(grid.empties().contains(&c(0, 0)));
        assert!(!grid.empties().contains(&c(1, 0)));

        grid.remove_agent(AgentId(2)).unwrap();
        assert_eq!(grid.empties().len(), 3);
        assert!(grid.is_cell_empty(c(1, 1)));
    }

    #[test]
    fn test_failed_move_leaves_grid_unchanged() {
        let mut grid = SingleGrid::new(2, 1, false).unwrap();
        grid.place_agent(AgentId(1), c(0, 0)).unwrap();
        grid.place_agent(AgentId(2), c(1, 0)).unwrap();
        assert!(grid.move_agent(AgentId(1), c(1, 0)).is_err());
        assert_eq!(grid.position_of(AgentId(1)), Some(c(0, 0)));
        assert_eq!(grid.contents(c(0, 0)), &[AgentId(1)]);
        assert_eq!(
            grid.move_agent(AgentId(9), c(0, 0)),
            Err(SpaceError::NotPlaced(AgentId(9)))
        );
    }

    #[test]
    fn test_move_to_empty_and_full_grid() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut grid = SingleGrid::new(2, 1, false).unwrap();
        let first = grid.position_agent(AgentId(1), None, &mut rng).unwrap();
        let moved = grid.move_to_empty(AgentId(1), &mut rng).unwrap();
        assert_ne!(first, moved);

        grid.position_agent(AgentId(2), None, &mut rng).unwrap();
        assert_eq!(
            grid.move_to_empty(AgentId(1), &mut rng),
            Err(SpaceError::NoEmptyCells)
        );
        assert_eq!(
            grid.position_agent(AgentId(3), None, &mut rng),
            Err(SpaceError::GridFull)
        );
    }

    #[test]
    fn test_multi_grid_holds_many() {
        let mut grid = MultiGrid::new(3, 3, true).unwrap();
        for id in 0..4 {
            grid.place_agent(AgentId(id), c(1, 1)).unwrap();
        }
        assert_eq!(grid.contents(c(1, 1)).len(), 4);
        assert_eq!(grid.empties().len(), 8);

        grid.remove_agent(AgentId(2)).unwrap();
        assert_eq!(grid.contents(c(1, 1)), &[AgentId(0), AgentId(1), AgentId(3)]);
        assert!(!grid.is_cell_empty(c(1, 1)));
    }

    #[test]
    fn test_get_neighbors_excludes_center_contents() {
        let mut grid = MultiGrid::new(5, 5, false).unwrap();
        grid.place_agent(AgentId(0), c(2, 2)).unwrap();
        grid.place_agent(AgentId(1), c(2, 3)).unwrap();
        grid.place_agent(AgentId(2), c(3, 3)).unwrap();
        grid.place_agent(AgentId(3), c(0, 0)).unwrap();

        let mut moore = grid.get_neighbors(c(2, 2), Neighborhood::Moore, false, 1);
        moore.sort();
        assert_eq!(moore, vec![AgentId(1), AgentId(2)]);

        let von = grid.get_neighbors(c(2, 2), Neighborhood::VonNeumann, true, 1);
        assert_eq!(von, vec![AgentId(0), AgentId(1)]);
    }

    #[test]
    fn test_coord_iter_is_row_major() {
        let mut grid = SingleGrid::new(2, 2, false).unwrap();
        grid.place_agent(AgentId(5), c(1, 0)).unwrap();
        let coords: Vec<Coord> = grid.coord_iter().map(|(pos, _)| pos).collect();
        assert_eq!(coords, vec![c(0, 0), c(1, 0), c(0, 1), c(1, 1)]);
        assert_eq!(grid.placed(), vec![(AgentId(5), c(1, 0))]);
    }
}
