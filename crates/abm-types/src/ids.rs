//! Identifiers and Positions
//!
//! Agent identifiers, discrete grid coordinates, and continuous points.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of an agent within one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u64);

impl AgentId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for AgentId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A cell on a discrete grid.
///
/// `x` indexes columns and `y` indexes rows; `(0, 0)` is the first cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: usize,
    pub y: usize,
}

impl Coord {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl From<(usize, usize)> for Coord {
    fn from((x, y): (usize, usize)) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A position in continuous space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Length of the vector from the origin to this point.
    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn scale(&self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Unit vector in the same direction, or the zero vector.
    pub fn normalized(&self) -> Self {
        let norm = self.norm();
        if norm > 0.0 {
            self.scale(1.0 / norm)
        } else {
            Self::default()
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl std::ops::Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_id_serializes_as_number() {
        let json = serde_json::to_string(&AgentId(17)).unwrap();
        assert_eq!(json, "17");
        let parsed: AgentId = serde_json::from_str("17").unwrap();
        assert_eq!(parsed, AgentId(17));
    }

    #[test]
    fn test_coord_ordering_is_column_then_row() {
        let mut coords = vec![Coord::new(1, 0), Coord::new(0, 1), Coord::new(0, 0)];
        coords.sort();
        assert_eq!(coords, vec![Coord::new(0, 0), Coord::new(0, 1), Coord::new(1, 0)]);
    }

    #[test]
    fn test_point_normalized() {
        let p = Point::new(3.0, 4.0).normalized();
        assert!((p.x - 0.6).abs() < 1e-12);
        assert!((p.y - 0.8).abs() < 1e-12);
        assert_eq!(Point::default().normalized(), Point::default());
    }
}
