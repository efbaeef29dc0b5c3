//! Control-point geometry: points, same-image segments, cross-image
//! correspondences, scale factor and the 2x3 affine transforms built from them.

pub mod correspondence;
pub mod rect;
pub mod scale;
pub mod segment;
pub mod transform;

pub use correspondence::*;
pub use rect::*;
pub use scale::*;
pub use segment::*;
pub use transform::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer pixel coordinate, origin at the top-left corner, y growing downward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn to_f64(self) -> (f64, f64) {
        (self.x as f64, self.y as f64)
    }

    /// Nearest integer point to a sub-pixel location
    pub fn from_f64(x: f64, y: f64) -> Self {
        Self {
            x: x.round() as i32,
            y: y.round() as i32,
        }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Comma-separated `x,y`, the form used in metadata export
    pub fn to_csv(self) -> String {
        format!("{},{}", self.x, self.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Euclidean distance between two sub-pixel locations
pub fn euclidean_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}
