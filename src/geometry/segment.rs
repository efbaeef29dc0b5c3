use super::Point;
use crate::error::{RegistrationError, Result};
use serde::{Deserialize, Serialize};

/// Two control points selected on the same image.
///
/// The pair defines a segment, point one being the origin of the ray and point
/// two its end. Angles follow the standard Cartesian convention (counter-clockwise
/// positive from the +x axis), so the image y-axis is flipped when computing
/// slope and sign:
///
/// | point two relative to point one | slope | angle    |
/// |---------------------------------|-------|----------|
/// | below and right                 | < 0   | negative |
/// | above and right                 | > 0   | positive |
/// | above and left                  | < 0   | positive |
/// | below and left                  | > 0   | negative |
///
/// `acos` only covers 0..180 degrees, so the sign is recovered from the run
/// (`dx`) and the slope. A vertical segment has no slope; it resolves to +90 when
/// point two is above point one and -90 when below. A downward vertical segment
/// therefore reads -90 rather than a fixed +90, keeping every segment 180 degrees
/// away from its reverse; exported rotations follow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointsOnImage {
    first: Point,
    second: Point,
    dx: f64,
    dy: f64,
    slope: Option<f64>,
    segment_length: f64,
    angle_degrees: f64,
}

impl PointsOnImage {
    /// Build the segment, rejecting coincident points.
    pub fn try_new(first: Point, second: Point) -> Result<Self> {
        if first == second {
            return Err(RegistrationError::input(format!(
                "control points on the same image are identical: {first}"
            )));
        }

        // i64 so that opposite ends of the i32 range do not overflow
        let dx = (second.x as i64 - first.x as i64) as f64;
        let dy = (second.y as i64 - first.y as i64) as f64;
        let segment_length = (dx * dx + dy * dy).sqrt();

        // Image origin is top-left, so the Cartesian slope is the negative one
        let slope = if dx != 0.0 { Some(-(dy / dx)) } else { None };

        let angle_degrees = match slope {
            Some(m) => {
                let angle = (dx / segment_length).clamp(-1.0, 1.0).acos().to_degrees();
                if (dx > 0.0 && m < 0.0) || (dx < 0.0 && m > 0.0) {
                    -angle
                } else {
                    angle
                }
            }
            None if dy < 0.0 => 90.0,
            None => -90.0,
        };

        Ok(Self {
            first,
            second,
            dx,
            dy,
            slope,
            segment_length,
            angle_degrees,
        })
    }

    pub fn first(&self) -> Point {
        self.first
    }

    pub fn second(&self) -> Point {
        self.second
    }

    pub fn points(&self) -> [Point; 2] {
        [self.first, self.second]
    }

    /// Run and rise in image coordinates (`p2 - p1`)
    pub fn sides(&self) -> (f64, f64) {
        (self.dx, self.dy)
    }

    /// Cartesian slope, `None` for a vertical segment
    pub fn slope(&self) -> Option<f64> {
        self.slope
    }

    pub fn segment_length(&self) -> f64 {
        self.segment_length
    }

    /// Signed angle from the horizontal in (-180, 180]
    pub fn angle_degrees(&self) -> f64 {
        self.angle_degrees
    }

    /// Multi-line description, each line prefixed with `kind` (moving / fixed)
    pub fn summary(&self, kind: &str) -> String {
        let slope = self
            .slope
            .map(|m| format!("{m:.6}"))
            .unwrap_or_else(|| "undefined".to_string());
        format!(
            "{} * {}\n{kind} sideX: {:.1}, sideY: {:.1}, segmentLength: {:.6}\n{kind} slope: {slope}\n{kind} angle from horizontal: {:.6} degrees\n",
            self.first, self.second, self.dx, self.dy, self.segment_length, self.angle_degrees
        )
    }
}
