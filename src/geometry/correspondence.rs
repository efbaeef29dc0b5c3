use super::{euclidean_distance, Point, PointsOnImage};
use crate::error::{RegistrationError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A point on the moving image and the point on the fixed image that marks the
/// same real-world location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrespondingPointsPair {
    pub moving: Point,
    pub fixed: Point,
}

impl CorrespondingPointsPair {
    pub fn new(moving: Point, fixed: Point) -> Self {
        Self { moving, fixed }
    }

    /// Euclidean distance between the two points as given
    pub fn distance(&self) -> f64 {
        euclidean_distance(self.moving.to_f64(), self.fixed.to_f64())
    }

    /// Offset that moves the moving point onto the fixed point. Fails when the
    /// offset does not fit in an `i32`.
    pub fn translation(&self) -> Result<(i32, i32)> {
        let overflow = || {
            RegistrationError::input(format!(
                "translation from {} to {} overflows the pixel coordinate range",
                self.moving, self.fixed
            ))
        };
        let tx = self.fixed.x.checked_sub(self.moving.x).ok_or_else(overflow)?;
        let ty = self.fixed.y.checked_sub(self.moving.y).ok_or_else(overflow)?;
        Ok((tx, ty))
    }
}

impl fmt::Display for CorrespondingPointsPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} X {}", self.moving, self.fixed)
    }
}

/// The two corresponding pairs that drive a registration.
///
/// The unconstrained pair anchors the translation and supplies the center of
/// rotation (its fixed point). The constrained pair closes the segment on each
/// image that the rotation angle is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPoints {
    pub unconstrained: CorrespondingPointsPair,
    pub constrained: CorrespondingPointsPair,
}

impl ControlPoints {
    pub fn new(unconstrained: CorrespondingPointsPair, constrained: CorrespondingPointsPair) -> Self {
        Self {
            unconstrained,
            constrained,
        }
    }

    /// Parse eight integers ordered as
    /// `moving1.x, moving1.y, fixed1.x, fixed1.y, moving2.x, moving2.y, fixed2.x, fixed2.y`.
    pub fn from_coordinates(coords: &[i32]) -> Result<Self> {
        if coords.len() != 8 {
            return Err(RegistrationError::input(format!(
                "expected 8 control-point coordinates (two corresponding pairs), got {}",
                coords.len()
            )));
        }
        let p = |i: usize| Point::new(coords[i], coords[i + 1]);
        Ok(Self {
            unconstrained: CorrespondingPointsPair::new(p(0), p(2)),
            constrained: CorrespondingPointsPair::new(p(4), p(6)),
        })
    }

    /// Flatten back into the eight-integer ordering of [`Self::from_coordinates`]
    pub fn to_coordinates(&self) -> [i32; 8] {
        let u = &self.unconstrained;
        let c = &self.constrained;
        [
            u.moving.x, u.moving.y, u.fixed.x, u.fixed.y, c.moving.x, c.moving.y, c.fixed.x,
            c.fixed.y,
        ]
    }

    /// Segment on the moving image, first pair to second pair
    pub fn moving_segment(&self) -> Result<PointsOnImage> {
        PointsOnImage::try_new(self.unconstrained.moving, self.constrained.moving).map_err(|_| {
            RegistrationError::input(format!(
                "moving-image control points coincide at {}",
                self.unconstrained.moving
            ))
        })
    }

    /// Segment on the fixed image, first pair to second pair
    pub fn fixed_segment(&self) -> Result<PointsOnImage> {
        PointsOnImage::try_new(self.unconstrained.fixed, self.constrained.fixed).map_err(|_| {
            RegistrationError::input(format!(
                "fixed-image control points coincide at {}",
                self.unconstrained.fixed
            ))
        })
    }

    /// Reject point sets whose same-image segments are degenerate
    pub fn validate(&self) -> Result<()> {
        self.moving_segment()?;
        self.fixed_segment()?;
        Ok(())
    }
}

impl fmt::Display for ControlPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  #1: {}  #2: {}", self.unconstrained, self.constrained)
    }
}
