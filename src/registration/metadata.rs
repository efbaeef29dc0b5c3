use crate::geometry::{PixelRect, Point, ScaleFactor};
use crate::raster::StructuringElement;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Snapshot of everything a registration run derived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationMetadata {
    pub translation: TranslationMetadata,
    pub rotation: RotationMetadata,
    pub scale_factor: ScaleFactor,
    pub control_points: ControlPointMetadata,
    pub image_sizes: ImageSizes,
    pub grayscale_conversion: GrayscaleConversion,
    pub region_of_interest: RegionOfInterestMetadata,
    pub structuring_element: StructuringElement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationMetadata {
    pub tx: i32,
    pub ty: i32,
    pub matrix: [[i32; 3]; 2],
}

impl TranslationMetadata {
    pub fn new(tx: i32, ty: i32) -> Self {
        Self {
            tx,
            ty,
            matrix: [[1, 0, tx], [0, 1, ty]],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationMetadata {
    /// Fixed-segment angle minus moving-segment angle
    pub angle_diff_degrees: f64,
    pub moving_angle_degrees: f64,
    pub fixed_angle_degrees: f64,
    /// First fixed-image control point, in the fixed image's frame
    pub center: Point,
    pub matrix: [[f64; 3]; 2],
}

/// Euclidean distances between corresponding points after registration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EuclideanDistance {
    /// Pair that defines the rotation, near zero when segment lengths match
    pub constrained: f64,
    /// Pair that defines the translation, zero up to rounding
    pub unconstrained: f64,
}

/// Control points on the padded canvas.
///
/// `pt1`/`pt2` are the first and second moving-image points after the
/// transform, `pt3`/`pt4` the first and second fixed-image points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlPointMetadata {
    pub pt1: Point,
    pub pt2: Point,
    pub pt3: Point,
    pub pt4: Point,
    pub euclidean_distance: EuclideanDistance,
}

impl ControlPointMetadata {
    /// Point by its 1-based number, as it appears in exported metadata
    pub fn point(&self, number: u8) -> Option<Point> {
        match number {
            1 => Some(self.pt1),
            2 => Some(self.pt2),
            3 => Some(self.pt3),
            4 => Some(self.pt4),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<(u32, u32)> for ImageSize {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSizes {
    pub source_moving: ImageSize,
    pub source_fixed: ImageSize,
    /// Common canvas both images are padded to
    pub padded: ImageSize,
    /// Bounding box of the transformed moving image
    pub registered: ImageSize,
}

/// Which source images had to be converted to grayscale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GrayscaleConversion {
    pub moving: bool,
    pub fixed: bool,
}

impl GrayscaleConversion {
    pub fn any(&self) -> bool {
        self.moving || self.fixed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionOfInterestMetadata {
    pub rect: PixelRect,
    /// Top-left and exclusive bottom-right, as `x,y`
    pub corners: [String; 2],
}
