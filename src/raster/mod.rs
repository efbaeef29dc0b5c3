//! Raster primitives the registration core consumes.
//!
//! [`RasterOps`] is the boundary between the core (which only sees
//! `image::GrayImage` pixel grids, affine matrices and rectangles) and whatever
//! imaging library does the pixel work. [`NativeRaster`] is built on
//! `image`/`imageproc`; with the `opencv` feature enabled, [`OpenCvRaster`]
//! performs the same primitives through the OpenCV bindings.

pub mod native;
#[cfg(feature = "opencv")]
pub mod opencv_backend;

pub use native::NativeRaster;
#[cfg(feature = "opencv")]
pub use opencv_backend::OpenCvRaster;

use crate::error::Result;
use crate::geometry::{AffineTransform, PixelRect};
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structuring-element shape for morphological dilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelShape {
    /// Full square, chessboard (L-inf) neighbourhood
    #[default]
    Rect,
    /// Plus-shaped cross at size 1, diamond (L1) neighbourhood beyond
    Cross,
}

impl fmt::Display for KernelShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rect => write!(f, "rect"),
            Self::Cross => write!(f, "cross"),
        }
    }
}

/// Dilation kernel: a `(2 * size + 1)` square window of the given shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuringElement {
    pub shape: KernelShape,
    pub size: u8,
}

impl Default for StructuringElement {
    fn default() -> Self {
        Self {
            shape: KernelShape::Rect,
            size: 1,
        }
    }
}

impl StructuringElement {
    pub fn new(shape: KernelShape, size: u8) -> Self {
        Self { shape, size }
    }

    /// Side length of the kernel window in pixels
    pub fn window(&self) -> u32 {
        2 * self.size as u32 + 1
    }

    /// Kernel parameters as reported alongside registration results
    pub fn describe(&self) -> String {
        format!(
            " * Sum binaries dilation parameters for kernel:\n    size: {}\n    type: {} ({}x{})\n",
            self.size,
            self.shape,
            self.window(),
            self.window()
        )
    }
}

/// Resampling used when warping the moving image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    Nearest,
    #[default]
    Bilinear,
}

/// PNG encoder effort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PngCompression {
    #[default]
    Default,
    Fast,
    Best,
}

/// Raster primitives used by the registration pipeline.
///
/// Implementations must be deterministic: identical inputs produce identical
/// pixels, thresholds and rectangles.
pub trait RasterOps: Send + Sync {
    /// Name of the backing library, for logs
    fn name(&self) -> &str;

    /// Global Otsu binarization: pixels above the automatically selected level
    /// become `max_value`, the rest 0. Returns the binary image and the level.
    fn binarize_otsu(&self, image: &GrayImage, max_value: u8) -> Result<(GrayImage, u8)>;

    /// Binary dilation; any non-zero pixel is foreground, output is 0 / 255
    fn dilate(&self, image: &GrayImage, element: &StructuringElement) -> Result<GrayImage>;

    /// Bounding rectangle of all non-zero pixels, `None` when there are none
    fn non_zero_bounding_rect(&self, image: &GrayImage) -> Result<Option<PixelRect>> {
        Ok(non_zero_bounds(image))
    }

    /// Warp `image` through `transform` (source to destination mapping) onto a
    /// `width x height` canvas; destination pixels with no source are `background`
    fn warp_affine(
        &self,
        image: &GrayImage,
        transform: &AffineTransform,
        width: u32,
        height: u32,
        background: u8,
        interpolation: Interpolation,
    ) -> Result<GrayImage>;

    /// Lossless PNG encode
    fn encode_png(&self, image: &DynamicImage) -> Result<Vec<u8>>;
}

/// Row-major scan for the extent of non-zero pixels
pub fn non_zero_bounds(image: &GrayImage) -> Option<PixelRect> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[0] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    bounds.map(|(x0, y0, x1, y1)| PixelRect::from_inclusive_corners(x0, y0, x1, y1))
}
