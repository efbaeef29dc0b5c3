//! Common region of interest between two registered, equally padded images.
//!
//! 1. Binarize each image with its own Otsu level
//! 2. Saturating-sum the two binaries
//! 3. Invert the sum
//! 4. Dilate with the configured structuring element
//! 5. Bounding rectangle of the remaining non-zero pixels
//!
//! On white-background imagery the binaries mark background as 255, so after
//! the sum and inversion only pixels where both images carry dark content
//! survive. The rectangle around them is the crop applied to both images.

use crate::config::OverlapConfig;
use crate::error::{RegistrationError, Result};
use crate::geometry::PixelRect;
use crate::raster::{RasterOps, StructuringElement};
use image::{DynamicImage, GrayImage};
use tracing::{debug, warn};

/// White pixel in a binarized image
pub const MAX_BINARY_VALUE: u8 = 255;

/// Crop rectangle in padded-canvas coordinates
pub type RegionOfInterest = PixelRect;

/// Computes the overlap ROI; holds only read-only configuration
#[derive(Debug, Clone, Default)]
pub struct OverlapEngine {
    config: OverlapConfig,
}

/// Result of one overlap computation
#[derive(Debug, Clone)]
pub struct Overlap {
    roi: RegionOfInterest,
    png_blob: Vec<u8>,
    thresholds: (u8, u8),
    structuring_element: StructuringElement,
}

impl OverlapEngine {
    pub fn new(config: OverlapConfig) -> Self {
        Self { config }
    }

    pub fn structuring_element(&self) -> &StructuringElement {
        &self.config.kernel
    }

    /// Kernel type and size, for test and debug output
    pub fn structuring_element_params(&self) -> String {
        self.config.kernel.describe()
    }

    /// Both images must be registered, grayscale and of identical size.
    pub fn compute(
        &self,
        raster: &dyn RasterOps,
        img1: &GrayImage,
        img2: &GrayImage,
    ) -> Result<Overlap> {
        if img1.dimensions() != img2.dimensions() {
            return Err(RegistrationError::input(format!(
                "overlap requires equal-size images, got {}x{} and {}x{}",
                img1.width(),
                img1.height(),
                img2.width(),
                img2.height()
            )));
        }

        let (binary1, level1) = raster.binarize_otsu(img1, MAX_BINARY_VALUE)?;
        let (binary2, level2) = raster.binarize_otsu(img2, MAX_BINARY_VALUE)?;
        debug!(otsu_level_1 = level1, otsu_level_2 = level2, "Binarized registered images");

        let mut summed = sum_binaries(&binary1, &binary2);
        image::imageops::invert(&mut summed);

        // Dilating an empty mask with a large kernel can light up the whole canvas
        if raster.non_zero_bounding_rect(&summed)?.is_none() {
            warn!("Registered images share no overlapping content");
            return Err(RegistrationError::geometry(
                "registered images do not overlap; no shared content before dilation",
            ));
        }
        self.config.validate()?;

        let dilated = raster.dilate(&summed, &self.config.kernel)?;
        let png_blob = raster.encode_png(&DynamicImage::ImageLuma8(dilated.clone()))?;

        let roi = match raster.non_zero_bounding_rect(&dilated)? {
            Some(rect) if !rect.is_empty() => rect,
            _ => {
                warn!("Registered images share no overlapping content");
                return Err(RegistrationError::geometry(
                    "registered images do not overlap; region of interest is empty",
                ));
            }
        };
        debug!(
            x = roi.x,
            y = roi.y,
            width = roi.width,
            height = roi.height,
            "Overlap region of interest"
        );

        Ok(Overlap {
            roi,
            png_blob,
            thresholds: (level1, level2),
            structuring_element: self.config.kernel,
        })
    }
}

/// Pixel-wise saturating add of two binary images of equal size
pub fn sum_binaries(a: &GrayImage, b: &GrayImage) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        image::Luma([a.get_pixel(x, y)[0].saturating_add(b.get_pixel(x, y)[0])])
    })
}

impl Overlap {
    pub fn region_of_interest(&self) -> RegionOfInterest {
        self.roi
    }

    /// PNG of the dilated overlap mask the rectangle was taken from
    pub fn png_blob(&self) -> &[u8] {
        &self.png_blob
    }

    /// Otsu levels chosen for the first and second image
    pub fn thresholds(&self) -> (u8, u8) {
        self.thresholds
    }

    /// Top-left and exclusive bottom-right corners as `x,y`
    pub fn region_of_interest_corners(&self) -> [String; 2] {
        [
            self.roi.top_left().to_csv(),
            self.roi.bottom_right().to_csv(),
        ]
    }

    pub fn summary(&self) -> String {
        let tl = self.roi.top_left();
        let br = self.roi.bottom_right();
        format!(
            "OverlapRegisteredImages:\n * Rect TopLeft: ({}, {})\n * Rect BotRight: ({}, {})\n * Rect dimensions:\n    width:  {}\n    height: {}\n    area:   {}\n{}",
            tl.x,
            tl.y,
            br.x,
            br.y,
            self.roi.width,
            self.roi.height,
            self.roi.area(),
            self.structuring_element.describe()
        )
    }
}
