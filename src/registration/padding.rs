//! Common canvas for the registered moving image and the fixed image.
//!
//! Both images live in the fixed image's pixel frame. The registered moving
//! image covers `[min_x, min_x + width) x [min_y, min_y + height)` of that
//! frame (possibly negative), the fixed image covers `[0, w) x [0, h)`. The
//! canvas is the union of the two, and each image is padded into it.

use crate::error::{RegistrationError, Result};
use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

/// Upper bound on canvas pixels, 256 MiB per padded 8-bit image
pub const MAX_CANVAS_PIXELS: u64 = 1 << 28;

/// Margins added around an image to bring it to canvas size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Padding {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl Padding {
    /// Size of an image of `width x height` after padding
    pub fn padded_size(&self, width: u32, height: u32) -> (u32, u32) {
        (
            width + self.left + self.right,
            height + self.top + self.bottom,
        )
    }

    /// Copy `image` into a background-filled canvas at the left/top margins
    pub fn apply(&self, image: &GrayImage, background: u8) -> GrayImage {
        let (width, height) = self.padded_size(image.width(), image.height());
        let mut canvas = GrayImage::from_pixel(width, height, Luma([background]));
        image::imageops::replace(&mut canvas, image, self.left as i64, self.top as i64);
        canvas
    }
}

/// Placement of an image in the fixed image's pixel frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl Placement {
    pub fn new(x: i64, y: i64, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    fn right(&self) -> i64 {
        self.x + self.width as i64
    }

    fn bottom(&self) -> i64 {
        self.y + self.height as i64
    }

    /// Whether the two placements share at least one pixel
    pub fn intersects(&self, other: &Placement) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Union canvas of two placements and the padding each needs to fill it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasLayout {
    pub width: u32,
    pub height: u32,
    pub moving: Padding,
    pub fixed: Padding,
}

impl CanvasLayout {
    /// Fails with a geometry error when the placements are disjoint (nothing can
    /// overlap) or when the canvas would exceed [`MAX_CANVAS_PIXELS`].
    pub fn union(moving: Placement, fixed: Placement) -> Result<Self> {
        if !moving.intersects(&fixed) {
            return Err(RegistrationError::geometry(format!(
                "registered moving image at ({}, {}) {}x{} lies outside the {}x{} fixed image",
                moving.x, moving.y, moving.width, moving.height, fixed.width, fixed.height
            )));
        }

        let x0 = moving.x.min(fixed.x);
        let y0 = moving.y.min(fixed.y);
        let x1 = moving.right().max(fixed.right());
        let y1 = moving.bottom().max(fixed.bottom());

        let width = to_u32(x1 - x0, "canvas width")?;
        let height = to_u32(y1 - y0, "canvas height")?;
        if width as u64 * height as u64 > MAX_CANVAS_PIXELS {
            return Err(RegistrationError::geometry(format!(
                "{width}x{height} canvas exceeds {MAX_CANVAS_PIXELS} pixels"
            )));
        }

        let pad = |p: Placement| -> Result<Padding> {
            let left = to_u32(p.x - x0, "left padding")?;
            let top = to_u32(p.y - y0, "top padding")?;
            Ok(Padding {
                left,
                top,
                right: to_u32(x1 - p.right(), "right padding")?,
                bottom: to_u32(y1 - p.bottom(), "bottom padding")?,
            })
        };

        Ok(Self {
            width,
            height,
            moving: pad(moving)?,
            fixed: pad(fixed)?,
        })
    }

    /// Offset from the fixed image's frame to canvas coordinates
    pub fn fixed_frame_offset(&self) -> (i64, i64) {
        (self.fixed.left as i64, self.fixed.top as i64)
    }
}

fn to_u32(value: i64, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| RegistrationError::geometry(format!("{what} out of range: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moving_shifted_right_and_down() {
        let layout = CanvasLayout::union(
            Placement::new(10, 5, 50, 50),
            Placement::new(0, 0, 50, 50),
        )
        .unwrap();
        assert_eq!((layout.width, layout.height), (60, 55));
        assert_eq!(
            layout.moving,
            Padding {
                top: 5,
                bottom: 0,
                left: 10,
                right: 0
            }
        );
        assert_eq!(
            layout.fixed,
            Padding {
                top: 0,
                bottom: 5,
                left: 0,
                right: 10
            }
        );
        assert_eq!(layout.fixed_frame_offset(), (0, 0));
    }

    #[test]
    fn test_negative_origin_pads_fixed() {
        let layout = CanvasLayout::union(
            Placement::new(-20, -30, 40, 40),
            Placement::new(0, 0, 100, 80),
        )
        .unwrap();
        assert_eq!((layout.width, layout.height), (120, 110));
        assert_eq!(layout.fixed.left, 20);
        assert_eq!(layout.fixed.top, 30);
        assert_eq!(layout.moving.right, 80);
        assert_eq!(layout.fixed_frame_offset(), (20, 30));
    }

    #[test]
    fn test_padded_sizes_match_canvas() {
        let moving = Placement::new(-7, 13, 33, 21);
        let fixed = Placement::new(0, 0, 40, 25);
        let layout = CanvasLayout::union(moving, fixed).unwrap();
        let canvas = (layout.width, layout.height);
        assert_eq!(layout.moving.padded_size(33, 21), canvas);
        assert_eq!(layout.fixed.padded_size(40, 25), canvas);
    }

    #[test]
    fn test_disjoint_placements_rejected() {
        let far = Placement::new(2_000_000_000, 2_000_000_000, 50, 50);
        let err = CanvasLayout::union(far, Placement::new(0, 0, 50, 50)).unwrap_err();
        assert!(matches!(err, RegistrationError::Geometry(_)), "{err}");

        // touching edges share no pixel
        let adjacent = Placement::new(50, 0, 50, 50);
        assert!(!adjacent.intersects(&Placement::new(0, 0, 50, 50)));
        assert!(CanvasLayout::union(adjacent, Placement::new(0, 0, 50, 50)).is_err());
    }

    #[test]
    fn test_oversized_canvas_rejected() {
        let moving = Placement::new(-100_000, 0, 100_010, 10);
        let fixed = Placement::new(0, 0, 100_000, 10_000);
        assert!(moving.intersects(&fixed));
        let err = CanvasLayout::union(moving, fixed).unwrap_err();
        assert!(err.to_string().contains("exceeds"), "{err}");
    }

    #[test]
    fn test_apply_places_image() {
        let image = GrayImage::from_pixel(2, 2, Luma([0]));
        let padding = Padding {
            top: 1,
            bottom: 2,
            left: 3,
            right: 0,
        };
        let padded = padding.apply(&image, 255);
        assert_eq!(padded.dimensions(), (5, 5));
        assert_eq!(padded.get_pixel(3, 1)[0], 0);
        assert_eq!(padded.get_pixel(4, 2)[0], 0);
        assert_eq!(padded.get_pixel(2, 1)[0], 255);
        assert_eq!(padded.get_pixel(3, 3)[0], 255);
    }
}
