use crate::error::{RegistrationError, Result};
use image::{GrayImage, Rgb, RgbImage};

/// Colour composite of two equally sized crops: red carries the registered
/// moving image, green and blue the fixed image. Aligned dark ridges show as
/// black, moving-only ridges as cyan, fixed-only ridges as red.
pub fn color_overlay(moving: &GrayImage, fixed: &GrayImage) -> Result<RgbImage> {
    if moving.dimensions() != fixed.dimensions() {
        return Err(RegistrationError::image_op(
            "overlay",
            format!(
                "crops differ in size: {}x{} and {}x{}",
                moving.width(),
                moving.height(),
                fixed.width(),
                fixed.height()
            ),
        ));
    }
    Ok(RgbImage::from_fn(moving.width(), moving.height(), |x, y| {
        let m = moving.get_pixel(x, y)[0];
        let f = fixed.get_pixel(x, y)[0];
        Rgb([m, f, f])
    }))
}
