//! Image decode and file output for the registration pipeline

use crate::error::{RegistrationError, Result};
use image::{DynamicImage, GrayImage};
use std::fs;
use std::path::Path;

/// Decode an encoded image buffer (PNG, BMP, TIFF, ...) of any supported format
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(RegistrationError::input("image buffer is empty"));
    }
    let image = image::load_from_memory(bytes).map_err(|e| RegistrationError::image_op("decode", e))?;
    validate_image_size(&image)?;
    Ok(image)
}

/// Load and validate image from path
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    if !path.exists() {
        return Err(RegistrationError::input(format!(
            "image file does not exist: {}",
            path.display()
        )));
    }

    let image = image::open(path).map_err(|e| RegistrationError::image_op("decode", e))?;
    validate_image_size(&image)?;
    Ok(image)
}

/// Reject images without pixels
pub fn validate_image_size(image: &DynamicImage) -> Result<()> {
    if image.width() == 0 || image.height() == 0 {
        return Err(RegistrationError::input(format!(
            "image is empty: {}x{}",
            image.width(),
            image.height()
        )));
    }
    Ok(())
}

/// Grayscale view of an image, and whether a colour conversion was needed
pub fn to_grayscale(image: &DynamicImage) -> (GrayImage, bool) {
    match image {
        DynamicImage::ImageLuma8(gray) => (gray.clone(), false),
        other => (other.to_luma8(), true),
    }
}

/// Write an encoded buffer, creating missing parent directories
pub fn write_buffer(path: &Path, bytes: &[u8]) -> Result<()> {
    let io_err = |source| RegistrationError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    fs::write(path, bytes).map_err(io_err)
}
