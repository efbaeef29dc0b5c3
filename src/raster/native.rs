use super::{Interpolation, KernelShape, PngCompression, RasterOps, StructuringElement};
use crate::error::{RegistrationError, Result};
use crate::geometry::AffineTransform;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, GrayImage, ImageEncoder, Luma};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::Norm;
use imageproc::geometric_transformations::{self, warp_into, Projection};
use imageproc::morphology::dilate;

/// Pure-Rust raster primitives on `image` buffers, using `imageproc` for
/// thresholding, morphology and warping
#[derive(Debug, Clone, Default)]
pub struct NativeRaster {
    compression: PngCompression,
}

impl NativeRaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compression(mut self, compression: PngCompression) -> Self {
        self.compression = compression;
        self
    }

    fn compression_type(&self) -> CompressionType {
        match self.compression {
            PngCompression::Default => CompressionType::Default,
            PngCompression::Fast => CompressionType::Fast,
            PngCompression::Best => CompressionType::Best,
        }
    }
}

impl RasterOps for NativeRaster {
    fn name(&self) -> &str {
        "imageproc"
    }

    fn binarize_otsu(&self, image: &GrayImage, max_value: u8) -> Result<(GrayImage, u8)> {
        if image.width() == 0 || image.height() == 0 {
            return Err(RegistrationError::image_op(
                "binarize",
                "cannot threshold an empty image",
            ));
        }
        let level = otsu_level(image);
        let binary = GrayImage::from_fn(image.width(), image.height(), |x, y| {
            if image.get_pixel(x, y)[0] > level {
                Luma([max_value])
            } else {
                Luma([0])
            }
        });
        Ok((binary, level))
    }

    fn dilate(&self, image: &GrayImage, element: &StructuringElement) -> Result<GrayImage> {
        let norm = match element.shape {
            KernelShape::Rect => Norm::LInf,
            KernelShape::Cross => Norm::L1,
        };
        Ok(dilate(image, norm, element.size))
    }

    fn warp_affine(
        &self,
        image: &GrayImage,
        transform: &AffineTransform,
        width: u32,
        height: u32,
        background: u8,
        interpolation: Interpolation,
    ) -> Result<GrayImage> {
        if width == 0 || height == 0 {
            return Err(RegistrationError::image_op(
                "warp_affine",
                format!("destination canvas {width}x{height} is empty"),
            ));
        }
        let projection = Projection::from_matrix(transform.to_homogeneous_f32()).ok_or_else(|| {
            RegistrationError::image_op("warp_affine", "transform matrix is not invertible")
        })?;
        let interpolation = match interpolation {
            Interpolation::Nearest => geometric_transformations::Interpolation::Nearest,
            Interpolation::Bilinear => geometric_transformations::Interpolation::Bilinear,
        };

        let mut warped = GrayImage::from_pixel(width, height, Luma([background]));
        warp_into(
            image,
            &projection,
            interpolation,
            Luma([background]),
            &mut warped,
        );
        Ok(warped)
    }

    fn encode_png(&self, image: &DynamicImage) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoder =
            PngEncoder::new_with_quality(&mut buffer, self.compression_type(), FilterType::Adaptive);
        encoder
            .write_image(
                image.as_bytes(),
                image.width(),
                image.height(),
                image.color().into(),
            )
            .map_err(|e| RegistrationError::image_op("encode_png", e))?;
        Ok(buffer)
    }
}
