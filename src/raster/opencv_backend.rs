use super::{Interpolation, KernelShape, PngCompression, RasterOps, StructuringElement};
use crate::error::{RegistrationError, Result};
use crate::geometry::{AffineTransform, PixelRect};
use image::{DynamicImage, GrayImage};
use opencv::core::{self, Mat, Point, Scalar, Size, Vector};
use opencv::imgcodecs;
use opencv::imgproc;
use opencv::prelude::*;

/// Raster primitives through the OpenCV bindings
#[derive(Debug, Clone, Default)]
pub struct OpenCvRaster {
    compression: PngCompression,
}

impl OpenCvRaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compression(mut self, compression: PngCompression) -> Self {
        self.compression = compression;
        self
    }

    fn png_params(&self) -> Vector<i32> {
        let level = match self.compression {
            PngCompression::Default => 3,
            PngCompression::Fast => 1,
            PngCompression::Best => 9,
        };
        Vector::from_slice(&[
            imgcodecs::IMWRITE_PNG_COMPRESSION,
            level,
            imgcodecs::IMWRITE_PNG_STRATEGY,
            imgcodecs::IMWRITE_PNG_STRATEGY_DEFAULT,
        ])
    }
}

fn cv_err(operation: &'static str) -> impl Fn(opencv::Error) -> RegistrationError {
    move |e| RegistrationError::image_op(operation, e)
}

/// Copy a GrayImage into a single-channel 8-bit Mat
pub fn grayimage_to_mat(image: &GrayImage) -> Result<Mat> {
    let (width, height) = image.dimensions();
    let mut mat = Mat::zeros(height as i32, width as i32, core::CV_8UC1)
        .and_then(|m| m.to_mat())
        .map_err(cv_err("grayimage_to_mat"))?;

    for (x, y, pixel) in image.enumerate_pixels() {
        *mat.at_2d_mut::<u8>(y as i32, x as i32)
            .map_err(cv_err("grayimage_to_mat"))? = pixel[0];
    }
    Ok(mat)
}

/// Copy a single-channel 8-bit Mat into a GrayImage
pub fn mat_to_grayimage(mat: &Mat) -> Result<GrayImage> {
    let rows = mat.rows();
    let cols = mat.cols();
    let mut data = Vec::with_capacity((rows * cols) as usize);
    for y in 0..rows {
        for x in 0..cols {
            data.push(*mat.at_2d::<u8>(y, x).map_err(cv_err("mat_to_grayimage"))?);
        }
    }
    GrayImage::from_raw(cols as u32, rows as u32, data).ok_or_else(|| {
        RegistrationError::image_op("mat_to_grayimage", "buffer does not match Mat size")
    })
}

fn affine_to_mat(transform: &AffineTransform) -> Result<Mat> {
    let mut mat = Mat::zeros(2, 3, core::CV_64F)
        .and_then(|m| m.to_mat())
        .map_err(cv_err("warp_affine"))?;
    for row in 0..2 {
        for col in 0..3 {
            *mat.at_2d_mut::<f64>(row as i32, col as i32)
                .map_err(cv_err("warp_affine"))? = transform.matrix[row][col];
        }
    }
    Ok(mat)
}

impl RasterOps for OpenCvRaster {
    fn name(&self) -> &str {
        "opencv"
    }

    fn binarize_otsu(&self, image: &GrayImage, max_value: u8) -> Result<(GrayImage, u8)> {
        let src = grayimage_to_mat(image)?;
        let mut binary = Mat::default();
        let level = imgproc::threshold(
            &src,
            &mut binary,
            0.0,
            max_value as f64,
            imgproc::THRESH_BINARY | imgproc::THRESH_OTSU,
        )
        .map_err(cv_err("binarize"))?;
        Ok((mat_to_grayimage(&binary)?, level as u8))
    }

    fn dilate(&self, image: &GrayImage, element: &StructuringElement) -> Result<GrayImage> {
        let src = grayimage_to_mat(image)?;
        let shape = match element.shape {
            KernelShape::Rect => imgproc::MORPH_RECT,
            KernelShape::Cross => imgproc::MORPH_CROSS,
        };
        let window = element.window() as i32;
        let kernel = imgproc::get_structuring_element(
            shape,
            Size::new(window, window),
            Point::new(element.size as i32, element.size as i32),
        )
        .map_err(cv_err("dilate"))?;

        let mut dilated = Mat::default();
        imgproc::dilate(
            &src,
            &mut dilated,
            &kernel,
            Point::new(-1, -1),
            1,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value().map_err(cv_err("dilate"))?,
        )
        .map_err(cv_err("dilate"))?;

        // Match the 0 / 255 output of the native backend
        let mut normalized = Mat::default();
        imgproc::threshold(&dilated, &mut normalized, 0.0, 255.0, imgproc::THRESH_BINARY)
            .map_err(cv_err("dilate"))?;
        mat_to_grayimage(&normalized)
    }

    fn non_zero_bounding_rect(&self, image: &GrayImage) -> Result<Option<PixelRect>> {
        let src = grayimage_to_mat(image)?;
        let mut points = Vector::<Point>::new();
        core::find_non_zero(&src, &mut points).map_err(cv_err("bounding_rect"))?;
        if points.is_empty() {
            return Ok(None);
        }
        let rect = imgproc::bounding_rect(&points).map_err(cv_err("bounding_rect"))?;
        Ok(Some(PixelRect::new(
            rect.x as u32,
            rect.y as u32,
            rect.width as u32,
            rect.height as u32,
        )))
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
        let src = grayimage_to_mat(image)?;
        let matrix = affine_to_mat(transform)?;
        let flags = match interpolation {
            Interpolation::Nearest => imgproc::INTER_NEAREST,
            Interpolation::Bilinear => imgproc::INTER_LINEAR,
        };
        let mut warped = Mat::default();
        imgproc::warp_affine(
            &src,
            &mut warped,
            &matrix,
            Size::new(width as i32, height as i32),
            flags,
            core::BORDER_CONSTANT,
            Scalar::all(background as f64),
        )
        .map_err(cv_err("warp_affine"))?;
        mat_to_grayimage(&warped)
    }

    fn encode_png(&self, image: &DynamicImage) -> Result<Vec<u8>> {
        // Mat channel order is BGR; the native encoder covers colour output
        let gray = match image {
            DynamicImage::ImageLuma8(gray) => gray,
            _ => return super::NativeRaster::new()
                .with_compression(self.compression)
                .encode_png(image),
        };
        let mat = grayimage_to_mat(gray)?;
        let mut buffer = Vector::<u8>::new();
        imgcodecs::imencode(".png", &mat, &mut buffer, &self.png_params())
            .map_err(cv_err("encode_png"))?;
        Ok(buffer.to_vec())
    }
}
