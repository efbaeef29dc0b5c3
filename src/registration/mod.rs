//! Rigid two-point registration of a moving image onto a fixed image.
//!
//! A run goes through these stages in order:
//!
//! 1. validate the images and control points
//! 2. normalize both images to 8-bit grayscale
//! 3. translation taking the first moving point onto the first fixed point
//! 4. rotation about that fixed point by the difference of the segment angles
//! 5. one warp of the moving image with the composed transform
//! 6. pad the registered moving image and the fixed image to a common canvas
//! 7. overlap region of interest on the padded pair
//! 8. crop both padded images to the region
//! 9. colour overlay of the crops
//! 10. metadata snapshot
//!
//! A [`Registrator`] handles exactly one image pair.

pub mod metadata;
pub mod overlay;
pub mod padding;

pub use metadata::*;
pub use padding::{CanvasLayout, Padding, Placement};

use crate::config::Config;
use crate::error::{RegistrationError, Result};
use crate::geometry::{
    euclidean_distance, AffineTransform, ControlPoints, Point, PointsOnImage, ScaleFactor,
};
use crate::io;
use crate::logging::{RegistrationSpan, StageTiming};
use crate::overlap::{Overlap, OverlapEngine};
use crate::raster::{NativeRaster, RasterOps};
use image::{DynamicImage, GenericImageView, GrayImage, RgbImage};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Slack when snapping transformed bounds to whole pixels
const BOUNDS_EPSILON: f64 = 1e-9;

/// Owned inputs of one registration
#[derive(Debug, Clone)]
pub struct RegistrationInput {
    pub moving: DynamicImage,
    pub fixed: DynamicImage,
    pub control_points: ControlPoints,
}

impl RegistrationInput {
    pub fn new(moving: DynamicImage, fixed: DynamicImage, control_points: ControlPoints) -> Self {
        Self {
            moving,
            fixed,
            control_points,
        }
    }

    /// Decode both images from encoded buffers; `coordinates` as in
    /// [`ControlPoints::from_coordinates`]
    pub fn from_encoded(moving: &[u8], fixed: &[u8], coordinates: &[i32]) -> Result<Self> {
        Ok(Self::new(
            io::decode_image(moving)?,
            io::decode_image(fixed)?,
            ControlPoints::from_coordinates(coordinates)?,
        ))
    }

    pub fn from_paths(moving: &Path, fixed: &Path, coordinates: &[i32]) -> Result<Self> {
        Ok(Self::new(
            io::load_image(moving)?,
            io::load_image(fixed)?,
            ControlPoints::from_coordinates(coordinates)?,
        ))
    }
}

/// Both images on the common canvas
#[derive(Debug, Clone)]
struct PaddedPair {
    moving: GrayImage,
    fixed: GrayImage,
    layout: CanvasLayout,
}

/// Stages 1-6
struct Prepared {
    grayscale_conversion: GrayscaleConversion,
    moving_segment: PointsOnImage,
    fixed_segment: PointsOnImage,
    translation: (i32, i32),
    rotation: AffineTransform,
    angle_diff_degrees: f64,
    composite: AffineTransform,
    registered: GrayImage,
    padded: PaddedPair,
}

/// Stages 7-10
struct Finished {
    cropped_moving: GrayImage,
    cropped_fixed: GrayImage,
    overlay: RgbImage,
    overlap: Overlap,
    metadata: RegistrationMetadata,
}

struct Completed {
    padded: PaddedPair,
    registered: GrayImage,
    finished: Finished,
    timings: Vec<StageTiming>,
}

enum RegistrationState {
    Pending,
    /// Padded images are kept when the failure happened after padding
    Failed(Option<PaddedPair>),
    Completed(Box<Completed>),
}

pub struct Registrator {
    input: RegistrationInput,
    config: Config,
    raster: Arc<dyn RasterOps>,
    overlap_engine: OverlapEngine,
    state: RegistrationState,
}

impl Registrator {
    pub fn new(input: RegistrationInput, config: &Config) -> Self {
        let raster = NativeRaster::new().with_compression(config.output.png_compression);
        Self {
            input,
            config: config.clone(),
            raster: Arc::new(raster),
            overlap_engine: OverlapEngine::new(config.overlap.clone()),
            state: RegistrationState::Pending,
        }
    }

    /// Swap the raster backend, e.g. for the OpenCV one. Backends are
    /// stateless, so one instance can serve many registrators.
    pub fn with_raster(mut self, raster: Arc<dyn RasterOps>) -> Self {
        self.raster = raster;
        self
    }

    pub fn control_points(&self) -> &ControlPoints {
        &self.input.control_points
    }

    pub fn is_registered(&self) -> bool {
        matches!(self.state, RegistrationState::Completed(_))
    }

    /// Run the full pipeline. Only the first call on an instance does work.
    pub fn perform_registration(&mut self) -> Result<&RegistrationMetadata> {
        if !matches!(self.state, RegistrationState::Pending) {
            return Err(RegistrationError::AlreadyRegistered);
        }

        let mut span = RegistrationSpan::new(self.raster.name());
        let _entered = span.span().clone().entered();

        let prepared = match self.prepare(&mut span) {
            Ok(prepared) => prepared,
            Err(err) => {
                span.record_failure(&err);
                self.state = RegistrationState::Failed(None);
                return Err(err);
            }
        };

        match self.finish(&prepared, &mut span) {
            Ok(finished) => {
                span.record_success(&finished.overlap.region_of_interest().to_string());
                self.state = RegistrationState::Completed(Box::new(Completed {
                    padded: prepared.padded,
                    registered: prepared.registered,
                    finished,
                    timings: span.timings().to_vec(),
                }));
            }
            Err(err) => {
                span.record_failure(&err);
                self.state = RegistrationState::Failed(Some(prepared.padded));
                return Err(err);
            }
        }

        self.metadata()
    }

    fn prepare(&self, span: &mut RegistrationSpan) -> Result<Prepared> {
        let input = &self.input;
        for (name, image) in [("moving", &input.moving), ("fixed", &input.fixed)] {
            if image.width() == 0 || image.height() == 0 {
                return Err(RegistrationError::input(format!("{name} image is empty")));
            }
        }
        self.config.overlap.validate()?;
        let moving_segment = input.control_points.moving_segment()?;
        let fixed_segment = input.control_points.fixed_segment()?;
        span.record_inputs(input.moving.dimensions(), input.fixed.dimensions());
        debug!(control_points = %input.control_points, "Inputs validated");
        span.finish_stage("validate");

        let (moving_gray, moving_converted) = io::to_grayscale(&input.moving);
        let (fixed_gray, fixed_converted) = io::to_grayscale(&input.fixed);
        let grayscale_conversion = GrayscaleConversion {
            moving: moving_converted,
            fixed: fixed_converted,
        };
        if grayscale_conversion.any() {
            debug!(
                moving = moving_converted,
                fixed = fixed_converted,
                "Converted source images to grayscale"
            );
        }
        span.finish_stage("grayscale");

        let unconstrained = input.control_points.unconstrained;
        let (tx, ty) = unconstrained.translation()?;
        let translation = AffineTransform::translation(tx as f64, ty as f64);
        debug!(tx, ty, "Translation");
        span.finish_stage("translation");

        let angle_diff_degrees = fixed_segment.angle_degrees() - moving_segment.angle_degrees();
        let rotation = AffineTransform::rotation_about(unconstrained.fixed.to_f64(), angle_diff_degrees);
        span.record_angle(angle_diff_degrees);
        debug!(
            moving_angle = moving_segment.angle_degrees(),
            fixed_angle = fixed_segment.angle_degrees(),
            angle_diff_degrees,
            center = %unconstrained.fixed,
            "Rotation"
        );
        span.finish_stage("rotation");

        let composite = translation.then(&rotation);
        let (bx0, by0, bx1, by1) = composite.transformed_bounds(moving_gray.width(), moving_gray.height());
        let min_x = (bx0 + BOUNDS_EPSILON).floor() as i64;
        let min_y = (by0 + BOUNDS_EPSILON).floor() as i64;
        let registered_width = ((bx1 - BOUNDS_EPSILON).ceil() as i64 - min_x).max(1) as u32;
        let registered_height = ((by1 - BOUNDS_EPSILON).ceil() as i64 - min_y).max(1) as u32;

        let layout = CanvasLayout::union(
            Placement::new(min_x, min_y, registered_width, registered_height),
            Placement::new(0, 0, fixed_gray.width(), fixed_gray.height()),
        )?;

        let to_registered =
            composite.then(&AffineTransform::translation(-(min_x as f64), -(min_y as f64)));
        let registered = self.raster.warp_affine(
            &moving_gray,
            &to_registered,
            registered_width,
            registered_height,
            self.config.registration.background,
            self.config.registration.interpolation,
        )?;
        debug!(
            min_x,
            min_y,
            width = registered_width,
            height = registered_height,
            "Warped moving image"
        );
        span.finish_stage("warp");

        let background = self.config.registration.background;
        let padded = PaddedPair {
            moving: layout.moving.apply(&registered, background),
            fixed: layout.fixed.apply(&fixed_gray, background),
            layout,
        };
        debug!(
            width = layout.width,
            height = layout.height,
            moving_padding = ?layout.moving,
            fixed_padding = ?layout.fixed,
            "Padded to common canvas"
        );
        span.finish_stage("padding");

        Ok(Prepared {
            grayscale_conversion,
            moving_segment,
            fixed_segment,
            translation: (tx, ty),
            rotation,
            angle_diff_degrees,
            composite,
            registered,
            padded,
        })
    }

    fn finish(&self, prepared: &Prepared, span: &mut RegistrationSpan) -> Result<Finished> {
        let padded = &prepared.padded;
        let overlap =
            self.overlap_engine
                .compute(self.raster.as_ref(), &padded.moving, &padded.fixed)?;
        span.finish_stage("overlap");

        let roi = overlap.region_of_interest();
        if roi.is_empty() || !roi.fits_within(padded.layout.width, padded.layout.height) {
            return Err(RegistrationError::geometry(format!(
                "region of interest {roi} does not fit the {}x{} canvas",
                padded.layout.width, padded.layout.height
            )));
        }
        let crop = |image: &GrayImage| {
            image::imageops::crop_imm(image, roi.x, roi.y, roi.width, roi.height).to_image()
        };
        let cropped_moving = crop(&padded.moving);
        let cropped_fixed = crop(&padded.fixed);
        span.finish_stage("crop");

        let overlay = overlay::color_overlay(&cropped_moving, &cropped_fixed)?;
        span.finish_stage("overlay");

        let metadata = self.build_metadata(prepared, &overlap);
        span.finish_stage("metadata");

        Ok(Finished {
            cropped_moving,
            cropped_fixed,
            overlay,
            overlap,
            metadata,
        })
    }

    fn build_metadata(&self, prepared: &Prepared, overlap: &Overlap) -> RegistrationMetadata {
        let points = &self.input.control_points;
        let layout = prepared.padded.layout;
        let (ox, oy) = layout.fixed_frame_offset();
        let to_canvas = |(x, y): (f64, f64)| Point::from_f64(x + ox as f64, y + oy as f64);

        let moving1 = prepared
            .composite
            .apply(points.unconstrained.moving.x as f64, points.unconstrained.moving.y as f64);
        let moving2 = prepared
            .composite
            .apply(points.constrained.moving.x as f64, points.constrained.moving.y as f64);
        let fixed1 = points.unconstrained.fixed.to_f64();
        let fixed2 = points.constrained.fixed.to_f64();

        let (tx, ty) = prepared.translation;
        let roi = overlap.region_of_interest();

        RegistrationMetadata {
            translation: TranslationMetadata::new(tx, ty),
            rotation: RotationMetadata {
                angle_diff_degrees: prepared.angle_diff_degrees,
                moving_angle_degrees: prepared.moving_segment.angle_degrees(),
                fixed_angle_degrees: prepared.fixed_segment.angle_degrees(),
                center: points.unconstrained.fixed,
                matrix: prepared.rotation.matrix,
            },
            scale_factor: ScaleFactor::between(&prepared.moving_segment, &prepared.fixed_segment),
            control_points: ControlPointMetadata {
                pt1: to_canvas(moving1),
                pt2: to_canvas(moving2),
                pt3: to_canvas(fixed1),
                pt4: to_canvas(fixed2),
                euclidean_distance: EuclideanDistance {
                    constrained: euclidean_distance(moving2, fixed2),
                    unconstrained: euclidean_distance(moving1, fixed1),
                },
            },
            image_sizes: ImageSizes {
                source_moving: self.input.moving.dimensions().into(),
                source_fixed: self.input.fixed.dimensions().into(),
                padded: ImageSize::new(layout.width, layout.height),
                registered: prepared.registered.dimensions().into(),
            },
            grayscale_conversion: prepared.grayscale_conversion,
            region_of_interest: RegionOfInterestMetadata {
                rect: roi,
                corners: overlap.region_of_interest_corners(),
            },
            structuring_element: *self.overlap_engine.structuring_element(),
        }
    }

    fn completed(&self) -> Result<&Completed> {
        match &self.state {
            RegistrationState::Completed(completed) => Ok(completed),
            _ => Err(RegistrationError::NotRegistered),
        }
    }

    fn padded(&self) -> Result<&PaddedPair> {
        match &self.state {
            RegistrationState::Completed(completed) => Ok(&completed.padded),
            RegistrationState::Failed(Some(padded)) => Ok(padded),
            _ => Err(RegistrationError::NotRegistered),
        }
    }

    fn encode_gray(&self, image: &GrayImage) -> Result<Vec<u8>> {
        self.raster
            .encode_png(&DynamicImage::ImageLuma8(image.clone()))
    }

    pub fn metadata(&self) -> Result<&RegistrationMetadata> {
        Ok(&self.completed()?.finished.metadata)
    }

    pub fn overlap(&self) -> Result<&Overlap> {
        Ok(&self.completed()?.finished.overlap)
    }

    /// Wall time per pipeline stage of the completed run
    pub fn stage_timings(&self) -> Result<&[StageTiming]> {
        Ok(&self.completed()?.timings)
    }

    /// Cropped registered moving and cropped fixed images, undecoded
    pub fn cropped_images(&self) -> Result<(&GrayImage, &GrayImage)> {
        let finished = &self.completed()?.finished;
        Ok((&finished.cropped_moving, &finished.cropped_fixed))
    }

    /// Moving image after the transform, before padding
    pub fn registered_image(&self) -> Result<&GrayImage> {
        Ok(&self.completed()?.registered)
    }

    pub fn cropped_registered_image(&self) -> Result<Vec<u8>> {
        self.encode_gray(&self.completed()?.finished.cropped_moving)
    }

    pub fn cropped_fixed_image(&self) -> Result<Vec<u8>> {
        self.encode_gray(&self.completed()?.finished.cropped_fixed)
    }

    /// Available after a failure in the overlap stage too
    pub fn padded_registered_moving_image(&self) -> Result<Vec<u8>> {
        self.encode_gray(&self.padded()?.moving)
    }

    /// Available after a failure in the overlap stage too
    pub fn padded_fixed_image(&self) -> Result<Vec<u8>> {
        self.encode_gray(&self.padded()?.fixed)
    }

    pub fn color_overlaid_registered_images(&self) -> Result<Vec<u8>> {
        let overlay = &self.completed()?.finished.overlay;
        self.raster
            .encode_png(&DynamicImage::ImageRgb8(overlay.clone()))
    }

    /// PNG of the dilated overlap mask
    pub fn png_blob(&self) -> Result<&[u8]> {
        Ok(self.completed()?.finished.overlap.png_blob())
    }

    pub fn padding_moving(&self) -> Result<Padding> {
        Ok(self.padded()?.layout.moving)
    }

    pub fn padding_fixed(&self) -> Result<Padding> {
        Ok(self.padded()?.layout.fixed)
    }

    pub fn moving_pad_left(&self) -> Result<u32> {
        Ok(self.padding_moving()?.left)
    }

    pub fn moving_pad_top(&self) -> Result<u32> {
        Ok(self.padding_moving()?.top)
    }

    pub fn fixed_pad_left(&self) -> Result<u32> {
        Ok(self.padding_fixed()?.left)
    }

    pub fn fixed_pad_top(&self) -> Result<u32> {
        Ok(self.padding_fixed()?.top)
    }

    /// Metadata as XML tag lines
    pub fn xml_metadata(&self) -> Result<Vec<String>> {
        Ok(crate::report::xml_lines(self.metadata()?))
    }

    pub fn save_cropped_registered_image_to_disk(&self, path: impl AsRef<Path>) -> Result<()> {
        io::write_buffer(path.as_ref(), &self.cropped_registered_image()?)
    }

    pub fn save_cropped_fixed_image_to_disk(&self, path: impl AsRef<Path>) -> Result<()> {
        io::write_buffer(path.as_ref(), &self.cropped_fixed_image()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PixelRect;
    use image::Luma;

    fn square_image(size: u32, dark: PixelRect) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(size, size, |x, y| {
            let inside =
                x >= dark.x && x < dark.x + dark.width && y >= dark.y && y < dark.y + dark.height;
            Luma([if inside { 0 } else { 255 }])
        }))
    }

    fn translated_pair() -> Registrator {
        let input = RegistrationInput::new(
            square_image(50, PixelRect::new(10, 10, 20, 20)),
            square_image(50, PixelRect::new(20, 15, 20, 20)),
            ControlPoints::from_coordinates(&[10, 10, 20, 15, 29, 10, 39, 15]).unwrap(),
        );
        Registrator::new(input, &Config::default())
    }

    #[test]
    fn test_accessors_before_registration() {
        let registrator = translated_pair();
        assert!(!registrator.is_registered());
        assert!(matches!(
            registrator.metadata().unwrap_err(),
            RegistrationError::NotRegistered
        ));
        assert!(registrator.cropped_fixed_image().is_err());
        assert!(registrator.padding_moving().is_err());
    }

    #[test]
    fn test_translation_only() {
        let mut registrator = translated_pair();
        let metadata = registrator.perform_registration().unwrap().clone();

        assert_eq!(metadata.translation.tx, 10);
        assert_eq!(metadata.translation.ty, 5);
        assert_eq!(metadata.rotation.angle_diff_degrees, 0.0);
        assert_eq!(metadata.image_sizes.padded, ImageSize::new(60, 55));
        assert_eq!(metadata.image_sizes.registered, ImageSize::new(50, 50));
        assert_eq!(metadata.region_of_interest.rect, PixelRect::new(19, 14, 22, 22));
        assert_eq!(metadata.control_points.pt1, Point::new(20, 15));
        assert_eq!(metadata.control_points.pt1, metadata.control_points.pt3);
        assert!(metadata.control_points.euclidean_distance.unconstrained < 1e-9);

        assert_eq!(registrator.moving_pad_left().unwrap(), 10);
        assert_eq!(registrator.moving_pad_top().unwrap(), 5);
        assert_eq!(registrator.fixed_pad_left().unwrap(), 0);
        assert_eq!(registrator.padding_fixed().unwrap().right, 10);
        assert_eq!(registrator.padding_fixed().unwrap().bottom, 5);

        let (moving, fixed) = registrator.cropped_images().unwrap();
        assert_eq!(moving.dimensions(), (22, 22));
        assert_eq!(moving, fixed);
        assert_eq!(registrator.stage_timings().unwrap().len(), 10);
    }

    #[test]
    fn test_second_run_rejected() {
        let mut registrator = translated_pair();
        registrator.perform_registration().unwrap();
        assert!(matches!(
            registrator.perform_registration().unwrap_err(),
            RegistrationError::AlreadyRegistered
        ));
        assert!(registrator.is_registered());
    }

    #[test]
    fn test_no_overlap_keeps_padded_images() {
        // frames overlap, dark content does not
        let input = RegistrationInput::new(
            square_image(50, PixelRect::new(10, 10, 20, 20)),
            square_image(50, PixelRect::new(10, 10, 20, 20)),
            ControlPoints::from_coordinates(&[10, 10, 35, 35, 29, 10, 54, 35]).unwrap(),
        );
        let mut registrator = Registrator::new(input, &Config::default());
        let err = registrator.perform_registration().unwrap_err();
        assert!(matches!(err, RegistrationError::Geometry(_)), "{err}");
        assert!(registrator.padded_fixed_image().is_ok());
        assert_eq!(registrator.moving_pad_left().unwrap(), 25);
        assert!(registrator.cropped_fixed_image().is_err());
    }

    #[test]
    fn test_far_translation_fails_before_padding() {
        let input = RegistrationInput::new(
            square_image(50, PixelRect::new(10, 10, 20, 20)),
            square_image(50, PixelRect::new(10, 10, 20, 20)),
            ControlPoints::from_coordinates(&[
                0,
                0,
                2_000_000_000,
                2_000_000_000,
                19,
                0,
                2_000_000_019,
                2_000_000_000,
            ])
            .unwrap(),
        );
        let mut registrator = Registrator::new(input, &Config::default());
        let err = registrator.perform_registration().unwrap_err();
        assert!(matches!(err, RegistrationError::Geometry(_)), "{err}");
        assert!(registrator.padded_fixed_image().is_err());
    }

    #[test]
    fn test_translation_overflow_is_input_error() {
        let input = RegistrationInput::new(
            square_image(50, PixelRect::new(10, 10, 20, 20)),
            square_image(50, PixelRect::new(10, 10, 20, 20)),
            ControlPoints::from_coordinates(&[i32::MIN, 0, i32::MAX, 0, 0, 0, 5, 5]).unwrap(),
        );
        let err = Registrator::new(input, &Config::default())
            .perform_registration()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InputValidation(_)), "{err}");
    }

    #[test]
    fn test_coincident_points_fail_before_transform() {
        let input = RegistrationInput::new(
            square_image(50, PixelRect::new(10, 10, 20, 20)),
            square_image(50, PixelRect::new(10, 10, 20, 20)),
            ControlPoints::from_coordinates(&[10, 10, 20, 20, 10, 10, 30, 20]).unwrap(),
        );
        let mut registrator = Registrator::new(input, &Config::default());
        let err = registrator.perform_registration().unwrap_err();
        assert!(matches!(err, RegistrationError::InputValidation(_)));
        assert!(registrator.padded_fixed_image().is_err());
    }

    #[test]
    fn test_oversized_kernel_fails_validation() {
        let mut config = Config::default();
        config.overlap.kernel.size = 255;
        let mut registrator = Registrator::new(translated_pair().input, &config);
        let err = registrator.perform_registration().unwrap_err();
        assert!(matches!(err, RegistrationError::InputValidation(_)), "{err}");
        assert!(registrator.padded_fixed_image().is_err());
    }

    #[test]
    fn test_empty_image_rejected() {
        let input = RegistrationInput::new(
            DynamicImage::new_luma8(0, 0),
            square_image(50, PixelRect::new(10, 10, 20, 20)),
            ControlPoints::from_coordinates(&[10, 10, 20, 20, 30, 10, 40, 20]).unwrap(),
        );
        let err = Registrator::new(input, &Config::default())
            .perform_registration()
            .unwrap_err();
        assert!(err.to_string().contains("moving image is empty"));
    }
}
