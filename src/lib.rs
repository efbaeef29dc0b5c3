pub mod batch;
pub mod config;
pub mod error;
pub mod geometry;
pub mod io;
pub mod logging;
pub mod overlap;
pub mod raster;
pub mod registration;
pub mod report;

pub use error::{RegistrationError, Result};
pub use geometry::{
    AffineTransform, ControlPoints, CorrespondingPointsPair, PixelRect, Point, PointsOnImage,
    ScaleFactor, ScaleFactorDirection,
};
pub use overlap::{Overlap, OverlapEngine, RegionOfInterest};
pub use raster::{KernelShape, NativeRaster, RasterOps, StructuringElement};
pub use registration::{Padding, RegistrationInput, RegistrationMetadata, Registrator};

/// Library version string
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
