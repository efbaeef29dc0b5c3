use super::PointsOnImage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which image's segment length is the numerator of the scale ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleFactorDirection {
    /// scale = img1 / img2
    #[default]
    Img1ToImg2,
    /// scale = img2 / img1
    Img2ToImg1,
}

impl fmt::Display for ScaleFactorDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Img1ToImg2 => write!(f, "img1/img2"),
            Self::Img2ToImg1 => write!(f, "img2/img1"),
        }
    }
}

/// Ratio of the segment lengths of the two images.
///
/// Reported as metadata only; pixels are never rescaled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleFactor {
    pub value: f64,
    pub direction: ScaleFactorDirection,
}

impl ScaleFactor {
    /// Image 1 is the moving image, image 2 the fixed image.
    pub fn between(img1: &PointsOnImage, img2: &PointsOnImage) -> Self {
        Self::with_direction(img1, img2, ScaleFactorDirection::default())
    }

    pub fn with_direction(
        img1: &PointsOnImage,
        img2: &PointsOnImage,
        direction: ScaleFactorDirection,
    ) -> Self {
        // Segment lengths are strictly positive, PointsOnImage rejects coincident points
        let value = match direction {
            ScaleFactorDirection::Img1ToImg2 => img1.segment_length() / img2.segment_length(),
            ScaleFactorDirection::Img2ToImg1 => img2.segment_length() / img1.segment_length(),
        };
        Self { value, direction }
    }
}

impl fmt::Display for ScaleFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6} ({})", self.value, self.direction)
    }
}
