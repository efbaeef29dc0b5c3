//! Export formats for [`RegistrationMetadata`]: JSON, XML tag lines and a
//! plain-text summary.

use crate::error::Result;
use crate::io;
use crate::registration::{RegistrationMetadata, Registrator};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Root element of the XML export
pub const XML_ROOT: &str = "registration_metadata";

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "YES"
    } else {
        "NO"
    }
}

fn matrix_rows<T: Display>(matrix: &[[T; 3]; 2], precision: Option<usize>) -> Vec<String> {
    matrix
        .iter()
        .map(|row| {
            row.iter()
                .map(|v| match precision {
                    Some(p) => format!("{v:.p$}"),
                    None => v.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

struct XmlBuilder {
    lines: Vec<String>,
}

impl XmlBuilder {
    fn open(&mut self, tag: &str) {
        self.lines.push(format!("<{tag}>"));
    }

    fn close(&mut self, tag: &str) {
        self.lines.push(format!("</{tag}>"));
    }

    fn element(&mut self, tag: &str, value: impl Display) {
        self.lines.push(format!("<{tag}>{value}</{tag}>"));
    }
}

/// One well-formed XML fragment per line; concatenated in order they form a
/// complete document rooted at [`XML_ROOT`].
pub fn xml_lines(metadata: &RegistrationMetadata) -> Vec<String> {
    let mut xml = XmlBuilder { lines: Vec::new() };
    xml.open(XML_ROOT);

    xml.open("translation");
    xml.element("tx", metadata.translation.tx);
    xml.element("ty", metadata.translation.ty);
    for row in matrix_rows(&metadata.translation.matrix, None) {
        xml.element("matrix_row", row);
    }
    xml.close("translation");

    let rotation = &metadata.rotation;
    xml.open("rotation");
    xml.element("angle_diff_degrees", format!("{:.6}", rotation.angle_diff_degrees));
    xml.element("center", rotation.center.to_csv());
    for row in matrix_rows(&rotation.matrix, Some(6)) {
        xml.element("matrix_row", row);
    }
    xml.close("rotation");

    xml.open("scale_factor");
    xml.element("value", format!("{:.6}", metadata.scale_factor.value));
    xml.element("direction", metadata.scale_factor.direction);
    xml.close("scale_factor");

    let points = &metadata.control_points;
    xml.open("control_points");
    for number in 1..=4u8 {
        if let Some(point) = points.point(number) {
            xml.element(&format!("pt{number}"), point.to_csv());
        }
    }
    xml.element(
        "distance_unconstrained",
        format!("{:.6}", points.euclidean_distance.unconstrained),
    );
    xml.element(
        "distance_constrained",
        format!("{:.6}", points.euclidean_distance.constrained),
    );
    xml.close("control_points");

    let sizes = &metadata.image_sizes;
    xml.open("image_sizes");
    xml.element("source_moving", sizes.source_moving);
    xml.element("source_fixed", sizes.source_fixed);
    xml.element("padded", sizes.padded);
    xml.element("registered", sizes.registered);
    xml.close("image_sizes");

    xml.open("grayscale_conversion");
    xml.element("moving", yes_no(metadata.grayscale_conversion.moving));
    xml.element("fixed", yes_no(metadata.grayscale_conversion.fixed));
    xml.close("grayscale_conversion");

    let [top_left, bottom_right] = &metadata.region_of_interest.corners;
    xml.open("region_of_interest");
    xml.element("top_left", top_left);
    xml.element("bottom_right", bottom_right);
    xml.close("region_of_interest");

    xml.open("structuring_element");
    xml.element("shape", metadata.structuring_element.shape);
    xml.element("size", metadata.structuring_element.size);
    xml.close("structuring_element");

    xml.close(XML_ROOT);
    xml.lines
}

pub fn to_json(metadata: &RegistrationMetadata) -> serde_json::Result<String> {
    serde_json::to_string_pretty(metadata)
}

/// Which metadata files [`write_outputs`] produces besides the images
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    pub json: bool,
    pub xml: bool,
}

/// Write every rendering of a completed registration into `dir`, returning
/// the written paths
pub fn write_outputs(
    registrator: &Registrator,
    dir: &Path,
    options: OutputOptions,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    let mut write = |name: &str, bytes: &[u8]| -> Result<()> {
        let path = dir.join(name);
        io::write_buffer(&path, bytes)?;
        written.push(path);
        Ok(())
    };

    write("cropped_registered.png", &registrator.cropped_registered_image()?)?;
    write("cropped_fixed.png", &registrator.cropped_fixed_image()?)?;
    write(
        "padded_registered_moving.png",
        &registrator.padded_registered_moving_image()?,
    )?;
    write("padded_fixed.png", &registrator.padded_fixed_image()?)?;
    write("overlay.png", &registrator.color_overlaid_registered_images()?)?;
    write("overlap_blob.png", registrator.png_blob()?)?;

    let metadata = registrator.metadata()?;
    if options.json {
        let json = to_json(metadata)?;
        write("metadata.json", json.as_bytes())?;
    }
    if options.xml {
        write("metadata.xml", xml_lines(metadata).join("\n").as_bytes())?;
    }
    debug!(dir = %dir.display(), files = written.len(), "Wrote registration outputs");
    Ok(written)
}

/// Human-readable multi-line summary
pub fn text_summary(metadata: &RegistrationMetadata) -> String {
    let points = &metadata.control_points;
    let roi = &metadata.region_of_interest;
    format!(
        "Registration:\n * translation: tx={}, ty={}\n * rotation: {:.6} degrees about {}\n * scale factor: {}\n * control points: pt1={} pt2={} pt3={} pt4={}\n * distances: unconstrained={:.6}, constrained={:.6}\n * sizes: moving {}, fixed {}, registered {}, padded {}\n * grayscale conversion: moving {}, fixed {}\n * region of interest: {} ({} to {})\n",
        metadata.translation.tx,
        metadata.translation.ty,
        metadata.rotation.angle_diff_degrees,
        metadata.rotation.center,
        metadata.scale_factor,
        points.pt1,
        points.pt2,
        points.pt3,
        points.pt4,
        points.euclidean_distance.unconstrained,
        points.euclidean_distance.constrained,
        metadata.image_sizes.source_moving,
        metadata.image_sizes.source_fixed,
        metadata.image_sizes.registered,
        metadata.image_sizes.padded,
        yes_no(metadata.grayscale_conversion.moving),
        yes_no(metadata.grayscale_conversion.fixed),
        roi.rect,
        roi.corners[0],
        roi.corners[1],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{PixelRect, Point, ScaleFactor, ScaleFactorDirection};
    use crate::raster::StructuringElement;
    use crate::registration::*;

    fn sample() -> RegistrationMetadata {
        RegistrationMetadata {
            translation: TranslationMetadata::new(10, 10),
            rotation: RotationMetadata {
                angle_diff_degrees: -90.0,
                moving_angle_degrees: 0.0,
                fixed_angle_degrees: -90.0,
                center: Point::new(20, 20),
                matrix: [[0.0, -1.0, 40.0], [1.0, 0.0, 0.0]],
            },
            scale_factor: ScaleFactor {
                value: 1.0,
                direction: ScaleFactorDirection::Img1ToImg2,
            },
            control_points: ControlPointMetadata {
                pt1: Point::new(30, 20),
                pt2: Point::new(30, 120),
                pt3: Point::new(30, 20),
                pt4: Point::new(30, 120),
                euclidean_distance: EuclideanDistance {
                    constrained: 0.0,
                    unconstrained: 0.0,
                },
            },
            image_sizes: ImageSizes {
                source_moving: ImageSize::new(130, 40),
                source_fixed: ImageSize::new(40, 130),
                padded: ImageSize::new(50, 140),
                registered: ImageSize::new(40, 130),
            },
            grayscale_conversion: GrayscaleConversion {
                moving: true,
                fixed: false,
            },
            region_of_interest: RegionOfInterestMetadata {
                rect: PixelRect::new(24, 19, 12, 102),
                corners: ["24,19".to_string(), "36,121".to_string()],
            },
            structuring_element: StructuringElement::default(),
        }
    }

    #[test]
    fn test_xml_lines_are_balanced() {
        let lines = xml_lines(&sample());
        assert_eq!(lines.first().unwrap(), "<registration_metadata>");
        assert_eq!(lines.last().unwrap(), "</registration_metadata>");
        let opens = lines.iter().filter(|l| !l.starts_with("</") && !l.contains("</")).count();
        let closes = lines.iter().filter(|l| l.starts_with("</")).count();
        assert_eq!(opens, closes);
    }

    #[test]
    fn test_xml_values() {
        let lines = xml_lines(&sample());
        for expected in [
            "<matrix_row>1 0 10</matrix_row>",
            "<matrix_row>0.000000 -1.000000 40.000000</matrix_row>",
            "<center>20,20</center>",
            "<direction>img1/img2</direction>",
            "<pt2>30,120</pt2>",
            "<padded>50x140</padded>",
            "<moving>YES</moving>",
            "<fixed>NO</fixed>",
            "<bottom_right>36,121</bottom_right>",
            "<shape>rect</shape>",
        ] {
            assert!(lines.iter().any(|l| l == expected), "missing {expected}");
        }
    }

    #[test]
    fn test_json_roundtrip() {
        let metadata = sample();
        let json = to_json(&metadata).unwrap();
        let parsed: RegistrationMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, metadata);
    }

    #[test]
    fn test_text_summary() {
        let text = text_summary(&sample());
        assert!(text.contains("rotation: -90.000000 degrees about (20, 20)"));
        assert!(text.contains("scale factor: 1.000000 (img1/img2)"));
    }
}
