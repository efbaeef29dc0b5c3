use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformType {
    Identity,
    Translation,
    Rotation,
    Combined,
}

/// 2x3 affine matrix acting on `(x, y, 1)` column vectors in pixel space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub matrix: [[f64; 3]; 2],
    pub transform_type: TransformType,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineTransform {
    pub fn identity() -> Self {
        Self {
            matrix: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            transform_type: TransformType::Identity,
        }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self {
            matrix: [[1.0, 0.0, tx], [0.0, 1.0, ty]],
            transform_type: TransformType::Translation,
        }
    }

    /// Rotation about `center` by `angle_degrees`, positive counter-clockwise as
    /// seen on screen. Same layout as OpenCV's `getRotationMatrix2D` at unit scale:
    ///
    /// ```text
    /// [  a  b  (1-a)*cx - b*cy ]
    /// [ -b  a  b*cx + (1-a)*cy ]
    /// ```
    pub fn rotation_about(center: (f64, f64), angle_degrees: f64) -> Self {
        let theta = angle_degrees.to_radians();
        let a = theta.cos();
        let b = theta.sin();
        let (cx, cy) = center;
        Self {
            matrix: [
                [a, b, (1.0 - a) * cx - b * cy],
                [-b, a, b * cx + (1.0 - a) * cy],
            ],
            transform_type: TransformType::Rotation,
        }
    }

    /// Transform that applies `self` first and `next` second
    pub fn then(&self, next: &AffineTransform) -> Self {
        let a = &next.matrix;
        let b = &self.matrix;
        let mut m = [[0.0; 3]; 2];
        for (r, row) in m.iter_mut().enumerate() {
            row[0] = a[r][0] * b[0][0] + a[r][1] * b[1][0];
            row[1] = a[r][0] * b[0][1] + a[r][1] * b[1][1];
            row[2] = a[r][0] * b[0][2] + a[r][1] * b[1][2] + a[r][2];
        }
        let transform_type = match (self.transform_type, next.transform_type) {
            (TransformType::Identity, t) | (t, TransformType::Identity) => t,
            (s, n) if s == n && s == TransformType::Translation => TransformType::Translation,
            _ => TransformType::Combined,
        };
        Self {
            matrix: m,
            transform_type,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let m = &self.matrix;
        (
            m[0][0] * x + m[0][1] * y + m[0][2],
            m[1][0] * x + m[1][1] * y + m[1][2],
        )
    }

    /// Axis-aligned extent `(min_x, min_y, max_x, max_y)` of a `width x height`
    /// rectangle anchored at the origin after transformation
    pub fn transformed_bounds(&self, width: u32, height: u32) -> (f64, f64, f64, f64) {
        let (w, h) = (width as f64, height as f64);
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(w, 0.0),
            self.apply(0.0, h),
            self.apply(w, h),
        ];
        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        )
    }

    /// Row-major 3x3 homogeneous form, as consumed by projective warps
    pub fn to_homogeneous_f32(&self) -> [f32; 9] {
        let m = &self.matrix;
        [
            m[0][0] as f32,
            m[0][1] as f32,
            m[0][2] as f32,
            m[1][0] as f32,
            m[1][1] as f32,
            m[1][2] as f32,
            0.0,
            0.0,
            1.0,
        ]
    }
}
