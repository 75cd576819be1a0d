use nalgebra::Matrix3;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The cameras a capture provider may report calibration for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde-serialize", serde(rename_all = "snake_case"))]
pub enum CameraId {
    /// The default camera that produces the still image.
    Color,
    RgbIr,
    Fisheye,
    /// The range camera that produces point clouds.
    Depth,
}

impl CameraId {
    pub const ALL: [CameraId; 4] = [
        CameraId::Color,
        CameraId::RgbIr,
        CameraId::Fisheye,
        CameraId::Depth,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CameraId::Color => "color",
            CameraId::RgbIr => "rgb-ir",
            CameraId::Fisheye => "fisheye",
            CameraId::Depth => "depth",
        }
    }
}

impl std::fmt::Display for CameraId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Factory calibration of one camera.
///
/// Focal lengths and the principal point are in pixels. The field of view is in radians and is
/// derived from the focal lengths and the image size, so it is always consistent with them.
/// `distortion` holds the five radial/tangential coefficients `[k1, k2, p1, p2, k3]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub width: u32,
    pub height: u32,
    pub fov_horizontal: f64,
    pub fov_vertical: f64,
    pub distortion: [f64; 5],
}

impl CameraIntrinsics {
    pub fn new(
        fx: f64,
        fy: f64,
        cx: f64,
        cy: f64,
        width: u32,
        height: u32,
        distortion: [f64; 5],
    ) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            width,
            height,
            fov_horizontal: 2.0 * (0.5 * width as f64).atan2(fx),
            fov_vertical: 2.0 * (0.5 * height as f64).atan2(fy),
            distortion,
        }
    }

    /// The intrinsic matrix `K`.
    #[rustfmt::skip]
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0,     self.cx,
            0.0,     self.fy, self.cy,
            0.0,     0.0,     1.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn field_of_view_from_focals() {
        let intrinsics = CameraIntrinsics::new(500.0, 500.0, 320.0, 240.0, 1000, 640, [0.0; 5]);
        assert_relative_eq!(
            intrinsics.fov_horizontal,
            std::f64::consts::FRAC_PI_2,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            intrinsics.fov_vertical,
            2.0 * (320.0f64 / 500.0).atan(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn matrix_projects_principal_ray() {
        let intrinsics = CameraIntrinsics::new(600.0, 610.0, 320.5, 239.5, 640, 480, [0.0; 5]);
        let pixel = intrinsics.matrix() * Vector3::z();
        assert_relative_eq!(pixel, Vector3::new(320.5, 239.5, 1.0));
    }
}
