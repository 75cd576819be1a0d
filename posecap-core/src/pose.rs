use crate::{quaternion_to_matrix, CorrectedQuaternion, CorrectedVector3, OrientationCorrection};
use nalgebra::{Matrix4, Quaternion, Vector3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A rotation and translation as reported by the device, in the sensor frame.
///
/// This is used both for the pose of the device at capture time and for the static IMU-to-camera
/// calibration of each camera. The rotation is stored exactly as reported, `(w, x, y, z)`, and is
/// not required to be normalized.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct DevicePose {
    pub rotation: Quaternion<f64>,
    pub translation: Vector3<f64>,
}

impl DevicePose {
    pub fn new(rotation: Quaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Creates a pose with no change in position or orientation.
    pub fn identity() -> Self {
        Self::new(Quaternion::identity(), Vector3::zeros())
    }

    /// Retrieve the homogeneous matrix.
    pub fn homogeneous(&self) -> Matrix4<f64> {
        let q = self.rotation;
        let mut matrix = quaternion_to_matrix(q.w, q.i, q.j, q.k);
        matrix.fixed_slice_mut::<3, 1>(0, 3).copy_from(&self.translation);
        matrix
    }

    /// Applies the capture's orientation correction to both parts of the pose.
    ///
    /// The translation is corrected as a direction, so it is rotated but never offset.
    pub fn correct(&self, correction: &OrientationCorrection) -> CorrectedPose {
        CorrectedPose {
            rotation: correction.quaternion(self.rotation),
            translation: correction.vector(self.translation),
        }
    }
}

impl Default for DevicePose {
    fn default() -> Self {
        Self::identity()
    }
}

/// A [`DevicePose`] alongside its orientation-corrected form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectedPose {
    pub rotation: CorrectedQuaternion,
    pub translation: CorrectedVector3,
}
