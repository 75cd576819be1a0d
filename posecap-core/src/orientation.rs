use derive_more::{AsRef, Deref, From, Into};
use nalgebra::{Matrix4, Quaternion, Vector3, Vector4};
use thiserror::Error;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum OrientationError {
    #[error("remap axes {0:?} and {1:?} lie on the same axis")]
    DuplicateAxis(Axis, Axis),
}

/// A signed device axis used to describe where an output axis comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
    MinusX,
    MinusY,
    MinusZ,
}

impl Axis {
    /// The unsigned axis index, `0` for x through `2` for z.
    pub fn index(self) -> usize {
        match self {
            Axis::X | Axis::MinusX => 0,
            Axis::Y | Axis::MinusY => 1,
            Axis::Z | Axis::MinusZ => 2,
        }
    }

    pub fn is_negative(self) -> bool {
        matches!(self, Axis::MinusX | Axis::MinusY | Axis::MinusZ)
    }

    fn sign(negative: bool) -> f64 {
        if negative {
            -1.0
        } else {
            1.0
        }
    }
}

/// The rotation of the display relative to the natural orientation of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum DeviceRotation {
    #[default]
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl DeviceRotation {
    pub const ALL: [DeviceRotation; 4] = [
        DeviceRotation::Rotation0,
        DeviceRotation::Rotation90,
        DeviceRotation::Rotation180,
        DeviceRotation::Rotation270,
    ];

    /// The rotation in degrees, as written to capture metadata.
    pub fn degrees(self) -> u32 {
        match self {
            DeviceRotation::Rotation0 => 0,
            DeviceRotation::Rotation90 => 90,
            DeviceRotation::Rotation180 => 180,
            DeviceRotation::Rotation270 => 270,
        }
    }

    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees % 360 {
            0 => Some(DeviceRotation::Rotation0),
            90 => Some(DeviceRotation::Rotation90),
            180 => Some(DeviceRotation::Rotation180),
            270 => Some(DeviceRotation::Rotation270),
            _ => None,
        }
    }

    /// The `(x, y)` remap preset for this rotation.
    pub fn axes(self) -> (Axis, Axis) {
        match self {
            DeviceRotation::Rotation0 => (Axis::X, Axis::Y),
            DeviceRotation::Rotation90 => (Axis::Y, Axis::MinusX),
            DeviceRotation::Rotation180 => (Axis::MinusX, Axis::MinusY),
            DeviceRotation::Rotation270 => (Axis::MinusY, Axis::X),
        }
    }
}

/// Converts a quaternion `(w, x, y, z)` into a rotation embedded in a homogeneous matrix.
///
/// The quaternion does not need to be normalized. A zero quaternion has no defined rotation; its
/// scale factor is taken as zero, which yields the identity.
#[rustfmt::skip]
pub fn quaternion_to_matrix(w: f64, x: f64, y: f64, z: f64) -> Matrix4<f64> {
    let norm = w * w + x * x + y * y + z * z;
    let s = if norm > 0.0 { 2.0 / norm } else { 0.0 };
    let (xs, ys, zs) = (x * s, y * s, z * s);
    let (xx, xy, xz, xw) = (x * xs, x * ys, x * zs, w * xs);
    let (yy, yz, yw) = (y * ys, y * zs, w * ys);
    let (zz, zw) = (z * zs, w * zs);
    Matrix4::new(
        1.0 - (yy + zz), xy - zw,         xz + yw,         0.0,
        xy + zw,         1.0 - (xx + zz), yz - xw,         0.0,
        xz - yw,         yz + xw,         1.0 - (xx + yy), 0.0,
        0.0,             0.0,             0.0,             1.0,
    )
}

/// Extracts the quaternion `(w, x, y, z)` of the rotation block of `m`.
///
/// The branch is chosen deterministically: `trace >= 0` uses the trace directly, otherwise the
/// largest diagonal term (compared pairwise, `m00` then `m11`, else `m22`) is used so that the
/// square root argument is never close to zero.
pub fn matrix_to_quaternion(m: &Matrix4<f64>) -> Quaternion<f64> {
    let (m00, m01, m02) = (m[(0, 0)], m[(0, 1)], m[(0, 2)]);
    let (m10, m11, m12) = (m[(1, 0)], m[(1, 1)], m[(1, 2)]);
    let (m20, m21, m22) = (m[(2, 0)], m[(2, 1)], m[(2, 2)]);
    let trace = m00 + m11 + m22;

    if trace >= 0.0 {
        let s = (trace + 1.0).sqrt();
        let w = 0.5 * s;
        let s = 0.5 / s;
        Quaternion::new(w, (m21 - m12) * s, (m02 - m20) * s, (m10 - m01) * s)
    } else if m00 > m11 && m00 > m22 {
        let s = (1.0 + m00 - m11 - m22).sqrt();
        let x = 0.5 * s;
        let s = 0.5 / s;
        Quaternion::new((m21 - m12) * s, x, (m10 + m01) * s, (m02 + m20) * s)
    } else if m11 > m22 {
        let s = (1.0 + m11 - m00 - m22).sqrt();
        let y = 0.5 * s;
        let s = 0.5 / s;
        Quaternion::new((m02 - m20) * s, (m10 + m01) * s, y, (m21 + m12) * s)
    } else {
        let s = (1.0 + m22 - m00 - m11).sqrt();
        let z = 0.5 * s;
        let s = 0.5 / s;
        Quaternion::new((m10 - m01) * s, (m02 + m20) * s, (m21 + m12) * s, z)
    }
}

/// Permutes and negates the rows of the rotation block of `input` so that output axis `x` takes
/// input row 0 and output axis `y` takes input row 1. The remaining axis takes row 2, with the sign
/// that keeps the frame right-handed.
///
/// The translation column is dropped and the homogeneous row is reset, so the result is a pure
/// rotation.
pub fn remap_axes(
    input: &Matrix4<f64>,
    x_axis: Axis,
    y_axis: Axis,
) -> Result<Matrix4<f64>, OrientationError> {
    if x_axis.index() == y_axis.index() {
        return Err(OrientationError::DuplicateAxis(x_axis, y_axis));
    }
    Ok(remap_distinct(input, x_axis, y_axis))
}

fn remap_distinct(input: &Matrix4<f64>, x_axis: Axis, y_axis: Axis) -> Matrix4<f64> {
    let x = x_axis.index();
    let y = y_axis.index();
    let z = 3 - x - y;
    // (x, y, z) being a cyclic permutation of (0, 1, 2) keeps the sign of z as the product of the
    // signs of x and y; otherwise it flips.
    let cyclic = x == (z + 1) % 3 && y == (z + 2) % 3;
    let z_negative = x_axis.is_negative() ^ y_axis.is_negative() ^ !cyclic;

    let mut output = Matrix4::identity();
    for column in 0..3 {
        output[(x, column)] = Axis::sign(x_axis.is_negative()) * input[(0, column)];
        output[(y, column)] = Axis::sign(y_axis.is_negative()) * input[(1, column)];
        output[(z, column)] = Axis::sign(z_negative) * input[(2, column)];
    }
    output
}

/// Rotates a direction by `remap`. The vector is extended with a `0` homogeneous component, so
/// only the rotation is applied; this is for orientation-only quantities such as gravity,
/// acceleration and translation deltas.
pub fn correct_vector(v: &Vector3<f64>, remap: &Matrix4<f64>) -> Vector3<f64> {
    (remap * Vector4::new(v.x, v.y, v.z, 0.0)).xyz()
}

/// A sensor-frame vector together with its orientation-corrected counterpart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectedVector3 {
    pub raw: Vector3<f64>,
    pub corrected: Vector3<f64>,
}

/// A sensor-frame rotation together with its orientation-corrected counterpart, both
/// `(w, x, y, z)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectedQuaternion {
    pub raw: Quaternion<f64>,
    pub corrected: Quaternion<f64>,
}

/// The fixed remap matrix `IR` for one capture.
///
/// It is computed once from the device rotation read when the capture starts, and then applied
/// to every orientation-bearing quantity written for that capture.
#[derive(Debug, Clone, Copy, PartialEq, AsRef, Deref, From, Into)]
pub struct RemapMatrix(pub Matrix4<f64>);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationCorrection {
    rotation: DeviceRotation,
    remap: RemapMatrix,
}

impl OrientationCorrection {
    pub fn new(rotation: DeviceRotation) -> Self {
        let (x_axis, y_axis) = rotation.axes();
        let remap = remap_distinct(&Matrix4::identity(), x_axis, y_axis);
        Self {
            rotation,
            remap: RemapMatrix(remap),
        }
    }

    pub fn rotation(&self) -> DeviceRotation {
        self.rotation
    }

    pub fn remap(&self) -> &RemapMatrix {
        &self.remap
    }

    pub fn vector(&self, raw: Vector3<f64>) -> CorrectedVector3 {
        CorrectedVector3 {
            raw,
            corrected: correct_vector(&raw, &self.remap),
        }
    }

    /// Corrects the rotation `raw` by remapping the axes of its matrix form.
    pub fn quaternion(&self, raw: Quaternion<f64>) -> CorrectedQuaternion {
        let (x_axis, y_axis) = self.rotation.axes();
        let matrix = quaternion_to_matrix(raw.w, raw.i, raw.j, raw.k);
        let remapped = remap_distinct(&matrix, x_axis, y_axis);
        CorrectedQuaternion {
            raw,
            corrected: matrix_to_quaternion(&remapped),
        }
    }
}

impl From<DeviceRotation> for OrientationCorrection {
    fn from(rotation: DeviceRotation) -> Self {
        Self::new(rotation)
    }
}
