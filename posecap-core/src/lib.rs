//! # posecap core
//!
//! Common types and math shared by every crate in the posecap workspace. A still capture pairs an
//! image with the 6-DoF pose of the device, and the inertial samples recorded around it. Those
//! streams arrive asynchronously and carry their own timestamps, and all of the vector quantities
//! are expressed in the native sensor frame of the device. This crate provides:
//!
//! * [`TimestampedRingBuffer`], a fixed-capacity, oldest-overwrite buffer that a sensor producer
//!   and a capture consumer can share across threads.
//! * The orientation math ([`quaternion_to_matrix`], [`matrix_to_quaternion`], [`remap_axes`]) and
//!   [`OrientationCorrection`], which turns sensor-frame vectors and rotations into a frame that
//!   does not depend on how the screen was rotated when the capture happened.
//! * [`find_closest`] and [`correlate`], which match a capture timestamp to the nearest buffered
//!   sample.
//! * The calibration types reported by a capture provider: [`CameraIntrinsics`] and
//!   [`DevicePose`].
//!
//! ## Frames
//!
//! The correction applied to every orientation-bearing quantity is a fixed matrix `IR` which only
//! permutes and negates axes. It is selected from four presets, one per [`DeviceRotation`]:
//!
//! ```text
//!   rotation   x axis   y axis
//!   0          +X       +Y
//!   90         +Y       -X
//!   180        -X       -Y
//!   270        -Y       +X
//! ```
//!
//! The third axis is implied so that the output frame stays right-handed.

mod buffer;
mod camera;
mod correlate;
mod orientation;
mod pose;
mod sample;

pub use buffer::*;
pub use camera::*;
pub use correlate::*;
pub use nalgebra;
pub use orientation::*;
pub use pose::*;
pub use sample::*;
