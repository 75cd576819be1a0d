//! The capture pipeline: from a photo event and the buffered inertial samples to a bundle of
//! files on disk.
//!
//! A [`CaptureSession`] receives photo and point cloud events from a [`CaptureProvider`] and
//! inertial samples through a [`SensorHub`]. Calling [`CaptureSession::post_process`] takes the
//! assembled [`CaptureFrame`] and runs [`CapturePipeline`] on a worker thread. The stages run in a
//! fixed order:
//!
//! 1. decode the raw image buffer (fatal on failure, nothing is written)
//! 2. encode and write the JPEG (fatal on failure)
//! 3. write the metadata document
//! 4. embed the metadata document in the JPEG's EXIF block
//! 5. filter and write the point cloud
//! 6. clear the frame and resume sensor ingestion
//!
//! Failures in stages 3 to 5 are collected as warnings in the [`CaptureReport`].

mod decode;
mod error;
mod frame;
mod output;
mod pipeline;
mod provider;
mod sensors;
mod session;
mod settings;

pub use decode::*;
pub use error::*;
pub use frame::*;
pub use output::*;
pub use pipeline::*;
pub use provider::*;
pub use sensors::*;
pub use session::*;
pub use settings::*;
