//! Encoders for the three files of a capture bundle.
//!
//! * [`MetadataDocument`] renders the line-oriented `key: value` description of a capture, with
//!   every number printed to nine decimal places, and parses it back.
//! * [`write_ply`] writes the retained points of a depth point cloud as an ASCII PLY mesh, after
//!   [`filter_points`] has dropped the low-confidence ones.
//! * [`encode_jpeg`] compresses the still image and [`embed_user_comment`] stores the metadata
//!   document inside the JPEG's EXIF block, together with the image width and height.

mod error;
mod exif;
mod jpeg;
mod metadata;
mod ply;

pub use error::*;
pub use exif::*;
pub use jpeg::*;
pub use metadata::*;
pub use ply::*;
