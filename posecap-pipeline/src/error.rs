use posecap_core::CameraId;
use posecap_export::ExportError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to decode captured image: {0}")]
    Decode(#[from] DecodeError),
    #[error("failed to encode image: {0}")]
    Encode(#[source] ExportError),
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no writable output directory (last tried {})", last.display())]
    NoWritableDirectory {
        last: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("provider has no data for the {camera} camera")]
    ProviderUnavailable { camera: CameraId },
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("capture was superseded before it finished")]
    Cancelled,
    #[error("failed to start capture worker: {0}")]
    Worker(#[source] std::io::Error),
}

/// Failures while turning a raw capture buffer into an RGB image.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("no image data was captured")]
    MissingImage,
    #[error("unsupported image layout: {0}")]
    Unsupported(String),
    #[error("image buffer holds {actual} bytes but {expected} are needed")]
    BufferTooSmall { expected: usize, actual: usize },
    #[error("image has zero width or height")]
    ZeroSized,
}

pub type Result<T, E = CaptureError> = std::result::Result<T, E>;
