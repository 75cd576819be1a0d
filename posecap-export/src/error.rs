use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("failed to write point cloud: {0}")]
    Ply(#[source] std::io::Error),
    #[error("failed to tag image: {0}")]
    Tag(#[from] TagError),
}

/// Errors while reading or rewriting the EXIF block of a JPEG stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TagError {
    #[error("data is not a JPEG stream")]
    NotJpeg,
    #[error("JPEG stream ends inside a segment")]
    Truncated,
    #[error("comment of {size} bytes does not fit in one EXIF segment (limit {limit})")]
    CommentTooLarge { size: usize, limit: usize },
}

pub type Result<T, E = ExportError> = std::result::Result<T, E>;
