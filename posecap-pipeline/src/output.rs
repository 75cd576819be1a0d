use crate::{CaptureError, Result};
use chrono::{DateTime, Local};
use log::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// The name shared by the files of one capture bundle, without extension.
///
/// It combines the local time of the capture to the millisecond with the image timestamp, so
/// bundles sort by time and can be matched to the pose clock.
pub fn bundle_stem(local: DateTime<Local>, image_timestamp: f64) -> String {
    format!(
        "{}-{:.9}",
        local.format("%Y%m%d%H%M%S%.3f"),
        image_timestamp
    )
}

/// A directory that capture bundles are written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDirectory {
    path: PathBuf,
}

impl OutputDirectory {
    /// Uses `path` as is, without checking it.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Picks the first of `candidates` that can be created and written to.
    ///
    /// When none qualifies, `fallback` is created and used even if it fails the write probe, so
    /// that the error surfaces on the actual write.
    pub fn resolve(candidates: &[PathBuf], fallback: &Path) -> Result<Self> {
        for candidate in candidates {
            match probe(candidate) {
                Ok(()) => {
                    debug!("writing captures to {}", candidate.display());
                    return Ok(Self::new(candidate));
                }
                Err(e) => warn!("{} is not writable: {}", candidate.display(), e),
            }
        }
        warn!("falling back to {}", fallback.display());
        std::fs::create_dir_all(fallback).map_err(|source| CaptureError::NoWritableDirectory {
            last: fallback.to_path_buf(),
            source,
        })?;
        if let Err(e) = probe(fallback) {
            warn!("{} failed the write probe: {}", fallback.display(), e);
        }
        Ok(Self::new(fallback))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self, stem: &str, extension: &str) -> PathBuf {
        self.path.join(format!("{}.{}", stem, extension))
    }

    /// Writes `bytes` to `path` through a temporary file in the same directory, so the file at
    /// `path` is either absent, the previous version, or complete.
    pub fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let error = |source| CaptureError::Write {
            path: path.to_path_buf(),
            source,
        };
        let mut file = NamedTempFile::new_in(&self.path).map_err(error)?;
        file.write_all(bytes).map_err(error)?;
        file.as_file().sync_all().map_err(error)?;
        file.persist(path).map_err(|e| error(e.error))?;
        Ok(())
    }
}

fn probe(directory: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(directory)?;
    // Dropping the file removes it again.
    NamedTempFile::new_in(directory).map(drop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn stem_format() {
        let local = Local
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .unwrap()
            + chrono::Duration::milliseconds(42);
        assert_eq!(bundle_stem(local, 12.5), "20240309140507.042-12.500000000");
    }

    #[test]
    fn first_writable_candidate_wins() {
        let root = tempfile::tempdir().unwrap();
        // A regular file cannot be used as a directory.
        let blocked = root.path().join("blocked");
        std::fs::write(&blocked, b"").unwrap();
        let candidates = vec![blocked.join("captures"), root.path().join("second")];
        let directory =
            OutputDirectory::resolve(&candidates, &root.path().join("fallback")).unwrap();
        assert_eq!(directory.path(), root.path().join("second"));
        assert!(!root.path().join("fallback").exists());
        assert_eq!(std::fs::read_dir(directory.path()).unwrap().count(), 0);
    }

    #[test]
    fn falls_back_when_no_candidate_works() {
        let root = tempfile::tempdir().unwrap();
        let blocked = root.path().join("blocked");
        std::fs::write(&blocked, b"").unwrap();
        let fallback = root.path().join("fallback");
        let directory = OutputDirectory::resolve(&[blocked.join("a")], &fallback).unwrap();
        assert_eq!(directory.path(), fallback);
        assert!(fallback.is_dir());

        let error = OutputDirectory::resolve(&[], &blocked.join("b")).unwrap_err();
        assert!(matches!(error, CaptureError::NoWritableDirectory { .. }));
    }

    #[test]
    fn atomic_write_replaces_file() {
        let root = tempfile::tempdir().unwrap();
        let directory = OutputDirectory::new(root.path());
        let path = directory.file("capture", "yaml");
        directory.write_atomic(&path, b"first").unwrap();
        directory.write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 1);
    }

    #[test]
    fn failed_write_leaves_no_temporary_file() {
        let root = tempfile::tempdir().unwrap();
        let directory = OutputDirectory::new(root.path());
        let path = directory.file("capture", "yaml");
        std::fs::create_dir(&path).unwrap();
        assert!(matches!(
            directory.write_atomic(&path, b"data"),
            Err(CaptureError::Write { .. })
        ));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 1);
    }
}
