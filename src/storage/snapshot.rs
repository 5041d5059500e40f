use crate::common::Result;
use image::{DynamicImage, ImageFormat};
use std::fs;
use std::path::{Path, PathBuf};

/// The query still written before a login attempt.
///
/// The file must be gone after the attempt whatever the outcome, so the
/// guard removes it on drop; error paths are covered the same as success.
pub struct SnapshotGuard {
    path: PathBuf,
}

impl SnapshotGuard {
    pub fn write(path: impl Into<PathBuf>, frame: &DynamicImage) -> Result<Self> {
        let path = path.into();
        frame.save_with_format(&path, ImageFormat::Jpeg)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SnapshotGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to remove login snapshot"
                );
            }
        }
    }
}
