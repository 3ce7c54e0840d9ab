use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

/// Scratch directory handed to the generator for temporary files.
///
/// Removed on close or drop unless `save_temps` was requested.
#[derive(Debug)]
pub struct ArtifactDir {
    dir: Option<TempDir>,
    path: PathBuf,
    keep: bool,
}

impl ArtifactDir {
    pub fn create(parent: Option<&Path>, keep: bool) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("otter-jit-");
        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        let path = dir.path().to_path_buf();
        debug!("jit artifact dir" = %path.display(), keep);
        Ok(Self {
            dir: Some(dir),
            path,
            keep,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the directory, or leaves it on disk when saving temps.
    /// Returns the kept path.
    pub fn close(mut self) -> io::Result<Option<PathBuf>> {
        let Some(dir) = self.dir.take() else {
            return Ok(None);
        };
        if self.keep {
            Ok(Some(dir.keep()))
        } else {
            dir.close()?;
            Ok(None)
        }
    }
}

impl Drop for ArtifactDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take()
            && self.keep
        {
            let _ = dir.keep();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_removes_directory() {
        let parent = tempfile::tempdir().unwrap();
        let artifacts = ArtifactDir::create(Some(parent.path()), false).unwrap();
        let path = artifacts.path().to_path_buf();
        assert!(path.is_dir());

        assert_eq!(artifacts.close().unwrap(), None);
        assert!(!path.exists());
    }

    #[test]
    fn save_temps_keeps_directory() {
        let parent = tempfile::tempdir().unwrap();
        let artifacts = ArtifactDir::create(Some(parent.path()), true).unwrap();
        let path = artifacts.path().to_path_buf();

        assert_eq!(artifacts.close().unwrap(), Some(path.clone()));
        assert!(path.is_dir());
    }

    #[test]
    fn drop_without_keep_cleans_up() {
        let artifacts = ArtifactDir::create(None, false).unwrap();
        let path = artifacts.path().to_path_buf();
        drop(artifacts);
        assert!(!path.exists());
    }
}
