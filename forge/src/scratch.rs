//! Per-invocation scratch directories.
//!
//! Every run works in its own directory: a fresh temporary directory by
//! default, or a caller-chosen one that must be empty or absent. Archives
//! land in `downloads/`, source trees in `src/`, and dependency prefixes in
//! `deps/`.

use crate::error::{ForgeError, Result};
use camino::Utf8Path;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Subdirectory holding downloaded archives.
pub const DOWNLOADS_DIR: &str = "downloads";

/// Subdirectory holding unpacked source trees.
pub const SOURCES_DIR: &str = "src";

/// The working directory of one invocation.
#[derive(Debug)]
pub enum ScratchDir {
    /// A temporary directory removed on drop.
    Temporary(TempDir),
    /// A caller-supplied directory that is left in place.
    Fixed(PathBuf),
}

impl ScratchDir {
    /// Create the scratch directory, at `requested` when given.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Config`] when `requested` exists and is not an
    /// empty directory, and [`ForgeError::Io`] when it cannot be created.
    pub fn create(requested: Option<&Utf8Path>) -> Result<Self> {
        let scratch = match requested {
            None => Self::Temporary(tempfile::Builder::new().prefix("pinsmith-").tempdir()?),
            Some(dir) => {
                if dir.exists() && std::fs::read_dir(dir)?.next().is_some() {
                    return Err(ForgeError::config(format!(
                        "scratch directory {dir} is not empty"
                    )));
                }
                std::fs::create_dir_all(dir)?;
                Self::Fixed(dir.as_std_path().to_path_buf())
            }
        };
        std::fs::create_dir_all(scratch.downloads())?;
        std::fs::create_dir_all(scratch.sources())?;
        log::debug!("scratch directory {}", scratch.path().display());
        Ok(scratch)
    }

    /// Root of the scratch directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Temporary(dir) => dir.path(),
            Self::Fixed(path) => path,
        }
    }

    /// Where archives are downloaded.
    #[must_use]
    pub fn downloads(&self) -> PathBuf {
        self.path().join(DOWNLOADS_DIR)
    }

    /// Where source trees are unpacked.
    #[must_use]
    pub fn sources(&self) -> PathBuf {
        self.path().join(SOURCES_DIR)
    }

    /// Stop the directory from being removed and return its path.
    #[must_use]
    pub fn keep(self) -> PathBuf {
        match self {
            Self::Temporary(dir) => dir.keep(),
            Self::Fixed(path) => path,
        }
    }
}
