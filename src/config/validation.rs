//! Profile validation.
//!
//! # Responsibilities
//! - Coerce missing or invalid values to their defaults (Addr, Data, Port, DSN)
//! - Optionally check that the data directory exists
//!
//! # Design Decisions
//! - Validation normalizes rather than rejects; the only failure is an
//!   unusable data directory
//! - `data` and the DSN derived from it keep the configured form, so a
//!   relative data directory stays relative to the working directory
//! - The directory check is opt-in so callers can validate a profile whose
//!   directory does not exist yet

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::config::schema::{Profile, DEFAULT_ADDR, DEV_PORT};

/// Error surfaced by [`Profile::validate`].
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("unable to access data folder {}: {source}", path.display())]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("data folder {} is not a directory", path.display())]
    NotADirectory { path: PathBuf },
}

/// Whether [`Profile::validate`] touches the filesystem for the data directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDirCheck {
    /// Do not look at the filesystem.
    Skip,
    /// Require `data` to be an existing directory.
    Verify,
}

impl Profile {
    /// Normalize the profile in place.
    ///
    /// Order matters: the port depends on the mode and the sqlite DSN depends
    /// on the data directory.
    pub fn validate(&mut self, check: DataDirCheck) -> Result<(), ProfileError> {
        if self.addr.is_empty() {
            self.addr = DEFAULT_ADDR.to_string();
        }

        if self.data.as_os_str().is_empty() {
            self.data = PathBuf::from(".");
        }
        if check == DataDirCheck::Verify {
            check_data_dir(&self.data)?;
        }

        if self.is_dev() {
            self.port = DEV_PORT;
        }

        if self.driver == "sqlite" && self.dsn.is_empty() {
            let file = format!("memos_{}.db", self.mode);
            self.dsn = self.data.join(file).to_string_lossy().into_owned();
        }

        Ok(())
    }
}

/// Check a data directory relative to the working directory.
///
/// Returns the absolute, normalized path that was checked.
pub fn check_data_dir(data: &Path) -> Result<PathBuf, ProfileError> {
    let base = std::env::current_dir().map_err(|source| ProfileError::DataDir {
        path: data.to_path_buf(),
        source,
    })?;
    resolve_data_dir_from(&base, data)
}

/// Resolve `data` against `base`, normalize it and check that it is a directory.
pub fn resolve_data_dir_from(base: &Path, data: &Path) -> Result<PathBuf, ProfileError> {
    let joined = if data.is_absolute() {
        data.to_path_buf()
    } else {
        base.join(data)
    };

    let absolute = if joined.is_absolute() {
        joined
    } else {
        let cwd = std::env::current_dir().map_err(|source| ProfileError::DataDir {
            path: joined.clone(),
            source,
        })?;
        cwd.join(joined)
    };

    let dir = normalize(&absolute);
    let metadata = std::fs::metadata(&dir).map_err(|source| ProfileError::DataDir {
        path: dir.clone(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(ProfileError::NotADirectory { path: dir });
    }

    Ok(dir)
}

/// Lexically clean a path: drop `.`, fold `..`, strip trailing separators.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
