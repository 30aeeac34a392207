//! Exclusive run lock.
//!
//! Two runs sharing one checkpoint would skip and repeat recipients, so a run
//! holds a lock file for its whole duration. The file is created with
//! `create_new` and holds the owner's PID.

use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use mailrun_common::{internal, tracing};

use crate::error::{ProgressError, Result};

/// Held for as long as the value lives; the lock file is removed on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Take the lock at `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// [`ProgressError::Locked`] if the lock file already exists, or
    /// [`ProgressError::Io`] if it cannot be created.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(&path)
                    .map(|pid| pid.trim().to_string())
                    .unwrap_or_default();
                let holder = if holder.is_empty() {
                    "unknown".to_string()
                } else {
                    holder
                };
                return Err(ProgressError::Locked { path, holder });
            }
            Err(e) => return Err(e.into()),
        };

        stamp(file, &path)?;
        internal!(level = DEBUG, "Acquired run lock {}", path.display());

        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write our PID into a freshly created lock file. On failure the file is
/// removed again, since no `RunLock` exists yet to clean it up.
fn stamp(mut file: impl Write, path: &Path) -> Result<()> {
    if let Err(e) = writeln!(file, "{}", std::process::id()).and_then(|()| file.flush()) {
        drop(file);
        if let Err(cleanup) = fs::remove_file(path) {
            tracing::warn!(
                path = %path.display(),
                error = %cleanup,
                "Failed to remove half-written run lock"
            );
        }
        return Err(e.into());
    }
    Ok(())
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove run lock");
        }
    }
}
