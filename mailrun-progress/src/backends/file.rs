use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use mailrun_common::{internal, tracing};
use tokio::{fs, io::AsyncWriteExt};

use crate::{
    error::{ProgressError, Result},
    store::ProgressStore,
};

/// Checkpoint kept as a decimal integer in a text file.
///
/// Writes go to `.tmp_<name>` next to the target, are synced, and then
/// renamed over it, so a crash leaves either the old or the new value and
/// never a torn one.
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    path: PathBuf,
}

impl FileProgressStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| "progress".into(), |n| n.to_string_lossy());
        self.path.with_file_name(format!(".tmp_{name}"))
    }

    fn persistence(&self, e: &std::io::Error) -> ProgressError {
        ProgressError::Persistence(format!("{}: {e}", self.path.display()))
    }
}

#[async_trait]
impl ProgressStore for FileProgressStore {
    async fn read(&self) -> usize {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                internal!(
                    level = DEBUG,
                    "No progress at {}, starting from 0",
                    self.path.display()
                );
                return 0;
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Unreadable progress, starting from 0");
                return 0;
            }
        };

        let value = contents.trim();
        if value.is_empty() {
            return 0;
        }

        value.parse().unwrap_or_else(|_| {
            tracing::warn!(
                path = %self.path.display(),
                value,
                "Corrupt progress value, starting from 0"
            );
            0
        })
    }

    async fn write(&self, next_index: usize) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.persistence(&e))?;
        }

        let temp = self.temp_path();
        let mut file = fs::File::create(&temp)
            .await
            .map_err(|e| self.persistence(&e))?;
        file.write_all(format!("{next_index}\n").as_bytes())
            .await
            .map_err(|e| self.persistence(&e))?;
        file.sync_all().await.map_err(|e| self.persistence(&e))?;
        drop(file);

        fs::rename(&temp, &self.path)
            .await
            .map_err(|e| self.persistence(&e))?;

        internal!(level = TRACE, "Progress {next_index} written to {}", self.path.display());

        Ok(())
    }
}
