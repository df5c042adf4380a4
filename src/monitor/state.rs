// Persisted last-known health state

use crate::error::WardenError;
use crate::monitor::HealthState;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Narrow store for the single health record of the monitored target.
#[cfg_attr(test, mockall::automock)]
pub trait StateStore: Send + Sync {
    /// Never fails: a missing or unreadable record is `Unknown`
    fn load(&self) -> HealthState;

    /// Replace the record; saving `Unknown` clears it
    fn save(&self, state: HealthState) -> Result<(), WardenError>;
}

/// State record kept as a one-token text file (`up` or `down`)
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persistence_error(&self, message: String) -> WardenError {
        WardenError::StatePersistence {
            path: self.path.display().to_string(),
            message,
        }
    }

    /// Write to a sibling temp file, then rename over the record
    fn write_atomic(&self, token: &str) -> Result<(), WardenError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| self.persistence_error(format!("create {}: {}", parent.display(), e)))?;
            }
        }

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut f = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)
                .map_err(|e| self.persistence_error(format!("open {}: {}", tmp_path.display(), e)))?;
            f.write_all(token.as_bytes())
                .and_then(|_| f.write_all(b"\n"))
                .map_err(|e| self.persistence_error(format!("write {}: {}", tmp_path.display(), e)))?;
            if let Err(e) = f.sync_all() {
                tracing::debug!("fsync {} failed: {}", tmp_path.display(), e);
            }
        }

        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            self.persistence_error(format!("rename {}: {}", tmp_path.display(), e))
        })?;

        if let Some(parent) = self.path.parent() {
            let parent = if parent.as_os_str().is_empty() { Path::new(".") } else { parent };
            if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
                tracing::debug!("fsync {} failed: {}", parent.display(), e);
            }
        }
        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> HealthState {
        match fs::read_to_string(&self.path) {
            Ok(contents) => match HealthState::from_token(&contents) {
                Some(state) => state,
                None => {
                    tracing::warn!(
                        "Unrecognized state record {:?} in {}, treating as unknown",
                        contents.trim(),
                        self.path.display()
                    );
                    HealthState::Unknown
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => HealthState::Unknown,
            Err(e) => {
                tracing::warn!("Failed to read state from {}: {}", self.path.display(), e);
                HealthState::Unknown
            }
        }
    }

    fn save(&self, state: HealthState) -> Result<(), WardenError> {
        match state.as_token() {
            Some(token) => self.write_atomic(token),
            None => match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(self.persistence_error(format!("remove: {}", e))),
            },
        }
    }
}
