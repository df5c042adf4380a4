// Cross-process run lock so a component never overlaps itself

use crate::error::WardenError;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Held for the duration of one cycle; the lock file is removed on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Try to take `<dir>/<name>.lock`.
    ///
    /// Returns `Ok(None)` when a live hostwarden process already holds it.
    /// A lock that is unreadable, holds no PID, or names a process that is
    /// gone or is some other program is reclaimed.
    pub fn acquire(dir: &Path, name: &str) -> Result<Option<Self>, WardenError> {
        fs::create_dir_all(dir)
            .map_err(|e| WardenError::Lock(format!("create {}: {}", dir.display(), e)))?;
        let path = dir.join(format!("{}.lock", name));

        // Second pass only happens after removing a stale lock
        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    record_owner(file, &path)?;
                    tracing::debug!("Acquired lock {}", path.display());
                    return Ok(Some(Self { path }));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if let Some(pid) = holder(&path) {
                        tracing::debug!("Lock {} held by PID {}", path.display(), pid);
                        return Ok(None);
                    }
                    tracing::warn!("Reclaiming stale lock {}", path.display());
                    match fs::remove_file(&path) {
                        Ok(()) => continue,
                        Err(e) if e.kind() == ErrorKind::NotFound => continue,
                        Err(e) => {
                            return Err(WardenError::Lock(format!("remove stale {}: {}", path.display(), e)))
                        }
                    }
                }
                Err(e) => return Err(WardenError::Lock(format!("create {}: {}", path.display(), e))),
            }
        }

        Ok(None)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

/// Write our PID into a freshly created lock file. An empty lock must not
/// be left behind, so the file is removed if the write fails.
fn record_owner<W: Write>(mut out: W, path: &Path) -> Result<(), WardenError> {
    let written = writeln!(out, "{}", std::process::id()).and_then(|_| out.flush());
    if let Err(e) = written {
        if let Err(remove) = fs::remove_file(path) {
            tracing::warn!("Failed to remove unwritten lock {}: {}", path.display(), remove);
        }
        return Err(WardenError::Lock(format!("write {}: {}", path.display(), e)));
    }
    Ok(())
}

/// PID of the live hostwarden process holding `path`, if any.
fn holder(path: &Path) -> Option<u32> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::debug!("Unreadable lock {}: {}", path.display(), e);
            return None;
        }
    };
    let pid = match contents.trim().parse::<u32>() {
        Ok(pid) => pid,
        Err(_) => {
            tracing::debug!("Lock {} holds no PID: {:?}", path.display(), contents.trim());
            return None;
        }
    };
    is_hostwarden_process(pid).then_some(pid)
}

/// Checks `/proc/<pid>/cmdline` so a PID reused by another program does not
/// keep the lock held.
#[cfg(target_os = "linux")]
fn is_hostwarden_process(pid: u32) -> bool {
    let Ok(cmdline) = fs::read(format!("/proc/{}/cmdline", pid)) else {
        return false;
    };
    let cmdline = String::from_utf8_lossy(&cmdline);
    if cmdline.contains(env!("CARGO_PKG_NAME")) {
        return true;
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.file_name().map(|name| name.to_string_lossy().into_owned()))
        .is_some_and(|name| cmdline.contains(&name))
}

#[cfg(not(target_os = "linux"))]
fn is_hostwarden_process(_pid: u32) -> bool {
    // No cheap way to inspect the owner; assume it is still running
    true
}
