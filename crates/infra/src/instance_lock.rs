//! Single-process lock on the correlation store
//!
//! Prevents two calmirror runs from interleaving writes to the same store.
//! The lock is an advisory OS file lock, so it disappears with the process
//! even after a crash.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use calmirror_domain::{CalMirrorError, Result};
use fs2::FileExt;

/// Exclusive lock held for the lifetime of the value
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Lock file guarding the database at `db_path`: `<db_path>.lock`.
    pub fn path_for(db_path: &Path) -> PathBuf {
        let mut name = db_path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Take the lock at `path` without waiting.
    ///
    /// Returns an error naming the holder's PID if another process has it.
    pub fn acquire<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                CalMirrorError::Database(format!(
                    "failed to create lock directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                CalMirrorError::Database(format!(
                    "failed to open lock file {}: {e}",
                    path.display()
                ))
            })?;

        if let Err(err) = file.try_lock_exclusive() {
            if err.kind() == fs2::lock_contended_error().kind() {
                let holder = fs::read_to_string(&path)
                    .ok()
                    .map(|pid| pid.trim().to_string())
                    .filter(|pid| !pid.is_empty());
                tracing::warn!(holder = holder.as_deref(), path = %path.display(), "instance_lock.contended");
                return Err(CalMirrorError::Database(match holder {
                    Some(pid) => format!(
                        "store is in use by another calmirror process (PID {pid}, lock {})",
                        path.display()
                    ),
                    None => format!(
                        "store is in use by another calmirror process (lock {})",
                        path.display()
                    ),
                }));
            }
            return Err(CalMirrorError::Database(format!(
                "failed to lock {}: {err}",
                path.display()
            )));
        }

        let pid = std::process::id();
        file.set_len(0)
            .and_then(|()| file.write_all(pid.to_string().as_bytes()))
            .and_then(|()| file.flush())
            .map_err(|e| CalMirrorError::Database(format!("failed to record lock holder: {e}")))?;

        tracing::info!(pid, path = %path.display(), "instance_lock.acquired");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.set_len(0) {
            tracing::debug!(error = %e, "instance_lock.clear_pid_failed");
        }
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(error = %e, path = %self.path.display(), "instance_lock.unlock_failed");
        } else {
            tracing::info!(path = %self.path.display(), "instance_lock.released");
        }
    }
}
