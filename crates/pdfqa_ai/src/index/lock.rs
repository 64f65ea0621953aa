use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use pdfqa_core::error::AppError;
use serde::{Deserialize, Serialize};
use sysinfo::{Pid, System};

/// What the lock file at an index location says about its holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum LockStatus {
    Unlocked,
    /// `pid` is `None` when the file could not be read or parsed.
    Held { pid: Option<u32> },
    /// The recorded holder is no longer running.
    Stale { pid: u32 },
}

/// Advisory write lock on an index location.
///
/// Backed by a lock file created with `create_new` that records the
/// holder's pid. The file is removed when the guard is dropped. A lock
/// whose holder has exited is reclaimed by the next writer and ignored by
/// readers.
#[derive(Debug)]
pub struct IndexLock {
    path: PathBuf,
}

impl IndexLock {
    pub(crate) fn acquire(path: PathBuf) -> Result<Self, AppError> {
        match create_lock_file(&path) {
            Ok(file) => Ok(Self::record_holder(path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => match inspect(&path) {
                LockStatus::Stale { pid } => {
                    tracing::warn!(path = %path.display(), pid, "reclaiming stale index lock");
                    remove_stale(&path)?;
                    match create_lock_file(&path) {
                        Ok(file) => Ok(Self::record_holder(path, file)),
                        Err(e) => Err(create_failed(&path, e)),
                    }
                }
                _ => Err(locked(&path)),
            },
            Err(e) => Err(create_failed(&path, e)),
        }
    }

    fn record_holder(path: PathBuf, mut file: File) -> Self {
        if let Err(e) = writeln!(file, "pid={}", std::process::id()) {
            tracing::debug!(path = %path.display(), error = %e, "failed to record lock holder");
        }
        tracing::debug!(path = %path.display(), "acquired index lock");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "released index lock"),
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to release index lock"
            ),
        }
    }
}

/// Classify the lock file at `path` without touching it.
pub(crate) fn inspect(path: &Path) -> LockStatus {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return LockStatus::Unlocked,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "unreadable index lock");
            return LockStatus::Held { pid: None };
        }
    };
    // An empty file may belong to a holder that has not written its pid yet.
    match parse_holder(&raw) {
        Some(pid) if pid != std::process::id() && !process_alive(pid) => LockStatus::Stale { pid },
        pid => LockStatus::Held { pid },
    }
}

fn parse_holder(raw: &str) -> Option<u32> {
    raw.lines()
        .find_map(|line| line.trim().strip_prefix("pid="))
        .and_then(|pid| pid.trim().parse().ok())
}

fn process_alive(pid: u32) -> bool {
    let mut sys = System::new();
    sys.refresh_process(Pid::from_u32(pid))
}

fn create_lock_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

fn remove_stale(path: &Path) -> Result<(), AppError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        // Another writer reclaimed it first.
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AppError::new("INDEX_WRITE_FAILED", "Failed to remove stale index lock")
            .with_details(format!("path={}; err={}", path.display(), e))),
    }
}

fn locked(path: &Path) -> AppError {
    AppError::new("INDEX_LOCKED", "Index is locked by another ingestion")
        .with_details(format!("lock={}", path.display()))
        .with_retryable(true)
}

fn create_failed(path: &Path, e: io::Error) -> AppError {
    if e.kind() == ErrorKind::AlreadyExists {
        return locked(path);
    }
    AppError::new("INDEX_WRITE_FAILED", "Failed to create index lock")
        .with_details(format!("path={}; err={}", path.display(), e))
}
