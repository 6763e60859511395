//! core::lock
//!
//! Exclusive per-command run lock for commands tagged `once`.
//!
//! # Architecture
//!
//! A run lock ensures only one invocation of a given command runs at a time
//! on this machine. The lock is an OS-level exclusive lock (`fs2`) on
//! `<lock_dir>/<command>.lock`, so it works across processes and is released
//! by the kernel if the holder dies.
//!
//! # Invariants
//!
//! - Lock acquisition is non-blocking (fails fast if held)
//! - Lock is held for the whole dispatch, including a worker pool's lifetime
//! - Lock is released on drop
//!
//! # Example
//!
//! ```no_run
//! use cmdtag::core::lock::RunLock;
//! use std::path::Path;
//!
//! let lock = RunLock::acquire(Path::new("/tmp/cmdtag"), "crontab:task1")?;
//! // ... run the handler ...
//! drop(lock);
//! # Ok::<(), cmdtag::core::lock::LockError>(())
//! ```

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("command '{command}' is already running")]
    AlreadyRunning { command: String },

    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// An exclusive lock on one command name.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    file: Option<File>,
}

impl RunLock {
    /// Attempt to acquire the run lock for `command` under `dir`.
    ///
    /// Creates `dir` if needed.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyRunning`] if another process holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(dir: &Path, command: &str) -> Result<Self, LockError> {
        fs::create_dir_all(dir).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", dir.display(), e))
        })?;

        let path = Self::lock_path(dir, command);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                file: Some(file),
            }),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                Err(LockError::AlreadyRunning {
                    command: command.to_string(),
                })
            }
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Path of the lock file for `command` under `dir`.
    ///
    /// ASCII letters, digits, `-` and `.` are kept; every other byte is
    /// written as `%XX`, so distinct commands never share a file.
    pub fn lock_path(dir: &Path, command: &str) -> PathBuf {
        let mut file = String::with_capacity(command.len());
        for byte in command.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'.' {
                file.push(char::from(byte));
            } else {
                file.push_str(&format!("%{byte:02X}"));
            }
        }
        dir.join(format!("{file}.lock"))
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock before the guard goes out of scope.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // Best-effort release on drop
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}
