//! Pluggable cross-process file locking.
//!
//! The store's mutex only serializes callers inside one process. Every
//! read-check-write also holds the injected [`FileLock`], so deployments that
//! run several processes against the same idempotency file inject a real
//! lock; the default is [`NoOpFileLock`].

use std::any::Any;
use std::fmt;
use std::io;
use std::path::Path;

/// Scoped lock guard; the lock is released when the guard is dropped.
pub struct FileLockGuard {
    inner: Option<Box<dyn Any + Send>>,
}

impl FileLockGuard {
    /// Guard that holds nothing.
    #[must_use]
    pub const fn noop() -> Self {
        Self { inner: None }
    }

    /// Guard that keeps `inner` alive until dropped.
    #[must_use]
    pub fn new<T: Send + 'static>(inner: T) -> Self {
        Self {
            inner: Some(Box::new(inner)),
        }
    }
}

impl fmt::Debug for FileLockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileLockGuard")
            .field("held", &self.inner.is_some())
            .finish()
    }
}

/// Strategy for locking a file across processes.
pub trait FileLock: Send + Sync + fmt::Debug {
    /// Block until `path` is locked for this caller.
    fn acquire(&self, path: &Path) -> io::Result<FileLockGuard>;
}

/// Lock that does nothing; suitable for a single process.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpFileLock;

impl FileLock for NoOpFileLock {
    fn acquire(&self, _path: &Path) -> io::Result<FileLockGuard> {
        Ok(FileLockGuard::noop())
    }
}
