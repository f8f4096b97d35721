//! Cross-process lock guarding the repository index.
//!
//! The lock is an OS advisory lock on a sibling `.lock` file, so it excludes
//! other processes sharing the index as well as other threads here.

use std::fs::{File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::EngineError;

/// How long to wait for the lock and how often to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Cancellation signal shared between a caller and a running operation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (flag, signal) = &*self.inner;
        *flag.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = true;
        signal.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self
            .inner
            .0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sleep for `duration`, waking early on cancellation.
    /// Returns `true` if cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let (flag, signal) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let (guard, _) = signal
            .wait_timeout_while(guard, duration, |cancelled| !*cancelled)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard
    }
}

/// `repositories.yaml` -> `repositories.lock`.
pub fn lock_path_for(index_path: &Path) -> PathBuf {
    index_path.with_extension("lock")
}

/// Held exclusive lock. Released when dropped.
#[derive(Debug)]
pub struct IndexLock {
    file: File,
    path: PathBuf,
}

impl IndexLock {
    pub fn acquire(
        path: &Path,
        policy: &LockPolicy,
        cancel: &CancelToken,
    ) -> Result<Self, EngineError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| {
                EngineError::internal(format!("open lock file {}", path.display()), e)
            })?;

        let started = Instant::now();
        loop {
            match file.try_lock() {
                Ok(()) => {
                    debug!(lock = %path.display(), waited_ms = started.elapsed().as_millis() as u64, "acquired index lock");
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(TryLockError::WouldBlock) => {}
                Err(TryLockError::Error(e)) => {
                    return Err(EngineError::internal(
                        format!("lock {}", path.display()),
                        e,
                    ));
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= policy.timeout {
                return Err(EngineError::LockTimeout {
                    path: path.to_path_buf(),
                    waited: elapsed,
                });
            }

            let nap = policy.poll_interval.min(policy.timeout - elapsed);
            if cancel.sleep(nap) {
                return Err(EngineError::Cancelled(format!(
                    "waiting for lock {}",
                    path.display()
                )));
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(lock = %self.path.display(), error = %e, "failed to release index lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn quick_policy() -> LockPolicy {
        LockPolicy {
            timeout: Duration::from_millis(300),
            poll_interval: Duration::from_millis(50),
        }
    }

    #[test]
    fn test_lock_path_replaces_extension() {
        assert_eq!(
            lock_path_for(Path::new("/etc/keel/repositories.yaml")),
            PathBuf::from("/etc/keel/repositories.lock")
        );
        assert_eq!(
            lock_path_for(Path::new("/etc/keel/repositories")),
            PathBuf::from("/etc/keel/repositories.lock")
        );
    }

    #[test]
    fn test_second_acquire_times_out_while_held() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("repositories.lock");
        let cancel = CancelToken::new();

        let held = IndexLock::acquire(&path, &quick_policy(), &cancel).unwrap();
        let err = IndexLock::acquire(&path, &quick_policy(), &cancel).unwrap_err();
        assert!(matches!(err, EngineError::LockTimeout { .. }));

        drop(held);
        assert!(IndexLock::acquire(&path, &quick_policy(), &cancel).is_ok());
    }

    #[test]
    fn test_cancelled_wait_returns_promptly() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("repositories.lock");
        let policy = LockPolicy {
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
        };

        let _held = IndexLock::acquire(&path, &policy, &CancelToken::new()).unwrap();

        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            remote.cancel();
        });

        let started = Instant::now();
        let err = IndexLock::acquire(&path, &policy, &cancel).unwrap_err();
        canceller.join().unwrap();

        assert!(matches!(err, EngineError::Cancelled(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_cancel_token_sleep_reports_state() {
        let token = CancelToken::new();
        assert!(!token.sleep(Duration::from_millis(10)));
        token.cancel();
        assert!(token.is_cancelled());
        assert!(token.sleep(Duration::from_secs(10)));
    }
}
