use parking_lot::{Mutex, MutexGuard};
use tracing::trace;

/// Expands to a `"file:line"` tag naming the call site that takes the lock.
#[macro_export]
macro_rules! right_here {
    () => {
        concat!(file!(), ":", line!())
    };
}

/// Serializes every mutation of the shared pattern data.
///
/// Only control-path threads take this lock. It is not recursive and never
/// times out; a second acquire on the same thread deadlocks.
#[derive(Default)]
pub struct EngineLock {
    inner: Mutex<()>,
    holder: Mutex<Option<&'static str>>,
}

impl EngineLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the lock is free. The lock is released when the
    /// returned guard goes out of scope.
    pub fn acquire(&self, tag: &'static str) -> EngineGuard<'_> {
        let guard = self.inner.lock();
        *self.holder.lock() = Some(tag);
        trace!(tag, "engine lock acquired");
        EngineGuard {
            lock: self,
            tag,
            _guard: guard,
        }
    }

    /// Tag of the current holder, if any.
    pub fn holder(&self) -> Option<&'static str> {
        *self.holder.lock()
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

pub struct EngineGuard<'a> {
    lock: &'a EngineLock,
    tag: &'static str,
    _guard: MutexGuard<'a, ()>,
}

impl EngineGuard<'_> {
    pub fn tag(&self) -> &'static str {
        self.tag
    }
}

impl Drop for EngineGuard<'_> {
    fn drop(&mut self) {
        *self.lock.holder.lock() = None;
        trace!(tag = self.tag, "engine lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn guard_releases_on_drop() {
        let lock = EngineLock::new();
        {
            let guard = lock.acquire(right_here!());
            assert!(lock.is_locked());
            assert_eq!(lock.holder(), Some(guard.tag()));
            assert!(guard.tag().contains("lock.rs:"));
        }
        assert!(!lock.is_locked());
        assert_eq!(lock.holder(), None);
    }

    #[test]
    fn released_on_early_return() {
        fn fails(lock: &EngineLock) -> Result<(), ()> {
            let _guard = lock.acquire("fails");
            let step: Result<(), ()> = Err(());
            step?;
            Ok(())
        }
        let lock = EngineLock::new();
        assert!(fails(&lock).is_err());
        assert!(!lock.is_locked());
    }

    #[test]
    fn serializes_writers() {
        let lock = Arc::new(EngineLock::new());
        let count = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lock = lock.clone();
                let count = count.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let _guard = lock.acquire("writer");
                        // read-modify-write only holds up under the lock
                        let n = count.load(Ordering::Relaxed);
                        count.store(n + 1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(count.load(Ordering::Relaxed), 4000);
    }
}
