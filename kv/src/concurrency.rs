//! Concurrency primitives (spec §4.9/§5, component C9): the global
//! execution lock every command acquires, and a scoped "suspend the lock"
//! guard for the rare operation (secondary-store I/O, `DEBUG SLEEP`) that
//! must block without starving every other connection.
//!
//! Grounded on microredis's `db/mod.rs`, which reaches for
//! `parking_lot::Mutex`/`RwLock` over `std::sync` for the same
//! single-writer/many-reader shape this engine needs.

use parking_lot::{Mutex, MutexGuard};

/// Serializes command execution the way a single-threaded command loop
/// would, without actually requiring a single OS thread: any number of
/// connection-handling tasks can call [`ExecutionLock::acquire`], but only
/// one command body runs at a time (spec §5 "single-writer cooperative
/// scheduling"). Generic over `T` because the thing guarded is the whole
/// [`crate::keyspace::Keyspace`] (every logical database), not just one.
pub struct ExecutionLock<T> {
    inner: Mutex<T>,
}

impl<T> ExecutionLock<T> {
    pub fn new(value: T) -> Self {
        ExecutionLock { inner: Mutex::new(value) }
    }

    /// Acquires exclusive access for the duration of one command's
    /// execution.
    pub fn acquire(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }

    pub fn try_acquire(&self) -> Option<MutexGuard<'_, T>> {
        self.inner.try_lock()
    }
}

/// Runs `f` with the execution lock released, re-acquiring it before
/// returning (spec §4.9 "scoped execute without global lock" primitive).
/// Used around secondary-store I/O and other blocking calls that must not
/// stall every other connection waiting on the same lock.
pub fn without_lock<T, R, F>(guard: &mut MutexGuard<'_, T>, f: F) -> R
where
    F: FnOnce() -> R,
{
    MutexGuard::unlocked(guard, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use crate::keyspace::db::Database;
    use crate::keyspace::entry::{AccessMeta, Entry};
    use crate::value::Value;

    #[test]
    fn acquire_gives_exclusive_access() {
        let lock = ExecutionLock::new(Database::new());
        let mut guard = lock.acquire();
        guard.set(Bytes::from("k"), Entry::new(Value::from_str("v"), AccessMeta::new_lru(0)));
        assert_eq!(guard.db_size(), 1);
    }

    #[test]
    fn try_acquire_fails_while_held() {
        let lock = ExecutionLock::new(Database::new());
        let _guard = lock.acquire();
        assert!(lock.try_acquire().is_none());
    }

    #[test]
    fn without_lock_releases_for_the_closure_duration() {
        let lock = ExecutionLock::new(Database::new());
        let mut guard = lock.acquire();
        let observed_unlocked = without_lock(&mut guard, || lock.try_acquire().is_some());
        assert!(observed_unlocked);
        guard.set(Bytes::from("k"), Entry::new(Value::from_str("v"), AccessMeta::new_lru(0)));
        assert_eq!(guard.db_size(), 1);
    }
}
