//! Per-object access guards.
//!
//! [`Guards`] maps object keys to a shared read/write lock plus a reference
//! count. Entries are created on first [`enter`](Guards::enter) and removed
//! once the last [`GuardHandle`] for the key is dropped, so no lock is
//! pre-allocated per possible id and none outlive their users.
//!
//! The registry mutex is only held while entering or exiting; the per-key
//! lock is what requests hold for their whole duration.
//!
//! # Example
//!
//! ```
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! use provision_engine::guard::Guards;
//!
//! let guards = Guards::new();
//! let handle = guards.enter("0/default/vm0");
//! assert_eq!(guards.count("0/default/vm0"), 1);
//!
//! {
//!     let _write = handle.lock().await;
//! }
//! // the same handle can be locked again before exiting
//! {
//!     let _read = handle.read().await;
//! }
//!
//! handle.exit();
//! assert!(guards.is_empty());
//! # });
//! ```

use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{
    OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

/// Registry entry for a single key.
struct Entry {
    lock: Arc<RwLock<()>>,
    count: usize,
}

/// Reference-counted registry of per-key read/write locks.
#[derive(Clone, Default)]
pub struct Guards {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl core::fmt::Debug for Guards {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Guards")
            .field("active", &self.len())
            .finish()
    }
}

impl Guards {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in `key` and returns a handle to its lock.
    pub fn enter(&self, key: impl Into<String>) -> GuardHandle {
        let key = key.into();
        let mut entries = self.entries.lock();
        let entry = entries.entry(key.clone()).or_insert_with(|| Entry {
            lock: Arc::default(),
            count: 0,
        });
        entry.count += 1;

        GuardHandle {
            lock: Arc::clone(&entry.lock),
            key,
            guards: self.clone(),
        }
    }

    /// Returns the number of keys currently registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns whether no key is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns the number of live handles for `key`.
    #[must_use]
    pub fn count(&self, key: &str) -> usize {
        self.entries.lock().get(key).map_or(0, |entry| entry.count)
    }

    fn exit(&self, key: &str) {
        let mut entries = self.entries.lock();
        let released = match entries.get_mut(key) {
            Some(entry) => {
                entry.count -= 1;
                entry.count == 0
            }
            None => false,
        };
        if released {
            entries.remove(key);
        }
    }

    /// Locks every key in `wanted` in ascending key order.
    ///
    /// Duplicate keys are merged, keeping the strongest mode. Acquiring in a
    /// fixed order means two requests touching the same keys can never wait
    /// on each other in a cycle.
    pub(crate) async fn acquire(&self, mut wanted: Vec<(String, LockMode)>) -> GuardSet {
        wanted.sort_by(|a, b| a.0.cmp(&b.0));
        wanted.dedup_by(|next, prev| {
            if next.0 == prev.0 {
                prev.1 = prev.1.max(next.1);
                true
            } else {
                false
            }
        });

        let mut held = Vec::with_capacity(wanted.len());
        for (key, mode) in wanted {
            tracing::trace!(key = %key, ?mode, "acquiring guard");
            held.push(self.enter(key).hold(mode).await);
        }
        GuardSet { held }
    }
}

/// A counted reference to the lock of one key.
///
/// Dropping the handle (or calling [`exit`](Self::exit)) releases the
/// reference. Lock guards borrow the handle, so a key can never be exited
/// while it is still locked through it.
pub struct GuardHandle {
    key: String,
    lock: Arc<RwLock<()>>,
    guards: Guards,
}

impl core::fmt::Debug for GuardHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GuardHandle").field("key", &self.key).finish()
    }
}

impl GuardHandle {
    /// Returns the key this handle refers to.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Waits for exclusive access. Unlocks when the returned guard drops.
    pub async fn lock(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write().await
    }

    /// Waits for shared access. Unlocks when the returned guard drops.
    pub async fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read().await
    }

    /// Releases this reference to the key.
    pub fn exit(self) {}

    async fn hold(self, mode: LockMode) -> HeldGuard {
        let access = match mode {
            LockMode::Read => Access::Read(Arc::clone(&self.lock).read_owned().await),
            LockMode::Write => Access::Write(Arc::clone(&self.lock).write_owned().await),
        };
        HeldGuard {
            _access: access,
            _handle: self,
        }
    }
}

impl Drop for GuardHandle {
    fn drop(&mut self) {
        self.guards.exit(&self.key);
    }
}

/// How a key is locked for the duration of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum LockMode {
    Read,
    Write,
}

enum Access {
    Read(OwnedRwLockReadGuard<()>),
    Write(OwnedRwLockWriteGuard<()>),
}

/// A locked key. The lock is released before the handle exits.
struct HeldGuard {
    _access: Access,
    _handle: GuardHandle,
}

/// Keys locked by one request, released in reverse acquisition order.
pub(crate) struct GuardSet {
    held: Vec<HeldGuard>,
}

impl GuardSet {
    pub(crate) fn len(&self) -> usize {
        self.held.len()
    }
}

impl Drop for GuardSet {
    fn drop(&mut self) {
        while let Some(guard) = self.held.pop() {
            drop(guard);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn entries_are_reference_counted() {
        let guards = Guards::new();
        let a = guards.enter("vm0");
        let b = guards.enter("vm0");
        assert_eq!(guards.count("vm0"), 2);
        assert_eq!(guards.len(), 1);

        a.exit();
        assert_eq!(guards.count("vm0"), 1);

        drop(b);
        assert_eq!(guards.count("vm0"), 0);
        assert!(guards.is_empty());
    }

    #[tokio::test]
    async fn handle_is_reentrant() {
        let guards = Guards::new();
        let handle = guards.enter("vm0");

        for _ in 0..3 {
            let _write = handle.lock().await;
        }
        let _first = handle.read().await;
        let _second = handle.read().await;
    }

    #[tokio::test]
    async fn write_excludes_other_handles() {
        let guards = Guards::new();
        let first = guards.enter("vm0");
        let second = guards.enter("vm0");

        let write = first.lock().await;
        assert!(
            timeout(Duration::from_millis(20), second.read())
                .await
                .is_err(),
            "read should wait for the writer"
        );

        drop(write);
        let _read = timeout(Duration::from_millis(200), second.read())
            .await
            .expect("read should proceed once the writer unlocks");
    }

    #[tokio::test]
    async fn disjoint_keys_do_not_block() {
        let guards = Guards::new();
        let vm = guards.enter("vm0");
        let disk = guards.enter("disk0");

        let _vm = vm.lock().await;
        let _disk = timeout(Duration::from_millis(200), disk.lock())
            .await
            .expect("different keys never contend");
    }

    #[tokio::test]
    async fn acquire_merges_duplicates_and_cleans_up() {
        let guards = Guards::new();
        let set = guards
            .acquire(vec![
                ("vm0".into(), LockMode::Read),
                ("disk0".into(), LockMode::Write),
                ("vm0".into(), LockMode::Write),
            ])
            .await;
        assert_eq!(set.len(), 2);
        assert_eq!(guards.count("vm0"), 1);

        // vm0 was upgraded to a write lock
        let probe = guards.enter("vm0");
        assert!(
            timeout(Duration::from_millis(20), probe.read())
                .await
                .is_err()
        );
        drop(probe);

        drop(set);
        assert!(guards.is_empty());
    }
}
