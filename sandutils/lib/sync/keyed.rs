//! A table of mutexes keyed by resource identity.

use std::{
    collections::HashMap,
    fmt,
    hash::Hash,
    sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard},
};

use tokio::sync::{Mutex, OwnedMutexGuard};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

type LockTable<K> = StdMutex<HashMap<K, Arc<Mutex<()>>>>;

/// Serializes work per key while letting different keys proceed in parallel.
///
/// Entries are created on first use and removed again once no holder or waiter references them,
/// so the table only ever contains keys that are currently contended or held. A waiter that is
/// dropped before it acquires its key can leave an unused entry behind; such entries are pruned
/// on the next call to [`lock`](KeyedLocks::lock) or [`active`](KeyedLocks::active).
pub struct KeyedLocks<K> {
    table: Arc<LockTable<K>>,
}

/// Exclusive access to one key of a [`KeyedLocks`] table. Released on drop.
pub struct KeyedGuard<K>
where
    K: Eq + Hash,
{
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<LockTable<K>>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self {
            table: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    /// Waits for exclusive access to `key`.
    pub async fn lock(&self, key: &K) -> KeyedGuard<K> {
        let mutex = {
            let mut table = lock_table(&self.table);
            prune(&mut table);
            Arc::clone(
                table
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };

        let guard = mutex.lock_owned().await;

        KeyedGuard {
            key: key.clone(),
            guard: Some(guard),
            table: Arc::clone(&self.table),
        }
    }

    /// Returns the number of keys currently held or waited on.
    pub fn active(&self) -> usize {
        let mut table = lock_table(&self.table);
        prune(&mut table);
        table.len()
    }
}

impl<K> KeyedGuard<K>
where
    K: Eq + Hash,
{
    /// The key this guard holds.
    pub fn key(&self) -> &K {
        &self.key
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn lock_table<K>(table: &LockTable<K>) -> StdMutexGuard<'_, HashMap<K, Arc<Mutex<()>>>> {
    // The table is only mutated by short insert/remove sections that cannot leave it torn.
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Drops entries only the table itself references.
fn prune<K>(table: &mut HashMap<K, Arc<Mutex<()>>>) {
    table.retain(|_, mutex| Arc::strong_count(mutex) > 1);
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for KeyedLocks<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active = self
            .table
            .lock()
            .map(|table| table.len())
            .unwrap_or_default();
        f.debug_struct("KeyedLocks").field("active", &active).finish()
    }
}

impl<K> fmt::Debug for KeyedGuard<K>
where
    K: Eq + Hash + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedGuard").field("key", &self.key).finish()
    }
}

impl<K> Drop for KeyedGuard<K>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        let mut table = lock_table(&self.table);

        // Unlock while holding the table so no waiter can clone the entry in between.
        drop(self.guard.take());

        let unused = table
            .get(&self.key)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1);
        if unused {
            table.remove(&self.key);
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
