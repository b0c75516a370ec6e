//! Per-key async mutexes
//!
//! Serializes work on one logical key (a wallet, a listing, ...) while
//! unrelated keys proceed in parallel. Guards are owned so they can be held
//! inside a transaction object across `.await` points.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug)]
pub struct KeyedLocks<K>
where
    K: Eq + Hash,
{
    slots: DashMap<K, Arc<Mutex<()>>>,
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        // clone the Arc out so the shard lock is released before awaiting
        let slot = self.slots.entry(key).or_default().value().clone();
        slot.lock_owned().await
    }

    /// Drop slots nobody holds or waits on.
    pub fn prune(&self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        before.saturating_sub(self.slots.len())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
