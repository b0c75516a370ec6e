//! TTL Store
//!
//! A concurrent key/value arena where every entry carries an absolute
//! expiry. Reads and read-modify-write happen under the shard lock of the
//! key, so two callers touching the same key never interleave.
//!
//! Expiry is lazy: an expired entry is treated as absent by every accessor
//! and physically removed by [`TtlStore::sweep_expired`].

use std::hash::Hash;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// A stored value with its absolute expiry (unix millis).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlEntry<V> {
    pub value: V,
    pub expires_at_ms: i64,
}

impl<V> TtlEntry<V> {
    pub fn new(value: V, expires_at_ms: i64) -> Self {
        Self {
            value,
            expires_at_ms,
        }
    }

    /// An entry is still live at exactly `expires_at_ms`.
    #[inline]
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms < now_ms
    }
}

/// What to do with an entry after [`TtlStore::modify`] inspected it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    Keep,
    Discard,
}

#[derive(Debug)]
pub struct TtlStore<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, TtlEntry<V>>,
}

impl<K, V> Default for TtlStore<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<K, V> TtlStore<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite.
    pub fn insert(&self, key: K, value: V, expires_at_ms: i64) {
        self.entries.insert(key, TtlEntry::new(value, expires_at_ms));
    }

    /// Clone of the live entry, if any.
    pub fn get(&self, key: &K, now_ms: i64) -> Option<TtlEntry<V>>
    where
        V: Clone,
    {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now_ms))
            .map(|entry| entry.value().clone())
    }

    pub fn remove(&self, key: &K) -> Option<TtlEntry<V>> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    /// Atomically get-or-reset an entry and mutate it.
    ///
    /// A missing or expired entry is replaced by `fresh()` before `update`
    /// runs, all under one shard lock.
    pub fn upsert<R>(
        &self,
        key: K,
        now_ms: i64,
        fresh: impl FnOnce() -> TtlEntry<V>,
        update: impl FnOnce(&mut TtlEntry<V>) -> R,
    ) -> R {
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now_ms) {
                    occupied.insert(fresh());
                }
                update(occupied.get_mut())
            }
            Entry::Vacant(vacant) => {
                let mut slot = vacant.insert(fresh());
                update(slot.value_mut())
            }
        }
    }

    /// Atomically inspect an existing entry, optionally discarding it.
    ///
    /// Expired entries are handed to `f` as well, so the caller can tell
    /// "expired" apart from "never existed". Returns `None` when the key is
    /// absent.
    pub fn modify<R>(
        &self,
        key: &K,
        f: impl FnOnce(&mut TtlEntry<V>) -> (R, Retention),
    ) -> Option<R> {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let (result, retention) = f(occupied.get_mut());
                if retention == Retention::Discard {
                    occupied.remove();
                }
                Some(result)
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Remove every expired entry and return how many were dropped.
    pub fn sweep_expired(&self, now_ms: i64) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired(now_ms);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Entry count including not-yet-swept expired entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_hides_expired_entries() {
        let store: TtlStore<String, u32> = TtlStore::new();
        store.insert("k".into(), 7, 1_000);

        assert_eq!(store.get(&"k".into(), 1_000).map(|e| e.value), Some(7));
        assert!(store.get(&"k".into(), 1_001).is_none());
        // still physically present until swept
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_upsert_resets_expired_entry() {
        let store: TtlStore<&'static str, u32> = TtlStore::new();
        let bump = |store: &TtlStore<&'static str, u32>, now| {
            store.upsert(
                "ip",
                now,
                || TtlEntry::new(0, now + 100),
                |entry| {
                    entry.value += 1;
                    entry.value
                },
            )
        };

        assert_eq!(bump(&store, 0), 1);
        assert_eq!(bump(&store, 50), 2);
        assert_eq!(bump(&store, 101), 1);
    }

    #[test]
    fn test_modify_can_discard() {
        let store: TtlStore<u8, &'static str> = TtlStore::new();
        store.insert(1, "once", 10);

        let seen = store.modify(&1, |entry| (entry.value, Retention::Discard));
        assert_eq!(seen, Some("once"));
        assert!(store.modify(&1, |entry| (entry.value, Retention::Keep)).is_none());
    }

    #[test]
    fn test_sweep_expired_counts_removed() {
        let store: TtlStore<u8, ()> = TtlStore::new();
        store.insert(1, (), 10);
        store.insert(2, (), 20);
        store.insert(3, (), 30);

        assert_eq!(store.sweep_expired(21), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.sweep_expired(21), 0);
    }
}
