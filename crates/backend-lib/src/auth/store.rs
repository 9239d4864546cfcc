//! Storage seam for per-key attempt trackers.
//!
//! The rate limiter and the lockout tracker only need three things from their
//! backing store: an atomic read-modify-write of one key, a conditional bulk
//! delete, and a size. Anything offering per-key expiry and atomic updates
//! (an external key-value store, for instance) can sit behind this trait.
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::hash::Hash;

pub trait AttemptStore<K, V>: Send + Sync {
    /// Run `f` against the slot for `key` while holding it exclusively.
    ///
    /// Setting the slot to `None` deletes the entry.
    fn modify<R>(&self, key: &K, f: impl FnOnce(&mut Option<V>) -> R) -> R;

    /// Keep only entries for which `keep` returns true. Returns how many were removed.
    fn retain(&self, keep: impl FnMut(&K, &V) -> bool) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process store backed by a sharded concurrent map
#[derive(Debug)]
pub struct MemoryStore<K: Eq + Hash, V> {
    entries: DashMap<K, V>,
}

impl<K: Eq + Hash, V> Default for MemoryStore<K, V> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V> MemoryStore<K, V> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K, V> AttemptStore<K, V> for MemoryStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn modify<R>(&self, key: &K, f: impl FnOnce(&mut Option<V>) -> R) -> R {
        // The entry guard holds the shard lock for the whole update.
        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let mut slot = Some(occupied.get().clone());
                let out = f(&mut slot);
                match slot {
                    Some(value) => *occupied.get_mut() = value,
                    None => {
                        occupied.remove();
                    },
                }
                out
            },
            Entry::Vacant(vacant) => {
                let mut slot = None;
                let out = f(&mut slot);
                if let Some(value) = slot {
                    vacant.insert(value);
                }
                out
            },
        }
    }

    fn retain(&self, mut keep: impl FnMut(&K, &V) -> bool) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, value| {
            let kept = keep(key, value);
            if !kept {
                removed += 1;
            }
            kept
        });
        removed
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
