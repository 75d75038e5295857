//! Keyed store implementations.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::key::{CacheKey, EntityType};

/// Type-erased value stored against a key.
#[derive(Clone)]
pub struct CacheEntry(Arc<dyn Any + Send + Sync>);

impl CacheEntry {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Typed view of the value; `None` if it was stored as another type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast::<T>().ok()
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CacheEntry(..)")
    }
}

/// Concurrent key/value store shared by every service in the process.
///
/// All operations are total: a missing key reads as `None`, evicting a
/// missing key is a no-op. Implementations synchronize internally; callers
/// never lock.
pub trait KeyedStore: Send + Sync {
    fn get_entry(&self, key: &CacheKey) -> Option<CacheEntry>;

    /// Unconditional overwrite.
    fn put_entry(&self, key: CacheKey, entry: CacheEntry);

    fn evict(&self, key: &CacheKey);

    /// Remove every listing and query entry of `entity_type`.
    ///
    /// Single-item keys are left alone; writers evict those individually.
    /// Returns the number of removed entries.
    fn evict_by_type(&self, entity_type: EntityType) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry, task status records included.
    fn clear(&self);

    /// Typed read. A value stored under another type reads as not found.
    fn get<T: Any + Send + Sync>(&self, key: &CacheKey) -> Option<Arc<T>>
    where
        Self: Sized,
    {
        let entry = self.get_entry(key)?;
        let value = entry.downcast::<T>();
        if value.is_none() {
            debug!(key = %key, "cached value has unexpected type; treating as miss");
        }
        value
    }

    fn put<T: Any + Send + Sync>(&self, key: CacheKey, value: T)
    where
        Self: Sized,
    {
        self.put_entry(key, CacheEntry::new(value));
    }
}

impl<S> KeyedStore for Arc<S>
where
    S: KeyedStore + ?Sized,
{
    fn get_entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        (**self).get_entry(key)
    }

    fn put_entry(&self, key: CacheKey, entry: CacheEntry) {
        (**self).put_entry(key, entry)
    }

    fn evict(&self, key: &CacheKey) {
        (**self).evict(key)
    }

    fn evict_by_type(&self, entity_type: EntityType) -> usize {
        (**self).evict_by_type(entity_type)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn clear(&self) {
        (**self).clear()
    }
}

/// Unbounded in-process store.
///
/// No TTL and no size bound: entries live until evicted or the process ends.
/// A hardened deployment would put a size or age limit in front of this.
#[derive(Debug, Default)]
pub struct InMemoryKeyedStore {
    inner: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl InMemoryKeyedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

// A panic while holding the lock cannot leave the map half-updated (every
// mutation is a single HashMap call), so poisoned guards are recovered.
impl KeyedStore for InMemoryKeyedStore {
    fn get_entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(key).cloned()
    }

    fn put_entry(&self, key: CacheKey, entry: CacheEntry) {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(key, entry);
    }

    fn evict(&self, key: &CacheKey) {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.remove(key);
    }

    fn evict_by_type(&self, entity_type: EntityType) -> usize {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = map.len();
        map.retain(|key, _| !key.is_bulk_of(entity_type));
        let removed = before - map.len();
        debug!(entity = %entity_type, removed, "evicted listing and query entries");
        removed
    }

    fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn clear(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
