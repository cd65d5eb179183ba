//! Video fingerprint caching.
//!
//! `FingerprintStore` is the persistence contract: a store keyed by exact
//! hash that may be a no-op, in memory, or on disk. `FingerprintCache` sits in
//! front of a store for one duplicate-check run and guarantees each content is
//! fingerprinted at most once and never mutated after insertion.

use crate::core::models::VideoFingerprint;
use crate::error::CacheError;
use log::{debug, warn};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;
use std::sync::{Arc, RwLock};

pub trait FingerprintStore: Send + Sync {
    fn get(&self, exact_hash: &str) -> Result<Option<VideoFingerprint>, CacheError>;

    fn put(&self, exact_hash: &str, fingerprint: &VideoFingerprint) -> Result<(), CacheError>;
}

/// A store that never remembers anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStore;

impl FingerprintStore for NoopStore {
    fn get(&self, _exact_hash: &str) -> Result<Option<VideoFingerprint>, CacheError> {
        Ok(None)
    }

    fn put(&self, _exact_hash: &str, _fingerprint: &VideoFingerprint) -> Result<(), CacheError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, VideoFingerprint>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FingerprintStore for MemoryStore {
    fn get(&self, exact_hash: &str) -> Result<Option<VideoFingerprint>, CacheError> {
        let entries = self.entries.read().map_err(|_| CacheError::Poisoned)?;
        Ok(entries.get(exact_hash).cloned())
    }

    fn put(&self, exact_hash: &str, fingerprint: &VideoFingerprint) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries.insert(exact_hash.to_string(), fingerprint.clone());
        Ok(())
    }
}

/// On-disk store; fingerprints are kept as JSON values in a sled tree.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    pub fn flush(&self) -> Result<(), CacheError> {
        self.db.flush()?;
        Ok(())
    }
}

impl FingerprintStore for SledStore {
    fn get(&self, exact_hash: &str) -> Result<Option<VideoFingerprint>, CacheError> {
        match self.db.get(exact_hash.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&self, exact_hash: &str, fingerprint: &VideoFingerprint) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(fingerprint)?;
        self.db.insert(exact_hash.as_bytes(), bytes)?;
        Ok(())
    }
}

/// Per-run fingerprint cache keyed by exact hash, backed by a store.
pub struct FingerprintCache {
    memo: RwLock<HashMap<String, Arc<VideoFingerprint>>>,
    store: Box<dyn FingerprintStore>,
}

impl FingerprintCache {
    pub fn new(store: Box<dyn FingerprintStore>) -> Self {
        Self {
            memo: RwLock::new(HashMap::new()),
            store,
        }
    }

    pub fn without_store() -> Self {
        Self::new(Box::new(NoopStore))
    }

    /// Fingerprint for `exact_hash`, computing it with `compute` on a miss.
    ///
    /// Lookups go memo, then store. Store entries with no hashes are treated
    /// as misses. Store failures degrade to a miss or a skipped write. When
    /// two callers race on the same key the first inserted value wins and is
    /// returned to both.
    pub fn get_or_compute<E>(
        &self,
        exact_hash: &str,
        compute: impl FnOnce() -> Result<VideoFingerprint, E>,
    ) -> Result<Arc<VideoFingerprint>, E> {
        if let Some(found) = self.memo_get(exact_hash) {
            return Ok(found);
        }

        if let Some(stored) = self.store_get(exact_hash) {
            debug!("Fingerprint store hit for {}", exact_hash);
            return Ok(self.memo_insert(exact_hash, stored).0);
        }

        let fingerprint = compute()?;
        let (fingerprint, inserted) = self.memo_insert(exact_hash, fingerprint);
        // Only the caller that won the memo slot writes through
        if inserted && fingerprint.is_usable() {
            if let Err(e) = self.store.put(exact_hash, &fingerprint) {
                warn!("Failed to persist fingerprint for {}: {}", exact_hash, e);
            }
        }
        Ok(fingerprint)
    }

    pub fn get(&self, exact_hash: &str) -> Option<Arc<VideoFingerprint>> {
        self.memo_get(exact_hash)
    }

    pub fn len(&self) -> usize {
        self.memo.read().map(|memo| memo.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn memo_get(&self, exact_hash: &str) -> Option<Arc<VideoFingerprint>> {
        self.memo
            .read()
            .ok()
            .and_then(|memo| memo.get(exact_hash).cloned())
    }

    fn store_get(&self, exact_hash: &str) -> Option<VideoFingerprint> {
        match self.store.get(exact_hash) {
            Ok(Some(fingerprint)) if fingerprint.is_usable() => Some(fingerprint),
            Ok(_) => None,
            Err(e) => {
                warn!("Fingerprint store read failed for {}: {}", exact_hash, e);
                None
            }
        }
    }

    /// Insert unless the key is already present. Returns the stored value and
    /// whether this call inserted it.
    fn memo_insert(
        &self,
        exact_hash: &str,
        fingerprint: VideoFingerprint,
    ) -> (Arc<VideoFingerprint>, bool) {
        let fingerprint = Arc::new(fingerprint);
        let Ok(mut memo) = self.memo.write() else {
            return (fingerprint, true);
        };
        match memo.entry(exact_hash.to_string()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => (entry.insert(fingerprint).clone(), true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::perceptual::PerceptualHash;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn fingerprint(seed: u64) -> VideoFingerprint {
        VideoFingerprint::new(
            60.0,
            vec![PerceptualHash::new(seed), PerceptualHash::new(seed << 1)],
        )
    }

    struct FailingStore;

    impl FingerprintStore for FailingStore {
        fn get(&self, _exact_hash: &str) -> Result<Option<VideoFingerprint>, CacheError> {
            Err(CacheError::Poisoned)
        }

        fn put(
            &self,
            _exact_hash: &str,
            _fingerprint: &VideoFingerprint,
        ) -> Result<(), CacheError> {
            Err(CacheError::Poisoned)
        }
    }

    struct CountingStore {
        puts: Arc<AtomicUsize>,
    }

    impl FingerprintStore for CountingStore {
        fn get(&self, _exact_hash: &str) -> Result<Option<VideoFingerprint>, CacheError> {
            Ok(None)
        }

        fn put(
            &self,
            _exact_hash: &str,
            _fingerprint: &VideoFingerprint,
        ) -> Result<(), CacheError> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_memo_computes_once_per_hash() {
        let cache = FingerprintCache::without_store();
        let calls = AtomicUsize::new(0);
        let compute = || -> Result<VideoFingerprint, ()> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(fingerprint(3))
        };

        let first = cache.get_or_compute("h1", compute).unwrap();
        let second = cache
            .get_or_compute("h1", || -> Result<VideoFingerprint, ()> { panic!("recomputed") })
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_compute_errors_are_not_cached() {
        let cache = FingerprintCache::without_store();
        let result = cache.get_or_compute("h1", || Err::<VideoFingerprint, _>("decode failed"));
        assert!(result.is_err());
        assert!(cache.get("h1").is_none());
    }

    #[test]
    fn test_store_hit_skips_compute() {
        let store = MemoryStore::new();
        store.put("h1", &fingerprint(5)).unwrap();
        let cache = FingerprintCache::new(Box::new(store));

        let found = cache
            .get_or_compute("h1", || -> Result<VideoFingerprint, ()> { panic!("should hit store") })
            .unwrap();
        assert_eq!(*found, fingerprint(5));
    }

    #[test]
    fn test_store_entry_without_hashes_is_a_miss() {
        let store = MemoryStore::new();
        store.put("h1", &VideoFingerprint::unusable(30.0)).unwrap();
        let cache = FingerprintCache::new(Box::new(store));

        let found = cache
            .get_or_compute("h1", || Ok::<_, ()>(fingerprint(9)))
            .unwrap();
        assert_eq!(*found, fingerprint(9));
    }

    #[test]
    fn test_unusable_fingerprints_are_not_persisted() {
        let store = Arc::new(MemoryStore::new());
        struct Shared(Arc<MemoryStore>);
        impl FingerprintStore for Shared {
            fn get(&self, h: &str) -> Result<Option<VideoFingerprint>, CacheError> {
                self.0.get(h)
            }
            fn put(&self, h: &str, f: &VideoFingerprint) -> Result<(), CacheError> {
                self.0.put(h, f)
            }
        }

        let cache = FingerprintCache::new(Box::new(Shared(store.clone())));
        cache
            .get_or_compute("bad", || Ok::<_, ()>(VideoFingerprint::unusable(10.0)))
            .unwrap();
        cache
            .get_or_compute("good", || Ok::<_, ()>(fingerprint(1)))
            .unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.get("good").unwrap().is_some());
        // Still memoised for the run
        assert!(cache.get("bad").is_some());
    }

    #[test]
    fn test_racing_compute_writes_store_once() {
        let puts = Arc::new(AtomicUsize::new(0));
        let cache = FingerprintCache::new(Box::new(CountingStore { puts: puts.clone() }));

        // Another worker fills the slot while this one is still computing
        let found = cache
            .get_or_compute("h1", || {
                cache
                    .get_or_compute("h1", || Ok::<_, ()>(fingerprint(1)))
                    .unwrap();
                Ok::<_, ()>(fingerprint(2))
            })
            .unwrap();

        assert_eq!(*found, fingerprint(1));
        assert_eq!(puts.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_store_failures_degrade_to_miss() {
        let cache = FingerprintCache::new(Box::new(FailingStore));
        let found = cache
            .get_or_compute("h1", || Ok::<_, ()>(fingerprint(2)))
            .unwrap();
        assert_eq!(*found, fingerprint(2));
        assert!(cache.get("h1").is_some());
    }

    #[test]
    fn test_sled_store_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fingerprints");

        {
            let store = SledStore::open(&path).unwrap();
            store.put("abc", &fingerprint(7)).unwrap();
            store.flush().unwrap();
            assert_eq!(store.len(), 1);
        }

        let store = SledStore::open(&path).unwrap();
        assert_eq!(store.get("abc").unwrap(), Some(fingerprint(7)));
        assert_eq!(store.get("missing").unwrap(), None);
    }
}
