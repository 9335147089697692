//! Evaluation result cache keyed by configuration fingerprint.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use super::EvaluationResult;

/// Shared cache of completed evaluations.
///
/// Keys are (config, workload) fingerprints. Writes are idempotent: when
/// two workers race on the same fingerprint, the first stored result wins
/// and the second writer reads it back, so one fingerprint always maps to
/// exactly one result. The cache is scoped to one search run and passed
/// explicitly; it is never a process-wide singleton.
#[derive(Debug, Default)]
pub struct EvaluationCache {
    entries: Mutex<HashMap<u64, EvaluationResult>>,
    hits: AtomicU64,
}

impl EvaluationCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a cache from checkpointed entries.
    pub fn from_entries(entries: Vec<(u64, EvaluationResult)>) -> Self {
        Self {
            entries: Mutex::new(entries.into_iter().collect()),
            hits: AtomicU64::new(0),
        }
    }

    /// Look up a fingerprint, counting the hit.
    pub fn get(&self, fingerprint: u64) -> Option<EvaluationResult> {
        let entries = self.entries.lock().expect("cache lock poisoned");
        let found = entries.get(&fingerprint).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Store a result unless one already exists, returning whichever
    /// result ended up in the cache. A losing concurrent writer discards
    /// its own result in favor of the stored one.
    pub fn insert_if_absent(&self, fingerprint: u64, result: EvaluationResult) -> EvaluationResult {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.entry(fingerprint).or_insert(result).clone()
    }

    /// Whether the fingerprint is present.
    pub fn contains(&self, fingerprint: u64) -> bool {
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .contains_key(&fingerprint)
    }

    /// Number of cached results.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cache hits observed so far.
    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Snapshot of all entries, for checkpointing. Sorted by fingerprint
    /// so checkpoints are byte-stable.
    pub fn entries(&self) -> Vec<(u64, EvaluationResult)> {
        let entries = self.entries.lock().expect("cache lock poisoned");
        let mut out: Vec<_> = entries.iter().map(|(k, v)| (*k, v.clone())).collect();
        out.sort_by_key(|(k, _)| *k);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(accuracy: f64) -> EvaluationResult {
        EvaluationResult {
            accuracy,
            compression_ratio: 0.8,
            latency_ms: 10.0,
            pages: 1,
        }
    }

    #[test]
    fn test_first_writer_wins() {
        let cache = EvaluationCache::new();
        let stored = cache.insert_if_absent(7, result(0.9));
        assert_eq!(stored.accuracy, 0.9);

        // A later writer with a different result reads back the original.
        let stored = cache.insert_if_absent(7, result(0.1));
        assert_eq!(stored.accuracy, 0.9);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_hit_counting() {
        let cache = EvaluationCache::new();
        assert!(cache.get(1).is_none());
        assert_eq!(cache.hit_count(), 0);

        cache.insert_if_absent(1, result(0.5));
        assert!(cache.get(1).is_some());
        assert_eq!(cache.hit_count(), 1);
    }

    #[test]
    fn test_checkpoint_roundtrip() {
        let cache = EvaluationCache::new();
        cache.insert_if_absent(3, result(0.3));
        cache.insert_if_absent(1, result(0.1));

        let entries = cache.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].0 < entries[1].0);

        let rebuilt = EvaluationCache::from_entries(entries);
        assert_eq!(rebuilt.get(3).unwrap().accuracy, 0.3);
    }
}
