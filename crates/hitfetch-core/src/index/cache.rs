//! Per-segment cache of membership sets.

use std::sync::Arc;

use dashmap::DashMap;

use super::membership::MembershipSet;
use super::reader::Predicate;

/// Membership sets keyed by segment and predicate, built at most once each.
#[derive(Debug, Default)]
pub struct BitsetCache {
    sets: DashMap<(usize, Predicate), Arc<MembershipSet>>,
}

impl BitsetCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the set for `(segment, predicate)`, building it on first use.
    pub fn get_or_build<F>(&self, segment: usize, predicate: &Predicate, build: F) -> Arc<MembershipSet>
    where
        F: FnOnce() -> MembershipSet,
    {
        if let Some(set) = self.sets.get(&(segment, predicate.clone())) {
            return Arc::clone(set.value());
        }
        let entry = self
            .sets
            .entry((segment, predicate.clone()))
            .or_insert_with(|| Arc::new(build()));
        Arc::clone(entry.value())
    }

    /// Number of cached sets.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_builds_once_per_key() {
        let cache = BitsetCache::new();
        let builds = AtomicUsize::new(0);
        let build = || {
            builds.fetch_add(1, Ordering::SeqCst);
            [1, 2].into_iter().collect()
        };

        let a = cache.get_or_build(0, &Predicate::Root, build);
        let b = cache.get_or_build(0, &Predicate::Root, || unreachable!());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builds.load(Ordering::SeqCst), 1);

        cache.get_or_build(1, &Predicate::Root, MembershipSet::new);
        cache.get_or_build(0, &Predicate::Nested("c".into()), MembershipSet::new);
        assert_eq!(cache.len(), 3);
    }
}
