use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, warn};

use crate::plan::PathRef;
use crate::pqo::{BucketKey, ParameterBinding, TemplateId};
use crate::relset::RelSet;

/// Candidates of one template and binding bucket, as produced by a full search.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
    template: TemplateId,
    bucket: BucketKey,
    version: u64,
    binding: ParameterBinding,
    candidates: Vec<PathRef>,
    winner: usize,
    relids: RelSet,
}

impl CacheEntry {
    pub fn new(
        template: TemplateId,
        bucket: BucketKey,
        version: u64,
        binding: ParameterBinding,
        candidates: Vec<PathRef>,
        winner: usize,
    ) -> Self {
        let relids = candidates
            .get(winner)
            .map(|p| p.relids())
            .unwrap_or_default();
        Self {
            template,
            bucket,
            version,
            binding,
            candidates,
            winner,
            relids,
        }
    }

    pub fn template(&self) -> &TemplateId {
        &self.template
    }

    pub fn bucket(&self) -> &BucketKey {
        &self.bucket
    }

    /// Configuration version the candidates were produced under.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The binding the candidates were compiled for.
    pub fn binding(&self) -> &ParameterBinding {
        &self.binding
    }

    pub fn candidates(&self) -> &[PathRef] {
        &self.candidates
    }

    /// Path selected when the entry was compiled.
    pub fn winner(&self) -> Option<&PathRef> {
        self.candidates.get(self.winner)
    }

    pub fn relids(&self) -> RelSet {
        self.relids
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CacheLookup {
    Hit(Arc<CacheEntry>),
    Miss,
}

impl CacheLookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }

    pub fn entry(&self) -> Option<&Arc<CacheEntry>> {
        match self {
            CacheLookup::Hit(entry) => Some(entry),
            CacheLookup::Miss => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Misses caused by an entry of an older configuration version.
    pub stale: u64,
}

type CacheKey = (TemplateId, BucketKey);

/// Shared, versioned store of candidate sets.
///
/// Entries are immutable behind an `Arc`. Writers replace the whole `Arc`, so a reader holds
/// either the old or the new entry, never a mix.
pub struct PlanCache {
    entries: DashMap<CacheKey, Arc<CacheEntry>>,
    version: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
}

impl PlanCache {
    pub fn new(version: u64) -> Self {
        Self {
            entries: DashMap::new(),
            version: AtomicU64::new(version),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stale: AtomicU64::new(0),
        }
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Switches to another configuration version. Returns whether the version changed.
    pub fn set_version(&self, version: u64) -> bool {
        let old = self.version.swap(version, Ordering::AcqRel);
        if old != version {
            debug!("Plan cache version {:#x} -> {:#x}", old, version);
        }
        old != version
    }

    pub fn get(&self, template: &TemplateId, bucket: &BucketKey) -> CacheLookup {
        let key = (template.clone(), bucket.clone());
        let found = self.entries.get(&key).map(|e| e.value().clone());
        let current = self.version();
        match found {
            Some(entry) if entry.version() == current => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                CacheLookup::Hit(entry)
            }
            Some(entry) => {
                warn!(
                    "Evicting stale plan cache entry {} {} of version {:#x}",
                    template,
                    bucket,
                    entry.version()
                );
                self.entries.remove_if(&key, |_, e| e.version() != current);
                self.stale.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                CacheLookup::Miss
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                CacheLookup::Miss
            }
        }
    }

    /// Stores an entry, replacing whatever was cached for its template and bucket.
    ///
    /// Entries of any version but the current one are dropped and `None` is returned.
    pub fn insert(&self, entry: CacheEntry) -> Option<Arc<CacheEntry>> {
        let current = self.version();
        if entry.version() != current {
            warn!(
                "Dropping plan cache entry {} {} of version {:#x}, cache is at {:#x}",
                entry.template(),
                entry.bucket(),
                entry.version(),
                current
            );
            return None;
        }
        let entry = Arc::new(entry);
        let key = (entry.template().clone(), entry.bucket().clone());
        self.entries.insert(key.clone(), entry.clone());
        // Raced with a version switch.
        if self.version() != entry.version() {
            self.entries.remove_if(&key, |_, e| Arc::ptr_eq(e, &entry));
            return None;
        }
        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
        }
    }
}
