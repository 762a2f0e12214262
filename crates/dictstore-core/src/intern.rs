//! Interning table for compressed key nodes
//!
//! Hash-consing over weak references: the table maps a node's structural
//! hash to the `Weak` handles of the canonical nodes with that hash. A node
//! lives only as long as some store or caller holds a strong handle to it.
//! Once it is gone its `Weak` is dead and gets expunged, either lazily while
//! searching its bucket or by a full [`Interner::sweep`].
//!
//! The table is split into independently locked shards, so stores for
//! different locales can be built on different threads with little contention.
//! Callers never lock anything themselves.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::config::{InternerConfig, MAX_SHARDS};
use crate::key::{combine, segment_hash, CompressedKey, KeyNode};

type Bucket = Vec<Weak<KeyNode>>;
type Shard = HashMap<u64, Bucket>;

/// Process-wide table shared by stores that are not given their own.
static GLOBAL: OnceLock<Arc<Interner>> = OnceLock::new();

/// Snapshot of interning table statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InternerStats {
    /// Entries whose node is still alive
    pub live: usize,
    /// Entries whose node has been dropped but not yet expunged
    pub dead: usize,
    /// Canonical nodes installed since the table was created
    pub interned_total: u64,
    /// Intern calls answered with an existing canonical node
    pub hits: u64,
    /// Full sweeps completed
    pub sweeps: u64,
}

/// Thread-safe hash-consing table for [`CompressedKey`] nodes.
pub struct Interner {
    /// Canonical root, held strongly for the table's lifetime
    root: CompressedKey,
    shards: Box<[Mutex<Shard>]>,
    shard_mask: usize,
    sweep_interval: u64,
    interned_total: AtomicU64,
    hits: AtomicU64,
    sweeps: AtomicU64,
}

impl Interner {
    /// Create a table with the default configuration.
    pub fn new() -> Self {
        Self::with_config(&InternerConfig::default())
    }

    /// Create a table with the given shard count and sweep cadence.
    ///
    /// The shard count is clamped to `1..=MAX_SHARDS` and rounded up to a
    /// power of two; a zero sweep interval is treated as one.
    pub fn with_config(config: &InternerConfig) -> Self {
        let shard_count = config.shards.clamp(1, MAX_SHARDS).next_power_of_two();
        let shards = (0..shard_count)
            .map(|_| Mutex::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            root: CompressedKey::new_root(),
            shards,
            shard_mask: shard_count - 1,
            sweep_interval: config.sweep_interval.max(1),
            interned_total: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            sweeps: AtomicU64::new(0),
        }
    }

    /// The process-wide table.
    pub fn global() -> Arc<Interner> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Interner::new())))
    }

    /// The canonical root node of this table.
    pub fn root(&self) -> CompressedKey {
        self.root.clone()
    }

    /// Return the canonical node structurally equal to `candidate`,
    /// installing `candidate` itself if there is none.
    ///
    /// Ancestors are canonicalized first, from the root down. A candidate
    /// whose parent chain is not canonical in this table is rebuilt on the
    /// canonical chain, so the returned node always shares its prefix nodes
    /// with other keys.
    pub fn intern(&self, candidate: CompressedKey) -> CompressedKey {
        let mut chain = Vec::new();
        let mut node = &candidate;
        while let Some(parent) = node.parent() {
            chain.push(node);
            node = parent;
        }

        let mut canonical = self.root();
        for node in chain.into_iter().rev() {
            canonical = match node.parent() {
                Some(parent) if parent.ptr_eq(&canonical) => self.install(node),
                _ => {
                    let segment = node.segment().decode().unwrap_or_default();
                    self.intern_segment(&canonical, &segment)
                }
            };
        }
        canonical
    }

    /// Install `node`, whose parent is already canonical, unless an equal
    /// canonical node exists.
    fn install(&self, node: &CompressedKey) -> CompressedKey {
        let Some(parent) = node.parent() else {
            return self.root();
        };
        let hash = node.hash_code();
        let mut shard = self.shard(hash).lock();
        let bucket = shard.entry(hash).or_default();
        let found = find_live(bucket, |existing| {
            existing.parent().is_some_and(|p| p.ptr_eq(parent)) && existing.segment() == node.segment()
        });
        if let Some(found) = found {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return found;
        }
        bucket.push(Arc::downgrade(&node.0));
        drop(shard);
        self.record_insert();
        node.clone()
    }

    /// Intern the child of canonical node `parent` with the given segment.
    ///
    /// Allocates only when no canonical node exists yet.
    pub(crate) fn intern_segment(&self, parent: &CompressedKey, segment: &str) -> CompressedKey {
        let hash = combine(parent.hash_code(), segment_hash(segment.as_bytes()));
        let mut shard = self.shard(hash).lock();
        let bucket = shard.entry(hash).or_default();
        let found = find_live(bucket, |node| {
            node.parent().is_some_and(|p| p.ptr_eq(parent))
                && node.segment().as_bytes() == Some(segment.as_bytes())
        });
        if let Some(found) = found {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return found;
        }
        let node = CompressedKey::child_with_hash(parent, segment, hash);
        bucket.push(Arc::downgrade(&node.0));
        drop(shard);
        self.record_insert();
        node
    }

    /// Expunge every dead entry. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let mut removed = 0;
        for shard in self.shards.iter() {
            let mut shard = shard.lock();
            shard.retain(|_, bucket| {
                let before = bucket.len();
                bucket.retain(|weak| weak.strong_count() > 0);
                removed += before - bucket.len();
                !bucket.is_empty()
            });
        }
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(removed, "interner sweep complete");
        removed
    }

    /// Number of live canonical nodes, excluding the root.
    pub fn len(&self) -> usize {
        self.stats().live
    }

    /// True when no live canonical node other than the root exists.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current statistics.
    pub fn stats(&self) -> InternerStats {
        let mut live = 0;
        let mut dead = 0;
        for shard in self.shards.iter() {
            let shard = shard.lock();
            for weak in shard.values().flatten() {
                if weak.strong_count() > 0 {
                    live += 1;
                } else {
                    dead += 1;
                }
            }
        }
        InternerStats {
            live,
            dead,
            interned_total: self.interned_total.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
        }
    }

    fn shard(&self, hash: u64) -> &Mutex<Shard> {
        // High bits pick the shard; the map itself hashes the full value.
        &self.shards[(hash >> 48) as usize & self.shard_mask]
    }

    fn record_insert(&self) {
        let total = self.interned_total.fetch_add(1, Ordering::Relaxed) + 1;
        if total % self.sweep_interval == 0 {
            self.sweep();
        }
    }
}

/// Find a live node in `bucket` matching `pred`, dropping dead entries on the way.
fn find_live(bucket: &mut Bucket, pred: impl Fn(&CompressedKey) -> bool) -> Option<CompressedKey> {
    let mut found = None;
    bucket.retain(|weak| match weak.upgrade() {
        Some(node) => {
            let node = CompressedKey(node);
            if found.is_none() && pred(&node) {
                found = Some(node);
            }
            true
        }
        None => false,
    });
    found
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Interner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interner")
            .field("shards", &self.shards.len())
            .field("sweep_interval", &self.sweep_interval)
            .field("interned_total", &self.interned_total.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(text: &str, interner: &Interner) -> CompressedKey {
        CompressedKey::from_str_in(text, interner)
    }

    #[test]
    fn test_same_text_interns_to_same_nodes() {
        let interner = Interner::new();
        let a = key("a.b.c", &interner);
        let b = key("a.b.c", &interner);
        let (mut x, mut y) = (&a, &b);
        loop {
            assert!(x.ptr_eq(y));
            match (x.parent(), y.parent()) {
                (Some(px), Some(py)) => {
                    x = px;
                    y = py;
                }
                (None, None) => break,
                _ => panic!("chains differ in length"),
            }
        }
        assert_eq!(interner.len(), 3);
    }

    #[test]
    fn test_intern_candidate_returns_existing() {
        let interner = Interner::new();
        let existing = key("admin.menu.save", &interner);
        let parent = existing.parent().unwrap().clone();

        let candidate = CompressedKey::child(&parent, "save");
        assert!(!candidate.ptr_eq(&existing));
        let canonical = interner.intern(candidate);
        assert!(canonical.ptr_eq(&existing));
        assert!(interner.stats().hits >= 1);
    }

    #[test]
    fn test_intern_new_candidate_installs_it() {
        let interner = Interner::new();
        let parent = key("admin.menu", &interner);
        let candidate = CompressedKey::child(&parent, "delete");
        let canonical = interner.intern(candidate.clone());
        assert!(canonical.ptr_eq(&candidate));
        assert!(key("admin.menu.delete", &interner).ptr_eq(&candidate));
    }

    #[test]
    fn test_intern_rebuilds_foreign_chain() {
        let local = Interner::new();
        let foreign = Interner::new();
        let canonical = key("x.y", &local);

        let stranger = key("x.y", &foreign);
        let interned = local.intern(stranger);
        assert!(interned.ptr_eq(&canonical));

        let fresh = local.intern(key("x.z", &foreign));
        assert_eq!(fresh.to_text(), "x.z");
        assert!(fresh.parent().unwrap().ptr_eq(canonical.parent().unwrap()));
    }

    #[test]
    fn test_intern_root_candidate() {
        let interner = Interner::new();
        let other = Interner::new();
        assert!(interner.intern(other.root()).ptr_eq(&interner.root()));
    }

    #[test]
    fn test_dropped_nodes_are_reclaimed() {
        let interner = Interner::with_config(&InternerConfig { shards: 4, sweep_interval: 1_000_000 });
        let k = key("temp.only.here", &interner);
        assert_eq!(interner.stats().live, 3);
        drop(k);

        let stats = interner.stats();
        assert_eq!(stats.live, 0);
        assert_eq!(stats.dead, 3);

        assert_eq!(interner.sweep(), 3);
        let stats = interner.stats();
        assert_eq!(stats.dead, 0);
        assert_eq!(stats.sweeps, 1);
        assert!(interner.is_empty());
    }

    #[test]
    fn test_reinterning_after_reclaim_is_equal() {
        let interner = Interner::new();
        let first_hash = key("gone.soon", &interner).hash_code();
        let again = key("gone.soon", &interner);
        assert_eq!(again.hash_code(), first_hash);
        assert_eq!(again.to_text(), "gone.soon");
    }

    #[test]
    fn test_automatic_sweep() {
        let interner = Interner::with_config(&InternerConfig { shards: 1, sweep_interval: 4 });
        for i in 0..8 {
            drop(key(&format!("k{}", i), &interner));
        }
        let stats = interner.stats();
        assert_eq!(stats.interned_total, 8);
        assert_eq!(stats.sweeps, 2);
        // The node that triggered the last sweep was still held at the time.
        assert_eq!(stats.dead, 1);
    }

    #[test]
    fn test_shared_prefix_survives_partial_drop() {
        let interner = Interner::new();
        let b = key("a.b", &interner);
        let c = key("a.c", &interner);
        let a = c.parent().unwrap().clone();
        drop(c);
        interner.sweep();
        assert!(b.parent().unwrap().ptr_eq(&a));
        assert!(key("a", &interner).ptr_eq(&a));
    }

    #[test]
    fn test_concurrent_interning_agrees() {
        let interner = Arc::new(Interner::new());
        let mut handles = vec![];
        for _ in 0..8 {
            let interner = Arc::clone(&interner);
            handles.push(std::thread::spawn(move || {
                (0..50)
                    .map(|i| key(&format!("admin.scheme.item{}.label", i), &interner))
                    .collect::<Vec<_>>()
            }));
        }
        let results: Vec<Vec<CompressedKey>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for other in &results[1..] {
            for (a, b) in results[0].iter().zip(other) {
                assert!(a.ptr_eq(b));
            }
        }
        // admin, scheme, 50 items, 50 labels
        assert_eq!(interner.len(), 102);
    }

    #[test]
    fn test_intern_deep_foreign_chain() {
        let local = Interner::new();
        let foreign = Interner::new();
        let text = format!("{}leaf", "seg.".repeat(200_000));

        let stranger = key(&text, &foreign);
        let interned = local.intern(stranger.clone());
        assert!(!interned.ptr_eq(&stranger));
        assert_eq!(interned.depth(), 200_001);
        assert!(interned.ptr_eq(&key(&text, &local)));

        drop(stranger);
        drop(interned);
        assert!(local.is_empty());
        assert!(foreign.is_empty());
    }

    #[test]
    fn test_intern_deep_uninterned_candidate() {
        let interner = Interner::new();
        let mut candidate = interner.root();
        for _ in 0..200_000 {
            candidate = CompressedKey::child(&candidate, "n");
        }
        let interned = interner.intern(candidate.clone());
        assert!(interned.ptr_eq(&candidate));
        assert_eq!(interner.len(), 200_000);
    }

    #[test]
    fn test_oversized_shard_count_is_clamped() {
        let interner = Interner::with_config(&InternerConfig { shards: usize::MAX, sweep_interval: 0 });
        assert_eq!(interner.shards.len(), MAX_SHARDS);
        assert_eq!(interner.sweep_interval, 1);
        assert_eq!(key("still.works", &interner).to_text(), "still.works");
    }

    #[test]
    fn test_global_is_shared() {
        let a = Interner::global();
        let b = Interner::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
