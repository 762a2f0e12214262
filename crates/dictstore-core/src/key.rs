//! Compressed dotted keys
//!
//! A key such as `admin.scheme.distiller.service.x` is stored as a chain of
//! nodes, one per dot-separated segment, each pointing at the node for
//! everything before it. Every node is interned, so keys that share a prefix
//! share the nodes of that prefix.
//!
//! ```text
//!   root ── admin ── scheme ──┬── x      "admin.scheme.x"
//!                             └── y      "admin.scheme.y"
//! ```
//!
//! Splitting is literal: leading, trailing and consecutive dots produce
//! empty segments, which are interned like any other segment.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::codec::ByteForm;
use crate::intern::Interner;

/// Segment separator
pub const SEPARATOR: char = '.';

/// Hash seed for the root node
const ROOT_HASH: u64 = 0x9E37_79B9_7F4A_7C15;

/// Multiplier used to fold a segment hash into its parent's hash
const MIX: u64 = 0x517C_C1B7_2722_0A95;

/// Sentinel for "hash not computed yet"
const UNCOMPUTED: u64 = 0;

/// One segment of a compressed key plus the link to its prefix.
///
/// The root is the only node with no parent; its segment is absent.
pub struct KeyNode {
    parent: Option<CompressedKey>,
    segment: ByteForm,
    /// Lazily computed structural hash. Written with relaxed ordering:
    /// two threads racing on first use both store the same value.
    hash: AtomicU64,
}

/// Shared handle to an interned key node.
///
/// Cloning is a reference-count bump. Equality is structural; use
/// [`CompressedKey::ptr_eq`] to test for the same canonical node.
#[derive(Clone)]
pub struct CompressedKey(pub(crate) Arc<KeyNode>);

impl CompressedKey {
    /// The root node, representing the empty prefix.
    ///
    /// Use [`Interner::root`] to get the canonical root of a table.
    pub(crate) fn new_root() -> Self {
        Self(Arc::new(KeyNode {
            parent: None,
            segment: ByteForm::absent(),
            hash: AtomicU64::new(UNCOMPUTED),
        }))
    }

    /// Build an un-interned child of `parent`.
    ///
    /// The result is a candidate; pass it to [`Interner::intern`] to obtain
    /// the canonical node.
    pub fn child(parent: &CompressedKey, segment: &str) -> Self {
        Self(Arc::new(KeyNode {
            parent: Some(parent.clone()),
            segment: ByteForm::from_text(segment),
            hash: AtomicU64::new(UNCOMPUTED),
        }))
    }

    /// Child node whose hash is already known.
    pub(crate) fn child_with_hash(parent: &CompressedKey, segment: &str, hash: u64) -> Self {
        Self(Arc::new(KeyNode {
            parent: Some(parent.clone()),
            segment: ByteForm::from_text(segment),
            hash: AtomicU64::new(hash),
        }))
    }

    /// Compress a dotted key, interning every segment in `interner`.
    ///
    /// `None` yields `None`; the empty string yields the root node.
    pub fn from_text(text: Option<&str>, interner: &Interner) -> Option<Self> {
        text.map(|t| Self::from_str_in(t, interner))
    }

    /// Compress a key that is known to be present.
    pub fn from_str_in(text: &str, interner: &Interner) -> Self {
        let mut node = interner.root();
        if text.is_empty() {
            return node;
        }
        for segment in text.split(SEPARATOR) {
            node = interner.intern_segment(&node, segment);
        }
        node
    }

    /// Reconstruct the full dotted key. The root's text form is `""`.
    pub fn to_text(&self) -> String {
        let mut segments = Vec::with_capacity(self.depth());
        let mut node = self;
        while let Some(parent) = &node.0.parent {
            segments.push(node.0.segment.decode().unwrap_or_default());
            node = parent;
        }
        segments.reverse();
        segments.join(".")
    }

    /// The node for everything before this segment; `None` for the root.
    pub fn parent(&self) -> Option<&CompressedKey> {
        self.0.parent.as_ref()
    }

    /// This node's own segment; absent for the root.
    pub fn segment(&self) -> &ByteForm {
        &self.0.segment
    }

    /// True for the root node.
    pub fn is_root(&self) -> bool {
        self.0.parent.is_none()
    }

    /// Number of segments from the root to this node.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut node = self;
        while let Some(parent) = &node.0.parent {
            depth += 1;
            node = parent;
        }
        depth
    }

    /// True if both handles point at the same node object.
    pub fn ptr_eq(&self, other: &CompressedKey) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Structural hash, computed on first use and cached.
    ///
    /// Walks up to the nearest ancestor with a known hash, then folds back
    /// down, caching every node on the way.
    pub fn hash_code(&self) -> u64 {
        let cached = self.0.hash.load(Ordering::Relaxed);
        if cached != UNCOMPUTED {
            return cached;
        }

        let mut pending = Vec::new();
        let mut node = self;
        let mut hash = loop {
            let known = node.0.hash.load(Ordering::Relaxed);
            if known != UNCOMPUTED {
                break known;
            }
            match &node.0.parent {
                Some(parent) => {
                    pending.push(node);
                    node = parent;
                }
                None => {
                    node.0.hash.store(ROOT_HASH, Ordering::Relaxed);
                    break ROOT_HASH;
                }
            }
        };
        for node in pending.into_iter().rev() {
            hash = combine(hash, segment_hash(node.0.segment.as_bytes().unwrap_or_default()));
            node.0.hash.store(hash, Ordering::Relaxed);
        }
        hash
    }

    /// Heap bytes owned by this node alone (not its ancestors).
    pub(crate) fn node_heap_bytes(&self) -> usize {
        std::mem::size_of::<KeyNode>() + 2 * std::mem::size_of::<usize>() + self.0.segment.len()
    }
}

impl Drop for KeyNode {
    /// Unlinks the parent chain in a loop so dropping a long key does not
    /// recurse once per segment.
    fn drop(&mut self) {
        let mut parent = self.parent.take();
        while let Some(CompressedKey(node)) = parent {
            match Arc::try_unwrap(node) {
                Ok(mut node) => parent = node.parent.take(),
                Err(_) => break,
            }
        }
    }
}

/// Hash of one segment's UTF-8 bytes.
pub(crate) fn segment_hash(bytes: &[u8]) -> u64 {
    crc32c::crc32c(bytes) as u64
}

/// Fold a segment hash into its parent's hash.
pub(crate) fn combine(parent: u64, segment: u64) -> u64 {
    (parent.rotate_left(5) ^ segment).wrapping_mul(MIX)
}

impl PartialEq for CompressedKey {
    /// Walks both parent chains in lockstep; stops early at a shared node.
    fn eq(&self, other: &Self) -> bool {
        let mut a = self;
        let mut b = other;
        loop {
            if a.ptr_eq(b) {
                return true;
            }
            if a.hash_code() != b.hash_code() || a.0.segment != b.0.segment {
                return false;
            }
            match (&a.0.parent, &b.0.parent) {
                (Some(pa), Some(pb)) => {
                    a = pa;
                    b = pb;
                }
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}

impl Eq for CompressedKey {}

impl Hash for CompressedKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code());
    }
}

impl fmt::Display for CompressedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl fmt::Debug for CompressedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompressedKey({:?})", self.to_text())
    }
}
