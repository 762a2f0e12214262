//! Immutable dictionary stores
//!
//! Every strategy is the same frozen hash map; they differ only in how a
//! key and a value are represented once inside it. [`FrozenStore`] is the
//! shared build/lookup template and a [`Layout`] supplies the transforms:
//!
//! | Layout                | Key              | Value              |
//! |-----------------------|------------------|--------------------|
//! | [`PlainLayout`]       | `Box<str>`       | `Box<str>`         |
//! | [`ValueCompactLayout`]| `Box<str>`       | [`ByteForm`]       |
//! | [`CompressedLayout`]  | [`CompressedKey`]| [`ByteForm`]       |
//!
//! Stores are built once and never mutated, so any number of threads may
//! read them concurrently without locking.

use std::borrow::Cow;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

use hashbrown::{HashMap, HashSet};

use crate::codec::ByteForm;
use crate::factory::Strategy;
use crate::intern::Interner;
use crate::key::{CompressedKey, KeyNode};

/// Read-only lookup interface shared by every strategy.
pub trait TextStore: Send + Sync + fmt::Debug {
    /// Value for `key`, or `None` when the key is not present.
    fn get(&self, key: &str) -> Option<Cow<'_, str>>;

    /// True if `key` is present.
    fn contains_key(&self, key: &str) -> bool;

    /// Every key, once each, in no particular order. Restartable: each
    /// call returns a fresh iterator.
    fn keys(&self) -> Box<dyn Iterator<Item = Cow<'_, str>> + '_>;

    /// Number of entries.
    fn len(&self) -> usize;

    /// True if the store has no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The strategy this store was built with.
    fn strategy(&self) -> Strategy;

    /// Rough heap footprint of keys, values and table in bytes.
    fn approx_heap_bytes(&self) -> usize;
}

/// Per-strategy key and value representation.
pub trait Layout: Send + Sync + fmt::Debug {
    /// Key as held in the map
    type Key: Eq + Hash + Send + Sync;
    /// Value as held in the map
    type Value: Send + Sync;

    /// Strategy reported by stores using this layout
    const STRATEGY: Strategy;

    fn encode_key(&self, key: &str) -> Self::Key;
    fn encode_value(&self, value: &str) -> Self::Value;
    fn decode_key<'a>(&self, key: &'a Self::Key) -> Cow<'a, str>;
    fn decode_value<'a>(&self, value: &'a Self::Value) -> Option<Cow<'a, str>>;

    /// Find the entry for a lookup argument.
    fn lookup<'m>(&self, map: &'m HashMap<Self::Key, Self::Value>, key: &str) -> Option<&'m Self::Value> {
        map.get(&self.encode_key(key))
    }

    /// Heap bytes held by all keys of `map` together.
    fn keys_heap_bytes(&self, map: &HashMap<Self::Key, Self::Value>) -> usize;

    /// Heap bytes held by one value.
    fn value_heap_bytes(&self, value: &Self::Value) -> usize;
}

/// Keys and values kept as plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainLayout;

impl Layout for PlainLayout {
    type Key = Box<str>;
    type Value = Box<str>;

    const STRATEGY: Strategy = Strategy::Plain;

    fn encode_key(&self, key: &str) -> Box<str> {
        Box::from(key)
    }

    fn encode_value(&self, value: &str) -> Box<str> {
        Box::from(value)
    }

    fn decode_key<'a>(&self, key: &'a Box<str>) -> Cow<'a, str> {
        Cow::Borrowed(&**key)
    }

    fn decode_value<'a>(&self, value: &'a Box<str>) -> Option<Cow<'a, str>> {
        Some(Cow::Borrowed(&**value))
    }

    fn lookup<'m>(&self, map: &'m HashMap<Box<str>, Box<str>>, key: &str) -> Option<&'m Box<str>> {
        map.get(key)
    }

    fn keys_heap_bytes(&self, map: &HashMap<Box<str>, Self::Value>) -> usize {
        map.keys().map(|k| k.len()).sum()
    }

    fn value_heap_bytes(&self, value: &Box<str>) -> usize {
        value.len()
    }
}

/// Plain text keys, values in byte form.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueCompactLayout;

impl Layout for ValueCompactLayout {
    type Key = Box<str>;
    type Value = ByteForm;

    const STRATEGY: Strategy = Strategy::ValueCompact;

    fn encode_key(&self, key: &str) -> Box<str> {
        Box::from(key)
    }

    fn encode_value(&self, value: &str) -> ByteForm {
        ByteForm::from_text(value)
    }

    fn decode_key<'a>(&self, key: &'a Box<str>) -> Cow<'a, str> {
        Cow::Borrowed(&**key)
    }

    fn decode_value<'a>(&self, value: &'a ByteForm) -> Option<Cow<'a, str>> {
        value.decode()
    }

    fn lookup<'m>(&self, map: &'m HashMap<Box<str>, ByteForm>, key: &str) -> Option<&'m ByteForm> {
        map.get(key)
    }

    fn keys_heap_bytes(&self, map: &HashMap<Box<str>, Self::Value>) -> usize {
        map.keys().map(|k| k.len()).sum()
    }

    fn value_heap_bytes(&self, value: &ByteForm) -> usize {
        value.len()
    }
}

/// Interned compressed keys, values in byte form.
#[derive(Debug, Clone)]
pub struct CompressedLayout {
    interner: Arc<Interner>,
}

impl CompressedLayout {
    /// Layout interning its keys into `interner`.
    pub fn new(interner: Arc<Interner>) -> Self {
        Self { interner }
    }

    /// Layout sharing the process-wide interning table.
    pub fn global() -> Self {
        Self::new(Interner::global())
    }

    /// The interning table keys are canonicalized in.
    pub fn interner(&self) -> &Arc<Interner> {
        &self.interner
    }
}

impl Layout for CompressedLayout {
    type Key = CompressedKey;
    type Value = ByteForm;

    const STRATEGY: Strategy = Strategy::Compressed;

    fn encode_key(&self, key: &str) -> CompressedKey {
        CompressedKey::from_str_in(key, &self.interner)
    }

    fn encode_value(&self, value: &str) -> ByteForm {
        ByteForm::from_text(value)
    }

    fn decode_key<'a>(&self, key: &'a CompressedKey) -> Cow<'a, str> {
        Cow::Owned(key.to_text())
    }

    fn decode_value<'a>(&self, value: &'a ByteForm) -> Option<Cow<'a, str>> {
        value.decode()
    }

    /// Shared prefix nodes are counted once.
    fn keys_heap_bytes(&self, map: &HashMap<CompressedKey, ByteForm>) -> usize {
        let mut seen: HashSet<*const KeyNode> = HashSet::new();
        let mut bytes = 0;
        for key in map.keys() {
            let mut node = key;
            while seen.insert(Arc::as_ptr(&node.0)) {
                bytes += node.node_heap_bytes();
                match node.parent() {
                    Some(parent) => node = parent,
                    None => break,
                }
            }
        }
        bytes
    }

    fn value_heap_bytes(&self, value: &ByteForm) -> usize {
        value.len()
    }
}

/// Immutable store: a frozen map built through a [`Layout`].
pub struct FrozenStore<L: Layout> {
    layout: L,
    map: HashMap<L::Key, L::Value>,
}

/// Keys and values as plain text
pub type PlainStore = FrozenStore<PlainLayout>;
/// Plain keys, compacted values
pub type ValueCompactStore = FrozenStore<ValueCompactLayout>;
/// Interned keys, compacted values
pub type CompressedStore = FrozenStore<CompressedLayout>;

impl<L: Layout> FrozenStore<L> {
    /// Build a store from text pairs, transforming each through `layout`.
    ///
    /// The source is consumed; nothing from it is retained except the
    /// transformed copies. If a key repeats, the last value wins.
    pub fn build<I, K, V>(layout: L, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let started = Instant::now();
        let entries = entries.into_iter();
        let mut map = HashMap::with_capacity(entries.size_hint().0);
        for (key, value) in entries {
            map.insert(layout.encode_key(key.as_ref()), layout.encode_value(value.as_ref()));
        }
        map.shrink_to_fit();

        tracing::debug!(
            strategy = %L::STRATEGY,
            entries = map.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "built dictionary store"
        );
        Self { layout, map }
    }

    /// The layout this store was built with.
    pub fn layout(&self) -> &L {
        &self.layout
    }
}

impl<L: Layout> TextStore for FrozenStore<L> {
    fn get(&self, key: &str) -> Option<Cow<'_, str>> {
        self.layout
            .lookup(&self.map, key)
            .and_then(|value| self.layout.decode_value(value))
    }

    fn contains_key(&self, key: &str) -> bool {
        self.layout.lookup(&self.map, key).is_some()
    }

    fn keys(&self) -> Box<dyn Iterator<Item = Cow<'_, str>> + '_> {
        Box::new(self.map.keys().map(|key| self.layout.decode_key(key)))
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn strategy(&self) -> Strategy {
        L::STRATEGY
    }

    fn approx_heap_bytes(&self) -> usize {
        let slot = std::mem::size_of::<L::Key>() + std::mem::size_of::<L::Value>() + 1;
        let table = self.map.capacity() * slot;
        let keys = self.layout.keys_heap_bytes(&self.map);
        let values: usize = self.map.values().map(|v| self.layout.value_heap_bytes(v)).sum();
        table + keys + values
    }
}

impl<L: Layout> fmt::Debug for FrozenStore<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrozenStore")
            .field("strategy", &L::STRATEGY)
            .field("len", &self.map.len())
            .finish()
    }
}
