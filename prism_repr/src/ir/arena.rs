//! Dense-index storage for graph nodes and per-node side tables.
//!
//! Nodes live in an [`Arena`] and are addressed by [`Id`], a typed `u32`
//! index. Analysis state is kept out of the nodes in a [`SecondaryMap`]
//! indexed by the same ids, so a pass can throw its state away without
//! touching the graph.

use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

// =============================================================================
// Typed ID
// =============================================================================

/// A type-safe index into an [`Arena<T>`].
///
/// Traits are implemented by hand so that `Id<T>` is `Copy`/`Eq`/`Hash` for
/// every `T`.
pub struct Id<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Copy for Id<T> {}

impl<T> Clone for Id<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for Id<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    #[inline]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index.cmp(&other.index)
    }
}

impl<T> std::hash::Hash for Id<T> {
    #[inline]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> Id<T> {
    /// Sentinel for "no node".
    pub const INVALID: Self = Id {
        index: u32::MAX,
        _marker: PhantomData,
    };

    /// Create an ID from a raw index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Id {
            index,
            _marker: PhantomData,
        }
    }

    /// Raw index.
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Index as `usize`, for slice access.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.index as usize
    }

    /// Whether this is a real index.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.index != u32::MAX
    }
}

impl<T> std::fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "#{}", self.index)
        } else {
            write!(f, "#INVALID")
        }
    }
}

impl<T> std::fmt::Display for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.index)
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::INVALID
    }
}

// =============================================================================
// Arena
// =============================================================================

/// Append-only storage. Items are never freed individually.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    items: Vec<T>,
}

impl<T> Arena<T> {
    /// Create an empty arena.
    #[inline]
    pub fn new() -> Self {
        Arena { items: Vec::new() }
    }

    /// Create an arena with room for `capacity` items.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Arena {
            items: Vec::with_capacity(capacity),
        }
    }

    /// Store an item and return its ID.
    #[inline]
    pub fn alloc(&mut self, item: T) -> Id<T> {
        let index = self.items.len() as u32;
        self.items.push(item);
        Id::new(index)
    }

    #[inline]
    pub fn get(&self, id: Id<T>) -> Option<&T> {
        self.items.get(id.as_usize())
    }

    #[inline]
    pub fn get_mut(&mut self, id: Id<T>) -> Option<&mut T> {
        self.items.get_mut(id.as_usize())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over items with their IDs.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (Id<T>, &T)> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| (Id::new(i as u32), item))
    }

    /// Iterate over all IDs in allocation order.
    #[inline]
    pub fn ids(&self) -> impl Iterator<Item = Id<T>> + use<T> {
        (0..self.items.len() as u32).map(Id::new)
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<Id<T>> for Arena<T> {
    type Output = T;

    #[inline]
    fn index(&self, id: Id<T>) -> &Self::Output {
        &self.items[id.as_usize()]
    }
}

impl<T> IndexMut<Id<T>> for Arena<T> {
    #[inline]
    fn index_mut(&mut self, id: Id<T>) -> &mut Self::Output {
        &mut self.items[id.as_usize()]
    }
}

// =============================================================================
// Secondary Map
// =============================================================================

/// Per-item side table that grows on demand.
///
/// Reads of ids past the end yield the default value, so a table sized at
/// pass construction stays valid for nodes created later by the pass.
#[derive(Debug, Clone)]
pub struct SecondaryMap<K, V> {
    values: Vec<V>,
    default: V,
    _marker: PhantomData<K>,
}

impl<K, V: Default + Clone> SecondaryMap<K, V> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a map pre-sized for `capacity` ids.
    pub fn with_capacity(capacity: usize) -> Self {
        SecondaryMap {
            values: vec![V::default(); capacity],
            default: V::default(),
            _marker: PhantomData,
        }
    }

    /// Ensure ids below `len` are materialized.
    pub fn resize(&mut self, len: usize) {
        if len > self.values.len() {
            self.values.resize(len, V::default());
        }
    }

    /// Value for `id`, or the default for ids never written.
    #[inline]
    pub fn get(&self, id: Id<K>) -> &V {
        self.values.get(id.as_usize()).unwrap_or(&self.default)
    }

    /// Mutable value for `id`, growing the table if needed.
    #[inline]
    pub fn get_mut(&mut self, id: Id<K>) -> &mut V {
        let idx = id.as_usize();
        if idx >= self.values.len() {
            self.values.resize(idx + 1, V::default());
        }
        &mut self.values[idx]
    }

    /// Overwrite the value for `id`.
    #[inline]
    pub fn set(&mut self, id: Id<K>, value: V) {
        *self.get_mut(id) = value;
    }

    /// Number of materialized entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over materialized entries.
    pub fn iter(&self) -> impl Iterator<Item = (Id<K>, &V)> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (Id::new(i as u32), v))
    }

    /// Mutable iteration over materialized entries.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.values.iter_mut()
    }
}

impl<K, V: Default + Clone> Default for SecondaryMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V: Default + Clone> Index<Id<K>> for SecondaryMap<K, V> {
    type Output = V;

    #[inline]
    fn index(&self, id: Id<K>) -> &Self::Output {
        self.get(id)
    }
}

impl<K, V: Default + Clone> IndexMut<Id<K>> for SecondaryMap<K, V> {
    #[inline]
    fn index_mut(&mut self, id: Id<K>) -> &mut Self::Output {
        self.get_mut(id)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_basics() {
        let id: Id<u8> = Id::new(5);
        assert_eq!(id.index(), 5);
        assert_eq!(id.as_usize(), 5);
        assert!(id.is_valid());
        assert!(!Id::<u8>::INVALID.is_valid());
        assert_eq!(format!("{}", id), "#5");
        assert_eq!(format!("{:?}", Id::<u8>::INVALID), "#INVALID");
    }

    #[test]
    fn test_arena_alloc_and_index() {
        let mut arena = Arena::new();
        let a = arena.alloc("a");
        let b = arena.alloc("b");
        assert_eq!(arena.len(), 2);
        assert_eq!(arena[a], "a");
        assert_eq!(arena[b], "b");
        arena[b] = "c";
        assert_eq!(arena.get(b), Some(&"c"));
        assert_eq!(arena.ids().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn test_secondary_map_defaults_past_end() {
        let map: SecondaryMap<u8, u32> = SecondaryMap::with_capacity(2);
        assert_eq!(*map.get(Id::new(10)), 0);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_secondary_map_grows_on_write() {
        let mut map: SecondaryMap<u8, u32> = SecondaryMap::new();
        map.set(Id::new(3), 7);
        assert_eq!(map.len(), 4);
        assert_eq!(map[Id::new(3)], 7);
        map[Id::new(1)] += 2;
        assert_eq!(map[Id::new(1)], 2);
    }
}
