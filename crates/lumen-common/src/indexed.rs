//! Insertion-ordered lists with O(1) lookup by key.

use std::fmt::Debug;
use std::hash::{BuildHasherDefault, Hash};

use hashbrown::HashMap;
use rustc_hash::FxHasher;

use crate::{Error, Result};

/// Hash map using the Fx hasher, for small integer and string keys.
pub type FxHashMap<K, V> = HashMap<K, V, BuildHasherDefault<FxHasher>>;

/// Hash set using the Fx hasher.
pub type FxHashSet<T> = hashbrown::HashSet<T, BuildHasherDefault<FxHasher>>;

/// Items that carry their own lookup key.
pub trait Keyed {
    type Key: Eq + Hash + Clone + Debug;

    fn key(&self) -> Self::Key;
}

/// An insertion-ordered list whose items can also be found by key.
///
/// Keys are unique: adding a second item with the same key is an error, and
/// must be done through [`IndexedList::replace`] or
/// [`IndexedList::insert_or_replace`] instead. Mutating an item's key through
/// [`IndexedList::get_mut`] leaves the index stale until
/// [`IndexedList::reindex`] is called.
#[derive(Debug, Clone)]
pub struct IndexedList<T: Keyed> {
    items: Vec<T>,
    index: FxHashMap<T::Key, usize>,
}

impl<T: Keyed> Default for IndexedList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: FxHashMap::default(),
        }
    }
}

impl<T: Keyed> IndexedList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append an item, rejecting a duplicate key.
    pub fn push(&mut self, item: T) -> Result<()> {
        let key = item.key();
        if self.index.contains_key(&key) {
            return Err(Error::DuplicateKey(format!("{:?}", key)));
        }
        self.index.insert(key, self.items.len());
        self.items.push(item);
        Ok(())
    }

    /// Replace the item at `position`. The new key must not collide with
    /// another item's key.
    pub fn replace(&mut self, position: usize, item: T) -> Result<T> {
        let old_key = self
            .items
            .get(position)
            .map(Keyed::key)
            .ok_or_else(|| Error::InvalidArgument(format!("index {} out of range", position)))?;
        let new_key = item.key();
        if new_key != old_key && self.index.contains_key(&new_key) {
            return Err(Error::DuplicateKey(format!("{:?}", new_key)));
        }
        self.index.remove(&old_key);
        self.index.insert(new_key, position);
        Ok(std::mem::replace(&mut self.items[position], item))
    }

    /// Replace the item with the same key in place, or append it.
    pub fn insert_or_replace(&mut self, item: T) -> Option<T> {
        match self.index.get(&item.key()) {
            Some(&position) => Some(std::mem::replace(&mut self.items[position], item)),
            None => {
                self.index.insert(item.key(), self.items.len());
                self.items.push(item);
                None
            }
        }
    }

    #[inline]
    pub fn get(&self, position: usize) -> Option<&T> {
        self.items.get(position)
    }

    #[inline]
    pub fn get_mut(&mut self, position: usize) -> Option<&mut T> {
        self.items.get_mut(position)
    }

    pub fn get_by_key(&self, key: &T::Key) -> Option<&T> {
        self.index.get(key).map(|&i| &self.items[i])
    }

    pub fn get_by_key_mut(&mut self, key: &T::Key) -> Option<&mut T> {
        match self.index.get(key) {
            Some(&i) => self.items.get_mut(i),
            None => None,
        }
    }

    pub fn index_of(&self, key: &T::Key) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn contains_key(&self, key: &T::Key) -> bool {
        self.index.contains_key(key)
    }

    /// Rebuild the key index from the items' current keys.
    pub fn reindex(&mut self) -> Result<()> {
        self.index.clear();
        for (i, item) in self.items.iter().enumerate() {
            let key = item.key();
            if self.index.insert(key.clone(), i).is_some() {
                return Err(Error::DuplicateKey(format!("{:?}", key)));
            }
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Mutable iteration. See the type docs about changing keys.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn keys(&self) -> impl Iterator<Item = T::Key> + '_ {
        self.items.iter().map(Keyed::key)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T: Keyed> std::ops::Index<usize> for IndexedList<T> {
    type Output = T;

    fn index(&self, position: usize) -> &T {
        &self.items[position]
    }
}

impl<'a, T: Keyed> IntoIterator for &'a IndexedList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Keyed> IntoIterator for IndexedList<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<T: Keyed + PartialEq> PartialEq for IndexedList<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<T: Keyed + Eq> Eq for IndexedList<T> {}

#[cfg(feature = "serde")]
impl<T: Keyed + serde::Serialize> serde::Serialize for IndexedList<T> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(&self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Slot {
        name: &'static str,
        value: u32,
    }

    impl Keyed for Slot {
        type Key = &'static str;

        fn key(&self) -> Self::Key {
            self.name
        }
    }

    fn slot(name: &'static str, value: u32) -> Slot {
        Slot { name, value }
    }

    #[test]
    fn test_push_and_lookup() {
        let mut list = IndexedList::new();
        list.push(slot("a", 1)).unwrap();
        list.push(slot("b", 2)).unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list.get_by_key(&"b").map(|s| s.value), Some(2));
        assert_eq!(list.index_of(&"a"), Some(0));
        assert!(matches!(list.push(slot("a", 3)), Err(Error::DuplicateKey(_))));
    }

    #[test]
    fn test_insert_or_replace_keeps_position() {
        let mut list = IndexedList::new();
        list.push(slot("a", 1)).unwrap();
        list.push(slot("b", 2)).unwrap();

        assert_eq!(list.insert_or_replace(slot("a", 9)), Some(slot("a", 1)));
        assert_eq!(list.insert_or_replace(slot("c", 3)), None);
        assert_eq!(list.keys().collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!(list[0].value, 9);
    }

    #[test]
    fn test_replace_rejects_collisions() {
        let mut list = IndexedList::new();
        list.push(slot("a", 1)).unwrap();
        list.push(slot("b", 2)).unwrap();

        assert!(list.replace(0, slot("b", 5)).is_err());
        list.replace(0, slot("z", 5)).unwrap();
        assert!(list.get_by_key(&"a").is_none());
        assert_eq!(list.index_of(&"z"), Some(0));
        assert!(list.replace(7, slot("q", 0)).is_err());
    }

    #[test]
    fn test_reindex_after_key_change() {
        let mut list = IndexedList::new();
        list.push(slot("a", 1)).unwrap();
        list.get_mut(0).unwrap().name = "x";

        assert!(list.get_by_key(&"x").is_none());
        list.reindex().unwrap();
        assert_eq!(list.get_by_key(&"x").map(|s| s.value), Some(1));
    }
}
