//! An insertion-order-preserving associative table.
//!
//! Script-level tables iterate in the order keys were first inserted,
//! regardless of how many times a key's value is later overwritten. This
//! wraps [`indexmap::IndexMap`], whose `insert` already keeps an existing
//! key's slot in place, rather than hand-rolling a parallel vec-plus-hashmap
//! scheme.

use indexmap::IndexMap;
use std::hash::Hash;

/// An ordered key/value table, generic over the key and value types so both
/// the script `Table` object and internal symbol tables can share it.
#[derive(Debug, Clone)]
pub struct OrderedTable<K, V> {
    entries: IndexMap<K, V>,
}

impl<K, V> Default for OrderedTable<K, V> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<K: Hash + Eq, V> OrderedTable<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserts or overwrites `key`. An existing key keeps its original
    /// iteration position; a new key is appended.
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    /// Removes `key`, shifting later entries down to preserve order (as
    /// opposed to indexmap's O(1) swap-remove, which would reorder the tail).
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.shift_remove(key)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, K, V> {
        self.entries.iter()
    }

    pub fn keys(&self) -> indexmap::map::Keys<'_, K, V> {
        self.entries.keys()
    }

    /// The key/value pair at insertion-order position `index`, used by the
    /// `next` iteration opcode to walk a table without a live iterator
    /// object.
    pub fn get_index(&self, index: usize) -> Option<(&K, &V)> {
        self.entries.get_index(index)
    }
}

impl<K: Hash + Eq, V> FromIterator<(K, V)> for OrderedTable<K, V> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: IndexMap::from_iter(iter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order_across_updates() {
        let mut table = OrderedTable::new();
        table.set("a", 1);
        table.set("b", 2);
        table.set("a", 99);

        let keys: Vec<&&str> = table.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![&"a", &"b"]);
        assert_eq!(table.get(&"a"), Some(&99));
    }

    #[test]
    fn remove_shifts_rather_than_swaps() {
        let mut table = OrderedTable::new();
        table.set(1, "a");
        table.set(2, "b");
        table.set(3, "c");
        table.remove(&2);

        let keys: Vec<&i32> = table.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![&1, &3]);
    }

    #[test]
    fn get_index_walks_by_position() {
        let mut table = OrderedTable::new();
        table.set("x", 10);
        table.set("y", 20);

        assert_eq!(table.get_index(0), Some((&"x", &10)));
        assert_eq!(table.get_index(1), Some((&"y", &20)));
        assert_eq!(table.get_index(2), None);
    }
}
