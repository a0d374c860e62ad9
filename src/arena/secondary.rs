//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::ArenaKey;
use smallbitvec::SmallBitVec;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// A dense secondary mapping `K -> V` for keys handed out by a primary
/// [`ArenaMap`](crate::arena::ArenaMap).
///
/// This is how derived, per-entity analysis data is stored without touching
/// the entities themselves: the dominator tree keeps a `SecondaryMap<Block,
/// ..>`, liveness keeps one per direction, and so on. The analysis owns the
/// map and throws it away wholesale, the primary arena never changes.
///
/// ```
/// # use garnet::dense_arena_key;
/// # use garnet::arena::*;
/// dense_arena_key! { struct Player; }
///
/// let mut players = ArenaMap::new();
/// let p1: Player = players.insert("John");
/// let p2 = players.insert("Bob");
///
/// let mut health = SecondaryMap::new();
/// health.insert(p1, 200);
///
/// assert_eq!(health[p1], 200);
/// assert!(!health.contains(p2));
/// ```
#[derive(Clone)]
pub struct SecondaryMap<K: ArenaKey, V> {
    slots: Vec<Option<V>>,
    len: usize,
    _unused: PhantomData<fn() -> K>,
}

impl<K: ArenaKey, V> SecondaryMap<K, V> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            len: 0,
            _unused: PhantomData,
        }
    }

    /// Creates a map that maps every index below `n` to a clone of `value`.
    pub fn fill(n: usize, value: V) -> Self
    where
        V: Clone,
    {
        Self {
            slots: vec![Some(value); n],
            len: n,
            _unused: PhantomData,
        }
    }

    /// Checks whether the map holds a value for `key`.
    pub fn contains(&self, key: K) -> bool {
        matches!(self.slots.get(key.index()), Some(Some(_)))
    }

    /// Inserts `key -> value`, returning the previous value if there
    /// was one.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let idx = key.index();

        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }

        let prev = self.slots[idx].replace(value);

        if prev.is_none() {
            self.len += 1;
        }

        prev
    }

    /// Removes the mapping for `key`, returning the value if there was one.
    pub fn remove(&mut self, key: K) -> Option<V> {
        let prev = self.slots.get_mut(key.index()).and_then(Option::take);

        if prev.is_some() {
            self.len -= 1;
        }

        prev
    }

    /// Gets the value for `key`, if one was inserted.
    pub fn get(&self, key: K) -> Option<&V> {
        self.slots.get(key.index()).and_then(Option::as_ref)
    }

    /// Gets the value for `key` mutably, if one was inserted.
    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.slots.get_mut(key.index()).and_then(Option::as_mut)
    }

    /// The number of keys that currently have values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks whether no key has a value.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates over `(key, &value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (K::new(i), v)))
    }

    /// Iterates over every mapped key in key order.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.iter().map(|(k, _)| k)
    }
}

impl<K: ArenaKey, V> Default for SecondaryMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ArenaKey, V> Index<K> for SecondaryMap<K, V> {
    type Output = V;

    #[track_caller]
    fn index(&self, key: K) -> &V {
        self.get(key).expect("no value inserted for key")
    }
}

impl<K: ArenaKey, V> IndexMut<K> for SecondaryMap<K, V> {
    #[track_caller]
    fn index_mut(&mut self, key: K) -> &mut V {
        self.get_mut(key).expect("no value inserted for key")
    }
}

impl<K: ArenaKey, V: Debug> Debug for SecondaryMap<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// A dense set of keys from a primary [`ArenaMap`](crate::arena::ArenaMap),
/// stored as one bit per key.
///
/// The usual "have I visited this block yet" structure for graph walks.
///
/// ```
/// # use garnet::dense_arena_key;
/// # use garnet::arena::*;
/// dense_arena_key! { struct Key; }
///
/// let mut primary = ArenaMap::new();
/// let k1: Key = primary.insert(());
///
/// let mut seen = SecondarySet::new();
///
/// assert!(seen.insert(k1));
/// assert!(!seen.insert(k1));
/// assert!(seen.contains(k1));
/// ```
#[derive(Clone, Default)]
pub struct SecondarySet<K: ArenaKey> {
    bits: SmallBitVec,
    _unused: PhantomData<fn() -> K>,
}

impl<K: ArenaKey> SecondarySet<K> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            bits: SmallBitVec::new(),
            _unused: PhantomData,
        }
    }

    /// Checks whether `key` is in the set.
    pub fn contains(&self, key: K) -> bool {
        self.bits.get(key.index()).unwrap_or(false)
    }

    /// Inserts `key` into the set. Returns `true` if it was not already
    /// present.
    pub fn insert(&mut self, key: K) -> bool {
        let idx = key.index();

        while self.bits.len() <= idx {
            self.bits.push(false);
        }

        let missing = !self.bits.get(idx).unwrap_or(false);

        self.bits.set(idx, true);

        missing
    }

    /// Removes `key` from the set. Returns `true` if it was present.
    pub fn remove(&mut self, key: K) -> bool {
        match self.bits.get(key.index()) {
            Some(present) => {
                self.bits.set(key.index(), false);

                present
            }
            None => false,
        }
    }

    /// Iterates over the members in key order.
    pub fn iter(&self) -> impl Iterator<Item = K> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter_map(|(i, present)| present.then(|| K::new(i)))
    }
}

impl<K: ArenaKey> Debug for SecondarySet<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dense_arena_key;

    dense_arena_key! { struct Key; }

    #[test]
    fn secondary_map_sparse_insert() {
        let mut map = SecondaryMap::new();

        assert_eq!(map.insert(Key::new(5), "five"), None);
        assert_eq!(map.len(), 1);
        assert!(!map.contains(Key::new(0)));
        assert!(map.contains(Key::new(5)));
        assert_eq!(map.insert(Key::new(5), "cinq"), Some("five"));
        assert_eq!(map[Key::new(5)], "cinq");
    }

    #[test]
    fn secondary_map_fill_and_remove() {
        let mut map: SecondaryMap<Key, bool> = SecondaryMap::fill(3, false);

        assert_eq!(map.len(), 3);
        assert_eq!(map.remove(Key::new(1)), Some(false));
        assert_eq!(map.remove(Key::new(1)), None);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec![Key::new(0), Key::new(2)]);
    }

    #[test]
    fn secondary_set_basics() {
        let mut set = SecondarySet::new();

        assert!(set.insert(Key::new(2)));
        assert!(set.insert(Key::new(70)));
        assert!(!set.insert(Key::new(2)));
        assert!(set.contains(Key::new(70)));
        assert!(!set.contains(Key::new(71)));
        assert!(set.remove(Key::new(2)));
        assert!(!set.remove(Key::new(2)));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Key::new(70)]);
    }
}
