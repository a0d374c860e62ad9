//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

/// A dense set of small integer indices, stored as an array of bits.
///
/// This is the workhorse for dataflow sets: one bit per possible member,
/// cheap copies, and a `union_with` that reports whether anything changed
/// (which is exactly the "did this block's set grow" test that worklist
/// dataflow needs to decide what to revisit).
///
/// ```
/// # use garnet::utility::BitSet;
/// let mut set = BitSet::new();
///
/// assert!(set.insert(3));
/// assert!(!set.insert(3));
/// assert!(set.contains(3));
/// assert!(!set.contains(64));
/// ```
#[derive(Clone, Default)]
pub struct BitSet {
    words: Vec<u64>,
}

const BITS: usize = u64::BITS as usize;

impl BitSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Creates an empty set with room for indices below `bits` without
    /// reallocating.
    pub fn with_capacity(bits: usize) -> Self {
        Self {
            words: vec![0; bits.div_ceil(BITS)],
        }
    }

    fn grow_for(&mut self, word: usize) {
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
    }

    /// Checks whether `index` is in the set.
    pub fn contains(&self, index: usize) -> bool {
        match self.words.get(index / BITS) {
            Some(word) => word & (1u64 << (index % BITS)) != 0,
            None => false,
        }
    }

    /// Inserts `index` into the set. Returns `true` if it was not
    /// already present.
    pub fn insert(&mut self, index: usize) -> bool {
        let (w, b) = (index / BITS, index % BITS);

        self.grow_for(w);

        let missing = self.words[w] & (1u64 << b) == 0;
        self.words[w] |= 1u64 << b;

        missing
    }

    /// Removes `index` from the set. Returns `true` if it was present.
    pub fn remove(&mut self, index: usize) -> bool {
        let (w, b) = (index / BITS, index % BITS);

        match self.words.get_mut(w) {
            Some(word) => {
                let present = *word & (1u64 << b) != 0;
                *word &= !(1u64 << b);

                present
            }
            None => false,
        }
    }

    /// Removes every member while keeping the allocation.
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Checks whether the set has no members.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|word| *word == 0)
    }

    /// Counts the members of the set.
    pub fn len(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Adds every member of `other` to `self`. Returns `true` if `self`
    /// changed.
    pub fn union_with(&mut self, other: &BitSet) -> bool {
        self.grow_for(other.words.len().saturating_sub(1));

        let mut changed = false;

        for (word, incoming) in self.words.iter_mut().zip(other.words.iter()) {
            let merged = *word | *incoming;

            changed |= merged != *word;
            *word = merged;
        }

        changed
    }

    /// Iterates over the members of the set in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, word)| {
            let word = *word;

            (0..BITS).filter_map(move |b| {
                if word & (1u64 << b) != 0 {
                    Some(i * BITS + b)
                } else {
                    None
                }
            })
        })
    }
}

// two sets are equal when they have the same members; trailing zero words
// from capacity differences don't count
impl PartialEq for BitSet {
    fn eq(&self, other: &BitSet) -> bool {
        let (short, long) = if self.words.len() <= other.words.len() {
            (&self.words, &other.words)
        } else {
            (&other.words, &self.words)
        };

        short
            .iter()
            .zip(long.iter())
            .all(|(a, b)| a == b)
            && long[short.len()..].iter().all(|word| *word == 0)
    }
}

impl Eq for BitSet {}

impl std::fmt::Debug for BitSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<usize> for BitSet {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        let mut set = Self::new();

        for index in iter {
            set.insert(index);
        }

        set
    }
}
