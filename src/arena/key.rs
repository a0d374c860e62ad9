//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use std::fmt::Debug;

/// Models a type that can act as a key for the arena map types.
///
/// Note that in most cases this trait should not be implemented directly,
/// prefer to use the [`dense_arena_key`](crate::dense_arena_key) macro that
/// provides the implementation for you.
pub trait ArenaKey: Copy + Eq + Debug {
    /// Creates a new key from a given arena index.
    ///
    /// Panics if the index cannot be represented in the key's storage type.
    fn new(index: usize) -> Self;

    /// Converts the key back into a `usize` index. This conversion is
    /// lossless.
    fn index(self) -> usize;
}

/// Creates a type-safe key for an [`ArenaMap`](crate::arena::ArenaMap) with
/// [`u32`] as the underlying data type.
///
/// The highest value of `u32` is reserved, which makes the key implement
/// `Packable` and therefore usable inside a
/// [`PackedOption`](crate::utility::PackedOption) with no extra storage.
///
/// ```
/// # use garnet::dense_arena_key;
/// # use garnet::arena::ArenaMap;
/// dense_arena_key! {
///     pub struct DenseRef; // data type is u32
/// }
///
/// type DenseMapping = ArenaMap<DenseRef, String>;
/// ```
#[macro_export]
macro_rules! dense_arena_key {
    ( $(#[$outer:meta])* $vis:vis struct $name:ident; $($rest:tt)* ) => {
        $(#[$outer])*
        #[repr(transparent)]
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        #[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
        $vis struct $name(u32);

        impl $crate::arena::ArenaKey for $name {
            #[inline]
            fn new(index: usize) -> Self {
                Self(index.try_into().expect("index is not representable with key type"))
            }

            #[inline]
            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl $crate::utility::Packable for $name {
            #[inline]
            fn reserved() -> Self {
                Self(u32::MAX)
            }

            #[inline]
            fn is_reserved(&self) -> bool {
                self.0 == u32::MAX
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::write!(f, "{}({})", ::std::stringify!($name), self.0)
            }
        }

        $crate::dense_arena_key!($($rest)*);
    };

    () => {}
}

#[cfg(test)]
mod tests {
    use crate::arena::*;
    use crate::dense_arena_key;
    use crate::utility::Packable;
    use static_assertions::assert_eq_size;

    #[test]
    fn dense_arena_key_is_u32() {
        dense_arena_key! { struct Key; }

        assert_eq_size!(Key, u32);
    }

    #[test]
    fn reserved_key_works() {
        dense_arena_key! { struct K; }

        let mut map = ArenaMap::<K, i32>::default();

        let k1 = map.insert(15);
        let k2 = map.insert(32);
        let k3 = K::reserved();

        assert!(k3.is_reserved());
        assert!(!k2.is_reserved());
        assert!(!k1.is_reserved());
    }

    #[test]
    fn can_use_dense_arena_key_in_map() {
        dense_arena_key! { struct Key; }

        let mut map = ArenaMap::new();
        let k1: Key = map.insert(1);
        let k2: Key = map.insert(2);
        let k3: Key = map.insert(3);

        assert_eq!(map[k1], 1);
        assert_eq!(map[k2], 2);
        assert_eq!(map[k3], 3);
    }
}
