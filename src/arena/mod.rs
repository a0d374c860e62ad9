//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! A simple typed arena module.
//!
//! These arenas do not allow deletion and hand out small, type-safe keys
//! that stay valid for the lifetime of the arena. The IR stores its blocks
//! and values this way, with all the cross-references between them (edges,
//! dominator links, operands) kept as keys rather than owning references —
//! graphs with cycles fall out of this for free.
//!
//! ```
//! # use garnet::dense_arena_key;
//! # use garnet::arena::*;
//! dense_arena_key! {
//!     pub struct Node;
//! }
//!
//! enum Expr {
//!     Immediate(u64),
//!     Add(Node, Node),
//! }
//!
//! let mut arena = ArenaMap::new();
//!
//! let e1: Node = arena.insert(Expr::Immediate(16));
//! let e2 = arena.insert(Expr::Immediate(3));
//! let e3 = arena.insert(Expr::Add(e1, e2));
//! ```

mod key;
mod map;
mod secondary;

pub use key::ArenaKey;
pub use map::ArenaMap;
pub use secondary::{SecondaryMap, SecondarySet};
