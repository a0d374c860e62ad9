//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Analyses over the IR graph: pure functions of a [`Program`] whose
//! results later passes consume.
//!
//! Each analysis snapshots the program's CFG version when computed. The
//! results stay valid across value-level rewrites, but any change to CFG
//! shape (new blocks, new edges) leaves them stale — recompute, don't
//! keep querying.
//!
//! [`Program`]: crate::ir::Program

mod dominators;
mod lca;
mod liveness;
mod loops;

pub use dominators::{compute_postorder, DominatorTree};
pub use lca::LcaTable;
pub use liveness::{mark_last_uses, Liveness};
pub use loops::LoopAnalysis;
