//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Value-level optimizations over the IR graph.
//!
//! None of these change the shape of the CFG, so dominator and LCA
//! information computed before them stays valid afterwards.

mod cse;
mod dce;

pub use cse::cse;
pub use dce::dce;
