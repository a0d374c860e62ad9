//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! The machine-facing half of the backend: SSA destruction and instruction
//! grouping, parameterized over a [`Target`] for the few genuinely
//! machine-specific decisions.
//!
//! Everything here runs after optimization is done. [`lower_phis`] hands
//! downstream register allocation a phi-free program; [`form_clauses`] is
//! pure instruction-order shaping and runs dead last.

mod clause;
mod ssa;
mod target;

pub use clause::form_clauses;
pub use ssa::lower_phis;
pub use target::{ClauseKind, GenericTarget, Target};
