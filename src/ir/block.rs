//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::dense_arena_key;
use crate::ir::{Instruction, Phi};
use smallvec::SmallVec;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

dense_arena_key! {
    /// References a single basic block in a program.
    ///
    /// Must be resolved with the owning [`Program`](crate::ir::Program)
    /// into an actual [`BlockData`] object.
    pub struct Block;
}

/// One basic block: zero or more phis, a linear run of instructions, and the
/// block's position in the CFG as predecessor/successor key lists.
///
/// Edges are stored as [`Block`] keys into the program's arena on *both*
/// sides, and the two directions are kept mutually consistent by the
/// [`Program`](crate::ir::Program) edge API. A block ends in at most one
/// branch, so it has at most two successors.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct BlockData {
    phis: Vec<Phi>,
    insts: Vec<Instruction>,
    preds: SmallVec<[Block; 4]>,
    succs: SmallVec<[Block; 2]>,
}

impl BlockData {
    pub(in crate::ir) fn new() -> Self {
        Self::default()
    }

    /// The phis at the head of this block, one per merged value.
    pub fn phis(&self) -> &[Phi] {
        &self.phis
    }

    /// Mutable access to the phis.
    pub fn phis_mut(&mut self) -> &mut Vec<Phi> {
        &mut self.phis
    }

    /// The instructions of this block, in execution order.
    pub fn insts(&self) -> &[Instruction] {
        &self.insts
    }

    /// Mutable access to the instruction list.
    pub fn insts_mut(&mut self) -> &mut Vec<Instruction> {
        &mut self.insts
    }

    /// The blocks that may transfer control here, in edge order.
    ///
    /// Phi sources are positionally aligned with this list.
    pub fn preds(&self) -> &[Block] {
        &self.preds
    }

    /// The blocks control may transfer to from here: none for an exit,
    /// one for a jump, two for a branch.
    pub fn succs(&self) -> &[Block] {
        &self.succs
    }

    /// The block's terminator, if it ends in one.
    pub fn terminator(&self) -> Option<&Instruction> {
        self.insts.last().filter(|inst| inst.op().is_terminator())
    }

    pub(in crate::ir) fn push_pred(&mut self, pred: Block) {
        self.preds.push(pred);
    }

    pub(in crate::ir) fn push_succ(&mut self, succ: Block) {
        assert!(self.succs.len() < 2, "a block has at most two successors");

        self.succs.push(succ);
    }
}
