//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::ArenaMap;
use crate::ir::{Block, BlockData, Instruction, Phi, Value, ValueData};

/// One function's worth of IR: the block arena, the value arena, and the
/// block ordering that the rest of the backend operates on.
///
/// The first block created is the entry. Blocks and values are never freed;
/// passes mutate instruction lists in place and drop references to anything
/// they remove.
///
/// Derived analyses ([`DominatorTree`](crate::analysis::DominatorTree), the
/// LCA table, liveness) are separate objects computed *from* a program, and
/// each records the [`Self::cfg_version`] it saw. Anything that changes the
/// shape of the CFG — adding blocks or edges — bumps the version and thereby
/// invalidates them; pure value-level rewrites do not.
#[derive(Clone, Debug, Default)]
pub struct Program {
    blocks: ArenaMap<Block, BlockData>,
    values: ArenaMap<Value, ValueData>,
    order: Vec<Block>,
    cfg_version: u32,
}

impl Program {
    /// Creates an empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new, empty block at the end of the program order.
    ///
    /// The first block created is the program's entry.
    pub fn create_block(&mut self) -> Block {
        let block = self.blocks.insert(BlockData::new());

        self.order.push(block);
        self.cfg_version += 1;

        block
    }

    /// Records a control-flow edge from `from` to `to`, maintaining both
    /// directions at once.
    ///
    /// Edge order matters: a branch transfers to its block's first
    /// successor on "taken" and the second otherwise, and phi sources line
    /// up with predecessor order.
    pub fn add_edge(&mut self, from: Block, to: Block) {
        self.blocks[from].push_succ(to);
        self.blocks[to].push_pred(from);
        self.cfg_version += 1;
    }

    /// The entry block. Panics if no block has been created yet.
    pub fn entry(&self) -> Block {
        self.order.first().copied().expect("program has no blocks")
    }

    /// Iterates over every block in program order (entry first).
    pub fn blocks(&self) -> impl Iterator<Item = Block> + '_ {
        self.order.iter().copied()
    }

    /// The number of blocks in the program.
    pub fn num_blocks(&self) -> usize {
        self.order.len()
    }

    /// Resolves a block key.
    pub fn block(&self, block: Block) -> &BlockData {
        &self.blocks[block]
    }

    /// Resolves a block key mutably.
    ///
    /// This hands out the phi and instruction lists; it cannot change CFG
    /// shape, so it does not invalidate derived analyses.
    pub fn block_mut(&mut self, block: Block) -> &mut BlockData {
        &mut self.blocks[block]
    }

    /// Creates a fresh SSA value. The caller is expected to hand it to
    /// exactly one defining instruction or phi.
    pub fn new_value(&mut self, data: ValueData) -> Value {
        self.values.insert(data)
    }

    /// Resolves a value key.
    pub fn value(&self, value: Value) -> &ValueData {
        &self.values[value]
    }

    /// Whether `value` was created by this program.
    pub fn is_value(&self, value: Value) -> bool {
        self.values.contains(value)
    }

    /// The number of values created so far.
    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    /// Appends an instruction to the end of `block`.
    pub fn append(&mut self, block: Block, inst: Instruction) {
        self.blocks[block].insts_mut().push(inst);
    }

    /// Appends a phi to `block`'s phi list.
    pub fn append_phi(&mut self, block: Block, phi: Phi) {
        self.blocks[block].phis_mut().push(phi);
    }

    /// A counter that changes every time the shape of the CFG does.
    ///
    /// Derived analyses snapshot this at construction and compare at query
    /// time; a mismatch means the analysis is stale and must be recomputed.
    pub fn cfg_version(&self) -> u32 {
        self.cfg_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Opcode, Operand};

    #[test]
    fn first_block_is_entry() {
        let mut prog = Program::new();
        let entry = prog.create_block();
        let other = prog.create_block();

        assert_eq!(prog.entry(), entry);
        assert_eq!(prog.blocks().collect::<Vec<_>>(), vec![entry, other]);
    }

    #[test]
    fn edges_are_symmetric() {
        let mut prog = Program::new();
        let a = prog.create_block();
        let b = prog.create_block();
        let c = prog.create_block();

        prog.add_edge(a, b);
        prog.add_edge(a, c);
        prog.add_edge(b, c);

        assert_eq!(prog.block(a).succs(), &[b, c]);
        assert_eq!(prog.block(b).preds(), &[a]);
        assert_eq!(prog.block(c).preds(), &[a, b]);
    }

    #[test]
    fn cfg_version_tracks_shape_changes() {
        let mut prog = Program::new();
        let a = prog.create_block();
        let before = prog.cfg_version();

        let b = prog.create_block();
        prog.add_edge(a, b);

        assert_ne!(prog.cfg_version(), before);

        let at_shape = prog.cfg_version();
        let v = prog.new_value(ValueData::scalar(32));
        prog.append(a, Instruction::new(Opcode::Mov, &[Operand::Imm(1)], &[v]));

        // value-level edits don't count as shape changes
        assert_eq!(prog.cfg_version(), at_shape);
    }

    #[test]
    #[should_panic(expected = "at most two successors")]
    fn successor_cap_is_enforced() {
        std::panic::set_hook(Box::new(|_| {}));

        let mut prog = Program::new();
        let a = prog.create_block();
        let b = prog.create_block();
        let c = prog.create_block();
        let d = prog.create_block();

        prog.add_edge(a, b);
        prog.add_edge(a, c);
        prog.add_edge(a, d);
    }
}
