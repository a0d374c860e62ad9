//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::{ArenaKey, SecondaryMap, SecondarySet};
use crate::ir::{Block, Instruction, Operand, PhysReg, Program, Value};
use crate::utility::BitSet;
use log::trace;
use smallvec::SmallVec;
use std::collections::VecDeque;

/// Per-block liveness information: which storage locations may still be
/// read when control enters a block, and which may still be read after it
/// leaves.
///
/// A "location" is either an SSA value or a fixed physical register; both
/// live in one index space (values first, then registers), so the same sets
/// serve the virtual-register stage and physically-constrained IR alike.
/// A value pinned to a fixed register occupies both its own slot and the
/// register's.
///
/// # Implementation
/// Classic backward dataflow, solved with a worklist that holds each block
/// at most once. A block's live-out is the union of its successors'
/// live-ins; its live-in is the live-out run backwards through the block
/// (definitions kill, uses generate). Sets only ever grow, so the fixed
/// point is the least one and termination is bounded by the number of
/// locations.
///
/// Programs handed to this analysis must not contain phis: run SSA
/// elimination first. (A phi's sources are live per-edge, not per-block,
/// and everything downstream of this analysis consumes phi-free programs
/// anyway.)
pub struct Liveness {
    live_in: SecondaryMap<Block, BitSet>,
    live_out: SecondaryMap<Block, BitSet>,
    num_values: usize,
    cfg_version: u32,
}

impl Liveness {
    /// Solves the liveness equations for `prog`.
    pub fn compute(prog: &Program) -> Self {
        let num_values = prog.num_values();
        let mut live_in: SecondaryMap<Block, BitSet> = SecondaryMap::new();
        let mut live_out: SecondaryMap<Block, BitSet> = SecondaryMap::new();

        for block in prog.blocks() {
            debug_assert!(
                prog.block(block).phis().is_empty(),
                "liveness runs on phi-free programs"
            );

            live_in.insert(block, BitSet::new());
            live_out.insert(block, BitSet::new());
        }

        // FIFO worklist that holds each block at most once. seeded with
        // every block, in reverse program order since information flows
        // backwards.
        let mut queue: VecDeque<Block> = prog.blocks().collect();
        let mut queued = SecondarySet::new();

        queue.make_contiguous().reverse();

        for block in prog.blocks() {
            queued.insert(block);
        }

        let mut steps = 0usize;
        let cap = prog.num_blocks() * (num_values + prog.num_blocks() + 2) * 2 + 16;

        while let Some(block) = queue.pop_front() {
            queued.remove(block);
            steps += 1;

            assert!(steps <= cap, "liveness failed to converge");

            let data = prog.block(block);

            // live-out = union of successor live-ins
            let mut live = BitSet::with_capacity(num_values);

            for &succ in data.succs() {
                live.union_with(&live_in[succ]);
            }

            live_out[block] = live.clone();

            // run the block backwards: kill definitions, generate uses
            for inst in data.insts().iter().rev() {
                transfer(prog, num_values, inst, &mut live);
            }

            if live != live_in[block] {
                live_in[block] = live;

                for &pred in data.preds() {
                    if queued.insert(pred) {
                        queue.push_back(pred);
                    }
                }
            }
        }

        trace!("liveness converged after {steps} block visits");

        Self {
            live_in,
            live_out,
            num_values,
            cfg_version: prog.cfg_version(),
        }
    }

    /// The locations that may be read on some path from the top of `block`
    /// before being overwritten.
    pub fn live_in(&self, block: Block) -> &BitSet {
        &self.live_in[block]
    }

    /// The locations that may be read on some path after `block` exits.
    pub fn live_out(&self, block: Block) -> &BitSet {
        &self.live_out[block]
    }

    /// The location index of an SSA value.
    pub fn value_location(&self, value: Value) -> usize {
        value.index()
    }

    /// The location index of a fixed physical register.
    pub fn fixed_location(&self, reg: PhysReg) -> usize {
        self.num_values + reg.number() as usize
    }

    /// The CFG version this analysis was computed at.
    pub fn cfg_version(&self) -> u32 {
        self.cfg_version
    }

    /// Checks that this analysis still describes `prog`'s CFG.
    pub fn is_current(&self, prog: &Program) -> bool {
        self.cfg_version == prog.cfg_version()
    }
}

// the locations an instruction writes
fn def_locations(prog: &Program, num_values: usize, inst: &Instruction) -> SmallVec<[usize; 4]> {
    let mut locs = SmallVec::new();

    for &dest in inst.dests() {
        locs.push(dest.index());

        if let Some(reg) = prog.value(dest).fixed() {
            locs.push(num_values + reg.number() as usize);
        }
    }

    locs
}

// the locations one source operand reads
fn use_locations(
    prog: &Program,
    num_values: usize,
    operand: Operand,
) -> SmallVec<[usize; 2]> {
    let mut locs = SmallVec::new();

    match operand {
        Operand::Value(value) => {
            locs.push(value.index());

            if let Some(reg) = prog.value(value).fixed() {
                locs.push(num_values + reg.number() as usize);
            }
        }
        Operand::Fixed(reg) => locs.push(num_values + reg.number() as usize),
        Operand::Imm(_) => {}
    }

    locs
}

fn transfer(prog: &Program, num_values: usize, inst: &Instruction, live: &mut BitSet) {
    for loc in def_locations(prog, num_values, inst) {
        live.remove(loc);
    }

    for src in inst.srcs() {
        for loc in use_locations(prog, num_values, src.operand) {
            live.insert(loc);
        }
    }
}

/// Annotates every source operand in `prog` with its last-use flag.
///
/// A source is a *kill* when its storage is dead immediately after the
/// instruction reads it — either nothing downstream reads it again, or the
/// very same instruction overwrites it. A location that is simultaneously
/// a source and a destination of one instruction is dead-on-read: the old
/// contents are gone the moment the instruction executes, whatever happens
/// to the new ones.
///
/// One extra reverse pass per block over the solved [`Liveness`] sets.
pub fn mark_last_uses(prog: &mut Program, liveness: &Liveness) {
    debug_assert!(liveness.is_current(prog));

    let num_values = liveness.num_values;
    let blocks: Vec<Block> = prog.blocks().collect();

    for block in blocks {
        let mut live = liveness.live_out(block).clone();
        let num_insts = prog.block(block).insts().len();

        for idx in (0..num_insts).rev() {
            // resolve locations against the value table before mutating
            // the instruction
            let (def_locs, src_locs) = {
                let inst = &prog.block(block).insts()[idx];
                let defs = def_locations(prog, num_values, inst);
                let uses: SmallVec<[SmallVec<[usize; 2]>; 3]> = inst
                    .srcs()
                    .iter()
                    .map(|src| use_locations(prog, num_values, src.operand))
                    .collect();

                (defs, uses)
            };

            // `live` holds the locations live *after* this instruction
            let kills: SmallVec<[bool; 3]> = src_locs
                .iter()
                .map(|locs| {
                    !locs.is_empty()
                        && (locs.iter().all(|loc| !live.contains(*loc))
                            || locs.iter().any(|loc| def_locs.contains(loc)))
                })
                .collect();

            let inst = &mut prog.block_mut(block).insts_mut()[idx];

            for (src, kill) in inst.srcs_mut().iter_mut().zip(kills) {
                src.kill = kill;
            }

            // step the live set over the instruction for the next
            // (earlier) one
            for loc in def_locs {
                live.remove(loc);
            }

            for loc in src_locs.into_iter().flatten() {
                live.insert(loc);
            }
        }
    }
}
