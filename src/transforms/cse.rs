//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::analysis::DominatorTree;
use crate::arena::SecondaryMap;
use crate::ir::{Block, Instruction, Opcode, Operand, PhysReg, Program, Value};
use crate::utility::SaHashMap;
use log::debug;
use smallvec::SmallVec;

/// Removes pure instructions whose computation is already available from a
/// dominating instruction, rewriting every use to the surviving result.
///
/// One linear walk over the reachable blocks in reverse postorder,
/// against a single hash table of "expressions seen so far":
///
/// - no table entry for an instruction's expression: record it, move on
/// - a dominating entry exists: the instruction is redundant — it is
///   deleted and its results forwarded to the entry's
/// - an entry exists but does not dominate: the newcomer takes over the
///   table slot (later blocks dominated by *it* will find it) but nobody
///   is deleted
///
/// A single run deliberately does not chase redundancy that only becomes
/// visible through its own rewrites — every lookup keys on operands as
/// they were when the instruction was visited. Running the pass twice is
/// safe, idempotent at the fixed point, and picks up that second-order
/// redundancy; one run is the cheap default.
///
/// Instructions with ordering-sensitive effects never participate, in
/// either direction. Returns the number of instructions removed.
pub fn cse(prog: &mut Program, domtree: &DominatorTree) -> usize {
    debug_assert!(domtree.is_current(prog));

    let mut table: SaHashMap<ExprKey, Occurrence> = SaHashMap::default();
    let mut forwarded: SecondaryMap<Value, Value> = SecondaryMap::new();
    let mut dead: SecondaryMap<Block, Vec<usize>> = SecondaryMap::new();

    // the walk must see definitions before the uses it rewrites, which
    // reverse postorder over the reachable blocks guarantees. unreachable
    // code can't be redundant *with* anything and is left alone.
    for block in domtree.reverse_postorder() {
        for idx in 0..prog.block(block).insts().len() {
            let inst = &prog.block(block).insts()[idx];

            if !inst.op().is_pure() {
                continue;
            }

            let key = ExprKey::of(prog, inst);

            match table.get(&key) {
                Some(existing) if domtree.dominates(existing.block, block) => {
                    // within one block "dominates" still holds, and the
                    // entry is always the earlier occurrence there since
                    // instructions are visited in order
                    for (&mine, &theirs) in inst.dests().iter().zip(existing.dests.iter()) {
                        forwarded.insert(mine, theirs);
                    }

                    match dead.get_mut(block) {
                        Some(indices) => indices.push(idx),
                        None => {
                            dead.insert(block, vec![idx]);
                        }
                    }
                }
                _ => {
                    table.insert(
                        key,
                        Occurrence {
                            block,
                            dests: SmallVec::from_slice(inst.dests()),
                        },
                    );
                }
            }
        }
    }

    if dead.is_empty() {
        return 0;
    }

    // global sweep: uses of a deleted result may be anywhere, including
    // phi sources, so everything gets rewritten
    let blocks: Vec<Block> = prog.blocks().collect();

    for &block in &blocks {
        let data = prog.block_mut(block);

        for phi in data.phis_mut() {
            for src in phi.srcs_mut() {
                if let Some(value) = src.as_value() {
                    if let Some(&survivor) = forwarded.get(value) {
                        debug_assert!(!forwarded.contains(survivor));

                        *src = crate::ir::PhiSrc::Value(survivor);
                    }
                }
            }
        }

        for inst in data.insts_mut() {
            for src in inst.srcs_mut() {
                if let Operand::Value(value) = src.operand {
                    if let Some(&survivor) = forwarded.get(value) {
                        debug_assert!(!forwarded.contains(survivor));

                        src.operand = Operand::Value(survivor);
                    }
                }
            }
        }
    }

    // excise the redundant instructions, per block, back to front so the
    // recorded indices stay valid
    let mut removed = 0;

    for &block in &blocks {
        if let Some(indices) = dead.remove(block) {
            let insts = prog.block_mut(block).insts_mut();

            for idx in indices.into_iter().rev() {
                insts.remove(idx);
                removed += 1;
            }
        }
    }

    debug!("cse removed {removed} redundant instructions");

    removed
}

/// Structural identity of a pure computation: the operation, any fixed
/// storage its outputs are constrained to, and each input's kind and
/// identity. Commutative inputs are put in a canonical order first so that
/// `a + b` and `b + a` collide.
#[derive(Clone, Hash, Eq, PartialEq)]
struct ExprKey {
    op: Opcode,
    dest_constraints: SmallVec<[Option<PhysReg>; 2]>,
    srcs: SmallVec<[Operand; 3]>,
}

impl ExprKey {
    fn of(prog: &Program, inst: &Instruction) -> Self {
        let mut srcs: SmallVec<[Operand; 3]> =
            inst.srcs().iter().map(|src| src.operand).collect();
        let prefix = inst.op().commutative_prefix().min(srcs.len());

        srcs[..prefix].sort_unstable();

        Self {
            op: inst.op(),
            dest_constraints: inst
                .dests()
                .iter()
                .map(|dest| prog.value(*dest).fixed())
                .collect(),
            srcs,
        }
    }
}

struct Occurrence {
    block: Block,
    dests: SmallVec<[Value; 2]>,
}
