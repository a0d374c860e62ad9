//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::SecondaryMap;
use crate::ir::{Block, Instruction, Operand, PhysReg, Program, Value};
use crate::utility::{SaHashMap, SaHashSet};
use log::debug;
use smallvec::SmallVec;

/// Removes every phi from the program by materializing its per-edge
/// assignments as parallel copies in the predecessors.
///
/// For each phi and each predecessor edge carrying a defined value, the
/// assignment `phi output <- incoming value` is bucketed by predecessor.
/// Each predecessor with a non-empty bucket then gets exactly one
/// [`parallel copy`](Instruction::parallel_copy) spliced in *immediately
/// before its terminator* — the copies must execute before control leaves
/// along the edge, and nothing after a terminator executes at all.
///
/// The copy is one simultaneous operation: every source reads before any
/// destination writes, so overlapping copy sets are safe by construction.
/// What the eventual lowering *does* need to know is whether the set
/// contains a cyclic permutation — that cannot be turned into a move
/// sequence without one scratch location, and the synthesized instruction
/// carries a [`needs_scratch`](Instruction::needs_scratch) flag computed
/// per copy set to say so.
///
/// Undefined phi inputs contribute no copy: whatever the destination holds
/// along that edge was never observable. An input already pinned to the
/// same storage as the output also contributes no copy.
///
/// Panics if a phi's source count disagrees with its block's predecessor
/// count; that is a producer bug, not an input condition.
///
/// Returns the number of parallel copies inserted.
pub fn lower_phis(prog: &mut Program) -> usize {
    let blocks: Vec<Block> = prog.blocks().collect();
    let mut buckets: SecondaryMap<Block, Vec<(Value, Value)>> = SecondaryMap::new();

    for &block in &blocks {
        let data = prog.block(block);

        for phi in data.phis() {
            assert_eq!(
                phi.srcs().len(),
                data.preds().len(),
                "phi source count must match predecessor count"
            );

            for (edge, src) in phi.srcs().iter().enumerate() {
                let Some(incoming) = src.as_value() else {
                    continue;
                };

                if same_storage(prog, phi.dest(), incoming) {
                    continue;
                }

                let pred = data.preds()[edge];

                match buckets.get_mut(pred) {
                    Some(pairs) => pairs.push((phi.dest(), incoming)),
                    None => {
                        buckets.insert(pred, vec![(phi.dest(), incoming)]);
                    }
                }
            }
        }
    }

    for &block in &blocks {
        prog.block_mut(block).phis_mut().clear();
    }

    let mut emitted = 0;

    for &block in &blocks {
        let Some(pairs) = buckets.remove(block) else {
            continue;
        };

        debug_assert!(!pairs.is_empty());

        let dests: SmallVec<[Value; 4]> = pairs.iter().map(|&(dest, _)| dest).collect();
        let srcs: SmallVec<[Operand; 4]> =
            pairs.iter().map(|&(_, src)| Operand::Value(src)).collect();

        let mut copy = Instruction::parallel_copy(&dests, &srcs);

        copy.set_needs_scratch(copy_set_has_cycle(prog, &pairs));

        // before the branch, not after: control must still be in this
        // block when the copies execute
        let insts = prog.block_mut(block).insts_mut();
        let at = match insts.last() {
            Some(last) if last.op().is_terminator() => insts.len() - 1,
            _ => insts.len(),
        };

        insts.insert(at, copy);
        emitted += 1;
    }

    debug!("ssa elimination inserted {emitted} parallel copies");

    emitted
}

// two values occupy the same storage only when both are pinned to the
// same physical register; distinct SSA values never otherwise alias
fn same_storage(prog: &Program, a: Value, b: Value) -> bool {
    match (prog.value(a).fixed(), prog.value(b).fixed()) {
        (Some(ra), Some(rb)) => ra == rb,
        _ => false,
    }
}

// the storage a copy endpoint actually touches: its pinned register if it
// has one, the value itself otherwise
#[derive(Copy, Clone, Hash, Eq, PartialEq)]
enum CopyLoc {
    Val(Value),
    Reg(PhysReg),
}

fn copy_loc(prog: &Program, value: Value) -> CopyLoc {
    match prog.value(value).fixed() {
        Some(reg) => CopyLoc::Reg(reg),
        None => CopyLoc::Val(value),
    }
}

// a copy set needs scratch iff following dest -> src links ever comes back
// around: every endpoint has at most one outgoing link, so one walk per
// unvisited endpoint suffices
fn copy_set_has_cycle(prog: &Program, pairs: &[(Value, Value)]) -> bool {
    let mut links: SaHashMap<CopyLoc, CopyLoc> = SaHashMap::default();

    for &(dest, src) in pairs {
        let prev = links.insert(copy_loc(prog, dest), copy_loc(prog, src));

        debug_assert!(prev.is_none(), "two copies write the same storage");
    }

    let mut done: SaHashSet<CopyLoc> = SaHashSet::default();

    for &start in links.keys() {
        if done.contains(&start) {
            continue;
        }

        let mut path: SaHashSet<CopyLoc> = SaHashSet::default();
        let mut at = start;

        loop {
            if !path.insert(at) {
                return true;
            }

            match links.get(&at) {
                Some(&next) if !done.contains(&next) => at = next,
                _ => break,
            }
        }

        done.extend(path);
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Opcode, Phi, PhiSrc, ValueData};

    fn value(prog: &mut Program) -> Value {
        prog.new_value(ValueData::scalar(32))
    }

    fn count_pcopies(prog: &Program, block: Block) -> usize {
        prog.block(block)
            .insts()
            .iter()
            .filter(|inst| inst.op() == Opcode::ParallelCopy)
            .count()
    }

    #[test]
    fn diamond_phi_becomes_one_copy_per_arm() {
        let mut prog = Program::new();
        let entry = prog.create_block();
        let left = prog.create_block();
        let right = prog.create_block();
        let join = prog.create_block();

        prog.add_edge(entry, left);
        prog.add_edge(entry, right);
        prog.add_edge(left, join);
        prog.add_edge(right, join);

        let cond = value(&mut prog);
        let a = value(&mut prog);
        let b = value(&mut prog);
        let merged = value(&mut prog);

        prog.append(entry, Instruction::new(Opcode::Mov, &[Operand::Imm(0)], &[cond]));
        prog.append(entry, Instruction::new(Opcode::Branch, &[cond.into()], &[]));
        prog.append(left, Instruction::new(Opcode::Mov, &[Operand::Imm(1)], &[a]));
        prog.append(left, Instruction::new(Opcode::Jump, &[], &[]));
        prog.append(right, Instruction::new(Opcode::Mov, &[Operand::Imm(2)], &[b]));
        prog.append(right, Instruction::new(Opcode::Jump, &[], &[]));
        prog.append(join, Instruction::new(Opcode::Export, &[Operand::Imm(0), merged.into()], &[]));
        prog.append_phi(join, Phi::new(merged, &[PhiSrc::Value(a), PhiSrc::Value(b)]));

        assert_eq!(lower_phis(&mut prog), 2);

        // no phis anywhere afterwards
        assert!(prog.blocks().all(|bb| prog.block(bb).phis().is_empty()));

        // each arm has exactly one parallel copy, immediately before its
        // terminator
        for (arm, incoming) in [(left, a), (right, b)] {
            assert_eq!(count_pcopies(&prog, arm), 1);

            let insts = prog.block(arm).insts();
            let copy = &insts[insts.len() - 2];

            assert_eq!(copy.op(), Opcode::ParallelCopy);
            assert_eq!(copy.dests(), &[merged]);
            assert_eq!(copy.srcs()[0].operand, Operand::Value(incoming));
            assert!(!copy.needs_scratch());
            assert!(insts.last().unwrap().op().is_terminator());
        }

        assert_eq!(count_pcopies(&prog, entry), 0);
        assert_eq!(count_pcopies(&prog, join), 0);
    }

    #[test]
    fn undef_inputs_contribute_no_copy() {
        let mut prog = Program::new();
        let entry = prog.create_block();
        let left = prog.create_block();
        let right = prog.create_block();
        let join = prog.create_block();

        prog.add_edge(entry, left);
        prog.add_edge(entry, right);
        prog.add_edge(left, join);
        prog.add_edge(right, join);

        let cond = value(&mut prog);
        let a = value(&mut prog);
        let merged = value(&mut prog);

        prog.append(entry, Instruction::new(Opcode::Mov, &[Operand::Imm(0)], &[cond]));
        prog.append(entry, Instruction::new(Opcode::Branch, &[cond.into()], &[]));
        prog.append(left, Instruction::new(Opcode::Mov, &[Operand::Imm(1)], &[a]));
        prog.append(left, Instruction::new(Opcode::Jump, &[], &[]));
        prog.append(right, Instruction::new(Opcode::Jump, &[], &[]));
        prog.append_phi(join, Phi::new(merged, &[PhiSrc::Value(a), PhiSrc::Undef]));

        assert_eq!(lower_phis(&mut prog), 1);
        assert_eq!(count_pcopies(&prog, left), 1);
        assert_eq!(count_pcopies(&prog, right), 0);
    }

    #[test]
    fn swap_cycle_sets_needs_scratch() {
        // a loop whose two phis swap each trip around: the latch's copy
        // set is the permutation (x y), which needs a temporary
        let mut prog = Program::new();
        let entry = prog.create_block();
        let header = prog.create_block();
        let exit = prog.create_block();

        prog.add_edge(entry, header);
        prog.add_edge(header, header);
        prog.add_edge(header, exit);

        let x0 = value(&mut prog);
        let y0 = value(&mut prog);
        let x = value(&mut prog);
        let y = value(&mut prog);
        let cond = value(&mut prog);

        prog.append(entry, Instruction::new(Opcode::Mov, &[Operand::Imm(1)], &[x0]));
        prog.append(entry, Instruction::new(Opcode::Mov, &[Operand::Imm(2)], &[y0]));
        prog.append(entry, Instruction::new(Opcode::Jump, &[], &[]));

        prog.append_phi(header, Phi::new(x, &[PhiSrc::Value(x0), PhiSrc::Value(y)]));
        prog.append_phi(header, Phi::new(y, &[PhiSrc::Value(y0), PhiSrc::Value(x)]));
        prog.append(header, Instruction::new(Opcode::IAdd, &[x.into(), y.into()], &[cond]));
        prog.append(header, Instruction::new(Opcode::Branch, &[cond.into()], &[]));

        assert_eq!(lower_phis(&mut prog), 2);

        // the entry's copy set {x <- x0, y <- y0} is cycle-free
        let entry_insts = prog.block(entry).insts();
        let entry_copy = &entry_insts[entry_insts.len() - 2];

        assert_eq!(entry_copy.op(), Opcode::ParallelCopy);
        assert!(!entry_copy.needs_scratch());

        // the header's own copy set {x <- y, y <- x} is the swap
        let header_insts = prog.block(header).insts();
        let header_copy = &header_insts[header_insts.len() - 2];

        assert_eq!(header_copy.op(), Opcode::ParallelCopy);
        assert_eq!(header_copy.dests().len(), 2);
        assert!(header_copy.needs_scratch());
    }

    #[test]
    fn chains_are_not_cycles() {
        // x <- y, y <- z is a chain: order matters to a naive lowering,
        // but simultaneity alone handles it without scratch
        let mut prog = Program::new();
        let entry = prog.create_block();
        let header = prog.create_block();
        let exit = prog.create_block();

        prog.add_edge(entry, header);
        prog.add_edge(header, header);
        prog.add_edge(header, exit);

        let x0 = value(&mut prog);
        let y0 = value(&mut prog);
        let z = value(&mut prog);
        let x = value(&mut prog);
        let y = value(&mut prog);

        prog.append(entry, Instruction::new(Opcode::Mov, &[Operand::Imm(1)], &[x0]));
        prog.append(entry, Instruction::new(Opcode::Mov, &[Operand::Imm(2)], &[y0]));
        prog.append(entry, Instruction::new(Opcode::Jump, &[], &[]));

        prog.append_phi(header, Phi::new(x, &[PhiSrc::Value(x0), PhiSrc::Value(y)]));
        prog.append_phi(header, Phi::new(y, &[PhiSrc::Value(y0), PhiSrc::Value(z)]));
        prog.append(header, Instruction::new(Opcode::IAdd, &[x.into(), y.into()], &[z]));
        prog.append(header, Instruction::new(Opcode::Branch, &[z.into()], &[]));

        assert_eq!(lower_phis(&mut prog), 2);

        let header_insts = prog.block(header).insts();
        let header_copy = &header_insts[header_insts.len() - 2];

        assert!(!header_copy.needs_scratch());
    }

    #[test]
    fn identical_pinned_storage_is_skipped() {
        let mut prog = Program::new();
        let entry = prog.create_block();
        let next = prog.create_block();

        prog.add_edge(entry, next);

        let reg = PhysReg::new(4);
        let incoming = prog.new_value(ValueData::scalar(32).with_fixed(reg));
        let merged = prog.new_value(ValueData::scalar(32).with_fixed(reg));

        prog.append(entry, Instruction::new(Opcode::Mov, &[Operand::Imm(1)], &[incoming]));
        prog.append(entry, Instruction::new(Opcode::Jump, &[], &[]));
        prog.append_phi(next, Phi::new(merged, &[PhiSrc::Value(incoming)]));

        // the value is already where the phi wants it
        assert_eq!(lower_phis(&mut prog), 0);
        assert!(prog.block(next).phis().is_empty());
    }

    #[test]
    #[should_panic(expected = "phi source count must match predecessor count")]
    fn phi_arity_mismatch_fails_fast() {
        std::panic::set_hook(Box::new(|_| {}));

        let mut prog = Program::new();
        let entry = prog.create_block();
        let next = prog.create_block();

        prog.add_edge(entry, next);

        let a = value(&mut prog);
        let merged = value(&mut prog);

        prog.append(entry, Instruction::new(Opcode::Mov, &[Operand::Imm(1)], &[a]));
        prog.append(entry, Instruction::new(Opcode::Jump, &[], &[]));

        // two sources, one predecessor
        prog.append_phi(next, Phi::new(merged, &[PhiSrc::Value(a), PhiSrc::Value(a)]));

        let _ = lower_phis(&mut prog);
    }
}
