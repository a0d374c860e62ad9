//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

#![deny(
    unreachable_pub,
    missing_docs,
    missing_abi,
    rust_2018_idioms,
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links
)]
#![allow(unused_variables)]

//! # Garnet
//!
//! The shared SSA core for shader compiler backends: one function's
//! control-flow graph of basic blocks, and the analyses and lowering
//! passes that take it from SSA form to something a register machine can
//! execute.
//!
//! The [`lower`] helper runs the standard pipeline; everything it calls is
//! public, so a target backend can also assemble its own ordering from the
//! pieces:
//!
//! - [`analysis::DominatorTree`], [`analysis::LcaTable`],
//!   [`analysis::LoopAnalysis`] — dominance and loop structure
//! - [`transforms::cse`], [`transforms::dce`] — redundancy removal
//! - [`codegen::lower_phis`] — SSA destruction into parallel copies
//! - [`analysis::Liveness`] / [`analysis::mark_last_uses`] — what register
//!   allocation consumes
//! - [`codegen::form_clauses`] — final instruction grouping

pub mod analysis;
pub mod arena;
pub mod codegen;
pub mod ir;
pub mod transforms;
pub mod utility;

use crate::analysis::{mark_last_uses, DominatorTree, Liveness};
use crate::codegen::{form_clauses, lower_phis, Target};
use crate::ir::{verify_program, Program, VerifyError};
use crate::transforms::cse;
use log::debug;
use thiserror::Error;

/// Why [`lower`] refused a program.
///
/// Nothing here is recoverable at the shader level; the caller aborts this
/// one compilation and reports upwards.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum LowerError {
    /// The producer handed over structurally broken IR.
    #[error(transparent)]
    Malformed(#[from] VerifyError),
}

/// Runs the standard backend pipeline over one program.
///
/// In order: verification, dominator construction, common-subexpression
/// elimination, SSA destruction, liveness with last-use annotation, clause
/// formation against `target`. On success the program is phi-free, clause-
/// shaped, annotated with kill flags, and the solved [`Liveness`] is
/// returned for the register allocator downstream.
pub fn lower(prog: &mut Program, target: &dyn Target) -> Result<Liveness, LowerError> {
    verify_program(prog)?;

    let domtree = DominatorTree::compute(prog);
    let removed = cse(prog, &domtree);

    let copies = lower_phis(prog);

    let liveness = Liveness::compute(prog);
    mark_last_uses(prog, &liveness);

    let clauses = form_clauses(prog, target);

    debug!(
        "lowered program: {removed} exprs eliminated, {copies} parallel copies, {clauses} clauses"
    );

    Ok(liveness)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::GenericTarget;
    use crate::ir::{Instruction, Opcode, Operand, Phi, PhiSrc, ValueData};

    #[test]
    fn end_to_end_diamond() {
        let _ = env_logger::builder().is_test(true).try_init();

        //
        // block0:              v0 = cond, v1 = common subexpr
        //   branch v0 -> block1, block2
        // block1:              v2 = recomputed subexpr (cse fodder)
        // block2:              v3 = something else
        // block3:              v4 = phi(v2, v3), exported
        //
        let mut prog = Program::new();
        let entry = prog.create_block();
        let left = prog.create_block();
        let right = prog.create_block();
        let join = prog.create_block();

        prog.add_edge(entry, left);
        prog.add_edge(entry, right);
        prog.add_edge(left, join);
        prog.add_edge(right, join);

        let cond = prog.new_value(ValueData::scalar(32));
        let base = prog.new_value(ValueData::scalar(32));
        let common = prog.new_value(ValueData::scalar(32));
        let recomputed = prog.new_value(ValueData::scalar(32));
        let other = prog.new_value(ValueData::scalar(32));
        let merged = prog.new_value(ValueData::scalar(32));

        prog.append(entry, Instruction::new(Opcode::Mov, &[Operand::Imm(0)], &[cond]));
        prog.append(entry, Instruction::new(Opcode::Mov, &[Operand::Imm(10)], &[base]));
        prog.append(
            entry,
            Instruction::new(Opcode::IMul, &[base.into(), base.into()], &[common]),
        );
        prog.append(entry, Instruction::new(Opcode::Branch, &[cond.into()], &[]));

        prog.append(
            left,
            Instruction::new(Opcode::IMul, &[base.into(), base.into()], &[recomputed]),
        );
        prog.append(left, Instruction::new(Opcode::Jump, &[], &[]));

        prog.append(
            right,
            Instruction::new(Opcode::IAdd, &[base.into(), Operand::Imm(1)], &[other]),
        );
        prog.append(right, Instruction::new(Opcode::Jump, &[], &[]));

        prog.append_phi(
            join,
            Phi::new(merged, &[PhiSrc::Value(recomputed), PhiSrc::Value(other)]),
        );
        prog.append(
            join,
            Instruction::new(Opcode::Export, &[Operand::Imm(0), merged.into()], &[]),
        );

        let liveness = lower(&mut prog, &GenericTarget).expect("well-formed program");

        // no phis survive anywhere
        assert!(prog.blocks().all(|bb| prog.block(bb).phis().is_empty()));

        // the left arm's recomputation was eliminated, so its parallel
        // copy reads the entry's result instead
        let left_insts = prog.block(left).insts();
        let copy = &left_insts[left_insts.len() - 2];

        assert_eq!(copy.op(), Opcode::ParallelCopy);
        assert_eq!(copy.dests(), &[merged]);
        assert_eq!(copy.srcs()[0].operand, Operand::Value(common));
        assert!(left_insts.last().unwrap().op() == Opcode::Jump);

        // the right arm got its copy too
        let right_insts = prog.block(right).insts();

        assert!(right_insts
            .iter()
            .any(|inst| inst.op() == Opcode::ParallelCopy));

        // `merged` is live into the join and dies at the export
        assert!(liveness
            .live_in(join)
            .contains(liveness.value_location(merged)));

        let export = prog
            .block(join)
            .insts()
            .iter()
            .find(|inst| inst.op() == Opcode::Export)
            .unwrap();

        assert!(export.srcs()[1].kill);
    }

    #[test]
    fn malformed_programs_are_refused() {
        let mut prog = Program::new();
        let entry = prog.create_block();
        let next = prog.create_block();

        prog.add_edge(entry, next);

        let merged = prog.new_value(ValueData::scalar(32));

        prog.append(entry, Instruction::new(Opcode::Jump, &[], &[]));

        // wrong arity: two sources for one predecessor
        prog.append_phi(next, Phi::new(merged, &[PhiSrc::Undef, PhiSrc::Undef]));

        assert!(matches!(
            lower(&mut prog, &GenericTarget),
            Err(LowerError::Malformed(_))
        ));
    }
}
