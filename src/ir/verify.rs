//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::SecondarySet;
use crate::ir::{Block, Opcode, Operand, Program, Value};
use thiserror::Error;

/// A structural defect found in a program handed to the backend.
///
/// Every one of these is a bug in the producer, not a property of the
/// shader being compiled: the correct reaction is to abort compiling this
/// program and report, never to patch around the defect.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum VerifyError {
    /// The entry block has incoming edges.
    #[error("entry block {0:?} has predecessors")]
    EntryHasPreds(Block),

    /// A value is listed as the output of more than one instruction or phi.
    #[error("value {0:?} is defined more than once")]
    MultipleDefs(Value),

    /// A value is read somewhere but no instruction or phi defines it.
    #[error("value {0:?} is referenced but never defined")]
    UndefinedValue(Value),

    /// An operand names a value the program never created.
    #[error("operand references value {0:?} which does not exist")]
    DanglingValue(Value),

    /// A phi's source count disagrees with its block's predecessor count.
    #[error("phi in {block:?} has {got} sources but the block has {want} predecessors")]
    PhiArity {
        /// The block holding the phi.
        block: Block,
        /// How many sources the phi has.
        got: usize,
        /// How many predecessors the block has.
        want: usize,
    },

    /// An edge is recorded in one direction but not the other.
    #[error("edge {from:?} -> {to:?} is not recorded consistently on both sides")]
    AsymmetricEdge {
        /// The edge's source block.
        from: Block,
        /// The edge's destination block.
        to: Block,
    },

    /// A terminator appears before the end of its block.
    #[error("block {0:?} has a terminator before its last instruction")]
    MisplacedTerminator(Block),

    /// A block's final instruction doesn't match its successor count.
    #[error("block {block:?} ends in {op:?} but has {succs} successors")]
    BadTerminator {
        /// The offending block.
        block: Block,
        /// Its final instruction's opcode, if it has any instructions.
        op: Option<Opcode>,
        /// Its successor count.
        succs: usize,
    },
}

/// Checks the structural contract a front end must uphold before the
/// backend will touch a program.
///
/// Verified here: the entry has no predecessors; predecessor/successor
/// lists agree edge-for-edge; every block's terminator is last and matches
/// its successor count (`jump` ⇔ one successor, `branch` ⇔ two, no
/// terminator ⇔ none); every phi has exactly one source per predecessor;
/// every value is defined exactly once and every referenced value has a
/// definition.
pub fn verify_program(prog: &Program) -> Result<(), VerifyError> {
    if !prog.block(prog.entry()).preds().is_empty() {
        return Err(VerifyError::EntryHasPreds(prog.entry()));
    }

    for block in prog.blocks() {
        let data = prog.block(block);

        // multi-edges are legal (a branch with both targets equal), so the
        // two directions have to agree on the *count* of each edge, not
        // just its existence
        for &succ in data.succs() {
            let fwd = data.succs().iter().filter(|s| **s == succ).count();
            let bwd = prog
                .block(succ)
                .preds()
                .iter()
                .filter(|p| **p == block)
                .count();

            if fwd != bwd {
                return Err(VerifyError::AsymmetricEdge {
                    from: block,
                    to: succ,
                });
            }
        }

        for &pred in data.preds() {
            let bwd = data.preds().iter().filter(|p| **p == pred).count();
            let fwd = prog
                .block(pred)
                .succs()
                .iter()
                .filter(|s| **s == block)
                .count();

            if fwd != bwd {
                return Err(VerifyError::AsymmetricEdge {
                    from: pred,
                    to: block,
                });
            }
        }

        for (i, inst) in data.insts().iter().enumerate() {
            if inst.op().is_terminator() && i + 1 != data.insts().len() {
                return Err(VerifyError::MisplacedTerminator(block));
            }
        }

        let terminator = data.terminator().map(|inst| inst.op());
        let wanted_succs = match terminator {
            Some(Opcode::Jump) => 1,
            Some(Opcode::Branch) => 2,
            _ => 0,
        };

        if data.succs().len() != wanted_succs {
            return Err(VerifyError::BadTerminator {
                block,
                op: data.insts().last().map(|inst| inst.op()),
                succs: data.succs().len(),
            });
        }

        for phi in data.phis() {
            if phi.srcs().len() != data.preds().len() {
                return Err(VerifyError::PhiArity {
                    block,
                    got: phi.srcs().len(),
                    want: data.preds().len(),
                });
            }
        }
    }

    let mut defined = SecondarySet::new();

    for block in prog.blocks() {
        let data = prog.block(block);
        let defs = data
            .phis()
            .iter()
            .map(|phi| phi.dest())
            .chain(data.insts().iter().flat_map(|inst| inst.dests().iter().copied()));

        for dest in defs {
            if !prog.is_value(dest) {
                return Err(VerifyError::DanglingValue(dest));
            }

            if !defined.insert(dest) {
                return Err(VerifyError::MultipleDefs(dest));
            }
        }
    }

    for block in prog.blocks() {
        let data = prog.block(block);
        let phi_uses = data.phis().iter().flat_map(|phi| phi.srcs().iter().filter_map(|src| src.as_value()));
        let inst_uses = data.insts().iter().flat_map(|inst| {
            inst.srcs().iter().filter_map(|src| match src.operand {
                Operand::Value(value) => Some(value),
                _ => None,
            })
        });

        for used in phi_uses.chain(inst_uses) {
            if !prog.is_value(used) {
                return Err(VerifyError::DanglingValue(used));
            }

            if !defined.contains(used) {
                return Err(VerifyError::UndefinedValue(used));
            }
        }
    }

    Ok(())
}
