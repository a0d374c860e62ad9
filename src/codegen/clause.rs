//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::codegen::{ClauseKind, Target};
use crate::ir::{Block, Instruction, Program};
use log::debug;
use std::mem;

/// Groups each block's instructions into clauses: maximal runs of
/// consecutive, same-category, mutually compatible instructions, each run
/// announced by a marker instruction carrying its length.
///
/// One linear walk per block with a small accumulation buffer. An
/// instruction flushes the running buffer when its category differs, when
/// the buffer is at the target's length cap, or when the target's pairing
/// predicate rejects it against the buffer's first member. Instructions
/// with no category bypass clause formation entirely (flushing first —
/// categories are mutually exclusive, so an ineligible instruction always
/// ends an eligible run). Runs of length one get no marker.
///
/// Nothing is reordered, ever: strip the markers back out and the original
/// instruction sequence reappears exactly. That is what makes this safe to
/// run dead last, after liveness annotations are already attached.
///
/// Returns the number of clause markers emitted.
pub fn form_clauses(prog: &mut Program, target: &dyn Target) -> usize {
    let blocks: Vec<Block> = prog.blocks().collect();
    let max_len = target.max_clause_len();
    let mut markers = 0;

    assert!(max_len >= 1, "clause capacity must be at least one");

    for &block in &blocks {
        let insts = mem::take(prog.block_mut(block).insts_mut());
        let mut out = Vec::with_capacity(insts.len() + insts.len() / max_len + 1);
        let mut buffer: Vec<Instruction> = Vec::with_capacity(max_len);
        let mut running: Option<ClauseKind> = None;

        for inst in insts {
            match target.clause_kind(&inst) {
                None => {
                    markers += flush(&mut out, &mut buffer);
                    running = None;
                    out.push(inst);
                }
                Some(kind) => {
                    let breaks = running != Some(kind)
                        || buffer.len() >= max_len
                        || !buffer
                            .first()
                            .map_or(true, |first| target.can_pair(first, &inst));

                    if breaks {
                        markers += flush(&mut out, &mut buffer);
                    }

                    running = Some(kind);
                    buffer.push(inst);
                }
            }
        }

        markers += flush(&mut out, &mut buffer);
        *prog.block_mut(block).insts_mut() = out;
    }

    debug!("clause formation emitted {markers} markers");

    markers
}

// emits the buffered run, preceded by a marker when it has more than one
// member. returns how many markers were emitted (0 or 1).
fn flush(out: &mut Vec<Instruction>, buffer: &mut Vec<Instruction>) -> usize {
    let marked = buffer.len() > 1;

    if marked {
        out.push(Instruction::clause_header(buffer.len() as u64));
    }

    out.append(buffer);

    usize::from(marked)
}
