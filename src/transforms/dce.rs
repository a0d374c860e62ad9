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
use crate::ir::{Block, Program, Value};
use log::debug;

/// Deletes pure instructions (and phis) whose results are never read,
/// iterated until nothing else falls out.
///
/// This is the trivial flavor of dead-code elimination: anything with a
/// remaining use survives, so a web of phis that only feed each other is
/// conservatively kept. Instructions with side effects and terminators are
/// always kept. Block-level unreachability is out of scope here — it is a
/// CFG-shape change and belongs to whoever owns the graph's shape.
///
/// Returns the total number of instructions and phis removed.
pub fn dce(prog: &mut Program) -> usize {
    let blocks: Vec<Block> = prog.blocks().collect();
    let mut removed_total = 0;

    loop {
        // everything read by any surviving phi or instruction
        let mut used: SecondarySet<Value> = SecondarySet::new();

        for &block in &blocks {
            let data = prog.block(block);

            for phi in data.phis() {
                for src in phi.srcs() {
                    if let Some(value) = src.as_value() {
                        used.insert(value);
                    }
                }
            }

            for inst in data.insts() {
                for value in inst.value_uses() {
                    used.insert(value);
                }
            }
        }

        let mut removed = 0;

        for &block in &blocks {
            let data = prog.block_mut(block);

            let phis_before = data.phis().len();
            data.phis_mut().retain(|phi| used.contains(phi.dest()));
            removed += phis_before - data.phis().len();

            let insts_before = data.insts().len();
            data.insts_mut().retain(|inst| {
                !inst.op().is_pure() || inst.dests().iter().any(|dest| used.contains(*dest))
            });
            removed += insts_before - data.insts().len();
        }

        removed_total += removed;

        if removed == 0 {
            break;
        }
    }

    if removed_total > 0 {
        debug!("dce removed {removed_total} dead instructions");
    }

    removed_total
}
