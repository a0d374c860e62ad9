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
use crate::arena::{SecondaryMap, SecondarySet};
use crate::ir::{Block, Program};
use crate::utility::PackedOption;
use smallvec::SmallVec;

/// Maps every block to the innermost loop containing it.
///
/// A block H is a *loop header* if some back-edge terminates at H. A block
/// N belongs to the loop with header H if H dominates N and some back-edge
/// source C is reachable from N without going through H.
///
/// Register-pressure heuristics downstream weigh spill costs by loop depth,
/// which is where this analysis earns its keep.
pub struct LoopAnalysis {
    // innermost loop header per reachable block; headers map to themselves
    headers: SecondaryMap<Block, PackedOption<Block>>,
    has_loop: bool,
    cfg_version: u32,
}

impl LoopAnalysis {
    /// Computes loop information for a program.
    pub fn compute(prog: &Program, domtree: &DominatorTree) -> Self {
        debug_assert!(domtree.is_current(prog));

        let back_edges = find_back_edges(prog);
        let mut headers = SecondaryMap::new();

        for &block in domtree.postorder() {
            headers.insert(block, PackedOption::none());
        }

        if back_edges.is_empty() {
            return Self {
                headers,
                has_loop: false,
                cfg_version: prog.cfg_version(),
            };
        }

        // map each block N to the set of headers H with a back-edge (C, H)
        // where C is reachable from N without going through H. walking the
        // graph backwards from C does this in one sweep per back-edge.
        let mut is_header = SecondarySet::new();
        let mut node_loops: SecondaryMap<Block, SecondarySet<Block>> = SecondaryMap::new();

        for &block in domtree.postorder() {
            node_loops.insert(block, SecondarySet::new());
        }

        for &(c, h) in &back_edges {
            is_header.insert(h);

            let mut reaches = SecondarySet::new();
            let mut stack = vec![c];

            while let Some(n) = stack.pop() {
                if n == h || !reaches.insert(n) {
                    continue;
                }

                for &p in prog.block(n).preds() {
                    stack.push(p);
                }
            }

            for n in reaches.iter() {
                if node_loops.contains(n) {
                    node_loops[n].insert(h);
                }
            }
        }

        for &block in domtree.postorder() {
            if is_header.contains(block) {
                headers[block] = PackedOption::some(block);
                continue;
            }

            // walk up the dominator tree looking for the nearest header
            // whose loop this block sits inside
            let mut n = block;

            while let Some(dom) = domtree.idom(n) {
                if node_loops[block].contains(dom) && is_header.contains(dom) {
                    headers[block] = PackedOption::some(dom);
                    break;
                }

                n = dom;
            }
        }

        Self {
            headers,
            has_loop: true,
            cfg_version: prog.cfg_version(),
        }
    }

    /// Whether the CFG contains any loop at all.
    pub fn has_loop(&self) -> bool {
        self.has_loop
    }

    /// Whether `block` is a loop header.
    pub fn is_loop_header(&self, block: Block) -> bool {
        self.loop_header(block) == Some(block)
    }

    /// The header of the innermost loop containing `block`, if any.
    pub fn loop_header(&self, block: Block) -> Option<Block> {
        self.headers.get(block).and_then(|h| h.expand())
    }

    /// How many loops `block` sits inside. Blocks outside every loop have
    /// depth zero.
    pub fn loop_depth(&self, block: Block, domtree: &DominatorTree) -> usize {
        let mut depth = 0;
        let mut at = block;

        loop {
            let Some(header) = self.loop_header(at) else {
                return depth;
            };

            depth += 1;

            // a header is its own innermost header, so continue from the
            // header's dominator to find the enclosing loop
            match domtree.idom(header) {
                Some(dom) => at = dom,
                None => return depth,
            }
        }
    }

    /// The CFG version this analysis was computed at.
    pub fn cfg_version(&self) -> u32 {
        self.cfg_version
    }
}

// classifies CFG edges with one DFS: an edge (B, S) is a back-edge iff S is
// on the DFS stack when the edge is examined (entered but not yet exited)
fn find_back_edges(prog: &Program) -> Vec<(Block, Block)> {
    let mut entered = SecondarySet::new();
    let mut exited = SecondarySet::new();
    let mut back_edges = Vec::new();
    let mut stack: SmallVec<[(Block, usize); 16]> = SmallVec::new();

    entered.insert(prog.entry());
    stack.push((prog.entry(), 0));

    while let Some(&mut (block, ref mut next)) = stack.last_mut() {
        match prog.block(block).succs().get(*next).copied() {
            Some(succ) => {
                *next += 1;

                if entered.contains(succ) && !exited.contains(succ) {
                    back_edges.push((block, succ));
                } else if entered.insert(succ) {
                    stack.push((succ, 0));
                }
            }
            None => {
                exited.insert(block);
                stack.pop();
            }
        }
    }

    back_edges
}
