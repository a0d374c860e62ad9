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
use crate::ir::{Block, Program};
use crate::utility::PackedOption;
use log::trace;
use smallvec::SmallVec;

/// Models the dominator tree for a program's control-flow graph. This
/// analysis also gives a valid postorder of the reachable blocks (required
/// for computing dominance, and useful to other passes on its own).
///
/// # Implementation
/// The fixed point is the algorithm described in "A Simple, Fast Dominance
/// Algorithm" by Cooper et. al.
///
/// On top of the immediate-dominator links this computes, per reachable
/// block, the list of dominator-tree children (one flat array, sized by a
/// counting pass and filled in a second pass) and a DFS pre/post index pair
/// over the tree. The index pair makes dominance queries a pair of integer
/// comparisons:
///
/// `A` dominates `B` iff `pre(A) <= pre(B)` and `post(B) <= post(A)`.
///
/// Unreachable blocks get `pre = u32::MAX, post = 0`, which makes them
/// dominated by everything and dominating nothing except each other — the
/// interval test handles them with zero extra work, and every consumer of
/// this analysis inherits that behavior.
pub struct DominatorTree {
    // maps B -> idom(B) for reachable B. the entry maps to `none`, and
    // unreachable blocks are absent entirely.
    idoms: SecondaryMap<Block, PackedOption<Block>>,
    // a valid postorder of the reachable blocks
    postorder: Vec<Block>,
    pre_index: SecondaryMap<Block, u32>,
    post_index: SecondaryMap<Block, u32>,
    // dominator-tree children of every reachable block, grouped per block.
    // `child_range` gives the (start, len) of a block's group.
    children: Vec<Block>,
    child_range: SecondaryMap<Block, (u32, u32)>,
    cfg_version: u32,
}

impl DominatorTree {
    /// Computes dominance information for a program.
    pub fn compute(prog: &Program) -> Self {
        let po = compute_postorder(prog);
        let idoms = compute_idoms(prog, &po);
        let (children, child_range) = compute_children(&po, &idoms);
        let (pre_index, post_index) = compute_dfs_indices(&po, &children, &child_range);

        trace!(
            "dominator tree: {} reachable of {} blocks",
            po.len(),
            prog.num_blocks()
        );

        Self {
            idoms,
            postorder: po,
            pre_index,
            post_index,
            children,
            child_range,
            cfg_version: prog.cfg_version(),
        }
    }

    /// Returns the root (entry) node of the CFG.
    pub fn root(&self) -> Block {
        self.postorder
            .last()
            .copied()
            .expect("should have a root node")
    }

    /// Gets the immediate dominator of `block`, if one exists. The entry
    /// block and unreachable blocks have none.
    pub fn idom(&self, block: Block) -> Option<Block> {
        self.idoms.get(block).and_then(|idom| idom.expand())
    }

    /// Checks if a block is reachable from the entry node.
    pub fn is_reachable(&self, block: Block) -> bool {
        self.idoms.contains(block)
    }

    /// The block's preorder index in a DFS of the dominator tree.
    /// `u32::MAX` for unreachable blocks.
    pub fn pre_index(&self, block: Block) -> u32 {
        self.pre_index.get(block).copied().unwrap_or(u32::MAX)
    }

    /// The block's postorder index in a DFS of the dominator tree.
    /// `0` for unreachable blocks.
    pub fn post_index(&self, block: Block) -> u32 {
        self.post_index.get(block).copied().unwrap_or(0)
    }

    /// Checks if `parent` dominates `child`, in the non-strict sense: every
    /// block dominates itself.
    ///
    /// This is the nested-interval test over the DFS indices, so it costs
    /// two comparisons no matter how deep the tree is, and the unreachable
    /// encoding means it is correct for those too.
    pub fn dominates(&self, parent: Block, child: Block) -> bool {
        self.pre_index(child) >= self.pre_index(parent)
            && self.post_index(child) <= self.post_index(parent)
    }

    /// Checks if `parent` dominates `child` and is not `child` itself.
    pub fn strictly_dominates(&self, parent: Block, child: Block) -> bool {
        parent != child && self.dominates(parent, child)
    }

    /// The dominator-tree children of `block`: every reachable block whose
    /// immediate dominator is `block`.
    pub fn children(&self, block: Block) -> &[Block] {
        match self.child_range.get(block) {
            Some(&(start, len)) => &self.children[start as usize..(start + len) as usize],
            None => &[],
        }
    }

    /// Returns the reachable blocks in a valid postorder.
    pub fn postorder(&self) -> &[Block] {
        &self.postorder
    }

    /// Returns an iterator over the reachable blocks in reverse postorder,
    /// i.e. dominators before the blocks they dominate.
    pub fn reverse_postorder(&self) -> impl Iterator<Item = Block> + '_ {
        self.postorder.iter().copied().rev()
    }

    /// The CFG version this tree was computed at. Once the program's
    /// version moves past it, the tree is stale and must not be queried.
    pub fn cfg_version(&self) -> u32 {
        self.cfg_version
    }

    /// Checks that this tree still describes `prog`'s CFG.
    pub fn is_current(&self, prog: &Program) -> bool {
        self.cfg_version == prog.cfg_version()
    }
}

/// Directly computes a valid post-ordering of the reachable blocks in
/// `prog`'s control-flow graph.
///
/// This should not be used directly in most cases, you probably want to get
/// this information through [`DominatorTree`].
pub fn compute_postorder(prog: &Program) -> Vec<Block> {
    let mut po = Vec::with_capacity(prog.num_blocks());
    let mut seen = SecondarySet::new();

    // explicit DFS stack of (block, next successor to visit). a block is
    // pushed at most once because it's marked seen when pushed.
    let mut stack: SmallVec<[(Block, usize); 16]> = SmallVec::new();

    seen.insert(prog.entry());
    stack.push((prog.entry(), 0));

    while let Some(&mut (block, ref mut next)) = stack.last_mut() {
        let succs = prog.block(block).succs();

        match succs.get(*next).copied() {
            Some(succ) => {
                *next += 1;

                if seen.insert(succ) {
                    stack.push((succ, 0));
                }
            }
            None => {
                po.push(block);
                stack.pop();
            }
        }
    }

    po
}

fn intersect(
    po_numbers: &SecondaryMap<Block, u32>,
    idoms: &SecondaryMap<Block, Block>,
    bb1: Block,
    bb2: Block,
) -> Block {
    let mut f1 = bb1;
    let mut f2 = bb2;

    // postorder numbers grow towards the entry, so "walk up" is "walk
    // towards the larger number"
    while f1 != f2 {
        while po_numbers[f1] < po_numbers[f2] {
            f1 = idoms[f1];
        }

        while po_numbers[f2] < po_numbers[f1] {
            f2 = idoms[f2];
        }
    }

    f1
}

//
// this implements the dominator algorithm described in "A Simple, Fast
// Dominance Algorithm" by Cooper et. al. See the paper:
// http://www.hipersoft.rice.edu/grads/publications/dom14.pdf
//
fn compute_idoms(
    prog: &Program,
    po: &[Block],
) -> SecondaryMap<Block, PackedOption<Block>> {
    debug_assert!(!po.is_empty());

    // map block -> postorder number, i.e. index of block in `po`
    let po_numbers = {
        let mut map = SecondaryMap::new();

        for (i, bb) in po.iter().copied().enumerate() {
            map.insert(bb, i as u32);
        }

        map
    };

    let root = po.last().copied().unwrap();
    let mut idoms = SecondaryMap::new();
    let mut changed = true;
    let mut passes = 0usize;

    // for the purposes of the algorithm, the entry node is its own idom
    idoms.insert(root, root);

    while changed {
        changed = false;
        passes += 1;

        // the lattice is finite and the update is monotone, so this bound
        // is unreachable unless the update itself is buggy. fail hard
        // rather than loop forever on a miscompile.
        assert!(
            passes <= po.len() + 2,
            "dominator fixed point failed to converge"
        );

        // the root has no predecessors worth looking at, skip it
        for block in po.iter().rev().copied().skip(1) {
            debug_assert_ne!(block, root);

            let idom = {
                // every processed predecessor. unreachable predecessors
                // never get an idom and are filtered out here, which is
                // what defines them away from the fixed point entirely
                let preds: SmallVec<[Block; 16]> = prog
                    .block(block)
                    .preds()
                    .iter()
                    .copied()
                    .filter(|p| idoms.contains(*p))
                    .collect();

                let mut iter = preds.into_iter();
                let mut idom = iter.next().expect(
                    "every reachable block has at least one processed predecessor in reverse postorder",
                );

                for pred in iter {
                    idom = intersect(&po_numbers, &idoms, pred, idom);
                }

                idom
            };

            changed |= idoms.insert(block, idom) != Some(idom);
        }
    }

    // externally the entry has no immediate dominator, swap the self-link
    // for a none and re-wrap everything
    let mut result = SecondaryMap::new();

    for (block, idom) in idoms.iter() {
        if block == root {
            result.insert(block, PackedOption::none());
        } else {
            result.insert(block, PackedOption::some(*idom));
        }
    }

    result
}

// builds the flat children array: one counting pass to size each block's
// group, one filling pass to place every block into its parent's group.
// nothing here grows one element at a time.
fn compute_children(
    po: &[Block],
    idoms: &SecondaryMap<Block, PackedOption<Block>>,
) -> (Vec<Block>, SecondaryMap<Block, (u32, u32)>) {
    let mut counts: SecondaryMap<Block, u32> = SecondaryMap::new();

    for block in po.iter().copied() {
        counts.insert(block, 0);
    }

    for block in po.iter().copied() {
        if let Some(parent) = idoms[block].expand() {
            counts[parent] += 1;
        }
    }

    let mut child_range = SecondaryMap::new();
    let mut cursor: SecondaryMap<Block, u32> = SecondaryMap::new();
    let mut total = 0u32;

    // group order is reverse postorder so that a parent's children appear
    // in the same order every run
    for block in po.iter().rev().copied() {
        child_range.insert(block, (total, counts[block]));
        cursor.insert(block, total);
        total += counts[block];
    }

    let mut children = vec![po[0]; total as usize];

    for block in po.iter().rev().copied() {
        if let Some(parent) = idoms[block].expand() {
            children[cursor[parent] as usize] = block;
            cursor[parent] += 1;
        }
    }

    (children, child_range)
}

// one DFS over the dominator tree, handing out pre indices on the way down
// and post indices on the way back up from a single shared counter.
fn compute_dfs_indices(
    po: &[Block],
    children: &[Block],
    child_range: &SecondaryMap<Block, (u32, u32)>,
) -> (SecondaryMap<Block, u32>, SecondaryMap<Block, u32>) {
    let root = po.last().copied().unwrap();
    let mut pre = SecondaryMap::new();
    let mut post = SecondaryMap::new();
    let mut count = 0u32;

    let mut stack: SmallVec<[(Block, u32); 16]> = SmallVec::new();

    pre.insert(root, count);
    count += 1;
    stack.push((root, 0));

    while let Some(&mut (block, ref mut next)) = stack.last_mut() {
        let (start, len) = child_range[block];

        if *next < len {
            let child = children[(start + *next) as usize];

            *next += 1;
            pre.insert(child, count);
            count += 1;
            stack.push((child, 0));
        } else {
            post.insert(block, count);
            count += 1;
            stack.pop();
        }
    }

    debug_assert_eq!(count as usize, po.len() * 2);

    (pre, post)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(num: usize, edges: &[(usize, usize)]) -> (Program, Vec<Block>) {
        let mut prog = Program::new();
        let blocks: Vec<Block> = (0..num).map(|_| prog.create_block()).collect();

        for &(from, to) in edges {
            prog.add_edge(blocks[from], blocks[to]);
        }

        (prog, blocks)
    }

    // the set of blocks reachable from the entry without passing through
    // `skip` — the brute-force definition of dominance
    fn reachable_without(prog: &Program, skip: Block) -> SecondarySet<Block> {
        let mut seen = SecondarySet::new();
        let mut stack = vec![prog.entry()];

        if prog.entry() == skip {
            return seen;
        }

        seen.insert(prog.entry());

        while let Some(block) = stack.pop() {
            for &succ in prog.block(block).succs() {
                if succ != skip && seen.insert(succ) {
                    stack.push(succ);
                }
            }
        }

        seen
    }

    #[test]
    fn test_postorder_simple() {
        //
        // entry -> {bb1, bb2} -> merge
        //
        let (prog, b) = graph(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        let po = compute_postorder(&prog);

        // while there are multiple valid postorders for this graph, we
        // know which order the successors are visited in, so a test can
        // rely on this one
        assert_eq!(po, [b[3], b[1], b[2], b[0]]);
    }

    #[test]
    fn test_postorder_infinite_recurse() {
        let (prog, b) = graph(1, &[(0, 0)]);
        let po = compute_postorder(&prog);

        assert_eq!(po, [b[0]]);
    }

    #[test]
    fn test_domtree_simple() {
        //
        // the running example from the Cooper et. al. paper, expanded:
        //
        // one -> {two, three}
        // two -> {five, nine}
        // three -> four
        // four -> two
        // five -> {six, eight}
        // six -> {three, seven}
        // seven -> {one, four}
        // eight -> seven
        // nine -> {five, eight}
        //
        let (prog, b) = graph(
            9,
            &[
                (0, 1),
                (0, 2),
                (1, 4),
                (1, 8),
                (2, 3),
                (3, 1),
                (4, 5),
                (4, 7),
                (5, 2),
                (5, 6),
                (6, 0),
                (6, 3),
                (7, 6),
                (8, 4),
                (8, 7),
            ],
        );

        let domtree = DominatorTree::compute(&prog);
        let [one, two, three, four, five, six, seven, eight, nine] =
            [b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7], b[8]];

        assert_eq!(domtree.idom(one), None);
        assert_eq!(domtree.idom(two), Some(one));
        assert_eq!(domtree.idom(three), Some(one));
        assert_eq!(domtree.idom(four), Some(one));
        assert_eq!(domtree.idom(five), Some(two));
        assert_eq!(domtree.idom(six), Some(five));
        assert_eq!(domtree.idom(seven), Some(two));
        assert_eq!(domtree.idom(eight), Some(two));
        assert_eq!(domtree.idom(nine), Some(two));

        assert!(domtree.dominates(one, one));
        assert!(domtree.dominates(one, two));
        assert!(domtree.dominates(one, five));
        assert!(domtree.dominates(two, five));
        assert!(domtree.dominates(one, six));
        assert!(domtree.dominates(two, six));
        assert!(domtree.dominates(five, six));

        // same as above, except one doesn't strictly dominate itself
        assert!(!domtree.strictly_dominates(one, one));
        assert!(domtree.strictly_dominates(one, two));
        assert!(domtree.strictly_dominates(one, five));
        assert!(domtree.strictly_dominates(two, five));
        assert!(domtree.strictly_dominates(one, six));
        assert!(domtree.strictly_dominates(two, six));
        assert!(domtree.strictly_dominates(five, six));

        assert!(!domtree.dominates(five, seven));
        assert!(!domtree.dominates(nine, eight));
    }

    #[test]
    fn test_domtree_children_partition_the_tree() {
        let (prog, b) = graph(
            6,
            &[(0, 1), (1, 2), (1, 3), (2, 4), (3, 4), (4, 1), (4, 5)],
        );

        let domtree = DominatorTree::compute(&prog);

        assert_eq!(domtree.children(b[0]), &[b[1]]);

        let mut of_one = domtree.children(b[1]).to_vec();
        of_one.sort();
        assert_eq!(of_one, vec![b[2], b[3], b[4]]);

        assert_eq!(domtree.children(b[4]), &[b[5]]);

        // every block except the root appears exactly once as a child
        let mut all: Vec<Block> = prog
            .blocks()
            .flat_map(|bb| domtree.children(bb).to_vec())
            .collect();
        all.sort();
        let mut expected: Vec<Block> = b[1..].to_vec();
        expected.sort();
        assert_eq!(all, expected);
    }

    #[test]
    fn test_interval_encoding_matches_brute_force() {
        let (prog, b) = graph(
            9,
            &[
                (0, 1),
                (0, 2),
                (1, 4),
                (1, 8),
                (2, 3),
                (3, 1),
                (4, 5),
                (4, 7),
                (5, 2),
                (5, 6),
                (6, 0),
                (6, 3),
                (7, 6),
                (8, 4),
                (8, 7),
            ],
        );

        let domtree = DominatorTree::compute(&prog);

        for &a in &b {
            let survives = reachable_without(&prog, a);

            for &c in &b {
                // "a dominates c" iff every entry-to-c path passes
                // through a, i.e. c is unreachable once a is removed
                let brute = a == c || !survives.contains(c);

                assert_eq!(
                    domtree.dominates(a, c),
                    brute,
                    "disagreement for {a:?} dom {c:?}"
                );
            }
        }
    }

    #[test]
    fn test_unreachable_blocks() {
        // block 2 has an edge into the graph but nothing reaches it
        let (prog, b) = graph(4, &[(0, 1), (2, 1), (1, 3)]);
        let domtree = DominatorTree::compute(&prog);

        assert!(domtree.is_reachable(b[0]));
        assert!(domtree.is_reachable(b[1]));
        assert!(!domtree.is_reachable(b[2]));

        assert_eq!(domtree.idom(b[2]), None);

        // unreachable blocks are dominated by everything...
        assert!(domtree.dominates(b[0], b[2]));
        assert!(domtree.dominates(b[1], b[2]));
        assert!(domtree.dominates(b[3], b[2]));

        // ...and dominate nothing except other unreachable blocks
        assert!(!domtree.dominates(b[2], b[0]));
        assert!(!domtree.dominates(b[2], b[1]));
        assert!(domtree.dominates(b[2], b[2]));

        // the phi-merge block is still dominated normally
        assert!(domtree.dominates(b[0], b[1]));
        assert_eq!(domtree.idom(b[1]), Some(b[0]));
    }

    #[test]
    fn test_single_block_program() {
        let (prog, b) = graph(1, &[]);
        let domtree = DominatorTree::compute(&prog);

        assert_eq!(domtree.root(), b[0]);
        assert_eq!(domtree.idom(b[0]), None);
        assert!(domtree.dominates(b[0], b[0]));
        assert_eq!(domtree.postorder(), &[b[0]]);
        assert!(domtree.children(b[0]).is_empty());
    }
}
