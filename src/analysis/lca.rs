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
use crate::ir::Block;
use smallvec::SmallVec;

/// Answers "which block dominates both A and B" in O(1) after O(n log n)
/// preprocessing.
///
/// Passes that repeatedly need the nearest common dominator of two points —
/// hoisting, sinking, code motion of any kind — build one of these once per
/// dominator tree and query it as often as they like.
///
/// # Implementation
/// Lowest-common-ancestor via the Euler tour technique: one DFS over the
/// dominator tree appends the current block's preorder index to a tour
/// array at every visit (including the re-visits when backtracking out of
/// a child), and each block remembers its first tour position. The LCA of
/// two blocks is then the minimum-preorder entry between their first
/// positions, which a sparse table answers in constant time.
pub struct LcaTable {
    // preorder index of the block at each tour position
    tour_pre: Vec<u32>,
    // the block at each tour position, to map a winning position back
    tour_block: Vec<Block>,
    // first tour position of every reachable block
    repr: SecondaryMap<Block, u32>,
    // sparse[k][i] = tour position of the minimum preorder index in
    // tour[i .. i + 2^k]
    sparse: Vec<Vec<u32>>,
    cfg_version: u32,
}

impl LcaTable {
    /// Builds the table for a dominator tree.
    ///
    /// The table snapshots the tree's CFG version; once the underlying
    /// program's CFG changes shape, both the tree and this table are stale
    /// and must be rebuilt before the next query.
    pub fn compute(domtree: &DominatorTree) -> Self {
        let reachable = domtree.postorder().len();
        let mut tour_pre = Vec::with_capacity(2 * reachable - 1);
        let mut tour_block = Vec::with_capacity(2 * reachable - 1);
        let mut repr = SecondaryMap::new();

        // the Euler tour: every time a block becomes "current" — first
        // entry or a backtrack out of one of its children — it is appended
        // to the tour
        let root = domtree.root();
        let mut stack: SmallVec<[(Block, usize); 16]> = SmallVec::new();

        repr.insert(root, 0);
        tour_pre.push(domtree.pre_index(root));
        tour_block.push(root);
        stack.push((root, 0));

        while let Some(&mut (block, ref mut next)) = stack.last_mut() {
            match domtree.children(block).get(*next).copied() {
                Some(child) => {
                    *next += 1;
                    repr.insert(child, tour_pre.len() as u32);
                    tour_pre.push(domtree.pre_index(child));
                    tour_block.push(child);
                    stack.push((child, 0));
                }
                None => {
                    stack.pop();

                    if let Some(&(parent, _)) = stack.last() {
                        tour_pre.push(domtree.pre_index(parent));
                        tour_block.push(parent);
                    }
                }
            }
        }

        debug_assert_eq!(tour_pre.len(), 2 * reachable - 1);

        let sparse = build_sparse_table(&tour_pre);

        Self {
            tour_pre,
            tour_block,
            repr,
            sparse,
            cfg_version: domtree.cfg_version(),
        }
    }

    /// Finds the unique block that dominates both `a` and `b` and is
    /// dominated by every other common dominator of the two.
    ///
    /// Querying a block against itself returns that block, and an
    /// unreachable argument degrades to returning the other argument
    /// (`None` if both are unreachable) — neither case touches the table.
    pub fn common_dominator(&self, a: Block, b: Block) -> Option<Block> {
        match (self.repr.get(a), self.repr.get(b)) {
            (None, None) => None,
            (Some(_), None) => Some(a),
            (None, Some(_)) => Some(b),
            (Some(&ra), Some(&rb)) => {
                if a == b {
                    return Some(a);
                }

                let (lo, hi) = (ra.min(rb) as usize, ra.max(rb) as usize);
                let winner = self.range_min(lo, hi);

                Some(self.tour_block[winner])
            }
        }
    }

    /// The CFG version of the dominator tree this table was built from.
    pub fn cfg_version(&self) -> u32 {
        self.cfg_version
    }

    // position of the minimum preorder index in tour[lo..=hi]
    fn range_min(&self, lo: usize, hi: usize) -> usize {
        debug_assert!(lo <= hi);

        let len = hi - lo + 1;
        let k = (usize::BITS - 1 - len.leading_zeros()) as usize;
        let left = self.sparse[k][lo] as usize;
        let right = self.sparse[k][hi + 1 - (1 << k)] as usize;

        if self.tour_pre[left] <= self.tour_pre[right] {
            left
        } else {
            right
        }
    }
}

fn build_sparse_table(tour_pre: &[u32]) -> Vec<Vec<u32>> {
    let n = tour_pre.len();
    let levels = (usize::BITS - n.leading_zeros()) as usize;
    let mut sparse = Vec::with_capacity(levels);

    sparse.push((0..n as u32).collect::<Vec<u32>>());

    for k in 1..levels {
        let half = 1usize << (k - 1);
        let width = 1usize << k;

        if width > n {
            break;
        }

        let prev = &sparse[k - 1];
        let mut level = Vec::with_capacity(n - width + 1);

        for i in 0..=(n - width) {
            let left = prev[i];
            let right = prev[i + half];

            level.push(if tour_pre[left as usize] <= tour_pre[right as usize] {
                left
            } else {
                right
            });
        }

        sparse.push(level);
    }

    sparse
}
