//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::{PhysReg, Value};
use smallvec::SmallVec;
use static_assertions::assert_eq_size;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// The operation an [`Instruction`] performs.
///
/// This is a deliberately small, generic vocabulary: wide enough to exercise
/// every structural case the backend passes care about (pure vs. effectful,
/// commutative vs. not, terminator vs. not), narrow enough that targets can
/// map their real opcode tables onto it mechanically.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Opcode {
    /// `mov a`, copies its operand
    Mov,
    /// `fadd a, b`, floating-point addition
    FAdd,
    /// `fmul a, b`, floating-point multiplication
    FMul,
    /// `ffma a, b, c`, fused multiply-add `a * b + c`
    FFma,
    /// `fmin a, b`, floating-point minimum
    FMin,
    /// `fmax a, b`, floating-point maximum
    FMax,
    /// `fneg a`, floating-point negation
    FNeg,
    /// `iadd a, b`, integer addition
    IAdd,
    /// `imul a, b`, integer multiplication
    IMul,
    /// `iand a, b`, bitwise AND
    IAnd,
    /// `ior a, b`, bitwise OR
    IOr,
    /// `ixor a, b`, bitwise XOR
    IXor,
    /// `ishl a, b`, left shift
    IShl,
    /// `ishr a, b`, right shift
    IShr,
    /// `load addr`, reads from memory
    Load,
    /// `store addr, value`, writes to memory
    Store,
    /// `export slot, value`, writes a shader stage output
    Export,
    /// `barrier`, an execution/memory barrier
    Barrier,
    /// `jump`, unconditionally transfers to the block's single successor
    Jump,
    /// `branch cond`, transfers to the first successor if `cond` is
    /// non-zero and to the second otherwise
    Branch,
    /// A swap-safe group of simultaneous copies: destination `i` receives
    /// source `i`, as if every source were read before any destination
    /// were written
    ParallelCopy,
    /// Marks the start of a clause; its immediate operand is the number of
    /// grouped instructions that follow
    ClauseHeader,
}

impl Opcode {
    /// Whether the operation is free of side effects and ordering
    /// constraints.
    ///
    /// Only pure instructions may be deduplicated or reordered; everything
    /// else (memory, exports, barriers, control, the pseudo-ops) stays
    /// exactly where the producer put it.
    pub fn is_pure(self) -> bool {
        matches!(
            self,
            Self::Mov
                | Self::FAdd
                | Self::FMul
                | Self::FFma
                | Self::FMin
                | Self::FMax
                | Self::FNeg
                | Self::IAdd
                | Self::IMul
                | Self::IAnd
                | Self::IOr
                | Self::IXor
                | Self::IShl
                | Self::IShr
        )
    }

    /// Whether the operation transfers control to another block. A block
    /// contains at most one terminator, and it is always last.
    pub fn is_terminator(self) -> bool {
        matches!(self, Self::Jump | Self::Branch)
    }

    /// The number of leading sources that may be swapped without changing
    /// the result.
    ///
    /// `0` for non-commutative operations; `2` for the commutative binary
    /// operations and for `ffma` (whose first two operands multiply).
    pub fn commutative_prefix(self) -> usize {
        match self {
            Self::FAdd
            | Self::FMul
            | Self::FFma
            | Self::FMin
            | Self::FMax
            | Self::IAdd
            | Self::IMul
            | Self::IAnd
            | Self::IOr
            | Self::IXor => 2,
            _ => 0,
        }
    }
}

/// A single input to an [`Instruction`].
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Operand {
    /// A reference to an SSA value
    Value(Value),
    /// A compile-time constant
    Imm(u64),
    /// A fixed physical storage location, read directly
    Fixed(PhysReg),
}

assert_eq_size!(Operand, [u64; 2]);

impl Operand {
    /// The referenced SSA value, if the operand is one.
    pub fn as_value(self) -> Option<Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// An [`Operand`] together with its liveness annotation.
///
/// `kill` is written by the liveness pass: it marks the last read of the
/// operand's storage location along every path leaving the instruction, the
/// point at which the target may recycle whatever holds it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Src {
    /// What is being read.
    pub operand: Operand,
    /// Whether this read is the last use of the operand's storage.
    /// Meaningless until liveness has run; `false` by default.
    pub kill: bool,
}

impl Src {
    /// Wraps an operand with a cleared liveness annotation.
    pub fn new(operand: Operand) -> Self {
        Self {
            operand,
            kill: false,
        }
    }
}

impl From<Operand> for Src {
    fn from(operand: Operand) -> Self {
        Self::new(operand)
    }
}

impl From<Value> for Src {
    fn from(value: Value) -> Self {
        Self::new(Operand::Value(value))
    }
}

/// One instruction: an opcode, its sources, and the values it defines.
///
/// Instructions live inside their block's instruction list and have no
/// identity beyond their position; removing one means excising it from
/// that list.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Instruction {
    op: Opcode,
    srcs: SmallVec<[Src; 3]>,
    dests: SmallVec<[Value; 2]>,
    needs_scratch: bool,
}

impl Instruction {
    /// Creates an instruction from an opcode, sources and destinations.
    pub fn new(op: Opcode, srcs: &[Operand], dests: &[Value]) -> Self {
        Self {
            op,
            srcs: srcs.iter().copied().map(Src::new).collect(),
            dests: SmallVec::from_slice(dests),
            needs_scratch: false,
        }
    }

    /// Creates a parallel copy performing `dests[i] <- srcs[i]` for every
    /// position, as one simultaneous operation.
    pub fn parallel_copy(dests: &[Value], srcs: &[Operand]) -> Self {
        assert_eq!(dests.len(), srcs.len());

        Self::new(Opcode::ParallelCopy, srcs, dests)
    }

    /// Creates a clause marker announcing `count` grouped instructions.
    pub fn clause_header(count: u64) -> Self {
        Self::new(Opcode::ClauseHeader, &[Operand::Imm(count)], &[])
    }

    /// The operation this instruction performs.
    pub fn op(&self) -> Opcode {
        self.op
    }

    /// The instruction's sources, in operand order.
    pub fn srcs(&self) -> &[Src] {
        &self.srcs
    }

    /// Mutable access to the sources, for operand rewriting and liveness
    /// annotation.
    pub fn srcs_mut(&mut self) -> &mut [Src] {
        &mut self.srcs
    }

    /// The values this instruction defines, in output order.
    pub fn dests(&self) -> &[Value] {
        &self.dests
    }

    /// Iterates over the SSA values this instruction reads.
    pub fn value_uses(&self) -> impl Iterator<Item = Value> + '_ {
        self.srcs.iter().filter_map(|src| src.operand.as_value())
    }

    /// Whether executing this instruction requires a scratch location the
    /// register allocator must provide.
    ///
    /// Only ever set on parallel copies whose copy set contains a cyclic
    /// permutation; such a cycle cannot be lowered to moves without one
    /// temporary.
    pub fn needs_scratch(&self) -> bool {
        self.needs_scratch
    }

    /// Records that this instruction needs a scratch location.
    pub fn set_needs_scratch(&mut self, needs_scratch: bool) {
        self.needs_scratch = needs_scratch;
    }
}

/// The source of a [`Phi`] along one predecessor edge.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum PhiSrc {
    /// The value flowing in along this edge
    Value(Value),
    /// Nothing flows in along this edge; reading the phi's output after
    /// arriving this way is undefined
    Undef,
}

impl PhiSrc {
    /// The incoming value, if the edge carries one.
    pub fn as_value(self) -> Option<Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Undef => None,
        }
    }
}

/// A pseudo-instruction at the head of a block merging one incoming
/// definition per predecessor edge into a single value.
///
/// Sources are positionally aligned with the block's predecessor list, and
/// their count must always match it.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Phi {
    dest: Value,
    srcs: SmallVec<[PhiSrc; 2]>,
}

impl Phi {
    /// Creates a phi merging `srcs` (one per predecessor, in predecessor
    /// order) into `dest`.
    pub fn new(dest: Value, srcs: &[PhiSrc]) -> Self {
        Self {
            dest,
            srcs: SmallVec::from_slice(srcs),
        }
    }

    /// The merged value this phi defines.
    pub fn dest(&self) -> Value {
        self.dest
    }

    /// The per-predecessor sources.
    pub fn srcs(&self) -> &[PhiSrc] {
        &self.srcs
    }

    /// Mutable access to the per-predecessor sources.
    pub fn srcs_mut(&mut self) -> &mut [PhiSrc] {
        &mut self.srcs
    }
}
