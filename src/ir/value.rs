//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::dense_arena_key;
use crate::utility::{Packable, PackedOption};
use static_assertions::assert_eq_size;
use std::fmt;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

dense_arena_key! {
    /// References a single SSA value in a program.
    ///
    /// Each value has exactly one definition: the one instruction (or phi)
    /// that lists it as an output. Must be resolved against the owning
    /// [`Program`](crate::ir::Program) to get at its [`ValueData`].
    pub struct Value;
}

/// Names one physical storage location in the target's register file.
///
/// The core never interprets these beyond equality: they flow through as
/// operand constraints and allocation hints for whatever register allocator
/// runs downstream.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct PhysReg(u32);

impl PhysReg {
    /// Creates a register from its index in the target register file.
    ///
    /// `u32::MAX` is reserved.
    #[inline]
    pub fn new(number: u32) -> Self {
        assert_ne!(number, u32::MAX);

        Self(number)
    }

    /// The register's index in the target register file.
    #[inline]
    pub fn number(self) -> u32 {
        self.0
    }
}

impl Packable for PhysReg {
    #[inline]
    fn reserved() -> Self {
        Self(u32::MAX)
    }

    #[inline]
    fn is_reserved(&self) -> bool {
        self.0 == u32::MAX
    }
}

impl fmt::Debug for PhysReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// The per-value payload: a width, a channel count, and an optional fixed
/// storage location.
///
/// Values are immutable once created; every field here is decided by the
/// producer that defines the value.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct ValueData {
    bits: u8,
    channels: u8,
    fixed: PackedOption<PhysReg>,
}

assert_eq_size!(ValueData, u64);

impl ValueData {
    /// A scalar value of the given per-channel width in bits.
    pub fn scalar(bits: u8) -> Self {
        Self::vector(bits, 1)
    }

    /// A vector value: `channels` lanes, each `bits` wide.
    pub fn vector(bits: u8, channels: u8) -> Self {
        assert!(channels >= 1);

        Self {
            bits,
            channels,
            fixed: PackedOption::none(),
        }
    }

    /// Pins the value to a fixed storage location.
    ///
    /// Used for values that must land in a specific hardware register
    /// (stage inputs, special outputs); the register allocator treats the
    /// hint as a constraint, every pass in this core only compares it.
    pub fn with_fixed(self, reg: PhysReg) -> Self {
        Self {
            fixed: PackedOption::some(reg),
            ..self
        }
    }

    /// Per-channel width in bits.
    pub fn bits(self) -> u8 {
        self.bits
    }

    /// Number of channels.
    pub fn channels(self) -> u8 {
        self.channels
    }

    /// The fixed storage location, if the value has one.
    pub fn fixed(self) -> Option<PhysReg> {
        self.fixed.expand()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_data_accessors() {
        let v = ValueData::vector(16, 4);

        assert_eq!(v.bits(), 16);
        assert_eq!(v.channels(), 4);
        assert_eq!(v.fixed(), None);

        let pinned = ValueData::scalar(32).with_fixed(PhysReg::new(7));

        assert_eq!(pinned.channels(), 1);
        assert_eq!(pinned.fixed(), Some(PhysReg::new(7)));
    }
}
