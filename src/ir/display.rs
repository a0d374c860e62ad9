//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! A compact textual form of the IR, for logs and test failure output.
//!
//! ```text
//! block0:
//!   v0 = mov #1
//!   branch v0
//! block1:  ; preds: block0
//!   v1 = mov #2
//!   jump
//! ```

use crate::arena::ArenaKey;
use crate::ir::{Block, Instruction, Opcode, Operand, Phi, Program, Src, Value};
use std::fmt;

impl Opcode {
    /// The opcode's textual mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Mov => "mov",
            Self::FAdd => "fadd",
            Self::FMul => "fmul",
            Self::FFma => "ffma",
            Self::FMin => "fmin",
            Self::FMax => "fmax",
            Self::FNeg => "fneg",
            Self::IAdd => "iadd",
            Self::IMul => "imul",
            Self::IAnd => "iand",
            Self::IOr => "ior",
            Self::IXor => "ixor",
            Self::IShl => "ishl",
            Self::IShr => "ishr",
            Self::Load => "load",
            Self::Store => "store",
            Self::Export => "export",
            Self::Barrier => "barrier",
            Self::Jump => "jump",
            Self::Branch => "branch",
            Self::ParallelCopy => "pcopy",
            Self::ClauseHeader => "clause",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.index())
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block{}", self.index())
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{value}"),
            Self::Imm(imm) => write!(f, "#{imm}"),
            Self::Fixed(reg) => write!(f, "${}", reg.number()),
        }
    }
}

impl fmt::Display for Src {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operand)?;

        if self.kill {
            write!(f, "!")?;
        }

        Ok(())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, dest) in self.dests().iter().enumerate() {
            let sep = if i == 0 { "" } else { ", " };

            write!(f, "{sep}{dest}")?;
        }

        if !self.dests().is_empty() {
            write!(f, " = ")?;
        }

        write!(f, "{}", self.op().mnemonic())?;

        for (i, src) in self.srcs().iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };

            write!(f, "{sep}{src}")?;
        }

        if self.needs_scratch() {
            write!(f, " (scratch)")?;
        }

        Ok(())
    }
}

impl fmt::Display for Phi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = phi", self.dest())?;

        for (i, src) in self.srcs().iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };

            match src.as_value() {
                Some(value) => write!(f, "{sep}{value}")?,
                None => write!(f, "{sep}undef")?,
            }
        }

        Ok(())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in self.blocks() {
            let data = self.block(block);

            write!(f, "{block}:")?;

            if !data.preds().is_empty() {
                write!(f, "  ; preds:")?;

                for pred in data.preds() {
                    write!(f, " {pred}")?;
                }
            }

            writeln!(f)?;

            for phi in data.phis() {
                writeln!(f, "  {phi}")?;
            }

            for inst in data.insts() {
                writeln!(f, "  {inst}")?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{PhiSrc, ValueData};

    #[test]
    fn instruction_formatting() {
        let a = Value::new(0);
        let b = Value::new(1);
        let d = Value::new(2);

        let inst = Instruction::new(Opcode::FAdd, &[a.into(), b.into()], &[d]);

        assert_eq!(format!("{inst}"), "v2 = fadd v0, v1");

        let store = Instruction::new(Opcode::Store, &[a.into(), Operand::Imm(16)], &[]);

        assert_eq!(format!("{store}"), "store v0, #16");
    }

    #[test]
    fn phi_formatting() {
        let phi = Phi::new(Value::new(3), &[PhiSrc::Value(Value::new(1)), PhiSrc::Undef]);

        assert_eq!(format!("{phi}"), "v3 = phi v1, undef");
    }

    #[test]
    fn program_formatting_includes_preds() {
        let mut prog = Program::new();
        let a = prog.create_block();
        let b = prog.create_block();

        prog.add_edge(a, b);

        let v = prog.new_value(ValueData::scalar(32));
        prog.append(a, Instruction::new(Opcode::Mov, &[Operand::Imm(7)], &[v]));
        prog.append(a, Instruction::new(Opcode::Jump, &[], &[]));

        let text = format!("{prog}");

        assert!(text.contains("block0:\n"));
        assert!(text.contains("v0 = mov #7"));
        assert!(text.contains("block1:  ; preds: block0"));
    }
}
