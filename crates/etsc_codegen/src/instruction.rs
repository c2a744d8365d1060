//! Instructions, operands and labels.

use crate::opcode::Opcode;
use etsc_core::define_idx;
use std::fmt;

define_idx! {
    /// A jump target inside one function.
    pub struct LabelId;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Virtual register `vN`.
    Reg(u16),
    Imm(i64),
    FImm(f64),
    /// String constant.
    Str(String),
    /// Record, field or method id.
    Id(String),
    /// Unresolved jump target.
    Label(LabelId),
    /// Resolved jump target: index of an instruction.
    Target(usize),
    /// Index into the literal buffer pool.
    Literal(u32),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "v{}", r),
            Operand::Imm(v) => write!(f, "{}", v),
            Operand::FImm(v) => write!(f, "{:?}", v),
            Operand::Str(s) => write!(f, "{:?}", s),
            Operand::Id(id) => f.write_str(id),
            Operand::Label(l) => write!(f, "L{}", l.0),
            Operand::Target(t) => write!(f, "@{}", t),
            Operand::Literal(l) => write!(f, "lit#{}", l),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn new(opcode: Opcode, operands: Vec<Operand>) -> Self {
        Self { opcode, operands }
    }

    /// The register of a single-register instruction such as `sta`.
    pub fn register(&self) -> Option<u16> {
        match self.operands.first() {
            Some(Operand::Reg(r)) => Some(*r),
            _ => None,
        }
    }

    pub fn label(&self) -> Option<LabelId> {
        self.operands.iter().find_map(|o| match o {
            Operand::Label(l) => Some(*l),
            _ => None,
        })
    }

    /// Highest register named by this instruction.
    pub fn max_register(&self) -> Option<u16> {
        self.operands
            .iter()
            .filter_map(|o| match o {
                Operand::Reg(r) => Some(*r),
                _ => None,
            })
            .max()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.opcode.mnemonic())?;
        for (i, operand) in self.operands.iter().enumerate() {
            f.write_str(if i == 0 { " " } else { ", " })?;
            write!(f, "{}", operand)?;
        }
        Ok(())
    }
}

/// An element of a function body while it is being built.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Label(LabelId),
    Insn(Instruction),
}

/// A protected range, in labels, before resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchBlock {
    pub begin: LabelId,
    pub end: LabelId,
    pub handler: LabelId,
    /// Record of the caught exception class; `None` catches everything.
    pub exception: Option<String>,
}

/// One row of a function's catch table. Ranges are half-open instruction
/// indices; rows are ordered innermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchEntry {
    pub begin: usize,
    pub end: usize,
    pub handler: usize,
    pub exception: Option<String>,
}

impl fmt::Display for CatchEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "try @{}..@{} catch {} -> @{}",
            self.begin,
            self.end,
            self.exception.as_deref().unwrap_or("all"),
            self.handler
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let insn = Instruction::new(
            Opcode::CallShort,
            vec![Operand::Id("main.ETSGLOBAL.f:(i32)void".into()), Operand::Reg(2)],
        );
        assert_eq!(insn.to_string(), "call.short main.ETSGLOBAL.f:(i32)void, v2");
        assert_eq!(Instruction::new(Opcode::LdaStr, vec![Operand::Str("a\"b".into())]).to_string(), "lda.str \"a\\\"b\"");
        assert_eq!(Instruction::new(Opcode::ReturnVoid, vec![]).to_string(), "return.void");
    }

    #[test]
    fn test_max_register() {
        let insn = Instruction::new(Opcode::Mov, vec![Operand::Reg(4), Operand::Reg(9)]);
        assert_eq!(insn.max_register(), Some(9));
        assert_eq!(Instruction::new(Opcode::Ldai, vec![Operand::Imm(1)]).max_register(), None);
    }
}
