//! The generated program: records, functions and literal buffers, plus a
//! textual assembly dump of it.

use crate::instruction::{CatchEntry, Instruction};
use crate::literals::LiteralBuffer;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Class,
    Interface,
    /// The `ETSGLOBAL` record of a module.
    Global,
    /// The class behind an arrow function.
    Lambda,
    /// Dynamic-interop glue.
    Glue,
}

impl RecordKind {
    fn keyword(self) -> &'static str {
        match self {
            RecordKind::Class => "class",
            RecordKind::Interface => "interface",
            RecordKind::Global => "global",
            RecordKind::Lambda => "lambda",
            RecordKind::Glue => "glue",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldOutput {
    pub name: String,
    pub descriptor: String,
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutput {
    pub name: String,
    pub kind: RecordKind,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldOutput>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionOutput {
    /// Full method id.
    pub name: String,
    /// Parameters, including the receiver of instance methods.
    pub param_count: usize,
    pub register_count: u16,
    pub is_static: bool,
    pub instructions: Vec<Instruction>,
    pub catch_table: Vec<CatchEntry>,
}

impl FunctionOutput {
    /// Instructions rendered one per line, without indices.
    pub fn listing(&self) -> Vec<String> {
        self.instructions.iter().map(|i| i.to_string()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramOutput {
    pub records: Vec<RecordOutput>,
    pub functions: Vec<FunctionOutput>,
    pub literal_buffers: Vec<LiteralBuffer>,
}

impl ProgramOutput {
    pub fn function(&self, name: &str) -> Option<&FunctionOutput> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn record(&self, name: &str) -> Option<&RecordOutput> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn instruction_count(&self) -> usize {
        self.functions.iter().map(|f| f.instructions.len()).sum()
    }

    /// Render the program as assembly text.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (i, buffer) in self.literal_buffers.iter().enumerate() {
            let _ = writeln!(out, ".literal {} {}", i, buffer);
        }
        if !self.literal_buffers.is_empty() {
            out.push('\n');
        }

        for record in &self.records {
            let _ = write!(out, ".record {} {}", record.kind.keyword(), record.name);
            if let Some(super_class) = &record.super_class {
                let _ = write!(out, " extends {}", super_class);
            }
            if !record.interfaces.is_empty() {
                let _ = write!(out, " implements {}", record.interfaces.join(", "));
            }
            out.push_str(" {\n");
            for field in &record.fields {
                let modifier = if field.is_static { "static " } else { "" };
                let _ = writeln!(out, "\t{}{} {}", modifier, field.descriptor, field.name);
            }
            out.push_str("}\n\n");
        }

        for function in &self.functions {
            let _ = writeln!(
                out,
                ".function {}{} params={} regs={} {{",
                function.name,
                if function.is_static { " static" } else { "" },
                function.param_count,
                function.register_count
            );
            for (i, insn) in function.instructions.iter().enumerate() {
                let _ = writeln!(out, "\t{:>4}: {}", i, insn);
            }
            for entry in &function.catch_table {
                let _ = writeln!(out, "\t{}", entry);
            }
            out.push_str("}\n\n");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Operand;
    use crate::opcode::Opcode;

    #[test]
    fn test_dump_sections() {
        let program = ProgramOutput {
            records: vec![RecordOutput {
                name: "main.ETSGLOBAL".into(),
                kind: RecordKind::Global,
                super_class: None,
                interfaces: Vec::new(),
                fields: vec![FieldOutput { name: "x".into(), descriptor: "i32".into(), is_static: true }],
            }],
            functions: vec![FunctionOutput {
                name: "main.ETSGLOBAL.main:()void".into(),
                param_count: 0,
                register_count: 0,
                is_static: true,
                instructions: vec![
                    Instruction::new(Opcode::Ldai, vec![Operand::Imm(1)]),
                    Instruction::new(Opcode::ReturnVoid, vec![]),
                ],
                catch_table: Vec::new(),
            }],
            literal_buffers: Vec::new(),
        };
        let text = program.dump();
        assert!(text.contains(".record global main.ETSGLOBAL {\n\tstatic i32 x\n}"));
        assert!(text.contains(".function main.ETSGLOBAL.main:()void static params=0 regs=0 {"));
        assert!(text.contains("   0: ldai 1"));
        assert!(text.contains("   1: return.void"));
        assert_eq!(program.instruction_count(), 2);
    }
}
