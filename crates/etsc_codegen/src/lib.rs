//! etsc_codegen: Register-machine code generation.
//!
//! Every function body compiles to instructions over an accumulator and
//! virtual registers. The [`emitter`] tracks the believed type of the
//! accumulator and of each register, and every load, store and move picks
//! its narrow, wide or object variant from that side table. Expressions
//! are compiled against the types the checker left on the AST; a
//! disagreement between the two is an internal error, never a user one.
//!
//! The pipeline is:
//! 1. collect records and functions from the checked programs
//! 2. compile each function, in parallel when configured
//! 3. renumber the shared literal buffers by first use

mod branch;
mod call;
mod context;
mod conversion;
mod emitter;
mod enums;
pub mod error;
mod expr;
mod function;
pub mod instruction;
pub mod literals;
mod lvalue;
mod names;
pub mod opcode;
pub mod output;
mod peephole;
mod program;
mod stmt;

pub use error::{CodegenError, CodegenResult};
pub use instruction::{CatchEntry, Instruction, Operand};
pub use literals::{LiteralBuffer, LiteralValue};
pub use opcode::Opcode;
pub use output::{FieldOutput, FunctionOutput, ProgramOutput, RecordKind, RecordOutput};

use context::CodegenContext;
use etsc_checker::CheckedModule;
use literals::LiteralPool;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodegenOptions {
    /// 0 emits instructions as compiled; 1 and above run the peephole
    /// pass.
    pub opt_level: u8,
    /// Worker threads for compiling functions; 0 or 1 compiles them on the
    /// calling thread.
    pub function_threads: usize,
}

/// Generate the program for a checked and lowered module.
pub fn generate(module: &CheckedModule, options: &CodegenOptions) -> CodegenResult<ProgramOutput> {
    let _span = tracing::info_span!("codegen").entered();
    let pool = LiteralPool::new();
    let (records, mut functions) = {
        let cx = CodegenContext::new(&module.ast, &module.binder, &module.table, &pool, options);
        let collected = program::collect(&cx)?;
        let functions = program::compile_jobs(&cx, &collected.jobs)?;
        (collected.records, functions)
    };
    let literal_buffers = literals::renumber(&mut functions, pool.into_buffers());
    tracing::debug!(
        records = records.len(),
        functions = functions.len(),
        literals = literal_buffers.len(),
        "codegen finished"
    );
    Ok(ProgramOutput { records, functions, literal_buffers })
}
