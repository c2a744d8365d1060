//! State shared by every function compiled from one checked module.

use crate::literals::LiteralPool;
use crate::CodegenOptions;
use etsc_ast::{Ast, NodeId, NodeKind};
use etsc_binder::Binder;
use etsc_checker::TypeTable;

pub struct CodegenContext<'a> {
    pub ast: &'a Ast,
    pub binder: &'a Binder,
    pub table: &'a TypeTable,
    pub literals: &'a LiteralPool,
    pub options: &'a CodegenOptions,
    /// Module name of the main program; owns the dynamic-interop glue.
    pub main_module: String,
}

impl<'a> CodegenContext<'a> {
    pub fn new(
        ast: &'a Ast,
        binder: &'a Binder,
        table: &'a TypeTable,
        literals: &'a LiteralPool,
        options: &'a CodegenOptions,
    ) -> Self {
        let main_module = ast
            .main_program()
            .and_then(|p| match ast.kind(p) {
                NodeKind::Program { module_name, .. } => Some(module_name.clone()),
                _ => None,
            })
            .unwrap_or_default();
        Self { ast, binder, table, literals, options, main_module }
    }

    /// Module name of the program a node belongs to.
    pub fn module_of(&self, node: NodeId) -> &'a str {
        let program = self.ast.program_of(node);
        match self.ast.kind(program) {
            NodeKind::Program { module_name, .. } => module_name,
            _ => "",
        }
    }

    pub fn optimize(&self) -> bool {
        self.options.opt_level > 0
    }
}
