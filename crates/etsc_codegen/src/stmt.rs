//! Statements.

use crate::error::{CodegenError, CodegenResult};
use crate::function::{FunctionCompiler, LoopLabels, ReturnMode};
use crate::instruction::{CatchBlock, LabelId};
use crate::opcode::Opcode;
use etsc_ast::{NodeId, NodeKind, TypeId, VariableId};
use etsc_binder::VariableFlags;
use etsc_checker::Type;

impl<'a> FunctionCompiler<'a> {
    /// Compile a statement. Temporaries are released afterwards; the
    /// registers of declared variables live until the enclosing block
    /// ends.
    pub(crate) fn compile_stmt(&mut self, node: NodeId) -> CodegenResult<()> {
        let ast = self.ast();
        if let NodeKind::VariableDeclaration { declarators, .. } = ast.kind(node) {
            for declarator in declarators {
                self.compile_declarator(*declarator)?;
            }
            return Ok(());
        }
        let mark = self.em.mark();
        self.compile_stmt_inner(node)?;
        self.em.release(mark);
        Ok(())
    }

    fn compile_stmt_inner(&mut self, node: NodeId) -> CodegenResult<()> {
        let ast = self.ast();
        match ast.kind(node) {
            NodeKind::Block { statements } => {
                for statement in statements {
                    self.compile_stmt(*statement)?;
                }
                Ok(())
            }
            NodeKind::ExpressionStatement { expression } => self.compile_expr(*expression),
            NodeKind::If { test, consequent, alternate } => {
                let otherwise = self.em.new_label();
                self.branch_if(*test, false, otherwise)?;
                self.compile_stmt(*consequent)?;
                match alternate {
                    Some(alternate) => {
                        let end = self.em.new_label();
                        self.em.jump(end);
                        self.em.set_label(otherwise);
                        self.compile_stmt(*alternate)?;
                        self.em.set_label(end);
                    }
                    None => self.em.set_label(otherwise),
                }
                Ok(())
            }
            NodeKind::While { test, body } => {
                let (head, end) = (self.em.new_label(), self.em.new_label());
                self.em.set_label(head);
                self.branch_if(*test, false, end)?;
                self.compile_loop_body(*body, end, head)?;
                self.em.jump(head);
                self.em.set_label(end);
                Ok(())
            }
            NodeKind::DoWhile { body, test } => {
                let (head, next, end) = (self.em.new_label(), self.em.new_label(), self.em.new_label());
                self.em.set_label(head);
                self.compile_loop_body(*body, end, next)?;
                self.em.set_label(next);
                self.branch_if(*test, true, head)?;
                self.em.set_label(end);
                Ok(())
            }
            NodeKind::For { init, test, update, body } => {
                if let Some(init) = init {
                    match ast.kind(*init) {
                        NodeKind::VariableDeclaration { .. } => self.compile_stmt(*init)?,
                        _ => self.compile_expr(*init)?,
                    }
                }
                let (head, next, end) = (self.em.new_label(), self.em.new_label(), self.em.new_label());
                self.em.set_label(head);
                if let Some(test) = test {
                    self.branch_if(*test, false, end)?;
                }
                self.compile_loop_body(*body, end, next)?;
                self.em.set_label(next);
                if let Some(update) = update {
                    let mark = self.em.mark();
                    self.compile_expr(*update)?;
                    self.em.release(mark);
                }
                self.em.jump(head);
                self.em.set_label(end);
                Ok(())
            }
            NodeKind::ForOf { left, right, body } => self.compile_for_of(*left, *right, *body),
            NodeKind::Break => {
                let labels = *self.loops.last().ok_or_else(|| CodegenError::internal("break outside a loop"))?;
                self.exit_tries(labels.try_depth)?;
                self.em.jump(labels.break_label);
                Ok(())
            }
            NodeKind::Continue => {
                let labels = *self.loops.last().ok_or_else(|| CodegenError::internal("continue outside a loop"))?;
                self.exit_tries(labels.try_depth)?;
                self.em.jump(labels.continue_label);
                Ok(())
            }
            NodeKind::Return { argument } => self.compile_return(*argument),
            NodeKind::Throw { argument } => {
                self.compile_expr(*argument)?;
                let exception = self.em.store_temp()?;
                self.em.emit_with_reg(Opcode::Throw, exception, None)
            }
            NodeKind::Try { block, handlers, finalizer } => self.compile_try(*block, handlers, *finalizer),
            NodeKind::Empty
            | NodeKind::FunctionDeclaration { .. }
            | NodeKind::ClassDeclaration { .. }
            | NodeKind::InterfaceDeclaration { .. }
            | NodeKind::EnumDeclaration { .. }
            | NodeKind::TypeAlias { .. }
            | NodeKind::ImportDeclaration { .. } => Ok(()),
            other => Err(CodegenError::unreachable(format!("'{}' is not a statement", other.name()))),
        }
    }

    fn compile_declarator(&mut self, declarator: NodeId) -> CodegenResult<()> {
        let NodeKind::VariableDeclarator { init, .. } = *self.ast().kind(declarator) else {
            return Err(CodegenError::unreachable("expected a variable declarator"));
        };
        let var = self
            .cx
            .binder
            .variable_of_decl(declarator)
            .ok_or_else(|| CodegenError::internal("declarator without a variable"))?;
        let ty = self.declared_type(var, declarator)?;
        if self.cx.binder.variable(var).flags.contains(VariableFlags::TOP_LEVEL) {
            if let Some(init) = init {
                let mark = self.em.mark();
                self.compile_expr_as(init, ty)?;
                self.store_static(self.cx.static_var_id(var))?;
                self.em.release(mark);
            }
            return Ok(());
        }
        let mark = self.em.mark();
        match init {
            Some(init) => self.compile_expr_as(init, ty)?,
            None => self.load_default(ty),
        }
        self.em.release(mark);
        let reg = self.em.alloc_reg();
        self.em.store(reg)?;
        self.locals.insert(var, reg);
        Ok(())
    }

    fn declared_type(&self, var: VariableId, decl: NodeId) -> CodegenResult<TypeId> {
        match self.cx.binder.variable(var).ts_type {
            Some(ty) => Ok(ty),
            None => self.node_type(decl),
        }
    }

    fn compile_loop_body(&mut self, body: NodeId, break_label: LabelId, continue_label: LabelId) -> CodegenResult<()> {
        self.loops.push(LoopLabels { break_label, continue_label, try_depth: self.finalizers.len() });
        let result = self.compile_stmt(body);
        self.loops.pop();
        result
    }

    fn compile_for_of(&mut self, left: NodeId, right: NodeId, body: NodeId) -> CodegenResult<()> {
        let ast = self.ast();
        let table = self.table();
        let int = self.int_type();
        let declarator = match ast.kind(left) {
            NodeKind::VariableDeclaration { declarators, .. } => declarators.first().copied(),
            _ => None,
        }
        .ok_or_else(|| CodegenError::internal("for-of without a loop variable"))?;
        let var = self
            .cx
            .binder
            .variable_of_decl(declarator)
            .ok_or_else(|| CodegenError::internal("for-of declarator without a variable"))?;
        let element_ty = self.declared_type(var, declarator)?;

        self.compile_expr(right)?;
        let iterable_ty = self.member_target(self.em.acc_type()?);
        let iterable = self.em.store_temp()?;
        let (array_element, string_methods) = match table.get(iterable_ty) {
            Type::Array { element } => (Some(*element), None),
            _ if table.global.string_class == Some(iterable_ty) => {
                let class = Some(iterable_ty);
                let length = self.builtin_method(class, "length", false, |s| s.params.is_empty())?;
                let char_at = self.builtin_method(class, "charAt", false, |s| s.params.len() == 1)?;
                (None, Some((length, char_at)))
            }
            _ => {
                return Err(CodegenError::internal(format!(
                    "for-of over '{}'",
                    table.type_to_string(iterable_ty)
                )))
            }
        };

        match string_methods {
            Some((length, _)) => {
                let ret = table.signature(length).return_type;
                self.emit_call(Opcode::CallVirt, self.cx.method_id(length), &[iterable], Some(ret))?;
                self.convert_acc(int)?;
            }
            None => self.em.emit_with_reg(Opcode::Lenarr, iterable, Some(int))?,
        }
        let length = self.em.store_temp()?;
        self.em.load_i32(0, int);
        let index = self.em.store_temp()?;
        if !self.cx.binder.variable(var).flags.contains(VariableFlags::TOP_LEVEL) {
            let reg = self.em.alloc_reg();
            self.em.set_reg_type(reg, element_ty);
            self.locals.insert(var, reg);
        }

        let (head, next, end) = (self.em.new_label(), self.em.new_label(), self.em.new_label());
        self.em.set_label(head);
        self.em.load(index)?;
        self.em.branch_reg(Opcode::Jge, length, end)?;
        match (array_element, string_methods) {
            (Some(element), _) => {
                self.em.load(index)?;
                self.load_element(iterable, element)?;
            }
            (None, Some((_, char_at))) => {
                let ret = table.signature(char_at).return_type;
                self.emit_call(Opcode::CallVirt, self.cx.method_id(char_at), &[iterable, index], Some(ret))?;
            }
            (None, None) => return Err(CodegenError::unreachable("for-of without an element source")),
        }
        self.convert_acc(element_ty)?;
        self.store_variable(var)?;
        self.compile_loop_body(body, end, next)?;
        self.em.set_label(next);
        self.em.load_i32(1, int);
        self.em.emit_with_reg(Opcode::Add2, index, Some(int))?;
        self.em.store(index)?;
        self.em.jump(head);
        self.em.set_label(end);
        Ok(())
    }

    fn compile_return(&mut self, argument: Option<NodeId>) -> CodegenResult<()> {
        match (argument, self.return_mode) {
            (Some(argument), ReturnMode::Void) => {
                self.compile_expr(argument)?;
            }
            (Some(argument), _) => self.compile_expr_as(argument, self.return_type)?,
            (None, ReturnMode::AsyncImpl) => {
                self.em.load_undefined();
                self.convert_acc(self.return_type)?;
            }
            (None, _) => {}
        }
        if self.finalizers.iter().any(Option::is_some) {
            let value = match self.return_mode {
                ReturnMode::Void => None,
                _ => Some(self.em.store_temp()?),
            };
            self.exit_tries(0)?;
            if let Some(value) = value {
                self.em.load(value)?;
            }
        }
        self.emit_return()
    }

    /// Run the finalizers of the `try` statements deeper than `depth`,
    /// innermost first, as control leaves them.
    fn exit_tries(&mut self, depth: usize) -> CodegenResult<()> {
        let saved = self.finalizers.clone();
        let mut result = Ok(());
        while self.finalizers.len() > depth {
            if let Some(Some(finalizer)) = self.finalizers.pop() {
                result = self.compile_stmt(finalizer);
                if result.is_err() {
                    break;
                }
            }
        }
        self.finalizers = saved;
        result
    }

    fn compile_try(&mut self, block: NodeId, handlers: &[NodeId], finalizer: Option<NodeId>) -> CodegenResult<()> {
        let table = self.table();
        let (begin, end, after) = (self.em.new_label(), self.em.new_label(), self.em.new_label());

        self.em.set_label(begin);
        self.compile_protected(block, finalizer)?;
        self.em.set_label(end);
        if let Some(finalizer) = finalizer {
            self.compile_stmt(finalizer)?;
        }
        self.em.jump(after);

        let handlers_begin = self.em.new_label();
        self.em.set_label(handlers_begin);
        for &handler in handlers {
            let NodeKind::CatchClause { body, .. } = *self.ast().kind(handler) else {
                return Err(CodegenError::unreachable("expected a catch clause"));
            };
            let exception_ty = self.node_type(handler)?;
            let label = self.em.new_label();
            self.em.set_label(label);
            self.em.set_acc(exception_ty);
            let mark = self.em.mark();
            if let Some(var) = self.cx.binder.variable_of_decl(handler) {
                let reg = self.em.alloc_reg();
                self.em.store(reg)?;
                self.locals.insert(var, reg);
            }
            self.compile_protected(body, finalizer)?;
            if let Some(finalizer) = finalizer {
                self.compile_stmt(finalizer)?;
            }
            self.em.jump(after);
            self.em.release(mark);
            self.em.add_catch_block(CatchBlock {
                begin,
                end,
                handler: label,
                exception: Some(self.cx.record_name(exception_ty)),
            });
        }
        let handlers_end = self.em.new_label();
        self.em.set_label(handlers_end);

        if let Some(finalizer) = finalizer {
            // Anything escaping the block or a handler runs the finalizer
            // and is rethrown.
            let label = self.em.new_label();
            self.em.set_label(label);
            self.em.set_acc(table.global.exception.unwrap_or(table.global.object));
            let mark = self.em.mark();
            let exception = self.em.store_temp()?;
            self.compile_stmt(finalizer)?;
            self.em.emit_with_reg(Opcode::Throw, exception, None)?;
            self.em.release(mark);
            for (range_begin, range_end) in [(begin, end), (handlers_begin, handlers_end)] {
                self.em.add_catch_block(CatchBlock { begin: range_begin, end: range_end, handler: label, exception: None });
            }
        }
        self.em.set_label(after);
        Ok(())
    }

    /// Compile `body` with `finalizer` pending on every exit from it.
    fn compile_protected(&mut self, body: NodeId, finalizer: Option<NodeId>) -> CodegenResult<()> {
        self.finalizers.push(finalizer);
        let result = self.compile_stmt(body);
        self.finalizers.pop();
        result
    }
}
