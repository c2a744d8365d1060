//! Statements, conditions and flow-sensitive narrowing.

use crate::alive;
use crate::checker::Checker;
use crate::contexts::ResolutionContext;
use crate::error::{CheckResult, CheckerError};
use crate::relation::{unbox_flag, TypeRelationFlags};
use crate::types::*;
use etsc_ast::*;
use etsc_binder::{DeclKind, VariableFlags};
use etsc_diagnostics::messages;

/// Narrowings that hold when a condition is true and when it is false.
pub(crate) type Narrowing = (Vec<(VariableId, TypeId)>, Vec<(VariableId, TypeId)>);

impl Checker {
    pub(crate) fn check_statement_list(&mut self, statements: &[NodeId], ctx: &mut ResolutionContext) -> CheckResult<()> {
        for &stmt in statements {
            self.check_statement(stmt, ctx)?;
        }
        Ok(())
    }

    pub(crate) fn check_statement(&mut self, node: NodeId, ctx: &mut ResolutionContext) -> CheckResult<()> {
        match self.ast.kind(node).clone() {
            NodeKind::VariableDeclaration { declarators, .. } => {
                for declarator in declarators {
                    self.check_declarator(declarator, ctx)?;
                }
            }
            NodeKind::FunctionDeclaration { function } => self.check_function_body(function)?,
            NodeKind::ClassDeclaration { .. } => self.check_class(node)?,
            NodeKind::InterfaceDeclaration { .. } => self.check_interface(node)?,
            NodeKind::EnumDeclaration { .. } => {
                self.ensure_declared(node)?;
            }
            NodeKind::TypeAlias { .. } => {
                if let Some(var) = self.binder.variable_of_decl(node) {
                    self.get_type_of_variable(var)?;
                }
            }
            NodeKind::ImportDeclaration { specifiers, .. } => {
                for spec in specifiers {
                    let Some(var) = self.binder.variable_of_decl(spec) else { continue };
                    if self.binder.variable(var).is_dynamic_import() {
                        self.get_type_of_variable(var)?;
                    }
                }
            }
            NodeKind::Block { statements } => {
                let mut inner = ctx.clone();
                self.check_statement_list(&statements, &mut inner)?;
                self.drop_assigned_casts(node, ctx);
            }
            NodeKind::ExpressionStatement { expression } => {
                self.check_expr(expression, ctx)?;
                self.drop_assigned_casts(expression, ctx);
            }
            NodeKind::If { test, consequent, alternate } => self.check_if(test, consequent, alternate, ctx)?,
            NodeKind::While { test, body } => {
                self.drop_assigned_casts(node, ctx);
                self.check_condition(test, ctx)?;
                let (when_true, _) = self.narrowing_of(test, ctx)?;
                let mut body_ctx = ctx.with_smart_casts(&when_true);
                self.check_statement(body, &mut body_ctx)?;
            }
            NodeKind::DoWhile { body, test } => {
                self.drop_assigned_casts(node, ctx);
                let mut body_ctx = ctx.clone();
                self.check_statement(body, &mut body_ctx)?;
                self.check_condition(test, ctx)?;
            }
            NodeKind::For { init, test, update, body } => {
                self.drop_assigned_casts(node, ctx);
                let mut inner = ctx.clone();
                if let Some(init) = init {
                    self.check_statement(init, &mut inner)?;
                }
                let mut when_true = Vec::new();
                if let Some(test) = test {
                    self.check_condition(test, &inner)?;
                    when_true = self.narrowing_of(test, &inner)?.0;
                }
                let mut body_ctx = inner.with_smart_casts(&when_true);
                self.check_statement(body, &mut body_ctx)?;
                if let Some(update) = update {
                    self.check_expr(update, &inner)?;
                }
            }
            NodeKind::ForOf { left, right, body } => {
                self.drop_assigned_casts(node, ctx);
                self.check_for_of(left, right, ctx)?;
                let mut body_ctx = ctx.clone();
                self.check_statement(body, &mut body_ctx)?;
            }
            NodeKind::Return { argument } => self.check_return(node, argument, ctx)?,
            NodeKind::Throw { argument } => {
                let ty = self.check_expr(argument, ctx)?;
                if !self.is_exception(ty) {
                    return Err(self.error(argument, &messages::ARGUMENT_MUST_BE_EXCEPTION, &[]));
                }
            }
            NodeKind::Try { block, handlers, finalizer } => {
                let mut inner = ctx.clone();
                self.check_statement(block, &mut inner)?;
                let mut caught: Vec<TypeId> = Vec::new();
                for handler in handlers {
                    let ty = self.check_catch_clause(handler, ctx)?;
                    if caught.contains(&ty) {
                        let text = self.type_str(ty);
                        return Err(self.error(handler, &messages::REDECLARATION_OF_EXCEPTION_TYPE, &[&text]));
                    }
                    caught.push(ty);
                }
                if let Some(finalizer) = finalizer {
                    let mut inner = ctx.clone();
                    self.check_statement(finalizer, &mut inner)?;
                }
                self.drop_assigned_casts(node, ctx);
            }
            NodeKind::Break | NodeKind::Continue | NodeKind::Empty => {}
            // Class members reach here only through synthesized code.
            NodeKind::ClassProperty { .. } | NodeKind::MethodDefinition { .. } => {}
            other => {
                return Err(CheckerError::internal(format!("'{}' is not a statement", other.name())));
            }
        }
        Ok(())
    }

    fn check_declarator(&mut self, declarator: NodeId, ctx: &mut ResolutionContext) -> CheckResult<()> {
        let NodeKind::VariableDeclarator { type_annotation, init, .. } = *self.ast.kind(declarator) else {
            return Err(CheckerError::internal("expected a variable declarator"));
        };
        let var = self
            .binder
            .variable_of_decl(declarator)
            .ok_or_else(|| CheckerError::internal("declarator was not bound"))?;
        let kind = self.binder.variable(var).kind;
        let declared = match type_annotation {
            Some(annotation) => Some(self.resolve_type_annotation(annotation)?),
            None => None,
        };
        let ty = match (init, declared) {
            (Some(init), declared) => {
                let init_ty = self.check_expr_expected(init, declared, ctx)?;
                if matches!(self.table.get(init_ty), Type::Void) {
                    return Err(self.error(init, &messages::VOID_USED_AS_VALUE, &[]));
                }
                match declared {
                    Some(target) => self.check_assignable(init, init_ty, target, TypeRelationFlags::NONE)?,
                    None if kind == DeclKind::Const => init_ty,
                    None => self.table.widen(init_ty),
                }
            }
            (None, Some(target)) => target,
            (None, None) => {
                let name = self.ast.name_str(declarator).to_string();
                return Err(self.error(declarator, &messages::CANNOT_INFER_TYPE_OF_0, &[&name]));
            }
        };
        let ty = self.binder.variable(var).ts_type.unwrap_or(ty);
        self.binder.set_variable_type(var, ty);
        self.ast.set_ts_type(declarator, ty);
        ctx.drop_smart_cast(var);
        Ok(())
    }

    fn check_if(
        &mut self,
        test: NodeId,
        consequent: NodeId,
        alternate: Option<NodeId>,
        ctx: &mut ResolutionContext,
    ) -> CheckResult<()> {
        self.check_condition(test, ctx)?;
        let (when_true, when_false) = self.narrowing_of(test, ctx)?;
        let mut then_ctx = ctx.with_smart_casts(&when_true);
        self.check_statement(consequent, &mut then_ctx)?;
        if let Some(alternate) = alternate {
            let mut else_ctx = ctx.with_smart_casts(&when_false);
            self.check_statement(alternate, &mut else_ctx)?;
            self.drop_assigned_casts(alternate, ctx);
        }
        self.drop_assigned_casts(consequent, ctx);

        // An early exit keeps the opposite narrowing for the rest of the block.
        let then_exits = !alive::completes(&self.ast, consequent);
        let else_exits = alternate.is_some_and(|a| !alive::completes(&self.ast, a));
        if then_exits && !else_exits {
            let kept = self.without_assigned(alternate, when_false);
            ctx.smart_casts.extend(kept);
        } else if else_exits && !then_exits {
            let kept = self.without_assigned(Some(consequent), when_true);
            ctx.smart_casts.extend(kept);
        }
        Ok(())
    }

    fn check_for_of(&mut self, left: NodeId, right: NodeId, ctx: &ResolutionContext) -> CheckResult<()> {
        let iterable = self.check_expr(right, ctx)?;
        let element = match self.table.get(iterable) {
            Type::Array { element } => *element,
            Type::String { .. } => self.table.primitive(PrimitiveKind::Char),
            _ => {
                let text = self.type_str(iterable);
                return Err(self.error(right, &messages::FOR_OF_NOT_ITERABLE, &[&text]));
            }
        };
        let NodeKind::VariableDeclaration { declarators, .. } = self.ast.kind(left).clone() else {
            return Err(CheckerError::internal("for-of target must be a declaration"));
        };
        for declarator in declarators {
            let Some(var) = self.binder.variable_of_decl(declarator) else { continue };
            let annotation = match *self.ast.kind(declarator) {
                NodeKind::VariableDeclarator { type_annotation, .. } => type_annotation,
                _ => None,
            };
            let ty = match annotation {
                Some(annotation) => {
                    let declared = self.resolve_type_annotation(annotation)?;
                    let result = self.table.is_assignable(element, declared, TypeRelationFlags::NONE);
                    if !result.related {
                        let (a, b) = (self.type_str(element), self.type_str(declared));
                        return Err(self.error(declarator, &messages::TYPE_0_NOT_COMPATIBLE_WITH_1, &[&a, &b]));
                    }
                    declared
                }
                None => element,
            };
            self.binder.set_variable_type(var, ty);
            self.ast.set_ts_type(declarator, ty);
        }
        Ok(())
    }

    fn check_return(&mut self, node: NodeId, argument: Option<NodeId>, ctx: &ResolutionContext) -> CheckResult<()> {
        let Some(sig) = ctx.containing_signature else {
            return Err(CheckerError::internal("return outside of a function"));
        };
        let signature = self.table.signature(sig).clone();
        if signature.flags.contains(SignatureFlags::INFERRING) {
            let ty = match argument {
                Some(arg) => self.check_expr(arg, ctx)?,
                None => self.table.global.void,
            };
            if let Some(collector) = self.return_collectors.last_mut() {
                collector.push(ty);
            }
            return Ok(());
        }

        let expected = if signature.flags.contains(SignatureFlags::ASYNC) {
            self.table
                .object(signature.return_type)
                .and_then(|o| o.type_args.first().copied())
                .unwrap_or(self.table.global.object)
        } else {
            signature.return_type
        };
        let returns_nothing = matches!(self.table.get(expected), Type::Void) || expected == self.table.global.void_class;
        match argument {
            None if returns_nothing => Ok(()),
            None => Err(self.error(node, &messages::MISSING_RETURN_VALUE, &[])),
            Some(arg) if matches!(self.table.get(expected), Type::Void) => {
                let ty = self.check_expr(arg, ctx)?;
                if matches!(self.table.get(ty), Type::Void) {
                    return Ok(());
                }
                Err(self.error(arg, &messages::UNEXPECTED_RETURN_VALUE, &[]))
            }
            Some(arg) => {
                let ty = self.check_expr_expected(arg, Some(expected), ctx)?;
                self.check_assignable(arg, ty, expected, TypeRelationFlags::NONE)?;
                Ok(())
            }
        }
    }

    fn check_catch_clause(&mut self, clause: NodeId, ctx: &ResolutionContext) -> CheckResult<TypeId> {
        let NodeKind::CatchClause { type_annotation, body, .. } = *self.ast.kind(clause) else {
            return Err(CheckerError::internal("expected a catch clause"));
        };
        let ty = match type_annotation {
            Some(annotation) => {
                let ty = self.resolve_type_annotation(annotation)?;
                if !self.is_exception(ty) {
                    return Err(self.error(annotation, &messages::ARGUMENT_MUST_BE_EXCEPTION, &[]));
                }
                ty
            }
            None => self.table.global.exception.unwrap_or(self.table.global.object),
        };
        if let Some(var) = self.binder.variable_of_decl(clause) {
            self.binder.set_variable_type(var, ty);
        }
        self.ast.set_ts_type(clause, ty);
        let mut inner = ctx.clone();
        self.check_statement(body, &mut inner)?;
        Ok(ty)
    }

    pub(crate) fn is_exception(&mut self, ty: TypeId) -> bool {
        let roots = [self.table.global.exception, self.table.global.error];
        roots.into_iter().flatten().any(|root| self.table.is_supertype_of(root, ty))
    }

    // ========================================================================
    // Conditions
    // ========================================================================

    pub(crate) fn check_condition(&mut self, test: NodeId, ctx: &ResolutionContext) -> CheckResult<()> {
        let ty = self.check_expr(test, ctx)?;
        self.require_condition(test, ty)
    }

    /// A condition is `boolean`, or `Boolean` unboxed on the spot.
    pub(crate) fn require_condition(&mut self, node: NodeId, ty: TypeId) -> CheckResult<()> {
        if self.table.primitive_kind(ty) == Some(PrimitiveKind::Boolean) {
            return Ok(());
        }
        if self.table.unboxed_kind(ty) == Some(PrimitiveKind::Boolean) {
            self.ast.add_boxing_flags(node, unbox_flag(PrimitiveKind::Boolean));
            return Ok(());
        }
        if matches!(self.table.get(ty), Type::Void) {
            return Err(self.error(node, &messages::VOID_CANNOT_BE_TESTED, &[]));
        }
        let text = self.type_str(ty);
        Err(self.error(node, &messages::CONDITION_MUST_BE_CONDITION_TYPE, &[&text]))
    }

    /// Narrowings implied by a condition: null checks, `instanceof`, and
    /// their combinations with `&&`, `||` and `!`.
    pub(crate) fn narrowing_of(&mut self, test: NodeId, ctx: &ResolutionContext) -> CheckResult<Narrowing> {
        match self.ast.kind(test).clone() {
            NodeKind::Binary { op, left, right, .. } if op.is_equality() => {
                let (var, literal) = match (self.narrowable_variable(left, ctx), self.nullish_literal(right)) {
                    (Some(var), Some(lit)) => (var, lit),
                    _ => match (self.narrowable_variable(right, ctx), self.nullish_literal(left)) {
                        (Some(var), Some(lit)) => (var, lit),
                        _ => return Ok((Vec::new(), Vec::new())),
                    },
                };
                let current = match ctx.smart_cast(var) {
                    Some(ty) => ty,
                    None => self.get_type_of_variable(var)?,
                };
                let strict = matches!(op, BinaryOp::StrictEq | BinaryOp::StrictNotEq);
                let non_nullish = if strict { self.remove_one_nullish(current, literal) } else { self.table.remove_nullish(current) };
                let narrowed = vec![(var, non_nullish)];
                Ok(match op {
                    BinaryOp::NotEq | BinaryOp::StrictNotEq => (narrowed, Vec::new()),
                    _ => (Vec::new(), narrowed),
                })
            }
            NodeKind::InstanceOf { expression, type_annotation } => {
                let Some(var) = self.narrowable_variable(expression, ctx) else { return Ok((Vec::new(), Vec::new())) };
                let target = self.resolve_type_annotation(type_annotation)?;
                Ok((vec![(var, target)], Vec::new()))
            }
            NodeKind::Binary { op: BinaryOp::LogicalAnd, left, right, .. } => {
                let (mut when_true, _) = self.narrowing_of(left, ctx)?;
                let inner = ctx.with_smart_casts(&when_true);
                when_true.extend(self.narrowing_of(right, &inner)?.0);
                Ok((when_true, Vec::new()))
            }
            NodeKind::Binary { op: BinaryOp::LogicalOr, left, right, .. } => {
                let (_, mut when_false) = self.narrowing_of(left, ctx)?;
                let inner = ctx.with_smart_casts(&when_false);
                when_false.extend(self.narrowing_of(right, &inner)?.1);
                Ok((Vec::new(), when_false))
            }
            NodeKind::Unary { op: UnaryOp::Not, argument } => {
                let (when_true, when_false) = self.narrowing_of(argument, ctx)?;
                Ok((when_false, when_true))
            }
            _ => Ok((Vec::new(), Vec::new())),
        }
    }

    /// A local variable or constant that flow narrowing may refine. A
    /// top-level `let` is refined only in top-level statements; inside a
    /// function any call may have reassigned it.
    fn narrowable_variable(&self, node: NodeId, ctx: &ResolutionContext) -> Option<VariableId> {
        let NodeKind::Identifier { name, .. } = *self.ast.kind(node) else { return None };
        let var = self.lookup(node, name)?;
        let variable = self.binder.variable(var);
        let visible = !variable.flags.contains(VariableFlags::TOP_LEVEL) || ctx.containing_function.is_none();
        match variable.kind {
            DeclKind::Const => Some(var),
            DeclKind::Let | DeclKind::Param | DeclKind::CatchParam if visible => Some(var),
            _ => None,
        }
    }

    fn nullish_literal(&self, node: NodeId) -> Option<TypeFlags> {
        match self.ast.kind(node) {
            NodeKind::NullLiteral => Some(TypeFlags::NULL),
            NodeKind::UndefinedLiteral => Some(TypeFlags::UNDEFINED),
            _ => None,
        }
    }

    fn remove_one_nullish(&mut self, ty: TypeId, which: TypeFlags) -> TypeId {
        match self.table.union_constituents(ty).map(|c| c.to_vec()) {
            Some(members) => {
                let kept: Vec<TypeId> = members.into_iter().filter(|m| !self.table.flags(*m).intersects(which)).collect();
                self.table.create_union(&kept)
            }
            None if self.table.flags(ty).intersects(which) => self.table.global.never,
            None => ty,
        }
    }

    // ========================================================================
    // Assignment tracking
    // ========================================================================

    /// Variables assigned anywhere under `node`.
    fn assigned_variables(&self, node: NodeId) -> Vec<VariableId> {
        let mut out = Vec::new();
        self.ast.walk(node, &mut |ast, id| {
            let target = match ast.kind(id) {
                NodeKind::Assignment { target, .. } => *target,
                NodeKind::Update { argument, .. } => *argument,
                _ => return,
            };
            if let NodeKind::Identifier { name, .. } = *ast.kind(target) {
                if let Some(var) = self.lookup(target, name) {
                    out.push(var);
                }
            }
        });
        out
    }

    fn drop_assigned_casts(&self, node: NodeId, ctx: &mut ResolutionContext) {
        if ctx.smart_casts.is_empty() {
            return;
        }
        for var in self.assigned_variables(node) {
            ctx.drop_smart_cast(var);
        }
    }

    fn without_assigned(&self, node: Option<NodeId>, casts: Vec<(VariableId, TypeId)>) -> Vec<(VariableId, TypeId)> {
        let assigned = node.map(|n| self.assigned_variables(n)).unwrap_or_default();
        casts.into_iter().filter(|(v, _)| !assigned.contains(v)).collect()
    }
}
