//! Indexing a class instance becomes a call of its index methods.
//!
//! `o[i]` reads through `o.$_get(i)`; `o[i] = v` as a statement becomes
//! `o.$_set(i, v)`. Writes whose value is used, compound assignments and
//! increments evaluate `o` and `i` once into temporaries:
//!
//! ```text
//! { const $o: O = o; const $i: I = i; const $v: V = ($o.$_get($i) + v) as V; $o.$_set($i, $v); $v }
//! ```

use crate::{collect, replace_node, LoweringResult, Phase};
use etsc_ast::*;
use etsc_checker::{Checker, CheckerError, Type};
use etsc_core::text::TextSpan;

#[derive(Debug, Default)]
pub struct ObjectIndexPhase {
    counter: u32,
}

/// How an index expression is used by its parent.
enum Access {
    Read,
    /// Assignment whose value is discarded.
    Store { assignment: NodeId, value: NodeId },
    /// Assignment, compound assignment or update whose result is used.
    Update { node: NodeId, op: Option<BinaryOp>, value: Option<NodeId>, postfix: bool },
}

impl Phase for ObjectIndexPhase {
    fn name(&self) -> &'static str {
        "object-index"
    }

    fn perform(&mut self, checker: &mut Checker) -> LoweringResult<()> {
        let view: &Checker = checker;
        let members = collect(&view.ast, &|ast, id| is_object_index(view, ast, id));
        for member in members.into_iter().rev() {
            self.lower(checker, member)?;
        }
        Ok(())
    }

    fn postcondition(&self, checker: &Checker) -> bool {
        collect(&checker.ast, &|ast, id| is_object_index(checker, ast, id)).is_empty()
    }
}

/// A computed member on a class instance or a string.
fn is_object_index(checker: &Checker, ast: &Ast, id: NodeId) -> bool {
    let NodeKind::Member { computed: true, obj_type: Some(ty), .. } = *ast.kind(id) else { return false };
    matches!(checker.table.get(ty), Type::Object(_) | Type::String { .. })
}

impl ObjectIndexPhase {
    fn lower(&mut self, checker: &mut Checker, member: NodeId) -> LoweringResult<()> {
        let NodeKind::Member { object, property, optional, obj_type: Some(obj_ty), .. } = *checker.ast.kind(member) else {
            return Ok(());
        };
        if !matches!(checker.table.get(obj_ty), Type::Object(_) | Type::String { .. }) {
            return Ok(());
        }

        match classify(&checker.ast, member) {
            Access::Read => {
                let span = checker.ast.span(member);
                let callee = checker.ast.make_member(object, "$_get", span);
                if let NodeKind::Member { optional: slot, .. } = checker.ast.kind_mut(callee) {
                    *slot = optional;
                }
                let call = checker.ast.make_call(callee, vec![property], span);
                self.replace_and_check(checker, member, call)
            }
            Access::Store { assignment, value } => {
                let span = checker.ast.span(assignment);
                let callee = checker.ast.make_member(object, "$_set", span);
                let call = checker.ast.make_call(callee, vec![property, value], span);
                self.replace_and_check(checker, assignment, call)
            }
            Access::Update { node, op, value, postfix } => {
                let block = self.build_update(checker, node, object, property, obj_ty, op, value, postfix)?;
                self.replace_and_check(checker, node, block)
            }
        }
    }

    fn replace_and_check(&mut self, checker: &mut Checker, old: NodeId, new: NodeId) -> LoweringResult<()> {
        replace_node(&mut checker.ast, old, new);
        let boxing = checker.ast.boxing(old);
        checker.check_synthesized(new)?;
        checker.ast.add_boxing_flags(new, boxing);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn build_update(
        &mut self,
        checker: &mut Checker,
        node: NodeId,
        object: NodeId,
        property: NodeId,
        obj_ty: TypeId,
        op: Option<BinaryOp>,
        value: Option<NodeId>,
        postfix: bool,
    ) -> LoweringResult<NodeId> {
        let result_ty = checker
            .ast
            .ts_type(node)
            .ok_or_else(|| CheckerError::internal("index assignment was not typed by the checker"))?;
        let value_ty = checker.table.widen(result_ty);
        let index_ty = match checker.ast.ts_type(property) {
            Some(ty) => checker.table.widen(ty),
            None => return Err(CheckerError::internal("index was not typed by the checker").into()),
        };
        let span = checker.ast.span(node);
        let n = self.counter;
        self.counter += 1;
        let (o, i, v) = (format!("$o{n}"), format!("$i{n}"), format!("$v{n}"));

        let ast = &mut checker.ast;
        let mut statements = vec![
            declare(ast, &o, obj_ty, object, span),
            declare(ast, &i, index_ty, property, span),
        ];

        // The value stored back, and the value the expression yields.
        let stored = match (op, value) {
            (None, Some(value)) => value,
            (Some(op), value) => {
                let current = read(ast, &o, &i, span);
                let right = match value {
                    Some(value) => value,
                    None => ast.make_int_literal(1, span),
                };
                let current = if postfix {
                    // Keep the old value in `$v`, store the new one.
                    statements.push(declare(ast, &v, value_ty, current, span));
                    ast.make_identifier(&v, span)
                } else {
                    current
                };
                let binary =
                    ast.alloc_with_parents(NodeKind::Binary { op, left: current, right, operation_type: None }, span);
                cast(ast, binary, value_ty, span)
            }
            (None, None) => return Err(CheckerError::internal("index assignment without a value").into()),
        };

        if postfix {
            let o_ref = ast.make_identifier(&o, span);
            let callee = ast.make_member(o_ref, "$_set", span);
            let i_ref = ast.make_identifier(&i, span);
            let call = ast.make_call(callee, vec![i_ref, stored], span);
            statements.push(ast.make_expression_statement(call));
        } else {
            statements.push(declare(ast, &v, value_ty, stored, span));
            let o_ref = ast.make_identifier(&o, span);
            let callee = ast.make_member(o_ref, "$_set", span);
            let i_ref = ast.make_identifier(&i, span);
            let v_ref = ast.make_identifier(&v, span);
            let call = ast.make_call(callee, vec![i_ref, v_ref], span);
            statements.push(ast.make_expression_statement(call));
        }
        let result = ast.make_identifier(&v, span);
        statements.push(ast.make_expression_statement(result));
        Ok(ast.alloc_with_parents(NodeKind::BlockExpression { statements }, span))
    }
}

fn classify(ast: &Ast, member: NodeId) -> Access {
    let Some(parent) = ast.parent(member) else { return Access::Read };
    match *ast.kind(parent) {
        NodeKind::Assignment { op, target, value, .. } if target == member => {
            let discarded = ast.parent(parent).is_some_and(|p| matches!(ast.kind(p), NodeKind::ExpressionStatement { .. }));
            match op {
                AssignOp::Assign if discarded => Access::Store { assignment: parent, value },
                AssignOp::Assign => Access::Update { node: parent, op: None, value: Some(value), postfix: false },
                AssignOp::Compound(op) => Access::Update { node: parent, op: Some(op), value: Some(value), postfix: false },
            }
        }
        NodeKind::Update { op, prefix, argument } if argument == member => {
            let op = match op {
                UpdateOp::Increment => BinaryOp::Add,
                UpdateOp::Decrement => BinaryOp::Sub,
            };
            Access::Update { node: parent, op: Some(op), value: None, postfix: !prefix }
        }
        _ => Access::Read,
    }
}

/// `const <name>: <ty> = <init>;`
fn declare(ast: &mut Ast, name: &str, ty: TypeId, init: NodeId, span: TextSpan) -> NodeId {
    let name = ast.make_identifier(name, span);
    let annotation = ast.make_opaque_type(ty, span);
    let declarator =
        ast.alloc_with_parents(NodeKind::VariableDeclarator { name, type_annotation: Some(annotation), init: Some(init) }, span);
    ast.alloc_with_parents(
        NodeKind::VariableDeclaration { kind: VariableKind::Const, declarators: vec![declarator], modifiers: ModifierFlags::SYNTHETIC },
        span,
    )
}

/// `<o>.$_get(<i>)`
fn read(ast: &mut Ast, o: &str, i: &str, span: TextSpan) -> NodeId {
    let o_ref = ast.make_identifier(o, span);
    let callee = ast.make_member(o_ref, "$_get", span);
    let i_ref = ast.make_identifier(i, span);
    ast.make_call(callee, vec![i_ref], span)
}

fn cast(ast: &mut Ast, expression: NodeId, ty: TypeId, span: TextSpan) -> NodeId {
    let type_annotation = ast.make_opaque_type(ty, span);
    ast.alloc_with_parents(NodeKind::As { expression, type_annotation }, span)
}
