//! Object literals become block expressions.
//!
//! `{ a: e1, b: e2 }` typed as class `C` is rewritten to
//!
//! ```text
//! { const $obj<n>: C = new C(); $obj<n>.a = e1; $obj<n>.b = e2; $obj<n> }
//! ```
//!
//! The property values keep their checked types and scopes; nested
//! literals are lowered first, so an outer literal moves already-lowered
//! block expressions into its assignments untouched.

use crate::{collect, replace_node, LoweringResult, Phase};
use etsc_ast::*;
use etsc_checker::Checker;

#[derive(Debug, Default)]
pub struct ObjectLiteralPhase {
    counter: u32,
}

impl Phase for ObjectLiteralPhase {
    fn name(&self) -> &'static str {
        "object-literal"
    }

    fn perform(&mut self, checker: &mut Checker) -> LoweringResult<()> {
        let literals = collect(&checker.ast, &|ast, id| matches!(ast.kind(id), NodeKind::ObjectLiteral { .. }));
        // Parents come before children; lower the innermost literals first.
        for literal in literals.into_iter().rev() {
            self.lower(checker, literal)?;
        }
        Ok(())
    }

    fn postcondition(&self, checker: &Checker) -> bool {
        collect(&checker.ast, &|ast, id| matches!(ast.kind(id), NodeKind::ObjectLiteral { .. })).is_empty()
    }
}

impl ObjectLiteralPhase {
    fn lower(&mut self, checker: &mut Checker, literal: NodeId) -> LoweringResult<()> {
        let NodeKind::ObjectLiteral { properties, preferred_type: Some(class) } = checker.ast.kind(literal).clone() else {
            return Err(etsc_checker::CheckerError::internal("object literal was not typed by the checker").into());
        };
        let span = checker.ast.span(literal);
        let temp = format!("$obj{}", self.counter);
        self.counter += 1;

        let ast = &mut checker.ast;
        let mut statements = Vec::with_capacity(properties.len() + 2);

        let name = ast.make_identifier(&temp, span);
        let annotation = ast.make_opaque_type(class, span);
        let class_ref = ast.make_opaque_type(class, span);
        let init = ast.alloc_with_parents(NodeKind::New { class: class_ref, arguments: Vec::new(), signature: None }, span);
        let declarator =
            ast.alloc_with_parents(NodeKind::VariableDeclarator { name, type_annotation: Some(annotation), init: Some(init) }, span);
        statements.push(ast.alloc_with_parents(
            NodeKind::VariableDeclaration {
                kind: VariableKind::Const,
                declarators: vec![declarator],
                modifiers: ModifierFlags::SYNTHETIC,
            },
            span,
        ));

        for property in properties {
            let NodeKind::Property { key, value } = *ast.kind(property) else { continue };
            let key_text = ast.name_str(key).to_string();
            let object = ast.make_identifier(&temp, span);
            let target = ast.make_member(object, &key_text, ast.span(key));
            let assign = ast.alloc_with_parents(
                NodeKind::Assignment { op: AssignOp::Assign, target, value, operation_type: None },
                ast.span(property),
            );
            statements.push(ast.make_expression_statement(assign));
        }

        let result = ast.make_identifier(&temp, span);
        statements.push(ast.make_expression_statement(result));
        let block = ast.alloc_with_parents(NodeKind::BlockExpression { statements }, span);
        replace_node(ast, literal, block);

        let boxing = checker.ast.boxing(literal);
        let ty = checker.check_synthesized(block)?;
        checker.ast.set_boxing_flags(block, boxing);
        tracing::trace!(temp = temp.as_str(), ty = %checker.table.type_to_string(ty), "lowered object literal");
        Ok(())
    }
}
