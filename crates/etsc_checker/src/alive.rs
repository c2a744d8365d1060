//! Reachability.
//!
//! Runs after every body is typed: statements after a `return`, `throw`,
//! `break` or `continue` are rejected, and a function with a value return
//! type must not fall off the end of its body.

use crate::checker::Checker;
use crate::error::CheckResult;
use crate::types::*;
use etsc_ast::*;
use etsc_diagnostics::messages;

/// Whether control can reach the end of `node`.
pub(crate) fn completes(ast: &Ast, node: NodeId) -> bool {
    match ast.kind(node) {
        NodeKind::Return { .. } | NodeKind::Throw { .. } | NodeKind::Break | NodeKind::Continue => false,
        NodeKind::Block { statements } => statements.iter().all(|s| completes(ast, *s)),
        NodeKind::If { consequent, alternate, .. } => match alternate {
            Some(alternate) => completes(ast, *consequent) || completes(ast, *alternate),
            None => true,
        },
        NodeKind::While { test, body } => !is_true_literal(ast, *test) || contains_break(ast, *body),
        NodeKind::DoWhile { body, test } => {
            if is_true_literal(ast, *test) {
                contains_break(ast, *body)
            } else {
                completes(ast, *body) || contains_break(ast, *body) || contains_continue(ast, *body)
            }
        }
        NodeKind::For { test, body, .. } => match test {
            Some(test) if !is_true_literal(ast, *test) => true,
            _ => contains_break(ast, *body),
        },
        NodeKind::Try { block, handlers, finalizer } => {
            let body_completes = completes(ast, *block)
                || handlers.iter().any(|h| match ast.kind(*h) {
                    NodeKind::CatchClause { body, .. } => completes(ast, *body),
                    _ => true,
                });
            body_completes && finalizer.map_or(true, |f| completes(ast, f))
        }
        _ => true,
    }
}

fn is_true_literal(ast: &Ast, node: NodeId) -> bool {
    matches!(ast.kind(node), NodeKind::BooleanLiteral(true))
}

/// Whether a `break` inside `node` leaves the loop around `node`.
fn contains_break(ast: &Ast, node: NodeId) -> bool {
    contains_jump(ast, node, &|kind| matches!(kind, NodeKind::Break))
}

fn contains_continue(ast: &Ast, node: NodeId) -> bool {
    contains_jump(ast, node, &|kind| matches!(kind, NodeKind::Continue))
}

fn contains_jump(ast: &Ast, node: NodeId, is_jump: &dyn Fn(&NodeKind) -> bool) -> bool {
    if is_jump(ast.kind(node)) {
        return true;
    }
    ast.children(node).into_iter().any(|child| match ast.kind(child) {
        NodeKind::While { .. }
        | NodeKind::DoWhile { .. }
        | NodeKind::For { .. }
        | NodeKind::ForOf { .. }
        | NodeKind::ScriptFunction { .. }
        | NodeKind::ClassDeclaration { .. } => false,
        _ => contains_jump(ast, child, is_jump),
    })
}

pub(crate) fn check_program(checker: &mut Checker, program: NodeId) -> CheckResult<()> {
    let NodeKind::Program { statements, .. } = checker.ast.kind(program) else {
        return Ok(());
    };
    check_reachable(checker, &statements.clone())?;

    let mut functions = Vec::new();
    checker.ast.walk(program, &mut |ast, id| {
        if let NodeKind::ScriptFunction { body: Some(body), .. } = ast.kind(id) {
            functions.push((id, *body));
        }
    });
    for (function, body) in functions {
        check_reachable(checker, &[body])?;
        check_falls_through(checker, function, body)?;
    }
    Ok(())
}

/// Reject a statement that follows one which never completes, in
/// `statements` and every nested statement list.
fn check_reachable(checker: &Checker, statements: &[NodeId]) -> CheckResult<()> {
    let mut reachable = true;
    for &statement in statements {
        if !reachable && !matches!(checker.ast.kind(statement), NodeKind::Empty) {
            return Err(checker.error(statement, &messages::UNREACHABLE_STATEMENT, &[]));
        }
        check_nested(checker, statement)?;
        reachable = reachable && completes(&checker.ast, statement);
    }
    Ok(())
}

fn check_nested(checker: &Checker, statement: NodeId) -> CheckResult<()> {
    match checker.ast.kind(statement) {
        NodeKind::Block { statements } => check_reachable(checker, statements),
        NodeKind::If { consequent, alternate, .. } => {
            check_nested(checker, *consequent)?;
            alternate.map_or(Ok(()), |a| check_nested(checker, a))
        }
        NodeKind::While { body, .. }
        | NodeKind::DoWhile { body, .. }
        | NodeKind::For { body, .. }
        | NodeKind::ForOf { body, .. } => check_nested(checker, *body),
        NodeKind::Try { block, handlers, finalizer } => {
            check_nested(checker, *block)?;
            for handler in handlers {
                if let NodeKind::CatchClause { body, .. } = checker.ast.kind(*handler) {
                    check_nested(checker, *body)?;
                }
            }
            finalizer.map_or(Ok(()), |f| check_nested(checker, f))
        }
        _ => Ok(()),
    }
}

fn check_falls_through(checker: &Checker, function: NodeId, body: NodeId) -> CheckResult<()> {
    let NodeKind::ScriptFunction { signature: Some(sig), flags, .. } = checker.ast.kind(function) else {
        return Ok(());
    };
    if flags.contains(ScriptFunctionFlags::CONSTRUCTOR) || !completes(&checker.ast, body) {
        return Ok(());
    }
    let sig = checker.table.signature(*sig);
    let g = &checker.table.global;
    let mut ret = sig.return_type;
    if sig.flags.contains(SignatureFlags::ASYNC) {
        ret = checker.table.object(ret).and_then(|o| o.type_args.first().copied()).unwrap_or(g.void);
    }
    let returns_nothing = ret == g.void || ret == g.void_class || matches!(checker.table.get(ret), Type::Void);
    if returns_nothing {
        return Ok(());
    }
    Err(checker.error(function, &messages::FUNCTION_MUST_RETURN_VALUE, &[]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use etsc_core::text::TextSpan;
    use etsc_core::StringInterner;

    fn block(ast: &mut Ast, statements: Vec<NodeId>) -> NodeId {
        ast.alloc_with_parents(NodeKind::Block { statements }, TextSpan::default())
    }

    #[test]
    fn test_return_does_not_complete() {
        let mut ast = Ast::new(StringInterner::default());
        let ret = ast.alloc(NodeKind::Return { argument: None }, TextSpan::default());
        let body = block(&mut ast, vec![ret]);
        assert!(!completes(&ast, body));
    }

    #[test]
    fn test_infinite_loop_completes_only_with_break() {
        let mut ast = Ast::new(StringInterner::default());
        let test = ast.alloc(NodeKind::BooleanLiteral(true), TextSpan::default());
        let empty = ast.alloc(NodeKind::Empty, TextSpan::default());
        let body = block(&mut ast, vec![empty]);
        let forever = ast.alloc_with_parents(NodeKind::While { test, body }, TextSpan::default());
        assert!(!completes(&ast, forever));

        let test = ast.alloc(NodeKind::BooleanLiteral(true), TextSpan::default());
        let brk = ast.alloc(NodeKind::Break, TextSpan::default());
        let body = block(&mut ast, vec![brk]);
        let exits = ast.alloc_with_parents(NodeKind::While { test, body }, TextSpan::default());
        assert!(completes(&ast, exits));
    }

    #[test]
    fn test_break_in_nested_loop_does_not_count() {
        let mut ast = Ast::new(StringInterner::default());
        let inner_test = ast.alloc(NodeKind::BooleanLiteral(false), TextSpan::default());
        let brk = ast.alloc(NodeKind::Break, TextSpan::default());
        let inner_body = block(&mut ast, vec![brk]);
        let inner = ast.alloc_with_parents(NodeKind::While { test: inner_test, body: inner_body }, TextSpan::default());
        let outer_body = block(&mut ast, vec![inner]);
        assert!(!contains_break(&ast, outer_body));
    }

    #[test]
    fn test_if_without_else_completes() {
        let mut ast = Ast::new(StringInterner::default());
        let test = ast.alloc(NodeKind::BooleanLiteral(false), TextSpan::default());
        let ret = ast.alloc(NodeKind::Return { argument: None }, TextSpan::default());
        let node = ast.alloc_with_parents(NodeKind::If { test, consequent: ret, alternate: None }, TextSpan::default());
        assert!(completes(&ast, node));
    }
}
