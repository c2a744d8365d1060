//! etsc_lowering: Post-check AST rewrites.
//!
//! Each phase replaces one source construct with code the generator
//! already knows how to emit, then hands the replacement back to the
//! checker so it carries types like everything else. Phases are not
//! idempotent; the driver runs each exactly once, in the order of
//! [`default_phases`], and checks its postcondition afterwards.

mod interface_property;
mod object_index;
mod object_literal;

pub use interface_property::InterfacePropertyPhase;
pub use object_index::ObjectIndexPhase;
pub use object_literal::ObjectLiteralPhase;

use etsc_ast::{Ast, NodeId};
use etsc_checker::{Checker, CheckerError};

#[derive(Debug, thiserror::Error)]
pub enum LoweringError {
    #[error(transparent)]
    Check(#[from] CheckerError),
    /// A phase left an instance of the construct it removes.
    #[error("postcondition of lowering phase '{0}' does not hold")]
    Postcondition(&'static str),
}

pub type LoweringResult<T> = Result<T, LoweringError>;

/// A tree rewrite run once after checking.
pub trait Phase {
    fn name(&self) -> &'static str;

    /// Rewrite every program registered in the checker's AST.
    fn perform(&mut self, checker: &mut Checker) -> LoweringResult<()>;

    /// Whether no instance of the rewritten construct remains.
    fn postcondition(&self, checker: &Checker) -> bool;
}

/// The phases in the order the driver runs them.
pub fn default_phases() -> Vec<Box<dyn Phase>> {
    vec![
        Box::new(InterfacePropertyPhase::default()),
        Box::new(ObjectLiteralPhase::default()),
        Box::new(ObjectIndexPhase::default()),
    ]
}

/// Run `phases` in order, checking each postcondition.
pub fn run_phases(checker: &mut Checker, phases: &mut [Box<dyn Phase>]) -> LoweringResult<()> {
    for phase in phases.iter_mut() {
        let _span = tracing::debug_span!("lowering", phase = phase.name()).entered();
        phase.perform(checker)?;
        if !phase.postcondition(checker) {
            return Err(LoweringError::Postcondition(phase.name()));
        }
    }
    Ok(())
}

/// Nodes under every program for which `pred` holds, parents first.
pub(crate) fn collect(ast: &Ast, pred: &dyn Fn(&Ast, NodeId) -> bool) -> Vec<NodeId> {
    let mut found = Vec::new();
    for &program in ast.programs() {
        ast.walk(program, &mut |ast, id| {
            if pred(ast, id) {
                found.push(id);
            }
        });
    }
    found
}

/// Put `new` where `old` is in its parent.
pub(crate) fn replace_node(ast: &mut Ast, old: NodeId, new: NodeId) {
    let parent = ast.parent(old);
    if let Some(parent) = parent {
        ast.for_each_child_mut(parent, |slot| {
            if *slot == old {
                *slot = new;
            }
        });
    }
    ast.set_parent(new, parent);
}
