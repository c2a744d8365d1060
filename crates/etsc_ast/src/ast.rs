//! The node arena.

use crate::flags::BoxingUnboxingFlags;
use crate::node::{Node, NodeKind, Number, ProgramKind};
use crate::{FileId, NodeId, TypeId};
use etsc_core::arena::IndexVec;
use etsc_core::intern::{Name, StringInterner};
use etsc_core::text::{LineIndex, SourcePosition, TextSpan};
use std::fmt::Write as _;

/// A source file known to the compilation.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub text: String,
    pub line_index: LineIndex,
}

/// Arena holding every node of every program in one compilation.
#[derive(Debug, Clone)]
pub struct Ast {
    nodes: IndexVec<NodeId, Node>,
    files: IndexVec<FileId, SourceFile>,
    programs: Vec<NodeId>,
    pub interner: StringInterner,
}

impl Ast {
    pub fn new(interner: StringInterner) -> Self {
        Self { nodes: IndexVec::new(), files: IndexVec::new(), programs: Vec::new(), interner }
    }

    // ---- Files and programs ----

    pub fn add_file(&mut self, name: impl Into<String>, text: impl Into<String>) -> FileId {
        let text = text.into();
        let line_index = LineIndex::new(&text);
        self.files.push(SourceFile { name: name.into(), text, line_index })
    }

    pub fn file(&self, id: FileId) -> &SourceFile {
        &self.files[id]
    }

    /// Register a parsed program root.
    pub fn add_program(&mut self, root: NodeId) {
        self.programs.push(root);
    }

    /// Program roots in registration order.
    pub fn programs(&self) -> &[NodeId] {
        &self.programs
    }

    /// Move `order` to the front of the program list, keeping the rest in
    /// registration order after it.
    pub fn reorder_programs(&mut self, order: &[NodeId]) {
        let front: Vec<NodeId> = order.iter().copied().filter(|p| self.programs.contains(p)).collect();
        let rest = self.programs.iter().copied().filter(|p| !order.contains(p));
        let reordered: Vec<NodeId> = front.iter().copied().chain(rest).collect();
        self.programs = reordered;
    }

    pub fn main_program(&self) -> Option<NodeId> {
        self.programs
            .iter()
            .copied()
            .find(|&p| matches!(self.kind(p), NodeKind::Program { kind: ProgramKind::Main, .. }))
    }

    /// The program node containing `id`.
    pub fn program_of(&self, mut id: NodeId) -> NodeId {
        while let Some(parent) = self.node(id).parent {
            id = parent;
        }
        id
    }

    /// The source file containing `id`, if it belongs to a program.
    pub fn file_of(&self, id: NodeId) -> Option<&SourceFile> {
        match self.kind(self.program_of(id)) {
            NodeKind::Program { file, .. } => Some(self.file(*file)),
            _ => None,
        }
    }

    /// Line and column of the start of `id`.
    pub fn position_of(&self, id: NodeId) -> SourcePosition {
        let span = self.span(id);
        self.file_of(id).map(|f| f.line_index.position(span.start)).unwrap_or_default()
    }

    // ---- Nodes ----

    pub fn alloc(&mut self, kind: NodeKind, span: TextSpan) -> NodeId {
        self.nodes.push(Node::new(kind, span))
    }

    /// Allocate a node and point the parent link of each of its children at it.
    pub fn alloc_with_parents(&mut self, kind: NodeKind, span: TextSpan) -> NodeId {
        let id = self.alloc(kind, span);
        for child in self.children(id) {
            self.nodes[child].parent = Some(id);
        }
        id
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id].kind
    }

    #[inline]
    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id].kind
    }

    #[inline]
    pub fn span(&self, id: NodeId) -> TextSpan {
        self.nodes[id].span
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) {
        self.nodes[id].parent = parent;
    }

    /// Point every parent link under `root` at the right node.
    pub fn set_parents_recursive(&mut self, root: NodeId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            for child in self.children(id) {
                self.nodes[child].parent = Some(id);
                stack.push(child);
            }
        }
    }

    #[inline]
    pub fn ts_type(&self, id: NodeId) -> Option<TypeId> {
        self.nodes[id].ts_type
    }

    #[inline]
    pub fn set_ts_type(&mut self, id: NodeId, ty: TypeId) {
        self.nodes[id].ts_type = Some(ty);
    }

    #[inline]
    pub fn boxing(&self, id: NodeId) -> BoxingUnboxingFlags {
        self.nodes[id].boxing
    }

    pub fn add_boxing_flags(&mut self, id: NodeId, flags: BoxingUnboxingFlags) {
        self.nodes[id].boxing |= flags;
    }

    pub fn set_boxing_flags(&mut self, id: NodeId, flags: BoxingUnboxingFlags) {
        self.nodes[id].boxing = flags;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ---- Names ----

    /// The name of an identifier node, or of the identifier naming a declaration.
    pub fn name_of(&self, id: NodeId) -> Option<Name> {
        match self.kind(id) {
            NodeKind::Identifier { name, .. } => Some(*name),
            NodeKind::VariableDeclarator { name, .. }
            | NodeKind::Parameter { name, .. }
            | NodeKind::TypeParameter { name, .. }
            | NodeKind::ClassDeclaration { name, .. }
            | NodeKind::ClassProperty { name, .. }
            | NodeKind::MethodDefinition { name, .. }
            | NodeKind::InterfaceDeclaration { name, .. }
            | NodeKind::EnumDeclaration { name, .. }
            | NodeKind::EnumMember { name, .. }
            | NodeKind::TypeAlias { name, .. } => self.name_of(*name),
            NodeKind::ScriptFunction { name: Some(name), .. } => self.name_of(*name),
            NodeKind::FunctionDeclaration { function } => self.name_of(*function),
            _ => None,
        }
    }

    pub fn name_str(&self, id: NodeId) -> &str {
        self.name_of(id).map(|n| self.interner.resolve(n)).unwrap_or("")
    }

    pub fn resolve(&self, name: Name) -> &str {
        self.interner.resolve(name)
    }

    // ---- Builders for synthesized code ----

    pub fn make_identifier(&mut self, name: &str, span: TextSpan) -> NodeId {
        let name = self.interner.intern(name);
        self.alloc(NodeKind::Identifier { name, variable: None }, span)
    }

    pub fn make_opaque_type(&mut self, ty: TypeId, span: TextSpan) -> NodeId {
        self.alloc(NodeKind::OpaqueType(ty), span)
    }

    pub fn make_member(&mut self, object: NodeId, property: &str, span: TextSpan) -> NodeId {
        let property = self.make_identifier(property, span);
        self.alloc_with_parents(
            NodeKind::Member { object, property, computed: false, optional: false, obj_type: None },
            span,
        )
    }

    pub fn make_call(&mut self, callee: NodeId, arguments: Vec<NodeId>, span: TextSpan) -> NodeId {
        self.alloc_with_parents(
            NodeKind::Call { callee, type_args: Vec::new(), arguments, optional: false, signature: None },
            span,
        )
    }

    pub fn make_expression_statement(&mut self, expression: NodeId) -> NodeId {
        let span = self.span(expression);
        self.alloc_with_parents(NodeKind::ExpressionStatement { expression }, span)
    }

    pub fn make_int_literal(&mut self, value: i32, span: TextSpan) -> NodeId {
        self.alloc(NodeKind::NumberLiteral(Number::Int(value)), span)
    }

    // ---- Dumps ----

    /// Render the subtree under `id` as an indented outline.
    pub fn dump(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.dump_into(id, 0, &mut out);
        out
    }

    fn dump_into(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = self.node(id);
        let _ = write!(out, "{:indent$}{}", "", node.kind.name(), indent = depth * 2);
        match &node.kind {
            NodeKind::Identifier { name, .. } => {
                let _ = write!(out, " {}", self.resolve(*name));
            }
            NodeKind::NumberLiteral(n) => {
                let _ = match n {
                    Number::Int(v) => write!(out, " {}", v),
                    Number::Long(v) => write!(out, " {}L", v),
                    Number::Float(v) => write!(out, " {}f", v),
                    Number::Double(v) => write!(out, " {}", v),
                };
            }
            NodeKind::StringLiteral(s) => {
                let _ = write!(out, " {:?}", s);
            }
            NodeKind::BooleanLiteral(b) => {
                let _ = write!(out, " {}", b);
            }
            NodeKind::Binary { op, .. } => {
                let _ = write!(out, " {}", op.as_str());
            }
            NodeKind::Unary { op, .. } => {
                let _ = write!(out, " {}", op.as_str());
            }
            NodeKind::PrimitiveType(k) => {
                let _ = write!(out, " {}", k.as_str());
            }
            NodeKind::ImportDeclaration { source, .. } => {
                let _ = write!(out, " {:?}", source);
            }
            _ => {}
        }
        out.push('\n');
        for child in self.children(id) {
            self.dump_into(child, depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{BinaryOp, Number};

    fn sample() -> (Ast, NodeId, NodeId, NodeId) {
        let mut ast = Ast::new(StringInterner::new());
        let left = ast.alloc(NodeKind::NumberLiteral(Number::Int(1)), TextSpan::new(0, 1));
        let right = ast.make_identifier("x", TextSpan::new(4, 1));
        let bin = ast.alloc_with_parents(
            NodeKind::Binary { op: BinaryOp::Add, left, right, operation_type: None },
            TextSpan::new(0, 5),
        );
        (ast, bin, left, right)
    }

    #[test]
    fn test_children_in_evaluation_order() {
        let (ast, bin, left, right) = sample();
        assert_eq!(ast.children(bin), vec![left, right]);
        assert_eq!(ast.parent(left), Some(bin));
    }

    #[test]
    fn test_transform_replaces_children() {
        let (mut ast, bin, left, _) = sample();
        let replacement = ast.make_int_literal(7, TextSpan::new(0, 1));
        ast.transform_children_recursively(bin, &mut |_, n| if n == left { replacement } else { n });
        assert_eq!(ast.children(bin)[0], replacement);
        assert_eq!(ast.parent(replacement), Some(bin));
    }

    #[test]
    fn test_is_any_child_and_dump() {
        let (ast, bin, _, _) = sample();
        assert!(ast.is_any_child(bin, &mut |a, n| matches!(a.kind(n), NodeKind::Identifier { .. })));
        let dump = ast.dump(bin);
        assert_eq!(dump, "Binary +\n  NumberLiteral 1\n  Identifier x\n");
    }

    #[test]
    fn test_position_of_uses_line_index() {
        let mut ast = Ast::new(StringInterner::new());
        let file = ast.add_file("a.ets", "let a = 1;\nlet b = 2;");
        let lit = ast.alloc(NodeKind::NumberLiteral(Number::Int(2)), TextSpan::new(19, 1));
        let stmt = ast.make_expression_statement(lit);
        let program = ast.alloc_with_parents(
            NodeKind::Program { file, module_name: String::new(), kind: ProgramKind::Main, statements: vec![stmt] },
            TextSpan::new(0, 21),
        );
        ast.add_program(program);
        let pos = ast.position_of(lit);
        assert_eq!((pos.line, pos.column), (2, 9));
        assert_eq!(ast.main_program(), Some(program));
    }

    #[test]
    fn test_reorder_programs() {
        let mut ast = Ast::new(StringInterner::new());
        let file = ast.add_file("a.ets", "");
        let programs: Vec<NodeId> = (0..3)
            .map(|_| {
                let p = ast.alloc(
                    NodeKind::Program { file, module_name: String::new(), kind: ProgramKind::External, statements: vec![] },
                    TextSpan::default(),
                );
                ast.add_program(p);
                p
            })
            .collect();
        ast.reorder_programs(&[programs[2], programs[1]]);
        assert_eq!(ast.programs(), &[programs[2], programs[1], programs[0]]);
    }
}
