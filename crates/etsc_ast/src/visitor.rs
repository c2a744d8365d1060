//! Child traversal.
//!
//! [`each_child!`] lists the children of every node kind in evaluation
//! order. It is expanded over both `&NodeKind` and `&mut NodeKind`, so the
//! read-only walk and the rewriting walk can never disagree.

use crate::ast::Ast;
use crate::NodeId;

/// Run `$body` with `$c` bound to a reference to each child of `$kind`.
#[macro_export]
macro_rules! each_child {
    ($kind:expr, |$c:ident| $body:expr) => {
        match $kind {
            $crate::node::NodeKind::Program { statements, .. }
            | $crate::node::NodeKind::Block { statements }
            | $crate::node::NodeKind::BlockExpression { statements } => {
                for $c in statements {
                    $body;
                }
            }
            $crate::node::NodeKind::VariableDeclaration { declarators, .. } => {
                for $c in declarators {
                    $body;
                }
            }
            $crate::node::NodeKind::VariableDeclarator { name, type_annotation, init } => {
                {
                    let $c = name;
                    $body;
                }
                if let Some($c) = type_annotation {
                    $body;
                }
                if let Some($c) = init {
                    $body;
                }
            }
            $crate::node::NodeKind::FunctionDeclaration { function } => {
                let $c = function;
                $body;
            }
            $crate::node::NodeKind::ScriptFunction { name, type_params, params, return_type, body, .. } => {
                if let Some($c) = name {
                    $body;
                }
                for $c in type_params {
                    $body;
                }
                for $c in params {
                    $body;
                }
                if let Some($c) = return_type {
                    $body;
                }
                if let Some($c) = body {
                    $body;
                }
            }
            $crate::node::NodeKind::Parameter { name, type_annotation, init, .. } => {
                {
                    let $c = name;
                    $body;
                }
                if let Some($c) = type_annotation {
                    $body;
                }
                if let Some($c) = init {
                    $body;
                }
            }
            $crate::node::NodeKind::TypeParameter { name, constraint } => {
                {
                    let $c = name;
                    $body;
                }
                if let Some($c) = constraint {
                    $body;
                }
            }
            $crate::node::NodeKind::ClassDeclaration { name, type_params, super_class, implements, members, .. } => {
                {
                    let $c = name;
                    $body;
                }
                for $c in type_params {
                    $body;
                }
                if let Some($c) = super_class {
                    $body;
                }
                for $c in implements {
                    $body;
                }
                for $c in members {
                    $body;
                }
            }
            $crate::node::NodeKind::ClassProperty { name, type_annotation, init, .. } => {
                {
                    let $c = name;
                    $body;
                }
                if let Some($c) = type_annotation {
                    $body;
                }
                if let Some($c) = init {
                    $body;
                }
            }
            $crate::node::NodeKind::MethodDefinition { name, function, .. } => {
                {
                    let $c = name;
                    $body;
                }
                let $c = function;
                $body;
            }
            $crate::node::NodeKind::InterfaceDeclaration { name, type_params, extends, members, .. } => {
                {
                    let $c = name;
                    $body;
                }
                for $c in type_params {
                    $body;
                }
                for $c in extends {
                    $body;
                }
                for $c in members {
                    $body;
                }
            }
            $crate::node::NodeKind::EnumDeclaration { name, members, .. } => {
                {
                    let $c = name;
                    $body;
                }
                for $c in members {
                    $body;
                }
            }
            $crate::node::NodeKind::EnumMember { name, init } => {
                {
                    let $c = name;
                    $body;
                }
                if let Some($c) = init {
                    $body;
                }
            }
            $crate::node::NodeKind::TypeAlias { name, type_params, aliased, .. } => {
                {
                    let $c = name;
                    $body;
                }
                for $c in type_params {
                    $body;
                }
                let $c = aliased;
                $body;
            }
            $crate::node::NodeKind::ImportDeclaration { specifiers, .. } => {
                for $c in specifiers {
                    $body;
                }
            }
            $crate::node::NodeKind::ImportSpecifier { imported, local } => {
                {
                    let $c = imported;
                    $body;
                }
                let $c = local;
                $body;
            }
            $crate::node::NodeKind::ExpressionStatement { expression }
            | $crate::node::NodeKind::NonNull { expression } => {
                let $c = expression;
                $body;
            }
            $crate::node::NodeKind::If { test, consequent, alternate } => {
                {
                    let $c = test;
                    $body;
                }
                {
                    let $c = consequent;
                    $body;
                }
                if let Some($c) = alternate {
                    $body;
                }
            }
            $crate::node::NodeKind::While { test, body } => {
                {
                    let $c = test;
                    $body;
                }
                let $c = body;
                $body;
            }
            $crate::node::NodeKind::DoWhile { body, test } => {
                {
                    let $c = body;
                    $body;
                }
                let $c = test;
                $body;
            }
            $crate::node::NodeKind::For { init, test, update, body } => {
                if let Some($c) = init {
                    $body;
                }
                if let Some($c) = test {
                    $body;
                }
                if let Some($c) = update {
                    $body;
                }
                let $c = body;
                $body;
            }
            $crate::node::NodeKind::ForOf { left, right, body } => {
                {
                    let $c = left;
                    $body;
                }
                {
                    let $c = right;
                    $body;
                }
                let $c = body;
                $body;
            }
            $crate::node::NodeKind::Return { argument } => {
                if let Some($c) = argument {
                    $body;
                }
            }
            $crate::node::NodeKind::Throw { argument }
            | $crate::node::NodeKind::Await { argument }
            | $crate::node::NodeKind::TypeOf { argument }
            | $crate::node::NodeKind::Unary { argument, .. }
            | $crate::node::NodeKind::Update { argument, .. } => {
                let $c = argument;
                $body;
            }
            $crate::node::NodeKind::Try { block, handlers, finalizer } => {
                {
                    let $c = block;
                    $body;
                }
                for $c in handlers {
                    $body;
                }
                if let Some($c) = finalizer {
                    $body;
                }
            }
            $crate::node::NodeKind::CatchClause { param, type_annotation, body } => {
                if let Some($c) = param {
                    $body;
                }
                if let Some($c) = type_annotation {
                    $body;
                }
                let $c = body;
                $body;
            }
            $crate::node::NodeKind::Member { object, property, .. } => {
                {
                    let $c = object;
                    $body;
                }
                let $c = property;
                $body;
            }
            $crate::node::NodeKind::Call { callee, type_args, arguments, .. } => {
                {
                    let $c = callee;
                    $body;
                }
                for $c in type_args {
                    $body;
                }
                for $c in arguments {
                    $body;
                }
            }
            $crate::node::NodeKind::New { class, arguments, .. } => {
                {
                    let $c = class;
                    $body;
                }
                for $c in arguments {
                    $body;
                }
            }
            $crate::node::NodeKind::NewArray { element_type, dimension } => {
                {
                    let $c = element_type;
                    $body;
                }
                let $c = dimension;
                $body;
            }
            $crate::node::NodeKind::ArrayLiteral { elements, .. } => {
                for $c in elements {
                    $body;
                }
            }
            $crate::node::NodeKind::ObjectLiteral { properties, .. } => {
                for $c in properties {
                    $body;
                }
            }
            $crate::node::NodeKind::Property { key, value } => {
                {
                    let $c = key;
                    $body;
                }
                let $c = value;
                $body;
            }
            $crate::node::NodeKind::ArrowFunction { function, .. } => {
                let $c = function;
                $body;
            }
            $crate::node::NodeKind::Binary { left, right, .. } => {
                {
                    let $c = left;
                    $body;
                }
                let $c = right;
                $body;
            }
            $crate::node::NodeKind::Conditional { test, consequent, alternate } => {
                {
                    let $c = test;
                    $body;
                }
                {
                    let $c = consequent;
                    $body;
                }
                let $c = alternate;
                $body;
            }
            $crate::node::NodeKind::Assignment { target, value, .. } => {
                {
                    let $c = target;
                    $body;
                }
                let $c = value;
                $body;
            }
            $crate::node::NodeKind::As { expression, type_annotation }
            | $crate::node::NodeKind::InstanceOf { expression, type_annotation } => {
                {
                    let $c = expression;
                    $body;
                }
                let $c = type_annotation;
                $body;
            }
            $crate::node::NodeKind::TypeReference { name, type_args } => {
                {
                    let $c = name;
                    $body;
                }
                for $c in type_args {
                    $body;
                }
            }
            $crate::node::NodeKind::ArrayType { element } => {
                let $c = element;
                $body;
            }
            $crate::node::NodeKind::UnionType { types } => {
                for $c in types {
                    $body;
                }
            }
            $crate::node::NodeKind::FunctionType { params, return_type } => {
                for $c in params {
                    $body;
                }
                let $c = return_type;
                $body;
            }
            $crate::node::NodeKind::Break
            | $crate::node::NodeKind::Continue
            | $crate::node::NodeKind::Empty
            | $crate::node::NodeKind::Identifier { .. }
            | $crate::node::NodeKind::NumberLiteral(_)
            | $crate::node::NodeKind::CharLiteral(_)
            | $crate::node::NodeKind::StringLiteral(_)
            | $crate::node::NodeKind::BooleanLiteral(_)
            | $crate::node::NodeKind::NullLiteral
            | $crate::node::NodeKind::UndefinedLiteral
            | $crate::node::NodeKind::This
            | $crate::node::NodeKind::Super
            | $crate::node::NodeKind::PrimitiveType(_)
            | $crate::node::NodeKind::OpaqueType(_) => {}
        }
    };
}

impl Ast {
    /// Call `f` with each direct child of `id`, in evaluation order.
    pub fn for_each_child(&self, id: NodeId, mut f: impl FnMut(NodeId)) {
        each_child!(&self.node(id).kind, |c| f(*c));
    }

    /// Direct children of `id`.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.for_each_child(id, |c| out.push(c));
        out
    }

    /// Call `f` on every child slot of `id`, allowing it to be replaced.
    pub fn for_each_child_mut(&mut self, id: NodeId, mut f: impl FnMut(&mut NodeId)) {
        each_child!(&mut self.node_mut(id).kind, |c| f(c));
    }

    /// Whether `pred` holds for `id` or any node below it.
    pub fn is_any_child(&self, id: NodeId, pred: &mut dyn FnMut(&Ast, NodeId) -> bool) -> bool {
        if pred(self, id) {
            return true;
        }
        let mut found = false;
        for child in self.children(id) {
            if self.is_any_child(child, pred) {
                found = true;
                break;
            }
        }
        found
    }

    /// Visit `id` and all nodes below it, parents before children.
    pub fn walk(&self, id: NodeId, f: &mut dyn FnMut(&Ast, NodeId)) {
        f(self, id);
        for child in self.children(id) {
            self.walk(child, f);
        }
    }

    /// Rewrite the subtree under `id` bottom-up. `f` receives each child
    /// after its own children were rewritten and returns the node that
    /// should take its place. Parent links of replacements are updated.
    pub fn transform_children_recursively(
        &mut self,
        id: NodeId,
        f: &mut dyn FnMut(&mut Ast, NodeId) -> NodeId,
    ) {
        for child in self.children(id) {
            self.transform_children_recursively(child, f);
        }
        let mut replacements = Vec::new();
        for child in self.children(id) {
            let replaced = f(self, child);
            replacements.push(replaced);
        }
        let mut index = 0;
        self.for_each_child_mut(id, |slot| {
            if let Some(&replacement) = replacements.get(index) {
                *slot = replacement;
            }
            index += 1;
        });
        for replacement in replacements {
            self.node_mut(replacement).parent = Some(id);
        }
    }
}
