//! The binder implementation.
//!
//! Walks each program and builds the scope tree. Handles:
//! - hoisting: every declaration of a scope is visible from its start
//! - function overloads sharing one variable
//! - parameters, type parameters, catch parameters and loop declarations
//! - import bindings and their resolution against other programs
//! - `break`/`continue` outside loops and `return` outside functions

use crate::scope::{Scope, ScopeKind};
use crate::variable::{DeclKind, ImportTarget, Variable, VariableFlags};
use etsc_ast::*;
use etsc_core::arena::IndexVec;
use etsc_core::collections::FxHashMap;
use etsc_core::Name;
use etsc_diagnostics::{messages, Diagnostic, DiagnosticCollection, DiagnosticMessage};

/// How the driver resolved the path of an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleResolution {
    /// Another program of this compilation.
    Static(NodeId),
    /// A module of a foreign dynamic runtime.
    Dynamic { language: String },
}

#[derive(Debug, Clone, Copy)]
struct BindContext {
    in_function: bool,
    loop_depth: u32,
    /// Leave subtrees that already own a scope untouched.
    skip_bound: bool,
}

impl BindContext {
    const TOP: BindContext = BindContext { in_function: false, loop_depth: 0, skip_bound: false };

    fn in_function(self) -> Self {
        Self { in_function: true, loop_depth: 0, ..self }
    }

    fn in_loop(self) -> Self {
        Self { loop_depth: self.loop_depth + 1, ..self }
    }
}

/// Scope tree and variables of one compilation.
pub struct Binder {
    scopes: IndexVec<ScopeId, Scope>,
    variables: IndexVec<VariableId, Variable>,
    /// Scope opened by each scope-creating node.
    node_scopes: FxHashMap<NodeId, ScopeId>,
    /// Variable introduced by each declaration node.
    decl_variables: FxHashMap<NodeId, VariableId>,
    global: ScopeId,
    diagnostics: DiagnosticCollection,
}

impl Binder {
    /// Maximum scope chain traversal depth to guard against cycles.
    const MAX_SCOPE_DEPTH: u32 = 500;

    pub fn new() -> Self {
        let mut scopes = IndexVec::new();
        // The global scope is not owned by any node until the prelude is bound.
        let global = scopes.push(Scope::new(ScopeKind::Global, None, NodeId(u32::MAX)));
        Self {
            scopes,
            variables: IndexVec::new(),
            node_scopes: FxHashMap::default(),
            decl_variables: FxHashMap::default(),
            global,
            diagnostics: DiagnosticCollection::new(),
        }
    }

    pub fn take_diagnostics(&mut self) -> DiagnosticCollection {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn global_scope(&self) -> ScopeId {
        self.global
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id]
    }

    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[id]
    }

    pub fn variable_mut(&mut self, id: VariableId) -> &mut Variable {
        &mut self.variables[id]
    }

    pub fn variables(&self) -> impl Iterator<Item = (VariableId, &Variable)> {
        self.variables.iter_enumerated()
    }

    pub fn set_variable_type(&mut self, id: VariableId, ty: TypeId) {
        self.variables[id].ts_type = Some(ty);
    }

    /// The variable a declaration node introduced.
    pub fn variable_of_decl(&self, node: NodeId) -> Option<VariableId> {
        self.decl_variables.get(&node).copied()
    }

    /// The scope opened by `node` itself, if it opens one.
    pub fn node_scope(&self, node: NodeId) -> Option<ScopeId> {
        self.node_scopes.get(&node).copied()
    }

    /// The innermost scope enclosing `node`.
    pub fn scope_of(&self, ast: &Ast, node: NodeId) -> ScopeId {
        let mut current = Some(node);
        while let Some(id) = current {
            if let Some(scope) = self.node_scopes.get(&id) {
                return *scope;
            }
            current = ast.parent(id);
        }
        self.global
    }

    /// Look `name` up in `scope` only, without following imports.
    pub fn find_local(&self, scope: ScopeId, name: Name) -> Option<VariableId> {
        self.scopes[scope].get(name)
    }

    /// Look `name` up along the scope chain. A resolved static import yields
    /// the exported variable; a dynamic import yields the import itself.
    pub fn find(&self, scope: ScopeId, name: Name) -> Option<VariableId> {
        let mut current = Some(scope);
        let mut depth = 0;
        while let Some(id) = current {
            if depth > Self::MAX_SCOPE_DEPTH {
                break;
            }
            if let Some(var) = self.scopes[id].get(name) {
                return Some(self.follow_import(var));
            }
            current = self.scopes[id].parent;
            depth += 1;
        }
        None
    }

    fn follow_import(&self, var: VariableId) -> VariableId {
        match &self.variables[var].import {
            Some(ImportTarget { resolved: Some(target), .. }) => *target,
            _ => var,
        }
    }

    /// Nearest enclosing scope of the given kind.
    pub fn enclosing(&self, scope: ScopeId, kind: ScopeKind) -> Option<ScopeId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if self.scopes[id].kind == kind {
                return Some(id);
            }
            current = self.scopes[id].parent;
        }
        None
    }

    // ========================================================================
    // Program binding
    // ========================================================================

    /// Bind one program. The prelude binds into the global scope; any other
    /// program gets a module scope under it.
    pub fn bind_program(&mut self, ast: &Ast, program: NodeId) {
        let NodeKind::Program { kind, statements, module_name, .. } = ast.kind(program) else {
            return;
        };
        let scope = if *kind == ProgramKind::Prelude {
            self.scopes[self.global].node = program;
            self.global
        } else {
            self.scopes.push(Scope::new(ScopeKind::Module, Some(self.global), program))
        };
        self.node_scopes.insert(program, scope);
        self.declare_statements(ast, statements, scope);
        for &stmt in statements {
            self.visit(ast, stmt, scope, BindContext::TOP);
        }
        tracing::debug!(
            module = module_name.as_str(),
            scopes = self.scopes.len(),
            variables = self.variables.len(),
            "bound program"
        );
    }

    /// Bind a subtree synthesized after the initial pass, such as a lambda
    /// proxy class appended to a program, into `scope`.
    pub fn bind_subtree(&mut self, ast: &Ast, node: NodeId, scope: ScopeId) {
        self.declare_statements(ast, &[node], scope);
        // Synthesized code never contains stray control flow. Subtrees that
        // were bound before being spliced in keep their scopes.
        let ctx = BindContext { in_function: true, loop_depth: 1, skip_bound: true };
        self.visit(ast, node, scope, ctx);
    }

    /// Resolve every import binding against the programs and dynamic
    /// modules the driver found.
    pub fn resolve_imports(&mut self, ast: &Ast, modules: &FxHashMap<String, ModuleResolution>) {
        let imports: Vec<VariableId> =
            self.variables.iter_enumerated().filter(|(_, v)| v.import.is_some()).map(|(id, _)| id).collect();
        for id in imports {
            let Some(target) = self.variables[id].import.clone() else { continue };
            if target.resolved.is_some() || target.dynamic_language.is_some() {
                continue;
            }
            let decl = self.variables[id].decl_node;
            match modules.get(&target.module) {
                None => self.error(ast, decl, &messages::CANNOT_FIND_MODULE_0, &[&target.module]),
                Some(ModuleResolution::Dynamic { language }) => {
                    if let Some(import) = self.variables[id].import.as_mut() {
                        import.dynamic_language = Some(language.clone());
                    }
                }
                Some(ModuleResolution::Static(program)) => {
                    let exported = self
                        .node_scope(*program)
                        .and_then(|scope| self.find_local(scope, target.imported))
                        .filter(|var| self.variables[*var].flags.contains(VariableFlags::EXPORTED));
                    match exported {
                        Some(var) => {
                            if let Some(import) = self.variables[id].import.as_mut() {
                                import.resolved = Some(var);
                            }
                        }
                        None => {
                            let imported = ast.resolve(target.imported).to_string();
                            self.error(ast, decl, &messages::MODULE_0_HAS_NO_EXPORTED_MEMBER_1, &[&target.module, &imported]);
                        }
                    }
                }
            }
        }
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn declare_statements(&mut self, ast: &Ast, statements: &[NodeId], scope: ScopeId) {
        for &stmt in statements {
            match ast.kind(stmt) {
                NodeKind::VariableDeclaration { kind, declarators, modifiers } => {
                    let decl_kind = match kind {
                        VariableKind::Let => DeclKind::Let,
                        VariableKind::Const => DeclKind::Const,
                    };
                    for &declarator in declarators {
                        self.declare(ast, declarator, decl_kind, scope, *modifiers);
                    }
                }
                NodeKind::FunctionDeclaration { function } => {
                    let modifiers = match ast.kind(*function) {
                        NodeKind::ScriptFunction { modifiers, .. } => *modifiers,
                        _ => ModifierFlags::NONE,
                    };
                    self.declare(ast, stmt, DeclKind::Function, scope, modifiers);
                }
                NodeKind::ClassDeclaration { modifiers, .. } => {
                    self.declare(ast, stmt, DeclKind::Class, scope, *modifiers);
                }
                NodeKind::InterfaceDeclaration { modifiers, .. } => {
                    self.declare(ast, stmt, DeclKind::Interface, scope, *modifiers);
                }
                NodeKind::EnumDeclaration { modifiers, .. } => {
                    self.declare(ast, stmt, DeclKind::Enum, scope, *modifiers);
                }
                NodeKind::TypeAlias { modifiers, .. } => {
                    self.declare(ast, stmt, DeclKind::TypeAlias, scope, *modifiers);
                }
                NodeKind::ImportDeclaration { source, specifiers } => {
                    for &spec in specifiers {
                        let NodeKind::ImportSpecifier { imported, local } = ast.kind(spec) else { continue };
                        let (Some(imported), Some(local)) = (ast.name_of(*imported), ast.name_of(*local)) else {
                            continue;
                        };
                        if let Some(var) = self.declare_named(ast, spec, local, DeclKind::Import, scope, ModifierFlags::NONE) {
                            self.variables[var].import = Some(ImportTarget {
                                module: source.clone(),
                                imported,
                                resolved: None,
                                dynamic_language: None,
                            });
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn declare(
        &mut self,
        ast: &Ast,
        node: NodeId,
        kind: DeclKind,
        scope: ScopeId,
        modifiers: ModifierFlags,
    ) -> Option<VariableId> {
        let name = ast.name_of(node)?;
        self.declare_named(ast, node, name, kind, scope, modifiers)
    }

    fn declare_named(
        &mut self,
        ast: &Ast,
        node: NodeId,
        name: Name,
        kind: DeclKind,
        scope: ScopeId,
        modifiers: ModifierFlags,
    ) -> Option<VariableId> {
        if let Some(existing) = self.scopes[scope].get(name) {
            if kind == DeclKind::Function && self.variables[existing].kind == DeclKind::Function {
                self.variables[existing].overloads.push(node);
                self.decl_variables.insert(node, existing);
                return Some(existing);
            }
            self.error(ast, node, &messages::VARIABLE_0_ALREADY_DECLARED, &[ast.resolve(name)]);
            return None;
        }

        let mut variable = Variable::new(name, kind, node, scope);
        if modifiers.contains(ModifierFlags::EXPORT) {
            variable.flags |= VariableFlags::EXPORTED;
        }
        if modifiers.intersects(ModifierFlags::DECLARE | ModifierFlags::NATIVE) {
            variable.flags |= VariableFlags::AMBIENT;
        }
        if modifiers.contains(ModifierFlags::SYNTHETIC) {
            variable.flags |= VariableFlags::SYNTHETIC;
        }
        if matches!(self.scopes[scope].kind, ScopeKind::Global | ScopeKind::Module) {
            variable.flags |= VariableFlags::TOP_LEVEL;
        }
        if kind == DeclKind::Function {
            variable.overloads.push(node);
        }
        let id = self.variables.push(variable);
        self.scopes[scope].bindings.insert(name, id);
        self.decl_variables.insert(node, id);
        Some(id)
    }

    fn declare_type_params(&mut self, ast: &Ast, type_params: &[NodeId], scope: ScopeId) {
        for &param in type_params {
            self.declare(ast, param, DeclKind::TypeParameter, scope, ModifierFlags::NONE);
        }
    }

    fn open_scope(&mut self, kind: ScopeKind, parent: ScopeId, node: NodeId) -> ScopeId {
        let scope = self.scopes.push(Scope::new(kind, Some(parent), node));
        self.node_scopes.insert(node, scope);
        scope
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    fn visit(&mut self, ast: &Ast, node: NodeId, scope: ScopeId, ctx: BindContext) {
        if ctx.skip_bound && self.node_scopes.contains_key(&node) {
            return;
        }
        match ast.kind(node) {
            NodeKind::Block { statements } | NodeKind::BlockExpression { statements } => {
                let inner = self.open_scope(ScopeKind::Block, scope, node);
                self.declare_statements(ast, statements, inner);
                for &stmt in statements {
                    self.visit(ast, stmt, inner, ctx);
                }
            }
            NodeKind::ScriptFunction { type_params, params, return_type, body, .. } => {
                let inner = self.open_scope(ScopeKind::Function, scope, node);
                self.declare_type_params(ast, type_params, inner);
                for &param in params {
                    self.declare(ast, param, DeclKind::Param, inner, ModifierFlags::NONE);
                }
                for &param in params.iter().chain(type_params) {
                    self.visit_children(ast, param, inner, ctx.in_function());
                }
                if let Some(ret) = return_type {
                    self.visit(ast, *ret, inner, ctx.in_function());
                }
                if let Some(body) = *body {
                    // The body block shares the function scope.
                    self.node_scopes.insert(body, inner);
                    if let NodeKind::Block { statements } = ast.kind(body) {
                        self.declare_statements(ast, statements, inner);
                        for &stmt in statements {
                            self.visit(ast, stmt, inner, ctx.in_function());
                        }
                    }
                }
            }
            NodeKind::ClassDeclaration { type_params, .. } => {
                let inner = self.open_scope(ScopeKind::Class, scope, node);
                self.declare_type_params(ast, type_params, inner);
                self.visit_children(ast, node, inner, ctx);
            }
            NodeKind::InterfaceDeclaration { type_params, .. } | NodeKind::TypeAlias { type_params, .. } => {
                let inner = self.open_scope(ScopeKind::Interface, scope, node);
                self.declare_type_params(ast, type_params, inner);
                self.visit_children(ast, node, inner, ctx);
            }
            NodeKind::For { init, .. } => {
                let inner = self.open_scope(ScopeKind::Loop, scope, node);
                if let Some(init) = init {
                    self.declare_statements(ast, &[*init], inner);
                }
                self.visit_children(ast, node, inner, ctx.in_loop());
            }
            NodeKind::ForOf { left, .. } => {
                let inner = self.open_scope(ScopeKind::Loop, scope, node);
                self.declare_statements(ast, &[*left], inner);
                self.visit_children(ast, node, inner, ctx.in_loop());
            }
            NodeKind::While { .. } | NodeKind::DoWhile { .. } => {
                self.visit_children(ast, node, scope, ctx.in_loop());
            }
            NodeKind::CatchClause { param, type_annotation, body } => {
                let inner = self.open_scope(ScopeKind::Catch, scope, node);
                if let Some(param) = param {
                    if let Some(name) = ast.name_of(*param) {
                        self.declare_named(ast, node, name, DeclKind::CatchParam, inner, ModifierFlags::NONE);
                    }
                }
                if let Some(ty) = type_annotation {
                    self.visit(ast, *ty, inner, ctx);
                }
                self.node_scopes.insert(*body, inner);
                if let NodeKind::Block { statements } = ast.kind(*body) {
                    self.declare_statements(ast, statements, inner);
                    for &stmt in statements {
                        self.visit(ast, stmt, inner, ctx);
                    }
                }
            }
            NodeKind::Break | NodeKind::Continue => {
                if ctx.loop_depth == 0 {
                    self.error(ast, node, &messages::CONTROL_FLOW_OUTSIDE_LOOP, &[]);
                }
            }
            NodeKind::Return { .. } => {
                if !ctx.in_function {
                    self.error(ast, node, &messages::RETURN_OUTSIDE_FUNCTION, &[]);
                }
                self.visit_children(ast, node, scope, ctx);
            }
            _ => self.visit_children(ast, node, scope, ctx),
        }
    }

    fn visit_children(&mut self, ast: &Ast, node: NodeId, scope: ScopeId, ctx: BindContext) {
        for child in ast.children(node) {
            self.visit(ast, child, scope, ctx);
        }
    }

    fn error(&mut self, ast: &Ast, node: NodeId, message: &DiagnosticMessage, args: &[&str]) {
        let file = ast.file_of(node).map(|f| f.name.clone()).unwrap_or_default();
        self.diagnostics.add(Diagnostic::with_location(file, ast.span(node), ast.position_of(node), message, args));
    }
}

impl Default for Binder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etsc_core::text::TextSpan;
    use etsc_core::StringInterner;

    #[test]
    fn test_function_overloads_share_variable() {
        let mut ast = Ast::new(StringInterner::new());
        let file = ast.add_file("a.ets", "");
        let f1 = {
            let name = ast.make_identifier("f", TextSpan::empty(0));
            let function = ast.alloc_with_parents(
                NodeKind::ScriptFunction {
                    name: Some(name),
                    type_params: vec![],
                    params: vec![],
                    return_type: None,
                    body: None,
                    flags: ScriptFunctionFlags::NONE,
                    modifiers: ModifierFlags::NATIVE,
                    signature: None,
                    async_impl: None,
                },
                TextSpan::empty(0),
            );
            ast.alloc_with_parents(NodeKind::FunctionDeclaration { function }, TextSpan::empty(0))
        };
        let f2 = {
            let name = ast.make_identifier("f", TextSpan::empty(0));
            let function = ast.alloc_with_parents(
                NodeKind::ScriptFunction {
                    name: Some(name),
                    type_params: vec![],
                    params: vec![],
                    return_type: None,
                    body: None,
                    flags: ScriptFunctionFlags::NONE,
                    modifiers: ModifierFlags::NATIVE,
                    signature: None,
                    async_impl: None,
                },
                TextSpan::empty(0),
            );
            ast.alloc_with_parents(NodeKind::FunctionDeclaration { function }, TextSpan::empty(0))
        };
        let program = ast.alloc_with_parents(
            NodeKind::Program { file, module_name: "a".into(), kind: ProgramKind::Main, statements: vec![f1, f2] },
            TextSpan::empty(0),
        );
        ast.add_program(program);

        let mut binder = Binder::new();
        binder.bind_program(&ast, program);
        assert!(binder.take_diagnostics().is_empty());
        let var = binder.variable_of_decl(f1).unwrap();
        assert_eq!(binder.variable_of_decl(f2), Some(var));
        assert_eq!(binder.variable(var).overloads, vec![f1, f2]);
        assert!(binder.variable(var).flags.contains(VariableFlags::AMBIENT | VariableFlags::TOP_LEVEL));
    }
}
