//! The checker driver.
//!
//! [`Checker::start_checker`] runs the whole semantic pass: declaration
//! shells, headers and member tables for every program, then the bodies of
//! the prelude and the external programs, then the main program, then alive
//! analysis and the dynamic-interop glue. The first type error aborts the
//! pass.

use crate::contexts::{ContextFlags, ResolutionContext};
use crate::error::{CheckResult, CheckerError, TypeError};
use crate::type_table::TypeTable;
use crate::types::*;
use etsc_ast::*;
use etsc_binder::{Binder, DeclKind, VariableFlags};
use etsc_core::collections::{FxHashSet, FxIndexMap, FxIndexSet};
use etsc_diagnostics::{messages, DiagnosticMessage};

/// The captures collected while checking one lambda body.
#[derive(Debug)]
pub(crate) struct LambdaFrame {
    pub scope: ScopeId,
    pub captures: FxIndexSet<Capture>,
}

/// Shape of a call into a dynamic runtime; one intrinsic exists per shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DynamicCallShape {
    /// `callMethodN(receiver, name, ...)` rather than `callN(callee, ...)`.
    pub is_method: bool,
    pub arity: usize,
}

impl DynamicCallShape {
    pub fn intrinsic_name(&self) -> String {
        if self.is_method {
            format!("callMethod{}", self.arity)
        } else {
            format!("call{}", self.arity)
        }
    }
}

/// Everything the later stages need from a successful check.
pub struct CheckedModule {
    pub ast: Ast,
    pub binder: Binder,
    pub table: TypeTable,
}

pub struct Checker {
    pub ast: Ast,
    pub binder: Binder,
    pub table: TypeTable,
    pub(crate) resolving_vars: FxHashSet<VariableId>,
    pub(crate) resolving_members: FxHashSet<TypeId>,
    pub(crate) checked_bodies: FxHashSet<NodeId>,
    pub(crate) checking_bodies: FxHashSet<NodeId>,
    /// Return types seen in bodies whose return type is inferred.
    pub(crate) return_collectors: Vec<Vec<TypeId>>,
    pub(crate) lambda_frames: Vec<LambdaFrame>,
    pub(crate) lambda_counter: u32,
    pub(crate) dynamic_calls: FxIndexMap<String, FxIndexSet<DynamicCallShape>>,
    pub(crate) dynamic_imports: FxIndexSet<VariableId>,
    glue_synthesized: bool,
}

impl Checker {
    pub fn new(ast: Ast, binder: Binder) -> Self {
        let table = TypeTable::new(ast.interner.clone());
        Self {
            ast,
            binder,
            table,
            resolving_vars: FxHashSet::default(),
            resolving_members: FxHashSet::default(),
            checked_bodies: FxHashSet::default(),
            checking_bodies: FxHashSet::default(),
            return_collectors: Vec::new(),
            lambda_frames: Vec::new(),
            lambda_counter: 0,
            dynamic_calls: FxIndexMap::default(),
            dynamic_imports: FxIndexSet::default(),
            glue_synthesized: false,
        }
    }

    pub fn finish(self) -> CheckedModule {
        CheckedModule { ast: self.ast, binder: self.binder, table: self.table }
    }

    // ========================================================================
    // Driver
    // ========================================================================

    /// Programs in checking order: prelude, external programs, main.
    fn ordered_programs(&self) -> Vec<NodeId> {
        let rank = |kind: ProgramKind| match kind {
            ProgramKind::Prelude => 0,
            ProgramKind::External => 1,
            ProgramKind::Main => 2,
        };
        let mut programs: Vec<(u8, NodeId)> = self
            .ast
            .programs()
            .iter()
            .filter_map(|&p| match self.ast.kind(p) {
                NodeKind::Program { kind, .. } => Some((rank(*kind), p)),
                _ => None,
            })
            .collect();
        programs.sort_by_key(|(r, _)| *r);
        programs.into_iter().map(|(_, p)| p).collect()
    }

    pub fn start_checker(&mut self) -> CheckResult<()> {
        let _span = tracing::info_span!("check").entered();
        let programs = self.ordered_programs();
        let has_prelude = programs
            .iter()
            .any(|&p| matches!(self.ast.kind(p), NodeKind::Program { kind: ProgramKind::Prelude, .. }));
        if !has_prelude {
            return Err(CheckerError::internal("no prelude program was registered"));
        }

        self.collect_declarations(&programs)?;

        for &program in &programs {
            let module = match self.ast.kind(program) {
                NodeKind::Program { module_name, .. } => module_name.clone(),
                _ => String::new(),
            };
            let _program_span = tracing::debug_span!("check program", module = module.as_str()).entered();
            self.check_program(program)?;
        }

        for &program in &programs {
            crate::alive::check_program(self, program)?;
        }

        self.synthesize_dynamic_glue()?;
        tracing::debug!(types = self.table.len(), "checker finished");
        Ok(())
    }

    /// The builtin classes must be declared by the prelude before anything
    /// else can be typed.
    pub(crate) fn verify_builtins(&self) -> CheckResult<()> {
        for (id, name) in [(self.table.global.object, "Object"), (self.table.global.void_class, "Void")] {
            let declared = self.table.object(id).is_some_and(|o| o.decl.is_some());
            if !declared {
                return Err(CheckerError::internal(format!("builtin class '{}' is missing from the prelude", name)));
            }
        }
        Ok(())
    }

    fn check_program(&mut self, program: NodeId) -> CheckResult<()> {
        let NodeKind::Program { statements, .. } = self.ast.kind(program) else {
            return Ok(());
        };
        let statements = statements.clone();
        let mut ctx = ResolutionContext::top_level();
        self.check_statement_list(&statements, &mut ctx)
    }

    /// Check a node the lowering phases synthesized, binding it first.
    /// Synthesized code may use private members.
    pub fn check_synthesized(&mut self, node: NodeId) -> CheckResult<TypeId> {
        let anchor = self.ast.parent(node).unwrap_or(node);
        let scope = self.binder.scope_of(&self.ast, anchor);
        self.binder.bind_subtree(&self.ast, node, scope);
        let mut ctx = self.context_for(node).with_flags(ContextFlags::IGNORE_VISIBILITY);
        match self.ast.kind(node) {
            NodeKind::MethodDefinition { .. } => {
                self.check_synthesized_method(node)?;
                Ok(self.table.global.void)
            }
            kind if kind.is_statement() => {
                self.check_statement(node, &mut ctx)?;
                Ok(self.table.global.void)
            }
            _ => self.check_expr(node, &ctx),
        }
    }

    // ========================================================================
    // Errors
    // ========================================================================

    pub(crate) fn error(&self, node: NodeId, message: &DiagnosticMessage, args: &[&str]) -> CheckerError {
        let file = self.ast.file_of(node).map(|f| f.name.clone()).unwrap_or_default();
        CheckerError::Type(TypeError {
            message: message.format(args),
            code: message.code,
            file,
            span: self.ast.span(node),
            position: self.ast.position_of(node),
        })
    }

    pub(crate) fn type_str(&self, ty: TypeId) -> String {
        self.table.type_to_string(ty)
    }

    pub(crate) fn name_str(&self, name: etsc_core::Name) -> String {
        self.ast.resolve(name).to_string()
    }

    // ========================================================================
    // Contexts
    // ========================================================================

    /// The context a node is checked in, derived from its enclosing
    /// function, member and class.
    pub(crate) fn context_for(&self, node: NodeId) -> ResolutionContext {
        let mut ctx = ResolutionContext::top_level();
        let mut function_found = false;
        let mut current = self.ast.parent(node);
        while let Some(id) = current {
            match self.ast.kind(id) {
                NodeKind::ScriptFunction { flags, modifiers, signature, .. } => {
                    if !function_found {
                        function_found = true;
                        ctx.containing_function = Some(id);
                        ctx.containing_signature = *signature;
                        if flags.contains(ScriptFunctionFlags::ARROW) {
                            ctx.flags |= ContextFlags::LAMBDA;
                        }
                        if flags.contains(ScriptFunctionFlags::CONSTRUCTOR) {
                            ctx.flags |= ContextFlags::CONSTRUCTOR;
                        }
                        if flags.contains(ScriptFunctionFlags::ASYNC) {
                            ctx.flags |= ContextFlags::ASYNC;
                        }
                    }
                    if modifiers.contains(ModifierFlags::STATIC) {
                        ctx.flags |= ContextFlags::STATIC;
                    }
                }
                NodeKind::ClassProperty { modifiers, .. } => {
                    ctx.flags |= ContextFlags::FIELD_INIT;
                    if modifiers.contains(ModifierFlags::STATIC) {
                        ctx.flags |= ContextFlags::STATIC;
                    }
                }
                NodeKind::ClassDeclaration { .. } | NodeKind::InterfaceDeclaration { .. } => {
                    ctx.containing_class = self.ast.ts_type(id);
                    break;
                }
                _ => {}
            }
            current = self.ast.parent(id);
        }
        ctx
    }

    /// The class declared by a `ClassDeclaration` or `InterfaceDeclaration`.
    pub(crate) fn declared_type(&self, decl: NodeId) -> CheckResult<TypeId> {
        self.ast
            .ts_type(decl)
            .ok_or_else(|| CheckerError::internal(format!("declaration '{}' has no type", self.ast.name_str(decl))))
    }

    // ========================================================================
    // Variables
    // ========================================================================

    /// Type of a variable, computed on first use relative to its
    /// declaration site and memoized on the variable.
    pub fn get_type_of_variable(&mut self, var: VariableId) -> CheckResult<TypeId> {
        if let Some(ty) = self.binder.variable(var).ts_type {
            return Ok(ty);
        }
        let decl = self.binder.variable(var).decl_node;
        if !self.resolving_vars.insert(var) {
            let name = self.name_str(self.binder.variable(var).name);
            return Err(self.error(decl, &messages::CIRCULAR_DEPENDENCY_FOR_0, &[&name]));
        }
        let result = self.compute_variable_type(var);
        self.resolving_vars.remove(&var);
        let ty = result?;
        self.binder.set_variable_type(var, ty);
        Ok(ty)
    }

    fn compute_variable_type(&mut self, var: VariableId) -> CheckResult<TypeId> {
        let variable = self.binder.variable(var).clone();
        let decl = variable.decl_node;
        match variable.kind {
            DeclKind::Let | DeclKind::Const => {
                let NodeKind::VariableDeclarator { type_annotation, init, .. } = self.ast.kind(decl).clone() else {
                    return Err(CheckerError::internal("variable without declarator"));
                };
                if let Some(annotation) = type_annotation {
                    return self.resolve_type_annotation(annotation);
                }
                let Some(init) = init else {
                    let name = self.name_str(variable.name);
                    return Err(self.error(decl, &messages::CANNOT_INFER_TYPE_OF_0, &[&name]));
                };
                let ctx = self.context_for(decl);
                let ty = self.check_expr(init, &ctx)?;
                if matches!(self.table.get(ty), Type::Void) {
                    return Err(self.error(init, &messages::VOID_USED_AS_VALUE, &[]));
                }
                Ok(if variable.kind == DeclKind::Let { self.table.widen(ty) } else { ty })
            }
            DeclKind::Param => self.parameter_type(decl),
            DeclKind::CatchParam => {
                let NodeKind::CatchClause { type_annotation, .. } = self.ast.kind(decl).clone() else {
                    return Err(CheckerError::internal("catch parameter without clause"));
                };
                match type_annotation {
                    Some(annotation) => self.resolve_type_annotation(annotation),
                    None => Ok(self.table.global.exception.unwrap_or(self.table.global.object)),
                }
            }
            DeclKind::Function => {
                let mut signatures = Vec::with_capacity(variable.overloads.len());
                for decl in variable.overloads {
                    let NodeKind::FunctionDeclaration { function } = *self.ast.kind(decl) else { continue };
                    signatures.push(self.ensure_signature(function)?);
                }
                Ok(self.table.create_function(signatures))
            }
            DeclKind::Class | DeclKind::Interface | DeclKind::Enum => self.declared_type(decl),
            DeclKind::TypeAlias => self.resolve_type_alias(decl),
            DeclKind::TypeParameter => self.type_of_type_parameter(decl),
            DeclKind::Import => match variable.import.as_ref().and_then(|i| i.dynamic_language.clone()) {
                Some(language) => {
                    self.dynamic_imports.insert(var);
                    Ok(self.table.create_dynamic(language))
                }
                None => {
                    let name = self.name_str(variable.name);
                    Err(self.error(decl, &messages::UNRESOLVED_REFERENCE_0, &[&name]))
                }
            },
        }
    }

    fn parameter_type(&mut self, param: NodeId) -> CheckResult<TypeId> {
        let function = self
            .ast
            .parent(param)
            .filter(|p| matches!(self.ast.kind(*p), NodeKind::ScriptFunction { .. }))
            .ok_or_else(|| CheckerError::internal("parameter outside of a function"))?;
        let NodeKind::ScriptFunction { params, signature, flags, .. } = self.ast.kind(function).clone() else {
            return Err(CheckerError::internal("parameter outside of a function"));
        };
        let signature = match signature {
            Some(sig) => sig,
            None if flags.contains(ScriptFunctionFlags::ARROW) => {
                let name = self.ast.name_str(param).to_string();
                return Err(self.error(param, &messages::CANNOT_INFER_LAMBDA_PARAMETER_0, &[&name]));
            }
            None => self.ensure_signature(function)?,
        };
        let index = params.iter().position(|p| *p == param).unwrap_or(0);
        let sig = self.table.signature(signature);
        match sig.params.get(index) {
            Some(p) => Ok(p.ty),
            None => sig.rest.as_ref().map(|r| r.ty).ok_or_else(|| CheckerError::internal("parameter index out of range")),
        }
    }

    /// Resolve the variable an identifier refers to.
    pub(crate) fn lookup(&self, node: NodeId, name: etsc_core::Name) -> Option<VariableId> {
        let scope = self.binder.scope_of(&self.ast, node);
        self.binder.find(scope, name)
    }

    /// Note that the current lambdas use `var` from an enclosing function.
    pub(crate) fn record_capture(&mut self, var: VariableId) {
        let variable = self.binder.variable(var);
        if variable.flags.contains(VariableFlags::TOP_LEVEL)
            || !matches!(variable.kind, DeclKind::Let | DeclKind::Const | DeclKind::Param | DeclKind::CatchParam)
        {
            return;
        }
        let var_scope = variable.scope;
        for i in (0..self.lambda_frames.len()).rev() {
            if self.scope_within(var_scope, self.lambda_frames[i].scope) {
                break;
            }
            self.lambda_frames[i].captures.insert(Capture::Variable(var));
        }
    }

    pub(crate) fn record_this_capture(&mut self) {
        for frame in self.lambda_frames.iter_mut() {
            frame.captures.insert(Capture::This);
        }
    }

    /// Whether `inner` is `outer` or nested inside it.
    pub(crate) fn scope_within(&self, inner: ScopeId, outer: ScopeId) -> bool {
        let mut current = Some(inner);
        while let Some(s) = current {
            if s == outer {
                return true;
            }
            current = self.binder.scope(s).parent;
        }
        false
    }

    // ========================================================================
    // Dynamic interop glue
    // ========================================================================

    /// Record a call shape into a dynamic runtime.
    pub(crate) fn note_dynamic_call(&mut self, language: &str, shape: DynamicCallShape) {
        self.dynamic_calls.entry(language.to_string()).or_default().insert(shape);
    }

    /// Synthesize the `%%dynamic_call-<lang>` and `%%dynamic_import`
    /// classes, once per compilation.
    fn synthesize_dynamic_glue(&mut self) -> CheckResult<()> {
        if self.glue_synthesized {
            return Ok(());
        }
        self.glue_synthesized = true;
        let Some(main) = self.ast.main_program() else { return Ok(()) };
        let calls: Vec<(String, Vec<DynamicCallShape>)> =
            self.dynamic_calls.iter().map(|(l, s)| (l.clone(), s.iter().copied().collect())).collect();
        for (language, shapes) in calls {
            let class = crate::synth::build_dynamic_call_class(self, &language, &shapes)?;
            self.append_to_program(main, class);
        }
        if !self.dynamic_imports.is_empty() {
            let imports: Vec<VariableId> = self.dynamic_imports.iter().copied().collect();
            let class = crate::synth::build_dynamic_import_class(self, &imports)?;
            self.append_to_program(main, class);
        }
        Ok(())
    }

    pub(crate) fn append_to_program(&mut self, program: NodeId, node: NodeId) {
        if let NodeKind::Program { statements, .. } = self.ast.kind_mut(program) {
            statements.push(node);
        }
        self.ast.set_parent(node, Some(program));
    }

    /// Names of the enum, class or interface a type is declared by.
    pub(crate) fn declaration_name(&self, ty: TypeId) -> String {
        match self.table.get(ty) {
            Type::Object(o) => self.name_str(o.name),
            Type::Enum(e) => self.name_str(e.name),
            _ => self.type_str(ty),
        }
    }
}
