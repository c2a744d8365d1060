//! Assembling the program: one record per class, one function per body.
//!
//! Declarations are walked in source order to collect records and
//! [`Job`]s. Every job compiles to one function and reads only shared,
//! immutable state, so jobs run on a thread pool when one is configured.

use crate::context::CodegenContext;
use crate::error::{CodegenError, CodegenResult};
use crate::function::{FunctionCompiler, LambdaFrame, ReturnMode};
use crate::names::{global_record, GLOBAL_INIT};
use crate::opcode::Opcode;
use crate::output::{FieldOutput, FunctionOutput, RecordKind, RecordOutput};
use etsc_ast::{Capture, MethodKind, ModifierFlags, NodeId, NodeKind, ProgramKind, SignatureId, TypeId, VariableId};
use etsc_binder::VariableFlags;
use etsc_checker::synth::CAPTURED_THIS;
use etsc_checker::{ObjectFlags, ObjectType, SignatureFlags, Type};
use etsc_core::Name;
use rayon::prelude::*;

/// A function to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Job {
    /// A function, method, constructor or lambda body.
    Function { function: NodeId, sig: SignatureId },
    /// The callable half of an async function: launches `body` and returns
    /// its promise.
    AsyncProxy { sig: SignatureId, body: SignatureId },
    AsyncBody { function: NodeId, sig: SignatureId },
    DefaultCtor { class: TypeId },
    /// `<cctor>`: static field initializers.
    StaticInit { class: TypeId },
    /// `_$init$_`: the top-level statements of a module.
    GlobalInit { program: NodeId },
    LambdaCtor { class: TypeId },
    /// `invoke` over objects, as called through the function interface.
    LambdaBridge { class: TypeId, sig: SignatureId },
}

#[derive(Default)]
pub(crate) struct Collected {
    pub records: Vec<RecordOutput>,
    pub jobs: Vec<Job>,
}

/// Records and jobs of every program except the prelude, whose classes the
/// runtime provides.
pub(crate) fn collect(cx: &CodegenContext<'_>) -> CodegenResult<Collected> {
    let mut collector = Collector { cx, out: Collected::default() };
    for &program in cx.ast.programs() {
        collector.program(program)?;
    }
    Ok(collector.out)
}

struct Collector<'a> {
    cx: &'a CodegenContext<'a>,
    out: Collected,
}

impl Collector<'_> {
    fn program(&mut self, program: NodeId) -> CodegenResult<()> {
        let ast = self.cx.ast;
        let NodeKind::Program { module_name, kind, statements, .. } = ast.kind(program) else {
            return Ok(());
        };
        if *kind == ProgramKind::Prelude {
            return Ok(());
        }
        let global = self.out.records.len();
        self.out.records.push(RecordOutput {
            name: global_record(module_name),
            kind: RecordKind::Global,
            super_class: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
        });
        self.out.jobs.push(Job::GlobalInit { program });

        let mut fields = Vec::new();
        for &statement in statements {
            match ast.kind(statement) {
                NodeKind::VariableDeclaration { declarators, .. } => {
                    for &declarator in declarators {
                        if let Some(field) = self.global_field(declarator) {
                            fields.push(field);
                        }
                    }
                }
                NodeKind::FunctionDeclaration { function } => self.function(*function, None)?,
                NodeKind::ClassDeclaration { .. } => self.class(statement)?,
                NodeKind::InterfaceDeclaration { .. } => self.interface(statement)?,
                _ => {}
            }
        }
        self.out.records[global].fields = fields;
        Ok(())
    }

    fn global_field(&self, declarator: NodeId) -> Option<FieldOutput> {
        let var = self.cx.binder.variable_of_decl(declarator)?;
        let variable = self.cx.binder.variable(var);
        if variable.flags.contains(VariableFlags::AMBIENT) {
            return None;
        }
        Some(FieldOutput {
            name: self.cx.table.interner().resolve(variable.name).to_string(),
            descriptor: self.cx.descriptor(variable.ts_type?),
            is_static: true,
        })
    }

    /// Jobs for a function with a body. `sig` overrides the signature the
    /// function is emitted under.
    fn function(&mut self, function: NodeId, sig: Option<SignatureId>) -> CodegenResult<()> {
        let cx = self.cx;
        let NodeKind::ScriptFunction { body, signature, async_impl, .. } = cx.ast.kind(function) else {
            return Err(CodegenError::unreachable("expected a function"));
        };
        if body.is_none() {
            return Ok(());
        }
        let sig = sig
            .or(*signature)
            .ok_or_else(|| CodegenError::internal("function without a checked signature"))?;
        match async_impl {
            Some(body) => {
                self.out.jobs.push(Job::AsyncProxy { sig, body: *body });
                self.out.jobs.push(Job::AsyncBody { function, sig: *body });
            }
            None => self.out.jobs.push(Job::Function { function, sig }),
        }
        Ok(())
    }

    fn class(&mut self, decl: NodeId) -> CodegenResult<()> {
        let cx = self.cx;
        let NodeKind::ClassDeclaration { members, modifiers, .. } = cx.ast.kind(decl) else {
            return Ok(());
        };
        if modifiers.contains(ModifierFlags::DECLARE) {
            return Ok(());
        }
        let (ty, obj) = object_of(self.cx, decl)?;
        let kind = if obj.flags.contains(ObjectFlags::LAMBDA_OBJECT) {
            RecordKind::Lambda
        } else if obj.flags.contains(ObjectFlags::DYNAMIC_GLUE) {
            RecordKind::Glue
        } else {
            RecordKind::Class
        };
        let mut interfaces: Vec<String> = obj.interfaces.iter().map(|i| cx.record_name(*i)).collect();
        let mut fields = Vec::new();
        let mut has_static_init = false;
        let mut has_ctor = false;
        for &member in members {
            match cx.ast.kind(member) {
                NodeKind::ClassProperty { name, init, modifiers, .. } => {
                    let is_static = modifiers.contains(ModifierFlags::STATIC);
                    let Some(prop) = cx.ast.name_of(*name).and_then(|n| obj.members(is_static).get(&n)) else {
                        continue;
                    };
                    fields.push(FieldOutput {
                        name: cx.table.interner().resolve(prop.name).to_string(),
                        descriptor: cx.descriptor(cx.declared_field_type(prop)),
                        is_static,
                    });
                    has_static_init |= is_static && init.is_some();
                }
                NodeKind::MethodDefinition { kind, function, .. } => {
                    has_ctor |= *kind == MethodKind::Constructor;
                    self.function(*function, None)?;
                }
                _ => {}
            }
        }

        match kind {
            RecordKind::Lambda => {
                let invoke = lambda_invoke(cx, ty)?;
                let function = cx
                    .table
                    .signature(invoke)
                    .decl
                    .ok_or_else(|| CodegenError::internal("lambda invoke without a body"))?;
                interfaces.push(CodegenContext::function_record(cx.table.signature(invoke).params.len()));
                self.out.jobs.push(Job::LambdaCtor { class: ty });
                self.function(function, Some(invoke))?;
                self.out.jobs.push(Job::LambdaBridge { class: ty, sig: invoke });
            }
            RecordKind::Class if !has_ctor => self.out.jobs.push(Job::DefaultCtor { class: ty }),
            _ => {}
        }
        if has_static_init {
            self.out.jobs.push(Job::StaticInit { class: ty });
        }
        self.out.records.push(RecordOutput {
            name: cx.record_name(ty),
            kind,
            super_class: obj.super_type.map(|s| cx.record_name(s)),
            interfaces,
            fields,
        });
        Ok(())
    }

    fn interface(&mut self, decl: NodeId) -> CodegenResult<()> {
        let (ty, obj) = object_of(self.cx, decl)?;
        let interfaces = obj.interfaces.iter().map(|i| self.cx.record_name(*i)).collect();
        self.out.records.push(RecordOutput {
            name: self.cx.record_name(ty),
            kind: RecordKind::Interface,
            super_class: None,
            interfaces,
            fields: Vec::new(),
        });
        Ok(())
    }
}

fn object_of<'a>(cx: &CodegenContext<'a>, decl: NodeId) -> CodegenResult<(TypeId, &'a ObjectType)> {
    let ty = cx.ast.ts_type(decl).ok_or_else(|| CodegenError::internal("class declaration without a type"))?;
    let obj = cx.table.object(ty).ok_or_else(|| CodegenError::internal("class type is not an object"))?;
    Ok((ty, obj))
}

/// The typed `invoke` of a lambda class.
fn lambda_invoke(cx: &CodegenContext<'_>, class: TypeId) -> CodegenResult<SignatureId> {
    let missing = || CodegenError::internal("lambda class without 'invoke'");
    let name = cx.table.interner().get("invoke").ok_or_else(missing)?;
    let prop = cx.table.object(class).and_then(|o| o.instance_members.get(&name)).ok_or_else(missing)?;
    match cx.table.get(prop.ty) {
        Type::Function { signatures } => signatures.first().copied().ok_or_else(missing),
        _ => Err(missing()),
    }
}

// ============================================================================
// Compiling jobs
// ============================================================================

/// Compile every job, in order. With more than one function thread the
/// jobs run on a dedicated pool; the output order is the job order either
/// way.
pub(crate) fn compile_jobs(cx: &CodegenContext<'_>, jobs: &[Job]) -> CodegenResult<Vec<FunctionOutput>> {
    let threads = cx.options.function_threads;
    if threads <= 1 {
        return jobs.iter().map(|job| compile_job(cx, *job)).collect();
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| CodegenError::internal(format!("cannot start the codegen thread pool: {}", e)))?;
    pool.install(|| jobs.par_iter().map(|job| compile_job(cx, *job)).collect())
}

fn compile_job(cx: &CodegenContext<'_>, job: Job) -> CodegenResult<FunctionOutput> {
    let output = match job {
        Job::Function { function, sig } => compile_function(cx, function, sig, false),
        Job::AsyncBody { function, sig } => compile_function(cx, function, sig, true),
        Job::AsyncProxy { sig, body } => compile_async_proxy(cx, sig, body),
        Job::DefaultCtor { class } => compile_default_ctor(cx, class),
        Job::StaticInit { class } => compile_static_init(cx, class),
        Job::GlobalInit { program } => compile_global_init(cx, program),
        Job::LambdaCtor { class } => compile_lambda_ctor(cx, class),
        Job::LambdaBridge { class, sig } => compile_lambda_bridge(cx, class, sig),
    }?;
    tracing::trace!(function = output.name.as_str(), instructions = output.instructions.len(), "generated");
    Ok(output)
}

/// The receiver type of `sig`, if it takes one.
fn receiver_of(cx: &CodegenContext<'_>, sig: SignatureId) -> CodegenResult<Option<TypeId>> {
    if cx.is_static_call(sig) {
        return Ok(None);
    }
    let s = cx.table.signature(sig);
    let receiver = s.owner.or_else(|| {
        s.decl.and_then(|f| cx.arrow_of(f)).and_then(|arrow| cx.lambda_class_of(arrow))
    });
    receiver
        .map(Some)
        .ok_or_else(|| CodegenError::internal(format!("no receiver for '{}'", cx.method_id(sig))))
}

fn class_decl<'a>(cx: &CodegenContext<'a>, class: TypeId) -> CodegenResult<(&'a ObjectType, &'a [NodeId])> {
    let obj = cx
        .table
        .object(class)
        .ok_or_else(|| CodegenError::internal(format!("'{}' is not a class", cx.table.type_to_string(class))))?;
    match obj.decl.map(|d| cx.ast.kind(d)) {
        Some(NodeKind::ClassDeclaration { members, .. }) => Ok((obj, members)),
        _ => Ok((obj, &[])),
    }
}

fn is_super_call(cx: &CodegenContext<'_>, statement: NodeId) -> bool {
    let NodeKind::ExpressionStatement { expression } = cx.ast.kind(statement) else {
        return false;
    };
    match cx.ast.kind(*expression) {
        NodeKind::Call { callee, .. } => matches!(cx.ast.kind(*callee), NodeKind::Super),
        _ => false,
    }
}

fn compile_function(cx: &CodegenContext<'_>, function: NodeId, sig: SignatureId, async_body: bool) -> CodegenResult<FunctionOutput> {
    let NodeKind::ScriptFunction { params, body, .. } = cx.ast.kind(function) else {
        return Err(CodegenError::unreachable("expected a function"));
    };
    let s = cx.table.signature(sig);
    let this_type = receiver_of(cx, sig)?;
    let mut param_types = s.params.iter().chain(s.rest.as_ref()).map(|p| p.ty);
    let mut registers: Vec<(Option<VariableId>, TypeId)> = Vec::with_capacity(params.len());
    for &param in params {
        let ty = param_types
            .next()
            .ok_or_else(|| CodegenError::internal(format!("parameter count mismatch in '{}'", cx.method_id(sig))))?;
        registers.push((cx.binder.variable_of_decl(param), ty));
    }
    let is_ctor = s.flags.contains(SignatureFlags::CONSTRUCTOR);
    let mode = if async_body {
        ReturnMode::AsyncImpl
    } else if is_ctor || matches!(cx.table.get(s.return_type), Type::Void) {
        ReturnMode::Void
    } else {
        ReturnMode::Value
    };

    let _span = tracing::debug_span!("codegen function", name = cx.method_id(sig).as_str()).entered();
    let mut fc = FunctionCompiler::new(cx, cx.method_id(sig), this_type, &registers, s.return_type, mode);
    if let (Some(arrow), Some(class)) = (cx.arrow_of(function), this_type) {
        fc.lambda = Some(lambda_frame(cx, arrow, class)?);
    }

    let statements: &[NodeId] = match body.map(|b| cx.ast.kind(b)) {
        Some(NodeKind::Block { statements }) => statements,
        _ => &[],
    };
    let mut rest = statements;
    if is_ctor {
        let class = this_type.ok_or_else(|| CodegenError::internal("constructor without a class"))?;
        match statements.split_first() {
            Some((&first, tail)) if is_super_call(cx, first) => {
                fc.compile_stmt(first)?;
                rest = tail;
            }
            _ => fc.call_super_ctor(class)?,
        }
        fc.init_fields(class)?;
    }
    for &statement in rest {
        fc.compile_stmt(statement)?;
    }
    fc.finish(this_type.is_none())
}

fn lambda_frame(cx: &CodegenContext<'_>, arrow: NodeId, class: TypeId) -> CodegenResult<LambdaFrame> {
    let NodeKind::ArrowFunction { captures, .. } = cx.ast.kind(arrow) else {
        return Err(CodegenError::unreachable("expected an arrow function"));
    };
    let members = &cx
        .table
        .object(class)
        .ok_or_else(|| CodegenError::internal("lambda class is not an object"))?
        .instance_members;
    let field = |name: Name| {
        members
            .get(&name)
            .map(|p| (cx.field_id(p), p.ty))
            .ok_or_else(|| CodegenError::internal("lambda class is missing a capture field"))
    };
    let mut frame = LambdaFrame::default();
    for capture in captures {
        match capture {
            Capture::Variable(var) => {
                frame.captures.insert(*var, field(cx.binder.variable(*var).name)?);
            }
            Capture::This => {
                let name = cx
                    .table
                    .interner()
                    .get(CAPTURED_THIS)
                    .ok_or_else(|| CodegenError::internal("captured 'this' field was never declared"))?;
                frame.this_field = Some(field(name)?);
            }
        }
    }
    Ok(frame)
}

fn compile_async_proxy(cx: &CodegenContext<'_>, sig: SignatureId, body: SignatureId) -> CodegenResult<FunctionOutput> {
    let s = cx.table.signature(sig);
    let this_type = receiver_of(cx, sig)?;
    let registers: Vec<(Option<VariableId>, TypeId)> =
        s.params.iter().chain(s.rest.as_ref()).map(|p| (None, p.ty)).collect();
    let mut fc = FunctionCompiler::new(cx, cx.method_id(sig), this_type, &registers, s.return_type, ReturnMode::Value);
    let count = usize::from(this_type.is_some()) + registers.len();
    let args: Vec<u16> = (0..count as u16).collect();
    fc.emit_call(Opcode::Launch, cx.method_id(body), &args, Some(s.return_type))?;
    fc.emit_return()?;
    fc.finish(this_type.is_none())
}

fn compile_default_ctor(cx: &CodegenContext<'_>, class: TypeId) -> CodegenResult<FunctionOutput> {
    let (obj, _) = class_decl(cx, class)?;
    let ctor = obj
        .constructors
        .first()
        .copied()
        .ok_or_else(|| CodegenError::internal("class without a constructor signature"))?;
    let void = cx.table.global.void;
    let mut fc = FunctionCompiler::new(cx, cx.method_id(ctor), Some(class), &[], void, ReturnMode::Void);
    fc.call_super_ctor(class)?;
    fc.init_fields(class)?;
    fc.finish(false)
}

fn compile_static_init(cx: &CodegenContext<'_>, class: TypeId) -> CodegenResult<FunctionOutput> {
    let (obj, members) = class_decl(cx, class)?;
    let void = cx.table.global.void;
    let name = format!("{}.<cctor>:()void", cx.record_name(class));
    let mut fc = FunctionCompiler::new(cx, name, None, &[], void, ReturnMode::Void);
    let is_glue = obj.flags.contains(ObjectFlags::DYNAMIC_GLUE);
    for &member in members {
        let NodeKind::ClassProperty { name, init: Some(init), modifiers, .. } = *cx.ast.kind(member) else {
            continue;
        };
        if !modifiers.contains(ModifierFlags::STATIC) {
            continue;
        }
        let Some(prop) = cx.ast.name_of(name).and_then(|n| obj.static_members.get(&n)) else { continue };
        let mark = fc.em.mark();
        match cx.ast.kind(init) {
            NodeKind::StringLiteral(source) if is_glue => fc.load_dynamic_import(source, prop.ty)?,
            _ => fc.compile_expr_as(init, prop.ty)?,
        }
        fc.convert_acc(cx.declared_field_type(prop))?;
        fc.store_static(cx.field_id(prop))?;
        fc.em.release(mark);
    }
    fc.finish(true)
}

fn compile_global_init(cx: &CodegenContext<'_>, program: NodeId) -> CodegenResult<FunctionOutput> {
    let NodeKind::Program { module_name, statements, .. } = cx.ast.kind(program) else {
        return Err(CodegenError::unreachable("expected a program"));
    };
    let void = cx.table.global.void;
    let name = format!("{}.{}:()void", global_record(module_name), GLOBAL_INIT);
    let mut fc = FunctionCompiler::new(cx, name, None, &[], void, ReturnMode::Void);
    for &statement in statements {
        fc.compile_stmt(statement)?;
    }
    fc.finish(true)
}

fn compile_lambda_ctor(cx: &CodegenContext<'_>, class: TypeId) -> CodegenResult<FunctionOutput> {
    let (obj, _) = class_decl(cx, class)?;
    let ctor = obj
        .constructors
        .first()
        .copied()
        .ok_or_else(|| CodegenError::internal("lambda class without a constructor"))?;
    let params = &cx.table.signature(ctor).params;
    let registers: Vec<(Option<VariableId>, TypeId)> = params.iter().map(|p| (None, p.ty)).collect();
    let void = cx.table.global.void;
    let mut fc = FunctionCompiler::new(cx, cx.method_id(ctor), Some(class), &registers, void, ReturnMode::Void);
    fc.call_super_ctor(class)?;
    let fields = obj.instance_members.values().filter(|p| !p.is_method());
    for (i, field) in fields.take(params.len()).enumerate() {
        fc.em.load(1 + i as u16)?;
        fc.store_field(0, cx.field_id(field))?;
    }
    fc.finish(false)
}

fn compile_lambda_bridge(cx: &CodegenContext<'_>, class: TypeId, sig: SignatureId) -> CodegenResult<FunctionOutput> {
    let s = cx.table.signature(sig);
    let object = cx.table.global.object;
    let arity = s.params.len();
    let object_record = cx.object_record();
    let name = format!(
        "{}.invoke:({}){}",
        cx.record_name(class),
        vec![object_record.clone(); arity].join(","),
        object_record
    );
    let registers = vec![(None, object); arity];
    let mut fc = FunctionCompiler::new(cx, name, Some(class), &registers, object, ReturnMode::Value);
    let first = fc.em.alloc_range(arity + 1);
    fc.em.mov(first, 0)?;
    for (i, param) in s.params.iter().enumerate() {
        fc.em.load(1 + i as u16)?;
        fc.convert_acc(param.ty)?;
        fc.em.store(first + 1 + i as u16)?;
    }
    let args: Vec<u16> = (0..=arity as u16).map(|i| first + i).collect();
    let returns_void = matches!(cx.table.get(s.return_type), Type::Void);
    fc.emit_call(Opcode::CallShort, cx.method_id(sig), &args, (!returns_void).then_some(s.return_type))?;
    if returns_void {
        fc.em.load_undefined();
        fc.em.set_acc(object);
    } else {
        fc.convert_acc(object)?;
    }
    fc.emit_return()?;
    fc.finish(false)
}

impl FunctionCompiler<'_> {
    /// Call the parameterless constructor of the superclass on `this`.
    fn call_super_ctor(&mut self, class: TypeId) -> CodegenResult<()> {
        let table = self.table();
        let Some(super_class) = table.object(class).and_then(|o| o.super_type) else {
            return Ok(());
        };
        let ctor = table
            .object(super_class)
            .and_then(|o| o.constructors.iter().copied().find(|c| table.signature(*c).min_arg_count == 0))
            .ok_or_else(|| {
                CodegenError::internal(format!(
                    "'{}' has no parameterless constructor",
                    table.type_to_string(super_class)
                ))
            })?;
        let mark = self.em.mark();
        let this = self.this_reg()?;
        let args = self.compile_call_args(ctor, &[], Some(this))?;
        self.emit_call(Opcode::CallShort, self.cx.method_id(ctor), &args, None)?;
        self.em.release(mark);
        Ok(())
    }

    /// Run the instance field initializers of `class` on `this`.
    fn init_fields(&mut self, class: TypeId) -> CodegenResult<()> {
        let cx = self.cx;
        let (obj, members) = class_decl(cx, class)?;
        for &member in members {
            let NodeKind::ClassProperty { name, init: Some(init), modifiers, .. } = *cx.ast.kind(member) else {
                continue;
            };
            if modifiers.contains(ModifierFlags::STATIC) {
                continue;
            }
            let Some(prop) = cx.ast.name_of(name).and_then(|n| obj.instance_members.get(&n)) else { continue };
            let mark = self.em.mark();
            self.compile_expr_as(init, prop.ty)?;
            self.convert_acc(cx.declared_field_type(prop))?;
            self.store_field(self.this_reg()?, cx.field_id(prop))?;
            self.em.release(mark);
        }
        Ok(())
    }

    /// Load `imported` from the foreign module named by `source`,
    /// `module:imported`.
    fn load_dynamic_import(&mut self, source: &str, ty: TypeId) -> CodegenResult<()> {
        let (module, imported) = source
            .split_once(':')
            .ok_or_else(|| CodegenError::internal(format!("malformed dynamic import '{}'", source)))?;
        let js_value = self.cx.js_value_record();
        let string = self.cx.string_record();
        self.em.load_string(module);
        let load = self.cx.js_runtime_method("loadModule", &[string.clone()], &js_value);
        self.emit_call_acc(Opcode::CallAccShort, load, ty)?;
        let module = self.em.store_temp()?;
        self.em.load_string(imported);
        let name = self.em.store_temp()?;
        let get = self.cx.js_runtime_method("getPropertyJSValue", &[js_value.clone(), string], &js_value);
        self.emit_call(Opcode::CallShort, get, &[module, name], Some(ty))
    }
}
