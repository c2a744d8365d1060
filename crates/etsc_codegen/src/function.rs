//! Compiling one function body.
//!
//! A [`FunctionCompiler`] owns the [`Emitter`] of one function and the
//! mapping from variables to registers. Register `v0` holds `this` in
//! instance methods; parameters follow, then locals and temporaries,
//! which are allocated stack-like and released after every statement.

use crate::context::CodegenContext;
use crate::emitter::{Emitter, Reg};
use crate::error::{CodegenError, CodegenResult};
use crate::instruction::{LabelId, Operand};
use crate::opcode::Opcode;
use crate::output::FunctionOutput;
use etsc_ast::{Ast, NodeId, SignatureId, TypeId, VariableId};
use etsc_binder::VariableFlags;
use etsc_checker::{PrimitiveKind, Signature, Type, TypeTable};
use etsc_core::collections::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReturnMode {
    Value,
    Void,
    /// The coroutine body of an async function: returns its result as an
    /// object.
    AsyncImpl,
}

/// Fields of the lambda object a lambda body reads its captures from.
#[derive(Debug, Default)]
pub(crate) struct LambdaFrame {
    pub captures: FxHashMap<VariableId, (String, TypeId)>,
    pub this_field: Option<(String, TypeId)>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct LoopLabels {
    pub break_label: LabelId,
    pub continue_label: LabelId,
    /// Number of enclosing `try` statements outside the loop.
    pub try_depth: usize,
}

pub(crate) struct FunctionCompiler<'a> {
    pub cx: &'a CodegenContext<'a>,
    pub em: Emitter<'a>,
    pub locals: FxHashMap<VariableId, Reg>,
    pub this_type: Option<TypeId>,
    pub lambda: Option<LambdaFrame>,
    pub loops: Vec<LoopLabels>,
    /// Finalizers of the enclosing `try` statements, innermost last.
    pub finalizers: Vec<Option<NodeId>>,
    pub return_type: TypeId,
    pub return_mode: ReturnMode,
    param_count: usize,
}

impl<'a> FunctionCompiler<'a> {
    /// A compiler whose first registers hold `this`, if any, and `params`.
    pub fn new(
        cx: &'a CodegenContext<'a>,
        name: String,
        this_type: Option<TypeId>,
        params: &[(Option<VariableId>, TypeId)],
        return_type: TypeId,
        return_mode: ReturnMode,
    ) -> Self {
        let reserved = usize::from(this_type.is_some()) + params.len();
        let mut em = Emitter::new(cx.table, name, reserved as Reg);
        let mut locals = FxHashMap::default();
        let mut reg: Reg = 0;
        if let Some(this) = this_type {
            em.set_reg_type(0, this);
            reg = 1;
        }
        for (var, ty) in params {
            em.set_reg_type(reg, *ty);
            if let Some(var) = var {
                locals.insert(*var, reg);
            }
            reg += 1;
        }
        Self {
            cx,
            em,
            locals,
            this_type,
            lambda: None,
            loops: Vec::new(),
            finalizers: Vec::new(),
            return_type,
            return_mode,
            param_count: reserved,
        }
    }

    pub fn table(&self) -> &'a TypeTable {
        self.cx.table
    }

    pub fn ast(&self) -> &'a Ast {
        self.cx.ast
    }

    pub fn node_type(&self, node: NodeId) -> CodegenResult<TypeId> {
        self.cx.ast.ts_type(node).ok_or_else(|| {
            CodegenError::internal(format!(
                "{} in {} has no checked type",
                self.cx.ast.kind(node).name(),
                self.em.function()
            ))
        })
    }

    pub fn int_type(&self) -> TypeId {
        self.table().primitive(PrimitiveKind::Int)
    }

    pub fn boolean_type(&self) -> TypeId {
        self.table().primitive(PrimitiveKind::Boolean)
    }

    pub fn is_void(&self, ty: TypeId) -> bool {
        matches!(self.table().get(ty), Type::Void)
    }

    pub fn mismatch(&self, node: NodeId, expected: TypeId) -> CodegenError {
        let table = self.table();
        CodegenError::AccumulatorMismatch {
            function: self.em.function().to_string(),
            node: self.cx.ast.kind(node).name().to_string(),
            expected: table.type_to_string(expected),
            found: self.em.acc_type_opt().map(|t| table.type_to_string(t)).unwrap_or_else(|| "nothing".into()),
        }
    }

    // ========================================================================
    // Variables
    // ========================================================================

    pub fn this_reg(&self) -> CodegenResult<Reg> {
        match self.this_type {
            Some(_) => Ok(0),
            None => Err(CodegenError::internal(format!("'this' used in static {}", self.em.function()))),
        }
    }

    /// `this` of the source code: the receiver, or inside a lambda the
    /// captured receiver of the enclosing method.
    pub fn load_this(&mut self) -> CodegenResult<()> {
        let this = self.this_reg()?;
        if let Some((field, ty)) = self.lambda.as_ref().and_then(|l| l.this_field.clone()) {
            return self.load_field(this, field, ty);
        }
        self.em.load(this)
    }

    pub fn load_variable(&mut self, var: VariableId) -> CodegenResult<()> {
        if let Some(&reg) = self.locals.get(&var) {
            return self.em.load(reg);
        }
        if let Some((field, ty)) = self.lambda.as_ref().and_then(|l| l.captures.get(&var).cloned()) {
            return self.load_field(0, field, ty);
        }
        let (id, ty) = self.static_variable(var)?;
        self.load_static(id, ty)
    }

    /// Store the accumulator into a variable; the accumulator keeps the
    /// value.
    pub fn store_variable(&mut self, var: VariableId) -> CodegenResult<()> {
        if let Some(&reg) = self.locals.get(&var) {
            return self.em.store(reg);
        }
        if let Some((field, _)) = self.lambda.as_ref().and_then(|l| l.captures.get(&var).cloned()) {
            return self.store_field(0, field);
        }
        let (id, _) = self.static_variable(var)?;
        self.store_static(id)
    }

    /// Declared type of a variable's storage.
    pub fn variable_type(&self, var: VariableId) -> CodegenResult<TypeId> {
        if let Some(&reg) = self.locals.get(&var) {
            return self.em.reg_type(reg);
        }
        if let Some((_, ty)) = self.lambda.as_ref().and_then(|l| l.captures.get(&var)) {
            return Ok(*ty);
        }
        Ok(self.static_variable(var)?.1)
    }

    fn static_variable(&self, var: VariableId) -> CodegenResult<(String, TypeId)> {
        let variable = self.cx.binder.variable(var);
        let name = self.table().interner().resolve(variable.name);
        if !variable.flags.contains(VariableFlags::TOP_LEVEL) && !variable.is_dynamic_import() {
            return Err(CodegenError::internal(format!(
                "variable '{}' is not reachable from {}",
                name,
                self.em.function()
            )));
        }
        let ty = variable
            .ts_type
            .ok_or_else(|| CodegenError::internal(format!("variable '{}' has no checked type", name)))?;
        Ok((self.cx.static_var_id(var), ty))
    }

    // ========================================================================
    // Fields, arrays and calls
    // ========================================================================

    pub fn load_field(&mut self, object: Reg, field: String, ty: TypeId) -> CodegenResult<()> {
        self.em.reg_type(object)?;
        let op = self.em.width(ty).select(Opcode::Ldobj, Opcode::LdobjWide, Opcode::LdobjObj);
        self.em.emit(op, vec![Operand::Reg(object), Operand::Id(field)]);
        self.em.set_acc(ty);
        Ok(())
    }

    pub fn store_field(&mut self, object: Reg, field: String) -> CodegenResult<()> {
        let ty = self.em.acc_type()?;
        self.em.reg_type(object)?;
        let op = self.em.width(ty).select(Opcode::Stobj, Opcode::StobjWide, Opcode::StobjObj);
        self.em.emit(op, vec![Operand::Reg(object), Operand::Id(field)]);
        Ok(())
    }

    pub fn load_static(&mut self, field: String, ty: TypeId) -> CodegenResult<()> {
        let op = self.em.width(ty).select(Opcode::Ldstatic, Opcode::LdstaticWide, Opcode::LdstaticObj);
        self.em.emit(op, vec![Operand::Id(field)]);
        self.em.set_acc(ty);
        Ok(())
    }

    pub fn store_static(&mut self, field: String) -> CodegenResult<()> {
        let ty = self.em.acc_type()?;
        let op = self.em.width(ty).select(Opcode::Ststatic, Opcode::StstaticWide, Opcode::StstaticObj);
        self.em.emit(op, vec![Operand::Id(field)]);
        Ok(())
    }

    /// `acc = array[acc]`.
    pub fn load_element(&mut self, array: Reg, element: TypeId) -> CodegenResult<()> {
        self.em.acc_type()?;
        let op = self.em.width(element).select(Opcode::Ldarr, Opcode::LdarrWide, Opcode::LdarrObj);
        self.em.emit_with_reg(op, array, Some(element))
    }

    /// `array[index] = acc`.
    pub fn store_element(&mut self, array: Reg, index: Reg) -> CodegenResult<()> {
        let ty = self.em.acc_type()?;
        self.em.reg_type(array)?;
        self.em.reg_type(index)?;
        let op = self.em.width(ty).select(Opcode::Starr, Opcode::StarrWide, Opcode::StarrObj);
        self.em.emit(op, vec![Operand::Reg(array), Operand::Reg(index)]);
        Ok(())
    }

    /// A new array of `array_ty` with `length` elements, in the accumulator.
    pub fn new_array(&mut self, length: Reg, array_ty: TypeId) -> CodegenResult<()> {
        self.em.reg_type(length)?;
        let descriptor = self.cx.descriptor(array_ty);
        self.em.emit(Opcode::Newarr, vec![Operand::Reg(length), Operand::Id(descriptor)]);
        self.em.set_acc(array_ty);
        Ok(())
    }

    /// Emit a call. `result` is the type left in the accumulator; `None`
    /// for `void`.
    pub fn emit_call(&mut self, opcode: Opcode, method: String, args: &[Reg], result: Option<TypeId>) -> CodegenResult<()> {
        for reg in args {
            self.em.reg_type(*reg)?;
        }
        let opcode = if opcode == Opcode::CallShort && args.len() > 4 { Opcode::CallRange } else { opcode };
        let mut operands = vec![Operand::Id(method)];
        match (opcode, args.first()) {
            (Opcode::CallRange, Some(first)) => {
                operands.push(Operand::Reg(*first));
                operands.push(Operand::Imm(args.len() as i64));
            }
            _ => operands.extend(args.iter().map(|r| Operand::Reg(*r))),
        }
        self.em.emit(opcode, operands);
        self.em.set_acc(result.unwrap_or(self.table().global.void));
        Ok(())
    }

    /// A call taking the accumulator as its first argument or receiver.
    pub fn emit_call_acc(&mut self, opcode: Opcode, method: String, result: TypeId) -> CodegenResult<()> {
        self.em.acc_type()?;
        self.em.emit(opcode, vec![Operand::Id(method)]);
        self.em.set_acc(result);
        Ok(())
    }

    /// A constructed object of `ty` in the accumulator.
    pub fn emit_initobj(&mut self, ctor: String, args: &[Reg], ty: TypeId) -> CodegenResult<()> {
        for reg in args {
            self.em.reg_type(*reg)?;
        }
        let mut operands = vec![Operand::Id(ctor)];
        operands.extend(args.iter().map(|r| Operand::Reg(*r)));
        self.em.emit(Opcode::Initobj, operands);
        self.em.set_acc(ty);
        Ok(())
    }

    /// A method of a built-in class, by name and a predicate on its
    /// signature. Accessors resolve to their getter.
    pub fn builtin_method(
        &self,
        class: Option<TypeId>,
        name: &str,
        is_static: bool,
        pick: impl Fn(&Signature) -> bool,
    ) -> CodegenResult<SignatureId> {
        let missing = || CodegenError::internal(format!("built-in method '{}' is not declared", name));
        let class = class.ok_or_else(missing)?;
        let table = self.table();
        let name_id = table.interner().get(name).ok_or_else(missing)?;
        let prop = table.find_property(class, name_id, is_static).ok_or_else(missing)?;
        if let Some(getter) = prop.getter {
            return Ok(getter);
        }
        match table.get(prop.ty) {
            Type::Function { signatures } => {
                signatures.iter().copied().find(|s| pick(table.signature(*s))).ok_or_else(missing)
            }
            _ => Err(missing()),
        }
    }

    /// Construct an exception of `class` carrying `message` and throw it.
    pub fn throw_new(&mut self, class: Option<TypeId>, message: &str) -> CodegenResult<()> {
        let table = self.table();
        let class = class
            .or(table.global.exception)
            .ok_or_else(|| CodegenError::internal("no exception class is declared"))?;
        let ctors = table.object(class).map(|o| o.constructors.as_slice()).unwrap_or(&[]);
        let string = table.global.string;
        let with_message = ctors.iter().copied().find(|c| {
            let s = table.signature(*c);
            s.params.len() == 1 && table.widen(s.params[0].ty) == string
        });
        let ctor = with_message.ok_or_else(|| {
            CodegenError::internal(format!("{} has no constructor taking a message", table.type_to_string(class)))
        })?;
        let mark = self.em.mark();
        self.em.load_string(message);
        let arg = self.em.store_temp()?;
        self.emit_initobj(self.cx.method_id(ctor), &[arg], class)?;
        let exception = self.em.store_temp()?;
        self.em.emit_with_reg(Opcode::Throw, exception, None)?;
        self.em.release(mark);
        Ok(())
    }

    // ========================================================================
    // Constants and returns
    // ========================================================================

    /// The zero value of `ty`.
    pub fn load_default(&mut self, ty: TypeId) {
        match self.table().get(ty) {
            Type::Primitive { kind, .. } => match kind {
                PrimitiveKind::Long => self.em.load_i64(0, ty),
                PrimitiveKind::Float => self.em.load_f32(0.0, ty),
                PrimitiveKind::Double => self.em.load_f64(0.0, ty),
                _ => self.em.load_i32(0, ty),
            },
            Type::Enum(_) => self.em.load_i32(0, ty),
            _ => {
                self.em.load_undefined();
                self.em.set_acc(ty);
            }
        }
    }

    /// Return the accumulator, or nothing, according to the return mode.
    pub fn emit_return(&mut self) -> CodegenResult<()> {
        match self.return_mode {
            ReturnMode::Void => self.em.emit(Opcode::ReturnVoid, vec![]),
            ReturnMode::Value | ReturnMode::AsyncImpl => {
                let ty = self.em.acc_type()?;
                let op = self.em.width(ty).select(Opcode::Return, Opcode::ReturnWide, Opcode::ReturnObj);
                self.em.emit(op, vec![]);
            }
        }
        Ok(())
    }

    /// Close the body with a return if control can reach its end.
    fn emit_tail_return(&mut self) -> CodegenResult<()> {
        if self.em.is_terminated() {
            return Ok(());
        }
        match self.return_mode {
            ReturnMode::Void => {}
            ReturnMode::AsyncImpl => {
                self.em.load_undefined();
                self.convert_acc(self.return_type)?;
            }
            ReturnMode::Value => self.load_default(self.return_type),
        }
        self.emit_return()
    }

    pub fn finish(mut self, is_static: bool) -> CodegenResult<FunctionOutput> {
        self.emit_tail_return()?;
        let name = self.em.function().to_string();
        let body = self.em.finish(self.cx.optimize())?;
        Ok(FunctionOutput {
            name,
            param_count: self.param_count,
            register_count: body.register_count,
            is_static,
            instructions: body.instructions,
            catch_table: body.catch_table,
        })
    }
}
