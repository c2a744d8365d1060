//! Calls, object construction and lambda objects.

use crate::emitter::Reg;
use crate::error::{CodegenError, CodegenResult};
use crate::function::FunctionCompiler;
use crate::opcode::Opcode;
use etsc_ast::{Capture, NodeId, NodeKind, SignatureId, TypeId};
use etsc_binder::DeclKind;
use etsc_checker::{PropertyFlags, SignatureFlags, Type};
use etsc_core::Name;

impl<'a> FunctionCompiler<'a> {
    pub(crate) fn compile_call(&mut self, node: NodeId, ty: TypeId) -> CodegenResult<()> {
        let ast = self.ast();
        let NodeKind::Call { callee, arguments, optional, signature, .. } = ast.kind(node) else {
            return Err(CodegenError::unreachable("expected a call expression"));
        };
        let (callee, optional, signature) = (*callee, *optional, *signature);
        match ast.kind(callee) {
            NodeKind::Super => {
                let sig = signature.ok_or_else(|| CodegenError::internal("super call without a signature"))?;
                let this = self.this_reg()?;
                let regs = self.compile_call_args(sig, arguments, Some(this))?;
                self.emit_call(Opcode::CallShort, self.cx.method_id(sig), &regs, None)
            }
            NodeKind::Member { computed: false, .. } => self.compile_member_call(callee, arguments, signature, ty),
            NodeKind::Identifier { variable: Some(var), .. }
                if self.cx.binder.variable(*var).kind == DeclKind::Function =>
            {
                let sig = signature.ok_or_else(|| CodegenError::internal("function call without a signature"))?;
                self.compile_static_call(sig, arguments)
            }
            _ => {
                self.compile_expr(callee)?;
                let nullish = self.begin_optional(optional, callee)?;
                self.compile_value_call(signature, arguments)?;
                self.end_optional(nullish, ty)
            }
        }
    }

    /// Arguments of `sig` in consecutive registers after `receiver`,
    /// converted to the erased parameter types of the declaration.
    pub(crate) fn compile_call_args(
        &mut self,
        sig: SignatureId,
        args: &[NodeId],
        receiver: Option<Reg>,
    ) -> CodegenResult<Vec<Reg>> {
        let table = self.table();
        let base = table.signature(self.cx.base_signature(sig));
        let instantiated = table.signature(sig);
        let offset = usize::from(receiver.is_some());
        let count = offset + base.params.len() + usize::from(base.rest.is_some());
        let first = self.em.alloc_range(count);
        let regs: Vec<Reg> = (0..count).map(|i| first + i as Reg).collect();
        if let Some(receiver) = receiver {
            self.em.mov(first, receiver)?;
        }

        let param_vars = self.param_variables(self.cx.base_signature(sig));
        for (i, param) in base.params.iter().enumerate() {
            let reg = regs[offset + i];
            match args.get(i) {
                Some(&arg) => {
                    let inst_ty = instantiated.params.get(i).map(|p| p.ty).unwrap_or(param.ty);
                    self.compile_expr_as(arg, inst_ty)?;
                }
                None => match param.default {
                    Some(default) => {
                        // Defaults see the earlier parameters of the callee.
                        let bound: Vec<_> = param_vars
                            .iter()
                            .take(i)
                            .enumerate()
                            .filter_map(|(j, var)| var.map(|v| (v, regs[offset + j])))
                            .filter(|(v, _)| !self.locals.contains_key(v))
                            .collect();
                        for (var, reg) in &bound {
                            self.locals.insert(*var, *reg);
                        }
                        let result = self.compile_expr(default);
                        for (var, _) in &bound {
                            self.locals.remove(var);
                        }
                        result?;
                    }
                    None => self.em.load_undefined(),
                },
            }
            self.convert_acc(param.ty)?;
            self.em.store(reg)?;
        }

        if let Some(rest) = &base.rest {
            let inst_rest = instantiated.rest.as_ref().map(|r| r.ty).unwrap_or(rest.ty);
            let inst_element = table.element_type(inst_rest).unwrap_or(inst_rest);
            let element = table.element_type(rest.ty).unwrap_or(rest.ty);
            let spread = args.get(base.params.len()..).unwrap_or(&[]);
            let mark = self.em.mark();
            self.em.load_i32(spread.len() as i32, self.int_type());
            let length = self.em.store_temp()?;
            self.new_array(length, rest.ty)?;
            let array = self.em.store_temp()?;
            for (i, &arg) in spread.iter().enumerate() {
                let inner = self.em.mark();
                self.em.load_i32(i as i32, self.int_type());
                let index = self.em.store_temp()?;
                self.compile_expr_as(arg, inst_element)?;
                self.convert_acc(element)?;
                self.store_element(array, index)?;
                self.em.release(inner);
            }
            self.em.load(array)?;
            self.em.store(regs[regs.len() - 1])?;
            self.em.release(mark);
        }
        Ok(regs)
    }

    /// Variables of the declared parameters of `sig`, in order.
    fn param_variables(&self, sig: SignatureId) -> Vec<Option<etsc_ast::VariableId>> {
        let ast = self.ast();
        let Some(function) = self.table().signature(sig).decl else { return Vec::new() };
        match ast.kind(function) {
            NodeKind::ScriptFunction { params, .. } => {
                params.iter().map(|p| self.cx.binder.variable_of_decl(*p)).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Return type of the function a call to `sig` reaches, `None` for
    /// `void`.
    fn call_result(&self, sig: SignatureId) -> Option<TypeId> {
        let table = self.table();
        let base = table.signature(self.cx.base_signature(sig));
        if base.flags.contains(SignatureFlags::CONSTRUCTOR) || self.is_void(base.return_type) {
            None
        } else {
            Some(base.return_type)
        }
    }

    fn compile_static_call(&mut self, sig: SignatureId, args: &[NodeId]) -> CodegenResult<()> {
        let mark = self.em.mark();
        let regs = self.compile_call_args(sig, args, None)?;
        self.emit_call(Opcode::CallShort, self.cx.method_id(sig), &regs, self.call_result(sig))?;
        self.em.release(mark);
        Ok(())
    }

    fn compile_member_call(
        &mut self,
        callee: NodeId,
        args: &[NodeId],
        signature: Option<SignatureId>,
        ty: TypeId,
    ) -> CodegenResult<()> {
        let NodeKind::Member { object, property, optional, obj_type, .. } = *self.ast().kind(callee) else {
            return Err(CodegenError::unreachable("expected a member callee"));
        };
        let name = self.member_name(property)?;
        let table = self.table();

        if self.is_static_receiver(object) {
            let class = self.node_type(object)?;
            if let Some(sig) = signature {
                if table.signature(sig).flags.contains(SignatureFlags::ENUM_HELPER) {
                    return self.compile_enum_static_helper(class, name, sig, args);
                }
            }
            let prop = self.find_property(class, name, true)?;
            if prop.flags.contains(PropertyFlags::METHOD) {
                let sig = signature.ok_or_else(|| CodegenError::internal("static call without a signature"))?;
                return self.compile_static_call(sig, args);
            }
            self.load_static(self.cx.field_id(prop), self.cx.declared_field_type(prop))?;
            return self.compile_value_call(signature, args);
        }

        if matches!(self.ast().kind(object), NodeKind::Super) {
            let sig = signature.ok_or_else(|| CodegenError::internal("super method call without a signature"))?;
            let mark = self.em.mark();
            let this = self.this_reg()?;
            let regs = self.compile_call_args(sig, args, Some(this))?;
            self.emit_call(Opcode::CallShort, self.cx.method_id(sig), &regs, self.call_result(sig))?;
            self.em.release(mark);
            return Ok(());
        }

        let receiver = obj_type.ok_or_else(|| CodegenError::internal("method call without a receiver type"))?;
        let mark = self.em.mark();
        self.compile_expr(object)?;
        let nullish = self.begin_optional(optional, object)?;
        self.convert_acc(receiver)?;
        let target = self.member_target(receiver);
        match table.get(target) {
            Type::Dynamic { language } => {
                let this = self.em.store_temp()?;
                self.em.load_string(table.interner().resolve(name));
                let key = self.em.store_temp()?;
                let mut regs = vec![this, key];
                regs.extend(self.compile_dynamic_args(args, target)?);
                let method = self.cx.dynamic_call_id(language, true, args.len());
                self.emit_call(Opcode::CallShort, method, &regs, Some(target))?;
            }
            Type::Enum(_) => {
                self.compile_enum_instance_helper(target, name)?;
            }
            _ => {
                let is_method = self.method_property(target, name)?;
                if is_method {
                    let sig = signature.ok_or_else(|| CodegenError::internal("method call without a signature"))?;
                    let this = self.em.store_temp()?;
                    let regs = self.compile_call_args(sig, args, Some(this))?;
                    self.emit_call(Opcode::CallVirt, self.cx.method_id(sig), &regs, self.call_result(sig))?;
                } else {
                    self.read_member(receiver, name)?;
                    self.compile_value_call(signature, args)?;
                }
            }
        }
        self.end_optional(nullish, ty)?;
        self.em.release(mark);
        Ok(())
    }

    /// Whether member `name` of `target` is a method rather than a field
    /// holding a function value.
    fn method_property(&self, target: TypeId, name: Name) -> CodegenResult<bool> {
        let table = self.table();
        if let Type::Union { constituents } = table.get(target) {
            let first = constituents
                .first()
                .ok_or_else(|| CodegenError::internal("call on an empty union"))?;
            return self.method_property(self.member_target(*first), name);
        }
        Ok(self.find_property(target, name, false)?.flags.contains(PropertyFlags::METHOD))
    }

    /// Arguments converted to the dynamic type `dynamic`, one register each.
    fn compile_dynamic_args(&mut self, args: &[NodeId], dynamic: TypeId) -> CodegenResult<Vec<Reg>> {
        let first = self.em.alloc_range(args.len());
        for (i, &arg) in args.iter().enumerate() {
            self.compile_expr_as(arg, dynamic)?;
            self.em.store(first + i as Reg)?;
        }
        Ok((0..args.len()).map(|i| first + i as Reg).collect())
    }

    /// Call the function value in the accumulator.
    fn compile_value_call(&mut self, signature: Option<SignatureId>, args: &[NodeId]) -> CodegenResult<()> {
        let table = self.table();
        let callee_ty = self.em.acc_type()?;
        let mark = self.em.mark();
        let callee = self.em.store_temp()?;
        if let Type::Dynamic { language } = table.get(callee_ty) {
            let mut regs = vec![callee];
            regs.extend(self.compile_dynamic_args(args, callee_ty)?);
            let method = self.cx.dynamic_call_id(language, false, args.len());
            self.emit_call(Opcode::CallShort, method, &regs, Some(callee_ty))?;
            self.em.release(mark);
            return Ok(());
        }

        let sig = signature.ok_or_else(|| CodegenError::internal("function value call without a signature"))?;
        let s = table.signature(sig);
        let object = table.global.object;
        let arity = s.params.len();
        let first = self.em.alloc_range(arity + 1);
        self.em.mov(first, callee)?;
        for (i, param) in s.params.iter().enumerate() {
            match args.get(i) {
                Some(&arg) => self.compile_expr_as(arg, param.ty)?,
                None => {
                    self.em.load_undefined();
                    self.convert_acc(param.ty)?;
                }
            }
            self.convert_acc(object)?;
            self.em.store(first + 1 + i as Reg)?;
        }
        let regs: Vec<Reg> = (0..=arity).map(|i| first + i as Reg).collect();
        self.emit_call(Opcode::CallVirt, self.cx.function_invoke_id(arity), &regs, Some(object))?;
        if self.is_void(s.return_type) {
            self.em.set_acc(table.global.void);
        } else {
            self.convert_acc(s.return_type)?;
        }
        self.em.release(mark);
        Ok(())
    }

    pub(crate) fn compile_new(&mut self, node: NodeId, ty: TypeId) -> CodegenResult<()> {
        let NodeKind::New { arguments, signature, .. } = self.ast().kind(node) else {
            return Err(CodegenError::unreachable("expected a new expression"));
        };
        let sig = signature.ok_or_else(|| CodegenError::internal("new without a constructor signature"))?;
        let mark = self.em.mark();
        let regs = self.compile_call_args(sig, arguments, None)?;
        self.emit_initobj(self.cx.method_id(sig), &regs, ty)?;
        self.em.release(mark);
        Ok(())
    }

    /// Instantiate the synthesized class of an arrow function with its
    /// captured values.
    pub(crate) fn compile_lambda_object(&mut self, arrow: NodeId) -> CodegenResult<()> {
        let NodeKind::ArrowFunction { captures, .. } = self.ast().kind(arrow) else {
            return Err(CodegenError::unreachable("expected an arrow function"));
        };
        let table = self.table();
        let lambda = self
            .cx
            .lambda_class_of(arrow)
            .ok_or_else(|| CodegenError::internal("arrow function was not lowered to a class"))?;
        let ctor = table
            .object(lambda)
            .and_then(|o| o.constructors.first().copied())
            .ok_or_else(|| CodegenError::internal("lambda class has no constructor"))?;
        let params = &table.signature(ctor).params;
        let mark = self.em.mark();
        let first = self.em.alloc_range(captures.len());
        for (i, capture) in captures.iter().enumerate() {
            match capture {
                Capture::Variable(var) => self.load_variable(*var)?,
                Capture::This => self.load_this()?,
            }
            if let Some(param) = params.get(i) {
                self.convert_acc(param.ty)?;
            }
            self.em.store(first + i as Reg)?;
        }
        let regs: Vec<Reg> = (0..captures.len()).map(|i| first + i as Reg).collect();
        self.emit_initobj(self.cx.method_id(ctor), &regs, lambda)?;
        self.em.release(mark);
        Ok(())
    }
}
