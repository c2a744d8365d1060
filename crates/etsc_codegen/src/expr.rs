//! Expressions. Every expression leaves its value in the accumulator.

use crate::error::{CodegenError, CodegenResult};
use crate::function::FunctionCompiler;
use crate::instruction::{LabelId, Operand};
use crate::literals::{LiteralBuffer, LiteralValue};
use crate::opcode::Opcode;
use etsc_ast::{BinaryOp, NodeId, NodeKind, Number, TypeId, UnaryOp};
use etsc_binder::DeclKind;
use etsc_checker::{ConstValue, ObjectFlags, PrimitiveKind, Property, PropertyFlags, Type};
use etsc_core::Name;

/// One operand of a string concatenation.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ConcatPart {
    Node(NodeId),
    /// A value already stored in a register.
    Reg(u16),
}

impl<'a> FunctionCompiler<'a> {
    /// Compile `node` and check that the accumulator holds its checked
    /// type, then apply the boxing the checker recorded on it.
    pub(crate) fn compile_expr(&mut self, node: NodeId) -> CodegenResult<()> {
        let ty = self.node_type(node)?;
        let table = self.table();
        if (table.is_constant(ty) || table.string_value(ty).is_some()) && self.is_pure(node) {
            self.load_constant(ty)?;
        } else {
            self.compile_expr_inner(node, ty)?;
            self.check_acc(node, ty)?;
        }
        self.apply_boxing(node)
    }

    /// Compile `node` and convert its value to `target`.
    /// A constant that fits the target is loaded in the target's form
    /// instead of being converted after the load.
    pub(crate) fn compile_expr_as(&mut self, node: NodeId, target: TypeId) -> CodegenResult<()> {
        let table = self.table();
        let ty = self.node_type(node)?;
        if let (Some(value), Some(kind)) = (table.constant_value(ty), table.primitive_kind(target)) {
            if value.fits(kind) && self.is_pure(node) && self.ast().boxing(node).is_empty() {
                self.load_const_value(value.cast(kind), target);
                return Ok(());
            }
        }
        self.compile_expr(node)?;
        self.convert_acc(target)
    }

    /// Whether evaluating `node` has no effect besides its value.
    pub(crate) fn is_pure(&self, node: NodeId) -> bool {
        match self.ast().kind(node) {
            NodeKind::NumberLiteral(_)
            | NodeKind::CharLiteral(_)
            | NodeKind::StringLiteral(_)
            | NodeKind::BooleanLiteral(_)
            | NodeKind::NullLiteral
            | NodeKind::UndefinedLiteral
            | NodeKind::This
            | NodeKind::Identifier { .. } => true,
            NodeKind::Unary { argument, .. } => self.is_pure(*argument),
            NodeKind::Binary { left, right, .. } => self.is_pure(*left) && self.is_pure(*right),
            NodeKind::Conditional { test, consequent, alternate } => {
                self.is_pure(*test) && self.is_pure(*consequent) && self.is_pure(*alternate)
            }
            NodeKind::As { expression, .. } => self.is_pure(*expression),
            _ => false,
        }
    }

    pub(crate) fn load_constant(&mut self, ty: TypeId) -> CodegenResult<()> {
        let table = self.table();
        if let Some(value) = table.string_value(ty) {
            self.em.load_string(value);
            self.em.set_acc(ty);
            return Ok(());
        }
        let value = table
            .constant_value(ty)
            .ok_or_else(|| CodegenError::internal(format!("'{}' is not a constant", table.type_to_string(ty))))?;
        self.load_const_value(value, ty);
        Ok(())
    }

    fn load_const_value(&mut self, value: ConstValue, ty: TypeId) {
        match value {
            ConstValue::Boolean(v) => self.em.load_i32(i32::from(v), ty),
            ConstValue::Byte(v) => self.em.load_i32(i32::from(v), ty),
            ConstValue::Char(v) => self.em.load_i32(i32::from(v), ty),
            ConstValue::Short(v) => self.em.load_i32(i32::from(v), ty),
            ConstValue::Int(v) => self.em.load_i32(v, ty),
            ConstValue::Long(v) => self.em.load_i64(v, ty),
            ConstValue::Float(v) => self.em.load_f32(v, ty),
            ConstValue::Double(v) => self.em.load_f64(v, ty),
        }
    }

    fn compile_expr_inner(&mut self, node: NodeId, ty: TypeId) -> CodegenResult<()> {
        let ast = self.ast();
        let table = self.table();
        match ast.kind(node) {
            NodeKind::NumberLiteral(number) => {
                match *number {
                    Number::Int(v) => self.em.load_i32(v, table.primitive(PrimitiveKind::Int)),
                    Number::Long(v) => self.em.load_i64(v, table.primitive(PrimitiveKind::Long)),
                    Number::Float(v) => self.em.load_f32(v, table.primitive(PrimitiveKind::Float)),
                    Number::Double(v) => self.em.load_f64(v, table.primitive(PrimitiveKind::Double)),
                }
                Ok(())
            }
            NodeKind::CharLiteral(c) => {
                self.em.load_i32(i32::from(*c), table.primitive(PrimitiveKind::Char));
                Ok(())
            }
            NodeKind::BooleanLiteral(b) => {
                self.em.load_i32(i32::from(*b), self.boolean_type());
                Ok(())
            }
            NodeKind::StringLiteral(s) => {
                self.em.load_string(s);
                Ok(())
            }
            NodeKind::NullLiteral => {
                self.em.load_null();
                Ok(())
            }
            NodeKind::UndefinedLiteral => {
                self.em.load_undefined();
                Ok(())
            }
            NodeKind::Identifier { variable, .. } => {
                let var = variable.ok_or_else(|| {
                    CodegenError::internal(format!("unresolved identifier '{}'", ast.name_str(node)))
                })?;
                self.load_variable(var)
            }
            NodeKind::This => self.load_this(),
            NodeKind::Super => {
                self.load_this()?;
                self.em.set_acc(ty);
                Ok(())
            }
            NodeKind::Member { computed: false, .. } => self.compile_member(node, ty),
            NodeKind::Member { computed: true, .. } => self.compile_element(node),
            NodeKind::Call { .. } => self.compile_call(node, ty),
            NodeKind::New { .. } => self.compile_new(node, ty),
            NodeKind::NewArray { dimension, .. } => {
                let mark = self.em.mark();
                self.compile_expr_as(*dimension, self.int_type())?;
                let length = self.em.store_temp()?;
                self.new_array(length, ty)?;
                self.em.release(mark);
                Ok(())
            }
            NodeKind::ArrayLiteral { elements, preferred_type } => {
                self.compile_array_literal(elements, preferred_type.unwrap_or(ty))
            }
            NodeKind::ArrowFunction { .. } => self.compile_lambda_object(node),
            NodeKind::Unary { op, argument } => self.compile_unary(*op, *argument, ty),
            NodeKind::Update { .. } => self.compile_update(node),
            NodeKind::Binary { op, left, right, operation_type } => {
                self.compile_binary(node, *op, *left, *right, *operation_type, ty)
            }
            NodeKind::Conditional { test, consequent, alternate } => {
                let (otherwise, end) = (self.em.new_label(), self.em.new_label());
                self.branch_if(*test, false, otherwise)?;
                self.compile_expr_as(*consequent, ty)?;
                self.em.jump(end);
                self.em.set_label(otherwise);
                self.compile_expr_as(*alternate, ty)?;
                self.em.set_label(end);
                self.em.set_acc(ty);
                Ok(())
            }
            NodeKind::Assignment { .. } => self.compile_assignment(node),
            NodeKind::As { expression, .. } => self.compile_as(*expression, ty),
            NodeKind::InstanceOf { expression, type_annotation } => {
                let target = self.node_type(*type_annotation)?;
                self.compile_expr(*expression)?;
                self.em.emit(Opcode::Isinstance, vec![Operand::Id(self.cx.descriptor(target))]);
                self.em.set_acc(self.boolean_type());
                Ok(())
            }
            NodeKind::NonNull { expression } => {
                self.compile_expr(*expression)?;
                if !table.possibly_nullish(self.node_type(*expression)?) {
                    return self.convert_acc(ty);
                }
                let ok = self.em.new_label();
                self.em.branch(Opcode::JnezObj, ok)?;
                self.throw_new(table.global.null_pointer_exception, "Null pointer dereference")?;
                self.em.set_label(ok);
                self.em.set_acc(ty);
                Ok(())
            }
            NodeKind::Await { argument } => {
                self.compile_expr(*argument)?;
                let promise = self.node_type(*argument)?;
                let method = self.builtin_method(Some(promise), "awaitResolution", false, |s| s.params.is_empty());
                let id = match method {
                    Ok(sig) => self.cx.method_id(sig),
                    Err(_) => format!(
                        "{}.awaitResolution:(){}",
                        self.cx.record_name(promise),
                        self.cx.object_record()
                    ),
                };
                self.emit_call_acc(Opcode::CallVirtAccShort, id, table.global.object)?;
                self.convert_acc(ty)
            }
            NodeKind::TypeOf { argument } => {
                let argument_ty = self.node_type(*argument)?;
                if !self.is_pure(*argument) {
                    self.compile_expr(*argument)?;
                }
                let name = match table.string_value(ty) {
                    Some(known) => known.to_string(),
                    None => self.type_of_name(argument_ty).to_string(),
                };
                self.em.load_string(&name);
                Ok(())
            }
            NodeKind::BlockExpression { statements } => {
                let Some((last, init)) = statements.split_last() else {
                    self.em.set_acc(table.global.void);
                    return Ok(());
                };
                for statement in init {
                    self.compile_stmt(*statement)?;
                }
                match ast.kind(*last) {
                    NodeKind::ExpressionStatement { expression } => self.compile_expr(*expression),
                    _ => {
                        self.compile_stmt(*last)?;
                        self.em.set_acc(table.global.void);
                        Ok(())
                    }
                }
            }
            other => Err(CodegenError::unreachable(format!("'{}' is not a compilable expression", other.name()))),
        }
    }

    /// Result of `typeof` for a statically known operand type.
    fn type_of_name(&self, ty: TypeId) -> &'static str {
        let table = self.table();
        match table.get(ty) {
            Type::Primitive { kind: PrimitiveKind::Boolean, .. } => "boolean",
            Type::Primitive { .. } => "number",
            Type::String { .. } => "string",
            Type::Undefined | Type::Void => "undefined",
            Type::Function { .. } => "function",
            Type::Enum(e) if e.is_string => "string",
            Type::Enum(_) => "number",
            Type::Object(obj) if obj.flags.contains(ObjectFlags::LAMBDA_OBJECT) => "function",
            Type::Object(_) if table.global.string_class == Some(ty) => "string",
            Type::Object(_) => match table.unboxed_kind(ty) {
                Some(PrimitiveKind::Boolean) => "boolean",
                Some(_) => "number",
                None => "object",
            },
            _ => "object",
        }
    }

    // ========================================================================
    // Members
    // ========================================================================

    /// The type whose member table a member access on `ty` searches.
    pub(crate) fn member_target(&self, ty: TypeId) -> TypeId {
        let table = self.table();
        match table.get(ty) {
            Type::String { .. } => table.global.string_class.unwrap_or(ty),
            Type::TypeParameter { constraint, .. } => {
                constraint.map(|c| self.member_target(c)).unwrap_or(table.global.object)
            }
            Type::NonNullish { inner } => self.member_target(*inner),
            Type::Union { constituents } => {
                let values: Vec<TypeId> = constituents
                    .iter()
                    .copied()
                    .filter(|c| !matches!(table.get(*c), Type::Null | Type::Undefined))
                    .collect();
                match values.as_slice() {
                    [single] => self.member_target(*single),
                    _ => ty,
                }
            }
            _ => ty,
        }
    }

    /// Whether `object` names a class, interface or enum rather than a
    /// value.
    pub(crate) fn is_static_receiver(&self, object: NodeId) -> bool {
        match self.ast().kind(object) {
            NodeKind::Identifier { variable: Some(var), .. } => matches!(
                self.cx.binder.variable(*var).kind,
                DeclKind::Class | DeclKind::Interface | DeclKind::Enum
            ),
            _ => false,
        }
    }

    pub(crate) fn member_name(&self, property: NodeId) -> CodegenResult<Name> {
        self.ast().name_of(property).ok_or_else(|| CodegenError::internal("member without a name"))
    }

    pub(crate) fn find_property(&self, ty: TypeId, name: Name, is_static: bool) -> CodegenResult<&'a Property> {
        let table = self.table();
        table.find_property(ty, name, is_static).ok_or_else(|| {
            CodegenError::internal(format!(
                "'{}' has no member '{}'",
                table.type_to_string(ty),
                table.interner().resolve(name)
            ))
        })
    }

    /// Jump to the returned label when the receiver in the accumulator is
    /// nullish and the access is an optional link.
    pub(crate) fn begin_optional(&mut self, optional: bool, object: NodeId) -> CodegenResult<Option<LabelId>> {
        if !optional || !self.table().possibly_nullish(self.node_type(object)?) {
            return Ok(None);
        }
        let nullish = self.em.new_label();
        self.em.branch(Opcode::JeqzObj, nullish)?;
        Ok(Some(nullish))
    }

    /// Join an optional link: the short-circuited path yields `undefined`.
    pub(crate) fn end_optional(&mut self, nullish: Option<LabelId>, ty: TypeId) -> CodegenResult<()> {
        let Some(nullish) = nullish else { return Ok(()) };
        let end = self.em.new_label();
        let void = self.is_void(ty);
        if !void {
            self.convert_acc(ty)?;
        }
        self.em.jump(end);
        self.em.set_label(nullish);
        if !void {
            self.em.load_undefined();
            self.convert_acc(ty)?;
        }
        self.em.set_label(end);
        self.em.set_acc(ty);
        Ok(())
    }

    fn compile_member(&mut self, node: NodeId, ty: TypeId) -> CodegenResult<()> {
        let NodeKind::Member { object, property, optional, obj_type, .. } = *self.ast().kind(node) else {
            return Err(CodegenError::unreachable("expected a member expression"));
        };
        let name = self.member_name(property)?;
        if self.is_static_receiver(object) {
            return self.compile_static_member(object, name);
        }
        let receiver = obj_type.ok_or_else(|| CodegenError::internal("member without a receiver type"))?;
        let mark = self.em.mark();
        self.compile_expr(object)?;
        let nullish = self.begin_optional(optional, object)?;
        self.convert_acc(receiver)?;
        self.read_member(receiver, name)?;
        self.end_optional(nullish, ty)?;
        self.em.release(mark);
        Ok(())
    }

    fn compile_static_member(&mut self, object: NodeId, name: Name) -> CodegenResult<()> {
        let class = self.node_type(object)?;
        let table = self.table();
        if let Some(ordinal) = table.enum_type(class).and_then(|e| e.ordinal_of(name)) {
            self.em.load_i32(ordinal as i32, class);
            return Ok(());
        }
        let prop = self.find_property(class, name, true)?;
        match prop.getter {
            Some(getter) if prop.flags.contains(PropertyFlags::GETTER) => {
                let ret = table.signature(self.cx.base_signature(getter)).return_type;
                self.emit_call(Opcode::CallShort, self.cx.method_id(getter), &[], Some(ret))
            }
            _ => self.load_static(self.cx.field_id(prop), self.cx.declared_field_type(prop)),
        }
    }

    /// Read member `name` of the receiver in the accumulator.
    pub(crate) fn read_member(&mut self, receiver: TypeId, name: Name) -> CodegenResult<()> {
        let table = self.table();
        let target = self.member_target(receiver);
        match table.get(target) {
            Type::Array { .. } => {
                let array = self.em.store_temp()?;
                self.em.emit_with_reg(Opcode::Lenarr, array, Some(self.int_type()))
            }
            Type::Dynamic { .. } => {
                let object = self.em.store_temp()?;
                self.em.load_string(table.interner().resolve(name));
                let key = self.em.store_temp()?;
                let js_value = self.cx.js_value_record();
                let method = self.cx.js_runtime_method(
                    "getPropertyJSValue",
                    &[js_value.clone(), self.cx.string_record()],
                    &js_value,
                );
                self.emit_call(Opcode::CallShort, method, &[object, key], Some(target))
            }
            Type::Union { constituents } => {
                let value_ty = constituents
                    .iter()
                    .find_map(|c| {
                        let prop = table.find_property(self.member_target(*c), name, false)?;
                        Some(self.property_read_type(prop))
                    })
                    .ok_or_else(|| CodegenError::internal("union member not found"))?;
                let object = self.em.store_temp()?;
                let op = self.em.width(value_ty).select(Opcode::LdobjName, Opcode::LdobjNameWide, Opcode::LdobjNameObj);
                self.em.emit(op, vec![Operand::Reg(object), Operand::Str(table.interner().resolve(name).to_string())]);
                self.em.set_acc(value_ty);
                Ok(())
            }
            _ => {
                let prop = self.find_property(target, name, false)?;
                let object = self.em.store_temp()?;
                match prop.getter {
                    Some(getter) if prop.flags.contains(PropertyFlags::GETTER) => {
                        let ret = table.signature(self.cx.base_signature(getter)).return_type;
                        self.emit_call(Opcode::CallVirt, self.cx.method_id(getter), &[object], Some(ret))
                    }
                    _ => self.load_field(object, self.cx.field_id(prop), self.cx.declared_field_type(prop)),
                }
            }
        }
    }

    /// Type a read of `prop` produces before instantiation.
    fn property_read_type(&self, prop: &Property) -> TypeId {
        match prop.getter {
            Some(getter) if prop.flags.contains(PropertyFlags::GETTER) => {
                self.table().signature(self.cx.base_signature(getter)).return_type
            }
            _ => self.cx.declared_field_type(prop),
        }
    }

    fn compile_element(&mut self, node: NodeId) -> CodegenResult<()> {
        let NodeKind::Member { object, property, optional, obj_type, .. } = *self.ast().kind(node) else {
            return Err(CodegenError::unreachable("expected an element access"));
        };
        let ty = self.node_type(node)?;
        let receiver = obj_type.ok_or_else(|| CodegenError::internal("element access without a receiver type"))?;
        let table = self.table();
        let mark = self.em.mark();
        self.compile_expr(object)?;
        let nullish = self.begin_optional(optional, object)?;
        self.convert_acc(receiver)?;
        let target = self.member_target(receiver);
        let container = self.em.store_temp()?;
        match table.get(target) {
            Type::Array { element } => {
                self.compile_expr_as(property, self.int_type())?;
                self.load_element(container, *element)?;
            }
            Type::Dynamic { .. } => {
                let key_ty = self.node_type(property)?;
                let js_value = self.cx.js_value_record();
                if matches!(table.get(key_ty), Type::String { .. }) {
                    self.compile_expr(property)?;
                    let key = self.em.store_temp()?;
                    let method = self.cx.js_runtime_method(
                        "getPropertyJSValue",
                        &[js_value.clone(), self.cx.string_record()],
                        &js_value,
                    );
                    self.emit_call(Opcode::CallShort, method, &[container, key], Some(target))?;
                } else {
                    self.compile_expr_as(property, self.int_type())?;
                    let index = self.em.store_temp()?;
                    let method = self.cx.js_runtime_method("getElementJSValue", &[js_value.clone(), "i32".into()], &js_value);
                    self.emit_call(Opcode::CallShort, method, &[container, index], Some(target))?;
                }
            }
            _ if table.global.string_class == Some(target) => {
                self.compile_expr_as(property, self.int_type())?;
                let index = self.em.store_temp()?;
                let char_at = self.builtin_method(Some(target), "charAt", false, |s| s.params.len() == 1)?;
                let ret = table.signature(char_at).return_type;
                self.emit_call(Opcode::CallVirt, self.cx.method_id(char_at), &[container, index], Some(ret))?;
            }
            _ => {
                return Err(CodegenError::internal(format!(
                    "indexing '{}' survived lowering",
                    table.type_to_string(receiver)
                )))
            }
        }
        self.end_optional(nullish, ty)?;
        self.em.release(mark);
        Ok(())
    }

    // ========================================================================
    // Operators
    // ========================================================================

    fn compile_unary(&mut self, op: UnaryOp, argument: NodeId, ty: TypeId) -> CodegenResult<()> {
        let table = self.table();
        if op == UnaryOp::Not {
            self.compile_expr_as(argument, self.boolean_type())?;
            self.em.emit(Opcode::Xori, vec![Operand::Imm(1)]);
            self.em.set_acc(self.boolean_type());
            return Ok(());
        }
        let kind = table
            .primitive_kind(ty)
            .ok_or_else(|| CodegenError::internal("unary operator on a non-primitive"))?;
        let result = table.primitive(kind);
        self.compile_expr_as(argument, result)?;
        let opcode = match (op, kind) {
            (UnaryOp::Minus, PrimitiveKind::Long) => Some(Opcode::NegWide),
            (UnaryOp::Minus, PrimitiveKind::Float) => Some(Opcode::Fneg),
            (UnaryOp::Minus, PrimitiveKind::Double) => Some(Opcode::FnegWide),
            (UnaryOp::Minus, _) => Some(Opcode::Neg),
            (UnaryOp::BitNot, PrimitiveKind::Long) => Some(Opcode::NotWide),
            (UnaryOp::BitNot, _) => Some(Opcode::Not),
            _ => None,
        };
        if let Some(opcode) = opcode {
            self.em.emit(opcode, vec![]);
        }
        self.em.set_acc(result);
        Ok(())
    }

    fn compile_binary(
        &mut self,
        node: NodeId,
        op: BinaryOp,
        left: NodeId,
        right: NodeId,
        operation_type: Option<TypeId>,
        ty: TypeId,
    ) -> CodegenResult<()> {
        match op {
            BinaryOp::LogicalAnd
            | BinaryOp::LogicalOr
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge
            | BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::StrictEq
            | BinaryOp::StrictNotEq => self.materialize_condition(node),
            BinaryOp::Nullish => {
                let operation = operation_type.unwrap_or(ty);
                let (use_right, end) = (self.em.new_label(), self.em.new_label());
                self.compile_expr(left)?;
                self.em.branch(Opcode::JeqzObj, use_right)?;
                self.convert_acc(operation)?;
                self.em.jump(end);
                self.em.set_label(use_right);
                self.compile_expr_as(right, operation)?;
                self.em.set_label(end);
                self.em.set_acc(operation);
                Ok(())
            }
            _ => {
                let operation = operation_type
                    .ok_or_else(|| CodegenError::internal(format!("'{}' without an operation type", op.as_str())))?;
                if matches!(self.table().get(operation), Type::String { .. }) {
                    let mut parts = Vec::new();
                    self.collect_concat(node, &mut parts);
                    return self.compile_concat(&parts);
                }
                let mark = self.em.mark();
                self.compile_expr_as(left, operation)?;
                let lhs = self.em.store_temp()?;
                self.compile_expr_as(right, operation)?;
                self.emit_arithmetic(op, operation, lhs)?;
                self.em.release(mark);
                Ok(())
            }
        }
    }

    /// `acc = lhs <op> acc`, both already converted to `operation`.
    pub(crate) fn emit_arithmetic(&mut self, op: BinaryOp, operation: TypeId, lhs: u16) -> CodegenResult<()> {
        let table = self.table();
        let kind = table
            .primitive_kind(operation)
            .ok_or_else(|| CodegenError::internal("arithmetic on a non-primitive"))?;
        let opcode = arithmetic_opcode(op, kind)
            .ok_or_else(|| CodegenError::internal(format!("no opcode for '{}' on {}", op.as_str(), kind.name())))?;
        self.em.emit_with_reg(opcode, lhs, Some(table.widen(operation)))
    }

    /// Flatten a left-leaning chain of string additions.
    fn collect_concat(&self, node: NodeId, parts: &mut Vec<ConcatPart>) {
        let table = self.table();
        if let NodeKind::Binary { op: BinaryOp::Add, left, right, operation_type: Some(operation) } = *self.ast().kind(node) {
            let folded = self.ast().ts_type(node).is_some_and(|t| table.string_value(t).is_some()) && self.is_pure(node);
            if matches!(table.get(operation), Type::String { .. }) && !folded && self.ast().boxing(node).is_empty() {
                self.collect_concat(left, parts);
                self.collect_concat(right, parts);
                return;
            }
        }
        parts.push(ConcatPart::Node(node));
    }

    /// Concatenate `parts` through a `StringBuilder`.
    pub(crate) fn compile_concat(&mut self, parts: &[ConcatPart]) -> CodegenResult<()> {
        let table = self.table();
        let builder_ty = table.global.string_builder;
        let builder_class = builder_ty.ok_or_else(|| CodegenError::internal("StringBuilder is not declared"))?;
        let ctor = table
            .object(builder_class)
            .and_then(|o| o.constructors.iter().copied().find(|c| table.signature(*c).params.is_empty()))
            .ok_or_else(|| CodegenError::internal("StringBuilder has no default constructor"))?;
        let mark = self.em.mark();
        self.emit_initobj(self.cx.method_id(ctor), &[], builder_class)?;
        let builder = self.em.store_temp()?;
        for part in parts {
            let inner = self.em.mark();
            match *part {
                ConcatPart::Node(node) => self.compile_expr(node)?,
                ConcatPart::Reg(reg) => self.em.load(reg)?,
            }
            let value_ty = self.em.acc_type()?;
            if matches!(table.get(value_ty), Type::Enum(_)) {
                self.enum_to_string(value_ty)?;
            }
            let append = self.select_append(builder_class)?;
            let param = table.signature(append).params[0].ty;
            self.convert_acc(param)?;
            let value = self.em.store_temp()?;
            self.emit_call(Opcode::CallVirt, self.cx.method_id(append), &[builder, value], Some(builder_class))?;
            self.em.release(inner);
        }
        let to_string = self.builtin_method(Some(builder_class), "toString", false, |s| s.params.is_empty())?;
        self.emit_call(Opcode::CallVirt, self.cx.method_id(to_string), &[builder], Some(table.global.string))?;
        self.em.release(mark);
        Ok(())
    }

    /// The `append` overload for the value in the accumulator.
    fn select_append(&self, builder: TypeId) -> CodegenResult<etsc_ast::SignatureId> {
        let table = self.table();
        let value = self.em.acc_type()?;
        let wanted = match table.get(value) {
            Type::Primitive { kind, .. } => match kind {
                PrimitiveKind::Byte | PrimitiveKind::Short => Some(PrimitiveKind::Int),
                other => Some(*other),
            },
            _ => None,
        };
        let is_string = matches!(table.get(value), Type::String { .. });
        let exact = self.builtin_method(Some(builder), "append", false, |s| {
            let Some(param) = s.params.first() else { return false };
            if s.params.len() != 1 {
                return false;
            }
            match wanted {
                Some(kind) => table.primitive_kind(param.ty) == Some(kind),
                None if is_string => matches!(table.get(param.ty), Type::String { .. }),
                None => false,
            }
        });
        match exact {
            Ok(sig) => Ok(sig),
            Err(_) => self.builtin_method(Some(builder), "append", false, |s| {
                s.params.len() == 1 && s.params[0].ty == table.global.object
            }),
        }
    }

    // ========================================================================
    // Casts and literals
    // ========================================================================

    fn compile_as(&mut self, expression: NodeId, target: TypeId) -> CodegenResult<()> {
        self.compile_expr(expression)?;
        let table = self.table();
        let source = self.em.acc_type()?;
        let reference = table.is_reference(source) && table.is_reference(target);
        if !reference || self.is_erased(target) || self.is_known_subtype(source, target) {
            return self.convert_acc(target);
        }
        // Downcast: null passes, anything else must be an instance.
        let mark = self.em.mark();
        let value = self.em.store_temp()?;
        let ok = self.em.new_label();
        self.em.branch(Opcode::JeqzObj, ok)?;
        self.em.emit(Opcode::Isinstance, vec![Operand::Id(self.cx.descriptor(target))]);
        self.em.set_acc(self.boolean_type());
        self.em.branch(Opcode::Jnez, ok)?;
        self.throw_new(table.global.class_cast_exception, &table.type_to_string(target))?;
        self.em.set_label(ok);
        self.em.load(value)?;
        // The verifier does not learn the type from the isinstance branch.
        self.em.emit(Opcode::Checkcast, vec![Operand::Id(self.cx.descriptor(target))]);
        self.em.set_acc(target);
        self.em.release(mark);
        Ok(())
    }

    fn compile_array_literal(&mut self, elements: &[NodeId], array_ty: TypeId) -> CodegenResult<()> {
        let table = self.table();
        let element = table
            .element_type(array_ty)
            .ok_or_else(|| CodegenError::internal("array literal without an array type"))?;
        if let Some(buffer) = self.constant_buffer(elements, element) {
            let id = self.cx.literals.intern(buffer);
            self.em.emit(Opcode::LdaConst, vec![Operand::Literal(id)]);
            self.em.set_acc(array_ty);
            return Ok(());
        }
        let mark = self.em.mark();
        self.em.load_i32(elements.len() as i32, self.int_type());
        let length = self.em.store_temp()?;
        self.new_array(length, array_ty)?;
        let array = self.em.store_temp()?;
        for (i, element_node) in elements.iter().enumerate() {
            let inner = self.em.mark();
            self.em.load_i32(i as i32, self.int_type());
            let index = self.em.store_temp()?;
            self.compile_expr_as(*element_node, element)?;
            self.store_element(array, index)?;
            self.em.release(inner);
        }
        self.em.load(array)?;
        self.em.release(mark);
        Ok(())
    }

    /// A literal buffer for an array of constants of a primitive or string
    /// element type.
    fn constant_buffer(&self, elements: &[NodeId], element: TypeId) -> Option<LiteralBuffer> {
        let table = self.table();
        let kind = table.primitive_kind(element);
        let is_string = matches!(table.get(element), Type::String { .. });
        if elements.is_empty() || (kind.is_none() && !is_string) {
            return None;
        }
        let mut values = Vec::with_capacity(elements.len());
        for node in elements {
            let ty = self.ast().ts_type(*node)?;
            if !self.ast().boxing(*node).is_empty() || !self.is_pure(*node) {
                return None;
            }
            let value = match kind {
                Some(kind) => LiteralValue::from_const(table.constant_value(ty)?.cast(kind)),
                None => LiteralValue::Str(table.string_value(ty)?.to_string()),
            };
            values.push(value);
        }
        Some(LiteralBuffer { element: self.cx.descriptor(element), values })
    }

    /// Materialize a condition as `0` or `1`.
    pub(crate) fn materialize_condition(&mut self, node: NodeId) -> CodegenResult<()> {
        let boolean = self.boolean_type();
        let (falsy, end) = (self.em.new_label(), self.em.new_label());
        self.branch_if(node, false, falsy)?;
        self.em.load_i32(1, boolean);
        self.em.jump(end);
        self.em.set_label(falsy);
        self.em.load_i32(0, boolean);
        self.em.set_label(end);
        self.em.set_acc(boolean);
        Ok(())
    }
}

fn arithmetic_opcode(op: BinaryOp, kind: PrimitiveKind) -> Option<Opcode> {
    use Opcode::*;
    let wide = kind.is_wide();
    let pick = |narrow: Opcode, wide_op: Opcode| Some(if wide { wide_op } else { narrow });
    if kind.is_floating() {
        return match op {
            BinaryOp::Add => pick(Fadd2, Fadd2Wide),
            BinaryOp::Sub => pick(Fsub2, Fsub2Wide),
            BinaryOp::Mul => pick(Fmul2, Fmul2Wide),
            BinaryOp::Div => pick(Fdiv2, Fdiv2Wide),
            BinaryOp::Mod => pick(Fmod2, Fmod2Wide),
            _ => None,
        };
    }
    match op {
        BinaryOp::Add => pick(Add2, Add2Wide),
        BinaryOp::Sub => pick(Sub2, Sub2Wide),
        BinaryOp::Mul => pick(Mul2, Mul2Wide),
        BinaryOp::Div => pick(Div2, Div2Wide),
        BinaryOp::Mod => pick(Mod2, Mod2Wide),
        BinaryOp::Shl => pick(Shl2, Shl2Wide),
        BinaryOp::Shr => pick(Ashr2, Ashr2Wide),
        BinaryOp::UShr => pick(Shr2, Shr2Wide),
        BinaryOp::BitAnd => pick(And2, And2Wide),
        BinaryOp::BitOr => pick(Or2, Or2Wide),
        BinaryOp::BitXor => pick(Xor2, Xor2Wide),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_opcodes() {
        assert_eq!(arithmetic_opcode(BinaryOp::Add, PrimitiveKind::Int), Some(Opcode::Add2));
        assert_eq!(arithmetic_opcode(BinaryOp::Shr, PrimitiveKind::Long), Some(Opcode::Ashr2Wide));
        assert_eq!(arithmetic_opcode(BinaryOp::UShr, PrimitiveKind::Int), Some(Opcode::Shr2));
        assert_eq!(arithmetic_opcode(BinaryOp::Mod, PrimitiveKind::Double), Some(Opcode::Fmod2Wide));
        assert_eq!(arithmetic_opcode(BinaryOp::Shl, PrimitiveKind::Float), None);
        assert_eq!(arithmetic_opcode(BinaryOp::BitAnd, PrimitiveKind::Boolean), Some(Opcode::And2));
    }
}
