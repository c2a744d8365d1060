//! Assignment targets, assignments and updates.

use crate::emitter::Reg;
use crate::error::{CodegenError, CodegenResult};
use crate::expr::ConcatPart;
use crate::function::FunctionCompiler;
use crate::instruction::Operand;
use crate::opcode::Opcode;
use etsc_ast::{AssignOp, BinaryOp, NodeId, NodeKind, SignatureId, TypeId, UpdateOp, VariableId};
use etsc_checker::{PrimitiveKind, Property, PropertyFlags, Type};

/// A place that can be read and written. Registers hold the already
/// evaluated receiver and index.
#[derive(Debug, Clone)]
pub(crate) enum Lvalue {
    Variable { var: VariableId, ty: TypeId },
    Static { field: String, ty: TypeId },
    StaticAccessor { getter: Option<SignatureId>, setter: SignatureId, ty: TypeId },
    Field { object: Reg, field: String, ty: TypeId },
    Accessor { object: Reg, getter: Option<SignatureId>, setter: Option<SignatureId>, ty: TypeId },
    Element { array: Reg, index: Reg, ty: TypeId },
    DynamicProperty { object: Reg, key: Reg, ty: TypeId },
    DynamicElement { object: Reg, index: Reg, ty: TypeId },
    /// A member of a union-typed receiver, found by name at run time.
    UnionName { object: Reg, name: String, ty: TypeId },
}

impl Lvalue {
    /// Type of the storage.
    pub fn ty(&self) -> TypeId {
        match self {
            Lvalue::Variable { ty, .. }
            | Lvalue::Static { ty, .. }
            | Lvalue::StaticAccessor { ty, .. }
            | Lvalue::Field { ty, .. }
            | Lvalue::Accessor { ty, .. }
            | Lvalue::Element { ty, .. }
            | Lvalue::DynamicProperty { ty, .. }
            | Lvalue::DynamicElement { ty, .. }
            | Lvalue::UnionName { ty, .. } => *ty,
        }
    }
}

impl<'a> FunctionCompiler<'a> {
    /// Evaluate the receiver and index of `target`.
    pub(crate) fn lvalue(&mut self, target: NodeId) -> CodegenResult<Lvalue> {
        let table = self.table();
        match *self.ast().kind(target) {
            NodeKind::Identifier { variable: Some(var), .. } => Ok(Lvalue::Variable { var, ty: self.variable_type(var)? }),
            NodeKind::Member { computed: false, object, property, obj_type, .. } => {
                let name = self.member_name(property)?;
                if self.is_static_receiver(object) {
                    let class = self.node_type(object)?;
                    let prop = self.find_property(class, name, true)?;
                    return Ok(match accessor_of(prop) {
                        Some((getter, Some(setter))) => {
                            Lvalue::StaticAccessor { getter, setter, ty: self.setter_type(setter, prop) }
                        }
                        _ => Lvalue::Static { field: self.cx.field_id(prop), ty: self.cx.declared_field_type(prop) },
                    });
                }
                let receiver = obj_type.ok_or_else(|| CodegenError::internal("member target without a receiver type"))?;
                self.compile_expr(object)?;
                self.convert_acc(receiver)?;
                let target_ty = self.member_target(receiver);
                let object = self.em.store_temp()?;
                match table.get(target_ty) {
                    Type::Dynamic { .. } => {
                        self.em.load_string(table.interner().resolve(name));
                        let key = self.em.store_temp()?;
                        Ok(Lvalue::DynamicProperty { object, key, ty: target_ty })
                    }
                    Type::Union { constituents } => {
                        let ty = constituents
                            .iter()
                            .find_map(|c| table.find_property(self.member_target(*c), name, false))
                            .map(|p| self.cx.declared_field_type(p))
                            .ok_or_else(|| CodegenError::internal("union member not found"))?;
                        Ok(Lvalue::UnionName { object, name: table.interner().resolve(name).to_string(), ty })
                    }
                    _ => {
                        let prop = self.find_property(target_ty, name, false)?;
                        Ok(match accessor_of(prop) {
                            Some((getter, setter)) => {
                                let ty = match (setter, getter) {
                                    (Some(setter), _) => self.setter_type(setter, prop),
                                    (None, Some(getter)) => table.signature(self.cx.base_signature(getter)).return_type,
                                    (None, None) => prop.ty,
                                };
                                Lvalue::Accessor { object, getter, setter, ty }
                            }
                            None => Lvalue::Field {
                                object,
                                field: self.cx.field_id(prop),
                                ty: self.cx.declared_field_type(prop),
                            },
                        })
                    }
                }
            }
            NodeKind::Member { computed: true, object, property, obj_type, .. } => {
                let receiver = obj_type.ok_or_else(|| CodegenError::internal("element target without a receiver type"))?;
                self.compile_expr(object)?;
                self.convert_acc(receiver)?;
                let target_ty = self.member_target(receiver);
                let container = self.em.store_temp()?;
                match table.get(target_ty) {
                    Type::Array { element } => {
                        self.compile_expr_as(property, self.int_type())?;
                        let index = self.em.store_temp()?;
                        Ok(Lvalue::Element { array: container, index, ty: *element })
                    }
                    Type::Dynamic { .. } => {
                        if matches!(table.get(self.node_type(property)?), Type::String { .. }) {
                            self.compile_expr(property)?;
                            let key = self.em.store_temp()?;
                            Ok(Lvalue::DynamicProperty { object: container, key, ty: target_ty })
                        } else {
                            self.compile_expr_as(property, self.int_type())?;
                            let index = self.em.store_temp()?;
                            Ok(Lvalue::DynamicElement { object: container, index, ty: target_ty })
                        }
                    }
                    _ => Err(CodegenError::internal(format!(
                        "indexed write on '{}' survived lowering",
                        table.type_to_string(receiver)
                    ))),
                }
            }
            _ => Err(CodegenError::unreachable(format!(
                "'{}' is not an assignment target",
                self.ast().kind(target).name()
            ))),
        }
    }

    /// Parameter type of the declared setter.
    fn setter_type(&self, setter: SignatureId, prop: &Property) -> TypeId {
        let base = self.table().signature(self.cx.base_signature(setter));
        base.params.first().map(|p| p.ty).unwrap_or(prop.ty)
    }

    pub(crate) fn load_lvalue(&mut self, lv: &Lvalue) -> CodegenResult<()> {
        let table = self.table();
        match lv {
            Lvalue::Variable { var, .. } => self.load_variable(*var),
            Lvalue::Static { field, ty } => self.load_static(field.clone(), *ty),
            Lvalue::StaticAccessor { getter, ty, .. } => {
                let getter = getter.ok_or_else(|| CodegenError::internal("read of a write-only static property"))?;
                self.emit_call(Opcode::CallShort, self.cx.method_id(getter), &[], Some(*ty))
            }
            Lvalue::Field { object, field, ty } => self.load_field(*object, field.clone(), *ty),
            Lvalue::Accessor { object, getter, .. } => {
                let getter = getter.ok_or_else(|| CodegenError::internal("read of a write-only property"))?;
                let ret = table.signature(self.cx.base_signature(getter)).return_type;
                self.emit_call(Opcode::CallVirt, self.cx.method_id(getter), &[*object], Some(ret))
            }
            Lvalue::Element { array, index, ty } => {
                self.em.load(*index)?;
                self.load_element(*array, *ty)
            }
            Lvalue::DynamicProperty { object, key, ty } => {
                let js_value = self.cx.js_value_record();
                let method =
                    self.cx.js_runtime_method("getPropertyJSValue", &[js_value.clone(), self.cx.string_record()], &js_value);
                self.emit_call(Opcode::CallShort, method, &[*object, *key], Some(*ty))
            }
            Lvalue::DynamicElement { object, index, ty } => {
                let js_value = self.cx.js_value_record();
                let method = self.cx.js_runtime_method("getElementJSValue", &[js_value.clone(), "i32".into()], &js_value);
                self.emit_call(Opcode::CallShort, method, &[*object, *index], Some(*ty))
            }
            Lvalue::UnionName { object, name, ty } => {
                let op = self.em.width(*ty).select(Opcode::LdobjName, Opcode::LdobjNameWide, Opcode::LdobjNameObj);
                self.em.emit(op, vec![Operand::Reg(*object), Operand::Str(name.clone())]);
                self.em.set_acc(*ty);
                Ok(())
            }
        }
    }

    /// Store the accumulator, already of the storage type. The accumulator
    /// keeps the value.
    pub(crate) fn store_lvalue(&mut self, lv: &Lvalue) -> CodegenResult<()> {
        match lv {
            Lvalue::Variable { var, .. } => self.store_variable(*var),
            Lvalue::Static { field, .. } => self.store_static(field.clone()),
            Lvalue::StaticAccessor { setter, .. } => {
                let value = self.em.store_temp()?;
                self.emit_call(Opcode::CallShort, self.cx.method_id(*setter), &[value], None)?;
                self.em.load(value)
            }
            Lvalue::Field { object, field, .. } => self.store_field(*object, field.clone()),
            Lvalue::Accessor { object, setter, .. } => {
                let setter = setter.ok_or_else(|| CodegenError::internal("write to a read-only property"))?;
                let value = self.em.store_temp()?;
                self.emit_call(Opcode::CallVirt, self.cx.method_id(setter), &[*object, value], None)?;
                self.em.load(value)
            }
            Lvalue::Element { array, index, .. } => self.store_element(*array, *index),
            Lvalue::DynamicProperty { object, key, .. } => {
                let value = self.em.store_temp()?;
                let js_value = self.cx.js_value_record();
                let method = self.cx.js_runtime_method(
                    "setPropertyJSValue",
                    &[js_value.clone(), self.cx.string_record(), js_value],
                    "void",
                );
                self.emit_call(Opcode::CallShort, method, &[*object, *key, value], None)?;
                self.em.load(value)
            }
            Lvalue::DynamicElement { object, index, .. } => {
                let value = self.em.store_temp()?;
                let js_value = self.cx.js_value_record();
                let method =
                    self.cx.js_runtime_method("setElementJSValue", &[js_value.clone(), "i32".into(), js_value], "void");
                self.emit_call(Opcode::CallShort, method, &[*object, *index, value], None)?;
                self.em.load(value)
            }
            Lvalue::UnionName { object, name, .. } => {
                let ty = self.em.acc_type()?;
                let op = self.em.width(ty).select(Opcode::StobjName, Opcode::StobjNameWide, Opcode::StobjNameObj);
                self.em.emit(op, vec![Operand::Reg(*object), Operand::Str(name.clone())]);
                Ok(())
            }
        }
    }

    /// Read `target` as an operand: its checked type with the recorded
    /// unboxing applied.
    fn load_target_operand(&mut self, target: NodeId, lv: &Lvalue) -> CodegenResult<()> {
        self.load_lvalue(lv)?;
        let ty = self.node_type(target)?;
        self.convert_acc(ty)?;
        self.apply_boxing(target)
    }

    pub(crate) fn compile_assignment(&mut self, node: NodeId) -> CodegenResult<()> {
        let NodeKind::Assignment { op, target, value, operation_type } = *self.ast().kind(node) else {
            return Err(CodegenError::unreachable("expected an assignment"));
        };
        let mark = self.em.mark();
        let lv = self.lvalue(target)?;
        match op {
            AssignOp::Assign => {
                let target_ty = self.node_type(target)?;
                self.compile_expr_as(value, target_ty)?;
            }
            AssignOp::Compound(bop) => {
                let operation = operation_type
                    .ok_or_else(|| CodegenError::internal("compound assignment without an operation type"))?;
                self.load_target_operand(target, &lv)?;
                if bop == BinaryOp::Add && matches!(self.table().get(operation), Type::String { .. }) {
                    let left = self.em.store_temp()?;
                    self.compile_concat(&[ConcatPart::Reg(left), ConcatPart::Node(value)])?;
                } else {
                    self.convert_acc(operation)?;
                    let lhs = self.em.store_temp()?;
                    self.compile_expr_as(value, operation)?;
                    self.emit_arithmetic(bop, operation, lhs)?;
                }
                self.convert_acc(self.node_type(target)?)?;
            }
        }
        self.convert_acc(lv.ty())?;
        self.store_lvalue(&lv)?;
        self.em.release(mark);
        Ok(())
    }

    pub(crate) fn compile_update(&mut self, node: NodeId) -> CodegenResult<()> {
        let NodeKind::Update { op, prefix, argument } = *self.ast().kind(node) else {
            return Err(CodegenError::unreachable("expected an update expression"));
        };
        let table = self.table();
        let mark = self.em.mark();
        let lv = self.lvalue(argument)?;
        self.load_target_operand(argument, &lv)?;
        let kind = table
            .primitive_kind(self.em.acc_type()?)
            .ok_or_else(|| CodegenError::internal("update of a non-numeric value"))?;
        let operation = table.primitive(kind.promote_unary());
        self.convert_acc(operation)?;
        let old = self.em.store_temp()?;
        match kind.promote_unary() {
            PrimitiveKind::Long => self.em.load_i64(1, operation),
            PrimitiveKind::Float => self.em.load_f32(1.0, operation),
            PrimitiveKind::Double => self.em.load_f64(1.0, operation),
            _ => self.em.load_i32(1, operation),
        }
        let bop = match op {
            UpdateOp::Increment => BinaryOp::Add,
            UpdateOp::Decrement => BinaryOp::Sub,
        };
        self.emit_arithmetic(bop, operation, old)?;
        self.convert_acc(self.node_type(argument)?)?;
        self.convert_acc(lv.ty())?;
        self.store_lvalue(&lv)?;
        if !prefix {
            self.em.load(old)?;
        }
        self.convert_acc(self.node_type(node)?)?;
        self.em.release(mark);
        Ok(())
    }
}

/// Getter and setter of a property accessed through methods.
fn accessor_of(prop: &Property) -> Option<(Option<SignatureId>, Option<SignatureId>)> {
    if prop.flags.intersects(PropertyFlags::GETTER | PropertyFlags::SETTER) {
        Some((prop.getter, prop.setter))
    } else {
        None
    }
}
