//! Representation changes of the accumulator: numeric casts, boxing,
//! reference casts and crossings into and out of dynamic values.

use crate::error::{CodegenError, CodegenResult};
use crate::function::FunctionCompiler;
use crate::instruction::Operand;
use crate::names::primitive_descriptor;
use crate::opcode::Opcode;
use etsc_ast::{NodeId, TypeId};
use etsc_checker::{conversion_of, ObjectFlags, PrimitiveKind, Type};

/// How a value is represented at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repr {
    Primitive(PrimitiveKind),
    Enum,
    Dynamic,
    Reference,
    Void,
    Never,
}

impl<'a> FunctionCompiler<'a> {
    fn repr(&self, ty: TypeId) -> Repr {
        match self.table().get(ty) {
            Type::Primitive { kind, .. } => Repr::Primitive(*kind),
            Type::Enum(_) => Repr::Enum,
            Type::Dynamic { .. } => Repr::Dynamic,
            Type::Void => Repr::Void,
            Type::Never => Repr::Never,
            _ => Repr::Reference,
        }
    }

    /// Convert the accumulator to `target`.
    pub(crate) fn convert_acc(&mut self, target: TypeId) -> CodegenResult<()> {
        let source = self.em.acc_type()?;
        if source == target {
            return Ok(());
        }
        let table = self.table();
        if table.widen(source) == table.widen(target) {
            self.em.set_acc(target);
            return Ok(());
        }
        match (self.repr(source), self.repr(target)) {
            (_, Repr::Void) | (_, Repr::Never) | (Repr::Never, _) => {}
            (Repr::Primitive(from), Repr::Primitive(to)) => self.convert_numeric(from, to),
            (Repr::Enum, Repr::Primitive(to)) => self.convert_numeric(PrimitiveKind::Int, to),
            (Repr::Primitive(from), Repr::Enum) => self.convert_numeric(from, PrimitiveKind::Int),
            (Repr::Enum, Repr::Enum) => {}
            (Repr::Dynamic, Repr::Dynamic) => {}
            (Repr::Primitive(from), Repr::Dynamic) => self.primitive_to_dynamic(from)?,
            (Repr::Enum, Repr::Dynamic) => self.primitive_to_dynamic(PrimitiveKind::Int)?,
            (Repr::Reference, Repr::Dynamic) => self.reference_to_dynamic(source)?,
            (Repr::Dynamic, Repr::Primitive(to)) => self.dynamic_to_primitive(to)?,
            (Repr::Dynamic, Repr::Enum) => self.dynamic_to_primitive(PrimitiveKind::Int)?,
            (Repr::Dynamic, Repr::Reference) => self.dynamic_to_reference(target)?,
            (Repr::Primitive(from), Repr::Reference) => {
                let kind = table.unboxed_kind(target).unwrap_or(from);
                self.convert_numeric(from, kind);
                self.box_acc(kind)?;
                self.cast_reference(target)?;
            }
            (Repr::Enum, Repr::Reference) => {
                self.box_acc(PrimitiveKind::Int)?;
                self.cast_reference(target)?;
            }
            (Repr::Reference, Repr::Primitive(to)) => {
                let kind = table.unboxed_kind(source).unwrap_or(to);
                self.unbox_acc(kind)?;
                self.convert_numeric(kind, to);
            }
            (Repr::Reference, Repr::Enum) => {
                self.unbox_acc(PrimitiveKind::Int)?;
            }
            (Repr::Reference, Repr::Reference) => self.cast_reference(target)?,
            (Repr::Void, _) => {
                return Err(CodegenError::internal(format!(
                    "void value used as '{}' in {}",
                    table.type_to_string(target),
                    self.em.function()
                )))
            }
        }
        self.em.set_acc(target);
        Ok(())
    }

    /// Numeric cast between primitive kinds. Narrow integers share one
    /// 32-bit representation, so only narrowing to a smaller kind needs a
    /// truncation.
    pub(crate) fn convert_numeric(&mut self, from: PrimitiveKind, to: PrimitiveKind) {
        use PrimitiveKind::*;
        if from == to || from == Boolean || to == Boolean {
            return;
        }
        let op = match (from, to) {
            (Long, Float) => Some(Opcode::I64tof32),
            (Long, Double) => Some(Opcode::I64tof64),
            (Long, _) => Some(Opcode::I64toi32),
            (Float, Long) => Some(Opcode::F32toi64),
            (Float, Double) => Some(Opcode::F32tof64),
            (Float, _) => Some(Opcode::F32toi32),
            (Double, Long) => Some(Opcode::F64toi64),
            (Double, Float) => Some(Opcode::F64tof32),
            (Double, _) => Some(Opcode::F64toi32),
            (_, Long) => Some(Opcode::I32toi64),
            (_, Float) => Some(Opcode::I32tof32),
            (_, Double) => Some(Opcode::I32tof64),
            _ => None,
        };
        if let Some(op) = op {
            self.em.emit(op, vec![]);
        }
        // Values now in 32-bit form are truncated to the target range.
        let truncate = match to {
            Byte if from != Byte => Some(Opcode::I32toi8),
            Short if !matches!(from, Byte | Short) => Some(Opcode::I32toi16),
            Char if from != Char => Some(Opcode::I32tou16),
            _ => None,
        };
        if let Some(op) = truncate {
            self.em.emit(op, vec![]);
        }
        self.em.set_acc(self.table().primitive(to));
    }

    /// Wrap the primitive in the accumulator in its boxed class.
    pub(crate) fn box_acc(&mut self, kind: PrimitiveKind) -> CodegenResult<()> {
        let table = self.table();
        let boxed = table
            .global
            .boxed(kind)
            .ok_or_else(|| CodegenError::internal(format!("boxed class '{}' is not declared", kind.boxed_name())))?;
        if let Some(from) = table.primitive_kind(self.em.acc_type()?) {
            self.convert_numeric(from, kind);
        }
        self.emit_call_acc(Opcode::CallAccShort, self.cx.box_method(kind), boxed)
    }

    /// Unwrap the boxed value in the accumulator.
    pub(crate) fn unbox_acc(&mut self, kind: PrimitiveKind) -> CodegenResult<()> {
        let table = self.table();
        let boxed = table
            .global
            .boxed(kind)
            .ok_or_else(|| CodegenError::internal(format!("boxed class '{}' is not declared", kind.boxed_name())))?;
        if self.em.acc_type()? != boxed {
            self.em.emit(Opcode::Checkcast, vec![Operand::Id(self.cx.boxed_record(kind))]);
            self.em.set_acc(boxed);
        }
        self.emit_call_acc(Opcode::CallVirtAccShort, self.cx.unbox_method(kind), table.primitive(kind))
    }

    /// Reinterpret a reference, checking the cast at run time unless the
    /// source is statically known to fit.
    pub(crate) fn cast_reference(&mut self, target: TypeId) -> CodegenResult<()> {
        let source = self.em.acc_type()?;
        if !self.is_erased(target) && !self.is_known_subtype(source, target) {
            self.em.emit(Opcode::Checkcast, vec![Operand::Id(self.cx.descriptor(target))]);
        }
        self.em.set_acc(target);
        Ok(())
    }

    /// Types whose values are represented as plain objects.
    pub(crate) fn is_erased(&self, ty: TypeId) -> bool {
        let table = self.table();
        if ty == table.global.object {
            return true;
        }
        matches!(
            table.get(ty),
            Type::Union { .. }
                | Type::TypeParameter { .. }
                | Type::NonNullish { .. }
                | Type::Null
                | Type::Undefined
                | Type::Never
                | Type::Function { .. }
        )
    }

    /// Whether every value of `sub` is a `sup`, without a run-time check.
    pub(crate) fn is_known_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        let table = self.table();
        if sub == sup || self.is_erased(sup) {
            return true;
        }
        match table.get(sub) {
            Type::Null | Type::Undefined | Type::Never => true,
            Type::Union { constituents } => constituents.iter().all(|c| self.is_known_subtype(*c, sup)),
            Type::String { .. } => {
                matches!(table.get(sup), Type::String { .. }) || table.global.string_class == Some(sup)
            }
            Type::Array { .. } => self.cx.descriptor(sub) == self.cx.descriptor(sup),
            Type::TypeParameter { constraint: Some(c), .. } => self.is_known_subtype(*c, sup),
            Type::NonNullish { inner } => self.is_known_subtype(*inner, sup),
            Type::Object(obj) if obj.flags.contains(ObjectFlags::LAMBDA_OBJECT) => {
                matches!(table.get(sup), Type::Function { .. })
            }
            Type::Object(_) => {
                let target = table.generic_base(sup);
                let mut queue = vec![table.generic_base(sub)];
                let mut seen = Vec::new();
                while let Some(current) = queue.pop() {
                    if current == target {
                        return true;
                    }
                    if seen.contains(&current) {
                        continue;
                    }
                    seen.push(current);
                    if let Some(o) = table.object(current) {
                        queue.extend(o.super_type.map(|s| table.generic_base(s)));
                        queue.extend(o.interfaces.iter().map(|i| table.generic_base(*i)));
                    }
                }
                false
            }
            _ => false,
        }
    }

    // ========================================================================
    // Dynamic values
    // ========================================================================

    fn dynamic_type(&self) -> CodegenResult<TypeId> {
        let table = self.table();
        table.global.js_value.ok_or_else(|| CodegenError::internal("JSValue is not declared"))
    }

    fn primitive_to_dynamic(&mut self, kind: PrimitiveKind) -> CodegenResult<()> {
        let method = self.cx.js_runtime_method(
            &format!("newJSValue{}", kind.boxed_name()),
            &[primitive_descriptor(kind).to_string()],
            &self.cx.js_value_record(),
        );
        let ty = self.dynamic_type()?;
        self.emit_call_acc(Opcode::CallAccShort, method, ty)
    }

    fn reference_to_dynamic(&mut self, source: TypeId) -> CodegenResult<()> {
        let (name, param) = match self.table().get(source) {
            Type::String { .. } => ("newJSValueString", self.cx.string_record()),
            _ => ("newJSValueObject", self.cx.object_record()),
        };
        let method = self.cx.js_runtime_method(name, &[param], &self.cx.js_value_record());
        let ty = self.dynamic_type()?;
        self.emit_call_acc(Opcode::CallAccShort, method, ty)
    }

    fn dynamic_to_primitive(&mut self, kind: PrimitiveKind) -> CodegenResult<()> {
        let method = self.cx.js_runtime_method(
            &format!("getValue{}", kind.boxed_name()),
            &[self.cx.js_value_record()],
            primitive_descriptor(kind),
        );
        self.emit_call_acc(Opcode::CallAccShort, method, self.table().primitive(kind))
    }

    fn dynamic_to_reference(&mut self, target: TypeId) -> CodegenResult<()> {
        let table = self.table();
        if matches!(table.get(target), Type::String { .. }) {
            let method =
                self.cx.js_runtime_method("getValueString", &[self.cx.js_value_record()], &self.cx.string_record());
            return self.emit_call_acc(Opcode::CallAccShort, method, table.global.string);
        }
        let mark = self.em.mark();
        let first = self.em.alloc_range(2);
        self.em.store(first)?;
        self.em.emit(Opcode::LdaType, vec![Operand::Id(self.cx.descriptor(target))]);
        self.em.set_acc(table.global.object);
        self.em.store(first + 1)?;
        let object = self.cx.object_record();
        let method =
            self.cx.js_runtime_method("getValueObject", &[self.cx.js_value_record(), object.clone()], &object);
        self.emit_call(Opcode::CallShort, method, &[first, first + 1], Some(table.global.object))?;
        self.em.release(mark);
        self.cast_reference(target)
    }

    // ========================================================================
    // Checked types
    // ========================================================================

    /// Apply the boxing or unboxing the checker recorded on `node`.
    pub(crate) fn apply_boxing(&mut self, node: NodeId) -> CodegenResult<()> {
        match conversion_of(self.ast().boxing(node)) {
            Some((true, kind)) => self.box_acc(kind),
            Some((false, kind)) => self.unbox_acc(kind),
            None => Ok(()),
        }
    }

    /// Verify that the accumulator holds the checked type of `node`,
    /// adjusting representations that only differ by erasure.
    pub(crate) fn check_acc(&mut self, node: NodeId, expected: TypeId) -> CodegenResult<()> {
        let found = self.em.acc_type().map_err(|_| self.mismatch(node, expected))?;
        if found == expected {
            return Ok(());
        }
        let table = self.table();
        if table.widen(found) == table.widen(expected) {
            self.em.set_acc(expected);
            return Ok(());
        }
        match (self.repr(found), self.repr(expected)) {
            (_, Repr::Never) | (Repr::Never, _) => Ok(()),
            (Repr::Reference, Repr::Reference)
            | (Repr::Dynamic, _)
            | (_, Repr::Dynamic)
            | (Repr::Enum, Repr::Enum) => self.convert_acc(expected),
            (Repr::Primitive(a), Repr::Primitive(b)) if a == b => {
                self.em.set_acc(expected);
                Ok(())
            }
            (Repr::Primitive(_), Repr::Primitive(_)) if table.is_constant(expected) => self.convert_acc(expected),
            _ => Err(self.mismatch(node, expected)),
        }
    }
}
