//! Conditions compiled straight to jumps.

use crate::error::{CodegenError, CodegenResult};
use crate::function::FunctionCompiler;
use crate::instruction::LabelId;
use crate::opcode::Opcode;
use etsc_ast::{BinaryOp, NodeId, NodeKind, TypeId, UnaryOp};
use etsc_checker::{ObjectFlags, PrimitiveKind, Type};

/// How an equality or relational operator compares its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    /// Narrow integers, booleans, chars and enum ordinals.
    Narrow,
    Long,
    Floating(PrimitiveKind),
    String,
    /// `x == null` and friends: a nullish test of the other operand.
    NullishTest,
    Dynamic,
    /// Boxed values compare by `equals`.
    Value,
    Identity,
}

impl<'a> FunctionCompiler<'a> {
    /// Jump to `label` when `node` evaluates to `jump_when`; fall through
    /// otherwise.
    pub(crate) fn branch_if(&mut self, node: NodeId, jump_when: bool, label: LabelId) -> CodegenResult<()> {
        let ast = self.ast();
        let ty = self.node_type(node)?;
        if let Some(value) = self.constant_condition(node, ty) {
            if value == jump_when {
                self.em.jump(label);
            }
            return Ok(());
        }
        match *ast.kind(node) {
            NodeKind::Unary { op: UnaryOp::Not, argument } if ast.boxing(node).is_empty() => {
                self.branch_if(argument, !jump_when, label)
            }
            NodeKind::Binary { op: op @ (BinaryOp::LogicalAnd | BinaryOp::LogicalOr), left, right, .. } => {
                // `a && b` jumps on true only when both hold; on false when
                // either fails. `||` is the mirror image.
                let short_circuits_on = op == BinaryOp::LogicalOr;
                if short_circuits_on == jump_when {
                    self.branch_if(left, jump_when, label)?;
                    self.branch_if(right, jump_when, label)
                } else {
                    let skip = self.em.new_label();
                    self.branch_if(left, short_circuits_on, skip)?;
                    self.branch_if(right, jump_when, label)?;
                    self.em.set_label(skip);
                    Ok(())
                }
            }
            NodeKind::Binary { op, left, right, operation_type: Some(operation) }
                if op.is_equality() || op.is_relational() =>
            {
                self.branch_comparison(op, left, right, operation, jump_when, label)
            }
            _ => {
                self.compile_expr_as(node, self.boolean_type())?;
                let op = if jump_when { Opcode::Jnez } else { Opcode::Jeqz };
                self.em.branch(op, label)
            }
        }
    }

    /// The value of a condition the checker folded, if it has no effects.
    fn constant_condition(&self, node: NodeId, ty: TypeId) -> Option<bool> {
        let table = self.table();
        if !table.is_constant(ty) || !self.is_pure(node) || !self.ast().boxing(node).is_empty() {
            return None;
        }
        table.constant_value(ty).map(|v| !v.is_zero())
    }

    fn comparison_kind(&self, operation: TypeId) -> Comparison {
        let table = self.table();
        match table.get(operation) {
            Type::Primitive { kind: PrimitiveKind::Long, .. } => Comparison::Long,
            Type::Primitive { kind: kind @ (PrimitiveKind::Float | PrimitiveKind::Double), .. } => {
                Comparison::Floating(*kind)
            }
            Type::Primitive { .. } | Type::Enum(_) => Comparison::Narrow,
            Type::String { .. } => Comparison::String,
            Type::Union { constituents }
                if constituents.iter().all(|c| matches!(table.get(*c), Type::Null | Type::Undefined)) =>
            {
                Comparison::NullishTest
            }
            Type::Dynamic { .. } => Comparison::Dynamic,
            Type::Object(obj) if obj.flags.contains(ObjectFlags::VALUE_TYPED) => Comparison::Value,
            _ => Comparison::Identity,
        }
    }

    fn branch_comparison(
        &mut self,
        op: BinaryOp,
        left: NodeId,
        right: NodeId,
        operation: TypeId,
        jump_when: bool,
        label: LabelId,
    ) -> CodegenResult<()> {
        let cond = Cond::of(op)?;
        // Normalize to "jump when `cond` holds".
        let cond = if jump_when { cond } else { cond.negate() };
        let mark = self.em.mark();
        match self.comparison_kind(operation) {
            Comparison::Narrow => {
                self.compile_expr_as(left, operation)?;
                let lhs = self.em.store_temp()?;
                self.compile_expr_as(right, operation)?;
                // The jump tests `acc <op> vA` with acc = right.
                self.em.branch_reg(cond.mirrored_jump(), lhs, label)?;
            }
            Comparison::Long => {
                self.compile_expr_as(left, operation)?;
                let lhs = self.em.store_temp()?;
                self.compile_expr_as(right, operation)?;
                // acc = sign(left - right)
                self.em.emit_with_reg(Opcode::CmpWide, lhs, Some(self.int_type()))?;
                self.em.branch(cond.zero_jump(), label)?;
            }
            Comparison::Floating(kind) => {
                let cmp = if kind == PrimitiveKind::Double { Opcode::FcmplWide } else { Opcode::Fcmpl };
                self.compile_expr_as(left, operation)?;
                let lhs = self.em.store_temp()?;
                self.compile_expr_as(right, operation)?;
                // `fcmpl` yields -1 on NaN, so only tests that fail on -1
                // can be used for ordered relations. `a < b` is checked as
                // `b > a` and a negated relation as the failure of the
                // positive one.
                let (jump, swap) = match cond {
                    Cond::Eq | Cond::Ne | Cond::Gt | Cond::Ge => (cond.zero_jump(), false),
                    Cond::Lt => (Opcode::Jgtz, true),
                    Cond::Le => (Opcode::Jgez, true),
                    Cond::NotGt => (Opcode::Jlez, false),
                    Cond::NotGe => (Opcode::Jltz, false),
                    Cond::NotLt => (Opcode::Jlez, true),
                    Cond::NotLe => (Opcode::Jltz, true),
                };
                if swap {
                    let rhs = self.em.store_temp()?;
                    self.em.load(lhs)?;
                    self.em.emit_with_reg(cmp, rhs, Some(self.int_type()))?;
                } else {
                    self.em.emit_with_reg(cmp, lhs, Some(self.int_type()))?;
                }
                self.em.branch(jump, label)?;
            }
            Comparison::String => {
                let string_class = self.table().global.string_class;
                let equals = self.builtin_method(string_class, "equals", false, |s| s.params.len() == 1)?;
                let param = self.table().signature(equals).params[0].ty;
                self.compile_expr_as(left, operation)?;
                let lhs = self.em.store_temp()?;
                self.compile_expr(right)?;
                self.convert_acc(param)?;
                let rhs = self.em.store_temp()?;
                self.emit_call(Opcode::CallVirt, self.cx.method_id(equals), &[lhs, rhs], Some(self.boolean_type()))?;
                self.em.branch(cond.truth_jump(), label)?;
            }
            Comparison::NullishTest => {
                let table = self.table();
                let lt = self.node_type(left)?;
                let left_literal = matches!(table.get(lt), Type::Null | Type::Undefined);
                let (tested, literal) = if left_literal { (right, left) } else { (left, right) };
                if !self.is_pure(literal) {
                    self.compile_expr(literal)?;
                }
                self.compile_expr(tested)?;
                let jump = if cond == Cond::Eq { Opcode::JeqzObj } else { Opcode::JnezObj };
                self.em.branch(jump, label)?;
            }
            Comparison::Dynamic => {
                let strict = matches!(op, BinaryOp::StrictEq | BinaryOp::StrictNotEq);
                self.compile_expr_as(left, operation)?;
                let lhs = self.em.store_temp()?;
                self.compile_expr_as(right, operation)?;
                let rhs = self.em.store_temp()?;
                let js_value = self.cx.js_value_record();
                let method = self.cx.js_runtime_method(
                    if strict { "strictEqual" } else { "looseEqual" },
                    &[js_value.clone(), js_value],
                    "u1",
                );
                self.emit_call(Opcode::CallShort, method, &[lhs, rhs], Some(self.boolean_type()))?;
                self.em.branch(cond.truth_jump(), label)?;
            }
            Comparison::Value => {
                let object = self.table().global.object;
                let equals = self.builtin_method(Some(object), "equals", false, |s| s.params.len() == 1)?;
                self.compile_expr_as(left, object)?;
                let lhs = self.em.store_temp()?;
                self.compile_expr_as(right, object)?;
                let rhs = self.em.store_temp()?;
                self.emit_call(Opcode::CallVirt, self.cx.method_id(equals), &[lhs, rhs], Some(self.boolean_type()))?;
                self.em.branch(cond.truth_jump(), label)?;
            }
            Comparison::Identity => {
                let object = self.table().global.object;
                self.compile_expr(left)?;
                self.convert_acc_to_reference(object)?;
                let lhs = self.em.store_temp()?;
                self.compile_expr(right)?;
                self.convert_acc_to_reference(object)?;
                let jump = if cond == Cond::Eq { Opcode::JeqObj } else { Opcode::JneObj };
                self.em.branch_reg(jump, lhs, label)?;
            }
        }
        self.em.release(mark);
        Ok(())
    }

    /// Box a primitive accumulator; references stay as they are.
    fn convert_acc_to_reference(&mut self, object: TypeId) -> CodegenResult<()> {
        let acc = self.em.acc_type()?;
        if self.table().is_reference(acc) {
            return Ok(());
        }
        self.convert_acc(object)
    }
}

/// A comparison outcome to jump on. The `Not*` forms are the negations
/// of ordered relations, which differ from the flipped relation once NaN
/// is involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cond {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    NotLt,
    NotLe,
    NotGt,
    NotGe,
}

impl Cond {
    fn of(op: BinaryOp) -> CodegenResult<Cond> {
        Ok(match op {
            BinaryOp::Eq | BinaryOp::StrictEq => Cond::Eq,
            BinaryOp::NotEq | BinaryOp::StrictNotEq => Cond::Ne,
            BinaryOp::Lt => Cond::Lt,
            BinaryOp::Le => Cond::Le,
            BinaryOp::Gt => Cond::Gt,
            BinaryOp::Ge => Cond::Ge,
            other => return Err(CodegenError::internal(format!("'{}' is not a comparison", other.as_str()))),
        })
    }

    fn negate(self) -> Cond {
        match self {
            Cond::Eq => Cond::Ne,
            Cond::Ne => Cond::Eq,
            Cond::Lt => Cond::NotLt,
            Cond::Le => Cond::NotLe,
            Cond::Gt => Cond::NotGt,
            Cond::Ge => Cond::NotGe,
            Cond::NotLt => Cond::Lt,
            Cond::NotLe => Cond::Le,
            Cond::NotGt => Cond::Gt,
            Cond::NotGe => Cond::Ge,
        }
    }

    /// Jump on `acc <op'> vA` implementing `vA <op> acc` for totally
    /// ordered operands.
    fn mirrored_jump(self) -> Opcode {
        match self {
            Cond::Eq => Opcode::Jeq,
            Cond::Ne => Opcode::Jne,
            Cond::Lt | Cond::NotGe => Opcode::Jgt,
            Cond::Le | Cond::NotGt => Opcode::Jge,
            Cond::Gt | Cond::NotLe => Opcode::Jlt,
            Cond::Ge | Cond::NotLt => Opcode::Jle,
        }
    }

    /// Jump on `sign(left - right) <op> 0`.
    fn zero_jump(self) -> Opcode {
        match self {
            Cond::Eq => Opcode::Jeqz,
            Cond::Ne => Opcode::Jnez,
            Cond::Lt | Cond::NotGe => Opcode::Jltz,
            Cond::Le | Cond::NotGt => Opcode::Jlez,
            Cond::Gt | Cond::NotLe => Opcode::Jgtz,
            Cond::Ge | Cond::NotLt => Opcode::Jgez,
        }
    }

    /// Jump on a boolean accumulator that reports equality.
    fn truth_jump(self) -> Opcode {
        match self {
            Cond::Ne => Opcode::Jeqz,
            _ => Opcode::Jnez,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negation_round_trips() {
        for cond in [Cond::Eq, Cond::Lt, Cond::NotGe] {
            assert_eq!(cond.negate().negate(), cond);
        }
    }

    #[test]
    fn test_mirrored_jumps() {
        // `a < b` with acc = b holds when b > a.
        assert_eq!(Cond::Lt.mirrored_jump(), Opcode::Jgt);
        assert_eq!(Cond::NotLt.mirrored_jump(), Opcode::Jle);
        assert_eq!(Cond::Ge.zero_jump(), Opcode::Jgez);
    }
}
