//! Operators: operand conversions, result types and constant folding.

use crate::checker::Checker;
use crate::contexts::ResolutionContext;
use crate::error::{CheckResult, CheckerError};
use crate::relation::unbox_flag;
use crate::types::*;
use etsc_ast::*;
use etsc_diagnostics::messages;

impl Checker {
    pub(crate) fn check_binary(
        &mut self,
        node: NodeId,
        op: BinaryOp,
        left: NodeId,
        right: NodeId,
        ctx: &ResolutionContext,
    ) -> CheckResult<TypeId> {
        match op {
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
                let lt = self.check_expr(left, ctx)?;
                self.require_condition(left, lt)?;
                let (when_true, when_false) = self.narrowing_of(left, ctx)?;
                let casts = if op == BinaryOp::LogicalAnd { when_true } else { when_false };
                let rt = self.check_expr(right, &ctx.with_smart_casts(&casts))?;
                self.require_condition(right, rt)?;
                let boolean = self.table.primitive(PrimitiveKind::Boolean);
                self.set_operation_type(node, boolean);
                let folded = match (self.constant_bool(lt), self.constant_bool(rt)) {
                    (Some(a), Some(b)) => Some(if op == BinaryOp::LogicalAnd { a && b } else { a || b }),
                    _ => None,
                };
                Ok(match folded {
                    Some(v) => self.table.constant(ConstValue::Boolean(v)),
                    None => boolean,
                })
            }
            BinaryOp::Nullish => {
                let lt = self.check_expr(left, ctx)?;
                if !self.table.is_reference(lt) {
                    return Err(self.error(left, &messages::LEFT_HAND_SIDE_MUST_BE_REFERENCE, &[]));
                }
                let left_value = self.table.remove_nullish(lt);
                let rt = self.check_expr_expected(right, Some(left_value), ctx)?;
                let rt = self.boxed_operand(right, rt);
                let result = self.table.least_upper_bound(left_value, rt);
                self.set_operation_type(node, result);
                Ok(result)
            }
            _ => {
                let lt = self.check_expr(left, ctx)?;
                let rt = self.check_expr(right, ctx)?;
                self.binary_result(node, op, left, right, lt, rt)
            }
        }
    }

    /// Result type of a non-logical binary operator, shared by binary and
    /// compound assignment expressions. Records the operation type on `node`.
    pub(crate) fn binary_result(
        &mut self,
        node: NodeId,
        op: BinaryOp,
        left: NodeId,
        right: NodeId,
        lt: TypeId,
        rt: TypeId,
    ) -> CheckResult<TypeId> {
        for (side, ty) in [(left, lt), (right, rt)] {
            if matches!(self.table.get(ty), Type::Void) {
                return Err(self.error(side, &messages::VOID_USED_AS_VALUE, &[]));
            }
        }
        if op.is_equality() {
            return self.check_equality(node, op, left, right, lt, rt);
        }
        if op == BinaryOp::Add && (self.is_string(lt) || self.is_string(rt)) {
            return Ok(self.string_concat(node, lt, rt));
        }
        if self.table.union_constituents(lt).is_some() || self.table.union_constituents(rt).is_some() {
            return Err(self.error(node, &messages::BAD_OPERAND_UNIONS_NOT_ALLOWED, &[]));
        }

        if op.is_arithmetic() {
            let (Some(a), Some(b)) = (self.numeric_operand(left, lt), self.numeric_operand(right, rt)) else {
                let message = if op == BinaryOp::Add {
                    &messages::BAD_OPERAND_MUST_BE_NUMERIC_OR_STRING
                } else {
                    &messages::BAD_OPERAND_MUST_BE_NUMERIC
                };
                return Err(self.error(node, message, &[]));
            };
            let kind = PrimitiveKind::promote(a, b);
            let divisor = self.table.constant_value(rt);
            if matches!(op, BinaryOp::Div | BinaryOp::Mod) && kind.is_integral() && divisor.is_some_and(|d| d.is_zero()) {
                return Err(self.error(right, &messages::DIVISION_BY_ZERO, &[]));
            }
            return Ok(self.numeric_result(node, kind, kind, op, lt, rt));
        }

        if op.is_bitwise() && self.is_boolean(lt) && self.is_boolean(rt) {
            let boolean = self.table.primitive(PrimitiveKind::Boolean);
            self.set_operation_type(node, boolean);
            if let (Some(a), Some(b)) = (self.constant_bool(lt), self.constant_bool(rt)) {
                let v = match op {
                    BinaryOp::BitAnd => a & b,
                    BinaryOp::BitOr => a | b,
                    _ => a ^ b,
                };
                return Ok(self.table.constant(ConstValue::Boolean(v)));
            }
            return Ok(boolean);
        }

        if op.is_shift() || op.is_bitwise() {
            let (Some(a), Some(b)) = (self.numeric_operand(left, lt), self.numeric_operand(right, rt)) else {
                return Err(self.error(node, &messages::BAD_OPERAND_MUST_BE_INTEGRAL, &[]));
            };
            let kind = if op.is_shift() { integral_kind(a.promote_unary()) } else { integral_kind(PrimitiveKind::promote(a, b)) };
            return Ok(self.numeric_result(node, kind, kind, op, lt, rt));
        }

        if op.is_relational() {
            let (Some(a), Some(b)) = (self.numeric_operand(left, lt), self.numeric_operand(right, rt)) else {
                return Err(self.error(node, &messages::BAD_OPERAND_MUST_BE_NUMERIC, &[]));
            };
            let kind = PrimitiveKind::promote(a, b);
            return Ok(self.numeric_result(node, kind, PrimitiveKind::Boolean, op, lt, rt));
        }

        Err(CheckerError::internal(format!("unexpected binary operator '{}'", op.as_str())))
    }

    fn check_equality(
        &mut self,
        node: NodeId,
        op: BinaryOp,
        left: NodeId,
        right: NodeId,
        lt: TypeId,
        rt: TypeId,
    ) -> CheckResult<TypeId> {
        let strict = matches!(op, BinaryOp::StrictEq | BinaryOp::StrictNotEq);
        let boolean = self.table.primitive(PrimitiveKind::Boolean);

        let l_enum = matches!(self.table.get(lt), Type::Enum(_));
        let r_enum = matches!(self.table.get(rt), Type::Enum(_));
        if l_enum || r_enum {
            if lt != rt {
                return Err(self.error(node, &messages::BAD_OPERAND_MUST_BE_SAME_ENUM, &[]));
            }
            self.set_operation_type(node, lt);
            return Ok(boolean);
        }

        if self.is_string(lt) && self.is_string(rt) {
            let string = self.table.global.string;
            self.set_operation_type(node, string);
            if let (Some(a), Some(b)) = (self.table.string_value(lt), self.table.string_value(rt)) {
                let equal = a == b;
                return Ok(self.fold_equality(op, equal));
            }
            return Ok(boolean);
        }

        if strict && (!self.table.is_reference(lt) || !self.table.is_reference(rt)) {
            return Err(self.error(node, &messages::BOTH_OPERANDS_MUST_BE_REFERENCES, &[]));
        }

        // At least one primitive side compares by value.
        if self.table.is_primitive(lt) || self.table.is_primitive(rt) {
            let l_kind = self.table.primitive_kind(lt).or_else(|| self.table.unboxed_kind(lt));
            let r_kind = self.table.primitive_kind(rt).or_else(|| self.table.unboxed_kind(rt));
            let (Some(a), Some(b)) = (l_kind, r_kind) else {
                return Err(self.error(node, &messages::BAD_OPERAND_MUST_BE_SAME_TYPE, &[]));
            };
            if (a == PrimitiveKind::Boolean) != (b == PrimitiveKind::Boolean) {
                return Err(self.error(node, &messages::BAD_OPERAND_MUST_BE_SAME_TYPE, &[]));
            }
            self.numeric_operand(left, lt);
            self.numeric_operand(right, rt);
            if a == PrimitiveKind::Boolean {
                self.set_operation_type(node, boolean);
                if let (Some(x), Some(y)) = (self.constant_bool(lt), self.constant_bool(rt)) {
                    return Ok(self.fold_equality(op, x == y));
                }
                return Ok(boolean);
            }
            let kind = PrimitiveKind::promote(a, b);
            return Ok(self.numeric_result(node, kind, PrimitiveKind::Boolean, op, lt, rt));
        }

        let l_nullish = self.is_nullish_literal_type(lt);
        let r_nullish = self.is_nullish_literal_type(rt);
        if strict {
            let compatible = l_nullish
                || r_nullish
                || self.table.is_castable(lt, rt).related
                || self.table.is_castable(rt, lt).related;
            if !compatible {
                return Err(self.error(node, &messages::STRICT_EQUALITY_NOT_COMPATIBLE, &[]));
            }
            let operation = match (l_nullish, r_nullish) {
                (true, _) => lt,
                (_, true) => rt,
                _ => self.table.global.object,
            };
            self.set_operation_type(node, operation);
            return Ok(boolean);
        }

        let operation = if l_nullish || r_nullish {
            self.table.create_union(&[self.table.global.null, self.table.global.undefined])
        } else if matches!(self.table.get(lt), Type::Dynamic { .. }) {
            lt
        } else if matches!(self.table.get(rt), Type::Dynamic { .. }) {
            rt
        } else if self.is_value_typed(lt) {
            lt
        } else if self.is_value_typed(rt) {
            rt
        } else {
            self.table.global.object
        };
        self.set_operation_type(node, operation);
        Ok(boolean)
    }

    pub(crate) fn check_unary(
        &mut self,
        node: NodeId,
        op: UnaryOp,
        argument: NodeId,
        ctx: &ResolutionContext,
    ) -> CheckResult<TypeId> {
        let ty = self.check_expr(argument, ctx)?;
        match op {
            UnaryOp::Not => {
                self.require_condition(argument, ty)?;
                Ok(match self.constant_bool(ty) {
                    Some(v) => self.table.constant(ConstValue::Boolean(!v)),
                    None => self.table.primitive(PrimitiveKind::Boolean),
                })
            }
            UnaryOp::Plus | UnaryOp::Minus => {
                let Some(kind) = self.numeric_operand(argument, ty) else {
                    return Err(self.error(node, &messages::BAD_OPERAND_OPERAND_MUST_BE_NUMERIC, &[]));
                };
                let kind = kind.promote_unary();
                Ok(match self.table.constant_value(ty) {
                    Some(value) => {
                        let value = value.cast(kind);
                        let folded = if op == UnaryOp::Minus { negate(value) } else { value };
                        self.table.constant(folded)
                    }
                    None => self.table.primitive(kind),
                })
            }
            UnaryOp::BitNot => {
                let Some(kind) = self.numeric_operand(argument, ty) else {
                    return Err(self.error(node, &messages::BAD_OPERAND_OPERAND_MUST_BE_INTEGRAL, &[]));
                };
                let kind = kind.promote_unary();
                if !kind.is_integral() {
                    return Err(self.error(node, &messages::BAD_OPERAND_OPERAND_MUST_BE_INTEGRAL, &[]));
                }
                Ok(match self.table.constant_value(ty).and_then(|v| v.cast(kind).as_i64()) {
                    Some(v) => self.table.constant(ConstValue::Long(!v).cast(kind)),
                    None => self.table.primitive(kind),
                })
            }
        }
    }

    pub(crate) fn check_update(&mut self, node: NodeId, argument: NodeId, ctx: &ResolutionContext) -> CheckResult<TypeId> {
        if !matches!(self.ast.kind(argument), NodeKind::Identifier { .. } | NodeKind::Member { .. }) {
            return Err(self.error(node, &messages::INVALID_UPDATE_TARGET, &[]));
        }
        let ty = self.check_assignment_target(argument, ctx)?;
        match self.table.primitive_kind(ty) {
            Some(kind) if kind.is_numeric() => Ok(self.table.widen(ty)),
            _ => Err(self.error(argument, &messages::BAD_OPERAND_OPERAND_MUST_BE_NUMERIC, &[])),
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn set_operation_type(&mut self, node: NodeId, ty: TypeId) {
        match self.ast.kind_mut(node) {
            NodeKind::Binary { operation_type, .. } | NodeKind::Assignment { operation_type, .. } => {
                *operation_type = Some(ty);
            }
            _ => {}
        }
    }

    /// The numeric kind of an operand, unboxing boxed operands. Booleans
    /// are not numeric.
    fn numeric_operand(&mut self, side: NodeId, ty: TypeId) -> Option<PrimitiveKind> {
        if let Some(kind) = self.table.primitive_kind(ty) {
            return kind.is_numeric().then_some(kind);
        }
        let kind = self.table.unboxed_kind(ty)?;
        if !kind.is_numeric() {
            return None;
        }
        self.ast.add_boxing_flags(side, unbox_flag(kind));
        Some(kind)
    }

    /// Box a primitive operand of `??`.
    fn boxed_operand(&mut self, side: NodeId, ty: TypeId) -> TypeId {
        match self.table.primitive_kind(ty) {
            Some(kind) => match self.table.global.boxed(kind) {
                Some(boxed) => {
                    self.ast.add_boxing_flags(side, crate::relation::box_flag(kind));
                    boxed
                }
                None => ty,
            },
            None => ty,
        }
    }

    /// Record `operation` as the operation type and fold constant operands.
    fn numeric_result(
        &mut self,
        node: NodeId,
        operation: PrimitiveKind,
        result: PrimitiveKind,
        op: BinaryOp,
        lt: TypeId,
        rt: TypeId,
    ) -> TypeId {
        let operation_ty = self.table.primitive(operation);
        self.set_operation_type(node, operation_ty);
        let folded = match (self.table.constant_value(lt), self.table.constant_value(rt)) {
            (Some(a), Some(b)) => fold(op, operation, a.cast(operation), b.cast(operation)),
            _ => None,
        };
        match folded {
            Some(value) => self.table.constant(value),
            None => self.table.primitive(result),
        }
    }

    fn string_concat(&mut self, node: NodeId, lt: TypeId, rt: TypeId) -> TypeId {
        let string = self.table.global.string;
        self.set_operation_type(node, string);
        match (self.constant_text(lt), self.constant_text(rt)) {
            (Some(a), Some(b)) => self.table.string_constant(a + &b),
            _ => string,
        }
    }

    fn constant_text(&self, ty: TypeId) -> Option<String> {
        if let Some(s) = self.table.string_value(ty) {
            return Some(s.to_string());
        }
        self.table.constant_value(ty).map(|v| v.to_string())
    }

    fn fold_equality(&mut self, op: BinaryOp, equal: bool) -> TypeId {
        let negated = matches!(op, BinaryOp::NotEq | BinaryOp::StrictNotEq);
        self.table.constant(ConstValue::Boolean(equal != negated))
    }

    fn constant_bool(&self, ty: TypeId) -> Option<bool> {
        self.table.constant_value(ty).and_then(ConstValue::as_bool)
    }

    fn is_string(&self, ty: TypeId) -> bool {
        matches!(self.table.get(ty), Type::String { .. })
    }

    fn is_boolean(&self, ty: TypeId) -> bool {
        self.table.primitive_kind(ty).or_else(|| self.table.unboxed_kind(ty)) == Some(PrimitiveKind::Boolean)
    }

    fn is_nullish_literal_type(&self, ty: TypeId) -> bool {
        matches!(self.table.get(ty), Type::Null | Type::Undefined)
    }

    fn is_value_typed(&self, ty: TypeId) -> bool {
        self.table.object(ty).is_some_and(|o| o.flags.contains(ObjectFlags::VALUE_TYPED))
    }
}

/// Shifts and bitwise operators work on `int` and `long`.
fn integral_kind(kind: PrimitiveKind) -> PrimitiveKind {
    match kind {
        PrimitiveKind::Float => PrimitiveKind::Int,
        PrimitiveKind::Double => PrimitiveKind::Long,
        other => other,
    }
}

fn negate(value: ConstValue) -> ConstValue {
    match value {
        ConstValue::Int(v) => ConstValue::Int(v.wrapping_neg()),
        ConstValue::Long(v) => ConstValue::Long(v.wrapping_neg()),
        ConstValue::Float(v) => ConstValue::Float(-v),
        ConstValue::Double(v) => ConstValue::Double(-v),
        other => other,
    }
}

/// Fold `a op b` where both operands are already converted to `kind`.
/// Integral arithmetic wraps.
fn fold(op: BinaryOp, kind: PrimitiveKind, a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    if kind.is_floating() {
        let (x, y) = (a.as_f64(), b.as_f64());
        let value = match op {
            BinaryOp::Add => x + y,
            BinaryOp::Sub => x - y,
            BinaryOp::Mul => x * y,
            BinaryOp::Div => x / y,
            BinaryOp::Mod => x % y,
            _ => return fold_comparison(op, x.partial_cmp(&y)),
        };
        return Some(ConstValue::Double(value).cast(kind));
    }
    let (x, y) = (a.as_i64()?, b.as_i64()?);
    let value = if kind == PrimitiveKind::Long {
        match op {
            BinaryOp::Add => x.wrapping_add(y),
            BinaryOp::Sub => x.wrapping_sub(y),
            BinaryOp::Mul => x.wrapping_mul(y),
            BinaryOp::Div => x.checked_div(y).unwrap_or(x.wrapping_div(y.max(1))),
            BinaryOp::Mod => x.checked_rem(y).unwrap_or(0),
            BinaryOp::Shl => x.wrapping_shl(y as u32),
            BinaryOp::Shr => x.wrapping_shr(y as u32),
            BinaryOp::UShr => ((x as u64).wrapping_shr(y as u32)) as i64,
            BinaryOp::BitAnd => x & y,
            BinaryOp::BitOr => x | y,
            BinaryOp::BitXor => x ^ y,
            _ => return fold_comparison(op, Some(x.cmp(&y))),
        }
    } else {
        let (x, y) = (x as i32, y as i32);
        let v = match op {
            BinaryOp::Add => x.wrapping_add(y),
            BinaryOp::Sub => x.wrapping_sub(y),
            BinaryOp::Mul => x.wrapping_mul(y),
            BinaryOp::Div => x.checked_div(y).unwrap_or(x.wrapping_div(y.max(1))),
            BinaryOp::Mod => x.checked_rem(y).unwrap_or(0),
            BinaryOp::Shl => x.wrapping_shl(y as u32),
            BinaryOp::Shr => x.wrapping_shr(y as u32),
            BinaryOp::UShr => ((x as u32).wrapping_shr(y as u32)) as i32,
            BinaryOp::BitAnd => x & y,
            BinaryOp::BitOr => x | y,
            BinaryOp::BitXor => x ^ y,
            _ => return fold_comparison(op, Some(x.cmp(&y))),
        };
        v as i64
    };
    Some(ConstValue::Long(value).cast(kind))
}

fn fold_comparison(op: BinaryOp, ordering: Option<std::cmp::Ordering>) -> Option<ConstValue> {
    use std::cmp::Ordering::*;
    // NaN compares false except for `!=`.
    let Some(ordering) = ordering else {
        return Some(ConstValue::Boolean(matches!(op, BinaryOp::NotEq | BinaryOp::StrictNotEq)));
    };
    let value = match op {
        BinaryOp::Lt => ordering == Less,
        BinaryOp::Le => ordering != Greater,
        BinaryOp::Gt => ordering == Greater,
        BinaryOp::Ge => ordering != Less,
        BinaryOp::Eq | BinaryOp::StrictEq => ordering == Equal,
        BinaryOp::NotEq | BinaryOp::StrictNotEq => ordering != Equal,
        _ => return None,
    };
    Some(ConstValue::Boolean(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_wraps_int_arithmetic() {
        let folded = fold(BinaryOp::Add, PrimitiveKind::Int, ConstValue::Int(i32::MAX), ConstValue::Int(1));
        assert_eq!(folded, Some(ConstValue::Int(i32::MIN)));
    }

    #[test]
    fn test_fold_unsigned_shift() {
        let folded = fold(BinaryOp::UShr, PrimitiveKind::Int, ConstValue::Int(-1), ConstValue::Int(28));
        assert_eq!(folded, Some(ConstValue::Int(15)));
    }

    #[test]
    fn test_fold_relational_on_doubles() {
        let folded = fold(BinaryOp::Lt, PrimitiveKind::Double, ConstValue::Double(1.5), ConstValue::Double(2.0));
        assert_eq!(folded, Some(ConstValue::Boolean(true)));
        let nan = fold(BinaryOp::NotEq, PrimitiveKind::Double, ConstValue::Double(f64::NAN), ConstValue::Double(1.0));
        assert_eq!(nan, Some(ConstValue::Boolean(true)));
    }

    #[test]
    fn test_integral_kind_for_shifts() {
        assert_eq!(integral_kind(PrimitiveKind::Double), PrimitiveKind::Long);
        assert_eq!(integral_kind(PrimitiveKind::Short), PrimitiveKind::Short);
    }
}
