//! Type relations: identity, subtyping, assignability and castability.
//!
//! Assignability and castability report the conversion that made the
//! relation hold, so the checker can annotate the node under test with a
//! boxing or unboxing flag and, for literals, a narrowed constant type.

use crate::type_table::TypeTable;
use crate::types::*;
use etsc_ast::{BoxingUnboxingFlags, TypeId};

bitflags::bitflags! {
    /// Conversions a relation check may use.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeRelationFlags: u32 {
        const NONE                = 0;
        const NO_BOXING           = 1 << 0;
        const NO_UNBOXING         = 1 << 1;
        const NO_WIDENING         = 1 << 2;
        /// Constant literals may narrow to a smaller numeric kind.
        const NARROWING           = 1 << 3;
        /// Explicit `as`: any numeric conversion is allowed.
        const IN_CASTING_CONTEXT  = 1 << 4;
        /// Report failure to the caller instead of raising an error.
        const NO_THROW            = 1 << 5;

        /// First overload resolution pass.
        const STRICT = Self::NO_BOXING.bits() | Self::NO_UNBOXING.bits() | Self::NO_WIDENING.bits();
    }
}

/// Outcome of an assignability or cast check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationResult {
    pub related: bool,
    /// The single conversion the code generator has to emit.
    pub boxing: BoxingUnboxingFlags,
    /// A constant re-materialized at the target kind.
    pub converted: Option<TypeId>,
}

impl RelationResult {
    pub const FALSE: RelationResult = RelationResult { related: false, boxing: BoxingUnboxingFlags::NONE, converted: None };
    pub const TRUE: RelationResult = RelationResult { related: true, boxing: BoxingUnboxingFlags::NONE, converted: None };

    fn boxing(flag: BoxingUnboxingFlags) -> Self {
        RelationResult { related: true, boxing: flag, converted: None }
    }

    fn converted(ty: Option<TypeId>) -> Self {
        RelationResult { related: true, boxing: BoxingUnboxingFlags::NONE, converted: ty }
    }
}

pub fn box_flag(kind: PrimitiveKind) -> BoxingUnboxingFlags {
    match kind {
        PrimitiveKind::Boolean => BoxingUnboxingFlags::BOX_TO_BOOLEAN,
        PrimitiveKind::Byte => BoxingUnboxingFlags::BOX_TO_BYTE,
        PrimitiveKind::Char => BoxingUnboxingFlags::BOX_TO_CHAR,
        PrimitiveKind::Short => BoxingUnboxingFlags::BOX_TO_SHORT,
        PrimitiveKind::Int => BoxingUnboxingFlags::BOX_TO_INT,
        PrimitiveKind::Long => BoxingUnboxingFlags::BOX_TO_LONG,
        PrimitiveKind::Float => BoxingUnboxingFlags::BOX_TO_FLOAT,
        PrimitiveKind::Double => BoxingUnboxingFlags::BOX_TO_DOUBLE,
    }
}

pub fn unbox_flag(kind: PrimitiveKind) -> BoxingUnboxingFlags {
    match kind {
        PrimitiveKind::Boolean => BoxingUnboxingFlags::UNBOX_TO_BOOLEAN,
        PrimitiveKind::Byte => BoxingUnboxingFlags::UNBOX_TO_BYTE,
        PrimitiveKind::Char => BoxingUnboxingFlags::UNBOX_TO_CHAR,
        PrimitiveKind::Short => BoxingUnboxingFlags::UNBOX_TO_SHORT,
        PrimitiveKind::Int => BoxingUnboxingFlags::UNBOX_TO_INT,
        PrimitiveKind::Long => BoxingUnboxingFlags::UNBOX_TO_LONG,
        PrimitiveKind::Float => BoxingUnboxingFlags::UNBOX_TO_FLOAT,
        PrimitiveKind::Double => BoxingUnboxingFlags::UNBOX_TO_DOUBLE,
    }
}

/// The conversion a flag set asks for: `(is_boxing, kind)`.
pub fn conversion_of(flags: BoxingUnboxingFlags) -> Option<(bool, PrimitiveKind)> {
    PrimitiveKind::ALL.into_iter().find_map(|kind| {
        if flags.contains(box_flag(kind)) {
            Some((true, kind))
        } else if flags.contains(unbox_flag(kind)) {
            Some((false, kind))
        } else {
            None
        }
    })
}

impl TypeTable {
    /// Whether the string class and the `string` type denote the same type.
    fn is_string_like(&self, ty: TypeId) -> bool {
        matches!(self.get(ty), Type::String { .. }) || self.global.string_class == Some(ty)
    }

    pub fn is_identical(&mut self, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return true;
        }
        let (wa, wb) = (self.widen(a), self.widen(b));
        if wa == wb {
            return true;
        }
        if self.is_string_like(wa) && self.is_string_like(wb) {
            return true;
        }
        match (self.get(wa).clone(), self.get(wb).clone()) {
            (Type::Array { element: ea }, Type::Array { element: eb }) => self.is_identical(ea, eb),
            (Type::Function { signatures: sa }, Type::Function { signatures: sb }) => {
                match (sa.first(), sb.first()) {
                    (Some(&x), Some(&y)) => self.signatures_identical(x, y),
                    _ => false,
                }
            }
            (Type::Object(oa), Type::Object(ob)) => {
                let (base_a, base_b) = (oa.base.unwrap_or(wa), ob.base.unwrap_or(wb));
                base_a == base_b
                    && oa.type_args.len() == ob.type_args.len()
                    && oa.type_args.iter().zip(&ob.type_args).all(|(x, y)| self.is_identical(*x, *y))
            }
            (Type::Dynamic { language: la }, Type::Dynamic { language: lb }) => la == lb,
            (Type::NonNullish { inner: ia }, Type::NonNullish { inner: ib }) => ia == ib,
            _ => false,
        }
    }

    pub fn signatures_identical(&mut self, a: etsc_ast::SignatureId, b: etsc_ast::SignatureId) -> bool {
        let (sa, sb) = (self.signature(a).clone(), self.signature(b).clone());
        sa.params.len() == sb.params.len()
            && sa.rest.is_some() == sb.rest.is_some()
            && sa.params.iter().zip(&sb.params).all(|(x, y)| self.is_identical(x.ty, y.ty))
            && self.is_identical(sa.return_type, sb.return_type)
    }

    /// Whether the constraint of a type parameter; `Object` when unbounded.
    fn constraint_of(&self, param: TypeId) -> TypeId {
        match self.get(param) {
            Type::TypeParameter { constraint: Some(c), .. } => *c,
            _ => self.global.object,
        }
    }

    /// Reference subtyping without any conversion.
    pub fn is_supertype_of(&mut self, sup: TypeId, sub: TypeId) -> bool {
        if self.is_identical(sup, sub) {
            return true;
        }
        let sub_ty = self.get(sub).clone();
        let sup_ty = self.get(sup).clone();
        if matches!(sub_ty, Type::Never) {
            return true;
        }
        if let Type::Union { constituents } = &sub_ty {
            return constituents.iter().all(|c| self.is_supertype_of(sup, *c));
        }
        if let Type::Union { constituents } = &sup_ty {
            return constituents.iter().any(|c| self.is_supertype_of(*c, sub));
        }
        match &sub_ty {
            Type::TypeParameter { .. } => {
                let constraint = self.constraint_of(sub);
                return constraint != sub && self.is_supertype_of(sup, constraint);
            }
            Type::NonNullish { inner } => {
                let bound = self.constraint_of(*inner);
                let bound = self.remove_nullish(bound);
                return self.is_supertype_of(sup, bound);
            }
            _ => {}
        }
        if sup == self.global.object {
            return !self.flags(sub).intersects(TypeFlags::NULLISH | TypeFlags::PRIMITIVE | TypeFlags::VOID)
                && !matches!(sub_ty, Type::Enum(_));
        }
        match (&sup_ty, &sub_ty) {
            (Type::Object(_), Type::Object(_)) => self.object_extends(sub, sup),
            (Type::Object(_), Type::String { .. }) => {
                self.global.string_class.is_some_and(|sc| sc != sup && self.object_extends(sc, sup))
            }
            (Type::Array { element: sup_e }, Type::Array { element: sub_e }) => {
                let (sup_e, sub_e) = (*sup_e, *sub_e);
                self.is_reference(sup_e) && self.is_reference(sub_e) && self.is_supertype_of(sup_e, sub_e)
            }
            (Type::Function { signatures: sup_s }, Type::Function { signatures: sub_s }) => {
                match (sup_s.first(), sub_s.first()) {
                    (Some(&a), Some(&b)) => self.signature_compatible(a, b),
                    _ => false,
                }
            }
            (Type::Object(_), Type::Function { .. }) => false,
            _ => false,
        }
    }

    /// Whether class or interface `sub` reaches `sup` through its super
    /// types and interfaces.
    pub fn object_extends(&mut self, sub: TypeId, sup: TypeId) -> bool {
        let mut stack = vec![sub];
        let mut seen = Vec::new();
        while let Some(current) = stack.pop() {
            if seen.contains(&current) {
                continue;
            }
            seen.push(current);
            if current != sub && self.is_identical(current, sup) {
                return true;
            }
            self.fill_instantiated_header(current);
            if let Some(obj) = self.object(current) {
                stack.extend(obj.super_type);
                stack.extend(obj.interfaces.iter().copied());
            }
        }
        false
    }

    /// Whether a function of signature `sub` can stand where `sup` is
    /// expected: parameters contravariant, return covariant.
    pub fn signature_compatible(&mut self, sup: etsc_ast::SignatureId, sub: etsc_ast::SignatureId) -> bool {
        let (sup_sig, sub_sig) = (self.signature(sup).clone(), self.signature(sub).clone());
        if sub_sig.min_arg_count > sup_sig.params.len() || sub_sig.params.len() > sup_sig.params.len() {
            return false;
        }
        for (sup_p, sub_p) in sup_sig.params.iter().zip(&sub_sig.params) {
            if !self.is_identical(sup_p.ty, sub_p.ty) && !self.is_supertype_of(sub_p.ty, sup_p.ty) {
                return false;
            }
        }
        let sup_ret = sup_sig.return_type;
        matches!(self.get(sup_ret), Type::Void)
            || self.is_identical(sup_ret, sub_sig.return_type)
            || self.is_supertype_of(sup_ret, sub_sig.return_type)
    }

    /// Assignability of `source` to `target` under `flags`.
    pub fn is_assignable(&mut self, source: TypeId, target: TypeId, flags: TypeRelationFlags) -> RelationResult {
        if matches!(self.get(source), Type::Never) {
            return RelationResult::TRUE;
        }
        let source_kind = self.primitive_kind(source);
        let target_kind = self.primitive_kind(target);

        match (source_kind, target_kind) {
            (Some(sk), Some(tk)) => return self.primitive_assignable(source, sk, tk, flags),
            (Some(sk), None) => {
                if self.is_identical(source, target) {
                    return RelationResult::TRUE;
                }
                if matches!(self.get(target), Type::Dynamic { .. }) {
                    return RelationResult::TRUE;
                }
                if flags.contains(TypeRelationFlags::NO_BOXING) {
                    return RelationResult::FALSE;
                }
                return self.boxing_assignable(source, sk, target, flags);
            }
            (None, Some(tk)) => {
                if matches!(self.get(source), Type::Dynamic { .. }) {
                    return RelationResult::TRUE;
                }
                if flags.contains(TypeRelationFlags::NO_UNBOXING) {
                    return RelationResult::FALSE;
                }
                if let Some(uk) = self.unboxed_kind(source) {
                    let widening_ok = !flags.contains(TypeRelationFlags::NO_WIDENING) && uk.widens_to(tk);
                    let cast_ok = flags.contains(TypeRelationFlags::IN_CASTING_CONTEXT) && uk.is_numeric() && tk.is_numeric();
                    if uk == tk || widening_ok || cast_ok {
                        return RelationResult::boxing(unbox_flag(uk));
                    }
                }
                return RelationResult::FALSE;
            }
            (None, None) => {}
        }

        if self.is_identical(source, target) {
            return RelationResult::TRUE;
        }
        match (self.get(source), self.get(target)) {
            (Type::Enum(_), _) | (_, Type::Enum(_)) => return RelationResult::FALSE,
            (Type::Void, _) | (_, Type::Void) => return RelationResult::FALSE,
            (Type::Dynamic { .. }, _) | (_, Type::Dynamic { .. }) => return RelationResult::TRUE,
            _ => {}
        }
        if self.is_supertype_of(target, source) {
            RelationResult::TRUE
        } else {
            RelationResult::FALSE
        }
    }

    fn primitive_assignable(
        &mut self,
        source: TypeId,
        sk: PrimitiveKind,
        tk: PrimitiveKind,
        flags: TypeRelationFlags,
    ) -> RelationResult {
        let value = self.constant_value(source);
        if sk == tk {
            return RelationResult::TRUE;
        }
        if (sk == PrimitiveKind::Boolean) != (tk == PrimitiveKind::Boolean) {
            return RelationResult::FALSE;
        }
        let rematerialize = |table: &mut TypeTable| value.map(|v| table.constant(v.cast(tk)));
        if flags.contains(TypeRelationFlags::IN_CASTING_CONTEXT) {
            return RelationResult::converted(rematerialize(self));
        }
        if !flags.contains(TypeRelationFlags::NO_WIDENING) && sk.widens_to(tk) {
            return RelationResult::converted(rematerialize(self));
        }
        // A literal narrows when its value is representable in the target.
        if let Some(v) = value {
            if !flags.contains(TypeRelationFlags::NO_WIDENING) && v.fits(tk) {
                return RelationResult::converted(rematerialize(self));
            }
        }
        RelationResult::FALSE
    }

    fn boxing_assignable(
        &mut self,
        source: TypeId,
        sk: PrimitiveKind,
        target: TypeId,
        flags: TypeRelationFlags,
    ) -> RelationResult {
        let value = self.constant_value(source);
        let mut kinds = vec![sk];
        if !flags.contains(TypeRelationFlags::NO_WIDENING) {
            kinds.extend(PrimitiveKind::ALL.into_iter().filter(|k| sk.widens_to(*k)));
            if let Some(v) = value {
                kinds.extend(PrimitiveKind::ALL.into_iter().filter(|k| *k != sk && !sk.widens_to(*k) && v.fits(*k)));
            }
        }
        for kind in kinds {
            let Some(boxed) = self.global.boxed(kind) else { continue };
            if self.is_supertype_of(target, boxed) {
                let converted = match value {
                    Some(v) if kind != sk => Some(self.constant(v.cast(kind))),
                    _ => None,
                };
                return RelationResult { related: true, boxing: box_flag(kind), converted };
            }
        }
        RelationResult::FALSE
    }

    /// Whether an explicit `source as target` is allowed.
    pub fn is_castable(&mut self, source: TypeId, target: TypeId) -> RelationResult {
        let assignable = self.is_assignable(
            source,
            target,
            TypeRelationFlags::IN_CASTING_CONTEXT | TypeRelationFlags::NARROWING,
        );
        if assignable.related {
            return assignable;
        }
        match (self.primitive_kind(source), self.primitive_kind(target)) {
            (Some(_), Some(_)) => RelationResult::FALSE,
            (None, Some(tk)) => {
                // Checked downcast to the wrapper, then unboxing.
                match self.global.boxed(tk) {
                    Some(boxed) if self.is_supertype_of(source, boxed) => RelationResult::TRUE,
                    _ => RelationResult::FALSE,
                }
            }
            (Some(_), None) => RelationResult::FALSE,
            (None, None) => {
                if self.is_reference_castable(source, target) {
                    RelationResult::TRUE
                } else {
                    RelationResult::FALSE
                }
            }
        }
    }

    fn is_reference_castable(&mut self, source: TypeId, target: TypeId) -> bool {
        if !self.is_reference(source) || !self.is_reference(target) {
            return false;
        }
        if self.is_supertype_of(source, target) || self.is_supertype_of(target, source) {
            return true;
        }
        let is_open = |table: &TypeTable, t: TypeId| match table.get(t) {
            Type::Object(o) => o.is_interface() || !o.flags.contains(ObjectFlags::FINAL),
            Type::Union { .. } | Type::TypeParameter { .. } | Type::NonNullish { .. } => true,
            _ => false,
        };
        let interface = |table: &TypeTable, t: TypeId| table.object(t).is_some_and(|o| o.is_interface());
        if let Some(members) = self.union_constituents(source).map(|m| m.to_vec()) {
            return members.iter().any(|m| self.is_reference_castable(*m, target));
        }
        (interface(self, source) && is_open(self, target)) || (interface(self, target) && is_open(self, source))
            || matches!(self.get(target), Type::TypeParameter { .. })
            || matches!(self.get(source), Type::TypeParameter { .. })
    }

    /// Least upper bound, used for `?:` and `??` results.
    pub fn least_upper_bound(&mut self, a: TypeId, b: TypeId) -> TypeId {
        if self.is_identical(a, b) {
            return self.widen(a);
        }
        match (self.primitive_kind(a), self.primitive_kind(b)) {
            (Some(ka), Some(kb)) if ka.is_numeric() && kb.is_numeric() => {
                return self.primitive(PrimitiveKind::promote(ka, kb));
            }
            _ => {}
        }
        let (wa, wb) = (self.widen(a), self.widen(b));
        if self.is_reference(wa) && self.is_reference(wb) {
            if self.is_supertype_of(wa, wb) {
                return wa;
            }
            if self.is_supertype_of(wb, wa) {
                return wb;
            }
        }
        self.create_union(&[wa, wb])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etsc_core::StringInterner;

    fn table_with_boxes() -> TypeTable {
        let mut t = TypeTable::new(StringInterner::new());
        for kind in PrimitiveKind::ALL {
            let name = t.interner().intern(kind.boxed_name());
            let boxed = t.create_object(name, None, ObjectFlags::CLASS | ObjectFlags::FINAL);
            let object = t.global.object;
            if let Some(obj) = t.object_mut(boxed) {
                obj.super_type = Some(object);
                obj.flags |= ObjectFlags::HEADER_RESOLVED;
            }
            t.global.boxed[kind.index()] = Some(boxed);
        }
        t
    }

    #[test]
    fn test_constant_narrowing_respects_range() {
        let mut t = table_with_boxes();
        let byte = t.primitive(PrimitiveKind::Byte);
        let big = t.constant(ConstValue::Int(200));
        assert!(!t.is_assignable(big, byte, TypeRelationFlags::NONE).related);

        let cast = t.is_castable(big, byte);
        assert!(cast.related);
        let converted = cast.converted.unwrap();
        assert_eq!(t.constant_value(converted), Some(ConstValue::Byte(-56)));

        let small = t.constant(ConstValue::Int(30));
        let result = t.is_assignable(small, byte, TypeRelationFlags::NONE);
        assert!(result.related);
        assert_eq!(t.constant_value(result.converted.unwrap()), Some(ConstValue::Byte(30)));
    }

    #[test]
    fn test_non_constant_narrowing_needs_cast() {
        let mut t = table_with_boxes();
        let int = t.primitive(PrimitiveKind::Int);
        let short = t.primitive(PrimitiveKind::Short);
        assert!(!t.is_assignable(int, short, TypeRelationFlags::NONE).related);
        assert!(t.is_castable(int, short).related);
        assert!(t.is_assignable(short, int, TypeRelationFlags::NONE).related);
        assert!(!t.is_assignable(short, int, TypeRelationFlags::NO_WIDENING).related);
    }

    #[test]
    fn test_boxing_and_unboxing_flags() {
        let mut t = table_with_boxes();
        let int = t.primitive(PrimitiveKind::Int);
        let boxed_int = t.global.boxed(PrimitiveKind::Int).unwrap();
        let object = t.global.object;

        let boxing = t.is_assignable(int, object, TypeRelationFlags::NONE);
        assert_eq!(boxing.boxing, BoxingUnboxingFlags::BOX_TO_INT);
        assert!(!t.is_assignable(int, object, TypeRelationFlags::NO_BOXING).related);

        let unboxing = t.is_assignable(boxed_int, int, TypeRelationFlags::NONE);
        assert_eq!(unboxing.boxing, BoxingUnboxingFlags::UNBOX_TO_INT);
        assert!(!unboxing.boxing.is_boxing());
        assert_eq!(conversion_of(unboxing.boxing), Some((false, PrimitiveKind::Int)));
    }

    #[test]
    fn test_nullish_references() {
        let mut t = table_with_boxes();
        let object = t.global.object;
        let null = t.global.null;
        let nullable = t.create_union(&[object, null]);
        assert!(!t.is_assignable(null, object, TypeRelationFlags::NONE).related);
        assert!(t.is_assignable(null, nullable, TypeRelationFlags::NONE).related);
        assert!(!t.is_assignable(nullable, object, TypeRelationFlags::NONE).related);
        assert!(t.is_castable(nullable, object).related);
    }

    #[test]
    fn test_least_upper_bound() {
        let mut t = table_with_boxes();
        let int = t.primitive(PrimitiveKind::Int);
        let double = t.primitive(PrimitiveKind::Double);
        assert_eq!(t.least_upper_bound(int, double), double);
        let string = t.global.string;
        let null = t.global.null;
        let lub = t.least_upper_bound(string, null);
        assert_eq!(t.type_to_string(lub), "String|null");
    }
}
