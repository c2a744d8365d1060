//! The type arena and factory.
//!
//! Canonical instances of the non-constant primitives and of the other
//! singleton types are created once by [`TypeTable::new`] and held in
//! [`GlobalTypesHolder`]. Unions, arrays and generic instantiations are
//! cached so that identical requests return the same [`TypeId`].

use crate::types::*;
use etsc_ast::{NodeId, SignatureId, TypeId};
use etsc_core::arena::IndexVec;
use etsc_core::collections::{FxHashMap, FxIndexMap};
use etsc_core::{Name, StringInterner};

/// Canonical types of one compilation.
#[derive(Debug, Clone)]
pub struct GlobalTypesHolder {
    pub primitives: [TypeId; 8],
    pub string: TypeId,
    pub void: TypeId,
    pub null: TypeId,
    pub undefined: TypeId,
    pub never: TypeId,
    /// Filled in by the prelude's `Object` declaration.
    pub object: TypeId,
    /// Filled in by the prelude's `Void` declaration.
    pub void_class: TypeId,
    /// The prelude class backing `string` values.
    pub string_class: Option<TypeId>,
    pub boxed: [Option<TypeId>; 8],
    pub exception: Option<TypeId>,
    pub error: Option<TypeId>,
    pub class_cast_exception: Option<TypeId>,
    pub null_pointer_exception: Option<TypeId>,
    pub arithmetic_exception: Option<TypeId>,
    pub string_builder: Option<TypeId>,
    pub promise: Option<TypeId>,
    pub js_value: Option<TypeId>,
    pub js_runtime: Option<TypeId>,
}

impl GlobalTypesHolder {
    pub fn primitive(&self, kind: PrimitiveKind) -> TypeId {
        self.primitives[kind.index()]
    }

    pub fn boxed(&self, kind: PrimitiveKind) -> Option<TypeId> {
        self.boxed[kind.index()]
    }
}

pub struct TypeTable {
    types: IndexVec<TypeId, Type>,
    flags: IndexVec<TypeId, TypeFlags>,
    signatures: IndexVec<SignatureId, Signature>,
    union_cache: FxHashMap<Vec<TypeId>, TypeId>,
    array_cache: FxHashMap<TypeId, TypeId>,
    /// Generic instantiations keyed by declaration and type arguments.
    instantiations: FxHashMap<(TypeId, Vec<TypeId>), TypeId>,
    pub global: GlobalTypesHolder,
    interner: StringInterner,
}

/// Max nesting for type display, guards against self-referential generics.
const MAX_DISPLAY_DEPTH: u32 = 16;

impl TypeTable {
    pub fn new(interner: StringInterner) -> Self {
        let mut types = IndexVec::new();
        let mut flags = IndexVec::new();
        let mut push = |ty: Type, f: TypeFlags| {
            flags.push(f);
            types.push(ty)
        };
        let primitives = PrimitiveKind::ALL
            .map(|kind| push(Type::Primitive { kind, value: None }, TypeFlags::for_primitive(kind)));
        let string = push(Type::String { value: None }, TypeFlags::STRING);
        let void = push(Type::Void, TypeFlags::VOID);
        let null = push(Type::Null, TypeFlags::NULL);
        let undefined = push(Type::Undefined, TypeFlags::UNDEFINED);
        let never = push(Type::Never, TypeFlags::NEVER);
        let object_name = interner.intern("Object");
        let void_name = interner.intern("Void");
        let object = push(
            Type::Object(ObjectType::new(object_name, None, ObjectFlags::CLASS | ObjectFlags::BUILTIN)),
            TypeFlags::OBJECT,
        );
        let void_class = push(
            Type::Object(ObjectType::new(void_name, None, ObjectFlags::CLASS | ObjectFlags::BUILTIN)),
            TypeFlags::OBJECT,
        );
        let global = GlobalTypesHolder {
            primitives,
            string,
            void,
            null,
            undefined,
            never,
            object,
            void_class,
            string_class: None,
            boxed: [None; 8],
            exception: None,
            error: None,
            class_cast_exception: None,
            null_pointer_exception: None,
            arithmetic_exception: None,
            string_builder: None,
            promise: None,
            js_value: None,
            js_runtime: None,
        };
        Self {
            types,
            flags,
            signatures: IndexVec::new(),
            union_cache: FxHashMap::default(),
            array_cache: FxHashMap::default(),
            instantiations: FxHashMap::default(),
            global,
            interner,
        }
    }

    fn alloc(&mut self, ty: Type) -> TypeId {
        let flags = self.compute_flags(&ty);
        self.flags.push(flags);
        self.types.push(ty)
    }

    fn compute_flags(&self, ty: &Type) -> TypeFlags {
        match ty {
            Type::Primitive { kind, value } => {
                let base = TypeFlags::for_primitive(*kind);
                if value.is_some() {
                    base | TypeFlags::CONSTANT
                } else {
                    base
                }
            }
            Type::String { value } => {
                if value.is_some() {
                    TypeFlags::STRING | TypeFlags::CONSTANT
                } else {
                    TypeFlags::STRING
                }
            }
            Type::Void => TypeFlags::VOID,
            Type::Null => TypeFlags::NULL,
            Type::Undefined => TypeFlags::UNDEFINED,
            Type::Never => TypeFlags::NEVER,
            Type::Object(_) => TypeFlags::OBJECT,
            Type::Array { .. } => TypeFlags::ARRAY,
            Type::Union { constituents } => {
                let nullish = constituents.iter().any(|c| self.flags[*c].intersects(TypeFlags::NULLISH));
                if nullish {
                    TypeFlags::UNION | TypeFlags::NULLISH_UNION
                } else {
                    TypeFlags::UNION
                }
            }
            Type::Function { .. } => TypeFlags::FUNCTION,
            Type::TypeParameter { .. } => TypeFlags::TYPE_PARAMETER,
            Type::NonNullish { .. } => TypeFlags::NONNULLISH,
            Type::Dynamic { .. } => TypeFlags::DYNAMIC,
            Type::Enum(_) => TypeFlags::ENUM,
        }
    }

    // ========================================================================
    // Access
    // ========================================================================

    #[inline]
    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id]
    }

    /// Mutable access for filling in shells while their declaration resolves.
    pub fn get_mut(&mut self, id: TypeId) -> &mut Type {
        &mut self.types[id]
    }

    #[inline]
    pub fn flags(&self, id: TypeId) -> TypeFlags {
        self.flags[id]
    }

    pub fn add_flags(&mut self, id: TypeId, flags: TypeFlags) {
        self.flags[id] |= flags;
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn signature(&self, id: SignatureId) -> &Signature {
        &self.signatures[id]
    }

    pub fn signature_mut(&mut self, id: SignatureId) -> &mut Signature {
        &mut self.signatures[id]
    }

    pub fn add_signature(&mut self, signature: Signature) -> SignatureId {
        self.signatures.push(signature)
    }

    pub fn signatures(&self) -> impl Iterator<Item = (SignatureId, &Signature)> {
        self.signatures.iter_enumerated()
    }

    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    pub fn object(&self, id: TypeId) -> Option<&ObjectType> {
        match &self.types[id] {
            Type::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn object_mut(&mut self, id: TypeId) -> Option<&mut ObjectType> {
        match &mut self.types[id] {
            Type::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn enum_type(&self, id: TypeId) -> Option<&EnumType> {
        match &self.types[id] {
            Type::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn enum_type_mut(&mut self, id: TypeId) -> Option<&mut EnumType> {
        match &mut self.types[id] {
            Type::Enum(e) => Some(e),
            _ => None,
        }
    }

    // ========================================================================
    // Factory
    // ========================================================================

    pub fn primitive(&self, kind: PrimitiveKind) -> TypeId {
        self.global.primitive(kind)
    }

    /// A fresh constant type. Two constants with equal values are still
    /// distinct types.
    pub fn constant(&mut self, value: ConstValue) -> TypeId {
        self.alloc(Type::Primitive { kind: value.kind(), value: Some(value) })
    }

    pub fn string_constant(&mut self, value: impl Into<String>) -> TypeId {
        self.alloc(Type::String { value: Some(value.into()) })
    }

    pub fn create_array(&mut self, element: TypeId) -> TypeId {
        if let Some(&id) = self.array_cache.get(&element) {
            return id;
        }
        let id = self.alloc(Type::Array { element });
        self.array_cache.insert(element, id);
        id
    }

    /// Normalized union: nested unions are flattened, primitives are boxed,
    /// literal types are widened, `never` is dropped and the members are
    /// deduplicated and ordered by id. A single remaining member is returned
    /// as is; an empty union is `never`.
    pub fn create_union(&mut self, constituents: &[TypeId]) -> TypeId {
        let mut flat = Vec::with_capacity(constituents.len());
        for &c in constituents {
            match &self.types[c] {
                Type::Union { constituents } => flat.extend(constituents.iter().copied()),
                _ => flat.push(c),
            }
        }
        let mut members: Vec<TypeId> = flat
            .into_iter()
            .map(|c| {
                let widened = self.widen(c);
                match self.types[widened] {
                    Type::Primitive { kind, .. } => self.global.boxed(kind).unwrap_or(widened),
                    _ => widened,
                }
            })
            .filter(|&c| !matches!(self.types[c], Type::Never))
            .collect();
        members.sort();
        members.dedup();
        match members.len() {
            0 => self.global.never,
            1 => members[0],
            _ => {
                if let Some(&id) = self.union_cache.get(&members) {
                    return id;
                }
                let id = self.alloc(Type::Union { constituents: members.clone() });
                self.union_cache.insert(members, id);
                id
            }
        }
    }

    pub fn create_object(&mut self, name: Name, decl: Option<NodeId>, flags: ObjectFlags) -> TypeId {
        self.alloc(Type::Object(ObjectType::new(name, decl, flags)))
    }

    pub fn create_type_parameter(&mut self, name: Name, decl: Option<NodeId>) -> TypeId {
        self.alloc(Type::TypeParameter { name, decl, constraint: None })
    }

    pub fn set_constraint(&mut self, param: TypeId, bound: TypeId) {
        if let Type::TypeParameter { constraint, .. } = &mut self.types[param] {
            *constraint = Some(bound);
        }
    }

    pub fn create_function(&mut self, signatures: Vec<SignatureId>) -> TypeId {
        self.alloc(Type::Function { signatures })
    }

    pub fn create_dynamic(&mut self, language: impl Into<String>) -> TypeId {
        self.alloc(Type::Dynamic { language: language.into() })
    }

    pub fn create_enum(&mut self, name: Name, decl: NodeId, is_string: bool, members: Vec<EnumMemberInfo>) -> TypeId {
        self.alloc(Type::Enum(EnumType { name, decl, is_string, members, helpers: None }))
    }

    /// `ty` with `null` and `undefined` removed.
    pub fn remove_nullish(&mut self, ty: TypeId) -> TypeId {
        match &self.types[ty] {
            Type::Null | Type::Undefined => self.global.never,
            Type::Union { constituents } => {
                let kept: Vec<TypeId> = constituents
                    .iter()
                    .copied()
                    .filter(|c| !self.flags[*c].intersects(TypeFlags::NULLISH))
                    .collect();
                self.create_union(&kept)
            }
            Type::TypeParameter { .. } => self.alloc(Type::NonNullish { inner: ty }),
            _ => ty,
        }
    }

    // ========================================================================
    // Generic instantiation
    // ========================================================================

    /// The instantiation of `generic` with `args`. Identical requests
    /// return the same type. Members are filled in lazily by
    /// [`TypeTable::fill_instantiated_header`] and
    /// [`TypeTable::fill_instantiated_members`].
    pub fn instantiate(&mut self, generic: TypeId, args: &[TypeId]) -> TypeId {
        let (name, decl, flags, params) = match self.object(generic) {
            Some(obj) => (obj.name, obj.decl, obj.flags, obj.type_params.clone()),
            None => return generic,
        };
        if params.as_slice() == args {
            return generic;
        }
        let key = (generic, args.to_vec());
        if let Some(&hit) = self.instantiations.get(&key) {
            tracing::trace!(generic = generic.0, "instantiation cache hit");
            return hit;
        }
        tracing::trace!(generic = generic.0, args = args.len(), "instantiation cache miss");
        let mut shell = ObjectType::new(
            name,
            decl,
            flags - (ObjectFlags::HEADER_RESOLVED | ObjectFlags::MEMBERS_RESOLVED),
        );
        shell.type_args = args.to_vec();
        shell.base = Some(generic);
        let id = self.alloc(Type::Object(shell));
        self.instantiations.insert(key, id);
        id
    }

    /// Substitution map of an instantiation: base parameters to arguments.
    pub fn substitution_of(&self, inst: TypeId) -> FxHashMap<TypeId, TypeId> {
        let mut map = FxHashMap::default();
        if let Some(obj) = self.object(inst) {
            if let Some(base) = obj.base.and_then(|b| self.object(b)) {
                for (param, arg) in base.type_params.iter().zip(&obj.type_args) {
                    map.insert(*param, *arg);
                }
            }
        }
        map
    }

    /// Copy super type and interfaces from the generic base, substituted.
    /// The base header must already be resolved.
    pub fn fill_instantiated_header(&mut self, inst: TypeId) {
        let Some(obj) = self.object(inst) else { return };
        if obj.flags.contains(ObjectFlags::HEADER_RESOLVED) {
            return;
        }
        let Some(base) = obj.base else { return };
        let map = self.substitution_of(inst);
        let (super_type, interfaces) = match self.object(base) {
            Some(b) => (b.super_type, b.interfaces.clone()),
            None => return,
        };
        let super_type = super_type.map(|s| self.substitute(s, &map));
        let interfaces: Vec<TypeId> = interfaces.into_iter().map(|i| self.substitute(i, &map)).collect();
        if let Some(obj) = self.object_mut(inst) {
            obj.super_type = super_type;
            obj.interfaces = interfaces;
            obj.flags |= ObjectFlags::HEADER_RESOLVED;
        }
    }

    /// Copy member tables from the generic base, substituted. The base
    /// members must already be resolved.
    pub fn fill_instantiated_members(&mut self, inst: TypeId) {
        let Some(obj) = self.object(inst) else { return };
        if obj.flags.contains(ObjectFlags::MEMBERS_RESOLVED) {
            return;
        }
        let Some(base) = obj.base else { return };
        let map = self.substitution_of(inst);
        let (instance, statics, ctors, base_flags) = match self.object(base) {
            Some(b) => (b.instance_members.clone(), b.static_members.clone(), b.constructors.clone(), b.flags),
            None => return,
        };
        let instance = self.substitute_members(instance, &map, inst);
        let ctors: Vec<SignatureId> = ctors.into_iter().map(|s| self.substitute_signature(s, &map, Some(inst))).collect();
        if let Some(obj) = self.object_mut(inst) {
            obj.instance_members = instance;
            // Statics cannot mention the class type parameters.
            obj.static_members = statics;
            obj.constructors = ctors;
            obj.flags |= ObjectFlags::MEMBERS_RESOLVED | (base_flags & ObjectFlags::HAS_FIELD_INITS);
        }
    }

    fn substitute_members(
        &mut self,
        members: FxIndexMap<Name, Property>,
        map: &FxHashMap<TypeId, TypeId>,
        owner: TypeId,
    ) -> FxIndexMap<Name, Property> {
        members
            .into_iter()
            .map(|(name, mut prop)| {
                prop.ty = self.substitute(prop.ty, map);
                prop.getter = prop.getter.map(|s| self.substitute_signature(s, map, Some(owner)));
                prop.setter = prop.setter.map(|s| self.substitute_signature(s, map, Some(owner)));
                (name, prop)
            })
            .collect()
    }

    /// Replace type parameters in `ty` according to `map`.
    pub fn substitute(&mut self, ty: TypeId, map: &FxHashMap<TypeId, TypeId>) -> TypeId {
        if map.is_empty() {
            return ty;
        }
        if let Some(&mapped) = map.get(&ty) {
            return mapped;
        }
        match self.types[ty].clone() {
            Type::Array { element } => {
                let e = self.substitute(element, map);
                if e == element {
                    ty
                } else {
                    self.create_array(e)
                }
            }
            Type::Union { constituents } => {
                let subst: Vec<TypeId> = constituents.iter().map(|c| self.substitute(*c, map)).collect();
                if subst == constituents {
                    ty
                } else {
                    self.create_union(&subst)
                }
            }
            Type::Function { signatures } => {
                let subst: Vec<SignatureId> =
                    signatures.iter().map(|s| self.substitute_signature(*s, map, None)).collect();
                if subst == signatures {
                    ty
                } else {
                    self.create_function(subst)
                }
            }
            Type::Object(obj) => {
                if let Some(base) = obj.base {
                    let args: Vec<TypeId> = obj.type_args.iter().map(|a| self.substitute(*a, map)).collect();
                    if args == obj.type_args {
                        ty
                    } else {
                        self.instantiate(base, &args)
                    }
                } else if !obj.type_params.is_empty() && obj.type_params.iter().any(|p| map.contains_key(p)) {
                    let args: Vec<TypeId> = obj.type_params.iter().map(|p| self.substitute(*p, map)).collect();
                    self.instantiate(ty, &args)
                } else {
                    ty
                }
            }
            Type::NonNullish { inner } => {
                let s = self.substitute(inner, map);
                if s == inner {
                    ty
                } else {
                    self.remove_nullish(s)
                }
            }
            _ => ty,
        }
    }

    /// `sig` with `map` applied, or `sig` itself when nothing changes.
    pub fn substitute_signature(
        &mut self,
        sig: SignatureId,
        map: &FxHashMap<TypeId, TypeId>,
        owner: Option<TypeId>,
    ) -> SignatureId {
        let original = self.signatures[sig].clone();
        let mut changed = false;
        let mut subst_param = |table: &mut TypeTable, p: &SignatureParam| {
            let ty = table.substitute(p.ty, map);
            changed |= ty != p.ty;
            SignatureParam { ty, ..p.clone() }
        };
        let params: Vec<SignatureParam> = original.params.iter().map(|p| subst_param(self, p)).collect();
        let rest = original.rest.as_ref().map(|r| subst_param(self, r));
        let return_type = self.substitute(original.return_type, map);
        changed |= return_type != original.return_type;
        let owner_changed = owner.is_some() && owner != original.owner;
        if !changed && !owner_changed {
            return sig;
        }
        let type_params = original.type_params.iter().copied().filter(|p| !map.contains_key(p)).collect();
        self.signatures.push(Signature {
            params,
            rest,
            return_type,
            type_params,
            owner: owner.or(original.owner),
            ..original
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn is_reference(&self, id: TypeId) -> bool {
        self.flags[id].intersects(TypeFlags::REFERENCE)
    }

    pub fn is_primitive(&self, id: TypeId) -> bool {
        self.flags[id].intersects(TypeFlags::PRIMITIVE)
    }

    pub fn is_constant(&self, id: TypeId) -> bool {
        self.flags[id].contains(TypeFlags::CONSTANT)
    }

    /// Whether a value of this type may be `null` or `undefined`.
    pub fn possibly_nullish(&self, id: TypeId) -> bool {
        let flags = self.flags[id];
        if flags.intersects(TypeFlags::NULLISH | TypeFlags::NULLISH_UNION) {
            return true;
        }
        match &self.types[id] {
            Type::TypeParameter { constraint: Some(c), .. } => self.possibly_nullish(*c),
            _ => false,
        }
    }

    pub fn primitive_kind(&self, id: TypeId) -> Option<PrimitiveKind> {
        match &self.types[id] {
            Type::Primitive { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn constant_value(&self, id: TypeId) -> Option<ConstValue> {
        match &self.types[id] {
            Type::Primitive { value, .. } => *value,
            _ => None,
        }
    }

    pub fn string_value(&self, id: TypeId) -> Option<&str> {
        match &self.types[id] {
            Type::String { value } => value.as_deref(),
            _ => None,
        }
    }

    /// The primitive kind a boxed wrapper class holds.
    pub fn unboxed_kind(&self, id: TypeId) -> Option<PrimitiveKind> {
        PrimitiveKind::ALL.into_iter().find(|k| self.global.boxed(*k) == Some(id))
    }

    pub fn element_type(&self, id: TypeId) -> Option<TypeId> {
        match &self.types[id] {
            Type::Array { element } => Some(*element),
            _ => None,
        }
    }

    pub fn union_constituents(&self, id: TypeId) -> Option<&[TypeId]> {
        match &self.types[id] {
            Type::Union { constituents } => Some(constituents),
            _ => None,
        }
    }

    /// The non-constant type a literal type belongs to.
    pub fn widen(&self, id: TypeId) -> TypeId {
        match &self.types[id] {
            Type::Primitive { kind, value: Some(_) } => self.global.primitive(*kind),
            Type::String { value: Some(_) } => self.global.string,
            _ => id,
        }
    }

    /// The declaration type behind an instantiation, or `id` itself.
    pub fn generic_base(&self, id: TypeId) -> TypeId {
        self.object(id).and_then(|o| o.base).unwrap_or(id)
    }

    /// `id` and its ancestor classes, nearest first.
    pub fn superclass_chain(&self, id: TypeId) -> Vec<TypeId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            if chain.contains(&c) {
                break;
            }
            chain.push(c);
            current = self.object(c).and_then(|o| o.super_type);
        }
        chain
    }

    /// Whether `id` is the `Promise` class or an instantiation of it.
    pub fn is_promise(&self, id: TypeId) -> bool {
        self.global.promise.is_some_and(|p| self.generic_base(id) == p)
    }

    // ========================================================================
    // Display
    // ========================================================================

    pub fn type_to_string(&self, id: TypeId) -> String {
        let mut out = String::new();
        self.write_type(id, &mut out, 0);
        out
    }

    fn write_type(&self, id: TypeId, out: &mut String, depth: u32) {
        if depth > MAX_DISPLAY_DEPTH {
            out.push_str("...");
            return;
        }
        match &self.types[id] {
            Type::Primitive { kind, .. } => out.push_str(kind.name()),
            Type::String { .. } => out.push_str("String"),
            Type::Void => out.push_str("void"),
            Type::Null => out.push_str("null"),
            Type::Undefined => out.push_str("undefined"),
            Type::Never => out.push_str("never"),
            Type::Object(obj) => {
                out.push_str(self.interner.resolve(obj.name));
                if !obj.type_args.is_empty() {
                    out.push('<');
                    for (i, arg) in obj.type_args.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        self.write_type(*arg, out, depth + 1);
                    }
                    out.push('>');
                }
            }
            Type::Array { element } => {
                let parens = matches!(self.types[*element], Type::Union { .. } | Type::Function { .. });
                if parens {
                    out.push('(');
                }
                self.write_type(*element, out, depth + 1);
                if parens {
                    out.push(')');
                }
                out.push_str("[]");
            }
            Type::Union { constituents } => {
                // Nullish members print last.
                let (nullish, rest): (Vec<TypeId>, Vec<TypeId>) =
                    constituents.iter().partition(|c| self.flags[**c].intersects(TypeFlags::NULLISH));
                for (i, c) in rest.iter().chain(&nullish).enumerate() {
                    if i > 0 {
                        out.push('|');
                    }
                    self.write_type(*c, out, depth + 1);
                }
            }
            Type::Function { signatures } => match signatures.first() {
                Some(sig) => self.write_signature(*sig, out, depth),
                None => out.push_str("() => void"),
            },
            Type::TypeParameter { name, .. } => out.push_str(self.interner.resolve(*name)),
            Type::NonNullish { inner } => {
                out.push_str("NonNullable<");
                self.write_type(*inner, out, depth + 1);
                out.push('>');
            }
            Type::Dynamic { .. } => out.push_str("JSValue"),
            Type::Enum(e) => out.push_str(self.interner.resolve(e.name)),
        }
    }

    fn write_signature(&self, sig: SignatureId, out: &mut String, depth: u32) {
        let sig = &self.signatures[sig];
        out.push('(');
        let mut first = true;
        for p in sig.params.iter() {
            if !first {
                out.push_str(", ");
            }
            first = false;
            out.push_str(self.interner.resolve(p.name));
            if p.optional {
                out.push('?');
            }
            out.push_str(": ");
            self.write_type(p.ty, out, depth + 1);
        }
        if let Some(rest) = &sig.rest {
            if !first {
                out.push_str(", ");
            }
            out.push_str("...");
            out.push_str(self.interner.resolve(rest.name));
            out.push_str(": ");
            self.write_type(rest.ty, out, depth + 1);
        }
        out.push_str(") => ");
        self.write_type(sig.return_type, out, depth + 1);
    }

    pub fn signature_to_string(&self, sig: SignatureId) -> String {
        let mut out = String::new();
        self.write_signature(sig, &mut out, 0);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TypeTable {
        TypeTable::new(StringInterner::new())
    }

    #[test]
    fn test_primitives_are_canonical() {
        let t = table();
        for kind in PrimitiveKind::ALL {
            assert_eq!(t.primitive(kind), t.primitive(kind));
            assert_eq!(t.primitive_kind(t.primitive(kind)), Some(kind));
            assert!(!t.is_constant(t.primitive(kind)));
        }
    }

    #[test]
    fn test_constants_are_distinct_instances() {
        let mut t = table();
        let a = t.constant(ConstValue::Int(5));
        let b = t.constant(ConstValue::Int(5));
        assert_ne!(a, b);
        assert_eq!(t.constant_value(a), Some(ConstValue::Int(5)));
        assert_eq!(t.constant_value(b), Some(ConstValue::Int(5)));
        assert_eq!(t.widen(a), t.primitive(PrimitiveKind::Int));
        assert!(t.flags(a).contains(TypeFlags::INT | TypeFlags::CONSTANT));
    }

    #[test]
    fn test_union_normalization() {
        let mut t = table();
        let null = t.global.null;
        let undefined = t.global.undefined;
        let obj = t.global.object;
        let u1 = t.create_union(&[obj, null]);
        let u2 = t.create_union(&[null, obj, null]);
        assert_eq!(u1, u2);
        let nested = t.create_union(&[u1, undefined]);
        assert_eq!(t.union_constituents(nested).map(|c| c.len()), Some(3));
        assert_eq!(t.create_union(&[obj]), obj);
        let never = t.global.never;
        assert_eq!(t.create_union(&[]), never);
        assert_eq!(t.create_union(&[never, obj]), obj);
        assert!(t.possibly_nullish(u1));
        assert_eq!(t.type_to_string(nested), "Object|null|undefined");
    }

    #[test]
    fn test_arrays_are_cached() {
        let mut t = table();
        let int = t.primitive(PrimitiveKind::Int);
        let a = t.create_array(int);
        assert_eq!(a, t.create_array(int));
        assert_eq!(t.type_to_string(a), "int[]");
    }

    #[test]
    fn test_instantiation_cache() {
        let mut t = table();
        let name = t.interner().intern("Box");
        let tp_name = t.interner().intern("T");
        let generic = t.create_object(name, None, ObjectFlags::CLASS);
        let param = t.create_type_parameter(tp_name, None);
        if let Some(obj) = t.object_mut(generic) {
            obj.type_params = vec![param];
            obj.flags |= ObjectFlags::HEADER_RESOLVED | ObjectFlags::MEMBERS_RESOLVED;
        }
        let x = t.global.string;
        let y = t.global.object;
        let a = t.instantiate(generic, &[x]);
        let b = t.instantiate(generic, &[x]);
        let c = t.instantiate(generic, &[y]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(t.instantiate(generic, &[param]), generic);
        assert_eq!(t.type_to_string(a), "Box<String>");
    }

    #[test]
    fn test_substitution_through_arrays_and_members() {
        let mut t = table();
        let name = t.interner().intern("Box");
        let tp_name = t.interner().intern("T");
        let field = t.interner().intern("value");
        let generic = t.create_object(name, None, ObjectFlags::CLASS);
        let param = t.create_type_parameter(tp_name, None);
        let param_array = t.create_array(param);
        if let Some(obj) = t.object_mut(generic) {
            obj.type_params = vec![param];
            obj.flags |= ObjectFlags::HEADER_RESOLVED | ObjectFlags::MEMBERS_RESOLVED;
            obj.instance_members.insert(
                field,
                Property {
                    name: field,
                    ty: param_array,
                    decl: None,
                    owner: generic,
                    flags: PropertyFlags::NONE,
                    getter: None,
                    setter: None,
                },
            );
        }
        let int_box = t.global.string;
        let inst = t.instantiate(generic, &[int_box]);
        t.fill_instantiated_header(inst);
        t.fill_instantiated_members(inst);
        let member_ty = t.object(inst).and_then(|o| o.instance_members.get(&field)).map(|p| p.ty);
        let expected = t.create_array(int_box);
        assert_eq!(member_ty, Some(expected));
    }
}
