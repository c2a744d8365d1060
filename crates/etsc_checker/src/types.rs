//! Type system representation.
//!
//! Types live in the [`TypeTable`](crate::TypeTable) arena and are
//! referenced by [`TypeId`]. A type never changes after construction,
//! except that object shells are filled in while their declaration is
//! resolved and instantiated shells are filled in on first use.

use etsc_ast::{NodeId, SignatureId, TypeId};
use etsc_core::collections::FxIndexMap;
use etsc_core::Name;
use std::fmt;

/// The eight primitive kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 8] = [
        PrimitiveKind::Boolean,
        PrimitiveKind::Byte,
        PrimitiveKind::Char,
        PrimitiveKind::Short,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
        }
    }

    /// Name of the prelude class boxing this kind.
    pub fn boxed_name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Byte => "Byte",
            PrimitiveKind::Char => "Char",
            PrimitiveKind::Short => "Short",
            PrimitiveKind::Int => "Int",
            PrimitiveKind::Long => "Long",
            PrimitiveKind::Float => "Float",
            PrimitiveKind::Double => "Double",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_integral(self) -> bool {
        matches!(self, PrimitiveKind::Byte | PrimitiveKind::Char | PrimitiveKind::Short | PrimitiveKind::Int | PrimitiveKind::Long)
    }

    pub fn is_numeric(self) -> bool {
        self != PrimitiveKind::Boolean
    }

    pub fn is_floating(self) -> bool {
        matches!(self, PrimitiveKind::Float | PrimitiveKind::Double)
    }

    /// Occupies a wide (64-bit) register.
    pub fn is_wide(self) -> bool {
        matches!(self, PrimitiveKind::Long | PrimitiveKind::Double)
    }

    /// Whether a value of `self` converts to `target` by a widening conversion.
    pub fn widens_to(self, target: PrimitiveKind) -> bool {
        use PrimitiveKind::*;
        match self {
            Byte => matches!(target, Short | Int | Long | Float | Double),
            Short | Char => matches!(target, Int | Long | Float | Double),
            Int => matches!(target, Long | Float | Double),
            Long => matches!(target, Float | Double),
            Float => target == Double,
            Double | Boolean => false,
        }
    }

    /// Binary numeric promotion: `int`, `long`, `float`, `double`, whichever
    /// is the first at least as wide as both operands.
    pub fn promote(a: PrimitiveKind, b: PrimitiveKind) -> PrimitiveKind {
        use PrimitiveKind::*;
        let rank = |k: PrimitiveKind| match k {
            Double => 3,
            Float => 2,
            Long => 1,
            _ => 0,
        };
        match rank(a).max(rank(b)) {
            3 => Double,
            2 => Float,
            1 => Long,
            _ => Int,
        }
    }

    /// Unary numeric promotion: sub-int kinds become `int`.
    pub fn promote_unary(self) -> PrimitiveKind {
        match self {
            PrimitiveKind::Byte | PrimitiveKind::Short | PrimitiveKind::Char => PrimitiveKind::Int,
            other => other,
        }
    }
}

/// Value carried by a constant primitive type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl ConstValue {
    pub fn kind(self) -> PrimitiveKind {
        match self {
            ConstValue::Boolean(_) => PrimitiveKind::Boolean,
            ConstValue::Byte(_) => PrimitiveKind::Byte,
            ConstValue::Char(_) => PrimitiveKind::Char,
            ConstValue::Short(_) => PrimitiveKind::Short,
            ConstValue::Int(_) => PrimitiveKind::Int,
            ConstValue::Long(_) => PrimitiveKind::Long,
            ConstValue::Float(_) => PrimitiveKind::Float,
            ConstValue::Double(_) => PrimitiveKind::Double,
        }
    }

    /// The value of an integral constant.
    pub fn as_i64(self) -> Option<i64> {
        match self {
            ConstValue::Byte(v) => Some(v as i64),
            ConstValue::Char(v) => Some(v as i64),
            ConstValue::Short(v) => Some(v as i64),
            ConstValue::Int(v) => Some(v as i64),
            ConstValue::Long(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            ConstValue::Boolean(b) => b as i32 as f64,
            ConstValue::Float(v) => v as f64,
            ConstValue::Double(v) => v,
            other => other.as_i64().unwrap_or(0) as f64,
        }
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            ConstValue::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            ConstValue::Boolean(_) => false,
            ConstValue::Float(v) => v == 0.0,
            ConstValue::Double(v) => v == 0.0,
            other => other.as_i64() == Some(0),
        }
    }

    /// Whether the value is exactly representable in `kind`.
    pub fn fits(self, kind: PrimitiveKind) -> bool {
        if (self.kind() == PrimitiveKind::Boolean) != (kind == PrimitiveKind::Boolean) {
            return false;
        }
        let in_range = |v: i64| match kind {
            PrimitiveKind::Byte => (i8::MIN as i64..=i8::MAX as i64).contains(&v),
            PrimitiveKind::Short => (i16::MIN as i64..=i16::MAX as i64).contains(&v),
            PrimitiveKind::Char => (0..=u16::MAX as i64).contains(&v),
            PrimitiveKind::Int => (i32::MIN as i64..=i32::MAX as i64).contains(&v),
            _ => true,
        };
        match self {
            ConstValue::Boolean(_) => true,
            ConstValue::Float(_) | ConstValue::Double(_) => {
                let v = self.as_f64();
                match kind {
                    PrimitiveKind::Double => true,
                    PrimitiveKind::Float => v.is_nan() || (v as f32) as f64 == v,
                    _ => v.fract() == 0.0 && v >= i64::MIN as f64 && v <= i64::MAX as f64 && in_range(v as i64),
                }
            }
            integral => integral.as_i64().is_some_and(in_range),
        }
    }

    /// Convert to `kind` the way an explicit cast does: integral targets
    /// wrap, floating sources truncate toward zero.
    pub fn cast(self, kind: PrimitiveKind) -> ConstValue {
        if self.kind() == PrimitiveKind::Boolean || kind == PrimitiveKind::Boolean {
            return self;
        }
        match self.as_i64() {
            Some(v) => match kind {
                PrimitiveKind::Byte => ConstValue::Byte(v as i8),
                PrimitiveKind::Char => ConstValue::Char(v as u16),
                PrimitiveKind::Short => ConstValue::Short(v as i16),
                PrimitiveKind::Int => ConstValue::Int(v as i32),
                PrimitiveKind::Long => ConstValue::Long(v),
                PrimitiveKind::Float => ConstValue::Float(v as f32),
                PrimitiveKind::Double => ConstValue::Double(v as f64),
                PrimitiveKind::Boolean => self,
            },
            None => {
                let v = self.as_f64();
                match kind {
                    PrimitiveKind::Byte => ConstValue::Byte(v as i32 as i8),
                    PrimitiveKind::Char => ConstValue::Char(v as i32 as u16),
                    PrimitiveKind::Short => ConstValue::Short(v as i32 as i16),
                    PrimitiveKind::Int => ConstValue::Int(v as i32),
                    PrimitiveKind::Long => ConstValue::Long(v as i64),
                    PrimitiveKind::Float => ConstValue::Float(v as f32),
                    PrimitiveKind::Double => ConstValue::Double(v),
                    PrimitiveKind::Boolean => self,
                }
            }
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Boolean(v) => write!(f, "{}", v),
            ConstValue::Byte(v) => write!(f, "{}", v),
            ConstValue::Char(v) => match char::from_u32(*v as u32) {
                Some(c) => write!(f, "{}", c),
                None => write!(f, "{}", v),
            },
            ConstValue::Short(v) => write!(f, "{}", v),
            ConstValue::Int(v) => write!(f, "{}", v),
            ConstValue::Long(v) => write!(f, "{}", v),
            ConstValue::Float(v) => write!(f, "{}", v),
            ConstValue::Double(v) => write!(f, "{}", v),
        }
    }
}

bitflags::bitflags! {
    /// Category bits, computed once per type and cached by the table.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeFlags: u64 {
        const NONE           = 0;
        const BOOLEAN        = 1 << 0;
        const BYTE           = 1 << 1;
        const CHAR           = 1 << 2;
        const SHORT          = 1 << 3;
        const INT            = 1 << 4;
        const LONG           = 1 << 5;
        const FLOAT          = 1 << 6;
        const DOUBLE         = 1 << 7;
        /// A literal type carrying a value.
        const CONSTANT       = 1 << 8;
        const VOID           = 1 << 9;
        const NULL           = 1 << 10;
        const UNDEFINED      = 1 << 11;
        const NEVER          = 1 << 12;
        const STRING         = 1 << 13;
        const OBJECT         = 1 << 14;
        const ARRAY          = 1 << 15;
        const UNION          = 1 << 16;
        const FUNCTION       = 1 << 17;
        const TYPE_PARAMETER = 1 << 18;
        const NONNULLISH     = 1 << 19;
        const DYNAMIC        = 1 << 20;
        const ENUM           = 1 << 21;
        /// A union with a `null` or `undefined` constituent.
        const NULLISH_UNION  = 1 << 22;
        /// An object type boxing a primitive.
        const BOXED          = 1 << 23;

        const INTEGRAL = Self::BYTE.bits() | Self::CHAR.bits() | Self::SHORT.bits() | Self::INT.bits() | Self::LONG.bits();
        const NUMERIC = Self::INTEGRAL.bits() | Self::FLOAT.bits() | Self::DOUBLE.bits();
        const PRIMITIVE = Self::NUMERIC.bits() | Self::BOOLEAN.bits();
        const WIDE_NUMERIC = Self::LONG.bits() | Self::DOUBLE.bits();
        const NULLISH = Self::NULL.bits() | Self::UNDEFINED.bits();
        const REFERENCE = Self::STRING.bits()
            | Self::OBJECT.bits()
            | Self::ARRAY.bits()
            | Self::UNION.bits()
            | Self::FUNCTION.bits()
            | Self::TYPE_PARAMETER.bits()
            | Self::NONNULLISH.bits()
            | Self::DYNAMIC.bits()
            | Self::NULLISH.bits();
    }
}

impl TypeFlags {
    pub fn for_primitive(kind: PrimitiveKind) -> TypeFlags {
        match kind {
            PrimitiveKind::Boolean => TypeFlags::BOOLEAN,
            PrimitiveKind::Byte => TypeFlags::BYTE,
            PrimitiveKind::Char => TypeFlags::CHAR,
            PrimitiveKind::Short => TypeFlags::SHORT,
            PrimitiveKind::Int => TypeFlags::INT,
            PrimitiveKind::Long => TypeFlags::LONG,
            PrimitiveKind::Float => TypeFlags::FLOAT,
            PrimitiveKind::Double => TypeFlags::DOUBLE,
        }
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ObjectFlags: u32 {
        const NONE             = 0;
        const CLASS            = 1 << 0;
        const INTERFACE        = 1 << 1;
        const ABSTRACT         = 1 << 2;
        const FINAL            = 1 << 3;
        /// Compared with `equals` by `==` (the boxed primitives).
        const VALUE_TYPED      = 1 << 4;
        const LAMBDA_OBJECT    = 1 << 5;
        /// `%%dynamic_call-*` and `%%dynamic_import`.
        const DYNAMIC_GLUE     = 1 << 6;
        const BUILTIN          = 1 << 7;
        /// Super type and interfaces are known.
        const HEADER_RESOLVED  = 1 << 8;
        /// Member tables are complete.
        const MEMBERS_RESOLVED = 1 << 9;
        /// Declared in the prelude program.
        const PRELUDE          = 1 << 10;
        /// Some instance member has a non-trivial initializer; the
        /// constructor runs field initializers first.
        const HAS_FIELD_INITS  = 1 << 11;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PropertyFlags: u32 {
        const NONE      = 0;
        const STATIC    = 1 << 0;
        const READONLY  = 1 << 1;
        const PRIVATE   = 1 << 2;
        const PROTECTED = 1 << 3;
        const METHOD    = 1 << 4;
        const GETTER    = 1 << 5;
        const SETTER    = 1 << 6;
        const ABSTRACT  = 1 << 7;
        const SYNTHETIC = 1 << 8;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SignatureFlags: u32 {
        const NONE             = 0;
        const CONSTRUCTOR      = 1 << 0;
        const STATIC           = 1 << 1;
        const ABSTRACT         = 1 << 2;
        const NATIVE           = 1 << 3;
        const ASYNC            = 1 << 4;
        const GETTER           = 1 << 5;
        const SETTER           = 1 << 6;
        const PRIVATE          = 1 << 7;
        const PROTECTED        = 1 << 8;
        /// The signature of a function type; called through `invoke`.
        const FUNCTIONAL       = 1 << 9;
        /// Static intrinsic of a dynamic-call glue class.
        const DYNAMIC_INTRINSIC = 1 << 10;
        /// Synthesized enum helper; the receiver is the ordinal.
        const ENUM_HELPER      = 1 << 11;
        /// The `%%async-` implementation of an async function.
        const ASYNC_IMPL       = 1 << 12;
        /// Throws instead of returning normally.
        const THROWING         = 1 << 13;
        /// Return type is still being inferred.
        const INFERRING        = 1 << 14;
    }
}

/// One member of an object type.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: Name,
    /// Field type, accessor value type, or function type for methods.
    pub ty: TypeId,
    pub decl: Option<NodeId>,
    /// The object type that declares the member.
    pub owner: TypeId,
    pub flags: PropertyFlags,
    pub getter: Option<SignatureId>,
    pub setter: Option<SignatureId>,
}

impl Property {
    pub fn is_method(&self) -> bool {
        self.flags.contains(PropertyFlags::METHOD)
    }

    pub fn is_accessor(&self) -> bool {
        self.flags.intersects(PropertyFlags::GETTER | PropertyFlags::SETTER)
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(PropertyFlags::STATIC)
    }
}

#[derive(Debug, Clone)]
pub struct ObjectType {
    pub name: Name,
    pub decl: Option<NodeId>,
    pub flags: ObjectFlags,
    /// Own type parameters of a generic declaration.
    pub type_params: Vec<TypeId>,
    /// Arguments of an instantiation; empty for declarations.
    pub type_args: Vec<TypeId>,
    /// The generic declaration an instantiation was made from.
    pub base: Option<TypeId>,
    pub super_type: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
    pub instance_members: FxIndexMap<Name, Property>,
    pub static_members: FxIndexMap<Name, Property>,
    pub constructors: Vec<SignatureId>,
}

impl ObjectType {
    pub fn new(name: Name, decl: Option<NodeId>, flags: ObjectFlags) -> Self {
        Self {
            name,
            decl,
            flags,
            type_params: Vec::new(),
            type_args: Vec::new(),
            base: None,
            super_type: None,
            interfaces: Vec::new(),
            instance_members: FxIndexMap::default(),
            static_members: FxIndexMap::default(),
            constructors: Vec::new(),
        }
    }

    pub fn is_interface(&self) -> bool {
        self.flags.contains(ObjectFlags::INTERFACE)
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }

    pub fn members(&self, is_static: bool) -> &FxIndexMap<Name, Property> {
        if is_static {
            &self.static_members
        } else {
            &self.instance_members
        }
    }
}

/// A constant of an enum.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumMemberInfo {
    pub name: Name,
    pub decl: NodeId,
    pub value: EnumValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnumValue {
    Int(i32),
    Str(String),
}

#[derive(Debug, Clone)]
pub struct EnumType {
    pub name: Name,
    pub decl: NodeId,
    pub is_string: bool,
    pub members: Vec<EnumMemberInfo>,
    /// `getName`, `valueOf`, ... synthesized on first member access.
    pub helpers: Option<FxIndexMap<Name, Property>>,
}

impl EnumType {
    pub fn ordinal_of(&self, name: Name) -> Option<usize> {
        self.members.iter().position(|m| m.name == name)
    }
}

#[derive(Debug, Clone)]
pub enum Type {
    /// A primitive, optionally carrying a constant value.
    Primitive { kind: PrimitiveKind, value: Option<ConstValue> },
    String { value: Option<String> },
    Void,
    Null,
    Undefined,
    Never,
    Object(ObjectType),
    Array { element: TypeId },
    /// Normalized: flat, deduplicated, sorted by id, no primitive members.
    Union { constituents: Vec<TypeId> },
    Function { signatures: Vec<SignatureId> },
    TypeParameter { name: Name, decl: Option<NodeId>, constraint: Option<TypeId> },
    /// `T` with `null` and `undefined` removed, for a type parameter `T`.
    NonNullish { inner: TypeId },
    /// A value of a foreign dynamic runtime.
    Dynamic { language: String },
    Enum(EnumType),
}

/// One parameter of a signature.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureParam {
    pub name: Name,
    pub ty: TypeId,
    pub optional: bool,
    /// Node of the default value, if any.
    pub default: Option<NodeId>,
}

/// One overload of a callable.
#[derive(Debug, Clone)]
pub struct Signature {
    pub name: Name,
    pub params: Vec<SignatureParam>,
    /// The rest parameter; its type is an array type.
    pub rest: Option<SignatureParam>,
    pub return_type: TypeId,
    pub type_params: Vec<TypeId>,
    pub flags: SignatureFlags,
    /// Parameters that must be supplied.
    pub min_arg_count: usize,
    /// Declaring object type; `None` for top-level functions.
    pub owner: Option<TypeId>,
    /// The `ScriptFunction` node, if the signature has one.
    pub decl: Option<NodeId>,
}

impl Signature {
    pub fn new(name: Name, params: Vec<SignatureParam>, return_type: TypeId) -> Self {
        let min_arg_count = params.iter().filter(|p| !p.optional).count();
        Self {
            name,
            params,
            rest: None,
            return_type,
            type_params: Vec::new(),
            flags: SignatureFlags::NONE,
            min_arg_count,
            owner: None,
            decl: None,
        }
    }

    /// Whether `count` arguments can bind to this signature.
    pub fn accepts_arity(&self, count: usize) -> bool {
        count >= self.min_arg_count && (self.rest.is_some() || count <= self.params.len())
    }

    /// Type of the parameter an argument at `index` binds to.
    pub fn param_type_at(&self, index: usize, element_of: impl Fn(TypeId) -> TypeId) -> Option<TypeId> {
        match self.params.get(index) {
            Some(p) => Some(p.ty),
            None => self.rest.as_ref().map(|r| element_of(r.ty)),
        }
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(SignatureFlags::STATIC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widening_table() {
        use PrimitiveKind::*;
        assert!(Byte.widens_to(Short));
        assert!(!Byte.widens_to(Char));
        assert!(Char.widens_to(Int));
        assert!(!Short.widens_to(Char));
        assert!(Long.widens_to(Float));
        assert!(!Double.widens_to(Float));
        assert!(!Boolean.widens_to(Int));
    }

    #[test]
    fn test_promotion() {
        use PrimitiveKind::*;
        assert_eq!(PrimitiveKind::promote(Int, Int), Int);
        assert_eq!(PrimitiveKind::promote(Byte, Short), Int);
        assert_eq!(PrimitiveKind::promote(Int, Long), Long);
        assert_eq!(PrimitiveKind::promote(Long, Float), Float);
        assert_eq!(PrimitiveKind::promote(Float, Double), Double);
    }

    #[test]
    fn test_constant_fits_and_casts() {
        assert!(!ConstValue::Int(200).fits(PrimitiveKind::Byte));
        assert!(ConstValue::Int(127).fits(PrimitiveKind::Byte));
        assert!(ConstValue::Int(65535).fits(PrimitiveKind::Char));
        assert!(!ConstValue::Int(-1).fits(PrimitiveKind::Char));
        assert!(ConstValue::Double(2.0).fits(PrimitiveKind::Int));
        assert!(!ConstValue::Double(2.5).fits(PrimitiveKind::Int));
        assert!(ConstValue::Double(0.5).fits(PrimitiveKind::Float));
        assert_eq!(ConstValue::Int(200).cast(PrimitiveKind::Byte), ConstValue::Byte(-56));
        assert_eq!(ConstValue::Double(3.9).cast(PrimitiveKind::Int), ConstValue::Int(3));
        assert_eq!(ConstValue::Long(1 << 40).cast(PrimitiveKind::Int), ConstValue::Int(0));
    }
}
