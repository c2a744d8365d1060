//! Node kinds and operators.

use crate::flags::{BoxingUnboxingFlags, ModifierFlags, ScriptFunctionFlags};
use crate::{FileId, NodeId, SignatureId, TypeId, VariableId};
use etsc_core::intern::Name;
use etsc_core::text::TextSpan;

/// One node of the tree.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: TextSpan,
    pub parent: Option<NodeId>,
    /// Checked type. Written once by the checker, read by lowering and codegen.
    pub ts_type: Option<TypeId>,
    pub boxing: BoxingUnboxingFlags,
}

impl Node {
    pub fn new(kind: NodeKind, span: TextSpan) -> Self {
        Self { kind, span, parent: None, ts_type: None, boxing: BoxingUnboxingFlags::NONE }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    /// The built-in `std/core` program.
    Prelude,
    /// A program reached through an import.
    External,
    /// The program being compiled.
    Main,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    Let,
    Const,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Method,
    Constructor,
    Get,
    Set,
}

/// A numeric literal as written in the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

/// Primitive type keywords usable in type annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKeyword {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// `number`, an alias of `double`.
    Number,
    /// `string`, an alias of `String`.
    String,
    Void,
    Never,
    Null,
    Undefined,
}

impl TypeKeyword {
    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "boolean" => TypeKeyword::Boolean,
            "byte" => TypeKeyword::Byte,
            "char" => TypeKeyword::Char,
            "short" => TypeKeyword::Short,
            "int" => TypeKeyword::Int,
            "long" => TypeKeyword::Long,
            "float" => TypeKeyword::Float,
            "double" => TypeKeyword::Double,
            "number" => TypeKeyword::Number,
            "string" => TypeKeyword::String,
            "void" => TypeKeyword::Void,
            "never" => TypeKeyword::Never,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TypeKeyword::Boolean => "boolean",
            TypeKeyword::Byte => "byte",
            TypeKeyword::Char => "char",
            TypeKeyword::Short => "short",
            TypeKeyword::Int => "int",
            TypeKeyword::Long => "long",
            TypeKeyword::Float => "float",
            TypeKeyword::Double => "double",
            TypeKeyword::Number => "number",
            TypeKeyword::String => "string",
            TypeKeyword::Void => "void",
            TypeKeyword::Never => "never",
            TypeKeyword::Null => "null",
            TypeKeyword::Undefined => "undefined",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
    LogicalAnd,
    LogicalOr,
    Nullish,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
            BinaryOp::Nullish => "??",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod)
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(self, BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor)
    }

    pub fn is_relational(self) -> bool {
        matches!(self, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::StrictEq | BinaryOp::StrictNotEq)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::LogicalAnd | BinaryOp::LogicalOr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    BitNot,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

/// `=` or a compound assignment such as `+=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignOp {
    Assign,
    Compound(BinaryOp),
}

/// A value a lambda copies from its enclosing function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capture {
    Variable(VariableId),
    This,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    // ---- Program and declarations ----
    Program {
        file: FileId,
        /// Record prefix used in emitted names, e.g. `std.core`.
        module_name: String,
        kind: ProgramKind,
        statements: Vec<NodeId>,
    },
    VariableDeclaration {
        kind: VariableKind,
        declarators: Vec<NodeId>,
        modifiers: ModifierFlags,
    },
    VariableDeclarator {
        name: NodeId,
        type_annotation: Option<NodeId>,
        init: Option<NodeId>,
    },
    FunctionDeclaration {
        function: NodeId,
    },
    ScriptFunction {
        name: Option<NodeId>,
        type_params: Vec<NodeId>,
        params: Vec<NodeId>,
        return_type: Option<NodeId>,
        body: Option<NodeId>,
        flags: ScriptFunctionFlags,
        modifiers: ModifierFlags,
        signature: Option<SignatureId>,
        /// Signature of the synthesized `%%async-` implementation.
        async_impl: Option<SignatureId>,
    },
    Parameter {
        name: NodeId,
        type_annotation: Option<NodeId>,
        init: Option<NodeId>,
        optional: bool,
        rest: bool,
    },
    TypeParameter {
        name: NodeId,
        constraint: Option<NodeId>,
    },
    ClassDeclaration {
        name: NodeId,
        type_params: Vec<NodeId>,
        super_class: Option<NodeId>,
        implements: Vec<NodeId>,
        members: Vec<NodeId>,
        modifiers: ModifierFlags,
    },
    ClassProperty {
        name: NodeId,
        type_annotation: Option<NodeId>,
        init: Option<NodeId>,
        modifiers: ModifierFlags,
    },
    MethodDefinition {
        name: NodeId,
        kind: MethodKind,
        function: NodeId,
        modifiers: ModifierFlags,
    },
    InterfaceDeclaration {
        name: NodeId,
        type_params: Vec<NodeId>,
        extends: Vec<NodeId>,
        members: Vec<NodeId>,
        modifiers: ModifierFlags,
    },
    EnumDeclaration {
        name: NodeId,
        members: Vec<NodeId>,
        modifiers: ModifierFlags,
    },
    EnumMember {
        name: NodeId,
        init: Option<NodeId>,
    },
    TypeAlias {
        name: NodeId,
        type_params: Vec<NodeId>,
        aliased: NodeId,
        modifiers: ModifierFlags,
    },
    ImportDeclaration {
        source: String,
        specifiers: Vec<NodeId>,
    },
    ImportSpecifier {
        imported: NodeId,
        local: NodeId,
    },

    // ---- Statements ----
    Block {
        statements: Vec<NodeId>,
    },
    ExpressionStatement {
        expression: NodeId,
    },
    If {
        test: NodeId,
        consequent: NodeId,
        alternate: Option<NodeId>,
    },
    While {
        test: NodeId,
        body: NodeId,
    },
    DoWhile {
        body: NodeId,
        test: NodeId,
    },
    For {
        init: Option<NodeId>,
        test: Option<NodeId>,
        update: Option<NodeId>,
        body: NodeId,
    },
    ForOf {
        left: NodeId,
        right: NodeId,
        body: NodeId,
    },
    Break,
    Continue,
    Return {
        argument: Option<NodeId>,
    },
    Throw {
        argument: NodeId,
    },
    Try {
        block: NodeId,
        handlers: Vec<NodeId>,
        finalizer: Option<NodeId>,
    },
    CatchClause {
        param: Option<NodeId>,
        type_annotation: Option<NodeId>,
        body: NodeId,
    },
    Empty,

    // ---- Expressions ----
    Identifier {
        name: Name,
        /// Resolved binding, recorded by the checker.
        variable: Option<VariableId>,
    },
    NumberLiteral(Number),
    CharLiteral(u16),
    StringLiteral(String),
    BooleanLiteral(bool),
    NullLiteral,
    UndefinedLiteral,
    This,
    Super,
    Member {
        object: NodeId,
        property: NodeId,
        computed: bool,
        optional: bool,
        /// Checked type of `object`.
        obj_type: Option<TypeId>,
    },
    Call {
        callee: NodeId,
        type_args: Vec<NodeId>,
        arguments: Vec<NodeId>,
        optional: bool,
        signature: Option<SignatureId>,
    },
    New {
        class: NodeId,
        arguments: Vec<NodeId>,
        signature: Option<SignatureId>,
    },
    NewArray {
        element_type: NodeId,
        dimension: NodeId,
    },
    ArrayLiteral {
        elements: Vec<NodeId>,
        preferred_type: Option<TypeId>,
    },
    ObjectLiteral {
        properties: Vec<NodeId>,
        preferred_type: Option<TypeId>,
    },
    Property {
        key: NodeId,
        value: NodeId,
    },
    ArrowFunction {
        function: NodeId,
        captures: Vec<Capture>,
        /// Synthesized `LambdaObject-<n>` class holding the captures.
        proxy_class: Option<NodeId>,
    },
    Unary {
        op: UnaryOp,
        argument: NodeId,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        argument: NodeId,
    },
    Binary {
        op: BinaryOp,
        left: NodeId,
        right: NodeId,
        /// Type both operands are converted to before the operation.
        operation_type: Option<TypeId>,
    },
    Conditional {
        test: NodeId,
        consequent: NodeId,
        alternate: NodeId,
    },
    Assignment {
        op: AssignOp,
        target: NodeId,
        value: NodeId,
        operation_type: Option<TypeId>,
    },
    As {
        expression: NodeId,
        type_annotation: NodeId,
    },
    InstanceOf {
        expression: NodeId,
        type_annotation: NodeId,
    },
    NonNull {
        expression: NodeId,
    },
    Await {
        argument: NodeId,
    },
    TypeOf {
        argument: NodeId,
    },
    /// A statement list whose value is that of its trailing expression
    /// statement. Produced by lowering only.
    BlockExpression {
        statements: Vec<NodeId>,
    },

    // ---- Type annotations ----
    PrimitiveType(TypeKeyword),
    TypeReference {
        name: NodeId,
        type_args: Vec<NodeId>,
    },
    ArrayType {
        element: NodeId,
    },
    UnionType {
        types: Vec<NodeId>,
    },
    FunctionType {
        params: Vec<NodeId>,
        return_type: NodeId,
    },
    /// An already-checked type placed into the tree by the compiler.
    OpaqueType(TypeId),
}

impl NodeKind {
    /// Short name used by AST dumps.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Program { .. } => "Program",
            NodeKind::VariableDeclaration { .. } => "VariableDeclaration",
            NodeKind::VariableDeclarator { .. } => "VariableDeclarator",
            NodeKind::FunctionDeclaration { .. } => "FunctionDeclaration",
            NodeKind::ScriptFunction { .. } => "ScriptFunction",
            NodeKind::Parameter { .. } => "Parameter",
            NodeKind::TypeParameter { .. } => "TypeParameter",
            NodeKind::ClassDeclaration { .. } => "ClassDeclaration",
            NodeKind::ClassProperty { .. } => "ClassProperty",
            NodeKind::MethodDefinition { .. } => "MethodDefinition",
            NodeKind::InterfaceDeclaration { .. } => "InterfaceDeclaration",
            NodeKind::EnumDeclaration { .. } => "EnumDeclaration",
            NodeKind::EnumMember { .. } => "EnumMember",
            NodeKind::TypeAlias { .. } => "TypeAlias",
            NodeKind::ImportDeclaration { .. } => "ImportDeclaration",
            NodeKind::ImportSpecifier { .. } => "ImportSpecifier",
            NodeKind::Block { .. } => "Block",
            NodeKind::ExpressionStatement { .. } => "ExpressionStatement",
            NodeKind::If { .. } => "If",
            NodeKind::While { .. } => "While",
            NodeKind::DoWhile { .. } => "DoWhile",
            NodeKind::For { .. } => "For",
            NodeKind::ForOf { .. } => "ForOf",
            NodeKind::Break => "Break",
            NodeKind::Continue => "Continue",
            NodeKind::Return { .. } => "Return",
            NodeKind::Throw { .. } => "Throw",
            NodeKind::Try { .. } => "Try",
            NodeKind::CatchClause { .. } => "CatchClause",
            NodeKind::Empty => "Empty",
            NodeKind::Identifier { .. } => "Identifier",
            NodeKind::NumberLiteral(_) => "NumberLiteral",
            NodeKind::CharLiteral(_) => "CharLiteral",
            NodeKind::StringLiteral(_) => "StringLiteral",
            NodeKind::BooleanLiteral(_) => "BooleanLiteral",
            NodeKind::NullLiteral => "NullLiteral",
            NodeKind::UndefinedLiteral => "UndefinedLiteral",
            NodeKind::This => "This",
            NodeKind::Super => "Super",
            NodeKind::Member { .. } => "Member",
            NodeKind::Call { .. } => "Call",
            NodeKind::New { .. } => "New",
            NodeKind::NewArray { .. } => "NewArray",
            NodeKind::ArrayLiteral { .. } => "ArrayLiteral",
            NodeKind::ObjectLiteral { .. } => "ObjectLiteral",
            NodeKind::Property { .. } => "Property",
            NodeKind::ArrowFunction { .. } => "ArrowFunction",
            NodeKind::Unary { .. } => "Unary",
            NodeKind::Update { .. } => "Update",
            NodeKind::Binary { .. } => "Binary",
            NodeKind::Conditional { .. } => "Conditional",
            NodeKind::Assignment { .. } => "Assignment",
            NodeKind::As { .. } => "As",
            NodeKind::InstanceOf { .. } => "InstanceOf",
            NodeKind::NonNull { .. } => "NonNull",
            NodeKind::Await { .. } => "Await",
            NodeKind::TypeOf { .. } => "TypeOf",
            NodeKind::BlockExpression { .. } => "BlockExpression",
            NodeKind::PrimitiveType(_) => "PrimitiveType",
            NodeKind::TypeReference { .. } => "TypeReference",
            NodeKind::ArrayType { .. } => "ArrayType",
            NodeKind::UnionType { .. } => "UnionType",
            NodeKind::FunctionType { .. } => "FunctionType",
            NodeKind::OpaqueType(_) => "OpaqueType",
        }
    }

    pub fn is_type_annotation(&self) -> bool {
        matches!(
            self,
            NodeKind::PrimitiveType(_)
                | NodeKind::TypeReference { .. }
                | NodeKind::ArrayType { .. }
                | NodeKind::UnionType { .. }
                | NodeKind::FunctionType { .. }
                | NodeKind::OpaqueType(_)
        )
    }

    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            NodeKind::VariableDeclaration { .. }
                | NodeKind::FunctionDeclaration { .. }
                | NodeKind::ClassDeclaration { .. }
                | NodeKind::InterfaceDeclaration { .. }
                | NodeKind::EnumDeclaration { .. }
                | NodeKind::TypeAlias { .. }
                | NodeKind::ImportDeclaration { .. }
                | NodeKind::Block { .. }
                | NodeKind::ExpressionStatement { .. }
                | NodeKind::If { .. }
                | NodeKind::While { .. }
                | NodeKind::DoWhile { .. }
                | NodeKind::For { .. }
                | NodeKind::ForOf { .. }
                | NodeKind::Break
                | NodeKind::Continue
                | NodeKind::Return { .. }
                | NodeKind::Throw { .. }
                | NodeKind::Try { .. }
                | NodeKind::Empty
        )
    }

    /// Whether the node is a literal of a primitive, string or nullish value.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            NodeKind::NumberLiteral(_)
                | NodeKind::CharLiteral(_)
                | NodeKind::StringLiteral(_)
                | NodeKind::BooleanLiteral(_)
                | NodeKind::NullLiteral
                | NodeKind::UndefinedLiteral
        )
    }
}
