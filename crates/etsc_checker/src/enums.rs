//! Enumerations.
//!
//! An enum is numeric or string-valued, decided by its first member.
//! Members without an initializer continue the numbering of the previous
//! one. The helper methods (`getName`, `valueOf`, ...) are synthesized on
//! first member access and implemented by the code generator.

use crate::checker::Checker;
use crate::error::{CheckResult, CheckerError};
use crate::types::*;
use etsc_ast::*;
use etsc_core::collections::FxIndexMap;
use etsc_core::Name;
use etsc_diagnostics::messages;

pub(crate) fn declare_enum(checker: &mut Checker, decl: NodeId) -> CheckResult<TypeId> {
    let NodeKind::EnumDeclaration { members, .. } = checker.ast.kind(decl).clone() else {
        return Err(CheckerError::internal("expected an enum declaration"));
    };
    let enum_name = checker.ast.name_of(decl).ok_or_else(|| CheckerError::internal("unnamed enum"))?;
    let mut infos = Vec::with_capacity(members.len());
    let mut is_string: Option<bool> = None;
    let mut next = 0i32;
    for &member in &members {
        let NodeKind::EnumMember { init, .. } = *checker.ast.kind(member) else { continue };
        let name = checker.ast.name_of(member).ok_or_else(|| CheckerError::internal("unnamed enum member"))?;
        let value = match init {
            Some(init) => match initializer_value(&checker.ast, init) {
                Some(value) => value,
                None => return Err(checker.error(init, &messages::INVALID_ENUM_INITIALIZER, &[])),
            },
            None if is_string == Some(true) => {
                return Err(checker.error(member, &messages::INVALID_ENUM_INITIALIZER, &[]));
            }
            None => EnumValue::Int(next),
        };
        let member_is_string = matches!(value, EnumValue::Str(_));
        match is_string {
            None => is_string = Some(member_is_string),
            Some(kind) if kind != member_is_string => {
                let text = checker.name_str(enum_name);
                return Err(checker.error(member, &messages::ENUM_MEMBERS_MUST_BE_SAME_KIND_0, &[&text]));
            }
            Some(_) => {}
        }
        if let EnumValue::Int(v) = value {
            next = v.wrapping_add(1);
        }
        infos.push(EnumMemberInfo { name, decl: member, value });
    }

    let ty = checker.table.create_enum(enum_name, decl, is_string.unwrap_or(false), infos);
    checker.ast.set_ts_type(decl, ty);
    for member in members {
        checker.ast.set_ts_type(member, ty);
    }
    tracing::trace!(name = %checker.name_str(enum_name), "declared enum");
    Ok(ty)
}

fn initializer_value(ast: &Ast, init: NodeId) -> Option<EnumValue> {
    match ast.kind(init) {
        NodeKind::NumberLiteral(Number::Int(v)) => Some(EnumValue::Int(*v)),
        NodeKind::StringLiteral(s) => Some(EnumValue::Str(s.clone())),
        NodeKind::Unary { op: UnaryOp::Minus, argument } => match ast.kind(*argument) {
            NodeKind::NumberLiteral(Number::Int(v)) => Some(EnumValue::Int(v.wrapping_neg())),
            _ => None,
        },
        _ => None,
    }
}

/// The helper method `name` of an enum, static or instance.
pub(crate) fn helper(checker: &mut Checker, enum_ty: TypeId, name: Name, is_static: bool) -> Option<Property> {
    if checker.table.enum_type(enum_ty)?.helpers.is_none() {
        let helpers = build_helpers(checker, enum_ty)?;
        checker.table.enum_type_mut(enum_ty)?.helpers = Some(helpers);
    }
    let helpers = checker.table.enum_type(enum_ty)?.helpers.as_ref()?;
    helpers.get(&name).filter(|p| p.is_static() == is_static).cloned()
}

fn build_helpers(checker: &mut Checker, enum_ty: TypeId) -> Option<FxIndexMap<Name, Property>> {
    let is_string = checker.table.enum_type(enum_ty)?.is_string;
    let string = checker.table.global.string;
    let int = checker.table.primitive(PrimitiveKind::Int);
    let value_ty = if is_string { string } else { int };
    let array = checker.table.create_array(enum_ty);

    let mut specs: Vec<(&str, Vec<(&str, TypeId)>, TypeId, bool)> = vec![
        ("getName", vec![], string, false),
        ("getValue", vec![], value_ty, false),
        ("toString", vec![], string, false),
        ("valueOf", vec![("name", string)], enum_ty, true),
        ("values", vec![], array, true),
    ];
    if !is_string {
        specs.push(("fromInt", vec![("value", int)], enum_ty, true));
    }

    let mut helpers = FxIndexMap::default();
    for (method, params, ret, is_static) in specs {
        let name = checker.ast.interner.intern(method);
        let params = params
            .into_iter()
            .map(|(p, ty)| SignatureParam { name: checker.ast.interner.intern(p), ty, optional: false, default: None })
            .collect();
        let mut sig = Signature::new(name, params, ret);
        sig.flags = SignatureFlags::ENUM_HELPER;
        let mut flags = PropertyFlags::METHOD | PropertyFlags::SYNTHETIC;
        if is_static {
            sig.flags |= SignatureFlags::STATIC;
            flags |= PropertyFlags::STATIC;
        }
        sig.owner = Some(enum_ty);
        let sig = checker.table.add_signature(sig);
        let ty = checker.table.create_function(vec![sig]);
        helpers.insert(name, Property { name, ty, decl: None, owner: enum_ty, flags, getter: None, setter: None });
    }
    Some(helpers)
}
