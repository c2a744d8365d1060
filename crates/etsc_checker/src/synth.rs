//! Classes the checker synthesizes: lambda proxies and dynamic-interop glue.
//!
//! Each synthesized class gets a `ClassDeclaration` node so the code
//! generator emits it like any other record, and a fully resolved class
//! type so later phases never re-enter member collection for it.

use crate::checker::{Checker, DynamicCallShape};
use crate::error::{CheckResult, CheckerError};
use crate::types::*;
use etsc_ast::*;
use etsc_core::text::TextSpan;
use etsc_core::Name;

/// Name of the field holding the captured `this` of a lambda.
pub const CAPTURED_THIS: &str = "this$";

/// Build the `LambdaObject-<n>` class of an arrow function: one field per
/// capture, a constructor taking the captures in order, and `invoke`.
pub(crate) fn build_lambda_class(
    checker: &mut Checker,
    arrow: NodeId,
    sig: SignatureId,
    captures: &[Capture],
    this_type: Option<TypeId>,
) -> CheckResult<NodeId> {
    let NodeKind::ArrowFunction { function, .. } = *checker.ast.kind(arrow) else {
        return Err(CheckerError::internal("expected an arrow function"));
    };
    let index = checker.lambda_counter;
    checker.lambda_counter += 1;
    let span = checker.ast.span(arrow);
    let class_name = format!("LambdaObject-{}", index);

    let mut fields = Vec::with_capacity(captures.len());
    for capture in captures {
        let (name, ty) = match capture {
            Capture::Variable(var) => {
                let name = checker.name_str(checker.binder.variable(*var).name);
                (name, checker.get_type_of_variable(*var)?)
            }
            Capture::This => {
                let ty = this_type.ok_or_else(|| CheckerError::internal("lambda captures 'this' outside of a class"))?;
                (CAPTURED_THIS.to_string(), ty)
            }
        };
        fields.push((name, ty));
    }

    let (field_nodes, class_node) = declaration_node(checker, &class_name, &fields, ModifierFlags::NONE, span);
    let name = checker.ast.interner.intern(&class_name);
    let flags = ObjectFlags::LAMBDA_OBJECT
        | ObjectFlags::CLASS
        | ObjectFlags::FINAL
        | ObjectFlags::HEADER_RESOLVED
        | ObjectFlags::MEMBERS_RESOLVED;
    let ty = checker.table.create_object(name, Some(class_node), flags);
    checker.ast.set_ts_type(class_node, ty);

    let mut instance_members = etsc_core::collections::FxIndexMap::default();
    let mut ctor_params = Vec::with_capacity(fields.len());
    for ((field_name, field_ty), node) in fields.iter().zip(&field_nodes) {
        let field = checker.ast.interner.intern(field_name);
        instance_members.insert(field, field_property(field, *field_ty, *node, ty, PropertyFlags::READONLY));
        ctor_params.push(SignatureParam { name: field, ty: *field_ty, optional: false, default: None });
    }

    let mut invoke = checker.table.signature(sig).clone();
    invoke.name = checker.ast.interner.intern("invoke");
    invoke.owner = Some(ty);
    invoke.flags.remove(SignatureFlags::FUNCTIONAL | SignatureFlags::STATIC);
    let invoke = checker.table.add_signature(invoke);
    let invoke_ty = checker.table.create_function(vec![invoke]);
    let invoke_name = checker.ast.interner.intern("invoke");
    instance_members.insert(
        invoke_name,
        Property {
            name: invoke_name,
            ty: invoke_ty,
            decl: Some(function),
            owner: ty,
            flags: PropertyFlags::METHOD | PropertyFlags::SYNTHETIC,
            getter: None,
            setter: None,
        },
    );

    let ctor = constructor(checker, ty, ctor_params);
    let object = checker.table.global.object;
    if let Some(obj) = checker.table.object_mut(ty) {
        obj.super_type = Some(object);
        obj.instance_members = instance_members;
        obj.constructors = vec![ctor];
    }

    let program = checker.ast.program_of(arrow);
    checker.append_to_program(program, class_node);
    tracing::trace!(class = class_name.as_str(), captures = captures.len(), "synthesized lambda class");
    Ok(class_node)
}

/// Build `%%dynamic_call-<lang>`: one static native intrinsic per call
/// shape used with that runtime.
pub(crate) fn build_dynamic_call_class(
    checker: &mut Checker,
    language: &str,
    shapes: &[DynamicCallShape],
) -> CheckResult<NodeId> {
    let class_name = format!("%%dynamic_call-{}", language);
    let (_, class_node) = declaration_node(checker, &class_name, &[], ModifierFlags::STATIC, TextSpan::default());
    let ty = glue_class(checker, &class_name, class_node);
    let dynamic = checker.table.create_dynamic(language);
    let string = checker.table.global.string;

    let mut statics = etsc_core::collections::FxIndexMap::default();
    for shape in shapes {
        let mut params = Vec::with_capacity(shape.arity + 2);
        let receiver = checker.ast.interner.intern(if shape.is_method { "receiver" } else { "callee" });
        params.push(SignatureParam { name: receiver, ty: dynamic, optional: false, default: None });
        if shape.is_method {
            let name = checker.ast.interner.intern("name");
            params.push(SignatureParam { name, ty: string, optional: false, default: None });
        }
        for i in 0..shape.arity {
            let name = checker.ast.interner.intern(&format!("arg{}", i));
            params.push(SignatureParam { name, ty: dynamic, optional: false, default: None });
        }
        let method = checker.ast.interner.intern(&shape.intrinsic_name());
        let mut sig = Signature::new(method, params, dynamic);
        sig.flags = SignatureFlags::STATIC | SignatureFlags::NATIVE | SignatureFlags::DYNAMIC_INTRINSIC;
        sig.owner = Some(ty);
        let sig = checker.table.add_signature(sig);
        let fn_ty = checker.table.create_function(vec![sig]);
        statics.insert(
            method,
            Property {
                name: method,
                ty: fn_ty,
                decl: None,
                owner: ty,
                flags: PropertyFlags::STATIC | PropertyFlags::METHOD | PropertyFlags::SYNTHETIC,
                getter: None,
                setter: None,
            },
        );
    }
    if let Some(obj) = checker.table.object_mut(ty) {
        obj.static_members = statics;
    }
    Ok(class_node)
}

/// Build `%%dynamic_import`: one static field per dynamically imported
/// name. Each field's initializer is a `module:imported` string the code
/// generator turns into a module load.
pub(crate) fn build_dynamic_import_class(checker: &mut Checker, imports: &[VariableId]) -> CheckResult<NodeId> {
    let class_name = "%%dynamic_import";
    let mut fields = Vec::with_capacity(imports.len());
    let mut sources = Vec::with_capacity(imports.len());
    for &var in imports {
        let variable = checker.binder.variable(var).clone();
        let target = variable.import.ok_or_else(|| CheckerError::internal("dynamic import without a target"))?;
        let ty = checker.get_type_of_variable(var)?;
        fields.push((checker.name_str(variable.name), ty));
        sources.push(format!("{}:{}", target.module, checker.name_str(target.imported)));
    }

    let (field_nodes, class_node) = declaration_node(checker, class_name, &fields, ModifierFlags::STATIC, TextSpan::default());
    let ty = glue_class(checker, class_name, class_node);
    let string = checker.table.global.string;
    let mut statics = etsc_core::collections::FxIndexMap::default();
    for (((field_name, field_ty), node), source) in fields.iter().zip(&field_nodes).zip(sources) {
        let init = checker.ast.alloc(NodeKind::StringLiteral(source), TextSpan::default());
        checker.ast.set_ts_type(init, string);
        checker.ast.set_parent(init, Some(*node));
        if let NodeKind::ClassProperty { init: slot, .. } = checker.ast.kind_mut(*node) {
            *slot = Some(init);
        }
        let name = checker.ast.interner.intern(field_name);
        statics.insert(name, field_property(name, *field_ty, *node, ty, PropertyFlags::STATIC | PropertyFlags::READONLY));
    }
    if let Some(obj) = checker.table.object_mut(ty) {
        obj.static_members = statics;
    }
    Ok(class_node)
}

/// A `ClassDeclaration` with one typed `ClassProperty` per field.
fn declaration_node(
    checker: &mut Checker,
    class_name: &str,
    fields: &[(String, TypeId)],
    field_modifiers: ModifierFlags,
    span: TextSpan,
) -> (Vec<NodeId>, NodeId) {
    let mut members = Vec::with_capacity(fields.len());
    for (name, ty) in fields {
        let name_node = checker.ast.make_identifier(name, span);
        let annotation = checker.ast.make_opaque_type(*ty, span);
        checker.ast.set_ts_type(annotation, *ty);
        let property = checker.ast.alloc_with_parents(
            NodeKind::ClassProperty {
                name: name_node,
                type_annotation: Some(annotation),
                init: None,
                modifiers: field_modifiers | ModifierFlags::SYNTHETIC,
            },
            span,
        );
        checker.ast.set_ts_type(property, *ty);
        members.push(property);
    }
    let name_node = checker.ast.make_identifier(class_name, span);
    let class_node = checker.ast.alloc_with_parents(
        NodeKind::ClassDeclaration {
            name: name_node,
            type_params: Vec::new(),
            super_class: None,
            implements: Vec::new(),
            members: members.clone(),
            modifiers: ModifierFlags::FINAL | ModifierFlags::SYNTHETIC,
        },
        span,
    );
    (members, class_node)
}

fn glue_class(checker: &mut Checker, class_name: &str, class_node: NodeId) -> TypeId {
    let name = checker.ast.interner.intern(class_name);
    let flags = ObjectFlags::DYNAMIC_GLUE
        | ObjectFlags::CLASS
        | ObjectFlags::FINAL
        | ObjectFlags::HEADER_RESOLVED
        | ObjectFlags::MEMBERS_RESOLVED;
    let ty = checker.table.create_object(name, Some(class_node), flags);
    checker.ast.set_ts_type(class_node, ty);
    let object = checker.table.global.object;
    if let Some(obj) = checker.table.object_mut(ty) {
        obj.super_type = Some(object);
    }
    ty
}

fn field_property(name: Name, ty: TypeId, decl: NodeId, owner: TypeId, flags: PropertyFlags) -> Property {
    Property { name, ty, decl: Some(decl), owner, flags: flags | PropertyFlags::SYNTHETIC, getter: None, setter: None }
}

fn constructor(checker: &mut Checker, owner: TypeId, params: Vec<SignatureParam>) -> SignatureId {
    let name = checker.ast.interner.intern("constructor");
    let void = checker.table.global.void;
    let mut sig = Signature::new(name, params, void);
    sig.flags = SignatureFlags::CONSTRUCTOR;
    sig.owner = Some(owner);
    checker.table.add_signature(sig)
}
