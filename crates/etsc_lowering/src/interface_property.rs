//! Interface properties become accessor pairs.
//!
//! A property `x: T` declared by an interface turns into an abstract
//! `get x(): T` and, unless it is readonly, an abstract `set x(value: T)`.
//! Every class implementing such an interface with a plain field `x` gets
//! synthesized accessors that read and write the field, so that a virtual
//! call through the interface reaches the field.

use crate::{collect, LoweringResult, Phase};
use etsc_ast::*;
use etsc_checker::{Checker, PropertyFlags};
use etsc_core::text::TextSpan;
use etsc_core::Name;

#[derive(Debug, Default)]
pub struct InterfacePropertyPhase {
    rewritten: usize,
}

/// One accessor to synthesize.
struct Accessor {
    name: String,
    kind: MethodKind,
    value_ty: TypeId,
    modifiers: ModifierFlags,
    /// Read or write `this.<name>` instead of being abstract.
    forwards_to_field: bool,
}

impl Phase for InterfacePropertyPhase {
    fn name(&self) -> &'static str {
        "interface-property"
    }

    fn perform(&mut self, checker: &mut Checker) -> LoweringResult<()> {
        let interfaces = collect(&checker.ast, &|ast, id| matches!(ast.kind(id), NodeKind::InterfaceDeclaration { .. }));
        for interface in interfaces {
            self.lower_interface(checker, interface)?;
        }
        let classes = collect(&checker.ast, &|ast, id| matches!(ast.kind(id), NodeKind::ClassDeclaration { .. }));
        for class in classes {
            self.add_field_accessors(checker, class)?;
        }
        tracing::debug!(accessors = self.rewritten, "lowered interface properties");
        Ok(())
    }

    fn postcondition(&self, checker: &Checker) -> bool {
        collect(&checker.ast, &|ast, id| match ast.kind(id) {
            NodeKind::InterfaceDeclaration { members, .. } => {
                members.iter().any(|m| matches!(ast.kind(*m), NodeKind::ClassProperty { .. }))
            }
            _ => false,
        })
        .is_empty()
    }
}

impl InterfacePropertyPhase {
    fn lower_interface(&mut self, checker: &mut Checker, interface: NodeId) -> LoweringResult<()> {
        let NodeKind::InterfaceDeclaration { members, .. } = checker.ast.kind(interface).clone() else {
            return Ok(());
        };
        let Some(ty) = checker.ast.ts_type(interface) else { return Ok(()) };

        let mut lowered = Vec::with_capacity(members.len());
        let mut added = Vec::new();
        for member in members {
            let NodeKind::ClassProperty { name, modifiers, .. } = *checker.ast.kind(member) else {
                lowered.push(member);
                continue;
            };
            let Some(prop_name) = checker.ast.name_of(name) else { continue };
            let Some(value_ty) = own_property_type(checker, ty, prop_name) else { continue };
            let text = checker.ast.resolve(prop_name).to_string();
            let span = checker.ast.span(member);
            let accessor_modifiers = ModifierFlags::PUBLIC | ModifierFlags::ABSTRACT | ModifierFlags::SYNTHETIC;

            let mut kinds = vec![MethodKind::Get];
            if !modifiers.contains(ModifierFlags::READONLY) {
                kinds.push(MethodKind::Set);
            }
            for kind in kinds {
                let accessor = Accessor {
                    name: text.clone(),
                    kind,
                    value_ty,
                    modifiers: accessor_modifiers,
                    forwards_to_field: false,
                };
                let method = build_accessor(checker, &accessor, span);
                checker.ast.set_parent(method, Some(interface));
                lowered.push(method);
                added.push(method);
            }
        }

        if let NodeKind::InterfaceDeclaration { members, .. } = checker.ast.kind_mut(interface) {
            *members = lowered;
        }
        for method in added {
            checker.check_synthesized(method)?;
            self.rewritten += 1;
        }
        Ok(())
    }

    /// Accessors for the fields of `class` that implement an interface
    /// property, unless the class already declares them.
    fn add_field_accessors(&mut self, checker: &mut Checker, class: NodeId) -> LoweringResult<()> {
        let Some(ty) = checker.ast.ts_type(class) else { return Ok(()) };
        let interface_props = interface_properties(checker, ty);
        if interface_props.is_empty() {
            return Ok(());
        }
        let NodeKind::ClassDeclaration { members, .. } = checker.ast.kind(class).clone() else {
            return Ok(());
        };

        let mut accessors = Vec::new();
        for member in &members {
            let NodeKind::ClassProperty { name, modifiers, .. } = *checker.ast.kind(*member) else { continue };
            if modifiers.contains(ModifierFlags::STATIC) {
                continue;
            }
            let Some(prop_name) = checker.ast.name_of(name) else { continue };
            let Some(&(_, readonly)) = interface_props.iter().find(|(n, _)| *n == prop_name) else { continue };
            let Some(field) = checker.table.object(ty).and_then(|o| o.instance_members.get(&prop_name)) else {
                continue;
            };
            if field.flags.intersects(PropertyFlags::GETTER | PropertyFlags::SETTER) || field.getter.is_some() {
                continue;
            }
            let value_ty = field.ty;
            let text = checker.ast.resolve(prop_name).to_string();
            let span = checker.ast.span(*member);
            let mut kinds = vec![MethodKind::Get];
            if !readonly {
                kinds.push(MethodKind::Set);
            }
            for kind in kinds {
                let accessor = Accessor {
                    name: text.clone(),
                    kind,
                    value_ty,
                    modifiers: ModifierFlags::PUBLIC | ModifierFlags::SYNTHETIC,
                    forwards_to_field: true,
                };
                accessors.push((accessor, span));
            }
        }

        let mut added = Vec::with_capacity(accessors.len());
        for (accessor, span) in accessors {
            let method = build_accessor(checker, &accessor, span);
            checker.ast.set_parent(method, Some(class));
            if let NodeKind::ClassDeclaration { members, .. } = checker.ast.kind_mut(class) {
                members.push(method);
            }
            added.push(method);
        }
        for method in added {
            checker.check_synthesized(method)?;
            self.rewritten += 1;
        }
        Ok(())
    }
}

fn own_property_type(checker: &Checker, ty: TypeId, name: Name) -> Option<TypeId> {
    checker.table.object(ty).and_then(|o| o.instance_members.get(&name)).map(|p| p.ty)
}

/// Property names declared by the interfaces `ty` implements, directly or
/// through its super classes and super interfaces, with their readonly-ness.
fn interface_properties(checker: &Checker, ty: TypeId) -> Vec<(Name, bool)> {
    let mut interfaces = Vec::new();
    let mut queue = vec![ty];
    let mut seen = Vec::new();
    while let Some(current) = queue.pop() {
        if seen.contains(&current) {
            continue;
        }
        seen.push(current);
        let Some(obj) = checker.table.object(current) else { continue };
        if obj.is_interface() {
            interfaces.push(current);
        }
        queue.extend(obj.super_type);
        queue.extend(obj.interfaces.iter().copied());
    }

    let mut props = Vec::new();
    for interface in interfaces {
        let Some(obj) = checker.table.object(interface) else { continue };
        for (name, prop) in &obj.instance_members {
            if prop.is_method() || props.iter().any(|(n, _)| n == name) {
                continue;
            }
            let readonly = !prop.flags.contains(PropertyFlags::SETTER);
            props.push((*name, readonly));
        }
    }
    props
}

fn build_accessor(checker: &mut Checker, accessor: &Accessor, span: TextSpan) -> NodeId {
    let ast = &mut checker.ast;
    let is_get = accessor.kind == MethodKind::Get;
    let void = checker.table.global.void;

    let mut params = Vec::new();
    let return_type = if is_get {
        ast.make_opaque_type(accessor.value_ty, span)
    } else {
        let param_name = ast.make_identifier("value", span);
        let annotation = ast.make_opaque_type(accessor.value_ty, span);
        params.push(ast.alloc_with_parents(
            NodeKind::Parameter { name: param_name, type_annotation: Some(annotation), init: None, optional: false, rest: false },
            span,
        ));
        ast.make_opaque_type(void, span)
    };

    let body = accessor.forwards_to_field.then(|| {
        let this = ast.alloc(NodeKind::This, span);
        let field = ast.make_member(this, &accessor.name, span);
        let statement = if is_get {
            ast.alloc_with_parents(NodeKind::Return { argument: Some(field) }, span)
        } else {
            let value = ast.make_identifier("value", span);
            let assign = ast.alloc_with_parents(
                NodeKind::Assignment { op: AssignOp::Assign, target: field, value, operation_type: None },
                span,
            );
            ast.make_expression_statement(assign)
        };
        ast.alloc_with_parents(NodeKind::Block { statements: vec![statement] }, span)
    });

    let flags = ScriptFunctionFlags::METHOD
        | if is_get { ScriptFunctionFlags::GETTER } else { ScriptFunctionFlags::SETTER };
    let fn_name = ast.make_identifier(&accessor.name, span);
    let function = ast.alloc_with_parents(
        NodeKind::ScriptFunction {
            name: Some(fn_name),
            type_params: Vec::new(),
            params,
            return_type: Some(return_type),
            body,
            flags,
            modifiers: accessor.modifiers,
            signature: None,
            async_impl: None,
        },
        span,
    );
    let name = ast.make_identifier(&accessor.name, span);
    ast.alloc_with_parents(
        NodeKind::MethodDefinition { name, kind: accessor.kind, function, modifiers: accessor.modifiers },
        span,
    )
}
