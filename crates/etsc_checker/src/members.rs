//! Member lookup.

use crate::checker::Checker;
use crate::contexts::ResolutionContext;
use crate::error::CheckResult;
use crate::type_table::TypeTable;
use crate::types::*;
use etsc_ast::{NodeId, TypeId};
use etsc_core::Name;
use etsc_diagnostics::messages;

impl TypeTable {
    /// Find a member of a class or interface, searching the declared
    /// members, then the super classes, then the implemented interfaces.
    /// Member tables along the way must already be resolved.
    pub fn find_property(&self, ty: TypeId, name: Name, is_static: bool) -> Option<&Property> {
        let mut queue = vec![ty];
        let mut seen = Vec::new();
        let mut i = 0;
        while i < queue.len() {
            let current = queue[i];
            i += 1;
            if seen.contains(&current) {
                continue;
            }
            seen.push(current);
            let Some(obj) = self.object(current) else { continue };
            if let Some(prop) = obj.members(is_static).get(&name) {
                return Some(prop);
            }
            queue.extend(obj.super_type);
            if !is_static {
                queue.extend(obj.interfaces.iter().copied());
            }
        }
        None
    }
}

impl Checker {
    /// [`TypeTable::find_property`], resolving member tables on the way.
    pub(crate) fn find_member(&mut self, ty: TypeId, name: Name, is_static: bool) -> CheckResult<Option<Property>> {
        let mut queue = vec![ty];
        let mut seen = Vec::new();
        let mut i = 0;
        while i < queue.len() {
            let current = queue[i];
            i += 1;
            if seen.contains(&current) {
                continue;
            }
            seen.push(current);
            self.ensure_members(current)?;
            self.table.fill_instantiated_header(current);
            let Some(obj) = self.table.object(current) else { continue };
            if let Some(prop) = obj.members(is_static).get(&name) {
                return Ok(Some(prop.clone()));
            }
            queue.extend(obj.super_type);
            if !is_static {
                queue.extend(obj.interfaces.iter().copied());
            }
        }
        Ok(None)
    }

    /// The type whose members a value of `ty` exposes.
    pub(crate) fn member_target(&mut self, ty: TypeId) -> TypeId {
        match self.table.get(ty).clone() {
            Type::String { .. } => self.table.global.string_class.unwrap_or(ty),
            Type::TypeParameter { .. } => self.constraint_or_object(ty),
            Type::NonNullish { inner } => {
                let bound = self.constraint_or_object(inner);
                let bound = self.table.remove_nullish(bound);
                self.member_target(bound)
            }
            _ => ty,
        }
    }

    /// Look up member `name` on a value (or, with `is_static`, on the class)
    /// of type `obj`, enforcing visibility.
    pub(crate) fn member_of(
        &mut self,
        at: NodeId,
        obj: TypeId,
        name: Name,
        is_static: bool,
        ctx: &ResolutionContext,
    ) -> CheckResult<Property> {
        let target = self.member_target(obj);
        let text = self.name_str(name);
        match self.table.get(target).clone() {
            Type::Array { .. } if !is_static && text == "length" => Ok(Property {
                name,
                ty: self.table.primitive(PrimitiveKind::Int),
                decl: None,
                owner: target,
                flags: PropertyFlags::READONLY,
                getter: None,
                setter: None,
            }),
            Type::Union { constituents } => {
                let mut found: Option<Property> = None;
                for c in constituents {
                    let prop = self.member_of(at, c, name, is_static, ctx)?;
                    match &found {
                        None => found = Some(prop),
                        Some(first) => {
                            if !self.table.is_identical(first.ty, prop.ty) {
                                let ty = self.type_str(obj);
                                return Err(self.error(at, &messages::MEMBER_TYPE_MUST_BE_SAME_FOR_UNION, &[&text, &ty]));
                            }
                        }
                    }
                }
                found.ok_or_else(|| self.error(at, &messages::PROPERTY_0_DOES_NOT_EXIST_ON_TYPE_1, &[&text, "never"]))
            }
            Type::Enum(_) => match crate::enums::helper(self, target, name, is_static) {
                Some(prop) => Ok(prop),
                None => {
                    let ty = self.type_str(obj);
                    Err(self.error(at, &messages::PROPERTY_0_DOES_NOT_EXIST_ON_TYPE_1, &[&text, &ty]))
                }
            },
            Type::Dynamic { .. } => Ok(Property {
                name,
                ty: target,
                decl: None,
                owner: target,
                flags: PropertyFlags::NONE,
                getter: None,
                setter: None,
            }),
            Type::Object(_) => {
                if let Some(prop) = self.find_member(target, name, is_static)? {
                    self.check_visibility(at, &prop, ctx)?;
                    return Ok(prop);
                }
                let class = self.declaration_name(target);
                if self.find_member(target, name, !is_static)?.is_some() {
                    let message =
                        if is_static { &messages::_0_IS_AN_INSTANCE_PROPERTY_OF_1 } else { &messages::_0_IS_A_STATIC_PROPERTY_OF_1 };
                    return Err(self.error(at, message, &[&text, &class]));
                }
                Err(self.error(at, &messages::PROPERTY_0_DOES_NOT_EXIST_ON_TYPE_1, &[&text, &class]))
            }
            _ => {
                let ty = self.type_str(obj);
                Err(self.error(at, &messages::PROPERTY_0_DOES_NOT_EXIST_ON_TYPE_1, &[&text, &ty]))
            }
        }
    }

    fn check_visibility(&self, at: NodeId, prop: &Property, ctx: &ResolutionContext) -> CheckResult<()> {
        if ctx.ignores_visibility() || !prop.flags.intersects(PropertyFlags::PRIVATE | PropertyFlags::PROTECTED) {
            return Ok(());
        }
        let owner = self.table.generic_base(prop.owner);
        let visible = match ctx.containing_class.map(|c| self.table.generic_base(c)) {
            None => false,
            Some(class) if class == owner => true,
            Some(class) => {
                prop.flags.contains(PropertyFlags::PROTECTED)
                    && self.table.superclass_chain(class).iter().any(|c| self.table.generic_base(*c) == owner)
            }
        };
        if visible {
            Ok(())
        } else {
            let text = self.name_str(prop.name);
            Err(self.error(at, &messages::PROPERTY_0_IS_NOT_VISIBLE_HERE, &[&text]))
        }
    }

    /// The value type a member read produces.
    pub(crate) fn property_read_type(&mut self, prop: &Property, at: NodeId) -> CheckResult<TypeId> {
        match prop.getter {
            Some(getter) if prop.flags.contains(PropertyFlags::GETTER) => self.signature_return_type(getter, at),
            _ => Ok(prop.ty),
        }
    }
}
