//! Resolution of type annotations.

use crate::checker::Checker;
use crate::error::{CheckResult, CheckerError};
use crate::types::*;
use etsc_ast::*;
use etsc_binder::DeclKind;
use etsc_core::collections::FxHashMap;
use etsc_diagnostics::messages;

impl Checker {
    /// The type an annotation denotes. Memoized on the annotation node.
    pub fn resolve_type_annotation(&mut self, node: NodeId) -> CheckResult<TypeId> {
        if let Some(ty) = self.ast.ts_type(node) {
            return Ok(ty);
        }
        let ty = match self.ast.kind(node).clone() {
            NodeKind::PrimitiveType(keyword) => self.keyword_type(keyword),
            NodeKind::TypeReference { name, type_args } => self.resolve_type_reference(node, name, &type_args)?,
            NodeKind::ArrayType { element } => {
                let element = self.resolve_type_annotation(element)?;
                self.table.create_array(element)
            }
            NodeKind::UnionType { types } => {
                let mut members = Vec::with_capacity(types.len());
                for t in types {
                    members.push(self.resolve_type_annotation(t)?);
                }
                self.table.create_union(&members)
            }
            NodeKind::FunctionType { params, return_type } => {
                let mut sig_params = Vec::with_capacity(params.len());
                let mut rest = None;
                for param in params {
                    let NodeKind::Parameter { type_annotation, optional, rest: is_rest, .. } = *self.ast.kind(param) else {
                        continue;
                    };
                    let name = self.ast.name_of(param).unwrap_or_else(|| self.ast.interner.intern("_"));
                    let Some(annotation) = type_annotation else {
                        let text = self.name_str(name);
                        return Err(self.error(param, &messages::CANNOT_INFER_LAMBDA_PARAMETER_0, &[&text]));
                    };
                    let mut ty = self.resolve_type_annotation(annotation)?;
                    if optional {
                        ty = self.table.create_union(&[ty, self.table.global.undefined]);
                    }
                    let p = SignatureParam { name, ty, optional, default: None };
                    if is_rest {
                        rest = Some(p);
                    } else {
                        sig_params.push(p);
                    }
                }
                let ret = self.resolve_type_annotation(return_type)?;
                let name = self.ast.interner.intern("invoke");
                let mut sig = Signature::new(name, sig_params, ret);
                sig.rest = rest;
                sig.flags |= SignatureFlags::FUNCTIONAL;
                let sig = self.table.add_signature(sig);
                self.table.create_function(vec![sig])
            }
            NodeKind::OpaqueType(ty) => ty,
            other => {
                return Err(CheckerError::internal(format!("'{}' is not a type annotation", other.name())));
            }
        };
        self.ast.set_ts_type(node, ty);
        Ok(ty)
    }

    pub(crate) fn keyword_type(&self, keyword: TypeKeyword) -> TypeId {
        let g = &self.table.global;
        match keyword {
            TypeKeyword::Boolean => g.primitive(PrimitiveKind::Boolean),
            TypeKeyword::Byte => g.primitive(PrimitiveKind::Byte),
            TypeKeyword::Char => g.primitive(PrimitiveKind::Char),
            TypeKeyword::Short => g.primitive(PrimitiveKind::Short),
            TypeKeyword::Int => g.primitive(PrimitiveKind::Int),
            TypeKeyword::Long => g.primitive(PrimitiveKind::Long),
            TypeKeyword::Float => g.primitive(PrimitiveKind::Float),
            TypeKeyword::Double | TypeKeyword::Number => g.primitive(PrimitiveKind::Double),
            TypeKeyword::String => g.string,
            TypeKeyword::Void => g.void,
            TypeKeyword::Never => g.never,
            TypeKeyword::Null => g.null,
            TypeKeyword::Undefined => g.undefined,
        }
    }

    fn resolve_type_reference(&mut self, node: NodeId, name_node: NodeId, type_args: &[NodeId]) -> CheckResult<TypeId> {
        let name = self.ast.name_of(name_node).ok_or_else(|| CheckerError::internal("type reference without a name"))?;
        let text = self.name_str(name);
        let Some(var) = self.lookup(node, name) else {
            return Err(self.error(name_node, &messages::UNRESOLVED_REFERENCE_0, &[&text]));
        };
        let variable = self.binder.variable(var).clone();
        match variable.kind {
            DeclKind::Class | DeclKind::Interface => {
                let declared = self.declared_type(variable.decl_node)?;
                if Some(declared) == self.table.global.string_class {
                    return Ok(self.table.global.string);
                }
                let mut args = Vec::with_capacity(type_args.len());
                for &arg in type_args {
                    let ty = self.resolve_type_annotation(arg)?;
                    args.push(self.box_if_primitive(ty));
                }
                self.instantiate_checked(node, declared, args)
            }
            DeclKind::Enum => {
                self.no_type_args(node, &text, type_args)?;
                self.declared_type(variable.decl_node)
            }
            DeclKind::TypeAlias => {
                self.no_type_args(node, &text, type_args)?;
                if self.resolving_vars.contains(&var) {
                    return Err(self.error(node, &messages::CIRCULAR_TYPE_ALIAS_0, &[&text]));
                }
                self.get_type_of_variable(var)
            }
            DeclKind::TypeParameter => {
                self.no_type_args(node, &text, type_args)?;
                self.get_type_of_variable(var)
            }
            DeclKind::Import if variable.is_dynamic_import() => self.get_type_of_variable(var),
            _ => Err(self.error(name_node, &messages::VALUE_0_USED_AS_TYPE, &[&text])),
        }
    }

    fn no_type_args(&self, node: NodeId, text: &str, type_args: &[NodeId]) -> CheckResult<()> {
        if type_args.is_empty() {
            Ok(())
        } else {
            Err(self.error(node, &messages::TYPE_0_IS_NOT_GENERIC, &[text]))
        }
    }

    /// Type arguments are reference types.
    pub(crate) fn box_if_primitive(&self, ty: TypeId) -> TypeId {
        match self.table.primitive_kind(ty) {
            Some(kind) => self.table.global.boxed(kind).unwrap_or(ty),
            None => ty,
        }
    }

    /// Instantiate `generic` after validating the argument count and the
    /// constraints. A generic named without arguments is instantiated with
    /// its constraints.
    pub(crate) fn instantiate_checked(&mut self, node: NodeId, generic: TypeId, args: Vec<TypeId>) -> CheckResult<TypeId> {
        let params = self.table.object(generic).map(|o| o.type_params.clone()).unwrap_or_default();
        if params.is_empty() {
            if !args.is_empty() {
                let text = self.type_str(generic);
                return Err(self.error(node, &messages::TYPE_0_IS_NOT_GENERIC, &[&text]));
            }
            return Ok(generic);
        }
        if args.is_empty() {
            let defaults: Vec<TypeId> = params.iter().map(|p| self.constraint_or_object(*p)).collect();
            return Ok(self.table.instantiate(generic, &defaults));
        }
        if args.len() != params.len() {
            let (expected, got) = (params.len().to_string(), args.len().to_string());
            return Err(self.error(node, &messages::EXPECTED_0_TYPE_ARGUMENTS_GOT_1, &[&expected, &got]));
        }
        self.check_constraints(node, &params, &args)?;
        Ok(self.table.instantiate(generic, &args))
    }

    /// Each argument must satisfy its parameter's constraint, with earlier
    /// parameters substituted into later constraints.
    pub(crate) fn check_constraints(&mut self, node: NodeId, params: &[TypeId], args: &[TypeId]) -> CheckResult<()> {
        let map: FxHashMap<TypeId, TypeId> = params.iter().copied().zip(args.iter().copied()).collect();
        for (param, arg) in params.iter().zip(args) {
            let Type::TypeParameter { constraint: Some(bound), .. } = *self.table.get(*param) else { continue };
            let bound = self.table.substitute(bound, &map);
            if !self.table.is_supertype_of(bound, *arg) {
                let (a, b) = (self.type_str(*arg), self.type_str(bound));
                return Err(self.error(node, &messages::TYPE_ARGUMENT_0_NOT_ASSIGNABLE_TO_CONSTRAINT_1, &[&a, &b]));
            }
        }
        Ok(())
    }

    pub(crate) fn constraint_or_object(&self, param: TypeId) -> TypeId {
        match self.table.get(param) {
            Type::TypeParameter { constraint: Some(c), .. } => *c,
            _ => self.table.global.object,
        }
    }
}
