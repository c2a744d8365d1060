//! Call resolution.
//!
//! Candidates are filtered by arity, generic candidates are instantiated
//! with explicit or inferred type arguments, and the survivors are tried in
//! three passes of increasing permissiveness: no conversions, then boxing
//! and unboxing, then widening as well. The first pass with an applicable
//! candidate wins; among several, the most specific one is taken.
//!
//! Lambda, object and array literal arguments are typed against the chosen
//! parameter, so they only take part in applicability by their shape.

use crate::checker::{Checker, DynamicCallShape};
use crate::contexts::{ContextFlags, ResolutionContext};
use crate::error::{CheckResult, CheckerError};
use crate::relation::TypeRelationFlags;
use crate::types::*;
use etsc_ast::*;
use etsc_core::collections::FxHashMap;
use etsc_diagnostics::messages;

const PASSES: [TypeRelationFlags; 3] = [TypeRelationFlags::STRICT, TypeRelationFlags::NO_WIDENING, TypeRelationFlags::NONE];

struct Candidate {
    /// The declared signature.
    original: SignatureId,
    /// The signature with the call's type arguments substituted.
    sig: SignatureId,
    map: FxHashMap<TypeId, TypeId>,
}

impl Checker {
    pub(crate) fn check_call(&mut self, node: NodeId, ctx: &ResolutionContext) -> CheckResult<TypeId> {
        let NodeKind::Call { callee, type_args, arguments, optional, .. } = self.ast.kind(node).clone() else {
            return Err(CheckerError::internal("expected a call expression"));
        };

        if matches!(self.ast.kind(callee), NodeKind::Super) {
            return self.check_super_call(node, callee, &arguments, ctx);
        }

        let (mut callee_ty, mut chained) = match self.ast.kind(callee) {
            NodeKind::Member { computed: false, .. } => {
                let access = self.member_access(callee, ctx)?;
                match access.prop {
                    Some(prop) => {
                        let ty = self.property_read_type(&prop, callee)?;
                        self.ast.set_ts_type(callee, ty);
                        (ty, access.optional_chain)
                    }
                    None => (access.receiver, false),
                }
            }
            _ => (self.check_expr(callee, ctx)?, false),
        };
        if self.table.possibly_nullish(callee_ty) {
            if !optional {
                return Err(self.error(callee, &messages::VALUE_IS_POSSIBLY_NULLISH, &[]));
            }
            callee_ty = self.table.remove_nullish(callee_ty);
            chained = true;
        }

        let name = self.callee_name(callee);
        let result = match self.table.get(callee_ty).clone() {
            Type::Function { signatures } => {
                let (sig, ret) = self.resolve_call_signatures(node, &name, &signatures, &type_args, &arguments, ctx)?;
                if let NodeKind::Call { signature, .. } = self.ast.kind_mut(node) {
                    *signature = Some(sig);
                }
                ret
            }
            Type::Dynamic { language } => {
                for &arg in &arguments {
                    self.check_value_argument(arg, ctx)?;
                }
                let is_method = matches!(self.ast.kind(callee), NodeKind::Member { .. });
                self.note_dynamic_call(&language, DynamicCallShape { is_method, arity: arguments.len() });
                callee_ty
            }
            _ => {
                let text = self.type_str(callee_ty);
                return Err(self.error(callee, &messages::TYPE_0_HAS_NO_CALL_SIGNATURES, &[&text]));
            }
        };
        if chained && !matches!(self.table.get(result), Type::Void) {
            Ok(self.table.create_union(&[result, self.table.global.undefined]))
        } else {
            Ok(result)
        }
    }

    /// `super(...)` inside a constructor of a derived class.
    fn check_super_call(
        &mut self,
        node: NodeId,
        callee: NodeId,
        arguments: &[NodeId],
        ctx: &ResolutionContext,
    ) -> CheckResult<TypeId> {
        if !ctx.flags.contains(ContextFlags::CONSTRUCTOR) || ctx.flags.contains(ContextFlags::LAMBDA) {
            return Err(self.error(callee, &messages::SUPER_OUTSIDE_DERIVED_CLASS, &[]));
        }
        let super_ty = self.check_expr(callee, ctx)?;
        self.ensure_members(super_ty)?;
        let constructors = self.table.object(super_ty).map(|o| o.constructors.clone()).unwrap_or_default();
        let name = self.declaration_name(super_ty);
        let (sig, _) = self.resolve_call_signatures(node, &name, &constructors, &[], arguments, ctx)?;
        if let NodeKind::Call { signature, .. } = self.ast.kind_mut(node) {
            *signature = Some(sig);
        }
        Ok(self.table.global.void)
    }

    fn callee_name(&self, callee: NodeId) -> String {
        match self.ast.kind(callee) {
            NodeKind::Identifier { name, .. } => self.name_str(*name),
            NodeKind::Member { property, .. } => self.ast.name_str(*property).to_string(),
            _ => "expression".to_string(),
        }
    }

    fn check_value_argument(&mut self, arg: NodeId, ctx: &ResolutionContext) -> CheckResult<TypeId> {
        let ty = self.check_expr(arg, ctx)?;
        if matches!(self.table.get(ty), Type::Void) {
            return Err(self.error(arg, &messages::VOID_USED_AS_VALUE, &[]));
        }
        Ok(ty)
    }

    /// Pick the signature of `candidates` a call with `args` binds to and
    /// check the arguments against it. Returns the signature and the type
    /// of the call.
    pub(crate) fn resolve_call_signatures(
        &mut self,
        node: NodeId,
        name: &str,
        candidates: &[SignatureId],
        type_args: &[NodeId],
        args: &[NodeId],
        ctx: &ResolutionContext,
    ) -> CheckResult<(SignatureId, TypeId)> {
        let mut explicit = Vec::with_capacity(type_args.len());
        for &t in type_args {
            let ty = self.resolve_type_annotation(t)?;
            explicit.push(self.box_if_primitive(ty));
        }

        let by_arity: Vec<SignatureId> = candidates
            .iter()
            .copied()
            .filter(|&s| {
                let sig = self.table.signature(s);
                sig.accepts_arity(args.len()) && (explicit.is_empty() || sig.type_params.len() == explicit.len())
            })
            .collect();
        if by_arity.is_empty() {
            return Err(self.error(node, &messages::NO_MATCHING_CALL_SIGNATURE_FOR_0, &[name]));
        }

        let mut arg_types: Vec<Option<TypeId>> = Vec::with_capacity(args.len());
        for &arg in args {
            arg_types.push(if self.is_deferred(arg) { None } else { Some(self.check_value_argument(arg, ctx)?) });
        }

        let sole = by_arity.len() == 1;
        let mut instantiated = Vec::with_capacity(by_arity.len());
        for original in by_arity {
            if let Some(candidate) = self.instantiate_candidate(node, original, &explicit, args, &mut arg_types, sole, ctx)? {
                instantiated.push(candidate);
            }
        }

        let mut winner: Option<(TypeRelationFlags, Vec<usize>)> = None;
        for flags in PASSES {
            let mut applicable = Vec::new();
            for (i, c) in instantiated.iter().enumerate() {
                if self.is_applicable(c.sig, args, &arg_types, flags) {
                    applicable.push(i);
                }
            }
            if !applicable.is_empty() {
                winner = Some((flags, applicable));
                break;
            }
        }
        let Some((flags, applicable)) = winner else {
            return Err(self.error(node, &messages::NO_MATCHING_CALL_SIGNATURE_FOR_0, &[name]));
        };
        let sigs: Vec<SignatureId> = applicable.iter().map(|&i| instantiated[i].sig).collect();
        let Some(position) = self.most_specific(&sigs, args.len()) else {
            return Err(self.error(node, &messages::REFERENCE_TO_0_IS_AMBIGUOUS, &[name]));
        };
        let chosen = &instantiated[applicable[position]];
        let (chosen_sig, chosen_original, map) = (chosen.sig, chosen.original, chosen.map.clone());
        tracing::trace!(call = name, signature = %self.table.signature_to_string(chosen_sig), "resolved call");

        let sig = self.table.signature(chosen_sig).clone();
        for (i, &arg) in args.iter().enumerate() {
            let Some(param) = sig.param_type_at(i, |t| self.table.element_type(t).unwrap_or(t)) else {
                return Err(CheckerError::internal("argument without a parameter after arity check"));
            };
            let arg_ty = match arg_types[i] {
                Some(ty) => ty,
                None => self.check_expr_expected(arg, Some(param), ctx)?,
            };
            self.check_assignable(arg, arg_ty, param, flags)?;
        }

        let ret = if sig.flags.contains(SignatureFlags::INFERRING) {
            let base = self.signature_return_type(chosen_original, node)?;
            self.table.substitute(base, &map)
        } else {
            sig.return_type
        };
        Ok((chosen_sig, ret))
    }

    /// Arguments typed from their parameter once the signature is known.
    fn is_deferred(&self, arg: NodeId) -> bool {
        self.ast.ts_type(arg).is_none()
            && matches!(
                self.ast.kind(arg),
                NodeKind::ArrowFunction { .. } | NodeKind::ObjectLiteral { .. } | NodeKind::ArrayLiteral { .. }
            )
    }

    #[allow(clippy::too_many_arguments)]
    fn instantiate_candidate(
        &mut self,
        node: NodeId,
        original: SignatureId,
        explicit: &[TypeId],
        args: &[NodeId],
        arg_types: &mut [Option<TypeId>],
        sole: bool,
        ctx: &ResolutionContext,
    ) -> CheckResult<Option<Candidate>> {
        let sig = self.table.signature(original).clone();
        if sig.type_params.is_empty() {
            return Ok(Some(Candidate { original, sig: original, map: FxHashMap::default() }));
        }
        let params = sig.type_params.clone();

        let map: FxHashMap<TypeId, TypeId> = if !explicit.is_empty() {
            params.iter().copied().zip(explicit.iter().copied()).collect()
        } else {
            let mut inferred = FxHashMap::default();
            for (i, arg_ty) in arg_types.iter().enumerate() {
                let (Some(arg_ty), Some(param_ty)) =
                    (*arg_ty, sig.param_type_at(i, |t| self.table.element_type(t).unwrap_or(t)))
                else {
                    continue;
                };
                self.infer_from(param_ty, arg_ty, &params, &mut inferred, 0);
            }
            if sole {
                for (i, &arg) in args.iter().enumerate() {
                    if arg_types[i].is_some() || !matches!(self.ast.kind(arg), NodeKind::ArrowFunction { .. }) {
                        continue;
                    }
                    let Some(param_ty) = sig.param_type_at(i, |t| self.table.element_type(t).unwrap_or(t)) else {
                        continue;
                    };
                    let expected = self.table.substitute(param_ty, &inferred);
                    let hint_params_known = self.function_signatures(expected).first().is_some_and(|&s| {
                        let s = self.table.signature(s).clone();
                        s.params.iter().all(|p| !self.mentions_any(p.ty, &params, 0))
                    });
                    if !hint_params_known {
                        continue;
                    }
                    let ty = self.check_expr_expected(arg, Some(expected), ctx)?;
                    arg_types[i] = Some(ty);
                    self.infer_from(param_ty, ty, &params, &mut inferred, 0);
                }
            }
            for &p in &params {
                if !inferred.contains_key(&p) {
                    if !sole {
                        return Ok(None);
                    }
                    let text = self.type_str(p);
                    return Err(self.error(node, &messages::CANNOT_INFER_TYPE_ARGUMENT_0, &[&text]));
                }
            }
            inferred
        };

        let args_in_order: Vec<TypeId> = params.iter().filter_map(|p| map.get(p).copied()).collect();
        if sole {
            self.check_constraints(node, &params, &args_in_order)?;
        } else if self.check_constraints(node, &params, &args_in_order).is_err() {
            return Ok(None);
        }
        let instantiated = self.table.substitute_signature(original, &map, None);
        Ok(Some(Candidate { original, sig: instantiated, map }))
    }

    /// Unify `param_ty` with `arg_ty`, recording bindings for `params`.
    /// Primitive bindings are boxed; repeated bindings merge by least upper
    /// bound.
    fn infer_from(
        &mut self,
        param_ty: TypeId,
        arg_ty: TypeId,
        params: &[TypeId],
        map: &mut FxHashMap<TypeId, TypeId>,
        depth: u32,
    ) {
        if depth > 16 {
            return;
        }
        match self.table.get(param_ty).clone() {
            Type::TypeParameter { .. } if params.contains(&param_ty) => {
                if matches!(self.table.get(arg_ty), Type::Null | Type::Undefined | Type::Void | Type::Never) {
                    return;
                }
                let widened = self.table.widen(arg_ty);
                let arg = self.box_if_primitive(widened);
                let merged = match map.get(&param_ty) {
                    Some(&prev) => self.table.least_upper_bound(prev, arg),
                    None => arg,
                };
                map.insert(param_ty, merged);
            }
            Type::NonNullish { inner } => {
                let arg = self.table.remove_nullish(arg_ty);
                self.infer_from(inner, arg, params, map, depth + 1);
            }
            Type::Array { element } => {
                if let Some(arg_element) = self.table.element_type(arg_ty) {
                    self.infer_from(element, arg_element, params, map, depth + 1);
                }
            }
            Type::Union { constituents } => {
                let arg = self.table.remove_nullish(arg_ty);
                for c in constituents {
                    if !matches!(self.table.get(c), Type::Null | Type::Undefined) {
                        self.infer_from(c, arg, params, map, depth + 1);
                    }
                }
            }
            Type::Object(o) if !o.type_args.is_empty() => {
                let base = self.table.generic_base(param_ty);
                let Some(matching) = self.instance_of_base(arg_ty, base) else { return };
                let arg_args = self.table.object(matching).map(|m| m.type_args.clone()).unwrap_or_default();
                for (p, a) in o.type_args.iter().zip(arg_args) {
                    self.infer_from(*p, a, params, map, depth + 1);
                }
            }
            Type::Function { signatures } => {
                let (Some(&ps), Some(&arg_sig)) = (signatures.first(), self.function_signatures(arg_ty).first()) else {
                    return;
                };
                let (ps, arg_sig) = (self.table.signature(ps).clone(), self.table.signature(arg_sig).clone());
                for (p, a) in ps.params.iter().zip(&arg_sig.params) {
                    self.infer_from(p.ty, a.ty, params, map, depth + 1);
                }
                if !arg_sig.flags.contains(SignatureFlags::INFERRING) {
                    self.infer_from(ps.return_type, arg_sig.return_type, params, map, depth + 1);
                }
            }
            _ => {}
        }
    }

    /// The type among `ty` and its supertypes instantiated from `base`.
    fn instance_of_base(&mut self, ty: TypeId, base: TypeId) -> Option<TypeId> {
        let mut queue = vec![ty];
        let mut i = 0;
        while i < queue.len() {
            let current = queue[i];
            i += 1;
            if self.table.generic_base(current) == base {
                return Some(current);
            }
            self.table.fill_instantiated_header(current);
            if let Some(obj) = self.table.object(current) {
                queue.extend(obj.super_type);
                queue.extend(obj.interfaces.iter().copied());
            }
            if queue.len() > 64 {
                break;
            }
        }
        None
    }

    fn mentions_any(&self, ty: TypeId, params: &[TypeId], depth: u32) -> bool {
        if depth > 16 {
            return false;
        }
        match self.table.get(ty) {
            Type::TypeParameter { .. } => params.contains(&ty),
            Type::NonNullish { inner } => self.mentions_any(*inner, params, depth + 1),
            Type::Array { element } => self.mentions_any(*element, params, depth + 1),
            Type::Union { constituents } => constituents.iter().any(|c| self.mentions_any(*c, params, depth + 1)),
            Type::Object(o) => o.type_args.iter().any(|a| self.mentions_any(*a, params, depth + 1)),
            Type::Function { signatures } => signatures.iter().any(|s| {
                let sig = self.table.signature(*s);
                sig.params.iter().any(|p| self.mentions_any(p.ty, params, depth + 1))
                    || self.mentions_any(sig.return_type, params, depth + 1)
            }),
            _ => false,
        }
    }

    fn is_applicable(&mut self, sig: SignatureId, args: &[NodeId], arg_types: &[Option<TypeId>], flags: TypeRelationFlags) -> bool {
        let s = self.table.signature(sig).clone();
        for (i, &arg) in args.iter().enumerate() {
            let Some(param) = s.param_type_at(i, |t| self.table.element_type(t).unwrap_or(t)) else {
                return false;
            };
            let fits = match arg_types[i] {
                Some(arg_ty) => self.table.is_assignable(arg_ty, param, flags).related,
                None => self.deferred_fits(arg, param),
            };
            if !fits {
                return false;
            }
        }
        true
    }

    /// Whether a deferred argument has a shape `param` can accept.
    fn deferred_fits(&mut self, arg: NodeId, param: TypeId) -> bool {
        let param = self.table.remove_nullish(param);
        let options: Vec<TypeId> = match self.table.union_constituents(param) {
            Some(members) => members.to_vec(),
            None => vec![param],
        };
        match self.ast.kind(arg).clone() {
            NodeKind::ArrowFunction { function, .. } => {
                let arity = match self.ast.kind(function) {
                    NodeKind::ScriptFunction { params, .. } => params.len(),
                    _ => return false,
                };
                options.iter().any(|&o| {
                    self.function_signatures(o).iter().any(|&s| {
                        let s = self.table.signature(s);
                        arity <= s.params.len() || s.rest.is_some()
                    })
                })
            }
            NodeKind::ObjectLiteral { .. } => options.iter().any(|&o| {
                self.table.object(o).is_some_and(|obj| {
                    obj.flags.contains(ObjectFlags::CLASS) && !obj.flags.contains(ObjectFlags::ABSTRACT)
                })
            }),
            NodeKind::ArrayLiteral { .. } => {
                options.iter().any(|&o| self.table.element_type(o).is_some() || o == self.table.global.object)
            }
            _ => false,
        }
    }

    /// Index of the signature whose parameters are all assignable to the
    /// corresponding parameters of every other one.
    fn most_specific(&mut self, sigs: &[SignatureId], arity: usize) -> Option<usize> {
        if sigs.len() == 1 {
            return Some(0);
        }
        (0..sigs.len()).find(|&a| (0..sigs.len()).all(|b| a == b || self.more_specific(sigs[a], sigs[b], arity)))
    }

    fn more_specific(&mut self, a: SignatureId, b: SignatureId, arity: usize) -> bool {
        let (sa, sb) = (self.table.signature(a).clone(), self.table.signature(b).clone());
        for i in 0..arity {
            let element_of = |t: TypeId| self.table.element_type(t).unwrap_or(t);
            let (Some(pa), Some(pb)) = (sa.param_type_at(i, element_of), sb.param_type_at(i, element_of)) else {
                return false;
            };
            let flags = TypeRelationFlags::NO_BOXING | TypeRelationFlags::NO_UNBOXING;
            if !self.table.is_assignable(pa, pb, flags).related {
                return false;
            }
        }
        true
    }
}
