//! Cross-universe resolution of companion signatures.
//!
//! A [`ContextResolver`] maps a [`SigType`], [`SigFieldRef`], [`SigMethodRef`]
//! or [`SigMethodSpec`] onto the arena. Resolution is structural: every
//! composite resolves its children first, and any child that fails to resolve
//! makes the whole signature unresolved.
//!
//! # Resolution scopes
//!
//! Generic parameters are positional, so the resolver needs to know whose
//! parameters `!0` and `!!0` refer to:
//!
//! - [`ResolutionScope::Assembly`]: neither kind resolves
//! - [`ResolutionScope::Type`]: `!n` names the type's parameter
//! - [`ResolutionScope::Method`]: `!n` names the declaring type's parameter,
//!   `!!n` the method's
//!
//! Matching a method against the members of a type therefore builds a fresh
//! method-scoped resolver per candidate; the candidate's own method
//! parameters are what `!!n` means inside its signature.
//!
//! # Failure
//!
//! Plain lookups return `Option`, since callers that scan many call sites
//! treat a miss as "skip". The `_or_err` variants turn a miss into
//! [`Error::Unresolved`] for call sites where earlier passes guarantee success.

use crate::{
    model::{
        AppContext, ArrayMethod, ArrayMethodKind, AssemblyId, FieldRef, MethodId, MethodRef,
        TypeId,
    },
    signature::{
        CorLibType, GenericParamKind, SigFieldRef, SigMethodRef, SigMethodSpec, SigType,
        SigTypeRef,
    },
    typesystem::{signatures_eq, TypeExpr},
    Error, Result,
};

/// Whose generic parameters a signature may mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionScope {
    /// No generic context.
    Assembly(AssemblyId),
    /// A type's parameters.
    Type(TypeId),
    /// A method's and its declaring type's parameters.
    Method(MethodId),
}

/// A resolved method operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedMethod {
    /// An ordinary method, possibly instantiated.
    Method(MethodRef),
    /// A multi-dimensional array accessor.
    Array(ArrayMethod),
}

/// Maps companion signatures onto arena nodes within one scope.
#[derive(Debug, Clone, Copy)]
pub struct ContextResolver<'a> {
    ctx: &'a AppContext,
    scope: ResolutionScope,
}

/// Assembly the runtime calls `System.Private.CoreLib` is `mscorlib` here.
fn canonical_assembly(name: &str) -> &str {
    if name == "System.Private.CoreLib" {
        crate::config::MONO_CORLIB
    } else {
        name
    }
}

impl<'a> ContextResolver<'a> {
    /// Creates a resolver for `scope`.
    #[must_use]
    pub fn new(ctx: &'a AppContext, scope: ResolutionScope) -> Self {
        Self { ctx, scope }
    }

    /// A resolver without generic context.
    #[must_use]
    pub fn for_assembly(ctx: &'a AppContext, assembly: AssemblyId) -> Self {
        Self::new(ctx, ResolutionScope::Assembly(assembly))
    }

    /// A resolver in the scope of `ty`.
    #[must_use]
    pub fn for_type(ctx: &'a AppContext, ty: TypeId) -> Self {
        Self::new(ctx, ResolutionScope::Type(ty))
    }

    /// A resolver in the scope of `method`.
    #[must_use]
    pub fn for_method(ctx: &'a AppContext, method: MethodId) -> Self {
        Self::new(ctx, ResolutionScope::Method(method))
    }

    /// The scope this resolver resolves in.
    #[must_use]
    pub fn scope(&self) -> ResolutionScope {
        self.scope
    }

    fn scope_type(&self) -> Option<TypeId> {
        match self.scope {
            ResolutionScope::Assembly(_) => None,
            ResolutionScope::Type(ty) => Some(ty),
            ResolutionScope::Method(m) => Some(self.ctx.method(m).declaring),
        }
    }

    fn generic_parameter(&self, kind: GenericParamKind, index: u32) -> Option<TypeExpr> {
        let position = index as usize;
        match kind {
            GenericParamKind::Type => {
                let ty = self.scope_type()?;
                (position < self.ctx.ty(ty).generic_params.len())
                    .then(|| TypeExpr::type_param(ty, position))
            }
            GenericParamKind::Method => {
                let ResolutionScope::Method(m) = self.scope else {
                    return None;
                };
                (position < self.ctx.method(m).generic_params.len())
                    .then(|| TypeExpr::method_param(m, position))
            }
        }
    }

    /// Resolves a type signature.
    #[must_use]
    pub fn resolve_type(&self, ty: &SigType) -> Option<TypeExpr> {
        match ty {
            SigType::TypeDefOrRef(r) => self.resolve_type_ref(r).map(TypeExpr::Simple),
            SigType::CorLib(kind) => self.resolve_corlib(*kind).map(TypeExpr::Simple),
            SigType::GenericInstance { generic, args } => {
                let generic = self.resolve_type_ref(generic)?;
                let args = self.resolve_types(args)?;
                Some(TypeExpr::generic_instance(generic, args))
            }
            SigType::SzArray(e) => self.resolve_type(e).map(TypeExpr::sz_array),
            SigType::GenericParameter { kind, index } => self.generic_parameter(*kind, *index),
            SigType::ByRef(e) => self.resolve_type(e).map(TypeExpr::by_ref),
            SigType::Pointer(e) => self.resolve_type(e).map(TypeExpr::pointer),
            SigType::Array { element, rank } => {
                self.resolve_type(element).map(|e| e.array(*rank))
            }
            SigType::Pinned(e) => self.resolve_type(e).map(TypeExpr::pinned),
            SigType::CustomModifier {
                element,
                modifier,
                required,
            } => {
                let element = self.resolve_type(element)?;
                let modifier = self.resolve_type(modifier)?;
                Some(element.modified(modifier, *required))
            }
            SigType::Boxed(e) => self.resolve_type(e).map(TypeExpr::boxed),
            SigType::Sentinel => Some(TypeExpr::Sentinel),
            SigType::FunctionPointer => None,
        }
    }

    /// Resolves a type signature that earlier passes guarantee to resolve.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unresolved`] on a miss.
    pub fn resolve_type_or_err(&self, ty: &SigType) -> Result<TypeExpr> {
        self.resolve_type(ty)
            .ok_or_else(|| Error::Unresolved(format!("type {ty}")))
    }

    /// Resolves every signature, or none.
    #[must_use]
    pub fn resolve_types(&self, types: &[SigType]) -> Option<Vec<TypeExpr>> {
        types.iter().map(|t| self.resolve_type(t)).collect()
    }

    /// Resolves a nominal reference.
    #[must_use]
    pub fn resolve_type_ref(&self, r: &SigTypeRef) -> Option<TypeId> {
        if let Some(declaring) = &r.declaring {
            let outer = self.resolve_type_ref(declaring)?;
            return self
                .ctx
                .ty(outer)
                .nested
                .iter()
                .copied()
                .find(|n| self.ctx.ty(*n).name == r.name);
        }
        self.ctx
            .find_type(canonical_assembly(&r.scope), &r.full_name())
    }

    fn resolve_corlib(&self, kind: CorLibType) -> Option<TypeId> {
        self.ctx.il2cpp_corlib_type(kind.name())
    }

    /// Resolves a field reference.
    #[must_use]
    pub fn resolve_field(&self, field: &SigFieldRef) -> Option<FieldRef> {
        match self.resolve_type(&field.declaring)? {
            TypeExpr::GenericInstance { generic, args } => self
                .ctx
                .field_by_name(generic, &field.name)
                .map(|f| FieldRef::on_instance(f, args)),
            declaring => {
                let ty = declaring.as_simple()?;
                self.ctx.field_by_name(ty, &field.name).map(FieldRef::from)
            }
        }
    }

    /// Resolves a method reference.
    #[must_use]
    pub fn resolve_method(&self, method: &SigMethodRef) -> Option<ResolvedMethod> {
        let declaring = self.resolve_type(&method.declaring)?;
        match declaring {
            TypeExpr::Array { .. } => {
                let kind = ArrayMethodKind::from_name(&method.name)?;
                Some(ResolvedMethod::Array(ArrayMethod {
                    kind,
                    array_type: declaring,
                }))
            }
            TypeExpr::GenericInstance { generic, args } => {
                let target = resolve_in_type(self.ctx, generic, method)?;
                Some(ResolvedMethod::Method(MethodRef::on_instance(target, args)))
            }
            TypeExpr::Simple(ty) => {
                resolve_in_type(self.ctx, ty, method).map(|m| ResolvedMethod::Method(m.into()))
            }
            _ => None,
        }
    }

    /// Resolves a generic method instantiation.
    #[must_use]
    pub fn resolve_method_spec(&self, spec: &SigMethodSpec) -> Option<MethodRef> {
        let ResolvedMethod::Method(base) = self.resolve_method(&spec.method)? else {
            return None;
        };
        let args = self.resolve_types(&spec.args)?;
        Some(MethodRef::concrete(base.method, base.type_args, args))
    }
}

/// Finds the member of `ty` a method reference denotes.
///
/// Candidates are filtered on name, parameter count, generic arity,
/// staticness and void-ness, then the signature is resolved in each
/// candidate's own scope and compared structurally. Vararg references never
/// match.
#[must_use]
pub fn resolve_in_type(ctx: &AppContext, ty: TypeId, method: &SigMethodRef) -> Option<MethodId> {
    if !method.sentinel.is_empty() {
        return None;
    }
    ctx.ty(ty).methods.iter().copied().find(|candidate| {
        let def = ctx.method(*candidate);
        if def.name != method.name
            || def.params.len() != method.params.len()
            || def.generic_params.len() != method.generic_arity as usize
            || def.has_this() != method.has_this
            || ctx.is_void(&def.return_type) == method.returns_value()
        {
            return false;
        }
        let resolver = ContextResolver::for_method(ctx, *candidate);
        if method.returns_value() {
            match resolver.resolve_type(&method.return_type) {
                Some(ret) if ret.signature_eq(&def.return_type) => {}
                _ => return false,
            }
        }
        resolver
            .resolve_types(&method.params)
            .is_some_and(|params| signatures_eq(&def.param_types(), &params))
    })
}
