//! Member recovery from companion assemblies.
//!
//! IL2CPP strips members the game never references. Companion assemblies
//! (the matching reference assemblies of the managed framework) still carry
//! them, often with complete bodies. This pass merges those members into the
//! arena, marks everything it adds as unstripped, and recovers original
//! bodies for the translation compiler.
//!
//! Types present on both sides only gain what cannot disturb the native
//! state: constant static fields and methods the arena does not have.
//! Instance fields are never added to an existing type, since the native
//! object layout is fixed.

use log::{info, warn};

use crate::{
    compiler::{EventKind, GeneratorPass},
    model::{AppContext, GenericParamDef, MethodId, ParamDef, TypeId},
    resolver::{resolve_in_type, ContextResolver, ResolvedMethod},
    signature::{
        type_ref_of, SigAssembly, SigFieldDef, SigGenericParam, SigMethodDef, SigType, SigTypeDef,
    },
    translation::recover,
    typesystem::TypeExpr,
    Result,
};

/// Merges companion assemblies into the arena.
pub struct UnstripPass {
    companions: Option<Vec<SigAssembly>>,
}

impl UnstripPass {
    /// Creates the pass over already loaded companion assemblies.
    ///
    /// # Arguments
    ///
    /// * `companions` - The companion input, `None` if none was supplied.
    #[must_use]
    pub fn new(companions: Option<Vec<SigAssembly>>) -> Self {
        Self { companions }
    }
}

fn generic_params(sig: &[SigGenericParam]) -> Vec<GenericParamDef> {
    sig.iter()
        .map(|p| {
            let mut def = GenericParamDef::new(p.name.clone());
            def.attributes = p.attributes;
            def
        })
        .collect()
}

fn collect_nested<'s>(
    ctx: &mut AppContext,
    sig: &'s SigTypeDef,
    ty: TypeId,
    injected: &mut Vec<(&'s SigTypeDef, TypeId)>,
    existing: &mut Vec<(&'s SigTypeDef, TypeId)>,
) {
    for nested in &sig.nested {
        let found = ctx
            .ty(ty)
            .nested
            .iter()
            .copied()
            .find(|n| ctx.ty(*n).name == nested.name);
        let nested_ty = match found {
            Some(t) => {
                existing.push((nested, t));
                t
            }
            None => {
                let t = ctx.inject_nested_type(ty, &nested.name, nested.attributes, None);
                ctx.ty_mut(t).generic_params = generic_params(&nested.generic_params);
                ctx.extras.unstripped_types.mark(t);
                injected.push((nested, t));
                t
            }
        };
        collect_nested(ctx, nested, nested_ty, injected, existing);
    }
}

/// Adds a method, resolving its signature in its own scope. A method whose
/// signature does not resolve is removed again.
fn inject_method(ctx: &mut AppContext, ty: TypeId, sig: &SigMethodDef) -> Option<MethodId> {
    // The signature may mention the method's own generic parameters, so the
    // method has to exist before it can be resolved.
    let params = sig
        .params
        .iter()
        .map(|p| ParamDef::new(p.name.clone(), TypeExpr::Sentinel))
        .collect();
    let method = ctx.inject_method(ty, &sig.name, sig.attributes, TypeExpr::Sentinel, params);
    ctx.method_mut(method).impl_attributes = sig.impl_attributes;
    ctx.method_mut(method).generic_params = generic_params(&sig.generic_params);

    let resolved = {
        let resolver = ContextResolver::for_method(ctx, method);
        let ret = resolver.resolve_type(&sig.return_type);
        let params = resolver.resolve_types(&sig.params.iter().map(|p| p.ty.clone()).collect::<Vec<_>>());
        let constraints = sig
            .generic_params
            .iter()
            .map(|gp| resolver.resolve_types(&gp.constraints))
            .collect::<Option<Vec<_>>>();
        ret.zip(params).zip(constraints)
    };
    let Some(((ret, params), constraints)) = resolved else {
        ctx.remove_method(method);
        return None;
    };

    let def = ctx.method_mut(method);
    def.return_type = ret;
    for (param, ty) in def.params.iter_mut().zip(params) {
        param.ty = ty;
    }
    for (gp, c) in def.generic_params.iter_mut().zip(constraints) {
        gp.constraints = c;
    }
    ctx.extras.unstripped_methods.mark(method);
    Some(method)
}

fn inject_field(ctx: &mut AppContext, ty: TypeId, sig: &SigFieldDef) -> bool {
    let Some(field_type) = ContextResolver::for_type(ctx, ty).resolve_type(&sig.field_type) else {
        return false;
    };
    let field = ctx.inject_field(ty, &sig.name, field_type, sig.attributes);
    ctx.field_mut(field).constant = sig.constant.clone();
    ctx.extras.unstripped_fields.mark(field);
    true
}

fn inject_properties(ctx: &mut AppContext, ty: TypeId, sig: &SigTypeDef, methods: &[Option<MethodId>]) {
    for property in &sig.properties {
        if ctx.ty(ty).properties.iter().any(|p| ctx.property(*p).name == property.name) {
            continue;
        }
        let Some(property_type) = ContextResolver::for_type(ctx, ty).resolve_type(&property.property_type) else {
            continue;
        };
        let accessor = |index: Option<usize>| match index {
            None => Some(None),
            Some(i) => methods.get(i).copied().flatten().map(Some),
        };
        let (Some(getter), Some(setter)) = (accessor(property.getter), accessor(property.setter)) else {
            continue;
        };
        let id = ctx.inject_property(ty, &property.name, property_type, getter, setter);
        ctx.property_mut(id).attributes = property.attributes;
        ctx.extras.unstripped_properties.mark(id);
    }
}

impl GeneratorPass for UnstripPass {
    fn name(&self) -> &'static str {
        "Unstrip"
    }

    fn id(&self) -> &'static str {
        "unstrip"
    }

    fn description(&self) -> &'static str {
        "Recovers stripped members and original bodies from companion assemblies"
    }

    fn process(&self, ctx: &mut AppContext) -> Result<()> {
        let companions = match &self.companions {
            Some(list) if !list.is_empty() => list,
            _ => {
                warn!("No companion assemblies supplied, nothing to unstrip");
                ctx.events.warn("unstrip skipped: no companion assemblies");
                return Ok(());
            }
        };

        // Assemblies and types
        let mut injected: Vec<(&SigTypeDef, TypeId)> = Vec::new();
        let mut existing: Vec<(&SigTypeDef, TypeId)> = Vec::new();
        for assembly in companions {
            if assembly.is_empty() {
                continue;
            }
            let assembly_id = match ctx.assembly_by_name(&assembly.name) {
                Some(id) => id,
                None => {
                    let id = ctx.inject_assembly(&assembly.name, false)?;
                    ctx.extras.unstripped_assemblies.mark(id);
                    id
                }
            };
            for sig in &assembly.types {
                let full_name = if sig.namespace.is_empty() {
                    sig.name.clone()
                } else {
                    format!("{}.{}", sig.namespace, sig.name)
                };
                let ty = match ctx.type_by_full_name(assembly_id, &full_name) {
                    Some(t) => {
                        existing.push((sig, t));
                        t
                    }
                    None => {
                        let t = ctx.inject_type(assembly_id, &sig.namespace, &sig.name, sig.attributes, None);
                        ctx.ty_mut(t).generic_params = generic_params(&sig.generic_params);
                        ctx.extras.unstripped_types.mark(t);
                        injected.push((sig, t));
                        t
                    }
                };
                collect_nested(ctx, sig, ty, &mut injected, &mut existing);
            }
        }

        // Hierarchy of injected types
        for &(sig, ty) in &injected {
            let (base, interfaces, constraints) = {
                let resolver = ContextResolver::for_type(ctx, ty);
                let name = || ctx.full_name(ty);
                let base = match &sig.base {
                    Some(b) => Some(
                        resolver
                            .resolve_type(b)
                            .ok_or_else(|| invariant_error!("unresolved base type {} of {}", b, name()))?,
                    ),
                    None => None,
                };
                let interfaces = sig
                    .interfaces
                    .iter()
                    .map(|i| {
                        resolver
                            .resolve_type(i)
                            .ok_or_else(|| invariant_error!("unresolved interface {} of {}", i, name()))
                    })
                    .collect::<Result<Vec<_>>>()?;
                let constraints = sig
                    .generic_params
                    .iter()
                    .map(|gp| {
                        resolver.resolve_types(&gp.constraints).ok_or_else(|| {
                            invariant_error!("unresolved constraint on {} of {}", gp.name, name())
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                (base, interfaces, constraints)
            };
            let def = ctx.ty_mut(ty);
            def.base = base;
            def.interfaces = interfaces;
            for (gp, c) in def.generic_params.iter_mut().zip(constraints) {
                gp.constraints = c;
            }
        }

        // Members
        let mut needing_bodies: Vec<(MethodId, &SigMethodDef)> = Vec::new();
        let mut overrides: Vec<(MethodId, &SigMethodDef)> = Vec::new();
        for &(sig, ty) in &injected {
            for field in &sig.fields {
                inject_field(ctx, ty, field);
            }
            let mut methods = Vec::with_capacity(sig.methods.len());
            for method in &sig.methods {
                let id = inject_method(ctx, ty, method);
                if let Some(id) = id {
                    needing_bodies.push((id, method));
                    overrides.push((id, method));
                }
                methods.push(id);
            }
            inject_properties(ctx, ty, sig, &methods);
        }
        for &(sig, ty) in &existing {
            for field in &sig.fields {
                let is_constant = field.attributes.is_static() && field.constant.is_some();
                if !is_constant || ctx.field_by_name(ty, &field.name).is_some() {
                    continue;
                }
                inject_field(ctx, ty, field);
            }
            let declaring = SigType::TypeDefOrRef(type_ref_of(ctx, ty));
            let type_is_generic = !sig.generic_params.is_empty();
            let mut methods = Vec::with_capacity(sig.methods.len());
            for method in &sig.methods {
                if let Some(found) = resolve_in_type(ctx, ty, &method.as_reference(declaring.clone())) {
                    if type_is_generic || !method.generic_params.is_empty() {
                        needing_bodies.push((found, method));
                    }
                    methods.push(Some(found));
                    continue;
                }
                let id = inject_method(ctx, ty, method);
                if let Some(id) = id {
                    needing_bodies.push((id, method));
                    overrides.push((id, method));
                }
                methods.push(id);
            }
            inject_properties(ctx, ty, sig, &methods);
        }

        for (method, sig) in overrides {
            let declaring = ctx.method(method).declaring;
            let resolved: Vec<_> = sig
                .overrides
                .iter()
                .filter_map(|o| match ContextResolver::for_type(ctx, declaring).resolve_method(o) {
                    Some(ResolvedMethod::Method(m)) => Some(m),
                    _ => None,
                })
                .collect();
            ctx.method_mut(method).overrides.extend(resolved);
        }

        // Original bodies
        let attempts = needing_bodies.len();
        let mut recovered = 0usize;
        for (method, sig) in needing_bodies {
            let Some(body) = sig.body.as_ref().and_then(|b| recover(ctx, method, b)) else {
                continue;
            };
            ctx.extras.original_bodies.attach(method, body)?;
            ctx.events.record(EventKind::BodyRecovered).method(method).pass(self.id());
            recovered += 1;
        }
        info!("Recovered the original method body for {recovered}/{attempts} attempts.");
        Ok(())
    }
}
