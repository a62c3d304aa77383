//! Blittability classification and field partitioning.
//!
//! Reference types are classified immediately. Value types start out
//! [`Blittability::Unknown`] and are settled by a fixed point over the field
//! graph, which may be cyclic through generic instantiations. A value type
//! becomes blittable once all of its instance fields are known to be
//! pointer-sized or blittable, and non-blittable as soon as one field is not.
//! Classification never regresses, so the iteration terminates.

use log::debug;

use crate::{
    compiler::GeneratorPass,
    model::{
        AppContext, Blittability, FieldId, GenericParameterAttributes, TypeId, TypeInfo,
    },
    typesystem::{GenericOwner, TypeExpr},
    Result,
};

/// Computes [`TypeInfo`] for every type.
pub struct TypeInfoPass;

enum FieldClass {
    Blittable,
    NonBlittable,
    Unknown,
}

/// The type a field stores, with instantiations and modifiers peeled off.
fn underlying(ty: &TypeExpr) -> &TypeExpr {
    match ty {
        TypeExpr::CustomModifier { element, .. } => underlying(element),
        other => other,
    }
}

fn classify(ctx: &AppContext, owner: TypeId, field: FieldId) -> FieldClass {
    let ty = underlying(&ctx.field(field).ty);
    match ty {
        TypeExpr::Array { .. }
        | TypeExpr::SzArray(_)
        | TypeExpr::Pointer(_)
        | TypeExpr::ByRef(_) => FieldClass::Blittable,
        TypeExpr::GenericParameter { owner: gp_owner, index } => {
            let params = match gp_owner {
                GenericOwner::Type(t) => &ctx.ty(*t).generic_params,
                GenericOwner::Method(m) => &ctx.method(*m).generic_params,
            };
            match params.get(*index as usize) {
                Some(p) if p.attributes.contains(GenericParameterAttributes::REFERENCE_TYPE_CONSTRAINT) => {
                    FieldClass::Blittable
                }
                Some(p)
                    if p.is_unmanaged
                        && p.attributes
                            .contains(GenericParameterAttributes::NOT_NULLABLE_VALUE_TYPE_CONSTRAINT) =>
                {
                    FieldClass::Blittable
                }
                _ => FieldClass::NonBlittable,
            }
        }
        other => {
            let Some(definition) = other.definition() else {
                return FieldClass::Blittable;
            };
            if definition == owner {
                return FieldClass::Blittable;
            }
            match ctx.extras.blittability(definition) {
                Blittability::NonBlittableValueType => FieldClass::NonBlittable,
                Blittability::Unknown => FieldClass::Unknown,
                Blittability::ReferenceType | Blittability::BlittableValueType => {
                    FieldClass::Blittable
                }
            }
        }
    }
}

impl GeneratorPass for TypeInfoPass {
    fn name(&self) -> &'static str {
        "TypeInfo"
    }

    fn id(&self) -> &'static str {
        "type_info"
    }

    fn description(&self) -> &'static str {
        "Classifies value-type blittability and splits static from instance fields"
    }

    fn process(&self, ctx: &mut AppContext) -> Result<()> {
        let types: Vec<TypeId> = ctx.assemblies().flat_map(|a| ctx.types_of(a)).collect();

        let mut pending = Vec::new();
        for &ty in &types {
            let (static_fields, instance_fields) = ctx
                .ty(ty)
                .fields
                .iter()
                .copied()
                .partition(|f| ctx.field(*f).is_static());
            let blittability = if ctx.is_value_type(ty) {
                pending.push(ty);
                Blittability::Unknown
            } else {
                Blittability::ReferenceType
            };
            ctx.extras.type_info.attach(
                ty,
                TypeInfo {
                    blittability,
                    static_fields,
                    instance_fields,
                },
            )?;
        }

        let mut rounds = 0usize;
        loop {
            rounds += 1;
            let mut changed = false;
            for &ty in &pending {
                if ctx.extras.blittability(ty) != Blittability::Unknown {
                    continue;
                }
                let fields = ctx.extras.type_info.require(ty)?.instance_fields.clone();
                let mut any_unknown = false;
                let mut verdict = Blittability::BlittableValueType;
                for field in fields {
                    match classify(ctx, ty, field) {
                        FieldClass::Blittable => {}
                        FieldClass::NonBlittable => {
                            verdict = Blittability::NonBlittableValueType;
                            break;
                        }
                        FieldClass::Unknown => any_unknown = true,
                    }
                }
                if verdict == Blittability::BlittableValueType && any_unknown {
                    continue;
                }
                if let Some(info) = ctx.extras.type_info.get_mut(ty) {
                    info.blittability = verdict;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        // Whatever is left depends only on itself through a cycle.
        let mut settled_by_cycle = 0usize;
        for &ty in &pending {
            if let Some(info) = ctx.extras.type_info.get_mut(ty) {
                if info.blittability == Blittability::Unknown {
                    info.blittability = Blittability::BlittableValueType;
                    settled_by_cycle += 1;
                }
            }
        }

        debug!(
            "Classified {} value types in {} rounds ({} through cycles)",
            pending.len(),
            rounds,
            settled_by_cycle
        );
        Ok(())
    }
}
