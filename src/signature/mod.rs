//! The reflection-metadata universe companion assemblies are expressed in.
//!
//! Nothing here refers into the arena: types are named by assembly scope and
//! full name, generic parameters by position. The
//! [`ContextResolver`](crate::resolver::ContextResolver) maps these
//! signatures onto arena nodes, and [`signature_of`] maps arena type
//! expressions back, so a closed type survives the round trip unchanged.

mod defs;
mod types;

pub use defs::{
    SigAssembly, SigExceptionHandler, SigFieldDef, SigGenericParam, SigInstruction, SigMethodBody,
    SigMethodDef, SigOperand, SigParam, SigPropertyDef, SigTypeDef,
};
pub use types::{
    CorLibType, GenericParamKind, SigFieldRef, SigMethodRef, SigMethodSpec, SigType, SigTypeRef,
};

use crate::{
    model::{AppContext, TypeId},
    typesystem::{GenericOwner, TypeExpr},
};

/// The nominal reference naming an arena type.
#[must_use]
pub fn type_ref_of(ctx: &AppContext, ty: TypeId) -> SigTypeRef {
    let def = ctx.ty(ty);
    match def.declaring {
        Some(outer) => type_ref_of(ctx, outer).nested(&def.name),
        None => SigTypeRef::new(&ctx.assembly(def.assembly).name, &def.namespace, &def.name),
    }
}

/// Maps an arena type expression back into a signature.
///
/// Nominal types always come back as [`SigType::TypeDefOrRef`] scoped to
/// their owning assembly, never as [`SigType::CorLib`].
#[must_use]
pub fn signature_of(ctx: &AppContext, ty: &TypeExpr) -> SigType {
    let boxed = |e: &TypeExpr| Box::new(signature_of(ctx, e));
    match ty {
        TypeExpr::Simple(id) => SigType::TypeDefOrRef(type_ref_of(ctx, *id)),
        TypeExpr::GenericInstance { generic, args } => SigType::GenericInstance {
            generic: type_ref_of(ctx, *generic),
            args: args.iter().map(|a| signature_of(ctx, a)).collect(),
        },
        TypeExpr::Array { element, rank } => SigType::Array {
            element: boxed(element),
            rank: *rank,
        },
        TypeExpr::SzArray(e) => SigType::SzArray(boxed(e)),
        TypeExpr::Pointer(e) => SigType::Pointer(boxed(e)),
        TypeExpr::ByRef(e) => SigType::ByRef(boxed(e)),
        TypeExpr::Pinned(e) => SigType::Pinned(boxed(e)),
        TypeExpr::Boxed(e) => SigType::Boxed(boxed(e)),
        TypeExpr::CustomModifier {
            element,
            modifier,
            required,
        } => SigType::CustomModifier {
            element: boxed(element),
            modifier: boxed(modifier),
            required: *required,
        },
        TypeExpr::GenericParameter { owner, index } => SigType::GenericParameter {
            kind: match owner {
                GenericOwner::Type(_) => GenericParamKind::Type,
                GenericOwner::Method(_) => GenericParamKind::Method,
            },
            index: *index,
        },
        TypeExpr::Sentinel => SigType::Sentinel,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeAttributes;

    #[test]
    fn nested_types_keep_their_scope() {
        let mut ctx = AppContext::new();
        let asm = ctx.add_assembly("Assembly-CSharp", false).unwrap();
        let outer = ctx.add_type(asm, "Game", "Player", TypeAttributes::PUBLIC, None);
        let inner = ctx.add_nested_type(outer, "Stats", TypeAttributes::NESTED_PUBLIC, None);
        let sig = signature_of(&ctx, &TypeExpr::Simple(inner).sz_array());
        let SigType::SzArray(element) = sig else {
            panic!("expected array, got {sig}");
        };
        let SigType::TypeDefOrRef(r) = *element else {
            panic!("expected nominal element");
        };
        assert_eq!(r.scope, "Assembly-CSharp");
        assert_eq!(r.full_name(), "Game.Player/Stats");
    }
}
