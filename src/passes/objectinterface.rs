//! Marker interfaces over every generated type.

use log::debug;

use crate::{
    compiler::GeneratorPass,
    config::IL2CPP_CORLIB,
    model::{AppContext, AssemblyId, TypeAttributes, TypeId},
    passes::generated_assemblies,
    typesystem::TypeExpr,
    Result,
};

/// Injects `IObject`, `IValueType` and `IEnum` and implements them.
pub struct ObjectInterfacePass;

fn find_or_inject(ctx: &mut AppContext, corlib: AssemblyId, name: &str) -> TypeId {
    if let Some(found) = ctx.type_by_full_name(corlib, &format!("Il2CppSystem.{name}")) {
        return found;
    }
    ctx.inject_type(
        corlib,
        "Il2CppSystem",
        name,
        TypeAttributes::PUBLIC | TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT,
        None,
    )
}

impl GeneratorPass for ObjectInterfacePass {
    fn name(&self) -> &'static str {
        "ObjectInterface"
    }

    fn id(&self) -> &'static str {
        "object_interface"
    }

    fn description(&self) -> &'static str {
        "Implements IObject, IValueType and IEnum on generated types"
    }

    fn process(&self, ctx: &mut AppContext) -> Result<()> {
        let corlib = ctx
            .assembly_by_name(IL2CPP_CORLIB)
            .ok_or_else(|| invariant_error!("native corlib {} is not loaded", IL2CPP_CORLIB))?;
        let iobject = find_or_inject(ctx, corlib, "IObject");
        let ivalue_type = find_or_inject(ctx, corlib, "IValueType");
        let ienum = find_or_inject(ctx, corlib, "IEnum");
        let value_type_expr = TypeExpr::Simple(ivalue_type);
        if !ctx.ty(ienum).interfaces.contains(&value_type_expr) {
            ctx.ty_mut(ienum).interfaces.push(value_type_expr);
        }

        let mut implemented = 0usize;
        for assembly in generated_assemblies(ctx) {
            for ty in ctx.types_of(assembly) {
                if ctx.is_injected_type(ty) {
                    continue;
                }
                let mut interfaces = vec![iobject];
                if ctx.is_value_type(ty) {
                    interfaces.push(ivalue_type);
                }
                if ctx.is_enum(ty) {
                    interfaces.push(ienum);
                }
                let def = ctx.ty_mut(ty);
                for interface in interfaces {
                    let expr = TypeExpr::Simple(interface);
                    if !def.interfaces.contains(&expr) {
                        def.interfaces.push(expr);
                    }
                }
                implemented += 1;
            }
        }
        debug!("Marker interfaces added to {implemented} types");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::FieldAttributes, passes::fixture::World};

    #[test]
    fn interfaces_follow_the_kind_of_type() {
        let mut w = World::new();
        let player = w.class("Player", None);
        let vector = w.structure("Vector");
        let color = w.ctx.add_type(
            w.game,
            "Game",
            "Color",
            TypeAttributes::PUBLIC | TypeAttributes::SEALED,
            Some(w.enum_type.into()),
        );
        let int32 = w.primitive("Int32");
        w.ctx.add_field(color, "value__", int32.into(), FieldAttributes::PUBLIC);
        w.run(&ObjectInterfacePass);

        let iobject = w.ctx.il2cpp_corlib_type("IObject").unwrap();
        let ivalue = w.ctx.il2cpp_corlib_type("IValueType").unwrap();
        let ienum = w.ctx.il2cpp_corlib_type("IEnum").unwrap();
        assert!(w.ctx.ty(iobject).is_interface());
        assert_eq!(w.ctx.ty(ienum).interfaces, vec![TypeExpr::Simple(ivalue)]);

        assert_eq!(w.ctx.ty(player).interfaces, vec![TypeExpr::Simple(iobject)]);
        assert_eq!(
            w.ctx.ty(vector).interfaces,
            vec![TypeExpr::Simple(iobject), TypeExpr::Simple(ivalue)]
        );
        assert_eq!(w.ctx.ty(color).interfaces.len(), 3);

        // The native corlib receives the interfaces too.
        assert!(w.ctx.ty(int32).interfaces.contains(&TypeExpr::Simple(ivalue)));
        assert!(!w.ctx.ty(iobject).interfaces.contains(&TypeExpr::Simple(iobject)));
    }

    #[test]
    fn reference_assemblies_are_left_alone() {
        let mut w = World::with_runtime();
        w.run(&ObjectInterfacePass);
        let rt = w.ctx.runtime().unwrap();
        assert!(w.ctx.ty(rt.mono.object).interfaces.is_empty());
    }
}
