//! `.ctor(ObjectPointer)` on reference types.

use log::debug;

use crate::{
    assembly::{InstructionList, MethodBody, OpCode, Operand},
    compiler::GeneratorPass,
    model::{AppContext, MethodAttributes, MethodRef, ParamDef, TypeAttributes, TypeId},
    passes::generated_assemblies,
    typesystem::TypeExpr,
    Result,
};

/// Gives every generated reference type a constructor over a native object
/// pointer, chained to the base type's.
pub struct PointerConstructorPass;

fn constructor_attributes(ty: TypeAttributes) -> MethodAttributes {
    let visibility = if ty.contains(TypeAttributes::ABSTRACT | TypeAttributes::SEALED) {
        MethodAttributes::PRIVATE
    } else {
        MethodAttributes::PUBLIC
    };
    visibility
        | MethodAttributes::HIDE_BY_SIG
        | MethodAttributes::SPECIAL_NAME
        | MethodAttributes::RT_SPECIAL_NAME
}

fn base_constructor(ctx: &AppContext, ty: TypeId) -> Option<MethodRef> {
    match ctx.ty(ty).base.as_ref()? {
        TypeExpr::Simple(base) => ctx.extras.pointer_constructor.get(*base).map(|m| MethodRef::from(*m)),
        TypeExpr::GenericInstance { generic, args } => ctx
            .extras
            .pointer_constructor
            .get(*generic)
            .map(|m| MethodRef::on_instance(*m, args.clone())),
        _ => None,
    }
}

impl GeneratorPass for PointerConstructorPass {
    fn name(&self) -> &'static str {
        "PointerConstructor"
    }

    fn id(&self) -> &'static str {
        "pointer_constructor"
    }

    fn description(&self) -> &'static str {
        "Adds constructors that wrap an existing native object"
    }

    fn process(&self, ctx: &mut AppContext) -> Result<()> {
        let object_pointer = TypeExpr::Simple(ctx.runtime()?.interop.object_pointer);
        let void = ctx.runtime()?.mono.void_type();

        let mut created = Vec::new();
        for assembly in generated_assemblies(ctx) {
            for ty in ctx.types_of(assembly) {
                if ctx.is_injected_type(ty) || ctx.ty(ty).is_interface() {
                    continue;
                }
                if ctx.extras.type_info.require(ty)?.blittability.is_value_type() {
                    continue;
                }
                let attributes = constructor_attributes(ctx.ty(ty).attributes);
                let ctor = ctx.inject_method(
                    ty,
                    ".ctor",
                    attributes,
                    void.clone(),
                    vec![ParamDef::new("pointer", object_pointer.clone())],
                );
                ctx.extras.pointer_constructor.attach(ty, ctor)?;
                created.push((ty, ctor));
            }
        }

        // Bases may be declared after their subclasses, so chaining waits
        // until every constructor exists.
        let mut chained = 0usize;
        for (ty, ctor) in created {
            let Some(base) = base_constructor(ctx, ty) else {
                continue;
            };
            let mut body = InstructionList::new();
            body.push(OpCode::Ldarg, Operand::This);
            body.push(OpCode::Ldarg, Operand::Parameter(0));
            body.push(OpCode::Call, base);
            body.emit(OpCode::Ret);
            ctx.extras.bodies.attach(ctor, MethodBody::native(body))?;
            chained += 1;
        }
        debug!("Chained {chained} pointer constructors");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::GenericParamDef,
        passes::{fixture::World, TypeInfoPass},
    };

    fn run(w: &mut World) {
        w.run(&TypeInfoPass);
        w.run(&PointerConstructorPass);
    }

    #[test]
    fn reference_types_chain_to_their_base() {
        let mut w = World::with_runtime();
        let enemy = w.class("Enemy", None);
        let boss = w.class("Boss", Some(enemy));
        let vector = w.structure("Vector");
        run(&mut w);

        let boss_ctor = *w.ctx.extras.pointer_constructor.get(boss).unwrap();
        let enemy_ctor = *w.ctx.extras.pointer_constructor.get(enemy).unwrap();
        assert!(w.ctx.extras.pointer_constructor.get(vector).is_none());
        assert!(w.ctx.method(boss_ctor).attributes.contains(MethodAttributes::PUBLIC));

        let body = &w.ctx.extras.bodies.get(boss_ctor).unwrap().instructions;
        assert_eq!(body.opcodes(), vec![OpCode::Ldarg, OpCode::Ldarg, OpCode::Call, OpCode::Ret]);
        assert_eq!(body.get(2).unwrap().operand, Operand::Method(MethodRef::from(enemy_ctor)));
    }

    #[test]
    fn generic_bases_are_instantiated() {
        let mut w = World::with_runtime();
        let holder = w.class("Holder`1", None);
        w.ctx.ty_mut(holder).generic_params.push(GenericParamDef::new("T"));
        let int32 = w.primitive("Int32");
        let concrete = w.ctx.add_type(
            w.game,
            "Game",
            "IntHolder",
            TypeAttributes::PUBLIC,
            Some(TypeExpr::generic_instance(holder, vec![int32.into()])),
        );
        run(&mut w);

        let ctor = *w.ctx.extras.pointer_constructor.get(concrete).unwrap();
        let base = *w.ctx.extras.pointer_constructor.get(holder).unwrap();
        let body = &w.ctx.extras.bodies.get(ctor).unwrap().instructions;
        assert_eq!(
            body.get(2).unwrap().operand,
            Operand::Method(MethodRef::on_instance(base, vec![int32.into()]))
        );
    }

    #[test]
    fn static_classes_get_a_private_constructor() {
        let mut w = World::with_runtime();
        let utils = w.ctx.add_type(
            w.game,
            "Game",
            "Utils",
            TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT | TypeAttributes::SEALED,
            Some(w.object.into()),
        );
        run(&mut w);
        let ctor = *w.ctx.extras.pointer_constructor.get(utils).unwrap();
        assert!(w.ctx.method(ctor).attributes.contains(MethodAttributes::PRIVATE));
        // Il2CppSystem.Object has no base to chain to.
        let object_ctor = *w.ctx.extras.pointer_constructor.get(w.object).unwrap();
        assert!(w.ctx.extras.bodies.get(object_ctor).is_none());
    }
}
