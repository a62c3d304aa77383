//! Managed exception wrappers for native exception types.
//!
//! A native exception cannot be thrown or caught by managed code directly.
//! Every type deriving from `Il2CppSystem.Exception` gets a nested
//! `System.Exception` subclass mirroring its hierarchy, and implements
//! `IIl2CppException.CreateSystemException` to wrap itself.

use std::collections::HashMap;

use log::debug;

use crate::{
    assembly::{InstructionList, MethodBody, OpCode, Operand},
    compiler::GeneratorPass,
    model::{
        AppContext, GenericParamDef, MethodAttributes, MethodId, MethodRef, ParamDef, TypeAttributes,
        TypeId,
    },
    runtime::RuntimeSurface,
    typesystem::{TypeExpr, TypeReplacer},
    Result,
};

/// Injects the wrapper types and `CreateSystemException` overrides.
pub struct ExceptionHierarchyPass;

/// Every type whose base chain reaches `root`, `root` included, in
/// declaration order.
fn exception_types(ctx: &AppContext, root: TypeId) -> Vec<TypeId> {
    fn is_exception(ctx: &AppContext, ty: TypeId, root: TypeId, memo: &mut HashMap<TypeId, bool>) -> bool {
        if ty == root {
            return true;
        }
        if let Some(known) = memo.get(&ty) {
            return *known;
        }
        let answer = ctx
            .ty(ty)
            .base
            .as_ref()
            .and_then(TypeExpr::definition)
            .is_some_and(|base| is_exception(ctx, base, root, memo));
        memo.insert(ty, answer);
        answer
    }

    let mut memo = HashMap::new();
    let mut found = Vec::new();
    for assembly in ctx.assemblies() {
        if ctx.assembly(assembly).is_reference {
            continue;
        }
        for ty in ctx.types_of(assembly) {
            if is_exception(ctx, ty, root, &mut memo) {
                found.push(ty);
            }
        }
    }
    found
}

/// `Exception`, `Exception`1`, then underscores until the name is free.
fn wrapper_name(ctx: &AppContext, ty: TypeId) -> String {
    let def = ctx.ty(ty);
    let arity = def.generic_params.len();
    let mut stem = "Exception".to_string();
    loop {
        let name = if arity > 0 {
            format!("{stem}`{arity}")
        } else {
            stem.clone()
        };
        let taken = def.name == name || def.nested.iter().any(|n| ctx.ty(*n).name == name);
        if !taken {
            return name;
        }
        stem.push('_');
    }
}

fn wrapper_constructor(ctx: &AppContext, wrapper: TypeId) -> Result<MethodId> {
    ctx.method_by_name(wrapper, ".ctor")
        .ok_or_else(|| invariant_error!("{} has no constructor", ctx.full_name(wrapper)))
}

fn link_base(ctx: &mut AppContext, rt: &RuntimeSurface, root: TypeId, ty: TypeId, wrapper: TypeId) -> Result<()> {
    let (base, base_ctor) = if ty == root {
        (
            TypeExpr::Simple(rt.exceptions.il2cpp_exception),
            MethodRef::from(rt.exceptions.constructor),
        )
    } else {
        match ctx.ty(ty).base.clone() {
            Some(TypeExpr::GenericInstance { generic, args }) => {
                let base_wrapper = *ctx.extras.system_exception_type.require(generic)?;
                let mut replacer = TypeReplacer::default();
                for (from, to) in ctx.type_params(ty).into_iter().zip(ctx.type_params(wrapper)) {
                    replacer.insert(from, to);
                }
                let args: Vec<TypeExpr> = args.iter().map(|a| replacer.replace(a)).collect();
                let ctor = wrapper_constructor(ctx, base_wrapper)?;
                (
                    TypeExpr::generic_instance(base_wrapper, args.clone()),
                    MethodRef::on_instance(ctor, args),
                )
            }
            Some(TypeExpr::Simple(base)) => {
                let base_wrapper = *ctx.extras.system_exception_type.require(base)?;
                (
                    TypeExpr::Simple(base_wrapper),
                    MethodRef::from(wrapper_constructor(ctx, base_wrapper)?),
                )
            }
            other => {
                return Err(invariant_error!(
                    "exception {} has an unexpected base {:?}",
                    ctx.full_name(ty),
                    other
                ))
            }
        }
    };
    ctx.ty_mut(wrapper).base = Some(base);

    let constructor = wrapper_constructor(ctx, wrapper)?;
    let mut body = InstructionList::new();
    body.push(OpCode::Ldarg, Operand::This);
    body.push(OpCode::Ldarg, Operand::Parameter(0));
    body.push(OpCode::Call, base_ctor);
    body.emit(OpCode::Ret);
    ctx.extras.bodies.attach(constructor, MethodBody::native(body))
}

fn implement_interface(ctx: &mut AppContext, rt: &RuntimeSurface, ty: TypeId, wrapper: TypeId) -> Result<()> {
    let interface = TypeExpr::Simple(rt.exceptions.iil2cpp_exception);
    if !ctx.ty(ty).interfaces.contains(&interface) {
        ctx.ty_mut(ty).interfaces.push(interface);
    }
    let name = format!(
        "{}.{}",
        ctx.full_name(rt.exceptions.iil2cpp_exception),
        ctx.method(rt.exceptions.create_system_exception).name
    );
    let method = ctx.inject_method(
        ty,
        &name,
        MethodAttributes::PRIVATE
            | MethodAttributes::HIDE_BY_SIG
            | MethodAttributes::VIRTUAL
            | MethodAttributes::FINAL
            | MethodAttributes::NEW_SLOT,
        TypeExpr::Simple(rt.mono.exception),
        Vec::new(),
    );
    ctx.method_mut(method)
        .overrides
        .push(MethodRef::from(rt.exceptions.create_system_exception));

    let constructor = MethodRef::on_instance(wrapper_constructor(ctx, wrapper)?, ctx.type_params(ty));
    let mut body = InstructionList::new();
    body.push(OpCode::Ldarg, Operand::This);
    body.push(OpCode::Newobj, constructor);
    body.emit(OpCode::Ret);
    ctx.extras.bodies.attach(method, MethodBody::native(body))
}

impl GeneratorPass for ExceptionHierarchyPass {
    fn name(&self) -> &'static str {
        "ExceptionHierarchy"
    }

    fn id(&self) -> &'static str {
        "exception_hierarchy"
    }

    fn description(&self) -> &'static str {
        "Mirrors native exception types as managed exceptions"
    }

    fn process(&self, ctx: &mut AppContext) -> Result<()> {
        let rt = ctx.runtime()?.clone();
        let root = ctx
            .il2cpp_corlib_type("Exception")
            .ok_or_else(|| invariant_error!("Il2CppSystem.Exception is missing"))?;
        let types = exception_types(ctx, root);
        let void = rt.mono.void_type();

        for &ty in &types {
            let name = wrapper_name(ctx, ty);
            let wrapper = ctx.inject_nested_type(ty, &name, TypeAttributes::NESTED_PUBLIC, None);
            let params: Vec<GenericParamDef> = ctx
                .ty(ty)
                .generic_params
                .iter()
                .map(|p| GenericParamDef::new(p.name.clone()))
                .collect();
            ctx.ty_mut(wrapper).generic_params = params;
            ctx.inject_method(
                wrapper,
                ".ctor",
                MethodAttributes::PUBLIC
                    | MethodAttributes::HIDE_BY_SIG
                    | MethodAttributes::SPECIAL_NAME
                    | MethodAttributes::RT_SPECIAL_NAME,
                void.clone(),
                vec![ParamDef::new("exception", TypeExpr::Simple(root))],
            );
            ctx.extras.system_exception_type.attach(ty, wrapper)?;
        }

        for &ty in &types {
            let wrapper = *ctx.extras.system_exception_type.require(ty)?;
            link_base(ctx, &rt, root, ty, wrapper)?;
            implement_interface(ctx, &rt, ty, wrapper)?;
        }
        debug!("Wrapped {} exception types", types.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::fixture::World;

    #[test]
    fn wrappers_mirror_the_native_hierarchy() {
        let mut w = World::with_runtime();
        let game_error = w.class("GameError", Some(w.exception));
        let player = w.class("Player", None);
        w.run(&ExceptionHierarchyPass);

        assert!(w.ctx.extras.system_exception_type.get(player).is_none());
        let rt = w.ctx.runtime().unwrap();
        let root_wrapper = *w.ctx.extras.system_exception_type.get(w.exception).unwrap();
        assert_eq!(
            w.ctx.ty(root_wrapper).base,
            Some(TypeExpr::Simple(rt.exceptions.il2cpp_exception))
        );

        let wrapper = *w.ctx.extras.system_exception_type.get(game_error).unwrap();
        assert_eq!(w.ctx.ty(wrapper).name, "Exception");
        assert_eq!(w.ctx.ty(wrapper).declaring, Some(game_error));
        assert_eq!(w.ctx.ty(wrapper).base, Some(TypeExpr::Simple(root_wrapper)));

        let ctor = w.ctx.method_by_name(wrapper, ".ctor").unwrap();
        let base_ctor = w.ctx.method_by_name(root_wrapper, ".ctor").unwrap();
        let body = &w.ctx.extras.bodies.get(ctor).unwrap().instructions;
        assert_eq!(body.get(2).unwrap().operand, Operand::Method(MethodRef::from(base_ctor)));

        assert!(w
            .ctx
            .ty(game_error)
            .interfaces
            .contains(&TypeExpr::Simple(rt.exceptions.iil2cpp_exception)));
        let create = w
            .ctx
            .ty(game_error)
            .methods
            .iter()
            .copied()
            .find(|m| w.ctx.method(*m).name.ends_with(".CreateSystemException"))
            .unwrap();
        assert_eq!(
            w.ctx.method(create).overrides,
            vec![MethodRef::from(rt.exceptions.create_system_exception)]
        );
        let body = &w.ctx.extras.bodies.get(create).unwrap().instructions;
        assert_eq!(body.opcodes(), vec![OpCode::Ldarg, OpCode::Newobj, OpCode::Ret]);
    }

    #[test]
    fn generic_exceptions_instantiate_their_base_wrapper() {
        let mut w = World::with_runtime();
        let typed = w.class("TypedError`1", Some(w.exception));
        w.ctx.ty_mut(typed).generic_params.push(GenericParamDef::new("T"));
        let int32 = w.primitive("Int32");
        let int_error = w.ctx.add_type(
            w.game,
            "Game",
            "IntError",
            TypeAttributes::PUBLIC,
            Some(TypeExpr::generic_instance(typed, vec![int32.into()])),
        );
        w.run(&ExceptionHierarchyPass);

        let typed_wrapper = *w.ctx.extras.system_exception_type.get(typed).unwrap();
        assert_eq!(w.ctx.ty(typed_wrapper).name, "Exception`1");
        assert_eq!(w.ctx.ty(typed_wrapper).generic_params.len(), 1);
        let wrapper = *w.ctx.extras.system_exception_type.get(int_error).unwrap();
        assert_eq!(
            w.ctx.ty(wrapper).base,
            Some(TypeExpr::generic_instance(typed_wrapper, vec![int32.into()]))
        );
    }

    #[test]
    fn wrapper_names_avoid_collisions() {
        let mut w = World::with_runtime();
        let error = w.class("Exception", Some(w.exception));
        w.ctx.add_nested_type(error, "Exception_", TypeAttributes::NESTED_PUBLIC, None);
        assert_eq!(wrapper_name(&w.ctx, error), "Exception__");
    }
}
