//! Finalization of the queued static constructor instructions.

use log::debug;

use crate::{
    assembly::{MethodBody, OpCode},
    compiler::GeneratorPass,
    model::{AppContext, MethodAttributes, MethodId, TypeId},
    Result,
};

/// Turns every queued instruction list into a `.cctor`.
pub struct StaticConstructorPass;

const STATIC_CONSTRUCTOR: MethodAttributes = MethodAttributes::STATIC
    .union(MethodAttributes::HIDE_BY_SIG)
    .union(MethodAttributes::SPECIAL_NAME)
    .union(MethodAttributes::RT_SPECIAL_NAME);

/// Moves a native static constructor out of the way under a plain name,
/// `StaticConstructor` prefixed with underscores until it is free.
fn rename_native(ctx: &mut AppContext, ty: TypeId, method: MethodId) {
    let mut name = "StaticConstructor".to_string();
    while ctx.method_by_name(ty, &name).is_some() {
        name.insert(0, '_');
    }
    let def = ctx.method_mut(method);
    def.attributes -= MethodAttributes::SPECIAL_NAME | MethodAttributes::RT_SPECIAL_NAME;
    def.name = name;
}

impl GeneratorPass for StaticConstructorPass {
    fn name(&self) -> &'static str {
        "StaticConstructor"
    }

    fn id(&self) -> &'static str {
        "static_constructor_processor"
    }

    fn description(&self) -> &'static str {
        "Emits the accumulated static constructors"
    }

    fn process(&self, ctx: &mut AppContext) -> Result<()> {
        let mut types: Vec<TypeId> = ctx
            .extras
            .static_ctor_instructions
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(ty, _)| ty)
            .collect();
        types.sort_unstable();

        let void = ctx.runtime()?.mono.void_type();
        for &ty in &types {
            if let Some(existing) = ctx.method_by_name(ty, ".cctor") {
                if ctx.method(existing).injected {
                    return Err(invariant_error!(
                        "{} already has a synthesized static constructor",
                        ctx.full_name(ty)
                    ));
                }
                rename_native(ctx, ty, existing);
            }

            let Some(mut instructions) = ctx.extras.static_ctor_instructions.remove(ty) else {
                continue;
            };
            instructions.emit(OpCode::Ret);
            let cctor = ctx.inject_method(ty, ".cctor", STATIC_CONSTRUCTOR, void.clone(), Vec::new());
            ctx.extras.bodies.attach(cctor, MethodBody::native(instructions))?;
        }
        debug!("Finalized {} static constructors", types.len());
        Ok(())
    }
}
