//! Runtime surface injection.

use log::debug;

use crate::{compiler::GeneratorPass, model::AppContext, runtime::RuntimeSurface, Result};

/// Locates or creates the runtime-support members generated code calls.
///
/// Every later pass reads the surface through [`AppContext::runtime`].
pub struct ReferenceAssemblyInjectionPass;

impl GeneratorPass for ReferenceAssemblyInjectionPass {
    fn name(&self) -> &'static str {
        "ReferenceAssemblyInjection"
    }

    fn id(&self) -> &'static str {
        "reference_assembly_injection"
    }

    fn description(&self) -> &'static str {
        "Injects the interop runtime and the reference corlib surface"
    }

    fn process(&self, ctx: &mut AppContext) -> Result<()> {
        let surface = RuntimeSurface::inject(ctx)?;
        debug!(
            "Runtime surface bound to assembly {}",
            ctx.assembly(surface.assembly).name
        );
        ctx.runtime = Some(surface);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::fixture::World;

    #[test]
    fn surface_is_available_afterwards() {
        let mut w = World::new();
        assert!(w.ctx.runtime().is_err());
        w.run(&ReferenceAssemblyInjectionPass);
        let rt = w.ctx.runtime().unwrap();
        assert_eq!(w.ctx.full_name(rt.mono.object), "System.Object");
        assert_eq!(
            w.ctx.field(rt.exceptions.il2cpp_object).ty,
            crate::typesystem::TypeExpr::Simple(w.exception)
        );
    }
}
