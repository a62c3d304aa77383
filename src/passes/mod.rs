//! The generator passes.
//!
//! Each pass implements [`GeneratorPass`](crate::compiler::GeneratorPass) and
//! is run once by the [`PassScheduler`](crate::compiler::PassScheduler), in
//! the order below. Passes communicate through the arena and its side
//! tables; a pass reading a datum an earlier pass guarantees treats its
//! absence as an invariant violation.
//!
//! | Pass | Produces |
//! |------|----------|
//! | [`TypeInfoPass`] | blittability, static and instance field lists |
//! | [`UnstripPass`] | members recovered from companion assemblies, original bodies |
//! | [`ReferenceAssemblyInjectionPass`] | the [`RuntimeSurface`](crate::runtime::RuntimeSurface) |
//! | [`ObjectInterfacePass`] | `IObject`, `IValueType`, `IEnum` |
//! | [`InitializationClassPass`] | initialization types, handle storage, static-constructor code |
//! | [`PointerConstructorPass`] | `.ctor(ObjectPointer)` on reference types |
//! | [`PrimitiveImplicitConversionPass`] | primitive and string conversions |
//! | [`EnumPass`] | enum constructors and conversions |
//! | [`FieldAccessorPass`] | fields turned into properties |
//! | [`ExceptionHierarchyPass`] | managed exception wrappers |
//! | [`MarshallingPass`] | `IIl2CppType` and `IIl2CppType<T>` implementations |
//! | [`MethodBodyTranslationPass`] | translated bodies |
//! | [`NativeMethodBodyPass`] | ABI bridge bodies and invoke helpers |
//! | [`ConstantInitializationPass`] | constant fields stored from static constructors |
//! | [`StaticConstructorPass`] | finalized `.cctor`s |

mod bridge;
mod constants;
mod enums;
mod exceptions;
mod fieldaccessor;
mod initialization;
mod marshalling;
mod objectinterface;
mod pointerctor;
mod primitive;
mod reference;
mod staticctor;
mod translation;
mod typeinfo;
mod unstrip;

pub use bridge::NativeMethodBodyPass;
pub use constants::ConstantInitializationPass;
pub use enums::EnumPass;
pub use exceptions::ExceptionHierarchyPass;
pub use fieldaccessor::FieldAccessorPass;
pub use initialization::InitializationClassPass;
pub use marshalling::MarshallingPass;
pub use objectinterface::ObjectInterfacePass;
pub use pointerctor::PointerConstructorPass;
pub use primitive::PrimitiveImplicitConversionPass;
pub use reference::ReferenceAssemblyInjectionPass;
pub use staticctor::StaticConstructorPass;
pub use translation::MethodBodyTranslationPass;
pub use typeinfo::TypeInfoPass;
pub use unstrip::UnstripPass;

use crate::model::{AppContext, AssemblyId};

/// Assemblies whose types receive generated members.
pub(crate) fn generated_assemblies(ctx: &AppContext) -> Vec<AssemblyId> {
    ctx.assemblies()
        .filter(|a| {
            let def = ctx.assembly(*a);
            !def.is_reference && !def.injected
        })
        .collect()
}

#[cfg(test)]
#[allow(dead_code)]
pub(crate) mod fixture;
