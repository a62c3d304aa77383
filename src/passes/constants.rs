//! Constant fields assigned at type initialization.
//!
//! A constant field of a generated type keeps its declaration, but the
//! native runtime never writes its default value into managed storage. Each
//! one is stored from the type's static constructor, converted from its
//! managed literal to the native field type first.

use log::debug;

use crate::{
    assembly::{Constant, InstructionList, OpCode},
    compiler::GeneratorPass,
    model::{AppContext, FieldId, FieldRef, TypeId},
    passes::generated_assemblies,
    translation::conversion::{bridging_to_native, mono_string_to_il2cpp},
    Result,
};

/// Queues a store of every constant field into its type's static constructor.
pub struct ConstantInitializationPass;

/// The load for a literal, with narrow integers and booleans widened to `ldc.i4`.
fn load(constant: &Constant) -> (OpCode, Constant) {
    match constant {
        Constant::Boolean(value) => (OpCode::Ldc_I4, Constant::Int32(i32::from(*value))),
        Constant::Char(value) => (OpCode::Ldc_I4, Constant::Int32(i32::from(*value))),
        Constant::Int32(_) => (OpCode::Ldc_I4, constant.clone()),
        Constant::Int64(_) => (OpCode::Ldc_I8, constant.clone()),
        Constant::Float32(_) => (OpCode::Ldc_R4, constant.clone()),
        Constant::Float64(_) => (OpCode::Ldc_R8, constant.clone()),
        Constant::String(_) => (OpCode::Ldstr, constant.clone()),
    }
}

fn store(ctx: &AppContext, ty: TypeId, field: FieldId, out: &mut InstructionList) -> Result<()> {
    let def = ctx.field(field);
    let Some(constant) = &def.constant else {
        return Ok(());
    };
    if !def.is_static() {
        return Err(invariant_error!(
            "Constant field {}::{} is not static",
            ctx.full_name(ty),
            def.name
        ));
    }

    let (opcode, literal) = load(constant);
    out.push(opcode, literal);
    if opcode == OpCode::Ldstr {
        mono_string_to_il2cpp(ctx, out)?;
    } else {
        bridging_to_native(ctx, &def.ty, out)?;
    }
    out.push(OpCode::Stsfld, FieldRef::on_instance(field, ctx.type_params(ty)));
    Ok(())
}

impl GeneratorPass for ConstantInitializationPass {
    fn name(&self) -> &'static str {
        "ConstantInitialization"
    }

    fn id(&self) -> &'static str {
        "constant_initialization_processor"
    }

    fn description(&self) -> &'static str {
        "Assigns constant fields from static constructors"
    }

    fn process(&self, ctx: &mut AppContext) -> Result<()> {
        let mut stored = 0usize;
        for assembly in generated_assemblies(ctx) {
            for ty in ctx.types_of(assembly) {
                if ctx.is_injected_type(ty) {
                    continue;
                }
                let fields: Vec<FieldId> = ctx
                    .ty(ty)
                    .fields
                    .iter()
                    .copied()
                    .filter(|f| {
                        let def = ctx.field(*f);
                        def.constant.is_some() && !def.injected
                    })
                    .collect();
                if fields.is_empty() {
                    continue;
                }

                let mut out = InstructionList::new();
                for &field in &fields {
                    store(ctx, ty, field, &mut out)?;
                }
                ctx.extras
                    .static_ctor_instructions
                    .get_or_default_mut(ty)
                    .extend_from(&out);
                stored += fields.len();
            }
        }
        debug!("Queued {stored} constant field stores");
        Ok(())
    }
}
