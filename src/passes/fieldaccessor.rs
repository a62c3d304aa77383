//! Fields turned into properties backed by native storage.
//!
//! Generated reference types do not own their fields; the native object
//! does. Each field becomes a property whose accessors read and write
//! through `FieldAccessHelper`, addressed by the field handle (statics) or
//! byte offset (instances) the initialization class resolved.

use log::debug;

use crate::{
    assembly::{InstructionList, MethodBody, OpCode, Operand},
    compiler::GeneratorPass,
    model::{
        AppContext, FieldId, FieldRef, MethodAttributes, MethodRef, ParamDef, PropertyAccessor, TypeId,
    },
    passes::generated_assemblies,
    runtime::RuntimeSurface,
    Result,
};

/// Replaces fields with native-backed properties.
pub struct FieldAccessorPass {
    write_barrier: bool,
}

impl FieldAccessorPass {
    /// Creates the pass.
    ///
    /// With `write_barrier` set, reference stores into instance fields go
    /// through the garbage collector's write barrier.
    #[must_use]
    pub fn new(write_barrier: bool) -> Self {
        Self { write_barrier }
    }
}

fn storage(ctx: &AppContext, ty: TypeId, field: FieldId, is_static: bool) -> Result<FieldRef> {
    let table = if is_static {
        &ctx.extras.field_info_storage
    } else {
        &ctx.extras.offset_storage
    };
    Ok(FieldRef::on_instance(*table.require(field)?, ctx.type_params(ty)))
}

impl FieldAccessorPass {
    fn convert(&self, ctx: &mut AppContext, rt: &RuntimeSurface, field: FieldId) -> Result<()> {
        let def = ctx.field(field).clone();
        let ty = def.declaring;
        let is_static = def.is_static();
        let store = storage(ctx, ty, field, is_static)?;
        let value_args = vec![def.ty.clone()];

        let mut attributes = MethodAttributes::PUBLIC | MethodAttributes::HIDE_BY_SIG | MethodAttributes::SPECIAL_NAME;
        if is_static {
            attributes |= MethodAttributes::STATIC;
        }

        let getter = ctx.inject_method(ty, &format!("get_{}", def.name), attributes, def.ty.clone(), Vec::new());
        let mut body = InstructionList::new();
        if is_static {
            body.push(OpCode::Ldsfld, store.clone());
            body.push(OpCode::Call, MethodRef::generic(rt.field_access.get_static, value_args.clone()));
        } else {
            body.push(OpCode::Ldarg, Operand::This);
            body.push(OpCode::Ldsfld, store.clone());
            body.push(OpCode::Call, MethodRef::generic(rt.field_access.get_instance, value_args.clone()));
        }
        body.emit(OpCode::Ret);
        ctx.extras.bodies.attach(getter, MethodBody::native(body))?;

        let setter = ctx.inject_method(
            ty,
            &format!("set_{}", def.name),
            attributes,
            rt.mono.void_type(),
            vec![ParamDef::new("value", def.ty.clone())],
        );
        let mut body = InstructionList::new();
        if is_static {
            body.push(OpCode::Ldsfld, store);
            body.push(OpCode::Ldarg, Operand::Parameter(0));
            body.push(OpCode::Call, MethodRef::generic(rt.field_access.set_static, value_args));
        } else {
            let set_instance = if self.write_barrier {
                rt.field_access.set_instance_write_barrier
            } else {
                rt.field_access.set_instance_pointer
            };
            body.push(OpCode::Ldarg, Operand::This);
            body.push(OpCode::Ldsfld, store);
            body.push(OpCode::Ldarg, Operand::Parameter(0));
            body.push(OpCode::Call, MethodRef::generic(set_instance, value_args));
        }
        body.emit(OpCode::Ret);
        ctx.extras.bodies.attach(setter, MethodBody::native(body))?;

        let property = ctx.inject_property(ty, &def.name, def.ty, Some(getter), Some(setter));
        ctx.extras.property_accessor.attach(
            field,
            PropertyAccessor {
                property,
                getter,
                setter,
            },
        )?;
        ctx.remove_field(field);
        Ok(())
    }
}

impl GeneratorPass for FieldAccessorPass {
    fn name(&self) -> &'static str {
        "FieldAccessor"
    }

    fn id(&self) -> &'static str {
        "field_accessor_processor"
    }

    fn description(&self) -> &'static str {
        "Replaces fields with properties that access native memory"
    }

    fn process(&self, ctx: &mut AppContext) -> Result<()> {
        let rt = ctx.runtime()?.clone();
        let mut converted = 0usize;
        for assembly in generated_assemblies(ctx) {
            for ty in ctx.types_of(assembly) {
                if ctx.is_injected_type(ty) {
                    continue;
                }
                let value_type = ctx.is_value_type(ty);
                let fields: Vec<FieldId> = ctx
                    .ty(ty)
                    .fields
                    .iter()
                    .copied()
                    .filter(|f| {
                        let def = ctx.field(*f);
                        (!value_type || def.is_static()) && def.constant.is_none() && !def.injected
                    })
                    .collect();
                for field in fields {
                    self.convert(ctx, &rt, field)?;
                    converted += 1;
                }
            }
        }
        debug!("Converted {converted} fields into properties");
        Ok(())
    }
}
