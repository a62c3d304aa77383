//! Enums as sequential structs over their native underlying primitive.

use log::debug;

use crate::{
    assembly::{InstructionList, MethodBody, OpCode, Operand},
    compiler::GeneratorPass,
    model::{
        AppContext, EnumUnderlying, FieldAttributes, FieldRef, MethodAttributes, MethodId, MethodRef,
        ParamDef, TypeAttributes, TypeId,
    },
    translation::conversion::mono_primitive,
    typesystem::TypeExpr,
    Result,
};

/// Records enum underlying types and injects the constructor and
/// `op_Explicit` conversions.
pub struct EnumPass;

const CONVERSION: MethodAttributes = MethodAttributes::PUBLIC
    .union(MethodAttributes::HIDE_BY_SIG)
    .union(MethodAttributes::STATIC)
    .union(MethodAttributes::SPECIAL_NAME);

fn native(ctx: &mut AppContext, method: MethodId, body: InstructionList) -> Result<()> {
    ctx.extras.bodies.attach(method, MethodBody::native(body))
}

fn conversion(ctx: &mut AppContext, ty: TypeId, ret: TypeExpr, param: TypeExpr) -> MethodId {
    ctx.inject_method(ty, "op_Explicit", CONVERSION, ret, vec![ParamDef::new("value", param)])
}

fn process_enum(ctx: &mut AppContext, ty: TypeId) -> Result<()> {
    let layout = TypeAttributes::SEQUENTIAL_LAYOUT | TypeAttributes::EXPLICIT_LAYOUT;
    let def = ctx.ty_mut(ty);
    def.attributes = (def.attributes - layout) | TypeAttributes::SEQUENTIAL_LAYOUT;

    let value = ctx
        .field_by_name(ty, "value__")
        .ok_or_else(|| invariant_error!("enum {} has no value__ field", ctx.full_name(ty)))?;
    ctx.field_mut(value).attributes = FieldAttributes::PRIVATE | FieldAttributes::INIT_ONLY;

    let il2cpp = ctx.field(value).ty.clone();
    let mono = il2cpp
        .as_simple()
        .and_then(|p| mono_primitive(ctx, p))
        .map(TypeExpr::Simple)
        .ok_or_else(|| invariant_error!("enum {} is not backed by a primitive", ctx.full_name(ty)))?;
    let (Some(to_mono), Some(from_mono)) = (
        il2cpp
            .as_simple()
            .and_then(|p| ctx.implicit_conversion_to(p, &mono)),
        il2cpp
            .as_simple()
            .and_then(|p| ctx.implicit_conversion_from(p, &mono)),
    ) else {
        return Err(invariant_error!("{} lacks its primitive conversions", ctx.full_name(ty)));
    };
    ctx.extras.enum_underlying.attach(
        ty,
        EnumUnderlying {
            il2cpp: il2cpp.clone(),
            mono: mono.clone(),
        },
    )?;

    let this_type = TypeExpr::Simple(ty);
    let void = ctx.runtime()?.mono.void_type();
    let constructor = ctx.inject_method(
        ty,
        ".ctor",
        MethodAttributes::PUBLIC
            | MethodAttributes::HIDE_BY_SIG
            | MethodAttributes::SPECIAL_NAME
            | MethodAttributes::RT_SPECIAL_NAME,
        void,
        vec![ParamDef::new("value", il2cpp.clone())],
    );
    let mut body = InstructionList::new();
    body.push(OpCode::Ldarg, Operand::This);
    body.push(OpCode::Ldarg, Operand::Parameter(0));
    body.push(OpCode::Stfld, FieldRef::from(value));
    body.emit(OpCode::Ret);
    native(ctx, constructor, body)?;

    // enum -> Il2CppSystem primitive
    let to_il2cpp = conversion(ctx, ty, il2cpp.clone(), this_type.clone());
    let mut body = InstructionList::new();
    body.push(OpCode::Ldarga, Operand::Parameter(0));
    body.push(OpCode::Ldfld, FieldRef::from(value));
    body.emit(OpCode::Ret);
    native(ctx, to_il2cpp, body)?;

    // Il2CppSystem primitive -> enum
    let from_il2cpp = conversion(ctx, ty, this_type.clone(), il2cpp);
    let mut body = InstructionList::new();
    body.push(OpCode::Ldarg, Operand::Parameter(0));
    body.push(OpCode::Newobj, MethodRef::from(constructor));
    body.emit(OpCode::Ret);
    native(ctx, from_il2cpp, body)?;

    // enum -> System primitive
    let method = conversion(ctx, ty, mono.clone(), this_type.clone());
    let mut body = InstructionList::new();
    body.push(OpCode::Ldarg, Operand::Parameter(0));
    body.push(OpCode::Call, MethodRef::from(to_il2cpp));
    body.push(OpCode::Call, MethodRef::from(to_mono));
    body.emit(OpCode::Ret);
    native(ctx, method, body)?;

    // System primitive -> enum
    let method = conversion(ctx, ty, this_type, mono);
    let mut body = InstructionList::new();
    body.push(OpCode::Ldarg, Operand::Parameter(0));
    body.push(OpCode::Call, MethodRef::from(from_mono));
    body.push(OpCode::Call, MethodRef::from(from_il2cpp));
    body.emit(OpCode::Ret);
    native(ctx, method, body)
}

impl GeneratorPass for EnumPass {
    fn name(&self) -> &'static str {
        "Enum"
    }

    fn id(&self) -> &'static str {
        "enum_processor"
    }

    fn description(&self) -> &'static str {
        "Gives enums a constructor and conversions to their underlying primitive"
    }

    fn process(&self, ctx: &mut AppContext) -> Result<()> {
        let base = ctx
            .il2cpp_corlib_type("Enum")
            .map(TypeExpr::Simple)
            .ok_or_else(|| invariant_error!("Il2CppSystem.Enum is missing"))?;
        let assemblies: Vec<_> = ctx
            .assemblies()
            .filter(|a| !ctx.assembly(*a).is_reference)
            .collect();

        let mut count = 0usize;
        for assembly in assemblies {
            for ty in ctx.types_of(assembly) {
                if ctx.ty(ty).base.as_ref() != Some(&base) {
                    continue;
                }
                process_enum(ctx, ty)?;
                count += 1;
            }
        }
        debug!("Processed {count} enums");
        Ok(())
    }
}
