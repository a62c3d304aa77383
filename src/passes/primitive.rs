//! Conversions between the native corlib primitives and their `System` twins.

use log::debug;

use crate::{
    assembly::{BodyKind, InstructionList, Label, MethodBody, OpCode, Operand},
    compiler::GeneratorPass,
    model::{AppContext, FieldRef, MethodAttributes, MethodId, MethodRef, ParamDef, TypeId},
    translation::conversion::{mono_primitive, PRIMITIVE_NAMES},
    typesystem::TypeExpr,
    Result,
};

/// Retypes primitive storage and injects `op_Implicit` pairs.
pub struct PrimitiveImplicitConversionPass;

const OPERATOR: MethodAttributes = MethodAttributes::PUBLIC
    .union(MethodAttributes::HIDE_BY_SIG)
    .union(MethodAttributes::SPECIAL_NAME)
    .union(MethodAttributes::STATIC);

fn translated(instructions: InstructionList) -> MethodBody {
    let mut body = MethodBody::new(BodyKind::Translated);
    body.instructions = instructions;
    body
}

fn inject_operator(
    ctx: &mut AppContext,
    ty: TypeId,
    name: &str,
    ret: TypeExpr,
    param: TypeExpr,
    body: InstructionList,
) -> Result<MethodId> {
    let method = ctx.inject_method(ty, name, OPERATOR, ret, vec![ParamDef::new("value", param)]);
    ctx.extras.bodies.attach(method, translated(body))?;
    Ok(method)
}

fn convert_string(ctx: &mut AppContext) -> Result<()> {
    let rt = ctx.runtime()?.clone();
    let string = ctx
        .il2cpp_corlib_type("String")
        .ok_or_else(|| invariant_error!("Il2CppSystem.String is missing"))?;
    let native = TypeExpr::Simple(string);
    let managed = TypeExpr::Simple(rt.mono.string);

    let instance_fields = std::mem::take(
        &mut ctx
            .extras
            .type_info
            .get_mut(string)
            .ok_or_else(|| invariant_error!("Il2CppSystem.String has no type info"))?
            .instance_fields,
    );
    for field in instance_fields {
        ctx.remove_field(field);
    }

    // Il2CppSystem.String -> string
    let mut to_managed = InstructionList::new();
    let convert = to_managed.reserve();
    to_managed.push(OpCode::Ldarg, Operand::Parameter(0));
    to_managed.push(OpCode::Call, MethodRef::from(rt.il2cpp.object_base_to_ptr));
    to_managed.emit(OpCode::Dup);
    to_managed.push(OpCode::Brtrue, Label::Instr(convert));
    to_managed.emit(OpCode::Pop);
    to_managed.emit(OpCode::Ldnull);
    to_managed.emit(OpCode::Ret);
    to_managed.push_reserved(convert, OpCode::Call, MethodRef::from(rt.il2cpp.il2cpp_string_to_managed));
    to_managed.emit(OpCode::Ret);
    inject_operator(ctx, string, "op_Implicit", managed.clone(), native.clone(), to_managed)?;

    // string -> Il2CppSystem.String
    let pointer_ctor = *ctx.extras.pointer_constructor.require(string)?;
    let mut to_native = InstructionList::new();
    let convert = to_native.reserve();
    to_native.push(OpCode::Ldarg, Operand::Parameter(0));
    to_native.emit(OpCode::Dup);
    to_native.push(OpCode::Brtrue, Label::Instr(convert));
    to_native.emit(OpCode::Pop);
    to_native.emit(OpCode::Ldnull);
    to_native.emit(OpCode::Ret);
    to_native.push_reserved(convert, OpCode::Call, MethodRef::from(rt.il2cpp.managed_string_to_il2cpp));
    to_native.push(OpCode::Call, MethodRef::from(rt.interop.object_pointer_from_intptr));
    to_native.push(OpCode::Newobj, MethodRef::from(pointer_ctor));
    to_native.emit(OpCode::Ret);
    inject_operator(ctx, string, "op_Implicit", native, managed, to_native)?;
    Ok(())
}

fn convert_numeric(ctx: &mut AppContext, ty: TypeId) -> Result<()> {
    let mono = mono_primitive(ctx, ty)
        .ok_or_else(|| invariant_error!("{} has no System counterpart", ctx.full_name(ty)))?;
    let info = ctx.extras.type_info.require(ty)?;
    let [field] = info.instance_fields[..] else {
        return Err(invariant_error!(
            "expected exactly one instance field on {}",
            ctx.full_name(ty)
        ));
    };
    let native = TypeExpr::Simple(ty);
    let managed = TypeExpr::Simple(mono);
    ctx.field_mut(field).ty = managed.clone();

    // Il2Cpp -> System
    let mut body = InstructionList::new();
    body.push(OpCode::Ldarg, Operand::Parameter(0));
    body.push(OpCode::Ldfld, FieldRef::from(field));
    body.emit(OpCode::Ret);
    inject_operator(ctx, ty, "op_Implicit", managed.clone(), native.clone(), body)?;

    // System -> Il2Cpp, reinterpreting the bits in place
    let mut body = InstructionList::new();
    body.push(OpCode::Ldarga, Operand::Parameter(0));
    body.emit(OpCode::Conv_U);
    body.push(OpCode::Ldobj, native.clone());
    body.emit(OpCode::Ret);
    inject_operator(ctx, ty, "op_Implicit", native.clone(), managed.clone(), body)?;

    let mut body = InstructionList::new();
    body.push(OpCode::Ldarg, Operand::Parameter(0));
    body.emit(OpCode::Ret);
    let by_ref = ctx.inject_method(
        ty,
        "ConvertReference",
        MethodAttributes::PUBLIC | MethodAttributes::HIDE_BY_SIG | MethodAttributes::STATIC,
        native.by_ref(),
        vec![ParamDef::new("value", managed.by_ref())],
    );
    ctx.extras.bodies.attach(by_ref, translated(body))?;
    Ok(())
}

impl GeneratorPass for PrimitiveImplicitConversionPass {
    fn name(&self) -> &'static str {
        "PrimitiveImplicitConversion"
    }

    fn id(&self) -> &'static str {
        "primitive_implicit_conversions"
    }

    fn description(&self) -> &'static str {
        "Converts native corlib primitives and strings to and from System types"
    }

    fn process(&self, ctx: &mut AppContext) -> Result<()> {
        convert_string(ctx)?;
        for name in PRIMITIVE_NAMES {
            let ty = ctx
                .il2cpp_corlib_type(name)
                .ok_or_else(|| invariant_error!("Il2CppSystem.{} is missing", name))?;
            convert_numeric(ctx, ty)?;
        }
        debug!("Injected conversions for {} primitives", PRIMITIVE_NAMES.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::{fixture::World, PointerConstructorPass, TypeInfoPass};

    fn converted() -> World {
        let mut w = World::with_runtime();
        w.run(&TypeInfoPass);
        w.run(&PointerConstructorPass);
        w.run(&PrimitiveImplicitConversionPass);
        w
    }

    #[test]
    fn numeric_primitives_store_their_system_twin() {
        let w = converted();
        let int32 = w.primitive("Int32");
        let mono = w.ctx.mono_corlib_type("Int32").unwrap();
        let field = w.ctx.field_by_name(int32, "m_value").unwrap();
        assert_eq!(w.ctx.field(field).ty, TypeExpr::Simple(mono));

        let to_mono = w.ctx.implicit_conversion_to(int32, &TypeExpr::Simple(mono)).unwrap();
        let body = &w.ctx.extras.bodies.get(to_mono).unwrap().instructions;
        assert_eq!(body.opcodes(), vec![OpCode::Ldarg, OpCode::Ldfld, OpCode::Ret]);

        let from_mono = w.ctx.implicit_conversion_from(int32, &TypeExpr::Simple(mono)).unwrap();
        let body = &w.ctx.extras.bodies.get(from_mono).unwrap().instructions;
        assert_eq!(body.opcodes(), vec![OpCode::Ldarga, OpCode::Conv_U, OpCode::Ldobj, OpCode::Ret]);

        let by_ref = w.ctx.method_by_name(int32, "ConvertReference").unwrap();
        assert_eq!(w.ctx.method(by_ref).return_type, TypeExpr::Simple(int32).by_ref());
    }

    #[test]
    fn strings_lose_their_layout_and_pass_null_through() {
        let w = converted();
        let string = w.string;
        assert!(w.ctx.field_by_name(string, "_firstChar").is_none());
        assert!(w.ctx.field_by_name(string, "Empty").is_some());
        assert!(w.ctx.extras.type_info.get(string).unwrap().instance_fields.is_empty());

        let rt = w.ctx.runtime().unwrap();
        let to_native = w
            .ctx
            .implicit_conversion_from(string, &TypeExpr::Simple(rt.mono.string))
            .unwrap();
        let body = &w.ctx.extras.bodies.get(to_native).unwrap().instructions;
        assert_eq!(
            body.opcodes(),
            vec![
                OpCode::Ldarg,
                OpCode::Dup,
                OpCode::Brtrue,
                OpCode::Pop,
                OpCode::Ldnull,
                OpCode::Ret,
                OpCode::Call,
                OpCode::Call,
                OpCode::Newobj,
                OpCode::Ret,
            ]
        );
        let Operand::Label(target) = body.get(2).unwrap().operand else {
            panic!("brtrue without a label");
        };
        assert_eq!(body.resolve(target), Some(6));
    }
}
