//! `IIl2CppType` and `IIl2CppType<T>` on every generated type.
//!
//! The invoke helpers, arrays and field accessors constrain their type
//! arguments to `IIl2CppType<T>`, so each generated type explains how it is
//! laid out natively: its size, its class pointer, and how to read or write
//! a value of it from a span of native memory.
//!
//! Reference types store a single object pointer. Primitives are copied
//! byte for byte. Every other value type is read and written one instance
//! field at a time, at the offsets the initialization class resolved.

use log::debug;

use crate::{
    assembly::{InstructionList, MethodBody, OpCode, Operand},
    compiler::GeneratorPass,
    model::{
        AppContext, FieldId, FieldRef, MethodAttributes, MethodId, MethodRef, ParamDef, TypeId,
    },
    passes::generated_assemblies,
    runtime::RuntimeSurface,
    translation::conversion::mono_primitive,
    typesystem::TypeExpr,
    Result,
};

/// Implements the marshalling interfaces on generated types.
pub struct MarshallingPass;

const IMPLEMENTATION: MethodAttributes = MethodAttributes::PRIVATE.union(MethodAttributes::HIDE_BY_SIG);

/// How values of a type are laid out in native memory.
enum Layout {
    /// An object pointer.
    Reference,
    /// A value type without instance fields.
    Empty,
    /// A corlib primitive, copied as raw bytes.
    Primitive,
    /// A value type copied field by field.
    Fields(Vec<FieldId>),
}

struct Marshaller<'a> {
    ctx: &'a mut AppContext,
    rt: RuntimeSurface,
}

impl Marshaller<'_> {
    fn layout(&self, ty: TypeId) -> Result<Layout> {
        let info = self.ctx.extras.type_info.require(ty)?;
        if !info.blittability.is_value_type() {
            return Ok(Layout::Reference);
        }
        if info.instance_fields.is_empty() {
            return Ok(Layout::Empty);
        }
        if mono_primitive(self.ctx, ty).is_some() {
            return Ok(Layout::Primitive);
        }
        Ok(Layout::Fields(info.instance_fields.clone()))
    }

    /// The `FieldOffset_*` storage of an instance field, over the type's own parameters.
    fn offset(&self, ty: TypeId, field: FieldId) -> Result<FieldRef> {
        let store = *self.ctx.extras.offset_storage.require(field)?;
        Ok(FieldRef::on_instance(store, self.ctx.type_params(ty)))
    }

    fn implement(&mut self, ty: TypeId) -> Result<()> {
        let rt = self.rt.clone();
        let this = self.ctx.self_instance(ty);
        let generic_interface = TypeExpr::generic_instance(rt.interop.iil2cpp_type_generic, vec![this.clone()]);
        let def = self.ctx.ty_mut(ty);
        def.interfaces.push(TypeExpr::Simple(rt.interop.iil2cpp_type));
        def.interfaces.push(generic_interface.clone());

        let interface_name = self.ctx.full_name(rt.interop.iil2cpp_type);
        let generic_name = format!("{interface_name}<{}>", self.ctx.type_expr_name(&this));
        let layout = self.layout(ty)?;

        self.size(ty, &interface_name)?;
        self.object_class(ty, &interface_name, &this)?;
        self.read_from_span(ty, &generic_name, &this, &layout)?;
        self.write_to_span(ty, &generic_name, &this, &layout)?;
        Ok(())
    }

    fn getter(
        &mut self,
        ty: TypeId,
        interface_name: &str,
        property: &str,
        attributes: MethodAttributes,
        return_type: TypeExpr,
        overrides: MethodId,
        body: InstructionList,
    ) -> Result<MethodId> {
        let method = self.ctx.inject_method(
            ty,
            &format!("{interface_name}.get_{property}"),
            attributes,
            return_type.clone(),
            Vec::new(),
        );
        self.ctx.method_mut(method).overrides.push(MethodRef::from(overrides));
        self.ctx.extras.bodies.attach(method, MethodBody::native(body))?;
        self.ctx
            .inject_property(ty, &format!("{interface_name}.{property}"), return_type, Some(method), None);
        Ok(method)
    }

    fn size(&mut self, ty: TypeId, interface_name: &str) -> Result<MethodId> {
        let mut body = InstructionList::new();
        match self.ctx.extras.size_storage.get(ty) {
            Some(&size) => body.push(OpCode::Ldsfld, FieldRef::on_instance(size, self.ctx.type_params(ty))),
            None => body.push(OpCode::Call, MethodRef::from(self.rt.mono.intptr_size)),
        };
        body.emit(OpCode::Ret);
        let attributes = IMPLEMENTATION | MethodAttributes::STATIC | MethodAttributes::SPECIAL_NAME;
        let int32 = self.rt.mono.int32_type();
        self.getter(ty, interface_name, "Size", attributes, int32, self.rt.interop.get_size, body)
    }

    fn object_class(&mut self, ty: TypeId, interface_name: &str, this: &TypeExpr) -> Result<MethodId> {
        let mut body = InstructionList::new();
        body.push(OpCode::Ldsfld, self.rt.class_pointer(this.clone()));
        body.emit(OpCode::Ret);
        let mut attributes =
            IMPLEMENTATION | MethodAttributes::VIRTUAL | MethodAttributes::FINAL | MethodAttributes::SPECIAL_NAME;
        if !self.ctx.ty(ty).is_interface() {
            attributes |= MethodAttributes::NEW_SLOT;
        }
        let intptr = self.rt.mono.intptr_type();
        self.getter(ty, interface_name, "ObjectClass", attributes, intptr, self.rt.interop.get_object_class, body)
    }

    fn read_from_span(&mut self, ty: TypeId, generic_name: &str, this: &TypeExpr, layout: &Layout) -> Result<MethodId> {
        let rt = self.rt.clone();
        let method = self.ctx.inject_method(
            ty,
            &format!("{generic_name}.ReadFromSpan"),
            IMPLEMENTATION | MethodAttributes::STATIC,
            this.clone(),
            vec![ParamDef::new("span", rt.mono.read_only_byte_span())],
        );
        self.ctx
            .method_mut(method)
            .overrides
            .push(MethodRef::on_instance(rt.interop.read_from_span, vec![this.clone()]));

        let mut body = MethodBody::native(InstructionList::new());
        let whole = |helper: MethodId| MethodRef::generic(helper, vec![this.clone()]);
        match layout {
            Layout::Reference => {
                body.instructions.push(OpCode::Ldarg, Operand::Parameter(0));
                body.instructions.push(OpCode::Call, whole(rt.type_helper.read_reference));
            }
            Layout::Primitive => {
                body.instructions.push(OpCode::Ldarg, Operand::Parameter(0));
                body.instructions.push(OpCode::Call, whole(rt.type_helper.read_from_span_blittable));
            }
            Layout::Empty => {
                let value = body.add_local(this.clone());
                body.instructions.push(OpCode::Ldloca, Operand::Local(value));
                body.instructions.push(OpCode::Initobj, this.clone());
                body.instructions.push(OpCode::Ldloc, Operand::Local(value));
            }
            Layout::Fields(fields) => {
                let value = body.add_local(this.clone());
                body.instructions.push(OpCode::Ldloca, Operand::Local(value));
                body.instructions.push(OpCode::Initobj, this.clone());
                for &field in fields {
                    let field_type = self.ctx.field(field).ty.clone();
                    body.instructions.push(OpCode::Ldloca, Operand::Local(value));
                    body.instructions.push(OpCode::Ldarg, Operand::Parameter(0));
                    body.instructions.push(OpCode::Ldsfld, self.offset(ty, field)?);
                    body.instructions.push(
                        OpCode::Call,
                        MethodRef::generic(rt.type_helper.read_from_span_at_offset, vec![field_type]),
                    );
                    body.instructions
                        .push(OpCode::Stfld, FieldRef::on_instance(field, self.ctx.type_params(ty)));
                }
                body.instructions.push(OpCode::Ldloc, Operand::Local(value));
            }
        }
        body.instructions.emit(OpCode::Ret);
        self.ctx.extras.bodies.attach(method, body)?;
        Ok(method)
    }

    fn write_to_span(&mut self, ty: TypeId, generic_name: &str, this: &TypeExpr, layout: &Layout) -> Result<MethodId> {
        let rt = self.rt.clone();
        let method = self.ctx.inject_method(
            ty,
            &format!("{generic_name}.WriteToSpan"),
            IMPLEMENTATION | MethodAttributes::STATIC,
            rt.mono.void_type(),
            vec![
                ParamDef::new("value", this.clone()),
                ParamDef::new("span", rt.mono.byte_span()),
            ],
        );
        self.ctx
            .method_mut(method)
            .overrides
            .push(MethodRef::on_instance(rt.interop.write_to_span, vec![this.clone()]));

        let mut body = InstructionList::new();
        let whole = |helper: MethodId| MethodRef::generic(helper, vec![this.clone()]);
        match layout {
            Layout::Reference => {
                body.push(OpCode::Ldarg, Operand::Parameter(0));
                body.push(OpCode::Ldarg, Operand::Parameter(1));
                body.push(OpCode::Call, whole(rt.type_helper.write_reference));
            }
            Layout::Primitive => {
                body.push(OpCode::Ldarg, Operand::Parameter(0));
                body.push(OpCode::Ldarg, Operand::Parameter(1));
                body.push(OpCode::Call, whole(rt.type_helper.write_to_span_blittable));
            }
            Layout::Empty => {}
            Layout::Fields(fields) => {
                for &field in fields {
                    let field_type = self.ctx.field(field).ty.clone();
                    body.push(OpCode::Ldarga, Operand::Parameter(0));
                    body.push(OpCode::Ldfld, FieldRef::on_instance(field, self.ctx.type_params(ty)));
                    body.push(OpCode::Ldarg, Operand::Parameter(1));
                    body.push(OpCode::Ldsfld, self.offset(ty, field)?);
                    body.push(
                        OpCode::Call,
                        MethodRef::generic(rt.type_helper.write_to_span_at_offset, vec![field_type]),
                    );
                }
            }
        }
        body.emit(OpCode::Ret);
        self.ctx.extras.bodies.attach(method, MethodBody::native(body))?;
        Ok(method)
    }
}

impl GeneratorPass for MarshallingPass {
    fn name(&self) -> &'static str {
        "Marshalling"
    }

    fn id(&self) -> &'static str {
        "marshalling_processor"
    }

    fn description(&self) -> &'static str {
        "Implements IIl2CppType on generated types"
    }

    fn process(&self, ctx: &mut AppContext) -> Result<()> {
        let rt = ctx.runtime()?.clone();
        let mut marshaller = Marshaller { ctx: &mut *ctx, rt };
        let mut implemented = 0usize;
        for assembly in generated_assemblies(marshaller.ctx) {
            for ty in marshaller.ctx.types_of(assembly) {
                if marshaller.ctx.is_injected_type(ty) {
                    continue;
                }
                marshaller.implement(ty)?;
                implemented += 1;
            }
        }
        debug!("Implemented IIl2CppType on {implemented} types");
        Ok(())
    }
}
