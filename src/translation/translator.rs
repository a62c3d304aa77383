//! Instruction-level translation of recovered bodies.
//!
//! Storage locations (locals, arguments, fields, array elements) keep native
//! values while the evaluation stack carries bridging values. Every
//! instruction that moves a value between the two is therefore paired with a
//! conversion call from [`super::conversion`]: loads are followed by
//! native-to-bridging, stores are preceded by bridging-to-native.
//!
//! Each original instruction becomes a group of one or more output
//! instructions. The first instruction of a group takes over the identity
//! reserved for the original, so a branch into the group always lands before
//! any inserted conversion.
//!
//! # Unsupported constructs
//!
//! The translator never emits a partial body. The first construct it cannot
//! express aborts the whole method with [`Translation::Unsupported`]:
//!
//! - `arglist`, `refanytype`, `mkrefany`, `refanyval`
//! - `ldelem.ref`, `stelem.ref`, `ldind.ref`, `stind.ref`
//! - `sizeof`, `newarr`, `ldelema`
//! - method tokens (`ldtoken`, `ldftn`, `ldvirtftn`, `jmp`)
//! - field addresses and field tokens, and fields that no longer exist
//! - multi-dimensional array accessors

use std::collections::HashMap;

use super::{
    conversion::{bridging_to_native, mono_string_to_il2cpp, native_to_bridging, TypeConversion},
    Translation,
};
use crate::{
    assembly::{
        BodyKind, Constant, ExceptionHandler, InstrId, InstructionList, Label, LocalVariable,
        MethodBody, OpCode, Operand,
    },
    model::{AppContext, FieldRef, MethodId, MethodRef},
    runtime::RuntimeSurface,
    typesystem::TypeExpr,
    Error, Result,
};

enum Abort {
    Unsupported(String),
    Fatal(Error),
}

impl From<Error> for Abort {
    fn from(error: Error) -> Self {
        Abort::Fatal(error)
    }
}

type Step = std::result::Result<(), Abort>;

fn unsupported(reason: impl Into<String>) -> Step {
    Err(Abort::Unsupported(reason.into()))
}

/// The output instructions standing in for one original instruction.
struct Group {
    slot: Option<InstrId>,
}

struct Translator<'a> {
    ctx: &'a AppContext,
    rt: &'a RuntimeSurface,
    method: MethodId,
    conversion: TypeConversion,
    out: InstructionList,
    locals: Vec<LocalVariable>,
    ids: HashMap<InstrId, InstrId>,
}

impl Translator<'_> {
    fn put(&mut self, group: &mut Group, opcode: OpCode, operand: impl Into<Operand>) {
        match group.slot.take() {
            Some(id) => self.out.push_reserved(id, opcode, operand),
            None => self.out.push(opcode, operand),
        };
    }

    fn splice(&mut self, group: &mut Group, scratch: &InstructionList) {
        for instr in scratch {
            self.put(group, instr.opcode, instr.operand.clone());
        }
    }

    fn to_bridging(&mut self, group: &mut Group, ty: &TypeExpr) -> Step {
        let mut scratch = InstructionList::new();
        native_to_bridging(self.ctx, ty, &mut scratch)?;
        self.splice(group, &scratch);
        Ok(())
    }

    fn to_native(&mut self, group: &mut Group, ty: &TypeExpr) -> Step {
        let mut scratch = InstructionList::new();
        bridging_to_native(self.ctx, ty, &mut scratch)?;
        self.splice(group, &scratch);
        Ok(())
    }

    fn label(&self, label: Label) -> std::result::Result<Label, Abort> {
        match label {
            Label::End => Ok(Label::End),
            Label::Instr(id) => self.ids.get(&id).map(|n| Label::Instr(*n)).ok_or_else(|| {
                Abort::Fatal(invariant_error!("label {} leaves the body", id))
            }),
        }
    }

    fn parameter_type(&self, index: u16) -> std::result::Result<TypeExpr, Abort> {
        self.ctx
            .method(self.method)
            .params
            .get(usize::from(index))
            .map(|p| p.ty.clone())
            .ok_or_else(|| Abort::Unsupported(format!("parameter {index} out of range")))
    }

    fn local_type(&self, index: u32) -> std::result::Result<TypeExpr, Abort> {
        self.locals
            .get(index as usize)
            .map(|l| l.ty.clone())
            .ok_or_else(|| Abort::Unsupported(format!("local {index} out of range")))
    }

    fn mono(&self, opcode: OpCode) -> Option<TypeExpr> {
        let m = &self.rt.mono;
        let id = match opcode {
            OpCode::Ldelem_I1 | OpCode::Stelem_I1 => m.sbyte,
            OpCode::Ldelem_U1 => m.byte,
            OpCode::Ldelem_I2 | OpCode::Stelem_I2 => m.int16,
            OpCode::Ldelem_U2 => m.uint16,
            OpCode::Ldelem_I4 | OpCode::Stelem_I4 => m.int32,
            OpCode::Ldelem_U4 => m.uint32,
            OpCode::Ldelem_I8 | OpCode::Stelem_I8 => m.int64,
            OpCode::Ldelem_I | OpCode::Stelem_I => m.intptr,
            OpCode::Ldelem_R4 | OpCode::Stelem_R4 => m.single,
            OpCode::Ldelem_R8 | OpCode::Stelem_R8 => m.double,
            _ => return None,
        };
        Some(TypeExpr::Simple(id))
    }

    fn bare(&mut self, group: &mut Group, opcode: OpCode) -> Step {
        if opcode.is_primitive_ldelem() || opcode.is_primitive_stelem() {
            let element = self.mono(opcode).ok_or_else(|| Abort::Unsupported(opcode.to_string()))?;
            let helper = if opcode.is_primitive_ldelem() {
                self.rt.arrays.load_element_unsafe
            } else {
                self.rt.arrays.store_element_unsafe
            };
            self.put(group, OpCode::Callvirt, MethodRef::generic(helper, vec![element]));
            return Ok(());
        }
        match opcode {
            OpCode::Arglist
            | OpCode::Ldelem_Ref
            | OpCode::Stelem_Ref
            | OpCode::Ldind_Ref
            | OpCode::Stind_Ref
            | OpCode::Refanytype => return unsupported(opcode.mnemonic()),
            OpCode::Ldlen => {
                self.put(group, OpCode::Callvirt, MethodRef::from(self.rt.arrays.get_length));
            }
            OpCode::Throw => {
                let create = self.rt.exceptions.create_system_exception;
                self.put(group, OpCode::Callvirt, MethodRef::from(create));
                self.put(group, OpCode::Throw, Operand::None);
            }
            OpCode::Ret => {
                let return_type = self.ctx.method(self.method).return_type.clone();
                self.to_native(group, &return_type)?;
                self.put(group, OpCode::Ret, Operand::None);
            }
            OpCode::Volatile => self.put(group, OpCode::Nop, Operand::None),
            other => self.put(group, other, Operand::None),
        }
        Ok(())
    }

    fn type_operand(&mut self, group: &mut Group, opcode: OpCode, ty: &TypeExpr) -> Step {
        let converted = self.conversion.convert(ty);
        match opcode {
            OpCode::Castclass
            | OpCode::Constrained
            | OpCode::Cpobj
            | OpCode::Initobj
            | OpCode::Isinst
            | OpCode::Ldobj
            | OpCode::Stobj
            | OpCode::Unbox_Any => self.put(group, opcode, converted),
            OpCode::Box => {
                self.to_native(group, &converted)?;
                self.put(group, OpCode::Box, converted);
            }
            OpCode::Unbox => {
                self.put(group, OpCode::Unbox, converted.clone());
                self.to_bridging(group, &converted)?;
            }
            OpCode::Ldtoken => {
                let Some(type_handle) = self
                    .ctx
                    .il2cpp_corlib_type("Type")
                    .and_then(|t| self.ctx.method_by_name(t, "get_TypeHandle"))
                else {
                    return unsupported("ldtoken without Il2CppSystem.Type.get_TypeHandle");
                };
                self.put(group, OpCode::Ldtoken, converted);
                self.put(group, OpCode::Call, MethodRef::from(self.rt.mono.get_type_from_handle));
                self.put(group, OpCode::Call, MethodRef::from(self.rt.il2cpp_type_from));
                self.put(group, OpCode::Callvirt, MethodRef::from(type_handle));
            }
            OpCode::Ldelem => {
                let get = MethodRef::on_instance(self.rt.arrays.get_item, vec![converted.clone()]);
                self.put(group, OpCode::Callvirt, get);
                self.to_bridging(group, &converted)?;
            }
            OpCode::Stelem => {
                let set = MethodRef::on_instance(self.rt.arrays.set_item, vec![converted.clone()]);
                self.to_native(group, &converted)?;
                self.put(group, OpCode::Callvirt, set);
            }
            other => return unsupported(format!("{other} {ty}")),
        }
        Ok(())
    }

    fn method_operand(&mut self, group: &mut Group, opcode: OpCode, method: &MethodRef) -> Step {
        if !matches!(opcode, OpCode::Call | OpCode::Callvirt | OpCode::Newobj) {
            return unsupported(format!("{opcode} on a method"));
        }
        let (return_type, params) = self.ctx.instantiated_signature(method);
        let mut temporaries = vec![0u32; params.len()];
        // Arguments come off the stack last-first.
        for (i, param) in params.iter().enumerate().rev() {
            self.to_native(group, param)?;
            #[allow(clippy::cast_possible_truncation)]
            let local = self.locals.len() as u32;
            self.locals.push(LocalVariable { ty: param.clone() });
            self.put(group, OpCode::Stloc, Operand::Local(local));
            temporaries[i] = local;
        }
        for local in temporaries {
            self.put(group, OpCode::Ldloc, Operand::Local(local));
        }
        self.put(group, opcode, method.clone());
        self.to_bridging(group, &return_type)?;
        Ok(())
    }

    fn field_operand(&mut self, group: &mut Group, opcode: OpCode, field: &FieldRef) -> Step {
        let ty = self.ctx.instantiated_field_type(field);
        let accessor = self.ctx.extras.property_accessor.get(field.field).cloned();
        let attached = self.ctx.is_field_attached(field.field);
        let call = if matches!(opcode, OpCode::Ldfld | OpCode::Stfld) {
            OpCode::Callvirt
        } else {
            OpCode::Call
        };
        match opcode {
            OpCode::Ldfld | OpCode::Ldsfld => {
                if let Some(accessor) = accessor {
                    let getter = MethodRef::on_instance(accessor.getter, field.type_args.clone());
                    self.put(group, call, getter);
                } else if attached {
                    self.put(group, opcode, field.clone());
                } else {
                    return unsupported(format!("{opcode} of a removed field"));
                }
                self.to_bridging(group, &ty)
            }
            OpCode::Stfld | OpCode::Stsfld => {
                if accessor.is_none() && !attached {
                    return unsupported(format!("{opcode} of a removed field"));
                }
                self.to_native(group, &ty)?;
                match accessor {
                    Some(accessor) => {
                        let setter = MethodRef::on_instance(accessor.setter, field.type_args.clone());
                        self.put(group, call, setter);
                    }
                    None => self.put(group, opcode, field.clone()),
                }
                Ok(())
            }
            other => unsupported(format!("{other} on a field")),
        }
    }

    fn instruction(&mut self, group: &mut Group, opcode: OpCode, operand: &Operand) -> Step {
        match operand {
            Operand::None => self.bare(group, opcode)?,
            Operand::Constant(Constant::String(s)) => {
                self.put(group, opcode, Constant::String(s.clone()));
                let mut scratch = InstructionList::new();
                mono_string_to_il2cpp(self.ctx, &mut scratch)?;
                self.splice(group, &scratch);
            }
            Operand::Constant(c) => self.put(group, opcode, c.clone()),
            Operand::Label(l) => {
                let target = self.label(*l)?;
                self.put(group, opcode, target);
            }
            Operand::Labels(ls) => {
                let targets = ls.iter().map(|l| self.label(*l)).collect::<std::result::Result<Vec<_>, _>>()?;
                self.put(group, opcode, Operand::Labels(targets));
            }
            Operand::This => self.put(group, opcode, Operand::This),
            Operand::Parameter(p) => match opcode {
                OpCode::Ldarg => {
                    let ty = self.parameter_type(*p)?;
                    self.put(group, opcode, Operand::Parameter(*p));
                    self.to_bridging(group, &ty)?;
                }
                OpCode::Starg => {
                    let ty = self.parameter_type(*p)?;
                    self.to_native(group, &ty)?;
                    self.put(group, opcode, Operand::Parameter(*p));
                }
                OpCode::Ldarga => self.put(group, opcode, Operand::Parameter(*p)),
                other => return unsupported(format!("{other} on a parameter")),
            },
            Operand::Local(l) => match opcode {
                OpCode::Ldloc => {
                    let ty = self.local_type(*l)?;
                    self.put(group, opcode, Operand::Local(*l));
                    self.to_bridging(group, &ty)?;
                }
                OpCode::Stloc => {
                    let ty = self.local_type(*l)?;
                    self.to_native(group, &ty)?;
                    self.put(group, opcode, Operand::Local(*l));
                }
                OpCode::Ldloca => self.put(group, opcode, Operand::Local(*l)),
                other => return unsupported(format!("{other} on a local")),
            },
            Operand::Type(ty) => self.type_operand(group, opcode, ty)?,
            Operand::Method(m) => self.method_operand(group, opcode, m)?,
            Operand::Field(f) => self.field_operand(group, opcode, f)?,
            Operand::ArrayMethod(a) => return unsupported(format!("array accessor {a}")),
        }
        Ok(())
    }

    fn handler(&mut self, original: &ExceptionHandler) -> std::result::Result<ExceptionHandler, Abort> {
        let mapped_start = self.label(original.handler_start)?;
        let mut handler_start = mapped_start;
        let exception_type = match &original.exception_type {
            None => None,
            Some(caught) => {
                let object = self.ctx.il2cpp_corlib_type("Object");
                if caught.as_simple().is_some_and(|t| Some(t) == object) {
                    Some(TypeExpr::Simple(self.rt.mono.object))
                } else {
                    let wrapper = match caught {
                        TypeExpr::Simple(t) => {
                            self.ctx.extras.system_exception_type.get(*t).map(|w| TypeExpr::Simple(*w))
                        }
                        TypeExpr::GenericInstance { generic, args } => self
                            .ctx
                            .extras
                            .system_exception_type
                            .get(*generic)
                            .map(|w| TypeExpr::generic_instance(*w, args.clone())),
                        _ => None,
                    };
                    let Some(wrapper) = wrapper else {
                        return Err(Abort::Unsupported(format!("catch of {caught} without a managed wrapper")));
                    };
                    let Some(index) = self.out.resolve(handler_start) else {
                        return Err(Abort::Fatal(invariant_error!(
                            "handler start {} is not in the body",
                            handler_start
                        )));
                    };
                    let object_field = FieldRef::from(self.rt.exceptions.il2cpp_object);
                    handler_start = self.out.insert(index, OpCode::Ldfld, object_field);
                    self.out.insert(index + 1, OpCode::Castclass, caught.clone());
                    Some(wrapper)
                }
            }
        };
        let filter_start = match original.filter_start {
            Some(f) => Some(self.label(f)?),
            None => None,
        };
        // A protected region ending at the handler now ends at the unwrap.
        let mut try_end = self.label(original.try_end)?;
        if try_end == mapped_start {
            try_end = handler_start;
        }
        Ok(ExceptionHandler {
            kind: original.kind,
            try_start: self.label(original.try_start)?,
            try_end,
            handler_start,
            handler_end: self.label(original.handler_end)?,
            filter_start,
            exception_type,
        })
    }
}

/// Translates the recovered body of `method`.
///
/// # Errors
///
/// Returns [`Error::Invariant`] when the runtime surface or a conversion
/// operator an earlier pass guarantees is missing. Unsupported bytecode is
/// not an error; it yields [`Translation::Unsupported`].
pub fn translate(ctx: &AppContext, method: MethodId, original: &MethodBody) -> Result<Translation> {
    let rt = ctx.runtime()?;
    let mut conversion = TypeConversion::new(ctx)?;
    let locals = original
        .locals
        .iter()
        .map(|l| LocalVariable {
            ty: conversion.convert(&l.ty),
        })
        .collect();
    let mut translator = Translator {
        ctx,
        rt,
        method,
        conversion,
        out: InstructionList::new(),
        locals,
        ids: HashMap::new(),
    };
    for instr in &original.instructions {
        let id = translator.out.reserve();
        translator.ids.insert(instr.id(), id);
    }

    let outcome = (|| -> std::result::Result<Vec<ExceptionHandler>, Abort> {
        for instr in &original.instructions {
            let mut group = Group {
                slot: translator.ids.get(&instr.id()).copied(),
            };
            translator.instruction(&mut group, instr.opcode, &instr.operand)?;
            if let Some(id) = group.slot {
                translator.out.push_reserved(id, OpCode::Nop, Operand::None);
            }
        }
        original.handlers.iter().map(|h| translator.handler(h)).collect()
    })();

    match outcome {
        Ok(handlers) => Ok(Translation::Translated(MethodBody {
            kind: BodyKind::Translated,
            instructions: translator.out,
            locals: translator.locals,
            handlers,
        })),
        Err(Abort::Unsupported(reason)) => Ok(Translation::Unsupported(reason)),
        Err(Abort::Fatal(error)) => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::ExceptionHandlerFlags,
        config::{IL2CPP_CORLIB, MONO_CORLIB},
        model::{FieldAttributes, FieldId, MethodAttributes, ParamDef, TypeAttributes, TypeId},
    };

    struct World {
        ctx: AppContext,
        foo: TypeId,
        int32: TypeId,
        to_mono: MethodId,
        from_mono: MethodId,
        value: FieldId,
    }

    fn world() -> World {
        let mut ctx = AppContext::new();
        let corlib = ctx.add_assembly(IL2CPP_CORLIB, false).unwrap();
        let object = ctx.add_type(corlib, "Il2CppSystem", "Object", TypeAttributes::PUBLIC, None);
        let value_type = ctx.add_type(corlib, "Il2CppSystem", "ValueType", TypeAttributes::PUBLIC, Some(object.into()));
        let int32 = ctx.add_type(corlib, "Il2CppSystem", "Int32", TypeAttributes::PUBLIC, Some(value_type.into()));
        let string = ctx.add_type(corlib, "Il2CppSystem", "String", TypeAttributes::PUBLIC, Some(object.into()));
        ctx.add_type(corlib, "Il2CppSystem", "Exception", TypeAttributes::PUBLIC, Some(object.into()));
        ctx.add_assembly(MONO_CORLIB, true).unwrap();
        ctx.runtime = Some(RuntimeSurface::inject(&mut ctx).unwrap());
        let mono_int = ctx.mono_corlib_type("Int32").unwrap();
        let mono_string = ctx.mono_corlib_type("String").unwrap();

        let op = MethodAttributes::PUBLIC | MethodAttributes::STATIC | MethodAttributes::SPECIAL_NAME;
        let to_mono = ctx.add_method(int32, "op_Implicit", op, mono_int.into(), vec![ParamDef::new("v", int32.into())]);
        let from_mono = ctx.add_method(int32, "op_Implicit", op, int32.into(), vec![ParamDef::new("v", mono_int.into())]);
        ctx.add_method(string, "op_Implicit", op, mono_string.into(), vec![ParamDef::new("v", string.into())]);
        ctx.add_method(string, "op_Implicit", op, string.into(), vec![ParamDef::new("v", mono_string.into())]);

        let game = ctx.add_assembly("Assembly-CSharp", false).unwrap();
        let foo = ctx.add_type(game, "Game", "Foo", TypeAttributes::PUBLIC, Some(object.into()));
        let value = ctx.add_field(foo, "value", int32.into(), FieldAttributes::PUBLIC);
        World {
            ctx,
            foo,
            int32,
            to_mono,
            from_mono,
            value,
        }
    }

    impl World {
        fn method(&mut self, name: &str, params: Vec<TypeExpr>, ret: TypeExpr) -> MethodId {
            let params = params
                .into_iter()
                .enumerate()
                .map(|(i, t)| ParamDef::new(format!("p{i}"), t))
                .collect();
            self.ctx.add_method(self.foo, name, MethodAttributes::PUBLIC, ret, params)
        }
    }

    fn calls(body: &MethodBody) -> Vec<MethodId> {
        body.instructions
            .iter()
            .filter_map(|i| match &i.operand {
                Operand::Method(m) => Some(m.method),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn field_load_and_return_are_converted() {
        let mut w = world();
        let m = w.method("GetValue", vec![w.foo.into()], w.int32.into());
        let mut body = MethodBody::new(BodyKind::Original);
        body.instructions.push(OpCode::Ldarg, Operand::Parameter(0));
        body.instructions.push(OpCode::Ldfld, FieldRef::from(w.value));
        body.instructions.emit(OpCode::Ret);

        let translated = translate(&w.ctx, m, &body).unwrap().into_body().unwrap();
        assert_eq!(
            translated.instructions.opcodes(),
            vec![OpCode::Ldarg, OpCode::Ldfld, OpCode::Call, OpCode::Call, OpCode::Ret]
        );
        assert_eq!(calls(&translated), vec![w.to_mono, w.from_mono]);
        assert_eq!(translated.kind, BodyKind::Translated);
    }

    #[test]
    fn reference_return_needs_no_conversion() {
        let mut w = world();
        let m = w.method("Self", vec![w.foo.into()], w.foo.into());
        let mut body = MethodBody::new(BodyKind::Original);
        body.instructions.push(OpCode::Ldarg, Operand::Parameter(0));
        body.instructions.emit(OpCode::Ret);
        let translated = translate(&w.ctx, m, &body).unwrap().into_body().unwrap();
        assert_eq!(translated.instructions.opcodes(), vec![OpCode::Ldarg, OpCode::Ret]);
    }

    #[test]
    fn unsupported_opcode_yields_no_body() {
        let mut w = world();
        let m = w.method("Varargs", vec![], w.int32.into());
        let mut body = MethodBody::new(BodyKind::Original);
        body.instructions.emit(OpCode::Arglist);
        body.instructions.emit(OpCode::Ret);
        let outcome = translate(&w.ctx, m, &body).unwrap();
        assert_eq!(outcome, Translation::Unsupported("arglist".to_string()));
        assert!(outcome.into_body().is_none());
    }

    #[test]
    fn call_arguments_round_trip_through_temporaries() {
        let mut w = world();
        let int = TypeExpr::Simple(w.int32);
        let target = w.method("Sum", vec![int.clone(), w.foo.into()], int.clone());
        let m = w.method("Caller", vec![], int.clone());
        let mut body = MethodBody::new(BodyKind::Original);
        body.locals.push(LocalVariable { ty: int.clone() });
        body.instructions.push(OpCode::Ldarg, Operand::This);
        body.instructions.push(OpCode::Ldc_I4, Constant::Int32(1));
        body.instructions.push(OpCode::Ldnull, Operand::None);
        body.instructions.push(OpCode::Call, MethodRef::from(target));
        body.instructions.push(OpCode::Stloc, Operand::Local(0));
        body.instructions.push(OpCode::Ldloc, Operand::Local(0));
        body.instructions.emit(OpCode::Ret);

        let translated = translate(&w.ctx, m, &body).unwrap().into_body().unwrap();
        let listing: Vec<_> = translated.instructions.iter().map(|i| (i.opcode, i.operand.clone())).collect();
        // Temporaries 1 and 2 hold the second and first argument.
        let expected_prefix = vec![
            (OpCode::Ldarg, Operand::This),
            (OpCode::Ldc_I4, Constant::Int32(1).into()),
            (OpCode::Ldnull, Operand::None),
            (OpCode::Stloc, Operand::Local(1)),
            (OpCode::Call, MethodRef::from(w.from_mono).into()),
            (OpCode::Stloc, Operand::Local(2)),
            (OpCode::Ldloc, Operand::Local(2)),
            (OpCode::Ldloc, Operand::Local(1)),
            (OpCode::Call, MethodRef::from(target).into()),
            (OpCode::Call, MethodRef::from(w.to_mono).into()),
        ];
        assert_eq!(listing[..expected_prefix.len()], expected_prefix[..]);
        assert_eq!(translated.locals.len(), 3);
        assert_eq!(translated.locals[1].ty, TypeExpr::Simple(w.foo));
    }

    #[test]
    fn branch_lands_before_inserted_conversion() {
        let mut w = world();
        let int = TypeExpr::Simple(w.int32);
        let m = w.method("Loop", vec![int.clone()], int.clone());
        let mut body = MethodBody::new(BodyKind::Original);
        let target = body.instructions.reserve();
        body.instructions.push(OpCode::Br, Label::Instr(target));
        body.instructions.push_reserved(target, OpCode::Ldarg, Operand::Parameter(0));
        body.instructions.emit(OpCode::Ret);

        let translated = translate(&w.ctx, m, &body).unwrap().into_body().unwrap();
        let list = &translated.instructions;
        let Some(Operand::Label(label)) = list.get(0).map(|i| i.operand.clone()) else {
            panic!("branch lost its target");
        };
        let index = list.resolve(label).unwrap();
        assert_eq!(list.get(index).unwrap().opcode, OpCode::Ldarg);
        assert_eq!(list.get(index + 1).unwrap().opcode, OpCode::Call);
    }

    #[test]
    fn plain_stores_stay_single_instructions() {
        let mut w = world();
        let m = w.method("Store", vec![w.foo.into()], TypeExpr::Simple(w.ctx.runtime().unwrap().mono.void));
        let mut body = MethodBody::new(BodyKind::Original);
        body.locals.push(LocalVariable { ty: w.foo.into() });
        body.instructions.push(OpCode::Ldarg, Operand::Parameter(0));
        body.instructions.push(OpCode::Stloc, Operand::Local(0));
        body.instructions.emit(OpCode::Ret);
        let translated = translate(&w.ctx, m, &body).unwrap().into_body().unwrap();
        assert_eq!(
            translated.instructions.opcodes(),
            vec![OpCode::Ldarg, OpCode::Stloc, OpCode::Ret]
        );
    }

    #[test]
    fn removed_field_without_accessor_is_unsupported() {
        let mut w = world();
        let m = w.method("Get", vec![w.foo.into()], w.int32.into());
        w.ctx.remove_field(w.value);
        let mut body = MethodBody::new(BodyKind::Original);
        body.instructions.push(OpCode::Ldarg, Operand::Parameter(0));
        body.instructions.push(OpCode::Ldfld, FieldRef::from(w.value));
        body.instructions.emit(OpCode::Ret);
        assert!(!translate(&w.ctx, m, &body).unwrap().is_translated());
    }

    #[test]
    fn primitive_array_access_uses_unsafe_helpers() {
        let mut w = world();
        let m = w.method("Length", vec![], w.int32.into());
        let mut body = MethodBody::new(BodyKind::Original);
        body.instructions.push(OpCode::Ldnull, Operand::None);
        body.instructions.emit(OpCode::Ldlen);
        body.instructions.push(OpCode::Ldnull, Operand::None);
        body.instructions.push(OpCode::Ldc_I4, Constant::Int32(0));
        body.instructions.emit(OpCode::Ldelem_I4);
        body.instructions.emit(OpCode::Pop);
        body.instructions.emit(OpCode::Ret);
        let translated = translate(&w.ctx, m, &body).unwrap().into_body().unwrap();
        let rt = w.ctx.runtime().unwrap();
        let operands: Vec<_> = translated
            .instructions
            .iter()
            .filter_map(|i| match &i.operand {
                Operand::Method(m) => Some(m.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(operands[0], MethodRef::from(rt.arrays.get_length));
        assert_eq!(
            operands[1],
            MethodRef::generic(rt.arrays.load_element_unsafe, vec![TypeExpr::Simple(rt.mono.int32)])
        );

        let mut by_ref = MethodBody::new(BodyKind::Original);
        by_ref.instructions.emit(OpCode::Ldelem_Ref);
        assert!(!translate(&w.ctx, m, &by_ref).unwrap().is_translated());
    }

    #[test]
    fn typed_catch_unwraps_the_native_exception() {
        let mut w = world();
        let exception = w.ctx.il2cpp_corlib_type("Exception").unwrap();
        let wrapper = w.ctx.add_nested_type(exception, "Exception", TypeAttributes::NESTED_PUBLIC, None);
        w.ctx.extras.system_exception_type.attach(exception, wrapper).unwrap();
        let void = TypeExpr::Simple(w.ctx.runtime().unwrap().mono.void);
        let m = w.method("Guarded", vec![], void);

        let mut body = MethodBody::new(BodyKind::Original);
        let try_start = body.instructions.emit(OpCode::Nop);
        let exit = body.instructions.reserve();
        body.instructions.push(OpCode::Leave, Label::Instr(exit));
        let handler_start = body.instructions.emit(OpCode::Pop);
        body.instructions.push(OpCode::Leave, Label::Instr(exit));
        body.instructions.push_reserved(exit, OpCode::Ret, Operand::None);
        body.handlers.push(ExceptionHandler {
            kind: ExceptionHandlerFlags::EXCEPTION,
            try_start,
            try_end: handler_start,
            handler_start,
            handler_end: Label::Instr(exit),
            filter_start: None,
            exception_type: Some(exception.into()),
        });

        let translated = translate(&w.ctx, m, &body).unwrap().into_body().unwrap();
        let handler = &translated.handlers[0];
        assert_eq!(handler.exception_type, Some(TypeExpr::Simple(wrapper)));
        let list = &translated.instructions;
        let start = list.resolve(handler.handler_start).unwrap();
        assert_eq!(list.get(start).unwrap().opcode, OpCode::Ldfld);
        assert_eq!(list.get(start + 1).unwrap().opcode, OpCode::Castclass);
        assert_eq!(list.get(start + 1).unwrap().operand, Operand::Type(exception.into()));
        assert_eq!(list.get(start + 2).unwrap().opcode, OpCode::Pop);
        assert_eq!(list.resolve(handler.try_end), Some(start));
    }
}
