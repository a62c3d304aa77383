//! ABI bridge bodies for stripped methods.
//!
//! A method whose original body was neither recovered nor translated is
//! replaced by a single call into the native runtime. Argument marshalling
//! lives in per-assembly `InvokeHelper.InvokeAction`/`InvokeFunction`
//! overloads, one per parameter count, shared by every bridged method of
//! that arity. A bridged body only has to push the method handle, the
//! receiver pointer and its arguments, then call the matching helper.

use std::collections::BTreeMap;

use log::{debug, info};

use crate::{
    assembly::{Constant, InstructionList, Label, MethodBody, OpCode, Operand},
    compiler::{EventKind, GeneratorPass},
    model::{
        AppContext, AssemblyId, FieldRef, GenericParamDef, MethodAttributes, MethodId, MethodRef, ParamDef,
        TypeAttributes, TypeId,
    },
    passes::generated_assemblies,
    runtime::RuntimeSurface,
    typesystem::TypeExpr,
    Result,
};

/// Leading `method` and `obj` arguments of every invoke helper.
const PARAMETER_OFFSET: u16 = 2;

const HELPER: MethodAttributes = MethodAttributes::PUBLIC
    .union(MethodAttributes::HIDE_BY_SIG)
    .union(MethodAttributes::STATIC);

/// Synthesizes native call bodies for every method still lacking one.
pub struct NativeMethodBodyPass;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum HelperKind {
    Action,
    Function,
}

impl HelperKind {
    fn name(self) -> &'static str {
        match self {
            Self::Action => "InvokeAction",
            Self::Function => "InvokeFunction",
        }
    }
}

/// The `InvokeHelper` type of one assembly and the overloads it holds.
struct HelperCache {
    assembly: AssemblyId,
    owner: Option<TypeId>,
    methods: BTreeMap<(HelperKind, usize), MethodId>,
}

impl HelperCache {
    fn new(assembly: AssemblyId) -> Self {
        Self {
            assembly,
            owner: None,
            methods: BTreeMap::new(),
        }
    }

    fn owner(&mut self, ctx: &mut AppContext, rt: &RuntimeSurface) -> TypeId {
        if let Some(owner) = self.owner {
            return owner;
        }
        let owner = ctx.inject_type(
            self.assembly,
            "Il2CppInterop.Generated.Helpers",
            "InvokeHelper",
            TypeAttributes::ABSTRACT | TypeAttributes::SEALED,
            Some(TypeExpr::Simple(rt.mono.object)),
        );
        self.owner = Some(owner);
        owner
    }

    fn get(&mut self, ctx: &mut AppContext, rt: &RuntimeSurface, kind: HelperKind, arity: usize) -> Result<MethodId> {
        if let Some(method) = self.methods.get(&(kind, arity)) {
            return Ok(*method);
        }
        let owner = self.owner(ctx, rt);
        let method = synthesize_helper(ctx, rt, owner, kind, arity)?;
        self.methods.insert((kind, arity), method);
        Ok(method)
    }
}

fn parameter(index: usize) -> Operand {
    #[allow(clippy::cast_possible_truncation)]
    Operand::Parameter(index as u16 + PARAMETER_OFFSET)
}

/// `T : IIl2CppType<T>`
fn marshalled_param(rt: &RuntimeSurface, helper: MethodId, index: usize, name: String) -> GenericParamDef {
    let mut param = GenericParamDef::new(name);
    param.constraints.push(TypeExpr::generic_instance(
        rt.interop.iil2cpp_type_generic,
        vec![TypeExpr::method_param(helper, index)],
    ));
    param
}

fn synthesize_helper(
    ctx: &mut AppContext,
    rt: &RuntimeSurface,
    owner: TypeId,
    kind: HelperKind,
    arity: usize,
) -> Result<MethodId> {
    let mut params = vec![
        ParamDef::new("method", rt.mono.intptr_type()),
        ParamDef::new("obj", rt.mono.intptr_type()),
    ];
    params.extend((0..arity).map(|_| ParamDef::new("", rt.mono.void_type())));
    let helper = ctx.inject_method(owner, kind.name(), HELPER, rt.mono.void_type(), params);

    let mut generic_params: Vec<GenericParamDef> =
        (0..arity).map(|i| marshalled_param(rt, helper, i, format!("T{i}"))).collect();
    if kind == HelperKind::Function {
        generic_params.push(marshalled_param(rt, helper, arity, "TResult".to_string()));
    }
    let def = ctx.method_mut(helper);
    def.generic_params = generic_params;
    for (i, param) in def.params.iter_mut().skip(PARAMETER_OFFSET as usize).enumerate() {
        param.name = format!("parameter_{i}");
        param.ty = TypeExpr::method_param(helper, i);
    }
    let result = TypeExpr::method_param(helper, arity);
    let invoke = match kind {
        HelperKind::Action => MethodRef::from(rt.invoke.invoke_action),
        HelperKind::Function => {
            def.return_type = result.clone();
            MethodRef::generic(rt.invoke.invoke_function, vec![result.clone()])
        }
    };

    let body = if arity == 0 {
        let mut list = InstructionList::new();
        list.push(OpCode::Ldarg, Operand::Parameter(0));
        list.push(OpCode::Ldarg, Operand::Parameter(1));
        list.emit(OpCode::Ldc_I4_0);
        list.emit(OpCode::Conv_U);
        list.push(OpCode::Call, invoke);
        list.emit(OpCode::Ret);
        MethodBody::native(list)
    } else {
        marshalling_body(rt, helper, kind, arity, invoke, result)
    };
    ctx.extras.bodies.attach(helper, body)?;
    ctx.events
        .record(EventKind::HelperSynthesized)
        .method(helper)
        .message(format!("{}/{arity}", kind.name()));
    Ok(helper)
}

/// Stack-allocates the argument array and one scratch buffer per argument,
/// invokes, then lets every argument copy back out of its buffer.
fn marshalling_body(
    rt: &RuntimeSurface,
    helper: MethodId,
    kind: HelperKind,
    arity: usize,
    invoke: MethodRef,
    result: TypeExpr,
) -> MethodBody {
    let mut body = MethodBody::native(InstructionList::new());
    let intptr = rt.mono.intptr_type();
    let arguments = body.add_local(rt.mono.intptr_pointer());

    let list = &mut body.instructions;
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    list.push(OpCode::Ldc_I4, Constant::Int32(arity as i32));
    list.emit(OpCode::Conv_U);
    list.push(OpCode::Sizeof, intptr.clone());
    list.emit(OpCode::Mul_Ovf_Un);
    list.emit(OpCode::Localloc);
    list.push(OpCode::Stloc, Operand::Local(arguments));

    let mut buffers = Vec::with_capacity(arity);
    for i in 0..arity {
        let ty = TypeExpr::method_param(helper, i);
        let size = body.add_local(rt.mono.int32_type());
        let data = body.add_local(rt.mono.byte_pointer());
        let list = &mut body.instructions;

        let empty = list.reserve();
        let store = list.reserve();
        list.push(
            OpCode::Call,
            MethodRef::generic(rt.invoke.required_stack_allocation_size, vec![ty.clone()]),
        );
        list.push(OpCode::Stloc, Operand::Local(size));
        list.push(OpCode::Ldloc, Operand::Local(size));
        list.push(OpCode::Brfalse, Label::Instr(empty));
        list.push(OpCode::Ldloc, Operand::Local(size));
        list.emit(OpCode::Conv_U);
        list.emit(OpCode::Localloc);
        list.push(OpCode::Stloc, Operand::Local(data));
        list.push(OpCode::Br, Label::Instr(store));
        list.push_reserved(empty, OpCode::Ldc_I4_0, Operand::None);
        list.emit(OpCode::Conv_U);
        list.push(OpCode::Stloc, Operand::Local(data));

        // arguments[i] = PrepareParameter(parameter_i, data)
        list.push_reserved(store, OpCode::Ldloc, Operand::Local(arguments));
        if i != 0 {
            if i > 1 {
                #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                list.push(OpCode::Ldc_I4, Constant::Int32(i as i32));
                list.emit(OpCode::Conv_I);
            }
            list.push(OpCode::Sizeof, intptr.clone());
            if i > 1 {
                list.emit(OpCode::Mul);
            }
            list.emit(OpCode::Add);
        }
        list.push(OpCode::Ldarg, parameter(i));
        list.push(OpCode::Ldloc, Operand::Local(data));
        list.push(OpCode::Call, MethodRef::generic(rt.invoke.prepare_parameter, vec![ty]));
        list.emit(OpCode::Stind_I);
        buffers.push(data);
    }

    let outcome = (kind == HelperKind::Function).then(|| body.add_local(result));
    let list = &mut body.instructions;
    list.push(OpCode::Ldarg, Operand::Parameter(0));
    list.push(OpCode::Ldarg, Operand::Parameter(1));
    list.push(OpCode::Ldloc, Operand::Local(arguments));
    list.push(OpCode::Call, invoke);
    if let Some(outcome) = outcome {
        list.push(OpCode::Stloc, Operand::Local(outcome));
    }
    for (i, data) in buffers.into_iter().enumerate() {
        list.push(OpCode::Ldarg, parameter(i));
        list.push(OpCode::Ldloc, Operand::Local(data));
        list.push(
            OpCode::Call,
            MethodRef::generic(rt.invoke.cleanup_parameter, vec![TypeExpr::method_param(helper, i)]),
        );
    }
    if let Some(outcome) = outcome {
        list.push(OpCode::Ldloc, Operand::Local(outcome));
    }
    list.emit(OpCode::Ret);
    body
}

/// `ldsfld ICall_Delegate_Field; [this]; args...; callvirt Invoke; ret`
fn internal_call_body(ctx: &AppContext, method: MethodId) -> Result<Option<MethodBody>> {
    let Some(delegate) = ctx.extras.icall_delegate.get(method) else {
        return Ok(None);
    };
    let def = ctx.method(method);
    let mut list = InstructionList::new();
    list.push(
        OpCode::Ldsfld,
        FieldRef::on_instance(delegate.field, ctx.type_params(def.declaring)),
    );
    if def.has_this() {
        list.push(OpCode::Ldarg, Operand::This);
    }
    for i in 0..def.params.len() {
        #[allow(clippy::cast_possible_truncation)]
        list.push(OpCode::Ldarg, Operand::Parameter(i as u16));
    }
    list.push(OpCode::Callvirt, MethodRef::from(delegate.invoke));
    list.emit(OpCode::Ret);
    Ok(Some(MethodBody::native(list)))
}

fn bridge_body(
    ctx: &mut AppContext,
    rt: &RuntimeSurface,
    helpers: &mut HelperCache,
    method: MethodId,
) -> Result<MethodBody> {
    let def = ctx.method(method).clone();
    let ty = def.declaring;
    let value_type = ctx.is_value_type(ty);
    let self_type = ctx.self_instance(ty);
    let handle = ctx.instantiated_method_info_field(method)?;

    let mut body = MethodBody::native(InstructionList::new());
    if def.is_instance_constructor() && !value_type {
        let pointer_ctor = *ctx.extras.pointer_constructor.require(ty)?;
        let list = &mut body.instructions;
        list.push(OpCode::Ldarg, Operand::This);
        list.push(
            OpCode::Call,
            MethodRef::generic(rt.il2cpp.new_object_pointer, vec![self_type.clone()]),
        );
        list.push(OpCode::Call, MethodRef::on_instance(pointer_ctor, ctx.type_params(ty)));
    }

    let mut scratch = None;
    if def.is_static() {
        let list = &mut body.instructions;
        list.push(OpCode::Ldsfld, handle);
        list.emit(OpCode::Ldc_I4_0);
        list.emit(OpCode::Conv_I);
    } else if value_type {
        let buffer = body.add_local(rt.mono.byte_pointer());
        let list = &mut body.instructions;
        list.push(
            OpCode::Call,
            MethodRef::generic(rt.type_helper.size_of, vec![self_type.clone()]),
        );
        list.emit(OpCode::Conv_U);
        list.emit(OpCode::Localloc);
        list.push(OpCode::Stloc, Operand::Local(buffer));
        list.push(OpCode::Ldarg, Operand::This);
        list.push(OpCode::Ldobj, self_type.clone());
        list.push(OpCode::Ldloc, Operand::Local(buffer));
        list.push(
            OpCode::Call,
            MethodRef::generic(rt.type_helper.write_to_pointer, vec![self_type.clone()]),
        );
        list.push(OpCode::Ldsfld, handle);
        list.push(OpCode::Ldloc, Operand::Local(buffer));
        scratch = Some(buffer);
    } else {
        let list = &mut body.instructions;
        list.push(OpCode::Ldsfld, handle);
        list.push(OpCode::Ldarg, Operand::This);
        list.push(OpCode::Callvirt, MethodRef::from(rt.interop.get_pointer));
    }

    let mut type_args = Vec::with_capacity(def.params.len() + 1);
    for (i, param) in def.params.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        body.instructions.push(OpCode::Ldarg, Operand::Parameter(i as u16));
        if let TypeExpr::ByRef(element) = &param.ty {
            body.instructions.push(
                OpCode::Call,
                MethodRef::on_instance(rt.interop.from_ref, vec![(**element).clone()]),
            );
            type_args.push(rt.by_reference_of((**element).clone()));
        } else {
            type_args.push(param.ty.clone());
        }
    }
    let kind = if ctx.is_void(&def.return_type) {
        HelperKind::Action
    } else {
        type_args.push(def.return_type.clone());
        HelperKind::Function
    };
    let helper = helpers.get(ctx, rt, kind, def.params.len())?;
    let call = if type_args.is_empty() {
        MethodRef::from(helper)
    } else {
        MethodRef::generic(helper, type_args)
    };

    let list = &mut body.instructions;
    list.push(OpCode::Call, call);
    if let Some(buffer) = scratch {
        list.push(OpCode::Ldarg, Operand::This);
        list.push(OpCode::Ldloc, Operand::Local(buffer));
        list.push(
            OpCode::Call,
            MethodRef::generic(rt.type_helper.read_from_pointer, vec![self_type.clone()]),
        );
        list.push(OpCode::Stobj, self_type);
    }
    list.emit(OpCode::Ret);
    Ok(body)
}

impl GeneratorPass for NativeMethodBodyPass {
    fn name(&self) -> &'static str {
        "NativeMethodBody"
    }

    fn id(&self) -> &'static str {
        "native_method_body_processor"
    }

    fn description(&self) -> &'static str {
        "Bridges every method without a body through the native runtime"
    }

    fn process(&self, ctx: &mut AppContext) -> Result<()> {
        let rt = ctx.runtime()?.clone();
        let mut bridged = 0usize;
        let mut internal_calls = 0usize;

        for assembly in generated_assemblies(ctx) {
            let mut helpers = HelperCache::new(assembly);
            for ty in ctx.types_of(assembly) {
                if ctx.is_injected_type(ty) {
                    continue;
                }
                let methods = ctx.ty(ty).methods.clone();
                for method in methods {
                    let def = ctx.method(method);
                    let unstripped = ctx.is_unstripped_method(method);
                    if (def.injected && !unstripped)
                        || def.attributes.contains(MethodAttributes::ABSTRACT)
                        || ctx.extras.bodies.contains(method)
                        || ctx.extras.runtime_implemented.is_marked(method)
                    {
                        continue;
                    }

                    let body = if unstripped {
                        let Some(body) = internal_call_body(ctx, method)? else {
                            continue;
                        };
                        internal_calls += 1;
                        body
                    } else {
                        bridge_body(ctx, &rt, &mut helpers, method)?
                    };
                    ctx.extras.bodies.attach(method, body)?;
                    ctx.events
                        .record(EventKind::BridgeSynthesized)
                        .method(method)
                        .pass(self.id());
                    bridged += 1;
                }
            }
            if !helpers.methods.is_empty() {
                debug!(
                    "{} shares {} invoke helpers",
                    ctx.assembly(assembly).name,
                    helpers.methods.len()
                );
            }
        }
        info!("Bridged {bridged} methods, {internal_calls} through internal call delegates");
        Ok(())
    }
}
