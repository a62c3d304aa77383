//! Native handle resolution through per-type initialization classes.
//!
//! Every generated type `T` receives a companion class
//! `Il2CppInterop.Generated.Il2CppInternals_{hash}` whose static constructor
//! resolves, once, everything generated code needs to reach the native side:
//!
//! 1. the native class pointer of `T`, stored in `Il2CppClassPointerStore<T>`
//! 2. the native instance size of value types
//! 3. a field handle and byte offset per field
//! 4. a method handle per native method, by token when there is one
//! 5. a resolved delegate per recovered internal call
//!
//! `T`'s own static constructor only runs the companion's, so the work is
//! deferred until the type is first touched. Generic methods resolve their
//! instantiated handle lazily through a nested holder class parameterized
//! over the declaring type's and the method's generic parameters.

use std::collections::HashSet;

use log::{debug, info};
use md5::{Digest, Md5};
use widestring::U16String;

use crate::{
    assembly::{Constant, InstructionList, MethodBody, OpCode},
    compiler::{EventKind, GeneratorPass},
    config::{GENERATED_NAMESPACE, IL2CPP_CORLIB, INITIALIZER_ASSEMBLY},
    model::{
        AppContext, FieldAttributes, FieldId, FieldRef, GenericParamDef, ICallDelegate,
        MethodAttributes, MethodId, MethodImplAttributes, MethodRef, ParamDef, TypeAttributes,
        TypeId,
    },
    passes::generated_assemblies,
    runtime::RuntimeSurface,
    translation::conversion::TypeConversion,
    typesystem::{is_non_instantiable, TypeExpr},
    Error, Result,
};

/// Creates initialization classes and queues their activation.
pub struct InitializationClassPass {
    eager: bool,
}

impl InitializationClassPass {
    /// Creates the pass.
    ///
    /// # Arguments
    ///
    /// * `eager` - Also emit the global `Initialize()` entry point.
    #[must_use]
    pub fn new(eager: bool) -> Self {
        Self { eager }
    }
}

const STORAGE: FieldAttributes = FieldAttributes::ASSEMBLY
    .union(FieldAttributes::STATIC)
    .union(FieldAttributes::INIT_ONLY);

const STATIC_CONSTRUCTOR: MethodAttributes = MethodAttributes::STATIC
    .union(MethodAttributes::HIDE_BY_SIG)
    .union(MethodAttributes::SPECIAL_NAME)
    .union(MethodAttributes::RT_SPECIAL_NAME);

/// First eight bytes of the MD5 of the UTF-16LE name, little endian.
fn name_hash(full_name: &str) -> u64 {
    let wide = U16String::from_str(full_name);
    let bytes: Vec<u8> = wide.as_slice().iter().flat_map(|u| u.to_le_bytes()).collect();
    let digest = Md5::digest(&bytes);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(head)
}

/// Name of the initialization class of a type with the given full name.
#[must_use]
pub fn initialization_type_name(full_name: &str) -> String {
    format!("Il2CppInternals_{:016x}", name_hash(full_name))
}

/// Namespaces of the native corlib lose the `Il2Cpp` prefix the generator
/// gave them.
fn native_namespace(ctx: &AppContext, ty: TypeId) -> String {
    let def = ctx.ty(ty);
    if ctx.assembly(def.assembly).name == IL2CPP_CORLIB {
        def.namespace
            .strip_prefix("Il2Cpp")
            .unwrap_or(&def.namespace)
            .to_string()
    } else {
        def.namespace.clone()
    }
}

fn native_assembly_file(ctx: &AppContext, ty: TypeId) -> String {
    let name = &ctx.assembly(ctx.ty(ty).assembly).name;
    let name = if name == IL2CPP_CORLIB {
        name.strip_prefix("Il2Cpp").unwrap_or(name)
    } else {
        name.as_str()
    };
    format!("{name}.dll")
}

/// `Namespace.Outer/Inner` as native internal-call tables spell it.
fn native_full_name(ctx: &AppContext, ty: TypeId) -> String {
    let def = ctx.ty(ty);
    match def.declaring {
        Some(outer) => format!("{}/{}", native_full_name(ctx, outer), def.name),
        None => {
            let namespace = native_namespace(ctx, ty);
            if namespace.is_empty() {
                def.name.clone()
            } else {
                format!("{namespace}.{}", def.name)
            }
        }
    }
}

fn copy_generic_params(params: &[GenericParamDef]) -> Vec<GenericParamDef> {
    params.iter().map(GenericParamDef::copy_unconstrained).collect()
}

/// `ty` itself, or `ty<args>` when it is generic.
fn instance(ty: TypeId, args: Vec<TypeExpr>) -> TypeExpr {
    if args.is_empty() {
        TypeExpr::Simple(ty)
    } else {
        TypeExpr::generic_instance(ty, args)
    }
}

/// Pushes `new IntPtr[] { ClassPointerStore<a>.NativeClassPtr, .. }`.
fn class_pointer_array(out: &mut InstructionList, rt: &RuntimeSurface, args: &[TypeExpr]) {
    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    out.push(OpCode::Ldc_I4, Constant::Int32(args.len() as i32));
    out.push(OpCode::Newarr, rt.mono.intptr_type());
    for (j, arg) in args.iter().enumerate() {
        out.emit(OpCode::Dup);
        #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
        out.push(OpCode::Ldc_I4, Constant::Int32(j as i32));
        out.push(OpCode::Ldsfld, rt.class_pointer(arg.clone()));
        out.emit(OpCode::Stelem_I);
    }
}

fn inject_static_constructor(ctx: &mut AppContext, ty: TypeId, instructions: InstructionList) -> Result<MethodId> {
    let void = ctx.runtime()?.mono.void_type();
    let cctor = ctx.inject_method(ty, ".cctor", STATIC_CONSTRUCTOR, void, Vec::new());
    ctx.extras.bodies.attach(cctor, MethodBody::native(instructions))?;
    Ok(cctor)
}

struct Initializer<'a> {
    ctx: &'a mut AppContext,
    rt: RuntimeSurface,
    tokenless: usize,
}

impl Initializer<'_> {
    fn process_type(&mut self, ty: TypeId) -> Result<()> {
        let rt = self.rt.clone();
        let assembly = self.ctx.ty(ty).assembly;
        let full_name = self.ctx.full_name(ty);
        let init = self.ctx.inject_type(
            assembly,
            GENERATED_NAMESPACE,
            &initialization_type_name(&full_name),
            TypeAttributes::NOT_PUBLIC | TypeAttributes::ABSTRACT | TypeAttributes::SEALED,
            Some(TypeExpr::Simple(rt.mono.object)),
        );
        let own_params = copy_generic_params(&self.ctx.ty(ty).generic_params);
        self.ctx.ty_mut(init).generic_params = own_params;
        self.ctx.extras.initialization_type.attach(ty, init)?;

        // T..cctor: RuntimeHelpers.RunClassConstructor(typeof(Il2CppInternals<T>).TypeHandle)
        let init_for_type = instance(init, self.ctx.type_params(ty));
        let queued = self.ctx.extras.static_ctor_instructions.get_or_default_mut(ty);
        queued.push(OpCode::Ldtoken, init_for_type);
        queued.push(OpCode::Call, MethodRef::from(rt.mono.run_class_constructor));

        let init_params = self.ctx.type_params(init);
        let type_to_init = instance(ty, init_params.clone());
        let class_pointer = rt.class_pointer(type_to_init);
        let on_init = |field: FieldId| FieldRef::on_instance(field, init_params.clone());

        let mut out = InstructionList::new();

        // Class pointer
        let def = self.ctx.ty(ty).clone();
        if let Some(outer) = def.declaring {
            let arity = self.ctx.ty(outer).generic_params.len();
            let declaring = instance(outer, init_params[..arity.min(init_params.len())].to_vec());
            out.push(OpCode::Ldtoken, declaring.clone());
            out.push(OpCode::Call, MethodRef::from(rt.mono.run_class_constructor));
            out.push(OpCode::Ldsfld, rt.class_pointer(declaring));
            out.push(OpCode::Ldstr, Constant::String(def.name.clone()));
            out.push(OpCode::Call, MethodRef::from(rt.il2cpp.get_nested_type));
        } else {
            out.push(OpCode::Ldstr, Constant::String(native_assembly_file(self.ctx, ty)));
            out.push(OpCode::Ldstr, Constant::String(native_namespace(self.ctx, ty)));
            out.push(OpCode::Ldstr, Constant::String(def.name.clone()));
            out.push(OpCode::Call, MethodRef::from(rt.il2cpp.get_class));
        }
        if !init_params.is_empty() {
            class_pointer_array(&mut out, &rt, &init_params);
            out.push(OpCode::Call, MethodRef::from(rt.il2cpp.get_generic_instance_type));
        }
        out.push(OpCode::Stsfld, class_pointer.clone());
        out.push(OpCode::Ldsfld, class_pointer.clone());
        out.push(OpCode::Call, MethodRef::from(rt.il2cpp.runtime_class_init));

        // Size
        let info = self.ctx.extras.type_info.require(ty)?.clone();
        if info.blittability.is_value_type() {
            let size = self.ctx.inject_field(init, "Size", rt.mono.int32_type(), STORAGE);
            self.ctx.extras.size_storage.attach(ty, size)?;
            out.push(OpCode::Ldsfld, class_pointer.clone());
            out.push(OpCode::Call, MethodRef::from(rt.il2cpp.get_value_size));
            out.push(OpCode::Stsfld, on_init(size));
        }

        // Fields
        for (kind, fields) in [("Instance", &info.instance_fields), ("Static", &info.static_fields)] {
            for (i, &field) in fields.iter().enumerate() {
                let info_store =
                    self.ctx.inject_field(init, &format!("FieldInfoPtr_{kind}_{i}"), rt.mono.intptr_type(), STORAGE);
                let offset_store =
                    self.ctx.inject_field(init, &format!("FieldOffset_{kind}_{i}"), rt.mono.int32_type(), STORAGE);
                self.ctx.extras.field_info_storage.attach(field, info_store)?;
                self.ctx.extras.offset_storage.attach(field, offset_store)?;

                out.push(OpCode::Ldsfld, class_pointer.clone());
                out.push(OpCode::Ldstr, Constant::String(self.ctx.field(field).name.clone()));
                out.push(OpCode::Call, MethodRef::from(rt.il2cpp.get_field));
                out.emit(OpCode::Dup);
                out.push(OpCode::Stsfld, on_init(info_store));
                out.push(OpCode::Call, MethodRef::from(rt.il2cpp.field_get_offset));
                out.emit(OpCode::Conv_I4);
                out.push(OpCode::Stsfld, on_init(offset_store));
            }
        }

        // Methods
        for (i, &method) in def.methods.iter().enumerate() {
            if self.ctx.is_unstripped_method(method) || self.ctx.method(method).injected {
                continue;
            }
            let store = self.ctx.inject_field(init, &format!("MethodInfoPtr_{i}"), rt.mono.intptr_type(), STORAGE);
            self.ctx.extras.method_info_field.attach(method, store)?;

            out.push(OpCode::Ldsfld, class_pointer.clone());
            let token = self.ctx.method(method).token;
            if token.is_null() {
                self.tokenless_lookup(ty, method, &mut out)?;
            } else {
                #[allow(clippy::cast_possible_wrap)]
                out.push(OpCode::Ldc_I4, Constant::Int32(token.value() as i32));
                out.push(OpCode::Call, MethodRef::from(rt.il2cpp.get_method_by_token));
            }
            out.push(OpCode::Stsfld, on_init(store));

            if self.ctx.method(method).has_generic_params() {
                self.generic_method_holder(init, ty, method, store, i)?;
            }
        }

        // Internal calls
        for (i, &method) in def.methods.iter().enumerate() {
            if !self.ctx.is_unstripped_method(method) || !self.ctx.method(method).is_internal_call() {
                continue;
            }
            let (delegate, field, invoke) = self.icall_delegate(init, ty, method, i)?;
            let name = format!("{}::{}", native_full_name(self.ctx, ty), self.ctx.method(method).name);
            out.push(OpCode::Ldstr, Constant::String(name));
            out.push(
                OpCode::Call,
                MethodRef::generic(rt.il2cpp.resolve_icall, vec![TypeExpr::Simple(delegate)]),
            );
            out.push(OpCode::Stsfld, FieldRef::from(field));
            self.ctx
                .extras
                .icall_delegate
                .attach(method, ICallDelegate { field, invoke })?;
        }

        out.emit(OpCode::Ret);
        inject_static_constructor(self.ctx, init, out)?;
        debug!("Initialization class for {} ready", full_name);
        Ok(())
    }

    /// Signature-based lookup; the class pointer is already on the stack.
    fn tokenless_lookup(&mut self, ty: TypeId, method: MethodId, out: &mut InstructionList) -> Result<()> {
        let ctx = &*self.ctx;
        let def = ctx.method(method);
        let ret_name = ctx.type_expr_name(&def.return_type);
        let param_names: Vec<String> = def.params.iter().map(|p| ctx.type_expr_name(&p.ty)).collect();

        let ambiguous = ctx.ty(ty).methods.iter().copied().any(|other| {
            if other == method {
                return false;
            }
            let o = ctx.method(other);
            o.name == def.name
                && o.has_generic_params() == def.has_generic_params()
                && ctx.type_expr_name(&o.return_type) == ret_name
                && o.params.len() == param_names.len()
                && o.params
                    .iter()
                    .zip(&param_names)
                    .all(|(p, name)| ctx.type_expr_name(&p.ty) == *name)
        });
        if ambiguous {
            return Err(Error::AmbiguousMethod(format!(
                "{}::{}({})",
                ctx.full_name(ty),
                def.name,
                param_names.join(", ")
            )));
        }

        let rt = &self.rt;
        out.emit(if def.has_generic_params() {
            OpCode::Ldc_I4_1
        } else {
            OpCode::Ldc_I4_0
        });
        out.push(OpCode::Ldstr, Constant::String(def.name.clone()));
        out.push(OpCode::Ldstr, Constant::String(ret_name));
        #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
        out.push(OpCode::Ldc_I4, Constant::Int32(param_names.len() as i32));
        out.push(OpCode::Newarr, TypeExpr::Simple(rt.mono.string));
        for (k, name) in param_names.into_iter().enumerate() {
            out.emit(OpCode::Dup);
            #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
            out.push(OpCode::Ldc_I4, Constant::Int32(k as i32));
            out.push(OpCode::Ldstr, Constant::String(name));
            out.emit(OpCode::Stelem_Ref);
        }
        out.push(OpCode::Call, MethodRef::from(rt.il2cpp.get_method));

        self.tokenless += 1;
        self.ctx
            .events
            .record(EventKind::TokenlessLookup)
            .method(method)
            .pass("initialization_class");
        Ok(())
    }

    /// `MethodInfoPtrGeneric_{i}<TypeParams.., MethodParams..>.Pointer`.
    fn generic_method_holder(
        &mut self,
        init: TypeId,
        ty: TypeId,
        method: MethodId,
        open_store: FieldId,
        index: usize,
    ) -> Result<()> {
        let rt = self.rt.clone();
        let holder = self.ctx.inject_nested_type(
            init,
            &format!("MethodInfoPtrGeneric_{index}"),
            TypeAttributes::NESTED_ASSEMBLY | TypeAttributes::ABSTRACT | TypeAttributes::SEALED,
            Some(TypeExpr::Simple(rt.mono.object)),
        );
        let mut params = copy_generic_params(&self.ctx.ty(init).generic_params);
        params.extend(copy_generic_params(&self.ctx.method(method).generic_params));
        self.ctx.ty_mut(holder).generic_params = params;
        let pointer = self.ctx.inject_field(holder, "Pointer", rt.mono.intptr_type(), STORAGE);
        self.ctx.extras.method_info_field.remove(method);
        self.ctx.extras.method_info_field.attach(method, pointer)?;

        let type_arity = self.ctx.ty(init).generic_params.len();
        let holder_params = self.ctx.type_params(holder);
        let (type_args, method_args) = holder_params.split_at(type_arity);

        let mut out = InstructionList::new();
        out.push(OpCode::Ldsfld, FieldRef::on_instance(open_store, type_args.to_vec()));
        out.push(OpCode::Ldsfld, rt.class_pointer(instance(ty, type_args.to_vec())));
        class_pointer_array(&mut out, &rt, method_args);
        out.push(OpCode::Call, MethodRef::from(rt.il2cpp.get_generic_instance_method));
        out.push(OpCode::Stsfld, FieldRef::on_instance(pointer, holder_params.clone()));
        out.emit(OpCode::Ret);
        inject_static_constructor(self.ctx, holder, out)?;
        Ok(())
    }

    /// `ICall_Delegate_Type_{i}` with a runtime `.ctor` and `Invoke`.
    fn icall_delegate(
        &mut self,
        init: TypeId,
        ty: TypeId,
        method: MethodId,
        index: usize,
    ) -> Result<(TypeId, FieldId, MethodId)> {
        let rt = self.rt.clone();
        let delegate = self.ctx.inject_nested_type(
            init,
            &format!("ICall_Delegate_Type_{index}"),
            TypeAttributes::NESTED_ASSEMBLY | TypeAttributes::SEALED,
            Some(TypeExpr::Simple(rt.mono.multicast_delegate)),
        );
        let ctor = self.ctx.inject_method(
            delegate,
            ".ctor",
            MethodAttributes::PUBLIC
                | MethodAttributes::HIDE_BY_SIG
                | MethodAttributes::SPECIAL_NAME
                | MethodAttributes::RT_SPECIAL_NAME,
            rt.mono.void_type(),
            vec![
                ParamDef::new("object", TypeExpr::Simple(rt.mono.object)),
                ParamDef::new("method", rt.mono.intptr_type()),
            ],
        );

        let def = self.ctx.method(method).clone();
        let mut params = Vec::with_capacity(def.params.len() + 1);
        if def.has_this() {
            params.push(ParamDef::new("self", self.ctx.self_instance(ty)));
        }
        params.extend(def.params.iter().cloned());
        let invoke = self.ctx.inject_method(
            delegate,
            "Invoke",
            MethodAttributes::PUBLIC
                | MethodAttributes::HIDE_BY_SIG
                | MethodAttributes::NEW_SLOT
                | MethodAttributes::VIRTUAL,
            def.return_type.clone(),
            params,
        );
        for m in [ctor, invoke] {
            self.ctx.method_mut(m).impl_attributes = MethodImplAttributes::RUNTIME;
            self.ctx.extras.runtime_implemented.mark(m);
        }
        let field = self.ctx.inject_field(
            init,
            &format!("ICall_Delegate_Field_{index}"),
            TypeExpr::Simple(delegate),
            STORAGE,
        );
        Ok((delegate, field, invoke))
    }
}

/// Closed nominal types mentioned by the signatures of generated types.
fn signature_types(ctx: &AppContext, types: &[TypeId]) -> Vec<TypeExpr> {
    let mut found = Vec::new();
    for &ty in types {
        let def = ctx.ty(ty);
        found.push(ctx.self_instance(ty));
        found.extend(def.base.iter().cloned());
        found.extend(def.interfaces.iter().cloned());
        for &field in &def.fields {
            found.push(ctx.field(field).ty.clone());
        }
        for &method in &def.methods {
            let m = ctx.method(method);
            found.push(m.return_type.clone());
            found.extend(m.params.iter().map(|p| p.ty.clone()));
        }
    }
    found
        .into_iter()
        .filter(|t| matches!(t, TypeExpr::Simple(_) | TypeExpr::GenericInstance { .. }))
        .filter(|t| !is_non_instantiable(t) && !ctx.is_void(t))
        .collect()
}

fn global_initializer(ctx: &mut AppContext, types: &[TypeId]) -> Result<MethodId> {
    let rt = ctx.runtime()?.clone();
    let mut conversion = TypeConversion::new(ctx)?;
    let mut seen = HashSet::new();
    let mut out = InstructionList::new();
    for ty in signature_types(ctx, types) {
        let converted = conversion.convert(&ty);
        if !seen.insert(converted.clone()) {
            continue;
        }
        out.push(OpCode::Ldtoken, converted);
        out.push(OpCode::Call, MethodRef::from(rt.mono.run_class_constructor));
    }
    out.emit(OpCode::Ret);

    let assembly = ctx.inject_assembly(INITIALIZER_ASSEMBLY, false)?;
    let class = ctx.inject_type(
        assembly,
        "Il2CppInterop.Initialization",
        "Il2CppInitialization",
        TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT | TypeAttributes::SEALED,
        Some(TypeExpr::Simple(rt.mono.object)),
    );
    let initialize = ctx.inject_method(
        class,
        "Initialize",
        MethodAttributes::PUBLIC | MethodAttributes::HIDE_BY_SIG | MethodAttributes::STATIC,
        rt.mono.void_type(),
        Vec::new(),
    );
    debug!("Initialize() forces {} class constructors", seen.len());
    ctx.extras.bodies.attach(initialize, MethodBody::native(out))?;
    Ok(initialize)
}

impl GeneratorPass for InitializationClassPass {
    fn name(&self) -> &'static str {
        "InitializationClass"
    }

    fn id(&self) -> &'static str {
        "initialization_class"
    }

    fn description(&self) -> &'static str {
        "Creates the classes that resolve native class, field and method handles"
    }

    fn process(&self, ctx: &mut AppContext) -> Result<()> {
        let rt = ctx.runtime()?.clone();
        let mut processed = Vec::new();
        let mut initializer = Initializer {
            ctx: &mut *ctx,
            rt,
            tokenless: 0,
        };
        for assembly in generated_assemblies(initializer.ctx) {
            // Initialization classes land in the same assembly; only the
            // types present before this pass are walked.
            for ty in initializer.ctx.types_of(assembly) {
                if initializer.ctx.is_injected_type(ty) {
                    continue;
                }
                initializer.process_type(ty)?;
                processed.push(ty);
            }
        }
        let tokenless = initializer.tokenless;
        info!("Tokenless method count: {tokenless}");

        if self.eager {
            global_initializer(ctx, &processed)?;
        }
        Ok(())
    }
}
