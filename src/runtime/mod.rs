//! The interop runtime surface generated code calls into.
//!
//! Generated bodies never call the native runtime directly; they go through
//! a small managed support library (`Il2CppInterop.Runtime`) plus a handful
//! of reference-corlib types. [`RuntimeSurface::inject`] locates each of
//! those members in the arena, creating any type that is missing along with
//! all of its members. A type that already exists but lacks a member is
//! reported as [`Error::MissingMember`]: the input claims to provide the
//! runtime but does not.
//!
//! The resulting ids are grouped by owner so passes can write
//! `rt.il2cpp.get_class` rather than looking members up by name.

use std::collections::HashSet;

use crate::{
    config::{MONO_CORLIB, RUNTIME_ASSEMBLY},
    model::{
        AppContext, AssemblyId, FieldAttributes, FieldId, FieldRef, GenericParamDef,
        MethodAttributes, MethodId, ParamDef, TypeAttributes, TypeId,
    },
    typesystem::TypeExpr,
    Error, Result,
};

const RUNTIME_NAMESPACE: &str = "Il2CppInterop.Runtime";
const INTEROP_NAMESPACE: &str = "Il2CppInterop.Runtime.InteropTypes";
const ARRAYS_NAMESPACE: &str = "Il2CppInterop.Runtime.InteropTypes.Arrays";

/// Reference-corlib (`System.*`) types used by generated code.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub struct MonoCorlib {
    pub assembly: AssemblyId,
    pub object: TypeId,
    pub value_type: TypeId,
    pub enum_type: TypeId,
    pub void: TypeId,
    pub boolean: TypeId,
    pub char: TypeId,
    pub sbyte: TypeId,
    pub byte: TypeId,
    pub int16: TypeId,
    pub uint16: TypeId,
    pub int32: TypeId,
    pub uint32: TypeId,
    pub int64: TypeId,
    pub uint64: TypeId,
    pub single: TypeId,
    pub double: TypeId,
    pub intptr: TypeId,
    pub uintptr: TypeId,
    pub string: TypeId,
    pub type_type: TypeId,
    pub runtime_type_handle: TypeId,
    pub delegate: TypeId,
    pub multicast_delegate: TypeId,
    pub exception: TypeId,
    pub runtime_helpers: TypeId,
    pub span: TypeId,
    pub read_only_span: TypeId,
    /// `IntPtr.get_Size()`
    pub intptr_size: MethodId,
    /// `RuntimeHelpers.RunClassConstructor(RuntimeTypeHandle)`
    pub run_class_constructor: MethodId,
    /// `Type.GetTypeFromHandle(RuntimeTypeHandle)`
    pub get_type_from_handle: MethodId,
}

impl MonoCorlib {
    /// `System.Void` as a type expression.
    #[must_use]
    pub fn void_type(&self) -> TypeExpr {
        TypeExpr::Simple(self.void)
    }

    /// `System.IntPtr` as a type expression.
    #[must_use]
    pub fn intptr_type(&self) -> TypeExpr {
        TypeExpr::Simple(self.intptr)
    }

    /// `System.Int32` as a type expression.
    #[must_use]
    pub fn int32_type(&self) -> TypeExpr {
        TypeExpr::Simple(self.int32)
    }

    /// `byte*`
    #[must_use]
    pub fn byte_pointer(&self) -> TypeExpr {
        TypeExpr::Simple(self.byte).pointer()
    }

    /// `IntPtr*`
    #[must_use]
    pub fn intptr_pointer(&self) -> TypeExpr {
        TypeExpr::Simple(self.intptr).pointer()
    }

    /// `Span<byte>`
    #[must_use]
    pub fn byte_span(&self) -> TypeExpr {
        TypeExpr::generic_instance(self.span, vec![TypeExpr::Simple(self.byte)])
    }

    /// `ReadOnlySpan<byte>`
    #[must_use]
    pub fn read_only_byte_span(&self) -> TypeExpr {
        TypeExpr::generic_instance(self.read_only_span, vec![TypeExpr::Simple(self.byte)])
    }
}

/// Native runtime entry points exposed by the static `IL2CPP` class.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub struct Il2CppApi {
    pub class: TypeId,
    pub get_class: MethodId,
    pub get_nested_type: MethodId,
    pub get_generic_instance_type: MethodId,
    pub runtime_class_init: MethodId,
    pub get_value_size: MethodId,
    pub get_field: MethodId,
    pub field_get_offset: MethodId,
    pub get_method: MethodId,
    pub get_method_by_token: MethodId,
    pub get_generic_instance_method: MethodId,
    pub resolve_icall: MethodId,
    pub new_object_pointer: MethodId,
    pub managed_string_to_il2cpp: MethodId,
    pub il2cpp_string_to_managed: MethodId,
    pub object_base_to_ptr: MethodId,
}

/// `RuntimeInvokeHelper`, the dispatcher used by the per-arity invoke helpers.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub struct InvokeHelpers {
    pub class: TypeId,
    pub invoke_action: MethodId,
    pub invoke_function: MethodId,
    pub required_stack_allocation_size: MethodId,
    pub prepare_parameter: MethodId,
    pub cleanup_parameter: MethodId,
}

/// `Il2CppTypeHelper`, raw value-type marshalling.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub struct TypeHelpers {
    pub class: TypeId,
    pub size_of: MethodId,
    pub read_from_pointer: MethodId,
    pub write_to_pointer: MethodId,
    /// `ReadReference<T>(ReadOnlySpan<byte>)`
    pub read_reference: MethodId,
    /// `WriteReference<T>(T, Span<byte>)`
    pub write_reference: MethodId,
    /// `ReadFromSpanAtOffset<T>(ReadOnlySpan<byte>, int)`
    pub read_from_span_at_offset: MethodId,
    /// `WriteToSpanAtOffset<T>(T, Span<byte>, int)`
    pub write_to_span_at_offset: MethodId,
    /// `ReadFromSpanBlittable<T>(ReadOnlySpan<byte>)`
    pub read_from_span_blittable: MethodId,
    /// `WriteToSpanBlittable<T>(T, Span<byte>)`
    pub write_to_span_blittable: MethodId,
}

/// `FieldAccessHelper`, used by the synthesized field properties.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub struct FieldAccess {
    pub class: TypeId,
    pub get_static: MethodId,
    pub set_static: MethodId,
    pub get_instance: MethodId,
    pub set_instance_write_barrier: MethodId,
    pub set_instance_pointer: MethodId,
}

/// Interfaces and wrapper structs of `Il2CppInterop.Runtime.InteropTypes`.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub struct InteropTypes {
    pub iil2cpp_type: TypeId,
    /// `static abstract int IIl2CppType.Size { get; }`
    pub get_size: MethodId,
    /// `IntPtr IIl2CppType.ObjectClass { get; }`
    pub get_object_class: MethodId,
    pub iil2cpp_type_generic: TypeId,
    /// `static abstract T IIl2CppType<T>.ReadFromSpan(ReadOnlySpan<byte>)`
    pub read_from_span: MethodId,
    /// `static abstract void IIl2CppType<T>.WriteToSpan(T, Span<byte>)`
    pub write_to_span: MethodId,
    pub by_reference: TypeId,
    /// `static ByReference<T> FromRef(ref T)`
    pub from_ref: MethodId,
    /// `static ref T ToRef(ByReference<T>)`
    pub to_ref: MethodId,
    pub pointer: TypeId,
    /// `static implicit operator T*(Pointer<T>)`
    pub pointer_to_native: MethodId,
    /// `static implicit operator Pointer<T>(T*)`
    pub pointer_from_native: MethodId,
    pub iil2cpp_object_base: TypeId,
    pub get_pointer: MethodId,
    pub object_pointer: TypeId,
    /// `static explicit operator ObjectPointer(IntPtr)`
    pub object_pointer_from_intptr: MethodId,
}

/// `Il2CppArrayBase` and its generic subclass.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub struct ArrayHelpers {
    pub base: TypeId,
    pub get_length: MethodId,
    pub load_element_unsafe: MethodId,
    pub store_element_unsafe: MethodId,
    pub generic: TypeId,
    pub get_item: MethodId,
    pub set_item: MethodId,
}

/// Bridging between native exception objects and managed exceptions.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub struct ExceptionSupport {
    pub il2cpp_exception: TypeId,
    /// `Il2CppException.Il2cppObject`
    pub il2cpp_object: FieldId,
    pub constructor: MethodId,
    pub iil2cpp_exception: TypeId,
    pub create_system_exception: MethodId,
}

/// Every runtime member generated code refers to.
#[derive(Debug, Clone)]
pub struct RuntimeSurface {
    /// The runtime-support assembly.
    pub assembly: AssemblyId,
    /// Reference-corlib types.
    pub mono: MonoCorlib,
    /// Native runtime entry points.
    pub il2cpp: Il2CppApi,
    /// `Il2CppClassPointerStore<T>`.
    pub class_pointer_store: TypeId,
    /// `Il2CppClassPointerStore<T>.NativeClassPtr`.
    pub native_class_ptr: FieldId,
    /// Native call dispatch.
    pub invoke: InvokeHelpers,
    /// Value-type marshalling.
    pub type_helper: TypeHelpers,
    /// Field access through native handles.
    pub field_access: FieldAccess,
    /// Interop interfaces and wrappers.
    pub interop: InteropTypes,
    /// Array wrappers.
    pub arrays: ArrayHelpers,
    /// Exception wrappers.
    pub exceptions: ExceptionSupport,
    /// `Il2CppType`.
    pub il2cpp_type: TypeId,
    /// `Il2CppType.From(System.Type)`.
    pub il2cpp_type_from: MethodId,
}

impl RuntimeSurface {
    /// `Il2CppClassPointerStore<ty>.NativeClassPtr`.
    #[must_use]
    pub fn class_pointer(&self, ty: TypeExpr) -> FieldRef {
        FieldRef::on_instance(self.native_class_ptr, vec![ty])
    }

    /// `ByReference<element>` as a type expression.
    #[must_use]
    pub fn by_reference_of(&self, element: TypeExpr) -> TypeExpr {
        TypeExpr::generic_instance(self.interop.by_reference, vec![element])
    }

    /// `Pointer<element>` as a type expression.
    #[must_use]
    pub fn pointer_of(&self, element: TypeExpr) -> TypeExpr {
        TypeExpr::generic_instance(self.interop.pointer, vec![element])
    }

    /// `Il2CppArrayBase<element>` as a type expression.
    #[must_use]
    pub fn array_of(&self, element: TypeExpr) -> TypeExpr {
        TypeExpr::generic_instance(self.arrays.generic, vec![element])
    }

    /// Locates or creates every runtime member.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingMember`] when a pre-existing runtime type
    /// lacks a member, and [`Error::DuplicateData`] if an assembly cannot be
    /// created.
    pub fn inject(ctx: &mut AppContext) -> Result<Self> {
        let mut b = SurfaceBuilder {
            ctx,
            created: HashSet::new(),
        };
        let mono = b.mono_corlib()?;
        let assembly = b.assembly(RUNTIME_ASSEMBLY)?;
        let object = TypeExpr::Simple(mono.object);
        let value_type = TypeExpr::Simple(mono.value_type);
        let void = mono.void_type();
        let intptr = mono.intptr_type();
        let int32 = mono.int32_type();
        let string = TypeExpr::Simple(mono.string);

        let static_class = TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT | TypeAttributes::SEALED;
        let interface = TypeAttributes::PUBLIC | TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT;
        let structure =
            TypeAttributes::PUBLIC | TypeAttributes::SEALED | TypeAttributes::SEQUENTIAL_LAYOUT;
        let public_static = MethodAttributes::PUBLIC | MethodAttributes::STATIC | MethodAttributes::HIDE_BY_SIG;
        let public_instance = MethodAttributes::PUBLIC | MethodAttributes::HIDE_BY_SIG;
        let operator = public_static | MethodAttributes::SPECIAL_NAME;
        let abstract_slot = MethodAttributes::PUBLIC
            | MethodAttributes::HIDE_BY_SIG
            | MethodAttributes::VIRTUAL
            | MethodAttributes::NEW_SLOT
            | MethodAttributes::ABSTRACT;
        let ctor_attrs = MethodAttributes::PUBLIC
            | MethodAttributes::HIDE_BY_SIG
            | MethodAttributes::SPECIAL_NAME
            | MethodAttributes::RT_SPECIAL_NAME;

        // Interop interfaces and wrappers
        let iil2cpp_object_base =
            b.ty(assembly, INTEROP_NAMESPACE, "IIl2CppObjectBase", interface, None, &[]);
        let get_pointer = b.method(iil2cpp_object_base, "get_Pointer", abstract_slot, &[], |_| {
            (intptr.clone(), Vec::new())
        })?;
        let static_slot = abstract_slot | MethodAttributes::STATIC | MethodAttributes::SPECIAL_NAME;
        let iil2cpp_type = b.ty(assembly, INTEROP_NAMESPACE, "IIl2CppType", interface, None, &[]);
        let get_size = b.method(iil2cpp_type, "get_Size", static_slot, &[], |_| (int32.clone(), Vec::new()))?;
        let get_object_class = b.method(
            iil2cpp_type,
            "get_ObjectClass",
            abstract_slot | MethodAttributes::SPECIAL_NAME,
            &[],
            |_| (intptr.clone(), Vec::new()),
        )?;
        let iil2cpp_type_generic =
            b.ty(assembly, INTEROP_NAMESPACE, "IIl2CppType`1", interface, None, &["T"]);
        if b.created.contains(&iil2cpp_type_generic) {
            b.ctx
                .ty_mut(iil2cpp_type_generic)
                .interfaces
                .push(TypeExpr::Simple(iil2cpp_type));
        }
        let self_t = TypeExpr::type_param(iil2cpp_type_generic, 0);
        let read_from_span = b.method(iil2cpp_type_generic, "ReadFromSpan", abstract_slot | MethodAttributes::STATIC, &[], |_| {
            (self_t.clone(), vec![mono.read_only_byte_span()])
        })?;
        let write_to_span = b.method(iil2cpp_type_generic, "WriteToSpan", abstract_slot | MethodAttributes::STATIC, &[], |_| {
            (void.clone(), vec![self_t.clone(), mono.byte_span()])
        })?;

        let object_pointer = b.ty(
            assembly,
            INTEROP_NAMESPACE,
            "ObjectPointer",
            structure,
            Some(value_type.clone()),
            &[],
        );
        let object_pointer_from_intptr = b.method(object_pointer, "op_Explicit", operator, &[], |_| {
            (TypeExpr::Simple(object_pointer), vec![intptr.clone()])
        })?;

        let by_reference = b.ty(
            assembly,
            INTEROP_NAMESPACE,
            "ByReference`1",
            structure,
            Some(value_type.clone()),
            &["T"],
        );
        let by_ref_t = TypeExpr::type_param(by_reference, 0);
        let by_ref_self = TypeExpr::generic_instance(by_reference, vec![by_ref_t.clone()]);
        let from_ref = b.method(by_reference, "FromRef", public_static, &[], |_| {
            (by_ref_self.clone(), vec![by_ref_t.clone().by_ref()])
        })?;
        let to_ref = b.method(by_reference, "ToRef", public_static, &[], |_| {
            (by_ref_t.clone().by_ref(), vec![by_ref_self.clone()])
        })?;

        let pointer = b.ty(
            assembly,
            INTEROP_NAMESPACE,
            "Pointer`1",
            structure,
            Some(value_type.clone()),
            &["T"],
        );
        let pointer_t = TypeExpr::type_param(pointer, 0);
        let pointer_self = TypeExpr::generic_instance(pointer, vec![pointer_t.clone()]);
        let pointer_to_native = b.method(pointer, "op_Implicit", operator, &[], |_| {
            (pointer_t.clone().pointer(), vec![pointer_self.clone()])
        })?;
        let pointer_from_native = b.method_where(
            pointer,
            "op_Implicit",
            operator,
            &[],
            |_| (pointer_self.clone(), vec![pointer_t.clone().pointer()]),
            |ctx, m| ctx.method(m).params.first().is_some_and(|p| p.ty.is_pointer()),
        )?;

        // IL2CPP
        let il2cpp_class = b.ty(assembly, RUNTIME_NAMESPACE, "IL2CPP", static_class, Some(object.clone()), &[]);
        let api = |b: &mut SurfaceBuilder<'_>, name: &str, ret: &TypeExpr, params: Vec<TypeExpr>| {
            b.method(il2cpp_class, name, public_static, &[], |_| (ret.clone(), params))
        };
        let get_class = api(&mut b, "GetIl2CppClass", &intptr, vec![string.clone(), string.clone(), string.clone()])?;
        let get_nested_type = api(&mut b, "GetIl2CppNestedType", &intptr, vec![intptr.clone(), string.clone()])?;
        let get_generic_instance_type = api(
            &mut b,
            "GetIl2CppGenericInstanceType",
            &intptr,
            vec![intptr.clone(), intptr.clone().sz_array()],
        )?;
        let runtime_class_init = api(&mut b, "il2cpp_runtime_class_init", &void, vec![intptr.clone()])?;
        let get_value_size = api(&mut b, "GetIl2cppValueSize", &int32, vec![intptr.clone()])?;
        let get_field = api(&mut b, "GetIl2CppField", &intptr, vec![intptr.clone(), string.clone()])?;
        let field_get_offset = api(
            &mut b,
            "il2cpp_field_get_offset",
            &TypeExpr::Simple(mono.uint32),
            vec![intptr.clone()],
        )?;
        let get_method = api(
            &mut b,
            "GetIl2CppMethod",
            &intptr,
            vec![
                intptr.clone(),
                TypeExpr::Simple(mono.boolean),
                string.clone(),
                string.clone(),
                string.clone().sz_array(),
            ],
        )?;
        let get_method_by_token = api(&mut b, "GetIl2CppMethodByToken", &intptr, vec![intptr.clone(), int32.clone()])?;
        let get_generic_instance_method = api(
            &mut b,
            "GetIl2CppGenericInstanceMethod",
            &intptr,
            vec![intptr.clone(), intptr.clone(), intptr.clone().sz_array()],
        )?;
        let resolve_icall = b.method(il2cpp_class, "ResolveICall", public_static, &["T"], |gps| {
            (gps[0].clone(), vec![string.clone()])
        })?;
        let new_object_pointer = b.method(il2cpp_class, "NewObjectPointer", public_static, &["T"], |_| {
            (TypeExpr::Simple(object_pointer), Vec::new())
        })?;
        let managed_string_to_il2cpp = api(&mut b, "ManagedStringToIl2Cpp", &intptr, vec![string.clone()])?;
        let il2cpp_string_to_managed = api(&mut b, "Il2CppStringToManaged", &string, vec![intptr.clone()])?;
        let object_base_to_ptr = api(
            &mut b,
            "Il2CppObjectBaseToPtr",
            &intptr,
            vec![TypeExpr::Simple(iil2cpp_object_base)],
        )?;

        // Class pointer store
        let class_pointer_store = b.ty(
            assembly,
            RUNTIME_NAMESPACE,
            "Il2CppClassPointerStore`1",
            static_class,
            Some(object.clone()),
            &["T"],
        );
        let native_class_ptr = b.field(
            class_pointer_store,
            "NativeClassPtr",
            intptr.clone(),
            FieldAttributes::PUBLIC | FieldAttributes::STATIC,
        )?;

        // Invoke helpers
        let invoke_class = b.ty(assembly, RUNTIME_NAMESPACE, "RuntimeInvokeHelper", static_class, Some(object.clone()), &[]);
        let void_pointer = void.clone().pointer();
        let args_pointer = void_pointer.clone().pointer();
        let invoke_action = b.method(invoke_class, "InvokeAction", public_static, &[], |_| {
            (void.clone(), vec![intptr.clone(), intptr.clone(), args_pointer.clone()])
        })?;
        let invoke_function = b.method(invoke_class, "InvokeFunction", public_static, &["TResult"], |gps| {
            (gps[0].clone(), vec![intptr.clone(), intptr.clone(), args_pointer.clone()])
        })?;
        let required_stack_allocation_size =
            b.method(invoke_class, "RequiredStackAllocationSize", public_static, &["T"], |_| {
                (int32.clone(), Vec::new())
            })?;
        let prepare_parameter = b.method(invoke_class, "PrepareParameter", public_static, &["T"], |gps| {
            (void_pointer.clone(), vec![gps[0].clone(), mono.byte_pointer()])
        })?;
        let cleanup_parameter = b.method(invoke_class, "CleanupParameter", public_static, &["T"], |gps| {
            (void.clone(), vec![gps[0].clone(), mono.byte_pointer()])
        })?;

        // Type helper
        let type_helper_class = b.ty(assembly, RUNTIME_NAMESPACE, "Il2CppTypeHelper", static_class, Some(object.clone()), &[]);
        let size_of = b.method(type_helper_class, "SizeOf", public_static, &["T"], |_| (int32.clone(), Vec::new()))?;
        let read_from_pointer = b.method(type_helper_class, "ReadFromPointer", public_static, &["T"], |gps| {
            (gps[0].clone(), vec![mono.byte_pointer()])
        })?;
        let write_to_pointer = b.method(type_helper_class, "WriteToPointer", public_static, &["T"], |gps| {
            (void.clone(), vec![gps[0].clone(), mono.byte_pointer()])
        })?;
        let read_span = mono.read_only_byte_span();
        let write_span = mono.byte_span();
        let read_reference = b.method(type_helper_class, "ReadReference", public_static, &["T"], |gps| {
            (gps[0].clone(), vec![read_span.clone()])
        })?;
        let write_reference = b.method(type_helper_class, "WriteReference", public_static, &["T"], |gps| {
            (void.clone(), vec![gps[0].clone(), write_span.clone()])
        })?;
        let read_from_span_at_offset =
            b.method(type_helper_class, "ReadFromSpanAtOffset", public_static, &["T"], |gps| {
                (gps[0].clone(), vec![read_span.clone(), int32.clone()])
            })?;
        let write_to_span_at_offset =
            b.method(type_helper_class, "WriteToSpanAtOffset", public_static, &["T"], |gps| {
                (void.clone(), vec![gps[0].clone(), write_span.clone(), int32.clone()])
            })?;
        let read_from_span_blittable =
            b.method(type_helper_class, "ReadFromSpanBlittable", public_static, &["T"], |gps| {
                (gps[0].clone(), vec![read_span.clone()])
            })?;
        let write_to_span_blittable =
            b.method(type_helper_class, "WriteToSpanBlittable", public_static, &["T"], |gps| {
                (void.clone(), vec![gps[0].clone(), write_span.clone()])
            })?;

        // Field access
        let field_class = b.ty(assembly, RUNTIME_NAMESPACE, "FieldAccessHelper", static_class, Some(object.clone()), &[]);
        let object_base = TypeExpr::Simple(iil2cpp_object_base);
        let get_static = b.method(field_class, "GetStaticFieldValue", public_static, &["T"], |gps| {
            (gps[0].clone(), vec![intptr.clone()])
        })?;
        let set_static = b.method(field_class, "SetStaticFieldValue", public_static, &["T"], |gps| {
            (void.clone(), vec![intptr.clone(), gps[0].clone()])
        })?;
        let get_instance = b.method(field_class, "GetInstanceFieldValue", public_static, &["T"], |gps| {
            (gps[0].clone(), vec![object_base.clone(), int32.clone()])
        })?;
        let set_instance_write_barrier =
            b.method(field_class, "SetInstanceFieldValue_Wbarrior", public_static, &["T"], |gps| {
                (void.clone(), vec![object_base.clone(), int32.clone(), gps[0].clone()])
            })?;
        let set_instance_pointer =
            b.method(field_class, "SetInstanceFieldValue_Pointer", public_static, &["T"], |gps| {
                (void.clone(), vec![object_base.clone(), int32.clone(), gps[0].clone()])
            })?;

        // Arrays
        let array_base = b.ty(
            assembly,
            ARRAYS_NAMESPACE,
            "Il2CppArrayBase",
            TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT,
            Some(object.clone()),
            &[],
        );
        let get_length = b.method(array_base, "get_Length", public_instance | MethodAttributes::SPECIAL_NAME, &[], |_| {
            (int32.clone(), Vec::new())
        })?;
        let load_element_unsafe = b.method(array_base, "LoadElementUnsafe", public_instance, &["T"], |gps| {
            (gps[0].clone(), vec![int32.clone()])
        })?;
        let store_element_unsafe = b.method(array_base, "StoreElementUnsafe", public_instance, &["T"], |gps| {
            (void.clone(), vec![int32.clone(), gps[0].clone()])
        })?;
        let array_generic = b.ty(
            assembly,
            ARRAYS_NAMESPACE,
            "Il2CppArrayBase`1",
            TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT,
            Some(TypeExpr::Simple(array_base)),
            &["T"],
        );
        let element = TypeExpr::type_param(array_generic, 0);
        let accessor = public_instance | MethodAttributes::SPECIAL_NAME | MethodAttributes::VIRTUAL;
        let get_item = b.method(array_generic, "get_Item", accessor, &[], |_| (element.clone(), vec![int32.clone()]))?;
        let set_item = b.method(array_generic, "set_Item", accessor, &[], |_| {
            (void.clone(), vec![int32.clone(), element.clone()])
        })?;

        // Exceptions
        let native_exception = b
            .ctx
            .il2cpp_corlib_type("Exception")
            .map_or_else(|| object.clone(), TypeExpr::Simple);
        let il2cpp_exception = b.ty(
            assembly,
            RUNTIME_NAMESPACE,
            "Il2CppException",
            TypeAttributes::PUBLIC,
            Some(TypeExpr::Simple(mono.exception)),
            &[],
        );
        let il2cpp_object = b.field(
            il2cpp_exception,
            "Il2cppObject",
            native_exception.clone(),
            FieldAttributes::PUBLIC | FieldAttributes::INIT_ONLY,
        )?;
        let constructor = b.method(il2cpp_exception, ".ctor", ctor_attrs, &[], |_| {
            (void.clone(), vec![native_exception.clone()])
        })?;
        let iil2cpp_exception = b.ty(assembly, INTEROP_NAMESPACE, "IIl2CppException", interface, None, &[]);
        let create_system_exception =
            b.method(iil2cpp_exception, "CreateSystemException", abstract_slot, &[], |_| {
                (TypeExpr::Simple(mono.exception), Vec::new())
            })?;

        // Il2CppType
        let native_type = b
            .ctx
            .il2cpp_corlib_type("Type")
            .map_or_else(|| object.clone(), TypeExpr::Simple);
        let il2cpp_type = b.ty(assembly, RUNTIME_NAMESPACE, "Il2CppType", static_class, Some(object.clone()), &[]);
        let il2cpp_type_from = b.method(il2cpp_type, "From", public_static, &[], |_| {
            (native_type.clone(), vec![TypeExpr::Simple(mono.type_type)])
        })?;

        log::debug!("Runtime surface ready, {} types created", b.created.len());

        Ok(Self {
            assembly,
            il2cpp: Il2CppApi {
                class: il2cpp_class,
                get_class,
                get_nested_type,
                get_generic_instance_type,
                runtime_class_init,
                get_value_size,
                get_field,
                field_get_offset,
                get_method,
                get_method_by_token,
                get_generic_instance_method,
                resolve_icall,
                new_object_pointer,
                managed_string_to_il2cpp,
                il2cpp_string_to_managed,
                object_base_to_ptr,
            },
            class_pointer_store,
            native_class_ptr,
            invoke: InvokeHelpers {
                class: invoke_class,
                invoke_action,
                invoke_function,
                required_stack_allocation_size,
                prepare_parameter,
                cleanup_parameter,
            },
            type_helper: TypeHelpers {
                class: type_helper_class,
                size_of,
                read_from_pointer,
                write_to_pointer,
                read_reference,
                write_reference,
                read_from_span_at_offset,
                write_to_span_at_offset,
                read_from_span_blittable,
                write_to_span_blittable,
            },
            field_access: FieldAccess {
                class: field_class,
                get_static,
                set_static,
                get_instance,
                set_instance_write_barrier,
                set_instance_pointer,
            },
            interop: InteropTypes {
                iil2cpp_type,
                get_size,
                get_object_class,
                iil2cpp_type_generic,
                read_from_span,
                write_to_span,
                by_reference,
                from_ref,
                to_ref,
                pointer,
                pointer_to_native,
                pointer_from_native,
                iil2cpp_object_base,
                get_pointer,
                object_pointer,
                object_pointer_from_intptr,
            },
            arrays: ArrayHelpers {
                base: array_base,
                get_length,
                load_element_unsafe,
                store_element_unsafe,
                generic: array_generic,
                get_item,
                set_item,
            },
            exceptions: ExceptionSupport {
                il2cpp_exception,
                il2cpp_object,
                constructor,
                iil2cpp_exception,
                create_system_exception,
            },
            il2cpp_type,
            il2cpp_type_from,
            mono,
        })
    }
}

/// Find-or-create helper; remembers which types it created so that only
/// those may receive new members.
struct SurfaceBuilder<'a> {
    ctx: &'a mut AppContext,
    created: HashSet<TypeId>,
}

impl SurfaceBuilder<'_> {
    fn assembly(&mut self, name: &str) -> Result<AssemblyId> {
        match self.ctx.assembly_by_name(name) {
            Some(id) => Ok(id),
            None => self.ctx.inject_assembly(name, true),
        }
    }

    fn ty(
        &mut self,
        assembly: AssemblyId,
        namespace: &str,
        name: &str,
        attributes: TypeAttributes,
        base: Option<TypeExpr>,
        generic_params: &[&str],
    ) -> TypeId {
        let full_name = format!("{namespace}.{name}");
        if let Some(id) = self.ctx.type_by_full_name(assembly, &full_name) {
            return id;
        }
        let id = self.ctx.inject_type(assembly, namespace, name, attributes, base);
        self.ctx.ty_mut(id).generic_params = generic_params
            .iter()
            .map(|n| GenericParamDef::new(*n))
            .collect();
        self.created.insert(id);
        id
    }

    fn method<F>(
        &mut self,
        owner: TypeId,
        name: &str,
        attributes: MethodAttributes,
        generic_params: &[&str],
        signature: F,
    ) -> Result<MethodId>
    where
        F: FnOnce(&[TypeExpr]) -> (TypeExpr, Vec<TypeExpr>),
    {
        self.method_where(owner, name, attributes, generic_params, signature, |_, _| true)
    }

    /// Like [`Self::method`], with an extra predicate to tell overloads of
    /// the same shape apart.
    fn method_where<F, P>(
        &mut self,
        owner: TypeId,
        name: &str,
        attributes: MethodAttributes,
        generic_params: &[&str],
        signature: F,
        accept: P,
    ) -> Result<MethodId>
    where
        F: FnOnce(&[TypeExpr]) -> (TypeExpr, Vec<TypeExpr>),
        P: Fn(&AppContext, MethodId) -> bool,
    {
        // The id the method receives if it has to be created.
        let next = MethodId::from_index(self.ctx.method_count());
        let gps: Vec<TypeExpr> = (0..generic_params.len())
            .map(|i| TypeExpr::method_param(next, i))
            .collect();
        let (return_type, params) = signature(&gps);

        let existing = {
            let ctx: &AppContext = self.ctx;
            ctx.ty(owner).methods.iter().copied().find(|m| {
                let def = ctx.method(*m);
                def.name == name
                    && def.generic_params.len() == generic_params.len()
                    && def.params.len() == params.len()
                    && accept(ctx, *m)
            })
        };
        if let Some(found) = existing {
            return Ok(found);
        }
        if !self.created.contains(&owner) {
            return Err(Error::MissingMember {
                owner: self.ctx.full_name(owner),
                name: name.to_string(),
            });
        }

        let params = params
            .into_iter()
            .enumerate()
            .map(|(i, ty)| ParamDef::new(format!("arg{i}"), ty))
            .collect();
        let id = self.ctx.inject_method(owner, name, attributes, return_type, params);
        if id != next {
            return Err(invariant_error!("method id moved while injecting {}", name));
        }
        self.ctx.method_mut(id).generic_params = generic_params
            .iter()
            .map(|n| GenericParamDef::new(*n))
            .collect();
        Ok(id)
    }

    fn field(&mut self, owner: TypeId, name: &str, ty: TypeExpr, attributes: FieldAttributes) -> Result<FieldId> {
        if let Some(found) = self.ctx.field_by_name(owner, name) {
            return Ok(found);
        }
        if !self.created.contains(&owner) {
            return Err(Error::MissingMember {
                owner: self.ctx.full_name(owner),
                name: name.to_string(),
            });
        }
        Ok(self.ctx.inject_field(owner, name, ty, attributes))
    }

    fn mono_corlib(&mut self) -> Result<MonoCorlib> {
        let assembly = self.assembly(MONO_CORLIB)?;
        let public = TypeAttributes::PUBLIC;
        let value = public | TypeAttributes::SEALED | TypeAttributes::SEQUENTIAL_LAYOUT;

        let object = self.ty(assembly, "System", "Object", public, None, &[]);
        let value_type = self.ty(
            assembly,
            "System",
            "ValueType",
            public | TypeAttributes::ABSTRACT,
            Some(object.into()),
            &[],
        );
        let enum_type = self.ty(
            assembly,
            "System",
            "Enum",
            public | TypeAttributes::ABSTRACT,
            Some(value_type.into()),
            &[],
        );
        let primitive = |b: &mut Self, name: &str| b.ty(assembly, "System", name, value, Some(value_type.into()), &[]);
        let void = primitive(self, "Void");
        let boolean = primitive(self, "Boolean");
        let char = primitive(self, "Char");
        let sbyte = primitive(self, "SByte");
        let byte = primitive(self, "Byte");
        let int16 = primitive(self, "Int16");
        let uint16 = primitive(self, "UInt16");
        let int32 = primitive(self, "Int32");
        let uint32 = primitive(self, "UInt32");
        let int64 = primitive(self, "Int64");
        let uint64 = primitive(self, "UInt64");
        let single = primitive(self, "Single");
        let double = primitive(self, "Double");
        let intptr = primitive(self, "IntPtr");
        let uintptr = primitive(self, "UIntPtr");
        let runtime_type_handle = primitive(self, "RuntimeTypeHandle");
        let string = self.ty(assembly, "System", "String", public | TypeAttributes::SEALED, Some(object.into()), &[]);
        let type_type = self.ty(
            assembly,
            "System",
            "Type",
            public | TypeAttributes::ABSTRACT,
            Some(object.into()),
            &[],
        );
        let delegate = self.ty(
            assembly,
            "System",
            "Delegate",
            public | TypeAttributes::ABSTRACT,
            Some(object.into()),
            &[],
        );
        let multicast_delegate = self.ty(
            assembly,
            "System",
            "MulticastDelegate",
            public | TypeAttributes::ABSTRACT,
            Some(delegate.into()),
            &[],
        );
        let exception = self.ty(assembly, "System", "Exception", public, Some(object.into()), &[]);
        let span = self.ty(assembly, "System", "Span`1", value, Some(value_type.into()), &["T"]);
        let read_only_span = self.ty(assembly, "System", "ReadOnlySpan`1", value, Some(value_type.into()), &["T"]);
        let runtime_helpers = self.ty(
            assembly,
            "System.Runtime.CompilerServices",
            "RuntimeHelpers",
            public | TypeAttributes::ABSTRACT | TypeAttributes::SEALED,
            Some(object.into()),
            &[],
        );

        let public_static = MethodAttributes::PUBLIC | MethodAttributes::STATIC | MethodAttributes::HIDE_BY_SIG;
        let run_class_constructor = self.method(runtime_helpers, "RunClassConstructor", public_static, &[], |_| {
            (void.into(), vec![runtime_type_handle.into()])
        })?;
        let get_type_from_handle = self.method(type_type, "GetTypeFromHandle", public_static, &[], |_| {
            (type_type.into(), vec![runtime_type_handle.into()])
        })?;
        let intptr_size = self.method(
            intptr,
            "get_Size",
            public_static | MethodAttributes::SPECIAL_NAME,
            &[],
            |_| (int32.into(), Vec::new()),
        )?;

        Ok(MonoCorlib {
            assembly,
            object,
            value_type,
            enum_type,
            void,
            boolean,
            char,
            sbyte,
            byte,
            int16,
            uint16,
            int32,
            uint32,
            int64,
            uint64,
            single,
            double,
            intptr,
            uintptr,
            string,
            type_type,
            runtime_type_handle,
            delegate,
            multicast_delegate,
            exception,
            runtime_helpers,
            span,
            read_only_span,
            intptr_size,
            run_class_constructor,
            get_type_from_handle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IL2CPP_CORLIB;

    #[test]
    fn injects_into_empty_context() {
        let mut ctx = AppContext::new();
        let rt = RuntimeSurface::inject(&mut ctx).unwrap();
        assert!(ctx.assembly(rt.assembly).is_reference);
        assert_eq!(ctx.full_name(rt.il2cpp.class), "Il2CppInterop.Runtime.IL2CPP");
        assert_eq!(ctx.method(rt.il2cpp.get_class).params.len(), 3);
        assert_eq!(ctx.method(rt.il2cpp.resolve_icall).generic_params.len(), 1);
        assert_eq!(
            ctx.method(rt.il2cpp.resolve_icall).return_type,
            TypeExpr::method_param(rt.il2cpp.resolve_icall, 0)
        );
        assert_eq!(
            ctx.full_name(rt.mono.runtime_helpers),
            "System.Runtime.CompilerServices.RuntimeHelpers"
        );
        assert!(ctx.is_value_type(rt.mono.int32));
        assert_ne!(rt.interop.pointer_to_native, rt.interop.pointer_from_native);
        assert!(ctx.method(rt.interop.pointer_from_native).params[0].ty.is_pointer());
    }

    #[test]
    fn second_injection_locates_everything() {
        let mut ctx = AppContext::new();
        let first = RuntimeSurface::inject(&mut ctx).unwrap();
        let methods = ctx.method_count();
        let second = RuntimeSurface::inject(&mut ctx).unwrap();
        assert_eq!(ctx.method_count(), methods);
        assert_eq!(first.il2cpp.get_method, second.il2cpp.get_method);
        assert_eq!(first.native_class_ptr, second.native_class_ptr);
        assert_eq!(first.interop.pointer_from_native, second.interop.pointer_from_native);
    }

    #[test]
    fn marshalling_interfaces_are_static_abstract() {
        let mut ctx = AppContext::new();
        let rt = RuntimeSurface::inject(&mut ctx).unwrap();
        assert!(ctx.ty(rt.interop.iil2cpp_type).is_interface());
        let size = ctx.method(rt.interop.get_size);
        assert!(size.attributes.contains(MethodAttributes::STATIC | MethodAttributes::ABSTRACT));
        assert_eq!(size.return_type, rt.mono.int32_type());

        let read = ctx.method(rt.interop.read_from_span);
        assert_eq!(read.declaring, rt.interop.iil2cpp_type_generic);
        assert_eq!(read.return_type, TypeExpr::type_param(rt.interop.iil2cpp_type_generic, 0));
        assert_eq!(read.params[0].ty, rt.mono.read_only_byte_span());
        let write = ctx.method(rt.interop.write_to_span);
        assert_eq!(write.params[1].ty, rt.mono.byte_span());

        let at_offset = ctx.method(rt.type_helper.read_from_span_at_offset);
        assert_eq!(at_offset.params.len(), 2);
        assert_eq!(ctx.full_name(rt.mono.span), "System.Span`1");
        assert_eq!(ctx.method(rt.mono.intptr_size).declaring, rt.mono.intptr);
    }

    #[test]
    fn incomplete_runtime_is_reported() {
        let mut ctx = AppContext::new();
        let asm = ctx.add_assembly(RUNTIME_ASSEMBLY, true).unwrap();
        ctx.add_type(
            asm,
            RUNTIME_NAMESPACE,
            "IL2CPP",
            TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT | TypeAttributes::SEALED,
            None,
        );
        match RuntimeSurface::inject(&mut ctx) {
            Err(Error::MissingMember { owner, name }) => {
                assert_eq!(owner, "Il2CppInterop.Runtime.IL2CPP");
                assert_eq!(name, "GetIl2CppClass");
            }
            other => panic!("expected a missing member, got {other:?}"),
        }
    }

    #[test]
    fn exception_field_prefers_native_exception() {
        let mut ctx = AppContext::new();
        let corlib = ctx.add_assembly(IL2CPP_CORLIB, false).unwrap();
        let object = ctx.add_type(corlib, "Il2CppSystem", "Object", TypeAttributes::PUBLIC, None);
        let exception = ctx.add_type(corlib, "Il2CppSystem", "Exception", TypeAttributes::PUBLIC, Some(object.into()));
        let rt = RuntimeSurface::inject(&mut ctx).unwrap();
        assert_eq!(ctx.field(rt.exceptions.il2cpp_object).ty, TypeExpr::Simple(exception));
    }
}
