//! Value conversions between the bridging and native representations.
//!
//! Native values are what the IL2CPP side stores (`Il2CppSystem.Int32`,
//! `Pointer<T>`, enum wrappers); bridging values are what ordinary managed
//! code sees (`System.Int32`, `T*`, the managed underlying primitive). A
//! conversion is a single `call` to an operator declared on the native type,
//! so every helper here appends at most one instruction.

use std::borrow::Cow;

use crate::{
    assembly::{InstructionList, OpCode},
    config::IL2CPP_CORLIB,
    model::{AppContext, MethodId, MethodRef, TypeId},
    typesystem::{visitor::rewrite, Rewriter, TypeExpr},
    Result,
};

/// Names of the `Il2CppSystem` primitives that have a `System` twin.
pub const PRIMITIVE_NAMES: [&str; 14] = [
    "Byte", "SByte", "Int16", "UInt16", "Int32", "UInt32", "IntPtr", "UIntPtr", "Int64", "UInt64",
    "Single", "Double", "Boolean", "Char",
];

/// Returns the `System` twin of an `Il2CppSystem` primitive.
#[must_use]
pub fn mono_primitive(ctx: &AppContext, ty: TypeId) -> Option<TypeId> {
    let def = ctx.ty(ty);
    if def.declaring.is_some()
        || def.namespace != "Il2CppSystem"
        || ctx.assembly(def.assembly).name != IL2CPP_CORLIB
        || !PRIMITIVE_NAMES.contains(&def.name.as_str())
    {
        return None;
    }
    ctx.mono_corlib_type(&def.name)
}

enum Shape {
    Primitive(TypeId, TypeId),
    Pointer(TypeExpr),
    ByReference(TypeExpr),
    Enum(TypeId, TypeExpr),
}

fn shape(ctx: &AppContext, ty: &TypeExpr) -> Result<Option<Shape>> {
    match ty {
        TypeExpr::Simple(id) => {
            if let Some(mono) = mono_primitive(ctx, *id) {
                return Ok(Some(Shape::Primitive(*id, mono)));
            }
            Ok(ctx
                .extras
                .enum_underlying
                .get(*id)
                .map(|u| Shape::Enum(*id, u.mono.clone())))
        }
        TypeExpr::GenericInstance { generic, args } if args.len() == 1 => {
            let rt = ctx.runtime()?;
            if *generic == rt.interop.pointer {
                Ok(Some(Shape::Pointer(args[0].clone())))
            } else if *generic == rt.interop.by_reference {
                Ok(Some(Shape::ByReference(args[0].clone())))
            } else {
                Ok(None)
            }
        }
        _ => Ok(None),
    }
}

fn missing(ctx: &AppContext, ty: TypeId, what: &str) -> crate::Error {
    invariant_error!("{} has no {} conversion", ctx.full_name(ty), what)
}

/// Appends the native-to-bridging conversion for a value of type `ty`.
///
/// Returns `false` when the type needs no conversion. Strings are left
/// alone; see [`il2cpp_string_to_mono`].
///
/// # Errors
///
/// Returns [`crate::Error::Invariant`] when a primitive or enum lacks the
/// operator an earlier pass injects.
pub fn native_to_bridging(ctx: &AppContext, ty: &TypeExpr, out: &mut InstructionList) -> Result<bool> {
    let method: MethodRef = match shape(ctx, ty)? {
        None => return Ok(false),
        Some(Shape::Primitive(native, mono)) => ctx
            .implicit_conversion_to(native, &TypeExpr::Simple(mono))
            .ok_or_else(|| missing(ctx, native, "implicit"))?
            .into(),
        Some(Shape::Enum(native, mono)) => ctx
            .explicit_conversion_to(native, &mono)
            .ok_or_else(|| missing(ctx, native, "explicit"))?
            .into(),
        Some(Shape::Pointer(element)) => {
            MethodRef::on_instance(ctx.runtime()?.interop.pointer_to_native, vec![element])
        }
        Some(Shape::ByReference(element)) => {
            MethodRef::on_instance(ctx.runtime()?.interop.to_ref, vec![element])
        }
    };
    out.push(OpCode::Call, method);
    Ok(true)
}

/// Appends the bridging-to-native conversion for a value of type `ty`.
///
/// The inverse of [`native_to_bridging`].
///
/// # Errors
///
/// Returns [`crate::Error::Invariant`] when a required operator is missing.
pub fn bridging_to_native(ctx: &AppContext, ty: &TypeExpr, out: &mut InstructionList) -> Result<bool> {
    let method: MethodRef = match shape(ctx, ty)? {
        None => return Ok(false),
        Some(Shape::Primitive(native, mono)) => ctx
            .implicit_conversion_from(native, &TypeExpr::Simple(mono))
            .ok_or_else(|| missing(ctx, native, "implicit"))?
            .into(),
        Some(Shape::Enum(native, mono)) => ctx
            .explicit_conversion_from(native, &mono)
            .ok_or_else(|| missing(ctx, native, "explicit"))?
            .into(),
        Some(Shape::Pointer(element)) => {
            MethodRef::on_instance(ctx.runtime()?.interop.pointer_from_native, vec![element])
        }
        Some(Shape::ByReference(element)) => {
            MethodRef::on_instance(ctx.runtime()?.interop.from_ref, vec![element])
        }
    };
    out.push(OpCode::Call, method);
    Ok(true)
}

fn string_conversion(ctx: &AppContext, to_mono: bool) -> Result<MethodId> {
    let native = ctx
        .il2cpp_corlib_type("String")
        .ok_or_else(|| invariant_error!("Il2CppSystem.String is missing"))?;
    let mono = TypeExpr::Simple(ctx.require_mono_type("String")?);
    let found = if to_mono {
        ctx.implicit_conversion_to(native, &mono)
    } else {
        ctx.implicit_conversion_from(native, &mono)
    };
    found.ok_or_else(|| missing(ctx, native, "string"))
}

/// Appends `Il2CppSystem.String -> System.String`.
///
/// # Errors
///
/// Returns [`crate::Error::Invariant`] before the string operators exist.
pub fn il2cpp_string_to_mono(ctx: &AppContext, out: &mut InstructionList) -> Result<()> {
    out.push(OpCode::Call, MethodRef::from(string_conversion(ctx, true)?));
    Ok(())
}

/// Appends `System.String -> Il2CppSystem.String`.
///
/// # Errors
///
/// Returns [`crate::Error::Invariant`] before the string operators exist.
pub fn mono_string_to_il2cpp(ctx: &AppContext, out: &mut InstructionList) -> Result<()> {
    out.push(OpCode::Call, MethodRef::from(string_conversion(ctx, false)?));
    Ok(())
}

/// Rewrites a native signature type into the type generated code declares.
///
/// The three corlib roots become their interfaces, and arrays, pointers and
/// managed references become the runtime wrapper structs.
pub struct TypeConversion {
    roots: Vec<(TypeId, TypeId)>,
    array: TypeId,
    pointer: TypeId,
    by_reference: TypeId,
}

impl TypeConversion {
    /// Builds the conversion for the current arena.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Invariant`] before the runtime surface exists.
    pub fn new(ctx: &AppContext) -> Result<Self> {
        let rt = ctx.runtime()?;
        let roots = [("Object", "IObject"), ("Enum", "IEnum"), ("ValueType", "IValueType")]
            .into_iter()
            .filter_map(|(from, to)| Some((ctx.il2cpp_corlib_type(from)?, ctx.il2cpp_corlib_type(to)?)))
            .collect();
        Ok(Self {
            roots,
            array: rt.arrays.generic,
            pointer: rt.interop.pointer,
            by_reference: rt.interop.by_reference,
        })
    }

    /// Applies the conversion.
    #[must_use]
    pub fn convert(&mut self, ty: &TypeExpr) -> TypeExpr {
        rewrite(ty, self).into_owned()
    }
}

impl Rewriter for TypeConversion {
    fn leaf(&mut self, ty: &TypeExpr) -> Option<TypeExpr> {
        let id = ty.as_simple()?;
        self.roots
            .iter()
            .find(|(from, _)| *from == id)
            .map(|(_, to)| TypeExpr::Simple(*to))
    }

    fn combine<'a>(&mut self, rebuilt: Cow<'a, TypeExpr>) -> Cow<'a, TypeExpr> {
        let wrapper = match rebuilt.as_ref() {
            TypeExpr::SzArray(_) => self.array,
            TypeExpr::Pointer(_) => self.pointer,
            TypeExpr::ByRef(_) => self.by_reference,
            _ => return rebuilt,
        };
        match rebuilt.into_owned() {
            TypeExpr::SzArray(element) | TypeExpr::Pointer(element) | TypeExpr::ByRef(element) => {
                Cow::Owned(TypeExpr::generic_instance(wrapper, vec![*element]))
            }
            other => Cow::Owned(other),
        }
    }
}
