//! The application arena every pass borrows mutably.
//!
//! [`AppContext`] owns every assembly, type, method, field and property of
//! the run in flat vectors addressed by the ids from [`crate::model`]. Nodes
//! are never deallocated: removing a field or method detaches it from its
//! declaring type, so ids captured earlier stay valid.
//!
//! Passes run strictly one after another and each receives `&mut AppContext`
//! for its whole duration. Loops that append to the collection they walk
//! iterate by index; where appended items must not be revisited the bound is
//! captured before the loop.

use std::collections::HashMap;

use crate::{
    compiler::{EventKind, EventLog},
    config::{IL2CPP_CORLIB, MONO_CORLIB},
    metadata::token::Token,
    model::{
        AssemblyDef, AssemblyId, FieldAttributes, FieldDef, FieldId, FieldRef, MethodAttributes,
        MethodDef, MethodId, MethodImplAttributes, MethodRef, ParamDef, PropertyAttributes,
        PropertyDef, PropertyId, SideTables, TypeAttributes, TypeDef, TypeId,
    },
    runtime::RuntimeSurface,
    typesystem::{GenericOwner, Instantiation, TypeExpr},
    Error, Result,
};

/// The whole-program arena.
#[derive(Debug, Default)]
pub struct AppContext {
    assemblies: Vec<AssemblyDef>,
    types: Vec<TypeDef>,
    methods: Vec<MethodDef>,
    fields: Vec<FieldDef>,
    properties: Vec<PropertyDef>,
    by_name: HashMap<String, AssemblyId>,
    /// Auxiliary per-node data.
    pub extras: SideTables,
    /// Append-only record of what the passes did.
    pub events: EventLog,
    /// Runtime-support members, once the reference injection pass ran.
    pub runtime: Option<RuntimeSurface>,
}

impl AppContext {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The runtime surface.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invariant`] before the reference injection pass ran.
    pub fn runtime(&self) -> Result<&RuntimeSurface> {
        self.runtime
            .as_ref()
            .ok_or_else(|| invariant_error!("runtime surface has not been injected"))
    }

    // Node access

    /// An assembly.
    #[must_use]
    pub fn assembly(&self, id: AssemblyId) -> &AssemblyDef {
        &self.assemblies[id.index()]
    }

    /// A type.
    #[must_use]
    pub fn ty(&self, id: TypeId) -> &TypeDef {
        &self.types[id.index()]
    }

    /// A type, mutably.
    pub fn ty_mut(&mut self, id: TypeId) -> &mut TypeDef {
        &mut self.types[id.index()]
    }

    /// A method.
    #[must_use]
    pub fn method(&self, id: MethodId) -> &MethodDef {
        &self.methods[id.index()]
    }

    /// A method, mutably.
    pub fn method_mut(&mut self, id: MethodId) -> &mut MethodDef {
        &mut self.methods[id.index()]
    }

    /// A field.
    #[must_use]
    pub fn field(&self, id: FieldId) -> &FieldDef {
        &self.fields[id.index()]
    }

    /// A field, mutably.
    pub fn field_mut(&mut self, id: FieldId) -> &mut FieldDef {
        &mut self.fields[id.index()]
    }

    /// A property.
    #[must_use]
    pub fn property(&self, id: PropertyId) -> &PropertyDef {
        &self.properties[id.index()]
    }

    /// A property, mutably.
    pub fn property_mut(&mut self, id: PropertyId) -> &mut PropertyDef {
        &mut self.properties[id.index()]
    }

    /// All assembly ids in creation order.
    pub fn assemblies(&self) -> impl Iterator<Item = AssemblyId> {
        (0..self.assemblies.len()).map(AssemblyId::from_index)
    }

    /// Number of assemblies; the bound for append-safe index loops.
    #[must_use]
    pub fn assembly_count(&self) -> usize {
        self.assemblies.len()
    }

    /// Number of types in the arena.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Number of methods in the arena.
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Looks an assembly up by simple name.
    #[must_use]
    pub fn assembly_by_name(&self, name: &str) -> Option<AssemblyId> {
        self.by_name.get(name).copied()
    }

    // Construction

    fn push_assembly(&mut self, name: &str, is_reference: bool, injected: bool) -> Result<AssemblyId> {
        if self.by_name.contains_key(name) {
            return Err(Error::DuplicateData {
                what: "assembly",
                node: name.to_string(),
            });
        }
        let id = AssemblyId::from_index(self.assemblies.len());
        self.assemblies
            .push(AssemblyDef::new(name, is_reference, injected));
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Adds an input assembly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateData`] if the name is taken.
    pub fn add_assembly(&mut self, name: &str, is_reference: bool) -> Result<AssemblyId> {
        self.push_assembly(name, is_reference, false)
    }

    /// Creates a synthetic assembly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateData`] if the name is taken.
    pub fn inject_assembly(&mut self, name: &str, is_reference: bool) -> Result<AssemblyId> {
        let id = self.push_assembly(name, is_reference, true)?;
        self.events
            .record(EventKind::TypeInjected)
            .message(format!("assembly {name}"));
        Ok(id)
    }

    fn push_type(
        &mut self,
        assembly: AssemblyId,
        namespace: &str,
        name: &str,
        declaring: Option<TypeId>,
        attributes: TypeAttributes,
        base: Option<TypeExpr>,
        injected: bool,
    ) -> TypeId {
        let id = TypeId::from_index(self.types.len());
        self.types.push(TypeDef {
            assembly,
            namespace: namespace.to_string(),
            name: name.to_string(),
            declaring,
            nested: Vec::new(),
            attributes,
            base,
            interfaces: Vec::new(),
            generic_params: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            injected,
        });
        if let Some(outer) = declaring {
            self.types[outer.index()].nested.push(id);
        }
        let full_name = self.full_name(id);
        let def = &mut self.assemblies[assembly.index()];
        def.types.push(id);
        def.by_full_name.entry(full_name).or_insert(id);
        id
    }

    /// Adds an input top-level type.
    pub fn add_type(
        &mut self,
        assembly: AssemblyId,
        namespace: &str,
        name: &str,
        attributes: TypeAttributes,
        base: Option<TypeExpr>,
    ) -> TypeId {
        self.push_type(assembly, namespace, name, None, attributes, base, false)
    }

    /// Creates a synthetic top-level type.
    pub fn inject_type(
        &mut self,
        assembly: AssemblyId,
        namespace: &str,
        name: &str,
        attributes: TypeAttributes,
        base: Option<TypeExpr>,
    ) -> TypeId {
        let id = self.push_type(assembly, namespace, name, None, attributes, base, true);
        self.events
            .record(EventKind::TypeInjected)
            .message(self.full_name(id));
        id
    }

    /// Adds an input nested type.
    pub fn add_nested_type(
        &mut self,
        declaring: TypeId,
        name: &str,
        attributes: TypeAttributes,
        base: Option<TypeExpr>,
    ) -> TypeId {
        let assembly = self.ty(declaring).assembly;
        self.push_type(assembly, "", name, Some(declaring), attributes, base, false)
    }

    /// Creates a synthetic nested type.
    pub fn inject_nested_type(
        &mut self,
        declaring: TypeId,
        name: &str,
        attributes: TypeAttributes,
        base: Option<TypeExpr>,
    ) -> TypeId {
        let assembly = self.ty(declaring).assembly;
        let id = self.push_type(assembly, "", name, Some(declaring), attributes, base, true);
        self.events
            .record(EventKind::TypeInjected)
            .message(self.full_name(id));
        id
    }

    fn push_method(
        &mut self,
        declaring: TypeId,
        name: &str,
        attributes: MethodAttributes,
        return_type: TypeExpr,
        params: Vec<ParamDef>,
        injected: bool,
    ) -> MethodId {
        let id = MethodId::from_index(self.methods.len());
        self.methods.push(MethodDef {
            declaring,
            name: name.to_string(),
            attributes,
            impl_attributes: MethodImplAttributes::empty(),
            return_type,
            params,
            generic_params: Vec::new(),
            token: Token::NULL,
            overrides: Vec::new(),
            injected,
        });
        self.types[declaring.index()].methods.push(id);
        id
    }

    /// Adds an input method.
    pub fn add_method(
        &mut self,
        declaring: TypeId,
        name: &str,
        attributes: MethodAttributes,
        return_type: TypeExpr,
        params: Vec<ParamDef>,
    ) -> MethodId {
        self.push_method(declaring, name, attributes, return_type, params, false)
    }

    /// Creates a synthetic method.
    pub fn inject_method(
        &mut self,
        declaring: TypeId,
        name: &str,
        attributes: MethodAttributes,
        return_type: TypeExpr,
        params: Vec<ParamDef>,
    ) -> MethodId {
        let id = self.push_method(declaring, name, attributes, return_type, params, true);
        self.events
            .record(EventKind::MethodInjected)
            .method(id)
            .message(format!("{}::{}", self.full_name(declaring), name));
        id
    }

    fn push_field(
        &mut self,
        declaring: TypeId,
        name: &str,
        ty: TypeExpr,
        attributes: FieldAttributes,
        injected: bool,
    ) -> FieldId {
        let id = FieldId::from_index(self.fields.len());
        self.fields.push(FieldDef {
            declaring,
            name: name.to_string(),
            ty,
            attributes,
            constant: None,
            injected,
        });
        self.types[declaring.index()].fields.push(id);
        id
    }

    /// Adds an input field.
    pub fn add_field(
        &mut self,
        declaring: TypeId,
        name: &str,
        ty: TypeExpr,
        attributes: FieldAttributes,
    ) -> FieldId {
        self.push_field(declaring, name, ty, attributes, false)
    }

    /// Creates a synthetic field.
    pub fn inject_field(
        &mut self,
        declaring: TypeId,
        name: &str,
        ty: TypeExpr,
        attributes: FieldAttributes,
    ) -> FieldId {
        let id = self.push_field(declaring, name, ty, attributes, true);
        self.events
            .record(EventKind::FieldInjected)
            .message(format!("{}::{}", self.full_name(declaring), name));
        id
    }

    fn push_property(
        &mut self,
        declaring: TypeId,
        name: &str,
        ty: TypeExpr,
        getter: Option<MethodId>,
        setter: Option<MethodId>,
        injected: bool,
    ) -> PropertyId {
        let id = PropertyId::from_index(self.properties.len());
        self.properties.push(PropertyDef {
            declaring,
            name: name.to_string(),
            ty,
            attributes: PropertyAttributes::empty(),
            getter,
            setter,
            injected,
        });
        self.types[declaring.index()].properties.push(id);
        id
    }

    /// Adds an input property.
    pub fn add_property(
        &mut self,
        declaring: TypeId,
        name: &str,
        ty: TypeExpr,
        getter: Option<MethodId>,
        setter: Option<MethodId>,
    ) -> PropertyId {
        self.push_property(declaring, name, ty, getter, setter, false)
    }

    /// Creates a synthetic property.
    pub fn inject_property(
        &mut self,
        declaring: TypeId,
        name: &str,
        ty: TypeExpr,
        getter: Option<MethodId>,
        setter: Option<MethodId>,
    ) -> PropertyId {
        let id = self.push_property(declaring, name, ty, getter, setter, true);
        self.events
            .record(EventKind::PropertyInjected)
            .message(format!("{}::{}", self.full_name(declaring), name));
        id
    }

    /// Detaches a field from its declaring type.
    pub fn remove_field(&mut self, field: FieldId) {
        let declaring = self.field(field).declaring;
        self.types[declaring.index()].fields.retain(|f| *f != field);
        self.events
            .record(EventKind::FieldRemoved)
            .message(format!("{}::{}", self.full_name(declaring), self.field(field).name));
    }

    /// Detaches a method from its declaring type.
    pub fn remove_method(&mut self, method: MethodId) {
        let declaring = self.method(method).declaring;
        self.types[declaring.index()].methods.retain(|m| *m != method);
    }

    // Queries

    /// `Namespace.Name`, with nested types spelled `Outer/Inner`.
    #[must_use]
    pub fn full_name(&self, ty: TypeId) -> String {
        let def = self.ty(ty);
        match def.declaring {
            Some(outer) => format!("{}/{}", self.full_name(outer), def.name),
            None if def.namespace.is_empty() => def.name.clone(),
            None => format!("{}.{}", def.namespace, def.name),
        }
    }

    /// Looks a type up by full name within one assembly.
    #[must_use]
    pub fn type_by_full_name(&self, assembly: AssemblyId, full_name: &str) -> Option<TypeId> {
        self.assembly(assembly).by_full_name.get(full_name).copied()
    }

    /// Looks a type up by assembly name and full name.
    #[must_use]
    pub fn find_type(&self, assembly: &str, full_name: &str) -> Option<TypeId> {
        self.assembly_by_name(assembly)
            .and_then(|a| self.type_by_full_name(a, full_name))
    }

    /// `Il2CppSystem.{name}` from the native corlib.
    #[must_use]
    pub fn il2cpp_corlib_type(&self, name: &str) -> Option<TypeId> {
        self.find_type(IL2CPP_CORLIB, &format!("Il2CppSystem.{name}"))
    }

    /// `System.{name}` from the reference corlib.
    #[must_use]
    pub fn mono_corlib_type(&self, name: &str) -> Option<TypeId> {
        self.find_type(MONO_CORLIB, &format!("System.{name}"))
    }

    /// `System.{name}` from the reference corlib, which prior passes guarantee.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invariant`] when the type is missing.
    pub fn require_mono_type(&self, name: &str) -> Result<TypeId> {
        self.mono_corlib_type(name)
            .ok_or_else(|| invariant_error!("System.{} is missing from {}", name, MONO_CORLIB))
    }

    /// The most recently added method named `name` on `ty`.
    #[must_use]
    pub fn method_by_name(&self, ty: TypeId, name: &str) -> Option<MethodId> {
        self.ty(ty)
            .methods
            .iter()
            .rev()
            .copied()
            .find(|m| self.method(*m).name == name)
    }

    /// The most recently added field named `name` on `ty`.
    #[must_use]
    pub fn field_by_name(&self, ty: TypeId, name: &str) -> Option<FieldId> {
        self.ty(ty)
            .fields
            .iter()
            .rev()
            .copied()
            .find(|f| self.field(*f).name == name)
    }

    /// Returns `true` while a field is still attached to its declaring type.
    #[must_use]
    pub fn is_field_attached(&self, field: FieldId) -> bool {
        self.ty(self.field(field).declaring).fields.contains(&field)
    }

    /// `T` for a plain type, `T<!0, ..>` over its own parameters for a generic one.
    #[must_use]
    pub fn self_instance(&self, ty: TypeId) -> TypeExpr {
        let count = self.ty(ty).generic_params.len();
        if count == 0 {
            TypeExpr::Simple(ty)
        } else {
            TypeExpr::generic_instance(ty, (0..count).map(|i| TypeExpr::type_param(ty, i)).collect())
        }
    }

    /// The type's own generic parameters as type expressions.
    #[must_use]
    pub fn type_params(&self, ty: TypeId) -> Vec<TypeExpr> {
        (0..self.ty(ty).generic_params.len())
            .map(|i| TypeExpr::type_param(ty, i))
            .collect()
    }

    /// The method's own generic parameters as type expressions.
    #[must_use]
    pub fn method_params(&self, method: MethodId) -> Vec<TypeExpr> {
        (0..self.method(method).generic_params.len())
            .map(|i| TypeExpr::method_param(method, i))
            .collect()
    }

    fn base_full_name(&self, ty: TypeId) -> Option<String> {
        self.ty(ty)
            .base
            .as_ref()
            .and_then(TypeExpr::definition)
            .map(|b| self.full_name(b))
    }

    /// Returns `true` for enums of either corlib.
    #[must_use]
    pub fn is_enum(&self, ty: TypeId) -> bool {
        matches!(
            self.base_full_name(ty).as_deref(),
            Some("System.Enum" | "Il2CppSystem.Enum")
        )
    }

    /// Returns `true` for value types of either corlib.
    #[must_use]
    pub fn is_value_type(&self, ty: TypeId) -> bool {
        match self.base_full_name(ty).as_deref() {
            Some("System.Enum" | "Il2CppSystem.Enum") => true,
            Some("System.ValueType" | "Il2CppSystem.ValueType") => {
                !matches!(self.full_name(ty).as_str(), "System.Enum" | "Il2CppSystem.Enum")
            }
            _ => false,
        }
    }

    /// Returns `true` if `ty` names a value type.
    #[must_use]
    pub fn is_value_type_expr(&self, ty: &TypeExpr) -> bool {
        ty.definition().is_some_and(|d| self.is_value_type(d))
    }

    /// Returns `true` for `System.Void` and `Il2CppSystem.Void`.
    #[must_use]
    pub fn is_void(&self, ty: &TypeExpr) -> bool {
        ty.as_simple().is_some_and(|id| {
            matches!(self.full_name(id).as_str(), "System.Void" | "Il2CppSystem.Void")
        })
    }

    /// Returns `true` for static classes.
    #[must_use]
    pub fn is_static(&self, ty: TypeId) -> bool {
        self.ty(ty).attributes.is_static_class()
    }

    fn conversion(&self, name: &str, declaring: TypeId, from: &TypeExpr, to: &TypeExpr) -> Option<MethodId> {
        self.ty(declaring).methods.iter().copied().find(|m| {
            let def = self.method(*m);
            def.name == name
                && def.is_static()
                && def.return_type == *to
                && def.params.len() == 1
                && def.params[0].ty == *from
        })
    }

    /// `op_Implicit(source) -> ty` declared on `ty`.
    #[must_use]
    pub fn implicit_conversion_from(&self, ty: TypeId, source: &TypeExpr) -> Option<MethodId> {
        self.conversion("op_Implicit", ty, source, &TypeExpr::Simple(ty))
    }

    /// `op_Implicit(ty) -> target` declared on `ty`.
    #[must_use]
    pub fn implicit_conversion_to(&self, ty: TypeId, target: &TypeExpr) -> Option<MethodId> {
        self.conversion("op_Implicit", ty, &TypeExpr::Simple(ty), target)
    }

    /// `op_Explicit(source) -> ty` declared on `ty`.
    #[must_use]
    pub fn explicit_conversion_from(&self, ty: TypeId, source: &TypeExpr) -> Option<MethodId> {
        self.conversion("op_Explicit", ty, source, &TypeExpr::Simple(ty))
    }

    /// `op_Explicit(ty) -> target` declared on `ty`.
    #[must_use]
    pub fn explicit_conversion_to(&self, ty: TypeId, target: &TypeExpr) -> Option<MethodId> {
        self.conversion("op_Explicit", ty, &TypeExpr::Simple(ty), target)
    }

    /// Returns `true` if the method was recovered from companion input.
    #[must_use]
    pub fn is_unstripped_method(&self, method: MethodId) -> bool {
        self.extras.unstripped_methods.is_marked(method)
    }

    /// Returns `true` if the type, or any type enclosing it, was synthesized.
    #[must_use]
    pub fn is_injected_type(&self, ty: TypeId) -> bool {
        let def = self.ty(ty);
        def.injected
            || self.assembly(def.assembly).injected
            || def.declaring.is_some_and(|outer| self.is_injected_type(outer))
    }

    /// Returns `true` if the method or its declaring type was synthesized.
    #[must_use]
    pub fn is_injected_method(&self, method: MethodId) -> bool {
        let def = self.method(method);
        def.injected || self.is_injected_type(def.declaring)
    }

    /// Returns `true` if the field or its declaring type was synthesized.
    #[must_use]
    pub fn is_injected_field(&self, field: FieldId) -> bool {
        let def = self.field(field);
        def.injected || self.is_injected_type(def.declaring)
    }

    /// Types of an assembly as a snapshot, so callers may inject while walking it.
    #[must_use]
    pub fn types_of(&self, assembly: AssemblyId) -> Vec<TypeId> {
        self.assembly(assembly).types.clone()
    }

    /// Return and parameter types of a method reference, with its
    /// instantiation arguments substituted.
    #[must_use]
    pub fn instantiated_signature(&self, method: &MethodRef) -> (TypeExpr, Vec<TypeExpr>) {
        let def = self.method(method.method);
        let mut inst = Instantiation::identity()
            .with_type(def.declaring, &method.type_args)
            .with_method(method.method, &method.method_args);
        let params = def.params.iter().map(|p| inst.apply(&p.ty)).collect();
        (inst.apply(&def.return_type), params)
    }

    /// Type of a field reference, with its instantiation arguments substituted.
    #[must_use]
    pub fn instantiated_field_type(&self, field: &FieldRef) -> TypeExpr {
        let def = self.field(field.field);
        Instantiation::identity()
            .with_type(def.declaring, &field.type_args)
            .apply(&def.ty)
    }

    /// Field holding a method's native handle, instantiated over the
    /// declaring type's and the method's own generic parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invariant`] if the initialization pass did not record one.
    pub fn instantiated_method_info_field(&self, method: MethodId) -> Result<FieldRef> {
        let storage = *self.extras.method_info_field.require(method)?;
        let mut args = self.type_params(self.method(method).declaring);
        args.extend(self.method_params(method));
        Ok(FieldRef::on_instance(storage, args))
    }

    /// Name of a type as the native metadata spells it, used for tokenless
    /// method lookups.
    ///
    /// Native corlib types drop their `Il2Cpp` namespace prefix, nested
    /// types use `+`, and generic parameters print their declared names.
    #[must_use]
    pub fn type_expr_name(&self, ty: &TypeExpr) -> String {
        match ty {
            TypeExpr::Simple(id) => self.native_type_name(*id),
            TypeExpr::GenericInstance { generic, args } => {
                let args: Vec<String> = args.iter().map(|a| self.type_expr_name(a)).collect();
                format!("{}<{}>", self.native_type_name(*generic), args.join(","))
            }
            TypeExpr::SzArray(element) => format!("{}[]", self.type_expr_name(element)),
            TypeExpr::Array { element, rank } => {
                let commas = ",".repeat(rank.saturating_sub(1) as usize);
                format!("{}[{commas}]", self.type_expr_name(element))
            }
            TypeExpr::Pointer(element) => format!("{}*", self.type_expr_name(element)),
            TypeExpr::ByRef(element) => format!("{}&", self.type_expr_name(element)),
            TypeExpr::Pinned(element) | TypeExpr::Boxed(element) => self.type_expr_name(element),
            TypeExpr::CustomModifier { element, .. } => self.type_expr_name(element),
            TypeExpr::GenericParameter { owner, index } => {
                let params = match owner {
                    GenericOwner::Type(t) => &self.ty(*t).generic_params,
                    GenericOwner::Method(m) => &self.method(*m).generic_params,
                };
                params
                    .get(*index as usize)
                    .map_or_else(|| format!("T{index}"), |p| p.name.clone())
            }
            TypeExpr::Sentinel => "...".to_string(),
        }
    }

    fn native_type_name(&self, ty: TypeId) -> String {
        let def = self.ty(ty);
        if let Some(outer) = def.declaring {
            return format!("{}+{}", self.native_type_name(outer), def.name);
        }
        let namespace = if self.assembly(def.assembly).name == IL2CPP_CORLIB {
            def.namespace
                .strip_prefix("Il2Cpp")
                .unwrap_or(&def.namespace)
        } else {
            &def.namespace
        };
        if namespace.is_empty() {
            def.name.clone()
        } else {
            format!("{namespace}.{}", def.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corlib() -> (AppContext, AssemblyId, TypeId) {
        let mut ctx = AppContext::new();
        let asm = ctx.add_assembly(IL2CPP_CORLIB, false).unwrap();
        let object = ctx.add_type(asm, "Il2CppSystem", "Object", TypeAttributes::PUBLIC, None);
        (ctx, asm, object)
    }

    #[test]
    fn nested_full_names_are_indexed() {
        let (mut ctx, asm, object) = corlib();
        let outer = ctx.add_type(asm, "Il2CppSystem", "Outer", TypeAttributes::PUBLIC, Some(object.into()));
        let inner = ctx.add_nested_type(outer, "Inner", TypeAttributes::NESTED_PUBLIC, Some(object.into()));
        assert_eq!(ctx.full_name(inner), "Il2CppSystem.Outer/Inner");
        assert_eq!(ctx.type_by_full_name(asm, "Il2CppSystem.Outer/Inner"), Some(inner));
        assert_eq!(ctx.ty(outer).nested, vec![inner]);
        assert_eq!(ctx.find_type(IL2CPP_CORLIB, "Il2CppSystem.Object"), Some(object));
    }

    #[test]
    fn native_names_drop_the_corlib_prefix() {
        let (mut ctx, asm, object) = corlib();
        let list = ctx.add_type(asm, "Il2CppSystem.Collections.Generic", "List`1", TypeAttributes::PUBLIC, Some(object.into()));
        ctx.ty_mut(list).generic_params.push(crate::model::GenericParamDef::new("T"));
        let inner = ctx.add_nested_type(list, "Enumerator", TypeAttributes::NESTED_PUBLIC, None);
        let ty = TypeExpr::generic_instance(list, vec![TypeExpr::Simple(object).sz_array()]);
        assert_eq!(ctx.type_expr_name(&ty), "System.Collections.Generic.List`1<System.Object[]>");
        assert_eq!(ctx.type_expr_name(&TypeExpr::type_param(list, 0).by_ref()), "T&");
        assert_eq!(ctx.type_expr_name(&inner.into()), "System.Collections.Generic.List`1+Enumerator");
    }

    #[test]
    fn duplicate_assembly_names_are_rejected() {
        let (mut ctx, _, _) = corlib();
        assert!(matches!(
            ctx.inject_assembly(IL2CPP_CORLIB, false),
            Err(Error::DuplicateData { what: "assembly", .. })
        ));
    }

    #[test]
    fn value_type_classification() {
        let (mut ctx, asm, object) = corlib();
        let value_type = ctx.add_type(asm, "Il2CppSystem", "ValueType", TypeAttributes::PUBLIC, Some(object.into()));
        let enum_ty = ctx.add_type(asm, "Il2CppSystem", "Enum", TypeAttributes::PUBLIC, Some(value_type.into()));
        let int32 = ctx.add_type(asm, "Il2CppSystem", "Int32", TypeAttributes::PUBLIC, Some(value_type.into()));
        let color = ctx.add_type(asm, "Il2CppSystem", "Color", TypeAttributes::PUBLIC, Some(enum_ty.into()));
        assert!(ctx.is_value_type(int32));
        assert!(ctx.is_value_type(color));
        assert!(ctx.is_enum(color));
        assert!(!ctx.is_value_type(enum_ty));
        assert!(!ctx.is_value_type(object));
    }

    #[test]
    fn removal_detaches_but_keeps_ids() {
        let (mut ctx, _, object) = corlib();
        let field = ctx.add_field(object, "m_value", TypeExpr::Simple(object), FieldAttributes::PRIVATE);
        assert_eq!(ctx.field_by_name(object, "m_value"), Some(field));
        ctx.remove_field(field);
        assert_eq!(ctx.field_by_name(object, "m_value"), None);
        assert!(!ctx.is_field_attached(field));
        assert_eq!(ctx.field(field).name, "m_value");
        assert_eq!(ctx.events.count_kind(EventKind::FieldRemoved), 1);
    }

    #[test]
    fn conversion_lookup_matches_signature() {
        let (mut ctx, asm, object) = corlib();
        let int32 = ctx.add_type(asm, "Il2CppSystem", "Int32", TypeAttributes::PUBLIC, Some(object.into()));
        let mono = ctx.add_assembly(MONO_CORLIB, true).unwrap();
        let mono_int = ctx.add_type(mono, "System", "Int32", TypeAttributes::PUBLIC, None);
        let attrs = MethodAttributes::PUBLIC | MethodAttributes::STATIC;
        let to = ctx.add_method(int32, "op_Implicit", attrs, mono_int.into(), vec![ParamDef::new("value", int32.into())]);
        let from = ctx.add_method(int32, "op_Implicit", attrs, int32.into(), vec![ParamDef::new("value", mono_int.into())]);
        assert_eq!(ctx.implicit_conversion_to(int32, &mono_int.into()), Some(to));
        assert_eq!(ctx.implicit_conversion_from(int32, &mono_int.into()), Some(from));
        assert_eq!(ctx.explicit_conversion_to(int32, &mono_int.into()), None);
    }

    #[test]
    fn self_instance_of_generic() {
        let (mut ctx, asm, object) = corlib();
        let list = ctx.add_type(asm, "Il2CppSystem", "List`1", TypeAttributes::PUBLIC, Some(object.into()));
        ctx.ty_mut(list).generic_params.push(crate::model::GenericParamDef::new("T"));
        assert_eq!(
            ctx.self_instance(list),
            TypeExpr::generic_instance(list, vec![TypeExpr::type_param(list, 0)])
        );
        assert_eq!(ctx.self_instance(object), TypeExpr::Simple(object));
    }
}
