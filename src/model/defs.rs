//! Definition records stored in the [`AppContext`](crate::model::AppContext) arena.

use std::collections::HashMap;

use crate::{
    assembly::Constant,
    metadata::token::Token,
    model::{
        AssemblyId, FieldAttributes, FieldId, GenericParameterAttributes, MethodAttributes,
        MethodId, MethodImplAttributes, MethodRef, PropertyAttributes, PropertyId, TypeAttributes,
        TypeId,
    },
    typesystem::TypeExpr,
};

/// An assembly.
#[derive(Debug, Clone)]
pub struct AssemblyDef {
    /// Simple name, e.g. `Assembly-CSharp`.
    pub name: String,
    /// Every type of the assembly, nested types included, in creation order.
    pub types: Vec<TypeId>,
    /// Reference assemblies are consumed by generated code but never rewritten.
    pub is_reference: bool,
    /// Created by a pass rather than supplied as input.
    pub injected: bool,
    pub(crate) by_full_name: HashMap<String, TypeId>,
}

impl AssemblyDef {
    pub(crate) fn new(name: impl Into<String>, is_reference: bool, injected: bool) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
            is_reference,
            injected,
            by_full_name: HashMap::new(),
        }
    }
}

/// A generic parameter declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericParamDef {
    /// Declared name.
    pub name: String,
    /// Variance and special constraints.
    pub attributes: GenericParameterAttributes,
    /// Type constraints.
    pub constraints: Vec<TypeExpr>,
    /// Carries the `unmanaged` constraint marker.
    pub is_unmanaged: bool,
}

impl GenericParamDef {
    /// An unconstrained parameter.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: GenericParameterAttributes::empty(),
            constraints: Vec::new(),
            is_unmanaged: false,
        }
    }

    /// Copies the declaration without its type constraints.
    ///
    /// Constraints may mention sibling parameters of the source owner, so
    /// they have to be rewritten for the new owner separately.
    #[must_use]
    pub fn copy_unconstrained(&self) -> Self {
        Self {
            name: self.name.clone(),
            attributes: self.attributes,
            constraints: Vec::new(),
            is_unmanaged: self.is_unmanaged,
        }
    }
}

/// A type definition.
#[derive(Debug, Clone)]
pub struct TypeDef {
    /// Owning assembly.
    pub assembly: AssemblyId,
    /// Namespace; empty for nested types.
    pub namespace: String,
    /// Simple name, including any arity suffix such as `` `1 ``.
    pub name: String,
    /// Enclosing type for nested types.
    pub declaring: Option<TypeId>,
    /// Directly nested types.
    pub nested: Vec<TypeId>,
    /// Flags.
    pub attributes: TypeAttributes,
    /// Base type.
    pub base: Option<TypeExpr>,
    /// Implemented interfaces.
    pub interfaces: Vec<TypeExpr>,
    /// Generic parameters.
    pub generic_params: Vec<GenericParamDef>,
    /// Fields in declaration order.
    pub fields: Vec<FieldId>,
    /// Methods in declaration order.
    pub methods: Vec<MethodId>,
    /// Properties in declaration order.
    pub properties: Vec<PropertyId>,
    /// Created by a pass rather than supplied as input.
    pub injected: bool,
}

impl TypeDef {
    /// Returns `true` if the type declares generic parameters.
    #[must_use]
    pub fn has_generic_params(&self) -> bool {
        !self.generic_params.is_empty()
    }

    /// Returns `true` for interfaces.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.attributes.is_interface()
    }

    /// Returns `true` for the `<Module>` pseudo-type.
    #[must_use]
    pub fn is_module_type(&self) -> bool {
        self.declaring.is_none() && self.namespace.is_empty() && self.name == "<Module>"
    }
}

/// A method parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDef {
    /// Declared name.
    pub name: String,
    /// Declared type.
    pub ty: TypeExpr,
}

impl ParamDef {
    /// Creates a parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A method definition.
#[derive(Debug, Clone)]
pub struct MethodDef {
    /// Declaring type.
    pub declaring: TypeId,
    /// Name.
    pub name: String,
    /// Flags.
    pub attributes: MethodAttributes,
    /// Implementation flags.
    pub impl_attributes: MethodImplAttributes,
    /// Return type.
    pub return_type: TypeExpr,
    /// Declared parameters, excluding `this`.
    pub params: Vec<ParamDef>,
    /// Generic parameters.
    pub generic_params: Vec<GenericParamDef>,
    /// Metadata token in the native image, [`Token::NULL`] for tokenless methods.
    pub token: Token,
    /// Interface or base methods this method explicitly implements.
    pub overrides: Vec<MethodRef>,
    /// Created by a pass rather than supplied as input.
    pub injected: bool,
}

impl MethodDef {
    /// Returns `true` for static methods.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.attributes.is_static()
    }

    /// Returns `true` for instance methods.
    #[must_use]
    pub fn has_this(&self) -> bool {
        !self.is_static()
    }

    /// Returns `true` for `.ctor`.
    #[must_use]
    pub fn is_instance_constructor(&self) -> bool {
        self.name == ".ctor"
    }

    /// Returns `true` for `.cctor`.
    #[must_use]
    pub fn is_static_constructor(&self) -> bool {
        self.name == ".cctor"
    }

    /// Returns `true` if the method declares generic parameters.
    #[must_use]
    pub fn has_generic_params(&self) -> bool {
        !self.generic_params.is_empty()
    }

    /// Returns `true` for runtime internal calls.
    #[must_use]
    pub fn is_internal_call(&self) -> bool {
        self.impl_attributes
            .contains(MethodImplAttributes::INTERNAL_CALL)
    }

    /// Parameter types in order.
    #[must_use]
    pub fn param_types(&self) -> Vec<TypeExpr> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }
}

/// A field definition.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Declaring type.
    pub declaring: TypeId,
    /// Name.
    pub name: String,
    /// Field type.
    pub ty: TypeExpr,
    /// Flags.
    pub attributes: FieldAttributes,
    /// Default value of literal fields.
    pub constant: Option<Constant>,
    /// Created by a pass rather than supplied as input.
    pub injected: bool,
}

impl FieldDef {
    /// Returns `true` for static fields.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.attributes.is_static()
    }
}

/// A property definition.
#[derive(Debug, Clone)]
pub struct PropertyDef {
    /// Declaring type.
    pub declaring: TypeId,
    /// Name.
    pub name: String,
    /// Property type.
    pub ty: TypeExpr,
    /// Flags.
    pub attributes: PropertyAttributes,
    /// Getter.
    pub getter: Option<MethodId>,
    /// Setter.
    pub setter: Option<MethodId>,
    /// Created by a pass rather than supplied as input.
    pub injected: bool,
}
