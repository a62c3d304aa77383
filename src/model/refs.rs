//! Member references as they appear in instruction operands.

use std::fmt;

use crate::{
    model::{FieldId, MethodId},
    typesystem::TypeExpr,
};

/// A method, optionally instantiated over declaring-type and method arguments.
///
/// A plain definition has both argument lists empty. A method reached through
/// `List<int>` carries `[int]` as `type_args`; a generic method instantiation
/// carries its arguments in `method_args`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// The definition.
    pub method: MethodId,
    /// Arguments for the declaring type's generic parameters.
    pub type_args: Vec<TypeExpr>,
    /// Arguments for the method's own generic parameters.
    pub method_args: Vec<TypeExpr>,
}

impl MethodRef {
    /// Instantiates `method` over both argument lists.
    #[must_use]
    pub fn concrete(method: MethodId, type_args: Vec<TypeExpr>, method_args: Vec<TypeExpr>) -> Self {
        Self {
            method,
            type_args,
            method_args,
        }
    }

    /// Instantiates `method` on a generic declaring type.
    #[must_use]
    pub fn on_instance(method: MethodId, type_args: Vec<TypeExpr>) -> Self {
        Self::concrete(method, type_args, Vec::new())
    }

    /// Instantiates a generic method whose declaring type is not generic.
    #[must_use]
    pub fn generic(method: MethodId, method_args: Vec<TypeExpr>) -> Self {
        Self::concrete(method, Vec::new(), method_args)
    }

    /// Returns `true` if any argument list is non-empty.
    #[must_use]
    pub fn is_instantiated(&self) -> bool {
        !self.type_args.is_empty() || !self.method_args.is_empty()
    }
}

impl From<MethodId> for MethodRef {
    fn from(method: MethodId) -> Self {
        Self::concrete(method, Vec::new(), Vec::new())
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.method)?;
        write_args(f, "<", &self.type_args, ">")?;
        write_args(f, "<<", &self.method_args, ">>")
    }
}

/// A field, optionally reached through an instantiated declaring type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// The definition.
    pub field: FieldId,
    /// Arguments for the declaring type's generic parameters.
    pub type_args: Vec<TypeExpr>,
}

impl FieldRef {
    /// A field on an instantiated declaring type.
    #[must_use]
    pub fn on_instance(field: FieldId, type_args: Vec<TypeExpr>) -> Self {
        Self { field, type_args }
    }
}

impl From<FieldId> for FieldRef {
    fn from(field: FieldId) -> Self {
        Self {
            field,
            type_args: Vec::new(),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.field)?;
        write_args(f, "<", &self.type_args, ">")
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, open: &str, args: &[TypeExpr], close: &str) -> fmt::Result {
    if args.is_empty() {
        return Ok(());
    }
    f.write_str(open)?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{arg}")?;
    }
    f.write_str(close)
}

/// The runtime-provided accessors of a multi-dimensional array type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::IntoStaticStr)]
pub enum ArrayMethodKind {
    /// `T Get(int, ...)`
    Get,
    /// `void Set(int, ..., T)`
    Set,
    /// `T& Address(int, ...)`
    Address,
    /// `void .ctor(int, ...)`
    #[strum(serialize = ".ctor")]
    Constructor,
}

impl ArrayMethodKind {
    /// Maps a member name to its kind.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Get" => Some(Self::Get),
            "Set" => Some(Self::Set),
            "Address" => Some(Self::Address),
            ".ctor" => Some(Self::Constructor),
            _ => None,
        }
    }

    /// The member name.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// A pseudo-method on a multi-dimensional array type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArrayMethod {
    /// Which accessor.
    pub kind: ArrayMethodKind,
    /// The `Array` type expression the accessor belongs to.
    pub array_type: TypeExpr,
}

impl ArrayMethod {
    /// Rank of the array, or 0 if `array_type` is not a multi-dimensional array.
    #[must_use]
    pub fn rank(&self) -> u32 {
        match &self.array_type {
            TypeExpr::Array { rank, .. } => *rank,
            _ => 0,
        }
    }

    /// Element type of the array.
    #[must_use]
    pub fn element(&self) -> Option<&TypeExpr> {
        match &self.array_type {
            TypeExpr::Array { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Return type, given the `System.Void` definition.
    #[must_use]
    pub fn return_type(&self, void: &TypeExpr) -> TypeExpr {
        match (self.kind, self.element()) {
            (ArrayMethodKind::Get, Some(e)) => e.clone(),
            (ArrayMethodKind::Address, Some(e)) => e.clone().by_ref(),
            _ => void.clone(),
        }
    }

    /// Parameter types, given the `System.Int32` definition.
    #[must_use]
    pub fn parameter_types(&self, int32: &TypeExpr) -> Vec<TypeExpr> {
        let mut params = vec![int32.clone(); self.rank() as usize];
        if self.kind == ArrayMethodKind::Set {
            if let Some(e) = self.element() {
                params.push(e.clone());
            }
        }
        params
    }
}

impl fmt::Display for ArrayMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.array_type, self.kind.name())
    }
}
