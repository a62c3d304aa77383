//! The type-expression algebra of the analysis universe.

use std::fmt;

use crate::model::{MethodId, TypeId};

/// Declaration that owns a generic parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericOwner {
    /// A type-level parameter (`!n`).
    Type(TypeId),
    /// A method-level parameter (`!!n`).
    Method(MethodId),
}

/// A structural type expression.
///
/// Nominal leaves ([`TypeExpr::Simple`]) and generic parameters compare by
/// identity of their declaration; every composite kind compares structurally,
/// so two independently built `List<int>` instances are equal. The derived
/// `Eq` includes the `required` bit of custom modifiers; signature matching
/// uses [`TypeExpr::signature_eq`], which ignores it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    /// A nominal type definition.
    Simple(TypeId),
    /// A multi-dimensional array.
    Array {
        /// Element type.
        element: Box<TypeExpr>,
        /// Number of dimensions.
        rank: u32,
    },
    /// A single-dimensional, zero-based array.
    SzArray(Box<TypeExpr>),
    /// An unmanaged pointer.
    Pointer(Box<TypeExpr>),
    /// A managed reference.
    ByRef(Box<TypeExpr>),
    /// A pinned local type.
    Pinned(Box<TypeExpr>),
    /// A boxed value type.
    Boxed(Box<TypeExpr>),
    /// A `modreq`/`modopt` wrapped type.
    CustomModifier {
        /// The modified type.
        element: Box<TypeExpr>,
        /// The modifier type.
        modifier: Box<TypeExpr>,
        /// `modreq` when true, `modopt` otherwise.
        required: bool,
    },
    /// A closed or partially open generic instantiation.
    GenericInstance {
        /// The generic type definition.
        generic: TypeId,
        /// Type arguments in declaration order.
        args: Vec<TypeExpr>,
    },
    /// A reference to a generic parameter by position.
    GenericParameter {
        /// Declaration owning the parameter.
        owner: GenericOwner,
        /// Zero-based position in the owner's parameter list.
        index: u32,
    },
    /// The vararg sentinel.
    Sentinel,
}

impl TypeExpr {
    /// Creates a generic instantiation.
    #[must_use]
    pub fn generic_instance(generic: TypeId, args: Vec<TypeExpr>) -> Self {
        TypeExpr::GenericInstance { generic, args }
    }

    /// Creates a type-level generic parameter reference.
    #[must_use]
    pub fn type_param(owner: TypeId, index: usize) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        TypeExpr::GenericParameter {
            owner: GenericOwner::Type(owner),
            index: index as u32,
        }
    }

    /// Creates a method-level generic parameter reference.
    #[must_use]
    pub fn method_param(owner: MethodId, index: usize) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        TypeExpr::GenericParameter {
            owner: GenericOwner::Method(owner),
            index: index as u32,
        }
    }

    /// Wraps `self` in a single-dimensional array.
    #[must_use]
    pub fn sz_array(self) -> Self {
        TypeExpr::SzArray(Box::new(self))
    }

    /// Wraps `self` in a multi-dimensional array of `rank` dimensions.
    #[must_use]
    pub fn array(self, rank: u32) -> Self {
        TypeExpr::Array {
            element: Box::new(self),
            rank,
        }
    }

    /// Wraps `self` in an unmanaged pointer.
    #[must_use]
    pub fn pointer(self) -> Self {
        TypeExpr::Pointer(Box::new(self))
    }

    /// Wraps `self` in a managed reference.
    #[must_use]
    pub fn by_ref(self) -> Self {
        TypeExpr::ByRef(Box::new(self))
    }

    /// Wraps `self` in a pinned marker.
    #[must_use]
    pub fn pinned(self) -> Self {
        TypeExpr::Pinned(Box::new(self))
    }

    /// Wraps `self` in a boxed marker.
    #[must_use]
    pub fn boxed(self) -> Self {
        TypeExpr::Boxed(Box::new(self))
    }

    /// Wraps `self` in a custom modifier.
    #[must_use]
    pub fn modified(self, modifier: TypeExpr, required: bool) -> Self {
        TypeExpr::CustomModifier {
            element: Box::new(self),
            modifier: Box::new(modifier),
            required,
        }
    }

    /// The nominal definition of a simple type.
    #[must_use]
    pub fn as_simple(&self) -> Option<TypeId> {
        match self {
            TypeExpr::Simple(id) => Some(*id),
            _ => None,
        }
    }

    /// The definition a type expression is "about": the type itself for a
    /// simple type, the generic definition for an instantiation.
    #[must_use]
    pub fn definition(&self) -> Option<TypeId> {
        match self {
            TypeExpr::Simple(id) | TypeExpr::GenericInstance { generic: id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Element type of single-child wrappers.
    #[must_use]
    pub fn element(&self) -> Option<&TypeExpr> {
        match self {
            TypeExpr::Array { element, .. }
            | TypeExpr::SzArray(element)
            | TypeExpr::Pointer(element)
            | TypeExpr::ByRef(element)
            | TypeExpr::Pinned(element)
            | TypeExpr::Boxed(element)
            | TypeExpr::CustomModifier { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Returns `true` for managed references.
    #[must_use]
    pub fn is_by_ref(&self) -> bool {
        matches!(self, TypeExpr::ByRef(_))
    }

    /// Returns `true` for unmanaged pointers.
    #[must_use]
    pub fn is_pointer(&self) -> bool {
        matches!(self, TypeExpr::Pointer(_))
    }

    /// Strips custom modifiers.
    #[must_use]
    pub fn layout_root(&self) -> &TypeExpr {
        match self {
            TypeExpr::CustomModifier { element, .. } => element.layout_root(),
            other => other,
        }
    }
}

impl From<TypeId> for TypeExpr {
    fn from(id: TypeId) -> Self {
        TypeExpr::Simple(id)
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Simple(id) => write!(f, "{id}"),
            TypeExpr::Array { element, rank } => {
                write!(f, "{element}[")?;
                for _ in 1..*rank {
                    f.write_str(",")?;
                }
                f.write_str("]")
            }
            TypeExpr::SzArray(element) => write!(f, "{element}[]"),
            TypeExpr::Pointer(element) => write!(f, "{element}*"),
            TypeExpr::ByRef(element) => write!(f, "{element}&"),
            TypeExpr::Pinned(element) => write!(f, "{element} pinned"),
            TypeExpr::Boxed(element) => write!(f, "boxed {element}"),
            TypeExpr::CustomModifier {
                element,
                modifier,
                required,
            } => {
                let keyword = if *required { "modreq" } else { "modopt" };
                write!(f, "{element} {keyword}({modifier})")
            }
            TypeExpr::GenericInstance { generic, args } => {
                write!(f, "{generic}<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(">")
            }
            TypeExpr::GenericParameter {
                owner: GenericOwner::Type(_),
                index,
            } => write!(f, "!{index}"),
            TypeExpr::GenericParameter {
                owner: GenericOwner::Method(_),
                index,
            } => write!(f, "!!{index}"),
            TypeExpr::Sentinel => f.write_str("..."),
        }
    }
}
