//! Signature-level types and member references.

use std::fmt;

use strum::{EnumIter, IntoStaticStr};

/// Element types with a dedicated signature encoding (ECMA-335 II.23.1.16).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[allow(missing_docs)]
pub enum CorLibType {
    Void,
    Boolean,
    Char,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    String,
    IntPtr,
    UIntPtr,
    Object,
    TypedReference,
}

impl CorLibType {
    /// The simple name, e.g. `Int32`.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Maps a `System` type name to its dedicated encoding.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        use strum::IntoEnumIterator;
        Self::iter().find(|c| c.name() == name)
    }
}

/// Owner kind of a generic parameter reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericParamKind {
    /// `!n`
    Type,
    /// `!!n`
    Method,
}

/// A nominal reference: `[scope]Namespace.Name`, possibly nested.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SigTypeRef {
    /// Name of the assembly defining the type.
    pub scope: String,
    /// Namespace; empty for nested types.
    pub namespace: String,
    /// Simple name.
    pub name: String,
    /// Enclosing type of a nested type.
    pub declaring: Option<Box<SigTypeRef>>,
}

impl SigTypeRef {
    /// A top-level type reference.
    #[must_use]
    pub fn new(scope: &str, namespace: &str, name: &str) -> Self {
        Self {
            scope: scope.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            declaring: None,
        }
    }

    /// A reference to a type nested in `self`.
    #[must_use]
    pub fn nested(&self, name: &str) -> Self {
        Self {
            scope: self.scope.clone(),
            namespace: String::new(),
            name: name.to_string(),
            declaring: Some(Box::new(self.clone())),
        }
    }

    /// `Namespace.Name`, nested types spelled `Outer/Inner`.
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.declaring {
            Some(outer) => format!("{}/{}", outer.full_name(), self.name),
            None if self.namespace.is_empty() => self.name.clone(),
            None => format!("{}.{}", self.namespace, self.name),
        }
    }
}

/// A type as written in a signature of the companion universe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SigType {
    /// A primitive with a dedicated encoding.
    CorLib(CorLibType),
    /// A class or value type reference.
    TypeDefOrRef(SigTypeRef),
    /// A generic instantiation.
    GenericInstance {
        /// The generic definition.
        generic: SigTypeRef,
        /// Type arguments.
        args: Vec<SigType>,
    },
    /// `T[]`
    SzArray(Box<SigType>),
    /// `T[,]`
    Array {
        /// Element type.
        element: Box<SigType>,
        /// Rank.
        rank: u32,
    },
    /// `T&`
    ByRef(Box<SigType>),
    /// `T*`
    Pointer(Box<SigType>),
    /// `T pinned`
    Pinned(Box<SigType>),
    /// A boxed value type.
    Boxed(Box<SigType>),
    /// `T modreq(M)` or `T modopt(M)`.
    CustomModifier {
        /// Modified type.
        element: Box<SigType>,
        /// Modifier type.
        modifier: Box<SigType>,
        /// `modreq` when true.
        required: bool,
    },
    /// A generic parameter by position.
    GenericParameter {
        /// Type or method parameter.
        kind: GenericParamKind,
        /// Position.
        index: u32,
    },
    /// The vararg sentinel.
    Sentinel,
    /// `method` pointer signature; never resolvable.
    FunctionPointer,
}

impl SigType {
    /// `[scope]Namespace.Name`
    #[must_use]
    pub fn named(scope: &str, namespace: &str, name: &str) -> Self {
        SigType::TypeDefOrRef(SigTypeRef::new(scope, namespace, name))
    }

    /// Wraps in a single-dimensional array.
    #[must_use]
    pub fn sz_array(self) -> Self {
        SigType::SzArray(Box::new(self))
    }

    /// Wraps in a managed reference.
    #[must_use]
    pub fn by_ref(self) -> Self {
        SigType::ByRef(Box::new(self))
    }

    /// Wraps in an unmanaged pointer.
    #[must_use]
    pub fn pointer(self) -> Self {
        SigType::Pointer(Box::new(self))
    }

    /// Returns `true` for `void`, however spelled.
    #[must_use]
    pub fn is_void(&self) -> bool {
        match self {
            SigType::CorLib(CorLibType::Void) => true,
            SigType::TypeDefOrRef(r) => r.declaring.is_none() && r.namespace == "System" && r.name == "Void",
            _ => false,
        }
    }
}

impl fmt::Display for SigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigType::CorLib(c) => write!(f, "System.{}", c.name()),
            SigType::TypeDefOrRef(r) => write!(f, "[{}]{}", r.scope, r.full_name()),
            SigType::GenericInstance { generic, args } => {
                write!(f, "[{}]{}<", generic.scope, generic.full_name())?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{a}")?;
                }
                f.write_str(">")
            }
            SigType::SzArray(e) => write!(f, "{e}[]"),
            SigType::Array { element, rank } => {
                write!(f, "{element}[{}]", ",".repeat(rank.saturating_sub(1) as usize))
            }
            SigType::ByRef(e) => write!(f, "{e}&"),
            SigType::Pointer(e) => write!(f, "{e}*"),
            SigType::Pinned(e) => write!(f, "{e} pinned"),
            SigType::Boxed(e) => write!(f, "boxed {e}"),
            SigType::CustomModifier {
                element,
                modifier,
                required,
            } => write!(
                f,
                "{element} {}({modifier})",
                if *required { "modreq" } else { "modopt" }
            ),
            SigType::GenericParameter {
                kind: GenericParamKind::Type,
                index,
            } => write!(f, "!{index}"),
            SigType::GenericParameter {
                kind: GenericParamKind::Method,
                index,
            } => write!(f, "!!{index}"),
            SigType::Sentinel => f.write_str("..."),
            SigType::FunctionPointer => f.write_str("method*"),
        }
    }
}

/// A method reference: the declaring type plus the call-site signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SigMethodRef {
    /// Declaring type, possibly an instantiation or an array.
    pub declaring: SigType,
    /// Name.
    pub name: String,
    /// Instance method.
    pub has_this: bool,
    /// Number of method generic parameters.
    pub generic_arity: u32,
    /// Return type.
    pub return_type: SigType,
    /// Fixed parameter types.
    pub params: Vec<SigType>,
    /// Vararg parameter types after the sentinel.
    pub sentinel: Vec<SigType>,
}

impl SigMethodRef {
    /// Returns `true` unless the method returns `void`.
    #[must_use]
    pub fn returns_value(&self) -> bool {
        !self.return_type.is_void()
    }
}

impl fmt::Display for SigMethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}::{}(", self.return_type, self.declaring, self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{p}")?;
        }
        f.write_str(")")
    }
}

/// A generic method instantiation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SigMethodSpec {
    /// The generic method.
    pub method: SigMethodRef,
    /// Method type arguments.
    pub args: Vec<SigType>,
}

/// A field reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SigFieldRef {
    /// Declaring type, possibly an instantiation.
    pub declaring: SigType,
    /// Name.
    pub name: String,
    /// Field type.
    pub field_type: SigType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_reference_names() {
        let outer = SigTypeRef::new("Assembly-CSharp", "Game", "Player");
        let inner = outer.nested("Stats");
        assert_eq!(inner.full_name(), "Game.Player/Stats");
        assert_eq!(inner.scope, "Assembly-CSharp");
    }

    #[test]
    fn void_in_both_spellings() {
        assert!(SigType::CorLib(CorLibType::Void).is_void());
        assert!(SigType::named("mscorlib", "System", "Void").is_void());
        assert!(!SigType::CorLib(CorLibType::Int32).is_void());
    }

    #[test]
    fn corlib_names() {
        assert_eq!(CorLibType::from_name("UIntPtr"), Some(CorLibType::UIntPtr));
        assert_eq!(CorLibType::Single.name(), "Single");
        assert_eq!(CorLibType::from_name("Decimal"), None);
    }
}
