//! Stable handles into the [`crate::model::AppContext`] arena.

use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Position of the node in its arena vector.
            #[must_use]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            pub(crate) fn from_index(index: usize) -> Self {
                #[allow(clippy::cast_possible_truncation)]
                Self(index as u32)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Handle of an assembly.
    AssemblyId,
    "assembly"
);
define_id!(
    /// Handle of a type definition.
    TypeId,
    "type"
);
define_id!(
    /// Handle of a method definition.
    MethodId,
    "method"
);
define_id!(
    /// Handle of a field definition.
    FieldId,
    "field"
);
define_id!(
    /// Handle of a property definition.
    PropertyId,
    "property"
);
