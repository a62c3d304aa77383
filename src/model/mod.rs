//! The analysis universe: an arena of assemblies, types and members.
//!
//! - [`AppContext`]: the arena, its builders and structural queries
//! - [`TypeDef`], [`MethodDef`], [`FieldDef`], [`PropertyDef`]: node records
//! - [`MethodRef`], [`FieldRef`], [`ArrayMethod`]: operand-level references
//! - [`SideTables`]: typed auxiliary data produced by the passes

mod attributes;
mod context;
mod defs;
mod ids;
mod refs;
mod sidetables;

pub use attributes::{
    FieldAttributes, GenericParameterAttributes, MethodAttributes, MethodImplAttributes,
    PropertyAttributes, TypeAttributes,
};
pub use context::AppContext;
pub use defs::{AssemblyDef, FieldDef, GenericParamDef, MethodDef, ParamDef, PropertyDef, TypeDef};
pub use ids::{AssemblyId, FieldId, MethodId, PropertyId, TypeId};
pub use refs::{ArrayMethod, ArrayMethodKind, FieldRef, MethodRef};
pub use sidetables::{
    Blittability, EnumUnderlying, ICallDelegate, MarkSet, PropertyAccessor, SideTable, SideTables,
    TypeInfo,
};
