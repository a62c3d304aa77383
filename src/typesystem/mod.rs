//! Type expressions and the folds passes use to inspect and rewrite them.
//!
//! [`TypeExpr`] is a closed sum over every shape a type can take in a
//! signature. Structural questions go through [`visitor::all`] and
//! [`visitor::any`]; substitutions go through [`visitor::rewrite`] with a
//! [`visitor::Rewriter`] such as [`visitor::TypeReplacer`].

mod comparer;
mod expr;
pub mod visitor;

pub use comparer::signatures_eq;
pub use expr::{GenericOwner, TypeExpr};
pub use visitor::{
    contains_generic_parameter, is_non_instantiable, Instantiation, Rewriter, TypeReplacer,
};
