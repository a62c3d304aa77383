//! Folds over type expressions.
//!
//! Three reusable traversals cover every structural question the passes ask:
//!
//! - [`all`]: boolean AND over every subterm. Unconstrained leaves, generic
//!   parameters and sentinels are `true`.
//! - [`any`]: boolean OR, the dual of [`all`]. Leaves default to `false`.
//! - [`rewrite`]: post-order structural replacement driven by a [`Rewriter`].
//!   Composite nodes are rebuilt only when a child actually changed, so an
//!   untouched expression comes back as `Cow::Borrowed`.
//!
//! The boolean folds take a `check` callback that is consulted before a node
//! is descended into. Returning `Some(answer)` decides the node outright,
//! `None` falls through to the default combination of its children.

use std::{borrow::Cow, collections::HashMap};

use crate::{
    model::{MethodId, TypeId},
    typesystem::{GenericOwner, TypeExpr},
};

fn children(ty: &TypeExpr) -> Vec<&TypeExpr> {
    match ty {
        TypeExpr::Simple(_) | TypeExpr::GenericParameter { .. } | TypeExpr::Sentinel => Vec::new(),
        TypeExpr::Array { element, .. }
        | TypeExpr::SzArray(element)
        | TypeExpr::Pointer(element)
        | TypeExpr::ByRef(element)
        | TypeExpr::Pinned(element)
        | TypeExpr::Boxed(element) => vec![element],
        TypeExpr::CustomModifier {
            element, modifier, ..
        } => vec![element, modifier],
        TypeExpr::GenericInstance { args, .. } => args.iter().collect(),
    }
}

/// AND-fold: `true` only if every subterm is `true`.
pub fn all<F>(ty: &TypeExpr, check: &mut F) -> bool
where
    F: FnMut(&TypeExpr) -> Option<bool>,
{
    if let Some(answer) = check(ty) {
        return answer;
    }
    children(ty).into_iter().all(|child| all(child, check))
}

/// OR-fold: `true` if at least one subterm is `true`.
pub fn any<F>(ty: &TypeExpr, check: &mut F) -> bool
where
    F: FnMut(&TypeExpr) -> Option<bool>,
{
    if let Some(answer) = check(ty) {
        return answer;
    }
    children(ty).into_iter().any(|child| any(child, check))
}

/// Returns `true` if `ty` mentions any generic parameter.
#[must_use]
pub fn contains_generic_parameter(ty: &TypeExpr) -> bool {
    any(ty, &mut |t| match t {
        TypeExpr::GenericParameter { .. } => Some(true),
        _ => None,
    })
}

/// Returns `true` if `ty` cannot name a concrete runtime class.
///
/// Boxed, by-ref, pinned and sentinel markers only exist inside signatures,
/// and open generic parameters have no class until instantiated.
#[must_use]
pub fn is_non_instantiable(ty: &TypeExpr) -> bool {
    any(ty, &mut |t| match t {
        TypeExpr::Boxed(_)
        | TypeExpr::ByRef(_)
        | TypeExpr::GenericParameter { .. }
        | TypeExpr::Pinned(_)
        | TypeExpr::Sentinel => Some(true),
        _ => None,
    })
}

/// Per-kind hooks for [`rewrite`].
pub trait Rewriter {
    /// Replacement for a leaf (simple type, generic parameter or sentinel).
    ///
    /// Also consulted with `TypeExpr::Simple(generic)` for the definition of a
    /// generic instantiation; a simple replacement swaps the definition.
    fn leaf(&mut self, _ty: &TypeExpr) -> Option<TypeExpr> {
        None
    }

    /// Final say over a composite node after its children were rewritten.
    ///
    /// `rebuilt` is the node with rewritten children, borrowed from the input
    /// when nothing below it changed.
    fn combine<'a>(&mut self, rebuilt: Cow<'a, TypeExpr>) -> Cow<'a, TypeExpr> {
        rebuilt
    }
}

/// Post-order structural rewrite.
pub fn rewrite<'a, R: Rewriter + ?Sized>(ty: &'a TypeExpr, rewriter: &mut R) -> Cow<'a, TypeExpr> {
    let rebuilt: Cow<'a, TypeExpr> = match ty {
        TypeExpr::Simple(_) | TypeExpr::GenericParameter { .. } | TypeExpr::Sentinel => {
            return match rewriter.leaf(ty) {
                Some(replacement) => Cow::Owned(replacement),
                None => Cow::Borrowed(ty),
            };
        }
        TypeExpr::Array { element, rank } => match rewrite(element, rewriter) {
            Cow::Borrowed(_) => Cow::Borrowed(ty),
            Cow::Owned(e) => Cow::Owned(e.array(*rank)),
        },
        TypeExpr::SzArray(element) => rewrap(ty, element, rewriter, TypeExpr::sz_array),
        TypeExpr::Pointer(element) => rewrap(ty, element, rewriter, TypeExpr::pointer),
        TypeExpr::ByRef(element) => rewrap(ty, element, rewriter, TypeExpr::by_ref),
        TypeExpr::Pinned(element) => rewrap(ty, element, rewriter, TypeExpr::pinned),
        TypeExpr::Boxed(element) => rewrap(ty, element, rewriter, TypeExpr::boxed),
        TypeExpr::CustomModifier {
            element,
            modifier,
            required,
        } => {
            let e = rewrite(element, rewriter);
            let m = rewrite(modifier, rewriter);
            if matches!((&e, &m), (Cow::Borrowed(_), Cow::Borrowed(_))) {
                Cow::Borrowed(ty)
            } else {
                Cow::Owned(e.into_owned().modified(m.into_owned(), *required))
            }
        }
        TypeExpr::GenericInstance { generic, args } => {
            let new_generic = match rewriter.leaf(&TypeExpr::Simple(*generic)) {
                Some(TypeExpr::Simple(replacement)) => replacement,
                _ => *generic,
            };
            let new_args: Vec<Cow<'a, TypeExpr>> =
                args.iter().map(|arg| rewrite(arg, rewriter)).collect();
            let unchanged = new_generic == *generic
                && new_args.iter().all(|arg| matches!(arg, Cow::Borrowed(_)));
            if unchanged {
                Cow::Borrowed(ty)
            } else {
                Cow::Owned(TypeExpr::generic_instance(
                    new_generic,
                    new_args.into_iter().map(Cow::into_owned).collect(),
                ))
            }
        }
    };
    rewriter.combine(rebuilt)
}

fn rewrap<'a, R: Rewriter + ?Sized>(
    original: &'a TypeExpr,
    element: &'a TypeExpr,
    rewriter: &mut R,
    wrap: fn(TypeExpr) -> TypeExpr,
) -> Cow<'a, TypeExpr> {
    match rewrite(element, rewriter) {
        Cow::Borrowed(_) => Cow::Borrowed(original),
        Cow::Owned(e) => Cow::Owned(wrap(e)),
    }
}

/// Replaces leaves according to a fixed map.
#[derive(Debug, Default, Clone)]
pub struct TypeReplacer {
    replacements: HashMap<TypeExpr, TypeExpr>,
}

impl TypeReplacer {
    /// Creates a replacer from `(from, to)` pairs.
    #[must_use]
    pub fn new(replacements: HashMap<TypeExpr, TypeExpr>) -> Self {
        Self { replacements }
    }

    /// Adds one replacement.
    pub fn insert(&mut self, from: TypeExpr, to: TypeExpr) {
        self.replacements.insert(from, to);
    }

    /// Applies the replacement map to `ty`.
    #[must_use]
    pub fn replace(&mut self, ty: &TypeExpr) -> TypeExpr {
        rewrite(ty, self).into_owned()
    }
}

impl Rewriter for TypeReplacer {
    fn leaf(&mut self, ty: &TypeExpr) -> Option<TypeExpr> {
        self.replacements.get(ty).cloned()
    }
}

/// Substitutes the generic parameters of one type and one method with arguments.
///
/// Parameters of any other owner, and positions past the end of an argument
/// list, are left alone.
#[derive(Debug, Clone)]
pub struct Instantiation<'a> {
    ty: Option<(TypeId, &'a [TypeExpr])>,
    method: Option<(MethodId, &'a [TypeExpr])>,
}

impl<'a> Instantiation<'a> {
    /// Substitutes nothing.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            ty: None,
            method: None,
        }
    }

    /// Binds the parameters of `owner` to `args`.
    #[must_use]
    pub fn with_type(mut self, owner: TypeId, args: &'a [TypeExpr]) -> Self {
        if !args.is_empty() {
            self.ty = Some((owner, args));
        }
        self
    }

    /// Binds the parameters of `owner` to `args`.
    #[must_use]
    pub fn with_method(mut self, owner: MethodId, args: &'a [TypeExpr]) -> Self {
        if !args.is_empty() {
            self.method = Some((owner, args));
        }
        self
    }

    /// Applies the substitution.
    #[must_use]
    pub fn apply(&mut self, ty: &TypeExpr) -> TypeExpr {
        if self.ty.is_none() && self.method.is_none() {
            return ty.clone();
        }
        rewrite(ty, self).into_owned()
    }
}

impl Rewriter for Instantiation<'_> {
    fn leaf(&mut self, ty: &TypeExpr) -> Option<TypeExpr> {
        let TypeExpr::GenericParameter { owner, index } = ty else {
            return None;
        };
        let args = match (owner, self.ty, self.method) {
            (GenericOwner::Type(o), Some((bound, args)), _) if *o == bound => args,
            (GenericOwner::Method(o), _, Some((bound, args))) if *o == bound => args,
            _ => return None,
        };
        args.get(*index as usize).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(n: usize) -> TypeExpr {
        TypeExpr::Simple(TypeId::from_index(n))
    }

    #[test]
    fn open_generic_detection() {
        let list = TypeId::from_index(9);
        let open = TypeExpr::generic_instance(list, vec![TypeExpr::type_param(list, 0)]);
        let closed = TypeExpr::generic_instance(list, vec![ty(1)]);
        assert!(contains_generic_parameter(&open));
        assert!(contains_generic_parameter(
            &TypeExpr::method_param(MethodId::from_index(0), 0).sz_array()
        ));
        assert!(!contains_generic_parameter(&closed));
        assert!(!contains_generic_parameter(&ty(1).pointer()));
    }

    #[test]
    fn non_instantiable_markers() {
        assert!(is_non_instantiable(&ty(1).by_ref()));
        assert!(is_non_instantiable(&TypeExpr::generic_instance(
            TypeId::from_index(9),
            vec![ty(1).boxed()]
        )));
        assert!(is_non_instantiable(&TypeExpr::Sentinel));
        assert!(!is_non_instantiable(&ty(1).sz_array().pointer()));
    }

    #[test]
    fn and_fold_defaults_to_true() {
        assert!(all(&ty(1).array(2), &mut |_| None));
        assert!(!all(&ty(1).array(2), &mut |t| match t {
            TypeExpr::Simple(_) => Some(false),
            _ => None,
        }));
    }

    #[test]
    fn untouched_rewrite_is_borrowed() {
        let mut replacer = TypeReplacer::default();
        replacer.insert(ty(7), ty(8));
        let input = TypeExpr::generic_instance(TypeId::from_index(9), vec![ty(1).pointer()]);
        assert!(matches!(rewrite(&input, &mut replacer), Cow::Borrowed(_)));
    }

    #[test]
    fn replacement_reaches_nested_leaves_and_definitions() {
        let mut replacer = TypeReplacer::default();
        replacer.insert(ty(1), ty(2));
        replacer.insert(ty(9), ty(10));
        let input = TypeExpr::generic_instance(
            TypeId::from_index(9),
            vec![ty(1).sz_array(), ty(3).modified(ty(1), true)],
        );
        let expected = TypeExpr::generic_instance(
            TypeId::from_index(10),
            vec![ty(2).sz_array(), ty(3).modified(ty(2), true)],
        );
        assert_eq!(replacer.replace(&input), expected);
    }

    #[test]
    fn instantiation_binds_by_owner() {
        let list = TypeId::from_index(4);
        let other = TypeId::from_index(5);
        let method = MethodId::from_index(2);
        let type_args = [ty(1)];
        let method_args = [ty(2)];
        let mut inst = Instantiation::identity()
            .with_type(list, &type_args)
            .with_method(method, &method_args);
        let input = TypeExpr::generic_instance(
            list,
            vec![
                TypeExpr::type_param(list, 0),
                TypeExpr::method_param(method, 0).sz_array(),
                TypeExpr::type_param(other, 0),
                TypeExpr::type_param(list, 3),
            ],
        );
        let expected = TypeExpr::generic_instance(
            list,
            vec![
                ty(1),
                ty(2).sz_array(),
                TypeExpr::type_param(other, 0),
                TypeExpr::type_param(list, 3),
            ],
        );
        assert_eq!(inst.apply(&input), expected);
    }

    #[test]
    fn generic_parameters_can_be_substituted() {
        let owner = TypeId::from_index(4);
        let mut replacer = TypeReplacer::default();
        replacer.insert(TypeExpr::type_param(owner, 0), ty(1));
        assert_eq!(
            replacer.replace(&TypeExpr::type_param(owner, 0).by_ref()),
            ty(1).by_ref()
        );
    }
}
