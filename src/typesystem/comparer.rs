//! Signature-level structural comparison of type expressions.

use crate::typesystem::TypeExpr;

impl TypeExpr {
    /// Compares two type expressions the way method signatures are matched.
    ///
    /// Composite kinds compare child-by-child, nominal types and generic
    /// parameters by identity, and sentinels are always equal. Custom modifiers
    /// compare element and modifier but ignore whether the modifier is
    /// required, so a `modreq` recovered from one universe matches a `modopt`
    /// reached through the other.
    #[must_use]
    pub fn signature_eq(&self, other: &TypeExpr) -> bool {
        match (self, other) {
            (TypeExpr::Simple(a), TypeExpr::Simple(b)) => a == b,
            (
                TypeExpr::Array {
                    element: a,
                    rank: ra,
                },
                TypeExpr::Array {
                    element: b,
                    rank: rb,
                },
            ) => ra == rb && a.signature_eq(b),
            (TypeExpr::SzArray(a), TypeExpr::SzArray(b))
            | (TypeExpr::Pointer(a), TypeExpr::Pointer(b))
            | (TypeExpr::ByRef(a), TypeExpr::ByRef(b))
            | (TypeExpr::Pinned(a), TypeExpr::Pinned(b))
            | (TypeExpr::Boxed(a), TypeExpr::Boxed(b)) => a.signature_eq(b),
            (
                TypeExpr::CustomModifier {
                    element: ea,
                    modifier: ma,
                    ..
                },
                TypeExpr::CustomModifier {
                    element: eb,
                    modifier: mb,
                    ..
                },
            ) => ea.signature_eq(eb) && ma.signature_eq(mb),
            (
                TypeExpr::GenericInstance {
                    generic: ga,
                    args: aa,
                },
                TypeExpr::GenericInstance {
                    generic: gb,
                    args: ab,
                },
            ) => {
                ga == gb
                    && aa.len() == ab.len()
                    && aa.iter().zip(ab).all(|(a, b)| a.signature_eq(b))
            }
            (
                TypeExpr::GenericParameter {
                    owner: oa,
                    index: ia,
                },
                TypeExpr::GenericParameter {
                    owner: ob,
                    index: ib,
                },
            ) => oa == ob && ia == ib,
            (TypeExpr::Sentinel, TypeExpr::Sentinel) => true,
            _ => false,
        }
    }
}

/// Compares two parameter lists pairwise with [`TypeExpr::signature_eq`].
#[must_use]
pub fn signatures_eq(a: &[TypeExpr], b: &[TypeExpr]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.signature_eq(y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MethodId, TypeId};

    fn ty(n: usize) -> TypeExpr {
        TypeExpr::Simple(TypeId::from_index(n))
    }

    #[test]
    fn independently_built_instances_are_equal() {
        let list = TypeId::from_index(10);
        let a = TypeExpr::generic_instance(list, vec![ty(1), ty(2).sz_array()]);
        let b = TypeExpr::generic_instance(list, vec![ty(1), ty(2).sz_array()]);
        assert!(a.signature_eq(&b));
        assert_eq!(a, b);
    }

    #[test]
    fn changing_one_argument_breaks_equality() {
        let list = TypeId::from_index(10);
        let a = TypeExpr::generic_instance(list, vec![ty(1), ty(2)]);
        let b = TypeExpr::generic_instance(list, vec![ty(1), ty(3)]);
        assert!(!a.signature_eq(&b));
        assert_ne!(a, b);

        let c = TypeExpr::generic_instance(list, vec![ty(1)]);
        assert!(!a.signature_eq(&c));
    }

    #[test]
    fn modifier_requiredness_is_ignored() {
        let a = ty(1).modified(ty(5), true);
        let b = ty(1).modified(ty(5), false);
        assert!(a.signature_eq(&b));
        assert_ne!(a, b);
        assert!(!a.signature_eq(&ty(1).modified(ty(6), true)));
    }

    #[test]
    fn generic_parameters_compare_by_position_and_owner() {
        let t = TypeId::from_index(1);
        let m = MethodId::from_index(1);
        assert!(TypeExpr::type_param(t, 0).signature_eq(&TypeExpr::type_param(t, 0)));
        assert!(!TypeExpr::type_param(t, 0).signature_eq(&TypeExpr::type_param(t, 1)));
        assert!(!TypeExpr::type_param(t, 0).signature_eq(&TypeExpr::method_param(m, 0)));
    }

    #[test]
    fn wrappers_do_not_mix() {
        assert!(!ty(1).pointer().signature_eq(&ty(1).by_ref()));
        assert!(!ty(1).array(2).signature_eq(&ty(1).array(3)));
        assert!(TypeExpr::Sentinel.signature_eq(&TypeExpr::Sentinel));
    }

    #[test]
    fn parameter_lists() {
        assert!(signatures_eq(&[ty(1), ty(2)], &[ty(1), ty(2)]));
        assert!(!signatures_eq(&[ty(1)], &[ty(1), ty(2)]));
    }
}
