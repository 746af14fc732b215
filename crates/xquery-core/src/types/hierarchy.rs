//! Subtype, comparability and ordering queries over the static type lattice.

use crate::types::{AtomicType, ItemType, NodeType};

/// Relationship between two item types, seen from the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRelation {
    Same,
    /// The first type contains the second.
    Subsumes,
    /// The first type is contained in the second.
    Subsumed,
    Overlaps,
    Disjoint,
}

/// Type hierarchy oracle consulted during type checking and optimization.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeHierarchy;

impl TypeHierarchy {
    pub fn atomic_subtype(&self, sub: AtomicType, sup: AtomicType) -> bool {
        use AtomicType as T;
        if sub == sup || sup == T::AnyAtomic {
            return true;
        }
        match sup {
            T::Numeric => sub.is_numeric(),
            T::Decimal => sub == T::Integer,
            T::Duration => matches!(sub, T::YearMonthDuration | T::DayTimeDuration),
            _ => false,
        }
    }

    pub fn is_subtype(&self, sub: &ItemType, sup: &ItemType) -> bool {
        match (sub, sup) {
            (ItemType::Empty, _) | (_, ItemType::AnyItem) => true,
            (ItemType::Atomic(a), ItemType::Atomic(b)) => self.atomic_subtype(*a, *b),
            (ItemType::Node(a), ItemType::Node(b)) => {
                b.kinds.contains(a.kinds)
                    && (b.typed_content.is_none() || a.typed_content == b.typed_content)
            }
            (ItemType::Function, ItemType::Function) | (ItemType::External, ItemType::External) => true,
            _ => false,
        }
    }

    pub fn relationship(&self, a: &ItemType, b: &ItemType) -> TypeRelation {
        if a == b {
            return TypeRelation::Same;
        }
        let a_in_b = self.is_subtype(a, b);
        let b_in_a = self.is_subtype(b, a);
        match (a_in_b, b_in_a) {
            (true, true) => TypeRelation::Same,
            (true, false) => TypeRelation::Subsumed,
            (false, true) => TypeRelation::Subsumes,
            (false, false) => match (a, b) {
                (ItemType::Node(x), ItemType::Node(y)) if x.kinds.intersects(y.kinds) => TypeRelation::Overlaps,
                (ItemType::Atomic(x), ItemType::Atomic(y))
                    if x.is_numeric() && y.is_numeric()
                        && (*x == AtomicType::Numeric || *y == AtomicType::Numeric) =>
                {
                    TypeRelation::Overlaps
                }
                _ => TypeRelation::Disjoint,
            },
        }
    }

    /// Smallest item type containing both arguments.
    pub fn common_super_type(&self, a: &ItemType, b: &ItemType) -> ItemType {
        if self.is_subtype(a, b) {
            return *b;
        }
        if self.is_subtype(b, a) {
            return *a;
        }
        match (a, b) {
            (ItemType::Atomic(x), ItemType::Atomic(y)) => {
                if x.is_numeric() && y.is_numeric() {
                    ItemType::Atomic(AtomicType::Numeric)
                } else if x.primitive() == y.primitive() {
                    ItemType::Atomic(x.primitive())
                } else {
                    ItemType::ANY_ATOMIC
                }
            }
            (ItemType::Node(x), ItemType::Node(y)) => ItemType::Node(NodeType {
                kinds: x.kinds | y.kinds,
                typed_content: if x.typed_content == y.typed_content { x.typed_content } else { None },
            }),
            _ => ItemType::AnyItem,
        }
    }

    fn comparison_class(t: AtomicType, ordered: bool) -> AtomicType {
        use AtomicType as T;
        match t {
            T::UntypedAtomic | T::AnyUri => T::String,
            T::Decimal | T::Integer | T::Double | T::Float => T::Numeric,
            T::YearMonthDuration | T::DayTimeDuration if !ordered => T::Duration,
            other => other,
        }
    }

    /// Value-comparison rule: `true` if some values of the two types may be
    /// comparable (including "don't know yet" for `xs:anyAtomicType`).
    pub fn is_possibly_comparable(&self, t1: AtomicType, t2: AtomicType, ordered: bool) -> bool {
        if t1 == t2 || t1 == AtomicType::AnyAtomic || t2 == AtomicType::AnyAtomic {
            return true;
        }
        if (t1 == AtomicType::Numeric && t2.is_numeric()) || (t2 == AtomicType::Numeric && t1.is_numeric()) {
            return true;
        }
        Self::comparison_class(t1, false) == Self::comparison_class(t2, false)
            && (!ordered || Self::comparison_class(t1, true) == Self::comparison_class(t2, true))
    }

    /// Comparable for every pair of values of the two types.
    pub fn is_guaranteed_comparable(&self, t1: AtomicType, t2: AtomicType, ordered: bool) -> bool {
        if t1 == AtomicType::AnyAtomic || t2 == AtomicType::AnyAtomic {
            return false;
        }
        if t1 == t2 {
            return true;
        }
        Self::comparison_class(t1, ordered) == Self::comparison_class(t2, ordered)
            || (t1.is_numeric() && t2.is_numeric())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untyped_compares_like_string() {
        let th = TypeHierarchy;
        assert!(th.is_guaranteed_comparable(AtomicType::UntypedAtomic, AtomicType::String, true));
        assert!(!th.is_possibly_comparable(AtomicType::String, AtomicType::Date, false));
        assert!(th.is_possibly_comparable(AtomicType::AnyAtomic, AtomicType::Date, true));
    }

    #[test]
    fn durations_compare_across_subtypes_only_for_equality() {
        let th = TypeHierarchy;
        assert!(th.is_possibly_comparable(
            AtomicType::YearMonthDuration,
            AtomicType::DayTimeDuration,
            false
        ));
        assert!(!th.is_possibly_comparable(
            AtomicType::YearMonthDuration,
            AtomicType::DayTimeDuration,
            true
        ));
    }

    #[test]
    fn integer_is_decimal_subtype() {
        let th = TypeHierarchy;
        assert!(th.is_subtype(&ItemType::INTEGER, &ItemType::Atomic(AtomicType::Decimal)));
        assert!(th.is_subtype(&ItemType::INTEGER, &ItemType::Atomic(AtomicType::Numeric)));
        assert_eq!(
            th.relationship(&ItemType::STRING, &ItemType::INTEGER),
            TypeRelation::Disjoint
        );
    }
}
