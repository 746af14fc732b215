//! General comparisons (`=`, `!=`, `<`, ...) with existential semantics.

use crate::convert::atomic::parse_lexical;
use crate::engine::context::XPathContext;
use crate::engine::runtime::{Error, ErrorCode, SourceLocation};
use crate::expr::{
    AtomicComparer, BoundComparer, ComparisonOp, Expr, ExpressionVisitor, LiteralValue, ValueComparison, static_type_check,
};
use crate::iter::{get_atomizing_iterator, materialize};
use crate::model::XdmNode;
use crate::types::{AtomicType, SequenceType};
use crate::xdm::{XdmAtomicValue, XdmItem};

#[derive(Debug, Clone, PartialEq)]
pub struct GeneralComparison {
    pub left: Box<Expr>,
    pub op: ComparisonOp,
    pub right: Box<Expr>,
    pub comparer: AtomicComparer,
    pub loc: Option<SourceLocation>,
}

/// Types whose values may be cast from `xs:untypedAtomic` per item.
fn untyped_or_unknown(t: AtomicType) -> bool {
    matches!(t, AtomicType::UntypedAtomic | AtomicType::AnyAtomic)
}

impl GeneralComparison {
    pub fn new(left: Expr, op: ComparisonOp, right: Expr) -> Self {
        Self {
            left: Box::new(left),
            op,
            right: Box::new(right),
            comparer: AtomicComparer::codepoint(),
            loc: None,
        }
    }

    /// Atomize both sides; singleton operands of known types reduce to a
    /// value comparison that yields `false` for an empty operand.
    pub(crate) fn type_check(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let token = self.op.general_token();
        let role = |side: &str| format!("{side} operand of '{token}'");
        let left = static_type_check(self.left.type_check(v)?, SequenceType::ATOMIC_SEQUENCE, &role("first"), v)?;
        let right = static_type_check(self.right.type_check(v)?, SequenceType::ATOMIC_SEQUENCE, &role("second"), v)?;
        if left.is_empty_literal() || right.is_empty_literal() {
            return Ok(Expr::boolean(false));
        }
        let t0 = left.item_type().atomic_type().unwrap_or(AtomicType::AnyAtomic);
        let t1 = right.item_type().atomic_type().unwrap_or(AtomicType::AnyAtomic);
        let comparer = AtomicComparer::new(v.static_ctx.default_collation.clone());

        if left.cardinality().at_most_one()
            && right.cardinality().at_most_one()
            && !untyped_or_unknown(t0)
            && !untyped_or_unknown(t1)
        {
            let before = Expr::GeneralComparison(GeneralComparison {
                left: Box::new(left.clone()),
                right: Box::new(right.clone()),
                comparer: comparer.clone(),
                ..self
            });
            let vc = ValueComparison {
                comparer,
                loc: self.loc,
                ..ValueComparison::new(left, self.op, right).with_result_when_empty(Some(false))
            };
            let out = vc.type_check(v)?;
            v.trace("general-to-value", &before, &out);
            return Ok(out);
        }

        if !untyped_or_unknown(t0)
            && !untyped_or_unknown(t1)
            && !v.th.is_possibly_comparable(t0.primitive(), t1.primitive(), self.op.is_ordering())
        {
            let message = format!("cannot compare {t0} with {t1} using '{token}'");
            if left.cardinality().allows_zero() || right.cardinality().allows_zero() {
                v.warn(&message, self.loc);
            } else {
                return Err(Error::static_err(ErrorCode::XPTY0004, message, self.loc));
            }
        }
        Ok(Expr::GeneralComparison(GeneralComparison {
            left: Box::new(left),
            right: Box::new(right),
            comparer,
            ..self
        }))
    }

    pub(crate) fn optimize(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let gc = GeneralComparison {
            left: Box::new(self.left.optimize(v)?),
            right: Box::new(self.right.optimize(v)?),
            ..self
        };
        if gc.left.is_empty_literal() || gc.right.is_empty_literal() {
            let out = Expr::boolean(false);
            v.trace("general-comparison-empty", &Expr::GeneralComparison(gc), &out);
            return Ok(out);
        }
        if let Some(result) = gc.fold_literals() {
            let out = Expr::boolean(result);
            v.trace("general-comparison-constant", &Expr::GeneralComparison(gc), &out);
            return Ok(out);
        }
        Ok(Expr::GeneralComparison(gc))
    }

    fn fold_literals(&self) -> Option<bool> {
        if !self.comparer.is_codepoint() {
            return None;
        }
        let values = |e: &Expr| -> Option<Vec<XdmAtomicValue>> {
            match &e.as_literal()?.value {
                LiteralValue::Atomics(v) => Some(v.clone()),
                LiteralValue::Range { .. } => None,
            }
        };
        let (lefts, rights) = (values(&self.left)?, values(&self.right)?);
        let foldable = |x: &XdmAtomicValue| {
            !matches!(
                x.atomic_type(),
                AtomicType::DateTime | AtomicType::Date | AtomicType::Time
            )
        };
        if !lefts.iter().chain(&rights).all(foldable) {
            return None;
        }
        existential(&BoundComparer::static_codepoint(), &lefts, self.op, &rights).ok()
    }

    pub fn evaluate<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<bool, Error> {
        let comparer = self.comparer.bind(ctx.dyn_ctx)?;
        let rights = atomics(materialize(get_atomizing_iterator(self.right.iterate(ctx)?)?)?);
        if rights.is_empty() {
            return Ok(false);
        }
        let mut lefts = get_atomizing_iterator(self.left.iterate(ctx)?)?;
        while let Some(item) = lefts.next_item() {
            let XdmItem::Atomic(a) = item? else {
                continue;
            };
            for b in &rights {
                if compare_pair(&comparer, &a, self.op, b).map_err(|e| e.at(self.loc))? {
                    lefts.close();
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

fn atomics<N>(items: Vec<XdmItem<N>>) -> Vec<XdmAtomicValue> {
    items
        .into_iter()
        .filter_map(|i| match i {
            XdmItem::Atomic(a) => Some(a),
            _ => None,
        })
        .collect()
}

fn existential(
    comparer: &BoundComparer,
    lefts: &[XdmAtomicValue],
    op: ComparisonOp,
    rights: &[XdmAtomicValue],
) -> Result<bool, Error> {
    for a in lefts {
        for b in rights {
            if compare_pair(comparer, a, op, b)? {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Compare one pair, casting an untyped operand to the other operand's type
/// (`xs:double` against numerics, `xs:string` against strings or untyped).
fn compare_pair(comparer: &BoundComparer, a: &XdmAtomicValue, op: ComparisonOp, b: &XdmAtomicValue) -> Result<bool, Error> {
    match (a, b) {
        (XdmAtomicValue::UntypedAtomic(_), XdmAtomicValue::UntypedAtomic(_)) => comparer.compare(a, op, b),
        (XdmAtomicValue::UntypedAtomic(s), other) => comparer.compare(&cast_untyped(s, other)?, op, b),
        (other, XdmAtomicValue::UntypedAtomic(s)) => comparer.compare(a, op, &cast_untyped(s, other)?),
        _ => comparer.compare(a, op, b),
    }
}

fn cast_untyped(s: &str, other: &XdmAtomicValue) -> Result<XdmAtomicValue, Error> {
    let t = other.atomic_type();
    if t.is_numeric() {
        return Ok(parse_lexical(s, AtomicType::Double)?);
    }
    match t {
        AtomicType::String | AtomicType::AnyUri => Ok(XdmAtomicValue::String(s.to_string())),
        t => Ok(parse_lexical(s, t)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ints(values: &[i64]) -> Vec<XdmAtomicValue> {
        values.iter().copied().map(XdmAtomicValue::Integer).collect()
    }

    #[rstest]
    #[case::shared_value(&[1, 2], ComparisonOp::Eq, &[2, 3], true)]
    #[case::disjoint(&[1, 2], ComparisonOp::Eq, &[3, 4], false)]
    #[case::some_pair_differs(&[1, 1], ComparisonOp::Ne, &[1, 2], true)]
    #[case::empty_side(&[], ComparisonOp::Ne, &[1], false)]
    fn existential_semantics(#[case] l: &[i64], #[case] op: ComparisonOp, #[case] r: &[i64], #[case] expected: bool) {
        let c = BoundComparer::static_codepoint();
        assert_eq!(existential(&c, &ints(l), op, &ints(r)).expect("compare"), expected);
    }

    #[test]
    fn untyped_against_number_compares_numerically() {
        let c = BoundComparer::static_codepoint();
        let untyped = XdmAtomicValue::UntypedAtomic("10".into());
        assert!(compare_pair(&c, &untyped, ComparisonOp::Gt, &XdmAtomicValue::Integer(9)).expect("numeric"));
        let err = compare_pair(&c, &XdmAtomicValue::UntypedAtomic("x".into()), ComparisonOp::Eq, &XdmAtomicValue::Integer(1))
            .expect_err("not a number");
        assert_eq!(err.code_enum(), ErrorCode::FORG0001);
    }
}
