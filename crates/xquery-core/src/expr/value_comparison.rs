//! Value comparisons (`eq`, `ne`, `lt`, `le`, `gt`, `ge`) and their rewrites.

use crate::engine::context::XPathContext;
use crate::engine::runtime::{Error, ErrorCode, SourceLocation};
use crate::expr::{
    AtomicComparer, BoundComparer, ComparisonOp, Expr, ExpressionVisitor, IdentityComparison, IdentityOp, IsLastExpr,
    SystemFunction, UntypedAtomicConverter, static_type_check,
};
use crate::model::XdmNode;
use crate::types::{AtomicType, Cardinality, ItemType, SequenceType};
use crate::xdm::{XdmAtomicValue, XdmItem};

/// Operands larger than this are compared in closed form by the count rewrite.
const COUNT_REWRITE_LIMIT: f64 = i32::MAX as f64;

#[derive(Debug, Clone, PartialEq)]
pub struct ValueComparison {
    pub left: Box<Expr>,
    pub op: ComparisonOp,
    pub right: Box<Expr>,
    pub comparer: AtomicComparer,
    /// Result when either operand is empty; `None` yields the empty sequence.
    pub result_when_empty: Option<bool>,
    /// Operand types only overlap; comparability is checked per evaluation.
    pub needs_runtime_check: bool,
    pub loc: Option<SourceLocation>,
}

type Rule = fn(&ValueComparison, &ExpressionVisitor<'_>) -> Option<Expr>;

impl ValueComparison {
    pub fn new(left: Expr, op: ComparisonOp, right: Expr) -> Self {
        Self {
            left: Box::new(left),
            op,
            right: Box::new(right),
            comparer: AtomicComparer::codepoint(),
            result_when_empty: None,
            needs_runtime_check: false,
            loc: None,
        }
    }

    #[must_use]
    pub fn with_result_when_empty(mut self, result: Option<bool>) -> Self {
        self.result_when_empty = result;
        self
    }

    pub fn cardinality(&self) -> Cardinality {
        if self.result_when_empty.is_some() {
            Cardinality::EXACTLY_ONE
        } else {
            Cardinality::ZERO_OR_ONE
        }
    }

    fn empty_result(&self) -> Expr {
        self.result_when_empty.map_or_else(Expr::empty, Expr::boolean)
    }

    pub(crate) fn type_check(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let left = self.left.type_check(v)?;
        let right = self.right.type_check(v)?;
        if left.is_empty_literal() || right.is_empty_literal() {
            return Ok(self.result_when_empty.map_or_else(Expr::empty, Expr::boolean));
        }
        let token = self.op.value_token();
        let check = |e: Expr, side: &str| -> Result<Expr, Error> {
            let e = static_type_check(e, SequenceType::OPTIONAL_ATOMIC, &format!("{side} operand of '{token}'"), v)?;
            if e.item_type() == ItemType::UNTYPED_ATOMIC {
                return Ok(Expr::UntypedConvert(UntypedAtomicConverter::new(e, AtomicType::String, v)));
            }
            Ok(e)
        };
        let left = check(left, "first")?;
        let right = check(right, "second")?;

        let t0 = left.item_type().atomic_type().unwrap_or(AtomicType::AnyAtomic).primitive();
        let t1 = right.item_type().atomic_type().unwrap_or(AtomicType::AnyAtomic).primitive();
        let ordered = self.op.is_ordering();
        let mut needs_runtime_check = t0 == AtomicType::AnyAtomic || t1 == AtomicType::AnyAtomic;
        if !needs_runtime_check && !v.th.is_possibly_comparable(t0, t1, ordered) {
            let message = if ordered && (!t0.is_ordered() || !t1.is_ordered()) {
                format!("operator '{token}' is not defined on {t0} and {t1}")
            } else {
                format!("cannot compare {t0} with {t1}")
            };
            if left.cardinality().allows_zero() || right.cardinality().allows_zero() {
                v.warn(&format!("{message}; the comparison can only succeed if an operand is empty"), self.loc);
                needs_runtime_check = true;
            } else {
                return Err(Error::static_err(ErrorCode::XPTY0004, message, self.loc));
            }
        }
        Ok(Expr::ValueComparison(ValueComparison {
            left: Box::new(left),
            right: Box::new(right),
            comparer: AtomicComparer::new(v.static_ctx.default_collation.clone()),
            needs_runtime_check,
            ..self
        }))
    }

    pub(crate) fn optimize(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let vc = ValueComparison {
            left: Box::new(self.left.optimize(v)?),
            right: Box::new(self.right.optimize(v)?),
            ..self
        };
        const RULES: [(&str, Rule); 8] = [
            ("comparison-constant", ValueComparison::fold_literals),
            ("count-comparison", ValueComparison::count_rewrite),
            ("string-length-zero", ValueComparison::string_length_rewrite),
            ("empty-string", ValueComparison::empty_string_rewrite),
            ("position-last", ValueComparison::position_last_rewrite),
            ("compare-to-integer", ValueComparison::integer_constant_rewrite),
            ("boolean-literal", ValueComparison::boolean_literal_rewrite),
            ("generate-id", ValueComparison::generate_id_rewrite),
        ];
        for (rule, apply) in RULES {
            if let Some(out) = apply(&vc, v) {
                v.trace(rule, &Expr::ValueComparison(vc), &out);
                return out.optimize(v);
            }
        }
        Ok(Expr::ValueComparison(vc))
    }

    /// Operand matching `pick` together with the other operand and the
    /// operator oriented so that the picked operand is on the left.
    fn oriented<'e, T>(&'e self, pick: impl Fn(&'e Expr) -> Option<T>) -> Option<(T, &'e Expr, ComparisonOp)> {
        if let Some(t) = pick(&*self.left) {
            return Some((t, &*self.right, self.op));
        }
        pick(&*self.right).map(|t| (t, &*self.left, self.op.inverse()))
    }

    fn fold_literals(&self, _v: &ExpressionVisitor<'_>) -> Option<Expr> {
        let (l, r) = (self.left.as_literal()?, self.right.as_literal()?);
        if l.is_empty() || r.is_empty() {
            return Some(self.empty_result());
        }
        if !self.comparer.is_codepoint() {
            return None;
        }
        let (a, b) = (l.single()?, r.single()?);
        let zoned = |x: &XdmAtomicValue| {
            matches!(
                x.atomic_type(),
                AtomicType::DateTime | AtomicType::Date | AtomicType::Time
            )
        };
        if zoned(a) || zoned(b) {
            return None;
        }
        // failures are left for evaluation to report
        let result = BoundComparer::static_codepoint().compare(a, self.op, b).ok()?;
        Some(Expr::boolean(result))
    }

    /// `count(X) op N` in a form that reads at most `N + 1` items of `X`.
    fn count_rewrite(&self, _v: &ExpressionVisitor<'_>) -> Option<Expr> {
        let (args, other, op) = self.oriented(|e| e.as_call(SystemFunction::Count))?;
        let [x] = args else {
            return None;
        };
        let n = other.as_single_atomic()?.as_f64()?;
        if let Some(inner) = x.as_call(SystemFunction::Subsequence)
            && inner.get(1).and_then(Expr::as_single_atomic).and_then(XdmAtomicValue::as_f64) == Some(1.0)
            && inner.get(2).and_then(Expr::as_single_atomic).is_some()
        {
            return None;
        }
        let x = x.clone();
        let constant = |b: bool| Some(Expr::boolean(b));
        use ComparisonOp::*;
        if n.is_nan() {
            return constant(op == Ne);
        }
        if n < 0.0 {
            return constant(!matches!(op, Eq | Lt | Le));
        }
        if n > COUNT_REWRITE_LIMIT {
            return constant(!matches!(op, Eq | Gt | Ge));
        }
        if n.fract() != 0.0 {
            return match op {
                Eq => constant(false),
                Ne => constant(true),
                Gt | Ge => Some(count_compare(x, Ge, n.ceil())),
                Lt | Le => Some(count_compare(x, Le, n.floor())),
            };
        }
        if n == 0.0 {
            return match op {
                Eq | Le => Some(Expr::call(SystemFunction::Empty, vec![x])),
                Ne | Gt => Some(Expr::call(SystemFunction::Exists, vec![x])),
                Ge => constant(true),
                Lt => constant(false),
            };
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let k = n as usize;
        Some(match op {
            Gt => Expr::call(SystemFunction::Exists, vec![Expr::tail(x, k + 1)]),
            Ge => Expr::call(SystemFunction::Exists, vec![Expr::tail(x, k)]),
            _ => {
                let window = Expr::call(
                    SystemFunction::Subsequence,
                    vec![x, Expr::double(1.0), Expr::double(n + 1.0)],
                );
                count_compare(window, op, n)
            }
        })
    }

    /// `string-length(X) op 0` where `X` is exactly one string.
    fn string_length_rewrite(&self, _v: &ExpressionVisitor<'_>) -> Option<Expr> {
        let (args, other, op) = self.oriented(|e| e.as_call(SystemFunction::StringLength))?;
        let [x] = args else {
            return None;
        };
        if other.as_single_atomic()?.as_f64()? != 0.0 || !x.cardinality().is_exactly_one() {
            return None;
        }
        let s = if x.item_type() == ItemType::STRING {
            x.clone()
        } else {
            Expr::call(SystemFunction::String, vec![x.clone()])
        };
        match op {
            ComparisonOp::Eq | ComparisonOp::Le => Some(Expr::call(SystemFunction::Not, vec![s])),
            ComparisonOp::Ne | ComparisonOp::Gt => Some(Expr::call(SystemFunction::Boolean, vec![s])),
            _ => None,
        }
    }

    /// `S eq ""` under the codepoint collation tests the effective boolean value of `S`.
    fn empty_string_rewrite(&self, _v: &ExpressionVisitor<'_>) -> Option<Expr> {
        if !self.comparer.is_codepoint() {
            return None;
        }
        let is_empty_string = |e: &Expr| matches!(e.as_single_atomic(), Some(XdmAtomicValue::String(s)) if s.is_empty());
        let (_, s, op) = self.oriented(|e| is_empty_string(e).then_some(()))?;
        let op = op.inverse();
        if s.item_type() != ItemType::STRING {
            return None;
        }
        let one = s.cardinality().is_exactly_one();
        match op {
            ComparisonOp::Ne | ComparisonOp::Gt if one || self.result_when_empty == Some(false) => {
                Some(Expr::call(SystemFunction::Boolean, vec![s.clone()]))
            }
            ComparisonOp::Eq | ComparisonOp::Le if one => Some(Expr::call(SystemFunction::Not, vec![s.clone()])),
            _ => None,
        }
    }

    fn position_last_rewrite(&self, _v: &ExpressionVisitor<'_>) -> Option<Expr> {
        let (_, other, op) = self.oriented(|e| matches!(e, Expr::Position).then_some(()))?;
        if !matches!(other, Expr::Last) {
            return None;
        }
        match op {
            ComparisonOp::Eq => Some(Expr::IsLast(IsLastExpr { condition: true })),
            ComparisonOp::Ne => Some(Expr::IsLast(IsLastExpr { condition: false })),
            _ => None,
        }
    }

    fn integer_constant_rewrite(&self, _v: &ExpressionVisitor<'_>) -> Option<Expr> {
        let (value, operand, op) = self.oriented(Expr::as_integer_literal)?;
        let numeric = operand.item_type().atomic_type().is_some_and(AtomicType::is_numeric);
        let empty_ok = operand.cardinality().is_exactly_one() || self.result_when_empty == Some(false);
        if !numeric || !empty_ok || operand.as_literal().is_some() {
            return None;
        }
        // operand on the left: `operand op value`
        Some(Expr::CompareToInteger(CompareToIntegerConstant {
            operand: Box::new(operand.clone()),
            op: op.inverse(),
            value,
        }))
    }

    /// `X eq true()` => `X`, `X eq false()` => `not(X)`.
    fn boolean_literal_rewrite(&self, _v: &ExpressionVisitor<'_>) -> Option<Expr> {
        let (b, operand, op) = self.oriented(Expr::as_boolean_literal)?;
        if operand.item_type() != ItemType::BOOLEAN
            || !operand.cardinality().is_exactly_one()
            || operand.as_literal().is_some()
        {
            return None;
        }
        let keep = match op {
            ComparisonOp::Eq => b,
            ComparisonOp::Ne => !b,
            _ => return None,
        };
        Some(if keep {
            operand.clone()
        } else {
            Expr::call(SystemFunction::Not, vec![operand.clone()])
        })
    }

    /// `generate-id(X) eq generate-id(Y)` => `X is Y` with empty operands
    /// treated as equal. Only applied when each argument is statically at
    /// most one node on its own, so no cardinality check is skipped.
    fn generate_id_rewrite(&self, _v: &ExpressionVisitor<'_>) -> Option<Expr> {
        if self.op != ComparisonOp::Eq {
            return None;
        }
        let single_node = |e: &Expr| -> Option<Expr> {
            let [x] = e.as_call(SystemFunction::GenerateId)? else {
                return None;
            };
            let proven = matches!(x.item_type(), ItemType::Node(_))
                && x.cardinality().at_most_one()
                && !matches!(x, Expr::CardinalityCheck(_));
            proven.then(|| x.clone())
        };
        let x = single_node(&self.left)?;
        let y = single_node(&self.right)?;
        let mut identity = IdentityComparison::new(x, IdentityOp::Is, y);
        identity.generate_id_emulation = true;
        Some(Expr::Identity(identity))
    }

    /// Comparison with the operator inverted, `None` when an operand may be NaN.
    pub fn negate(&self) -> Option<ValueComparison> {
        let may_be_nan = |e: &Expr| match e.item_type() {
            ItemType::Empty => false,
            t => t.atomic_type().is_none_or(AtomicType::may_be_nan),
        };
        if may_be_nan(&self.left) || may_be_nan(&self.right) {
            return None;
        }
        Some(ValueComparison {
            op: self.op.negate(),
            result_when_empty: Some(self.result_when_empty != Some(true)),
            ..self.clone()
        })
    }

    pub fn evaluate_item<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<Option<XdmItem<N>>, Error> {
        let empty = self.result_when_empty.map(|b| XdmItem::Atomic(XdmAtomicValue::Boolean(b)));
        let Some(a) = self.left.evaluate_atomic(ctx)? else {
            return Ok(empty);
        };
        let Some(b) = self.right.evaluate_atomic(ctx)? else {
            return Ok(empty);
        };
        if self.needs_runtime_check {
            let (t0, t1) = (a.atomic_type().primitive(), b.atomic_type().primitive());
            let untyped = |t: AtomicType| if t == AtomicType::UntypedAtomic { AtomicType::String } else { t };
            if !crate::types::TypeHierarchy.is_possibly_comparable(untyped(t0), untyped(t1), self.op.is_ordering()) {
                return Err(Error::from_code(
                    ErrorCode::XPTY0004,
                    format!("cannot compare {t0} with {t1} using '{}'", self.op.value_token()),
                )
                .at(self.loc));
            }
        }
        let comparer = self.comparer.bind(ctx.dyn_ctx)?;
        let result = comparer.compare(&a, self.op, &b).map_err(|e| e.at(self.loc))?;
        Ok(Some(XdmItem::Atomic(XdmAtomicValue::Boolean(result))))
    }
}

/// `count(x) op n`; both operands are always present.
#[allow(clippy::cast_possible_truncation)]
fn count_compare(x: Expr, op: ComparisonOp, n: f64) -> Expr {
    let count = Expr::call(SystemFunction::Count, vec![x]);
    Expr::ValueComparison(ValueComparison::new(count, op, Expr::integer(n as i64)).with_result_when_empty(Some(false)))
}

/// `operand op value` for a numeric operand and an integer constant.
#[derive(Debug, Clone, PartialEq)]
pub struct CompareToIntegerConstant {
    pub operand: Box<Expr>,
    pub op: ComparisonOp,
    pub value: i64,
}

impl CompareToIntegerConstant {
    /// False for an empty operand; NaN satisfies only `ne`.
    #[allow(clippy::cast_precision_loss)]
    pub fn evaluate<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<bool, Error> {
        let Some(v) = self.operand.evaluate_atomic(ctx)? else {
            return Ok(false);
        };
        let ord = match v {
            XdmAtomicValue::Integer(i) => i.cmp(&self.value),
            other => {
                let Some(d) = other.as_f64() else {
                    return Err(Error::from_code(
                        ErrorCode::XPTY0004,
                        format!("cannot compare {} with xs:integer", other.atomic_type()),
                    ));
                };
                match d.partial_cmp(&(self.value as f64)) {
                    Some(ord) => ord,
                    None => return Ok(self.op == ComparisonOp::Ne),
                }
            }
        };
        Ok(self.op.test(ord))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::runtime::{DynamicContext, StaticContext};
    use crate::expr::compile_with_context;
    use crate::simple_node::SimpleNode;
    use rstest::rstest;

    fn run(e: &Expr) -> Option<XdmItem<SimpleNode>> {
        let dc: DynamicContext<SimpleNode> = DynamicContext::default();
        let ctx = XPathContext::new(&dc);
        e.evaluate_item(&ctx).expect("evaluate")
    }

    fn boolean(b: bool) -> Option<XdmItem<SimpleNode>> {
        Some(XdmItem::Atomic(XdmAtomicValue::Boolean(b)))
    }

    #[rstest]
    #[case::eq(ComparisonOp::Eq, false)]
    #[case::ne(ComparisonOp::Ne, true)]
    #[case::lt(ComparisonOp::Lt, false)]
    #[case::ge(ComparisonOp::Ge, false)]
    fn nan_operands(#[case] op: ComparisonOp, #[case] expected: bool) {
        let vc = Expr::value_compare(Expr::double(f64::NAN), op, Expr::integer(1));
        assert_eq!(run(&vc), boolean(expected));
    }

    #[test]
    fn empty_operand_yields_result_when_empty() {
        let vc = ValueComparison::new(Expr::empty(), ComparisonOp::Eq, Expr::integer(1));
        assert_eq!(run(&Expr::ValueComparison(vc.clone())), None);
        let vc = vc.with_result_when_empty(Some(false));
        assert_eq!(run(&Expr::ValueComparison(vc)), boolean(false));
    }

    #[test]
    fn negation_inverts_result_when_empty() {
        let vc = ValueComparison::new(Expr::integer(1), ComparisonOp::Lt, Expr::integer(2));
        let neg = vc.negate().expect("negatable");
        assert_eq!(neg.op, ComparisonOp::Ge);
        assert_eq!(neg.result_when_empty, Some(true));
        let doubles = ValueComparison::new(Expr::double(1.0), ComparisonOp::Lt, Expr::integer(2));
        assert!(doubles.negate().is_none());
    }

    #[test]
    fn incomparable_singletons_are_a_static_error() {
        let vc = Expr::value_compare(Expr::integer(1), ComparisonOp::Eq, Expr::string("1"));
        let err = compile_with_context(vc, &StaticContext::default()).expect_err("static error");
        assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
        assert!(err.is_static());
    }

    #[test]
    fn position_eq_last_becomes_is_last() {
        let vc = Expr::value_compare(Expr::Last, ComparisonOp::Eq, Expr::Position);
        let out = compile_with_context(vc, &StaticContext::default()).expect("compile");
        assert_eq!(out, Expr::IsLast(IsLastExpr { condition: true }));
    }

    #[test]
    fn integer_constant_is_moved_to_the_right() {
        let x = Expr::external_var(crate::xdm::ExpandedName::local("x"));
        let vc = ValueComparison::new(Expr::integer(3), ComparisonOp::Lt, Expr::call(SystemFunction::Count, vec![x]))
            .with_result_when_empty(Some(false));
        let sc = StaticContext::default();
        let v = ExpressionVisitor::new(&sc);
        let Some(Expr::CompareToInteger(c)) = vc.integer_constant_rewrite(&v) else {
            panic!("expected compare-to-integer");
        };
        assert_eq!((c.op, c.value), (ComparisonOp::Gt, 3));
    }
}
