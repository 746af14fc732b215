//! Numeric arithmetic.

use core::fmt;

use crate::engine::context::XPathContext;
use crate::engine::runtime::{Error, ErrorCode, SourceLocation};
use crate::expr::{Expr, ExpressionVisitor, static_type_check};
use crate::model::XdmNode;
use crate::types::{AtomicType, Cardinality, ItemType, SequenceType};
use crate::xdm::{XdmAtomicValue, XdmItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "div",
            ArithmeticOp::IDiv => "idiv",
            ArithmeticOp::Mod => "mod",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArithmeticExpr {
    pub left: Box<Expr>,
    pub op: ArithmeticOp,
    pub right: Box<Expr>,
    pub loc: Option<SourceLocation>,
}

/// Rank in the numeric promotion order.
fn rank(t: AtomicType) -> Option<u8> {
    match t {
        AtomicType::Integer => Some(0),
        AtomicType::Decimal => Some(1),
        AtomicType::Float => Some(2),
        AtomicType::Double => Some(3),
        _ => None,
    }
}

fn promoted(a: AtomicType, b: AtomicType) -> AtomicType {
    match (rank(a), rank(b)) {
        (Some(x), Some(y)) => {
            if x >= y {
                a
            } else {
                b
            }
        }
        _ => AtomicType::Numeric,
    }
}

impl ArithmeticExpr {
    pub fn new(left: Expr, op: ArithmeticOp, right: Expr) -> Self {
        Self {
            left: Box::new(left),
            op,
            right: Box::new(right),
            loc: None,
        }
    }

    pub fn item_type(&self) -> ItemType {
        let t = promoted(
            self.left.item_type().atomic_type().unwrap_or(AtomicType::Numeric),
            self.right.item_type().atomic_type().unwrap_or(AtomicType::Numeric),
        );
        ItemType::Atomic(match (self.op, t) {
            (ArithmeticOp::IDiv, _) => AtomicType::Integer,
            (ArithmeticOp::Div, AtomicType::Integer) => AtomicType::Decimal,
            (_, t) => t,
        })
    }

    pub fn cardinality(&self) -> Cardinality {
        if self.left.cardinality().is_exactly_one() && self.right.cardinality().is_exactly_one() {
            Cardinality::EXACTLY_ONE
        } else {
            Cardinality::ZERO_OR_ONE
        }
    }

    /// Fold when both operands are numeric constants and the result is defined.
    pub(crate) fn simplify(self) -> Expr {
        if let (Some(a), Some(b)) = (self.left.as_single_atomic(), self.right.as_single_atomic())
            && let Ok(value) = compute(a, self.op, b)
        {
            return Expr::atomic(value);
        }
        Expr::Arithmetic(self)
    }

    pub(crate) fn type_check(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let role = |side: &str| format!("{side} operand of '{}'", self.op);
        let left = static_type_check(self.left.type_check(v)?, SequenceType::OPTIONAL_NUMERIC, &role("first"), v)?;
        let right = static_type_check(self.right.type_check(v)?, SequenceType::OPTIONAL_NUMERIC, &role("second"), v)?;
        if left.is_empty_literal() || right.is_empty_literal() {
            return Ok(Expr::empty());
        }
        Ok(Expr::Arithmetic(ArithmeticExpr {
            left: Box::new(left),
            right: Box::new(right),
            ..self
        }))
    }

    pub(crate) fn optimize(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let before = ArithmeticExpr {
            left: Box::new(self.left.optimize(v)?),
            right: Box::new(self.right.optimize(v)?),
            ..self
        };
        let out = before.clone().simplify();
        if let Expr::Literal(_) = out {
            v.trace("arithmetic-constant", &Expr::Arithmetic(before), &out);
        }
        Ok(out)
    }

    pub fn evaluate_item<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<Option<XdmItem<N>>, Error> {
        let Some(a) = self.left.evaluate_atomic(ctx)? else {
            return Ok(None);
        };
        let Some(b) = self.right.evaluate_atomic(ctx)? else {
            return Ok(None);
        };
        compute(&a, self.op, &b).map(|v| Some(XdmItem::Atomic(v))).map_err(|e| e.at(self.loc))
    }
}

fn overflow() -> Error {
    Error::from_code(ErrorCode::FOAR0002, "integer overflow")
}

fn division_by_zero() -> Error {
    Error::from_code(ErrorCode::FOAR0001, "division by zero")
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integer_division(x: f64, y: f64) -> Result<XdmAtomicValue, Error> {
    if y == 0.0 && !x.is_nan() {
        return Err(division_by_zero());
    }
    let q = (x / y).trunc();
    if !q.is_finite() {
        return Err(Error::from_code(
            ErrorCode::FOAR0002,
            "integer division of NaN or infinity",
        ));
    }
    if q < i64::MIN as f64 || q >= i64::MAX as f64 {
        return Err(overflow());
    }
    Ok(XdmAtomicValue::Integer(q as i64))
}

/// Apply `op` to two numeric values after numeric promotion.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn compute(a: &XdmAtomicValue, op: ArithmeticOp, b: &XdmAtomicValue) -> Result<XdmAtomicValue, Error> {
    use ArithmeticOp as O;
    use XdmAtomicValue as V;
    let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) else {
        return Err(Error::from_code(
            ErrorCode::XPTY0004,
            format!(
                "arithmetic is not defined for {} {op} {}",
                a.atomic_type(),
                b.atomic_type()
            ),
        ));
    };
    let t = promoted(a.atomic_type(), b.atomic_type());
    if let (V::Integer(i), V::Integer(j)) = (a, b) {
        let (i, j) = (*i, *j);
        return match op {
            O::Add => i.checked_add(j).map(V::Integer).ok_or_else(overflow),
            O::Sub => i.checked_sub(j).map(V::Integer).ok_or_else(overflow),
            O::Mul => i.checked_mul(j).map(V::Integer).ok_or_else(overflow),
            O::Div if j == 0 => Err(division_by_zero()),
            O::Div => Ok(V::Decimal(i as f64 / j as f64)),
            O::IDiv | O::Mod if j == 0 => Err(division_by_zero()),
            O::IDiv => i.checked_div(j).map(V::Integer).ok_or_else(overflow),
            O::Mod => i.checked_rem(j).map(V::Integer).ok_or_else(overflow),
        };
    }
    if t == AtomicType::Decimal && y == 0.0 && matches!(op, O::Div | O::Mod) {
        return Err(division_by_zero());
    }
    let r = match op {
        O::Add => x + y,
        O::Sub => x - y,
        O::Mul => x * y,
        O::Div => x / y,
        O::Mod => x % y,
        O::IDiv => return integer_division(x, y),
    };
    Ok(match t {
        AtomicType::Float => V::Float(r as f32),
        AtomicType::Decimal => V::Decimal(r),
        _ => V::Double(r),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::int_add(V::Integer(2), ArithmeticOp::Add, V::Integer(3), V::Integer(5))]
    #[case::int_div_is_decimal(V::Integer(1), ArithmeticOp::Div, V::Integer(4), V::Decimal(0.25))]
    #[case::idiv_truncates(V::Double(-7.5), ArithmeticOp::IDiv, V::Integer(2), V::Integer(-3))]
    #[case::double_div_zero(V::Double(1.0), ArithmeticOp::Div, V::Integer(0), V::Double(f64::INFINITY))]
    #[case::float_promotion(V::Integer(1), ArithmeticOp::Mul, V::Float(2.5), V::Float(2.5))]
    fn arithmetic_results(#[case] a: V, #[case] op: ArithmeticOp, #[case] b: V, #[case] expected: V) {
        assert_eq!(compute(&a, op, &b).ok(), Some(expected));
    }

    use XdmAtomicValue as V;

    #[rstest]
    #[case::int_div_zero(V::Integer(1), ArithmeticOp::Div, V::Integer(0), ErrorCode::FOAR0001)]
    #[case::overflow(V::Integer(i64::MAX), ArithmeticOp::Add, V::Integer(1), ErrorCode::FOAR0002)]
    #[case::idiv_nan(V::Double(f64::NAN), ArithmeticOp::IDiv, V::Integer(1), ErrorCode::FOAR0002)]
    #[case::non_numeric(V::String("a".into()), ArithmeticOp::Add, V::Integer(1), ErrorCode::XPTY0004)]
    fn arithmetic_errors(#[case] a: V, #[case] op: ArithmeticOp, #[case] b: V, #[case] code: ErrorCode) {
        assert_eq!(compute(&a, op, &b).err().map(|e| e.code_enum()), Some(code));
    }
}
