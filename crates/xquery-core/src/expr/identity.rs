//! Node identity and order comparisons, and `intersect`.

use core::cmp::Ordering;

use crate::engine::context::XPathContext;
use crate::engine::runtime::{Error, ErrorCode};
use crate::expr::path::sort_document_order;
use crate::expr::{Expr, ExpressionVisitor, static_type_check};
use crate::iter::{self, BoxedIter, SingletonIntersectIterator, materialize};
use crate::model::XdmNode;
use crate::types::{Cardinality, ItemType, SequenceType};
use crate::xdm::{XdmAtomicValue, XdmItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityOp {
    Is,
    Precedes,
    Follows,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentityComparison {
    pub left: Box<Expr>,
    pub op: IdentityOp,
    pub right: Box<Expr>,
    /// Stands for `generate-id(left) eq generate-id(right)`: two empty
    /// operands are equal and one empty operand gives `false`.
    pub generate_id_emulation: bool,
}

fn node_operand<N: XdmNode>(item: Option<XdmItem<N>>, op: IdentityOp) -> Result<Option<N>, Error> {
    match item {
        None => Ok(None),
        Some(XdmItem::Node(n)) => Ok(Some(n)),
        Some(other) => Err(Error::from_code(
            ErrorCode::XPTY0004,
            format!("operands of {op:?} must be nodes, got {other}"),
        )),
    }
}

impl IdentityComparison {
    pub fn new(left: Expr, op: IdentityOp, right: Expr) -> Self {
        Self {
            left: Box::new(left),
            op,
            right: Box::new(right),
            generate_id_emulation: false,
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        if self.generate_id_emulation {
            Cardinality::EXACTLY_ONE
        } else {
            Cardinality::ZERO_OR_ONE
        }
    }

    pub(crate) fn type_check(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let required = SequenceType::new(ItemType::any_node(), Cardinality::ZERO_OR_ONE);
        let left = static_type_check(self.left.type_check(v)?, required, "first operand of a node comparison", v)?;
        let right = static_type_check(self.right.type_check(v)?, required, "second operand of a node comparison", v)?;
        if !self.generate_id_emulation && (left.is_empty_literal() || right.is_empty_literal()) {
            return Ok(Expr::empty());
        }
        Ok(Expr::Identity(IdentityComparison {
            left: Box::new(left),
            right: Box::new(right),
            ..self
        }))
    }

    pub(crate) fn optimize(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        Ok(Expr::Identity(IdentityComparison {
            left: Box::new(self.left.optimize(v)?),
            right: Box::new(self.right.optimize(v)?),
            ..self
        }))
    }

    pub fn evaluate_item<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<Option<XdmItem<N>>, Error> {
        let a = node_operand(self.left.evaluate_item(ctx)?, self.op)?;
        let b = node_operand(self.right.evaluate_item(ctx)?, self.op)?;
        let result = match (a, b) {
            (Some(a), Some(b)) => match self.op {
                IdentityOp::Is => a == b,
                IdentityOp::Precedes => a.compare_document_order(&b)? == Ordering::Less,
                IdentityOp::Follows => a.compare_document_order(&b)? == Ordering::Greater,
            },
            (None, None) if self.generate_id_emulation => true,
            _ if self.generate_id_emulation => false,
            _ => return Ok(None),
        };
        Ok(Some(XdmItem::Atomic(XdmAtomicValue::Boolean(result))))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntersectExpr {
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    /// The left operand is at most one node.
    pub singleton: bool,
}

impl IntersectExpr {
    pub fn new(left: Expr, right: Expr) -> Self {
        Self {
            left: Box::new(left),
            right: Box::new(right),
            singleton: false,
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        if self.left.cardinality().at_most_one() || self.right.cardinality().at_most_one() {
            Cardinality::ZERO_OR_ONE
        } else {
            Cardinality::ZERO_OR_MORE
        }
    }

    pub(crate) fn type_check(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let required = SequenceType::new(ItemType::any_node(), Cardinality::ZERO_OR_MORE);
        let left = static_type_check(self.left.type_check(v)?, required, "first operand of 'intersect'", v)?;
        let right = static_type_check(self.right.type_check(v)?, required, "second operand of 'intersect'", v)?;
        if left.is_empty_literal() || right.is_empty_literal() {
            return Ok(Expr::empty());
        }
        // the single node goes on the left
        let (left, right) = if !left.cardinality().at_most_one() && right.cardinality().at_most_one() {
            (right, left)
        } else {
            (left, right)
        };
        Ok(Expr::Intersect(IntersectExpr {
            singleton: left.cardinality().at_most_one(),
            left: Box::new(left),
            right: Box::new(right),
        }))
    }

    pub(crate) fn optimize(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let left = self.left.optimize(v)?;
        let right = self.right.optimize(v)?;
        if left.is_empty_literal() || right.is_empty_literal() {
            let out = Expr::empty();
            v.trace("intersect-empty", &Expr::intersect(left, right), &out);
            return Ok(out);
        }
        Ok(Expr::Intersect(IntersectExpr {
            left: Box::new(left),
            right: Box::new(right),
            ..self
        }))
    }

    pub fn iterate<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<BoxedIter<'a, N>, Error> {
        if self.singleton {
            return match self.left.evaluate_item(ctx)? {
                None => Ok(iter::empty()),
                Some(XdmItem::Node(n)) => Ok(Box::new(SingletonIntersectIterator::new(n, self.right.iterate(ctx)?))),
                Some(other) => Err(Error::from_code(
                    ErrorCode::XPTY0004,
                    format!("operands of 'intersect' must be nodes, got {other}"),
                )),
            };
        }
        let left = sort_document_order(materialize(self.left.iterate(ctx)?)?)?;
        let right = sort_document_order(materialize(self.right.iterate(ctx)?)?)?;
        let both: Vec<XdmItem<N>> = left.into_iter().filter(|n| right.contains(n)).collect();
        Ok(iter::from_vec(both))
    }
}
