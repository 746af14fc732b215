//! `start to end`.

use crate::engine::context::XPathContext;
use crate::engine::runtime::{Error, ErrorCode, SourceLocation};
use crate::expr::{Expr, ExpressionVisitor, Literal, static_type_check};
use crate::iter::{self, BoxedIter, RangeIterator};
use crate::model::XdmNode;
use crate::types::SequenceType;
use crate::xdm::XdmAtomicValue;

#[derive(Debug, Clone, PartialEq)]
pub struct RangeExpr {
    pub start: Box<Expr>,
    pub end: Box<Expr>,
    pub loc: Option<SourceLocation>,
}

impl RangeExpr {
    pub fn new(start: Expr, end: Expr) -> Self {
        Self {
            start: Box::new(start),
            end: Box::new(end),
            loc: None,
        }
    }

    pub(crate) fn type_check(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let start = static_type_check(
            self.start.type_check(v)?,
            SequenceType::OPTIONAL_INTEGER,
            "first operand of 'to'",
            v,
        )?;
        let end = static_type_check(
            self.end.type_check(v)?,
            SequenceType::OPTIONAL_INTEGER,
            "second operand of 'to'",
            v,
        )?;
        Ok(Expr::Range(RangeExpr {
            start: Box::new(start),
            end: Box::new(end),
            loc: self.loc,
        }))
    }

    pub(crate) fn optimize(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let start = self.start.optimize(v)?;
        let end = self.end.optimize(v)?;
        let folded = if start.is_empty_literal() || end.is_empty_literal() {
            Some(Expr::empty())
        } else {
            match (start.as_integer_literal(), end.as_integer_literal()) {
                (Some(a), Some(b)) => Some(Expr::Literal(Literal::range(a, b))),
                _ => None,
            }
        };
        let before = Expr::Range(RangeExpr {
            start: Box::new(start),
            end: Box::new(end),
            loc: self.loc,
        });
        match folded {
            Some(out) => {
                v.trace("range-constant", &before, &out);
                Ok(out)
            }
            None => Ok(before),
        }
    }

    fn bound<'a, N: XdmNode>(&'a self, e: &'a Expr, ctx: &XPathContext<'a, N>) -> Result<Option<i64>, Error> {
        match e.evaluate_atomic(ctx)? {
            None => Ok(None),
            Some(XdmAtomicValue::Integer(i)) => Ok(Some(i)),
            Some(other) => Err(Error::from_code(
                ErrorCode::XPTY0004,
                format!("range bound must be an xs:integer, found {}", other.atomic_type()),
            )
            .at(self.loc)),
        }
    }

    pub fn iterate<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<BoxedIter<'a, N>, Error> {
        let Some(start) = self.bound(&self.start, ctx)? else {
            return Ok(iter::empty());
        };
        let Some(end) = self.bound(&self.end, ctx)? else {
            return Ok(iter::empty());
        };
        Ok(Box::new(RangeIterator::new(start, end)))
    }
}
