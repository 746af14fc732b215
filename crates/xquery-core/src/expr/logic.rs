//! Sequence concatenation, boolean connectives and conditionals.

use crate::engine::context::XPathContext;
use crate::engine::runtime::Error;
use crate::expr::{Expr, ExpressionVisitor, Literal, LiteralValue, SystemFunction, atomic_ebv};
use crate::iter::{BoxedIter, IterState, SequenceIterator, XdmItemResult, delegate_state};
use crate::model::XdmNode;
use crate::types::{ItemType, TypeHierarchy};
use crate::xdm::XdmItem;

/// Flatten nested blocks, drop empty members and merge constant runs.
pub(crate) fn simplify_block(items: Vec<Expr>) -> Expr {
    let mut out: Vec<Expr> = Vec::with_capacity(items.len());
    let mut stack: Vec<Expr> = items.into_iter().rev().collect();
    while let Some(e) = stack.pop() {
        match e {
            Expr::Block(inner) => stack.extend(inner.into_iter().rev()),
            e if e.is_empty_literal() => {}
            Expr::Literal(Literal {
                value: LiteralValue::Atomics(values),
            }) => match out.last_mut() {
                Some(Expr::Literal(Literal {
                    value: LiteralValue::Atomics(prev),
                })) => prev.extend(values),
                _ => out.push(Expr::atomics(values)),
            },
            e => out.push(e),
        }
    }
    match out.len() {
        0 => Expr::empty(),
        1 => out.pop().unwrap_or_else(Expr::empty),
        _ => Expr::Block(out),
    }
}

/// Concatenates the members of a block, evaluating each only when reached.
pub(crate) struct BlockIterator<'a, N> {
    items: &'a [Expr],
    ctx: XPathContext<'a, N>,
    index: usize,
    current: Option<BoxedIter<'a, N>>,
    state: IterState<N>,
}

impl<'a, N: XdmNode> BlockIterator<'a, N> {
    pub(crate) fn new(items: &'a [Expr], ctx: XPathContext<'a, N>) -> Self {
        Self {
            items,
            ctx,
            index: 0,
            current: None,
            state: IterState::default(),
        }
    }

    fn advance(&mut self) -> Option<XdmItemResult<N>> {
        loop {
            if let Some(cur) = self.current.as_mut() {
                match cur.next_item() {
                    Some(r) => return Some(r),
                    None => self.current = None,
                }
            }
            let expr = self.items.get(self.index)?;
            self.index += 1;
            match expr.iterate(&self.ctx) {
                Ok(it) => self.current = Some(it),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl<'a, N: XdmNode> SequenceIterator<'a, N> for BlockIterator<'a, N> {
    delegate_state!();

    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        if self.state.is_finished() {
            return None;
        }
        let next = self.advance();
        self.state.record(next)
    }

    fn get_another(&self) -> Result<BoxedIter<'a, N>, Error> {
        Ok(Box::new(BlockIterator::new(self.items, self.ctx.clone())))
    }

    fn close(&mut self) {
        if let Some(cur) = self.current.as_mut() {
            cur.close();
        }
        self.state.finish();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalExpr {
    pub op: LogicalOp,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}

/// Effective boolean value of a literal, when it is defined.
pub(crate) fn literal_ebv(e: &Expr) -> Option<bool> {
    let lit = e.as_literal()?;
    if lit.is_empty() {
        return Some(false);
    }
    atomic_ebv(lit.single()?).ok()
}

impl LogicalExpr {
    pub fn new(op: LogicalOp, left: Expr, right: Expr) -> Self {
        Self {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `true and X` => `boolean(X)`, `false and X` => `false`, and so on.
    pub(crate) fn simplify(self) -> Expr {
        let absorbing = self.op == LogicalOp::Or;
        match (literal_ebv(&self.left), literal_ebv(&self.right)) {
            (Some(l), _) if l == absorbing => Expr::boolean(absorbing),
            (Some(_), _) => Expr::call(SystemFunction::Boolean, vec![*self.right]),
            (_, Some(r)) if r != absorbing => Expr::call(SystemFunction::Boolean, vec![*self.left]),
            _ => Expr::Logical(self),
        }
    }

    pub(crate) fn type_check(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let left = self.left.type_check(v)?;
        let right = self.right.type_check(v)?;
        Ok(Expr::Logical(LogicalExpr::new(self.op, left, right)))
    }

    pub(crate) fn optimize(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let left = self.left.optimize(v)?;
        let right = self.right.optimize(v)?;
        let before = LogicalExpr::new(self.op, left, right);
        let out = before.clone().simplify();
        if let Expr::Logical(_) = out {
            return Ok(out);
        }
        v.trace("logical-constant", &Expr::Logical(before), &out);
        out.optimize(v)
    }

    pub fn evaluate<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<bool, Error> {
        let left = self.left.effective_boolean_value(ctx)?;
        match (self.op, left) {
            (LogicalOp::And, false) => Ok(false),
            (LogicalOp::Or, true) => Ok(true),
            _ => self.right.effective_boolean_value(ctx),
        }
    }
}

/// Split nested `and` into its terms, left to right.
pub(crate) fn and_terms(e: Expr, out: &mut Vec<Expr>) {
    match e {
        Expr::Logical(LogicalExpr {
            op: LogicalOp::And,
            left,
            right,
        }) => {
            and_terms(*left, out);
            and_terms(*right, out);
        }
        other => out.push(other),
    }
}

/// Inverse of [`and_terms`]; `None` for no terms.
pub(crate) fn conjunction(terms: Vec<Expr>) -> Option<Expr> {
    terms.into_iter().reduce(Expr::and)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChooseExpr {
    pub condition: Box<Expr>,
    pub then: Box<Expr>,
    pub otherwise: Box<Expr>,
}

impl ChooseExpr {
    pub fn new(condition: Expr, then: Expr, otherwise: Expr) -> Self {
        Self {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn item_type(&self) -> ItemType {
        match (self.then.cardinality().is_empty_only(), self.otherwise.cardinality().is_empty_only()) {
            (true, true) => ItemType::Empty,
            (true, false) => self.otherwise.item_type(),
            (false, true) => self.then.item_type(),
            (false, false) => TypeHierarchy.common_super_type(&self.then.item_type(), &self.otherwise.item_type()),
        }
    }

    pub(crate) fn simplify(self) -> Expr {
        match literal_ebv(&self.condition) {
            Some(true) => *self.then,
            Some(false) => *self.otherwise,
            None => Expr::Choose(self),
        }
    }

    pub(crate) fn optimize(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let condition = self.condition.optimize(v)?;
        let then = self.then.optimize(v)?;
        let otherwise = self.otherwise.optimize(v)?;
        let before = ChooseExpr::new(condition, then, otherwise);
        if literal_ebv(&before.condition).is_some() {
            let out = before.clone().simplify();
            v.trace("if-constant", &Expr::Choose(before), &out);
            return Ok(out);
        }
        Ok(Expr::Choose(before))
    }

    fn branch(&self, condition: bool) -> &Expr {
        if condition { &self.then } else { &self.otherwise }
    }

    pub fn iterate<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<BoxedIter<'a, N>, Error> {
        self.branch(self.condition.effective_boolean_value(ctx)?).iterate(ctx)
    }

    pub fn evaluate_item<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<Option<XdmItem<N>>, Error> {
        self.branch(self.condition.effective_boolean_value(ctx)?).evaluate_item(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xdm::XdmAtomicValue;

    #[test]
    fn block_merges_constants_and_drops_empties() {
        let e = simplify_block(vec![
            Expr::integer(1),
            Expr::empty(),
            Expr::Block(vec![Expr::integer(2), Expr::integer(3)]),
        ]);
        assert_eq!(
            e,
            Expr::atomics(vec![
                XdmAtomicValue::Integer(1),
                XdmAtomicValue::Integer(2),
                XdmAtomicValue::Integer(3),
            ])
        );
    }

    #[test]
    fn single_member_block_unwraps() {
        assert_eq!(simplify_block(vec![Expr::empty(), Expr::context_item()]), Expr::context_item());
    }

    #[test]
    fn constant_connectives_fold() {
        let x = Expr::context_item();
        assert_eq!(
            LogicalExpr::new(LogicalOp::And, Expr::boolean(false), x.clone()).simplify(),
            Expr::boolean(false)
        );
        assert_eq!(
            LogicalExpr::new(LogicalOp::Or, x.clone(), Expr::boolean(false)).simplify(),
            Expr::call(SystemFunction::Boolean, vec![x])
        );
    }

    #[test]
    fn and_terms_round_trip() {
        let e = Expr::and(Expr::and(Expr::Position, Expr::Last), Expr::context_item());
        let mut terms = Vec::new();
        and_terms(e.clone(), &mut terms);
        assert_eq!(terms.len(), 3);
        assert_eq!(conjunction(terms), Some(Expr::and(Expr::and(Expr::Position, Expr::Last), Expr::context_item())));
    }
}
