//! `for` and `let` clauses.

use crate::engine::context::{SlotId, XPathContext};
use crate::engine::runtime::{Error, ErrorCode};
use crate::expr::logic::{and_terms, conjunction};
use crate::expr::path::is_peer_path;
use crate::expr::{
    ContextItemExpr, Expr, ExpressionVisitor, PathExpr, SpecialProps, VarBinding, VarTarget, VariableRef,
};
use crate::iter::{BoxedIter, ItemMappingIterator, MappingIterator};
use crate::model::XdmNode;
use crate::types::{Cardinality, ItemType, SequenceType};

#[derive(Debug, Clone, PartialEq)]
pub struct ForExpr {
    pub var: VarBinding,
    pub sequence: Box<Expr>,
    pub action: Box<Expr>,
}

impl ForExpr {
    pub fn new(var: VarBinding, sequence: Expr, action: Expr) -> Self {
        Self {
            var,
            sequence: Box::new(sequence),
            action: Box::new(action),
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        self.sequence.cardinality().multiply(self.action.cardinality())
    }

    fn is_range_variable(&self, e: &Expr) -> bool {
        matches!(e, Expr::VarRef(r) if r.target == VarTarget::Local(self.var.slot))
    }

    pub(crate) fn type_check(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let sequence = self.sequence.type_check(v)?;
        if sequence.is_empty_literal() {
            return Ok(Expr::empty());
        }
        let mut action = *self.action;
        action.bind_variable_type(
            self.var.slot,
            SequenceType::new(sequence.item_type(), Cardinality::EXACTLY_ONE),
        );
        let action = action.type_check(v)?;
        if action.is_empty_literal() {
            return Ok(Expr::empty());
        }
        Ok(Expr::For(ForExpr::new(self.var, sequence, action)))
    }

    pub(crate) fn optimize(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        if let Some(out) = self.promote_where() {
            v.trace("where-promotion", &Expr::For(self), &out);
            return out.optimize(v);
        }

        let sequence = self.sequence.optimize(v)?;
        if sequence.is_empty_literal() {
            return Ok(Expr::empty());
        }
        let action = self.action.optimize(v)?;
        if action.is_empty_literal() {
            return Ok(Expr::empty());
        }
        let mut f = ForExpr::new(self.var, sequence, action);

        let mut hoisted = Vec::new();
        let before = Expr::For(f.clone());
        f = f.hoist_invariants(&mut hoisted)?;
        if !hoisted.is_empty() {
            v.trace("loop-invariant", &before, &wrap_lets(Expr::For(f.clone()), hoisted.clone()));
        }

        let out = f.rewrite(v)?;
        Ok(wrap_lets(out, hoisted))
    }

    /// Rewrites that replace the loop by a cheaper form.
    fn rewrite(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        if let Some(out) = self.collapse_path() {
            v.trace("for-to-path", &Expr::For(self), &out);
            return out.optimize(v);
        }
        if self.is_range_variable(&self.action) {
            let out = (*self.sequence).clone();
            v.trace("for-identity", &Expr::For(self), &out);
            return Ok(out);
        }
        if self.sequence.cardinality().is_exactly_one() {
            let out = Expr::Let(LetExpr {
                var: self.var.clone(),
                sequence: self.sequence.clone(),
                action: self.action.clone(),
            });
            v.trace("for-to-let", &Expr::For(self), &out);
            return out.optimize(v);
        }
        Ok(Expr::For(self))
    }

    /// `for $x in S return if (C) then A else ()`: terms of `C` that do not
    /// mention `$x` guard the whole loop, and terms that only need `$x` as a
    /// focus become a filter on `S`.
    fn promote_where(&self) -> Option<Expr> {
        let Expr::Choose(choose) = &*self.action else {
            return None;
        };
        if !choose.otherwise.is_empty_literal() {
            return None;
        }
        let slot = self.var.slot;
        let mut terms = Vec::new();
        and_terms((*choose.condition).clone(), &mut terms);
        let (outer, inner): (Vec<Expr>, Vec<Expr>) = terms.into_iter().partition(|t| !t.references_slot(slot));
        let (filtering, remaining): (Vec<Expr>, Vec<Expr>) = inner.into_iter().partition(|t| {
            t.item_type() == ItemType::BOOLEAN && !t.depends_on_focus() && references_outside_focus(t, slot)
        });
        if outer.is_empty() && filtering.is_empty() {
            return None;
        }

        let mut sequence = (*self.sequence).clone();
        if let Some(predicate) = conjunction(filtering) {
            let dot = Expr::ContextItem(ContextItemExpr {
                static_type: sequence.item_type(),
            });
            sequence = Expr::filter(sequence, predicate.replace_variable(slot, &dot).ok()?);
        }
        let action = match conjunction(remaining) {
            Some(condition) => Expr::if_then_else(condition, (*choose.then).clone(), Expr::empty()),
            None => (*choose.then).clone(),
        };
        let inner_loop = Expr::for_in(self.var.clone(), sequence, action);
        Some(match conjunction(outer) {
            Some(condition) => Expr::if_then_else(condition, inner_loop, Expr::empty()),
            None => inner_loop,
        })
    }

    fn hoist_invariants(self, out: &mut Vec<LetExpr>) -> Result<Self, Error> {
        let mut inner = Vec::new();
        self.action.bound_slots(&mut inner);
        let slot = self.var.slot;
        let action = hoist(*self.action, slot, &inner, out)?;
        Ok(ForExpr {
            action: Box::new(action),
            ..self
        })
    }

    /// `for $b in P return $b/step` when the result is already in document
    /// order without duplicates.
    fn collapse_path(&self) -> Option<Expr> {
        let (Expr::Slash(p) | Expr::SimpleStep(p)) = &*self.action else {
            return None;
        };
        if !self.is_range_variable(&p.start) || p.step.references_slot(self.var.slot) {
            return None;
        }
        if p.step
            .special_properties()
            .intersects(SpecialProps::POSITION_DEPENDENT | SpecialProps::LAST_DEPENDENT)
        {
            return None;
        }
        let ordered = self.sequence.cardinality().at_most_one()
            || (is_peer_path(&self.sequence) && matches!(&*p.step, Expr::Axis(a) if a.axis.preserves_peers()));
        ordered.then(|| Expr::Slash(PathExpr::new((*self.sequence).clone(), (*p.step).clone())))
    }

    pub fn iterate<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<BoxedIter<'a, N>, Error> {
        let base = self.sequence.iterate(ctx)?;
        let slot = self.var.slot;
        let action: &'a Expr = &self.action;
        let outer = ctx.clone();
        let card = action.cardinality();
        if card.is_exactly_one() {
            Ok(Box::new(ItemMappingIterator::new(base, move |item| {
                let mut c = outer.clone();
                c.set_local_item(slot, item);
                match action.evaluate_item(&c)? {
                    Some(out) => Ok(Some(out)),
                    None => Err(Error::from_code(
                        ErrorCode::XPTY0004,
                        "empty sequence returned where exactly one item is required",
                    )),
                }
            })))
        } else if card.at_most_one() {
            Ok(Box::new(ItemMappingIterator::new(base, move |item| {
                let mut c = outer.clone();
                c.set_local_item(slot, item);
                action.evaluate_item(&c)
            })))
        } else {
            Ok(Box::new(MappingIterator::new(base, move |item| {
                let mut c = outer.clone();
                c.set_local_item(slot, item);
                action.iterate(&c)
            })))
        }
    }
}

/// Every reference to `slot` sits where the focus is still the outer one.
fn references_outside_focus(e: &Expr, slot: SlotId) -> bool {
    e.children().into_iter().enumerate().all(|(i, c)| {
        if e.focus_setting_child(i) {
            !c.references_slot(slot)
        } else {
            references_outside_focus(c, slot)
        }
    })
}

fn is_loop_invariant(e: &Expr, slot: SlotId, inner: &[SlotId]) -> bool {
    let trivial = matches!(
        e,
        Expr::Literal(_)
            | Expr::VarRef(_)
            | Expr::ContextItem(_)
            | Expr::Position
            | Expr::Last
            | Expr::IsLast(_)
            | Expr::Axis(_)
    );
    !trivial
        && e.is_non_creative()
        && !e.depends_on_focus()
        && !e.references_slot(slot)
        && inner.iter().all(|s| !e.references_slot(*s))
}

fn hoist(e: Expr, slot: SlotId, inner: &[SlotId], out: &mut Vec<LetExpr>) -> Result<Expr, Error> {
    if is_loop_invariant(&e, slot, inner) {
        let var = VarBinding::new(format!("inv{}", out.len()));
        let mut reference = VariableRef::local(&var);
        reference.static_type = e.sequence_type();
        out.push(LetExpr::new(var, e, Expr::empty()));
        return Ok(Expr::VarRef(reference));
    }
    e.try_map_children(&mut |c| hoist(c, slot, inner, out))
}

/// Nest `body` inside the hoisted bindings, first binding outermost.
fn wrap_lets(body: Expr, lets: Vec<LetExpr>) -> Expr {
    lets.into_iter().rev().fold(body, |action, l| {
        Expr::Let(LetExpr {
            action: Box::new(action),
            ..l
        })
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct LetExpr {
    pub var: VarBinding,
    pub sequence: Box<Expr>,
    pub action: Box<Expr>,
}

impl LetExpr {
    pub fn new(var: VarBinding, sequence: Expr, action: Expr) -> Self {
        Self {
            var,
            sequence: Box::new(sequence),
            action: Box::new(action),
        }
    }

    pub(crate) fn type_check(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let sequence = self.sequence.type_check(v)?;
        let mut action = *self.action;
        action.bind_variable_type(self.var.slot, sequence.sequence_type());
        let action = action.type_check(v)?;
        Ok(Expr::Let(LetExpr::new(self.var, sequence, action)))
    }

    pub(crate) fn optimize(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let l = LetExpr::new(self.var, self.sequence.optimize(v)?, self.action.optimize(v)?);
        let slot = l.var.slot;
        if !l.action.references_slot(slot) {
            let out = (*l.action).clone();
            v.trace("let-unused", &Expr::Let(l), &out);
            return Ok(out);
        }
        if l.sequence.as_literal().is_some() {
            let out = (*l.action).clone().replace_variable(slot, &l.sequence)?.optimize(v)?;
            v.trace("let-inline", &Expr::Let(l), &out);
            return Ok(out);
        }
        Ok(Expr::Let(l))
    }

    /// The bound value is computed on first use and then shared.
    pub fn iterate<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<BoxedIter<'a, N>, Error> {
        let mut inner = ctx.clone();
        inner.bind_lazy(self.var.slot, &self.sequence, ctx.clone());
        self.action.iterate(&inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::runtime::{DynamicContext, DynamicContextBuilder, StaticContextBuilder};
    use crate::expr::{ArithmeticOp, ComparisonOp, SystemFunction, compile, compile_with_context, evaluate};
    use crate::simple_node::SimpleNode;
    use crate::xdm::{ExpandedName, XdmAtomicValue, XdmItem};

    fn run(e: &Expr) -> Vec<XdmItem<SimpleNode>> {
        evaluate(e, &DynamicContext::default()).expect("evaluate")
    }

    fn ints(values: &[i64]) -> Vec<XdmItem<SimpleNode>> {
        values
            .iter()
            .map(|i| XdmItem::Atomic(XdmAtomicValue::Integer(*i)))
            .collect()
    }

    #[test]
    fn returning_the_range_variable_is_the_source() {
        let s = ExpandedName::local("s");
        let sc = StaticContextBuilder::new().with_variable(s.clone()).build();
        let x = VarBinding::new("x");
        let out = compile_with_context(Expr::for_in(x.clone(), Expr::external_var(s), Expr::var(&x)), &sc)
            .expect("compile");
        assert!(matches!(out, Expr::VarRef(ref r) if r.target == VarTarget::External), "{out:?}");
    }

    #[test]
    fn single_item_source_is_bound_once_and_inlined() {
        let x = VarBinding::new("x");
        let e = Expr::for_in(
            x.clone(),
            Expr::integer(5),
            Expr::arithmetic(Expr::var(&x), ArithmeticOp::Add, Expr::integer(1)),
        );
        assert_eq!(compile(e).expect("compile").as_integer_literal(), Some(6));
    }

    #[test]
    fn invariant_operand_moves_out_of_the_loop() {
        let s = ExpandedName::local("s");
        let sc = StaticContextBuilder::new().with_variable(s.clone()).build();
        let i = VarBinding::new("i");
        let e = Expr::for_in(
            i.clone(),
            Expr::range(Expr::integer(1), Expr::integer(3)),
            Expr::sequence(vec![
                Expr::var(&i),
                Expr::call(SystemFunction::Count, vec![Expr::external_var(s.clone())]),
            ]),
        );
        let out = compile_with_context(e, &sc).expect("compile");
        let Expr::Let(l) = &out else {
            panic!("expected a let around the loop, got {out:?}");
        };
        assert!(matches!(&*l.action, Expr::For(_)));

        let dc = DynamicContextBuilder::<SimpleNode>::new()
            .with_variable(s, ints(&[7, 8]))
            .build();
        assert_eq!(evaluate(&out, &dc).expect("evaluate"), ints(&[1, 2, 2, 2, 3, 2]));
    }

    #[test]
    fn where_clause_becomes_a_filter() {
        let i = VarBinding::new("i");
        let even = Expr::value_compare(
            Expr::arithmetic(Expr::var(&i), ArithmeticOp::Mod, Expr::integer(2)),
            ComparisonOp::Eq,
            Expr::integer(0),
        );
        let e = Expr::for_in(
            i.clone(),
            Expr::range(Expr::integer(1), Expr::integer(10)),
            Expr::if_then_else(even, Expr::var(&i), Expr::empty()),
        );
        let out = compile(e).expect("compile");
        assert!(matches!(out, Expr::Filter(_)), "{out:?}");
        assert_eq!(run(&out), ints(&[2, 4, 6, 8, 10]));
    }

    #[test]
    fn loop_over_many_items_maps_each() {
        let i = VarBinding::new("i");
        let e = Expr::for_in(
            i.clone(),
            Expr::range(Expr::integer(1), Expr::integer(4)),
            Expr::arithmetic(Expr::var(&i), ArithmeticOp::Mul, Expr::var(&i)),
        );
        let out = compile(e).expect("compile");
        assert!(matches!(out, Expr::For(_)));
        assert_eq!(run(&out), ints(&[1, 4, 9, 16]));
    }

    #[test]
    fn unused_let_disappears() {
        let x = VarBinding::new("x");
        let e = Expr::let_in(x, Expr::range(Expr::integer(1), Expr::integer(3)), Expr::string("k"));
        assert_eq!(compile(e).expect("compile"), Expr::string("k"));
    }
}
