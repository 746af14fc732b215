//! Implicit conversions and checks inserted by static type checking.

use crate::convert::Converter;
use crate::engine::context::XPathContext;
use crate::engine::runtime::{Error, ErrorCode, SourceLocation};
use crate::expr::{Atomizer, Expr, ExpressionVisitor};
use crate::iter::{
    BoxedIter, IterState, ItemMappingIterator, SequenceIterator, XdmItemResult, delegate_state,
};
use crate::model::XdmNode;
use crate::types::{AtomicType, Cardinality, ItemType, NodeKindSet, SequenceType, TypeRelation};
use crate::xdm::XdmItem;

/// Make `expr` acceptable where `required` is expected.
///
/// Atomizes when an atomic type is required, converts untyped values,
/// promotes numerics, and wraps the result in a runtime check where the
/// static type only overlaps the required one. A provable mismatch is a
/// static XPTY0004.
pub fn static_type_check(
    expr: Expr,
    required: SequenceType,
    role: &str,
    v: &ExpressionVisitor<'_>,
) -> Result<Expr, Error> {
    let loc = expr.location();
    let mut expr = expr;

    if expr.cardinality().is_empty_only() {
        if required.cardinality.allows_zero() {
            return Ok(expr);
        }
        return Err(Error::static_err(
            ErrorCode::XPTY0004,
            format!("an empty sequence is not allowed as the {role}"),
            loc,
        ));
    }

    if let ItemType::Atomic(target) = required.item_type {
        if !expr.item_type().is_atomic() {
            expr = Atomizer::wrap(expr, v, loc)?;
        }
        let supplied = expr.item_type().atomic_type().unwrap_or(AtomicType::AnyAtomic);
        if matches!(supplied, AtomicType::UntypedAtomic | AtomicType::AnyAtomic)
            && !matches!(target, AtomicType::UntypedAtomic | AtomicType::AnyAtomic)
        {
            expr = Expr::UntypedConvert(UntypedAtomicConverter::new(expr, target, v));
        }
        let supplied = expr.item_type().atomic_type().unwrap_or(AtomicType::AnyAtomic);
        let promotable = match target {
            AtomicType::Double => supplied.is_numeric(),
            AtomicType::Float => matches!(supplied, AtomicType::Integer | AtomicType::Decimal),
            _ => false,
        };
        if promotable
            && supplied != target
            && let Some(converter) = v.rules.converter(supplied, target)
        {
            expr = Expr::Convert(AtomicSequenceConverter::new(expr, target, converter));
        }
    }

    let supplied = expr.item_type();
    let item_check = match v.th.relationship(&supplied, &required.item_type) {
        TypeRelation::Same | TypeRelation::Subsumed => None,
        TypeRelation::Subsumes | TypeRelation::Overlaps => Some(required.item_type),
        TypeRelation::Disjoint => {
            if expr.cardinality().allows_zero() {
                v.warn(
                    &format!(
                        "the {role} has type {supplied} but {} is required; only an empty value can succeed",
                        required.item_type
                    ),
                    loc,
                );
                Some(required.item_type)
            } else {
                return Err(Error::static_err(
                    ErrorCode::XPTY0004,
                    format!("required item type of the {role} is {}, supplied value has item type {supplied}", required.item_type),
                    loc,
                ));
            }
        }
    };

    let card = expr.cardinality();
    if required.cardinality.subsumes(card) && item_check.is_none() {
        return Ok(expr);
    }
    if (card & required.cardinality).is_empty() {
        return Err(Error::static_err(
            ErrorCode::XPTY0004,
            format!(
                "required cardinality of the {role} is {}, supplied value has cardinality {card}",
                required.cardinality
            ),
            loc,
        ));
    }
    Ok(Expr::CardinalityCheck(CardinalityChecker {
        operand: Box::new(expr),
        required: required.cardinality,
        item_check,
        role: role.to_string(),
        loc,
    }))
}

/// Converts every atomic item to `target` with a fixed converter.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicSequenceConverter {
    pub operand: Box<Expr>,
    pub target: AtomicType,
    pub converter: Converter,
    pub loc: Option<SourceLocation>,
}

impl AtomicSequenceConverter {
    pub fn new(operand: Expr, target: AtomicType, converter: Converter) -> Self {
        let loc = operand.location();
        Self {
            operand: Box::new(operand),
            target,
            converter,
            loc,
        }
    }

    pub(crate) fn optimize(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let operand = self.operand.optimize(v)?;
        if self.converter == Converter::Identity {
            return Ok(operand);
        }
        if let Some(value) = operand.as_single_atomic() {
            // failures surface at run time
            if let Ok(converted) = self.converter.convert(value.clone()) {
                let out = Expr::atomic(converted);
                v.trace("convert-constant", &operand, &out);
                return Ok(out);
            }
        }
        Ok(Expr::Convert(AtomicSequenceConverter {
            operand: Box::new(operand),
            ..self
        }))
    }

    pub fn iterate<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<BoxedIter<'a, N>, Error> {
        let converter = &self.converter;
        let loc = self.loc;
        Ok(Box::new(ItemMappingIterator::new(self.operand.iterate(ctx)?, move |item| match item {
            XdmItem::Atomic(a) => converter
                .convert(a)
                .map(|c| Some(XdmItem::Atomic(c)))
                .map_err(|f| Error::from(f).at(loc)),
            other => Ok(Some(other)),
        })))
    }
}

/// Converts `xs:untypedAtomic` items to `target`, passing other items through.
#[derive(Debug, Clone, PartialEq)]
pub struct UntypedAtomicConverter {
    pub operand: Box<Expr>,
    pub target: AtomicType,
    pub converter: Converter,
}

impl UntypedAtomicConverter {
    pub fn new(operand: Expr, target: AtomicType, v: &ExpressionVisitor<'_>) -> Self {
        Self {
            operand: Box::new(operand),
            target,
            converter: v.rules.untyped_converter(target),
        }
    }

    pub fn item_type(&self) -> ItemType {
        let target = match self.target {
            AtomicType::Numeric => AtomicType::Double,
            t => t,
        };
        match self.operand.item_type() {
            ItemType::Atomic(AtomicType::UntypedAtomic) => ItemType::Atomic(target),
            ItemType::Atomic(AtomicType::AnyAtomic) => ItemType::ANY_ATOMIC,
            other => other,
        }
    }

    pub(crate) fn optimize(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let operand = self.operand.optimize(v)?;
        if !matches!(
            operand.item_type(),
            ItemType::Atomic(AtomicType::UntypedAtomic | AtomicType::AnyAtomic)
        ) {
            v.trace("untyped-convert-noop", &operand, &operand);
            return Ok(operand);
        }
        if let Some(value) = operand.as_single_atomic()
            && let Ok(converted) = self.converter.convert(value.clone())
        {
            let out = Expr::atomic(converted);
            v.trace("convert-constant", &operand, &out);
            return Ok(out);
        }
        Ok(Expr::UntypedConvert(UntypedAtomicConverter {
            operand: Box::new(operand),
            ..self
        }))
    }

    pub fn iterate<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<BoxedIter<'a, N>, Error> {
        let converter = &self.converter;
        Ok(Box::new(ItemMappingIterator::new(self.operand.iterate(ctx)?, move |item| match item {
            XdmItem::Atomic(a) => converter.convert(a).map(|c| Some(XdmItem::Atomic(c))).map_err(Error::from),
            other => Ok(Some(other)),
        })))
    }
}

/// Run-time check of the number of items and, optionally, of their type.
#[derive(Debug, Clone, PartialEq)]
pub struct CardinalityChecker {
    pub operand: Box<Expr>,
    pub required: Cardinality,
    pub item_check: Option<ItemType>,
    pub role: String,
    pub loc: Option<SourceLocation>,
}

impl CardinalityChecker {
    pub(crate) fn optimize(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let operand = self.operand.optimize(v)?;
        let type_ok = self
            .item_check
            .is_none_or(|t| v.th.is_subtype(&operand.item_type(), &t));
        if type_ok && self.required.subsumes(operand.cardinality()) {
            v.trace("check-redundant", &operand, &operand);
            return Ok(operand);
        }
        Ok(Expr::CardinalityCheck(CardinalityChecker {
            operand: Box::new(operand),
            item_check: if type_ok { None } else { self.item_check },
            ..self
        }))
    }

    pub fn iterate<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<BoxedIter<'a, N>, Error> {
        let base = self.operand.iterate(ctx)?;
        if self.required == Cardinality::ZERO_OR_MORE && self.item_check.is_none() {
            return Ok(base);
        }
        Ok(Box::new(CheckingIterator {
            base,
            check: self,
            count: 0,
            state: IterState::default(),
        }))
    }
}

fn item_matches<N: XdmNode>(item: &XdmItem<N>, required: &ItemType) -> bool {
    let th = crate::types::TypeHierarchy;
    match (item, required) {
        (_, ItemType::AnyItem) => true,
        (XdmItem::Atomic(a), _) => th.is_subtype(&ItemType::Atomic(a.atomic_type()), required),
        (XdmItem::Node(n), ItemType::Node(nt)) => nt.kinds.contains(NodeKindSet::of(&n.kind())),
        (XdmItem::Function(_), ItemType::Function) | (XdmItem::External(_), ItemType::External) => true,
        _ => false,
    }
}

struct CheckingIterator<'a, N> {
    base: BoxedIter<'a, N>,
    check: &'a CardinalityChecker,
    count: usize,
    state: IterState<N>,
}

impl<N: XdmNode> CheckingIterator<'_, N> {
    fn fail(&self, message: String) -> Option<XdmItemResult<N>> {
        Some(Err(Error::from_code(ErrorCode::XPTY0004, message).at(self.check.loc)))
    }

    fn advance(&mut self) -> Option<XdmItemResult<N>> {
        match self.base.next_item() {
            None => {
                if self.count == 0 && !self.check.required.allows_zero() {
                    return self.fail(format!("an empty sequence is not allowed as the {}", self.check.role));
                }
                None
            }
            Some(Err(e)) => Some(Err(e)),
            Some(Ok(item)) => {
                self.count += 1;
                if self.count > 1 && !self.check.required.allows_many() {
                    return self.fail(format!(
                        "a sequence of more than one item is not allowed as the {}",
                        self.check.role
                    ));
                }
                if let Some(t) = &self.check.item_check
                    && !item_matches(&item, t)
                {
                    return self.fail(format!(
                        "required item type of the {} is {t}, supplied value {item:?} does not match",
                        self.check.role
                    ));
                }
                Some(Ok(item))
            }
        }
    }
}

impl<'a, N: XdmNode> SequenceIterator<'a, N> for CheckingIterator<'a, N> {
    delegate_state!();

    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        if self.state.is_finished() {
            return None;
        }
        let next = self.advance();
        self.state.record(next)
    }

    fn get_another(&self) -> Result<BoxedIter<'a, N>, Error> {
        Ok(Box::new(CheckingIterator {
            base: self.base.get_another()?,
            check: self.check,
            count: 0,
            state: IterState::default(),
        }))
    }

    fn close(&mut self) {
        self.base.close();
        self.state.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::runtime::StaticContext;

    #[test]
    fn empty_literal_rejected_where_one_is_required() {
        let sc = StaticContext::default();
        let v = ExpressionVisitor::new(&sc);
        let err = static_type_check(
            Expr::empty(),
            SequenceType::new(ItemType::INTEGER, Cardinality::EXACTLY_ONE),
            "first argument of f()",
            &v,
        )
        .err();
        assert_eq!(err.map(|e| e.code_enum()), Some(ErrorCode::XPTY0004));
    }

    #[test]
    fn disjoint_item_type_is_a_static_error() {
        let sc = StaticContext::default();
        let v = ExpressionVisitor::new(&sc);
        let err = static_type_check(Expr::string("a"), SequenceType::OPTIONAL_INTEGER, "operand", &v)
            .err()
            .map(|e| (e.code_enum(), e.is_static()));
        assert_eq!(err, Some((ErrorCode::XPTY0004, true)));
    }

    #[test]
    fn many_where_one_allowed_gets_a_checker() -> Result<(), Error> {
        let sc = StaticContext::default();
        let v = ExpressionVisitor::new(&sc);
        let seq = Expr::range(Expr::integer(1), Expr::external_var(crate::xdm::ExpandedName::local("n")));
        let checked = static_type_check(seq, SequenceType::OPTIONAL_INTEGER, "operand", &v)?;
        assert!(matches!(checked, Expr::CardinalityCheck(_)));
        Ok(())
    }

    #[test]
    fn integer_promoted_to_double() -> Result<(), Error> {
        let sc = StaticContext::default();
        let v = ExpressionVisitor::new(&sc);
        let checked = static_type_check(
            Expr::integer(2),
            SequenceType::new(ItemType::Atomic(AtomicType::Double), Cardinality::EXACTLY_ONE),
            "operand",
            &v,
        )?;
        assert_eq!(checked.item_type(), ItemType::Atomic(AtomicType::Double));
        Ok(())
    }
}
