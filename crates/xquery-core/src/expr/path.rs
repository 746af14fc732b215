//! Axis steps, path expressions, filters and positional shortcuts.

use core::cmp::Ordering;
use core::fmt;

use crate::engine::context::XPathContext;
use crate::engine::runtime::{Error, ErrorCode};
use crate::expr::{Expr, ExpressionVisitor, SpecialProps};
use crate::iter::{
    self, BoxedIter, IterState, ListIterator, SequenceIterator, XdmItemResult, delegate_state, materialize,
};
use crate::model::{NodeKind, XdmNode};
use crate::types::{AtomicType, Cardinality, ItemType, NodeKindSet, NodeType};
use crate::xdm::{ExpandedName, XdmItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Attribute,
    SelfAxis,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
}

impl Axis {
    pub fn name(self) -> &'static str {
        match self {
            Axis::Child => "child",
            Axis::Descendant => "descendant",
            Axis::DescendantOrSelf => "descendant-or-self",
            Axis::Attribute => "attribute",
            Axis::SelfAxis => "self",
            Axis::Parent => "parent",
            Axis::Ancestor => "ancestor",
            Axis::AncestorOrSelf => "ancestor-or-self",
            Axis::FollowingSibling => "following-sibling",
            Axis::PrecedingSibling => "preceding-sibling",
        }
    }

    /// Applied to distinct nodes of one level, results never overlap and
    /// stay in document order.
    pub fn preserves_peers(self) -> bool {
        matches!(self, Axis::Child | Axis::Attribute | Axis::SelfAxis)
    }

    fn principal_kind(self) -> NodeKindSet {
        if self == Axis::Attribute {
            NodeKindSet::ATTRIBUTE
        } else {
            NodeKindSet::ELEMENT
        }
    }

    fn reachable_kinds(self) -> NodeKindSet {
        match self {
            Axis::Attribute => NodeKindSet::ATTRIBUTE,
            Axis::Child | Axis::Descendant | Axis::FollowingSibling | Axis::PrecedingSibling => {
                NodeKindSet::ELEMENT
                    | NodeKindSet::TEXT
                    | NodeKindSet::COMMENT
                    | NodeKindSet::PROCESSING_INSTRUCTION
            }
            Axis::Parent | Axis::Ancestor => NodeKindSet::ELEMENT | NodeKindSet::DOCUMENT,
            Axis::SelfAxis | Axis::DescendantOrSelf | Axis::AncestorOrSelf => NodeKindSet::all(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// `node()`
    AnyNode,
    Kind(NodeKindSet),
    /// `*`: any node of the axis' principal kind.
    Wildcard,
    Name(ExpandedName),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisStep {
    pub axis: Axis,
    pub test: NodeTest,
}

impl AxisStep {
    fn test_kinds(&self) -> NodeKindSet {
        match &self.test {
            NodeTest::AnyNode => NodeKindSet::all(),
            NodeTest::Kind(k) => *k,
            NodeTest::Wildcard | NodeTest::Name(_) => self.axis.principal_kind(),
        }
    }

    pub fn item_type(&self) -> ItemType {
        let kinds = self.axis.reachable_kinds() & self.test_kinds();
        if kinds.is_empty() {
            ItemType::Empty
        } else {
            ItemType::Node(NodeType::with_kinds(kinds))
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        if self.item_type() == ItemType::Empty {
            return Cardinality::EMPTY;
        }
        match self.axis {
            Axis::SelfAxis | Axis::Parent => Cardinality::ZERO_OR_ONE,
            _ => Cardinality::ZERO_OR_MORE,
        }
    }

    pub(crate) fn type_check(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        match v.context_item_type {
            None => Err(Error::static_err(
                ErrorCode::XPDY0002,
                format!("the context item for axis step {self} is absent"),
                None,
            )),
            Some(t @ (ItemType::Atomic(_) | ItemType::Function | ItemType::External)) => Err(Error::static_err(
                ErrorCode::XPTY0004,
                format!("axis step {self} cannot be used here: the context item is of type {t}, not a node"),
                None,
            )),
            Some(_) => Ok(Expr::Axis(self)),
        }
    }

    fn matches<N: XdmNode>(&self, node: &N) -> bool {
        let kind = node.kind();
        if !self.test_kinds().intersects(NodeKindSet::of(&kind)) {
            return false;
        }
        match &self.test {
            NodeTest::Name(name) => node.name().is_some_and(|q| {
                q.local == name.local && q.ns_uri.as_deref().filter(|s| !s.is_empty()) == name.ns_uri.as_deref()
            }),
            _ => true,
        }
    }

    /// Nodes on this axis from `origin`, in document order.
    fn select<N: XdmNode>(&self, origin: &N) -> Vec<N> {
        let mut out = Vec::new();
        match self.axis {
            Axis::Child => out = origin.children(),
            Axis::Attribute => out = origin.attributes(),
            Axis::SelfAxis => out.push(origin.clone()),
            Axis::Parent => out.extend(origin.parent()),
            Axis::Descendant => collect_descendants(origin, &mut out),
            Axis::DescendantOrSelf => {
                out.push(origin.clone());
                collect_descendants(origin, &mut out);
            }
            Axis::Ancestor | Axis::AncestorOrSelf => {
                if self.axis == Axis::AncestorOrSelf {
                    out.push(origin.clone());
                }
                let mut cur = origin.parent();
                while let Some(p) = cur {
                    cur = p.parent();
                    out.push(p);
                }
                out.reverse();
            }
            Axis::FollowingSibling | Axis::PrecedingSibling => {
                if matches!(origin.kind(), NodeKind::Attribute | NodeKind::Namespace) {
                    return out;
                }
                if let Some(parent) = origin.parent() {
                    let siblings = parent.children();
                    if let Some(at) = siblings.iter().position(|n| n == origin) {
                        out = if self.axis == Axis::FollowingSibling {
                            siblings[at + 1..].to_vec()
                        } else {
                            siblings[..at].to_vec()
                        };
                    }
                }
            }
        }
        out.retain(|n| self.matches(n));
        out
    }

    pub fn iterate<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<BoxedIter<'a, N>, Error> {
        match ctx.context_item()? {
            XdmItem::Node(origin) => {
                let nodes = self.select(origin);
                Ok(iter::from_vec(nodes.into_iter().map(XdmItem::Node).collect()))
            }
            other => Err(Error::from_code(
                ErrorCode::XPTY0004,
                format!("axis step {self} requires a node as context item, found {other:?}"),
            )),
        }
    }
}

fn collect_descendants<N: XdmNode>(node: &N, out: &mut Vec<N>) {
    for child in node.children() {
        out.push(child.clone());
        collect_descendants(&child, out);
    }
}

impl fmt::Display for AxisStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::", self.axis.name())?;
        match &self.test {
            NodeTest::AnyNode => f.write_str("node()"),
            NodeTest::Wildcard => f.write_str("*"),
            NodeTest::Name(n) => write!(f, "{n}"),
            NodeTest::Kind(k) => write!(f, "{}", ItemType::Node(NodeType::with_kinds(*k))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextItemExpr {
    pub static_type: ItemType,
}

impl Default for ContextItemExpr {
    fn default() -> Self {
        Self {
            static_type: ItemType::AnyItem,
        }
    }
}

/// `position() = last()` when `condition`, else `position() != last()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsLastExpr {
    pub condition: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TailExpr {
    pub base: Box<Expr>,
    /// 1-based position of the first retained item.
    pub start: usize,
}

impl TailExpr {
    pub fn cardinality(&self) -> Cardinality {
        let base = self.base.cardinality();
        if self.start <= 1 {
            base
        } else if base.at_most_one() {
            Cardinality::EMPTY
        } else {
            Cardinality::ZERO_OR_MORE
        }
    }
}

/// `start/step`: `step` is evaluated once per item of `start` with that item
/// as focus. As a simple step, `start` yields at most one item and `step` is
/// an axis step.
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    pub start: Box<Expr>,
    pub step: Box<Expr>,
}

/// Whether a path selects nodes that are pairwise unrelated by ancestry.
pub(crate) fn is_peer_path(expr: &Expr) -> bool {
    match expr {
        Expr::Axis(a) => a.axis.preserves_peers(),
        Expr::Slash(p) | Expr::SimpleStep(p) => {
            matches!(&*p.step, Expr::Axis(a) if a.axis.preserves_peers())
                && (p.start.cardinality().at_most_one() || is_peer_path(&p.start))
        }
        _ => false,
    }
}

impl PathExpr {
    pub fn new(start: Expr, step: Expr) -> Self {
        Self {
            start: Box::new(start),
            step: Box::new(step),
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        self.start.cardinality().multiply(self.step.cardinality())
    }

    fn check_operands(self, v: &ExpressionVisitor<'_>) -> Result<Self, Error> {
        let start = self.start.type_check(v)?;
        let start_type = start.item_type();
        if matches!(start_type, ItemType::Atomic(_) | ItemType::Function | ItemType::External)
            && !start.cardinality().is_empty_only()
        {
            return Err(Error::static_err(
                ErrorCode::XPTY0004,
                format!("the first operand of '/' must be a node sequence, found {start_type}"),
                start.location(),
            ));
        }
        let step = self.step.type_check(&v.with_context_item(start_type))?;
        Ok(Self::new(start, step))
    }

    pub(crate) fn type_check(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let p = self.check_operands(v)?;
        if p.start.is_empty_literal() {
            return Ok(Expr::empty());
        }
        Ok(Expr::Slash(p))
    }

    pub(crate) fn type_check_simple(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let p = self.check_operands(v)?;
        if p.start.is_empty_literal() {
            return Ok(Expr::empty());
        }
        if p.qualifies_as_simple_step() {
            Ok(Expr::SimpleStep(p))
        } else {
            Ok(Expr::Slash(p))
        }
    }

    fn qualifies_as_simple_step(&self) -> bool {
        self.start.cardinality().at_most_one() && matches!(&*self.step, Expr::Axis(_))
    }

    fn optimize_operands(self, v: &ExpressionVisitor<'_>) -> Result<Self, Error> {
        let start = self.start.optimize(v)?;
        let step = self.step.optimize(&v.with_context_item(start.item_type()))?;
        Ok(Self::new(start, step))
    }

    pub(crate) fn optimize(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let p = self.optimize_operands(v)?;
        if p.start.is_empty_literal() || p.step.is_empty_literal() {
            return Ok(Expr::empty());
        }
        if p.qualifies_as_simple_step() {
            let out = Expr::SimpleStep(p.clone());
            v.trace("simple-step", &Expr::Slash(p), &out);
            return Ok(out);
        }
        Ok(Expr::Slash(p))
    }

    pub(crate) fn optimize_simple(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let p = self.optimize_operands(v)?;
        if p.qualifies_as_simple_step() {
            Ok(Expr::SimpleStep(p))
        } else {
            Ok(Expr::Slash(p))
        }
    }

    pub fn iterate<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<BoxedIter<'a, N>, Error> {
        let base = self.start.iterate(ctx)?;
        let needs_size = self.step.special_properties().contains(SpecialProps::LAST_DEPENDENT);
        let base: BoxedIter<'a, N> = if needs_size && base.length().is_none() {
            Box::new(ListIterator::from_vec(materialize(base)?))
        } else {
            base
        };
        let size = base.length();
        let mapped = Box::new(StepIterator::new(base, &self.step, ctx.clone(), size));
        let naturally_sorted = self.start.cardinality().at_most_one()
            && self.step.special_properties().contains(SpecialProps::ORDERED_NODESET);
        match self.step.item_type() {
            ItemType::Atomic(_) | ItemType::Function | ItemType::External | ItemType::Empty => Ok(mapped),
            _ if naturally_sorted => Ok(mapped),
            _ => Ok(iter::from_vec(sort_document_order(materialize(mapped)?)?)),
        }
    }

    pub fn iterate_simple<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<BoxedIter<'a, N>, Error> {
        let Some(item) = self.start.evaluate_item(ctx)? else {
            return Ok(iter::empty());
        };
        let mut inner = ctx.clone();
        inner.set_focus(item, 1, Some(1));
        self.step.iterate(&inner)
    }
}

/// Sort nodes into document order without duplicates. A result made only of
/// non-nodes is returned unchanged; a mixture is a type error.
pub(crate) fn sort_document_order<N: XdmNode>(items: Vec<XdmItem<N>>) -> Result<Vec<XdmItem<N>>, Error> {
    let node_count = items.iter().filter(|i| matches!(i, XdmItem::Node(_))).count();
    if node_count == 0 {
        return Ok(items);
    }
    if node_count != items.len() {
        return Err(Error::from_code(
            ErrorCode::XPTY0004,
            "the result of a path expression cannot mix nodes and atomic values",
        ));
    }
    let mut nodes: Vec<N> = items.into_iter().filter_map(|i| i.as_node().cloned()).collect();
    let mut failure = None;
    nodes.sort_by(|a, b| match a.compare_document_order(b) {
        Ok(o) => o,
        Err(e) => {
            failure.get_or_insert(e);
            Ordering::Equal
        }
    });
    if let Some(e) = failure {
        return Err(e);
    }
    nodes.dedup();
    Ok(nodes.into_iter().map(XdmItem::Node).collect())
}

/// Evaluates `step` for each base item with that item, its position and the
/// base size (when known) as focus, concatenating the results.
struct StepIterator<'a, N> {
    base: BoxedIter<'a, N>,
    step: &'a Expr,
    ctx: XPathContext<'a, N>,
    size: Option<usize>,
    position: usize,
    inner: Option<BoxedIter<'a, N>>,
    state: IterState<N>,
}

impl<'a, N: XdmNode> StepIterator<'a, N> {
    fn new(base: BoxedIter<'a, N>, step: &'a Expr, ctx: XPathContext<'a, N>, size: Option<usize>) -> Self {
        Self {
            base,
            step,
            ctx,
            size,
            position: 0,
            inner: None,
            state: IterState::default(),
        }
    }

    fn advance(&mut self) -> Option<XdmItemResult<N>> {
        loop {
            if let Some(inner) = self.inner.as_mut() {
                match inner.next_item() {
                    Some(r) => return Some(r),
                    None => self.inner = None,
                }
            }
            let item = match self.base.next_item()? {
                Ok(item) => item,
                Err(e) => return Some(Err(e)),
            };
            self.position += 1;
            self.ctx.set_focus(item, self.position, self.size);
            match self.step.iterate(&self.ctx) {
                Ok(it) => self.inner = Some(it),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl<'a, N: XdmNode> SequenceIterator<'a, N> for StepIterator<'a, N> {
    delegate_state!();

    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        if self.state.is_finished() {
            return None;
        }
        let next = self.advance();
        self.state.record(next)
    }

    fn get_another(&self) -> Result<BoxedIter<'a, N>, Error> {
        Ok(Box::new(StepIterator::new(
            self.base.get_another()?,
            self.step,
            self.ctx.clone(),
            self.size,
        )))
    }

    fn close(&mut self) {
        if let Some(inner) = self.inner.as_mut() {
            inner.close();
        }
        self.base.close();
        self.state.finish();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpr {
    pub base: Box<Expr>,
    pub predicate: Box<Expr>,
}

fn is_numeric_type(t: &ItemType) -> bool {
    matches!(t, ItemType::Atomic(a) if a.is_numeric())
}

impl FilterExpr {
    pub fn new(base: Expr, predicate: Expr) -> Self {
        Self {
            base: Box::new(base),
            predicate: Box::new(predicate),
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        let base = self.base.cardinality();
        if base.is_empty_only() {
            Cardinality::EMPTY
        } else if is_numeric_type(&self.predicate.item_type())
            && self.predicate.cardinality().at_most_one()
            && !self.predicate.depends_on_focus()
        {
            // a single position, fixed for the whole filter
            Cardinality::ZERO_OR_ONE
        } else if base.allows_many() {
            Cardinality::ZERO_OR_MORE
        } else {
            base | Cardinality::ALLOWS_ZERO
        }
    }

    pub(crate) fn type_check(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let base = self.base.type_check(v)?;
        if base.is_empty_literal() {
            return Ok(Expr::empty());
        }
        let predicate = self.predicate.type_check(&v.with_context_item(base.item_type()))?;
        Ok(Expr::Filter(FilterExpr::new(base, predicate)))
    }

    pub(crate) fn optimize(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let base = self.base.optimize(v)?;
        if base.is_empty_literal() {
            return Ok(Expr::empty());
        }
        let predicate = self.predicate.optimize(&v.with_context_item(base.item_type()))?;
        let before = Expr::Filter(FilterExpr::new(base, predicate));
        let Expr::Filter(FilterExpr { base, predicate }) = &before else {
            return Ok(before);
        };
        let rewritten = match &**predicate {
            p if p.as_integer_literal() == Some(1) => Some(Expr::FirstItem(base.clone())),
            p if p.as_integer_literal().is_some_and(|n| n > 1) => {
                let n = p.as_integer_literal().and_then(|n| usize::try_from(n).ok());
                n.map(|n| Expr::FirstItem(Box::new(Expr::tail((**base).clone(), n))))
            }
            Expr::Last | Expr::IsLast(IsLastExpr { condition: true }) => Some(Expr::LastItem(base.clone())),
            p if p.as_boolean_literal() == Some(true) => Some((**base).clone()),
            p if p.item_type() == ItemType::BOOLEAN && !p.depends_on_focus() => Some(Expr::if_then_else(
                (**predicate).clone(),
                (**base).clone(),
                Expr::empty(),
            )),
            _ => None,
        };
        match rewritten {
            Some(out) => {
                v.trace("filter", &before, &out);
                Ok(out)
            }
            None => Ok(before),
        }
    }

    pub fn iterate<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<BoxedIter<'a, N>, Error> {
        let base = self.base.iterate(ctx)?;
        let needs_size = self.predicate.special_properties().contains(SpecialProps::LAST_DEPENDENT);
        let base: BoxedIter<'a, N> = if needs_size && base.length().is_none() {
            Box::new(ListIterator::from_vec(materialize(base)?))
        } else {
            base
        };
        let size = base.length();
        Ok(Box::new(FilterIterator {
            base,
            predicate: &self.predicate,
            ctx: ctx.clone(),
            size,
            position: 0,
            state: IterState::default(),
        }))
    }
}

/// Numeric predicate values select by position, anything else by its
/// effective boolean value.
fn predicate_matches<'a, N: XdmNode>(
    predicate: &'a Expr,
    ctx: &XPathContext<'a, N>,
    position: usize,
) -> Result<bool, Error> {
    #[allow(clippy::cast_precision_loss)]
    let pos = position as f64;
    let ty = predicate.item_type();
    if is_numeric_type(&ty) {
        return Ok(predicate.evaluate_atomic(ctx)?.and_then(|v| v.as_f64()) == Some(pos));
    }
    if matches!(ty, ItemType::Node(_) | ItemType::Atomic(AtomicType::Boolean)) {
        return predicate.effective_boolean_value(ctx);
    }
    let items = materialize(predicate.iterate(ctx)?)?;
    if let [XdmItem::Atomic(a)] = items.as_slice()
        && a.atomic_type().is_numeric()
    {
        return Ok(a.as_f64() == Some(pos));
    }
    crate::expr::effective_boolean_value(iter::from_vec(items))
}

struct FilterIterator<'a, N> {
    base: BoxedIter<'a, N>,
    predicate: &'a Expr,
    ctx: XPathContext<'a, N>,
    size: Option<usize>,
    position: usize,
    state: IterState<N>,
}

impl<'a, N: XdmNode> FilterIterator<'a, N> {
    fn advance(&mut self) -> Option<XdmItemResult<N>> {
        loop {
            let item = match self.base.next_item()? {
                Ok(item) => item,
                Err(e) => return Some(Err(e)),
            };
            self.position += 1;
            self.ctx.set_focus(item.clone(), self.position, self.size);
            match predicate_matches(self.predicate, &self.ctx, self.position) {
                Ok(true) => return Some(Ok(item)),
                Ok(false) => {}
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl<'a, N: XdmNode> SequenceIterator<'a, N> for FilterIterator<'a, N> {
    delegate_state!();

    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        if self.state.is_finished() {
            return None;
        }
        let next = self.advance();
        self.state.record(next)
    }

    fn get_another(&self) -> Result<BoxedIter<'a, N>, Error> {
        Ok(Box::new(FilterIterator {
            base: self.base.get_another()?,
            predicate: self.predicate,
            ctx: self.ctx.clone(),
            size: self.size,
            position: 0,
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
    use crate::engine::runtime::DynamicContextBuilder;
    use crate::simple_node::{SimpleNode, attr, elem, text};

    fn names(items: &[XdmItem<SimpleNode>]) -> Vec<String> {
        items
            .iter()
            .filter_map(|i| i.as_node())
            .map(|n| n.name().map(|q| q.local).unwrap_or_default())
            .collect()
    }

    #[test]
    fn descendant_axis_is_in_document_order() -> Result<(), Error> {
        let root = elem("a")
            .child(elem("b").child(elem("c")))
            .child(elem("d"))
            .child(text("t"))
            .build();
        let dc = DynamicContextBuilder::new().with_context_node(root).build();
        let step = AxisStep {
            axis: Axis::Descendant,
            test: NodeTest::Wildcard,
        };
        let ctx = XPathContext::new(&dc);
        let items = materialize(step.iterate(&ctx)?)?;
        assert_eq!(names(&items), vec!["b", "c", "d"]);
        Ok(())
    }

    #[test]
    fn attribute_axis_matches_by_name() -> Result<(), Error> {
        let root = elem("a").attr(attr("id", "1")).attr(attr("x", "2")).build();
        let dc = DynamicContextBuilder::new().with_context_node(root).build();
        let step = AxisStep {
            axis: Axis::Attribute,
            test: NodeTest::Name(ExpandedName::local("x")),
        };
        let ctx = XPathContext::new(&dc);
        let items = materialize(step.iterate(&ctx)?)?;
        assert_eq!(names(&items), vec!["x"]);
        Ok(())
    }

    #[test]
    fn axis_step_item_type_narrows_to_axis_kinds() {
        let parent = AxisStep {
            axis: Axis::Parent,
            test: NodeTest::AnyNode,
        };
        assert_eq!(
            parent.item_type(),
            ItemType::Node(NodeType::with_kinds(NodeKindSet::ELEMENT | NodeKindSet::DOCUMENT))
        );
        let impossible = AxisStep {
            axis: Axis::Attribute,
            test: NodeTest::Kind(NodeKindSet::TEXT),
        };
        assert_eq!(impossible.cardinality(), Cardinality::EMPTY);
    }

    #[test]
    fn peer_paths() {
        let child = Expr::axis(Axis::Child, NodeTest::Wildcard);
        let desc = Expr::axis(Axis::Descendant, NodeTest::Wildcard);
        assert!(is_peer_path(&Expr::path(child.clone(), child.clone())));
        assert!(!is_peer_path(&Expr::path(desc, child)));
    }

    #[rstest::rstest]
    #[case::constant_position(Expr::integer(2), Cardinality::ZERO_OR_ONE)]
    #[case::position(Expr::Position, Cardinality::ZERO_OR_MORE)]
    #[case::before_last(
        Expr::arithmetic(Expr::Last, crate::expr::ArithmeticOp::Sub, Expr::integer(1)),
        Cardinality::ZERO_OR_MORE
    )]
    #[case::numeric_context_item(
        Expr::ContextItem(ContextItemExpr { static_type: ItemType::INTEGER }),
        Cardinality::ZERO_OR_MORE
    )]
    fn filter_cardinality_follows_predicate_focus(#[case] predicate: Expr, #[case] expected: Cardinality) {
        let base = Expr::Literal(crate::expr::Literal::range(1, 5));
        assert_eq!(FilterExpr::new(base, predicate).cardinality(), expected);
    }
}
