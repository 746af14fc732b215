//! Atomization: replacing nodes by their typed values.

use crate::engine::context::XPathContext;
use crate::engine::runtime::{Error, ErrorCode, SourceLocation};
use crate::expr::{Expr, ExpressionVisitor, ForExpr, LetExpr};
use crate::iter::{BoxedIter, get_atomizing_iterator};
use crate::model::XdmNode;
use crate::types::{Cardinality, ItemType, NodeKindSet, TypeHierarchy};

#[derive(Debug, Clone, PartialEq)]
pub struct Atomizer {
    pub operand: Box<Expr>,
    /// Every node is known to be untyped (no schema in play).
    pub untyped: bool,
    pub loc: Option<SourceLocation>,
}

impl Atomizer {
    pub fn new(operand: Expr) -> Self {
        let loc = operand.location();
        Self {
            operand: Box::new(operand),
            untyped: true,
            loc,
        }
    }

    /// Atomized item type for an operand of type `operand`.
    pub fn atomized_type(operand: &ItemType, untyped: bool) -> ItemType {
        match operand {
            ItemType::Atomic(_) | ItemType::Empty => *operand,
            ItemType::Node(nt) => {
                if let Some(t) = nt.typed_content
                    && !untyped
                {
                    return ItemType::Atomic(t);
                }
                let kinds = nt.kinds;
                let mut result: Option<ItemType> = None;
                let mut join = |t: ItemType| {
                    result = Some(match result {
                        None => t,
                        Some(prev) => TypeHierarchy.common_super_type(&prev, &t),
                    });
                };
                if kinds.intersects(NodeKindSet::STRING_KINDS) {
                    join(ItemType::STRING);
                }
                if kinds.intersects(NodeKindSet::UNTYPED_KINDS) {
                    join(ItemType::UNTYPED_ATOMIC);
                }
                if kinds.intersects(NodeKindSet::ELEMENT | NodeKindSet::ATTRIBUTE) {
                    join(if untyped { ItemType::UNTYPED_ATOMIC } else { ItemType::ANY_ATOMIC });
                }
                result.unwrap_or(ItemType::ANY_ATOMIC)
            }
            ItemType::AnyItem | ItemType::Function | ItemType::External => ItemType::ANY_ATOMIC,
        }
    }

    pub fn item_type(&self) -> ItemType {
        Self::atomized_type(&self.operand.item_type(), self.untyped)
    }

    /// Each operand item yields exactly one atomic value.
    pub fn is_single_valued(&self) -> bool {
        match self.operand.item_type() {
            ItemType::Node(nt) => {
                self.untyped || nt.typed_content.is_some() || !nt.kinds.intersects(NodeKindSet::ELEMENT | NodeKindSet::ATTRIBUTE)
            }
            ItemType::AnyItem => self.untyped,
            _ => true,
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        if self.is_single_valued() {
            self.operand.cardinality()
        } else {
            Cardinality::ZERO_OR_MORE
        }
    }

    pub(crate) fn type_check(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let operand = self.operand.type_check(v)?;
        Self::wrap(operand, v, self.loc)
    }

    /// Atomizer over an already type-checked operand; atomic operands are
    /// returned unchanged.
    pub(crate) fn wrap(operand: Expr, v: &ExpressionVisitor<'_>, loc: Option<SourceLocation>) -> Result<Expr, Error> {
        match operand.item_type() {
            ItemType::Atomic(_) | ItemType::Empty => Ok(operand),
            ItemType::Function if !operand.cardinality().allows_zero() => Err(Error::static_err(
                ErrorCode::FOTY0013,
                "cannot atomize a function item",
                loc,
            )),
            _ => Ok(Expr::Atomizer(Atomizer {
                operand: Box::new(operand),
                untyped: !v.static_ctx.schema_aware,
                loc,
            })),
        }
    }

    pub(crate) fn optimize(self, v: &ExpressionVisitor<'_>) -> Result<Expr, Error> {
        let operand = self.operand.optimize(v)?;
        if matches!(operand.item_type(), ItemType::Atomic(_) | ItemType::Empty) {
            return Ok(operand);
        }
        let untyped = self.untyped;
        let loc = self.loc;
        let push = |e: Expr| -> Result<Expr, Error> {
            Atomizer {
                operand: Box::new(e),
                untyped,
                loc,
            }
            .optimize(v)
        };
        let before = Expr::Atomizer(Atomizer {
            operand: Box::new(operand.clone()),
            untyped,
            loc,
        });
        let out = match operand {
            Expr::Let(l) => Expr::Let(LetExpr {
                action: Box::new(push(*l.action)?),
                ..l
            }),
            Expr::For(f) => Expr::For(ForExpr {
                action: Box::new(push(*f.action)?),
                ..f
            }),
            Expr::Choose(mut c) => {
                c.then = Box::new(push(*c.then)?);
                c.otherwise = Box::new(push(*c.otherwise)?);
                Expr::Choose(c)
            }
            Expr::Block(items) => Expr::Block(items.into_iter().map(&push).collect::<Result<_, _>>()?),
            _ => return Ok(before),
        };
        v.trace("atomize-push-down", &before, &out);
        Ok(out)
    }

    pub fn iterate<'a, N: XdmNode>(&'a self, ctx: &XPathContext<'a, N>) -> Result<BoxedIter<'a, N>, Error> {
        get_atomizing_iterator(self.operand.iterate(ctx)?).map_err(|e| e.at(self.loc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AtomicType, NodeType};
    use rstest::rstest;

    #[rstest]
    #[case::comment(NodeKindSet::COMMENT, true, ItemType::STRING)]
    #[case::namespace_and_pi(NodeKindSet::NAMESPACE | NodeKindSet::PROCESSING_INSTRUCTION, false, ItemType::STRING)]
    #[case::text_always_untyped(NodeKindSet::TEXT, false, ItemType::UNTYPED_ATOMIC)]
    #[case::document_always_untyped(NodeKindSet::DOCUMENT, false, ItemType::UNTYPED_ATOMIC)]
    #[case::element_untyped(NodeKindSet::ELEMENT, true, ItemType::UNTYPED_ATOMIC)]
    #[case::element_schema_aware(NodeKindSet::ELEMENT, false, ItemType::ANY_ATOMIC)]
    #[case::mixed_kinds(NodeKindSet::all(), true, ItemType::ANY_ATOMIC)]
    fn atomized_item_types(#[case] kinds: NodeKindSet, #[case] untyped: bool, #[case] expected: ItemType) {
        let t = ItemType::Node(NodeType::with_kinds(kinds));
        assert_eq!(Atomizer::atomized_type(&t, untyped), expected);
    }

    #[test]
    fn typed_content_gives_single_valued_atomizer() {
        let node = NodeType {
            kinds: NodeKindSet::ELEMENT,
            typed_content: Some(AtomicType::Integer),
        };
        assert_eq!(Atomizer::atomized_type(&ItemType::Node(node), false), ItemType::INTEGER);
        assert_eq!(Atomizer::atomized_type(&ItemType::Node(node), true), ItemType::UNTYPED_ATOMIC);
    }
}
