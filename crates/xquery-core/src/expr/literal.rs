//! Constant sequences.

use super::{BoxedIter, Error};
use crate::iter::{IterProps, IterState, RangeIterator, SequenceIterator, XdmItemResult, delegate_state};
use crate::model::XdmNode;
use crate::types::{Cardinality, ItemType, TypeHierarchy};
use crate::xdm::{XdmAtomicValue, XdmItem};

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Atomics(Vec<XdmAtomicValue>),
    /// Closed integer range with `start < end`.
    Range { start: i64, end: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: LiteralValue,
}

impl Literal {
    pub fn empty() -> Self {
        Self::atomics(Vec::new())
    }

    pub fn atomics(values: Vec<XdmAtomicValue>) -> Self {
        Self {
            value: LiteralValue::Atomics(values),
        }
    }

    /// Literal for `start to end`, normalized to an empty or singleton
    /// sequence when the range has fewer than two members.
    pub fn range(start: i64, end: i64) -> Self {
        match start.cmp(&end) {
            core::cmp::Ordering::Greater => Self::empty(),
            core::cmp::Ordering::Equal => Self::atomics(vec![XdmAtomicValue::Integer(start)]),
            core::cmp::Ordering::Less => Self {
                value: LiteralValue::Range { start, end },
            },
        }
    }

    pub fn len(&self) -> usize {
        match &self.value {
            LiteralValue::Atomics(v) => v.len(),
            LiteralValue::Range { start, end } => {
                usize::try_from(i128::from(*end) - i128::from(*start) + 1).unwrap_or(usize::MAX)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(&self.value, LiteralValue::Atomics(v) if v.is_empty())
    }

    /// The only member of a one-item literal.
    pub fn single(&self) -> Option<&XdmAtomicValue> {
        match &self.value {
            LiteralValue::Atomics(v) if v.len() == 1 => v.first(),
            _ => None,
        }
    }

    pub fn item_type(&self) -> ItemType {
        match &self.value {
            LiteralValue::Range { .. } => ItemType::INTEGER,
            LiteralValue::Atomics(values) => {
                let th = TypeHierarchy;
                values
                    .iter()
                    .map(|v| ItemType::Atomic(v.atomic_type()))
                    .reduce(|a, b| th.common_super_type(&a, &b))
                    .unwrap_or(ItemType::Empty)
            }
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        Cardinality::from_count(self.len())
    }

    pub fn iterate<'a, N: XdmNode>(&'a self) -> BoxedIter<'a, N> {
        match &self.value {
            LiteralValue::Atomics(values) => Box::new(LiteralIterator::new(values, false)),
            LiteralValue::Range { start, end } => Box::new(RangeIterator::new(*start, *end)),
        }
    }
}

/// Iterates a literal's values in place, forwards or backwards.
struct LiteralIterator<'a, N> {
    values: &'a [XdmAtomicValue],
    reversed: bool,
    index: usize,
    state: IterState<N>,
}

impl<'a, N: XdmNode> LiteralIterator<'a, N> {
    fn new(values: &'a [XdmAtomicValue], reversed: bool) -> Self {
        Self {
            values,
            reversed,
            index: 0,
            state: IterState::default(),
        }
    }
}

impl<'a, N: XdmNode> SequenceIterator<'a, N> for LiteralIterator<'a, N> {
    delegate_state!();

    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        if self.state.is_finished() {
            return None;
        }
        let at = if self.reversed {
            self.values.len().checked_sub(self.index + 1)
        } else {
            Some(self.index)
        };
        let next = at
            .and_then(|i| self.values.get(i))
            .map(|v| Ok(XdmItem::Atomic(v.clone())));
        self.index += 1;
        self.state.record(next)
    }

    fn get_another(&self) -> Result<BoxedIter<'a, N>, Error> {
        Ok(Box::new(LiteralIterator::new(self.values, self.reversed)))
    }

    fn properties(&self) -> IterProps {
        IterProps::all()
    }

    fn length(&self) -> Option<usize> {
        Some(self.values.len())
    }

    fn has_next(&self) -> Option<bool> {
        Some(!self.state.is_finished() && self.index < self.values.len())
    }

    fn reverse(&self) -> Option<BoxedIter<'a, N>> {
        Some(Box::new(LiteralIterator::new(self.values, !self.reversed)))
    }

    fn close(&mut self) {
        self.state.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iter::{last_item, materialize};
    use crate::simple_node::SimpleNode;

    #[test]
    fn range_literal_normalizes_short_ranges() {
        assert!(Literal::range(3, 2).is_empty());
        assert_eq!(Literal::range(4, 4).single(), Some(&XdmAtomicValue::Integer(4)));
        assert_eq!(Literal::range(1, 5).len(), 5);
        assert_eq!(Literal::range(1, 5).cardinality(), Cardinality::ALLOWS_MANY);
    }

    #[test]
    fn literal_iterator_reverses_in_place() -> Result<(), Error> {
        let lit = Literal::atomics(vec![XdmAtomicValue::Integer(1), XdmAtomicValue::Integer(2)]);
        let it: BoxedIter<'_, SimpleNode> = lit.iterate();
        assert_eq!(last_item(it)?, Some(XdmItem::Atomic(XdmAtomicValue::Integer(2))));
        let it: BoxedIter<'_, SimpleNode> = lit.iterate();
        let rev = it.reverse().map(materialize).transpose()?;
        assert_eq!(
            rev,
            Some(vec![
                XdmItem::Atomic(XdmAtomicValue::Integer(2)),
                XdmItem::Atomic(XdmAtomicValue::Integer(1)),
            ])
        );
        Ok(())
    }

    #[test]
    fn item_type_is_common_supertype() {
        let lit = Literal::atomics(vec![XdmAtomicValue::Integer(1), XdmAtomicValue::Double(2.0)]);
        assert_eq!(lit.item_type(), ItemType::Atomic(crate::types::AtomicType::Numeric));
        assert_eq!(Literal::empty().item_type(), ItemType::Empty);
    }
}
