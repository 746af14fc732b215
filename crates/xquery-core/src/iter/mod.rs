//! Pull-based iteration over XDM sequences.
//!
//! Every iterator keeps the item it last returned and its 1-based position;
//! position 0 means "not started" and -1 means "exhausted". Iterators advertise
//! optional capabilities through [`IterProps`] so callers can take O(1) paths
//! (length known up front, cheap reversal, one-item lookahead).

use std::sync::Arc;

use bitflags::bitflags;

use crate::engine::runtime::Error;
use crate::model::XdmNode;
use crate::xdm::XdmItem;

pub mod atomizing;
pub mod extract;
pub mod mapping;
pub mod range;

pub use atomizing::{AtomizingIterator, atomize_item, get_atomizing_iterator};
pub use extract::{
    SingletonIntersectIterator, SubsequenceIterator, TailIterator, count_items, first_item, last_item,
    materialize, single_item,
};
pub use mapping::{ItemMappingIterator, MappingIterator};
pub use range::{RangeIterator, ReverseRangeIterator};

pub type XdmItemResult<N> = Result<XdmItem<N>, Error>;
pub type BoxedIter<'a, N> = Box<dyn SequenceIterator<'a, N> + 'a>;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IterProps: u8 {
        /// Every item is available without evaluating anything: a
        /// materialized value or an integer range.
        const GROUNDED = 1;
        /// `has_next` answers without consuming.
        const LOOKAHEAD = 1 << 1;
        /// `length` is known without iterating.
        const LAST_POSITION_FINDER = 1 << 2;
        /// `reverse` is available.
        const REVERSIBLE = 1 << 3;
    }
}

pub trait SequenceIterator<'a, N> {
    /// Advance and return the next item. `None` once exhausted; after that the
    /// iterator keeps returning `None`.
    fn next_item(&mut self) -> Option<XdmItemResult<N>>;

    /// Item most recently returned by `next_item`, `None` before the first call
    /// and after exhaustion.
    fn current(&self) -> Option<&XdmItem<N>>;

    /// 0 before the first item, 1-based while iterating, -1 after the end.
    fn position(&self) -> isize;

    /// A fresh iterator over the same sequence, positioned at the start.
    fn get_another(&self) -> Result<BoxedIter<'a, N>, Error>;

    fn properties(&self) -> IterProps {
        IterProps::empty()
    }

    /// Total number of items, when `LAST_POSITION_FINDER` is set.
    fn length(&self) -> Option<usize> {
        None
    }

    /// Whether another item follows, when `LOOKAHEAD` is set.
    fn has_next(&self) -> Option<bool> {
        None
    }

    /// Iterator over the same items in reverse order, when `REVERSIBLE` is set.
    fn reverse(&self) -> Option<BoxedIter<'a, N>> {
        None
    }

    /// Release resources early. Further `next_item` calls return `None`.
    fn close(&mut self) {}
}

/// Current item and position bookkeeping shared by all iterators.
#[derive(Debug, Clone)]
pub struct IterState<N> {
    current: Option<XdmItem<N>>,
    position: isize,
}

impl<N> Default for IterState<N> {
    fn default() -> Self {
        Self {
            current: None,
            position: 0,
        }
    }
}

impl<N: Clone> IterState<N> {
    pub fn current(&self) -> Option<&XdmItem<N>> {
        self.current.as_ref()
    }

    pub fn position(&self) -> isize {
        self.position
    }

    pub fn is_finished(&self) -> bool {
        self.position < 0
    }

    /// Record the outcome of one advance step and hand it back.
    ///
    /// An error also finishes the iterator.
    pub fn record(&mut self, next: Option<XdmItemResult<N>>) -> Option<XdmItemResult<N>> {
        match next {
            Some(Ok(item)) => {
                self.position += 1;
                self.current = Some(item.clone());
                Some(Ok(item))
            }
            Some(Err(e)) => {
                self.finish();
                Some(Err(e))
            }
            None => {
                self.finish();
                None
            }
        }
    }

    pub fn finish(&mut self) {
        self.current = None;
        self.position = -1;
    }
}

macro_rules! delegate_state {
    () => {
        fn current(&self) -> Option<&$crate::xdm::XdmItem<N>> {
            self.state.current()
        }

        fn position(&self) -> isize {
            self.state.position()
        }
    };
}
pub(crate) use delegate_state;

pub struct EmptyIterator<N> {
    state: IterState<N>,
}

impl<N> EmptyIterator<N> {
    pub fn new() -> Self {
        Self {
            state: IterState::default(),
        }
    }
}

impl<N> Default for EmptyIterator<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, N: XdmNode> SequenceIterator<'a, N> for EmptyIterator<N> {
    delegate_state!();

    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        self.state.record(None)
    }

    fn get_another(&self) -> Result<BoxedIter<'a, N>, Error> {
        Ok(Box::new(EmptyIterator::new()))
    }

    fn properties(&self) -> IterProps {
        IterProps::all()
    }

    fn length(&self) -> Option<usize> {
        Some(0)
    }

    fn has_next(&self) -> Option<bool> {
        Some(false)
    }

    fn reverse(&self) -> Option<BoxedIter<'a, N>> {
        Some(Box::new(EmptyIterator::new()))
    }
}

/// Iterator over a materialized sequence; clones of it share the storage.
pub struct ListIterator<N> {
    items: Arc<[XdmItem<N>]>,
    index: usize,
    /// Walk the storage from the end.
    backwards: bool,
    state: IterState<N>,
}

impl<N: XdmNode> ListIterator<N> {
    pub fn new(items: Arc<[XdmItem<N>]>) -> Self {
        Self {
            items,
            index: 0,
            backwards: false,
            state: IterState::default(),
        }
    }

    fn with_direction(items: Arc<[XdmItem<N>]>, backwards: bool) -> Self {
        Self {
            backwards,
            ..Self::new(items)
        }
    }

    pub fn from_vec(items: Vec<XdmItem<N>>) -> Self {
        Self::new(Arc::from(items))
    }

    pub fn singleton(item: XdmItem<N>) -> Self {
        Self::from_vec(vec![item])
    }
}

impl<'a, N: XdmNode> SequenceIterator<'a, N> for ListIterator<N> {
    delegate_state!();

    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        if self.state.is_finished() {
            return None;
        }
        let slot = if self.backwards {
            self.items.len().checked_sub(self.index + 1)
        } else {
            Some(self.index)
        };
        let next = slot.and_then(|i| self.items.get(i)).cloned().map(Ok);
        self.index += 1;
        self.state.record(next)
    }

    fn get_another(&self) -> Result<BoxedIter<'a, N>, Error> {
        Ok(Box::new(ListIterator::with_direction(self.items.clone(), self.backwards)))
    }

    fn properties(&self) -> IterProps {
        IterProps::all()
    }

    fn length(&self) -> Option<usize> {
        Some(self.items.len())
    }

    fn has_next(&self) -> Option<bool> {
        Some(!self.state.is_finished() && self.index < self.items.len())
    }

    fn reverse(&self) -> Option<BoxedIter<'a, N>> {
        Some(Box::new(ListIterator::with_direction(self.items.clone(), !self.backwards)))
    }

    fn close(&mut self) {
        self.state.finish();
    }
}

/// Boxed iterator over nothing.
pub fn empty<'a, N: XdmNode>() -> BoxedIter<'a, N> {
    Box::new(EmptyIterator::new())
}

/// Boxed iterator over exactly one item.
pub fn singleton<'a, N: XdmNode>(item: XdmItem<N>) -> BoxedIter<'a, N> {
    Box::new(ListIterator::singleton(item))
}

/// Boxed iterator over zero or one item.
pub fn optional<'a, N: XdmNode>(item: Option<XdmItem<N>>) -> BoxedIter<'a, N> {
    match item {
        Some(i) => singleton(i),
        None => empty(),
    }
}

pub fn from_vec<'a, N: XdmNode>(items: Vec<XdmItem<N>>) -> BoxedIter<'a, N> {
    if items.is_empty() {
        empty()
    } else {
        Box::new(ListIterator::from_vec(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple_node::SimpleNode;
    use crate::xdm::XdmAtomicValue;

    fn int(i: i64) -> XdmItem<SimpleNode> {
        XdmItem::Atomic(XdmAtomicValue::Integer(i))
    }

    #[test]
    fn list_iterator_tracks_position() {
        let mut it = ListIterator::from_vec(vec![int(1), int(2)]);
        assert_eq!(SequenceIterator::position(&it), 0);
        assert!(it.next_item().is_some());
        assert_eq!(SequenceIterator::position(&it), 1);
        assert!(it.next_item().is_some());
        assert_eq!(it.has_next(), Some(false));
        assert!(it.next_item().is_none());
        assert_eq!(SequenceIterator::position(&it), -1);
        assert!(SequenceIterator::current(&it).is_none());
        assert!(it.next_item().is_none());
    }

    fn drain(it: &mut dyn SequenceIterator<'_, SimpleNode>) -> Vec<i64> {
        let mut out = Vec::new();
        while let Some(Ok(XdmItem::Atomic(XdmAtomicValue::Integer(i)))) = it.next_item() {
            out.push(i);
        }
        out
    }

    #[test]
    fn list_reverse_shares_storage_and_walks_back() {
        let it = ListIterator::from_vec(vec![int(1), int(2), int(3)]);
        let mut rev = it.reverse().expect("reversible");
        assert_eq!(rev.length(), Some(3));
        assert_eq!(drain(rev.as_mut()), vec![3, 2, 1]);
        let again = ListIterator::from_vec(vec![int(1), int(2), int(3)]).reverse().expect("reversible");
        let mut copy = again.get_another().expect("another");
        assert_eq!(drain(copy.as_mut()), vec![3, 2, 1]);
        let mut fwd = again.reverse().expect("reversible");
        assert_eq!(drain(fwd.as_mut()), vec![1, 2, 3]);
    }

    #[test]
    fn empty_iterator_is_finished_after_one_call() {
        let mut it: EmptyIterator<SimpleNode> = EmptyIterator::new();
        assert_eq!(SequenceIterator::length(&it), Some(0));
        assert!(it.next_item().is_none());
        assert_eq!(SequenceIterator::position(&it), -1);
    }
}
