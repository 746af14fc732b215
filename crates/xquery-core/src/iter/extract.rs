//! Consumers and positional slicing over iterators.

use super::{BoxedIter, IterProps, IterState, SequenceIterator, XdmItemResult, delegate_state};
use crate::engine::runtime::{Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::XdmItem;

pub fn first_item<N: XdmNode>(mut it: BoxedIter<'_, N>) -> Result<Option<XdmItem<N>>, Error> {
    let first = it.next_item().transpose();
    it.close();
    first
}

/// The only item of `it`. A second item is an XPTY0004 error, unless the
/// iterator itself reports an error when asked for it.
pub fn single_item<N: XdmNode>(mut it: BoxedIter<'_, N>) -> Result<Option<XdmItem<N>>, Error> {
    let Some(first) = it.next_item().transpose()? else {
        return Ok(None);
    };
    let second = it.next_item().transpose();
    it.close();
    match second? {
        None => Ok(Some(first)),
        Some(_) => Err(Error::from_code(
            ErrorCode::XPTY0004,
            "a sequence of more than one item is not allowed here",
        )),
    }
}

pub fn last_item<N: XdmNode>(mut it: BoxedIter<'_, N>) -> Result<Option<XdmItem<N>>, Error> {
    if it.properties().contains(IterProps::REVERSIBLE)
        && let Some(rev) = it.reverse()
    {
        return first_item(rev);
    }
    let mut last = None;
    while let Some(item) = it.next_item() {
        last = Some(item?);
    }
    Ok(last)
}

/// Number of items, using the known length when the iterator has one.
pub fn count_items<N: XdmNode>(mut it: BoxedIter<'_, N>) -> Result<usize, Error> {
    if it.properties().contains(IterProps::LAST_POSITION_FINDER)
        && let Some(n) = it.length()
    {
        return Ok(n);
    }
    let mut n = 0usize;
    while let Some(item) = it.next_item() {
        item?;
        n += 1;
    }
    Ok(n)
}

pub fn materialize<N: XdmNode>(mut it: BoxedIter<'_, N>) -> Result<Vec<XdmItem<N>>, Error> {
    let mut out = Vec::with_capacity(it.length().unwrap_or(0));
    while let Some(item) = it.next_item() {
        out.push(item?);
    }
    Ok(out)
}

/// Items of `base` from 1-based position `start` onwards.
pub struct TailIterator<'a, N> {
    base: BoxedIter<'a, N>,
    start: usize,
    skipped: bool,
    state: IterState<N>,
}

impl<'a, N: XdmNode> TailIterator<'a, N> {
    pub fn new(base: BoxedIter<'a, N>, start: usize) -> Self {
        Self {
            base,
            start: start.max(1),
            skipped: false,
            state: IterState::default(),
        }
    }
}

impl<'a, N: XdmNode> SequenceIterator<'a, N> for TailIterator<'a, N> {
    delegate_state!();

    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        if self.state.is_finished() {
            return None;
        }
        if !self.skipped {
            self.skipped = true;
            for _ in 1..self.start {
                match self.base.next_item() {
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return self.state.record(Some(Err(e))),
                    None => return self.state.record(None),
                }
            }
        }
        let next = self.base.next_item();
        self.state.record(next)
    }

    fn get_another(&self) -> Result<BoxedIter<'a, N>, Error> {
        Ok(Box::new(TailIterator::new(self.base.get_another()?, self.start)))
    }

    fn properties(&self) -> IterProps {
        self.base.properties() & IterProps::LAST_POSITION_FINDER
    }

    fn length(&self) -> Option<usize> {
        self.base.length().map(|n| n.saturating_sub(self.start - 1))
    }

    fn close(&mut self) {
        self.base.close();
        self.state.finish();
    }
}

/// Items at 1-based positions `start .. start + length`. Stops pulling from
/// the base as soon as the window is complete.
pub struct SubsequenceIterator<'a, N> {
    inner: TailIterator<'a, N>,
    limit: Option<usize>,
    emitted: usize,
    state: IterState<N>,
}

impl<'a, N: XdmNode> SubsequenceIterator<'a, N> {
    pub fn new(base: BoxedIter<'a, N>, start: usize, limit: Option<usize>) -> Self {
        Self {
            inner: TailIterator::new(base, start),
            limit,
            emitted: 0,
            state: IterState::default(),
        }
    }
}

impl<'a, N: XdmNode> SequenceIterator<'a, N> for SubsequenceIterator<'a, N> {
    delegate_state!();

    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        if self.state.is_finished() {
            return None;
        }
        if self.limit.is_some_and(|l| self.emitted >= l) {
            self.inner.close();
            return self.state.record(None);
        }
        let next = self.inner.next_item();
        if matches!(next, Some(Ok(_))) {
            self.emitted += 1;
        }
        self.state.record(next)
    }

    fn get_another(&self) -> Result<BoxedIter<'a, N>, Error> {
        Ok(Box::new(SubsequenceIterator {
            inner: TailIterator::new(self.inner.base.get_another()?, self.inner.start),
            limit: self.limit,
            emitted: 0,
            state: IterState::default(),
        }))
    }

    fn properties(&self) -> IterProps {
        self.inner.properties()
    }

    fn length(&self) -> Option<usize> {
        let available = self.inner.length()?;
        Some(self.limit.map_or(available, |l| available.min(l)))
    }

    fn close(&mut self) {
        self.inner.close();
        self.state.finish();
    }
}

/// `$node intersect E` when the left side is a single node: yields the node
/// once if the base contains it.
pub struct SingletonIntersectIterator<'a, N> {
    node: N,
    base: BoxedIter<'a, N>,
    state: IterState<N>,
}

impl<'a, N: XdmNode> SingletonIntersectIterator<'a, N> {
    pub fn new(node: N, base: BoxedIter<'a, N>) -> Self {
        Self {
            node,
            base,
            state: IterState::default(),
        }
    }
}

impl<'a, N: XdmNode> SequenceIterator<'a, N> for SingletonIntersectIterator<'a, N> {
    delegate_state!();

    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        if self.state.is_finished() || self.state.position() > 0 {
            self.base.close();
            return self.state.record(None);
        }
        while let Some(item) = self.base.next_item() {
            match item {
                Ok(XdmItem::Node(n)) if n == self.node => {
                    self.base.close();
                    return self.state.record(Some(Ok(XdmItem::Node(n))));
                }
                Ok(_) => {}
                Err(e) => return self.state.record(Some(Err(e))),
            }
        }
        self.state.record(None)
    }

    fn get_another(&self) -> Result<BoxedIter<'a, N>, Error> {
        Ok(Box::new(SingletonIntersectIterator::new(
            self.node.clone(),
            self.base.get_another()?,
        )))
    }

    fn close(&mut self) {
        self.base.close();
        self.state.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iter::{RangeIterator, ReverseRangeIterator};
    use crate::simple_node::SimpleNode;
    use crate::xdm::XdmAtomicValue;

    fn range(a: i64, b: i64) -> BoxedIter<'static, SimpleNode> {
        Box::new(RangeIterator::new(a, b))
    }

    fn ints(items: Vec<XdmItem<SimpleNode>>) -> Vec<i64> {
        items
            .into_iter()
            .filter_map(|i| match i {
                XdmItem::Atomic(XdmAtomicValue::Integer(v)) => Some(v),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn tail_skips_leading_items() {
        let out = materialize(Box::new(TailIterator::new(range(1, 5), 3))).expect("tail");
        assert_eq!(ints(out), vec![3, 4, 5]);
        let it = TailIterator::new(range(1, 5), 9);
        assert_eq!(SequenceIterator::length(&it), Some(0));
    }

    #[test]
    fn single_item_rejects_a_second_item() {
        assert_eq!(single_item(range(1, 0)).expect("empty"), None);
        assert_eq!(ints(single_item(range(7, 7)).expect("one").into_iter().collect()), vec![7]);
        let err = single_item(range(1, 2)).expect_err("two items");
        assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
        // first_item stops after one item
        assert!(first_item(range(1, 2)).expect("first").is_some());
    }

    #[test]
    fn subsequence_window() {
        let out = materialize(Box::new(SubsequenceIterator::new(range(1, 10), 4, Some(3)))).expect("window");
        assert_eq!(ints(out), vec![4, 5, 6]);
    }

    #[test]
    fn count_uses_known_length() {
        assert_eq!(count_items(range(1, 1_000_000_000)).expect("count"), 1_000_000_000);
    }

    #[test]
    fn last_item_via_reverse() {
        let last = last_item(Box::new(ReverseRangeIterator::<SimpleNode>::new(9, 3))).expect("last");
        assert_eq!(last, Some(XdmItem::Atomic(XdmAtomicValue::Integer(3))));
    }
}
