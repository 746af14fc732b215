//! Integer range iterators backing `a to b`.

use super::{BoxedIter, IterProps, IterState, SequenceIterator, XdmItemResult, delegate_state};
use crate::engine::runtime::Error;
use crate::model::XdmNode;
use crate::xdm::{XdmAtomicValue, XdmItem};

/// Number of integers in `low..=high`, saturating at `usize::MAX`.
fn span(low: i64, high: i64) -> usize {
    if low > high {
        return 0;
    }
    let n = i128::from(high) - i128::from(low) + 1;
    usize::try_from(n).unwrap_or(usize::MAX)
}

/// Ascending integers `start..=end`; empty when `start > end`.
pub struct RangeIterator<N> {
    start: i64,
    end: i64,
    next: Option<i64>,
    state: IterState<N>,
}

impl<N: XdmNode> RangeIterator<N> {
    pub fn new(start: i64, end: i64) -> Self {
        Self {
            start,
            end,
            next: (start <= end).then_some(start),
            state: IterState::default(),
        }
    }
}

impl<'a, N: XdmNode> SequenceIterator<'a, N> for RangeIterator<N> {
    delegate_state!();

    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        if self.state.is_finished() {
            return None;
        }
        let out = self.next.map(|v| {
            self.next = if v < self.end { Some(v + 1) } else { None };
            Ok(XdmItem::Atomic(XdmAtomicValue::Integer(v)))
        });
        self.state.record(out)
    }

    fn get_another(&self) -> Result<BoxedIter<'a, N>, Error> {
        Ok(Box::new(RangeIterator::new(self.start, self.end)))
    }

    fn properties(&self) -> IterProps {
        IterProps::GROUNDED | IterProps::LOOKAHEAD | IterProps::LAST_POSITION_FINDER | IterProps::REVERSIBLE
    }

    fn length(&self) -> Option<usize> {
        Some(span(self.start, self.end))
    }

    fn has_next(&self) -> Option<bool> {
        Some(self.next.is_some())
    }

    fn reverse(&self) -> Option<BoxedIter<'a, N>> {
        Some(Box::new(ReverseRangeIterator::new(self.end, self.start)))
    }

    fn close(&mut self) {
        self.next = None;
        self.state.finish();
    }
}

/// Descending integers from `start` down to `end`; empty when `start < end`.
pub struct ReverseRangeIterator<N> {
    start: i64,
    end: i64,
    next: Option<i64>,
    state: IterState<N>,
}

impl<N: XdmNode> ReverseRangeIterator<N> {
    pub fn new(start: i64, end: i64) -> Self {
        Self {
            start,
            end,
            next: (start >= end).then_some(start),
            state: IterState::default(),
        }
    }

    /// Forward iterator over the same integers, without materializing anything.
    pub fn get_reverse_iterator(&self) -> RangeIterator<N> {
        RangeIterator::new(self.end, self.start)
    }
}

impl<'a, N: XdmNode> SequenceIterator<'a, N> for ReverseRangeIterator<N> {
    delegate_state!();

    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        if self.state.is_finished() {
            return None;
        }
        let out = self.next.map(|v| {
            self.next = if v > self.end { Some(v - 1) } else { None };
            Ok(XdmItem::Atomic(XdmAtomicValue::Integer(v)))
        });
        self.state.record(out)
    }

    fn get_another(&self) -> Result<BoxedIter<'a, N>, Error> {
        Ok(Box::new(ReverseRangeIterator::new(self.start, self.end)))
    }

    fn properties(&self) -> IterProps {
        IterProps::GROUNDED | IterProps::LOOKAHEAD | IterProps::LAST_POSITION_FINDER | IterProps::REVERSIBLE
    }

    fn length(&self) -> Option<usize> {
        Some(span(self.end, self.start))
    }

    fn has_next(&self) -> Option<bool> {
        Some(self.next.is_some())
    }

    fn reverse(&self) -> Option<BoxedIter<'a, N>> {
        Some(Box::new(self.get_reverse_iterator()))
    }

    fn close(&mut self) {
        self.next = None;
        self.state.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple_node::SimpleNode;

    fn ints(it: &mut dyn SequenceIterator<'_, SimpleNode>) -> Vec<i64> {
        let mut out = Vec::new();
        while let Some(Ok(XdmItem::Atomic(XdmAtomicValue::Integer(i)))) = it.next_item() {
            out.push(i);
        }
        out
    }

    #[test]
    fn forward_range_is_inclusive() {
        let mut it = RangeIterator::<SimpleNode>::new(3, 6);
        assert_eq!(SequenceIterator::length(&it), Some(4));
        assert_eq!(ints(&mut it), vec![3, 4, 5, 6]);
    }

    #[test]
    fn range_at_upper_bound_does_not_overflow() {
        let mut it = RangeIterator::<SimpleNode>::new(i64::MAX - 1, i64::MAX);
        assert_eq!(ints(&mut it), vec![i64::MAX - 1, i64::MAX]);
    }

    #[test]
    fn reverse_of_reverse_range_is_forward() {
        let rev = ReverseRangeIterator::<SimpleNode>::new(5, 2);
        let mut fwd = rev.get_reverse_iterator();
        assert_eq!(ints(&mut fwd), vec![2, 3, 4, 5]);
        let mut rev = rev;
        assert_eq!(ints(&mut rev), vec![5, 4, 3, 2]);
    }

    #[test]
    fn ranges_are_grounded_with_known_length() {
        let wanted = IterProps::GROUNDED | IterProps::LOOKAHEAD | IterProps::LAST_POSITION_FINDER;
        assert!(RangeIterator::<SimpleNode>::new(1, 3).properties().contains(wanted));
        assert!(ReverseRangeIterator::<SimpleNode>::new(3, 1).properties().contains(wanted));
    }

    #[test]
    fn inverted_bounds_are_empty() {
        let mut it = RangeIterator::<SimpleNode>::new(2, 1);
        assert_eq!(SequenceIterator::length(&it), Some(0));
        assert!(ints(&mut it).is_empty());
    }
}
