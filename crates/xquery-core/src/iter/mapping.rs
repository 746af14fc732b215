//! Lazy one-to-one and one-to-many mapping over a base iterator.
//!
//! The mapping function is owned by the iterator. It is cloned by
//! `get_another`, so closures that capture an evaluation context carry their
//! own copy of the frame.

use super::{BoxedIter, IterState, SequenceIterator, XdmItemResult, delegate_state};
use crate::engine::runtime::Error;
use crate::model::XdmNode;
use crate::xdm::XdmItem;

/// Applies `f` to each base item; `Ok(None)` drops the item.
pub struct ItemMappingIterator<'a, N, F> {
    base: BoxedIter<'a, N>,
    f: F,
    state: IterState<N>,
}

impl<'a, N, F> ItemMappingIterator<'a, N, F>
where
    N: XdmNode,
    F: FnMut(XdmItem<N>) -> Result<Option<XdmItem<N>>, Error> + Clone + 'a,
{
    pub fn new(base: BoxedIter<'a, N>, f: F) -> Self {
        Self {
            base,
            f,
            state: IterState::default(),
        }
    }
}

impl<'a, N, F> SequenceIterator<'a, N> for ItemMappingIterator<'a, N, F>
where
    N: XdmNode,
    F: FnMut(XdmItem<N>) -> Result<Option<XdmItem<N>>, Error> + Clone + 'a,
{
    delegate_state!();

    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        if self.state.is_finished() {
            return None;
        }
        loop {
            let next = match self.base.next_item() {
                None => None,
                Some(Err(e)) => Some(Err(e)),
                Some(Ok(item)) => match (self.f)(item) {
                    Ok(Some(mapped)) => Some(Ok(mapped)),
                    Ok(None) => continue,
                    Err(e) => Some(Err(e)),
                },
            };
            return self.state.record(next);
        }
    }

    fn get_another(&self) -> Result<BoxedIter<'a, N>, Error> {
        Ok(Box::new(ItemMappingIterator::new(self.base.get_another()?, self.f.clone())))
    }

    fn close(&mut self) {
        self.base.close();
        self.state.finish();
    }
}

/// Applies `f` to each base item and flattens the resulting sequences.
pub struct MappingIterator<'a, N, F> {
    base: BoxedIter<'a, N>,
    f: F,
    inner: Option<BoxedIter<'a, N>>,
    state: IterState<N>,
}

impl<'a, N, F> MappingIterator<'a, N, F>
where
    N: XdmNode,
    F: FnMut(XdmItem<N>) -> Result<BoxedIter<'a, N>, Error> + Clone + 'a,
{
    pub fn new(base: BoxedIter<'a, N>, f: F) -> Self {
        Self {
            base,
            f,
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
            match self.base.next_item()? {
                Ok(item) => match (self.f)(item) {
                    Ok(it) => self.inner = Some(it),
                    Err(e) => return Some(Err(e)),
                },
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl<'a, N, F> SequenceIterator<'a, N> for MappingIterator<'a, N, F>
where
    N: XdmNode,
    F: FnMut(XdmItem<N>) -> Result<BoxedIter<'a, N>, Error> + Clone + 'a,
{
    delegate_state!();

    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        if self.state.is_finished() {
            return None;
        }
        let next = self.advance();
        self.state.record(next)
    }

    fn get_another(&self) -> Result<BoxedIter<'a, N>, Error> {
        Ok(Box::new(MappingIterator::new(self.base.get_another()?, self.f.clone())))
    }

    fn close(&mut self) {
        if let Some(inner) = self.inner.as_mut() {
            inner.close();
        }
        self.inner = None;
        self.base.close();
        self.state.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iter::{RangeIterator, from_vec, materialize};
    use crate::simple_node::SimpleNode;
    use crate::xdm::XdmAtomicValue;

    fn int(i: i64) -> XdmItem<SimpleNode> {
        XdmItem::Atomic(XdmAtomicValue::Integer(i))
    }

    #[test]
    fn item_mapping_skips_none() {
        let base: BoxedIter<'_, SimpleNode> = Box::new(RangeIterator::new(1, 6));
        let it = ItemMappingIterator::new(base, |item: XdmItem<SimpleNode>| match item {
            XdmItem::Atomic(XdmAtomicValue::Integer(i)) if i % 2 == 0 => Ok(Some(int(i * 10))),
            _ => Ok(None),
        });
        let out = materialize(Box::new(it)).expect("mapping");
        assert_eq!(out, vec![int(20), int(40), int(60)]);
    }

    #[test]
    fn mapping_flattens_and_restarts() {
        let base: BoxedIter<'_, SimpleNode> = Box::new(RangeIterator::new(1, 3));
        let it = MappingIterator::new(base, |item: XdmItem<SimpleNode>| Ok(from_vec(vec![item.clone(), item])));
        let again = it.get_another().expect("another");
        assert_eq!(materialize(Box::new(it)).expect("first").len(), 6);
        assert_eq!(materialize(again).expect("second").len(), 6);
    }
}
