//! Atomization of item streams.

use std::collections::VecDeque;

use smallvec::SmallVec;

use super::{BoxedIter, EmptyIterator, IterState, ListIterator, SequenceIterator, XdmItemResult, delegate_state};
use crate::engine::runtime::{Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::{XdmAtomicValue, XdmItem};

/// Typed value of one item: nodes yield their typed value, atomic values
/// themselves. Function items and external objects have no typed value.
pub fn atomize_item<N: XdmNode>(item: XdmItem<N>) -> Result<SmallVec<[XdmAtomicValue; 1]>, Error> {
    match item {
        XdmItem::Atomic(a) => Ok(smallvec::smallvec![a]),
        XdmItem::Node(n) => Ok(n.typed_value().into_iter().collect()),
        XdmItem::Function(f) => Err(Error::from_code(
            ErrorCode::FOTY0013,
            match f.name {
                Some(name) => format!("cannot atomize function item {name}#{}", f.arity),
                None => "cannot atomize a function item".to_string(),
            },
        )),
        XdmItem::External(_) => Err(Error::from_code(
            ErrorCode::FOTY0013,
            "cannot atomize an external object",
        )),
    }
}

/// Flattens the typed values of base items.
pub struct AtomizingIterator<'a, N> {
    base: BoxedIter<'a, N>,
    pending: VecDeque<XdmAtomicValue>,
    state: IterState<N>,
}

impl<'a, N: XdmNode> AtomizingIterator<'a, N> {
    pub fn new(base: BoxedIter<'a, N>) -> Self {
        Self {
            base,
            pending: VecDeque::new(),
            state: IterState::default(),
        }
    }

    fn advance(&mut self) -> Option<XdmItemResult<N>> {
        loop {
            if let Some(a) = self.pending.pop_front() {
                return Some(Ok(XdmItem::Atomic(a)));
            }
            match self.base.next_item()? {
                Ok(XdmItem::Atomic(a)) => return Some(Ok(XdmItem::Atomic(a))),
                Ok(item) => match atomize_item(item) {
                    Ok(values) => self.pending.extend(values),
                    Err(e) => return Some(Err(e)),
                },
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl<'a, N: XdmNode> SequenceIterator<'a, N> for AtomizingIterator<'a, N> {
    delegate_state!();

    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        if self.state.is_finished() {
            return None;
        }
        let next = self.advance();
        self.state.record(next)
    }

    fn get_another(&self) -> Result<BoxedIter<'a, N>, Error> {
        Ok(Box::new(AtomizingIterator::new(self.base.get_another()?)))
    }

    fn close(&mut self) {
        self.pending.clear();
        self.base.close();
        self.state.finish();
    }
}

/// Atomize `base`, short-circuiting when its length is known to be 0 or 1.
pub fn get_atomizing_iterator<'a, N: XdmNode>(mut base: BoxedIter<'a, N>) -> Result<BoxedIter<'a, N>, Error> {
    match base.length() {
        Some(0) => Ok(Box::new(EmptyIterator::new())),
        Some(1) => {
            let Some(item) = base.next_item().transpose()? else {
                return Ok(Box::new(EmptyIterator::new()));
            };
            let values = atomize_item(item)?;
            Ok(Box::new(ListIterator::from_vec(
                values.into_iter().map(XdmItem::Atomic).collect(),
            )))
        }
        _ => Ok(Box::new(AtomizingIterator::new(base))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iter::{from_vec, materialize};
    use crate::simple_node::{SimpleNode, elem, text};
    use crate::xdm::FunctionItem;

    #[test]
    fn nodes_atomize_to_untyped() {
        let e = elem("a").child(text("hi")).build();
        let base = from_vec(vec![XdmItem::Node(e), XdmItem::Atomic(XdmAtomicValue::Integer(3))]);
        let out = materialize(get_atomizing_iterator(base).expect("atomize")).expect("items");
        assert_eq!(
            out,
            vec![
                XdmItem::Atomic(XdmAtomicValue::UntypedAtomic("hi".into())),
                XdmItem::Atomic(XdmAtomicValue::Integer(3)),
            ]
        );
    }

    #[test]
    fn function_item_fails_even_on_fast_path() {
        let base: BoxedIter<'_, SimpleNode> = from_vec(vec![XdmItem::Function(FunctionItem { name: None, arity: 0 })]);
        let err = get_atomizing_iterator(base).err().expect("FOTY0013");
        assert_eq!(err.code_enum(), ErrorCode::FOTY0013);
    }
}
