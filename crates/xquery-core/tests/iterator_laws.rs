use proptest::prelude::*;
use rstest::rstest;
use xquery_core::iter::{
    BoxedIter, ItemMappingIterator, ListIterator, MappingIterator, RangeIterator, ReverseRangeIterator, SequenceIterator,
    TailIterator, from_vec, materialize,
};
use xquery_core::{
    DynamicContextBuilder, ExpandedName, Expr, SimpleNode, StaticContextBuilder, XdmAtomicValue, XdmItem,
    compile_with_context, evaluate,
};

fn ints(values: impl IntoIterator<Item = i64>) -> Vec<XdmItem<SimpleNode>> {
    values
        .into_iter()
        .map(|i| XdmItem::Atomic(XdmAtomicValue::Integer(i)))
        .collect()
}

fn drain(it: &mut BoxedIter<'_, SimpleNode>, n: usize) -> Vec<XdmItem<SimpleNode>> {
    let mut out = Vec::new();
    for _ in 0..n {
        match it.next_item() {
            Some(r) => out.push(r.expect("item")),
            None => break,
        }
    }
    out
}

/// `$a to $b` with both bounds bound at run time, so nothing folds.
fn range_via_expression(a: i64, b: i64) -> Vec<XdmItem<SimpleNode>> {
    let (na, nb) = (ExpandedName::local("a"), ExpandedName::local("b"));
    let sc = StaticContextBuilder::new()
        .with_variable(na.clone())
        .with_variable(nb.clone())
        .build();
    let e = compile_with_context(Expr::range(Expr::external_var(na.clone()), Expr::external_var(nb.clone())), &sc)
        .expect("compile");
    let dc = DynamicContextBuilder::new()
        .with_variable(na, ints([a]))
        .with_variable(nb, ints([b]))
        .build();
    evaluate(&e, &dc).expect("evaluate")
}

#[rstest]
#[case::ascending(1, 3, vec![1, 2, 3])]
#[case::single(4, 4, vec![4])]
#[case::descending_is_empty(3, 1, vec![])]
#[case::negative(-2, 1, vec![-2, -1, 0, 1])]
fn range_expression(#[case] a: i64, #[case] b: i64, #[case] expected: Vec<i64>) {
    assert_eq!(range_via_expression(a, b), ints(expected));
}

#[test]
fn range_with_empty_bound_is_empty() {
    let a = ExpandedName::local("a");
    let sc = StaticContextBuilder::new().with_variable(a.clone()).build();
    let e = compile_with_context(Expr::range(Expr::external_var(a.clone()), Expr::integer(3)), &sc).expect("compile");
    let dc = DynamicContextBuilder::<SimpleNode>::new().with_variable(a, Vec::new()).build();
    assert_eq!(evaluate(&e, &dc).expect("evaluate"), Vec::new());
}

#[test]
fn range_positions_run_from_zero_to_minus_one() {
    let mut it: BoxedIter<'_, SimpleNode> = Box::new(RangeIterator::<SimpleNode>::new(1, 2));
    assert_eq!(it.position(), 0);
    assert!(it.current().is_none());
    assert!(it.next_item().is_some());
    assert_eq!(it.position(), 1);
    assert!(it.next_item().is_some());
    assert_eq!(it.position(), 2);
    assert!(it.next_item().is_none());
    assert_eq!(it.position(), -1);
    assert!(it.next_item().is_none());
    assert!(it.current().is_none());
}

proptest! {
    #[test]
    fn range_yields_every_integer_in_order(a in -50i64..50, len in 0i64..40) {
        let b = a + len;
        prop_assert_eq!(range_via_expression(a, b), ints(a..=b));
        prop_assert_eq!(range_via_expression(b + 1, a), Vec::new());
    }

    #[test]
    fn reverse_of_reverse_range_is_forward(a in -1000i64..1000, len in 0i64..64) {
        let b = a + len;
        let rev = ReverseRangeIterator::<SimpleNode>::new(b, a);
        let forward = materialize(Box::new(rev.get_reverse_iterator())).expect("forward");
        prop_assert_eq!(forward, ints(a..=b));
        let down = materialize(Box::new(ReverseRangeIterator::<SimpleNode>::new(b, a))).expect("down");
        prop_assert_eq!(down, ints((a..=b).rev()));
    }

    #[test]
    fn get_another_replays_from_the_start(len in 0i64..30, consumed in 0usize..35, kind in 0u8..5) {
        let mut it: BoxedIter<'_, SimpleNode> = match kind {
            0 => Box::new(RangeIterator::<SimpleNode>::new(1, len)),
            1 => Box::new(ReverseRangeIterator::<SimpleNode>::new(len, 1)),
            2 => Box::new(ListIterator::<SimpleNode>::from_vec(ints(1..=len))),
            3 => Box::new(TailIterator::new(Box::new(RangeIterator::<SimpleNode>::new(0, len)), 2)),
            _ => Box::new(ItemMappingIterator::new(Box::new(RangeIterator::<SimpleNode>::new(1, len)), |item| Ok(Some(item)))),
        };
        let before = materialize(it.get_another().expect("copy"))
            .expect("unconsumed");
        drain(&mut it, consumed);
        let after = materialize(it.get_another().expect("copy")).expect("replay");
        prop_assert_eq!(before.len(), usize::try_from(len).unwrap_or(0));
        prop_assert_eq!(before, after);
    }

    #[test]
    fn flattening_map_replays(len in 0i64..10, consumed in 0usize..25) {
        let base: BoxedIter<'_, SimpleNode> = Box::new(RangeIterator::<SimpleNode>::new(1, len));
        let mut it: BoxedIter<'_, SimpleNode> = Box::new(MappingIterator::new(base, |item: XdmItem<SimpleNode>| {
            Ok(from_vec(vec![item.clone(), item]))
        }));
        let fresh = materialize(it.get_another().expect("copy")).expect("fresh");
        drain(&mut it, consumed);
        let replay = materialize(it.get_another().expect("copy")).expect("replay");
        prop_assert_eq!(fresh, replay);
    }
}
