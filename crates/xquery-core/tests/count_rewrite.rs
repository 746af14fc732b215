use proptest::prelude::*;
use rstest::rstest;
use xquery_core::expr::{ComparisonOp, SystemFunction};
use xquery_core::{
    DynamicContextBuilder, ExpandedName, Expr, SimpleNode, StaticContext, StaticContextBuilder, XdmAtomicValue, XdmItem,
    compile_with_context, evaluate,
};

const OPS: [ComparisonOp; 6] = [
    ComparisonOp::Eq,
    ComparisonOp::Ne,
    ComparisonOp::Lt,
    ComparisonOp::Le,
    ComparisonOp::Gt,
    ComparisonOp::Ge,
];

fn contexts() -> (StaticContext, StaticContext) {
    let x = ExpandedName::local("x");
    let optimized = StaticContextBuilder::new().with_variable(x.clone()).build();
    let direct = StaticContextBuilder::new()
        .with_variable(x)
        .with_optimizer(false)
        .build();
    (optimized, direct)
}

/// Result of `count($x) op n` for `$x` bound to `len` items.
fn count_compare(sc: &StaticContext, len: usize, op: ComparisonOp, n: Expr) -> Vec<XdmItem<SimpleNode>> {
    let x = ExpandedName::local("x");
    let e = Expr::value_compare(
        Expr::call(SystemFunction::Count, vec![Expr::external_var(x.clone())]),
        op,
        n,
    );
    let compiled = compile_with_context(e, sc).expect("compile");
    let items = (0..len)
        .map(|i| XdmItem::Atomic(XdmAtomicValue::String(format!("item-{i}"))))
        .collect::<Vec<_>>();
    let dc = DynamicContextBuilder::new().with_variable(x, items).build();
    evaluate(&compiled, &dc).expect("evaluate")
}

proptest! {
    #[test]
    fn bounded_rewrite_matches_direct_count(
        len in 0usize..12,
        n in 0i64..14,
        op in prop::sample::select(OPS.to_vec()),
    ) {
        let (optimized, direct) = contexts();
        prop_assert_eq!(
            count_compare(&optimized, len, op, Expr::integer(n)),
            count_compare(&direct, len, op, Expr::integer(n)),
        );
    }

    #[test]
    fn fractional_bounds_match_direct_count(
        len in 0usize..8,
        n in -3.0f64..10.0,
        op in prop::sample::select(OPS.to_vec()),
    ) {
        let (optimized, direct) = contexts();
        prop_assert_eq!(
            count_compare(&optimized, len, op, Expr::double(n)),
            count_compare(&direct, len, op, Expr::double(n)),
        );
    }
}

#[rstest]
#[case::nan(Expr::double(f64::NAN))]
#[case::negative(Expr::integer(-1))]
#[case::beyond_i32(Expr::integer(3_000_000_000))]
#[case::half(Expr::double(2.5))]
fn edge_bounds_match_direct_count(#[case] n: Expr) {
    let (optimized, direct) = contexts();
    for op in OPS {
        for len in [0, 1, 3] {
            assert_eq!(
                count_compare(&optimized, len, op, n.clone()),
                count_compare(&direct, len, op, n.clone()),
                "count of {len} items {op:?} {n}"
            );
        }
    }
}

#[rstest]
#[case::eq_zero(ComparisonOp::Eq, 0, "empty")]
#[case::le_zero(ComparisonOp::Le, 0, "empty")]
#[case::gt_zero(ComparisonOp::Gt, 0, "exists")]
#[case::ne_zero(ComparisonOp::Ne, 0, "exists")]
#[case::gt_three(ComparisonOp::Gt, 3, "exists")]
#[case::ge_three(ComparisonOp::Ge, 3, "exists")]
#[case::eq_three(ComparisonOp::Eq, 3, "count")]
fn rewrite_shapes(#[case] op: ComparisonOp, #[case] n: i64, #[case] head: &str) {
    let (optimized, _) = contexts();
    let e = Expr::value_compare(
        Expr::call(SystemFunction::Count, vec![Expr::external_var(ExpandedName::local("x"))]),
        op,
        Expr::integer(n),
    );
    let out = compile_with_context(e, &optimized).expect("compile").to_string();
    assert!(out.contains(head), "{out}");
    if head == "count" {
        assert!(out.contains("subsequence"), "{out}");
    }
}
