use proptest::prelude::*;
use rstest::rstest;
use xquery_core::expr::{ComparisonOp, SystemFunction, ValueComparison, VarBinding};
use xquery_core::{
    DynamicContext, DynamicContextBuilder, ErrorCode, ExpandedName, Expr, SimpleNode, StaticContext,
    StaticContextBuilder, XdmAtomicValue, XdmItem, compile, compile_with_context, evaluate,
};

const OPS: [ComparisonOp; 6] = [
    ComparisonOp::Eq,
    ComparisonOp::Ne,
    ComparisonOp::Lt,
    ComparisonOp::Le,
    ComparisonOp::Gt,
    ComparisonOp::Ge,
];

fn run(e: &Expr) -> Vec<XdmItem<SimpleNode>> {
    evaluate(e, &DynamicContext::default()).expect("evaluate")
}

fn boolean(b: bool) -> Vec<XdmItem<SimpleNode>> {
    vec![XdmItem::Atomic(XdmAtomicValue::Boolean(b))]
}

/// `None` for the empty sequence.
fn as_optional_bool(items: &[XdmItem<SimpleNode>]) -> Option<bool> {
    match items {
        [] => None,
        [XdmItem::Atomic(XdmAtomicValue::Boolean(b))] => Some(*b),
        other => panic!("not a boolean: {other:?}"),
    }
}

fn literal(v: Option<i64>) -> Expr {
    v.map_or_else(Expr::empty, Expr::integer)
}

fn arb_atomic() -> impl Strategy<Value = XdmAtomicValue> {
    prop_oneof![
        any::<i64>().prop_map(XdmAtomicValue::Integer),
        any::<f64>().prop_map(XdmAtomicValue::Double),
        "[a-z]{0,6}".prop_map(XdmAtomicValue::String),
        any::<bool>().prop_map(XdmAtomicValue::Boolean),
    ]
}

fn arb_result_when_empty() -> impl Strategy<Value = Option<bool>> {
    prop_oneof![Just(None), Just(Some(false)), Just(Some(true))]
}

proptest! {
    #[test]
    fn empty_operand_gives_result_when_empty(
        x in arb_atomic(),
        op in prop::sample::select(OPS.to_vec()),
        rwe in arb_result_when_empty(),
        empty_on_left in any::<bool>(),
    ) {
        let (l, r) = if empty_on_left {
            (Expr::empty(), Expr::atomic(x))
        } else {
            (Expr::atomic(x), Expr::empty())
        };
        let vc = Expr::ValueComparison(ValueComparison::new(l, op, r).with_result_when_empty(rwe));
        prop_assert_eq!(as_optional_bool(&run(&vc)), rwe);
    }

    #[test]
    fn nan_is_unequal_and_unordered(
        y in prop_oneof![any::<i64>().prop_map(XdmAtomicValue::Integer), any::<f64>().prop_map(XdmAtomicValue::Double)],
        op in prop::sample::select(OPS.to_vec()),
        nan_on_left in any::<bool>(),
    ) {
        let nan = Expr::double(f64::NAN);
        let (l, r) = if nan_on_left { (nan, Expr::atomic(y)) } else { (Expr::atomic(y), nan) };
        let vc = Expr::ValueComparison(ValueComparison::new(l, op, r));
        prop_assert_eq!(as_optional_bool(&run(&vc)), Some(op == ComparisonOp::Ne));
    }

    #[test]
    fn negation_inverts_the_result(
        x in prop::option::of(-20i64..20),
        y in prop::option::of(-20i64..20),
        op in prop::sample::select(OPS.to_vec()),
        rwe in arb_result_when_empty(),
    ) {
        let vc = ValueComparison::new(literal(x), op, literal(y)).with_result_when_empty(rwe);
        let negated = vc.negate().expect("integers are never NaN");
        let original = as_optional_bool(&run(&Expr::ValueComparison(vc))).unwrap_or(false);
        let inverted = as_optional_bool(&run(&Expr::ValueComparison(negated))).unwrap_or(false);
        prop_assert_eq!(inverted, !original);
    }
}

#[test]
fn doubles_are_not_negatable() {
    let vc = ValueComparison::new(Expr::double(1.5), ComparisonOp::Lt, Expr::integer(2));
    assert!(vc.negate().is_none());
}

#[rstest]
#[case::shared_value(vec![1, 2], vec![2, 3], true)]
#[case::no_shared_value(vec![1, 2], vec![3, 4], false)]
#[case::empty_right(vec![1], vec![], false)]
fn general_comparison_is_existential(#[case] l: Vec<i64>, #[case] r: Vec<i64>, #[case] expected: bool) {
    let ints = |v: Vec<i64>| Expr::atomics(v.into_iter().map(XdmAtomicValue::Integer).collect());
    let e = Expr::general_compare(ints(l), ComparisonOp::Eq, ints(r));
    let unoptimized = StaticContextBuilder::new().with_optimizer(false).build();
    assert_eq!(run(&compile_with_context(e.clone(), &unoptimized).expect("compile")), boolean(expected));
    assert_eq!(run(&compile(e).expect("compile")), boolean(expected));
}

#[test]
fn singleton_value_comparison_of_unequal_literals_is_false() {
    let e = Expr::value_compare(Expr::integer(1), ComparisonOp::Eq, Expr::integer(2));
    assert_eq!(run(&compile(e).expect("compile")), boolean(false));
}

#[test]
fn value_comparison_of_two_empties_is_empty() {
    let e = Expr::value_compare(Expr::empty(), ComparisonOp::Eq, Expr::empty());
    let out = compile(e).expect("compile");
    assert!(out.is_empty_literal());
    assert_eq!(run(&out), Vec::new());
}

#[test]
fn string_length_of_empty_literal_folds_to_true() {
    let e = Expr::general_compare(
        Expr::call(SystemFunction::StringLength, vec![Expr::string("")]),
        ComparisonOp::Eq,
        Expr::integer(0),
    );
    let out = compile(e).expect("compile");
    assert_eq!(out, Expr::boolean(true));
    assert_eq!(run(&out), boolean(true));
}

#[test]
fn string_length_of_single_string_becomes_not() {
    let w = VarBinding::new("w");
    let test = Expr::general_compare(
        Expr::call(SystemFunction::StringLength, vec![Expr::var(&w)]),
        ComparisonOp::Eq,
        Expr::integer(0),
    );
    let e = Expr::for_in(
        w,
        Expr::atomics(vec![XdmAtomicValue::String(String::new()), XdmAtomicValue::String("x".into())]),
        test,
    );
    let out = compile(e).expect("compile");
    let Expr::For(f) = &out else {
        panic!("expected a loop, got {out:?}");
    };
    assert!(f.action.as_call(SystemFunction::Not).is_some(), "{}", f.action);
    assert_eq!(run(&out), [boolean(true), boolean(false)].concat());
}

#[rstest]
#[case::empty_string(vec![""], Ok(true))]
#[case::non_empty(vec!["abc"], Ok(false))]
#[case::no_value(vec![], Ok(true))]
#[case::two_values(vec!["a", ""], Err(ErrorCode::XPTY0004))]
fn string_length_of_unknown_cardinality_is_not_rewritten(
    #[case] values: Vec<&str>,
    #[case] expected: Result<bool, ErrorCode>,
) {
    let s = ExpandedName::local("s");
    let sc = StaticContextBuilder::new().with_variable(s.clone()).build();
    let e = Expr::general_compare(
        Expr::call(SystemFunction::StringLength, vec![Expr::external_var(s.clone())]),
        ComparisonOp::Eq,
        Expr::integer(0),
    );
    let out = compile_with_context(e, &sc).expect("compile");
    assert!(out.as_call(SystemFunction::Not).is_none(), "{out}");

    let items = values
        .into_iter()
        .map(|v| XdmItem::Atomic(XdmAtomicValue::String(v.to_string())))
        .collect::<Vec<_>>();
    let dc = DynamicContextBuilder::<SimpleNode>::new().with_variable(s, items).build();
    let got = evaluate(&out, &dc)
        .map(|items| as_optional_bool(&items) == Some(true))
        .map_err(|e| e.code_enum());
    assert_eq!(got, expected);
}

#[test]
fn incomparable_optional_operands_only_warn() {
    let s = ExpandedName::local("s");
    let sc = StaticContextBuilder::new().with_variable(s.clone()).build();
    // $s is untyped at compile time, so the mismatch surfaces per evaluation
    let e = Expr::value_compare(Expr::external_var(s.clone()), ComparisonOp::Eq, Expr::integer(1));
    let out = compile_with_context(e, &sc).expect("compile");
    let dc = DynamicContextBuilder::<SimpleNode>::new()
        .with_variable(s, vec![XdmItem::Atomic(XdmAtomicValue::Boolean(true))])
        .build();
    let err = evaluate(&out, &dc).expect_err("incomparable");
    assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
    assert!(!err.is_static());
    let both_known = Expr::value_compare(Expr::integer(1), ComparisonOp::Eq, Expr::boolean(true));
    assert!(compile_with_context(both_known, &StaticContext::default()).is_err_and(|e| e.is_static()));
}

#[rstest]
#[case::one_value(vec![1], Ok(Some(true)))]
#[case::no_value(vec![], Ok(None))]
#[case::two_values(vec![1, 2], Err(ErrorCode::XPTY0004))]
#[case::two_values_first_differs(vec![2, 1], Err(ErrorCode::XPTY0004))]
fn value_comparison_operand_holds_at_most_one_item(
    #[case] values: Vec<i64>,
    #[case] expected: Result<Option<bool>, ErrorCode>,
) {
    let s = ExpandedName::local("s");
    let e = Expr::value_compare(Expr::external_var(s.clone()), ComparisonOp::Eq, Expr::integer(1));
    let items = values
        .into_iter()
        .map(|i| XdmItem::Atomic(XdmAtomicValue::Integer(i)))
        .collect::<Vec<_>>();
    let dc = DynamicContextBuilder::<SimpleNode>::new().with_variable(s.clone(), items).build();
    for optimize in [true, false] {
        let sc = StaticContextBuilder::new()
            .with_variable(s.clone())
            .with_optimizer(optimize)
            .build();
        let out = compile_with_context(e.clone(), &sc).expect("compile");
        let got = evaluate(&out, &dc)
            .map(|items| as_optional_bool(&items))
            .map_err(|e| e.code_enum());
        assert_eq!(got, expected, "{out}");
    }
}
