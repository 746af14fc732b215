use rstest::rstest;
use xquery_core::expr::{ArithmeticOp, Axis, ComparisonOp, NodeTest, VarBinding};
use xquery_core::{
    DynamicContext, DynamicContextBuilder, ExpandedName, Expr, SimpleNode, StaticContextBuilder, XdmAtomicValue,
    XdmItem, XdmNode, compile, compile_with_context, elem, evaluate, simple_doc, text,
};

fn ints(values: impl IntoIterator<Item = i64>) -> Vec<XdmItem<SimpleNode>> {
    values
        .into_iter()
        .map(|i| XdmItem::Atomic(XdmAtomicValue::Integer(i)))
        .collect()
}

fn squares(upto: i64) -> Expr {
    let i = VarBinding::new("i");
    let square = Expr::arithmetic(Expr::var(&i), ArithmeticOp::Mul, Expr::var(&i));
    Expr::for_in(i, Expr::range(Expr::integer(1), Expr::integer(upto)), square)
}

#[test]
fn squares_of_one_to_five() {
    let compiled = compile(squares(5)).expect("compile");
    assert_eq!(
        evaluate(&compiled, &DynamicContext::<SimpleNode>::default()).expect("evaluate"),
        ints([1, 4, 9, 16, 25])
    );
}

#[test]
fn optimizer_off_gives_the_same_squares() {
    let sc = StaticContextBuilder::new().with_optimizer(false).build();
    let compiled = compile_with_context(squares(5), &sc).expect("compile");
    assert_eq!(
        evaluate(&compiled, &DynamicContext::<SimpleNode>::default()).expect("evaluate"),
        ints([1, 4, 9, 16, 25])
    );
}

#[test]
fn loop_over_empty_range_is_empty() {
    let compiled = compile(squares(0)).expect("compile");
    assert!(compiled.is_empty_literal(), "{compiled}");
}

fn catalog() -> SimpleNode {
    simple_doc()
        .child(
            elem("catalog")
                .child(elem("item").child(elem("name").child(text("a"))))
                .child(elem("item").child(elem("name").child(text("b"))))
                .child(elem("note").child(elem("name").child(text("skip")))),
        )
        .build()
}

fn child(name: &str) -> Expr {
    Expr::axis(Axis::Child, NodeTest::Name(ExpandedName::local(name)))
}

#[test]
fn loop_over_child_steps_becomes_a_path() {
    let e = VarBinding::new("e");
    let lp = Expr::for_in(e.clone(), child("item"), Expr::path(Expr::var(&e), child("name")));
    let compiled = compile(lp).expect("compile");
    assert!(matches!(compiled, Expr::Slash(_)), "{compiled}");

    let root = catalog().children().into_iter().next().expect("catalog element");
    let dc = DynamicContextBuilder::new().with_context_node(root).build();
    let names = evaluate(&compiled, &dc)
        .expect("evaluate")
        .into_iter()
        .map(|item| match item {
            XdmItem::Node(n) => n.string_value(),
            other => panic!("not a node: {other:?}"),
        })
        .collect::<Vec<_>>();
    assert_eq!(names, ["a", "b"]);
}

#[test]
fn filtered_loop_keeps_matching_items_in_order() {
    let n = ExpandedName::local("n");
    let x = VarBinding::new("x");
    let sc = StaticContextBuilder::new().with_variable(n.clone()).build();
    let body = Expr::if_then_else(
        Expr::value_compare(Expr::var(&x), ComparisonOp::Gt, Expr::integer(2)),
        Expr::arithmetic(Expr::var(&x), ArithmeticOp::Add, Expr::integer(100)),
        Expr::empty(),
    );
    let lp = Expr::for_in(x, Expr::range(Expr::integer(1), Expr::external_var(n.clone())), body);
    let compiled = compile_with_context(lp, &sc).expect("compile");
    let dc = DynamicContextBuilder::new().with_variable(n, ints([5])).build();
    assert_eq!(evaluate(&compiled, &dc).expect("evaluate"), ints([103, 104, 105]));
}

fn one_to_five() -> Expr {
    Expr::range(Expr::integer(1), Expr::integer(5))
}

#[rstest]
#[case::every_position(Expr::filter(one_to_five(), Expr::Position), vec![1, 2, 3, 4, 5])]
#[case::last(Expr::filter(one_to_five(), Expr::Last), vec![5])]
#[case::before_last(
    Expr::filter(one_to_five(), Expr::arithmetic(Expr::Last, ArithmeticOp::Sub, Expr::integer(1))),
    vec![4]
)]
#[case::constant_position(Expr::filter(one_to_five(), Expr::integer(2)), vec![2])]
fn invariant_positional_filter_yields_every_match_per_iteration(#[case] filtered: Expr, #[case] once: Vec<i64>) {
    let i = VarBinding::new("i");
    let lp = Expr::for_in(i, Expr::range(Expr::integer(1), Expr::integer(2)), filtered);
    let expected = ints(once.iter().chain(&once).copied());
    for sc in [
        StaticContextBuilder::new().build(),
        StaticContextBuilder::new().with_optimizer(false).build(),
    ] {
        let compiled = compile_with_context(lp.clone(), &sc).expect("compile");
        assert_eq!(
            evaluate(&compiled, &DynamicContext::<SimpleNode>::default()).expect("evaluate"),
            expected,
            "{compiled}"
        );
    }
}
