use rstest::rstest;
use xquery_core::expr::{Axis, ComparisonOp, IdentityOp, NodeTest, SystemFunction};
use xquery_core::{
    DynamicContextBuilder, ErrorCode, ExpandedName, Expr, SimpleNode, StaticContextBuilder, XdmAtomicValue, XdmItem,
    XdmNode, compile, compile_with_context, elem, evaluate, simple_doc, text,
};

fn sample() -> SimpleNode {
    simple_doc()
        .child(
            elem("list")
                .child(elem("item").child(text("one")))
                .child(elem("other"))
                .child(elem("item").child(text("two"))),
        )
        .build()
}

fn step(axis: Axis) -> Expr {
    Expr::axis(axis, NodeTest::AnyNode)
}

fn same_id(left: Axis, right: Axis) -> Expr {
    Expr::value_compare(
        Expr::call(SystemFunction::GenerateId, vec![step(left)]),
        ComparisonOp::Eq,
        Expr::call(SystemFunction::GenerateId, vec![step(right)]),
    )
}

fn run(e: &Expr, context: SimpleNode) -> Vec<XdmItem<SimpleNode>> {
    let dc = DynamicContextBuilder::new().with_context_node(context).build();
    evaluate(e, &dc).expect("evaluate")
}

fn boolean(b: bool) -> Vec<XdmItem<SimpleNode>> {
    vec![XdmItem::Atomic(XdmAtomicValue::Boolean(b))]
}

#[rstest]
#[case::same_parent(Axis::Parent, Axis::Parent, false, true)]
#[case::self_and_parent(Axis::SelfAxis, Axis::Parent, false, false)]
#[case::both_empty_at_root(Axis::Parent, Axis::Parent, true, true)]
#[case::one_empty_at_root(Axis::SelfAxis, Axis::Parent, true, false)]
fn generate_id_equality_becomes_identity(
    #[case] left: Axis,
    #[case] right: Axis,
    #[case] at_root: bool,
    #[case] expected: bool,
) {
    let compiled = compile(same_id(left, right)).expect("compile");
    assert!(matches!(compiled, Expr::Identity(_)), "{compiled}");
    let d = sample();
    let context = if at_root {
        d
    } else {
        d.children().into_iter().next().expect("list element")
    };
    assert_eq!(run(&compiled, context), boolean(expected));
}

#[test]
fn generate_id_over_many_nodes_is_left_alone() {
    let compiled = compile(same_id(Axis::Child, Axis::Parent));
    // child::node() may yield several nodes, so the argument check stays
    let compiled = compiled.expect("compile");
    assert!(!matches!(compiled, Expr::Identity(_)), "{compiled}");
}

#[test]
fn intersect_keeps_document_order_without_duplicates() {
    let items = Expr::axis(Axis::Child, NodeTest::Name(ExpandedName::local("item")));
    let all = Expr::axis(Axis::Child, NodeTest::Wildcard);
    let e = compile(Expr::intersect(
        Expr::sequence(vec![all.clone(), all]),
        Expr::sequence(vec![items.clone(), items]),
    ))
    .expect("compile");
    let list = sample().children().into_iter().next().expect("list element");
    let texts = run(&e, list)
        .into_iter()
        .map(|item| match item {
            XdmItem::Node(n) => n.string_value(),
            other => panic!("not a node: {other:?}"),
        })
        .collect::<Vec<_>>();
    assert_eq!(texts, ["one", "two"]);
}

#[test]
fn intersect_with_a_single_node_searches_the_other_side() {
    let list = sample().children().into_iter().next().expect("list element");
    let first = Expr::filter(
        Expr::axis(Axis::Child, NodeTest::Name(ExpandedName::local("item"))),
        Expr::integer(1),
    );
    let e = compile(Expr::intersect(
        Expr::axis(Axis::Child, NodeTest::Wildcard),
        Expr::FirstItem(Box::new(first)),
    ))
    .expect("compile");
    let Expr::Intersect(i) = &e else {
        panic!("expected intersect, got {e}");
    };
    assert!(i.singleton);
    let out = run(&e, list);
    assert_eq!(out.len(), 1);
}

#[rstest]
#[case::is_single(IdentityOp::Is, 1, Ok(boolean(true)))]
#[case::precedes_single(IdentityOp::Precedes, 1, Ok(boolean(false)))]
#[case::is_several(IdentityOp::Is, 3, Err(ErrorCode::XPTY0004))]
#[case::precedes_several(IdentityOp::Precedes, 3, Err(ErrorCode::XPTY0004))]
#[case::follows_several(IdentityOp::Follows, 2, Err(ErrorCode::XPTY0004))]
fn node_comparison_operand_holds_at_most_one_node(
    #[case] op: IdentityOp,
    #[case] left_nodes: usize,
    #[case] expected: Result<Vec<XdmItem<SimpleNode>>, ErrorCode>,
) {
    let (a, b) = (ExpandedName::local("a"), ExpandedName::local("b"));
    let sc = StaticContextBuilder::new()
        .with_variable(a.clone())
        .with_variable(b.clone())
        .build();
    let e = compile_with_context(Expr::identity(Expr::external_var(a.clone()), op, Expr::external_var(b.clone())), &sc)
        .expect("compile");
    let list = sample().children().into_iter().next().expect("list element");
    let children = list.children();
    let left = children.iter().take(left_nodes).cloned().map(XdmItem::Node).collect::<Vec<_>>();
    let right = children.first().cloned().map(XdmItem::Node).into_iter().collect::<Vec<_>>();
    let dc = DynamicContextBuilder::new()
        .with_variable(a, left)
        .with_variable(b, right)
        .build();
    assert_eq!(evaluate(&e, &dc).map_err(|e| e.code_enum()), expected);
}

#[test]
fn positional_filter_on_the_left_of_intersect_keeps_every_node() {
    let list = sample().children().into_iter().next().expect("list element");
    let e = compile(Expr::intersect(
        Expr::filter(Expr::axis(Axis::Child, NodeTest::Wildcard), Expr::Position),
        Expr::axis(Axis::Child, NodeTest::Name(ExpandedName::local("item"))),
    ))
    .expect("compile");
    if let Expr::Intersect(i) = &e {
        assert!(!i.singleton, "{e}");
    }
    assert_eq!(run(&e, list).len(), 2);
}
