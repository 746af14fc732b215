use rstest::rstest;
use xquery_core::simple_node::{comment, pi};
use xquery_core::xdm::FunctionItem;
use xquery_core::{
    DynamicContextBuilder, ErrorCode, ExpandedName, Expr, SimpleNode, StaticContextBuilder, XdmAtomicValue, XdmItem,
    XdmNode, compile_with_context, elem, evaluate, ns, simple_doc, text,
};

/// `data($v)` with `$v` bound to `items` at run time.
fn atomize(items: Vec<XdmItem<SimpleNode>>) -> Result<Vec<XdmItem<SimpleNode>>, ErrorCode> {
    let v = ExpandedName::local("v");
    let sc = StaticContextBuilder::new().with_variable(v.clone()).build();
    let e = compile_with_context(Expr::atomize(Expr::external_var(v.clone())), &sc).expect("compile");
    let dc = DynamicContextBuilder::new().with_variable(v, items).build();
    evaluate(&e, &dc).map_err(|e| e.code_enum())
}

fn untyped(s: &str) -> XdmItem<SimpleNode> {
    XdmItem::Atomic(XdmAtomicValue::UntypedAtomic(s.to_string()))
}

fn string(s: &str) -> XdmItem<SimpleNode> {
    XdmItem::Atomic(XdmAtomicValue::String(s.to_string()))
}

#[test]
fn text_node_gives_its_string_value_untyped() {
    assert_eq!(atomize(vec![XdmItem::Node(text("hello"))]), Ok(vec![untyped("hello")]));
}

#[test]
fn document_gives_concatenated_text() {
    let d = simple_doc()
        .child(elem("a").child(text("one")).child(elem("b").child(text("two"))))
        .build();
    assert_eq!(d.string_value(), "onetwo");
    assert_eq!(atomize(vec![XdmItem::Node(d)]), Ok(vec![untyped("onetwo")]));
}

#[test]
fn string_kinds_give_strings_in_order() {
    let nodes = vec![
        XdmItem::Node(comment("c1")),
        XdmItem::Node(pi("target", "data")),
        XdmItem::Node(ns("p", "urn:example")),
        XdmItem::Node(comment("c2")),
    ];
    assert_eq!(
        atomize(nodes),
        Ok(vec![string("c1"), string("data"), string("urn:example"), string("c2")])
    );
}

#[test]
fn typed_nodes_give_their_typed_values() {
    let list = elem("sizes")
        .child(text("1 2 3"))
        .typed(vec![
            XdmAtomicValue::Integer(1),
            XdmAtomicValue::Integer(2),
            XdmAtomicValue::Integer(3),
        ])
        .build();
    let flag = SimpleNode::typed_attribute("enabled", "1", vec![XdmAtomicValue::Boolean(true)]);
    let got = atomize(vec![XdmItem::Node(list), XdmItem::Node(flag)]);
    assert_eq!(
        got,
        Ok(vec![
            XdmItem::Atomic(XdmAtomicValue::Integer(1)),
            XdmItem::Atomic(XdmAtomicValue::Integer(2)),
            XdmItem::Atomic(XdmAtomicValue::Integer(3)),
            XdmItem::Atomic(XdmAtomicValue::Boolean(true)),
        ])
    );
}

#[test]
fn atomic_values_pass_through() {
    let items = vec![
        XdmItem::Atomic(XdmAtomicValue::Integer(7)),
        XdmItem::Node(text("x")),
        XdmItem::Atomic(XdmAtomicValue::Double(0.5)),
    ];
    assert_eq!(
        atomize(items),
        Ok(vec![
            XdmItem::Atomic(XdmAtomicValue::Integer(7)),
            untyped("x"),
            XdmItem::Atomic(XdmAtomicValue::Double(0.5)),
        ])
    );
}

#[rstest]
#[case::anonymous(None, 0)]
#[case::named(Some(ExpandedName::local("f")), 2)]
fn function_items_cannot_be_atomized(#[case] name: Option<ExpandedName>, #[case] arity: usize) {
    let items = vec![XdmItem::Node(text("ok")), XdmItem::Function(FunctionItem { name, arity })];
    assert_eq!(atomize(items), Err(ErrorCode::FOTY0013));
}

#[test]
fn empty_input_atomizes_to_empty() {
    assert_eq!(atomize(Vec::new()), Ok(Vec::new()));
}
