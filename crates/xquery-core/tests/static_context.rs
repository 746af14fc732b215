use rstest::rstest;
use xquery_core::engine::runtime::{BoundarySpace, ConstructionMode};
use xquery_core::{
    DynamicContextBuilder, ErrorCode, ExpandedName, Expr, SimpleNode, StaticContextBuilder, compile_with_context,
};

#[rstest]
#[case::preserve("preserve", BoundarySpace::Preserve)]
#[case::strip("strip", BoundarySpace::Strip)]
fn boundary_space_keywords(#[case] keyword: &str, #[case] expected: BoundarySpace) {
    let sc = StaticContextBuilder::new()
        .with_boundary_space(keyword)
        .expect("valid keyword")
        .build();
    assert_eq!(sc.boundary_space, expected);
    assert_eq!(sc.construction_mode, ConstructionMode::default());
}

#[rstest]
#[case::preserve("preserve", ConstructionMode::Preserve)]
#[case::strip("strip", ConstructionMode::Strip)]
fn construction_mode_keywords(#[case] keyword: &str, #[case] expected: ConstructionMode) {
    let sc = StaticContextBuilder::new()
        .with_construction_mode(keyword)
        .expect("valid keyword")
        .build();
    assert_eq!(sc.construction_mode, expected);
    assert_eq!(sc.boundary_space, BoundarySpace::default());
}

#[rstest]
#[case::empty("")]
#[case::wrong_case("Preserve")]
#[case::other("lax")]
fn unknown_mode_keywords_are_rejected(#[case] keyword: &str) {
    let err = StaticContextBuilder::new()
        .with_boundary_space(keyword)
        .err()
        .expect("invalid boundary-space");
    assert_eq!(err.code_enum(), ErrorCode::XPST0003);
    assert!(err.is_static());
    let err = StaticContextBuilder::new()
        .with_construction_mode(keyword)
        .err()
        .expect("invalid construction mode");
    assert_eq!(err.code_enum(), ErrorCode::XPST0003);
}

#[test]
fn xml_prefix_cannot_be_rebound() {
    let sc = StaticContextBuilder::new()
        .with_namespace("xml", "urn:elsewhere")
        .with_namespace("app", "urn:app")
        .build();
    assert_eq!(
        sc.namespaces.by_prefix.get("xml").map(String::as_str),
        Some("http://www.w3.org/XML/1998/namespace")
    );
    assert_eq!(sc.namespaces.by_prefix.get("app").map(String::as_str), Some("urn:app"));
}

#[test]
fn undeclared_external_variable_is_a_static_error() {
    let sc = StaticContextBuilder::new().with_variable(ExpandedName::local("known")).build();
    let err = compile_with_context(Expr::external_var(ExpandedName::local("unknown")), &sc).expect_err("undeclared");
    assert_eq!(err.code_enum(), ErrorCode::XPST0008);
    assert!(compile_with_context(Expr::external_var(ExpandedName::local("known")), &sc).is_ok());
}

#[test]
fn timezone_override_wins_over_now() {
    let now = chrono::DateTime::parse_from_rfc3339("2024-03-01T12:00:00+02:00").expect("timestamp");
    let dc = DynamicContextBuilder::<SimpleNode>::new()
        .with_now(now)
        .with_timezone(-300)
        .build();
    assert_eq!(dc.implicit_timezone().local_minus_utc(), -300 * 60);
    let dc = DynamicContextBuilder::<SimpleNode>::new().with_now(now).build();
    assert_eq!(dc.implicit_timezone().local_minus_utc(), 2 * 3600);
}
