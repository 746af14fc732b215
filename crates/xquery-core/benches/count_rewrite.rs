use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use xquery_core::expr::{ComparisonOp, SystemFunction};
use xquery_core::{
    DynamicContextBuilder, ExpandedName, Expr, SimpleNode, StaticContextBuilder, XdmAtomicValue, XdmItem,
    compile_with_context, evaluate,
};

fn count_gt(n: i64) -> Expr {
    Expr::value_compare(
        Expr::call(SystemFunction::Count, vec![Expr::external_var(ExpandedName::local("x"))]),
        ComparisonOp::Gt,
        Expr::integer(n),
    )
}

fn benchmark_count_comparison(c: &mut Criterion) {
    let x = ExpandedName::local("x");
    let items = (0..10_000)
        .map(|i| XdmItem::Atomic(XdmAtomicValue::Integer(i)))
        .collect::<Vec<XdmItem<SimpleNode>>>();
    let ctx = DynamicContextBuilder::new().with_variable(x.clone(), items).build();

    let mut group = c.benchmark_group("count/compare");
    for optimize in [true, false] {
        let sc = StaticContextBuilder::new()
            .with_variable(x.clone())
            .with_optimizer(optimize)
            .build();
        let program = compile_with_context(count_gt(3), &sc).expect("compile failure");
        let label = if optimize { "rewritten" } else { "direct" };
        group.bench_with_input(BenchmarkId::from_parameter(label), &program, |b, prog| {
            b.iter(|| {
                let result = evaluate(prog, black_box(&ctx)).expect("eval failure");
                black_box(result.len());
            });
        });
    }
    group.finish();
}

fn benchmark_compile(c: &mut Criterion) {
    let sc = StaticContextBuilder::new()
        .with_variable(ExpandedName::local("x"))
        .build();
    c.bench_function("count/compile", |b| {
        b.iter(|| {
            let compiled = compile_with_context(black_box(count_gt(3)), &sc).expect("compile failure");
            black_box(compiled);
        })
    });
}

criterion_group!(benches, benchmark_count_comparison, benchmark_compile);
criterion_main!(benches);
