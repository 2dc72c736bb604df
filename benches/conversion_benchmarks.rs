/// 值转换与跨边界调用基准测试
///
/// 覆盖基本值往返、容器转换、宿主/脚本双向调用

use std::hint::black_box;
use criterion::{criterion_group, criterion_main, Criterion, BenchmarkId};
use quickjs_bind::{Context, HostFunction, HostValue, Runtime};

fn setup() -> (Runtime, Context) {
    let runtime = Runtime::new().unwrap();
    let context = runtime.new_context().unwrap();
    (runtime, context)
}

// ============================================================================
// 值转换
// ============================================================================

fn bench_primitive_round_trip(c: &mut Criterion) {
    let (_rt, ctx) = setup();
    let mut group = c.benchmark_group("primitive_round_trip");

    group.bench_function("int", |bencher| {
        bencher.iter(|| {
            ctx.set("v", black_box(42)).unwrap();
            black_box(ctx.get("v").unwrap())
        });
    });

    group.bench_function("string", |bencher| {
        bencher.iter(|| {
            ctx.set("v", black_box("hello quickjs")).unwrap();
            black_box(ctx.get("v").unwrap())
        });
    });

    group.finish();
}

fn bench_list_materialize(c: &mut Criterion) {
    let (_rt, ctx) = setup();
    let mut group = c.benchmark_group("list_materialize");

    for size in [10usize, 100, 1000] {
        let items: Vec<HostValue> = (0..size as i64).map(HostValue::Int).collect();
        ctx.set("items", HostValue::List(items)).unwrap();
        let handle = ctx.get("items").unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), &handle, |bencher, handle| {
            bencher.iter(|| black_box(handle.materialize().unwrap()));
        });
    }

    group.finish();
}

// ============================================================================
// 跨边界调用
// ============================================================================

fn bench_calls(c: &mut Criterion) {
    let (_rt, ctx) = setup();
    ctx.eval_script("function add(a, b) { return a + b; }").unwrap();
    ctx.set(
        "hostAdd",
        HostFunction::new(2, |args: &[HostValue]| {
            let a = args.first().and_then(HostValue::as_i64).unwrap_or(0);
            let b = args.get(1).and_then(HostValue::as_i64).unwrap_or(0);
            Ok(HostValue::Int(a + b))
        }),
    )
    .unwrap();
    let add = ctx.get("add").unwrap();
    let add = add.as_function().unwrap().clone();

    let mut group = c.benchmark_group("calls");

    group.bench_function("host_to_script", |bencher| {
        bencher.iter(|| black_box(add.call(&[HostValue::Int(1), HostValue::Int(2)]).unwrap()));
    });

    group.bench_function("script_to_host", |bencher| {
        bencher.iter(|| {
            black_box(
                ctx.eval_script("let s = 0; for (let i = 0; i < 100; i++) s = hostAdd(s, i); s")
                    .unwrap(),
            )
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_primitive_round_trip,
    bench_list_materialize,
    bench_calls,
);
criterion_main!(benches);
