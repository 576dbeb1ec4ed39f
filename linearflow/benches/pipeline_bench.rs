//! Benchmarks for definition building and local execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use linearflow::definition::{DefinitionBuilder, WorkflowDefinition};
use linearflow::orders::{order_processing_definition, sample_order, ORDER_FIELDS};
use linearflow::stages::{PassTransform, Transform};
use serde_json::json;
use std::sync::Arc;

fn long_chain(len: usize) -> WorkflowDefinition {
    DefinitionBuilder::linear(
        "bench-chain",
        (0..len).map(|i| {
            let transform: Arc<dyn Transform> = Arc::new(
                PassTransform::new()
                    .forwarding(ORDER_FIELDS)
                    .forwarding((0..i).map(|earlier| format!("step{earlier}")))
                    .assign(format!("step{i}"), json!(i)),
            );
            (format!("Step{i}"), transform)
        }),
    )
    .build()
    .unwrap()
}

fn definition_benchmark(c: &mut Criterion) {
    c.bench_function("build_order_definition", |b| {
        b.iter(|| black_box(order_processing_definition().unwrap()));
    });

    c.bench_function("build_100_stage_chain", |b| {
        b.iter(|| black_box(long_chain(100)));
    });

    let definition = order_processing_definition().unwrap();
    c.bench_function("serialize_order_definition", |b| {
        b.iter(|| black_box(definition.to_json().unwrap()));
    });
}

fn execution_benchmark(c: &mut Criterion) {
    let definition = order_processing_definition().unwrap();
    let input = sample_order("order-bench");
    c.bench_function("run_order_locally", |b| {
        b.iter(|| black_box(definition.run_locally(black_box(&input)).unwrap()));
    });

    let chain = long_chain(100);
    c.bench_function("run_100_stage_chain_locally", |b| {
        b.iter(|| black_box(chain.run_locally(black_box(&input)).unwrap()));
    });
}

criterion_group!(benches, definition_benchmark, execution_benchmark);
criterion_main!(benches);
