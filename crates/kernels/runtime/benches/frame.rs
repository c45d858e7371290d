//! Frame execution benchmarks.
//!
//! Measures one full `execute_frame` pass over a program mixing placement
//! intrinsics, lane-wise kernels, a reduction and an edge detector:
//! - Cost per lane as the instance grows
//! - Steady-state cost once the buffer pool is warm

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use lumen_ir::{
    CanonicalType, CompiledProgram, IntrinsicProperty, IrBuilder, LayoutPolicy, Lifecycle,
    OutputRequest, Payload, PlacementField, PureFn, ReduceOp, TimeChannel, UnaryFn, VariadicFn,
};
use lumen_runtime::{BufferPool, FrameInputs, RuntimeState, TimeInputs, execute_frame};

fn build_program(lanes: usize) -> CompiledProgram {
    let mut b = IrBuilder::new();
    let dots = b.declare_instance("dots", lanes, LayoutPolicy::Unordered, Lifecycle::Static);
    let float = CanonicalType::signal(Payload::Float);
    let lane_float = CanonicalType::field(Payload::Float, dots);

    let uv = b.emit_intrinsic_placement(dots, PlacementField::Uv).unwrap();
    let rid = b
        .emit_intrinsic_property(dots, IntrinsicProperty::RandomId)
        .unwrap();
    let phase = b.emit_time(TimeChannel::PhaseA, float).unwrap();
    let shifted = b
        .emit_kernel_zip_sig(rid, vec![phase], PureFn::Variadic(VariadicFn::Add), lane_float)
        .unwrap();
    let wobble = b
        .emit_kernel_map(shifted, PureFn::Unary(UnaryFn::Sin), lane_float)
        .unwrap();
    let level = b.emit_kernel_reduce(wobble, ReduceOp::Avg, float).unwrap();
    let beat = b.emit_event_wrap(phase).unwrap();

    b.finish(vec![
        OutputRequest::new("uv", uv),
        OutputRequest::new("wobble", wobble),
        OutputRequest::new("level", level),
        OutputRequest::new("beat", beat),
    ])
    .unwrap()
}

fn bench_frame_by_lanes(c: &mut Criterion) {
    let mut group = c.benchmark_group("execute_frame");

    for lanes in [1_000, 10_000, 100_000] {
        let program = build_program(lanes);
        group.throughput(Throughput::Elements(lanes as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lanes), &program, |b, program| {
            let mut state = RuntimeState::for_program(program);
            let mut pool = BufferPool::default();
            let mut frame = 0u64;
            b.iter(|| {
                frame += 1;
                let inputs =
                    FrameInputs::new(TimeInputs::at(frame as f64 * 16.0, 16.0, 1000.0, 4000.0));
                black_box(execute_frame(program, &mut state, &mut pool, frame, &inputs).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_cold_vs_warm_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_pool");
    let lanes = 10_000;
    let program = build_program(lanes);
    let inputs = FrameInputs::new(TimeInputs::at(0.0, 16.0, 1000.0, 4000.0));
    group.throughput(Throughput::Elements(lanes as u64));

    group.bench_function("cold", |b| {
        b.iter(|| {
            let mut state = RuntimeState::for_program(&program);
            let mut pool = BufferPool::default();
            black_box(execute_frame(&program, &mut state, &mut pool, 1, &inputs).unwrap())
        });
    });

    group.bench_function("warm", |b| {
        let mut state = RuntimeState::for_program(&program);
        let mut pool = BufferPool::default();
        let mut frame = 0u64;
        b.iter(|| {
            frame += 1;
            black_box(execute_frame(&program, &mut state, &mut pool, frame, &inputs).unwrap())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_frame_by_lanes, bench_cold_vs_warm_pool);
criterion_main!(benches);
