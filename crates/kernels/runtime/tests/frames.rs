//! End-to-end frames: build a program, run it, inspect the outputs.

use lumen_ir::{
    BinaryFn, CanonicalType, CompiledProgram, ConstValue, ContinuitySemantic, EvalFamily,
    InstanceId, IntrinsicProperty, IrBuilder, LayoutPolicy, Lifecycle, OutputRequest,
    PathDerivativeOp, Payload, PlacementField, PulseCombine, PureFn, ReduceOp, Step, UnaryFn,
    VariadicFn,
};
use lumen_runtime::{
    BufferPool, Error, FrameEvaluator, FrameInputs, FrameOutputs, RuntimeState, TimeInputs,
    execute_frame,
};

fn float() -> CanonicalType {
    CanonicalType::signal(Payload::Float)
}

fn inputs_at(frame: u64) -> FrameInputs {
    FrameInputs::new(TimeInputs::at(frame as f64 * 50.0, 50.0, 1000.0, 4000.0))
}

/// Run `frames` frames with one external channel set per frame.
fn run_with_external(program: &CompiledProgram, channel: &str, values: &[f64]) -> Vec<FrameOutputs> {
    let mut state = RuntimeState::for_program(program);
    let mut pool = BufferPool::default();
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let frame = i as u64 + 1;
            let inputs = inputs_at(frame).with_external(channel, v);
            execute_frame(program, &mut state, &mut pool, frame, &inputs).unwrap()
        })
        .collect()
}

fn run_once(program: &CompiledProgram) -> FrameOutputs {
    let mut state = RuntimeState::for_program(program);
    let mut pool = BufferPool::default();
    execute_frame(program, &mut state, &mut pool, 1, &inputs_at(1)).unwrap()
}

fn dots(b: &mut IrBuilder, count: usize) -> InstanceId {
    b.declare_instance("dots", count, LayoutPolicy::Line, Lifecycle::Static)
}

#[test]
fn test_int_constants_add_to_eight() {
    let mut b = IrBuilder::new();
    let int = CanonicalType::constant(Payload::Int);
    let five = b.emit_const(ConstValue::Int(5), int).unwrap();
    let three = b.emit_const(ConstValue::Int(3), int).unwrap();
    let sum = b
        .emit_kernel_zip(
            vec![five, three],
            PureFn::Variadic(VariadicFn::Add),
            CanonicalType::signal(Payload::Int),
        )
        .unwrap();
    let program = b.finish(vec![OutputRequest::new("sum", sum)]).unwrap();

    assert_eq!(run_once(&program).scalar("sum"), Some(8.0));
}

#[test]
fn test_index_and_normalized_index() {
    let mut b = IrBuilder::new();
    let inst = dots(&mut b, 4);
    let index = b
        .emit_intrinsic_property(inst, IntrinsicProperty::Index)
        .unwrap();
    let norm = b
        .emit_intrinsic_property(inst, IntrinsicProperty::NormalizedIndex)
        .unwrap();
    let program = b
        .finish(vec![
            OutputRequest::new("index", index),
            OutputRequest::new("norm", norm),
        ])
        .unwrap();

    let out = run_once(&program);
    assert_eq!(out.array("index").unwrap().values, vec![0.0, 1.0, 2.0, 3.0]);
    let norm = &out.array("norm").unwrap().values;
    let expected = [0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0];
    for (got, want) in norm.iter().zip(expected) {
        assert!((got - want).abs() < 1e-12, "{got} != {want}");
    }
}

#[test]
fn test_broadcast_constant() {
    let mut b = IrBuilder::new();
    let inst = dots(&mut b, 5);
    let seven = b
        .emit_const(ConstValue::Float(7.0), CanonicalType::constant(Payload::Float))
        .unwrap();
    let spread = b
        .emit_kernel_broadcast(seven, CanonicalType::field(Payload::Float, inst))
        .unwrap();
    let program = b.finish(vec![OutputRequest::new("spread", spread)]).unwrap();

    let out = run_once(&program);
    let spread = out.array("spread").unwrap();
    assert_eq!(spread.stride, 1);
    assert_eq!(spread.values, vec![7.0; 5]);
}

#[test]
fn test_pulse_combine_any_and_all() {
    let mut b = IrBuilder::new();
    let pulse = b.emit_event_pulse().unwrap();
    let never = b.emit_event_never().unwrap();
    let any = b
        .emit_event_combine(vec![pulse, never], PulseCombine::Any)
        .unwrap();
    let all = b
        .emit_event_combine(vec![pulse, never], PulseCombine::All)
        .unwrap();
    let program = b
        .finish(vec![OutputRequest::new("any", any), OutputRequest::new("all", all)])
        .unwrap();

    let mut state = RuntimeState::for_program(&program);
    let mut pool = BufferPool::default();
    for frame in 1..=5 {
        let out = execute_frame(&program, &mut state, &mut pool, frame, &inputs_at(frame)).unwrap();
        assert_eq!(out.pulse("any"), Some(true));
        assert_eq!(out.pulse("all"), Some(false));
    }
}

#[test]
fn test_wrap_fires_on_rising_edges_only() {
    let mut b = IrBuilder::new();
    let gate = b.emit_external("gate", float()).unwrap();
    let edge = b.emit_event_wrap(gate).unwrap();
    let program = b.finish(vec![OutputRequest::new("edge", edge)]).unwrap();

    let frames = run_with_external(&program, "gate", &[0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 1.0]);
    let fired: Vec<usize> = frames
        .iter()
        .enumerate()
        .filter(|(_, out)| out.pulse("edge") == Some(true))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(fired, vec![2, 6]);
}

#[test]
fn test_wrap_treats_nan_as_false() {
    let mut b = IrBuilder::new();
    let gate = b.emit_external("gate", float()).unwrap();
    let edge = b.emit_event_wrap(gate).unwrap();
    let program = b.finish(vec![OutputRequest::new("edge", edge)]).unwrap();

    let frames = run_with_external(&program, "gate", &[f64::NAN, 1.0, f64::INFINITY, 1.0]);
    let fired: Vec<bool> = frames.iter().map(|out| out.pulse("edge") == Some(true)).collect();
    assert_eq!(fired, vec![false, true, false, true]);
}

#[test]
fn test_broadcast_then_reduce_round_trips() {
    let mut b = IrBuilder::new();
    let inst = dots(&mut b, 8);
    let v = b.emit_external("v", float()).unwrap();
    let lanes = b
        .emit_kernel_broadcast(v, CanonicalType::field(Payload::Float, inst))
        .unwrap();
    let sum = b.emit_kernel_reduce(lanes, ReduceOp::Sum, float()).unwrap();
    let avg = b.emit_kernel_reduce(lanes, ReduceOp::Avg, float()).unwrap();
    let program = b
        .finish(vec![OutputRequest::new("sum", sum), OutputRequest::new("avg", avg)])
        .unwrap();

    let out = &run_with_external(&program, "v", &[2.5])[0];
    assert_eq!(out.scalar("sum"), Some(20.0));
    assert_eq!(out.scalar("avg"), Some(2.5));
}

#[test]
fn test_broadcast_reduce_is_exact_for_inexact_values() {
    for lanes in [1, 3, 7] {
        let mut b = IrBuilder::new();
        let inst = dots(&mut b, lanes);
        let v = b.emit_external("v", float()).unwrap();
        let spread = b
            .emit_kernel_broadcast(v, CanonicalType::field(Payload::Float, inst))
            .unwrap();
        let avg = b.emit_kernel_reduce(spread, ReduceOp::Avg, float()).unwrap();
        let sum = b.emit_kernel_reduce(spread, ReduceOp::Sum, float()).unwrap();
        let max = b.emit_kernel_reduce(spread, ReduceOp::Max, float()).unwrap();
        let program = b
            .finish(vec![
                OutputRequest::new("avg", avg),
                OutputRequest::new("sum", sum),
                OutputRequest::new("max", max),
            ])
            .unwrap();

        for s in [0.1, 0.7, 1.0 / 3.0] {
            let out = &run_with_external(&program, "v", &[s])[0];
            assert_eq!(out.scalar("avg"), Some(s), "avg over {lanes} lanes of {s}");
            assert_eq!(out.scalar("sum"), Some(lanes as f64 * s), "sum over {lanes} lanes of {s}");
            assert_eq!(out.scalar("max"), Some(s), "max over {lanes} lanes of {s}");
        }
    }
}

#[test]
fn test_reduce_ops_over_index() {
    let mut b = IrBuilder::new();
    let inst = dots(&mut b, 4);
    let index = b
        .emit_intrinsic_property(inst, IntrinsicProperty::Index)
        .unwrap();
    let mut requests = Vec::new();
    for (name, op) in [
        ("min", ReduceOp::Min),
        ("max", ReduceOp::Max),
        ("sum", ReduceOp::Sum),
        ("avg", ReduceOp::Avg),
    ] {
        let r = b.emit_kernel_reduce(index, op, float()).unwrap();
        requests.push(OutputRequest::new(name, r));
    }
    let program = b.finish(requests).unwrap();

    let out = run_once(&program);
    assert_eq!(out.scalar("min"), Some(0.0));
    assert_eq!(out.scalar("max"), Some(3.0));
    assert_eq!(out.scalar("sum"), Some(6.0));
    assert_eq!(out.scalar("avg"), Some(1.5));
}

#[test]
fn test_reduce_over_empty_instance_is_zero() {
    let mut b = IrBuilder::new();
    let inst = b.declare_instance("none", 0, LayoutPolicy::Unordered, Lifecycle::Dynamic);
    let index = b
        .emit_intrinsic_property(inst, IntrinsicProperty::Index)
        .unwrap();
    let min = b.emit_kernel_reduce(index, ReduceOp::Min, float()).unwrap();
    let avg = b.emit_kernel_reduce(index, ReduceOp::Avg, float()).unwrap();
    let program = b
        .finish(vec![OutputRequest::new("min", min), OutputRequest::new("avg", avg)])
        .unwrap();

    let out = run_once(&program);
    assert_eq!(out.scalar("min"), Some(0.0));
    assert_eq!(out.scalar("avg"), Some(0.0));
}

#[test]
fn test_shared_subtree_is_computed_once() {
    let mut b = IrBuilder::new();
    let x = b.emit_external("x", float()).unwrap();
    let root = b
        .emit_kernel_map(x, PureFn::Unary(UnaryFn::Sqrt), float())
        .unwrap();
    let again = b
        .emit_kernel_map(x, PureFn::Unary(UnaryFn::Sqrt), float())
        .unwrap();
    assert_eq!(root, again);
    let doubled = b
        .emit_kernel_zip(vec![root, again], PureFn::Variadic(VariadicFn::Add), float())
        .unwrap();
    let program = b.finish(vec![OutputRequest::new("doubled", doubled)]).unwrap();

    let mut state = RuntimeState::for_program(&program);
    let mut pool = BufferPool::default();
    let inputs = inputs_at(1).with_external("x", 9.0);
    let out = execute_frame(&program, &mut state, &mut pool, 1, &inputs).unwrap();
    assert_eq!(out.scalar("doubled"), Some(6.0));

    // x, sqrt(x), and the sum: each computed exactly once.
    let stats = state.stats();
    assert_eq!(stats.scalars_computed, 3);
    assert!(stats.scalar_cache_hits >= 2);
}

#[test]
fn test_reevaluation_within_a_frame_hits_the_cache() {
    let mut b = IrBuilder::new();
    let inst = dots(&mut b, 3);
    let x = b.emit_external("x", float()).unwrap();
    let lanes = b
        .emit_kernel_broadcast(x, CanonicalType::field(Payload::Float, inst))
        .unwrap();
    let program = b.finish(vec![OutputRequest::new("lanes", lanes)]).unwrap();

    let mut state = RuntimeState::for_program(&program);
    let mut pool = BufferPool::default();
    let inputs = inputs_at(1).with_external("x", 4.0);
    execute_frame(&program, &mut state, &mut pool, 1, &inputs).unwrap();
    let before = state.stats();

    let mut eval = FrameEvaluator::new(&program, &mut state, &mut pool, &inputs, 1);
    assert_eq!(eval.eval_scalar(x).unwrap(), 4.0);
    eval.materialize(lanes, 3).unwrap();

    let after = state.stats();
    assert_eq!(after.scalars_computed, before.scalars_computed);
    assert_eq!(after.arrays_materialized, before.arrays_materialized);
    assert_eq!(after.scalar_cache_hits, before.scalar_cache_hits + 1);
    assert_eq!(after.array_cache_hits, before.array_cache_hits + 1);
    assert_eq!(state.array(lanes), Some(&[4.0, 4.0, 4.0][..]));
}

#[test]
fn test_new_frame_recomputes() {
    let mut b = IrBuilder::new();
    let x = b.emit_external("x", float()).unwrap();
    let neg = b.emit_kernel_map(x, PureFn::Unary(UnaryFn::Neg), float()).unwrap();
    let program = b.finish(vec![OutputRequest::new("neg", neg)]).unwrap();

    let frames = run_with_external(&program, "x", &[1.0, 2.0, 3.0]);
    let values: Vec<f64> = frames.iter().map(|f| f.scalar("neg").unwrap()).collect();
    assert_eq!(values, vec![-1.0, -2.0, -3.0]);
}

#[test]
fn test_evaluator_rejects_wrong_family() {
    let mut b = IrBuilder::new();
    let inst = dots(&mut b, 2);
    let index = b
        .emit_intrinsic_property(inst, IntrinsicProperty::Index)
        .unwrap();
    let x = b.emit_external("x", float()).unwrap();
    let program = b.finish(vec![OutputRequest::new("index", index)]).unwrap();

    let mut state = RuntimeState::for_program(&program);
    let mut pool = BufferPool::default();
    let inputs = inputs_at(1);
    state.begin_frame(&mut pool);
    let mut eval = FrameEvaluator::new(&program, &mut state, &mut pool, &inputs, 1);

    assert!(matches!(
        eval.eval_scalar(index),
        Err(Error::ExtentViolation {
            evaluator: EvalFamily::Scalar,
            ..
        })
    ));
    assert!(matches!(
        eval.materialize(x, 2),
        Err(Error::ExtentViolation {
            evaluator: EvalFamily::Array,
            ..
        })
    ));
    assert!(matches!(
        eval.eval_pulse(x),
        Err(Error::ExtentViolation {
            evaluator: EvalFamily::Pulse,
            ..
        })
    ));
}

#[test]
fn test_shape_ref_reads_zero_but_evaluates_its_params() {
    let mut b = IrBuilder::new();
    let size = b.emit_external("size", float()).unwrap();
    let shape = b.emit_shape_ref(7, vec![size], float()).unwrap();
    let program = b.finish(vec![OutputRequest::new("shape", shape)]).unwrap();

    let steps = program.schedule().steps();
    let param_step = steps
        .iter()
        .position(|s| *s == Step::EvalScalar { expr: size })
        .unwrap();
    let shape_step = steps
        .iter()
        .position(|s| *s == Step::EvalScalar { expr: shape })
        .unwrap();
    assert!(param_step < shape_step);

    let mut state = RuntimeState::for_program(&program);
    let mut pool = BufferPool::default();
    let inputs = inputs_at(1).with_external("size", 12.5);
    let out = execute_frame(&program, &mut state, &mut pool, 1, &inputs).unwrap();
    assert_eq!(out.scalar("shape"), Some(0.0));
    assert_eq!(state.scalar(size), Some(12.5));

    state.begin_frame(&mut pool);
    let mut eval = FrameEvaluator::new(&program, &mut state, &mut pool, &inputs, 2);
    assert!(matches!(
        eval.eval_pulse(shape),
        Err(Error::ExtentViolation {
            evaluator: EvalFamily::Pulse,
            ..
        })
    ));
}

#[test]
fn test_path_derivatives_of_line_uv() {
    let mut b = IrBuilder::new();
    let inst = dots(&mut b, 3);
    let uv = b
        .emit_intrinsic_placement(inst, PlacementField::Uv)
        .unwrap();
    let tangent = b
        .emit_kernel_path_derivative(
            uv,
            PathDerivativeOp::Tangent,
            CanonicalType::field(Payload::Vec2, inst),
        )
        .unwrap();
    let length = b
        .emit_kernel_path_derivative(
            uv,
            PathDerivativeOp::ArcLength,
            CanonicalType::field(Payload::Float, inst),
        )
        .unwrap();
    let program = b
        .finish(vec![
            OutputRequest::new("uv", uv),
            OutputRequest::new("tangent", tangent),
            OutputRequest::new("length", length),
        ])
        .unwrap();

    let out = run_once(&program);
    assert_eq!(
        out.array("uv").unwrap().values,
        vec![0.0, 0.5, 0.5, 0.5, 1.0, 0.5]
    );
    let tangent = out.array("tangent").unwrap();
    assert_eq!(tangent.stride, 2);
    assert_eq!(tangent.values, vec![0.5, 0.0, 0.5, 0.0, 0.5, 0.0]);
    let length = out.array("length").unwrap();
    assert_eq!(length.stride, 1);
    assert_eq!(length.values, vec![0.0, 0.5, 1.0]);
}

#[test]
fn test_rank_and_seed_lanes_stay_in_unit_range() {
    let mut b = IrBuilder::new();
    let inst = b.declare_instance("sparks", 16, LayoutPolicy::Unordered, Lifecycle::Static);
    let rank = b
        .emit_intrinsic_placement(inst, PlacementField::Rank)
        .unwrap();
    let seed = b
        .emit_intrinsic_placement(inst, PlacementField::Seed)
        .unwrap();
    let program = b
        .finish(vec![
            OutputRequest::new("rank", rank),
            OutputRequest::new("seed", seed),
        ])
        .unwrap();

    let frames = run_with_external(&program, "unused", &[0.0; 2]);
    let ranks = &frames[0].array("rank").unwrap().values;
    let expected: Vec<f64> = (0..16).map(|i| i as f64 / 16.0).collect();
    assert_eq!(ranks, &expected);

    let seeds = &frames[0].array("seed").unwrap().values;
    assert_eq!(seeds.len(), 16);
    assert!(seeds.iter().all(|v| (0.0..1.0).contains(v)));
    let mut sorted = seeds.clone();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    assert_eq!(sorted.len(), 16);
    assert_eq!(seeds, &frames[1].array("seed").unwrap().values);
}

#[test]
fn test_frame_outputs_survive_json() {
    let mut b = IrBuilder::new();
    let inst = dots(&mut b, 3);
    let x = b.emit_external("x", float()).unwrap();
    let uv = b
        .emit_intrinsic_placement(inst, PlacementField::Uv)
        .unwrap();
    let pulse = b.emit_event_pulse().unwrap();
    let program = b
        .finish(vec![
            OutputRequest::new("x", x),
            OutputRequest::new("uv", uv),
            OutputRequest::new("tick", pulse),
        ])
        .unwrap();

    let out = run_with_external(&program, "x", &[0.25]).remove(0);
    let json = serde_json::to_string(&out).unwrap();
    let back: FrameOutputs = serde_json::from_str(&json).unwrap();
    assert_eq!(back, out);
    assert_eq!(back.scalar("x"), Some(0.25));
    assert_eq!(back.array("uv").unwrap().stride, 2);
    assert_eq!(back.pulse("tick"), Some(true));
}

#[test]
fn test_lane_count_mismatch_is_fatal() {
    let mut b = IrBuilder::new();
    let inst = dots(&mut b, 3);
    let index = b
        .emit_intrinsic_property(inst, IntrinsicProperty::Index)
        .unwrap();
    let program = b.finish(vec![OutputRequest::new("index", index)]).unwrap();

    let mut state = RuntimeState::for_program(&program);
    let mut pool = BufferPool::default();
    let inputs = inputs_at(1);
    execute_frame(&program, &mut state, &mut pool, 1, &inputs).unwrap();

    let mut eval = FrameEvaluator::new(&program, &mut state, &mut pool, &inputs, 1);
    assert!(matches!(
        eval.materialize(index, 5),
        Err(Error::LaneCountMismatch {
            expected: 5,
            found: 3,
            ..
        })
    ));
}

#[test]
fn test_zip_broadcasts_zero_cardinality_constant() {
    let mut b = IrBuilder::new();
    let inst = dots(&mut b, 3);
    let index = b
        .emit_intrinsic_property(inst, IntrinsicProperty::Index)
        .unwrap();
    let ten = b
        .emit_const(ConstValue::Float(10.0), CanonicalType::constant(Payload::Float))
        .unwrap();
    let scaled = b
        .emit_kernel_zip(
            vec![index, ten],
            PureFn::Variadic(VariadicFn::Mul),
            CanonicalType::field(Payload::Float, inst),
        )
        .unwrap();
    let program = b.finish(vec![OutputRequest::new("scaled", scaled)]).unwrap();

    assert_eq!(
        run_once(&program).array("scaled").unwrap().values,
        vec![0.0, 10.0, 20.0]
    );
}

#[test]
fn test_zip_sig_passes_field_first() {
    let mut b = IrBuilder::new();
    let inst = dots(&mut b, 3);
    let index = b
        .emit_intrinsic_property(inst, IntrinsicProperty::Index)
        .unwrap();
    let x = b.emit_external("x", float()).unwrap();
    let diff = b
        .emit_kernel_zip_sig(
            index,
            vec![x],
            PureFn::Binary(BinaryFn::Sub),
            CanonicalType::field(Payload::Float, inst),
        )
        .unwrap();
    let program = b.finish(vec![OutputRequest::new("diff", diff)]).unwrap();

    let out = &run_with_external(&program, "x", &[1.0])[0];
    assert_eq!(out.array("diff").unwrap().values, vec![-1.0, 0.0, 1.0]);
}

#[test]
fn test_event_read_feeds_signals() {
    let mut b = IrBuilder::new();
    let pulse = b.emit_event_pulse().unwrap();
    let never = b.emit_event_never().unwrap();
    let on = b.emit_event_read(pulse, float()).unwrap();
    let off = b.emit_event_read(never, float()).unwrap();
    let program = b
        .finish(vec![OutputRequest::new("on", on), OutputRequest::new("off", off)])
        .unwrap();

    let out = run_once(&program);
    assert_eq!(out.scalar("on"), Some(1.0));
    assert_eq!(out.scalar("off"), Some(0.0));
}

#[test]
fn test_missing_external_reads_zero() {
    let mut b = IrBuilder::new();
    let x = b.emit_external("absent", float()).unwrap();
    let program = b.finish(vec![OutputRequest::new("x", x)]).unwrap();
    assert_eq!(run_once(&program).scalar("x"), Some(0.0));
}

#[test]
fn test_state_reads_lag_writes_by_one_frame() {
    let mut b = IrBuilder::new();
    let slot = b
        .alloc_state_slot("count", float(), ConstValue::Float(0.0))
        .unwrap();
    let current = b.emit_state(slot).unwrap();
    let one = b
        .emit_const(ConstValue::Float(1.0), CanonicalType::constant(Payload::Float))
        .unwrap();
    let next = b
        .emit_kernel_zip(vec![current, one], PureFn::Variadic(VariadicFn::Add), float())
        .unwrap();
    b.set_state_update(slot, next).unwrap();
    let program = b.finish(vec![OutputRequest::new("count", current)]).unwrap();

    let frames = run_with_external(&program, "unused", &[0.0; 4]);
    let counts: Vec<f64> = frames.iter().map(|f| f.scalar("count").unwrap()).collect();
    assert_eq!(counts, vec![0.0, 1.0, 2.0, 3.0]);

    // All state writes come after every evaluation step.
    let steps = program.schedule().steps();
    let first_write = steps
        .iter()
        .position(|s| matches!(s, Step::WriteState { .. }))
        .unwrap();
    assert!(steps[first_write..]
        .iter()
        .all(|s| matches!(s, Step::WriteState { .. })));
}

#[test]
fn test_value_slot_written_by_output_is_read_next_frame() {
    let mut b = IrBuilder::new();
    let last = b.alloc_value_slot("last", float()).unwrap();
    let x = b.emit_external("x", float()).unwrap();
    let prev = b.emit_slot_read(last).unwrap();
    let program = b
        .finish(vec![
            OutputRequest::new("x", x).with_slot(last),
            OutputRequest::new("prev", prev),
        ])
        .unwrap();

    let frames = run_with_external(&program, "x", &[3.0, 5.0, 8.0]);
    let prevs: Vec<f64> = frames.iter().map(|f| f.scalar("prev").unwrap()).collect();
    assert_eq!(prevs, vec![0.0, 3.0, 5.0]);
}

#[test]
fn test_continuity_smooths_scalar_output() {
    let mut b = IrBuilder::new();
    let x = b.emit_external("x", float()).unwrap();
    let program = b
        .finish(vec![
            OutputRequest::new("x", x).with_continuity(ContinuitySemantic::Opacity),
        ])
        .unwrap();

    // Opacity defaults to linear over 200 ms; frames are 50 ms apart.
    let frames = run_with_external(&program, "x", &[0.0, 1.0, 1.0]);
    let values: Vec<f64> = frames.iter().map(|f| f.scalar("x").unwrap()).collect();
    assert_eq!(values[0], 0.0);
    assert!((values[1] - 0.25).abs() < 1e-12);
    assert!((values[2] - 0.4375).abs() < 1e-12);
}

#[test]
fn test_dynamic_instance_resizes_state_lanes() {
    let mut b = IrBuilder::new();
    let inst = b.declare_instance("sparks", 3, LayoutPolicy::Unordered, Lifecycle::Dynamic);
    let ty = CanonicalType::field(Payload::Float, inst);
    let slot = b.alloc_state_slot("age", ty, ConstValue::Float(1.0)).unwrap();
    let age = b.emit_state(slot).unwrap();
    let one = b
        .emit_const(ConstValue::Float(1.0), CanonicalType::constant(Payload::Float))
        .unwrap();
    let older = b
        .emit_kernel_zip(vec![age, one], PureFn::Variadic(VariadicFn::Add), ty)
        .unwrap();
    b.set_state_update(slot, older).unwrap();
    let program = b.finish(vec![OutputRequest::new("age", age)]).unwrap();

    let mut state = RuntimeState::for_program(&program);
    let mut pool = BufferPool::default();
    let out = execute_frame(&program, &mut state, &mut pool, 1, &inputs_at(1)).unwrap();
    assert_eq!(out.array("age").unwrap().values, vec![1.0; 3]);

    state.set_instance_count(inst, 5).unwrap();
    let out = execute_frame(&program, &mut state, &mut pool, 2, &inputs_at(2)).unwrap();
    assert_eq!(
        out.array("age").unwrap().values,
        vec![2.0, 2.0, 2.0, 1.0, 1.0]
    );

    state.set_instance_count(inst, 2).unwrap();
    let out = execute_frame(&program, &mut state, &mut pool, 3, &inputs_at(3)).unwrap();
    assert_eq!(out.array("age").unwrap().values, vec![3.0, 3.0]);
}

#[test]
fn test_instance_lifecycles_guard_resizing() {
    let mut b = IrBuilder::new();
    let fixed = b.declare_instance("fixed", 4, LayoutPolicy::Line, Lifecycle::Static);
    let pooled = b.declare_instance("pooled", 4, LayoutPolicy::Line, Lifecycle::Pooled);
    let program = b.finish(Vec::new()).unwrap();
    let mut state = RuntimeState::for_program(&program);

    assert!(matches!(
        state.set_instance_count(fixed, 5),
        Err(Error::InstanceLifecycle { .. })
    ));
    assert!(state.set_instance_count(fixed, 4).is_ok());
    assert!(state.set_instance_count(pooled, 2).is_ok());
    assert_eq!(state.instance_count(pooled).unwrap(), 2);
    assert!(matches!(
        state.set_instance_count(pooled, 5),
        Err(Error::InstanceLifecycle { requested: 5, .. })
    ));
}

#[test]
fn test_nan_is_reported_not_fatal() {
    let mut b = IrBuilder::new();
    let x = b.emit_external("x", float()).unwrap();
    let root = b
        .emit_kernel_map(x, PureFn::Unary(UnaryFn::Sqrt), float())
        .unwrap();
    let program = b.finish(vec![OutputRequest::new("root", root)]).unwrap();

    let mut state = RuntimeState::for_program(&program);
    let mut pool = BufferPool::default();
    let inputs = inputs_at(1).with_external("x", -1.0);
    let out = execute_frame(&program, &mut state, &mut pool, 1, &inputs).unwrap();

    assert!(out.scalar("root").unwrap().is_nan());
    assert!(!state.health().is_healthy());
    assert_eq!(state.health().nan_total(), 1);
}

#[test]
fn test_array_outputs_survive_buffer_recycling() {
    let mut b = IrBuilder::new();
    let inst = dots(&mut b, 4);
    let x = b.emit_external("x", float()).unwrap();
    let lanes = b
        .emit_kernel_broadcast(x, CanonicalType::field(Payload::Float, inst))
        .unwrap();
    let program = b.finish(vec![OutputRequest::new("lanes", lanes)]).unwrap();

    let frames = run_with_external(&program, "x", &[1.0, 2.0]);
    assert_eq!(frames[0].array("lanes").unwrap().values, vec![1.0; 4]);
    assert_eq!(frames[1].array("lanes").unwrap().values, vec![2.0; 4]);
}
