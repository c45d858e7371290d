//! Lumen Tools
//!
//! CLI tools for running and inspecting Lumen programs.

use tracing_subscriber::{EnvFilter, fmt};

use lumen_ir::{
    BinaryFn, CanonicalType, CompiledProgram, ConstValue, ContinuitySemantic, IntrinsicProperty,
    IrBuilder, LayoutPolicy, Lifecycle, OutputRequest, Payload, PlacementField, PulseCombine,
    PureFn, ReduceOp, TimeChannel, UnaryFn, VariadicFn,
};

/// Initialize logging with a default filter.
///
/// Use `RUST_LOG` environment variable to override the default filter.
/// Default is `info`, with frame summaries from the runtime at `debug`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lumen_runtime=debug"));

    fmt().with_env_filter(filter).with_target(false).init();
}

/// A small patch exercising every evaluator.
///
/// - `uv`: placement of `lanes` dots on a grid
/// - `size`: per-dot radius pulsing with phase A, smoothed as a radius
/// - `level`: average size across all dots
/// - `beat`: fires whenever phase A wraps past one half, or on the
///   `trigger` external
/// - `count`: number of beats so far
pub fn demo_program(lanes: usize) -> lumen_ir::Result<CompiledProgram> {
    let mut b = IrBuilder::new();
    let columns = (lanes as f64).sqrt().ceil().max(1.0) as u32;
    let dots = b.declare_instance(
        "dots",
        lanes,
        LayoutPolicy::Grid { columns },
        Lifecycle::Pooled,
    );
    let float = CanonicalType::signal(Payload::Float);
    let lane_float = CanonicalType::field(Payload::Float, dots);
    let constant = CanonicalType::constant(Payload::Float);

    b.set_site("demo.uv");
    let uv = b.emit_intrinsic_placement(dots, PlacementField::Uv)?;

    b.set_site("demo.size");
    let phase = b.emit_time(TimeChannel::PhaseA, float)?;
    let rid = b.emit_intrinsic_property(dots, IntrinsicProperty::RandomId)?;
    let offset = b.emit_kernel_zip_sig(rid, vec![phase], PureFn::Variadic(VariadicFn::Add), lane_float)?;
    let tau = b.emit_const(ConstValue::Float(std::f64::consts::TAU), constant)?;
    let angle = b.emit_kernel_zip(vec![offset, tau], PureFn::Variadic(VariadicFn::Mul), lane_float)?;
    let wave = b.emit_kernel_map(angle, PureFn::Unary(UnaryFn::Sin), lane_float)?;
    let base = b.emit_const(ConstValue::Float(4.0), constant)?;
    let size = b.emit_kernel_zip(vec![wave, base], PureFn::Variadic(VariadicFn::Add), lane_float)?;

    b.set_site("demo.level");
    let level = b.emit_kernel_reduce(size, ReduceOp::Avg, float)?;

    b.set_site("demo.beat");
    let half = b.emit_const(ConstValue::Float(0.5), constant)?;
    let past_half = b.emit_kernel_zip(vec![phase, half], PureFn::Binary(BinaryFn::Gt), float)?;
    let wrap = b.emit_event_wrap(past_half)?;
    let trigger = b.emit_external("trigger", float)?;
    let pressed = b.emit_event_wrap(trigger)?;
    let beat = b.emit_event_combine(vec![wrap, pressed], PulseCombine::Any)?;

    b.set_site("demo.count");
    let slot = b.alloc_state_slot("beats", float, ConstValue::Float(0.0))?;
    let count = b.emit_state(slot)?;
    let fired = b.emit_event_read(beat, float)?;
    let next = b.emit_kernel_zip(vec![count, fired], PureFn::Variadic(VariadicFn::Add), float)?;
    b.set_state_update(slot, next)?;
    b.clear_site();

    b.finish(vec![
        OutputRequest::new("uv", uv).with_continuity(ContinuitySemantic::Position),
        OutputRequest::new("size", size).with_continuity(ContinuitySemantic::Radius),
        OutputRequest::new("level", level),
        OutputRequest::new("beat", beat),
        OutputRequest::new("count", count),
    ])
}
