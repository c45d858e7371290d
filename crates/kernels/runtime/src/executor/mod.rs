//! Frame executor.
//!
//! One frame is one synchronous pass over the program's step list. Each step
//! dispatches to exactly one evaluator:
//!
//! - [`Step::EvalScalar`] -> signal evaluator ([`FrameEvaluator::eval_scalar`])
//! - [`Step::MaterializeArray`] -> field materializer ([`FrameEvaluator::materialize`])
//! - [`Step::EvalPulse`] -> event evaluator ([`FrameEvaluator::eval_pulse`])
//!
//! followed by output and state writes. Because steps run in scheduler
//! post-order, operands are cached before their dependents; evaluators still
//! resolve operands on demand, so they stay correct when called directly.

mod event;
mod field;
mod placement;
mod signal;

use tracing::{debug, instrument, trace};

use lumen_ir::{CanonicalType, CompiledProgram, EvalFamily, ExprId, ExprNode, Step};

use crate::error::{Error, Result};
use crate::pool::BufferPool;
use crate::state::RuntimeState;
use crate::types::{ArrayOutput, FrameInputs, FrameOutputs};

/// Execute one frame of `program`, mutating `state` in place.
///
/// Array outputs are copied out: the buffers behind them return to `pool`
/// when the next frame starts.
#[instrument(skip_all, fields(frame = frame_id))]
pub fn execute_frame(
    program: &CompiledProgram,
    state: &mut RuntimeState,
    pool: &mut BufferPool,
    frame_id: u64,
    inputs: &FrameInputs,
) -> Result<FrameOutputs> {
    state.begin_frame(pool);

    let mut outputs = FrameOutputs::new(frame_id);
    let mut eval = FrameEvaluator::new(program, state, pool, inputs, frame_id);
    for step in program.schedule().steps() {
        trace!(?step, "step");
        eval.run_step(step, &mut outputs)?;
    }

    let stats = state.stats();
    debug!(
        steps = stats.steps_executed,
        scalars = stats.scalars_computed,
        cache_hits = stats.scalar_cache_hits + stats.array_cache_hits,
        arrays = stats.arrays_materialized,
        pulses = stats.pulses_evaluated,
        "frame complete"
    );
    Ok(outputs)
}

/// Evaluation context for one frame.
pub struct FrameEvaluator<'a> {
    program: &'a CompiledProgram,
    state: &'a mut RuntimeState,
    pool: &'a mut BufferPool,
    inputs: &'a FrameInputs,
    frame_id: u64,
}

impl<'a> FrameEvaluator<'a> {
    /// Bind an evaluator to a started frame (see [`RuntimeState::begin_frame`]).
    pub fn new(
        program: &'a CompiledProgram,
        state: &'a mut RuntimeState,
        pool: &'a mut BufferPool,
        inputs: &'a FrameInputs,
        frame_id: u64,
    ) -> Self {
        Self {
            program,
            state,
            pool,
            inputs,
            frame_id,
        }
    }

    /// Run one scheduled step.
    pub fn run_step(&mut self, step: &Step, outputs: &mut FrameOutputs) -> Result<()> {
        self.state.stats_mut().steps_executed += 1;
        match *step {
            Step::EvalScalar { expr } => {
                self.eval_scalar(expr)?;
            }
            Step::MaterializeArray { expr, instance } => {
                let count = self.state.instance_count(instance)?;
                self.materialize(expr, count)?;
            }
            Step::EvalPulse { expr } => {
                self.eval_pulse(expr)?;
            }
            Step::WriteState { slot, value } => {
                let node = self.node(value)?;
                match node.ty.family() {
                    Some(EvalFamily::Scalar) => {
                        let v = self.eval_scalar(value)?;
                        self.state.write_state(slot, &[v])?;
                    }
                    Some(EvalFamily::Array) => {
                        let lanes = self.array_copy(value)?;
                        self.state.write_state(slot, &lanes)?;
                    }
                    Some(EvalFamily::Pulse) | None => {
                        return Err(self.extent_violation(value, node, EvalFamily::Scalar));
                    }
                }
            }
            Step::WriteOutput { output, expr } => self.write_output(output, expr, outputs)?,
        }
        Ok(())
    }

    fn write_output(&mut self, output: usize, expr: ExprId, outputs: &mut FrameOutputs) -> Result<()> {
        let program = self.program;
        let Some(spec) = program.outputs().get(output) else {
            return Err(Error::UnknownExpr(expr));
        };
        let dt = self.inputs.time.delta_ms;

        match spec.family {
            EvalFamily::Scalar => {
                let raw = self.eval_scalar(expr)?;
                if let Some(slot) = spec.slot {
                    self.state.write_slot(slot, raw)?;
                }
                let value = match spec.continuity {
                    Some(semantic) => self
                        .state
                        .continuity_mut()
                        .apply(&spec.name, semantic, &[raw], dt)
                        .first()
                        .copied()
                        .unwrap_or(raw),
                    None => raw,
                };
                outputs.scalars.insert(spec.name.clone(), value);
            }
            EvalFamily::Array => {
                let mut values = self.array_copy(expr)?;
                if let Some(semantic) = spec.continuity {
                    let smoothed = self
                        .state
                        .continuity_mut()
                        .apply(&spec.name, semantic, &values, dt);
                    values.copy_from_slice(smoothed);
                }
                outputs.arrays.insert(
                    spec.name.clone(),
                    ArrayOutput {
                        stride: spec.ty.stride(),
                        values,
                    },
                );
            }
            EvalFamily::Pulse => {
                let fired = self.eval_pulse(expr)?;
                outputs.pulses.insert(spec.name.clone(), fired);
            }
        }
        Ok(())
    }

    /// The lanes of an array materialized this frame, copied out.
    fn array_copy(&self, id: ExprId) -> Result<Vec<f64>> {
        self.state
            .array(id)
            .map(<[f64]>::to_vec)
            .ok_or(Error::MissingArray(id))
    }

    fn node(&self, id: ExprId) -> Result<&'a ExprNode> {
        let program = self.program;
        program.table().get(id).ok_or(Error::UnknownExpr(id))
    }

    fn extent_violation(&self, expr: ExprId, node: &ExprNode, evaluator: EvalFamily) -> Error {
        Error::ExtentViolation {
            expr,
            kind: node.kind.name(),
            ty: node.ty,
            evaluator,
        }
    }

    /// Live lane count of the instance a field type refers to.
    fn lanes_of(&self, expr: ExprId, ty: CanonicalType) -> Result<usize> {
        match ty.instance() {
            Some(instance) => self.state.instance_count(instance),
            None => Err(Error::ExtentViolation {
                expr,
                kind: "field",
                ty,
                evaluator: EvalFamily::Array,
            }),
        }
    }
}
