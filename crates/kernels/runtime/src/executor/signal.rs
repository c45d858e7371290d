//! Signal evaluator: one `f64` per node per frame.

use lumen_ir::{EvalFamily, EventKind, ExprId, ExprKind, IntrinsicKind, KernelKind};

use crate::error::{Error, Result};
use crate::reductions;

use super::FrameEvaluator;

impl FrameEvaluator<'_> {
    /// Evaluate a scalar node, memoised for the current frame.
    ///
    /// Non-finite results are reported to the health monitor and returned
    /// unchanged.
    pub fn eval_scalar(&mut self, id: ExprId) -> Result<f64> {
        let node = self.node(id)?;
        if node.ty.family() != Some(EvalFamily::Scalar) || node.ty.stride() != 1 {
            return Err(self.extent_violation(id, node, EvalFamily::Scalar));
        }
        if let Some(value) = self.state.scalar(id) {
            self.state.stats_mut().scalar_cache_hits += 1;
            return Ok(value);
        }

        let value = match &node.kind {
            ExprKind::Const(literal) => match literal.as_scalar() {
                Some(v) => v,
                None => return Err(self.extent_violation(id, node, EvalFamily::Scalar)),
            },
            ExprKind::SlotRead { slot } => self
                .state
                .slot_value(*slot)
                .ok_or_else(|| Error::UnknownSlot(slot.to_string()))?,
            ExprKind::Time(channel) => self.inputs.time.channel(*channel),
            ExprKind::External { channel } => {
                self.inputs.externals.get(channel).copied().unwrap_or(0.0)
            }
            ExprKind::Kernel(KernelKind::Map { input, func }) => {
                let a = self.eval_scalar(*input)?;
                func.apply_scalar(&[a])
            }
            ExprKind::Kernel(KernelKind::Zip { inputs, func }) => {
                let mut args = Vec::with_capacity(inputs.len());
                for &input in inputs {
                    args.push(self.eval_scalar(input)?);
                }
                func.apply_scalar(&args)
            }
            ExprKind::Kernel(KernelKind::Reduce { field, op }) => {
                let field_node = self.node(*field)?;
                let count = self.lanes_of(*field, field_node.ty)?;
                self.materialize(*field, count)?;
                let lanes = self.state.array(*field).ok_or(Error::MissingArray(*field))?;
                reductions::reduce(*op, lanes)
            }
            ExprKind::State { slot } => self
                .state
                .state_value(*slot)
                .and_then(|values| values.first().copied())
                .ok_or_else(|| Error::UnknownSlot(slot.to_string()))?,
            ExprKind::ShapeRef { .. } => 0.0,
            ExprKind::EventRead { event } => {
                if self.eval_pulse(*event)? {
                    1.0
                } else {
                    0.0
                }
            }
            ExprKind::Intrinsic(IntrinsicKind::Property(_) | IntrinsicKind::Placement(_))
            | ExprKind::Kernel(
                KernelKind::ZipSig { .. }
                | KernelKind::Broadcast { .. }
                | KernelKind::PathDerivative { .. },
            )
            | ExprKind::Event(
                EventKind::Const { .. }
                | EventKind::Pulse
                | EventKind::Wrap { .. }
                | EventKind::Combine { .. }
                | EventKind::Never,
            ) => return Err(self.extent_violation(id, node, EvalFamily::Scalar)),
        };

        let frame = self.frame_id;
        self.state.health_mut().check_scalar(frame, id, value);
        self.state.store_scalar(id, value)?;
        self.state.stats_mut().scalars_computed += 1;
        Ok(value)
    }
}
