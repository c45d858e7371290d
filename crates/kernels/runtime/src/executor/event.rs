//! Event evaluator: one boolean per node per frame.
//!
//! Pulses are not cached. `event.wrap` keeps edge history in the runtime
//! state keyed by frame stamp, so evaluating it twice in one frame agrees.

use lumen_ir::{EvalFamily, EventKind, ExprId, ExprKind, PulseCombine};

use crate::error::Result;

use super::FrameEvaluator;

impl FrameEvaluator<'_> {
    /// Evaluate a pulse node.
    pub fn eval_pulse(&mut self, id: ExprId) -> Result<bool> {
        let node = self.node(id)?;
        let event = match &node.kind {
            ExprKind::Event(event) => event,
            ExprKind::Const(_)
            | ExprKind::External { .. }
            | ExprKind::Intrinsic(_)
            | ExprKind::Kernel(_)
            | ExprKind::State { .. }
            | ExprKind::Time(_)
            | ExprKind::ShapeRef { .. }
            | ExprKind::EventRead { .. }
            | ExprKind::SlotRead { .. } => {
                return Err(self.extent_violation(id, node, EvalFamily::Pulse));
            }
        };
        if node.ty.family() != Some(EvalFamily::Pulse) {
            return Err(self.extent_violation(id, node, EvalFamily::Pulse));
        }
        self.state.stats_mut().pulses_evaluated += 1;

        let fired = match event {
            EventKind::Const { fired } => *fired,
            EventKind::Never => false,
            EventKind::Pulse => true,
            EventKind::Combine { events, mode } => {
                // Every sub-pulse is evaluated so wrap history advances.
                let mut results = Vec::with_capacity(events.len());
                for &event in events {
                    results.push(self.eval_pulse(event)?);
                }
                match mode {
                    PulseCombine::Any => results.iter().any(|&f| f),
                    PulseCombine::All => results.iter().all(|&f| f),
                }
            }
            EventKind::Wrap { signal } => {
                let v = self.eval_scalar(*signal)?;
                let predicate = v.is_finite() && v >= 0.5;
                self.state.observe_edge(id, predicate)
            }
        };
        Ok(fired)
    }
}
