//! Step scheduling.
//!
//! The scheduler turns the requested outputs into a flat, ordered step list.
//! It walks backward from each output, visiting operands before their
//! dependents with a memoised visit set, and emits one step per node on first
//! visit. The step kind comes from [`Extent::family`](crate::Extent::family)
//! and nothing else.
//!
//! # Ordering
//!
//! 1. Evaluation steps for everything reachable from the outputs, post-order.
//! 2. Evaluation steps for the update expressions of every reachable state
//!    slot (which may reach further state slots).
//! 3. One [`Step::WriteOutput`] per output.
//! 4. One [`Step::WriteState`] per reachable state slot with an update.
//!
//! All state reads therefore happen before any state write, so a frame always
//! observes the previous frame's writes.
//!
//! Zero-cardinality constants wider than one component get no step: the field
//! materializer inlines them into the lane-wise operation that consumes them.

mod verification;


use std::collections::VecDeque;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CompileError, Result};
use crate::expr::{ExprId, ExprKind, ExprNode, ExprTable, StateSlotId};
use crate::instance::InstanceId;
use crate::program::OutputSpec;
use crate::slots::SlotLayout;
use crate::types::{Cardinality, EvalFamily};

pub use verification::{verify_schedule, ScheduleViolation};

/// One unit of per-frame work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    /// Evaluate a scalar and cache it.
    EvalScalar { expr: ExprId },
    /// Fill an array buffer for every lane of `instance`.
    MaterializeArray { expr: ExprId, instance: InstanceId },
    /// Evaluate a pulse.
    EvalPulse { expr: ExprId },
    /// Persist the cached value of `value` into `slot`.
    WriteState { slot: StateSlotId, value: ExprId },
    /// Hand the value of `expr` to output number `output`.
    WriteOutput { output: usize, expr: ExprId },
}

impl Step {
    /// The expression this step evaluates or reads.
    pub const fn expr(&self) -> ExprId {
        match *self {
            Step::EvalScalar { expr }
            | Step::MaterializeArray { expr, .. }
            | Step::EvalPulse { expr }
            | Step::WriteOutput { expr, .. } => expr,
            Step::WriteState { value, .. } => value,
        }
    }

    /// Whether this step produces a value (as opposed to consuming one).
    pub const fn is_evaluation(&self) -> bool {
        matches!(
            self,
            Step::EvalScalar { .. } | Step::MaterializeArray { .. } | Step::EvalPulse { .. }
        )
    }
}

/// Ordered step list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    steps: Vec<Step>,
}

impl Schedule {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Human-readable listing, one step per line.
    pub fn describe(&self, table: &ExprTable) -> String {
        let mut out = String::new();
        for (i, step) in self.steps.iter().enumerate() {
            let node = table.get(step.expr());
            let kind = node.map_or("?", |n| n.kind.name());
            let ty = node.map(|n| n.ty.to_string()).unwrap_or_default();
            let _ = match step {
                Step::EvalScalar { expr } => {
                    writeln!(out, "{i:4}  eval-scalar    {expr} {kind} : {ty}")
                }
                Step::MaterializeArray { expr, instance } => {
                    writeln!(out, "{i:4}  materialize    {expr} {kind} : {ty} [{instance}]")
                }
                Step::EvalPulse { expr } => {
                    writeln!(out, "{i:4}  eval-pulse     {expr} {kind} : {ty}")
                }
                Step::WriteState { slot, value } => {
                    writeln!(out, "{i:4}  write-state    {slot} <- {value}")
                }
                Step::WriteOutput { output, expr } => {
                    writeln!(out, "{i:4}  write-output   #{output} <- {expr}")
                }
            };
        }
        out
    }
}

/// Whether a node is inlined by its consumer instead of getting a step.
pub(crate) fn is_inlined(node: &ExprNode) -> bool {
    matches!(node.ty.extent.cardinality, Cardinality::Zero) && node.ty.stride() != 1
}

/// Build the step list for `outputs`.
///
/// Fails with [`CompileError::UnschedulableOutput`] when an output's extent
/// maps onto no step, and with [`CompileError::Verification`] if the result
/// would reference an expression before it is produced.
pub fn build_schedule(
    table: &ExprTable,
    slots: &SlotLayout,
    outputs: &[OutputSpec],
) -> Result<Schedule> {
    for spec in outputs {
        let node = table
            .get(spec.expr)
            .ok_or_else(|| CompileError::UnknownOutputExpr {
                output: spec.name.clone(),
                expr: spec.expr,
            })?;
        if node.ty.family().is_none() || is_inlined(node) {
            return Err(CompileError::UnschedulableOutput {
                output: spec.name.clone(),
                ty: node.ty,
            });
        }
    }

    let mut walker = Walker::new(table, slots);
    for spec in outputs {
        walker.visit(spec.expr)?;
    }

    // Update expressions can read further state slots; run to a fixpoint.
    let mut writes = Vec::new();
    while let Some((slot, value)) = walker.pending.pop_front() {
        walker.visit(value)?;
        writes.push(Step::WriteState { slot, value });
    }

    let mut steps = walker.steps;
    steps.extend(
        outputs
            .iter()
            .enumerate()
            .map(|(output, spec)| Step::WriteOutput {
                output,
                expr: spec.expr,
            }),
    );
    steps.extend(writes);

    let schedule = Schedule { steps };
    verify_schedule(&schedule, table)?;

    debug!(
        nodes = table.len(),
        steps = schedule.len(),
        outputs = outputs.len(),
        "schedule built"
    );
    Ok(schedule)
}

struct Walker<'a> {
    table: &'a ExprTable,
    slots: &'a SlotLayout,
    visited: Vec<bool>,
    queued: Vec<bool>,
    pending: VecDeque<(StateSlotId, ExprId)>,
    steps: Vec<Step>,
}

impl<'a> Walker<'a> {
    fn new(table: &'a ExprTable, slots: &'a SlotLayout) -> Self {
        Self {
            table,
            slots,
            visited: vec![false; table.len()],
            queued: vec![false; slots.state_slots().len()],
            pending: VecDeque::new(),
            steps: Vec::new(),
        }
    }

    /// Iterative post-order walk from `root`.
    fn visit(&mut self, root: ExprId) -> Result<()> {
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            let node = self.node(id)?;
            if self.visited[id.index()] {
                continue;
            }
            if expanded {
                self.visited[id.index()] = true;
                self.emit(id, node)?;
            } else {
                stack.push((id, true));
                stack.extend(node.operands().into_iter().rev().map(|op| (op, false)));
            }
        }
        Ok(())
    }

    fn node(&self, id: ExprId) -> Result<&'a ExprNode> {
        self.table
            .get(id)
            .ok_or(CompileError::Verification(ScheduleViolation::UnknownExpr {
                step: self.steps.len(),
                expr: id,
            }))
    }

    fn emit(&mut self, id: ExprId, node: &ExprNode) -> Result<()> {
        if let ExprKind::State { slot } = node.kind {
            let update = self.slots.state_slot(slot).and_then(|decl| decl.update);
            if let Some(value) = update {
                if !self.queued[slot.index()] {
                    self.queued[slot.index()] = true;
                    self.pending.push_back((slot, value));
                }
            }
        }

        let step = match node.ty.family() {
            Some(EvalFamily::Scalar) if is_inlined(node) => return Ok(()),
            Some(EvalFamily::Scalar) => Step::EvalScalar { expr: id },
            Some(EvalFamily::Array) => {
                let instance = node.ty.require_many().map_err(|violation| {
                    CompileError::Shape {
                        site: Default::default(),
                        violation,
                    }
                })?;
                Step::MaterializeArray { expr: id, instance }
            }
            Some(EvalFamily::Pulse) => Step::EvalPulse { expr: id },
            None => {
                return Err(CompileError::Verification(ScheduleViolation::NoFamily {
                    expr: id,
                }));
            }
        };
        self.steps.push(step);
        Ok(())
    }
}
