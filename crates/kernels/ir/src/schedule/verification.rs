//! Ordering verification for built schedules.

use thiserror::Error;

use crate::expr::{ExprId, ExprTable};

use super::{is_inlined, Schedule, Step};

/// Verify that no step references an expression before it is produced.
///
/// This checks that:
/// 1. every operand of an evaluated expression was produced by an earlier step
///    (inlined constants excepted);
/// 2. every state and output write reads an already produced expression;
/// 3. no expression is evaluated twice.
pub fn verify_schedule(schedule: &Schedule, table: &ExprTable) -> Result<(), ScheduleViolation> {
    let mut produced = vec![false; table.len()];

    for (step_idx, step) in schedule.steps().iter().enumerate() {
        let expr = step.expr();
        let node = table.get(expr).ok_or(ScheduleViolation::UnknownExpr {
            step: step_idx,
            expr,
        })?;

        if !step.is_evaluation() {
            if !produced[expr.index()] {
                return Err(ScheduleViolation::ForwardReference {
                    step: step_idx,
                    expr,
                    operand: expr,
                });
            }
            continue;
        }

        if produced[expr.index()] {
            return Err(ScheduleViolation::DuplicateStep {
                step: step_idx,
                expr,
            });
        }

        for operand in node.operands() {
            let operand_node = table.get(operand).ok_or(ScheduleViolation::UnknownExpr {
                step: step_idx,
                expr: operand,
            })?;
            if !produced[operand.index()] && !is_inlined(operand_node) {
                return Err(ScheduleViolation::ForwardReference {
                    step: step_idx,
                    expr,
                    operand,
                });
            }
        }

        produced[expr.index()] = true;
    }

    Ok(())
}

/// Ordering violations found in a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleViolation {
    /// A step reads an expression that no earlier step produced.
    #[error("step {step} ({expr}) reads {operand} before it is produced")]
    ForwardReference {
        step: usize,
        expr: ExprId,
        operand: ExprId,
    },
    /// The same expression is evaluated by two steps.
    #[error("step {step} evaluates {expr} a second time")]
    DuplicateStep { step: usize, expr: ExprId },
    /// A step names an expression outside the table.
    #[error("step {step} references unknown expression {expr}")]
    UnknownExpr { step: usize, expr: ExprId },
    /// An expression's extent maps onto no evaluator.
    #[error("{expr} has an extent with no evaluator")]
    NoFamily { expr: ExprId },
}

impl Schedule {
    #[cfg(test)]
    pub(crate) fn from_steps(steps: Vec<Step>) -> Self {
        Self { steps }
    }
}
