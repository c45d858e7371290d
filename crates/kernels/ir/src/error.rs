//! Compile-time errors.
//!
//! The builder never coerces: a shape that does not fit the operation is a
//! [`CompileError::Shape`] naming the block being lowered ([`Site`]) and the
//! precise [`ShapeViolation`]. Scheduling failures are reported separately.
//!
//! # Error Categories
//!
//! - **Shape errors**: [`CompileError::Shape`] from any `emit_*` constructor
//! - **Output errors**: [`CompileError::UnschedulableOutput`],
//!   [`CompileError::DuplicateOutput`], [`CompileError::UnknownOutputExpr`],
//!   [`CompileError::OutputSlot`]
//! - **Schedule errors**: [`CompileError::Verification`]

use std::fmt;

use thiserror::Error;

use crate::expr::{ExprId, StateSlotId, ValueSlotId};
use crate::instance::InstanceId;
use crate::schedule::ScheduleViolation;
use crate::types::{CanonicalType, CombineMode};

/// Compile result type alias.
pub type Result<T> = std::result::Result<T, CompileError>;

/// The block currently being lowered, if the caller named one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Site(pub Option<String>);

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(name) => f.write_str(name),
            None => f.write_str("<unsited>"),
        }
    }
}

/// Errors raised while building or scheduling a program.
#[derive(Debug, Error)]
pub enum CompileError {
    /// An operand's shape does not fit the operation.
    #[error("{site}: {violation}")]
    Shape {
        /// Block being lowered when the violation occurred.
        site: Site,
        /// What was wrong.
        violation: ShapeViolation,
    },

    /// An output's extent maps onto no evaluator step.
    #[error("output '{output}' has unschedulable type {ty}")]
    UnschedulableOutput {
        /// Output name.
        output: String,
        /// The offending type.
        ty: CanonicalType,
    },

    /// Two outputs share a name.
    #[error("duplicate output '{0}'")]
    DuplicateOutput(String),

    /// An output names an expression outside the table.
    #[error("output '{output}' references unknown expression {expr}")]
    UnknownOutputExpr {
        /// Output name.
        output: String,
        /// The dangling id.
        expr: ExprId,
    },

    /// An output's write-back slot is unknown or has a different type.
    #[error("output '{output}' cannot write slot {slot}: {reason}")]
    OutputSlot {
        /// Output name.
        output: String,
        /// Target slot.
        slot: ValueSlotId,
        /// Why the write is invalid.
        reason: &'static str,
    },

    /// The produced schedule violates ordering.
    ///
    /// Indicates a scheduler bug rather than bad input.
    #[error("schedule verification failed: {0}")]
    Verification(#[from] ScheduleViolation),
}

/// A specific operand-shape mismatch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapeViolation {
    /// An operand id is not in the table.
    #[error("{operation}: unknown operand {operand}")]
    UnknownOperand {
        operation: &'static str,
        operand: ExprId,
    },

    /// An operand has the wrong extent or payload.
    #[error("{operation}: operand {operand} must be {expected}, found {found}")]
    OperandMismatch {
        operation: &'static str,
        operand: ExprId,
        expected: &'static str,
        found: CanonicalType,
    },

    /// The declared result type does not match what the operation produces.
    #[error("{operation}: declared result {declared} does not fit, expected {expected}")]
    ResultMismatch {
        operation: &'static str,
        declared: CanonicalType,
        expected: &'static str,
    },

    /// Wrong number of operands.
    #[error("{operation}: expected {expected} operands, found {found}")]
    Arity {
        operation: &'static str,
        expected: String,
        found: usize,
    },

    /// Array operands reference different instances.
    #[error("{operation}: instance mismatch, {expected} vs {found}")]
    InstanceMismatch {
        operation: &'static str,
        expected: InstanceId,
        found: InstanceId,
    },

    /// Operand or result strides do not fit the function.
    #[error("{operation}: strides {inputs:?} do not produce stride {declared}")]
    Stride {
        operation: &'static str,
        inputs: Vec<usize>,
        declared: usize,
    },

    /// A literal does not fit the declared payload.
    #[error("constant does not fit payload of {ty}")]
    ConstPayload { ty: CanonicalType },

    /// A value slot is not declared.
    #[error("unknown value slot {0}")]
    UnknownValueSlot(ValueSlotId),

    /// A state slot is not declared.
    #[error("unknown state slot {0}")]
    UnknownStateSlot(StateSlotId),

    /// A state slot already has an update expression.
    #[error("state slot {0} already has an update")]
    DuplicateStateUpdate(StateSlotId),

    /// A many-cardinality type references an undeclared instance.
    #[error("unknown instance {0}")]
    UnknownInstance(InstanceId),

    /// A combine mode is not defined for the payload.
    #[error("combine mode '{mode}' is not defined for {ty}")]
    CombinePayload { mode: CombineMode, ty: CanonicalType },

    /// Combining zero inputs.
    #[error("combine requires at least one input")]
    EmptyCombine,

    /// A many-cardinality type was required.
    #[error("expected many cardinality, found {ty}")]
    NotMany { ty: CanonicalType },
}

/// A deserialized expression table that the builder could not have produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableViolation {
    /// An operand does not point strictly backward.
    #[error("{node} references {operand}, which is not an earlier node")]
    NonBackwardReference {
        /// The referencing node.
        node: ExprId,
        /// The offending operand.
        operand: ExprId,
    },
}
