//! Runtime errors for frame execution.
//!
//! These errors occur after successful compilation, while a frame runs.
//!
//! # Error Categories
//!
//! - **Shape errors**: [`Error::ExtentViolation`], [`Error::LaneCountMismatch`]
//! - **Lookup errors**: [`Error::UnknownExpr`], [`Error::MissingArray`],
//!   [`Error::UnknownInstance`], [`Error::UnknownSlot`]
//! - **Lifecycle errors**: [`Error::InstanceLifecycle`]
//!
//! # Error Handling Policy
//!
//! Shape and lookup errors are returned unconditionally. The runtime never
//! substitutes an empty array or a default value for a node it could not
//! evaluate. Non-finite numbers are not errors: they are reported to the
//! [`HealthMonitor`](crate::health::HealthMonitor) and the frame continues.

use thiserror::Error;

use lumen_ir::{CanonicalType, EvalFamily, ExprId, InstanceId, Lifecycle};

/// Runtime result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while executing a frame.
#[derive(Debug, Error)]
pub enum Error {
    /// An evaluator was asked for a node whose extent belongs to another
    /// evaluator.
    ///
    /// The scheduler derives step kinds from extents, so this indicates a
    /// program and state that do not belong together, or a node kind that
    /// cannot produce the declared type.
    #[error("{evaluator} evaluator cannot produce {expr} ({kind} : {ty})")]
    ExtentViolation {
        /// The offending node.
        expr: ExprId,
        /// Node kind name.
        kind: &'static str,
        /// Declared type.
        ty: CanonicalType,
        /// The evaluator that was asked.
        evaluator: EvalFamily,
    },

    /// An array or persistent slot holds a different number of lanes than
    /// the instance currently has.
    #[error("lane count mismatch for {expr}: expected {expected} values, found {found}")]
    LaneCountMismatch {
        /// The node being materialized.
        expr: ExprId,
        /// `count * stride`.
        expected: usize,
        /// Values actually present.
        found: usize,
    },

    /// An expression id outside the program's table.
    #[error("unknown expression {0}")]
    UnknownExpr(ExprId),

    /// An array was read before it was materialized this frame.
    #[error("array {0} has not been materialized this frame")]
    MissingArray(ExprId),

    /// An instance id outside the program's registry.
    #[error("unknown instance {0}")]
    UnknownInstance(InstanceId),

    /// A value or state slot outside the program's layout.
    #[error("unknown slot {0}")]
    UnknownSlot(String),

    /// A lane count change forbidden by the instance lifecycle.
    #[error("instance {instance} ({lifecycle:?}) cannot hold {requested} lanes: {reason}")]
    InstanceLifecycle {
        /// The instance being resized.
        instance: InstanceId,
        /// Its lifecycle.
        lifecycle: Lifecycle,
        /// Requested lane count.
        requested: usize,
        /// Why the change is refused.
        reason: &'static str,
    },
}
