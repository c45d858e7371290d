//! Lumen IR - Unified Expression Representation
//!
//! One append-only, hash-consed expression table replaces separate scalar,
//! array and pulse expression families. Every node carries a
//! [`CanonicalType`]; its extent alone decides which evaluator runs it.
//!
//! Pipeline: block lowering -> [`IrBuilder`] -> [`build_schedule`] ->
//! [`CompiledProgram`]

pub mod builder;
pub mod error;
pub mod expr;
pub mod functions;
pub mod instance;
pub mod program;
pub mod schedule;
pub mod slots;
pub mod types;

pub use builder::{BuilderStats, IrBuilder};
pub use error::{CompileError, Result, ShapeViolation, Site, TableViolation};
pub use expr::{
    ConstValue, EventKind, ExprId, ExprKind, ExprNode, ExprTable, IntrinsicKind,
    IntrinsicProperty, KernelKind, PathDerivativeOp, PlacementField, PulseCombine, ReduceOp,
    StateSlotId, TimeChannel, ValueSlotId,
};
pub use functions::{
    Arity, BinaryFn, CollapseFn, ConstructFn, PureFn, TernaryFn, UnaryFn, VariadicFn,
};
pub use instance::{Instance, InstanceId, InstanceRegistry, LayoutPolicy, Lifecycle};
pub use program::{CompiledProgram, ContinuitySemantic, OutputRequest, OutputSpec};
pub use schedule::{build_schedule, verify_schedule, Schedule, ScheduleViolation, Step};
pub use slots::{SlotLayout, StateSlotDecl, ValueSlotDecl};
pub use types::{
    CanonicalType, Cardinality, CombineMode, EvalFamily, Extent, Payload, Temporality,
};
