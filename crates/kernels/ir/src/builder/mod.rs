//! Hash-consing IR builder.
//!
//! Client block code lowers a graph by calling one `emit_*` constructor per
//! (kind, sub-kind). Each constructor:
//!
//! 1. validates operand shapes, failing with [`CompileError::Shape`];
//! 2. hashes the candidate node structurally (FNV-1a over kind, sub-kind,
//!    operands, literal and type);
//! 3. returns the existing id when an equal node is already in the table;
//! 4. otherwise appends the node and returns its new id.
//!
//! Structurally identical sub-graphs therefore collapse to one id, and since
//! operands must already exist, every reference points backward.
//!
//! [`IrBuilder::finish`] schedules the requested outputs and freezes the
//! table into a [`CompiledProgram`].

mod validate;


use std::hash::{Hash, Hasher};

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

use lumen_foundation::StableHasher;

use crate::error::{CompileError, Result, ShapeViolation, Site};
use crate::expr::{
    ConstValue, EventKind, ExprId, ExprKind, ExprNode, ExprTable, IntrinsicKind,
    IntrinsicProperty, KernelKind, PathDerivativeOp, PlacementField, PulseCombine, ReduceOp,
    StateSlotId, TimeChannel, ValueSlotId,
};
use crate::functions::{PureFn, VariadicFn};
use crate::instance::{InstanceId, InstanceRegistry, LayoutPolicy, Lifecycle};
use crate::program::{CompiledProgram, OutputRequest, OutputSpec};
use crate::schedule::build_schedule;
use crate::slots::{SlotLayout, StateSlotDecl, ValueSlotDecl};
use crate::types::{CanonicalType, Cardinality, CombineMode, EvalFamily, Payload};

use validate::Check;

/// Counters describing how much the builder deduplicated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuilderStats {
    /// Nodes appended to the table.
    pub appended: usize,
    /// Constructor calls answered by an existing node.
    pub dedup_hits: usize,
}

/// Builds one program's expression table.
#[derive(Debug, Default)]
pub struct IrBuilder {
    table: ExprTable,
    buckets: IndexMap<u64, Vec<ExprId>>,
    instances: InstanceRegistry,
    slots: SlotLayout,
    site: Site,
    stats: BuilderStats,
}

impl IrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self) -> &ExprTable {
        &self.table
    }

    pub fn instances(&self) -> &InstanceRegistry {
        &self.instances
    }

    pub fn stats(&self) -> BuilderStats {
        self.stats
    }

    /// Name the block being lowered; attached to every shape error.
    pub fn set_site(&mut self, site: impl Into<String>) {
        self.site = Site(Some(site.into()));
    }

    pub fn clear_site(&mut self) {
        self.site = Site(None);
    }

    /// Declare an array domain.
    pub fn declare_instance(
        &mut self,
        name: impl Into<String>,
        element_count: usize,
        layout: LayoutPolicy,
        lifecycle: Lifecycle,
    ) -> InstanceId {
        self.instances.declare(name, element_count, layout, lifecycle)
    }

    // ------------------------------------------------------------------
    // Slots
    // ------------------------------------------------------------------

    /// Declare a host-writable scalar register.
    pub fn alloc_value_slot(&mut self, name: impl Into<String>, ty: CanonicalType) -> Result<ValueSlotId> {
        self.checked("slot", |check| check.scalar_result(ty))?;
        let id = ValueSlotId(self.slots.value_slots.len() as u32);
        self.slots.value_slots.push(ValueSlotDecl {
            name: name.into(),
            ty,
        });
        Ok(id)
    }

    /// Declare a persistent slot starting at `initial`.
    ///
    /// Field slots keep one element per lane of their instance.
    pub fn alloc_state_slot(
        &mut self,
        name: impl Into<String>,
        ty: CanonicalType,
        initial: ConstValue,
    ) -> Result<StateSlotId> {
        self.checked("state", |check| {
            if ty.extent.cardinality == Cardinality::Zero {
                return Err(ShapeViolation::ResultMismatch {
                    operation: check.operation,
                    declared: ty,
                    expected: "a signal or field",
                });
            }
            check.storable(ty)?;
            if initial.fits(ty.payload) {
                Ok(())
            } else {
                Err(ShapeViolation::ConstPayload { ty })
            }
        })?;
        let id = StateSlotId(self.slots.state_slots.len() as u32);
        self.slots.state_slots.push(StateSlotDecl {
            name: name.into(),
            ty,
            initial,
            update: None,
        });
        Ok(id)
    }

    /// Register the expression written into `slot` at the end of every frame.
    pub fn set_state_update(&mut self, slot: StateSlotId, value: ExprId) -> Result<()> {
        let slot_ty = self.state_decl(slot)?.ty;
        let already = self.state_decl(slot)?.update.is_some();
        self.checked("state.update", |check| {
            if already {
                return Err(ShapeViolation::DuplicateStateUpdate(slot));
            }
            let node = check.operand(value)?;
            if node.ty == slot_ty {
                Ok(())
            } else {
                Err(ShapeViolation::OperandMismatch {
                    operation: check.operation,
                    operand: value,
                    expected: "the slot's type",
                    found: node.ty,
                })
            }
        })?;
        if let Some(decl) = self.slots.state_slots.get_mut(slot.index()) {
            decl.update = Some(value);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Leaves
    // ------------------------------------------------------------------

    /// A literal. Zero-cardinality constants are valid wherever a scalar or
    /// per-lane value is expected.
    pub fn emit_const(&mut self, value: ConstValue, ty: CanonicalType) -> Result<ExprId> {
        self.checked("const", |check| {
            check.storable(ty)?;
            if value.fits(ty.payload) {
                Ok(())
            } else {
                Err(ShapeViolation::ConstPayload { ty })
            }
        })?;
        Ok(self.intern(ExprKind::Const(value), ty))
    }

    /// A named host input channel.
    pub fn emit_external(&mut self, channel: impl Into<String>, ty: CanonicalType) -> Result<ExprId> {
        self.checked("external", |check| check.scalar_result(ty))?;
        Ok(self.intern(
            ExprKind::External {
                channel: channel.into(),
            },
            ty,
        ))
    }

    /// One of the per-frame time channels.
    pub fn emit_time(&mut self, channel: TimeChannel, ty: CanonicalType) -> Result<ExprId> {
        self.checked("time", |check| check.scalar_result(ty))?;
        Ok(self.intern(ExprKind::Time(channel), ty))
    }

    /// Read a value register; the type is the slot's.
    pub fn emit_slot_read(&mut self, slot: ValueSlotId) -> Result<ExprId> {
        let ty = self
            .slots
            .value_slot(slot)
            .map(|decl| decl.ty)
            .ok_or_else(|| self.shape(ShapeViolation::UnknownValueSlot(slot)))?;
        Ok(self.intern(ExprKind::SlotRead { slot }, ty))
    }

    /// Read a persistent slot; the type is the slot's.
    pub fn emit_state(&mut self, slot: StateSlotId) -> Result<ExprId> {
        let ty = self.state_decl(slot)?.ty;
        Ok(self.intern(ExprKind::State { slot }, ty))
    }

    /// Placeholder for a renderer-evaluated shape driven by `params`.
    pub fn emit_shape_ref(&mut self, shape: u32, params: Vec<ExprId>, ty: CanonicalType) -> Result<ExprId> {
        self.checked("shapeRef", |check| {
            for &param in &params {
                check.scalar_operand(param)?;
            }
            check.scalar_result(ty)
        })?;
        Ok(self.intern(ExprKind::ShapeRef { shape, params }, ty))
    }

    /// Per-lane identity of `instance`.
    ///
    /// `Index` is an int field; the others are unit fields.
    pub fn emit_intrinsic_property(&mut self, instance: InstanceId, property: IntrinsicProperty) -> Result<ExprId> {
        self.checked("intrinsic.property", |check| check.instance(instance))?;
        let payload = match property {
            IntrinsicProperty::Index => Payload::Int,
            IntrinsicProperty::NormalizedIndex | IntrinsicProperty::RandomId => Payload::Unit,
        };
        Ok(self.intern(
            ExprKind::Intrinsic(IntrinsicKind::Property(property)),
            CanonicalType::field(payload, instance),
        ))
    }

    /// Per-lane placement of `instance`.
    ///
    /// `Uv` is a vec2 field; the others are unit fields.
    pub fn emit_intrinsic_placement(&mut self, instance: InstanceId, field: PlacementField) -> Result<ExprId> {
        self.checked("intrinsic.placement", |check| check.instance(instance))?;
        let payload = match field {
            PlacementField::Uv => Payload::Vec2,
            PlacementField::Rank | PlacementField::Seed => Payload::Unit,
        };
        Ok(self.intern(
            ExprKind::Intrinsic(IntrinsicKind::Placement(field)),
            CanonicalType::field(payload, instance),
        ))
    }

    // ------------------------------------------------------------------
    // Kernels
    // ------------------------------------------------------------------

    /// Apply a one-operand function. A field input yields a field over the
    /// same instance; a scalar input yields a signal.
    pub fn emit_kernel_map(&mut self, input: ExprId, func: PureFn, ty: CanonicalType) -> Result<ExprId> {
        self.checked("kernel.map", |check| {
            let node = check.operand(input)?;
            match node.ty.instance() {
                Some(instance) => {
                    check.field_operand(input)?;
                    check.field_result(ty, instance)?;
                }
                None => {
                    check.scalar_operand(input)?;
                    check.scalar_result(ty)?;
                }
            }
            check.function(func, &[node.ty.stride()], ty)
        })?;
        Ok(self.intern(ExprKind::Kernel(KernelKind::Map { input, func }), ty))
    }

    /// Apply an N-ary function.
    ///
    /// Either every operand is a scalar (result is a signal), or the operands
    /// are fields over one instance mixed with zero-cardinality constants
    /// (result is a field over that instance). Signals never mix with fields
    /// here; use [`IrBuilder::emit_kernel_zip_sig`].
    pub fn emit_kernel_zip(&mut self, inputs: Vec<ExprId>, func: PureFn, ty: CanonicalType) -> Result<ExprId> {
        self.checked("kernel.zip", |check| {
            let mut instance = None;
            let mut strides = Vec::with_capacity(inputs.len());
            for &id in &inputs {
                let node = check.operand(id)?;
                strides.push(node.ty.stride());
                if let Some(found) = node.ty.instance() {
                    check.field_operand(id)?;
                    match instance {
                        None => instance = Some(found),
                        Some(expected) if expected != found => {
                            return Err(ShapeViolation::InstanceMismatch {
                                operation: check.operation,
                                expected,
                                found,
                            });
                        }
                        Some(_) => {}
                    }
                }
            }
            match instance {
                Some(instance) => {
                    for &id in &inputs {
                        let node = check.operand(id)?;
                        if node.ty.instance().is_none()
                            && node.ty.extent.cardinality != Cardinality::Zero
                        {
                            return Err(ShapeViolation::OperandMismatch {
                                operation: check.operation,
                                operand: id,
                                expected: "a field or zero-cardinality constant",
                                found: node.ty,
                            });
                        }
                    }
                    check.field_result(ty, instance)?;
                }
                None => {
                    for &id in &inputs {
                        check.scalar_operand(id)?;
                    }
                    check.scalar_result(ty)?;
                }
            }
            check.function(func, &strides, ty)
        })?;
        Ok(self.intern(ExprKind::Kernel(KernelKind::Zip { inputs, func }), ty))
    }

    /// Combine one field with M scalars lane-wise; the field is argument 0.
    pub fn emit_kernel_zip_sig(
        &mut self,
        field: ExprId,
        signals: Vec<ExprId>,
        func: PureFn,
        ty: CanonicalType,
    ) -> Result<ExprId> {
        self.checked("kernel.zipSig", |check| {
            let (node, instance) = check.field_operand(field)?;
            let mut strides = vec![node.ty.stride()];
            for &signal in &signals {
                check.scalar_operand(signal)?;
                strides.push(1);
            }
            check.field_result(ty, instance)?;
            check.function(func, &strides, ty)
        })?;
        Ok(self.intern(
            ExprKind::Kernel(KernelKind::ZipSig {
                field,
                signals,
                func,
            }),
            ty,
        ))
    }

    /// Replicate a scalar to every lane.
    pub fn emit_kernel_broadcast(&mut self, signal: ExprId, ty: CanonicalType) -> Result<ExprId> {
        self.checked("kernel.broadcast", |check| {
            let node = check.scalar_operand(signal)?;
            let instance = ty.require_many()?;
            check.instance(instance)?;
            check.field_result(ty, instance)?;
            if node.ty.payload == ty.payload {
                Ok(())
            } else {
                Err(ShapeViolation::ResultMismatch {
                    operation: check.operation,
                    declared: ty,
                    expected: "the operand's payload",
                })
            }
        })?;
        Ok(self.intern(ExprKind::Kernel(KernelKind::Broadcast { signal }), ty))
    }

    /// Fold a single-component field to a signal.
    pub fn emit_kernel_reduce(&mut self, field: ExprId, op: ReduceOp, ty: CanonicalType) -> Result<ExprId> {
        self.checked("kernel.reduce", |check| {
            let (node, _) = check.field_operand(field)?;
            if !node.ty.payload.is_numeric() || node.ty.stride() != 1 {
                return Err(ShapeViolation::OperandMismatch {
                    operation: check.operation,
                    operand: field,
                    expected: "a single-component numeric field",
                    found: node.ty,
                });
            }
            check.numeric_scalar_result(ty)
        })?;
        Ok(self.intern(ExprKind::Kernel(KernelKind::Reduce { field, op }), ty))
    }

    /// Derivative of a vec2/vec3 path along consecutive lanes.
    ///
    /// `Tangent` keeps the payload; `ArcLength` yields one component per lane.
    pub fn emit_kernel_path_derivative(
        &mut self,
        field: ExprId,
        op: PathDerivativeOp,
        ty: CanonicalType,
    ) -> Result<ExprId> {
        self.checked("kernel.pathDerivative", |check| {
            let (node, instance) = check.field_operand(field)?;
            if !matches!(node.ty.payload, Payload::Vec2 | Payload::Vec3) {
                return Err(ShapeViolation::OperandMismatch {
                    operation: check.operation,
                    operand: field,
                    expected: "a vec2 or vec3 field",
                    found: node.ty,
                });
            }
            check.field_result(ty, instance)?;
            let expected_stride = match op {
                PathDerivativeOp::Tangent => node.ty.stride(),
                PathDerivativeOp::ArcLength => 1,
            };
            if ty.stride() == expected_stride {
                Ok(())
            } else {
                Err(ShapeViolation::Stride {
                    operation: check.operation,
                    inputs: vec![node.ty.stride()],
                    declared: ty.stride(),
                })
            }
        })?;
        Ok(self.intern(
            ExprKind::Kernel(KernelKind::PathDerivative { field, op }),
            ty,
        ))
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Read a pulse as 1.0 / 0.0.
    pub fn emit_event_read(&mut self, event: ExprId, ty: CanonicalType) -> Result<ExprId> {
        self.checked("eventRead", |check| {
            check.pulse_operand(event)?;
            check.numeric_scalar_result(ty)
        })?;
        Ok(self.intern(ExprKind::EventRead { event }, ty))
    }

    pub fn emit_event_const(&mut self, fired: bool) -> Result<ExprId> {
        Ok(self.intern(ExprKind::Event(EventKind::Const { fired }), CanonicalType::event()))
    }

    /// Fires every frame.
    pub fn emit_event_pulse(&mut self) -> Result<ExprId> {
        Ok(self.intern(ExprKind::Event(EventKind::Pulse), CanonicalType::event()))
    }

    /// Fires on each false-to-true transition of `signal >= 0.5`.
    pub fn emit_event_wrap(&mut self, signal: ExprId) -> Result<ExprId> {
        self.checked("event.wrap", |check| check.scalar_operand(signal).map(|_| ()))?;
        Ok(self.intern(ExprKind::Event(EventKind::Wrap { signal }), CanonicalType::event()))
    }

    /// Fold sub-pulses with any / all.
    pub fn emit_event_combine(&mut self, events: Vec<ExprId>, mode: PulseCombine) -> Result<ExprId> {
        self.checked("event.combine", |check| {
            if events.is_empty() {
                return Err(ShapeViolation::Arity {
                    operation: check.operation,
                    expected: "at least 1".to_string(),
                    found: 0,
                });
            }
            for &event in &events {
                check.pulse_operand(event)?;
            }
            Ok(())
        })?;
        Ok(self.intern(
            ExprKind::Event(EventKind::Combine { events, mode }),
            CanonicalType::event(),
        ))
    }

    pub fn emit_event_never(&mut self) -> Result<ExprId> {
        Ok(self.intern(ExprKind::Event(EventKind::Never), CanonicalType::event()))
    }

    // ------------------------------------------------------------------
    // Combining and finishing
    // ------------------------------------------------------------------

    /// Merge several writers into one value with `mode`.
    ///
    /// `Layer` keeps the last input. The other modes lower onto
    /// `kernel.zip` with the matching variadic function.
    pub fn combine(&mut self, mode: CombineMode, inputs: &[ExprId], ty: CanonicalType) -> Result<ExprId> {
        if !mode.accepts(ty.payload) {
            return Err(self.shape(ShapeViolation::CombinePayload { mode, ty }));
        }
        let Some(&last) = inputs.last() else {
            return Err(self.shape(ShapeViolation::EmptyCombine));
        };
        let func = match mode {
            CombineMode::Layer => return Ok(last),
            CombineMode::Add => VariadicFn::Add,
            CombineMode::Mul => VariadicFn::Mul,
            CombineMode::Max => VariadicFn::Max,
            CombineMode::Or => VariadicFn::Any,
            CombineMode::And => VariadicFn::All,
        };
        if inputs.len() == 1 {
            return Ok(last);
        }
        self.emit_kernel_zip(inputs.to_vec(), PureFn::Variadic(func), ty)
    }

    /// Schedule `outputs` and freeze the table.
    pub fn finish(self, outputs: Vec<OutputRequest>) -> Result<CompiledProgram> {
        let mut names = IndexSet::new();
        let mut specs = Vec::with_capacity(outputs.len());
        for request in outputs {
            if !names.insert(request.name.clone()) {
                return Err(CompileError::DuplicateOutput(request.name));
            }
            let node = self
                .table
                .get(request.expr)
                .ok_or_else(|| CompileError::UnknownOutputExpr {
                    output: request.name.clone(),
                    expr: request.expr,
                })?;
            let Some(family) = node.ty.family() else {
                return Err(CompileError::UnschedulableOutput {
                    output: request.name,
                    ty: node.ty,
                });
            };
            if let Some(slot) = request.slot {
                let reason = match self.slots.value_slot(slot) {
                    None => Some("slot is not declared"),
                    Some(_) if family != EvalFamily::Scalar => Some("only scalar outputs write slots"),
                    Some(decl) if decl.ty.payload != node.ty.payload => Some("payload differs"),
                    Some(_) => None,
                };
                if let Some(reason) = reason {
                    return Err(CompileError::OutputSlot {
                        output: request.name,
                        slot,
                        reason,
                    });
                }
            }
            specs.push(OutputSpec {
                name: request.name,
                expr: request.expr,
                ty: node.ty,
                family,
                slot: request.slot,
                continuity: request.continuity,
            });
        }

        let schedule = build_schedule(&self.table, &self.slots, &specs)?;
        debug!(
            nodes = self.table.len(),
            steps = schedule.len(),
            dedup_hits = self.stats.dedup_hits,
            "program compiled"
        );
        Ok(CompiledProgram::new(
            self.table,
            schedule,
            self.instances,
            self.slots,
            specs,
        ))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn shape(&self, violation: ShapeViolation) -> CompileError {
        CompileError::Shape {
            site: self.site.clone(),
            violation,
        }
    }

    fn checked<F>(&self, operation: &'static str, f: F) -> Result<()>
    where
        F: FnOnce(&Check<'_>) -> std::result::Result<(), ShapeViolation>,
    {
        let check = Check {
            table: &self.table,
            instances: &self.instances,
            operation,
        };
        f(&check).map_err(|violation| self.shape(violation))
    }

    fn state_decl(&self, slot: StateSlotId) -> Result<&StateSlotDecl> {
        self.slots
            .state_slot(slot)
            .ok_or_else(|| self.shape(ShapeViolation::UnknownStateSlot(slot)))
    }

    /// Return the id of an equal node, appending one if none exists.
    fn intern(&mut self, kind: ExprKind, ty: CanonicalType) -> ExprId {
        let node = ExprNode { kind, ty };
        let mut hasher = StableHasher::new();
        node.hash(&mut hasher);
        let hash = hasher.finish();

        let bucket = self.buckets.entry(hash).or_default();
        if let Some(&existing) = bucket
            .iter()
            .find(|&&id| self.table.get(id) == Some(&node))
        {
            self.stats.dedup_hits += 1;
            return existing;
        }

        let kind_name = node.kind.name();
        let id = self.table.push(node);
        bucket.push(id);
        self.stats.appended += 1;
        trace!(expr = %id, kind = kind_name, "appended");
        id
    }
}
