//! The unified expression table.
//!
//! One flat tagged union, [`ExprNode`], replaces separate scalar, array and
//! pulse expression families. Operands are [`ExprId`] indices into the same
//! [`ExprTable`]; since the table is append-only and every constructor
//! validates its operands first, references always point backward and the
//! graph is acyclic by construction.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::TableViolation;
use crate::functions::PureFn;
use crate::types::{CanonicalType, Payload};

/// Index of a node in the [`ExprTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExprId(pub u32);

impl ExprId {
    /// Position in the table.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// A host-writable scalar register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueSlotId(pub u32);

impl ValueSlotId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueSlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A value persisted across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateSlotId(pub u32);

impl StateSlotId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateSlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// A literal.
///
/// Hashing and equality compare float bit patterns so that literals can take
/// part in structural hashing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Vec2([f64; 2]),
    Vec3([f64; 3]),
    Color([f64; 4]),
}

impl ConstValue {
    /// Whether this literal can be stored as `payload`.
    ///
    /// `Float` literals fit every single-component numeric payload.
    pub const fn fits(&self, payload: Payload) -> bool {
        matches!(
            (self, payload),
            (ConstValue::Bool(_), Payload::Bool)
                | (ConstValue::Int(_), Payload::Int)
                | (
                    ConstValue::Float(_),
                    Payload::Float | Payload::Unit | Payload::Phase
                )
                | (ConstValue::Vec2(_), Payload::Vec2)
                | (ConstValue::Vec3(_), Payload::Vec3)
                | (ConstValue::Color(_), Payload::Color)
        )
    }

    /// Components as lane values.
    pub fn components(&self) -> Vec<f64> {
        match *self {
            ConstValue::Bool(b) => vec![if b { 1.0 } else { 0.0 }],
            ConstValue::Int(i) => vec![i as f64],
            ConstValue::Float(v) => vec![v],
            ConstValue::Vec2(v) => v.to_vec(),
            ConstValue::Vec3(v) => v.to_vec(),
            ConstValue::Color(v) => v.to_vec(),
        }
    }

    /// Single-component value, or `None` for vectors and colors.
    pub fn as_scalar(&self) -> Option<f64> {
        match *self {
            ConstValue::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
            ConstValue::Int(i) => Some(i as f64),
            ConstValue::Float(v) => Some(v),
            ConstValue::Vec2(_) | ConstValue::Vec3(_) | ConstValue::Color(_) => None,
        }
    }

    fn bits(&self) -> (u8, [u64; 4]) {
        let mut words = [0u64; 4];
        let tag = match self {
            ConstValue::Bool(b) => {
                words[0] = *b as u64;
                0
            }
            ConstValue::Int(i) => {
                words[0] = *i as u64;
                1
            }
            ConstValue::Float(v) => {
                words[0] = v.to_bits();
                2
            }
            ConstValue::Vec2(v) => {
                for (w, c) in words.iter_mut().zip(v) {
                    *w = c.to_bits();
                }
                3
            }
            ConstValue::Vec3(v) => {
                for (w, c) in words.iter_mut().zip(v) {
                    *w = c.to_bits();
                }
                4
            }
            ConstValue::Color(v) => {
                for (w, c) in words.iter_mut().zip(v) {
                    *w = c.to_bits();
                }
                5
            }
        };
        (tag, words)
    }
}

impl PartialEq for ConstValue {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for ConstValue {}

impl Hash for ConstValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

/// Per-frame time channels supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeChannel {
    /// Milliseconds since playback start.
    ElapsedMs,
    /// First phase accumulator, in [0, 1).
    PhaseA,
    /// Second phase accumulator, in [0, 1).
    PhaseB,
    /// Milliseconds since the previous frame.
    DeltaMs,
    /// Playback progress, in [0, 1].
    Progress,
    /// Current palette index.
    PaletteIndex,
    /// Audio or host-driven energy level.
    Energy,
}

impl TimeChannel {
    pub const ALL: [TimeChannel; 7] = [
        TimeChannel::ElapsedMs,
        TimeChannel::PhaseA,
        TimeChannel::PhaseB,
        TimeChannel::DeltaMs,
        TimeChannel::Progress,
        TimeChannel::PaletteIndex,
        TimeChannel::Energy,
    ];
}

/// Per-lane identity values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IntrinsicProperty {
    /// Lane index `i`.
    Index,
    /// `i / (n - 1)`, 0 for a single lane.
    NormalizedIndex,
    /// Seeded random value in [0, 1), stable per lane.
    RandomId,
}

/// Per-lane placement values derived from the layout policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlacementField {
    /// Position in the unit square (vec2).
    Uv,
    /// Ordering in [0, 1).
    Rank,
    /// Seeded random value in [0, 1), independent of `RandomId`.
    Seed,
}

/// Array-to-scalar folds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReduceOp {
    Min,
    Max,
    Sum,
    Avg,
}

/// Derivatives along consecutive lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PathDerivativeOp {
    /// Central difference, one-sided at the ends.
    Tangent,
    /// Cumulative distance from lane 0.
    ArcLength,
}

/// How `event.combine` folds its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PulseCombine {
    Any,
    All,
}

/// `intrinsic` sub-kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntrinsicKind {
    Property(IntrinsicProperty),
    Placement(PlacementField),
}

/// `kernel` sub-kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KernelKind {
    /// One operand through a unary function.
    Map { input: ExprId, func: PureFn },
    /// N operands of the same family through an N-ary function.
    Zip { inputs: Vec<ExprId>, func: PureFn },
    /// One array plus M scalars; the field is the first argument.
    ZipSig {
        field: ExprId,
        signals: Vec<ExprId>,
        func: PureFn,
    },
    /// Scalar replicated to every lane.
    Broadcast { signal: ExprId },
    /// Array folded to a scalar.
    Reduce { field: ExprId, op: ReduceOp },
    /// Derivative along consecutive lanes.
    PathDerivative { field: ExprId, op: PathDerivativeOp },
}

/// `event` sub-kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Fixed answer every frame.
    Const { fired: bool },
    /// Fires every frame.
    Pulse,
    /// Fires on a rising edge of a scalar predicate.
    Wrap { signal: ExprId },
    /// Fold of sub-pulses.
    Combine {
        events: Vec<ExprId>,
        mode: PulseCombine,
    },
    /// Never fires.
    Never,
}

/// Node discriminant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExprKind {
    Const(ConstValue),
    /// Named host input channel.
    External { channel: String },
    Intrinsic(IntrinsicKind),
    Kernel(KernelKind),
    /// Read of a persistent slot.
    State { slot: StateSlotId },
    Time(TimeChannel),
    /// Placeholder for a renderer-evaluated shape; `params` keeps its
    /// parameter signals scheduled.
    ShapeRef { shape: u32, params: Vec<ExprId> },
    /// Pulse read as 1.0 / 0.0.
    EventRead { event: ExprId },
    Event(EventKind),
    /// Read of a host-writable register.
    SlotRead { slot: ValueSlotId },
}

impl ExprKind {
    /// Short name used in logs and errors.
    pub const fn name(&self) -> &'static str {
        match self {
            ExprKind::Const(_) => "const",
            ExprKind::External { .. } => "external",
            ExprKind::Intrinsic(IntrinsicKind::Property(_)) => "intrinsic.property",
            ExprKind::Intrinsic(IntrinsicKind::Placement(_)) => "intrinsic.placement",
            ExprKind::Kernel(KernelKind::Map { .. }) => "kernel.map",
            ExprKind::Kernel(KernelKind::Zip { .. }) => "kernel.zip",
            ExprKind::Kernel(KernelKind::ZipSig { .. }) => "kernel.zipSig",
            ExprKind::Kernel(KernelKind::Broadcast { .. }) => "kernel.broadcast",
            ExprKind::Kernel(KernelKind::Reduce { .. }) => "kernel.reduce",
            ExprKind::Kernel(KernelKind::PathDerivative { .. }) => "kernel.pathDerivative",
            ExprKind::State { .. } => "state",
            ExprKind::Time(_) => "time",
            ExprKind::ShapeRef { .. } => "shapeRef",
            ExprKind::EventRead { .. } => "eventRead",
            ExprKind::Event(EventKind::Const { .. }) => "event.const",
            ExprKind::Event(EventKind::Pulse) => "event.pulse",
            ExprKind::Event(EventKind::Wrap { .. }) => "event.wrap",
            ExprKind::Event(EventKind::Combine { .. }) => "event.combine",
            ExprKind::Event(EventKind::Never) => "event.never",
            ExprKind::SlotRead { .. } => "slotRead",
        }
    }
}

/// One immutable node: what it computes and its declared type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExprNode {
    pub kind: ExprKind,
    pub ty: CanonicalType,
}

impl ExprNode {
    /// Operand references, in argument order.
    pub fn operands(&self) -> Vec<ExprId> {
        match &self.kind {
            ExprKind::Const(_)
            | ExprKind::External { .. }
            | ExprKind::Intrinsic(_)
            | ExprKind::State { .. }
            | ExprKind::Time(_)
            | ExprKind::SlotRead { .. } => Vec::new(),
            ExprKind::ShapeRef { params, .. } => params.clone(),
            ExprKind::EventRead { event } => vec![*event],
            ExprKind::Kernel(kernel) => match kernel {
                KernelKind::Map { input, .. } => vec![*input],
                KernelKind::Zip { inputs, .. } => inputs.clone(),
                KernelKind::ZipSig { field, signals, .. } => {
                    let mut ops = Vec::with_capacity(signals.len() + 1);
                    ops.push(*field);
                    ops.extend_from_slice(signals);
                    ops
                }
                KernelKind::Broadcast { signal } => vec![*signal],
                KernelKind::Reduce { field, .. } | KernelKind::PathDerivative { field, .. } => {
                    vec![*field]
                }
            },
            ExprKind::Event(event) => match event {
                EventKind::Const { .. } | EventKind::Pulse | EventKind::Never => Vec::new(),
                EventKind::Wrap { signal } => vec![*signal],
                EventKind::Combine { events, .. } => events.clone(),
            },
        }
    }
}

/// Append-only node storage, read-only outside the builder.
///
/// Deserialization re-checks that every operand points to an earlier node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "RawExprTable")]
pub struct ExprTable {
    nodes: Vec<ExprNode>,
}

#[derive(Deserialize)]
struct RawExprTable {
    nodes: Vec<ExprNode>,
}

impl TryFrom<RawExprTable> for ExprTable {
    type Error = TableViolation;

    fn try_from(raw: RawExprTable) -> Result<Self, Self::Error> {
        for (i, node) in raw.nodes.iter().enumerate() {
            for operand in node.operands() {
                if operand.index() >= i {
                    return Err(TableViolation::NonBackwardReference {
                        node: ExprId(i as u32),
                        operand,
                    });
                }
            }
        }
        Ok(Self { nodes: raw.nodes })
    }
}

impl ExprTable {
    /// Look up a node.
    pub fn get(&self, id: ExprId) -> Option<&ExprNode> {
        self.nodes.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate nodes with their ids, in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (ExprId, &ExprNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (ExprId(i as u32), node))
    }

    pub(crate) fn push(&mut self, node: ExprNode) -> ExprId {
        let id = ExprId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::UnaryFn;

    #[test]
    fn test_const_equality_uses_bits() {
        assert_eq!(ConstValue::Float(1.0), ConstValue::Float(1.0));
        assert_ne!(ConstValue::Float(0.0), ConstValue::Float(-0.0));
        assert_eq!(ConstValue::Float(f64::NAN), ConstValue::Float(f64::NAN));
        assert_ne!(ConstValue::Int(1), ConstValue::Float(1.0));
    }

    #[test]
    fn test_const_fits_payload() {
        assert!(ConstValue::Float(0.5).fits(Payload::Unit));
        assert!(ConstValue::Bool(true).fits(Payload::Bool));
        assert!(!ConstValue::Bool(true).fits(Payload::Float));
        assert!(!ConstValue::Vec2([0.0; 2]).fits(Payload::Vec3));
        assert_eq!(ConstValue::Color([1.0, 0.5, 0.0, 1.0]).components().len(), 4);
    }

    #[test]
    fn test_operands_in_argument_order() {
        let node = ExprNode {
            kind: ExprKind::Kernel(KernelKind::ZipSig {
                field: ExprId(4),
                signals: vec![ExprId(1), ExprId(2)],
                func: PureFn::Unary(UnaryFn::Identity),
            }),
            ty: CanonicalType::signal(Payload::Float),
        };
        assert_eq!(node.operands(), vec![ExprId(4), ExprId(1), ExprId(2)]);
    }
}
