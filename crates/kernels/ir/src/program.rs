//! The frozen result of compilation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CompileError;
use crate::expr::{ExprId, ExprTable, ValueSlotId};
use crate::instance::InstanceRegistry;
use crate::schedule::{verify_schedule, Schedule};
use crate::slots::SlotLayout;
use crate::types::{CanonicalType, EvalFamily};

/// Smoothing class applied to an output by the continuity layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContinuitySemantic {
    Position,
    Radius,
    Opacity,
    Color,
    Custom,
}

impl ContinuitySemantic {
    pub const ALL: [ContinuitySemantic; 5] = [
        ContinuitySemantic::Position,
        ContinuitySemantic::Radius,
        ContinuitySemantic::Opacity,
        ContinuitySemantic::Color,
        ContinuitySemantic::Custom,
    ];
}

impl fmt::Display for ContinuitySemantic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContinuitySemantic::Position => "position",
            ContinuitySemantic::Radius => "radius",
            ContinuitySemantic::Opacity => "opacity",
            ContinuitySemantic::Color => "color",
            ContinuitySemantic::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// An output requested from [`IrBuilder::finish`](crate::IrBuilder::finish).
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRequest {
    pub name: String,
    pub expr: ExprId,
    pub slot: Option<ValueSlotId>,
    pub continuity: Option<ContinuitySemantic>,
}

impl OutputRequest {
    pub fn new(name: impl Into<String>, expr: ExprId) -> Self {
        Self {
            name: name.into(),
            expr,
            slot: None,
            continuity: None,
        }
    }

    /// Also write the scalar value into `slot`, visible to `slotRead` next frame.
    pub fn with_slot(mut self, slot: ValueSlotId) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Smooth the value with the continuity layer.
    pub fn with_continuity(mut self, semantic: ContinuitySemantic) -> Self {
        self.continuity = Some(semantic);
        self
    }
}

/// A validated output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub name: String,
    pub expr: ExprId,
    pub ty: CanonicalType,
    pub family: EvalFamily,
    pub slot: Option<ValueSlotId>,
    pub continuity: Option<ContinuitySemantic>,
}

/// Everything the runtime needs to execute frames.
///
/// A deserialized program is re-verified: its schedule must pass
/// [`verify_schedule`] and every output must name a node in the table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawProgram")]
pub struct CompiledProgram {
    table: ExprTable,
    schedule: Schedule,
    instances: InstanceRegistry,
    slots: SlotLayout,
    outputs: Vec<OutputSpec>,
}

#[derive(Deserialize)]
struct RawProgram {
    table: ExprTable,
    schedule: Schedule,
    instances: InstanceRegistry,
    slots: SlotLayout,
    outputs: Vec<OutputSpec>,
}

impl TryFrom<RawProgram> for CompiledProgram {
    type Error = CompileError;

    fn try_from(raw: RawProgram) -> Result<Self, Self::Error> {
        verify_schedule(&raw.schedule, &raw.table)?;
        if let Some(spec) = raw.outputs.iter().find(|o| raw.table.get(o.expr).is_none()) {
            return Err(CompileError::UnknownOutputExpr {
                output: spec.name.clone(),
                expr: spec.expr,
            });
        }
        Ok(Self::new(
            raw.table,
            raw.schedule,
            raw.instances,
            raw.slots,
            raw.outputs,
        ))
    }
}

impl CompiledProgram {
    pub(crate) fn new(
        table: ExprTable,
        schedule: Schedule,
        instances: InstanceRegistry,
        slots: SlotLayout,
        outputs: Vec<OutputSpec>,
    ) -> Self {
        Self {
            table,
            schedule,
            instances,
            slots,
            outputs,
        }
    }

    pub fn table(&self) -> &ExprTable {
        &self.table
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn instances(&self) -> &InstanceRegistry {
        &self.instances
    }

    pub fn slots(&self) -> &SlotLayout {
        &self.slots
    }

    pub fn outputs(&self) -> &[OutputSpec] {
        &self.outputs
    }

    /// Look up an output by name.
    pub fn output(&self, name: &str) -> Option<&OutputSpec> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Outputs followed by the step listing.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (i, spec) in self.outputs.iter().enumerate() {
            out.push_str(&format!("output #{i} '{}' = {} : {}\n", spec.name, spec.expr, spec.ty));
        }
        out.push_str(&self.schedule.describe(&self.table));
        out
    }
}
