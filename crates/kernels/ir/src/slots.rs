//! Value registers and persistent state slots.

use serde::{Deserialize, Serialize};

use crate::expr::{ConstValue, ExprId, StateSlotId, ValueSlotId};
use crate::types::CanonicalType;

/// A host-writable scalar register read by `slotRead` nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSlotDecl {
    pub name: String,
    pub ty: CanonicalType,
}

/// A value that survives between frames.
///
/// Scalar slots hold one element; field slots hold one element per lane of
/// the referenced instance, each starting at `initial`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSlotDecl {
    pub name: String,
    pub ty: CanonicalType,
    pub initial: ConstValue,
    /// Expression written back after evaluation each frame.
    pub update: Option<ExprId>,
}

/// All registers and state slots of a program.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotLayout {
    pub(crate) value_slots: Vec<ValueSlotDecl>,
    pub(crate) state_slots: Vec<StateSlotDecl>,
}

impl SlotLayout {
    pub fn value_slot(&self, id: ValueSlotId) -> Option<&ValueSlotDecl> {
        self.value_slots.get(id.index())
    }

    pub fn state_slot(&self, id: StateSlotId) -> Option<&StateSlotDecl> {
        self.state_slots.get(id.index())
    }

    pub fn value_slots(&self) -> &[ValueSlotDecl] {
        &self.value_slots
    }

    pub fn state_slots(&self) -> &[StateSlotDecl] {
        &self.state_slots
    }

    /// State slots with their ids.
    pub fn iter_state(&self) -> impl Iterator<Item = (StateSlotId, &StateSlotDecl)> {
        self.state_slots
            .iter()
            .enumerate()
            .map(|(i, decl)| (StateSlotId(i as u32), decl))
    }
}
