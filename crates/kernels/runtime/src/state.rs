//! Per-program runtime state.
//!
//! [`RuntimeState`] owns everything that survives between steps and frames:
//! the scalar and array caches, persistent state slots, edge history for
//! `event.wrap`, host value registers, live instance counts, continuity
//! tracks and the health monitor.
//!
//! # Cache invalidation
//!
//! Every cache entry carries the frame stamp it was computed in. Starting a
//! frame bumps the stamp, which invalidates everything at once; no entry is
//! ever cleared individually. Stamp 0 means "never computed" and frames start
//! at stamp 1.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use lumen_ir::{
    CompiledProgram, ExprId, InstanceId, Lifecycle, StateSlotDecl, StateSlotId, ValueSlotId,
};

use crate::config::RuntimeConfig;
use crate::continuity::ContinuityLayer;
use crate::error::{Error, Result};
use crate::health::HealthMonitor;
use crate::pool::BufferPool;

/// Per-frame evaluation counters, reset when a frame starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalStats {
    pub steps_executed: u64,
    pub scalars_computed: u64,
    pub scalar_cache_hits: u64,
    pub arrays_materialized: u64,
    pub array_cache_hits: u64,
    pub pulses_evaluated: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct ScalarEntry {
    value: f64,
    stamp: u64,
}

#[derive(Debug)]
struct ArrayEntry {
    buffer: Vec<f64>,
    stamp: u64,
}

/// Rising-edge history of one `event.wrap` node.
#[derive(Debug, Clone, Copy, Default)]
struct EdgeState {
    stamp: u64,
    previous: bool,
    current: bool,
}

#[derive(Debug, Clone)]
struct InstanceState {
    lifecycle: Lifecycle,
    capacity: usize,
    count: usize,
}

/// Mutable state of one running program.
#[derive(Debug)]
pub struct RuntimeState {
    frame_stamp: u64,
    scalars: Vec<ScalarEntry>,
    arrays: Vec<Option<ArrayEntry>>,
    persistent: Vec<Vec<f64>>,
    state_decls: Vec<StateSlotDecl>,
    edges: IndexMap<ExprId, EdgeState>,
    value_slots: Vec<f64>,
    instances: Vec<InstanceState>,
    continuity: ContinuityLayer,
    health: HealthMonitor,
    stats: EvalStats,
}

impl RuntimeState {
    /// Fresh state for `program` with default settings.
    pub fn for_program(program: &CompiledProgram) -> Self {
        Self::new(program, &RuntimeConfig::default())
    }

    /// Fresh state for `program`.
    pub fn new(program: &CompiledProgram, config: &RuntimeConfig) -> Self {
        let nodes = program.table().len();
        let instances: Vec<InstanceState> = program
            .instances()
            .iter()
            .map(|instance| InstanceState {
                lifecycle: instance.lifecycle,
                capacity: instance.element_count,
                count: instance.element_count,
            })
            .collect();

        let state_decls = program.slots().state_slots().to_vec();
        let persistent = state_decls
            .iter()
            .map(|decl| {
                let lanes = decl
                    .ty
                    .instance()
                    .and_then(|id| instances.get(id.index()))
                    .map_or(1, |inst| inst.count);
                decl.initial.components().repeat(lanes)
            })
            .collect();

        Self {
            frame_stamp: 0,
            scalars: vec![ScalarEntry::default(); nodes],
            arrays: (0..nodes).map(|_| None).collect(),
            persistent,
            state_decls,
            edges: IndexMap::new(),
            value_slots: vec![0.0; program.slots().value_slots().len()],
            instances,
            continuity: ContinuityLayer::new(config.continuity.clone()),
            health: HealthMonitor::new(config.health.capacity),
            stats: EvalStats::default(),
        }
    }

    /// Start a new frame: bump the stamp and recycle last frame's arrays.
    pub fn begin_frame(&mut self, pool: &mut BufferPool) {
        self.frame_stamp += 1;
        self.stats = EvalStats::default();
        for slot in &mut self.arrays {
            if let Some(entry) = slot.take() {
                pool.release(entry.buffer);
            }
        }
    }

    pub fn frame_stamp(&self) -> u64 {
        self.frame_stamp
    }

    // ------------------------------------------------------------------
    // Caches
    // ------------------------------------------------------------------

    /// Scalar computed in the current frame, if any.
    pub fn scalar(&self, id: ExprId) -> Option<f64> {
        self.scalars
            .get(id.index())
            .filter(|entry| entry.stamp != 0 && entry.stamp == self.frame_stamp)
            .map(|entry| entry.value)
    }

    pub(crate) fn store_scalar(&mut self, id: ExprId, value: f64) -> Result<()> {
        let entry = self
            .scalars
            .get_mut(id.index())
            .ok_or(Error::UnknownExpr(id))?;
        *entry = ScalarEntry {
            value,
            stamp: self.frame_stamp,
        };
        Ok(())
    }

    /// Array materialized in the current frame, if any.
    pub fn array(&self, id: ExprId) -> Option<&[f64]> {
        match self.arrays.get(id.index()) {
            Some(Some(entry)) if entry.stamp == self.frame_stamp => Some(&entry.buffer),
            _ => None,
        }
    }

    pub(crate) fn store_array(&mut self, id: ExprId, buffer: Vec<f64>, pool: &mut BufferPool) -> Result<()> {
        let slot = self
            .arrays
            .get_mut(id.index())
            .ok_or(Error::UnknownExpr(id))?;
        let previous = slot.replace(ArrayEntry {
            buffer,
            stamp: self.frame_stamp,
        });
        if let Some(old) = previous {
            pool.release(old.buffer);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Persistent state and registers
    // ------------------------------------------------------------------

    /// Current contents of a state slot (one element, or one per lane).
    pub fn state_value(&self, slot: StateSlotId) -> Option<&[f64]> {
        self.persistent.get(slot.index()).map(Vec::as_slice)
    }

    pub(crate) fn write_state(&mut self, slot: StateSlotId, values: &[f64]) -> Result<()> {
        let stored = self
            .persistent
            .get_mut(slot.index())
            .ok_or_else(|| Error::UnknownSlot(slot.to_string()))?;
        stored.clear();
        stored.extend_from_slice(values);
        Ok(())
    }

    /// Host write into a value register, observed by `slotRead` nodes.
    pub fn write_slot(&mut self, slot: ValueSlotId, value: f64) -> Result<()> {
        let stored = self
            .value_slots
            .get_mut(slot.index())
            .ok_or_else(|| Error::UnknownSlot(slot.to_string()))?;
        *stored = value;
        Ok(())
    }

    pub fn slot_value(&self, slot: ValueSlotId) -> Option<f64> {
        self.value_slots.get(slot.index()).copied()
    }

    // ------------------------------------------------------------------
    // Instances
    // ------------------------------------------------------------------

    /// Live lane count of an instance.
    pub fn instance_count(&self, id: InstanceId) -> Result<usize> {
        self.instances
            .get(id.index())
            .map(|inst| inst.count)
            .ok_or(Error::UnknownInstance(id))
    }

    /// Change the lane count of an instance, effective from the next frame.
    ///
    /// Static instances reject any change, pooled instances reject counts
    /// above their declared capacity. Persistent per-lane state keeps
    /// existing lanes and fills new lanes with the slot's initial value.
    pub fn set_instance_count(&mut self, id: InstanceId, count: usize) -> Result<()> {
        let inst = self
            .instances
            .get_mut(id.index())
            .ok_or(Error::UnknownInstance(id))?;
        let refusal = match inst.lifecycle {
            Lifecycle::Static if count != inst.capacity => Some("static instances cannot resize"),
            Lifecycle::Pooled if count > inst.capacity => Some("exceeds pooled capacity"),
            Lifecycle::Static | Lifecycle::Pooled | Lifecycle::Dynamic => None,
        };
        if let Some(reason) = refusal {
            return Err(Error::InstanceLifecycle {
                instance: id,
                lifecycle: inst.lifecycle,
                requested: count,
                reason,
            });
        }
        if inst.count == count {
            return Ok(());
        }
        debug!(instance = %id, from = inst.count, to = count, "instance resized");
        inst.count = count;

        for (decl, values) in self.state_decls.iter().zip(&mut self.persistent) {
            if decl.ty.instance() != Some(id) {
                continue;
            }
            let initial = decl.initial.components();
            let stride = initial.len();
            let lanes = values.len() / stride.max(1);
            if count < lanes {
                values.truncate(count * stride);
            } else {
                for _ in lanes..count {
                    values.extend_from_slice(&initial);
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------

    /// Record `predicate` for a wrap node and report a false-to-true edge.
    ///
    /// History shifts only once per frame stamp, so asking again within the
    /// same frame gives the same answer.
    pub(crate) fn observe_edge(&mut self, id: ExprId, predicate: bool) -> bool {
        let stamp = self.frame_stamp;
        let edge = self.edges.entry(id).or_default();
        if edge.stamp != stamp {
            edge.previous = edge.current;
            edge.current = predicate;
            edge.stamp = stamp;
        }
        !edge.previous && edge.current
    }

    // ------------------------------------------------------------------
    // Collaborators
    // ------------------------------------------------------------------

    pub fn continuity(&self) -> &ContinuityLayer {
        &self.continuity
    }

    pub fn continuity_mut(&mut self) -> &mut ContinuityLayer {
        &mut self.continuity
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    pub(crate) fn health_mut(&mut self) -> &mut HealthMonitor {
        &mut self.health
    }

    /// Counters of the current (or last completed) frame.
    pub fn stats(&self) -> EvalStats {
        self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut EvalStats {
        &mut self.stats
    }
}
