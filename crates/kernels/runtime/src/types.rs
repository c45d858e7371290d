//! Frame inputs and outputs.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use lumen_ir::TimeChannel;

/// The seven per-frame time channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeInputs {
    pub elapsed_ms: f64,
    pub phase_a: f64,
    pub phase_b: f64,
    pub delta_ms: f64,
    pub progress: f64,
    pub palette_index: f64,
    pub energy: f64,
}

impl TimeInputs {
    pub fn channel(&self, channel: TimeChannel) -> f64 {
        match channel {
            TimeChannel::ElapsedMs => self.elapsed_ms,
            TimeChannel::PhaseA => self.phase_a,
            TimeChannel::PhaseB => self.phase_b,
            TimeChannel::DeltaMs => self.delta_ms,
            TimeChannel::Progress => self.progress,
            TimeChannel::PaletteIndex => self.palette_index,
            TimeChannel::Energy => self.energy,
        }
    }

    /// Time at `elapsed_ms` with both phases derived from periods in ms.
    pub fn at(elapsed_ms: f64, delta_ms: f64, period_a_ms: f64, period_b_ms: f64) -> Self {
        let phase = |period: f64| {
            if period > 0.0 {
                (elapsed_ms / period).rem_euclid(1.0)
            } else {
                0.0
            }
        };
        Self {
            elapsed_ms,
            delta_ms,
            phase_a: phase(period_a_ms),
            phase_b: phase(period_b_ms),
            ..Self::default()
        }
    }
}

/// Everything the host supplies for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameInputs {
    pub time: TimeInputs,
    /// Named read-only scalar channels sampled by `external` nodes.
    pub externals: IndexMap<String, f64>,
}

impl FrameInputs {
    pub fn new(time: TimeInputs) -> Self {
        Self {
            time,
            externals: IndexMap::new(),
        }
    }

    /// Builder method: set an external channel.
    pub fn with_external(mut self, channel: impl Into<String>, value: f64) -> Self {
        self.externals.insert(channel.into(), value);
        self
    }
}

/// An array output copied out of the frame's buffers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayOutput {
    /// Components per lane.
    pub stride: usize,
    /// `lanes * stride` values, lane-major.
    pub values: Vec<f64>,
}

impl ArrayOutput {
    pub fn lanes(&self) -> usize {
        if self.stride == 0 {
            0
        } else {
            self.values.len() / self.stride
        }
    }

    /// Components of one lane.
    pub fn lane(&self, lane: usize) -> Option<&[f64]> {
        self.values.chunks(self.stride.max(1)).nth(lane)
    }
}

/// Values handed to the renderer after one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameOutputs {
    pub frame: u64,
    pub scalars: IndexMap<String, f64>,
    pub arrays: IndexMap<String, ArrayOutput>,
    pub pulses: IndexMap<String, bool>,
}

impl FrameOutputs {
    pub fn new(frame: u64) -> Self {
        Self {
            frame,
            ..Self::default()
        }
    }

    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.scalars.get(name).copied()
    }

    pub fn array(&self, name: &str) -> Option<&ArrayOutput> {
        self.arrays.get(name)
    }

    pub fn pulse(&self, name: &str) -> Option<bool> {
        self.pulses.get(name).copied()
    }
}
