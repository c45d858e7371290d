//! Output smoothing across frames.
//!
//! When a program is recompiled or an input jumps, outputs declared with a
//! [`ContinuitySemantic`] slew toward their new target instead of snapping.
//! Each output keeps its last smoothed value (one `f64` per component and
//! lane) and moves a fraction `alpha` of the remaining distance per frame:
//!
//! - `tau = base_duration_ms * time_scale_multiplier`
//! - exponential: `alpha = 1 - exp(-dt / tau)`
//! - linear: `alpha = clamp(dt / tau, 0, 1)`
//! - instant, or `tau <= 0`: `alpha = 1`
//!
//! The first observation of an output, or a change in its length, snaps to
//! the target. A non-finite target or smoothed value also snaps, so a NaN
//! never lingers in the track once the target recovers.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use lumen_ir::ContinuitySemantic;

/// How the remaining distance shrinks per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecayCurve {
    Exponential,
    Linear,
    Instant,
}

/// Slew parameters for one semantic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContinuityParams {
    pub base_duration_ms: f64,
    pub decay_curve: DecayCurve,
    pub time_scale_multiplier: f64,
}

impl Default for ContinuityParams {
    fn default() -> Self {
        Self::exponential(150.0)
    }
}

impl ContinuityParams {
    pub const fn exponential(base_duration_ms: f64) -> Self {
        Self {
            base_duration_ms,
            decay_curve: DecayCurve::Exponential,
            time_scale_multiplier: 1.0,
        }
    }

    pub const fn linear(base_duration_ms: f64) -> Self {
        Self {
            base_duration_ms,
            decay_curve: DecayCurve::Linear,
            time_scale_multiplier: 1.0,
        }
    }

    /// Effective time constant in ms.
    pub fn tau_ms(&self) -> f64 {
        self.base_duration_ms * self.time_scale_multiplier
    }

    /// Fraction of the remaining distance covered in `dt_ms`.
    pub fn alpha(&self, dt_ms: f64) -> f64 {
        let tau = self.tau_ms();
        if tau <= 0.0 || !tau.is_finite() {
            return 1.0;
        }
        let dt = dt_ms.max(0.0);
        match self.decay_curve {
            DecayCurve::Exponential => 1.0 - (-dt / tau).exp(),
            DecayCurve::Linear => (dt / tau).clamp(0.0, 1.0),
            DecayCurve::Instant => 1.0,
        }
    }
}

/// Parameters for every semantic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContinuityConfig {
    pub position: ContinuityParams,
    pub radius: ContinuityParams,
    pub opacity: ContinuityParams,
    pub color: ContinuityParams,
    pub custom: ContinuityParams,
}

impl Default for ContinuityConfig {
    fn default() -> Self {
        Self {
            position: ContinuityParams::exponential(150.0),
            radius: ContinuityParams::exponential(120.0),
            opacity: ContinuityParams::linear(200.0),
            color: ContinuityParams::exponential(250.0),
            custom: ContinuityParams::exponential(150.0),
        }
    }
}

impl ContinuityConfig {
    pub fn params(&self, semantic: ContinuitySemantic) -> &ContinuityParams {
        match semantic {
            ContinuitySemantic::Position => &self.position,
            ContinuitySemantic::Radius => &self.radius,
            ContinuitySemantic::Opacity => &self.opacity,
            ContinuitySemantic::Color => &self.color,
            ContinuitySemantic::Custom => &self.custom,
        }
    }
}

/// Smoothed values per output name.
#[derive(Debug, Clone, Default)]
pub struct ContinuityLayer {
    config: ContinuityConfig,
    tracks: IndexMap<String, Vec<f64>>,
}

impl ContinuityLayer {
    pub fn new(config: ContinuityConfig) -> Self {
        Self {
            config,
            tracks: IndexMap::new(),
        }
    }

    pub fn config(&self) -> &ContinuityConfig {
        &self.config
    }

    /// Move the track for `name` toward `target` and return it.
    pub fn apply(
        &mut self,
        name: &str,
        semantic: ContinuitySemantic,
        target: &[f64],
        dt_ms: f64,
    ) -> &[f64] {
        let alpha = self.config.params(semantic).alpha(dt_ms);
        let track = self.tracks.entry(name.to_string()).or_default();

        if track.len() != target.len() {
            track.clear();
            track.extend_from_slice(target);
            return track;
        }
        for (value, &goal) in track.iter_mut().zip(target) {
            if goal.is_finite() && value.is_finite() {
                *value += (goal - *value) * alpha;
            } else {
                *value = goal;
            }
        }
        track
    }

    /// Last smoothed value of an output.
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.tracks.get(name).map(Vec::as_slice)
    }

    /// Forget one output so its next observation snaps.
    pub fn forget(&mut self, name: &str) {
        self.tracks.shift_remove(name);
    }

    /// Forget every output.
    pub fn reset(&mut self) {
        self.tracks.clear();
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
