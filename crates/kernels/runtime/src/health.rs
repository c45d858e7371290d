//! Numeric health monitoring.
//!
//! NaN and infinity are not corrected and do not stop a frame. Each
//! occurrence is logged at `warn` and kept in a bounded event log so hosts
//! can surface it.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::warn;

use lumen_ir::ExprId;

/// Default number of retained events.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthKind {
    Nan,
    Infinite,
}

impl HealthKind {
    /// Classify a value, `None` when finite.
    pub fn of(value: f64) -> Option<Self> {
        if value.is_nan() {
            Some(HealthKind::Nan)
        } else if value.is_infinite() {
            Some(HealthKind::Infinite)
        } else {
            None
        }
    }
}

/// One non-finite result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthEvent {
    pub frame: u64,
    pub expr: ExprId,
    /// First offending lane for arrays, `None` for scalars.
    pub lane: Option<usize>,
    /// Number of offending values (1 for scalars).
    pub count: usize,
    pub kind: HealthKind,
}

/// Bounded log of non-finite results with per-kind totals.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    capacity: usize,
    events: VecDeque<HealthEvent>,
    nan_total: u64,
    infinite_total: u64,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl HealthMonitor {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity.min(1024)),
            nan_total: 0,
            infinite_total: 0,
        }
    }

    /// Check one scalar result.
    pub fn check_scalar(&mut self, frame: u64, expr: ExprId, value: f64) {
        if let Some(kind) = HealthKind::of(value) {
            warn!(expr = %expr, frame, value, "non-finite scalar");
            self.push(HealthEvent {
                frame,
                expr,
                lane: None,
                count: 1,
                kind,
            });
        }
    }

    /// Check a lane buffer; one event per buffer.
    pub fn check_lanes(&mut self, frame: u64, expr: ExprId, stride: usize, values: &[f64]) {
        let mut first = None;
        let mut count = 0;
        for (i, &v) in values.iter().enumerate() {
            if let Some(kind) = HealthKind::of(v) {
                count += 1;
                if first.is_none() {
                    first = Some((i / stride.max(1), kind));
                }
            }
        }
        if let Some((lane, kind)) = first {
            warn!(expr = %expr, frame, lane, count, "non-finite lanes");
            self.push(HealthEvent {
                frame,
                expr,
                lane: Some(lane),
                count,
                kind,
            });
        }
    }

    fn push(&mut self, event: HealthEvent) {
        match event.kind {
            HealthKind::Nan => self.nan_total += 1,
            HealthKind::Infinite => self.infinite_total += 1,
        }
        if self.capacity == 0 {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Retained events, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &HealthEvent> {
        self.events.iter()
    }

    pub fn nan_total(&self) -> u64 {
        self.nan_total
    }

    pub fn infinite_total(&self) -> u64 {
        self.infinite_total
    }

    pub fn is_healthy(&self) -> bool {
        self.nan_total == 0 && self.infinite_total == 0
    }

    /// Forget retained events and totals.
    pub fn clear(&mut self) {
        self.events.clear();
        self.nan_total = 0;
        self.infinite_total = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finite_values_are_ignored() {
        let mut monitor = HealthMonitor::new(4);
        monitor.check_scalar(1, ExprId(0), 1.5);
        monitor.check_lanes(1, ExprId(1), 2, &[0.0, 1.0, 2.0, 3.0]);
        assert!(monitor.is_healthy());
        assert_eq!(monitor.events().count(), 0);
    }

    #[test]
    fn test_lane_events_report_first_lane() {
        let mut monitor = HealthMonitor::new(4);
        monitor.check_lanes(3, ExprId(2), 2, &[0.0, 1.0, 2.0, f64::NAN, f64::NAN, 0.0]);
        let event = monitor.events().next().unwrap();
        assert_eq!(event.lane, Some(1));
        assert_eq!(event.count, 2);
        assert_eq!(event.kind, HealthKind::Nan);
        assert_eq!(monitor.nan_total(), 1);
    }

    #[test]
    fn test_log_is_bounded() {
        let mut monitor = HealthMonitor::new(2);
        for frame in 0..5 {
            monitor.check_scalar(frame, ExprId(0), f64::INFINITY);
        }
        let frames: Vec<u64> = monitor.events().map(|e| e.frame).collect();
        assert_eq!(frames, vec![3, 4]);
        assert_eq!(monitor.infinite_total(), 5);
    }
}
