//! Field materializer: one lane buffer per node per frame.
//!
//! Buffers hold `count * stride` values, lane-major, and come from the
//! [`BufferPool`](crate::pool::BufferPool). Zero-cardinality constants used as
//! operands are broadcast to every lane without materializing a buffer.

use lumen_ir::{
    EvalFamily, EventKind, ExprId, ExprKind, ExprNode, IntrinsicKind, IntrinsicProperty,
    KernelKind, PathDerivativeOp, PlacementField, PureFn,
};

use crate::error::{Error, Result};

use super::placement;
use super::FrameEvaluator;

/// Where one lane-wise operand reads its components from.
enum LaneSource<'s> {
    /// A materialized buffer with the given stride.
    Lanes { values: &'s [f64], stride: usize },
    /// The same components for every lane.
    Uniform(Vec<f64>),
}

impl LaneSource<'_> {
    fn lane(&self, i: usize) -> &[f64] {
        match self {
            LaneSource::Lanes { values, stride } => &values[i * stride..(i + 1) * stride],
            LaneSource::Uniform(components) => components,
        }
    }
}

impl FrameEvaluator<'_> {
    /// Materialize an array node over `count` lanes into the array cache.
    ///
    /// Read the result with [`RuntimeState::array`](crate::state::RuntimeState::array).
    pub fn materialize(&mut self, id: ExprId, count: usize) -> Result<()> {
        let node = self.node(id)?;
        if node.ty.family() != Some(EvalFamily::Array) {
            return Err(self.extent_violation(id, node, EvalFamily::Array));
        }
        let stride = node.ty.stride();
        let expected = count * stride;

        if let Some(cached) = self.state.array(id) {
            if cached.len() != expected {
                return Err(Error::LaneCountMismatch {
                    expr: id,
                    expected,
                    found: cached.len(),
                });
            }
            self.state.stats_mut().array_cache_hits += 1;
            return Ok(());
        }

        let mut buf = self.pool.acquire(expected);
        if let Err(err) = self.fill(id, node, count, stride, &mut buf) {
            self.pool.release(buf);
            return Err(err);
        }

        let frame = self.frame_id;
        self.state.health_mut().check_lanes(frame, id, stride, &buf);
        self.state.store_array(id, buf, self.pool)?;
        self.state.stats_mut().arrays_materialized += 1;
        Ok(())
    }

    fn fill(
        &mut self,
        id: ExprId,
        node: &ExprNode,
        count: usize,
        stride: usize,
        buf: &mut [f64],
    ) -> Result<()> {
        match &node.kind {
            ExprKind::Const(literal) => {
                let components = literal.components();
                for lane in buf.chunks_exact_mut(stride) {
                    lane.copy_from_slice(&components);
                }
            }
            ExprKind::Intrinsic(intrinsic) => {
                let program = self.program;
                let instance = node
                    .ty
                    .instance()
                    .and_then(|i| program.instances().get(i))
                    .ok_or_else(|| self.extent_violation(id, node, EvalFamily::Array))?;
                for (i, lane) in buf.chunks_exact_mut(stride).enumerate() {
                    match intrinsic {
                        IntrinsicKind::Property(IntrinsicProperty::Index) => lane[0] = i as f64,
                        IntrinsicKind::Property(IntrinsicProperty::NormalizedIndex) => {
                            lane[0] = placement::normalized_index(i, count);
                        }
                        IntrinsicKind::Property(IntrinsicProperty::RandomId) => {
                            lane[0] = placement::random_id(instance.seed, i);
                        }
                        IntrinsicKind::Placement(PlacementField::Uv) => {
                            lane.copy_from_slice(&placement::uv(instance.layout, i, count));
                        }
                        IntrinsicKind::Placement(PlacementField::Rank) => {
                            lane[0] = placement::rank(i, count);
                        }
                        IntrinsicKind::Placement(PlacementField::Seed) => {
                            lane[0] = placement::placement_seed(instance.seed, i);
                        }
                    }
                }
            }
            ExprKind::Kernel(KernelKind::Broadcast { signal }) => {
                let v = self.eval_scalar(*signal)?;
                buf.fill(v);
            }
            ExprKind::Kernel(KernelKind::Map { input, func }) => {
                self.lane_wise(*func, &[*input], &[], count, stride, buf)?;
            }
            ExprKind::Kernel(KernelKind::Zip { inputs, func }) => {
                self.lane_wise(*func, inputs, &[], count, stride, buf)?;
            }
            ExprKind::Kernel(KernelKind::ZipSig {
                field,
                signals,
                func,
            }) => {
                let mut values = Vec::with_capacity(signals.len());
                for &signal in signals {
                    values.push(self.eval_scalar(signal)?);
                }
                self.lane_wise(*func, &[*field], &values, count, stride, buf)?;
            }
            ExprKind::Kernel(KernelKind::PathDerivative { field, op }) => {
                self.materialize(*field, count)?;
                let path_stride = self.node(*field)?.ty.stride();
                let path = self.checked_lanes(*field, count, path_stride)?;
                match op {
                    PathDerivativeOp::Tangent => tangent(path, path_stride, count, buf),
                    PathDerivativeOp::ArcLength => arc_length(path, path_stride, count, buf),
                }
            }
            ExprKind::State { slot } => {
                let values = self
                    .state
                    .state_value(*slot)
                    .ok_or_else(|| Error::UnknownSlot(slot.to_string()))?;
                if values.len() != buf.len() {
                    return Err(Error::LaneCountMismatch {
                        expr: id,
                        expected: buf.len(),
                        found: values.len(),
                    });
                }
                buf.copy_from_slice(values);
            }
            ExprKind::External { .. }
            | ExprKind::Time(_)
            | ExprKind::SlotRead { .. }
            | ExprKind::ShapeRef { .. }
            | ExprKind::EventRead { .. }
            | ExprKind::Kernel(KernelKind::Reduce { .. })
            | ExprKind::Event(
                EventKind::Const { .. }
                | EventKind::Pulse
                | EventKind::Wrap { .. }
                | EventKind::Combine { .. }
                | EventKind::Never,
            ) => return Err(self.extent_violation(id, node, EvalFamily::Array)),
        }
        Ok(())
    }

    /// Apply `func` per lane to array operands followed by scalar operands.
    fn lane_wise(
        &mut self,
        func: PureFn,
        arrays: &[ExprId],
        scalars: &[f64],
        count: usize,
        stride: usize,
        buf: &mut [f64],
    ) -> Result<()> {
        for &operand in arrays {
            if self.node(operand)?.ty.family() == Some(EvalFamily::Array) {
                self.materialize(operand, count)?;
            }
        }

        let mut sources = Vec::with_capacity(arrays.len() + scalars.len());
        for &operand in arrays {
            let node = self.node(operand)?;
            let source = match node.ty.family() {
                Some(EvalFamily::Array) => LaneSource::Lanes {
                    values: self.checked_lanes(operand, count, node.ty.stride())?,
                    stride: node.ty.stride(),
                },
                // Zero-cardinality donor.
                Some(EvalFamily::Scalar) => match &node.kind {
                    ExprKind::Const(literal) => LaneSource::Uniform(literal.components()),
                    _ => return Err(self.extent_violation(operand, node, EvalFamily::Array)),
                },
                Some(EvalFamily::Pulse) | None => {
                    return Err(self.extent_violation(operand, node, EvalFamily::Array));
                }
            };
            sources.push(source);
        }
        sources.extend(scalars.iter().map(|&v| LaneSource::Uniform(vec![v])));

        for (i, out) in buf.chunks_exact_mut(stride).enumerate() {
            let args: Vec<&[f64]> = sources.iter().map(|s| s.lane(i)).collect();
            func.apply(&args, out);
        }
        Ok(())
    }

    /// A materialized operand buffer, checked against the lane count.
    fn checked_lanes(&self, id: ExprId, count: usize, stride: usize) -> Result<&[f64]> {
        let values = self.state.array(id).ok_or(Error::MissingArray(id))?;
        if values.len() != count * stride {
            return Err(Error::LaneCountMismatch {
                expr: id,
                expected: count * stride,
                found: values.len(),
            });
        }
        Ok(values)
    }
}

/// Central difference of an open polyline, one-sided at the ends.
fn tangent(path: &[f64], stride: usize, count: usize, out: &mut [f64]) {
    if count < 2 {
        out.fill(0.0);
        return;
    }
    for i in 0..count {
        let prev = i.saturating_sub(1);
        let next = (i + 1).min(count - 1);
        let span = (next - prev) as f64;
        for c in 0..stride {
            out[i * stride + c] = (path[next * stride + c] - path[prev * stride + c]) / span;
        }
    }
}

/// Cumulative distance from lane 0.
fn arc_length(path: &[f64], stride: usize, count: usize, out: &mut [f64]) {
    let mut total = 0.0;
    for i in 0..count {
        if i > 0 {
            let a = &path[(i - 1) * stride..i * stride];
            let b = &path[i * stride..(i + 1) * stride];
            total += a.iter().zip(b).map(|(x, y)| (y - x) * (y - x)).sum::<f64>().sqrt();
        }
        out[i] = total;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tangent_of_line() {
        let path = [0.0, 0.0, 1.0, 0.0, 3.0, 0.0];
        let mut out = [0.0; 6];
        tangent(&path, 2, 3, &mut out);
        assert_eq!(out, [1.0, 0.0, 1.5, 0.0, 2.0, 0.0]);
    }

    #[test]
    fn test_tangent_single_lane_is_zero() {
        let mut out = [9.0; 2];
        tangent(&[4.0, 4.0], 2, 1, &mut out);
        assert_eq!(out, [0.0, 0.0]);
    }

    #[test]
    fn test_arc_length_accumulates() {
        let path = [0.0, 0.0, 3.0, 4.0, 3.0, 5.0];
        let mut out = [0.0; 3];
        arc_length(&path, 2, 3, &mut out);
        assert_eq!(out, [0.0, 5.0, 6.0]);
    }
}
