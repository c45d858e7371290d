//! Operand shape checks shared by the `emit_*` constructors.

use crate::error::ShapeViolation;
use crate::expr::{ExprId, ExprNode, ExprTable};
use crate::functions::PureFn;
use crate::instance::{InstanceId, InstanceRegistry};
use crate::types::{CanonicalType, Cardinality, EvalFamily, Extent, Temporality};

/// Shape checker bound to one operation name.
pub(super) struct Check<'a> {
    pub table: &'a ExprTable,
    pub instances: &'a InstanceRegistry,
    pub operation: &'static str,
}

impl<'a> Check<'a> {
    pub fn operand(&self, id: ExprId) -> Result<&'a ExprNode, ShapeViolation> {
        self.table.get(id).ok_or(ShapeViolation::UnknownOperand {
            operation: self.operation,
            operand: id,
        })
    }

    fn mismatch(&self, operand: ExprId, expected: &'static str, node: &ExprNode) -> ShapeViolation {
        ShapeViolation::OperandMismatch {
            operation: self.operation,
            operand,
            expected,
            found: node.ty,
        }
    }

    /// A single-component continuous value with zero or one cardinality.
    pub fn scalar_operand(&self, id: ExprId) -> Result<&'a ExprNode, ShapeViolation> {
        let node = self.operand(id)?;
        if node.ty.family() == Some(EvalFamily::Scalar) && node.ty.stride() == 1 {
            Ok(node)
        } else {
            Err(self.mismatch(id, "a single-component scalar", node))
        }
    }

    /// A continuous per-lane value.
    pub fn field_operand(&self, id: ExprId) -> Result<(&'a ExprNode, InstanceId), ShapeViolation> {
        let node = self.operand(id)?;
        match (node.ty.extent.cardinality, node.ty.extent.temporality) {
            (Cardinality::Many(instance), Temporality::Continuous) => Ok((node, instance)),
            _ => Err(self.mismatch(id, "a continuous field", node)),
        }
    }

    /// A boolean pulse.
    pub fn pulse_operand(&self, id: ExprId) -> Result<&'a ExprNode, ShapeViolation> {
        let node = self.operand(id)?;
        if node.ty.family() == Some(EvalFamily::Pulse) {
            Ok(node)
        } else {
            Err(self.mismatch(id, "a pulse", node))
        }
    }

    pub fn instance(&self, id: InstanceId) -> Result<(), ShapeViolation> {
        self.instances
            .get(id)
            .map(|_| ())
            .ok_or(ShapeViolation::UnknownInstance(id))
    }

    /// Result must be a single-component value with cardinality one.
    pub fn scalar_result(&self, ty: CanonicalType) -> Result<(), ShapeViolation> {
        if ty.extent == Extent::signal() && ty.stride() == 1 {
            Ok(())
        } else {
            Err(ShapeViolation::ResultMismatch {
                operation: self.operation,
                declared: ty,
                expected: "a single-component signal",
            })
        }
    }

    /// Result must be a single-component numeric signal.
    pub fn numeric_scalar_result(&self, ty: CanonicalType) -> Result<(), ShapeViolation> {
        self.scalar_result(ty)?;
        if ty.payload.is_numeric() {
            Ok(())
        } else {
            Err(ShapeViolation::ResultMismatch {
                operation: self.operation,
                declared: ty,
                expected: "a numeric signal",
            })
        }
    }

    /// Result must be a continuous field over `instance`.
    pub fn field_result(&self, ty: CanonicalType, instance: InstanceId) -> Result<(), ShapeViolation> {
        if ty.extent == Extent::field(instance) {
            Ok(())
        } else {
            Err(ShapeViolation::ResultMismatch {
                operation: self.operation,
                declared: ty,
                expected: "a field over the operand instance",
            })
        }
    }

    /// Any type with an evaluator; scalars must be single-component.
    pub fn storable(&self, ty: CanonicalType) -> Result<(), ShapeViolation> {
        if ty.extent.temporality != Temporality::Continuous || ty.family().is_none() {
            return Err(ShapeViolation::ResultMismatch {
                operation: self.operation,
                declared: ty,
                expected: "a continuous type",
            });
        }
        match ty.extent.cardinality {
            Cardinality::Zero => Ok(()),
            Cardinality::One => self.scalar_result(ty),
            Cardinality::Many(instance) => self.instance(instance),
        }
    }

    /// Operand count and strides fit `func`, producing `declared`'s stride.
    pub fn function(&self, func: PureFn, inputs: &[usize], declared: CanonicalType) -> Result<(), ShapeViolation> {
        let arity = func.arity();
        if !arity.accepts(inputs.len()) {
            return Err(ShapeViolation::Arity {
                operation: self.operation,
                expected: arity.to_string(),
                found: inputs.len(),
            });
        }
        match func.output_stride(inputs) {
            Some(stride) if stride == declared.stride() => Ok(()),
            _ => Err(ShapeViolation::Stride {
                operation: self.operation,
                inputs: inputs.to_vec(),
                declared: declared.stride(),
            }),
        }
    }
}
