//! Canonical type system.
//!
//! Every expression carries a [`CanonicalType`]: a [`Payload`] (what one
//! element is) and an [`Extent`] (how many elements exist and whether they
//! are continuous values or discrete occurrences).
//!
//! The extent is the single source of truth for the evaluation family:
//! [`Extent::family`] is the only place that maps an extent onto the scalar,
//! array or pulse evaluator. Nothing else infers a family.
//!
//! | Cardinality | Temporality | Family |
//! |-------------|-------------|--------|
//! | zero / one  | continuous  | scalar |
//! | many        | continuous  | array  |
//! | zero / one  | discrete    | pulse  |
//! | many        | discrete    | none   |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::instance::InstanceId;

/// The kind of value carried by one element.
///
/// Each payload has a fixed component stride: the number of `f64` slots one
/// element occupies in a lane buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Payload {
    /// Boolean stored as 0.0 / 1.0.
    Bool,
    /// Integer stored as an exactly representable f64.
    Int,
    /// Unconstrained real number.
    Float,
    /// Real number normalised to [0, 1].
    Unit,
    /// Cyclic position in [0, 1).
    Phase,
    /// Two components (x, y).
    Vec2,
    /// Three components (x, y, z).
    Vec3,
    /// Four components (r, g, b, a).
    Color,
}

impl Payload {
    /// All payloads.
    pub const ALL: [Payload; 8] = [
        Payload::Bool,
        Payload::Int,
        Payload::Float,
        Payload::Unit,
        Payload::Phase,
        Payload::Vec2,
        Payload::Vec3,
        Payload::Color,
    ];

    /// Number of f64 components per element.
    pub const fn stride(self) -> usize {
        match self {
            Payload::Bool | Payload::Int | Payload::Float | Payload::Unit | Payload::Phase => 1,
            Payload::Vec2 => 2,
            Payload::Vec3 => 3,
            Payload::Color => 4,
        }
    }

    /// Anything arithmetic applies to.
    pub const fn is_numeric(self) -> bool {
        !matches!(self, Payload::Bool)
    }

    /// Single-component numeric payloads (ordering is meaningful).
    pub const fn is_ordered(self) -> bool {
        matches!(
            self,
            Payload::Int | Payload::Float | Payload::Unit | Payload::Phase
        )
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Payload::Bool => "bool",
            Payload::Int => "int",
            Payload::Float => "float",
            Payload::Unit => "unit",
            Payload::Phase => "phase",
            Payload::Vec2 => "vec2",
            Payload::Vec3 => "vec3",
            Payload::Color => "color",
        };
        f.write_str(name)
    }
}

/// How many elements an expression produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// Universal donor: a constant usable as a scalar or as any per-lane value.
    Zero,
    /// Exactly one value per frame.
    One,
    /// One value per lane of the referenced instance.
    Many(InstanceId),
}

/// Whether values hold between frames or occur at instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Temporality {
    /// A value exists every frame.
    Continuous,
    /// An occurrence that fires on specific frames.
    Discrete,
}

/// Evaluation family an extent maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvalFamily {
    /// Signal evaluator: one number per frame.
    Scalar,
    /// Field materializer: one buffer of lanes per frame.
    Array,
    /// Event evaluator: one boolean per frame.
    Pulse,
}

impl fmt::Display for EvalFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvalFamily::Scalar => "scalar",
            EvalFamily::Array => "array",
            EvalFamily::Pulse => "pulse",
        };
        f.write_str(name)
    }
}

/// Cardinality x temporality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent {
    /// Element count class.
    pub cardinality: Cardinality,
    /// Continuous value or discrete occurrence.
    pub temporality: Temporality,
}

impl Extent {
    /// One continuous value.
    pub const fn signal() -> Self {
        Self {
            cardinality: Cardinality::One,
            temporality: Temporality::Continuous,
        }
    }

    /// Zero-cardinality continuous constant.
    pub const fn constant() -> Self {
        Self {
            cardinality: Cardinality::Zero,
            temporality: Temporality::Continuous,
        }
    }

    /// One continuous value per lane of `instance`.
    pub const fn field(instance: InstanceId) -> Self {
        Self {
            cardinality: Cardinality::Many(instance),
            temporality: Temporality::Continuous,
        }
    }

    /// One discrete occurrence per frame.
    pub const fn event() -> Self {
        Self {
            cardinality: Cardinality::One,
            temporality: Temporality::Discrete,
        }
    }

    /// The evaluator family for this extent, if one exists.
    pub const fn family(&self) -> Option<EvalFamily> {
        match (self.cardinality, self.temporality) {
            (Cardinality::Zero | Cardinality::One, Temporality::Continuous) => {
                Some(EvalFamily::Scalar)
            }
            (Cardinality::Many(_), Temporality::Continuous) => Some(EvalFamily::Array),
            (Cardinality::Zero | Cardinality::One, Temporality::Discrete) => {
                Some(EvalFamily::Pulse)
            }
            (Cardinality::Many(_), Temporality::Discrete) => None,
        }
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cardinality {
            Cardinality::Zero => f.write_str("zero")?,
            Cardinality::One => f.write_str("one")?,
            Cardinality::Many(instance) => write!(f, "many({instance})")?,
        }
        match self.temporality {
            Temporality::Continuous => f.write_str(",continuous"),
            Temporality::Discrete => f.write_str(",discrete"),
        }
    }
}

/// Payload plus extent: the sole authority for an expression's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalType {
    /// Element kind.
    pub payload: Payload,
    /// Element count and temporality.
    pub extent: Extent,
}

impl CanonicalType {
    /// Build a type from its parts.
    pub const fn new(payload: Payload, extent: Extent) -> Self {
        Self { payload, extent }
    }

    /// A single continuous value.
    pub const fn signal(payload: Payload) -> Self {
        Self::new(payload, Extent::signal())
    }

    /// A zero-cardinality constant.
    pub const fn constant(payload: Payload) -> Self {
        Self::new(payload, Extent::constant())
    }

    /// One value per lane of `instance`.
    pub const fn field(payload: Payload, instance: InstanceId) -> Self {
        Self::new(payload, Extent::field(instance))
    }

    /// A boolean pulse.
    pub const fn event() -> Self {
        Self::new(Payload::Bool, Extent::event())
    }

    /// The extent (`extentOf`).
    pub const fn extent(&self) -> Extent {
        self.extent
    }

    /// Component stride of the payload.
    pub const fn stride(&self) -> usize {
        self.payload.stride()
    }

    /// Evaluator family, derived only from the extent.
    pub const fn family(&self) -> Option<EvalFamily> {
        self.extent.family()
    }

    /// The referenced instance for many-cardinality types.
    pub const fn instance(&self) -> Option<InstanceId> {
        match self.extent.cardinality {
            Cardinality::Many(instance) => Some(instance),
            Cardinality::Zero | Cardinality::One => None,
        }
    }

    /// The referenced instance, or an error when cardinality is not many.
    pub fn require_many(&self) -> Result<InstanceId, crate::ShapeViolation> {
        self.instance()
            .ok_or(crate::ShapeViolation::NotMany { ty: *self })
    }

    /// Same payload, different extent.
    pub const fn with_extent(self, extent: Extent) -> Self {
        Self::new(self.payload, extent)
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}>", self.payload, self.extent)
    }
}

/// How several writers into one input are merged.
///
/// Closed set; each mode is valid only for some payloads, see
/// [`CombineMode::accepts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombineMode {
    /// Component-wise sum.
    Add,
    /// Component-wise product.
    Mul,
    /// Last writer wins.
    Layer,
    /// Largest value.
    Max,
    /// Logical or.
    Or,
    /// Logical and.
    And,
}

impl CombineMode {
    /// Whether this mode is defined for `payload`.
    pub const fn accepts(self, payload: Payload) -> bool {
        match self {
            CombineMode::Add | CombineMode::Mul => payload.is_numeric(),
            CombineMode::Max => payload.is_ordered(),
            CombineMode::Or | CombineMode::And => matches!(payload, Payload::Bool),
            CombineMode::Layer => true,
        }
    }
}

impl fmt::Display for CombineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CombineMode::Add => "add",
            CombineMode::Mul => "mul",
            CombineMode::Layer => "layer",
            CombineMode::Max => "max",
            CombineMode::Or => "or",
            CombineMode::And => "and",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_strides() {
        let strides: Vec<usize> = Payload::ALL.iter().map(|p| p.stride()).collect();
        assert_eq!(strides, vec![1, 1, 1, 1, 1, 2, 3, 4]);
    }

    #[test]
    fn test_family_mapping() {
        let dots = InstanceId(0);
        assert_eq!(Extent::signal().family(), Some(EvalFamily::Scalar));
        assert_eq!(Extent::constant().family(), Some(EvalFamily::Scalar));
        assert_eq!(Extent::field(dots).family(), Some(EvalFamily::Array));
        assert_eq!(Extent::event().family(), Some(EvalFamily::Pulse));

        let per_lane_event = Extent {
            cardinality: Cardinality::Many(dots),
            temporality: Temporality::Discrete,
        };
        assert_eq!(per_lane_event.family(), None);
    }

    #[test]
    fn test_require_many() {
        let dots = InstanceId(3);
        assert_eq!(
            CanonicalType::field(Payload::Float, dots).require_many(),
            Ok(dots)
        );
        assert!(CanonicalType::signal(Payload::Float).require_many().is_err());
        assert!(CanonicalType::constant(Payload::Float).require_many().is_err());
    }

    #[test]
    fn test_combine_mode_payloads() {
        assert!(CombineMode::Add.accepts(Payload::Color));
        assert!(!CombineMode::Add.accepts(Payload::Bool));
        assert!(CombineMode::Max.accepts(Payload::Phase));
        assert!(!CombineMode::Max.accepts(Payload::Vec2));
        assert!(CombineMode::Or.accepts(Payload::Bool));
        assert!(!CombineMode::And.accepts(Payload::Float));
        for payload in Payload::ALL {
            assert!(CombineMode::Layer.accepts(payload));
        }
    }

    #[test]
    fn test_display() {
        let ty = CanonicalType::field(Payload::Vec2, InstanceId(1));
        assert_eq!(ty.to_string(), "vec2<many(i1),continuous>");
        assert_eq!(CanonicalType::event().to_string(), "bool<one,discrete>");
    }
}
