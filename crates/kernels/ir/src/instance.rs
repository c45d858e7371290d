//! Instance registry.
//!
//! An instance declares an array domain: how many lanes exist, how lanes are
//! placed, and whether the lane count may change at runtime. Many-cardinality
//! types point at an instance through [`Cardinality::Many`](crate::Cardinality);
//! nodes never duplicate the count.

use std::fmt;

use serde::{Deserialize, Serialize};

use lumen_foundation::fnv1a64_str;

use crate::error::ShapeViolation;
use crate::types::CanonicalType;

/// Index of an instance in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub u32);

impl InstanceId {
    /// Position in the registry.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// How lanes are arranged, which drives intrinsic placement (uv / rank).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayoutPolicy {
    /// Low-discrepancy scatter over the unit square.
    Unordered,
    /// Evenly spaced along the horizontal centre line.
    Line,
    /// Row-major grid with a fixed number of columns.
    Grid {
        /// Columns per row (at least one is used).
        columns: u32,
    },
    /// Evenly spaced around a circle inscribed in the unit square.
    Circle,
}

/// Whether and how the lane count may change after compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    /// Count fixed at compile time.
    Static,
    /// Count may change freely between frames.
    Dynamic,
    /// Count may change up to the declared element count.
    Pooled,
}

/// An array domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Registry index.
    pub id: InstanceId,
    /// Human-readable name, also the seed label.
    pub name: String,
    /// Lane count (capacity for pooled instances).
    pub element_count: usize,
    /// Placement policy.
    pub layout: LayoutPolicy,
    /// Resizing policy.
    pub lifecycle: Lifecycle,
    /// Seed for per-lane random identities.
    pub seed: u64,
}

/// All instances declared by a program.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceRegistry {
    instances: Vec<Instance>,
}

impl InstanceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a new instance. The seed is derived from the name.
    pub fn declare(
        &mut self,
        name: impl Into<String>,
        element_count: usize,
        layout: LayoutPolicy,
        lifecycle: Lifecycle,
    ) -> InstanceId {
        let name = name.into();
        let id = InstanceId(self.instances.len() as u32);
        let seed = fnv1a64_str(&name);
        self.instances.push(Instance {
            id,
            name,
            element_count,
            layout,
            lifecycle,
            seed,
        });
        id
    }

    /// Look up an instance.
    pub fn get(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.get(id.index())
    }

    /// Resolve the instance of a many-cardinality type.
    ///
    /// Fails when the type is not many-cardinality or names an unknown
    /// instance.
    pub fn require_many_instance(&self, ty: &CanonicalType) -> Result<&Instance, ShapeViolation> {
        let id = ty.require_many()?;
        self.get(id).ok_or(ShapeViolation::UnknownInstance(id))
    }

    /// Number of declared instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether no instance is declared.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Iterate in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter()
    }
}
