//! Pure kernel functions.
//!
//! Kernels (`map`, `zip`, `zipSig`) name one [`PureFn`]. The set is closed so
//! every evaluator handles every function.
//!
//! Functions fall into shape classes:
//!
//! - **component-wise** ([`UnaryFn`], [`BinaryFn`], [`TernaryFn`],
//!   [`VariadicFn`]): applied per component; a stride-1 operand is broadcast
//!   across the components of wider operands.
//! - **construct** ([`ConstructFn`]): stride-1 operands are concatenated into
//!   a vector or color.
//! - **collapse** ([`CollapseFn`]): one operand of any stride folds to a
//!   single component.
//!
//! Booleans are encoded as 0.0 / 1.0; any value `>= 0.5` is truthy.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Single-operand component-wise functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryFn {
    Identity,
    Neg,
    Abs,
    Floor,
    Fract,
    Sqrt,
    Sin,
    Cos,
    Exp,
    /// Clamp to [0, 1].
    Saturate,
    /// Wrap into [0, 1).
    WrapPhase,
    Not,
}

/// Two-operand component-wise functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryFn {
    Sub,
    Div,
    Pow,
    /// Euclidean remainder.
    Mod,
    Lt,
    Gt,
    Eq,
    Atan2,
}

/// Three-operand component-wise functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TernaryFn {
    /// `a + (b - a) * t`
    Lerp,
    /// `clamp(x, lo, hi)`
    Clamp,
    /// `if cond { a } else { b }`
    Select,
}

/// Component-wise folds over two or more operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariadicFn {
    Add,
    Mul,
    Min,
    Max,
    Any,
    All,
}

/// Build a multi-component value from stride-1 operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstructFn {
    Vec2,
    Vec3,
    Color,
}

/// Fold one multi-component operand to one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollapseFn {
    /// Euclidean length.
    Length,
    /// Extract component `n`.
    Component(u8),
}

/// A kernel function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PureFn {
    Unary(UnaryFn),
    Binary(BinaryFn),
    Ternary(TernaryFn),
    Variadic(VariadicFn),
    Construct(ConstructFn),
    Collapse(CollapseFn),
}

/// Accepted operand counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    /// Whether `n` operands are accepted.
    pub const fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exact(k) => n == k,
            Arity::AtLeast(k) => n >= k,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(k) => write!(f, "exactly {k}"),
            Arity::AtLeast(k) => write!(f, "at least {k}"),
        }
    }
}

impl fmt::Display for PureFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PureFn::Unary(func) => write!(f, "{func:?}"),
            PureFn::Binary(func) => write!(f, "{func:?}"),
            PureFn::Ternary(func) => write!(f, "{func:?}"),
            PureFn::Variadic(func) => write!(f, "{func:?}"),
            PureFn::Construct(func) => write!(f, "{func:?}"),
            PureFn::Collapse(func) => write!(f, "{func:?}"),
        }
    }
}

#[inline]
fn truthy(v: f64) -> bool {
    v >= 0.5
}

#[inline]
fn from_bool(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

/// Component `c` of an operand, broadcasting stride-1 operands.
#[inline]
fn pick(arg: &[f64], c: usize) -> f64 {
    if arg.len() == 1 { arg[0] } else { arg[c] }
}

impl PureFn {
    /// Accepted operand counts.
    pub const fn arity(self) -> Arity {
        match self {
            PureFn::Unary(_) | PureFn::Collapse(_) => Arity::Exact(1),
            PureFn::Binary(_) => Arity::Exact(2),
            PureFn::Ternary(_) => Arity::Exact(3),
            PureFn::Variadic(_) => Arity::AtLeast(2),
            PureFn::Construct(ConstructFn::Vec2) => Arity::Exact(2),
            PureFn::Construct(ConstructFn::Vec3) => Arity::Exact(3),
            PureFn::Construct(ConstructFn::Color) => Arity::Exact(4),
        }
    }

    /// Result stride for the given operand strides, or `None` when the
    /// operands do not fit this function.
    pub fn output_stride(self, inputs: &[usize]) -> Option<usize> {
        if !self.arity().accepts(inputs.len()) || inputs.contains(&0) {
            return None;
        }
        match self {
            PureFn::Unary(_) | PureFn::Binary(_) | PureFn::Ternary(_) | PureFn::Variadic(_) => {
                let widest = inputs.iter().copied().max()?;
                inputs
                    .iter()
                    .all(|&s| s == 1 || s == widest)
                    .then_some(widest)
            }
            PureFn::Construct(_) => inputs.iter().all(|&s| s == 1).then_some(inputs.len()),
            PureFn::Collapse(CollapseFn::Length) => Some(1),
            PureFn::Collapse(CollapseFn::Component(n)) => ((n as usize) < inputs[0]).then_some(1),
        }
    }

    /// Apply to one element.
    ///
    /// `args[i]` holds the components of operand `i`; `out` receives the
    /// result components. Callers validate strides with
    /// [`PureFn::output_stride`] beforehand.
    pub fn apply(self, args: &[&[f64]], out: &mut [f64]) {
        match self {
            PureFn::Unary(func) => {
                for (c, slot) in out.iter_mut().enumerate() {
                    *slot = func.eval(pick(args[0], c));
                }
            }
            PureFn::Binary(func) => {
                for (c, slot) in out.iter_mut().enumerate() {
                    *slot = func.eval(pick(args[0], c), pick(args[1], c));
                }
            }
            PureFn::Ternary(func) => {
                for (c, slot) in out.iter_mut().enumerate() {
                    *slot = func.eval(pick(args[0], c), pick(args[1], c), pick(args[2], c));
                }
            }
            PureFn::Variadic(func) => {
                for (c, slot) in out.iter_mut().enumerate() {
                    *slot = func.fold(args.iter().map(|arg| pick(arg, c)));
                }
            }
            PureFn::Construct(_) => {
                for (slot, arg) in out.iter_mut().zip(args) {
                    *slot = arg[0];
                }
            }
            PureFn::Collapse(CollapseFn::Length) => {
                out[0] = args[0].iter().map(|v| v * v).sum::<f64>().sqrt();
            }
            PureFn::Collapse(CollapseFn::Component(n)) => {
                out[0] = args[0][n as usize];
            }
        }
    }

    /// Apply to stride-1 operands, producing one value.
    pub fn apply_scalar(self, args: &[f64]) -> f64 {
        let mut out = [0.0];
        let slices: Vec<&[f64]> = args.iter().map(std::slice::from_ref).collect();
        self.apply(&slices, &mut out);
        out[0]
    }
}

impl UnaryFn {
    fn eval(self, x: f64) -> f64 {
        match self {
            UnaryFn::Identity => x,
            UnaryFn::Neg => -x,
            UnaryFn::Abs => x.abs(),
            UnaryFn::Floor => x.floor(),
            UnaryFn::Fract => x - x.floor(),
            UnaryFn::Sqrt => x.sqrt(),
            UnaryFn::Sin => x.sin(),
            UnaryFn::Cos => x.cos(),
            UnaryFn::Exp => x.exp(),
            UnaryFn::Saturate => x.clamp(0.0, 1.0),
            UnaryFn::WrapPhase => x.rem_euclid(1.0),
            UnaryFn::Not => from_bool(!truthy(x)),
        }
    }
}

impl BinaryFn {
    fn eval(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryFn::Sub => a - b,
            BinaryFn::Div => a / b,
            BinaryFn::Pow => a.powf(b),
            BinaryFn::Mod => a.rem_euclid(b),
            BinaryFn::Lt => from_bool(a < b),
            BinaryFn::Gt => from_bool(a > b),
            BinaryFn::Eq => from_bool(a == b),
            BinaryFn::Atan2 => a.atan2(b),
        }
    }
}

impl TernaryFn {
    fn eval(self, a: f64, b: f64, c: f64) -> f64 {
        match self {
            TernaryFn::Lerp => a + (b - a) * c,
            TernaryFn::Clamp => a.max(b).min(c),
            TernaryFn::Select => {
                if truthy(a) {
                    b
                } else {
                    c
                }
            }
        }
    }
}

impl VariadicFn {
    fn fold(self, mut values: impl Iterator<Item = f64>) -> f64 {
        match self {
            VariadicFn::Add => values.sum(),
            VariadicFn::Mul => values.product(),
            VariadicFn::Min => values.fold(f64::INFINITY, f64::min),
            VariadicFn::Max => values.fold(f64::NEG_INFINITY, f64::max),
            VariadicFn::Any => from_bool(values.any(truthy)),
            VariadicFn::All => from_bool(values.all(truthy)),
        }
    }
}
