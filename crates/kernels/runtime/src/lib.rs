//! Lumen Runtime.
//!
//! Executes a [`lumen_ir::CompiledProgram`] frame by frame. The runtime owns
//! every mutable piece of evaluation: per-frame caches, persistent state,
//! pooled lane buffers, edge-detection memory and output smoothing.
//!
//! # Architecture
//!
//! - [`types`] - Frame inputs and outputs
//! - [`state`] - [`RuntimeState`]: caches, persistent slots, instance counts
//! - [`pool`] - [`BufferPool`] of recycled lane buffers
//! - [`executor`] - [`execute_frame`] and the three evaluators
//! - [`reductions`] - Deterministic array-to-scalar folds
//! - [`continuity`] - Per-output smoothing between frames
//! - [`health`] - NaN / infinity monitoring
//! - [`config`] - YAML runtime configuration
//! - [`error`] - Error types for runtime failures
//!
//! # Frame Model
//!
//! Each frame proceeds in order:
//!
//! 1. **Begin** - advance the frame stamp, recycle last frame's buffers
//! 2. **Evaluate** - run the schedule's evaluation steps in post-order
//! 3. **Output** - copy output values out, applying continuity
//! 4. **Commit** - write persistent state for the next frame
//!
//! # Example
//!
//! ```ignore
//! use lumen_runtime::{execute_frame, BufferPool, FrameInputs, RuntimeState, TimeInputs};
//!
//! let mut state = RuntimeState::for_program(&program);
//! let mut pool = BufferPool::default();
//!
//! for frame in 1..=60 {
//!     let inputs = FrameInputs::new(TimeInputs::at(frame as f64 * 16.0, 16.0, 1000.0, 4000.0));
//!     let outputs = execute_frame(&program, &mut state, &mut pool, frame, &inputs)?;
//! }
//! ```

pub mod config;
pub mod continuity;
pub mod error;
pub mod executor;
pub mod health;
pub mod pool;
pub mod reductions;
pub mod state;
pub mod types;

pub use config::{ConfigError, ConfigResult, HealthConfig, PoolConfig, RuntimeConfig};
pub use continuity::{ContinuityConfig, ContinuityLayer, ContinuityParams, DecayCurve};
pub use error::{Error, Result};
pub use executor::{FrameEvaluator, execute_frame};
pub use health::{HealthEvent, HealthKind, HealthMonitor};
pub use pool::{BufferPool, PoolStats};
pub use state::{EvalStats, RuntimeState};
pub use types::{ArrayOutput, FrameInputs, FrameOutputs, TimeInputs};
