//! Lumen Frame Runner
//!
//! Compiles the demo program and executes it frame by frame.
//!
//! Usage: `lumen-frames [--frames N] [--lanes N] [--frame-ms MS] [--config FILE] [--json] [--schedule]`

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{error, info, warn};

use lumen_runtime::{BufferPool, FrameInputs, RuntimeConfig, RuntimeState, TimeInputs, execute_frame};

#[derive(Parser, Debug)]
#[command(name = "lumen-frames")]
#[command(about = "Run the Lumen demo program for a number of frames")]
struct Args {
    /// Number of frames to execute
    #[arg(long, default_value = "60")]
    frames: u64,

    /// Lane count of the demo instance
    #[arg(long, default_value = "64")]
    lanes: usize,

    /// Milliseconds between frames
    #[arg(long = "frame-ms", default_value = "16.0")]
    frame_ms: f64,

    /// Frame at which the `trigger` external goes high for one frame
    #[arg(long)]
    trigger_at: Option<u64>,

    /// Runtime configuration YAML
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print each frame's outputs as JSON lines
    #[arg(long)]
    json: bool,

    /// Print the compiled schedule and exit
    #[arg(long)]
    schedule: bool,
}

fn main() {
    lumen_tools::init_logging();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match RuntimeConfig::load(path) {
            Ok(config) => {
                info!("Loaded runtime config: {}", path.display());
                config
            }
            Err(e) => {
                error!("Failed to load config '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => RuntimeConfig::default(),
    };

    let program = match lumen_tools::demo_program(args.lanes) {
        Ok(program) => program,
        Err(e) => {
            error!("Compilation failed: {}", e);
            process::exit(1);
        }
    };
    info!(
        "Compiled {} nodes into {} steps",
        program.table().len(),
        program.schedule().len()
    );

    if args.schedule {
        println!("{}", program.describe());
        return;
    }

    let mut state = RuntimeState::new(&program, &config);
    let mut pool = BufferPool::new(config.pool.max_buffers_per_size);

    for frame in 1..=args.frames {
        let elapsed = frame as f64 * args.frame_ms;
        let trigger = if args.trigger_at == Some(frame) { 1.0 } else { 0.0 };
        let inputs = FrameInputs::new(TimeInputs::at(elapsed, args.frame_ms, 1000.0, 4000.0))
            .with_external("trigger", trigger);

        let outputs = match execute_frame(&program, &mut state, &mut pool, frame, &inputs) {
            Ok(outputs) => outputs,
            Err(e) => {
                error!("Frame {} failed: {}", frame, e);
                process::exit(1);
            }
        };

        if args.json {
            match serde_json::to_string(&outputs) {
                Ok(line) => println!("{line}"),
                Err(e) => {
                    error!("Failed to encode frame {}: {}", frame, e);
                    process::exit(1);
                }
            }
        } else if outputs.pulse("beat") == Some(true) {
            info!(
                "frame {}: beat (level {:.3}, count {})",
                frame,
                outputs.scalar("level").unwrap_or_default(),
                outputs.scalar("count").unwrap_or_default()
            );
        }
    }

    if !state.health().is_healthy() {
        warn!(
            "Numeric health: {} NaN, {} infinite values",
            state.health().nan_total(),
            state.health().infinite_total()
        );
    }
    let pool_stats = pool.stats();
    info!(
        "Done: {} frames, pool reused {} of {} buffers",
        args.frames, pool_stats.reused, pool_stats.acquired
    );
}
