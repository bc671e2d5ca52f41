//! Rebound CLI
//!
//! Play animation scenarios frame by frame and inspect presets and easings.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::FutureExt;
use indexmap::IndexMap;
use rebound_animation::{
    AnimationController, ControllerProps, ControllerResult, Easing, FrameLoop, SpringPreset,
};
use rebound_core::Animatable;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

use config::{OutputFormat, Scenario};

#[derive(Parser)]
#[command(name = "rebound")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Rebound animation CLI", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a scenario and print every frame
    Play {
        /// Scenario file (TOML)
        scenario: PathBuf,

        /// Output format, overriding the scenario's
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Maximum frames to play, overriding the scenario's
        #[arg(long)]
        frames: Option<usize>,

        /// Milliseconds per frame, overriding the scenario's
        #[arg(long)]
        dt: Option<f64>,
    },

    /// List the named spring presets
    Presets,

    /// Sample an easing curve on [0, 1]
    Ease {
        /// Easing name, e.g. ease-out-cubic
        name: String,

        /// Number of intervals to sample
        #[arg(short, long, default_value = "10")]
        samples: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let directives = log_directives(cli.verbose, std::env::var("RUST_LOG").ok());
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr; stdout carries frame rows only
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Play {
            scenario,
            format,
            frames,
            dt,
        } => cmd_play(&scenario, format, frames, dt),

        Commands::Presets => cmd_presets(),

        Commands::Ease { name, samples } => cmd_ease(&name, samples),
    }
}

/// `--verbose` wins, then `RUST_LOG`, then `info`
fn log_directives(verbose: bool, rust_log: Option<String>) -> String {
    if verbose {
        return "debug".to_string();
    }
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .unwrap_or_else(|| "info".to_string())
}

// =============================================================================
// play
// =============================================================================

#[derive(Serialize)]
struct FrameRow<'a> {
    frame: usize,
    elapsed_ms: f64,
    values: &'a IndexMap<String, Animatable>,
}

fn cmd_play(
    path: &Path,
    format: Option<OutputFormat>,
    frames: Option<usize>,
    dt: Option<f64>,
) -> Result<()> {
    let scenario = Scenario::load(path)?;
    let format = format.unwrap_or(scenario.format);
    let max_frames = frames.unwrap_or(scenario.max_frames);
    let frame_ms = dt.unwrap_or(scenario.frame_ms);
    if frame_ms.is_nan() || frame_ms <= 0.0 {
        anyhow::bail!("--dt must be positive, got {frame_ms}");
    }

    info!(
        "Playing {} ({} tracks, {} ms frames)",
        path.display(),
        scenario.tracks.len(),
        frame_ms
    );

    let frame_loop = FrameLoop::new();
    let mut builder = AnimationController::builder(&frame_loop.handle());
    let mut props = ControllerProps::new().immediate(scenario.immediate);
    let mut configs = IndexMap::new();

    for track in &scenario.tracks {
        let initial = track.from.clone().unwrap_or_else(|| track.to.clone());
        builder = builder.track(track.key.clone(), initial);
        props = props.to(track.key.clone(), track.to.clone());
        configs.insert(track.key.clone(), track.animation_config());
    }
    let props = props.config_with(move |key| configs.get(key).cloned());

    let controller = builder.build().context("Failed to build controller")?;
    let mut done = controller
        .start(props)
        .context("Failed to start scenario")?;

    let keys: Vec<String> = controller.keys().map(str::to_string).collect();
    if format == OutputFormat::Table {
        print_header(&keys);
    }
    print_frame(format, 0, 0.0, &controller.get_all())?;

    let mut played = 0;
    let mut busy = !frame_loop.is_idle();
    while busy && played < max_frames {
        busy = frame_loop.advance(frame_ms);
        played += 1;
        print_frame(format, played, played as f64 * frame_ms, &controller.get_all())?;
    }

    if busy {
        warn!("Stopped after {} frames with animations still running", played);
    }

    let summary = match (&mut done).now_or_never() {
        Some(result) => {
            let ControllerResult {
                finished,
                cancelled,
                ..
            } = result?;
            format!("settled finished={finished} cancelled={cancelled}")
        }
        None => "unsettled".to_string(),
    };

    match format {
        OutputFormat::Table => println!("-- {played} frames, {summary}"),
        OutputFormat::Json => debug!("{played} frames, {summary}"),
    }
    Ok(())
}

fn print_header(keys: &[String]) {
    let mut line = format!("{:>6} {:>10}", "frame", "ms");
    for key in keys {
        line.push_str(&format!("  {key:>14}"));
    }
    println!("{line}");
}

fn print_frame(
    format: OutputFormat,
    frame: usize,
    elapsed_ms: f64,
    values: &IndexMap<String, Animatable>,
) -> Result<()> {
    match format {
        OutputFormat::Table => {
            let mut line = format!("{frame:>6} {elapsed_ms:>10.1}");
            for value in values.values() {
                line.push_str(&format!("  {:>14}", value.to_string()));
            }
            println!("{line}");
        }
        OutputFormat::Json => {
            let row = FrameRow {
                frame,
                elapsed_ms,
                values,
            };
            println!("{}", serde_json::to_string(&row)?);
        }
    }
    Ok(())
}

// =============================================================================
// presets / ease
// =============================================================================

fn cmd_presets() -> Result<()> {
    println!("{:<10} {:>8} {:>8}  damping", "preset", "tension", "friction");
    for preset in SpringPreset::ALL {
        let (tension, friction) = preset.parameters();
        let config = preset.config();
        let damping = if config.is_overdamped() {
            "overdamped"
        } else if config.is_critically_damped() {
            "critical"
        } else {
            "underdamped"
        };
        println!("{:<10} {:>8} {:>8}  {}", preset.name(), tension, friction, damping);
    }
    Ok(())
}

fn cmd_ease(name: &str, samples: usize) -> Result<()> {
    let easing: Easing = name.parse()?;
    let samples = samples.max(1);

    for i in 0..=samples {
        let t = i as f64 / samples as f64;
        println!("{t:.3}  {:.5}", easing.apply(t));
    }
    Ok(())
}
