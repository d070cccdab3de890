//! filter-cam - Main Entry Point
//!
//! Reads the camera and panel configuration, starts the processing loop and
//! drives the control panel from a console on stdin.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use parking_lot::Mutex;

use filter_cam::camera;
use filter_cam::control::console::Console;
use filter_cam::output::{preview_channel, DeviceSink, FrameSink, NullSink};
use filter_cam::settings::{load_config, CameraId, CameraSettings, PanelLayout};
use filter_cam::{ControlPanel, EffectRegistry, Pipeline, PriorityChain};

#[derive(Parser, Debug)]
#[command(name = "filter-cam", version, about = "Webcam effects pipeline with virtual camera output")]
struct Args {
    /// Directory holding camera.json and gui.json
    #[arg(long, default_value = "configurations")]
    config_dir: PathBuf,

    /// Capture source: a camera index or "synthetic" (overrides camera.json)
    #[arg(long)]
    camera: Option<CameraId>,

    /// Output device node (overrides camera.json)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Run without the stdin console
    #[arg(long)]
    no_console: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    log::info!("filter-cam v{}", env!("CARGO_PKG_VERSION"));

    let mut settings: CameraSettings =
        load_config(&args.config_dir, "camera").context("Failed to load camera settings")?;
    if let Some(camera) = args.camera {
        settings.camera_id = camera;
    }
    if let Some(output) = args.output {
        settings.output = Some(output);
    }
    let layout: PanelLayout = load_config(&args.config_dir, "gui").context("Failed to load panel layout")?;

    let source = camera::open_source(&settings).context("Failed to open capture source")?;
    let (width, height) = source.dimensions();

    let sink: Box<dyn FrameSink> = match &settings.output {
        Some(path) => Box::new(DeviceSink::open(path, width, height)?),
        None => {
            log::warn!("No output device configured, frames are discarded");
            Box::new(NullSink)
        }
    };

    let registry = Arc::new(EffectRegistry::with_builtin());
    let chain = PriorityChain::shared();
    let preview_enabled = layout.preview.enabled;
    let (preview_tx, preview_rx) = preview_channel(layout.preview.mirrored);
    let panel = ControlPanel::from_layout(layout, registry, Arc::clone(&chain))
        .context("Failed to build control panel")?
        .with_config_dir(&args.config_dir);
    let panel = Arc::new(Mutex::new(panel));

    let mut pipeline = Pipeline::new(source, sink, chain, Arc::clone(&panel));
    if preview_enabled {
        pipeline = pipeline.with_preview(preview_tx);
    }

    if !args.no_console {
        let mut console = Console::new(Arc::clone(&panel), preview_enabled.then_some(preview_rx));
        std::thread::Builder::new()
            .name("console".to_string())
            .spawn(move || {
                let stdin = std::io::stdin();
                if let Err(e) = console.run(stdin.lock(), std::io::stdout()) {
                    log::error!("Console error: {e}");
                }
            })
            .context("Failed to spawn console thread")?;
    }

    pipeline.run()?;
    Ok(())
}
