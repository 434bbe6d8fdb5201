//! Eyewear try-on: head pose tracking with overlay anchoring.

use anyhow::{Context, Result};
use clap::Parser;
use head_pose_overlay::{
    app::TryOnSession,
    asset_manager::ManifestLoader,
    config::{Config, DetectorKind, EXAMPLE_CONFIG},
    renderer::{HeadlessRenderer, Renderer},
};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Camera index to use
    #[arg(long)]
    cam: Option<i32>,

    /// Replay a directory of images instead of a camera
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Restart the image replay after the last frame
    #[arg(long)]
    loop_frames: bool,

    /// Detector backend (landmark, cascade)
    #[arg(short, long)]
    backend: Option<String>,

    /// Accessory id to attach on start
    #[arg(short, long)]
    accessory: Option<String>,

    /// Pose smoothing filter (none, exponential[:blend], moving_average[:n], median[:n])
    #[arg(short, long)]
    filter: Option<String>,

    /// Run without a window
    #[arg(long)]
    headless: bool,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Print an example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::from_file(path).with_context(|| format!("Failed to load {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(cam) = args.cam {
        config.camera.index = cam;
    }
    if let Some(frames) = &args.frames {
        config.camera.frames_dir = Some(frames.clone());
    }
    if args.loop_frames {
        config.camera.loop_frames = true;
    }
    if let Some(backend) = &args.backend {
        config.detector.backend = backend.parse::<DetectorKind>()?;
    }
    if let Some(accessory) = &args.accessory {
        config.assets.initial_accessory = Some(accessory.clone());
    }
    if let Some(filter) = &args.filter {
        config.smoothing.filter.clone_from(filter);
    }
    if args.headless {
        config.render.headless = true;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn run_session<R: Renderer>(config: Config, renderer: R) -> Result<TryOnSession<R>> {
    // A finite replay without a window has nothing left to show once it ends
    let finite_replay = config.render.headless && config.camera.frames_dir.is_some() && !config.camera.loop_frames;

    let mut session = TryOnSession::new(config, renderer, Arc::new(ManifestLoader))?.stop_on_source_end(finite_replay);
    session.start().context("Failed to start AR session")?;
    session.run()?;
    Ok(session)
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if args.print_config {
        print!("{EXAMPLE_CONFIG}");
        return Ok(());
    }

    info!("Head pose overlay - eyewear try-on");
    let config = load_config(&args)?;

    if config.render.headless {
        let session = run_session(config, HeadlessRenderer::new())?;
        let renderer = session.scheduler().renderer();
        info!(
            "Rendered {} frames; last status: {}",
            renderer.frames_rendered(),
            renderer.last_frame().map_or("none", |frame| frame.status.as_str())
        );
        return Ok(());
    }

    #[cfg(feature = "opencv")]
    {
        use head_pose_overlay::{renderer::WindowRenderer, types::Viewport};

        let viewport = Viewport::new(
            f64::from(config.render.window_width),
            f64::from(config.render.window_height),
        );
        let renderer = WindowRenderer::new("Eyewear Try-On", viewport)?;
        run_session(config, renderer)?;
    }

    #[cfg(not(feature = "opencv"))]
    {
        log::warn!("Built without window support; rendering headless");
        let mut config = config;
        config.render.headless = true;
        run_session(config, HeadlessRenderer::new())?;
    }

    info!("Application shutting down");
    Ok(())
}
