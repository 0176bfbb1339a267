//! edge_counter - On-device object counter loop.
//!
//! Runs detection once per frame delay, consolidates the detections and
//! writes DETECTION lines (plus console echo and latency) to the serial
//! device, or to stdout when no device is configured. Commands (`start`,
//! `stop`, `conf=`, `delay=`, `status`) are read from the same device or
//! from stdin.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};

use retail_verify::config::DeviceConfig;
use retail_verify::detect::{DetectorBackend, SceneBackend, StubBackend};
use retail_verify::device::{ChannelCommands, DeviceRuntime, SessionConfig};
use retail_verify::station::DEFAULT_PRODUCTS;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Count products on the checkout counter and report them over serial"
)]
struct Args {
    /// JSON scene file to replay instead of the empty stub scene.
    #[arg(long, env = "RETAIL_SCENE")]
    scene: Option<PathBuf>,

    /// Serial device path to write reports to (defaults to stdout).
    #[arg(long)]
    serial_device: Option<PathBuf>,

    /// Stop after this many processed frames.
    #[arg(long)]
    frames: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = DeviceConfig::load()?;
    if let Some(scene) = args.scene {
        cfg.scene_path = Some(scene);
    }
    if let Some(device) = args.serial_device {
        cfg.link.device = Some(device);
    }

    match cfg.scene_path.clone() {
        Some(path) => {
            let backend = SceneBackend::load(&path)?;
            run(backend, &cfg, args.frames)
        }
        None => {
            let mut labels = vec!["background".to_string()];
            labels.extend(DEFAULT_PRODUCTS.iter().map(|(name, _)| name.to_string()));
            run(StubBackend::new(labels), &cfg, args.frames)
        }
    }
}

fn run<B: DetectorBackend>(backend: B, cfg: &DeviceConfig, max_frames: Option<u64>) -> Result<()> {
    let (mut link, mut commands): (Box<dyn Write>, ChannelCommands) = match &cfg.link.device {
        Some(path) => {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(path)
                .with_context(|| format!("failed to open serial device {}", path.display()))?;
            let read_half = file
                .try_clone()
                .with_context(|| format!("failed to clone handle for {}", path.display()))?;
            log::info!("writing to {} at {}", path.display(), cfg.link.describe());
            (
                Box::new(file) as Box<dyn Write>,
                ChannelCommands::spawn(BufReader::new(read_half))?,
            )
        }
        None => {
            log::info!("no serial device configured, writing to stdout");
            (
                Box::new(io::stdout()) as Box<dyn Write>,
                ChannelCommands::spawn(BufReader::new(io::stdin()))?,
            )
        }
    };

    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("error setting Ctrl-C handler")?;

    let mut session = SessionConfig::new(cfg.min_confidence, cfg.delay);
    let mut runtime =
        DeviceRuntime::new(backend, cfg.thresholds.clone()).with_nms_iou(cfg.nms_iou);
    runtime.start(&mut link)?;

    loop {
        let outcome = runtime.run_cycle(&mut session, &mut commands, &mut link)?;
        if max_frames.map_or(false, |max| runtime.frames_processed() >= max) {
            log::info!("processed {} frames, exiting", runtime.frames_processed());
            break;
        }
        match stop_rx.recv_timeout(outcome.pause(&session)) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                log::info!("shutdown signal received, stopping counter...");
                break;
            }
        }
    }
    Ok(())
}
