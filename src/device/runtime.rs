use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use super::session::SessionConfig;
use crate::detect::{
    consolidate_frame, detections_from_map, DetectorBackend, DistanceThresholds, FrameSummary,
    DEFAULT_NMS_IOU,
};
use crate::transport::{encode_frame, format_latency, forward, Command, LINE_END, NO_OBJECTS};

/// Pause between polls while detection is stopped.
pub const IDLE_POLL: Duration = Duration::from_millis(100);

/// Non-blocking supply of inbound command lines.
pub trait CommandSource {
    /// Next pending line, if any. Must not block.
    fn poll_line(&mut self) -> Option<String>;
}

impl CommandSource for VecDeque<String> {
    fn poll_line(&mut self) -> Option<String> {
        self.pop_front()
    }
}

/// Command lines fed by a background reader thread.
pub struct ChannelCommands {
    rx: Receiver<String>,
    closed: bool,
}

impl ChannelCommands {
    /// Read lines from `reader` on a helper thread until it hits end of input.
    pub fn spawn<R: BufRead + Send + 'static>(reader: R) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("command-reader".to_string())
            .spawn(move || {
                for line in reader.lines() {
                    match line {
                        Ok(line) => {
                            if tx.send(line).is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            log::warn!("command input ended: {}", err);
                            break;
                        }
                    }
                }
            })
            .context("failed to spawn command reader")?;
        Ok(Self { rx, closed: false })
    }
}

impl CommandSource for ChannelCommands {
    fn poll_line(&mut self) -> Option<String> {
        match self.rx.try_recv() {
            Ok(line) => Some(line),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                if !self.closed {
                    log::info!("command input closed");
                    self.closed = true;
                }
                None
            }
        }
    }
}

/// What one pass of the frame loop did.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Detection is stopped; nothing was captured.
    Idle,
    Frame(FrameReport),
}

impl CycleOutcome {
    /// How long the caller should sleep before the next cycle.
    pub fn pause(&self, session: &SessionConfig) -> Duration {
        match self {
            CycleOutcome::Idle => IDLE_POLL,
            CycleOutcome::Frame(_) => session.delay,
        }
    }
}

#[derive(Debug)]
pub struct FrameReport {
    pub summary: FrameSummary,
    /// DETECTION line sent for this frame, if any.
    pub line: Option<String>,
    pub latency: Duration,
}

/// Single-threaded counter loop: poll a command, capture, post-process,
/// consolidate, transmit.
pub struct DeviceRuntime<B: DetectorBackend> {
    backend: B,
    thresholds: DistanceThresholds,
    nms_iou: f32,
    frames: u64,
}

impl<B: DetectorBackend> DeviceRuntime<B> {
    pub fn new(backend: B, thresholds: DistanceThresholds) -> Self {
        Self {
            backend,
            thresholds,
            nms_iou: DEFAULT_NMS_IOU,
            frames: 0,
        }
    }

    pub fn with_nms_iou(mut self, nms_iou: f32) -> Self {
        self.nms_iou = nms_iou;
        self
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames
    }

    /// Announce readiness on the link.
    pub fn start(&mut self, link: &mut dyn Write) -> Result<()> {
        self.backend.warm_up()?;
        log::info!(
            "counter ready: backend={}, {} labels",
            self.backend.name(),
            self.backend.labels().len()
        );
        write_line(link, crate::transport::READY_BANNER)
    }

    /// Handle one command line and write the acknowledgement.
    pub fn handle_command(
        &mut self,
        session: &mut SessionConfig,
        line: &str,
        link: &mut dyn Write,
    ) -> Result<()> {
        let parsed = Command::parse(line);
        let reply = session.apply(parsed);
        log::info!("command '{}' -> {}", line.trim(), reply);
        write_line(link, &reply)
    }

    /// One loop iteration. At most one pending command is handled first.
    pub fn run_cycle(
        &mut self,
        session: &mut SessionConfig,
        commands: &mut dyn CommandSource,
        link: &mut dyn Write,
    ) -> Result<CycleOutcome> {
        if let Some(line) = commands.poll_line() {
            self.handle_command(session, &line, link)?;
        }

        if !session.running {
            return Ok(CycleOutcome::Idle);
        }

        let report = self.process_frame(session)?;
        self.transmit(&report, link)?;
        Ok(CycleOutcome::Frame(report))
    }

    /// Capture and post-process one frame without touching the link.
    pub fn process_frame(&mut self, session: &SessionConfig) -> Result<FrameReport> {
        let started = Instant::now();
        let map = self.backend.infer().context("inference failed")?;
        let detections = detections_from_map(
            &map,
            self.backend.labels(),
            self.backend.frame_size(),
            session.min_confidence,
            self.nms_iou,
        );
        let summary = consolidate_frame(&detections, &self.thresholds);
        let latency = started.elapsed();
        self.frames += 1;

        log_summary(&summary);
        log::info!("detection latency: {} ms", latency.as_millis());

        Ok(FrameReport {
            line: encode_frame(&summary),
            summary,
            latency,
        })
    }

    fn transmit(&self, report: &FrameReport, link: &mut dyn Write) -> Result<()> {
        // The host clears its detected set on NO_OBJECTS, so any frame
        // without a DETECTION line must send it, even with a non-empty summary.
        match &report.line {
            Some(line) => {
                write_line(link, line)?;
                write_line(link, &forward(line))?;
                log::debug!("sent: {}", line);
            }
            None => {
                if !report.summary.is_empty() {
                    log::warn!("no encodable labels in frame summary; reporting empty frame");
                }
                write_line(link, NO_OBJECTS)?;
            }
        }
        write_line(link, &format_latency(report.latency.as_millis()))
    }
}

fn write_line(link: &mut dyn Write, text: &str) -> Result<()> {
    link.write_all(text.as_bytes())
        .and_then(|_| link.write_all(LINE_END.as_bytes()))
        .and_then(|_| link.flush())
        .context("failed to write to link")
}

fn log_summary(summary: &FrameSummary) {
    if summary.is_empty() {
        log::info!("{}", NO_OBJECTS);
        return;
    }
    for class in summary.classes() {
        let best = class.best().map(|r| r.confidence).unwrap_or(0.0);
        log::info!(
            "object {}: {} cluster(s), {} raw, confidence {:.4} ({}%)",
            class.label,
            class.records.len(),
            class.total_count(),
            best,
            (best * 100.0) as u32
        );
    }
}
