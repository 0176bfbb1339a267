//! Background line reader for the serial link.

use std::io::{BufRead, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use super::StationEvent;
use crate::transport::{decode_line, LineEvent};

/// Pause after a failed read before trying again.
pub const READ_ERROR_BACKOFF: Duration = Duration::from_millis(100);
/// Pause after a read that timed out without data.
pub const IDLE_BACKOFF: Duration = Duration::from_millis(10);

const JOIN_POLL: Duration = Duration::from_millis(10);

/// Owns the reader thread. Decoded lines are pushed onto the station queue.
///
/// Stopping is cooperative. A thread parked inside a blocking `read` only
/// sees the stop flag once that read returns, so `stop` waits at most the
/// join timeout and then detaches the thread.
#[derive(Debug)]
pub struct SerialReader {
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
    join_timeout: Duration,
}

impl SerialReader {
    pub fn spawn<R>(
        reader: R,
        events: Sender<StationEvent>,
        join_timeout: Duration,
    ) -> Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let join = std::thread::Builder::new()
            .name("serial-reader".to_string())
            .spawn(move || read_lines(reader, events, shutdown_thread))
            .context("failed to spawn serial reader")?;
        Ok(Self {
            shutdown,
            join: Some(join),
            join_timeout,
        })
    }

    /// Signal the thread and wait for it. Returns `false` if the thread was
    /// still blocked when the timeout expired and had to be detached.
    pub fn stop(&mut self) -> bool {
        self.shutdown.store(true, Ordering::SeqCst);
        let Some(join) = self.join.take() else {
            return true;
        };
        let deadline = Instant::now() + self.join_timeout;
        while !join.is_finished() && Instant::now() < deadline {
            std::thread::sleep(JOIN_POLL);
        }
        if join.is_finished() {
            if join.join().is_err() {
                log::error!("serial reader thread panicked");
            }
            true
        } else {
            log::warn!(
                "serial reader did not stop within {} ms, detaching",
                self.join_timeout.as_millis()
            );
            false
        }
    }
}

impl Drop for SerialReader {
    fn drop(&mut self) {
        self.stop();
    }
}

fn read_lines<R: BufRead>(
    mut reader: R,
    events: Sender<StationEvent>,
    shutdown: Arc<AtomicBool>,
) {
    // Holds a partial line across timeouts until its terminator arrives.
    let mut buf = Vec::new();
    while !shutdown.load(Ordering::SeqCst) {
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                if !buf.is_empty() && !deliver(&buf, &events) {
                    return;
                }
                log::info!("serial link closed (EOF)");
                let _ = events.send(StationEvent::LinkClosed);
                return;
            }
            Ok(_) => {
                // Without a terminator the source hit EOF; the next read flushes it.
                if buf.last() != Some(&b'\n') {
                    continue;
                }
                let delivered = deliver(&buf, &events);
                buf.clear();
                if !delivered {
                    return;
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                std::thread::sleep(IDLE_BACKOFF);
            }
            Err(err) => {
                log::warn!("serial read failed: {}", err);
                std::thread::sleep(READ_ERROR_BACKOFF);
            }
        }
    }
    log::debug!("serial reader stopped");
}

/// Decode one raw line and queue it. Returns `false` once the queue is gone.
fn deliver(raw: &[u8], events: &Sender<StationEvent>) -> bool {
    log::trace!("rx: {}", String::from_utf8_lossy(raw).trim_end());
    let event = decode_line(raw);
    if event == LineEvent::Blank {
        return true;
    }
    if events.send(StationEvent::Wire(event)).is_err() {
        log::debug!("station queue closed, reader exiting");
        return false;
    }
    true
}
