use std::time::Duration;

use crate::transport::{Command, CommandError};

pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.6;
pub const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(1000);

/// Mutable settings of a running counter session.
///
/// Only command handling changes these; the frame loop reads them each cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub min_confidence: f32,
    pub delay: Duration,
    pub running: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            delay: DEFAULT_FRAME_DELAY,
            running: true,
        }
    }
}

impl SessionConfig {
    pub fn new(min_confidence: f32, delay: Duration) -> Self {
        Self {
            min_confidence,
            delay,
            running: true,
        }
    }

    /// Apply a parsed command and return the acknowledgement text.
    ///
    /// Rejected values leave the session unchanged.
    pub fn apply(&mut self, parsed: Result<Command, CommandError>) -> String {
        match parsed {
            Ok(Command::Start) => {
                self.running = true;
                "Detection started".to_string()
            }
            Ok(Command::Stop) => {
                self.running = false;
                "Detection stopped".to_string()
            }
            Ok(Command::SetConfidence(v)) => {
                self.min_confidence = v;
                format!("Confidence set to {}", v)
            }
            Ok(Command::SetDelay(ms)) => {
                self.delay = Duration::from_millis(ms);
                format!("Delay set to {}ms", ms)
            }
            Ok(Command::Status) => self.status_line(),
            Ok(Command::Unknown(cmd)) => format!("Unknown command: {}", cmd),
            Err(err) => err.to_string(),
        }
    }

    pub fn status_line(&self) -> String {
        format!(
            "Status: {}, Confidence: {}, Delay: {}ms",
            if self.running { "Running" } else { "Stopped" },
            self.min_confidence,
            self.delay.as_millis()
        )
    }
}
