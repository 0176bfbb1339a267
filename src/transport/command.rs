//! Host-to-device command lines.
//!
//! Commands are short newline-terminated ASCII strings. The device answers
//! each one with a free-text acknowledgement that the host only logs.

use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Start,
    Stop,
    SetConfidence(f32),
    SetDelay(u64),
    Status,
    Unknown(String),
}

/// A recognised command whose numeric value could not be used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandError {
    InvalidConfidence,
    InvalidDelay,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::InvalidConfidence => write!(f, "Invalid confidence value"),
            CommandError::InvalidDelay => write!(f, "Invalid delay value"),
        }
    }
}

impl std::error::Error for CommandError {}

impl Command {
    /// Parse one command line. Surrounding whitespace is ignored.
    pub fn parse(line: &str) -> Result<Command, CommandError> {
        let cmd = line.trim();
        match cmd {
            "start" => Ok(Command::Start),
            "stop" => Ok(Command::Stop),
            "status" => Ok(Command::Status),
            _ if cmd.starts_with("conf=") => value_of(cmd)
                .and_then(|v| v.parse::<f32>().ok())
                .filter(|v| v.is_finite() && (0.0..=1.0).contains(v))
                .map(Command::SetConfidence)
                .ok_or(CommandError::InvalidConfidence),
            _ if cmd.starts_with("delay=") => value_of(cmd)
                .and_then(|v| v.parse::<u64>().ok())
                .map(Command::SetDelay)
                .ok_or(CommandError::InvalidDelay),
            _ => Ok(Command::Unknown(cmd.to_string())),
        }
    }

    /// Wire form without line ending.
    pub fn to_line(&self) -> String {
        match self {
            Command::Start => "start".to_string(),
            Command::Stop => "stop".to_string(),
            Command::SetConfidence(v) => format!("conf={}", v),
            Command::SetDelay(ms) => format!("delay={}", ms),
            Command::Status => "status".to_string(),
            Command::Unknown(raw) => raw.clone(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

// Value between the first and second '='.
fn value_of(cmd: &str) -> Option<&str> {
    cmd.split('=').nth(1).map(str::trim)
}
