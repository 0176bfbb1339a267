//! Retail checkout verification
//!
//! An embedded counter camera reports per-class object counts over a serial
//! line; the checkout station compares them against the items the cashier
//! billed and reports any mismatch.
//!
//! # Module Structure
//!
//! - `detect`: heat-map post-processing and distance-based consolidation
//! - `transport`: DETECTION line codec and host-to-device commands
//! - `device`: counter session settings and the frame loop
//! - `station`: catalog, bill, detected items, serial reader, verification
//! - `config`: file and environment configuration for both binaries

use anyhow::{anyhow, Result};
use std::sync::OnceLock;

pub mod config;
pub mod detect;
pub mod device;
pub mod station;
pub mod transport;

pub use config::{DeviceConfig, LinkSettings, StationConfig};
pub use detect::{
    consolidate, consolidate_frame, BoundingBox, ConsolidatedRecord, Detection, DetectorBackend,
    DistanceThresholds, FrameSummary,
};
pub use device::{DeviceRuntime, SessionConfig};
pub use station::{verify, Bill, Catalog, DetectedItems, Mismatch, Station, StationEvent};
pub use transport::{decode_line, encode_frame, Command, LineEvent, WireRecord};

/// Reject product labels that cannot be carried in a DETECTION line.
pub fn validate_label(label: &str) -> Result<()> {
    // Compile once for hot paths.
    static LABEL_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = LABEL_RE.get_or_init(|| regex::Regex::new(r"^[^|:\r\n]+$").unwrap());

    if label.trim().is_empty() || !re.is_match(label) {
        return Err(anyhow!(
            "label '{}' must be non-empty and free of '|', ':' and line breaks",
            label.escape_debug()
        ));
    }
    // The decoder trims names, so padded labels would not come back unchanged.
    if label.trim() != label {
        return Err(anyhow!(
            "label '{}' has leading or trailing whitespace",
            label.escape_debug()
        ));
    }
    Ok(())
}
