//! DETECTION line codec.
//!
//! One line per frame that produced at least one record:
//!
//! ```text
//! DETECTION|<name>:<count>:<confidence>|<name>:<count>:<confidence>...
//! ```
//!
//! The host shares the link with the device console, so it only trusts
//! DETECTION lines that arrive behind the console forward marker
//! (`Sent: DETECTION|...`). Everything else is status text. Decoding never
//! fails: bad segments are dropped first, then whole lines.

use std::fmt::Write;
use std::sync::OnceLock;

use regex::Regex;

use crate::detect::FrameSummary;

pub const DETECTION_TAG: &str = "DETECTION";
pub const FORWARD_MARKER: &str = "Sent:";
pub const NO_OBJECTS: &str = "No objects detected";
pub const READY_BANNER: &str = "Object detection system ready";
pub const LINE_END: &str = "\r\n";

const SEGMENT_SEP: char = '|';
const FIELD_SEP: char = ':';

/// One class entry as carried on the wire.
#[derive(Clone, Debug, PartialEq)]
pub struct WireRecord {
    pub name: String,
    pub quantity: u32,
    pub confidence: f32,
}

impl WireRecord {
    pub fn new(name: &str, quantity: u32, confidence: f32) -> Self {
        Self {
            name: name.to_string(),
            quantity,
            confidence,
        }
    }
}

/// Why the host should empty its detected set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearReason {
    /// The device said `No objects detected`.
    NoObjects,
    /// A DETECTION line arrived with nothing parseable in it.
    EmptyDetection,
}

/// Result of decoding one inbound line.
#[derive(Clone, Debug, PartialEq)]
pub enum LineEvent {
    Blank,
    Detections(Vec<WireRecord>),
    Cleared(ClearReason),
    Latency(u64),
    Message(String),
}

/// Per-class wire records for a frame.
///
/// Each class reports only its highest-confidence cluster, with that
/// cluster's size as the quantity. Other clusters of the same class are not
/// added in.
pub fn records_for_frame(summary: &FrameSummary) -> Vec<WireRecord> {
    summary
        .classes()
        .iter()
        .filter_map(|class| {
            class
                .best()
                .map(|best| WireRecord::new(&class.label, best.count, best.confidence))
        })
        .collect()
}

/// Format records as a DETECTION line (without line ending).
///
/// Returns `None` when nothing encodable is left; names that would break the
/// framing are skipped.
pub fn encode_records(records: &[WireRecord]) -> Option<String> {
    let mut line = String::from(DETECTION_TAG);
    let mut written = 0usize;
    for rec in records {
        if let Err(err) = crate::validate_label(&rec.name) {
            log::warn!("not encoding '{}': {}", rec.name, err);
            continue;
        }
        // Writing into a String cannot fail.
        let _ = write!(
            line,
            "{}{}:{}:{:.2}",
            SEGMENT_SEP, rec.name, rec.quantity, rec.confidence
        );
        written += 1;
    }
    (written > 0).then_some(line)
}

/// DETECTION line for a frame, or `None` when the frame is empty.
pub fn encode_frame(summary: &FrameSummary) -> Option<String> {
    encode_records(&records_for_frame(summary))
}

/// Console echo of a transmitted line.
pub fn forward(line: &str) -> String {
    format!("{} {}", FORWARD_MARKER, line)
}

pub fn format_latency(millis: u128) -> String {
    format!("LATENCY:{}ms", millis)
}

fn latency_pattern() -> &'static Regex {
    static LATENCY_RE: OnceLock<Regex> = OnceLock::new();
    LATENCY_RE.get_or_init(|| Regex::new(r"^LATENCY:(\d+)ms$").expect("latency pattern"))
}

/// Decode one raw line from the link.
pub fn decode_line(raw: &[u8]) -> LineEvent {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim();
    if line.is_empty() {
        return LineEvent::Blank;
    }

    if line.contains(NO_OBJECTS) {
        return LineEvent::Cleared(ClearReason::NoObjects);
    }

    let tagged = format!("{}{}", DETECTION_TAG, SEGMENT_SEP);
    if line.contains(FORWARD_MARKER) && line.contains(&tagged) {
        let forwarded = line
            .split_once(FORWARD_MARKER)
            .map(|(_, rest)| rest.trim())
            .unwrap_or_default();
        if !forwarded.starts_with(&tagged) {
            log::debug!("not a DETECTION message: {}", forwarded);
            return LineEvent::Message(line.to_string());
        }
        let records = parse_detection_payload(forwarded);
        if records.is_empty() {
            log::debug!("no valid detections in '{}'", forwarded);
            return LineEvent::Cleared(ClearReason::EmptyDetection);
        }
        return LineEvent::Detections(records);
    }

    if let Some(caps) = latency_pattern().captures(line) {
        if let Ok(ms) = caps[1].parse::<u64>() {
            return LineEvent::Latency(ms);
        }
    }

    LineEvent::Message(line.to_string())
}

/// Parse the segments of `DETECTION|...`; the leading tag segment is skipped.
pub fn parse_detection_payload(payload: &str) -> Vec<WireRecord> {
    payload
        .split(SEGMENT_SEP)
        .skip(1)
        .filter_map(parse_segment)
        .collect()
}

fn parse_segment(segment: &str) -> Option<WireRecord> {
    if !segment.contains(FIELD_SEP) {
        return None;
    }
    let parts: Vec<&str> = segment.splitn(3, FIELD_SEP).map(str::trim).collect();
    let parsed = match parts.as_slice() {
        [name, quantity, confidence] => quantity
            .parse::<u32>()
            .ok()
            .zip(confidence.parse::<f32>().ok())
            .map(|(q, c)| (*name, q, c)),
        [name, confidence] => confidence.parse::<f32>().ok().map(|c| (*name, 1, c)),
        _ => None,
    };
    match parsed {
        Some((name, quantity, confidence)) if !name.is_empty() && confidence.is_finite() => {
            Some(WireRecord::new(name, quantity, confidence))
        }
        _ => {
            log::debug!("dropping malformed segment '{}'", segment);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, ConsolidatedRecord};

    fn record(label: &str, conf: f32, count: u32) -> ConsolidatedRecord {
        ConsolidatedRecord {
            label: label.into(),
            bbox: BoundingBox::new(0, 0, 4, 4),
            confidence: conf,
            count,
        }
    }

    #[test]
    fn encodes_two_decimals() {
        let line = encode_records(&[
            WireRecord::new("Apple", 2, 0.951),
            WireRecord::new("KitKat", 1, 0.8),
        ]);
        assert_eq!(line.as_deref(), Some("DETECTION|Apple:2:0.95|KitKat:1:0.80"));
    }

    #[test]
    fn empty_frame_is_silent() {
        assert_eq!(encode_frame(&FrameSummary::new()), None);
        assert_eq!(encode_records(&[]), None);
    }

    #[test]
    fn names_that_break_framing_are_skipped() {
        let line = encode_records(&[WireRecord::new("a|b", 1, 0.5), WireRecord::new("ok", 1, 0.5)]);
        assert_eq!(line.as_deref(), Some("DETECTION|ok:1:0.50"));
        assert_eq!(encode_records(&[WireRecord::new("x:y", 1, 0.5)]), None);
    }

    #[test]
    fn padded_names_are_not_encoded() {
        // The decoder trims names, so " Apple" would come back as "Apple".
        assert_eq!(encode_records(&[WireRecord::new(" Apple", 2, 0.9)]), None);
        let line = encode_records(&[
            WireRecord::new("Apple ", 1, 0.5),
            WireRecord::new("Apple", 2, 0.9),
        ]);
        assert_eq!(line.as_deref(), Some("DETECTION|Apple:2:0.90"));
        let decoded = decode_line(format!("Sent: {}", line.unwrap_or_default()).as_bytes());
        assert_eq!(
            decoded,
            LineEvent::Detections(vec![WireRecord::new("Apple", 2, 0.9)])
        );
    }

    #[test]
    fn frame_reports_top_cluster_size_only() {
        // Two KitKat clusters: the stronger one has 2 members, the other 3.
        // Only the top cluster's size goes on the wire; the 3 are dropped.
        let mut summary = FrameSummary::new();
        summary.push("KitKat", vec![record("KitKat", 0.9, 2), record("KitKat", 0.7, 3)]);
        assert_eq!(encode_frame(&summary).as_deref(), Some("DETECTION|KitKat:2:0.90"));
    }

    #[test]
    fn decodes_forwarded_line() {
        let event = decode_line(b"Sent: DETECTION|Apple:2:0.95|KitKat:1:0.85\r\n");
        assert_eq!(
            event,
            LineEvent::Detections(vec![
                WireRecord::new("Apple", 2, 0.95),
                WireRecord::new("KitKat", 1, 0.85),
            ])
        );
    }

    #[test]
    fn bare_detection_without_marker_is_text() {
        let event = decode_line(b"DETECTION|Apple:2:0.95");
        assert!(matches!(event, LineEvent::Message(_)));
    }

    #[test]
    fn marker_must_be_followed_by_tag() {
        let event = decode_line(b"Sent: hello DETECTION|Apple:2:0.95");
        assert!(matches!(event, LineEvent::Message(_)));
    }

    #[test]
    fn malformed_segment_is_dropped_alone() {
        let records = parse_detection_payload("DETECTION|Apple:2:0.95|Bad|KitKat:1:0.85");
        assert_eq!(
            records,
            vec![WireRecord::new("Apple", 2, 0.95), WireRecord::new("KitKat", 1, 0.85)]
        );
    }

    #[test]
    fn bad_numbers_drop_the_segment() {
        let records = parse_detection_payload(
            "DETECTION|Apple:two:0.95|KitKat:1:high|Chips:-1:0.5|Soda:1:0.5",
        );
        assert_eq!(records, vec![WireRecord::new("Soda", 1, 0.5)]);
    }

    #[test]
    fn legacy_segment_defaults_quantity() {
        let records = parse_detection_payload("DETECTION|Apple:0.91");
        assert_eq!(records, vec![WireRecord::new("Apple", 1, 0.91)]);
    }

    #[test]
    fn extra_colons_fail_confidence_parse() {
        assert!(parse_detection_payload("DETECTION|Apple:1:0.5:9").is_empty());
    }

    #[test]
    fn empty_detection_clears() {
        assert_eq!(
            decode_line(b"Sent: DETECTION|Bad|Worse"),
            LineEvent::Cleared(ClearReason::EmptyDetection)
        );
    }

    #[test]
    fn no_objects_phrase_clears() {
        assert_eq!(
            decode_line(b"No objects detected\r\n"),
            LineEvent::Cleared(ClearReason::NoObjects)
        );
    }

    #[test]
    fn latency_is_out_of_band() {
        assert_eq!(decode_line(b"LATENCY:42ms\r\n"), LineEvent::Latency(42));
        assert!(matches!(decode_line(b"LATENCY:fast"), LineEvent::Message(_)));
    }

    #[test]
    fn acknowledgements_are_messages() {
        assert_eq!(
            decode_line(b"Confidence set to 0.5\r\n"),
            LineEvent::Message("Confidence set to 0.5".into())
        );
        assert_eq!(decode_line(b"  \r\n"), LineEvent::Blank);
    }

    #[test]
    fn invalid_utf8_does_not_panic() {
        let event = decode_line(&[0xff, 0xfe, b'\n']);
        assert!(matches!(event, LineEvent::Message(_)));
    }
}
