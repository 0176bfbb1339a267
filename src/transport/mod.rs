//! Serial line protocol shared by the counter and the checkout station.
//!
//! - `wire`: DETECTION line encoding and tolerant line decoding
//! - `command`: host-to-device command lines

pub mod command;
pub mod wire;

pub use command::{Command, CommandError};
pub use wire::{
    decode_line, encode_frame, encode_records, format_latency, forward, parse_detection_payload,
    records_for_frame, ClearReason, LineEvent, WireRecord, FORWARD_MARKER, LINE_END, NO_OBJECTS,
    READY_BANNER,
};
