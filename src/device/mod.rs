//! Counter side of the link: session settings and the frame loop.

mod runtime;
mod session;

pub use runtime::{
    ChannelCommands, CommandSource, CycleOutcome, DeviceRuntime, FrameReport, IDLE_POLL,
};
pub use session::{SessionConfig, DEFAULT_FRAME_DELAY, DEFAULT_MIN_CONFIDENCE};
