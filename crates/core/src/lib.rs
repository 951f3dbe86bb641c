//! # rewind-core
//!
//! Rolling snapshot history and instant rewind for emulator cores.
//!
//! Every emulated frame is captured as a compressed machine state together
//! with the input, video and audio it produced. States are grouped into
//! segments of [`SEGMENT_FRAMES`] frames: one full state followed by XOR
//! deltas, each block deflated. History is bounded by a duration and a memory
//! budget and evicted a whole segment at a time.
//!
//! While rewinding the machine is restored frame by frame and the recorded
//! frames and audio (played backwards) are served directly, so rewinding
//! looks and sounds smooth without re-running any emulation.
//!
//! ## Architecture
//!
//! - [`RewindManager`]: History recording, rewind state machine and budgets
//! - [`SnapshotUnit`]: One frame's compressed state and input logs
//! - [`codec`]: Full/delta state blocks (XOR + deflate)
//! - [`playback`]: Per-frame video and audio history
//! - [`Serializable`]: Contract the emulated machine implements
//! - [`InputRecorder`] / [`InputProvider`]: Input logging and replay hooks
//! - [`RewindConfig`]: Duration, memory and compression settings (TOML)
//! - [`RewindEvent`]: Console notifications (reset, power cycle, ...)

pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod input;
pub mod machine;
pub mod playback;
pub mod rewind;
pub mod snapshot;

#[cfg(test)]
mod test_utils;

pub use config::RewindConfig;
pub use error::{Result, RewindError};
pub use event::RewindEvent;
pub use input::{ControllerState, InputProvider, InputRecorder};
pub use machine::Serializable;
pub use playback::{FrameOutput, VideoFrame};
pub use rewind::{RewindManager, RewindState, RewindStats};
pub use snapshot::SnapshotUnit;

/// Frames per segment: one full state followed by deltas
pub const SEGMENT_FRAMES: usize = 30;
/// Controller ports whose input is logged
pub const PORT_COUNT: usize = 5;
/// Interleaved audio channels (stereo)
pub const AUDIO_CHANNELS: usize = 2;
/// Default emulation frame rate
pub const DEFAULT_FPS: u32 = 60;
