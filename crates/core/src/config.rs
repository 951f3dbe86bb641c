//! Rewind history budgets.
//!
//! ## Example
//!
//! ```text
//! history_seconds = 30
//! max_memory_mb = 256
//! fps = 60
//! compression_level = 1
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::DEFAULT_FPS;

/// Default history length in seconds.
pub const DEFAULT_HISTORY_SECONDS: u32 = 10;
/// Default memory budget in megabytes.
pub const DEFAULT_MAX_MEMORY_MB: u32 = 512;
/// Default deflate level. Rewind favours speed over ratio.
pub const DEFAULT_COMPRESSION_LEVEL: u8 = 1;

/// Runtime configuration of the rewind engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewindConfig {
    /// Seconds of play kept in history. 0 disables rewind.
    pub history_seconds: u32,
    /// Memory budget for states, input logs, video and audio. 0 = unlimited.
    pub max_memory_mb: u32,
    /// Frame rate of the emulated console.
    pub fps: u32,
    /// Deflate level (0–10) used for snapshot blocks.
    pub compression_level: u8,
}

impl Default for RewindConfig {
    fn default() -> Self {
        RewindConfig {
            history_seconds: DEFAULT_HISTORY_SECONDS,
            max_memory_mb: DEFAULT_MAX_MEMORY_MB,
            fps: DEFAULT_FPS,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl RewindConfig {
    /// Parse a config from TOML. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Whether history is recorded at all.
    pub fn is_enabled(&self) -> bool {
        self.history_seconds > 0 && self.fps > 0
    }

    /// Duration budget expressed in frames.
    pub fn max_frames(&self) -> usize {
        self.history_seconds as usize * self.fps as usize
    }

    /// Memory budget in bytes, `usize::MAX` when unlimited.
    pub fn max_memory_bytes(&self) -> usize {
        if self.max_memory_mb == 0 {
            usize::MAX
        } else {
            self.max_memory_mb as usize * 1024 * 1024
        }
    }

    /// Number of frames covered by `seconds` of play.
    pub fn frames_for(&self, seconds: u32) -> usize {
        seconds as usize * self.fps as usize
    }
}
