//! Rewind history orchestrator.
//!
//! [`RewindManager`] records a [`SnapshotUnit`] for every emulated frame,
//! together with the rendered frame and its audio, and keeps a rolling
//! window of that history within the configured duration and memory
//! budgets. While rewinding it walks a cursor backwards through history,
//! restores the machine at each position and serves the buffered video and
//! audio directly: the machine is never stepped, so a rewind step costs one
//! decode and one restore whatever the console.
//!
//! ## Per-frame integration
//!
//! ```text
//! every frame:
//!     if !rewind.is_rewinding() { machine.run_frame() }   // polls input
//!     rewind.send_frame(&frame, rewind.is_rewinding())    // present result
//!     rewind.send_audio(&mut samples)                     // play result
//!     rewind.process_end_of_frame(&mut machine)?
//! ```
//!
//! ## States
//!
//! ```text
//!            start_rewinding(false)          first rewind step
//! Stopped ────────────────────────> Starting ─────────────────> Started
//!    ^  \  start_rewinding(true)                                   |
//!    |   `─────────────────────────> Debugging                     |
//!    |                                   |                         |
//!    `──────────── Stopping <────────────┴─────────────────────────'
//!                           stop_rewinding / force_stop
//! ```
//!
//! All operations must be called from the emulation thread; nothing here
//! locks or blocks.

use std::collections::VecDeque;

use log::{debug, trace, warn};

use crate::config::RewindConfig;
use crate::error::Result;
use crate::event::RewindEvent;
use crate::input::{ControllerState, InputProvider, InputRecorder};
use crate::machine::Serializable;
use crate::playback::{FrameOutput, PlaybackBuffers, VideoFrame};
use crate::snapshot::{self, SnapshotUnit};
use crate::{PORT_COUNT, SEGMENT_FRAMES};

/// Rewind state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewindState {
    /// Normal play; history is being recorded.
    Stopped,
    /// Leaving a rewind (transient).
    Stopping,
    /// Rewind requested, no frame rewound yet.
    Starting,
    /// Continuous rewind in progress.
    Started,
    /// Single-frame step-back for a debugger.
    Debugging,
}

/// Aggregate history statistics for UI display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewindStats {
    /// Bytes held by states, input logs, video and audio
    pub memory_usage: usize,
    /// Number of recorded snapshot units
    pub history_size: usize,
    /// Whole seconds of play covered by history
    pub history_duration: u32,
}

/// Input, video and audio gathered for the frame being emulated.
#[derive(Debug, Default)]
struct PendingFrame {
    input_logs: [Vec<ControllerState>; PORT_COUNT],
    video: Option<VideoFrame>,
    audio: Vec<i16>,
}

/// The live point frozen when a rewind starts.
#[derive(Debug)]
struct RewindBackup {
    /// Full-state unit of the machine as it was when the rewind started
    resume: SnapshotUnit,
    pending: PendingFrame,
}

/// Owner of the rewind history and its state machine.
pub struct RewindManager {
    config: RewindConfig,
    state: RewindState,
    history: VecDeque<SnapshotUnit>,
    playback: PlaybackBuffers,
    /// First unit of the segment still being built; units before it are sealed
    builder_start: usize,
    /// Raw state of the newest unit
    last_raw: Vec<u8>,
    /// Running total of `SnapshotUnit::memory_usage` over `history`
    state_bytes: usize,
    pending: PendingFrame,
    backup: Option<RewindBackup>,
    /// Position restored into the machine while rewinding.
    /// `history.len()` designates the backup's resume unit.
    cursor: usize,
    /// Raw state at `cursor`
    cursor_raw: Vec<u8>,
    /// Cursor whose audio was last played back
    audio_served: Option<usize>,
    scratch: Vec<u8>,
}

impl RewindManager {
    /// Create an empty history with the given budgets.
    pub fn new(config: RewindConfig) -> Self {
        RewindManager {
            config,
            state: RewindState::Stopped,
            history: VecDeque::new(),
            playback: PlaybackBuffers::new(),
            builder_start: 0,
            last_raw: Vec::new(),
            state_bytes: 0,
            pending: PendingFrame::default(),
            backup: None,
            cursor: 0,
            cursor_raw: Vec::new(),
            audio_served: None,
            scratch: Vec::new(),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &RewindConfig { &self.config }

    /// Apply a new configuration.
    ///
    /// Disabling rewind drops all history. Tighter budgets evict right away,
    /// or once the current rewind stops.
    pub fn set_config(&mut self, config: RewindConfig) {
        self.config = config;
        if self.config.is_enabled() {
            self.evict_to_budget();
        } else {
            self.clear_buffer();
        }
    }

    /// Current rewind state.
    pub fn state(&self) -> RewindState { self.state }

    pub fn is_rewinding(&self) -> bool { self.state != RewindState::Stopped }

    pub fn is_step_back(&self) -> bool { self.state == RewindState::Debugging }

    pub fn has_history(&self) -> bool { !self.history.is_empty() }

    /// Position currently restored, while rewinding.
    pub fn cursor(&self) -> Option<usize> {
        self.is_rewinding().then_some(self.cursor)
    }

    /// Copy of every recorded unit, oldest first.
    pub fn history(&self) -> Vec<SnapshotUnit> {
        self.history.iter().cloned().collect()
    }

    pub fn stats(&self) -> RewindStats {
        let fps = self.config.fps.max(1) as usize;
        RewindStats {
            memory_usage: self.memory_usage(),
            history_size: self.history.len(),
            history_duration: (self.history.len() / fps) as u32,
        }
    }

    /// Bytes held by the whole history.
    pub fn memory_usage(&self) -> usize {
        self.state_bytes + self.playback.memory_usage()
    }

    /// Raw machine state recorded at `position`.
    ///
    /// # Panics
    ///
    /// If `position` is not a recorded position.
    pub fn state_at(&self, position: usize) -> Vec<u8> {
        snapshot::reconstruct(&self.history, position)
    }

    /// Stop any rewind and drop all history.
    pub fn reset(&mut self) {
        self.clear_buffer();
    }

    /// React to a console notification.
    pub fn process_notification(&mut self, event: RewindEvent) {
        if event.clears_history() {
            debug!("{:?}: clearing rewind history", event);
            self.clear_buffer();
        } else if self.state == RewindState::Stopped {
            // A loaded save state breaks continuity: start a fresh segment
            self.seal_segment();
        }
    }

    // ─── Per-frame integration ──────────────────────────────────────────────

    /// Called once at the end of every frame.
    ///
    /// Records the frame during normal play, or steps the rewind cursor back
    /// one frame during a continuous rewind.
    pub fn process_end_of_frame<M: Serializable>(&mut self, machine: &mut M) -> Result<()> {
        if !self.config.is_enabled() {
            if self.has_history() || self.is_rewinding() {
                self.clear_buffer();
            }
            self.pending = PendingFrame::default();
            return Ok(());
        }

        match self.state {
            RewindState::Stopped => self.record_frame(machine),
            RewindState::Starting | RewindState::Started => self.step_back(machine),
            RewindState::Debugging | RewindState::Stopping => Ok(()),
        }
    }

    /// Route a rendered frame.
    ///
    /// During normal play the frame is recorded and returned for display.
    /// While rewinding, a call with `for_rewind` returns the buffered frame
    /// at the cursor; live frames are suppressed.
    pub fn send_frame<'a>(&'a mut self, frame: &'a VideoFrame, for_rewind: bool) -> FrameOutput<'a> {
        match self.state {
            RewindState::Stopped => {
                if self.config.is_enabled() && !for_rewind {
                    let mut copy = frame.clone();
                    copy.input_data = self.pending.input_logs.iter()
                        .map(|log| log.last().cloned().unwrap_or_default())
                        .collect();
                    self.pending.video = Some(copy);
                }
                FrameOutput::Live(frame)
            }
            RewindState::Started | RewindState::Debugging if for_rewind => {
                match self.playback.len().checked_sub(1) {
                    Some(last) => FrameOutput::History(self.playback.frame(self.cursor.min(last))),
                    None => FrameOutput::Suppressed,
                }
            }
            _ => FrameOutput::Suppressed,
        }
    }

    /// Route a block of interleaved stereo samples.
    ///
    /// Returns `false` when `buffer` held live samples, which were recorded
    /// and should be played as-is. Returns `true` when `buffer` was replaced
    /// from history: the cursor frame's audio played backwards during a
    /// rewind, silence while a rewind starts, stops or steps for a debugger.
    pub fn send_audio(&mut self, buffer: &mut Vec<i16>) -> bool {
        match self.state {
            RewindState::Stopped => {
                if self.config.is_enabled() {
                    self.pending.audio.extend_from_slice(buffer);
                }
                false
            }
            RewindState::Started => {
                buffer.clear();
                if self.audio_served != Some(self.cursor) && self.cursor < self.playback.len() {
                    self.playback.extend_reversed(self.cursor, buffer);
                    self.audio_served = Some(self.cursor);
                }
                true
            }
            RewindState::Starting | RewindState::Stopping | RewindState::Debugging => {
                buffer.clear();
                true
            }
        }
    }

    // ─── Rewind control ─────────────────────────────────────────────────────

    /// Begin rewinding.
    ///
    /// No-op unless stopped, enabled and holding history. The live machine
    /// is captured as a resume unit so an aborted rewind returns exactly
    /// here. A debugger step-back restores the previous frame immediately.
    pub fn start_rewinding<M: Serializable>(&mut self, for_debugger: bool, machine: &mut M) -> Result<()> {
        if self.state != RewindState::Stopped || !self.config.is_enabled() || self.history.is_empty() {
            return Ok(());
        }

        let mut live = Vec::new();
        machine.serialize(&mut live)?;
        let resume = SnapshotUnit::capture(&live, None, self.config.compression_level);

        self.state = RewindState::Starting;
        self.backup = Some(RewindBackup { resume, pending: std::mem::take(&mut self.pending) });
        self.audio_served = None;
        // Mid-frame (debugger break) the live state is newer than the newest unit
        self.cursor = if live == self.last_raw { self.history.len() - 1 } else { self.history.len() };
        self.cursor_raw = live;
        debug!(
            "rewind started at frame {} of {} (debugger: {})",
            self.cursor,
            self.history.len(),
            for_debugger
        );

        if for_debugger {
            self.state = RewindState::Debugging;
            if self.cursor > 0 {
                self.move_cursor(self.cursor - 1, machine)?;
            }
        }
        Ok(())
    }

    /// End a rewind.
    ///
    /// A non-debugger stop leaves a debugger step-back session alone.
    /// See [`force_stop`](Self::force_stop) for `delete_future_data`.
    pub fn stop_rewinding<M: Serializable>(
        &mut self,
        for_debugger: bool,
        delete_future_data: bool,
        machine: &mut M,
    ) -> Result<()> {
        if self.state == RewindState::Debugging && !for_debugger {
            return Ok(());
        }
        self.force_stop(delete_future_data, machine)
    }

    /// Collapse any rewind state back to `Stopped`.
    ///
    /// With `delete_future_data`, play resumes from the cursor and everything
    /// recorded after it is discarded. Otherwise the machine returns to the
    /// point where the rewind started and history is kept intact.
    pub fn force_stop<M: Serializable>(&mut self, delete_future_data: bool, machine: &mut M) -> Result<()> {
        if !self.is_rewinding() {
            return Ok(());
        }
        let Some(backup) = self.backup.take() else {
            self.state = RewindState::Stopped;
            return Ok(());
        };

        let rewound = self.state != RewindState::Starting;
        self.state = RewindState::Stopping;
        let result = if delete_future_data && rewound && self.cursor < self.history.len() {
            self.branch_cut();
            Ok(())
        } else {
            self.pending = backup.pending;
            machine.deserialize(&backup.resume.full_state())
        };

        self.state = RewindState::Stopped;
        self.audio_served = None;
        self.cursor_raw.clear();
        debug!("rewind stopped, {} frames in history", self.history.len());
        self.evict_to_budget();
        result
    }

    /// Jump back `seconds` of play, clamped to the oldest recorded frame.
    ///
    /// Starts a continuous rewind if none is running; buffered video and
    /// audio are served from the new position right away.
    pub fn rewind_seconds<M: Serializable>(&mut self, seconds: u32, machine: &mut M) -> Result<()> {
        if self.state == RewindState::Stopped {
            self.start_rewinding(false, machine)?;
        }
        if !matches!(self.state, RewindState::Starting | RewindState::Started) {
            return Ok(());
        }

        let target = self.cursor.saturating_sub(self.config.frames_for(seconds));
        debug!("rewinding {}s: frame {} -> {}", seconds, self.cursor, target);
        self.state = RewindState::Started;
        self.move_cursor(target, machine)
    }

    // ─── History maintenance ────────────────────────────────────────────────

    fn record_frame<M: Serializable>(&mut self, machine: &mut M) -> Result<()> {
        self.scratch.clear();
        if let Err(e) = machine.serialize(&mut self.scratch) {
            self.pending = PendingFrame::default();
            return Err(e);
        }

        let prev = (self.history.len() > self.builder_start).then_some(self.last_raw.as_slice());
        let mut unit = SnapshotUnit::capture(&self.scratch, prev, self.config.compression_level);
        unit.input_logs = std::mem::take(&mut self.pending.input_logs);

        let video = match self.pending.video.take() {
            Some(frame) => frame,
            None => self.playback.last_frame().cloned().unwrap_or_default(),
        };
        self.playback.push(video, &self.pending.audio);
        self.pending.audio.clear();

        self.state_bytes += unit.memory_usage();
        self.history.push_back(unit);
        std::mem::swap(&mut self.last_raw, &mut self.scratch);

        if self.history.len() - self.builder_start >= SEGMENT_FRAMES {
            self.add_history_block();
        }
        Ok(())
    }

    /// Seal the completed segment into history and enforce the budgets.
    fn add_history_block(&mut self) {
        self.seal_segment();
        self.evict_to_budget();
    }

    fn seal_segment(&mut self) {
        if self.history.len() == self.builder_start {
            return;
        }
        if let Some(last) = self.history.back_mut() {
            last.end_of_segment = true;
        }
        debug!(
            "sealed segment of {} frames ({} in history)",
            self.history.len() - self.builder_start,
            self.history.len()
        );
        self.builder_start = self.history.len();
    }

    fn over_budget(&self) -> bool {
        self.history.len() > self.config.max_frames()
            || self.memory_usage() > self.config.max_memory_bytes()
    }

    /// Evict sealed segments until history fits, keeping at least the newest
    /// one. Stalls while rewinding.
    fn evict_to_budget(&mut self) {
        if self.state != RewindState::Stopped {
            return;
        }
        while self.over_budget() {
            let oldest = self.history.iter().position(|u| u.end_of_segment).map(|end| end + 1);
            match oldest {
                // The newest sealed segment always stays
                Some(len) if len < self.builder_start => self.pop_history(),
                _ => {
                    warn!(
                        "rewind budget ({} frames, {} bytes) smaller than one segment; keeping {} frames ({} bytes)",
                        self.config.max_frames(),
                        self.config.max_memory_bytes(),
                        self.history.len(),
                        self.memory_usage()
                    );
                    break;
                }
            }
        }
    }

    /// Remove the oldest sealed segment with its video and audio.
    fn pop_history(&mut self) {
        assert_eq!(self.state, RewindState::Stopped, "history evicted under the rewind cursor");
        let Some(end) = self.history.iter().position(|u| u.end_of_segment) else {
            panic!("sealed history without a segment end marker");
        };
        let count = end + 1;
        assert!(count <= self.builder_start, "segment end marker inside the segment builder");

        for unit in self.history.drain(..count) {
            self.state_bytes -= unit.memory_usage();
        }
        self.playback.pop_front(count);
        self.builder_start -= count;
        assert!(
            self.history.front().map_or(true, |u| u.is_full_state),
            "history does not start on a full state after eviction"
        );
        debug!("evicted {} frames, {} remain", count, self.history.len());
    }

    /// Keep history up to the cursor and resume recording from there.
    fn branch_cut(&mut self) {
        let keep = self.cursor + 1;
        let dropped = self.history.len() - keep;
        for unit in self.history.drain(keep..) {
            self.state_bytes -= unit.memory_usage();
        }
        self.playback.truncate(keep);

        // Reopen the cursor's segment unless it was already complete
        self.builder_start = if self.history[self.cursor].end_of_segment {
            keep
        } else {
            snapshot::segment_start(&self.history, self.cursor)
        };
        self.last_raw = std::mem::take(&mut self.cursor_raw);
        self.pending = PendingFrame::default();
        debug!("branch cut at frame {}: {} future frames discarded", self.cursor, dropped);
    }

    fn step_back<M: Serializable>(&mut self, machine: &mut M) -> Result<()> {
        self.state = RewindState::Started;
        if self.cursor == 0 {
            trace!("rewind holding at oldest frame");
            return Ok(());
        }
        self.move_cursor(self.cursor - 1, machine)
    }

    /// Move the cursor to `target` and restore the machine there.
    fn move_cursor<M: Serializable>(&mut self, target: usize, machine: &mut M) -> Result<()> {
        assert!(
            target <= self.history.len(),
            "rewind cursor {} outside history of {} units",
            target,
            self.history.len()
        );

        if target == self.cursor {
            // already there
        } else if target == self.history.len() {
            if let Some(backup) = &self.backup {
                self.cursor_raw = backup.resume.full_state();
            }
        } else if target + 1 == self.cursor
            && self.cursor < self.history.len()
            && !self.history[self.cursor].is_full_state
        {
            // Undoing the cursor unit's delta yields its predecessor
            self.history[self.cursor].apply_delta(&mut self.cursor_raw);
        } else {
            self.cursor_raw = snapshot::reconstruct(&self.history, target);
        }

        self.cursor = target;
        trace!("rewind cursor at frame {}", target);
        machine.deserialize(&self.cursor_raw)
    }

    fn clear_buffer(&mut self) {
        self.history.clear();
        self.playback.clear();
        self.builder_start = 0;
        self.last_raw.clear();
        self.state_bytes = 0;
        self.pending = PendingFrame::default();
        self.backup = None;
        self.state = RewindState::Stopped;
        self.cursor = 0;
        self.cursor_raw.clear();
        self.audio_served = None;
    }
}

impl Default for RewindManager {
    fn default() -> Self {
        Self::new(RewindConfig::default())
    }
}

impl InputRecorder for RewindManager {
    fn record_input(&mut self, port: u8, state: &ControllerState) {
        if self.state != RewindState::Stopped || !self.config.is_enabled() {
            return;
        }
        match self.pending.input_logs.get_mut(port as usize) {
            Some(log) => log.push(state.clone()),
            None => warn!("input for port {} ignored ({} ports recorded)", port, PORT_COUNT),
        }
    }
}

impl InputProvider for RewindManager {
    fn set_input(&mut self, port: u8) -> Option<ControllerState> {
        if !self.is_rewinding() {
            return None;
        }
        self.history.get(self.cursor)?.last_input(port as usize).cloned()
    }
}
