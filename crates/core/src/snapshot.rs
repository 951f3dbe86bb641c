//! Snapshot units for rewind history.
//!
//! A [`SnapshotUnit`] holds one compressed machine state plus the input read
//! on every port during the frames it covers. History is a chronological
//! sequence of units grouped into segments of up to
//! [`SEGMENT_FRAMES`](crate::SEGMENT_FRAMES): the first unit of a segment is a
//! full state, every following unit is a delta against its predecessor.
//!
//! ```text
//!  segment 0                       segment 1
//! [F][d][d] ... [d][d|end]        [F][d][d] ... [d|end]       [F][d] <- builder
//! ```
//!
//! Reconstructing any position walks back to the segment's full unit and
//! replays the deltas forward, so the cost is bounded by one segment.

use std::collections::VecDeque;

use crate::codec;
use crate::input::ControllerState;
use crate::{PORT_COUNT, SEGMENT_FRAMES};

/// One history record: a full or delta machine state and its input logs.
#[derive(Debug, Clone)]
pub struct SnapshotUnit {
    /// Compressed state block (see [`codec`]).
    state: Vec<u8>,
    /// Input read per port, one entry per polled frame.
    pub input_logs: [Vec<ControllerState>; PORT_COUNT],
    /// Number of frames this unit represents.
    pub frame_count: u32,
    /// `state` decodes directly to machine bytes.
    pub is_full_state: bool,
    /// Last unit of its segment.
    pub end_of_segment: bool,
}

impl SnapshotUnit {
    /// Encode `raw` as a new single-frame unit.
    ///
    /// `prev` is the raw state of the preceding unit in the same segment,
    /// or `None` when this unit starts a segment.
    pub fn capture(raw: &[u8], prev: Option<&[u8]>, level: u8) -> Self {
        let (state, is_full_state) = codec::encode(raw, prev, level);
        SnapshotUnit {
            state,
            input_logs: Default::default(),
            frame_count: 1,
            is_full_state,
            end_of_segment: false,
        }
    }

    /// Compressed state size in bytes.
    pub fn state_size(&self) -> usize { self.state.len() }

    /// Raw machine state size this unit decodes to.
    pub fn raw_size(&self) -> usize { codec::raw_len(&self.state) }

    /// Bytes held by this unit (state block plus input logs).
    pub fn memory_usage(&self) -> usize {
        let inputs: usize = self.input_logs.iter()
            .flat_map(|log| log.iter())
            .map(|s| s.len() + std::mem::size_of::<ControllerState>())
            .sum();
        self.state_size() + inputs
    }

    /// Raw bytes of a full-state unit.
    ///
    /// # Panics
    ///
    /// If the unit is a delta.
    pub fn full_state(&self) -> Vec<u8> {
        assert!(self.is_full_state, "delta unit decoded without its predecessor");
        codec::decompress(&self.state)
    }

    /// Turn the predecessor's raw bytes into this unit's raw bytes, or the
    /// reverse. Only valid for delta units.
    pub fn apply_delta(&self, raw: &mut [u8]) {
        debug_assert!(!self.is_full_state);
        codec::apply_delta(raw, &self.state);
    }

    /// Most recent input logged for `port`.
    pub fn last_input(&self, port: usize) -> Option<&ControllerState> {
        self.input_logs.get(port).and_then(|log| log.last())
    }
}

/// Index of the full-state unit anchoring `position`.
///
/// # Panics
///
/// If `position` is out of bounds or no anchor is found within one segment.
pub fn anchor_of(history: &VecDeque<SnapshotUnit>, position: usize) -> usize {
    assert!(
        position < history.len(),
        "rewind cursor {} outside history of {} units",
        position,
        history.len()
    );
    let mut i = position;
    loop {
        if history[i].is_full_state {
            return i;
        }
        assert!(
            i > 0 && position - i + 1 < SEGMENT_FRAMES,
            "segment without full-state anchor before position {}",
            position
        );
        i -= 1;
    }
}

/// Reconstruct the raw machine state at `position`.
pub fn reconstruct(history: &VecDeque<SnapshotUnit>, position: usize) -> Vec<u8> {
    let anchor = anchor_of(history, position);
    let mut raw = history[anchor].full_state();
    for unit in history.range(anchor + 1..=position) {
        unit.apply_delta(&mut raw);
    }
    raw
}

/// Index one past the end of the last sealed segment at or before `position`,
/// i.e. where the segment containing `position` starts.
pub fn segment_start(history: &VecDeque<SnapshotUnit>, position: usize) -> usize {
    let mut i = position;
    while i > 0 && !history[i - 1].end_of_segment {
        i -= 1;
    }
    i
}
