//! Per-frame video and audio history for rewind playback.
//!
//! Machine states alone are enough to restore the emulator, but rewinding
//! should look and sound smooth. Every rendered frame and the audio samples
//! produced alongside it are therefore kept 1:1 with the snapshot units, and
//! served back directly while rewinding instead of re-running the machine.
//!
//! Audio is interleaved stereo `i16` PCM stored in one flat sample queue.
//! Each frame remembers where its samples start, so any frame's samples can
//! be located and replayed backwards.

use std::collections::VecDeque;
use std::ops::Range;

use crate::input::ControllerState;
use crate::AUDIO_CHANNELS;

// ─── Video frames ───────────────────────────────────────────────────────────

/// A rendered frame as handed to the display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoFrame {
    /// Pixel data, 0xAARRGGBB, row-major
    pub data: Vec<u32>,
    pub width: u32,
    pub height: u32,
    /// Display scale factor
    pub scale: f64,
    /// Frame sequence number
    pub frame_number: u32,
    /// Input active while this frame was emulated, one entry per polled port
    pub input_data: Vec<ControllerState>,
}

impl VideoFrame {
    pub fn new(data: Vec<u32>, width: u32, height: u32) -> Self {
        VideoFrame { data, width, height, scale: 1.0, frame_number: 0, input_data: Vec::new() }
    }

    /// Approximate heap usage in bytes.
    pub fn memory_usage(&self) -> usize {
        self.data.len() * std::mem::size_of::<u32>()
            + self.input_data.iter().map(|s| s.len()).sum::<usize>()
    }
}

/// Where the frame to present comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutput<'a> {
    /// The live frame that was just rendered.
    Live(&'a VideoFrame),
    /// A frame replayed from history.
    History(&'a VideoFrame),
    /// Nothing should be presented this frame.
    Suppressed,
}

impl<'a> FrameOutput<'a> {
    /// The frame to present, if any.
    pub fn frame(&self) -> Option<&'a VideoFrame> {
        match *self {
            FrameOutput::Live(f) | FrameOutput::History(f) => Some(f),
            FrameOutput::Suppressed => None,
        }
    }

    pub fn is_history(&self) -> bool {
        matches!(self, FrameOutput::History(_))
    }
}

// ─── Playback buffers ───────────────────────────────────────────────────────

/// Video frames and audio samples for every recorded frame, oldest first.
#[derive(Debug, Default)]
pub struct PlaybackBuffers {
    video: VecDeque<VideoFrame>,
    audio: VecDeque<i16>,
    /// Absolute sample offset where each frame's audio starts
    audio_starts: VecDeque<u64>,
    /// Absolute sample offset of `audio[0]`
    audio_base: u64,
    /// Running total of `VideoFrame::memory_usage`
    video_bytes: usize,
}

impl PlaybackBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded frames.
    pub fn len(&self) -> usize { self.video.len() }

    pub fn is_empty(&self) -> bool { self.video.is_empty() }

    /// Total buffered samples (all channels).
    pub fn sample_count(&self) -> usize { self.audio.len() }

    /// Append one frame and the samples produced during it.
    pub fn push(&mut self, frame: VideoFrame, samples: &[i16]) {
        self.video_bytes += frame.memory_usage();
        self.video.push_back(frame);
        self.audio_starts.push_back(self.audio_base + self.audio.len() as u64);
        self.audio.extend(samples.iter().copied());
    }

    /// Frame `index`.
    ///
    /// # Panics
    ///
    /// If `index` is out of bounds.
    pub fn frame(&self, index: usize) -> &VideoFrame {
        &self.video[index]
    }

    /// Most recently recorded frame.
    pub fn last_frame(&self) -> Option<&VideoFrame> {
        self.video.back()
    }

    /// Position of frame `index`'s samples within the sample queue.
    pub fn sample_range(&self, index: usize) -> Range<usize> {
        let start = (self.audio_starts[index] - self.audio_base) as usize;
        let end = match self.audio_starts.get(index + 1) {
            Some(&next) => (next - self.audio_base) as usize,
            None => self.audio.len(),
        };
        start..end
    }

    /// Frame `index`'s samples in recorded order.
    pub fn samples(&self, index: usize) -> impl Iterator<Item = i16> + '_ {
        self.audio.range(self.sample_range(index)).copied()
    }

    /// Append frame `index`'s samples to `out` backwards, one
    /// [`AUDIO_CHANNELS`]-sample group at a time so channels stay in place.
    pub fn extend_reversed(&self, index: usize, out: &mut Vec<i16>) {
        let samples: Vec<i16> = self.samples(index).collect();
        for group in samples.chunks(AUDIO_CHANNELS).rev() {
            out.extend_from_slice(group);
        }
    }

    /// Drop the oldest `count` frames and their samples.
    pub fn pop_front(&mut self, count: usize) {
        let count = count.min(self.len());
        if count == 0 {
            return;
        }
        let new_base = match self.audio_starts.get(count) {
            Some(&start) => start,
            None => self.audio_base + self.audio.len() as u64,
        };
        self.audio.drain(..(new_base - self.audio_base) as usize);
        self.audio_base = new_base;
        self.audio_starts.drain(..count);
        for frame in self.video.drain(..count) {
            self.video_bytes -= frame.memory_usage();
        }
    }

    /// Keep only the first `len` frames and their samples.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len() {
            return;
        }
        let cut = self.sample_range(len).start;
        self.audio.truncate(cut);
        self.audio_starts.truncate(len);
        for frame in self.video.drain(len..) {
            self.video_bytes -= frame.memory_usage();
        }
    }

    pub fn clear(&mut self) {
        self.audio_base += self.audio.len() as u64;
        self.video.clear();
        self.audio.clear();
        self.audio_starts.clear();
        self.video_bytes = 0;
    }

    /// Bytes held by buffered pixels, input tags and samples.
    pub fn memory_usage(&self) -> usize {
        self.video_bytes + self.audio.len() * std::mem::size_of::<i16>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(n: u32) -> VideoFrame {
        let mut f = VideoFrame::new(vec![n; 4], 2, 2);
        f.frame_number = n;
        f
    }

    #[test]
    fn test_push_and_ranges() {
        let mut pb = PlaybackBuffers::new();
        pb.push(frame(0), &[1, 2, 3, 4]);
        pb.push(frame(1), &[]);
        pb.push(frame(2), &[5, 6]);
        assert_eq!(pb.len(), 3);
        assert_eq!(pb.sample_range(0), 0..4);
        assert_eq!(pb.sample_range(1), 4..4);
        assert_eq!(pb.sample_range(2), 4..6);
        assert_eq!(pb.samples(2).collect::<Vec<_>>(), vec![5, 6]);
        assert_eq!(pb.frame(1).frame_number, 1);
        assert_eq!(pb.memory_usage(), 3 * 16 + 6 * 2);
    }

    #[test]
    fn test_reversed_keeps_channels() {
        let mut pb = PlaybackBuffers::new();
        // L R pairs: (1,-1) (2,-2) (3,-3)
        pb.push(frame(0), &[1, -1, 2, -2, 3, -3]);
        let mut out = Vec::new();
        pb.extend_reversed(0, &mut out);
        assert_eq!(out, vec![3, -3, 2, -2, 1, -1]);
    }

    #[test]
    fn test_pop_front_keeps_offsets() {
        let mut pb = PlaybackBuffers::new();
        pb.push(frame(0), &[1, 1]);
        pb.push(frame(1), &[2, 2, 2, 2]);
        pb.push(frame(2), &[3, 3]);
        pb.pop_front(2);
        assert_eq!(pb.len(), 1);
        assert_eq!(pb.sample_count(), 2);
        assert_eq!(pb.frame(0).frame_number, 2);
        assert_eq!(pb.samples(0).collect::<Vec<_>>(), vec![3, 3]);

        pb.push(frame(3), &[4]);
        assert_eq!(pb.sample_range(1), 2..3);
        pb.pop_front(5);
        assert!(pb.is_empty());
        assert_eq!(pb.memory_usage(), 0);
    }

    #[test]
    fn test_truncate() {
        let mut pb = PlaybackBuffers::new();
        for n in 0..5 {
            pb.push(frame(n), &[n as i16; 2]);
        }
        pb.truncate(2);
        assert_eq!(pb.len(), 2);
        assert_eq!(pb.sample_count(), 4);
        assert_eq!(pb.last_frame().unwrap().frame_number, 1);
        pb.push(frame(9), &[9, 9]);
        assert_eq!(pb.samples(2).collect::<Vec<_>>(), vec![9, 9]);
    }

    #[test]
    fn test_clear_then_reuse() {
        let mut pb = PlaybackBuffers::new();
        pb.push(frame(0), &[7; 8]);
        pb.clear();
        assert!(pb.is_empty());
        pb.push(frame(1), &[1, 2]);
        assert_eq!(pb.sample_range(0), 0..2);
    }

    #[test]
    fn test_frame_output() {
        let f = frame(3);
        assert_eq!(FrameOutput::Live(&f).frame().unwrap().frame_number, 3);
        assert!(FrameOutput::History(&f).is_history());
        assert!(FrameOutput::Suppressed.frame().is_none());
    }
}
