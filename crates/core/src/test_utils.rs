//! Synthetic machines and frame helpers shared by the unit tests.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RewindError};
use crate::machine::{self, Serializable};
use crate::playback::VideoFrame;

/// Machine whose whole state is a 4-byte frame counter.
#[derive(Debug, Default)]
pub struct CounterMachine {
    pub counter: u32,
    /// Make the next `serialize` call fail.
    pub fail_serialize: bool,
    /// Number of successful `deserialize` calls.
    pub restores: u32,
}

impl CounterMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emulate one frame.
    pub fn run_frame(&mut self) {
        self.counter += 1;
    }
}

impl Serializable for CounterMachine {
    fn serialize(&mut self, out: &mut Vec<u8>) -> Result<()> {
        if self.fail_serialize {
            return Err(RewindError::Serialize("counter unavailable".into()));
        }
        out.extend_from_slice(&self.counter.to_le_bytes());
        Ok(())
    }

    fn deserialize(&mut self, data: &[u8]) -> Result<()> {
        let bytes: [u8; 4] = data
            .try_into()
            .map_err(|_| RewindError::Deserialize(format!("expected 4 bytes, got {}", data.len())))?;
        self.counter = u32::from_le_bytes(bytes);
        self.restores += 1;
        Ok(())
    }
}

/// Machine with a serde state struct, encoded with bincode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructMachine {
    pub frame: u32,
    pub pc: u16,
    pub ram: Vec<u8>,
}

impl StructMachine {
    pub fn new(ram_size: usize) -> Self {
        StructMachine { frame: 0, pc: 0, ram: vec![0; ram_size] }
    }

    pub fn step(&mut self) {
        self.frame += 1;
        self.pc = self.pc.wrapping_add(3);
        let len = self.ram.len();
        self.ram[self.frame as usize % len] = self.frame as u8;
    }
}

impl Serializable for StructMachine {
    fn serialize(&mut self, out: &mut Vec<u8>) -> Result<()> {
        machine::encode_state(&*self, out)
    }

    fn deserialize(&mut self, data: &[u8]) -> Result<()> {
        *self = machine::decode_state(data)?;
        Ok(())
    }
}

/// A 2×2 frame filled with `n`.
pub fn video_frame(n: u32) -> VideoFrame {
    let mut f = VideoFrame::new(vec![n; 4], 2, 2);
    f.frame_number = n;
    f
}

/// Two stereo sample pairs tagged with `n`.
pub fn audio_samples(n: u32) -> Vec<i16> {
    let v = n as i16;
    vec![v, -v, v + 1000, -v - 1000]
}
