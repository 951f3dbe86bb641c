//! Controller state capture and playback.
//!
//! The emulation loop polls each connected port once per frame. While
//! playing, the rewind engine records what was read ([`InputRecorder`]);
//! while rewinding, it hands the recorded values back ([`InputProvider`]).

use serde::{Deserialize, Serialize};

/// Raw state of one controller port for one frame.
///
/// The layout of `state` belongs to the device (button bitmask, analog
/// axes, ...); the rewind engine stores it verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerState {
    pub state: Vec<u8>,
}

impl ControllerState {
    pub fn new(state: Vec<u8>) -> Self {
        ControllerState { state }
    }

    /// Size of the stored state in bytes.
    pub fn len(&self) -> usize { self.state.len() }

    /// Whether the device reported no state bytes.
    pub fn is_empty(&self) -> bool { self.state.is_empty() }
}

/// Receives the input read from each port during normal play.
pub trait InputRecorder {
    fn record_input(&mut self, port: u8, state: &ControllerState);
}

/// Supplies recorded input for a port, or `None` to let the live device
/// answer.
pub trait InputProvider {
    fn set_input(&mut self, port: u8) -> Option<ControllerState>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_state() {
        let s = ControllerState::new(vec![0b0001_0010, 0x7F]);
        assert_eq!(s.len(), 2);
        assert!(!s.is_empty());
        assert!(ControllerState::default().is_empty());
    }
}
