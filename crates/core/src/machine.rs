//! Machine serialization contract.
//!
//! The rewind engine never looks inside a machine's state: it asks for the
//! whole machine as one opaque byte blob and hands reconstructed blobs back.
//! Every operation that touches the machine is generic over
//! [`Serializable`], so each console type gets its own monomorphized copy of
//! the per-frame path.
//!
//! Consoles that keep their state in `serde` structs can implement the
//! contract with [`encode_state`] / [`decode_state`], which use the same
//! bincode encoding as the on-disk save states.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// A machine whose complete state can be captured and restored.
///
/// The serialized size must stay fixed for as long as rewind history
/// exists; a console change must be announced with
/// [`RewindEvent::ConsoleChanged`](crate::RewindEvent::ConsoleChanged)
/// first.
pub trait Serializable {
    /// Append the full machine state to `out`.
    fn serialize(&mut self, out: &mut Vec<u8>) -> Result<()>;

    /// Replace the machine state with `data`.
    fn deserialize(&mut self, data: &[u8]) -> Result<()>;
}

/// Append the bincode encoding of `state` to `out`.
pub fn encode_state<T: Serialize>(state: &T, out: &mut Vec<u8>) -> Result<()> {
    bincode::serialize_into(out, state)?;
    Ok(())
}

/// Decode a state struct written by [`encode_state`].
pub fn decode_state<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StructMachine;

    #[test]
    fn test_bincode_helpers() {
        let mut m = StructMachine::new(8);
        m.step();
        m.step();
        let mut bytes = Vec::new();
        Serializable::serialize(&mut m, &mut bytes).unwrap();

        let mut other = StructMachine::new(8);
        other.deserialize(&bytes).unwrap();
        assert_eq!(other, m);
    }

    #[test]
    fn test_decode_garbage_is_error() {
        let r: Result<Vec<u64>> = decode_state(&[0xFF; 3]);
        assert!(r.is_err());
    }
}
