//! Errors surfaced by the rewind engine.
//!
//! Only failures of external collaborators are recoverable: the machine
//! refusing to serialize or restore itself, or a malformed configuration.
//! Broken history invariants are bugs in this crate and panic instead.

use thiserror::Error;

/// Recoverable rewind engine error.
#[derive(Debug, Error)]
pub enum RewindError {
    /// The machine failed to produce its state bytes.
    #[error("machine serialize failed: {0}")]
    Serialize(String),
    /// The machine rejected a reconstructed state.
    #[error("machine deserialize failed: {0}")]
    Deserialize(String),
    /// A bincode-encoded state struct could not be (de)serialized.
    #[error("state encoding error: {0}")]
    Bincode(#[from] bincode::Error),
    /// The rewind configuration could not be parsed.
    #[error("invalid rewind config: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result alias used by every fallible rewind operation.
pub type Result<T> = std::result::Result<T, RewindError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = RewindError::Serialize("out of memory".into());
        assert_eq!(e.to_string(), "machine serialize failed: out of memory");
        let e = RewindError::Deserialize("bad length".into());
        assert!(e.to_string().contains("bad length"));
    }
}
