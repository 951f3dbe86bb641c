//! Console notifications the rewind engine reacts to.

/// Events forwarded by the emulator to
/// [`RewindManager::process_notification`](crate::RewindManager::process_notification).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewindEvent {
    /// Soft reset of the running console.
    Reset,
    /// Power cycle of the running console.
    PowerCycle,
    /// A different console type or game was loaded.
    ConsoleChanged,
    /// The user loaded a save state.
    StateLoaded,
}

impl RewindEvent {
    /// Whether the event invalidates all recorded history.
    pub fn clears_history(self) -> bool {
        !matches!(self, RewindEvent::StateLoaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clears_history() {
        assert!(RewindEvent::Reset.clears_history());
        assert!(RewindEvent::PowerCycle.clears_history());
        assert!(RewindEvent::ConsoleChanged.clears_history());
        assert!(!RewindEvent::StateLoaded.clears_history());
    }
}
