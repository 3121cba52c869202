//! Where an asset name currently sits in the loading pipeline.

/// Load state of one asset name, as reported by
/// [`AssetManager::load_state`](crate::AssetManager::load_state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Not known to the manager.
    #[default]
    NotLoaded,

    /// Requested, waiting in the queue.
    Queued,

    /// On the task stack, either as a requested asset or a dependency.
    Loading,

    /// Stored and ready for use.
    Loaded,
}

impl LoadState {
    /// Returns true if the asset is stored.
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadState::Loaded)
    }

    /// Returns true if the asset is queued or being loaded.
    pub fn is_pending(&self) -> bool {
        matches!(self, LoadState::Queued | LoadState::Loading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(LoadState::Loaded.is_loaded());
        assert!(!LoadState::Loaded.is_pending());
        assert!(LoadState::Queued.is_pending());
        assert!(LoadState::Loading.is_pending());
        assert!(!LoadState::default().is_pending());
    }
}
