//! Load attempt progress.

use std::fmt;

/// Where a load attempt is.
///
/// ```text
/// ManifestLoaded -> CacheHit -> Done
///                -> CacheMiss -> Fetching -> Compiling -> Success -> Persisting -> Done
///                                                      -> Failure -> Reported
/// ```
///
/// Local folder plugins start at `Compiling`. Any state before `Done` may
/// move to `Failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// The cache manifest was read.
    ManifestLoaded,
    /// The cached module is usable.
    CacheHit,
    /// The cached module must be rebuilt.
    CacheMiss,
    /// The source archive is being fetched and routed.
    Fetching,
    /// The compiler is running.
    Compiling,
    /// The compiler produced a module.
    Success,
    /// The module and manifest are being written.
    Persisting,
    /// The module is ready.
    Done,
    /// The attempt failed.
    Failure,
    /// The failure has been logged.
    Reported,
}

impl LoadState {
    /// Returns `true` if `self` may come right after `previous`.
    pub fn follows(self, previous: Option<LoadState>) -> bool {
        use LoadState::*;
        match (previous, self) {
            (None, ManifestLoaded | Compiling) => true,
            (Some(ManifestLoaded), CacheHit | CacheMiss) => true,
            (Some(CacheHit), Done) => true,
            (Some(CacheMiss), Fetching) => true,
            (Some(Fetching), Compiling) => true,
            (Some(Compiling), Success) => true,
            (Some(Success), Persisting | Done) => true,
            (Some(Persisting), Done) => true,
            (Some(Failure), Reported) => true,
            (None | Some(ManifestLoaded | CacheMiss | Fetching | Compiling | Success | Persisting), Failure) => true,
            _ => false,
        }
    }

    /// Returns `true` once nothing more can happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, LoadState::Done | LoadState::Reported)
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tracks one load attempt and logs each transition.
#[derive(Debug)]
pub(crate) struct LoadAttempt<'a> {
    plugin: &'a str,
    state: Option<LoadState>,
}

impl<'a> LoadAttempt<'a> {
    pub(crate) fn new(plugin: &'a str) -> Self {
        Self {
            plugin,
            state: None,
        }
    }

    pub(crate) fn plugin(&self) -> &'a str {
        self.plugin
    }

    pub(crate) fn advance(&mut self, next: LoadState) {
        debug_assert!(
            next.follows(self.state),
            "invalid load transition {:?} -> {next}",
            self.state
        );
        tracing::debug!(plugin = self.plugin, from = ?self.state, to = %next, "load state");
        self.state = Some(next);
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> Option<LoadState> {
        self.state
    }
}
