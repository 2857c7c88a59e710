use std::fmt;

use crate::options::SourceId;

/// The external file-watch collaborator.
///
/// The provider registers every file-backed text source here when its
/// descriptor is first cached. The watcher is expected to deliver change
/// events for registered sources into the cache's
/// [`InvalidationHandle`](crate::cache::InvalidationHandle); how it
/// watches is its own business.
///
/// Registration is advisory and must not fail a build: an implementation
/// that cannot watch a source should log and return [`WatchGuard::noop`].
pub trait SourceWatcher {
    fn watch(&self, id: &SourceId) -> WatchGuard;
}

/// Scoped registration of one watched source.
///
/// Held by the cache entry it protects; dropping it (on eviction or cache
/// teardown) releases the underlying watch.
pub struct WatchGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl WatchGuard {
    /// A guard that runs `release` when dropped.
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A guard over nothing, for watchers without per-source state.
    pub fn noop() -> Self {
        Self { release: None }
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for WatchGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchGuard")
            .field("armed", &self.release.is_some())
            .finish()
    }
}
