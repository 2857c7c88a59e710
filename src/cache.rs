use std::collections::{hash_map, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;

use crate::descriptor::CommandDescriptor;
use crate::error::Result;
use crate::options::{CommandOptions, ConnectionTarget, SourceId};
use crate::watch::WatchGuard;

/// Structural identity of one described command.
///
/// Two commands share a descriptor only when every field matches: the
/// declared name, the text source, the server it is described against and
/// all the options that shape the output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub name: String,
    pub source: SourceId,
    pub target: ConnectionTarget,
    pub options: CommandOptions,
}

struct Entry {
    cell: Arc<OnceCell<Arc<CommandDescriptor>>>,
    // Dropped with the entry; eviction releases the watch.
    #[allow(dead_code)]
    watch: Option<WatchGuard>,
}

/// Memoizes descriptors by [`CacheKey`], with lazy invalidation.
///
/// At most one live descriptor exists per key. Concurrent first requests
/// for an unbuilt key share a single build: the builder runs outside the
/// map lock, so distinct keys never wait on each other, and a failed
/// build caches nothing.
///
/// Invalidation events arrive on a channel (see [`InvalidationHandle`])
/// and are drained at the start of each cache access; eviction is lazy
/// and the next request for an evicted key rebuilds.
pub struct DescriptorCache {
    entries: Mutex<HashMap<CacheKey, Entry>>,
    invalidations: flume::Receiver<SourceId>,
    handle: InvalidationHandle,
}

impl Default for DescriptorCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorCache {
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();

        Self {
            entries: Mutex::new(HashMap::new()),
            invalidations: rx,
            handle: InvalidationHandle { tx },
        }
    }

    /// The sender half of the invalidation channel, for the external
    /// watch collaborator. Clonable and `Send`.
    pub fn invalidation_handle(&self) -> InvalidationHandle {
        self.handle.clone()
    }

    /// Returns the cached descriptor for `key`, building and caching it if
    /// absent.
    ///
    /// `watch` runs at most once per entry, when the entry is first
    /// created, and the guard it returns lives exactly as long as the
    /// entry. Both `watch` and `build` run outside the map lock, so
    /// either may look back into this cache; a `build` failure is
    /// returned to every requester that shared the flight.
    pub fn get_or_describe(
        &self,
        key: &CacheKey,
        watch: impl FnOnce() -> Option<WatchGuard>,
        build: impl FnOnce() -> Result<CommandDescriptor>,
    ) -> Result<Arc<CommandDescriptor>> {
        self.drain_invalidations();

        let (cell, created) = {
            let mut entries = self.lock_entries();

            match entries.entry(key.clone()) {
                hash_map::Entry::Occupied(occupied) => (occupied.get().cell.clone(), false),
                hash_map::Entry::Vacant(vacancy) => {
                    let entry = vacancy.insert(Entry {
                        cell: Arc::new(OnceCell::new()),
                        watch: None,
                    });

                    (entry.cell.clone(), true)
                }
            }
        };

        if created {
            if let Some(guard) = watch() {
                // An invalidation in the window evicts the fresh entry;
                // the guard then drops right here.
                if let Some(entry) = self.lock_entries().get_mut(key) {
                    entry.watch = Some(guard);
                }
            }
        }

        let mut missed = false;

        let descriptor = cell
            .get_or_try_init(|| {
                missed = true;
                build().map(Arc::new)
            })
            .cloned()?;

        tracing::debug!(name = %key.name, hit = !missed, "descriptor cache access");

        Ok(descriptor)
    }

    /// Returns the cached descriptor without building.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<CommandDescriptor>> {
        self.drain_invalidations();

        self.lock_entries()
            .get(key)
            .and_then(|entry| entry.cell.get().cloned())
    }

    /// Evicts everything, releasing every watch guard.
    pub fn clear(&self) {
        self.lock_entries().clear();
    }

    pub fn len(&self) -> usize {
        self.drain_invalidations();
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Entry>> {
        // A panicked builder never holds this lock, so the map is intact.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn drain_invalidations(&self) {
        let changed: HashSet<SourceId> = self.invalidations.try_iter().collect();

        if changed.is_empty() {
            return;
        }

        let mut entries = self.lock_entries();
        let before = entries.len();

        entries.retain(|key, _| !changed.contains(&key.source));

        tracing::debug!(
            evicted = before - entries.len(),
            sources = changed.len(),
            "drained descriptor invalidations"
        );
    }
}

impl fmt::Debug for DescriptorCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorCache")
            .field("entries", &self.lock_entries().len())
            .finish()
    }
}

/// Signals text-source changes into a [`DescriptorCache`].
///
/// Handed to the external watch collaborator; delivery is asynchronous
/// and eviction lazy, so sending never blocks and never races a lookup
/// into inconsistency.
#[derive(Clone)]
pub struct InvalidationHandle {
    tx: flume::Sender<SourceId>,
}

impl InvalidationHandle {
    /// Reports that the given source's text changed. A no-op once the
    /// owning cache is gone.
    pub fn source_changed(&self, id: SourceId) {
        let _ = self.tx.send(id);
    }
}

impl fmt::Debug for InvalidationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvalidationHandle").finish()
    }
}
