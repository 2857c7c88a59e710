use std::fmt;
use std::sync::Arc;

use crate::cache::{CacheKey, DescriptorCache, InvalidationHandle};
use crate::catalog::TypeCatalogRegistry;
use crate::connection::Connect;
use crate::descriptor::{describe_resolved, CommandDescriptor};
use crate::error::Result;
use crate::options::{CommandInput, SourceId};
use crate::watch::SourceWatcher;

/// One-stop describe surface: owns the connector, the per-version type
/// catalogs, the descriptor cache and (optionally) the file watcher.
///
/// `descriptor()` is the only entry point consumers need. A server
/// round-trip happens only when the cache misses; the provider's lifetime
/// scopes every watch registration it makes.
pub struct CommandProvider<F: Connect> {
    connector: F,
    catalogs: TypeCatalogRegistry,
    cache: DescriptorCache,
    watcher: Option<Box<dyn SourceWatcher + Send + Sync>>,
}

impl<F: Connect> CommandProvider<F> {
    pub fn new(connector: F) -> Self {
        Self {
            connector,
            catalogs: TypeCatalogRegistry::new(),
            cache: DescriptorCache::new(),
            watcher: None,
        }
    }

    /// Installs the external file-watch collaborator. File-sourced
    /// commands described after this call get a watch registered for the
    /// lifetime of their cache entry.
    pub fn with_watcher(mut self, watcher: impl SourceWatcher + Send + Sync + 'static) -> Self {
        self.watcher = Some(Box::new(watcher));
        self
    }

    /// Returns the descriptor for `input`, describing it against the live
    /// server on first use and from the cache afterwards.
    pub fn descriptor(&self, input: &CommandInput) -> Result<Arc<CommandDescriptor>> {
        input.target.validate()?;

        let resolved = input.source.resolve()?;

        let key = CacheKey {
            name: input.name.clone(),
            source: resolved.id().clone(),
            target: input.target.clone(),
            options: input.options,
        };

        self.cache.get_or_describe(
            &key,
            || match (&self.watcher, resolved.id()) {
                (Some(watcher), id @ SourceId::File(_)) => Some(watcher.watch(id)),
                _ => None,
            },
            || {
                let mut client = self.connector.connect(&input.target)?;

                describe_resolved(&mut client, &self.catalogs, input, &resolved)
            },
        )
    }

    /// Sender half of the cache's invalidation channel, for the watch
    /// collaborator to report source changes on.
    pub fn invalidation_handle(&self) -> InvalidationHandle {
        self.cache.invalidation_handle()
    }

    /// Evicts every cached descriptor and releases their watches.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

impl<F: Connect> fmt::Debug for CommandProvider<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandProvider")
            .field("cache", &self.cache)
            .field("watching", &self.watcher.is_some())
            .finish()
    }
}
