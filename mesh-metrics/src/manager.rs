use std::{
    hash::BuildHasher,
    iter::repeat_with,
    num::NonZeroUsize,
    sync::Arc,
    thread::available_parallelism,
};

use hashbrown::{DefaultHashBuilder, HashMap};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use crate::{Identity, LabelSet, MetricsError, Registry};

type DirectoryShard = RwLock<HashMap<Identity, Arc<Registry>, DefaultHashBuilder>>;

static GLOBAL_MANAGER: Lazy<Arc<RegistryManager>> = Lazy::new(|| Arc::new(RegistryManager::new()));

/// A directory of registries, keyed by [`Identity`].
///
/// `RegistryManager` guarantees that there is exactly one [`Registry`] for any given type name and
/// label set, even when many callers race to create the same one.
///
/// Most applications share the process-wide manager returned by [`RegistryManager::global`], but
/// a manager can also be created with [`RegistryManager::new`] and handed to the components that
/// need it, which keeps tests isolated from each other.
///
/// ## Performance
///
/// The directory is split into shards, each behind its own read/write lock.  Looking up an existing
/// registry only takes a shared lock on a single shard, so callers only contend with each other
/// when they create new registries that land in the same shard.
pub struct RegistryManager {
    shards: Vec<DirectoryShard>,
    shard_mask: usize,
    hasher: DefaultHashBuilder,
}

impl RegistryManager {
    /// Creates a new, empty `RegistryManager`.
    pub fn new() -> Self {
        let shard_count = available_parallelism().map_or(1, NonZeroUsize::get).next_power_of_two();
        let shard_mask = shard_count - 1;
        let hasher = DefaultHashBuilder::default();
        let shards = repeat_with(|| RwLock::new(HashMap::with_hasher(hasher.clone())))
            .take(shard_count)
            .collect();

        Self { shards, shard_mask, hasher }
    }

    /// Gets the process-wide `RegistryManager`.
    ///
    /// The manager is created the first time this is called, and lives for the rest of the process.
    pub fn global() -> Arc<RegistryManager> {
        Arc::clone(&GLOBAL_MANAGER)
    }

    /// Gets the registry for the given type name and labels, creating it if it does not exist.
    ///
    /// ## Errors
    ///
    /// If `type_name` is empty, or any label key is empty, an error variant will be returned and
    /// the directory is left untouched.
    pub fn new_or_existing(
        &self,
        type_name: &str,
        labels: LabelSet,
    ) -> Result<Arc<Registry>, MetricsError> {
        let identity = Identity::new(type_name, labels)?;
        let (hash, shard) = self.get_hash_and_shard(&identity);

        // Try and get the registry if it exists.
        let shard_read = shard.read();
        if let Some((_, registry)) = shard_read.raw_entry().from_key_hashed_nocheck(hash, &identity)
        {
            return Ok(Arc::clone(registry));
        }
        drop(shard_read);

        // Switch to the write guard, checking again in case somebody else just inserted it.
        let mut shard_write = shard.write();
        let (_, registry) = shard_write
            .raw_entry_mut()
            .from_key_hashed_nocheck(hash, &identity)
            .or_insert_with(|| {
                debug!(%identity, "creating registry");
                let registry = Arc::new(Registry::new(identity.clone()));
                (identity, registry)
            });

        Ok(Arc::clone(registry))
    }

    /// Gets the registry for the given type name and labels, if it exists.
    pub fn get(&self, type_name: &str, labels: &LabelSet) -> Option<Arc<Registry>> {
        let identity = Identity::new(type_name, labels.clone()).ok()?;
        let (hash, shard) = self.get_hash_and_shard(&identity);
        let shard_read = shard.read();
        shard_read
            .raw_entry()
            .from_key_hashed_nocheck(hash, &identity)
            .map(|(_, registry)| Arc::clone(registry))
    }

    /// Gets all registries currently in the directory.
    ///
    /// Shards are visited one at a time, so a registry created while this runs may or may not be
    /// included.  Every registry that existed when this was called is included.
    pub fn registries(&self) -> Vec<Arc<Registry>> {
        let mut registries = Vec::with_capacity(self.len());
        for shard in &self.shards {
            registries.extend(shard.read().values().cloned());
        }
        registries
    }

    /// Number of registries in the directory.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    /// Whether or not the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }

    /// Removes every registry from the directory.
    ///
    /// All shards are locked before any of them is cleared, so no caller can observe a partially
    /// reset directory.  Handles obtained before the reset stay usable, but are no longer reachable
    /// through the manager.
    pub fn reset_all(&self) {
        let mut shards = self.shards.iter().map(|shard| shard.write()).collect::<Vec<_>>();
        let removed = shards.iter().map(|shard| shard.len()).sum::<usize>();
        for shard in shards.iter_mut() {
            shard.clear();
        }
        debug!(removed, "reset all registries");
    }

    #[inline]
    fn get_hash_and_shard(&self, identity: &Identity) -> (u64, &DirectoryShard) {
        let hash = self.hasher.hash_one(identity);
        let shard = &self.shards[hash as usize & self.shard_mask];
        (hash, shard)
    }
}

impl Default for RegistryManager {
    fn default() -> Self {
        RegistryManager::new()
    }
}
