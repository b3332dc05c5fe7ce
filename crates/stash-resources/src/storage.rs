//! Per-type cache storage.
//!
//! Every asset type gets its own [`TypedCache`], so a key never needs to carry
//! its type: `(Texture, "icons/a")` and `(Mesh, "icons/a")` live in different
//! caches and never interact.

use std::any::{Any, TypeId};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use stash_core::collections::{HashMap, TypeMap};
use stash_core::profiling::profile_function;

use crate::Asset;
use crate::future::AssetFuture;
use crate::host::{AssetHost, HostRequest};
use crate::invalidation::{InvalidationHook, Sweep, SweepStats};

/// A sequence of assets returned by load-all and find-all operations.
pub type AssetGroup<T> = Arc<[Arc<T>]>;

struct Tables<T: Asset> {
    /// Single assets by path.
    entries: HashMap<String, Weak<T>>,
    /// In-flight async loads by path.
    pending: HashMap<String, AssetFuture<T>>,
    /// Load-all results by directory path.
    groups: HashMap<String, Weak<[Arc<T>]>>,
    /// The find-all-of-type result.
    all_of_type: Option<Weak<[Arc<T>]>>,
}

impl<T: Asset> Tables<T> {
    fn live_entry(&self, path: &str) -> Option<Arc<T>> {
        self.entries.get(path).and_then(Weak::upgrade)
    }

    fn store_entry(&mut self, path: &str, asset: Option<&Arc<T>>) {
        let weak = asset.map(Arc::downgrade).unwrap_or_default();
        match self.entries.get_mut(path) {
            Some(slot) => *slot = weak,
            None => {
                self.entries.insert(path.to_string(), weak);
            }
        }
    }
}

/// Cache for a single asset type.
///
/// Holds four independent stores: single entries, pending async loads,
/// load-all groups and the find-all-of-type result. Everything except pending
/// loads is held weakly; a dropped asset simply stops being a cache hit.
///
/// A miss is stored as an empty weak slot, which never upgrades, so asking for
/// a missing asset again asks the host again.
pub struct TypedCache<T: Asset> {
    tables: Mutex<Tables<T>>,
    this: Weak<TypedCache<T>>,
}

impl<T: Asset> TypedCache<T> {
    /// Create a cache and register it with the invalidation hook.
    pub fn new(invalidation: &InvalidationHook) -> Arc<Self> {
        let cache = Arc::new_cyclic(|this| Self {
            tables: Mutex::new(Tables {
                entries: HashMap::new(),
                pending: HashMap::new(),
                groups: HashMap::new(),
                all_of_type: None,
            }),
            this: this.clone(),
        });
        let sweeper: Arc<dyn Sweep> = cache.clone();
        invalidation.register(&sweeper);
        cache
    }

    /// Load a single asset, asking the host only on a miss.
    pub fn load<H: AssetHost>(&self, host: &H, path: &str) -> Option<Arc<T>> {
        profile_function!();

        if let Some(asset) = self.tables.lock().live_entry(path) {
            tracing::trace!("Cache hit: {} '{}'", T::type_name(), path);
            return Some(asset);
        }

        tracing::trace!("Cache miss: {} '{}'", T::type_name(), path);
        let loaded = host.load::<T>(path);

        let mut tables = self.tables.lock();
        // Another caller may have filled the slot while the host was loading.
        if let Some(existing) = tables.live_entry(path) {
            return Some(existing);
        }
        tables.store_entry(path, loaded.as_ref());
        loaded
    }

    /// Start or join an asynchronous load.
    ///
    /// Returns a resolved future for a live entry, the in-flight future if the
    /// path is already loading, and otherwise issues exactly one host request.
    /// `priority` is applied only to newly issued requests.
    pub fn load_async<H: AssetHost>(
        &self,
        host: &H,
        path: &str,
        priority: Option<i32>,
    ) -> AssetFuture<T> {
        profile_function!();

        let (future, request) = {
            let mut tables = self.tables.lock();
            if let Some(asset) = tables.live_entry(path) {
                tracing::trace!("Cache hit (async): {} '{}'", T::type_name(), path);
                return AssetFuture::ready(Some(asset));
            }
            if let Some(future) = tables.pending.get(path) {
                tracing::trace!("Joining pending load: {} '{}'", T::type_name(), path);
                return future.clone();
            }

            tracing::debug!("Requesting async load: {} '{}'", T::type_name(), path);
            let request: Arc<dyn HostRequest<T>> = Arc::from(host.load_async::<T>(path));
            let future = AssetFuture::pending(path, Arc::clone(&request), self.this.clone());
            tables.pending.insert(path.to_string(), future.clone());
            (future, request)
        };

        if let Some(priority) = priority {
            future.set_priority(priority);
        }

        let cache = self.this.clone();
        let completed = future.clone();
        let owned_path = path.to_string();
        request.on_completed(Box::new(move |asset| {
            let asset = match cache.upgrade() {
                Some(cache) => cache.promote(&owned_path, asset),
                None => asset,
            };
            completed.complete(asset);
        }));

        future
    }

    /// Load every asset under a directory path, asking the host only on a miss.
    pub fn load_all<H: AssetHost>(&self, host: &H, path: &str) -> AssetGroup<T> {
        profile_function!();

        if let Some(group) = self.tables.lock().groups.get(path).and_then(Weak::upgrade) {
            tracing::trace!("Cache hit (group): {} '{}'", T::type_name(), path);
            return group;
        }

        tracing::trace!("Cache miss (group): {} '{}'", T::type_name(), path);
        let loaded: AssetGroup<T> = host.load_all::<T>(path).into();

        let mut tables = self.tables.lock();
        if let Some(existing) = tables.groups.get(path).and_then(Weak::upgrade) {
            return existing;
        }
        tables
            .groups
            .insert(path.to_string(), Arc::downgrade(&loaded));
        loaded
    }

    /// Every live asset of this type, asking the host only on a miss.
    pub fn find_all_of_type<H: AssetHost>(&self, host: &H) -> AssetGroup<T> {
        profile_function!();

        let cached = self.tables.lock().all_of_type.as_ref().and_then(Weak::upgrade);
        if let Some(group) = cached {
            tracing::trace!("Cache hit (all): {}", T::type_name());
            return group;
        }

        tracing::trace!("Cache miss (all): {}", T::type_name());
        let found: AssetGroup<T> = host.find_all_of_type::<T>().into();

        let mut tables = self.tables.lock();
        if let Some(existing) = tables.all_of_type.as_ref().and_then(Weak::upgrade) {
            return existing;
        }
        tables.all_of_type = Some(Arc::downgrade(&found));
        found
    }

    /// Move a finished async load into the entry table.
    ///
    /// Idempotent: the pending slot is cleared and a live entry, if one exists,
    /// wins over `asset`. Returns the value synchronous loads will now see.
    pub(crate) fn promote(&self, path: &str, asset: Option<Arc<T>>) -> Option<Arc<T>> {
        let mut tables = self.tables.lock();
        let removed = tables.pending.remove(path);

        if let Some(existing) = tables.live_entry(path) {
            drop(tables);
            drop(removed);
            return Some(existing);
        }

        tables.store_entry(path, asset.as_ref());
        drop(tables);

        if removed.is_some() {
            tracing::debug!("Promoted async load: {} '{}'", T::type_name(), path);
        }
        // Dropping the last pending handle can run host code; keep it outside the lock.
        drop(removed);
        asset
    }

    /// Number of entry slots, live or dead.
    pub fn entry_count(&self) -> usize {
        self.tables.lock().entries.len()
    }

    /// Number of in-flight async loads.
    pub fn pending_count(&self) -> usize {
        self.tables.lock().pending.len()
    }

    /// Number of load-all slots, live or dead.
    pub fn group_count(&self) -> usize {
        self.tables.lock().groups.len()
    }

    /// Whether `path` currently resolves without asking the host.
    pub fn contains_live(&self, path: &str) -> bool {
        self.tables.lock().live_entry(path).is_some()
    }

    /// Whether an async load for `path` is in flight.
    pub fn is_pending(&self, path: &str) -> bool {
        self.tables.lock().pending.contains_key(path)
    }
}

impl<T: Asset> Sweep for TypedCache<T> {
    fn asset_type_name(&self) -> &'static str {
        T::type_name()
    }

    fn sweep(&self) -> SweepStats {
        profile_function!();

        let mut tables = self.tables.lock();
        let entries_before = tables.entries.len();
        let groups_before = tables.groups.len();

        tables.entries.retain(|_, weak| weak.strong_count() > 0);
        tables.groups.retain(|_, weak| weak.strong_count() > 0);
        let all_dropped = tables
            .all_of_type
            .take_if(|weak| weak.strong_count() == 0)
            .is_some();

        let stats = SweepStats {
            caches: 1,
            entries_removed: entries_before - tables.entries.len(),
            groups_removed: groups_before - tables.groups.len() + usize::from(all_dropped),
            entries_kept: tables.entries.len(),
            pending_kept: tables.pending.len(),
        };
        drop(tables);

        if stats.removed() > 0 {
            tracing::debug!(
                "Swept {}: {} entries, {} groups removed",
                T::type_name(),
                stats.entries_removed,
                stats.groups_removed
            );
        }
        stats
    }
}

/// Type-erased view of a [`TypedCache`].
pub trait ErasedCache: Send + Sync {
    /// Get the type ID of assets in this cache.
    fn asset_type_id(&self) -> TypeId;

    /// Get as `Any` for downcasting back to the typed cache.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Asset> ErasedCache for TypedCache<T> {
    fn asset_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Registry of all typed caches, keyed by type.
#[derive(Default)]
pub struct CacheStorages {
    caches: Mutex<TypeMap<Arc<dyn ErasedCache>>>,
}

impl CacheStorages {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the cache for a type.
    pub fn get_or_create<T: Asset>(&self, invalidation: &InvalidationHook) -> Arc<TypedCache<T>> {
        let mut caches = self.caches.lock();
        if let Some(cache) = caches
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(downcast_cache::<T>)
        {
            return cache;
        }

        tracing::debug!("Creating cache for {}", T::type_name());
        let cache = TypedCache::<T>::new(invalidation);
        caches.insert(TypeId::of::<T>(), cache.clone());
        cache
    }

    /// Get the cache for a type if one was created.
    pub fn get<T: Asset>(&self) -> Option<Arc<TypedCache<T>>> {
        let erased = self.caches.lock().get(&TypeId::of::<T>()).cloned()?;
        downcast_cache(erased)
    }

    /// Check if a cache exists for a type.
    pub fn has<T: Asset>(&self) -> bool {
        self.caches.lock().contains_key(&TypeId::of::<T>())
    }

    /// Number of typed caches created so far.
    pub fn len(&self) -> usize {
        self.caches.lock().len()
    }

    /// Check if no cache has been created yet.
    pub fn is_empty(&self) -> bool {
        self.caches.lock().is_empty()
    }
}

fn downcast_cache<T: Asset>(erased: Arc<dyn ErasedCache>) -> Option<Arc<TypedCache<T>>> {
    erased.into_any().downcast::<TypedCache<T>>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Mesh(u16);

    impl Asset for Mesh {
        fn type_name() -> &'static str {
            "Mesh"
        }
    }

    #[test]
    fn test_registry_creates_one_cache_per_type() {
        let hook = InvalidationHook::new();
        let storages = CacheStorages::new();
        assert!(storages.is_empty());
        assert!(storages.get::<Mesh>().is_none());

        let a = storages.get_or_create::<Mesh>(&hook);
        let b = storages.get_or_create::<Mesh>(&hook);
        storages.get_or_create::<String>(&hook);

        assert!(Arc::ptr_eq(&a, &b));
        assert!(storages.has::<Mesh>());
        assert_eq!(storages.len(), 2);
        assert_eq!(hook.target_count(), 2);
        assert_eq!(a.asset_type_id(), TypeId::of::<Mesh>());
    }

    #[test]
    fn test_promote_stores_weak_entry() {
        let hook = InvalidationHook::new();
        let cache = TypedCache::<Mesh>::new(&hook);

        let mesh = Arc::new(Mesh(4));
        let stored = cache.promote("meshes/cube", Some(Arc::clone(&mesh)));
        assert!(Arc::ptr_eq(stored.as_ref().unwrap(), &mesh));
        assert!(cache.contains_live("meshes/cube"));

        // A live entry wins over a later result for the same path.
        let other = cache.promote("meshes/cube", Some(Arc::new(Mesh(9))));
        assert_eq!(other.unwrap().0, 4);

        drop(stored);
        drop(mesh);
        assert!(!cache.contains_live("meshes/cube"));
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn test_sweep_removes_dead_slots() {
        let hook = InvalidationHook::new();
        let cache = TypedCache::<Mesh>::new(&hook);

        let kept = Arc::new(Mesh(1));
        cache.promote("meshes/kept", Some(Arc::clone(&kept)));
        cache.promote("meshes/gone", Some(Arc::new(Mesh(2))));
        cache.promote("meshes/missing", None);

        let stats = cache.sweep();
        assert_eq!(stats.caches, 1);
        assert_eq!(stats.entries_removed, 2);
        assert_eq!(stats.entries_kept, 1);
        assert!(cache.contains_live("meshes/kept"));

        assert_eq!(hook.fire().removed(), 0);
    }
}
