//! The resource cache: typed and runtime-typed entry points over one host.

use std::any::TypeId;
use std::sync::Arc;

use stash_core::profiling::profile_function;

use crate::config::CacheConfig;
use crate::dispatch::{
    BindContext, DispatchRecord, Dispatcher, FindAllFn, LoadAllFn, LoadAsyncFn, LoadFn, TypeToken,
};
use crate::error::{CacheResult, validate_path};
use crate::future::AssetFuture;
use crate::host::{AssetHost, HostOperation, HostRequest};
use crate::invalidation::{InvalidationHook, SweepStats};
use crate::storage::{AssetGroup, CacheStorages, TypedCache};
use crate::untyped::{UntypedAssetFuture, UntypedAssetGroup};
use crate::{Asset, ErasedAsset, erase};

/// Caching proxy in front of an [`AssetHost`].
///
/// Each asset type gets its own [`TypedCache`], created on first use. Generic
/// calls reach it directly; calls carrying a [`TypeToken`] go through the
/// dispatcher and land in the same cache, so both paths share every hit.
///
/// The cache only holds weak references. An asset stays cached for as long as
/// something outside the cache keeps it alive.
pub struct ResourceCache<H: AssetHost> {
    host: Arc<H>,
    config: CacheConfig,
    storages: CacheStorages,
    invalidation: Arc<InvalidationHook>,
    dispatcher: Dispatcher<H>,
}

impl<H: AssetHost> ResourceCache<H> {
    /// Create a cache with the default configuration.
    pub fn new(host: H) -> Self {
        Self::with_config(host, CacheConfig::default())
    }

    /// Create a cache with a custom configuration.
    pub fn with_config(host: H, config: CacheConfig) -> Self {
        Self::from_shared(Arc::new(host), config)
    }

    /// Create a cache over a host that is shared with other code.
    pub fn from_shared(host: Arc<H>, config: CacheConfig) -> Self {
        tracing::debug!("Creating resource cache with {:?}", config);
        Self {
            host,
            config,
            storages: CacheStorages::new(),
            invalidation: Arc::new(InvalidationHook::new()),
            dispatcher: Dispatcher::new(),
        }
    }

    /// Get the host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Get the configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The hook fired after the host reclaims unused assets.
    ///
    /// Subscribe to it to observe sweeps.
    pub fn invalidation(&self) -> &InvalidationHook {
        &self.invalidation
    }

    /// Get the typed cache for `T`, creating it if needed.
    ///
    /// Also registers `T` with the dispatcher.
    pub fn typed<T: Asset>(&self) -> Arc<TypedCache<T>> {
        self.dispatcher.register::<T>();
        self.storages.get_or_create::<T>(&self.invalidation)
    }

    /// Register `T` so it can be reached through runtime tokens.
    ///
    /// Generic calls register their type implicitly; this is only needed for
    /// types first used through [`token_by_name`](Self::token_by_name).
    pub fn register<T: Asset>(&self) -> TypeToken {
        self.dispatcher.register::<T>()
    }

    /// Resolve a registered type by its [`Asset::type_name`].
    pub fn token_by_name(&self, name: &str) -> CacheResult<TypeToken> {
        self.dispatcher.token_by_name(name)
    }

    /// Resolve the registered type of an erased asset.
    pub fn token_of(&self, asset: &ErasedAsset) -> CacheResult<TypeToken> {
        let type_id: TypeId = (**asset).type_id();
        self.dispatcher.token_by_id(type_id)
    }

    /// Number of asset types with a bound dispatch record.
    pub fn dispatch_record_count(&self) -> usize {
        self.dispatcher.record_count()
    }

    // ---- Typed entry points ----

    /// Load a single asset, memoized per path.
    ///
    /// A miss is remembered only as a dead slot, so the host is asked again on
    /// the next call.
    pub fn load<T: Asset>(&self, path: &str) -> CacheResult<Option<Arc<T>>> {
        validate_path(path)?;
        Ok(self.typed::<T>().load(&*self.host, path))
    }

    /// Start or join an asynchronous load.
    pub fn load_async<T: Asset>(&self, path: &str) -> CacheResult<AssetFuture<T>> {
        validate_path(path)?;
        Ok(self
            .typed::<T>()
            .load_async(&*self.host, path, self.config.async_priority))
    }

    /// Load every asset of type `T` under a directory path.
    pub fn load_all<T: Asset>(&self, path: &str) -> CacheResult<AssetGroup<T>> {
        validate_path(path)?;
        Ok(self.typed::<T>().load_all(&*self.host, path))
    }

    /// Every live asset of type `T` known to the host.
    pub fn find_all_of_type<T: Asset>(&self) -> AssetGroup<T> {
        self.typed::<T>().find_all_of_type(&*self.host)
    }

    /// Read a request issued directly on the host through the cache.
    ///
    /// A finished request's result is promoted into the entry table without a
    /// second host call. An unfinished one falls back to [`load`](Self::load),
    /// which blocks like the host's own synchronous load.
    pub fn asset_of<T: Asset>(
        &self,
        path: &str,
        request: &dyn HostRequest<T>,
    ) -> CacheResult<Option<Arc<T>>> {
        validate_path(path)?;
        if !request.is_done() {
            return self.load::<T>(path);
        }
        Ok(self.typed::<T>().promote(path, request.result()))
    }

    /// Release a single asset. Passed straight to the host.
    pub fn unload_asset<T: Asset>(&self, asset: &Arc<T>) {
        self.host.unload_asset(&erase(Arc::clone(asset)));
    }

    // ---- Runtime-typed entry points ----

    /// Get the dispatch record for a token, binding it on first use.
    pub fn dispatch_record(&self, token: TypeToken) -> CacheResult<Arc<DispatchRecord>> {
        profile_function!();
        let ctx = BindContext {
            host: &self.host,
            storages: &self.storages,
            invalidation: &self.invalidation,
            async_priority: self.config.async_priority,
        };
        self.dispatcher.resolve(token, &ctx)
    }

    /// A reusable erased loader for one type.
    pub fn loader_for(&self, token: TypeToken) -> CacheResult<LoadFn> {
        Ok(Arc::clone(&self.dispatch_record(token)?.load))
    }

    /// A reusable erased async loader for one type.
    pub fn async_loader_for(&self, token: TypeToken) -> CacheResult<LoadAsyncFn> {
        Ok(Arc::clone(&self.dispatch_record(token)?.load_async))
    }

    /// A reusable erased load-all for one type.
    pub fn group_loader_for(&self, token: TypeToken) -> CacheResult<LoadAllFn> {
        Ok(Arc::clone(&self.dispatch_record(token)?.load_all))
    }

    /// A reusable erased find-all for one type.
    pub fn find_all_for(&self, token: TypeToken) -> CacheResult<FindAllFn> {
        Ok(Arc::clone(&self.dispatch_record(token)?.find_all))
    }

    /// Load a single asset of a runtime type.
    pub fn load_erased(&self, path: &str, token: TypeToken) -> CacheResult<Option<ErasedAsset>> {
        validate_path(path)?;
        (self.dispatch_record(token)?.load)(path)
    }

    /// Start or join an asynchronous load of a runtime type.
    pub fn load_async_erased(
        &self,
        path: &str,
        token: TypeToken,
    ) -> CacheResult<UntypedAssetFuture> {
        validate_path(path)?;
        (self.dispatch_record(token)?.load_async)(path)
    }

    /// Load every asset of a runtime type under a directory path.
    pub fn load_all_erased(&self, path: &str, token: TypeToken) -> CacheResult<UntypedAssetGroup> {
        validate_path(path)?;
        (self.dispatch_record(token)?.load_all)(path)
    }

    /// Every live asset of a runtime type.
    pub fn find_all_of_type_erased(&self, token: TypeToken) -> CacheResult<UntypedAssetGroup> {
        Ok((self.dispatch_record(token)?.find_all)())
    }

    /// Release a single erased asset. Passed straight to the host.
    pub fn unload_asset_erased(&self, asset: &ErasedAsset) {
        self.host.unload_asset(asset);
    }

    // ---- Reclamation ----

    /// Ask the host to free unreferenced assets.
    ///
    /// With [`CacheConfig::sweep_on_unload`] set, every typed cache is swept
    /// once the returned operation completes.
    pub fn unload_unused_assets(&self) -> Box<dyn HostOperation> {
        let operation = self.host.unload_unused_assets();
        if self.config.sweep_on_unload {
            let hook = Arc::downgrade(&self.invalidation);
            operation.on_completed(Box::new(move || {
                if let Some(hook) = hook.upgrade() {
                    hook.fire();
                }
            }));
        }
        operation
    }

    /// Remove dead slots from every typed cache right now.
    pub fn sweep(&self) -> SweepStats {
        self.invalidation.fire()
    }

    /// Number of typed caches created so far.
    pub fn cache_count(&self) -> usize {
        self.storages.len()
    }
}

impl<H: AssetHost + std::fmt::Debug> std::fmt::Debug for ResourceCache<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("host", &self.host)
            .field("config", &self.config)
            .field("caches", &self.storages.len())
            .finish_non_exhaustive()
    }
}
