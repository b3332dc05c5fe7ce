//! Runtime type tokens and the type-erased dispatch table.
//!
//! Rust cannot instantiate `TypedCache<T>` from a `TypeId` at runtime, so each
//! asset type registers a monomorphized binder when it is first seen. The
//! first erased call for a type runs that binder once and memoizes the
//! resulting [`DispatchRecord`]; every later call is a map lookup.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;
use stash_core::collections::{HashMap, TypeMap};

use crate::error::{CacheError, CacheResult, validate_path};
use crate::host::AssetHost;
use crate::invalidation::InvalidationHook;
use crate::storage::CacheStorages;
use crate::untyped::{UntypedAssetFuture, UntypedAssetGroup};
use crate::{Asset, ErasedAsset, erase};

/// A runtime stand-in for an asset type.
///
/// Equality and hashing use only the [`TypeId`].
#[derive(Clone, Copy)]
pub struct TypeToken {
    type_id: TypeId,
    type_name: &'static str,
}

impl TypeToken {
    /// The token for `T`.
    pub fn of<T: Asset>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: T::type_name(),
        }
    }

    /// Get the type ID.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Get the asset type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn unregistered(&self) -> CacheError {
        CacheError::UnregisteredType {
            type_id: Some(self.type_id),
            type_name: Some(self.type_name.to_string()),
        }
    }
}

impl PartialEq for TypeToken {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeToken {}

impl Hash for TypeToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeToken").field(&self.type_name).finish()
    }
}

/// Erased single-asset load.
pub type LoadFn = Arc<dyn Fn(&str) -> CacheResult<Option<ErasedAsset>> + Send + Sync>;

/// Erased async load.
pub type LoadAsyncFn = Arc<dyn Fn(&str) -> CacheResult<UntypedAssetFuture> + Send + Sync>;

/// Erased load-all.
pub type LoadAllFn = Arc<dyn Fn(&str) -> CacheResult<UntypedAssetGroup> + Send + Sync>;

/// Erased find-all-of-type.
pub type FindAllFn = Arc<dyn Fn() -> UntypedAssetGroup + Send + Sync>;

/// The cache operations of one asset type, with the type erased.
///
/// Each closure forwards to the same [`TypedCache`](crate::TypedCache) the
/// generic entry points use, so both paths share hits and misses.
#[derive(Clone)]
pub struct DispatchRecord {
    /// The type this record was bound for.
    pub token: TypeToken,
    /// See [`ResourceCache::load`](crate::ResourceCache::load).
    pub load: LoadFn,
    /// See [`ResourceCache::load_async`](crate::ResourceCache::load_async).
    pub load_async: LoadAsyncFn,
    /// See [`ResourceCache::load_all`](crate::ResourceCache::load_all).
    pub load_all: LoadAllFn,
    /// See [`ResourceCache::find_all_of_type`](crate::ResourceCache::find_all_of_type).
    pub find_all: FindAllFn,
}

impl fmt::Debug for DispatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchRecord")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// Everything a binder needs to reach a typed cache.
pub(crate) struct BindContext<'a, H: AssetHost> {
    pub host: &'a Arc<H>,
    pub storages: &'a CacheStorages,
    pub invalidation: &'a InvalidationHook,
    pub async_priority: Option<i32>,
}

type Binder<H> = fn(&BindContext<'_, H>) -> DispatchRecord;

fn bind<T: Asset, H: AssetHost>(ctx: &BindContext<'_, H>) -> DispatchRecord {
    let cache = ctx.storages.get_or_create::<T>(ctx.invalidation);
    let async_priority = ctx.async_priority;

    let load: LoadFn = {
        let (host, cache) = (Arc::clone(ctx.host), Arc::clone(&cache));
        Arc::new(move |path: &str| {
            validate_path(path)?;
            Ok(cache.load(&*host, path).map(erase))
        })
    };

    let load_async: LoadAsyncFn = {
        let (host, cache) = (Arc::clone(ctx.host), Arc::clone(&cache));
        Arc::new(move |path: &str| {
            validate_path(path)?;
            Ok(cache.load_async(&*host, path, async_priority).into())
        })
    };

    let load_all: LoadAllFn = {
        let (host, cache) = (Arc::clone(ctx.host), Arc::clone(&cache));
        Arc::new(move |path: &str| {
            validate_path(path)?;
            Ok(cache.load_all(&*host, path).into())
        })
    };

    let find_all: FindAllFn = {
        let host = Arc::clone(ctx.host);
        Arc::new(move || cache.find_all_of_type(&*host).into())
    };

    DispatchRecord {
        token: TypeToken::of::<T>(),
        load,
        load_async,
        load_all,
        find_all,
    }
}

/// Resolves runtime type tokens to dispatch records.
pub struct Dispatcher<H: AssetHost> {
    binders: Mutex<TypeMap<(TypeToken, Binder<H>)>>,
    names: Mutex<HashMap<&'static str, TypeToken>>,
    records: Mutex<TypeMap<Arc<DispatchRecord>>>,
}

impl<H: AssetHost> Default for Dispatcher<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: AssetHost> Dispatcher<H> {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self {
            binders: Mutex::new(TypeMap::new()),
            names: Mutex::new(HashMap::new()),
            records: Mutex::new(TypeMap::new()),
        }
    }

    /// Make `T` reachable through runtime tokens. Registering twice is a no-op.
    pub fn register<T: Asset>(&self) -> TypeToken {
        let token = TypeToken::of::<T>();
        let mut binders = self.binders.lock();
        if binders.contains_key(&token.type_id) {
            return token;
        }
        binders.insert(token.type_id, (token, bind::<T, H> as Binder<H>));
        drop(binders);

        let mut names = self.names.lock();
        if let Some(previous) = names.insert(token.type_name, token)
            && previous != token
        {
            tracing::warn!(
                "Asset type name '{}' registered by two types; lookups by name now resolve to the latest",
                token.type_name
            );
        }
        tracing::trace!("Registered asset type {}", token.type_name);
        token
    }

    /// Whether a token can be resolved.
    pub fn is_registered(&self, token: TypeToken) -> bool {
        self.binders.lock().contains_key(&token.type_id)
    }

    /// Look up a registered type by its [`Asset::type_name`].
    pub fn token_by_name(&self, name: &str) -> CacheResult<TypeToken> {
        if name.trim().is_empty() {
            return Err(CacheError::InvalidTypeName);
        }
        self.names
            .lock()
            .get(name)
            .copied()
            .ok_or_else(|| CacheError::UnregisteredType {
                type_id: None,
                type_name: Some(name.to_string()),
            })
    }

    /// Look up a registered type by its [`TypeId`].
    pub fn token_by_id(&self, type_id: TypeId) -> CacheResult<TypeToken> {
        self.binders
            .lock()
            .get(&type_id)
            .map(|(token, _)| *token)
            .ok_or(CacheError::UnregisteredType {
                type_id: Some(type_id),
                type_name: None,
            })
    }

    /// Number of records bound so far.
    pub fn record_count(&self) -> usize {
        self.records.lock().len()
    }

    /// Get the record for a token, binding it on first use.
    pub(crate) fn resolve(
        &self,
        token: TypeToken,
        ctx: &BindContext<'_, H>,
    ) -> CacheResult<Arc<DispatchRecord>> {
        if let Some(record) = self.records.lock().get(&token.type_id) {
            return Ok(Arc::clone(record));
        }

        let (token, binder) = self
            .binders
            .lock()
            .get(&token.type_id)
            .copied()
            .ok_or_else(|| token.unregistered())?;

        if !ctx.host.supports_type(token) {
            tracing::error!("Host cannot load asset type {}", token.type_name);
            return Err(CacheError::IneligibleType {
                type_id: token.type_id,
                type_name: token.type_name,
            });
        }

        let record = Arc::new(binder(ctx));
        tracing::debug!("Bound dispatch record for {}", token.type_name);

        let mut records = self.records.lock();
        Ok(Arc::clone(records.entry(token.type_id).or_insert(record)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostOperation, HostRequest, OperationCallback, RequestCallback};

    #[derive(Debug)]
    struct Shader;

    impl Asset for Shader {
        fn type_name() -> &'static str {
            "Shader"
        }
    }

    struct EmptyRequest;

    impl<T: Asset> HostRequest<T> for EmptyRequest {
        fn is_done(&self) -> bool {
            true
        }
        fn progress(&self) -> f32 {
            1.0
        }
        fn priority(&self) -> i32 {
            0
        }
        fn set_priority(&self, _priority: i32) {}
        fn result(&self) -> Option<Arc<T>> {
            None
        }
        fn on_completed(&self, callback: RequestCallback<T>) {
            callback(None);
        }
    }

    struct DoneOperation;

    impl HostOperation for DoneOperation {
        fn is_done(&self) -> bool {
            true
        }
        fn progress(&self) -> f32 {
            1.0
        }
        fn on_completed(&self, callback: OperationCallback) {
            callback();
        }
    }

    /// Finds nothing; refuses `Shader` when `allow_shaders` is off.
    struct EmptyHost {
        allow_shaders: bool,
    }

    impl AssetHost for EmptyHost {
        fn load<T: Asset>(&self, _path: &str) -> Option<Arc<T>> {
            None
        }
        fn load_async<T: Asset>(&self, _path: &str) -> Box<dyn HostRequest<T>> {
            Box::new(EmptyRequest)
        }
        fn load_all<T: Asset>(&self, _path: &str) -> Vec<Arc<T>> {
            Vec::new()
        }
        fn find_all_of_type<T: Asset>(&self) -> Vec<Arc<T>> {
            Vec::new()
        }
        fn unload_asset(&self, _asset: &ErasedAsset) {}
        fn unload_unused_assets(&self) -> Box<dyn HostOperation> {
            Box::new(DoneOperation)
        }
        fn supports_type(&self, token: TypeToken) -> bool {
            self.allow_shaders || token != TypeToken::of::<Shader>()
        }
    }

    fn resolve(
        dispatcher: &Dispatcher<EmptyHost>,
        host: &Arc<EmptyHost>,
        token: TypeToken,
    ) -> CacheResult<Arc<DispatchRecord>> {
        let storages = CacheStorages::new();
        let invalidation = InvalidationHook::new();
        let ctx = BindContext {
            host,
            storages: &storages,
            invalidation: &invalidation,
            async_priority: None,
        };
        dispatcher.resolve(token, &ctx)
    }

    #[test]
    fn test_token_identity() {
        assert_eq!(TypeToken::of::<String>(), TypeToken::of::<String>());
        assert_ne!(TypeToken::of::<String>(), TypeToken::of::<Vec<u8>>());
        assert_eq!(TypeToken::of::<Vec<u8>>().type_name(), "Bytes");
        assert_eq!(format!("{:?}", TypeToken::of::<Shader>()), "TypeToken(\"Shader\")");
    }

    #[test]
    fn test_register_is_idempotent() {
        let dispatcher = Dispatcher::<EmptyHost>::new();
        let first = dispatcher.register::<String>();
        let second = dispatcher.register::<String>();

        assert_eq!(first, second);
        assert!(dispatcher.is_registered(first));
        assert!(!dispatcher.is_registered(TypeToken::of::<Shader>()));
    }

    #[test]
    fn test_token_lookup() {
        let dispatcher = Dispatcher::<EmptyHost>::new();
        let token = dispatcher.register::<Shader>();

        assert_eq!(dispatcher.token_by_name("Shader").unwrap(), token);
        assert_eq!(dispatcher.token_by_id(TypeId::of::<Shader>()).unwrap(), token);
        assert_eq!(
            dispatcher.token_by_name("  "),
            Err(CacheError::InvalidTypeName)
        );
        assert_eq!(
            dispatcher.token_by_name("Mesh"),
            Err(CacheError::UnregisteredType {
                type_id: None,
                type_name: Some("Mesh".to_string()),
            })
        );
        assert!(dispatcher.token_by_id(TypeId::of::<String>()).is_err());
    }

    #[test]
    fn test_resolve_binds_once() {
        let dispatcher = Dispatcher::<EmptyHost>::new();
        let host = Arc::new(EmptyHost { allow_shaders: true });
        let token = dispatcher.register::<String>();

        let first = resolve(&dispatcher, &host, token).unwrap();
        let second = resolve(&dispatcher, &host, token).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.token, token);
        assert_eq!(dispatcher.record_count(), 1);
        assert!((first.load)("missing").unwrap().is_none());
        assert!((first.find_all)().is_empty());
    }

    #[test]
    fn test_resolve_unregistered() {
        let dispatcher = Dispatcher::<EmptyHost>::new();
        let host = Arc::new(EmptyHost { allow_shaders: true });

        let err = resolve(&dispatcher, &host, TypeToken::of::<Shader>()).unwrap_err();
        assert!(err.is_dispatch_failure());
        assert!(matches!(err, CacheError::UnregisteredType { .. }));
        assert_eq!(dispatcher.record_count(), 0);
    }

    #[test]
    fn test_resolve_ineligible_is_not_memoized() {
        let dispatcher = Dispatcher::<EmptyHost>::new();
        let token = dispatcher.register::<Shader>();

        let refusing = Arc::new(EmptyHost { allow_shaders: false });
        let err = resolve(&dispatcher, &refusing, token).unwrap_err();
        assert!(matches!(err, CacheError::IneligibleType { type_name: "Shader", .. }));
        assert_eq!(dispatcher.record_count(), 0);

        let accepting = Arc::new(EmptyHost { allow_shaders: true });
        assert!(resolve(&dispatcher, &accepting, token).is_ok());
        assert_eq!(dispatcher.record_count(), 1);
    }

    #[test]
    fn test_record_closures_validate_paths() {
        let dispatcher = Dispatcher::<EmptyHost>::new();
        let host = Arc::new(EmptyHost { allow_shaders: true });
        let token = dispatcher.register::<String>();
        let record = resolve(&dispatcher, &host, token).unwrap();

        assert!(matches!((record.load)(""), Err(CacheError::InvalidPath { .. })));
        assert!((record.load_async)(" ").is_err());
        assert!((record.load_all)("").is_err());
    }
}
