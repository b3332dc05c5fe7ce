//! Stash Resources
//!
//! A caching proxy that sits in front of a host asset store. Loaded assets are
//! memoized per `(type, path)` and held only through weak references, so the
//! cache never keeps an asset alive past the host's own liveness decision.
//!
//! The entry point is [`ResourceCache`], which wraps an [`AssetHost`]:
//!
//! ```ignore
//! let cache = ResourceCache::new(host);
//!
//! // Synchronous, memoized
//! let icon: Option<Arc<Texture>> = cache.load("icons/a")?;
//!
//! // Asynchronous, de-duplicated per path
//! let pending = cache.load_async::<Texture>("icons/b")?;
//! pending.on_completed(|fut| println!("loaded: {:?}", fut.value()));
//!
//! // Runtime type tokens go through the dispatcher
//! let token = cache.token_by_name("Texture")?;
//! let erased = cache.load_erased("icons/a", token)?;
//!
//! // Reclaim and sweep dead entries
//! cache.unload_unused_assets();
//! ```

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod future;
pub mod host;
pub mod invalidation;
pub mod state;
pub mod storage;
pub mod untyped;

use std::any::Any;
use std::sync::Arc;

pub use cache::ResourceCache;
pub use config::CacheConfig;
pub use dispatch::{DispatchRecord, TypeToken};
pub use error::{CacheError, CacheResult};
pub use future::{AssetFuture, CompletionToken};
pub use host::{AssetHost, HostOperation, HostRequest};
pub use invalidation::{InvalidationHook, ListenerId, SweepStats};
pub use state::LoadState;
pub use storage::{AssetGroup, TypedCache};
pub use untyped::{UntypedAssetFuture, UntypedAssetGroup};

/// Marker trait for types the host can load.
pub trait Asset: Send + Sync + 'static {
    /// Name used for logging and for resolving runtime type names.
    fn type_name() -> &'static str;
}

impl Asset for String {
    fn type_name() -> &'static str {
        "String"
    }
}

impl Asset for Vec<u8> {
    fn type_name() -> &'static str {
        "Bytes"
    }
}

/// A loaded asset with its type erased.
///
/// Shares its allocation with the typed `Arc<T>`, so holding an erased asset
/// keeps the cached entry alive exactly like the typed one would.
pub type ErasedAsset = Arc<dyn Any + Send + Sync>;

/// Erase the type of a loaded asset.
pub fn erase<T: Asset>(asset: Arc<T>) -> ErasedAsset {
    asset
}

/// Recover the typed asset from an erased one.
pub fn downcast<T: Asset>(asset: ErasedAsset) -> CacheResult<Arc<T>> {
    asset.downcast::<T>().map_err(|asset| CacheError::TypeMismatch {
        expected: T::type_name(),
        actual: (*asset).type_id(),
    })
}

/// Commonly used items.
pub mod prelude {
    pub use crate::{
        Asset, AssetFuture, AssetGroup, AssetHost, CacheConfig, CacheError, CacheResult,
        ErasedAsset, LoadState, ResourceCache, TypeToken, UntypedAssetFuture, UntypedAssetGroup,
        downcast, erase,
    };
}
