//! The host asset store the cache sits in front of.
//!
//! The cache never decodes anything itself. Every miss is forwarded to an
//! [`AssetHost`], which owns the real assets and decides when they are freed.

use std::sync::Arc;

use crate::dispatch::TypeToken;
use crate::{Asset, ErasedAsset};

/// Callback invoked by the host when an async request finishes.
pub type RequestCallback<T> = Box<dyn FnOnce(Option<Arc<T>>) + Send + 'static>;

/// Callback invoked by the host when an operation finishes.
pub type OperationCallback = Box<dyn FnOnce() + Send + 'static>;

/// An in-flight asynchronous load owned by the host.
///
/// Requests cannot be cancelled; once issued they run to completion.
pub trait HostRequest<T: Asset>: Send + Sync {
    /// Whether the load has finished.
    fn is_done(&self) -> bool;

    /// Fractional progress in `0.0..=1.0`.
    fn progress(&self) -> f32;

    /// Scheduling priority of the request.
    fn priority(&self) -> i32;

    /// Change the scheduling priority of the request.
    fn set_priority(&self, priority: i32);

    /// The loaded asset, or `None` while loading or if the asset is missing.
    fn result(&self) -> Option<Arc<T>>;

    /// Subscribe to completion.
    ///
    /// Hosts deliver the callback exactly once, immediately if the request has
    /// already completed.
    fn on_completed(&self, callback: RequestCallback<T>);
}

/// A host operation without a result, such as reclaiming unused assets.
pub trait HostOperation: Send + Sync {
    /// Whether the operation has finished.
    fn is_done(&self) -> bool;

    /// Fractional progress in `0.0..=1.0`.
    fn progress(&self) -> f32;

    /// Subscribe to completion, delivered exactly once.
    fn on_completed(&self, callback: OperationCallback);
}

/// The external asset store.
///
/// A missing asset is reported as `None` or an empty sequence, never as an
/// error.
///
/// # Example
///
/// ```ignore
/// struct EngineHost { /* ... */ }
///
/// impl AssetHost for EngineHost {
///     fn load<T: Asset>(&self, path: &str) -> Option<Arc<T>> {
///         self.resources.load(path)
///     }
///     // ...
/// }
/// ```
pub trait AssetHost: Send + Sync + 'static {
    /// Load an asset synchronously, blocking until it is available.
    fn load<T: Asset>(&self, path: &str) -> Option<Arc<T>>;

    /// Start an asynchronous load.
    fn load_async<T: Asset>(&self, path: &str) -> Box<dyn HostRequest<T>>;

    /// Load every asset of type `T` found under a directory path.
    fn load_all<T: Asset>(&self, path: &str) -> Vec<Arc<T>>;

    /// Every live asset of type `T`, loaded through any path.
    fn find_all_of_type<T: Asset>(&self) -> Vec<Arc<T>>;

    /// Release a single asset.
    fn unload_asset(&self, asset: &ErasedAsset);

    /// Free every asset nothing references any more.
    fn unload_unused_assets(&self) -> Box<dyn HostOperation>;

    /// Whether this host can load the given type at all.
    ///
    /// Consulted once when a runtime type token is first bound.
    fn supports_type(&self, _token: TypeToken) -> bool {
        true
    }
}
