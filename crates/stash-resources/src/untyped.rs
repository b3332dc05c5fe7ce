//! Type-erased futures and groups for callers that only hold a runtime type.

use std::any::{Any, TypeId};
use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::future::{AssetFuture, CompletionToken};
use crate::storage::AssetGroup;
use crate::{Asset, ErasedAsset};

/// Callback invoked when an untyped future completes.
pub type UntypedCompletedCallback = Box<dyn FnMut(&UntypedAssetFuture) + Send + 'static>;

/// Object-safe view of an [`AssetFuture`].
pub trait ErasedAssetFuture: Send + Sync {
    /// Get the type ID of the asset being loaded.
    fn asset_type_id(&self) -> TypeId;

    /// Get a human-readable name for the asset type.
    fn asset_type_name(&self) -> &'static str;

    /// The loaded asset with its type erased.
    fn value_erased(&self) -> Option<ErasedAsset>;

    /// See [`AssetFuture::is_done`].
    fn is_done(&self) -> bool;

    /// See [`AssetFuture::progress`].
    fn progress(&self) -> f32;

    /// See [`AssetFuture::priority`].
    fn priority(&self) -> i32;

    /// See [`AssetFuture::set_priority`].
    fn set_priority(&self, priority: i32);

    /// See [`AssetFuture::on_completed`].
    fn on_completed_erased(&self, callback: UntypedCompletedCallback) -> CompletionToken;

    /// See [`AssetFuture::remove_completed`].
    fn remove_completed(&self, token: CompletionToken) -> bool;

    /// Poll for the erased value.
    fn poll_erased(&self, cx: &mut Context<'_>) -> Poll<Option<ErasedAsset>>;

    /// Address of the shared future state, identical across clones.
    fn identity(&self) -> *const ();

    /// Clone into a new box sharing the same future.
    fn clone_boxed(&self) -> Box<dyn ErasedAssetFuture>;

    /// Get as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Asset> ErasedAssetFuture for AssetFuture<T> {
    fn asset_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn asset_type_name(&self) -> &'static str {
        T::type_name()
    }

    fn value_erased(&self) -> Option<ErasedAsset> {
        self.value().map(|asset| asset as ErasedAsset)
    }

    fn is_done(&self) -> bool {
        AssetFuture::is_done(self)
    }

    fn progress(&self) -> f32 {
        AssetFuture::progress(self)
    }

    fn priority(&self) -> i32 {
        AssetFuture::priority(self)
    }

    fn set_priority(&self, priority: i32) {
        AssetFuture::set_priority(self, priority);
    }

    fn on_completed_erased(&self, mut callback: UntypedCompletedCallback) -> CompletionToken {
        self.on_completed(move |future| {
            callback(&UntypedAssetFuture::from(future.clone()));
        })
    }

    fn remove_completed(&self, token: CompletionToken) -> bool {
        AssetFuture::remove_completed(self, token)
    }

    fn poll_erased(&self, cx: &mut Context<'_>) -> Poll<Option<ErasedAsset>> {
        let mut future = self.clone();
        Pin::new(&mut future)
            .poll(cx)
            .map(|asset| asset.map(|a| a as ErasedAsset))
    }

    fn identity(&self) -> *const () {
        AssetFuture::identity(self)
    }

    fn clone_boxed(&self) -> Box<dyn ErasedAssetFuture> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An [`AssetFuture`] whose asset type is only known at runtime.
///
/// Returned by the erased entry points of [`ResourceCache`](crate::ResourceCache).
/// Convert back with [`typed`](Self::typed) once the type is known.
pub struct UntypedAssetFuture {
    inner: Box<dyn ErasedAssetFuture>,
}

impl UntypedAssetFuture {
    /// Get the type ID of the asset being loaded.
    pub fn asset_type_id(&self) -> TypeId {
        self.inner.asset_type_id()
    }

    /// Get a human-readable name for the asset type.
    pub fn asset_type_name(&self) -> &'static str {
        self.inner.asset_type_name()
    }

    /// The loaded asset, or `None` while the load is in flight.
    pub fn value(&self) -> Option<ErasedAsset> {
        self.inner.value_erased()
    }

    /// Whether the value is available.
    pub fn is_done(&self) -> bool {
        self.inner.is_done()
    }

    /// Fractional progress in `0.0..=1.0`.
    pub fn progress(&self) -> f32 {
        self.inner.progress()
    }

    /// Scheduling priority of the host request.
    pub fn priority(&self) -> i32 {
        self.inner.priority()
    }

    /// Change the scheduling priority.
    pub fn set_priority(&self, priority: i32) {
        self.inner.set_priority(priority);
    }

    /// Subscribe to completion. Same semantics as [`AssetFuture::on_completed`].
    pub fn on_completed<F>(&self, callback: F) -> CompletionToken
    where
        F: FnMut(&UntypedAssetFuture) + Send + 'static,
    {
        self.inner.on_completed_erased(Box::new(callback))
    }

    /// Remove a subscription. Returns `false` if it was not registered.
    pub fn remove_completed(&self, token: CompletionToken) -> bool {
        self.inner.remove_completed(token)
    }

    /// Try to convert to a typed future.
    ///
    /// Returns `None` if the type doesn't match.
    pub fn typed<T: Asset>(&self) -> Option<AssetFuture<T>> {
        self.inner.as_any().downcast_ref::<AssetFuture<T>>().cloned()
    }

    /// Whether both handles refer to the same future.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.inner.identity(), other.inner.identity())
    }
}

impl Clone for UntypedAssetFuture {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_boxed(),
        }
    }
}

impl fmt::Debug for UntypedAssetFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UntypedAssetFuture")
            .field("type", &self.asset_type_name())
            .field("done", &self.is_done())
            .finish()
    }
}

impl<T: Asset> From<AssetFuture<T>> for UntypedAssetFuture {
    fn from(future: AssetFuture<T>) -> Self {
        Self {
            inner: Box::new(future),
        }
    }
}

impl Future for UntypedAssetFuture {
    type Output = Option<ErasedAsset>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_erased(cx)
    }
}

/// A load-all or find-all result whose asset type is only known at runtime.
///
/// Keeps the typed group alive, so the cache keeps answering from it for as
/// long as this value exists, exactly as it would for the typed group.
#[derive(Clone)]
pub struct UntypedAssetGroup {
    typed: Arc<dyn Any + Send + Sync>,
    items: Arc<[ErasedAsset]>,
    type_name: &'static str,
}

impl UntypedAssetGroup {
    /// Number of assets in the group.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the group is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get a human-readable name for the asset type.
    pub fn asset_type_name(&self) -> &'static str {
        self.type_name
    }

    /// Try to recover the typed group.
    ///
    /// Returns `None` if the type doesn't match.
    pub fn typed<T: Asset>(&self) -> Option<AssetGroup<T>> {
        self.typed.downcast_ref::<AssetGroup<T>>().cloned()
    }
}

impl<T: Asset> From<AssetGroup<T>> for UntypedAssetGroup {
    fn from(group: AssetGroup<T>) -> Self {
        let items = group
            .iter()
            .map(|asset| Arc::clone(asset) as ErasedAsset)
            .collect();
        Self {
            typed: Arc::new(group),
            items,
            type_name: T::type_name(),
        }
    }
}

impl Deref for UntypedAssetGroup {
    type Target = [ErasedAsset];

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl fmt::Debug for UntypedAssetGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UntypedAssetGroup")
            .field("type", &self.type_name)
            .field("len", &self.items.len())
            .finish()
    }
}
