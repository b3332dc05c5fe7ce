//! Future state machine.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::Asset;
use crate::host::HostRequest;
use crate::storage::TypedCache;

/// Where an [`AssetFuture`](crate::AssetFuture) gets its value from.
pub(crate) enum FutureState<T: Asset> {
    /// Resolved at construction time, from a live cache entry.
    Ready(Option<Arc<T>>),

    /// Waiting on a host request.
    Pending {
        /// Path the request was issued for.
        path: String,
        /// The host's in-flight handle.
        request: Arc<dyn HostRequest<T>>,
        /// The cache that issued the request, used for read-through.
        cache: Weak<TypedCache<T>>,
    },
}

impl<T: Asset> FutureState<T> {
    /// Returns `true` if the state was resolved at construction.
    pub(crate) fn is_ready(&self) -> bool {
        matches!(self, FutureState::Ready(_))
    }

    /// The path of a pending request.
    pub(crate) fn path(&self) -> Option<&str> {
        match self {
            FutureState::Ready(_) => None,
            FutureState::Pending { path, .. } => Some(path),
        }
    }
}

impl<T: Asset> fmt::Debug for FutureState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FutureState::Ready(asset) => f
                .debug_tuple("Ready")
                .field(&asset.as_ref().map(|_| T::type_name()))
                .finish(),
            FutureState::Pending { path, request, .. } => f
                .debug_struct("Pending")
                .field("path", path)
                .field("done", &request.is_done())
                .finish(),
        }
    }
}

/// Observable load state of a future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// The host is still loading.
    Loading,

    /// The asset is available.
    Loaded,

    /// The host finished but has no asset at that path.
    Missing,
}

impl LoadState {
    /// Returns true if loading has finished, with or without an asset.
    pub fn is_done(&self) -> bool {
        matches!(self, LoadState::Loaded | LoadState::Missing)
    }
}

impl<T> From<Option<&Option<Arc<T>>>> for LoadState {
    fn from(resolved: Option<&Option<Arc<T>>>) -> Self {
        match resolved {
            None => LoadState::Loading,
            Some(Some(_)) => LoadState::Loaded,
            Some(None) => LoadState::Missing,
        }
    }
}
