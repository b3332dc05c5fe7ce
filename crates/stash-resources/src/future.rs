//! One handle for assets that are already loaded and assets still loading.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use crate::Asset;
use crate::host::HostRequest;
use crate::state::{FutureState, LoadState};
use crate::storage::TypedCache;

/// Identifies a completion subscription so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompletionToken(u64);

/// Callback invoked when a future completes.
pub type CompletedCallback<T> = Box<dyn FnMut(&AssetFuture<T>) + Send + 'static>;

struct Shared<T: Asset> {
    /// `Some` once the value is known; the inner `None` means missing.
    resolved: Option<Option<Arc<T>>>,
    /// Whether subscribers have been notified.
    delivered: bool,
    subscribers: Vec<(CompletionToken, CompletedCallback<T>)>,
    wakers: Vec<Waker>,
    next_token: u64,
}

struct Inner<T: Asset> {
    state: FutureState<T>,
    shared: Mutex<Shared<T>>,
}

/// A possibly-pending asset load.
///
/// Futures are cheap to clone; clones share state. The cache hands the same
/// future to every caller that requests a path while its load is in flight,
/// which can be checked with [`AssetFuture::ptr_eq`].
///
/// Besides polling ([`is_done`](Self::is_done), [`progress`](Self::progress))
/// and callbacks ([`on_completed`](Self::on_completed)), a future can be
/// `.await`ed.
///
/// # Example
///
/// ```ignore
/// let future = cache.load_async::<Texture>("icons/b")?;
///
/// // In update loop:
/// if future.is_done() {
///     let texture = future.value();
/// }
/// ```
pub struct AssetFuture<T: Asset> {
    inner: Arc<Inner<T>>,
}

impl<T: Asset> AssetFuture<T> {
    /// Create a future that is resolved from the start.
    pub fn ready(asset: Option<Arc<T>>) -> Self {
        Self::from_state(FutureState::Ready(asset))
    }

    pub(crate) fn pending(
        path: &str,
        request: Arc<dyn HostRequest<T>>,
        cache: Weak<TypedCache<T>>,
    ) -> Self {
        Self::from_state(FutureState::Pending {
            path: path.to_string(),
            request,
            cache,
        })
    }

    fn from_state(state: FutureState<T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state,
                shared: Mutex::new(Shared {
                    resolved: None,
                    delivered: false,
                    subscribers: Vec::new(),
                    wakers: Vec::new(),
                    next_token: 0,
                }),
            }),
        }
    }

    /// The loaded asset, or `None` while the load is in flight.
    ///
    /// Never blocks. Once the host request reports done, the result is read
    /// through the owning cache so it becomes the same value synchronous loads
    /// return, and it is memoized on the future.
    pub fn value(&self) -> Option<Arc<T>> {
        match &self.inner.state {
            FutureState::Ready(asset) => asset.clone(),
            FutureState::Pending {
                path,
                request,
                cache,
            } => {
                let resolved = self.inner.shared.lock().resolved.clone();
                if let Some(asset) = resolved {
                    return asset;
                }
                if !request.is_done() {
                    return None;
                }

                let result = request.result();
                let asset = match cache.upgrade() {
                    Some(cache) => cache.promote(path, result),
                    None => result,
                };
                self.inner
                    .shared
                    .lock()
                    .resolved
                    .get_or_insert(asset)
                    .clone()
            }
        }
    }

    /// Whether the value is available.
    pub fn is_done(&self) -> bool {
        match &self.inner.state {
            FutureState::Ready(_) => true,
            FutureState::Pending { request, .. } => {
                self.inner.shared.lock().resolved.is_some() || request.is_done()
            }
        }
    }

    /// Fractional progress in `0.0..=1.0`.
    pub fn progress(&self) -> f32 {
        match &self.inner.state {
            FutureState::Ready(_) => 1.0,
            FutureState::Pending { request, .. } => {
                if self.inner.shared.lock().resolved.is_some() {
                    1.0
                } else {
                    request.progress()
                }
            }
        }
    }

    /// Scheduling priority of the host request; `0` when already resolved.
    pub fn priority(&self) -> i32 {
        match &self.inner.state {
            FutureState::Ready(_) => 0,
            FutureState::Pending { request, .. } => request.priority(),
        }
    }

    /// Change the scheduling priority. Does nothing when already resolved.
    pub fn set_priority(&self, priority: i32) {
        if let FutureState::Pending { request, .. } = &self.inner.state {
            request.set_priority(priority);
        }
    }

    /// Current load state.
    pub fn load_state(&self) -> LoadState {
        if !self.is_done() {
            return LoadState::Loading;
        }
        match self.value() {
            Some(_) => LoadState::Loaded,
            None => LoadState::Missing,
        }
    }

    /// The path of the host request, if this future was issued for one.
    pub fn path(&self) -> Option<&str> {
        self.inner.state.path()
    }

    /// Subscribe to completion.
    ///
    /// Once the value is known (a ready future, or a pending one whose result
    /// was delivered or read through) `callback` is invoked right away and is
    /// not registered, so removing its token returns `false`.
    ///
    /// While the load is in flight `callback` is invoked right away *and*
    /// registered, so it runs a second time when the load completes. Check
    /// [`is_done`](Self::is_done) inside the callback to tell the two apart.
    pub fn on_completed<F>(&self, callback: F) -> CompletionToken
    where
        F: FnMut(&AssetFuture<T>) + Send + 'static,
    {
        let mut callback: CompletedCallback<T> = Box::new(callback);
        let (token, resolved) = {
            let mut shared = self.inner.shared.lock();
            let resolved = self.inner.state.is_ready() || shared.resolved.is_some();
            (next_token(&mut shared), resolved)
        };

        callback(self);
        if resolved {
            return token;
        }

        let mut shared = self.inner.shared.lock();
        if !shared.delivered {
            shared.subscribers.push((token, callback));
            return token;
        }
        drop(shared);

        // Completed while the first invocation ran.
        callback(self);
        token
    }

    /// Remove a subscription. Returns `false` if it was not registered.
    pub fn remove_completed(&self, token: CompletionToken) -> bool {
        let mut shared = self.inner.shared.lock();
        let before = shared.subscribers.len();
        shared.subscribers.retain(|(t, _)| *t != token);
        shared.subscribers.len() != before
    }

    /// Number of registered completion callbacks.
    pub fn subscriber_count(&self) -> usize {
        self.inner.shared.lock().subscribers.len()
    }

    /// Whether both handles refer to the same future.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn identity(&self) -> *const () {
        Arc::as_ptr(&self.inner).cast()
    }

    /// Deliver the completion: memoize the value, wake tasks and notify
    /// subscribers. Later calls do nothing.
    pub(crate) fn complete(&self, asset: Option<Arc<T>>) {
        let (subscribers, wakers) = {
            let mut shared = self.inner.shared.lock();
            if shared.delivered {
                return;
            }
            shared.delivered = true;
            shared.resolved.get_or_insert(asset);
            (
                std::mem::take(&mut shared.subscribers),
                std::mem::take(&mut shared.wakers),
            )
        };

        for waker in wakers {
            waker.wake();
        }
        for (_, mut callback) in subscribers {
            callback(self);
        }
    }
}

fn next_token<T: Asset>(shared: &mut Shared<T>) -> CompletionToken {
    let token = CompletionToken(shared.next_token);
    shared.next_token += 1;
    token
}

impl<T: Asset> Clone for AssetFuture<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Asset> fmt::Debug for AssetFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetFuture")
            .field("type", &T::type_name())
            .field("state", &self.inner.state)
            .finish()
    }
}

impl<T: Asset> Future for AssetFuture<T> {
    type Output = Option<Arc<T>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.is_done() {
            return Poll::Ready(self.value());
        }

        {
            let mut shared = self.inner.shared.lock();
            if !shared.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                shared.wakers.push(cx.waker().clone());
            }
        }

        // The request may have finished while the waker was registered.
        if self.is_done() {
            Poll::Ready(self.value())
        } else {
            Poll::Pending
        }
    }
}
