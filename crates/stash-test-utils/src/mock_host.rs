//! Mock implementation of AssetHost for testing.
//!
//! Assets are produced by factories registered per `(type, path)` and stay
//! resident until reclaimed, mirroring how an engine owns what it loads.

use std::any::TypeId;
use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use stash_resources::host::{OperationCallback, RequestCallback};
use stash_resources::{Asset, AssetHost, ErasedAsset, HostOperation, HostRequest, TypeToken};

/// Records a host call for verification in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Load {
        type_name: &'static str,
        path: String,
    },
    LoadAsync {
        type_name: &'static str,
        path: String,
    },
    LoadAll {
        type_name: &'static str,
        path: String,
    },
    FindAllOfType {
        type_name: &'static str,
    },
    UnloadAsset {
        type_id: TypeId,
    },
    UnloadUnusedAssets,
}

type Key = (TypeId, String);
type Factory = Arc<dyn Fn() -> ErasedAsset + Send + Sync>;

#[derive(Default)]
struct HostState {
    factories: BTreeMap<Key, Factory>,
    residents: BTreeMap<Key, ErasedAsset>,
}

/// A pending async load with its asset type erased.
trait PendingLoad: Send + Sync {
    fn path(&self) -> &str;

    /// Produce the result without telling subscribers.
    fn resolve(&self, host: &MockAssetHost);

    /// Tell subscribers. Resolves first if needed.
    fn deliver(&self, host: &MockAssetHost);

    fn priority(&self) -> i32;

    fn set_progress(&self, progress: f32);
}

struct RequestInner<T: Asset> {
    done: bool,
    delivered: bool,
    progress: f32,
    priority: i32,
    result: Option<Arc<T>>,
    callbacks: Vec<RequestCallback<T>>,
}

struct RequestState<T: Asset> {
    path: String,
    inner: Mutex<RequestInner<T>>,
}

impl<T: Asset> PendingLoad for RequestState<T> {
    fn path(&self) -> &str {
        &self.path
    }

    fn resolve(&self, host: &MockAssetHost) {
        if self.inner.lock().done {
            return;
        }
        let result = host.materialize::<T>(&self.path);

        let mut inner = self.inner.lock();
        if !inner.done {
            inner.done = true;
            inner.progress = 1.0;
            inner.result = result;
        }
    }

    fn deliver(&self, host: &MockAssetHost) {
        self.resolve(host);

        let (callbacks, result) = {
            let mut inner = self.inner.lock();
            if inner.delivered {
                return;
            }
            inner.delivered = true;
            (std::mem::take(&mut inner.callbacks), inner.result.clone())
        };

        tracing::trace!(
            "Mock host completed {} '{}' (found: {})",
            T::type_name(),
            self.path,
            result.is_some()
        );
        for callback in callbacks {
            callback(result.clone());
        }
    }

    fn priority(&self) -> i32 {
        self.inner.lock().priority
    }

    fn set_progress(&self, progress: f32) {
        let mut inner = self.inner.lock();
        if !inner.done {
            inner.progress = progress.clamp(0.0, 1.0);
        }
    }
}

struct MockRequest<T: Asset>(Arc<RequestState<T>>);

impl<T: Asset> HostRequest<T> for MockRequest<T> {
    fn is_done(&self) -> bool {
        self.0.inner.lock().done
    }

    fn progress(&self) -> f32 {
        self.0.inner.lock().progress
    }

    fn priority(&self) -> i32 {
        self.0.inner.lock().priority
    }

    fn set_priority(&self, priority: i32) {
        self.0.inner.lock().priority = priority;
    }

    fn result(&self) -> Option<Arc<T>> {
        let inner = self.0.inner.lock();
        if inner.done { inner.result.clone() } else { None }
    }

    fn on_completed(&self, callback: RequestCallback<T>) {
        let mut inner = self.0.inner.lock();
        if inner.delivered {
            let result = inner.result.clone();
            drop(inner);
            callback(result);
        } else {
            inner.callbacks.push(callback);
        }
    }
}

#[derive(Default)]
struct OperationState {
    done: bool,
    callbacks: Vec<OperationCallback>,
}

#[derive(Default)]
struct SharedOperation(Mutex<OperationState>);

impl SharedOperation {
    fn finish(&self) {
        let callbacks = {
            let mut state = self.0.lock();
            if state.done {
                return;
            }
            state.done = true;
            std::mem::take(&mut state.callbacks)
        };
        for callback in callbacks {
            callback();
        }
    }
}

struct MockOperation(Arc<SharedOperation>);

impl HostOperation for MockOperation {
    fn is_done(&self) -> bool {
        self.0.0.lock().done
    }

    fn progress(&self) -> f32 {
        if self.is_done() { 1.0 } else { 0.0 }
    }

    fn on_completed(&self, callback: OperationCallback) {
        let mut state = self.0.0.lock();
        if state.done {
            drop(state);
            callback();
        } else {
            state.callbacks.push(callback);
        }
    }
}

/// Mock implementation of [`AssetHost`] for testing.
///
/// # Example
///
/// ```rust
/// use stash_resources::ResourceCache;
/// use stash_test_utils::MockAssetHost;
///
/// let host = MockAssetHost::new();
/// host.add_asset("levels/one", String::from("first"));
///
/// let cache = ResourceCache::new(host);
/// let future = cache.load_async::<String>("levels/one").unwrap();
/// assert!(!future.is_done());
///
/// cache.host().complete("levels/one");
/// assert_eq!(future.value().as_deref().map(String::as_str), Some("first"));
/// ```
#[derive(Default)]
pub struct MockAssetHost {
    /// Recorded calls for verification
    calls: Mutex<Vec<HostCall>>,

    /// Factories and resident assets
    state: Mutex<HostState>,

    /// Async loads waiting for `complete`
    pending: Mutex<Vec<Arc<dyn PendingLoad>>>,

    /// Reclamations waiting for `complete_unloads`
    unloads: Mutex<Vec<Arc<SharedOperation>>>,

    /// Types `supports_type` refuses
    denied: Mutex<Vec<TypeId>>,

    /// Finish async work before returning it
    auto_complete: Mutex<bool>,
}

impl MockAssetHost {
    /// Create an empty mock host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `path` loadable as `T`. Each instantiation clones `value`.
    pub fn add_asset<T: Asset + Clone>(&self, path: &str, value: T) {
        self.add_asset_with(path, move || value.clone());
    }

    /// Make `path` loadable as `T`, built by `factory` whenever the asset is
    /// not resident.
    pub fn add_asset_with<T, F>(&self, path: &str, factory: F)
    where
        T: Asset,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move || Arc::new(factory()) as ErasedAsset);
        self.state
            .lock()
            .factories
            .insert((TypeId::of::<T>(), path.to_string()), factory);
    }

    /// Stop `path` from being loadable as `T`. Resident instances stay.
    pub fn remove_asset<T: Asset>(&self, path: &str) -> bool {
        self.state
            .lock()
            .factories
            .remove(&(TypeId::of::<T>(), path.to_string()))
            .is_some()
    }

    /// Make `supports_type` refuse `T`.
    pub fn deny_type<T: Asset>(&self) {
        self.denied.lock().push(TypeId::of::<T>());
    }

    /// When on, async loads and reclamation finish before they are returned.
    pub fn set_auto_complete(&self, enabled: bool) {
        *self.auto_complete.lock() = enabled;
    }

    // ---- Call log ----

    /// Get a copy of all recorded calls (for test assertions).
    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    /// Clear recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Count synchronous loads.
    pub fn count_loads(&self) -> usize {
        self.count(|call| matches!(call, HostCall::Load { .. }))
    }

    /// Count synchronous loads of one path.
    pub fn count_loads_of(&self, path: &str) -> usize {
        self.count(|call| matches!(call, HostCall::Load { path: p, .. } if p == path))
    }

    /// Count async requests issued.
    pub fn count_async_loads(&self) -> usize {
        self.count(|call| matches!(call, HostCall::LoadAsync { .. }))
    }

    /// Count load-all calls.
    pub fn count_load_alls(&self) -> usize {
        self.count(|call| matches!(call, HostCall::LoadAll { .. }))
    }

    /// Count find-all-of-type calls.
    pub fn count_find_alls(&self) -> usize {
        self.count(|call| matches!(call, HostCall::FindAllOfType { .. }))
    }

    /// Count single-asset unloads.
    pub fn count_unload_assets(&self) -> usize {
        self.count(|call| matches!(call, HostCall::UnloadAsset { .. }))
    }

    /// Count reclamation requests.
    pub fn count_unload_unused(&self) -> usize {
        self.count(|call| matches!(call, HostCall::UnloadUnusedAssets))
    }

    fn count(&self, predicate: impl Fn(&HostCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().push(call);
    }

    // ---- Async control ----

    /// Finish every pending load of `path` and run its callbacks.
    ///
    /// Returns the number of requests completed.
    pub fn complete(&self, path: &str) -> usize {
        let ready: Vec<Arc<dyn PendingLoad>> = {
            let mut pending = self.pending.lock();
            let (ready, rest) = pending.drain(..).partition(|load| load.path() == path);
            *pending = rest;
            ready
        };
        for load in &ready {
            load.deliver(self);
        }
        ready.len()
    }

    /// Finish every pending load.
    pub fn complete_all(&self) -> usize {
        let ready: Vec<Arc<dyn PendingLoad>> = self.pending.lock().drain(..).collect();
        for load in &ready {
            load.deliver(self);
        }
        ready.len()
    }

    /// Make pending loads of `path` report done without running callbacks.
    ///
    /// The callbacks still run on the next [`complete`](Self::complete).
    pub fn resolve_silently(&self, path: &str) -> bool {
        let matching: Vec<Arc<dyn PendingLoad>> = self
            .pending
            .lock()
            .iter()
            .filter(|load| load.path() == path)
            .cloned()
            .collect();
        for load in &matching {
            load.resolve(self);
        }
        !matching.is_empty()
    }

    /// Set the progress of pending loads of `path`.
    pub fn set_progress(&self, path: &str, progress: f32) {
        for load in self.pending.lock().iter().filter(|l| l.path() == path) {
            load.set_progress(progress);
        }
    }

    /// Priority of the first pending load of `path`.
    pub fn pending_priority(&self, path: &str) -> Option<i32> {
        self.pending
            .lock()
            .iter()
            .find(|load| load.path() == path)
            .map(|load| load.priority())
    }

    /// Number of async loads not yet completed.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Free every resident asset nothing else references, then finish every
    /// pending reclamation.
    ///
    /// Returns the number of assets freed.
    pub fn complete_unloads(&self) -> usize {
        let operations: Vec<Arc<SharedOperation>> = self.unloads.lock().drain(..).collect();
        if operations.is_empty() {
            return 0;
        }
        let freed = self.reclaim();
        for operation in &operations {
            operation.finish();
        }
        freed
    }

    // ---- Residency ----

    /// Number of assets the host currently keeps alive.
    pub fn resident_count(&self) -> usize {
        self.state.lock().residents.len()
    }

    /// Whether `path` is currently resident as `T`.
    pub fn is_resident<T: Asset>(&self, path: &str) -> bool {
        self.state
            .lock()
            .residents
            .contains_key(&(TypeId::of::<T>(), path.to_string()))
    }

    fn reclaim(&self) -> usize {
        let freed: Vec<ErasedAsset> = {
            let mut state = self.state.lock();
            let (unused, used): (BTreeMap<Key, ErasedAsset>, BTreeMap<Key, ErasedAsset>) =
                std::mem::take(&mut state.residents)
                    .into_iter()
                    .partition(|(_, asset)| Arc::strong_count(asset) == 1);
            state.residents = used;
            unused.into_values().collect()
        };
        tracing::debug!("Mock host freed {} unused assets", freed.len());
        freed.len()
    }

    /// Get the resident instance of `path`, building it if a factory exists.
    fn materialize<T: Asset>(&self, path: &str) -> Option<Arc<T>> {
        let key = (TypeId::of::<T>(), path.to_string());
        let mut state = self.state.lock();
        if let Some(asset) = state.residents.get(&key) {
            return Arc::clone(asset).downcast::<T>().ok();
        }
        let asset = (state.factories.get(&key)?)();
        state.residents.insert(key, Arc::clone(&asset));
        asset.downcast::<T>().ok()
    }
}

impl AssetHost for MockAssetHost {
    fn load<T: Asset>(&self, path: &str) -> Option<Arc<T>> {
        self.record(HostCall::Load {
            type_name: T::type_name(),
            path: path.to_string(),
        });
        self.materialize::<T>(path)
    }

    fn load_async<T: Asset>(&self, path: &str) -> Box<dyn HostRequest<T>> {
        self.record(HostCall::LoadAsync {
            type_name: T::type_name(),
            path: path.to_string(),
        });

        let state = Arc::new(RequestState::<T> {
            path: path.to_string(),
            inner: Mutex::new(RequestInner {
                done: false,
                delivered: false,
                progress: 0.0,
                priority: 0,
                result: None,
                callbacks: Vec::new(),
            }),
        });

        if *self.auto_complete.lock() {
            state.deliver(self);
        } else {
            self.pending.lock().push(state.clone());
        }
        Box::new(MockRequest(state))
    }

    fn load_all<T: Asset>(&self, path: &str) -> Vec<Arc<T>> {
        self.record(HostCall::LoadAll {
            type_name: T::type_name(),
            path: path.to_string(),
        });

        let prefix = format!("{}/", path.trim_end_matches('/'));
        let paths: Vec<String> = self
            .state
            .lock()
            .factories
            .keys()
            .filter(|(id, p)| *id == TypeId::of::<T>() && p.starts_with(&prefix))
            .map(|(_, p)| p.clone())
            .collect();
        paths.iter().filter_map(|p| self.materialize::<T>(p)).collect()
    }

    fn find_all_of_type<T: Asset>(&self) -> Vec<Arc<T>> {
        self.record(HostCall::FindAllOfType {
            type_name: T::type_name(),
        });

        self.state
            .lock()
            .residents
            .iter()
            .filter(|((id, _), _)| *id == TypeId::of::<T>())
            .filter_map(|(_, asset)| Arc::clone(asset).downcast::<T>().ok())
            .collect()
    }

    fn unload_asset(&self, asset: &ErasedAsset) {
        self.record(HostCall::UnloadAsset {
            type_id: (**asset).type_id(),
        });

        let target = Arc::as_ptr(asset) as *const ();
        self.state
            .lock()
            .residents
            .retain(|_, resident| Arc::as_ptr(resident) as *const () != target);
    }

    fn unload_unused_assets(&self) -> Box<dyn HostOperation> {
        self.record(HostCall::UnloadUnusedAssets);

        let operation = Arc::new(SharedOperation::default());
        if *self.auto_complete.lock() {
            self.reclaim();
            operation.finish();
        } else {
            self.unloads.lock().push(Arc::clone(&operation));
        }
        Box::new(MockOperation(operation))
    }

    fn supports_type(&self, token: TypeToken) -> bool {
        !self.denied.lock().contains(&token.type_id())
    }
}

impl std::fmt::Debug for MockAssetHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockAssetHost")
            .field("calls", &self.calls.lock().len())
            .field("residents", &self.resident_count())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}
