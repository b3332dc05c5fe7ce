//! Invalidation after the host reclaims unused assets.
//!
//! Weak entries already stop matching once their asset is freed; sweeping
//! removes the dead slots themselves so the tables do not grow without bound.

use std::ops::AddAssign;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Something that can drop its dead cache slots.
pub trait Sweep: Send + Sync {
    /// Name of the asset type the cache holds.
    fn asset_type_name(&self) -> &'static str;

    /// Remove every slot whose asset has been freed.
    fn sweep(&self) -> SweepStats;
}

/// Outcome of a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Number of typed caches swept.
    pub caches: usize,
    /// Dead single-asset slots removed.
    pub entries_removed: usize,
    /// Dead load-all and find-all slots removed.
    pub groups_removed: usize,
    /// Single-asset slots still present afterwards.
    pub entries_kept: usize,
    /// In-flight loads, which sweeps never touch.
    pub pending_kept: usize,
}

impl SweepStats {
    /// Total number of slots removed.
    pub fn removed(&self) -> usize {
        self.entries_removed + self.groups_removed
    }
}

impl AddAssign for SweepStats {
    fn add_assign(&mut self, other: Self) {
        self.caches += other.caches;
        self.entries_removed += other.entries_removed;
        self.groups_removed += other.groups_removed;
        self.entries_kept += other.entries_kept;
        self.pending_kept += other.pending_kept;
    }
}

/// Identifies a listener so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&SweepStats) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, Listener)>,
}

/// Event that sweeps every typed cache.
///
/// Caches register themselves when they are created and are held weakly, so
/// dropping a cache unregisters it. Fired after the host finishes reclaiming
/// unused assets; sweeps are independent and run in no particular order.
#[derive(Default)]
pub struct InvalidationHook {
    targets: Mutex<Vec<Weak<dyn Sweep>>>,
    listeners: Mutex<Listeners>,
}

impl InvalidationHook {
    /// Create a hook with no targets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cache to every future sweep.
    pub fn register(&self, target: &Arc<dyn Sweep>) {
        self.targets.lock().push(Arc::downgrade(target));
    }

    /// Number of caches still alive and registered.
    pub fn target_count(&self) -> usize {
        self.targets
            .lock()
            .iter()
            .filter(|t| t.strong_count() > 0)
            .count()
    }

    /// Be told about every completed sweep.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SweepStats) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.lock();
        let id = ListenerId(listeners.next_id);
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.entries.len();
        listeners.entries.retain(|(l, _)| *l != id);
        listeners.entries.len() != before
    }

    /// Sweep every registered cache, then notify listeners.
    pub fn fire(&self) -> SweepStats {
        let targets: Vec<Arc<dyn Sweep>> = {
            let mut targets = self.targets.lock();
            targets.retain(|t| t.strong_count() > 0);
            targets.iter().filter_map(Weak::upgrade).collect()
        };

        let mut total = SweepStats::default();
        for target in &targets {
            let stats = target.sweep();
            tracing::trace!(
                "Swept {}: {} slots removed",
                target.asset_type_name(),
                stats.removed()
            );
            total += stats;
        }

        tracing::debug!(
            "Invalidation sweep: {} caches, {} entries and {} groups removed",
            total.caches,
            total.entries_removed,
            total.groups_removed
        );

        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .entries
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(&total);
        }

        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSweep {
        name: &'static str,
        sweeps: AtomicUsize,
    }

    impl Sweep for CountingSweep {
        fn asset_type_name(&self) -> &'static str {
            self.name
        }

        fn sweep(&self) -> SweepStats {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            SweepStats {
                caches: 1,
                entries_removed: 2,
                ..Default::default()
            }
        }
    }

    fn counting(name: &'static str) -> Arc<CountingSweep> {
        Arc::new(CountingSweep {
            name,
            sweeps: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_fire_sweeps_every_target() {
        let hook = InvalidationHook::new();
        let a = counting("A");
        let b = counting("B");
        hook.register(&(a.clone() as Arc<dyn Sweep>));
        hook.register(&(b.clone() as Arc<dyn Sweep>));

        let stats = hook.fire();

        assert_eq!(a.sweeps.load(Ordering::SeqCst), 1);
        assert_eq!(b.sweeps.load(Ordering::SeqCst), 1);
        assert_eq!(stats.caches, 2);
        assert_eq!(stats.entries_removed, 4);
        assert_eq!(stats.removed(), 4);
    }

    #[test]
    fn test_dropped_targets_are_forgotten() {
        let hook = InvalidationHook::new();
        let a = counting("A");
        hook.register(&(a.clone() as Arc<dyn Sweep>));
        assert_eq!(hook.target_count(), 1);

        drop(a);
        assert_eq!(hook.target_count(), 0);
        assert_eq!(hook.fire().caches, 0);
    }

    #[test]
    fn test_listeners_receive_totals() {
        let hook = InvalidationHook::new();
        let a = counting("A");
        hook.register(&(a.clone() as Arc<dyn Sweep>));

        let seen = Arc::new(AtomicUsize::new(0));
        let sink = seen.clone();
        let id = hook.subscribe(move |stats| {
            sink.fetch_add(stats.entries_removed, Ordering::SeqCst);
        });

        hook.fire();
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        assert!(hook.unsubscribe(id));
        assert!(!hook.unsubscribe(id));
        hook.fire();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
