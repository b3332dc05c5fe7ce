/// Configuration for a [`ResourceCache`](crate::ResourceCache).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Sweep every typed cache when the host finishes
    /// [`unload_unused_assets`](crate::ResourceCache::unload_unused_assets).
    ///
    /// When off, that call is a plain pass-through and dead slots stay in the
    /// tables until [`sweep`](crate::ResourceCache::sweep) is called.
    pub sweep_on_unload: bool,
    /// Priority given to every newly issued async request.
    ///
    /// `None` leaves the host's default in place.
    pub async_priority: Option<i32>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            sweep_on_unload: true,
            async_priority: None,
        }
    }
}

impl CacheConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether reclaiming unused assets also sweeps the cache.
    pub fn with_sweep_on_unload(mut self, sweep: bool) -> Self {
        self.sweep_on_unload = sweep;
        self
    }

    /// Set the priority for newly issued async requests.
    pub fn with_async_priority(mut self, priority: i32) -> Self {
        self.async_priority = Some(priority);
        self
    }
}
