//! Test utilities for Stash.
//!
//! This crate provides a scriptable in-memory [`AssetHost`] for exercising
//! [`ResourceCache`] without a real asset store.
//!
//! # Overview
//!
//! - [`MockAssetHost`] - Host that builds assets from registered factories
//! - [`HostCall`] - Record of every call the cache made into the host
//!
//! # Example
//!
//! ```rust
//! use stash_resources::ResourceCache;
//! use stash_test_utils::MockAssetHost;
//!
//! let host = MockAssetHost::new();
//! host.add_asset("greeting", String::from("hello"));
//!
//! let cache = ResourceCache::new(host);
//! let first = cache.load::<String>("greeting").unwrap();
//! let second = cache.load::<String>("greeting").unwrap();
//!
//! assert_eq!(first.as_deref().map(String::as_str), Some("hello"));
//! assert_eq!(second, first);
//! assert_eq!(cache.host().count_loads(), 1);
//! ```
//!
//! # Design Philosophy
//!
//! ## 1. Resident Assets
//!
//! Like a real engine, the host keeps every asset it has produced alive until
//! it is explicitly reclaimed. The cache only holds weak references, so an
//! asset leaves the cache exactly when the host frees it and no caller holds
//! it either.
//!
//! ## 2. Manual Completion
//!
//! Async loads and reclamation stay pending until the test completes them.
//! This makes the ordering of callbacks deterministic.
//!
//! ## 3. Interior Mutability
//!
//! All state sits behind `parking_lot::Mutex`, so the host is `Send + Sync`
//! and can be driven from several threads at once. Callbacks are always run
//! with no host lock held.
//!
//! [`AssetHost`]: stash_resources::AssetHost
//! [`ResourceCache`]: stash_resources::ResourceCache

pub mod mock_host;

pub use mock_host::*;
