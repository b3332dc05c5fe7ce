//! Basic caching example demonstrating the resource cache.
//!
//! This example shows:
//! - Wrapping a host in a `ResourceCache`
//! - Memoized synchronous loads
//! - De-duplicated asynchronous loads
//! - Loading through a runtime type name
//! - Reclaiming unused assets and sweeping the cache

use std::sync::Arc;

use stash_resources::prelude::*;
use stash_test_utils::MockAssetHost;

/// A simple image asset (just stores dimensions).
#[derive(Debug, Clone)]
struct SimpleImage {
    width: u32,
    height: u32,
}

impl Asset for SimpleImage {
    fn type_name() -> &'static str {
        "SimpleImage"
    }
}

fn create_host() -> MockAssetHost {
    let host = MockAssetHost::new();
    host.add_asset("sprites/hero", SimpleImage { width: 32, height: 48 });
    host.add_asset("sprites/slime", SimpleImage { width: 16, height: 16 });
    host.add_asset("ui/banner", SimpleImage { width: 640, height: 80 });
    host.add_asset("text/readme", String::from("Welcome to the cache demo."));
    host
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    stash_core::logging::init();
    stash_core::profiling::enable();

    let cache = ResourceCache::new(create_host());

    println!("\n=== Synchronous Loads ===\n");

    let hero = cache.load::<SimpleImage>("sprites/hero")?;
    let hero_again = cache.load::<SimpleImage>("sprites/hero")?;
    if let (Some(a), Some(b)) = (&hero, &hero_again) {
        println!("Hero: {}x{}", a.width, a.height);
        println!("Same instance: {}", Arc::ptr_eq(a, b));
    }
    println!("Host loads so far: {}", cache.host().count_loads());

    let missing = cache.load::<SimpleImage>("sprites/dragon")?;
    println!("Dragon found: {}", missing.is_some());

    println!("\n=== Asynchronous Loads ===\n");

    let first = cache.load_async::<SimpleImage>("ui/banner")?;
    let second = cache.load_async::<SimpleImage>("ui/banner")?;
    println!("Shared future: {}", first.ptr_eq(&second));

    first.on_completed(|future| {
        if let Some(image) = future.value() {
            println!("Banner loaded: {}x{}", image.width, image.height);
        }
    });

    println!("Progress before completion: {:.0}%", first.progress() * 100.0);
    stash_core::profiling::new_frame();
    cache.host().complete("ui/banner");
    println!("State after completion: {:?}", second.load_state());

    println!("\n=== Runtime Type Names ===\n");

    cache.register::<String>();
    let token = cache.token_by_name("String")?;
    if let Some(text) = cache.load_erased("text/readme", token)? {
        let text = downcast::<String>(text)?;
        println!("Readme: {}", text);
    }

    let group = cache.load_all::<SimpleImage>("sprites")?;
    println!("Sprites in directory: {}", group.len());

    println!("\n=== Reclaiming ===\n");

    drop(group);
    drop(hero_again);
    cache.unload_unused_assets();
    let freed = cache.host().complete_unloads();
    println!("Host freed {} assets", freed);

    let typed = cache.typed::<SimpleImage>();
    println!("Hero still cached: {}", typed.contains_live("sprites/hero"));
    println!("Slime still cached: {}", typed.contains_live("sprites/slime"));
    println!("Entry slots after sweep: {}", typed.entry_count());

    drop(hero);
    Ok(())
}
