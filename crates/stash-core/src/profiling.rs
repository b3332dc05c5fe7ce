//! Profiling scopes based on the `puffin` crate.
//!
//! Scopes are compiled in everywhere but cost a single atomic load until
//! [`enable`] is called.

pub use puffin::{GlobalProfiler, profile_function, profile_scope};

/// Turn on scope collection.
pub fn enable() {
    puffin::set_scopes_on(true);
    tracing::info!("Puffin scopes enabled");
}

/// Turn off scope collection.
pub fn disable() {
    puffin::set_scopes_on(false);
}

/// Whether scopes are currently collected.
pub fn is_enabled() -> bool {
    puffin::are_scopes_on()
}

/// Mark the start of a new frame.
///
/// Call once per host update so cache scopes are grouped by frame.
pub fn new_frame() {
    GlobalProfiler::lock().new_frame();
}
