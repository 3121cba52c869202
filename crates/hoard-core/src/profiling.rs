//! Profiling scopes based on the `puffin` crate.
//!
//! With the `profiling` feature disabled the macros expand to nothing, so call
//! sites can use them unconditionally.

#[cfg(feature = "profiling")]
pub use puffin::{profile_function, profile_scope};

#[cfg(not(feature = "profiling"))]
pub use crate::{noop_profile_function as profile_function, noop_profile_scope as profile_scope};

#[cfg(not(feature = "profiling"))]
#[doc(hidden)]
#[macro_export]
macro_rules! noop_profile_function {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "profiling"))]
#[doc(hidden)]
#[macro_export]
macro_rules! noop_profile_scope {
    ($($arg:tt)*) => {};
}

/// Turn puffin scope collection on or off. Does nothing without the
/// `profiling` feature.
pub fn set_enabled(enabled: bool) {
    #[cfg(feature = "profiling")]
    {
        puffin::set_scopes_on(enabled);
        tracing::info!("Puffin scopes {}", if enabled { "enabled" } else { "disabled" });
    }
    #[cfg(not(feature = "profiling"))]
    let _ = enabled;
}

/// Mark the start of a new frame for profiling.
///
/// Call this once per iteration of the loop that drives the asset manager.
#[inline]
pub fn new_frame() {
    #[cfg(feature = "profiling")]
    puffin::GlobalProfiler::lock().new_frame();
}
