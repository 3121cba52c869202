//! Hoard Core
//!
//! Shared plumbing for the hoard crates: fast hash collections, logging setup,
//! optional profiling scopes and the background task pool.

pub mod alloc;
pub mod logging;
pub mod profiling;
pub mod task_pool;

pub use task_pool::TaskPool;
