//! Collection types used across hoard.
//!
//! Re-exports of the AHash-backed hash collections, which are noticeably faster
//! than SipHash for the short string keys the asset store is indexed by.

pub use ahash::{AHashMap as HashMap, AHashSet as HashSet};
