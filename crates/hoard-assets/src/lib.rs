//! Hoard Assets
//!
//! A reference-counted, dependency-aware asset cache. Assets are requested by
//! name and type, loaders discover their dependencies before producing a value,
//! expensive decoding runs on a background pool while finalisation happens on the
//! thread that drives [`AssetManager::update`].
//!
//! # Example
//!
//! ```ignore
//! use hoard_assets::prelude::*;
//!
//! let mut manager = AssetManager::new(FileResolver::new("assets"));
//! manager.set_async_loader(None, TextureLoader);
//! manager.set_loader(Some(".fnt"), FontLoader);
//!
//! manager.load::<Font>("fonts/default.fnt")?;
//! while !manager.update()? {
//!     draw_loading_screen(manager.progress());
//! }
//!
//! let font = manager.get::<Font>("fonts/default.fnt")?;
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

pub mod config;
pub mod descriptor;
pub mod error;
pub mod io;
pub mod loadable;
pub mod loader;
pub mod manager;
pub mod state;
pub mod storage;
mod task;

pub use config::AssetManagerConfig;
pub use descriptor::{AssetDescriptor, LoaderParams};
pub use error::{AssetError, AssetResult};
pub use io::{
    ByteSource, FallbackResolver, FileResolver, MemoryResolver, ResourceHandle, ResourceResolver,
};
pub use loadable::Loadable;
pub use loader::{
    AsyncAssetLoader, LoadContext, LoadRequest, Loader, LoaderRegistry, SyncAssetLoader,
};
pub use manager::{AssetErrorListener, AssetManager};
pub use state::LoadState;

/// Trait for values the asset manager can store.
pub trait Asset: Send + Sync + 'static {
    /// The application-chosen type tag. Names are unique per tag.
    fn type_name() -> &'static str;

    /// Release external resources once the last reference is unloaded.
    fn dispose(&self) {}
}

/// Type tag under which loaders are registered and assets are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetType(&'static str);

impl AssetType {
    /// The tag of asset type `T`.
    pub fn of<T: Asset>() -> Self {
        Self(T::type_name())
    }

    /// A tag from a raw name.
    pub const fn named(name: &'static str) -> Self {
        Self(name)
    }

    /// The tag as a string.
    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A stored asset with its concrete type erased.
pub type ErasedAsset = Arc<dyn Any + Send + Sync>;

/// Commonly used items.
pub mod prelude {
    pub use crate::{
        Asset, AssetDescriptor, AssetError, AssetManager, AssetManagerConfig, AssetResult,
        AssetType, AsyncAssetLoader, FileResolver, LoadContext, LoadRequest, LoadState, Loadable,
        LoaderParams, MemoryResolver, ResourceHandle, SyncAssetLoader,
    };
}
