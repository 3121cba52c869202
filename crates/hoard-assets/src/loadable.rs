//! One-off assets that load themselves.
//!
//! A [`Loadable`] is both the request and the asset: the manager runs its
//! background and finishing steps like any asynchronous loader and then stores
//! the object itself. [`AssetManager::load_run`](crate::AssetManager::load_run)
//! covers the simpler case of a pair of closures.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use hoard_core::alloc::HashMap;
use parking_lot::Mutex;

use crate::error::{AssetError, AssetResult};
use crate::loader::{AsyncAssetLoader, Dependencies, LoadContext, LoadRequest};
use crate::Asset;

/// An asset that knows how to load itself.
///
/// # Example
///
/// ```ignore
/// struct Level { name: String, tiles: Vec<u8> }
///
/// impl Loadable for Level {
///     fn name(&self) -> String {
///         self.name.clone()
///     }
///
///     fn load_async(&mut self) -> AssetResult<()> {
///         self.tiles = generate_tiles(&self.name);
///         Ok(())
///     }
/// }
///
/// manager.load_loadable(Level { name: "level/1".into(), tiles: Vec::new() })?;
/// ```
pub trait Loadable: Asset {
    /// The name the object is stored under.
    fn name(&self) -> String;

    /// Assets that must be loaded first.
    fn dependencies(&self) -> Dependencies {
        None
    }

    /// Runs on the background pool.
    fn load_async(&mut self) -> AssetResult<()> {
        Ok(())
    }

    /// Runs on the driving thread once the dependencies are stored.
    fn load_sync(&mut self, _ctx: &LoadContext<'_>) -> AssetResult<()> {
        Ok(())
    }
}

/// Objects waiting to be loaded, by name. Shared between the manager and the
/// loader it registered for the type.
pub(crate) type PendingLoadables<T> = Arc<Mutex<HashMap<String, T>>>;

/// Type-erased access to the pending objects of one type.
pub(crate) trait PendingObjects: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Drop the object waiting under `name`, if any.
    fn discard(&self, name: &str);

    fn clear(&self);
}

impl<T: Loadable> PendingObjects for PendingLoadables<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn discard(&self, name: &str) {
        self.lock().remove(name);
    }

    fn clear(&self) {
        self.lock().clear();
    }
}

/// Hands each pending object to the pipeline and stores it once finished.
pub(crate) struct LoadableLoader<T> {
    pending: PendingLoadables<T>,
}

impl<T> LoadableLoader<T> {
    pub(crate) fn new(pending: PendingLoadables<T>) -> Self {
        Self { pending }
    }
}

impl<T: Loadable> AsyncAssetLoader for LoadableLoader<T> {
    type Asset = T;
    type Staged = T;

    fn dependencies(&self, request: &LoadRequest) -> AssetResult<Dependencies> {
        Ok(self
            .pending
            .lock()
            .get(request.name())
            .and_then(Loadable::dependencies))
    }

    fn load_async(&self, request: &LoadRequest) -> AssetResult<T> {
        let mut item = self
            .pending
            .lock()
            .remove(request.name())
            .ok_or_else(|| AssetError::loader(request.name(), "no pending object to load"))?;
        item.load_async()?;
        Ok(item)
    }

    fn load_sync(&self, ctx: &LoadContext<'_>, mut staged: T) -> AssetResult<T> {
        staged.load_sync(ctx)?;
        Ok(staged)
    }
}

/// Loader built from a pair of closures.
pub(crate) struct RunLoader<T, A, S> {
    load_async: A,
    load_sync: S,
    _asset: PhantomData<fn() -> T>,
}

impl<T, A, S> RunLoader<T, A, S> {
    pub(crate) fn new(load_async: A, load_sync: S) -> Self {
        Self {
            load_async,
            load_sync,
            _asset: PhantomData,
        }
    }
}

impl<T, A, S> AsyncAssetLoader for RunLoader<T, A, S>
where
    T: Asset,
    A: Fn(&LoadRequest) -> AssetResult<()> + Send + Sync + 'static,
    S: Fn(&LoadContext<'_>) -> AssetResult<T> + Send + Sync + 'static,
{
    type Asset = T;
    type Staged = ();

    fn load_async(&self, request: &LoadRequest) -> AssetResult<()> {
        (self.load_async)(request)
    }

    fn load_sync(&self, ctx: &LoadContext<'_>, _staged: ()) -> AssetResult<T> {
        (self.load_sync)(ctx)
    }
}
