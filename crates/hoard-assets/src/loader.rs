//! Asset loader traits and the loader registry.
//!
//! Loaders come in two flavours. A [`SyncAssetLoader`] does all of its work on
//! the thread driving the manager. An [`AsyncAssetLoader`] splits the work: the
//! expensive part runs on the background pool and hands its result to a short
//! finishing step on the driving thread. Both may report dependencies first.

use std::any::Any;
use std::sync::Arc;

use hoard_core::alloc::HashMap;

use crate::descriptor::{AssetDescriptor, LoaderParams};
use crate::error::AssetResult;
use crate::io::{ResourceHandle, ResourceResolver};
use crate::storage::{AssetStore, LoadedAsset};
use crate::{Asset, AssetType};

/// What a loader is asked to load: the name, its resolved handle and parameters.
///
/// Owned and `Send`, so it can travel to the background pool.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    name: String,
    handle: ResourceHandle,
    params: Option<LoaderParams>,
}

impl LoadRequest {
    /// Create a request.
    pub fn new(
        name: impl Into<String>,
        handle: ResourceHandle,
        params: Option<LoaderParams>,
    ) -> Self {
        Self {
            name: name.into(),
            handle,
            params,
        }
    }

    /// The asset name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resolved resource handle.
    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    /// The loader parameters, if any.
    pub fn params(&self) -> Option<&LoaderParams> {
        self.params.as_ref()
    }

    /// The settings value of the parameters, if one of type `P` was given.
    pub fn settings<P: Any>(&self) -> Option<&P> {
        self.params.as_ref().and_then(|p| p.settings::<P>())
    }
}

/// Context for the steps that run on the driving thread.
///
/// Gives read access to assets that are already stored, which is how a loader
/// picks up the dependencies it declared.
pub struct LoadContext<'a> {
    request: &'a LoadRequest,
    store: &'a AssetStore,
    resolver: &'a dyn ResourceResolver,
}

impl<'a> LoadContext<'a> {
    pub(crate) fn new(
        request: &'a LoadRequest,
        store: &'a AssetStore,
        resolver: &'a dyn ResourceResolver,
    ) -> Self {
        Self {
            request,
            store,
            resolver,
        }
    }

    /// The request being served.
    pub fn request(&self) -> &LoadRequest {
        self.request
    }

    /// The asset name.
    pub fn name(&self) -> &str {
        self.request.name()
    }

    /// The resolved resource handle.
    pub fn handle(&self) -> &ResourceHandle {
        self.request.handle()
    }

    /// The settings value of the parameters, if one of type `P` was given.
    pub fn settings<P: Any>(&self) -> Option<&P> {
        self.request.settings::<P>()
    }

    /// A stored asset, typically one of the declared dependencies.
    pub fn get<T: Asset>(&self, name: &str) -> AssetResult<Arc<T>> {
        self.store.get::<T>(name)
    }

    /// Returns true if `name` is stored.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.store.is_loaded(name)
    }

    /// Resolve another resource through the manager's resolver.
    pub fn resolve(&self, name: &str) -> ResourceHandle {
        self.resolver.resolve(name)
    }
}

/// Dependencies reported by a loader. `None` means there are none.
pub type Dependencies = Option<Vec<AssetDescriptor>>;

/// A loader that does all of its work on the driving thread.
///
/// # Example
///
/// ```ignore
/// struct ShaderLoader;
///
/// impl SyncAssetLoader for ShaderLoader {
///     type Asset = Shader;
///
///     fn load(&self, ctx: &LoadContext<'_>) -> AssetResult<Shader> {
///         Shader::compile(&ctx.handle().read_string()?)
///     }
/// }
/// ```
pub trait SyncAssetLoader: Send + Sync + 'static {
    /// The asset type this loader produces.
    type Asset: Asset;

    /// Assets that must be loaded before [`load`](Self::load) runs.
    fn dependencies(&self, _request: &LoadRequest) -> AssetResult<Dependencies> {
        Ok(None)
    }

    /// Produce the asset.
    fn load(&self, ctx: &LoadContext<'_>) -> AssetResult<Self::Asset>;
}

/// A loader whose expensive work runs on the background pool.
///
/// `dependencies` and `load_async` run off the driving thread and only see the
/// request. `load_sync` runs on the driving thread with the value `load_async`
/// produced.
pub trait AsyncAssetLoader: Send + Sync + 'static {
    /// The asset type this loader produces.
    type Asset: Asset;

    /// Intermediate result handed from the background phase to the finishing phase.
    type Staged: Send + 'static;

    /// Assets that must be loaded before [`load_async`](Self::load_async) runs.
    fn dependencies(&self, _request: &LoadRequest) -> AssetResult<Dependencies> {
        Ok(None)
    }

    /// Decode or read the resource. Runs on the background pool.
    fn load_async(&self, request: &LoadRequest) -> AssetResult<Self::Staged>;

    /// Finish the asset on the driving thread.
    fn load_sync(&self, ctx: &LoadContext<'_>, staged: Self::Staged) -> AssetResult<Self::Asset>;
}

/// Type-erased [`SyncAssetLoader`].
pub(crate) trait ErasedSyncLoader: Send + Sync {
    fn dependencies(&self, request: &LoadRequest) -> AssetResult<Dependencies>;
    fn load(&self, ctx: &LoadContext<'_>) -> AssetResult<LoadedAsset>;
}

impl<L: SyncAssetLoader> ErasedSyncLoader for L {
    fn dependencies(&self, request: &LoadRequest) -> AssetResult<Dependencies> {
        SyncAssetLoader::dependencies(self, request)
    }

    fn load(&self, ctx: &LoadContext<'_>) -> AssetResult<LoadedAsset> {
        SyncAssetLoader::load(self, ctx).map(LoadedAsset::new)
    }
}

pub(crate) type StagedValue = Box<dyn Any + Send>;

/// Type-erased [`AsyncAssetLoader`].
pub(crate) trait ErasedAsyncLoader: Send + Sync {
    fn dependencies(&self, request: &LoadRequest) -> AssetResult<Dependencies>;
    fn load_async(&self, request: &LoadRequest) -> AssetResult<StagedValue>;
    fn load_sync(&self, ctx: &LoadContext<'_>, staged: StagedValue) -> AssetResult<LoadedAsset>;
}

impl<L: AsyncAssetLoader> ErasedAsyncLoader for L {
    fn dependencies(&self, request: &LoadRequest) -> AssetResult<Dependencies> {
        AsyncAssetLoader::dependencies(self, request)
    }

    fn load_async(&self, request: &LoadRequest) -> AssetResult<StagedValue> {
        let staged = AsyncAssetLoader::load_async(self, request)?;
        Ok(Box::new(staged))
    }

    fn load_sync(&self, ctx: &LoadContext<'_>, staged: StagedValue) -> AssetResult<LoadedAsset> {
        let staged = staged.downcast::<L::Staged>().map_err(|_| crate::AssetError::Other {
            message: format!("staged value for '{}' has the wrong type", ctx.name()),
        })?;
        AsyncAssetLoader::load_sync(self, ctx, *staged).map(LoadedAsset::new)
    }
}

#[derive(Clone)]
pub(crate) enum LoaderKind {
    Sync(Arc<dyn ErasedSyncLoader>),
    Async(Arc<dyn ErasedAsyncLoader>),
}

/// A registered loader of either flavour.
#[derive(Clone)]
pub struct Loader {
    pub(crate) kind: LoaderKind,
}

impl Loader {
    /// Wrap a loader that runs entirely on the driving thread.
    pub fn from_sync<L: SyncAssetLoader>(loader: L) -> Self {
        Self {
            kind: LoaderKind::Sync(Arc::new(loader)),
        }
    }

    /// Wrap a loader that splits work between the background pool and the driving thread.
    pub fn from_async<L: AsyncAssetLoader>(loader: L) -> Self {
        Self {
            kind: LoaderKind::Async(Arc::new(loader)),
        }
    }

    /// Returns true for the two-phase flavour.
    pub fn is_async(&self) -> bool {
        matches!(self.kind, LoaderKind::Async(_))
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(if self.is_async() { "Loader::Async" } else { "Loader::Sync" })
    }
}

/// Registry of loaders, indexed by asset type and optional file name suffix.
///
/// Lookup by file name picks the loader whose suffix is the longest one the
/// file name ends with; the loader registered without a suffix matches every
/// name and serves as the default for its type.
#[derive(Default)]
pub struct LoaderRegistry {
    /// Type -> (suffix, loader). The empty suffix is the default loader.
    loaders: HashMap<AssetType, Vec<(String, Loader)>>,
}

impl LoaderRegistry {
    /// Create a new empty loader registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `loader` for `asset_type`, replacing any loader with the same suffix.
    pub fn register(&mut self, asset_type: AssetType, suffix: Option<&str>, loader: Loader) {
        let suffix = suffix.unwrap_or_default().to_string();
        let entries = self.loaders.entry(asset_type).or_default();
        match entries.iter_mut().find(|(s, _)| *s == suffix) {
            Some(entry) => {
                tracing::debug!("Replacing loader for {} (suffix '{}')", asset_type, suffix);
                entry.1 = loader;
            }
            None => entries.push((suffix, loader)),
        }
    }

    /// The loader for `asset_type`, optionally selected by `file_name`.
    pub fn lookup(&self, asset_type: AssetType, file_name: Option<&str>) -> Option<&Loader> {
        let entries = self.loaders.get(&asset_type)?;
        match file_name {
            None => entries.iter().find(|(suffix, _)| suffix.is_empty()).map(|(_, l)| l),
            Some(file_name) => entries
                .iter()
                .filter(|(suffix, _)| file_name.ends_with(suffix.as_str()))
                .max_by_key(|(suffix, _)| suffix.len())
                .map(|(_, l)| l),
        }
    }

    /// Returns true if any loader is registered for `asset_type`.
    pub fn has_loader_for_type(&self, asset_type: AssetType) -> bool {
        self.loaders.get(&asset_type).is_some_and(|e| !e.is_empty())
    }

    /// The suffixes registered for `asset_type` (the default is the empty string).
    pub fn suffixes_for_type(&self, asset_type: AssetType) -> Vec<&str> {
        self.loaders
            .get(&asset_type)
            .map(|entries| entries.iter().map(|(s, _)| s.as_str()).collect())
            .unwrap_or_default()
    }
}
