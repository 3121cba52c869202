//! The asset manager - the main coordinator for loading, caching and unloading.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hoard_core::TaskPool;
use hoard_core::alloc::HashMap;
use hoard_core::profiling::{profile_function, profile_scope};

use crate::config::AssetManagerConfig;
use crate::descriptor::{AssetDescriptor, LoaderParams, normalize_name};
use crate::error::{AssetError, AssetResult};
use crate::io::ResourceResolver;
use crate::loadable::{Loadable, LoadableLoader, PendingLoadables, PendingObjects, RunLoader};
use crate::loader::{
    AsyncAssetLoader, LoadContext, LoadRequest, Loader, LoaderRegistry, SyncAssetLoader,
};
use crate::state::LoadState;
use crate::storage::AssetStore;
use crate::task::{LoadingTask, Step};
use crate::{Asset, AssetType, ErasedAsset};

/// Receives load failures that the manager recovered from.
pub trait AssetErrorListener: Send + Sync {
    /// Called with the descriptor of the asset that failed and the error.
    fn error(&self, descriptor: &AssetDescriptor, error: &AssetError);
}

impl<F> AssetErrorListener for F
where
    F: Fn(&AssetDescriptor, &AssetError) + Send + Sync,
{
    fn error(&self, descriptor: &AssetDescriptor, error: &AssetError) {
        self(descriptor, error)
    }
}

/// Loads, caches and reference-counts assets.
///
/// Requests go into a FIFO queue. [`update`](Self::update) moves them onto a
/// stack of loading tasks, one at a time; dependencies a loader reports are
/// pushed on top of the task that needs them, so they always finish first.
/// Every stored asset carries a reference count equal to the number of load
/// paths that require it.
///
/// The manager is driven from one thread. To share it, wrap it in a lock; all
/// queries take `&self` and are safe under a read lock.
///
/// # Example
///
/// ```ignore
/// let mut manager = AssetManager::new(MemoryResolver::new().with("hello.txt", b"hi".to_vec()));
/// manager.set_loader(None, TextLoader);
///
/// manager.load::<Text>("hello.txt")?;
/// manager.finish_loading()?;
///
/// let text = manager.get::<Text>("hello.txt")?;
/// manager.unload("hello.txt")?;
/// ```
pub struct AssetManager {
    config: AssetManagerConfig,
    resolver: Box<dyn ResourceResolver>,
    loaders: LoaderRegistry,
    store: AssetStore,
    /// Requests not yet started.
    queue: VecDeque<AssetDescriptor>,
    /// In-flight tasks. The last element is stepped; the first is the request
    /// taken from the queue, everything above it is one of its dependencies.
    tasks: Vec<LoadingTask>,
    /// `None` once the manager has been disposed.
    pool: Option<TaskPool>,
    listener: Option<Box<dyn AssetErrorListener>>,
    /// Objects queued through [`load_loadable`](Self::load_loadable), per type.
    loadables: HashMap<AssetType, Box<dyn PendingObjects>>,
    loaded: usize,
    to_load: usize,
    peak_tasks: usize,
    progress_floor: f32,
}

impl AssetManager {
    /// Create a manager with the default configuration.
    pub fn new(resolver: impl ResourceResolver + 'static) -> Self {
        Self::with_config(resolver, AssetManagerConfig::default())
    }

    /// Create a manager with an explicit configuration.
    pub fn with_config(
        resolver: impl ResourceResolver + 'static,
        config: AssetManagerConfig,
    ) -> Self {
        let pool =
            TaskPool::with_idle_sleep(config.worker_threads.max(1), config.worker_idle_sleep);
        tracing::debug!("AssetManager created with {} worker thread(s)", pool.thread_count());

        Self {
            config,
            resolver: Box::new(resolver),
            loaders: LoaderRegistry::new(),
            store: AssetStore::new(),
            queue: VecDeque::new(),
            tasks: Vec::new(),
            pool: Some(pool),
            listener: None,
            loadables: HashMap::new(),
            loaded: 0,
            to_load: 0,
            peak_tasks: 0,
            progress_floor: 0.0,
        }
    }

    /// The configuration this manager was created with.
    pub fn config(&self) -> &AssetManagerConfig {
        &self.config
    }

    /// The resolver used to turn names into resource handles.
    pub fn resolver(&self) -> &dyn ResourceResolver {
        self.resolver.as_ref()
    }

    // =========================================================================
    // Loaders
    // =========================================================================

    /// Register a synchronous loader for its asset type.
    ///
    /// With a suffix, the loader is only used for names ending in it; without
    /// one it becomes the default for the type.
    pub fn set_loader<L: SyncAssetLoader>(&mut self, suffix: Option<&str>, loader: L) {
        let asset_type = AssetType::of::<L::Asset>();
        tracing::debug!("Registered sync loader for {} (suffix: {:?})", asset_type, suffix);
        self.loaders.register(asset_type, suffix, Loader::from_sync(loader));
    }

    /// Register an asynchronous loader for its asset type.
    pub fn set_async_loader<L: AsyncAssetLoader>(&mut self, suffix: Option<&str>, loader: L) {
        let asset_type = AssetType::of::<L::Asset>();
        tracing::debug!("Registered async loader for {} (suffix: {:?})", asset_type, suffix);
        self.loaders.register(asset_type, suffix, Loader::from_async(loader));
    }

    /// The loader registry.
    pub fn loader_registry(&self) -> &LoaderRegistry {
        &self.loaders
    }

    /// Mutable access to the loader registry, for registering under explicit type tags.
    pub fn loader_registry_mut(&mut self) -> &mut LoaderRegistry {
        &mut self.loaders
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Queue asset `name` of type `T` for loading.
    pub fn load<T: Asset>(&mut self, name: &str) -> AssetResult<AssetDescriptor> {
        self.load_descriptor(AssetDescriptor::new::<T>(name))
    }

    /// Queue asset `name` of type `T` with loader parameters.
    pub fn load_with_params<T: Asset>(
        &mut self,
        name: &str,
        params: LoaderParams,
    ) -> AssetResult<AssetDescriptor> {
        self.load_descriptor(AssetDescriptor::new::<T>(name).with_params(params))
    }

    /// Queue a descriptor for loading.
    ///
    /// Fails without queueing anything if no loader can serve the descriptor, or
    /// if the name is already queued, loading or loaded under another type.
    pub fn load_descriptor(&mut self, descriptor: AssetDescriptor) -> AssetResult<AssetDescriptor> {
        let asset_type = descriptor.asset_type();
        if self.loaders.lookup(asset_type, Some(descriptor.name())).is_none() {
            return Err(AssetError::NoLoader { asset_type });
        }

        if self.is_finished() {
            self.loaded = 0;
            self.to_load = 0;
            self.peak_tasks = 0;
            self.progress_floor = 0.0;
        }

        if let Some(found) = self.known_type(descriptor.name())
            && found != asset_type
        {
            return Err(AssetError::TypeMismatch {
                name: descriptor.name().to_string(),
                expected: asset_type,
                found,
            });
        }

        self.to_load += 1;
        self.queue.push_back(descriptor.clone());
        tracing::debug!("Queued {}", descriptor);
        Ok(descriptor)
    }

    /// Queue an object that loads itself; once loaded it is stored as its own asset.
    ///
    /// The first call for a type registers a loader for it. Fails with
    /// [`AssetError::LoaderExists`] if the type already has a loader of another kind.
    pub fn load_loadable<T: Loadable>(&mut self, item: T) -> AssetResult<AssetDescriptor> {
        let asset_type = AssetType::of::<T>();
        let pending = match self
            .loadables
            .get(&asset_type)
            .and_then(|p| p.as_any().downcast_ref::<PendingLoadables<T>>())
        {
            Some(pending) => Arc::clone(pending),
            None => {
                if self.loaders.has_loader_for_type(asset_type) {
                    return Err(AssetError::LoaderExists { asset_type });
                }
                let pending = PendingLoadables::<T>::default();
                let loader = LoadableLoader::new(Arc::clone(&pending));
                self.loaders.register(asset_type, None, Loader::from_async(loader));
                self.loadables.insert(asset_type, Box::new(Arc::clone(&pending)));
                pending
            }
        };

        let name = normalize_name(&item.name());
        let fresh = self.known_type(&name).is_none();
        let descriptor = self.load::<T>(&name)?;
        if fresh {
            pending.lock().insert(name, item);
        }
        Ok(descriptor)
    }

    /// Queue a one-off asset of type `T` produced by two closures: `load_async`
    /// runs on the background pool, `load_sync` builds the value on the driving
    /// thread.
    ///
    /// Registers a loader for `T`, so it fails with [`AssetError::LoaderExists`]
    /// if `T` already has one.
    pub fn load_run<T, A, S>(
        &mut self,
        name: &str,
        load_async: A,
        load_sync: S,
    ) -> AssetResult<AssetDescriptor>
    where
        T: Asset,
        A: Fn(&LoadRequest) -> AssetResult<()> + Send + Sync + 'static,
        S: Fn(&LoadContext<'_>) -> AssetResult<T> + Send + Sync + 'static,
    {
        let asset_type = AssetType::of::<T>();
        if self.loaders.has_loader_for_type(asset_type) {
            return Err(AssetError::LoaderExists { asset_type });
        }
        self.set_async_loader(None, RunLoader::new(load_async, load_sync));
        self.load::<T>(name)
    }

    /// The type `name` is queued, loading or stored under.
    fn known_type(&self, name: &str) -> Option<AssetType> {
        self.queue
            .iter()
            .find(|d| d.name() == name)
            .map(|d| d.asset_type())
            .or_else(|| {
                self.tasks
                    .iter()
                    .find(|t| t.name() == name)
                    .map(|t| t.descriptor().asset_type())
            })
            .or_else(|| self.store.asset_type(name))
    }

    // =========================================================================
    // Driving
    // =========================================================================

    /// Advance loading by one step.
    ///
    /// Returns `Ok(true)` once the queue and the task stack are both empty. A
    /// failing load is unwound; if an error listener or an error callback on the
    /// descriptor took the failure, loading continues with the rest of the queue
    /// and this returns `Ok(false)` while work remains. Otherwise the error is
    /// returned.
    pub fn update(&mut self) -> AssetResult<bool> {
        profile_function!();

        let done = match self.advance() {
            Ok(done) => done,
            Err(error) => self.rollback(error)?,
        };
        self.progress_floor = self.progress();
        Ok(done)
    }

    /// Call [`update`](Self::update) repeatedly until loading is finished or
    /// `budget` has elapsed. The last step may overrun the budget.
    pub fn update_for(&mut self, budget: Duration) -> AssetResult<bool> {
        let deadline = Instant::now() + budget;
        loop {
            let done = self.update()?;
            if done || Instant::now() >= deadline {
                return Ok(done);
            }
            self.pause();
        }
    }

    /// Block until every queued asset is loaded.
    pub fn finish_loading(&mut self) -> AssetResult<()> {
        while !self.update()? {
            self.pause();
        }
        Ok(())
    }

    /// Block until `name` is loaded.
    ///
    /// Returns [`AssetError::NotLoaded`] if loading finishes without storing it.
    pub fn finish_loading_asset(&mut self, name: &str) -> AssetResult<()> {
        let name = normalize_name(name);
        loop {
            if self.store.is_loaded(&name) {
                return Ok(());
            }
            if self.update()? && !self.store.is_loaded(&name) {
                return Err(AssetError::NotLoaded { name });
            }
            self.pause();
        }
    }

    /// Returns true when nothing is queued or loading.
    pub fn is_finished(&self) -> bool {
        self.queue.is_empty() && self.tasks.is_empty()
    }

    fn pause(&self) {
        if self.config.yield_between_updates {
            thread::yield_now();
        }
    }

    fn advance(&mut self) -> AssetResult<bool> {
        while self.tasks.is_empty() {
            let Some(descriptor) = self.queue.pop_front() else {
                return Ok(true);
            };
            if let Err(error) = self.next_task(&descriptor) {
                tracing::error!("Failed to start {}: {}", descriptor, error);
                self.loaded += 1;
                self.report_failure(&descriptor, None, error)?;
                return Ok(self.is_finished());
            }
        }

        let completed = self.step_top()?;
        Ok(completed && self.is_finished())
    }

    /// Start a queued request, or re-reference it if it is already stored.
    fn next_task(&mut self, descriptor: &AssetDescriptor) -> AssetResult<()> {
        match self.store.asset_type(descriptor.name()) {
            Some(found) if found != descriptor.asset_type() => Err(AssetError::TypeMismatch {
                name: descriptor.name().to_string(),
                expected: descriptor.asset_type(),
                found,
            }),
            Some(_) => {
                self.store.retain(descriptor.name());
                self.loaded += 1;
                tracing::debug!(
                    "{} already loaded, now referenced {} time(s)",
                    descriptor,
                    self.store.ref_count(descriptor.name()).unwrap_or(0)
                );
                self.notify_loaded(descriptor);
                Ok(())
            }
            None => self.push_task(descriptor.clone(), None),
        }
    }

    fn push_task(
        &mut self,
        descriptor: AssetDescriptor,
        parent: Option<usize>,
    ) -> AssetResult<()> {
        let asset_type = descriptor.asset_type();
        let loader = self
            .loaders
            .lookup(asset_type, Some(descriptor.name()))
            .cloned()
            .ok_or(AssetError::NoLoader { asset_type })?;

        tracing::debug!("Loading {}", descriptor);
        let task = LoadingTask::new(descriptor, loader, self.resolver.as_ref(), parent);
        self.tasks.push(task);
        self.peak_tasks += 1;
        Ok(())
    }

    fn pop_task(&mut self) -> Option<LoadingTask> {
        if self.tasks.len() == 1 {
            self.loaded += 1;
            self.peak_tasks = 0;
        }
        self.tasks.pop()
    }

    /// Step the task on top of the stack. Returns true if it completed.
    fn step_top(&mut self) -> AssetResult<bool> {
        if let Some(merged) = self.merge_duplicate()? {
            return Ok(merged);
        }

        let index = self.tasks.len().saturating_sub(1);
        let step = match self.tasks.last_mut() {
            Some(task) => {
                task.step(&self.store, self.resolver.as_ref(), self.pool.as_ref())?
            }
            None => return Ok(true),
        };

        match step {
            Step::Pending => Ok(false),
            Step::Inject(dependencies) => {
                self.inject_dependencies(index, dependencies)?;
                Ok(false)
            }
            Step::Cancelled => {
                if let Some(task) = self.pop_task() {
                    self.release_held(&task);
                    self.drop_speculative_edges(&task);
                    tracing::debug!("Cancelled {}", task.descriptor());
                }
                Ok(true)
            }
            Step::Done(asset) => {
                if let Some(task) = self.pop_task() {
                    let descriptor = task.descriptor();
                    debug_assert!(!self.store.is_loaded(descriptor.name()));
                    self.store.insert(descriptor.name(), descriptor.asset_type(), asset);
                    tracing::debug!("Loaded {}", descriptor);
                    self.record_completion(&task);
                }
                Ok(true)
            }
        }
    }

    /// A task that has not started yet may find its asset already stored, when the
    /// same dependency was pushed twice by different parents. Reference it instead
    /// of loading it again.
    fn merge_duplicate(&mut self) -> AssetResult<Option<bool>> {
        let Some(task) = self.tasks.last() else {
            return Ok(None);
        };
        if !task.is_created() || task.is_cancelled() {
            return Ok(None);
        }
        let Some(found) = self.store.asset_type(task.name()) else {
            return Ok(None);
        };
        if found != task.descriptor().asset_type() {
            return Err(AssetError::TypeMismatch {
                name: task.name().to_string(),
                expected: task.descriptor().asset_type(),
                found,
            });
        }

        let Some(task) = self.pop_task() else {
            return Ok(None);
        };
        self.store.retain(task.name());
        tracing::debug!("{} was loaded meanwhile, referencing it", task.descriptor());
        self.record_completion(&task);
        Ok(Some(true))
    }

    /// Hand the finished asset to the task that required it and fire callbacks.
    fn record_completion(&mut self, task: &LoadingTask) {
        if let Some(parent) = task.parent().and_then(|index| self.tasks.get_mut(index)) {
            parent.hold(task.name());
        }
        self.notify_loaded(task.descriptor());
    }

    fn notify_loaded(&self, descriptor: &AssetDescriptor) {
        if let Some(callback) = descriptor.params().and_then(|p| p.loaded_callback()) {
            callback(self, descriptor.name(), descriptor.asset_type());
        }
        if let Some(asset) = self.store.get_erased(descriptor.name()) {
            descriptor.notify_loaded(asset);
        }
    }

    /// Reference the stored dependencies of the task at `parent` and push tasks
    /// for the rest.
    ///
    /// The whole batch is checked first, so a bad dependency fails with the
    /// parent still on top of the stack.
    fn inject_dependencies(
        &mut self,
        parent: usize,
        dependencies: Vec<AssetDescriptor>,
    ) -> AssetResult<()> {
        let parent_name = match self.tasks.get(parent) {
            Some(task) => task.name().to_string(),
            None => return Ok(()),
        };
        profile_scope!("inject_dependencies");
        self.check_dependencies(parent, &dependencies)?;

        for dependency in dependencies {
            self.store.add_dependency(&parent_name, dependency.name());
            if self.store.is_loaded(dependency.name()) {
                self.store.retain(dependency.name());
                if let Some(task) = self.tasks.get_mut(parent) {
                    task.hold(dependency.name());
                }
                tracing::trace!("'{}' reuses loaded dependency {}", parent_name, dependency);
            } else {
                self.push_task(dependency, Some(parent))?;
            }
        }
        Ok(())
    }

    /// Reject cycles, type conflicts with anything queued, loading, stored or
    /// earlier in the batch, and dependencies no loader can serve.
    fn check_dependencies(
        &self,
        parent: usize,
        dependencies: &[AssetDescriptor],
    ) -> AssetResult<()> {
        for (index, dependency) in dependencies.iter().enumerate() {
            self.check_ancestors(parent, dependency)?;

            let asset_type = dependency.asset_type();
            let found = dependencies[..index]
                .iter()
                .find(|d| d.name() == dependency.name())
                .map(|d| d.asset_type())
                .or_else(|| self.known_type(dependency.name()));
            if let Some(found) = found
                && found != asset_type
            {
                return Err(AssetError::TypeMismatch {
                    name: dependency.name().to_string(),
                    expected: asset_type,
                    found,
                });
            }

            if !self.store.is_loaded(dependency.name())
                && self.loaders.lookup(asset_type, Some(dependency.name())).is_none()
            {
                return Err(AssetError::NoLoader { asset_type });
            }
        }
        Ok(())
    }

    /// Reject a dependency that names the requesting task or one of its ancestors.
    fn check_ancestors(&self, parent: usize, dependency: &AssetDescriptor) -> AssetResult<()> {
        let mut chain = Vec::new();
        let mut closes_cycle = None;
        let mut current = Some(parent);
        while let Some(task) = current.and_then(|index| self.tasks.get(index)) {
            if task.name() == dependency.name() {
                closes_cycle = Some(task.descriptor().asset_type());
            }
            chain.push(task.name().to_string());
            current = task.parent();
        }

        match closes_cycle {
            None => Ok(()),
            Some(found) if found != dependency.asset_type() => Err(AssetError::TypeMismatch {
                name: dependency.name().to_string(),
                expected: dependency.asset_type(),
                found,
            }),
            Some(_) => {
                chain.reverse();
                Err(AssetError::DependencyCycle {
                    name: dependency.name().to_string(),
                    chain,
                })
            }
        }
    }

    /// Drop the references a task took on its dependencies.
    fn release_held(&mut self, task: &LoadingTask) {
        for name in task.held() {
            if let Err(e) = self.store.release(name) {
                tracing::warn!(
                    "Could not release dependency '{}' of {}: {}",
                    name,
                    task.descriptor(),
                    e
                );
            }
        }
    }

    /// Forget the edges recorded for a task whose asset never got stored.
    fn drop_speculative_edges(&mut self, task: &LoadingTask) {
        if !self.store.is_loaded(task.name()) {
            self.store.remove_dependencies(task.name());
        }
    }

    /// Unwind the failed request: pop the failing task, discard the rest of the
    /// stack and release everything they had referenced.
    fn rollback(&mut self, error: AssetError) -> AssetResult<bool> {
        let Some(failed) = self.tasks.pop() else {
            return Err(error);
        };
        profile_scope!("rollback");
        tracing::error!("Failed to load {}: {}", failed.descriptor(), error);

        self.release_held(&failed);
        self.drop_speculative_edges(&failed);

        let mut request = None;
        while let Some(task) = self.tasks.pop() {
            self.release_held(&task);
            self.drop_speculative_edges(&task);
            tracing::warn!("Discarded {} after a failed dependency", task.descriptor());
            request = Some(task);
        }
        self.loaded += 1;
        self.peak_tasks = 0;

        let request = request.as_ref().map(LoadingTask::descriptor);
        self.report_failure(failed.descriptor(), request, error)?;
        Ok(self.is_finished())
    }

    /// Hand a failure to the error listener and the error callbacks of the failed
    /// descriptor and of the request it belonged to. Returns the error if none of
    /// them was there to take it.
    fn report_failure(
        &self,
        failed: &AssetDescriptor,
        request: Option<&AssetDescriptor>,
        error: AssetError,
    ) -> AssetResult<()> {
        let mut handled = false;
        if let Some(listener) = &self.listener {
            listener.error(failed, &error);
            handled = true;
        }
        if failed.has_error_callback() {
            failed.notify_error(&error);
            handled = true;
        }
        if let Some(request) = request.filter(|r| r.has_error_callback()) {
            request.notify_error(&error);
            handled = true;
        }

        if handled { Ok(()) } else { Err(error) }
    }

    // =========================================================================
    // Access
    // =========================================================================

    /// The loaded asset `name`.
    ///
    /// Fails with [`AssetError::NotLoaded`] if it is not stored and with
    /// [`AssetError::TypeMismatch`] if it is stored under another type.
    pub fn get<T: Asset>(&self, name: &str) -> AssetResult<Arc<T>> {
        self.store.get::<T>(&normalize_name(name))
    }

    /// Every loaded asset of type `T`, in load order.
    pub fn get_all<T: Asset>(&self) -> Vec<Arc<T>> {
        self.store.all::<T>()
    }

    /// The loaded asset `name` with its type erased.
    pub fn get_erased(&self, name: &str) -> Option<ErasedAsset> {
        self.store.get_erased(&normalize_name(name)).cloned()
    }

    /// Drop one reference to `name`.
    ///
    /// Cancels the request if it is the one currently loading and removes it if
    /// it is still queued. Otherwise the reference count drops by one; at zero the
    /// asset is disposed and removed, and its dependencies lose a reference too.
    pub fn unload(&mut self, name: &str) -> AssetResult<()> {
        let name = normalize_name(name);

        if let Some(current) = self.tasks.first()
            && current.name() == name
        {
            current.cancel();
            tracing::debug!("Cancelling {}", current.descriptor());
            return Ok(());
        }

        if let Some(index) = self.queue.iter().position(|d| d.name() == name) {
            self.queue.remove(index);
            self.to_load = self.to_load.saturating_sub(1);
            for pending in self.loadables.values() {
                pending.discard(&name);
            }
            tracing::debug!("Removed '{}' from the queue", name);
            return Ok(());
        }

        let removed = self.store.release(&name)?;
        if !removed.is_empty() {
            tracing::debug!("Unloading '{}' removed {:?}", name, removed);
        }
        Ok(())
    }

    /// Returns true if `name` is stored under any type.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.store.is_loaded(&normalize_name(name))
    }

    /// Returns true if `name` is stored under `asset_type`.
    pub fn is_loaded_as(&self, name: &str, asset_type: AssetType) -> bool {
        self.store.is_loaded_as(&normalize_name(name), asset_type)
    }

    /// Returns true if `name` is queued, loading or stored.
    pub fn contains(&self, name: &str) -> bool {
        self.load_state(name) != LoadState::NotLoaded
    }

    /// Returns true if `name` is queued, loading or stored under `asset_type`.
    pub fn contains_as(&self, name: &str, asset_type: AssetType) -> bool {
        let name = normalize_name(name);
        self.queue
            .iter()
            .any(|d| d.name() == name && d.asset_type() == asset_type)
            || self
                .tasks
                .iter()
                .any(|t| t.name() == name && t.descriptor().asset_type() == asset_type)
            || self.store.is_loaded_as(&name, asset_type)
    }

    /// Where `name` currently is in the pipeline.
    pub fn load_state(&self, name: &str) -> LoadState {
        let name = normalize_name(name);
        if self.store.is_loaded(&name) {
            LoadState::Loaded
        } else if self.tasks.iter().any(|t| t.name() == name) {
            LoadState::Loading
        } else if self.queue.iter().any(|d| d.name() == name) {
            LoadState::Queued
        } else {
            LoadState::NotLoaded
        }
    }

    /// The descriptor of the request currently being loaded.
    pub fn current_loading(&self) -> Option<&AssetDescriptor> {
        self.tasks.first().map(|t| t.descriptor())
    }

    /// The type `name` is stored under.
    pub fn asset_type(&self, name: &str) -> Option<AssetType> {
        self.store.asset_type(&normalize_name(name))
    }

    /// The name a loaded asset is stored under.
    pub fn name_of<T: Asset>(&self, asset: &Arc<T>) -> Option<&str> {
        let erased: ErasedAsset = Arc::clone(asset) as ErasedAsset;
        self.store.name_of(&erased)
    }

    /// Returns true if `asset` is stored in this manager.
    pub fn contains_asset<T: Asset>(&self, asset: &Arc<T>) -> bool {
        self.name_of(asset).is_some()
    }

    /// Loading progress of the current batch of requests, between 0 and 1.
    ///
    /// Dependencies in flight count as partial progress of their request. The
    /// value never decreases between [`update`](Self::update) calls of one batch
    /// and is exactly 1 once loading is finished.
    pub fn progress(&self) -> f32 {
        if self.to_load == 0 || self.is_finished() {
            return 1.0;
        }
        let mut fraction = self.loaded as f32;
        if self.peak_tasks > 0 {
            let settled = self.peak_tasks.saturating_sub(self.tasks.len());
            fraction += settled as f32 / self.peak_tasks as f32;
        }
        (fraction / self.to_load as f32).min(1.0).max(self.progress_floor)
    }

    /// Number of stored assets.
    pub fn loaded_count(&self) -> usize {
        self.store.len()
    }

    /// Number of requests queued or loading, dependencies included.
    pub fn queued_count(&self) -> usize {
        self.queue.len() + self.tasks.len()
    }

    /// The reference count of `name`.
    pub fn reference_count(&self, name: &str) -> AssetResult<u32> {
        let name = normalize_name(name);
        self.store.ref_count(&name).ok_or(AssetError::NotLoaded { name })
    }

    /// Override the reference count of `name`.
    pub fn set_reference_count(&mut self, name: &str, count: u32) -> AssetResult<()> {
        self.store.set_ref_count(&normalize_name(name), count)
    }

    /// The names `name` depends on.
    pub fn dependencies(&self, name: &str) -> Option<&[String]> {
        self.store.dependencies(&normalize_name(name))
    }

    /// Names of all stored assets, in load order.
    pub fn asset_names(&self) -> Vec<String> {
        self.store.names().map(str::to_string).collect()
    }

    /// Report failures to `listener` instead of returning them from `update`.
    pub fn set_error_listener(&mut self, listener: impl AssetErrorListener + 'static) {
        self.listener = Some(Box::new(listener));
    }

    /// Stop reporting failures to a listener.
    pub fn remove_error_listener(&mut self) {
        self.listener = None;
    }

    /// One line per stored asset: name, type, reference count and dependencies.
    pub fn diagnostics(&self) -> String {
        self.store.diagnostics()
    }

    /// The underlying store.
    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Unload everything.
    ///
    /// Queued requests are dropped, in-flight ones run to completion, then stored
    /// assets are released from the roots of the dependency graph down until the
    /// store is empty.
    pub fn clear(&mut self) {
        self.queue.clear();
        loop {
            match self.update() {
                Ok(true) => break,
                Ok(false) => self.pause(),
                Err(e) => tracing::warn!("Discarding failed load while clearing: {}", e),
            }
        }
        for pending in self.loadables.values() {
            pending.clear();
        }

        while !self.store.is_empty() {
            let roots = self.store.roots();
            if roots.is_empty() {
                tracing::warn!(
                    "No unreferenced assets left, dropping {} asset(s)",
                    self.store.len()
                );
                self.store.clear();
                break;
            }
            for name in roots {
                if let Err(e) = self.store.release(&name) {
                    tracing::warn!("Could not release '{}': {}", name, e);
                }
            }
        }

        self.loaded = 0;
        self.to_load = 0;
        self.peak_tasks = 0;
        self.progress_floor = 0.0;
        tracing::debug!("AssetManager cleared");
    }

    /// Unload everything and stop the background workers.
    ///
    /// Asynchronous loads requested afterwards fail with
    /// [`AssetError::ExecutorShutdown`].
    pub fn dispose(&mut self) {
        self.clear();
        if let Some(pool) = self.pool.take() {
            pool.shutdown();
        }
        tracing::debug!("AssetManager disposed");
    }

    /// Returns true once [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.pool.is_none()
    }
}
