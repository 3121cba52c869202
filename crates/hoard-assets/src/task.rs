//! The per-request loading state machine.
//!
//! A task is advanced one step at a time by the manager and never blocks the
//! driving thread: the off-thread phases of asynchronous loaders are submitted to
//! the [`TaskPool`] and polled on later steps.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_executor::Task;
use hoard_core::TaskPool;

use crate::descriptor::{AssetDescriptor, dedup_descriptors};
use crate::error::{AssetError, AssetResult};
use crate::io::ResourceResolver;
use crate::loader::{
    Dependencies, ErasedAsyncLoader, ErasedSyncLoader, LoadContext, LoadRequest, Loader,
    LoaderKind, StagedValue,
};
use crate::storage::{AssetStore, LoadedAsset};

/// Outcome of a single step.
pub(crate) enum Step {
    /// Nothing to report yet.
    Pending,
    /// These dependencies must be loaded before the task can continue.
    Inject(Vec<AssetDescriptor>),
    /// The asset was produced.
    Done(LoadedAsset),
    /// The cancel flag was observed.
    Cancelled,
}

/// Result of the off-thread discovery submission of an asynchronous loader.
enum Discovery {
    Dependencies(Vec<AssetDescriptor>),
    /// No dependencies, so the async phase ran in the same submission.
    Staged(StagedValue),
}

enum Phase {
    Created,
    Discovering(Task<AssetResult<Discovery>>),
    AwaitingDependencies,
    LoadingAsync(Task<AssetResult<StagedValue>>),
    Finished,
}

impl Phase {
    fn label(&self) -> &'static str {
        match self {
            Phase::Created => "created",
            Phase::Discovering(_) => "discovering dependencies",
            Phase::AwaitingDependencies => "awaiting dependencies",
            Phase::LoadingAsync(_) => "loading async",
            Phase::Finished => "finished",
        }
    }
}

pub(crate) struct LoadingTask {
    descriptor: AssetDescriptor,
    request: LoadRequest,
    loader: Loader,
    cancel: Arc<AtomicBool>,
    /// Stack index of the task that injected this one.
    parent: Option<usize>,
    phase: Phase,
    /// Dependencies this task currently holds a reference to.
    held: Vec<String>,
}

impl LoadingTask {
    pub(crate) fn new(
        mut descriptor: AssetDescriptor,
        loader: Loader,
        resolver: &dyn ResourceResolver,
        parent: Option<usize>,
    ) -> Self {
        let handle = descriptor.resolve_handle(|name| resolver.resolve(name));
        let request = LoadRequest::new(descriptor.name(), handle, descriptor.params().cloned());
        tracing::trace!(
            "Created task for {} ({})",
            descriptor,
            if loader.is_async() { "async" } else { "sync" }
        );

        Self {
            descriptor,
            request,
            loader,
            cancel: Arc::new(AtomicBool::new(false)),
            parent,
            phase: Phase::Created,
            held: Vec::new(),
        }
    }

    pub(crate) fn descriptor(&self) -> &AssetDescriptor {
        &self.descriptor
    }

    pub(crate) fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub(crate) fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Request cancellation. Safe to call while the task is mid-step elsewhere.
    pub(crate) fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// Returns true until the first step has run.
    pub(crate) fn is_created(&self) -> bool {
        matches!(self.phase, Phase::Created)
    }

    pub(crate) fn hold(&mut self, name: &str) {
        self.held.push(name.to_string());
    }

    pub(crate) fn held(&self) -> &[String] {
        &self.held
    }

    /// Advance by one discrete step.
    ///
    /// Errors raised by the loader are returned as-is; the manager decides how to
    /// unwind them.
    pub(crate) fn step(
        &mut self,
        store: &AssetStore,
        resolver: &dyn ResourceResolver,
        pool: Option<&TaskPool>,
    ) -> AssetResult<Step> {
        if self.is_cancelled() {
            // Work already running on the pool is left to finish and discarded.
            match std::mem::replace(&mut self.phase, Phase::Finished) {
                Phase::Discovering(task) => task.detach(),
                Phase::LoadingAsync(task) => task.detach(),
                _ => {}
            }
            tracing::debug!("Task for {} observed cancellation", self.descriptor);
            return Ok(Step::Cancelled);
        }

        tracing::trace!("Stepping {} ({})", self.descriptor, self.phase.label());

        match std::mem::replace(&mut self.phase, Phase::Finished) {
            Phase::Created => self.discover(store, resolver, pool),
            Phase::Discovering(mut task) => match TaskPool::try_take(&mut task) {
                None => {
                    self.phase = Phase::Discovering(task);
                    Ok(Step::Pending)
                }
                Some(discovery) => match discovery? {
                    Discovery::Dependencies(dependencies) => {
                        self.phase = Phase::AwaitingDependencies;
                        Ok(Step::Inject(dependencies))
                    }
                    Discovery::Staged(staged) => self.finish_async(store, resolver, staged),
                },
            },
            Phase::AwaitingDependencies => self.produce(store, resolver, pool),
            Phase::LoadingAsync(mut task) => match TaskPool::try_take(&mut task) {
                None => {
                    self.phase = Phase::LoadingAsync(task);
                    Ok(Step::Pending)
                }
                Some(staged) => self.finish_async(store, resolver, staged?),
            },
            Phase::Finished => Err(AssetError::Other {
                message: format!("task for '{}' was stepped after it finished", self.name()),
            }),
        }
    }

    fn discover(
        &mut self,
        store: &AssetStore,
        resolver: &dyn ResourceResolver,
        pool: Option<&TaskPool>,
    ) -> AssetResult<Step> {
        match &self.loader.kind {
            LoaderKind::Sync(loader) => match non_empty(loader.dependencies(&self.request)?) {
                Some(dependencies) => {
                    self.phase = Phase::AwaitingDependencies;
                    Ok(Step::Inject(dependencies))
                }
                None => {
                    let ctx = LoadContext::new(&self.request, store, resolver);
                    loader.load(&ctx).map(Step::Done)
                }
            },
            LoaderKind::Async(loader) => {
                let pool = pool.ok_or(AssetError::ExecutorShutdown)?;
                let loader = Arc::clone(loader);
                let request = self.request.clone();
                let task = pool.spawn(async move {
                    guarded(request.name(), || match non_empty(loader.dependencies(&request)?) {
                        Some(dependencies) => Ok(Discovery::Dependencies(dependencies)),
                        None => loader.load_async(&request).map(Discovery::Staged),
                    })
                });
                self.phase = Phase::Discovering(task);
                Ok(Step::Pending)
            }
        }
    }

    /// Runs once every dependency has been stored.
    fn produce(
        &mut self,
        store: &AssetStore,
        resolver: &dyn ResourceResolver,
        pool: Option<&TaskPool>,
    ) -> AssetResult<Step> {
        match &self.loader.kind {
            LoaderKind::Sync(loader) => {
                let ctx = LoadContext::new(&self.request, store, resolver);
                loader.load(&ctx).map(Step::Done)
            }
            LoaderKind::Async(loader) => {
                let pool = pool.ok_or(AssetError::ExecutorShutdown)?;
                let loader = Arc::clone(loader);
                let request = self.request.clone();
                let task = pool.spawn(async move {
                    guarded(request.name(), || loader.load_async(&request))
                });
                self.phase = Phase::LoadingAsync(task);
                Ok(Step::Pending)
            }
        }
    }

    fn finish_async(
        &mut self,
        store: &AssetStore,
        resolver: &dyn ResourceResolver,
        staged: StagedValue,
    ) -> AssetResult<Step> {
        let LoaderKind::Async(loader) = &self.loader.kind else {
            return Err(AssetError::Other {
                message: format!("staged value produced for synchronous load of '{}'", self.name()),
            });
        };
        let ctx = LoadContext::new(&self.request, store, resolver);
        loader.load_sync(&ctx, staged).map(Step::Done)
    }
}

/// Empty lists count as no dependencies; repeats are dropped.
fn non_empty(dependencies: Dependencies) -> Option<Vec<AssetDescriptor>> {
    let mut dependencies = dependencies.filter(|d| !d.is_empty())?;
    dedup_descriptors(&mut dependencies);
    Some(dependencies)
}

/// Run `job` on a worker, turning a panic into an error.
fn guarded<T>(name: &str, job: impl FnOnce() -> AssetResult<T>) -> AssetResult<T> {
    panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
        Err(AssetError::Panicked {
            name: name.to_string(),
            message: panic_message(payload.as_ref()),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryResolver;
    use crate::loader::{AsyncAssetLoader, SyncAssetLoader};
    use crate::{Asset, AssetType};
    use std::time::{Duration, Instant};

    struct Word(String);

    impl Asset for Word {
        fn type_name() -> &'static str {
            "Word"
        }
    }

    struct WordLoader {
        deps: Vec<&'static str>,
    }

    impl SyncAssetLoader for WordLoader {
        type Asset = Word;

        fn dependencies(&self, _request: &LoadRequest) -> AssetResult<Dependencies> {
            Ok(Some(self.deps.iter().map(|d| AssetDescriptor::new::<Word>(*d)).collect()))
        }

        fn load(&self, ctx: &LoadContext<'_>) -> AssetResult<Word> {
            Ok(Word(ctx.handle().read_string()?))
        }
    }

    struct UpperLoader;

    impl AsyncAssetLoader for UpperLoader {
        type Asset = Word;
        type Staged = String;

        fn load_async(&self, request: &LoadRequest) -> AssetResult<String> {
            Ok(request.handle().read_string()?.to_uppercase())
        }

        fn load_sync(&self, _ctx: &LoadContext<'_>, staged: String) -> AssetResult<Word> {
            Ok(Word(staged))
        }
    }

    struct PanickingLoader;

    impl AsyncAssetLoader for PanickingLoader {
        type Asset = Word;
        type Staged = ();

        fn load_async(&self, _request: &LoadRequest) -> AssetResult<()> {
            panic!("decoder exploded");
        }

        fn load_sync(&self, _ctx: &LoadContext<'_>, _staged: ()) -> AssetResult<Word> {
            unreachable!()
        }
    }

    fn resolver() -> MemoryResolver {
        MemoryResolver::new().with("hello", b"hello".to_vec())
    }

    fn task(loader: Loader, resolver: &MemoryResolver) -> LoadingTask {
        LoadingTask::new(AssetDescriptor::new::<Word>("hello"), loader, resolver, None)
    }

    fn step_until_done(
        task: &mut LoadingTask,
        store: &AssetStore,
        resolver: &MemoryResolver,
        pool: &TaskPool,
    ) -> Step {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match task.step(store, resolver, Some(pool)) {
                Ok(Step::Pending) => {
                    assert!(Instant::now() < deadline, "task did not finish in time");
                    std::thread::yield_now();
                }
                other => return other.unwrap_or_else(|e| panic!("step failed: {}", e)),
            }
        }
    }

    fn word(step: Step) -> String {
        match step {
            Step::Done(asset) => asset.value.downcast::<Word>().ok().unwrap().0.clone(),
            _ => panic!("expected a produced asset"),
        }
    }

    #[test]
    fn test_sync_loader_without_dependencies_loads_in_first_step() {
        let resolver = resolver();
        let store = AssetStore::new();
        let mut task = task(Loader::from_sync(WordLoader { deps: vec![] }), &resolver);

        let step = task.step(&store, &resolver, None).unwrap();
        assert_eq!(word(step), "hello");
    }

    #[test]
    fn test_sync_loader_reports_deduplicated_dependencies() {
        let resolver = resolver();
        let store = AssetStore::new();
        let loader = WordLoader {
            deps: vec!["a", "b", "a"],
        };
        let mut task = task(Loader::from_sync(loader), &resolver);

        match task.step(&store, &resolver, None).unwrap() {
            Step::Inject(deps) => {
                let names: Vec<_> = deps.iter().map(|d| d.name()).collect();
                assert_eq!(names, vec!["a", "b"]);
            }
            _ => panic!("expected dependencies"),
        }

        // Dependencies satisfied: the next step produces the asset.
        assert_eq!(word(task.step(&store, &resolver, None).unwrap()), "hello");
    }

    #[test]
    fn test_async_loader_runs_off_thread() {
        let resolver = resolver();
        let store = AssetStore::new();
        let pool = TaskPool::new(1);
        let mut task = task(Loader::from_async(UpperLoader), &resolver);

        assert!(matches!(task.step(&store, &resolver, Some(&pool)), Ok(Step::Pending)));
        assert_eq!(word(step_until_done(&mut task, &store, &resolver, &pool)), "HELLO");
    }

    #[test]
    fn test_async_loader_without_pool_fails() {
        let resolver = resolver();
        let store = AssetStore::new();
        let mut task = task(Loader::from_async(UpperLoader), &resolver);

        assert!(matches!(
            task.step(&store, &resolver, None),
            Err(AssetError::ExecutorShutdown)
        ));
    }

    #[test]
    fn test_worker_panic_becomes_error() {
        let resolver = resolver();
        let store = AssetStore::new();
        let pool = TaskPool::new(1);
        let mut task = task(Loader::from_async(PanickingLoader), &resolver);

        let deadline = Instant::now() + Duration::from_secs(5);
        let err = loop {
            match task.step(&store, &resolver, Some(&pool)) {
                Ok(Step::Pending) => {
                    assert!(Instant::now() < deadline);
                    std::thread::yield_now();
                }
                Ok(_) => panic!("expected failure"),
                Err(err) => break err,
            }
        };
        match err {
            AssetError::Panicked { name, message } => {
                assert_eq!(name, "hello");
                assert_eq!(message, "decoder exploded");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_cancel_is_observed_before_stepping() {
        let resolver = resolver();
        let store = AssetStore::new();
        let mut task = task(Loader::from_sync(WordLoader { deps: vec![] }), &resolver);

        task.cancel();
        assert!(matches!(task.step(&store, &resolver, None), Ok(Step::Cancelled)));
        assert_eq!(task.descriptor().asset_type(), AssetType::of::<Word>());
    }
}
