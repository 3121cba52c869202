//! Asset descriptors and loader parameters.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use hoard_core::alloc::HashSet;

use crate::error::AssetError;
use crate::io::ResourceHandle;
use crate::manager::AssetManager;
use crate::{Asset, AssetType, ErasedAsset};

/// Called with the manager, asset name and type once an asset is available.
pub type LoadedCallback = Arc<dyn Fn(&AssetManager, &str, AssetType) + Send + Sync>;

pub(crate) type ValueCallback = Arc<dyn Fn(&ErasedAsset) + Send + Sync>;
pub(crate) type ErrorCallback = Arc<dyn Fn(&AssetError) + Send + Sync>;

/// Normalize an asset name: backslashes become forward slashes.
pub fn normalize_name(name: &str) -> String {
    name.replace('\\', "/")
}

/// Loader specific settings for one request.
///
/// The settings value is opaque to the manager; loaders read it back with
/// [`settings`](Self::settings).
#[derive(Clone, Default)]
pub struct LoaderParams {
    settings: Option<Arc<dyn Any + Send + Sync>>,
    loaded_callback: Option<LoadedCallback>,
}

impl LoaderParams {
    /// Parameters carrying a settings value.
    pub fn new<P: Any + Send + Sync>(settings: P) -> Self {
        Self {
            settings: Some(Arc::new(settings)),
            loaded_callback: None,
        }
    }

    /// The settings value, if one of type `P` was given.
    pub fn settings<P: Any>(&self) -> Option<&P> {
        self.settings.as_deref().and_then(|s| s.downcast_ref::<P>())
    }

    /// Invoke `callback` once the asset is stored (or re-referenced).
    pub fn with_loaded_callback(
        mut self,
        callback: impl Fn(&AssetManager, &str, AssetType) + Send + Sync + 'static,
    ) -> Self {
        self.loaded_callback = Some(Arc::new(callback));
        self
    }

    pub(crate) fn loaded_callback(&self) -> Option<&LoadedCallback> {
        self.loaded_callback.as_ref()
    }
}

impl fmt::Debug for LoaderParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderParams")
            .field("has_settings", &self.settings.is_some())
            .field("has_loaded_callback", &self.loaded_callback.is_some())
            .finish()
    }
}

/// Identity of a requested asset: name, type and loader parameters.
///
/// Two descriptors refer to the same asset when their name and type match.
#[derive(Clone)]
pub struct AssetDescriptor {
    name: String,
    asset_type: AssetType,
    params: Option<LoaderParams>,
    handle: Option<ResourceHandle>,
    on_loaded: Option<ValueCallback>,
    on_error: Option<ErrorCallback>,
}

impl AssetDescriptor {
    /// Describe asset `name` of type `T`.
    pub fn new<T: Asset>(name: impl AsRef<str>) -> Self {
        Self::with_type(name, AssetType::of::<T>())
    }

    /// Describe asset `name` under an explicit type tag.
    pub fn with_type(name: impl AsRef<str>, asset_type: AssetType) -> Self {
        Self {
            name: normalize_name(name.as_ref()),
            asset_type,
            params: None,
            handle: None,
            on_loaded: None,
            on_error: None,
        }
    }

    /// Attach loader parameters.
    pub fn with_params(mut self, params: LoaderParams) -> Self {
        self.params = Some(params);
        self
    }

    /// Use an already resolved handle instead of asking the resolver.
    pub fn with_handle(mut self, handle: ResourceHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Invoke `callback` with the asset once it is available.
    ///
    /// `T` must be the type this descriptor was created for; otherwise the
    /// callback never fires.
    pub fn on_loaded<T: Asset>(
        mut self,
        callback: impl Fn(Arc<T>) + Send + Sync + 'static,
    ) -> Self {
        debug_assert_eq!(self.asset_type, AssetType::of::<T>());
        self.on_loaded = Some(Arc::new(move |asset: &ErasedAsset| {
            if let Ok(typed) = Arc::clone(asset).downcast::<T>() {
                callback(typed);
            }
        }));
        self
    }

    /// Invoke `callback` if loading this asset fails.
    ///
    /// A descriptor with an error callback does not abort the pipeline on failure.
    pub fn on_error(mut self, callback: impl Fn(&AssetError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// The normalized asset name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared asset type.
    pub fn asset_type(&self) -> AssetType {
        self.asset_type
    }

    /// The loader parameters, if any.
    pub fn params(&self) -> Option<&LoaderParams> {
        self.params.as_ref()
    }

    /// The resolved handle, if it has been resolved yet.
    pub fn handle(&self) -> Option<&ResourceHandle> {
        self.handle.as_ref()
    }

    /// Returns true if `other` names the same asset.
    pub fn same_asset(&self, other: &AssetDescriptor) -> bool {
        self.asset_type == other.asset_type && self.name == other.name
    }

    pub(crate) fn has_error_callback(&self) -> bool {
        self.on_error.is_some()
    }

    pub(crate) fn resolve_handle(
        &mut self,
        resolve: impl FnOnce(&str) -> ResourceHandle,
    ) -> ResourceHandle {
        self.handle.get_or_insert_with(|| resolve(&self.name)).clone()
    }

    pub(crate) fn notify_loaded(&self, asset: &ErasedAsset) {
        if let Some(callback) = &self.on_loaded {
            callback(asset);
        }
    }

    pub(crate) fn notify_error(&self, error: &AssetError) {
        if let Some(callback) = &self.on_error {
            callback(error);
        }
    }
}

impl fmt::Debug for AssetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetDescriptor")
            .field("name", &self.name)
            .field("type", &self.asset_type)
            .field("params", &self.params)
            .finish()
    }
}

impl fmt::Display for AssetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.name, self.asset_type)
    }
}

/// Remove repeated (name, type) pairs, keeping the first occurrence in order.
pub(crate) fn dedup_descriptors(descriptors: &mut Vec<AssetDescriptor>) {
    let mut seen = HashSet::new();
    descriptors.retain(|desc| seen.insert((desc.name().to_string(), desc.asset_type())));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    struct Texture;

    impl Asset for Texture {
        fn type_name() -> &'static str {
            "Texture"
        }
    }

    struct Font;

    impl Asset for Font {
        fn type_name() -> &'static str {
            "Font"
        }
    }

    #[derive(Debug, PartialEq)]
    struct TextureSettings {
        mipmaps: bool,
    }

    #[test]
    fn test_name_is_normalized() {
        let desc = AssetDescriptor::new::<Texture>("ui\\icons\\close.png");
        assert_eq!(desc.name(), "ui/icons/close.png");
        assert_eq!(desc.asset_type(), AssetType::named("Texture"));
    }

    #[test]
    fn test_params_settings_roundtrip() {
        let params = LoaderParams::new(TextureSettings { mipmaps: true });
        assert_eq!(params.settings::<TextureSettings>(), Some(&TextureSettings { mipmaps: true }));
        assert_eq!(params.settings::<u32>(), None);
        assert!(LoaderParams::default().settings::<TextureSettings>().is_none());
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let mut descs = vec![
            AssetDescriptor::new::<Texture>("a.png"),
            AssetDescriptor::new::<Font>("a.png"),
            AssetDescriptor::new::<Texture>("b.png"),
            AssetDescriptor::new::<Texture>("a.png").with_params(LoaderParams::new(1u8)),
        ];
        dedup_descriptors(&mut descs);

        let names: Vec<_> = descs.iter().map(|d| d.to_string()).collect();
        assert_eq!(names, vec!["a.png, Texture", "a.png, Font", "b.png, Texture"]);
        assert!(descs[0].params().is_none());
    }

    #[test]
    fn test_on_loaded_downcasts() {
        struct Counter(i32);
        impl Asset for Counter {
            fn type_name() -> &'static str {
                "Counter"
            }
        }

        let seen = Arc::new(AtomicI32::new(0));
        let seen_clone = seen.clone();
        let desc = AssetDescriptor::new::<Counter>("c")
            .on_loaded(move |c: Arc<Counter>| seen_clone.store(c.0, Ordering::SeqCst));

        let value: ErasedAsset = Arc::new(Counter(5));
        desc.notify_loaded(&value);
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }
}
