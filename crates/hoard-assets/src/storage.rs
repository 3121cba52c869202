//! Reference-counted asset storage and the dependency graph.
//!
//! Every stored asset has a reference count that starts at one. Each edge
//! `parent -> child` in the dependency graph accounts for exactly one reference
//! on the child, and re-referencing a parent re-references its whole subtree, so
//! releasing the parent later walks the same subtree back down.

use std::fmt::Write as _;

use hoard_core::alloc::HashMap;
use indexmap::IndexMap;

use crate::error::{AssetError, AssetResult};
use crate::{Asset, AssetType, ErasedAsset};

/// Store key: an asset name under a type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetKey {
    /// The asset type.
    pub asset_type: AssetType,
    /// The normalized asset name.
    pub name: String,
}

impl AssetKey {
    /// Create a key.
    pub fn new(asset_type: AssetType, name: impl Into<String>) -> Self {
        Self {
            asset_type,
            name: name.into(),
        }
    }
}

/// A freshly produced asset, ready to be stored.
pub(crate) struct LoadedAsset {
    pub(crate) value: ErasedAsset,
    pub(crate) dispose: fn(&ErasedAsset),
}

impl LoadedAsset {
    pub(crate) fn new<T: Asset>(asset: T) -> Self {
        Self {
            value: std::sync::Arc::new(asset),
            dispose: dispose_erased::<T>,
        }
    }
}

fn dispose_erased<T: Asset>(value: &ErasedAsset) {
    if let Some(asset) = value.downcast_ref::<T>() {
        asset.dispose();
    }
}

struct StoredAsset {
    value: ErasedAsset,
    ref_count: u32,
    dispose: fn(&ErasedAsset),
}

/// Loaded assets, their reference counts and the dependency graph.
///
/// An entry exists in the store exactly when its name is in the name index.
#[derive(Default)]
pub struct AssetStore {
    entries: HashMap<AssetKey, StoredAsset>,
    /// Name to type, in load order.
    types: IndexMap<String, AssetType>,
    /// Parent name to the ordered, de-duplicated names it depends on.
    dependencies: HashMap<String, Vec<String>>,
}

impl AssetStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: &str, asset_type: AssetType, asset: LoadedAsset) {
        self.types.insert(name.to_string(), asset_type);
        self.entries.insert(
            AssetKey::new(asset_type, name),
            StoredAsset {
                value: asset.value,
                ref_count: 1,
                dispose: asset.dispose,
            },
        );
    }

    fn entry(&self, name: &str) -> Option<&StoredAsset> {
        let asset_type = *self.types.get(name)?;
        self.entries.get(&AssetKey::new(asset_type, name))
    }

    fn entry_mut(&mut self, name: &str) -> Option<&mut StoredAsset> {
        let asset_type = *self.types.get(name)?;
        self.entries.get_mut(&AssetKey::new(asset_type, name))
    }

    /// Returns true if `name` is loaded under any type.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Returns true if `name` is loaded under `asset_type`.
    pub fn is_loaded_as(&self, name: &str, asset_type: AssetType) -> bool {
        self.types.get(name) == Some(&asset_type)
    }

    /// The type `name` is stored under.
    pub fn asset_type(&self, name: &str) -> Option<AssetType> {
        self.types.get(name).copied()
    }

    /// The stored value of `name`.
    pub fn get_erased(&self, name: &str) -> Option<&ErasedAsset> {
        self.entry(name).map(|e| &e.value)
    }

    /// The stored value of `name`, downcast to `T`.
    pub fn get<T: Asset>(&self, name: &str) -> AssetResult<std::sync::Arc<T>> {
        let expected = AssetType::of::<T>();
        let found = self.asset_type(name).ok_or_else(|| AssetError::NotLoaded {
            name: name.to_string(),
        })?;
        let mismatch = || AssetError::TypeMismatch {
            name: name.to_string(),
            expected,
            found,
        };
        if found != expected {
            return Err(mismatch());
        }
        let value = self.get_erased(name).ok_or_else(|| AssetError::NotLoaded {
            name: name.to_string(),
        })?;
        std::sync::Arc::clone(value).downcast::<T>().map_err(|_| mismatch())
    }

    /// Every stored value of type `T`, in load order.
    pub fn all<T: Asset>(&self) -> Vec<std::sync::Arc<T>> {
        let asset_type = AssetType::of::<T>();
        self.types
            .iter()
            .filter(|(_, stored)| **stored == asset_type)
            .filter_map(|(name, _)| self.get_erased(name))
            .filter_map(|value| std::sync::Arc::clone(value).downcast::<T>().ok())
            .collect()
    }

    /// Find the name under which `value` is stored.
    pub fn name_of(&self, value: &ErasedAsset) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, entry)| std::sync::Arc::ptr_eq(&entry.value, value))
            .map(|(key, _)| key.name.as_str())
    }

    /// The reference count of `name`.
    pub fn ref_count(&self, name: &str) -> Option<u32> {
        self.entry(name).map(|e| e.ref_count)
    }

    /// Override the reference count of `name`.
    pub fn set_ref_count(&mut self, name: &str, count: u32) -> AssetResult<()> {
        let entry = self.entry_mut(name).ok_or_else(|| AssetError::NotLoaded {
            name: name.to_string(),
        })?;
        entry.ref_count = count;
        Ok(())
    }

    /// Add one reference to `name` and to every asset below it in the graph.
    pub(crate) fn retain(&mut self, name: &str) {
        let mut pending = vec![name.to_string()];
        while let Some(current) = pending.pop() {
            let Some(entry) = self.entry_mut(&current) else {
                tracing::warn!("Dependency '{}' is not loaded, skipping reference", current);
                continue;
            };
            entry.ref_count = entry.ref_count.saturating_add(1);
            if let Some(deps) = self.dependencies.get(&current) {
                pending.extend(deps.iter().rev().cloned());
            }
        }
    }

    /// Drop one reference to `name` and to every asset below it in the graph.
    ///
    /// Assets reaching zero are disposed and removed; their edge lists are dropped.
    /// Returns the names that were removed, in removal order.
    pub(crate) fn release(&mut self, name: &str) -> AssetResult<Vec<String>> {
        if !self.is_loaded(name) {
            return Err(AssetError::NotLoaded {
                name: name.to_string(),
            });
        }

        let mut removed = Vec::new();
        let mut pending = vec![name.to_string()];
        while let Some(current) = pending.pop() {
            let Some(asset_type) = self.asset_type(&current) else {
                continue;
            };
            let key = AssetKey::new(asset_type, current.as_str());
            let Some(entry) = self.entries.get_mut(&key) else {
                continue;
            };

            entry.ref_count = entry.ref_count.saturating_sub(1);
            let dropped = entry.ref_count == 0;
            if dropped {
                if let Some(entry) = self.entries.remove(&key) {
                    (entry.dispose)(&entry.value);
                }
                self.types.shift_remove(&current);
                tracing::debug!("Unloaded asset '{}' ({})", current, asset_type);
            }

            if let Some(deps) = self.dependencies.get(&current) {
                pending.extend(deps.iter().rev().cloned());
            }
            if dropped {
                self.dependencies.remove(&current);
                removed.push(current);
            }
        }
        Ok(removed)
    }

    /// Record that `parent` depends on `child`. Repeated edges are ignored.
    pub(crate) fn add_dependency(&mut self, parent: &str, child: &str) {
        let deps = self.dependencies.entry(parent.to_string()).or_default();
        if !deps.iter().any(|d| d == child) {
            deps.push(child.to_string());
        }
    }

    /// Forget the edge list of `parent`.
    pub(crate) fn remove_dependencies(&mut self, parent: &str) {
        self.dependencies.remove(parent);
    }

    /// The names `parent` depends on.
    pub fn dependencies(&self, parent: &str) -> Option<&[String]> {
        self.dependencies.get(parent).map(|v| v.as_slice())
    }

    /// Loaded names, in load order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(|k| k.as_str())
    }

    /// Loaded names that no other loaded asset depends on.
    pub fn roots(&self) -> Vec<String> {
        let mut referenced: HashMap<&str, u32> = HashMap::new();
        for name in self.types.keys() {
            if let Some(deps) = self.dependencies.get(name) {
                for dep in deps {
                    *referenced.entry(dep.as_str()).or_default() += 1;
                }
            }
        }
        self.types
            .keys()
            .filter(|name| !referenced.contains_key(name.as_str()))
            .cloned()
            .collect()
    }

    /// Number of loaded assets.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if nothing is loaded.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Drop everything without disposing.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.types.clear();
        self.dependencies.clear();
    }

    /// One line per loaded asset: name, type, reference count and dependencies.
    pub fn diagnostics(&self) -> String {
        let mut out = String::new();
        for (name, asset_type) in &self.types {
            let refs = self.ref_count(name).unwrap_or(0);
            let _ = write!(out, "{}, {}, refs: {}", name, asset_type, refs);
            if let Some(deps) = self.dependencies.get(name) {
                let _ = write!(out, ", deps: [{}]", deps.join(","));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Blob(u32);

    impl Asset for Blob {
        fn type_name() -> &'static str {
            "Blob"
        }
    }

    static DISPOSED: AtomicUsize = AtomicUsize::new(0);

    struct Disposable;

    impl Asset for Disposable {
        fn type_name() -> &'static str {
            "Disposable"
        }

        fn dispose(&self) {
            DISPOSED.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn blob_type() -> AssetType {
        AssetType::of::<Blob>()
    }

    #[test]
    fn test_insert_and_get() {
        let mut store = AssetStore::new();
        store.insert("a", blob_type(), LoadedAsset::new(Blob(7)));

        assert!(store.is_loaded("a"));
        assert!(store.is_loaded_as("a", blob_type()));
        assert_eq!(store.get::<Blob>("a").unwrap().0, 7);
        assert_eq!(store.ref_count("a"), Some(1));
        assert!(matches!(store.get::<Disposable>("a"), Err(AssetError::TypeMismatch { .. })));
        assert!(matches!(store.get::<Blob>("b"), Err(AssetError::NotLoaded { .. })));
    }

    #[test]
    fn test_all_filters_by_type() {
        let mut store = AssetStore::new();
        store.insert("one", blob_type(), LoadedAsset::new(Blob(1)));
        store.insert("d", AssetType::of::<Disposable>(), LoadedAsset::new(Disposable));
        store.insert("two", blob_type(), LoadedAsset::new(Blob(2)));

        let blobs: Vec<u32> = store.all::<Blob>().iter().map(|b| b.0).collect();
        assert_eq!(blobs, vec![1, 2]);
        assert_eq!(store.all::<Disposable>().len(), 1);
    }

    #[test]
    fn test_retain_walks_subtree() {
        let mut store = AssetStore::new();
        for name in ["a", "b", "c"] {
            store.insert(name, blob_type(), LoadedAsset::new(Blob(0)));
        }
        store.add_dependency("a", "b");
        store.add_dependency("b", "c");

        store.retain("a");
        assert_eq!(store.ref_count("a"), Some(2));
        assert_eq!(store.ref_count("b"), Some(2));
        assert_eq!(store.ref_count("c"), Some(2));
    }

    #[test]
    fn test_release_removes_at_zero() {
        let mut store = AssetStore::new();
        store.insert("a", blob_type(), LoadedAsset::new(Blob(0)));
        store.insert("b", blob_type(), LoadedAsset::new(Blob(0)));
        store.add_dependency("a", "b");

        let removed = store.release("a").unwrap();
        assert_eq!(removed, vec!["a".to_string(), "b".to_string()]);
        assert!(store.is_empty());
        assert!(store.dependencies("a").is_none());
        assert!(matches!(store.release("a"), Err(AssetError::NotLoaded { .. })));
    }

    #[test]
    fn test_release_keeps_shared_dependency() {
        // a -> [b, c], c -> [b]; b carries one reference per parent edge.
        let mut store = AssetStore::new();
        for name in ["b", "c", "a"] {
            store.insert(name, blob_type(), LoadedAsset::new(Blob(0)));
        }
        store.add_dependency("c", "b");
        store.add_dependency("a", "b");
        store.add_dependency("a", "c");
        store.set_ref_count("b", 2).unwrap();

        store.release("a").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_dispose_called_once() {
        let mut store = AssetStore::new();
        let disposable = AssetType::of::<Disposable>();
        store.insert("d", disposable, LoadedAsset::new(Disposable));
        store.retain("d");

        let before = DISPOSED.load(Ordering::SeqCst);
        store.release("d").unwrap();
        assert_eq!(DISPOSED.load(Ordering::SeqCst), before);
        store.release("d").unwrap();
        assert_eq!(DISPOSED.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn test_roots_and_diagnostics() {
        let mut store = AssetStore::new();
        store.insert("leaf", blob_type(), LoadedAsset::new(Blob(0)));
        store.insert("root", blob_type(), LoadedAsset::new(Blob(0)));
        store.add_dependency("root", "leaf");
        store.add_dependency("root", "leaf");

        assert_eq!(store.roots(), vec!["root".to_string()]);
        assert_eq!(store.dependencies("root").unwrap(), &["leaf".to_string()]);
        assert_eq!(
            store.diagnostics(),
            "leaf, Blob, refs: 1\nroot, Blob, refs: 1, deps: [leaf]\n"
        );
    }

    #[test]
    fn test_name_of_uses_identity() {
        let mut store = AssetStore::new();
        store.insert("a", blob_type(), LoadedAsset::new(Blob(1)));
        store.insert("b", blob_type(), LoadedAsset::new(Blob(1)));

        let b = store.get_erased("b").cloned().unwrap();
        assert_eq!(store.name_of(&b), Some("b"));

        let stranger: ErasedAsset = Arc::new(Blob(1));
        assert_eq!(store.name_of(&stranger), None);
    }
}
