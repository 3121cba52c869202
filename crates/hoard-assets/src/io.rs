//! Resolving asset names to byte-providing handles.
//!
//! The manager never reads files itself. A [`ResourceResolver`] turns a logical
//! name into a [`ResourceHandle`], and loaders pull bytes through that handle.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hoard_core::alloc::HashMap;

use crate::error::{AssetError, AssetResult};

/// Something that can provide the bytes of one resource.
pub trait ByteSource: Send + Sync {
    /// Read all bytes of the resource.
    fn read_bytes(&self) -> AssetResult<Vec<u8>>;

    /// Check whether the resource exists.
    fn exists(&self) -> bool;

    /// A human readable location for logs and errors.
    fn display_path(&self) -> String;
}

/// A cheap, clonable handle to a resolved resource.
#[derive(Clone)]
pub struct ResourceHandle {
    name: Arc<str>,
    source: Arc<dyn ByteSource>,
}

impl ResourceHandle {
    /// Wrap a byte source under the given logical name.
    pub fn new(name: impl Into<Arc<str>>, source: impl ByteSource + 'static) -> Self {
        Self {
            name: name.into(),
            source: Arc::new(source),
        }
    }

    /// The logical name this handle was resolved from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The file extension of the name (without the dot), if any.
    pub fn extension(&self) -> Option<&str> {
        let name: &str = &self.name;
        let file = name.rsplit('/').next().unwrap_or(name);
        file.rsplit_once('.').map(|(_, ext)| ext).filter(|ext| !ext.is_empty())
    }

    /// Read all bytes of the resource.
    pub fn read_bytes(&self) -> AssetResult<Vec<u8>> {
        self.source.read_bytes()
    }

    /// Read the resource as UTF-8 text.
    pub fn read_string(&self) -> AssetResult<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes)
            .map_err(|e| AssetError::loader(self.name(), format!("Invalid UTF-8: {}", e)))
    }

    /// Check whether the resource exists.
    pub fn exists(&self) -> bool {
        self.source.exists()
    }

    /// A human readable location for logs and errors.
    pub fn display_path(&self) -> String {
        self.source.display_path()
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("name", &self.name)
            .field("location", &self.source.display_path())
            .finish()
    }
}

/// Maps a logical name to a resource handle.
///
/// Resolution itself never fails; a handle to a missing resource reports
/// `exists() == false` and errors when read.
pub trait ResourceResolver: Send + Sync {
    /// Resolve `name` to a handle.
    fn resolve(&self, name: &str) -> ResourceHandle;
}

impl<F> ResourceResolver for F
where
    F: Fn(&str) -> ResourceHandle + Send + Sync,
{
    fn resolve(&self, name: &str) -> ResourceHandle {
        self(name)
    }
}

/// A file on disk.
struct DiskSource {
    path: PathBuf,
}

impl ByteSource for DiskSource {
    fn read_bytes(&self) -> AssetResult<Vec<u8>> {
        std::fs::read(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AssetError::NotFound {
                    path: self.path.display().to_string(),
                }
            } else {
                AssetError::IoError {
                    path: self.path.clone(),
                    source: e,
                }
            }
        })
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

/// Resolves names relative to a base directory on disk.
#[derive(Debug, Clone)]
pub struct FileResolver {
    base_path: PathBuf,
}

impl FileResolver {
    /// Create a new file resolver with a base path.
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// The base directory.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve_path(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }
}

impl ResourceResolver for FileResolver {
    fn resolve(&self, name: &str) -> ResourceHandle {
        ResourceHandle::new(
            name,
            DiskSource {
                path: self.resolve_path(name),
            },
        )
    }
}

/// Bytes held in memory.
struct MemorySource {
    key: String,
    bytes: Option<Arc<[u8]>>,
}

impl ByteSource for MemorySource {
    fn read_bytes(&self) -> AssetResult<Vec<u8>> {
        self.bytes
            .as_ref()
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| AssetError::NotFound {
                path: self.display_path(),
            })
    }

    fn exists(&self) -> bool {
        self.bytes.is_some()
    }

    fn display_path(&self) -> String {
        format!("memory://{}", self.key)
    }
}

/// In-memory resolver for tests or embedded assets.
///
/// The table is fixed at resolve time: a handle keeps the bytes it was resolved
/// with even if the entry is replaced afterwards.
#[derive(Default, Clone)]
pub struct MemoryResolver {
    files: HashMap<String, Arc<[u8]>>,
}

impl MemoryResolver {
    /// Create a new empty memory resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add bytes for a name.
    pub fn insert(&mut self, name: impl AsRef<str>, bytes: impl Into<Arc<[u8]>>) {
        self.files.insert(name.as_ref().to_string(), bytes.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl AsRef<str>, bytes: impl Into<Arc<[u8]>>) -> Self {
        self.insert(name, bytes);
        self
    }

    /// Remove bytes for a name.
    pub fn remove(&mut self, name: impl AsRef<str>) -> Option<Arc<[u8]>> {
        self.files.remove(name.as_ref())
    }

    /// Check if bytes exist for a name.
    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        self.files.contains_key(name.as_ref())
    }
}

impl ResourceResolver for MemoryResolver {
    fn resolve(&self, name: &str) -> ResourceHandle {
        ResourceHandle::new(
            name,
            MemorySource {
                key: name.to_string(),
                bytes: self.files.get(name).cloned(),
            },
        )
    }
}

/// Looks for a variant of each resource in a sibling folder first.
///
/// `"ui/skin.png"` with folder `"hd"` resolves to `"ui/hd/skin.png"` when that
/// exists, and to `"ui/skin.png"` otherwise.
pub struct FallbackResolver<R> {
    inner: R,
    folder: String,
}

impl<R: ResourceResolver> FallbackResolver<R> {
    /// Wrap `inner`, preferring resources under `folder`.
    pub fn new(inner: R, folder: impl Into<String>) -> Self {
        Self {
            inner,
            folder: folder.into(),
        }
    }

    fn variant_name(&self, name: &str) -> String {
        match name.rsplit_once('/') {
            Some((parent, file)) if !parent.is_empty() => {
                format!("{}/{}/{}", parent, self.folder, file)
            }
            Some((_, file)) => format!("{}/{}", self.folder, file),
            None => format!("{}/{}", self.folder, name),
        }
    }
}

impl<R: ResourceResolver> ResourceResolver for FallbackResolver<R> {
    fn resolve(&self, name: &str) -> ResourceHandle {
        let variant = self.inner.resolve(&self.variant_name(name));
        if variant.exists() {
            tracing::trace!("Resolved '{}' to variant {}", name, variant.display_path());
            return variant;
        }
        self.inner.resolve(name)
    }
}
