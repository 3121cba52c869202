//! Error types for the asset system.

use std::fmt;
use std::path::PathBuf;

use crate::AssetType;

/// Errors that can occur during asset operations.
///
/// `NoLoader`, `TypeMismatch` and `NotLoaded` are configuration errors and are
/// returned straight to the caller of the offending API. Everything raised while a
/// loader runs goes through the manager's rollback path first.
#[derive(Debug)]
pub enum AssetError {
    /// The requested resource was not found by the resolver.
    NotFound {
        /// The path or identifier of the resource.
        path: String,
    },

    /// Failed to read resource data.
    IoError {
        /// The path that failed to load.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// No loader registered for this asset type.
    NoLoader {
        /// The type that was requested.
        asset_type: AssetType,
    },

    /// A one-off loader was requested for a type that already has a loader.
    LoaderExists {
        /// The type that already has a loader.
        asset_type: AssetType,
    },

    /// The same name is already known under a different type.
    TypeMismatch {
        /// The asset name.
        name: String,
        /// The type the caller asked for.
        expected: AssetType,
        /// The type the name is registered under.
        found: AssetType,
    },

    /// The asset is not loaded.
    NotLoaded {
        /// The asset name.
        name: String,
    },

    /// The loader failed to parse/decode the asset.
    LoaderError {
        /// The asset being loaded.
        name: String,
        /// Description of the error.
        message: String,
    },

    /// A dependency refers back to one of the assets that requested it.
    DependencyCycle {
        /// The dependency that closes the cycle.
        name: String,
        /// The requesting chain, outermost first.
        chain: Vec<String>,
    },

    /// A loader panicked while running on the worker pool.
    Panicked {
        /// The asset being loaded.
        name: String,
        /// The panic payload, if it was a string.
        message: String,
    },

    /// The background executor has already been released.
    ExecutorShutdown,

    /// Generic error with a message.
    Other {
        /// Error message.
        message: String,
    },
}

impl AssetError {
    /// Shorthand for a [`AssetError::LoaderError`].
    pub fn loader(name: impl Into<String>, message: impl Into<String>) -> Self {
        AssetError::LoaderError {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns true for errors caused by how the manager was used rather than by a
    /// loader.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AssetError::NoLoader { .. }
                | AssetError::LoaderExists { .. }
                | AssetError::TypeMismatch { .. }
                | AssetError::NotLoaded { .. }
        )
    }
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::NotFound { path } => {
                write!(f, "Resource not found: {}", path)
            }
            AssetError::IoError { path, source } => {
                write!(f, "IO error loading '{}': {}", path.display(), source)
            }
            AssetError::NoLoader { asset_type } => {
                write!(f, "No loader registered for asset type: {}", asset_type)
            }
            AssetError::LoaderExists { asset_type } => {
                write!(f, "Loader already registered for asset type: {}", asset_type)
            }
            AssetError::TypeMismatch {
                name,
                expected,
                found,
            } => {
                write!(
                    f,
                    "Asset '{}' is registered with a different type (expected: {}, found: {})",
                    name, expected, found
                )
            }
            AssetError::NotLoaded { name } => {
                write!(f, "Asset not loaded: {}", name)
            }
            AssetError::LoaderError { name, message } => {
                write!(f, "Failed to load '{}': {}", name, message)
            }
            AssetError::DependencyCycle { name, chain } => {
                write!(f, "Dependency cycle: {} -> {}", chain.join(" -> "), name)
            }
            AssetError::Panicked { name, message } => {
                write!(f, "Loader panicked while loading '{}': {}", name, message)
            }
            AssetError::ExecutorShutdown => {
                write!(f, "Asset executor has been shut down")
            }
            AssetError::Other { message } => {
                write!(f, "Asset error: {}", message)
            }
        }
    }
}

impl std::error::Error for AssetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AssetError::IoError { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AssetError {
    fn from(err: std::io::Error) -> Self {
        AssetError::IoError {
            path: PathBuf::new(),
            source: err,
        }
    }
}

/// Result type alias for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_type_mismatch() {
        let err = AssetError::TypeMismatch {
            name: "ui/skin".to_string(),
            expected: AssetType::named("Texture"),
            found: AssetType::named("Font"),
        };
        assert_eq!(
            err.to_string(),
            "Asset 'ui/skin' is registered with a different type (expected: Texture, found: Font)"
        );
        assert!(err.is_configuration());
    }

    #[test]
    fn test_display_cycle() {
        let err = AssetError::DependencyCycle {
            name: "a".to_string(),
            chain: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "Dependency cycle: a -> b -> a");
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_display_loader_exists() {
        let err = AssetError::LoaderExists {
            asset_type: AssetType::named("Level"),
        };
        assert_eq!(err.to_string(), "Loader already registered for asset type: Level");
        assert!(err.is_configuration());
    }

    #[test]
    fn test_io_error_source() {
        use std::error::Error;

        let err: AssetError = std::io::Error::other("disk on fire").into();
        assert!(err.source().is_some());
    }
}
