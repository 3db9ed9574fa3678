use std::path::{Path, PathBuf};

/// Namespace tag for ordinary disk files.
pub const FILE_NAMESPACE: &str = "file";
/// Namespace tag for `data:` URL imports.
pub const DATA_URL_NAMESPACE: &str = "data-url";

/// Outcome of resolving one import specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The import is part of the build: load `path` from `namespace`.
    Path { path: PathBuf, namespace: String },
    /// The import stays external; the emitted bundle keeps the specifier
    /// verbatim.
    External { specifier: String },
}

impl Resolution {
    pub fn file(path: PathBuf) -> Self {
        Resolution::Path {
            path,
            namespace: FILE_NAMESPACE.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Could not resolve {specifier:?} from {importer}")]
    NotFound { specifier: String, importer: PathBuf },
    #[error("Could not resolve {specifier:?}: AMD plugin {plugin:?} is not configured")]
    UnknownAmdPlugin { specifier: String, plugin: String },
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Resolver contract: maps `(specifier, importer, resolve_dir)` to a file
/// or an external. Implementations must be deterministic and pure with
/// respect to the filesystem snapshot.
pub trait Resolve: Send + Sync {
    fn resolve(
        &self,
        specifier: &str,
        importer: &Path,
        resolve_dir: &Path,
    ) -> Result<Resolution, ResolveError>;
}

impl<T: Resolve + ?Sized> Resolve for &T {
    fn resolve(
        &self,
        specifier: &str,
        importer: &Path,
        resolve_dir: &Path,
    ) -> Result<Resolution, ResolveError> {
        (*self).resolve(specifier, importer, resolve_dir)
    }
}
