//! Module resolution and loading.
//!
//! The [`Resolve`] and [`Load`] traits are the contracts the graph builder
//! consumes; [`FsResolver`] and [`FsLoader`] are the filesystem-backed
//! implementations the CLI wires in. Plugins wrap these traits from the
//! outside.

mod fs_resolver;
mod loader;
mod resolver;

pub use fs_resolver::{FsResolver, FsResolverOptions, DEFAULT_EXTENSIONS};
pub use loader::{FsLoader, Load, LoadedSource};
pub use resolver::{Resolution, Resolve, ResolveError};
