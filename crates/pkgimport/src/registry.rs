//! Package registry
//!
//! The import cache of one session. Every package is decoded at most once
//! per registry and shared by everything that imports it; the session's
//! type arena is owned here so that types restated by several packages stay
//! a single node.

use crate::artifact::{package_id, ArtifactRequest, ArtifactSource, FsSource};
use crate::config::ImportConfig;
use crate::decode::DecodeOptions;
use crate::error::ImportError;
use crate::importer::{self, Resolve};
use crate::package::Package;
use crate::types::TypeArena;
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::Arc;

/// Registry statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of packages held
    pub entries: usize,
    /// Lookups answered from the registry, including in-progress placeholders
    pub hits: usize,
    /// Artifacts fetched and decoded
    pub decodes: usize,
}

/// Single-threaded import cache
///
/// A package is inserted as a placeholder before its export data is decoded,
/// so a dependency cycle resolves to the placeholder instead of recursing.
/// Callers of [`import`](Registry::import) only ever receive completed
/// packages. A failed import removes every package it inserted, including
/// dependencies that completed before the failure, so the paths can be
/// retried.
#[derive(Debug)]
pub struct Registry<S = FsSource> {
    source: S,
    config: ImportConfig,
    packages: FxHashMap<Arc<str>, Arc<Package>>,
    types: TypeArena,
    /// Packages inserted by the import call in progress
    pending: Vec<Arc<str>>,
    depth: usize,
    hits: usize,
    decodes: usize,
}

impl Default for Registry<FsSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry<FsSource> {
    /// Create a registry reading artifacts from the file system
    pub fn new() -> Self {
        Self::with_config(ImportConfig::default())
    }

    /// Create a file-system registry with the given configuration
    pub fn with_config(config: ImportConfig) -> Self {
        Self::with_source(FsSource::new(&config), config)
    }
}

impl<S: ArtifactSource> Registry<S> {
    /// Create a registry reading artifacts from `source`
    pub fn with_source(source: S, config: ImportConfig) -> Self {
        let mut packages = FxHashMap::default();
        let unsafe_pkg = Arc::new(Package::unsafe_package());
        packages.insert(unsafe_pkg.path_arc().clone(), unsafe_pkg);
        Self {
            source,
            config,
            packages,
            types: TypeArena::new(),
            pending: Vec::new(),
            depth: 0,
            hits: 0,
            decodes: 0,
        }
    }

    /// Import the package at `path` as seen from `src_dir`.
    ///
    /// Local paths are resolved against `src_dir` and cleaned, so every
    /// spelling of the same directory yields the same package.
    pub fn import(
        &mut self,
        path: &str,
        src_dir: impl AsRef<Path>,
    ) -> Result<Arc<Package>, ImportError> {
        let src_dir = src_dir.as_ref();
        let id = package_id(path, src_dir);
        self.import_id(path, &id, src_dir)
    }

    fn import_id(
        &mut self,
        path: &str,
        id: &str,
        src_dir: &Path,
    ) -> Result<Arc<Package>, ImportError> {
        if let Some(package) = self.packages.get(id) {
            self.hits += 1;
            tracing::trace!(path = id, complete = package.is_complete(), "registry hit");
            return Ok(package.clone());
        }

        let key: Arc<str> = Arc::from(id);
        let package = Arc::new(Package::placeholder(key.clone()));
        self.packages.insert(key.clone(), package.clone());
        self.pending.push(key);

        self.depth += 1;
        let result = self.decode(path, &package, src_dir);
        self.depth -= 1;
        if self.depth > 0 {
            return result.map(|()| package);
        }

        let pending = std::mem::take(&mut self.pending);
        match result {
            Ok(()) => Ok(package),
            Err(err) => {
                self.discard(&pending);
                tracing::debug!(
                    path = id,
                    error = %err,
                    discarded = pending.len(),
                    "import failed"
                );
                Err(err)
            }
        }
    }

    /// Remove packages of a failed import along with their named types
    fn discard(&mut self, ids: &[Arc<str>]) {
        self.types.forget_packages(ids);
        for id in ids {
            self.packages.remove(id);
        }
    }

    fn decode(
        &mut self,
        path: &str,
        package: &Arc<Package>,
        src_dir: &Path,
    ) -> Result<(), ImportError> {
        let req = ArtifactRequest {
            path,
            id: package.path(),
            src_dir,
        };
        let bytes = self.source.fetch(&req)?;
        self.decodes += 1;
        let options = self.decode_options();
        importer::load(self, package, &bytes, src_dir, options)
    }

    fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            allow_legacy_text: self.config.allow_legacy_text,
            max_type_depth: self.config.max_type_depth,
        }
    }

    /// The package registered under `id`, complete or not
    pub fn get(&self, id: &str) -> Option<&Arc<Package>> {
        self.packages.get(id)
    }

    /// Number of packages held, `unsafe` included
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the registry holds no packages (never true: `unsafe` is
    /// always present)
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// All packages, in no particular order
    pub fn packages(&self) -> impl Iterator<Item = &Arc<Package>> {
        self.packages.values()
    }

    /// The session type arena
    pub fn types(&self) -> &TypeArena {
        &self.types
    }

    /// Cache statistics
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            entries: self.packages.len(),
            hits: self.hits,
            decodes: self.decodes,
        }
    }

    /// The artifact source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Mutable access to the artifact source, e.g. to add artifacts that a
    /// failed import was missing
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// The configuration
    pub fn config(&self) -> &ImportConfig {
        &self.config
    }
}

impl<S: ArtifactSource> Resolve for Registry<S> {
    fn resolve_dependency(
        &mut self,
        path: &str,
        src_dir: &Path,
    ) -> Result<Arc<Package>, ImportError> {
        self.import(path, src_dir)
    }

    fn link<R>(&mut self, f: impl FnOnce(&mut TypeArena) -> R) -> R {
        f(&mut self.types)
    }
}

/// Import `path` into `registry`
pub fn import<S: ArtifactSource>(
    registry: &mut Registry<S>,
    path: &str,
    src_dir: impl AsRef<Path>,
) -> Result<Arc<Package>, ImportError> {
    registry.import(path, src_dir)
}
